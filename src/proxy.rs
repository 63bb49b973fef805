/*!
The packet dispatcher between datapaths and the virtual plane

All events are processed one at a time by the thread calling `RfProxy::run`,
which is the only owner of the port mapping table.
*/

use ipc::{BusMessage, MessageBus, RouteMod};
use openflow::flow_mod::build_flow_mod_with_options;
use openflow::messages::OFPP_MAX;
use port_map::{PortMapTable, SwitchPort};

use byteorder::{ByteOrder, LittleEndian, NetworkEndian};

use std::sync::mpsc::Receiver;

/// Ethertype of the frames announcing a virtual machine port
pub const MAPPING_ETHERTYPE: u16 = 0x0a0a;
/// Ethertype of LLDP frames
pub const LLDP_ETHERTYPE: u16 = 0x88cc;
/// Upper 32 bits of virtual switch datapath ids, "rfvs" in ASCII
pub const DEFAULT_RFVS_PREFIX: u32 = 0x7266_7673;

const ETH_HEADER_LEN: usize = 14;
const ETH_TYPE_OFFSET: usize = 12;
/// vm_id (u64) and vm_port (u8)
const MAPPING_DATA_LEN: usize = 9;

/// Everything the dispatcher reacts on
#[derive(Debug)]
pub enum Event {
    /// A datapath connected and reported its ports
    DatapathJoin { dp_id: u64, ports: Vec<u16> },
    /// A datapath disconnected
    DatapathLeave { dp_id: u64 },
    /// A datapath sent a frame to the controller
    PacketIn {
        dp_id: u64,
        in_port: u16,
        data: Vec<u8>,
        buffer_id: Option<u32>,
    },
    /// A message arrived on the message bus
    Bus(BusMessage),
}

/// The commands the dispatcher sends to datapaths.
/// Sending is best-effort, failures are handled by the implementation.
pub trait DatapathControl {
    /// Sends a complete OpenFlow message
    fn send_openflow(&self, dp_id: u64, msg: Vec<u8>);

    /// Outputs the frame on a port of the datapath
    fn send_packet_out(&self, dp_id: u64, port: u16, data: &[u8]);
}

fn ethertype(frame: &[u8]) -> Option<u16> {
    if frame.len() < ETH_HEADER_LEN {
        return None;
    }
    Some(NetworkEndian::read_u16(&frame[ETH_TYPE_OFFSET..ETH_HEADER_LEN]))
}

/// The dispatcher
#[derive(Debug)]
pub struct RfProxy<B, D> {
    ct_id: u64,
    rfvs_prefix: u32,
    table: PortMapTable,
    bus: B,
    datapaths: D,
}

impl<B: MessageBus, D: DatapathControl> RfProxy<B, D> {
    /// Constructs a dispatcher with an empty port mapping table.
    /// `ct_id` identifies this proxy on the bus.
    pub fn new(ct_id: u64, rfvs_prefix: u32, bus: B, datapaths: D) -> RfProxy<B, D> {
        RfProxy {
            ct_id,
            rfvs_prefix,
            table: PortMapTable::new(),
            bus,
            datapaths,
        }
    }

    /// Checks if the datapath is a virtual switch
    pub fn is_rfvs(&self, dp_id: u64) -> bool {
        (dp_id >> 32) as u32 == self.rfvs_prefix
    }

    pub fn on_datapath_up(&mut self, dp_id: u64, ports: &[u16]) {
        for &port in ports.iter().filter(|&&p| p <= OFPP_MAX) {
            info!(
                "Registering datapath port (dp_id={:#018x}, dp_port={})",
                dp_id, port
            );
            self.bus.send(BusMessage::DatapathPortRegister {
                ct_id: self.ct_id,
                dp_id,
                dp_port: port,
            });
        }
    }

    pub fn on_datapath_down(&mut self, dp_id: u64) {
        info!("Datapath is down (dp_id={:#018x})", dp_id);
        let removed = self.table.remove_datapath(dp_id);
        debug!("Removed {} port mappings of {:#018x}", removed, dp_id);
        self.bus.send(BusMessage::DatapathDown {
            ct_id: self.ct_id,
            dp_id,
        });
    }

    fn on_mapping_frame(&mut self, vs_id: u64, vs_port: u16, frame: &[u8]) {
        if frame.len() < ETH_HEADER_LEN + MAPPING_DATA_LEN {
            warn!(
                "Dropping mapping frame of {} bytes from {}",
                frame.len(),
                SwitchPort::new(vs_id, vs_port)
            );
            return;
        }
        let data = &frame[ETH_HEADER_LEN..];
        let vm_id = LittleEndian::read_u64(&data[0..8]);
        let vm_port = u16::from(data[8]);
        info!(
            "Received mapping packet (vm_id={:#018x}, vm_port={}, vs_id={:#018x}, vs_port={})",
            vm_id, vm_port, vs_id, vs_port
        );
        self.bus.send(BusMessage::VirtualPlaneMap {
            vm_id,
            vm_port,
            vs_id,
            vs_port,
        });
    }

    /// Classifies the frame and reports or redirects it
    pub fn on_packet_in(&mut self, dp_id: u64, in_port: u16, data: &[u8], buffer_id: Option<u32>) {
        trace!(
            "Packet in from {} (buffer {:?}): {:?}",
            SwitchPort::new(dp_id, in_port),
            buffer_id,
            data
        );
        match ethertype(data) {
            Some(MAPPING_ETHERTYPE) => return self.on_mapping_frame(dp_id, in_port, data),
            Some(LLDP_ETHERTYPE) => return,
            Some(_) => {}
            None => {
                debug!("Dropping runt frame of {} bytes", data.len());
                return;
            }
        }

        if self.is_rfvs(dp_id) {
            match self.table.datapath_port_of(dp_id, in_port) {
                Some(dp) => self.datapaths.send_packet_out(dp.id, dp.port, data),
                None => debug!(
                    "Unmapped virtual switch port {}",
                    SwitchPort::new(dp_id, in_port)
                ),
            }
        }
        else {
            match self.table.virtual_port_of(dp_id, in_port) {
                Some(vs) => self.datapaths.send_packet_out(vs.id, vs.port, data),
                None => debug!("Unmapped datapath port {}", SwitchPort::new(dp_id, in_port)),
            }
        }
    }

    fn on_route_mod(&mut self, rm: RouteMod) {
        match build_flow_mod_with_options(rm.operation, &rm.matches, &rm.actions, &rm.options) {
            Ok(flow_mod) => self.datapaths.send_openflow(rm.dp_id, flow_mod),
            Err(e) => debug!("Failed to create OpenFlow FlowMod for {:#018x}: {}", rm.dp_id, e),
        }
    }

    /// Processes a message received on the bus
    pub fn process(&mut self, msg: BusMessage) {
        match msg {
            BusMessage::RouteMod(rm) => self.on_route_mod(rm),
            BusMessage::DataPlaneMap {
                dp_id,
                dp_port,
                vs_id,
                vs_port,
                ..
            } => self.table.update(dp_id, dp_port, vs_id, vs_port),
            msg => debug!("Ignoring {:?} from the message bus", msg.typ()),
        }
    }

    pub fn handle(&mut self, event: Event) {
        match event {
            Event::DatapathJoin { dp_id, ports } => self.on_datapath_up(dp_id, &ports),
            Event::DatapathLeave { dp_id } => self.on_datapath_down(dp_id),
            Event::PacketIn {
                dp_id,
                in_port,
                data,
                buffer_id,
            } => self.on_packet_in(dp_id, in_port, &data, buffer_id),
            Event::Bus(msg) => self.process(msg),
        }
    }

    /// Handles events in arrival order until all senders are gone
    pub fn run(&mut self, rx: &Receiver<Event>) {
        for event in rx.iter() {
            self.handle(event);
        }
        info!("All event sources are gone");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipc::BusMessageType;
    use openflow::messages::OFP_FLOW_MOD_LEN;
    use types::{Action, Match, RouteModType};

    use std::cell::RefCell;
    use std::sync::mpsc::channel;

    const DP: u64 = 1;
    const VS: u64 = 0x7266_7673_0000_0001;

    #[derive(Debug, Default)]
    struct RecordingBus {
        sent: RefCell<Vec<BusMessage>>,
    }
    impl MessageBus for RecordingBus {
        fn send(&self, msg: BusMessage) {
            self.sent.borrow_mut().push(msg);
        }
    }

    #[derive(Debug, Default)]
    struct RecordingDatapaths {
        openflow: RefCell<Vec<(u64, Vec<u8>)>>,
        packet_outs: RefCell<Vec<(u64, u16, Vec<u8>)>>,
    }
    impl DatapathControl for RecordingDatapaths {
        fn send_openflow(&self, dp_id: u64, msg: Vec<u8>) {
            self.openflow.borrow_mut().push((dp_id, msg));
        }
        fn send_packet_out(&self, dp_id: u64, port: u16, data: &[u8]) {
            self.packet_outs.borrow_mut().push((dp_id, port, data.to_vec()));
        }
    }

    type Testee = RfProxy<RecordingBus, RecordingDatapaths>;

    fn testee() -> Testee {
        RfProxy::new(
            7,
            DEFAULT_RFVS_PREFIX,
            RecordingBus::default(),
            RecordingDatapaths::default(),
        )
    }

    fn frame(ethertype: u16, payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![0xff; 6];
        frame.extend_from_slice(&[2, 0, 0, 0, 0, 1]);
        frame.push((ethertype >> 8) as u8);
        frame.push(ethertype as u8);
        frame.extend_from_slice(payload);
        frame
    }

    fn mapped() -> Testee {
        let mut proxy = testee();
        proxy.process(BusMessage::DataPlaneMap {
            ct_id: 7,
            dp_id: DP,
            dp_port: 3,
            vs_id: VS,
            vs_port: 5,
        });
        proxy
    }

    #[test]
    fn rfvs_datapaths() {
        let proxy = testee();
        assert!(proxy.is_rfvs(VS));
        assert!(!proxy.is_rfvs(DP));
    }

    #[test]
    fn join_registers_ports() {
        let mut proxy = testee();
        proxy.on_datapath_up(DP, &[1, 2, OFPP_MAX, 0xfffe]);
        let sent = proxy.bus.sent.borrow();
        let ports: Vec<_> = sent
            .iter()
            .map(|m| match *m {
                BusMessage::DatapathPortRegister {
                    ct_id: 7,
                    dp_id: DP,
                    dp_port,
                } => dp_port,
                ref m => panic!("unexpected message {:?}", m),
            })
            .collect();
        assert_eq!(vec![1, 2, OFPP_MAX], ports);
    }

    #[test]
    fn leave_purges_mappings() {
        let mut proxy = mapped();
        proxy.handle(Event::DatapathLeave { dp_id: DP });
        assert!(proxy.table.is_empty());
        assert_eq!(
            vec![BusMessage::DatapathDown { ct_id: 7, dp_id: DP }],
            *proxy.bus.sent.borrow()
        );
    }

    #[test]
    fn mapping_frame_is_reported() {
        let mut proxy = testee();
        let payload = [0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01, 4];
        proxy.on_packet_in(VS, 5, &frame(MAPPING_ETHERTYPE, &payload), None);
        let expected = BusMessage::VirtualPlaneMap {
            vm_id: 0x0102_0304_0506_0708,
            vm_port: 4,
            vs_id: VS,
            vs_port: 5,
        };
        assert_eq!(vec![expected], *proxy.bus.sent.borrow());
        assert!(proxy.table.is_empty());
        assert!(proxy.datapaths.packet_outs.borrow().is_empty());
    }

    #[test]
    fn short_mapping_frame_is_dropped() {
        let mut proxy = testee();
        proxy.on_packet_in(VS, 5, &frame(MAPPING_ETHERTYPE, &[1, 2, 3]), None);
        assert!(proxy.bus.sent.borrow().is_empty());
    }

    #[test]
    fn lldp_is_dropped() {
        let mut proxy = mapped();
        proxy.on_packet_in(DP, 3, &frame(LLDP_ETHERTYPE, &[0; 20]), None);
        assert!(proxy.bus.sent.borrow().is_empty());
        assert!(proxy.datapaths.packet_outs.borrow().is_empty());
    }

    #[test]
    fn runt_frame_is_dropped() {
        let mut proxy = mapped();
        proxy.on_packet_in(DP, 3, &[0; 10], None);
        assert!(proxy.datapaths.packet_outs.borrow().is_empty());
    }

    #[test]
    fn redirect_to_virtual_switch() {
        let mut proxy = mapped();
        let data = frame(0x0800, &[0x45, 0]);
        proxy.handle(Event::PacketIn {
            dp_id: DP,
            in_port: 3,
            data: data.clone(),
            buffer_id: Some(12),
        });
        assert_eq!(vec![(VS, 5, data)], *proxy.datapaths.packet_outs.borrow());
    }

    #[test]
    fn redirect_to_datapath() {
        let mut proxy = mapped();
        let data = frame(0x0806, &[0; 28]);
        proxy.on_packet_in(VS, 5, &data, None);
        assert_eq!(vec![(DP, 3, data)], *proxy.datapaths.packet_outs.borrow());
    }

    #[test]
    fn unmapped_ports_drop() {
        let mut proxy = mapped();
        proxy.on_packet_in(DP, 4, &frame(0x0800, &[]), None);
        proxy.on_packet_in(VS, 6, &frame(0x0800, &[]), None);
        assert!(proxy.datapaths.packet_outs.borrow().is_empty());
        assert!(proxy.bus.sent.borrow().is_empty());
    }

    #[test]
    fn route_mod_sends_flow_mod() {
        let mut proxy = testee();
        proxy.process(BusMessage::RouteMod(RouteMod {
            operation: RouteModType::Delete,
            dp_id: DP,
            matches: vec![Match::Ethernet([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff])],
            actions: vec![],
            options: vec![],
        }));
        let sent = proxy.datapaths.openflow.borrow();
        assert_eq!(1, sent.len());
        assert_eq!(DP, sent[0].0);
        assert_eq!(OFP_FLOW_MOD_LEN, sent[0].1.len());
    }

    #[test]
    fn unsupported_route_mod_is_dropped() {
        let mut proxy = testee();
        proxy.process(BusMessage::RouteMod(RouteMod {
            operation: RouteModType::Add,
            dp_id: DP,
            matches: vec![],
            actions: vec![Action::Output(1), Action::PopMpls],
            options: vec![],
        }));
        assert!(proxy.datapaths.openflow.borrow().is_empty());
    }

    #[test]
    fn own_messages_are_ignored() {
        let mut proxy = testee();
        let msg = BusMessage::DatapathDown { ct_id: 7, dp_id: DP };
        assert_eq!(BusMessageType::DatapathDown, msg.typ());
        proxy.process(msg);
        assert!(proxy.bus.sent.borrow().is_empty());
        assert!(proxy.table.is_empty());
    }

    #[test]
    fn run_until_senders_are_gone() {
        let mut proxy = testee();
        let (tx, rx) = channel();
        tx.send(Event::DatapathJoin {
            dp_id: DP,
            ports: vec![1],
        }).unwrap();
        tx.send(Event::Bus(BusMessage::DataPlaneMap {
            ct_id: 0,
            dp_id: DP,
            dp_port: 1,
            vs_id: VS,
            vs_port: 1,
        })).unwrap();
        tx.send(Event::DatapathLeave { dp_id: DP }).unwrap();
        drop(tx);

        proxy.run(&rx);
        assert_eq!(2, proxy.bus.sent.borrow().len());
        assert!(proxy.table.is_empty());
    }
}

/*!
Implements the OpenFlow 1.0 controller side for the proxied datapaths.
Each switch connection is served by its own thread, which turns the switch's
messages into dispatcher events. Commands back to the switches are written
through the `Datapaths` registry.
*/

pub mod error;
pub mod flow_mod;
pub mod messages;

use openflow::error::{Error, Result};
use openflow::messages::deserialize::Deserialize;
use openflow::messages::serialize::OfpPacket;
use openflow::messages::*;
use proxy::{DatapathControl, Event};

use byteorder::{ByteOrder, NetworkEndian};
use rand;

use std::collections::HashMap;
use std::io;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

/// Bounds how long a switch that stops reading can stall a sender
const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

fn gen_xid() -> u32 {
    let xid = rand::random();
    trace!("Using xid {} for the outgoing message", xid);
    xid
}

type SharedStream = Arc<Mutex<TcpStream>>;

/// Clones the write half of `stream` with a bounded write time
fn shared_writer(stream: &TcpStream) -> io::Result<SharedStream> {
    stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
    Ok(Arc::new(Mutex::new(stream.try_clone()?)))
}

/// Writes the whole message. On failure the connection is shut down,
/// since a partly written message leaves the stream unusable.
fn write_message(stream: &SharedStream, msg: &[u8]) -> io::Result<()> {
    let mut stream = stream.lock().unwrap_or_else(PoisonError::into_inner);
    stream.write_all(msg).map_err(|e| {
        let _ = stream.shutdown(Shutdown::Both);
        e
    })
}

/// The write halves of all identified switch connections by datapath id
#[derive(Debug, Clone, Default)]
pub struct Datapaths {
    streams: Arc<Mutex<HashMap<u64, SharedStream>>>,
}

impl Datapaths {
    pub fn new() -> Datapaths {
        Datapaths::default()
    }

    fn streams(&self) -> MutexGuard<HashMap<u64, SharedStream>> {
        self.streams.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, dp_id: u64, stream: SharedStream) {
        if self.streams().insert(dp_id, stream).is_some() {
            warn!("Datapath {:#018x} replaced its former connection", dp_id);
        }
    }

    /// Removes the datapath if it is still served by `stream`.
    /// Returns false if another connection took over the datapath.
    fn unregister(&self, dp_id: u64, stream: &SharedStream) -> bool {
        let mut streams = self.streams();
        let current = streams.get(&dp_id).map_or(false, |s| Arc::ptr_eq(s, stream));
        if current {
            streams.remove(&dp_id);
        }
        current
    }

    fn write(&self, dp_id: u64, msg: &[u8]) {
        let stream = match self.streams().get(&dp_id) {
            Some(s) => s.clone(),
            None => {
                debug!("Datapath {:#018x} is not connected, dropping message", dp_id);
                return;
            }
        };
        trace!("Outgoing message to {:#018x}: {:?}", dp_id, msg);
        if let Err(e) = write_message(&stream, msg) {
            warn!("Could not send to datapath {:#018x}: {}", dp_id, e);
        }
    }
}

impl DatapathControl for Datapaths {
    fn send_openflow(&self, dp_id: u64, mut msg: Vec<u8>) {
        if msg.len() < OfpHeader::header_length() {
            warn!("Refusing to send an OpenFlow message of {} bytes", msg.len());
            return;
        }
        NetworkEndian::write_u32(&mut msg[4..8], gen_xid());
        self.write(dp_id, &msg);
    }

    fn send_packet_out(&self, dp_id: u64, port: u16, data: &[u8]) {
        let packet_out = OfpPacketOut::new(port, data.to_vec());
        let mut msg = vec![];
        match packet_out.serialize(&mut msg, gen_xid()) {
            Ok(()) => self.write(dp_id, &msg),
            Err(e) => warn!("Could not construct packet out for {:#018x}: {}", dp_id, e),
        }
    }
}

/// A connection to one switch.
/// Use the run function to serve a connection.
#[derive(Debug)]
pub struct OfConnection {
    reader: TcpStream,
    writer: SharedStream,
    datapaths: Datapaths,
    tx: Sender<Event>,
    hello_received: bool,
    dp_id: Option<u64>,
}

impl OfConnection {
    fn send<P: OfpPacket>(&self, packet: &P, xid: u32) -> io::Result<()> {
        let mut msg = vec![];
        packet.serialize(&mut msg, xid)?;
        write_message(&self.writer, &msg)
    }

    fn send_header(&self, typ: OfpType) -> io::Result<()> {
        let mut msg = vec![];
        OfpHeader::new(typ, gen_xid()).serialize(&mut msg)?;
        write_message(&self.writer, &msg)
    }

    fn emit(&self, event: Event) -> io::Result<()> {
        self.tx.send(event).map_err(|_| {
            io::Error::new(io::ErrorKind::BrokenPipe, "the dispatcher has stopped")
        })
    }

    fn handle_features(&mut self, features: OfpSwitchFeatures) -> io::Result<()> {
        let dp_id = features.datapath_id();
        if let Some(known) = self.dp_id {
            debug!("Ignoring repeated features reply of {:#018x}", known);
            return Ok(());
        }
        info!("The connected switch identified itself with datapath id {:#018x}", dp_id);
        for port in features.ports() {
            debug!("Datapath {:#018x} has port {} ({})", dp_id, port.port_no(), port.name());
        }

        self.dp_id = Some(dp_id);
        self.datapaths.register(dp_id, self.writer.clone());
        self.send(&OfpSwitchConfig::full_frames(), gen_xid())?;

        let ports = features.ports().iter().map(OfpPhyPort::port_no).collect();
        self.emit(Event::DatapathJoin { dp_id, ports })
    }

    fn handle_ofp_message(&mut self, header: &OfpHeader) -> Result<()> {
        debug!("Incoming message: {:?}", header);

        // Read the body
        let mut buf = vec![0; header.body_length()];
        self.reader.read_exact(&mut buf)?;

        // Process the message
        let t = header.typ();
        if t == OfpType::Hello as u8 {
            // simple version discovery
            if header.version() < OFP_VERSION {
                return Err(Error::HelloFailed);
            }
            self.hello_received = true;
            self.send_header(OfpType::FeaturesRequest)?;
        }
        else if !self.hello_received || header.version() != OFP_VERSION {
            return Err(Error::BadRequest(OfpBadRequestCode::BadVersion, buf));
        }
        else if t == OfpType::EchoRequest as u8 {
            // The EchoReply takes the same body byte stream as the EchoRequest
            let req = OfpEchoRequest::deserialize(buf)?;
            let rep = OfpEchoReply::new(req.arbitrary());
            self.send(&rep, header.xid())?;
        }
        else if t == OfpType::FeaturesReply as u8 {
            let features = OfpSwitchFeatures::deserialize(buf)?;
            self.handle_features(features)?;
        }
        else if t == OfpType::PacketIn as u8 {
            let packet_in = OfpPacketIn::deserialize(buf)?;
            let total_len = usize::from(packet_in.total_len());
            let in_port = packet_in.in_port();
            let buffer_id = packet_in.buffer_id();
            let data = packet_in.data();
            if data.len() < total_len {
                debug!("Got {} of {} bytes of the frame", data.len(), total_len);
            }
            match self.dp_id {
                Some(dp_id) => self.emit(Event::PacketIn {
                    dp_id,
                    in_port,
                    buffer_id,
                    data,
                })?,
                None => debug!("Ignoring packet in before the features reply"),
            }
        }
        else if t == OfpType::Error as u8 {
            let error = OfpErrorMsg::deserialize(buf)?;
            if error.check_flow_mod_failed() {
                error!("The switch rejected a flow mod: {}", error);
            }
            else {
                error!("Unexpected {}", error);
            }
            debug!("Full error message: {:?}", error);
        }
        else if t == OfpType::EchoReply as u8
            || t == OfpType::PortStatus as u8
            || t == OfpType::FlowRemoved as u8
        {
            trace!("Ignoring message of type {}", t);
        }
        else {
            debug!(
                "Cannot interpret message of type {}. Full message body: {:?}",
                header.typ(),
                buf
            );
            return Err(Error::BadRequest(OfpBadRequestCode::BadType, buf));
        }
        Ok(())
    }

    fn handle_of_errors(
        &mut self,
        error: Error,
        header: &OfpHeader,
        header_buf: &[u8],
    ) -> io::Result<()> {
        let err_msg = match error {
            Error::Io(e) => return Err(e),
            Error::HelloFailed => {
                let msg = format!(
                    "The connected switch supports only OpenFlow protocol version {:x}",
                    header.version()
                );
                self.send(&OfpErrorMsg::new_hello_failed(), header.xid())?;
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, msg));
            }
            Error::BadRequest(code, buf) => OfpErrorMsg::new_bad_request(code, header_buf, &buf),
        };
        debug!("Outgoing error message: {:?}", err_msg);
        self.send(&err_msg, header.xid())
    }

    fn serve(&mut self) -> io::Result<()> {
        // Send a Hello
        // Rely on the simple version: If one Hello is empty,
        // the smaller OfpHeader::version is agreed upon
        self.send_header(OfpType::Hello)?;

        loop {
            // Read the header
            let mut hbuf = [0; 8];
            self.reader.read_exact(&mut hbuf)?;
            let header = OfpHeader::deserialize(&hbuf);
            if let Err(e) = self.handle_ofp_message(&header) {
                self.handle_of_errors(e, &header, &hbuf)?;
            }
        }
    }

    /// Serves the switch connected via `stream` until it disconnects.
    /// The switch's datapath is announced to the dispatcher via `tx`
    /// and registered in `datapaths` while the connection lasts.
    pub fn run(stream: TcpStream, datapaths: Datapaths, tx: Sender<Event>) -> io::Result<()> {
        let writer = shared_writer(&stream)?;
        let mut conn = OfConnection {
            reader: stream,
            writer,
            datapaths,
            tx,
            hello_received: false,
            dp_id: None,
        };

        let res = conn.serve();
        if let Some(dp_id) = conn.dp_id {
            if !conn.datapaths.unregister(dp_id, &conn.writer) {
                debug!("Datapath {:#018x} is served by a newer connection", dp_id);
            }
            else if conn.tx.send(Event::DatapathLeave { dp_id }).is_err() {
                debug!("Datapath {:#018x} left after the dispatcher", dp_id);
            }
        }
        match res {
            Err(ref e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(()),
            r => r,
        }
    }
}

/// Accepts switch connections on `listener` and serves each on its own thread
pub fn listen(listener: &TcpListener, datapaths: &Datapaths, tx: &Sender<Event>) {
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to accept an OpenFlow connection: {}", e);
                continue;
            }
        };
        let peer = match stream.peer_addr() {
            Ok(addr) => addr.to_string(),
            Err(_) => "unknown peer".to_owned(),
        };
        info!("connection from {}", peer);

        let datapaths = datapaths.clone();
        let tx = tx.clone();
        thread::spawn(move || match OfConnection::run(stream, datapaths, tx) {
            Ok(()) => info!("connection to {} closed", peer),
            Err(e) => warn!("connection to {} failed: {}", peer, e),
        });
    }
}

/*!
The association between physical datapath ports and virtual switch ports

Every physical port is mirrored by at most one virtual switch port and vice
versa. Both directions are kept in their own map for constant time lookups
while forwarding.
*/

use std::collections::HashMap;
use std::fmt;

/// A port on a datapath or virtual switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwitchPort {
    pub id: u64,
    pub port: u16,
}

impl SwitchPort {
    pub fn new(id: u64, port: u16) -> SwitchPort {
        SwitchPort { id, port }
    }
}

impl fmt::Display for SwitchPort {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#018x}:{}", self.id, self.port)
    }
}

/// Bidirectional one-to-one port mapping table
#[derive(Debug, Default)]
pub struct PortMapTable {
    dp_to_vs: HashMap<SwitchPort, SwitchPort>,
    vs_to_dp: HashMap<SwitchPort, SwitchPort>,
}

impl PortMapTable {
    pub fn new() -> PortMapTable {
        PortMapTable::default()
    }

    /// Associates the datapath port with the virtual switch port.
    /// Former associations of either side are dissolved.
    pub fn update(&mut self, dp_id: u64, dp_port: u16, vs_id: u64, vs_port: u16) {
        let dp = SwitchPort::new(dp_id, dp_port);
        let vs = SwitchPort::new(vs_id, vs_port);

        if let Some(old_vs) = self.dp_to_vs.insert(dp, vs) {
            if old_vs != vs {
                self.vs_to_dp.remove(&old_vs);
            }
        }
        if let Some(old_dp) = self.vs_to_dp.insert(vs, dp) {
            if old_dp != dp {
                self.dp_to_vs.remove(&old_dp);
            }
        }
        debug!("Mapped datapath port {} to virtual switch port {}", dp, vs);
    }

    /// Looks up the datapath port mirrored by a virtual switch port
    pub fn datapath_port_of(&self, vs_id: u64, vs_port: u16) -> Option<SwitchPort> {
        self.vs_to_dp.get(&SwitchPort::new(vs_id, vs_port)).cloned()
    }

    /// Looks up the virtual switch port mirroring a datapath port
    pub fn virtual_port_of(&self, dp_id: u64, dp_port: u16) -> Option<SwitchPort> {
        self.dp_to_vs.get(&SwitchPort::new(dp_id, dp_port)).cloned()
    }

    /// Removes every association of the datapath's ports.
    /// Returns the number of removed associations.
    pub fn remove_datapath(&mut self, dp_id: u64) -> usize {
        let ports: Vec<SwitchPort> = self
            .dp_to_vs
            .keys()
            .filter(|dp| dp.id == dp_id)
            .cloned()
            .collect();
        for dp in &ports {
            if let Some(vs) = self.dp_to_vs.remove(dp) {
                self.vs_to_dp.remove(&vs);
            }
        }
        ports.len()
    }

    /// The number of associations
    pub fn len(&self) -> usize {
        self.dp_to_vs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dp_to_vs.is_empty()
    }
}

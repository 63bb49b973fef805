/*!
All deserialization routines for the OpenFlow message primitives

The header uses a special deserialization because its size is known.
Use the trait `Deserialize` for any other deserialization implementation.
*/

use byteorder::{ByteOrder, NetworkEndian};
use openflow::error::{Error, Result};
use openflow::messages::*;

use std::mem::size_of;

/// Size of the fixed part of a features reply body
const FEATURES_LEN: usize = 24;
/// Size of one physical port description
const PHY_PORT_LEN: usize = 48;
/// Size of the fixed part of a packet in body
const PACKET_IN_LEN: usize = 10;

impl OfpHeader {
    /// Deserializes an OpenFlow header
    pub fn deserialize(bytes: &[u8; 8]) -> OfpHeader {
        OfpHeader {
            version: bytes[0],
            typ: bytes[1],
            length: NetworkEndian::read_u16(&bytes[2..4]),
            xid: NetworkEndian::read_u32(&bytes[4..]),
        }
    }

    /// Returns the body length in byte.
    /// A length field below the header size yields 0.
    pub fn body_length(&self) -> usize {
        (self.length as usize).saturating_sub(OfpHeader::header_length())
    }
}

/// To be implemented by all OpenFlow message parts that are received.
pub trait Deserialize {
    /// The type to deserialize
    type R;

    /// Deserialize the bytes buffer
    /// Fails on providing a too small or too large buffer
    fn deserialize(bytes: Vec<u8>) -> Result<Self::R> {
        if Self::min_length() > bytes.len() || Self::max_length() < bytes.len() {
            return Err(Error::BadRequest(OfpBadRequestCode::BadLen, bytes));
        }
        Self::deserialize_len_ok(bytes)
    }

    /// Deserializes the byte buffer (network byte order)
    /// Implementers can rely on the bytes buffer's size to be greater or equal Self::min_length()
    fn deserialize_len_ok(bytes: Vec<u8>) -> Result<Self::R>;

    /// The minimum length of the message part in bytes
    /// If Self::R contains dynamically sized fields,
    /// you probably have to override this implementation.
    fn min_length() -> usize {
        size_of::<Self::R>()
    }

    /// The maximum length of the message part in bytes
    /// May not return a value greater than 0xFFF7
    /// If Self::R is fixed size, you probably have to
    /// override this implementation.
    fn max_length() -> usize {
        0xffff - OfpHeader::header_length()
    }
}

impl Deserialize for OfpEchoRequest {
    type R = OfpEchoRequest;

    fn deserialize_len_ok(bytes: Vec<u8>) -> Result<Self::R> {
        Ok(OfpEchoRequest { arbitrary: bytes })
    }

    fn min_length() -> usize {
        0
    }
}

impl OfpPhyPort {
    fn deserialize(bytes: &[u8]) -> OfpPhyPort {
        let mut hw_addr = [0; OFP_ETH_ALEN];
        hw_addr.copy_from_slice(&bytes[2..8]);
        let raw_name = &bytes[8..8 + OFP_MAX_PORT_NAME_LEN];
        let name_len = raw_name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(OFP_MAX_PORT_NAME_LEN);
        OfpPhyPort {
            port_no: NetworkEndian::read_u16(&bytes[0..2]),
            hw_addr,
            name: String::from_utf8_lossy(&raw_name[..name_len]).into_owned(),
            config: NetworkEndian::read_u32(&bytes[24..28]),
            state: NetworkEndian::read_u32(&bytes[28..32]),
        }
    }
}

impl Deserialize for OfpSwitchFeatures {
    type R = OfpSwitchFeatures;

    fn deserialize_len_ok(bytes: Vec<u8>) -> Result<Self::R> {
        if (bytes.len() - FEATURES_LEN) % PHY_PORT_LEN != 0 {
            return Err(Error::BadRequest(OfpBadRequestCode::BadLen, bytes));
        }
        let ports = bytes[FEATURES_LEN..]
            .chunks(PHY_PORT_LEN)
            .map(OfpPhyPort::deserialize)
            .collect();
        Ok(OfpSwitchFeatures {
            datapath_id: NetworkEndian::read_u64(&bytes[0..8]),
            n_buffers: NetworkEndian::read_u32(&bytes[8..12]),
            n_tables: bytes[12],
            capabilities: NetworkEndian::read_u32(&bytes[16..20]),
            actions: NetworkEndian::read_u32(&bytes[20..24]),
            ports,
        })
    }

    fn min_length() -> usize {
        FEATURES_LEN
    }
}

impl Deserialize for OfpPacketIn {
    type R = OfpPacketIn;

    fn deserialize_len_ok(bytes: Vec<u8>) -> Result<Self::R> {
        Ok(OfpPacketIn {
            buffer_id: NetworkEndian::read_u32(&bytes[0..4]),
            total_len: NetworkEndian::read_u16(&bytes[4..6]),
            in_port: NetworkEndian::read_u16(&bytes[6..8]),
            reason: bytes[8],
            data: bytes[PACKET_IN_LEN..].to_vec(),
        })
    }

    fn min_length() -> usize {
        PACKET_IN_LEN
    }
}

impl Deserialize for OfpErrorMsg {
    type R = OfpErrorMsg;

    fn deserialize_len_ok(bytes: Vec<u8>) -> Result<Self::R> {
        let typ = NetworkEndian::read_u16(&bytes[0..2]);
        let code = NetworkEndian::read_u16(&bytes[2..4]);
        Ok(OfpErrorMsg {
            typ,
            code,
            data: bytes[4..].to_vec(),
        })
    }

    fn min_length() -> usize {
        4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phy_port(port_no: u16, name: &str) -> Vec<u8> {
        let mut buf = vec![0; PHY_PORT_LEN];
        NetworkEndian::write_u16(&mut buf[0..2], port_no);
        buf[2..8].copy_from_slice(&[2, 0, 0, 0, 0, port_no as u8]);
        buf[8..8 + name.len()].copy_from_slice(name.as_bytes());
        buf
    }

    #[test]
    fn header_deserialization() {
        let expected = OfpHeader {
            version: 1,
            typ: 10,
            length: 0x5234,
            xid: 0x12345678,
        };
        let bytes = [1, 10, 0x52, 0x34, 0x12, 0x34, 0x56, 0x78];
        assert_eq!(expected, OfpHeader::deserialize(&bytes));
    }

    #[test]
    fn short_header_length() {
        let bytes = [1, 0, 0, 4, 0, 0, 0, 0];
        assert_eq!(0, OfpHeader::deserialize(&bytes).body_length());
    }

    #[test]
    fn min_lengths() {
        assert_eq!(0, OfpEchoRequest::min_length());
        assert_eq!(24, OfpSwitchFeatures::min_length());
        assert_eq!(10, OfpPacketIn::min_length());
        assert_eq!(4, OfpErrorMsg::min_length());
    }

    #[test]
    fn features_with_ports() {
        let mut bytes = vec![0; FEATURES_LEN];
        NetworkEndian::write_u64(&mut bytes[0..8], 0x7266_7673_0000_0001);
        bytes.extend(phy_port(1, "eth1"));
        bytes.extend(phy_port(0xfffe, "br0"));
        let features = OfpSwitchFeatures::deserialize(bytes).unwrap();
        assert_eq!(0x7266_7673_0000_0001, features.datapath_id());
        let ports: Vec<_> = features.ports().iter().map(OfpPhyPort::port_no).collect();
        assert_eq!(vec![1, 0xfffe], ports);
        assert_eq!("eth1", features.ports()[0].name());
    }

    #[test]
    fn features_with_partial_port() {
        let mut bytes = vec![0; FEATURES_LEN];
        bytes.extend(vec![0; PHY_PORT_LEN - 1]);
        assert!(OfpSwitchFeatures::deserialize(bytes).is_err());
    }

    #[test]
    fn packet_in() {
        let bytes = vec![0xff, 0xff, 0xff, 0xff, 0, 2, 0, 7, 0, 0, 0xab, 0xcd];
        let packet_in = OfpPacketIn::deserialize(bytes).unwrap();
        assert_eq!(None, packet_in.buffer_id());
        assert_eq!(7, packet_in.in_port());
        assert_eq!(2, packet_in.total_len());
        assert_eq!(vec![0xab, 0xcd], packet_in.data());
    }
}

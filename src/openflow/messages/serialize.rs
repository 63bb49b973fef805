/*!
All serialization and construction routines for the OpenFlow message primitives

Use the trait `OfpPacket` for serialization implementations of messages
that are sent. Other primitives that are part of a message should
implement a serialize funtion that operates on a given byte stream.
Flow mods are built in one piece by `openflow::flow_mod`.
*/

use byteorder::{NetworkEndian, WriteBytesExt};
use openflow::messages::*;
use std::io;
use std::io::Write;
use std::mem::size_of;

impl OfpHeader {
    /// Constructs an `OfpHeader`
    pub fn new(typ: OfpType, xid: u32) -> OfpHeader {
        OfpHeader {
            version: OFP_VERSION,
            typ: typ as u8,
            length: OfpHeader::header_length() as u16,
            xid,
        }
    }

    /// Returns the fixed header length of 8 (in byte)
    pub fn header_length() -> usize {
        size_of::<OfpHeader>()
    }

    /// Serializes this header on the given stream
    pub fn serialize<S: Write>(&self, stream: &mut S) -> io::Result<()> {
        stream.write_all(&[self.version, self.typ])?;
        stream.write_u16::<NetworkEndian>(self.length)?;
        stream.write_u32::<NetworkEndian>(self.xid)
    }
}

impl OfpActionOutput {
    /// Constructs an `OfpActionOutput`
    pub fn new(port: u16) -> OfpActionOutput {
        OfpActionOutput {
            typ: OfpActionType::Output as u16,
            len: size_of::<OfpActionOutput>() as u16,
            port,
            max_len: 0,
        }
    }

    fn serialize<S: Write>(&self, stream: &mut S) -> io::Result<()> {
        stream.write_u16::<NetworkEndian>(self.typ)?;
        stream.write_u16::<NetworkEndian>(self.len)?;
        stream.write_u16::<NetworkEndian>(self.port)?;
        stream.write_u16::<NetworkEndian>(self.max_len)
    }
}

impl OfpSwitchConfig {
    /// Constructs a configuration that lets the datapath
    /// send whole frames to the controller
    pub fn full_frames() -> OfpSwitchConfig {
        OfpSwitchConfig {
            flags: 0,
            miss_send_len: 0xffff,
        }
    }
}

impl OfpPacketOut {
    /// Constructs an `OfpPacketOut` that outputs the unbuffered `data` on `port`
    pub fn new(port: u16, data: Vec<u8>) -> OfpPacketOut {
        OfpPacketOut {
            buffer_id: OFP_NO_BUFFER,
            in_port: OFPP_NONE,
            actions: vec![OfpActionOutput::new(port)],
            data,
        }
    }
}

/// An OpenFlow packet. Must be implemented for all OpenFlow messsages that are sent.
pub trait OfpPacket {
    /// Constructs an OfpHeader with the given body length and transaction ID
    fn header(&self, body_length: usize, xid: u32) -> OfpHeader {
        OfpHeader {
            version: OFP_VERSION,
            typ: Self::typ() as u8,
            length: (OfpHeader::header_length() + body_length) as u16,
            xid,
        }
    }

    /// Returns the packet's type
    fn typ() -> OfpType;

    /// Serializes this packet with network byte order.
    /// The xid is used as its header's transaction id.
    fn serialize<S: Write>(&self, stream: &mut S, xid: u32) -> io::Result<()> {
        let mut body = vec![];
        self.serialize_body(&mut body)?;
        if OfpHeader::header_length() + body.len() > u16::max_value() as usize {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "OpenFlow message exceeds 65535 bytes",
            ));
        }
        let header = self.header(body.len(), xid);
        trace!("Outgoing message: {:?}", header);
        let mut msg = Vec::with_capacity(OfpHeader::header_length() + body.len());
        header.serialize(&mut msg)?;
        msg.extend_from_slice(&body);
        // one write per message, streams are shared between threads
        stream.write_all(&msg)
    }

    /// Serializes this packet's body.
    /// Implementers have to output network byte order on the given stream.
    fn serialize_body<S: Write>(&self, stream: &mut S) -> io::Result<()>;
}

impl OfpEchoReply {
    /// Constructs a new `OfpEchoReply` with `arbitrary` content.
    /// This should be the same as in the `OfpEchoRequest` that issued this reply.
    pub fn new(arbitrary: Vec<u8>) -> OfpEchoReply {
        OfpEchoReply { arbitrary }
    }
}
impl OfpPacket for OfpEchoReply {
    fn typ() -> OfpType {
        OfpType::EchoReply
    }

    fn serialize_body<S: Write>(&self, stream: &mut S) -> io::Result<()> {
        stream.write_all(&self.arbitrary)
    }
}

impl OfpPacket for OfpErrorMsg {
    fn typ() -> OfpType {
        OfpType::Error
    }

    fn serialize_body<S: Write>(&self, stream: &mut S) -> io::Result<()> {
        stream.write_u16::<NetworkEndian>(self.typ)?;
        stream.write_u16::<NetworkEndian>(self.code)?;
        stream.write_all(&self.data)
    }
}

impl OfpPacket for OfpSwitchConfig {
    fn typ() -> OfpType {
        OfpType::SetConfig
    }

    fn serialize_body<S: Write>(&self, stream: &mut S) -> io::Result<()> {
        stream.write_u16::<NetworkEndian>(self.flags)?;
        stream.write_u16::<NetworkEndian>(self.miss_send_len)
    }
}

impl OfpPacket for OfpPacketOut {
    fn typ() -> OfpType {
        OfpType::PacketOut
    }

    fn serialize_body<S: Write>(&self, stream: &mut S) -> io::Result<()> {
        let actions = &mut vec![];
        for action in &self.actions {
            action.serialize(actions)?;
        }
        stream.write_u32::<NetworkEndian>(self.buffer_id)?;
        stream.write_u16::<NetworkEndian>(self.in_port)?;
        stream.write_u16::<NetworkEndian>(actions.len() as u16)?;
        stream.write_all(actions)?;
        stream.write_all(&self.data)
    }
}

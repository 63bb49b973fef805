/*!
Messages exchanged with the route control service over the message bus

Every message is framed as follows, all integers in network byte order:

```text
+------+--------+------------------+
| type | length | body             |
| u8   | u32    | length bytes     |
+------+--------+------------------+
```

Ids are u64, ports u16. A RouteMod body continues after its fixed fields
with three TLV lists: matches, actions and options (see `tlv`).
*/

pub mod client;

use tlv;
use types::{list_to_records, records_to_list, Action, Match, RouteModType, RouteOption};

use byteorder::{NetworkEndian, ReadBytesExt, WriteBytesExt};

use std::error;
use std::fmt;
use std::io;
use std::io::{Cursor, Read, Write};
use std::sync::Arc;

/// Length of type and length fields in front of every body
const FRAME_HEADER_LEN: usize = 5;
/// Bodies above this length are refused
const MAX_BODY_LEN: u32 = 1 << 20;

/// Numerical representation of the bus message types
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusMessageType {
    DatapathPortRegister = 2,
    DatapathDown = 3,
    VirtualPlaneMap = 4,
    DataPlaneMap = 5,
    RouteMod = 6,
}

/// A flow change requested by the route control service
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMod {
    pub operation: RouteModType,
    /// The datapath to install the flow on
    pub dp_id: u64,
    pub matches: Vec<Match>,
    pub actions: Vec<Action>,
    pub options: Vec<RouteOption>,
}

/// The messages on the bus
#[derive(Debug, Clone, PartialEq)]
pub enum BusMessage {
    /// A datapath port is available (sent)
    DatapathPortRegister { ct_id: u64, dp_id: u64, dp_port: u16 },
    /// A datapath left (sent)
    DatapathDown { ct_id: u64, dp_id: u64 },
    /// A virtual machine port is attached to a virtual switch port (sent)
    VirtualPlaneMap {
        vm_id: u64,
        vm_port: u16,
        vs_id: u64,
        vs_port: u16,
    },
    /// Mirror the datapath port by the virtual switch port (received)
    DataPlaneMap {
        ct_id: u64,
        dp_id: u64,
        dp_port: u16,
        vs_id: u64,
        vs_port: u16,
    },
    /// Change a flow (received)
    RouteMod(RouteMod),
}

/// Represents all errors while reading bus messages
#[derive(Debug)]
pub enum Error {
    /// The bus connection failed
    Io(io::Error),
    /// The frame's type is unknown, its body was skipped
    UnknownType(u8),
    /// The body is too short for the message type
    BadBody(BusMessageType),
    /// The frame declares a body beyond `MAX_BODY_LEN`
    TooLong(u32),
}

impl error::Error for Error {
    fn description(&self) -> &str {
        "bus message error"
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Io(ref e) => write!(f, "{}", e),
            Error::UnknownType(t) => write!(f, "Unknown bus message type {}", t),
            Error::BadBody(t) => write!(f, "Bus message {:?} with incomplete body", t),
            Error::TooLong(len) => write!(f, "Bus message body of {} bytes is too long", len),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(e) => e,
            e => io::Error::new(io::ErrorKind::InvalidData, e.to_string()),
        }
    }
}

impl BusMessageType {
    fn from_u8(t: u8) -> Option<BusMessageType> {
        match t {
            2 => Some(BusMessageType::DatapathPortRegister),
            3 => Some(BusMessageType::DatapathDown),
            4 => Some(BusMessageType::VirtualPlaneMap),
            5 => Some(BusMessageType::DataPlaneMap),
            6 => Some(BusMessageType::RouteMod),
            _ => None,
        }
    }
}

impl BusMessage {
    pub fn typ(&self) -> BusMessageType {
        match *self {
            BusMessage::DatapathPortRegister { .. } => BusMessageType::DatapathPortRegister,
            BusMessage::DatapathDown { .. } => BusMessageType::DatapathDown,
            BusMessage::VirtualPlaneMap { .. } => BusMessageType::VirtualPlaneMap,
            BusMessage::DataPlaneMap { .. } => BusMessageType::DataPlaneMap,
            BusMessage::RouteMod(_) => BusMessageType::RouteMod,
        }
    }

    fn serialize_body<S: Write>(&self, stream: &mut S) -> io::Result<()> {
        match *self {
            BusMessage::DatapathPortRegister {
                ct_id,
                dp_id,
                dp_port,
            } => {
                stream.write_u64::<NetworkEndian>(ct_id)?;
                stream.write_u64::<NetworkEndian>(dp_id)?;
                stream.write_u16::<NetworkEndian>(dp_port)
            }
            BusMessage::DatapathDown { ct_id, dp_id } => {
                stream.write_u64::<NetworkEndian>(ct_id)?;
                stream.write_u64::<NetworkEndian>(dp_id)
            }
            BusMessage::VirtualPlaneMap {
                vm_id,
                vm_port,
                vs_id,
                vs_port,
            } => {
                stream.write_u64::<NetworkEndian>(vm_id)?;
                stream.write_u16::<NetworkEndian>(vm_port)?;
                stream.write_u64::<NetworkEndian>(vs_id)?;
                stream.write_u16::<NetworkEndian>(vs_port)
            }
            BusMessage::DataPlaneMap {
                ct_id,
                dp_id,
                dp_port,
                vs_id,
                vs_port,
            } => {
                stream.write_u64::<NetworkEndian>(ct_id)?;
                stream.write_u64::<NetworkEndian>(dp_id)?;
                stream.write_u16::<NetworkEndian>(dp_port)?;
                stream.write_u64::<NetworkEndian>(vs_id)?;
                stream.write_u16::<NetworkEndian>(vs_port)
            }
            BusMessage::RouteMod(ref rm) => {
                stream.write_u8(rm.operation.into())?;
                stream.write_u64::<NetworkEndian>(rm.dp_id)?;
                tlv::write_list(&list_to_records(&rm.matches), stream)?;
                tlv::write_list(&list_to_records(&rm.actions), stream)?;
                tlv::write_list(&list_to_records(&rm.options), stream)
            }
        }
    }

    /// Serializes this message as one frame on the given stream
    pub fn serialize<S: Write>(&self, stream: &mut S) -> io::Result<()> {
        let mut body = vec![];
        self.serialize_body(&mut body)?;
        let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + body.len());
        frame.write_u8(self.typ() as u8)?;
        frame.write_u32::<NetworkEndian>(body.len() as u32)?;
        frame.extend_from_slice(&body);
        stream.write_all(&frame)
    }

    fn deserialize_body(typ: BusMessageType, body: &[u8]) -> io::Result<BusMessage> {
        let mut cursor = Cursor::new(body);
        let c = &mut cursor;
        let msg = match typ {
            BusMessageType::DatapathPortRegister => BusMessage::DatapathPortRegister {
                ct_id: c.read_u64::<NetworkEndian>()?,
                dp_id: c.read_u64::<NetworkEndian>()?,
                dp_port: c.read_u16::<NetworkEndian>()?,
            },
            BusMessageType::DatapathDown => BusMessage::DatapathDown {
                ct_id: c.read_u64::<NetworkEndian>()?,
                dp_id: c.read_u64::<NetworkEndian>()?,
            },
            BusMessageType::VirtualPlaneMap => BusMessage::VirtualPlaneMap {
                vm_id: c.read_u64::<NetworkEndian>()?,
                vm_port: c.read_u16::<NetworkEndian>()?,
                vs_id: c.read_u64::<NetworkEndian>()?,
                vs_port: c.read_u16::<NetworkEndian>()?,
            },
            BusMessageType::DataPlaneMap => BusMessage::DataPlaneMap {
                ct_id: c.read_u64::<NetworkEndian>()?,
                dp_id: c.read_u64::<NetworkEndian>()?,
                dp_port: c.read_u16::<NetworkEndian>()?,
                vs_id: c.read_u64::<NetworkEndian>()?,
                vs_port: c.read_u16::<NetworkEndian>()?,
            },
            BusMessageType::RouteMod => {
                let operation = RouteModType::from(c.read_u8()?);
                let dp_id = c.read_u64::<NetworkEndian>()?;
                let matches = records_to_list(&tlv::read_list(c));
                let actions = records_to_list(&tlv::read_list(c));
                let options = records_to_list(&tlv::read_list(c));
                BusMessage::RouteMod(RouteMod {
                    operation,
                    dp_id,
                    matches,
                    actions,
                    options,
                })
            }
        };
        Ok(msg)
    }

    /// Deserializes a body of the frame type `typ`
    pub fn deserialize(typ: u8, body: &[u8]) -> Result<BusMessage, Error> {
        let typ = BusMessageType::from_u8(typ).ok_or(Error::UnknownType(typ))?;
        BusMessage::deserialize_body(typ, body).map_err(|_| Error::BadBody(typ))
    }
}

/// Reads one frame from the stream.
/// After `Error::UnknownType` and `Error::BadBody` the stream
/// is positioned at the next frame.
pub fn read_frame<R: Read>(stream: &mut R) -> Result<BusMessage, Error> {
    let typ = stream.read_u8()?;
    let len = stream.read_u32::<NetworkEndian>()?;
    if len > MAX_BODY_LEN {
        return Err(Error::TooLong(len));
    }
    let mut body = vec![0; len as usize];
    stream.read_exact(&mut body)?;
    trace!("Incoming bus frame of type {}: {:?}", typ, body);
    BusMessage::deserialize(typ, &body)
}

/// The sending side of the message bus.
/// Sending is best-effort, failures are handled by the implementation.
pub trait MessageBus {
    fn send(&self, msg: BusMessage);
}

impl<T: MessageBus + ?Sized> MessageBus for Arc<T> {
    fn send(&self, msg: BusMessage) {
        (**self).send(msg)
    }
}

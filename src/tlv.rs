/*!
Type-length-value records, the unit of exchange for typed route fields
on the message bus.

A record owns its value and is immutable after construction.
On the bus a record is laid out as follows:

```text
+-----+------+--------+--------------+
| tag | kind | length | value        |
| u8  | u8   | u16 BE | length bytes |
+-----+------+--------+--------------+
```

`kind` tells how the value has to be read. Only byte blobs carry
TLV values; every other kind is rejected on decoding.
A list of records is prefixed by its record count (u16 BE).
*/

use byteorder::{ByteOrder, NetworkEndian, ReadBytesExt, WriteBytesExt};

use std::error;
use std::fmt;
use std::io;
use std::io::{Cursor, Read, Write};

/// The value kind of an opaque byte blob
pub const BINARY_KIND: u8 = 0;

/// Length of tag, kind and length fields in front of every value
const RECORD_HEADER_LEN: usize = 4;

/// A TLV whose bus representation cannot be decoded
#[derive(Debug, PartialEq)]
pub enum MalformedRecord {
    /// The record declares more bytes than are available
    Truncated { declared: usize, available: usize },
    /// The value is not a byte blob but of the contained kind
    NotBinary(u8),
}

impl fmt::Display for MalformedRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            MalformedRecord::Truncated { declared, available } => write!(
                f,
                "TLV record declares {} bytes, but only {} are available",
                declared, available
            ),
            MalformedRecord::NotBinary(kind) => {
                write!(f, "TLV value of kind {} is not a byte blob", kind)
            }
        }
    }
}

impl error::Error for MalformedRecord {
    fn description(&self) -> &str {
        "malformed TLV record"
    }
}

/// A generic TLV record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tlv {
    tag: u8,
    value: Vec<u8>,
}

impl Tlv {
    /// Constructs a record. An empty value is legal.
    pub fn new(tag: u8, value: Vec<u8>) -> Tlv {
        Tlv { tag, value }
    }

    /// Gets the type tag
    pub fn tag(&self) -> u8 {
        self.tag
    }

    /// Gets the value length in byte
    pub fn len(&self) -> usize {
        self.value.len()
    }

    /// Checks for an empty value
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Gets the value
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Serializes this record on the given stream
    pub fn serialize<S: Write>(&self, stream: &mut S) -> io::Result<()> {
        if self.value.len() > u16::max_value() as usize {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("TLV value of {} bytes is too long", self.value.len()),
            ));
        }
        stream.write_all(&[self.tag, BINARY_KIND])?;
        stream.write_u16::<NetworkEndian>(self.value.len() as u16)?;
        stream.write_all(&self.value)
    }

    /// Deserializes one record from the cursor's position.
    ///
    /// A value of a foreign kind is consumed before failing,
    /// so reading can go on with the next record.
    /// After a `MalformedRecord::Truncated` the cursor's position is undefined.
    pub fn deserialize(cursor: &mut Cursor<&[u8]>) -> Result<Tlv, MalformedRecord> {
        let available = remaining(cursor);
        if available < RECORD_HEADER_LEN {
            return Err(MalformedRecord::Truncated {
                declared: RECORD_HEADER_LEN,
                available,
            });
        }
        let mut header = [0; RECORD_HEADER_LEN];
        cursor.read_exact(&mut header).map_err(|_| MalformedRecord::Truncated {
            declared: RECORD_HEADER_LEN,
            available,
        })?;
        let tag = header[0];
        let kind = header[1];
        let length = NetworkEndian::read_u16(&header[2..]) as usize;

        let available = remaining(cursor);
        if length > available {
            return Err(MalformedRecord::Truncated {
                declared: length,
                available,
            });
        }
        let mut value = vec![0; length];
        cursor
            .read_exact(&mut value)
            .map_err(|_| MalformedRecord::Truncated {
                declared: length,
                available,
            })?;

        if kind != BINARY_KIND {
            return Err(MalformedRecord::NotBinary(kind));
        }
        Ok(Tlv { tag, value })
    }
}

fn remaining(cursor: &Cursor<&[u8]>) -> usize {
    let len = cursor.get_ref().len() as u64;
    len.saturating_sub(cursor.position()) as usize
}

/// Serializes a record list with its count prefix
pub fn write_list<S: Write>(records: &[Tlv], stream: &mut S) -> io::Result<()> {
    if records.len() > u16::max_value() as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} TLV records do not fit into one list", records.len()),
        ));
    }
    stream.write_u16::<NetworkEndian>(records.len() as u16)?;
    for rec in records {
        rec.serialize(stream)?;
    }
    Ok(())
}

/// Deserializes a record list with its count prefix.
///
/// Malformed records are dropped. A truncated record ends the list
/// and moves the cursor to the end of its buffer, because the
/// following bytes cannot be told apart from garbage.
pub fn read_list(cursor: &mut Cursor<&[u8]>) -> Vec<Tlv> {
    let count = match cursor.read_u16::<NetworkEndian>() {
        Ok(c) => c,
        Err(_) => {
            debug!("TLV list without record count");
            return vec![];
        }
    };

    let mut records = Vec::with_capacity(count as usize);
    for _ in 0..count {
        match Tlv::deserialize(cursor) {
            Ok(rec) => records.push(rec),
            Err(e @ MalformedRecord::NotBinary(_)) => debug!("Dropping TLV record: {}", e),
            Err(e) => {
                debug!("Dropping rest of TLV list: {}", e);
                let end = cursor.get_ref().len() as u64;
                cursor.set_position(end);
                break;
            }
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serialized(records: &[Tlv]) -> Vec<u8> {
        let mut buf = vec![];
        write_list(records, &mut buf).unwrap();
        buf
    }

    #[test]
    fn record_layout() {
        let mut ser = vec![];
        Tlv::new(3, vec![0xaa, 0xbb]).serialize(&mut ser).unwrap();
        assert_eq!(vec![3, 0, 0, 2, 0xaa, 0xbb], ser);
    }

    #[test]
    fn empty_value_is_legal() {
        let ser = serialized(&[Tlv::new(4, vec![])]);
        let mut cursor = Cursor::new(&ser[..]);
        let list = read_list(&mut cursor);
        assert_eq!(vec![Tlv::new(4, vec![])], list);
        assert!(list[0].is_empty());
    }

    #[test]
    fn foreign_kind_is_dropped() {
        let mut ser = serialized(&[Tlv::new(1, vec![1, 2]), Tlv::new(2, vec![3])]);
        // kind of the first record
        ser[3] = 0x10;
        let mut cursor = Cursor::new(&ser[..]);
        assert_eq!(vec![Tlv::new(2, vec![3])], read_list(&mut cursor));
    }

    #[test]
    fn truncated_record_ends_list() {
        let mut ser = serialized(&[Tlv::new(1, vec![1, 2]), Tlv::new(2, vec![3, 4, 5])]);
        ser.truncate(ser.len() - 1);
        let mut cursor = Cursor::new(&ser[..]);
        assert_eq!(vec![Tlv::new(1, vec![1, 2])], read_list(&mut cursor));
        assert_eq!(ser.len() as u64, cursor.position());
    }

    #[test]
    fn truncated_header() {
        let ser = [7, 0, 0];
        let mut cursor = Cursor::new(&ser[..]);
        let expected = MalformedRecord::Truncated {
            declared: 4,
            available: 3,
        };
        assert_eq!(expected, Tlv::deserialize(&mut cursor).unwrap_err());
    }

    #[test]
    fn missing_count() {
        let ser = [0];
        let mut cursor = Cursor::new(&ser[..]);
        assert!(read_list(&mut cursor).is_empty());
    }
}

/*!
The typed route fields carried as TLV records on the message bus.

Each family (`Match`, `Action`, `RouteOption`) is a closed set of variants
with a fixed value length per variant. Numeric values are kept in host
byte order in memory and converted to network byte order exactly once,
when a record is built, and back exactly once, when a record is read.
*/

pub mod actions;
pub mod matches;
pub mod options;

pub use self::actions::Action;
pub use self::matches::Match;
pub use self::options::RouteOption;

use tlv::Tlv;

use std::error;
use std::fmt;

/// A 48-bit Ethernet address
pub type MacAddr = [u8; 6];

/// Length of an Ethernet address in byte
pub const ETH_ALEN: usize = 6;

/// Represents all errors that can occur while
/// interpreting a TLV record as a typed route field
#[derive(Debug, PartialEq)]
pub enum DecodeError {
    /// The tag does not name a variant of the family
    UnknownType(u8),
    /// The value length differs from the variant's canonical length
    BadLength {
        tag: u8,
        expected: usize,
        actual: usize,
    },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            DecodeError::UnknownType(tag) => write!(f, "Unknown TLV type {}", tag),
            DecodeError::BadLength {
                tag,
                expected,
                actual,
            } => write!(
                f,
                "TLV type {} needs a value of {} bytes, got {}",
                tag, expected, actual
            ),
        }
    }
}

impl error::Error for DecodeError {
    fn description(&self) -> &str {
        "TLV decoding error"
    }
}

/// A family of typed values that is exchanged as TLV records
pub trait TypedTlv: Sized {
    /// Builds the record, numeric values in network byte order
    fn to_tlv(&self) -> Tlv;

    /// Interprets a record, validating its tag and value length
    fn from_tlv(tlv: &Tlv) -> Result<Self, DecodeError>;

    /// A name for diagnostics
    fn human_name(&self) -> &'static str;
}

/// Fails if the record's value does not have the `expected` length
fn check_length(tlv: &Tlv, expected: usize) -> Result<(), DecodeError> {
    if tlv.len() != expected {
        return Err(DecodeError::BadLength {
            tag: tlv.tag(),
            expected,
            actual: tlv.len(),
        });
    }
    Ok(())
}

fn mac_from_slice(bytes: &[u8]) -> MacAddr {
    let mut mac = [0; ETH_ALEN];
    mac.copy_from_slice(&bytes[..ETH_ALEN]);
    mac
}

/// Converts an ordered list of typed values to records
pub fn list_to_records<T: TypedTlv>(list: &[T]) -> Vec<Tlv> {
    list.iter().map(TypedTlv::to_tlv).collect()
}

/// Converts an ordered list of records to typed values.
/// Records that cannot be interpreted are dropped, so
/// the result may be shorter than `records`.
pub fn records_to_list<T: TypedTlv>(records: &[Tlv]) -> Vec<T> {
    let mut list = Vec::with_capacity(records.len());
    for rec in records {
        match T::from_tlv(rec) {
            Ok(item) => list.push(item),
            Err(e) => debug!("Dropping TLV record: {}", e),
        }
    }
    list
}

/// The operation requested by a RouteMod
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteModType {
    /// Install a flow
    Add,
    /// Remove a flow
    Delete,
    /// Anything else, kept for diagnostics
    Unsupported(u8),
}

impl From<u8> for RouteModType {
    fn from(t: u8) -> Self {
        match t {
            0 => RouteModType::Add,
            1 => RouteModType::Delete,
            t => RouteModType::Unsupported(t),
        }
    }
}

impl From<RouteModType> for u8 {
    fn from(t: RouteModType) -> u8 {
        match t {
            RouteModType::Add => 0,
            RouteModType::Delete => 1,
            RouteModType::Unsupported(t) => t,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_drops_malformed_records() {
        let records = vec![
            Tlv::new(3, vec![0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]),
            Tlv::new(3, vec![0xaa]),
            Tlv::new(99, vec![]),
            Tlv::new(4, vec![0, 0, 0, 16]),
        ];
        let list: Vec<Match> = records_to_list(&records);
        assert_eq!(
            vec![
                Match::Ethernet([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]),
                Match::Mpls(16),
            ],
            list
        );
    }

    #[test]
    fn batch_keeps_order() {
        let actions = vec![
            Action::SetEthDst([1, 2, 3, 4, 5, 6]),
            Action::PopMpls,
            Action::Output(2),
        ];
        let records = list_to_records(&actions);
        assert_eq!(vec![2, 4, 0], records.iter().map(Tlv::tag).collect::<Vec<_>>());
        assert_eq!(actions, records_to_list::<Action>(&records));
    }

    #[test]
    fn route_mod_type_from_u8() {
        assert_eq!(RouteModType::Add, RouteModType::from(0));
        assert_eq!(RouteModType::Delete, RouteModType::from(1));
        assert_eq!(RouteModType::Unsupported(7), RouteModType::from(7));
        assert_eq!(7u8, u8::from(RouteModType::Unsupported(7)));
    }
}

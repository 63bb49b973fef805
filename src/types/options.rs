use byteorder::{ByteOrder, NetworkEndian};
use tlv::Tlv;
use types::{check_length, DecodeError, TypedTlv};

/// Tags of the route option family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionType {
    /// Route priority
    Priority = 1,
    /// Drop route after the specified idle time
    IdleTimeout = 2,
    /// Drop route after the specified time has passed
    HardTimeout = 3,
    /// Controller the route is destined for
    ControllerId = 255,
}

impl OptionType {
    /// Looks up the variant for a record tag
    pub fn from_tag(tag: u8) -> Option<OptionType> {
        match tag {
            1 => Some(OptionType::Priority),
            2 => Some(OptionType::IdleTimeout),
            3 => Some(OptionType::HardTimeout),
            255 => Some(OptionType::ControllerId),
            _ => None,
        }
    }

    /// The canonical value length in byte
    pub fn length(self) -> usize {
        match self {
            OptionType::Priority | OptionType::IdleTimeout | OptionType::HardTimeout => 2,
            OptionType::ControllerId => 8,
        }
    }
}

/// A modifier of how a route is installed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOption {
    /// Flow priority
    Priority(u16),
    /// Idle timeout in seconds
    IdleTimeout(u16),
    /// Hard timeout in seconds
    HardTimeout(u16),
    /// Destination controller
    ControllerId(u64),
}

impl RouteOption {
    /// Gets the variant's tag
    pub fn typ(&self) -> OptionType {
        match *self {
            RouteOption::Priority(_) => OptionType::Priority,
            RouteOption::IdleTimeout(_) => OptionType::IdleTimeout,
            RouteOption::HardTimeout(_) => OptionType::HardTimeout,
            RouteOption::ControllerId(_) => OptionType::ControllerId,
        }
    }
}

impl TypedTlv for RouteOption {
    fn to_tlv(&self) -> Tlv {
        let mut value = vec![0; self.typ().length()];
        match *self {
            RouteOption::Priority(n)
            | RouteOption::IdleTimeout(n)
            | RouteOption::HardTimeout(n) => NetworkEndian::write_u16(&mut value, n),
            RouteOption::ControllerId(id) => NetworkEndian::write_u64(&mut value, id),
        }
        Tlv::new(self.typ() as u8, value)
    }

    fn from_tlv(tlv: &Tlv) -> Result<Self, DecodeError> {
        let typ = OptionType::from_tag(tlv.tag()).ok_or(DecodeError::UnknownType(tlv.tag()))?;
        check_length(tlv, typ.length())?;

        let v = tlv.value();
        Ok(match typ {
            OptionType::Priority => RouteOption::Priority(NetworkEndian::read_u16(v)),
            OptionType::IdleTimeout => RouteOption::IdleTimeout(NetworkEndian::read_u16(v)),
            OptionType::HardTimeout => RouteOption::HardTimeout(NetworkEndian::read_u16(v)),
            OptionType::ControllerId => RouteOption::ControllerId(NetworkEndian::read_u64(v)),
        })
    }

    fn human_name(&self) -> &'static str {
        match *self {
            RouteOption::Priority(_) => "Priority",
            RouteOption::IdleTimeout(_) => "IdleTimeout",
            RouteOption::HardTimeout(_) => "HardTimeout",
            RouteOption::ControllerId(_) => "ControllerId",
        }
    }
}

use byteorder::{ByteOrder, NetworkEndian};
use ipnetwork::{Ipv4Network, Ipv6Network};
use tlv::Tlv;
use types::{check_length, mac_from_slice, DecodeError, MacAddr, TypedTlv, ETH_ALEN};

use std::net::{Ipv4Addr, Ipv6Addr};

/// Tags of the match family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    /// IPv4 destination
    Ipv4 = 1,
    /// IPv6 destination
    Ipv6 = 2,
    /// Ethernet destination
    Ethernet = 3,
    /// Incoming MPLS label
    Mpls = 4,
}

impl MatchType {
    /// Looks up the variant for a record tag
    pub fn from_tag(tag: u8) -> Option<MatchType> {
        match tag {
            1 => Some(MatchType::Ipv4),
            2 => Some(MatchType::Ipv6),
            3 => Some(MatchType::Ethernet),
            4 => Some(MatchType::Mpls),
            _ => None,
        }
    }

    /// The canonical value length in byte
    pub fn length(self) -> usize {
        match self {
            MatchType::Ipv4 => 8,
            MatchType::Ipv6 => 32,
            MatchType::Ethernet => ETH_ALEN,
            MatchType::Mpls => 4,
        }
    }
}

/// A field of a packet that a route matches on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Match {
    /// IPv4 destination subnet
    Ipv4 { addr: Ipv4Addr, mask: Ipv4Addr },
    /// IPv6 destination subnet
    Ipv6 { addr: Ipv6Addr, mask: Ipv6Addr },
    /// Ethernet destination
    Ethernet(MacAddr),
    /// Incoming MPLS label
    Mpls(u32),
}

impl Match {
    /// Gets the variant's tag
    pub fn typ(&self) -> MatchType {
        match *self {
            Match::Ipv4 { .. } => MatchType::Ipv4,
            Match::Ipv6 { .. } => MatchType::Ipv6,
            Match::Ethernet(_) => MatchType::Ethernet,
            Match::Mpls(_) => MatchType::Mpls,
        }
    }
}

impl From<Ipv4Network> for Match {
    fn from(net: Ipv4Network) -> Self {
        Match::Ipv4 {
            addr: net.network(),
            mask: net.mask(),
        }
    }
}

impl From<Ipv6Network> for Match {
    fn from(net: Ipv6Network) -> Self {
        Match::Ipv6 {
            addr: net.network(),
            mask: net.mask(),
        }
    }
}

impl TypedTlv for Match {
    fn to_tlv(&self) -> Tlv {
        let mut value = Vec::with_capacity(self.typ().length());
        match *self {
            Match::Ipv4 { addr, mask } => {
                value.extend_from_slice(&addr.octets());
                value.extend_from_slice(&mask.octets());
            }
            Match::Ipv6 { addr, mask } => {
                value.extend_from_slice(&addr.octets());
                value.extend_from_slice(&mask.octets());
            }
            Match::Ethernet(ref mac) => value.extend_from_slice(mac),
            Match::Mpls(label) => {
                value.resize(4, 0);
                NetworkEndian::write_u32(&mut value, label);
            }
        }
        Tlv::new(self.typ() as u8, value)
    }

    fn from_tlv(tlv: &Tlv) -> Result<Self, DecodeError> {
        let typ = MatchType::from_tag(tlv.tag()).ok_or(DecodeError::UnknownType(tlv.tag()))?;
        check_length(tlv, typ.length())?;

        let v = tlv.value();
        Ok(match typ {
            MatchType::Ipv4 => Match::Ipv4 {
                addr: Ipv4Addr::new(v[0], v[1], v[2], v[3]),
                mask: Ipv4Addr::new(v[4], v[5], v[6], v[7]),
            },
            MatchType::Ipv6 => {
                let mut addr = [0; 16];
                let mut mask = [0; 16];
                addr.copy_from_slice(&v[..16]);
                mask.copy_from_slice(&v[16..]);
                Match::Ipv6 {
                    addr: Ipv6Addr::from(addr),
                    mask: Ipv6Addr::from(mask),
                }
            }
            MatchType::Ethernet => Match::Ethernet(mac_from_slice(v)),
            MatchType::Mpls => Match::Mpls(NetworkEndian::read_u32(v)),
        })
    }

    fn human_name(&self) -> &'static str {
        match *self {
            Match::Ipv4 { .. } => "IPv4",
            Match::Ipv6 { .. } => "IPv6",
            Match::Ethernet(_) => "Ethernet",
            Match::Mpls(_) => "MPLS",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn round_trip(m: Match) {
        let tlv = m.to_tlv();
        assert_eq!(m.typ().length(), tlv.len());
        let decoded = Match::from_tlv(&tlv).unwrap();
        assert_eq!(m, decoded);
        // normalization must be applied exactly once per direction
        assert_eq!(tlv, decoded.to_tlv());
    }

    #[test]
    fn round_trips() {
        round_trip(Match::Ipv4 {
            addr: Ipv4Addr::new(0, 0, 0, 0),
            mask: Ipv4Addr::new(255, 255, 255, 255),
        });
        round_trip(Match::Ipv4 {
            addr: Ipv4Addr::new(255, 255, 255, 255),
            mask: Ipv4Addr::new(0, 0, 0, 0),
        });
        round_trip(Match::from(Ipv4Network::from_str("10.0.0.0/24").unwrap()));
        round_trip(Match::from(Ipv6Network::from_str("2001:db8::/32").unwrap()));
        round_trip(Match::Ipv6 {
            addr: Ipv6Addr::from([0; 16]),
            mask: Ipv6Addr::from([0xff; 16]),
        });
        round_trip(Match::Ipv6 {
            addr: Ipv6Addr::from([0xff; 16]),
            mask: Ipv6Addr::from([0; 16]),
        });
        round_trip(Match::Ethernet([0; 6]));
        round_trip(Match::Ethernet([0xff; 6]));
        round_trip(Match::Mpls(0));
        round_trip(Match::Mpls((1 << 24) - 1));
    }

    #[test]
    fn ipv4_layout() {
        let m = Match::from(Ipv4Network::from_str("192.0.2.0/24").unwrap());
        let tlv = m.to_tlv();
        assert_eq!(1, tlv.tag());
        assert_eq!(&[192, 0, 2, 0, 255, 255, 255, 0], tlv.value());
    }

    #[test]
    fn mpls_is_network_byte_order() {
        let tlv = Match::Mpls(0x0001_0203).to_tlv();
        assert_eq!(&[0, 1, 2, 3], tlv.value());
    }

    #[test]
    fn wrong_lengths() {
        for tag in 1..5 {
            let typ = MatchType::from_tag(tag).unwrap();
            for &len in &[0, typ.length() - 1, typ.length() + 1] {
                let tlv = Tlv::new(tag, vec![0; len]);
                let expected = DecodeError::BadLength {
                    tag,
                    expected: typ.length(),
                    actual: len,
                };
                assert_eq!(expected, Match::from_tlv(&tlv).unwrap_err());
            }
        }
    }

    #[test]
    fn unknown_tags() {
        for &tag in &[0, 5, 254, 255] {
            let tlv = Tlv::new(tag, vec![0; 4]);
            assert_eq!(DecodeError::UnknownType(tag), Match::from_tlv(&tlv).unwrap_err());
        }
    }
}

use byteorder::{ByteOrder, NetworkEndian};
use tlv::Tlv;
use types::{check_length, mac_from_slice, DecodeError, MacAddr, TypedTlv, ETH_ALEN};

/// Tags of the action family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionType {
    /// Output port
    Output = 0,
    /// Ethernet source address
    SetEthSrc = 1,
    /// Ethernet destination address
    SetEthDst = 2,
    /// Push MPLS label
    PushMpls = 3,
    /// Pop MPLS label
    PopMpls = 4,
    /// Swap MPLS label
    SwapMpls = 5,
}

impl ActionType {
    /// Looks up the variant for a record tag
    pub fn from_tag(tag: u8) -> Option<ActionType> {
        match tag {
            0 => Some(ActionType::Output),
            1 => Some(ActionType::SetEthSrc),
            2 => Some(ActionType::SetEthDst),
            3 => Some(ActionType::PushMpls),
            4 => Some(ActionType::PopMpls),
            5 => Some(ActionType::SwapMpls),
            _ => None,
        }
    }

    /// The canonical value length in byte
    pub fn length(self) -> usize {
        match self {
            ActionType::Output | ActionType::PushMpls | ActionType::SwapMpls => 4,
            ActionType::SetEthSrc | ActionType::SetEthDst => ETH_ALEN,
            ActionType::PopMpls => 0,
        }
    }
}

/// Something a route does with a matched packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Output to the numbered port
    Output(u32),
    /// Rewrite the Ethernet source
    SetEthSrc(MacAddr),
    /// Rewrite the Ethernet destination
    SetEthDst(MacAddr),
    /// Push an MPLS label
    PushMpls(u32),
    /// Remove the outermost MPLS label
    PopMpls,
    /// Replace the outermost MPLS label
    SwapMpls(u32),
}

impl Action {
    /// Gets the variant's tag
    pub fn typ(&self) -> ActionType {
        match *self {
            Action::Output(_) => ActionType::Output,
            Action::SetEthSrc(_) => ActionType::SetEthSrc,
            Action::SetEthDst(_) => ActionType::SetEthDst,
            Action::PushMpls(_) => ActionType::PushMpls,
            Action::PopMpls => ActionType::PopMpls,
            Action::SwapMpls(_) => ActionType::SwapMpls,
        }
    }
}

impl TypedTlv for Action {
    fn to_tlv(&self) -> Tlv {
        let mut value = vec![0; self.typ().length()];
        match *self {
            Action::Output(n) | Action::PushMpls(n) | Action::SwapMpls(n) => {
                NetworkEndian::write_u32(&mut value, n)
            }
            Action::SetEthSrc(ref mac) | Action::SetEthDst(ref mac) => {
                value.copy_from_slice(mac)
            }
            Action::PopMpls => {}
        }
        Tlv::new(self.typ() as u8, value)
    }

    fn from_tlv(tlv: &Tlv) -> Result<Self, DecodeError> {
        let typ = ActionType::from_tag(tlv.tag()).ok_or(DecodeError::UnknownType(tlv.tag()))?;
        check_length(tlv, typ.length())?;

        let v = tlv.value();
        Ok(match typ {
            ActionType::Output => Action::Output(NetworkEndian::read_u32(v)),
            ActionType::SetEthSrc => Action::SetEthSrc(mac_from_slice(v)),
            ActionType::SetEthDst => Action::SetEthDst(mac_from_slice(v)),
            ActionType::PushMpls => Action::PushMpls(NetworkEndian::read_u32(v)),
            ActionType::PopMpls => Action::PopMpls,
            ActionType::SwapMpls => Action::SwapMpls(NetworkEndian::read_u32(v)),
        })
    }

    fn human_name(&self) -> &'static str {
        match *self {
            Action::Output(_) => "Output",
            Action::SetEthSrc(_) => "SetEthSrc",
            Action::SetEthDst(_) => "SetEthDst",
            Action::PushMpls(_) => "PushMpls",
            Action::PopMpls => "PopMpls",
            Action::SwapMpls(_) => "SwapMpls",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(a: Action) {
        let tlv = a.to_tlv();
        let decoded = Action::from_tlv(&tlv).unwrap();
        assert_eq!(a, decoded);
        assert_eq!(tlv, decoded.to_tlv());
    }

    #[test]
    fn round_trips() {
        round_trip(Action::Output(0));
        round_trip(Action::Output(65535));
        round_trip(Action::Output(u32::max_value()));
        round_trip(Action::SetEthSrc([0; 6]));
        round_trip(Action::SetEthSrc([0xff; 6]));
        round_trip(Action::SetEthDst([0; 6]));
        round_trip(Action::SetEthDst([0xff; 6]));
        round_trip(Action::PushMpls(0));
        round_trip(Action::SwapMpls((1 << 24) - 1));
        round_trip(Action::PopMpls);
    }

    #[test]
    fn output_is_big_endian() {
        let tlv = Action::Output(5).to_tlv();
        assert_eq!(0, tlv.tag());
        assert_eq!(&[0, 0, 0, 5], tlv.value());
    }

    #[test]
    fn pop_mpls_has_no_value() {
        let tlv = Action::PopMpls.to_tlv();
        assert!(tlv.is_empty());
        let bad = Tlv::new(4, vec![0]);
        let expected = DecodeError::BadLength {
            tag: 4,
            expected: 0,
            actual: 1,
        };
        assert_eq!(expected, Action::from_tlv(&bad).unwrap_err());
    }

    #[test]
    fn wrong_lengths() {
        for tag in 0..6 {
            let typ = ActionType::from_tag(tag).unwrap();
            let len = typ.length() + 2;
            let tlv = Tlv::new(tag, vec![0; len]);
            let expected = DecodeError::BadLength {
                tag,
                expected: typ.length(),
                actual: len,
            };
            assert_eq!(expected, Action::from_tlv(&tlv).unwrap_err());
            if typ.length() > 0 {
                let short = Tlv::new(tag, vec![0; typ.length() - 1]);
                assert!(Action::from_tlv(&short).is_err());
            }
        }
    }

    #[test]
    fn unknown_tag() {
        let tlv = Tlv::new(6, vec![]);
        assert_eq!(DecodeError::UnknownType(6), Action::from_tlv(&tlv).unwrap_err());
    }
}

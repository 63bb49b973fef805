/*!
Construction of OpenFlow 1.0 flow mods from typed route fields

In OpenFlow 1.0 the match is a fixed structure, so a flow mod has
a fixed size of 72 bytes plus the concatenated actions. The wildcards
of the match select which of its fields are meaningful.

A flow mod is built in one zero-filled buffer that only leaves
this module when every match, action, option and the operation
could be expressed in OpenFlow 1.0.
*/

use byteorder::{ByteOrder, NetworkEndian};
use ipnetwork::ipv4_mask_to_prefix;
use openflow::messages::wildcards::*;
use openflow::messages::*;
use types::{Action, Match, RouteModType, RouteOption, TypedTlv};

use std::error;
use std::fmt;
use std::net::Ipv4Addr;

/* Byte offsets in an ofp_flow_mod */
const LENGTH: usize = 2;
const WILDCARDS: usize = 8;
const DL_DST: usize = 20;
const DL_TYPE: usize = 30;
const NW_DST: usize = 40;
const COMMAND: usize = 56;
const IDLE_TIMEOUT: usize = 58;
const HARD_TIMEOUT: usize = 60;
const PRIORITY: usize = 62;
const BUFFER_ID: usize = 64;
const OUT_PORT: usize = 68;

/// Max bytes of a packet that an output to the controller sends along
const CONTROLLER_MAX_LEN: u16 = 0xffff;

/// A route field or operation that OpenFlow 1.0 cannot express
#[derive(Debug, PartialEq)]
pub enum UnsupportedFeature {
    /// A match kind without representation in the fixed match structure
    Match(&'static str),
    /// An IPv4 mask whose one-bits are not contiguous
    Netmask(Ipv4Addr),
    /// An action kind without OpenFlow 1.0 action
    Action(&'static str),
    /// An output port beyond the 16-bit port numbers
    OutputPort(u32),
    /// A RouteMod operation other than add or delete
    Operation(u8),
    /// The actions do not fit into one message
    MessageLength(usize),
}

impl fmt::Display for UnsupportedFeature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            UnsupportedFeature::Match(name) => {
                write!(f, "{} matches are not supported by OpenFlow 1.0", name)
            }
            UnsupportedFeature::Netmask(mask) => {
                write!(f, "The netmask {} has no CIDR prefix length", mask)
            }
            UnsupportedFeature::Action(name) => {
                write!(f, "{} actions are not supported by OpenFlow 1.0", name)
            }
            UnsupportedFeature::OutputPort(port) => {
                write!(f, "Output port {} is not an OpenFlow 1.0 port", port)
            }
            UnsupportedFeature::Operation(op) => write!(f, "Unrecognised RouteMod type {}", op),
            UnsupportedFeature::MessageLength(len) => {
                write!(f, "A flow mod of {} bytes exceeds the OpenFlow message size", len)
            }
        }
    }
}

impl error::Error for UnsupportedFeature {
    fn description(&self) -> &str {
        "unsupported OpenFlow 1.0 feature"
    }
}

type Result<T> = ::std::result::Result<T, UnsupportedFeature>;

/// Converts a full IPv4 mask, e.g. 255.255.255.0, to its CIDR prefix length
pub fn mask_to_prefix_len(mask: Ipv4Addr) -> Result<u8> {
    ipv4_mask_to_prefix(mask).map_err(|_| UnsupportedFeature::Netmask(mask))
}

/// Converts a CIDR prefix length to the OpenFlow 1.0 wildcard bit count
/// at the wildcard field position `shift` (`OFPFW_NW_*_SHIFT`).
/// The bit count is the number of ignored low-order address bits.
pub fn cidr_to_wildcard_bits(prefix_len: u8, shift: u32) -> u32 {
    let prefix_len = u32::from(prefix_len).min(32);
    (32 - prefix_len) << shift
}

/// The size of an action in an OpenFlow 1.0 message
pub fn action_wire_len(action: &Action) -> Result<usize> {
    match *action {
        Action::Output(_) => Ok(OFP_ACTION_OUTPUT_LEN),
        Action::SetEthSrc(_) | Action::SetEthDst(_) => Ok(OFP_ACTION_DL_ADDR_LEN),
        Action::PushMpls(_) | Action::PopMpls | Action::SwapMpls(_) => {
            Err(UnsupportedFeature::Action(action.human_name()))
        }
    }
}

fn read_u32(buf: &[u8], ofs: usize) -> u32 {
    NetworkEndian::read_u32(&buf[ofs..ofs + 4])
}

fn write_u16(buf: &mut [u8], ofs: usize, val: u16) {
    NetworkEndian::write_u16(&mut buf[ofs..ofs + 2], val);
}

fn write_u32(buf: &mut [u8], ofs: usize, val: u32) {
    NetworkEndian::write_u32(&mut buf[ofs..ofs + 4], val);
}

/// Clears the wildcard bits in `clear`, then sets the ones in `set`
fn update_wildcards(buf: &mut [u8], clear: u32, set: u32) {
    let wildcards = (read_u32(buf, WILDCARDS) & !clear) | set;
    write_u32(buf, WILDCARDS, wildcards);
}

fn add_match(buf: &mut [u8], mat: &Match) -> Result<()> {
    match *mat {
        Match::Ipv4 { addr, mask } => {
            // network layer fields are only evaluated for IPv4 frames
            let bits = cidr_to_wildcard_bits(mask_to_prefix_len(mask)?, OFPFW_NW_DST_SHIFT);
            update_wildcards(buf, OFPFW_DL_TYPE | OFPFW_NW_DST_MASK, bits);
            write_u16(buf, DL_TYPE, ETH_TYPE_IP);
            buf[NW_DST..NW_DST + 4].copy_from_slice(&addr.octets());
        }
        Match::Ethernet(ref mac) => {
            update_wildcards(buf, OFPFW_DL_DST, 0);
            buf[DL_DST..DL_DST + OFP_ETH_ALEN].copy_from_slice(mac);
        }
        Match::Ipv6 { .. } | Match::Mpls(_) => {
            return Err(UnsupportedFeature::Match(mat.human_name()));
        }
    }
    Ok(())
}

/// Writes the action into the zero-filled `slot` and returns its size
fn add_action(slot: &mut [u8], action: &Action) -> Result<usize> {
    let len = action_wire_len(action)?;
    let typ = match *action {
        Action::Output(port) => {
            if port > u32::from(OFPP_NONE) {
                return Err(UnsupportedFeature::OutputPort(port));
            }
            let port = port as u16;
            write_u16(slot, OFP_ACTION_HEADER_LEN, port);
            if port == OFPP_CONTROLLER {
                write_u16(slot, OFP_ACTION_HEADER_LEN + 2, CONTROLLER_MAX_LEN);
            }
            OfpActionType::Output
        }
        Action::SetEthSrc(ref mac) => {
            slot[OFP_ACTION_HEADER_LEN..][..OFP_ETH_ALEN].copy_from_slice(mac);
            OfpActionType::SetDlSrc
        }
        Action::SetEthDst(ref mac) => {
            slot[OFP_ACTION_HEADER_LEN..][..OFP_ETH_ALEN].copy_from_slice(mac);
            OfpActionType::SetDlDst
        }
        Action::PushMpls(_) | Action::PopMpls | Action::SwapMpls(_) => {
            return Err(UnsupportedFeature::Action(action.human_name()));
        }
    };
    write_u16(slot, 0, typ as u16);
    write_u16(slot, 2, len as u16);
    Ok(len)
}

fn set_command(buf: &mut [u8], op: RouteModType) -> Result<()> {
    let command = match op {
        RouteModType::Add => OfpFlowModCommand::Add,
        RouteModType::Delete => OfpFlowModCommand::DeleteStrict,
        RouteModType::Unsupported(t) => return Err(UnsupportedFeature::Operation(t)),
    };
    write_u16(buf, COMMAND, command as u16);
    write_u32(buf, BUFFER_ID, OFP_NO_BUFFER);
    write_u16(buf, IDLE_TIMEOUT, OFP_FLOW_PERMANENT);
    write_u16(buf, HARD_TIMEOUT, OFP_FLOW_PERMANENT);
    write_u16(buf, OUT_PORT, OFPP_NONE);
    Ok(())
}

fn apply_option(buf: &mut [u8], opt: &RouteOption) {
    match *opt {
        RouteOption::Priority(prio) => write_u16(buf, PRIORITY, prio),
        RouteOption::IdleTimeout(secs) => write_u16(buf, IDLE_TIMEOUT, secs),
        RouteOption::HardTimeout(secs) => write_u16(buf, HARD_TIMEOUT, secs),
        RouteOption::ControllerId(_) => {}
    }
}

/// Builds a flow mod for `op` with the given matches and actions.
/// The transaction id is left 0.
pub fn build_flow_mod(op: RouteModType, matches: &[Match], actions: &[Action]) -> Result<Vec<u8>> {
    build_flow_mod_with_options(op, matches, actions, &[])
}

/// Builds a flow mod like `build_flow_mod` and applies the options
/// on top of the command's defaults.
pub fn build_flow_mod_with_options(
    op: RouteModType,
    matches: &[Match],
    actions: &[Action],
    options: &[RouteOption],
) -> Result<Vec<u8>> {
    let mut size = OFP_FLOW_MOD_LEN;
    for action in actions {
        size += action_wire_len(action)?;
    }
    if size > u16::max_value() as usize {
        return Err(UnsupportedFeature::MessageLength(size));
    }

    let mut buf = vec![0; size];
    buf[0] = OFP_VERSION;
    buf[1] = OfpType::FlowMod as u8;
    write_u16(&mut buf, LENGTH, size as u16);

    // match nothing by default
    write_u32(&mut buf, WILDCARDS, OFPFW_ALL);
    for mat in matches {
        if let Err(e) = add_match(&mut buf, mat) {
            debug!("Could not serialise Match {:?}", mat);
            return Err(e);
        }
    }

    let mut cursor = OFP_FLOW_MOD_LEN;
    for action in actions {
        match add_action(&mut buf[cursor..], action) {
            Ok(len) => cursor += len,
            Err(e) => {
                debug!("Could not serialise Action {:?}", action);
                return Err(e);
            }
        }
    }

    set_command(&mut buf, op)?;
    write_u16(&mut buf, PRIORITY, OFP_DEFAULT_PRIORITY);
    for opt in options {
        apply_option(&mut buf, opt);
    }

    trace!("Built flow mod of {} bytes: {:?}", size, buf);
    Ok(buf)
}

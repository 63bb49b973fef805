/*!
All the base OpenFlow 1.0 message primitives needed to proxy between datapaths

This is based on the openflow.h from OpenFlow Switch Specification 1.0.0.
The type names are changed to align with the Rust conventions.
*/

pub mod deserialize;
pub mod serialize;

use std::fmt;

impl OfpErrorMsg {
    fn first_64_bytes(header: &[u8], body: &[u8]) -> Vec<u8> {
        let mut buf = vec![];
        buf.extend_from_slice(header);
        let target_length = 64 - header.len();
        let shrunk_body = if body.len() < target_length {
            body
        }
        else {
            &body[0..target_length]
        };
        buf.extend_from_slice(shrunk_body);
        buf
    }

    /// Constructs a Hello Failed error
    pub fn new_hello_failed() -> OfpErrorMsg {
        OfpErrorMsg {
            typ: OfpErrorType::HelloFailed as u16,
            code: OfpHelloFailedCode::Incompatible as u16,
            data: vec![],
        }
    }

    /// Constructs a Bad Request error
    pub fn new_bad_request(code: OfpBadRequestCode, header: &[u8], body: &[u8]) -> OfpErrorMsg {
        OfpErrorMsg {
            typ: OfpErrorType::BadRequest as u16,
            code: code as u16,
            data: Self::first_64_bytes(header, body),
        }
    }

    /// Checks if this `OfpErrorMsg` describes a rejected flow mod
    pub fn check_flow_mod_failed(&self) -> bool {
        self.typ == OfpErrorType::FlowModFailed as u16
    }
}

impl fmt::Display for OfpErrorMsg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let typ = match self.typ {
            0 => OfpErrorType::HelloFailed,
            1 => OfpErrorType::BadRequest,
            2 => OfpErrorType::BadAction,
            3 => OfpErrorType::FlowModFailed,
            4 => OfpErrorType::PortModFailed,
            5 => OfpErrorType::QueueOpFailed,
            _ => return write!(f, "OpenFlow Error: type({}), code({})", self.typ, self.code),
        };
        write!(f, "OpenFlow Error: {:?}, code({})", typ, self.code)
    }
}

/* Some getters */

impl OfpHeader {
    /// Gets the packet's OpenFlow version
    pub fn version(&self) -> u8 {
        self.version
    }
    /// Gets this packet's `OfpType`'s numerical respresentation.
    pub fn typ(&self) -> u8 {
        self.typ
    }
    /// Gets the packet's transaction id
    pub fn xid(&self) -> u32 {
        self.xid
    }
}
impl OfpSwitchFeatures {
    /// Gets the datapath unique ID
    pub fn datapath_id(&self) -> u64 {
        self.datapath_id
    }
    /// Gets the physical ports
    pub fn ports(&self) -> &[OfpPhyPort] {
        &self.ports
    }
}
impl OfpPhyPort {
    /// Gets the port number
    pub fn port_no(&self) -> u16 {
        self.port_no
    }
    /// Gets the port's name
    pub fn name(&self) -> &str {
        &self.name
    }
}
impl OfpPacketIn {
    /// Gets the buffer ID assigned by the datapath, if it buffered the packet
    pub fn buffer_id(&self) -> Option<u32> {
        if self.buffer_id == OFP_NO_BUFFER {
            None
        }
        else {
            Some(self.buffer_id)
        }
    }
    /// Gets the port on which the frame was received
    pub fn in_port(&self) -> u16 {
        self.in_port
    }
    /// Gets the full length of the frame
    pub fn total_len(&self) -> u16 {
        self.total_len
    }
    /// Gets the frame
    pub fn data(self) -> Vec<u8> {
        self.data
    }
}
impl OfpEchoRequest {
    /// Gets the message's content
    pub fn arbitrary(self) -> Vec<u8> {
        self.arbitrary
    }
}

/// An OpenFlow Echo Request
#[derive(Debug)]
pub struct OfpEchoRequest {
    arbitrary: Vec<u8>,
}

/// An OpenFlow Echo Reply
#[derive(Debug)]
pub struct OfpEchoReply {
    arbitrary: Vec<u8>,
}

/* Copyright (c) 2008 The Board of Trustees of The Leland Stanford Junior University
 *
 * We are making the OpenFlow specification and associated documentation
 * (Software) available for public use and benefit with the expectation
 * that others will use, modify and enhance the Software and contribute
 * those enhancements back to the community. However, since we would
 * like to make the Software available for broadest use, with as few
 * restrictions as possible permission is hereby granted, free of
 * charge, to any person obtaining a copy of this Software to deal in
 * the Software under the copyrights without restriction, including
 * without limitation the rights to use, copy, modify, merge, publish,
 * distribute, sublicense, and/or sell copies of the Software, and to
 * permit persons to whom the Software is furnished to do so, subject to
 * the following conditions:
 *
 * The above copyright notice and this permission notice shall be
 * included in all copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
 * EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
 * MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
 * NONINFRINGEMENT.  IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS
 * BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN
 * ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
 * CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 *
 * The name and trademarks of copyright holder(s) may NOT be used in
 * advertising or publicity pertaining to the Software or any
 * derivatives without specific, written prior permission.
 */

/// Version number:
/// Non-experimental versions released: 0x01.
///
/// The most significant bit in the version field is reserved and must be set to zero.
pub const OFP_VERSION: u8 = 0x01;

/// Official IANA registered port for OpenFlow.
pub const OFP_TCP_PORT: u16 = 6633;

/// Maximum number of physical switch ports.
pub const OFPP_MAX: u16 = 0xff00;
/// Send to controller.
pub const OFPP_CONTROLLER: u16 = 0xfffd;
/// Not associated with a physical port.
pub const OFPP_NONE: u16 = 0xffff;

/// Length of an Ethernet address in byte
pub const OFP_ETH_ALEN: usize = 6;
/// Maximum length of a port name including the NUL termination
pub const OFP_MAX_PORT_NAME_LEN: usize = 16;

/// A message's type, the most fundamental to
/// distinguish information between messages
pub enum OfpType {
    /* Immutable messages. */
    /// Symmetric message
    Hello = 0,
    /// Symmetric message
    Error = 1,
    /// Symmetric message
    EchoRequest = 2,
    /// Symmetric message
    EchoReply = 3,

    /* Switch configuration messages. */
    /// Controller/switch message
    FeaturesRequest = 5,
    /// Controller/switch message
    FeaturesReply = 6,
    /// Controller/switch message
    SetConfig = 9,

    /* Asynchronous messages. */
    /// Async message
    PacketIn = 10,
    /// Async message
    FlowRemoved = 11,
    /// Async message
    PortStatus = 12,

    /* Controller command messages. */
    /// Controller/switch message
    PacketOut = 13,
    /// Controller/switch message
    FlowMod = 14,
}

/// Header on all OpenFlow packets.
#[derive(Debug, PartialEq)]
pub struct OfpHeader {
    /// OFP_VERSION.
    version: u8,
    /// This packet's OfpType.
    typ: u8,
    /// This packet's length including this OfpHeader.
    length: u16,
    /// Transaction id associated with this packet.
    /// Replies use the same id as was in the request
    /// to facilitate pairing.
    xid: u32,
}

/// Description of a physical port
#[derive(Debug, PartialEq)]
pub struct OfpPhyPort {
    port_no: u16,
    hw_addr: [u8; OFP_ETH_ALEN],
    /// Null-terminated on the wire
    name: String,
    /// Bitmap of OFPPC_* flags.
    config: u32,
    /// Bitmap of OFPPS_* flags.
    state: u32,
}

/// Switch features.
#[derive(Debug, PartialEq)]
pub struct OfpSwitchFeatures {
    /// Datapath unique ID. The lower 48-bits are for
    /// a MAC address, while the upper 16-bits are
    /// implementer-defined.
    datapath_id: u64,
    /// Max packets buffered at once.
    n_buffers: u32,
    /// Number of tables supported by datapath.
    n_tables: u8,

    /* Features. */
    /// Bitmap of support OfpCapabilities.
    capabilities: u32,
    /// Bitmap of supported OfpActionType.
    actions: u32,

    /* Port info.*/
    /// Port definitions. The number of ports is inferred from the
    /// length field in the header.
    ports: Vec<OfpPhyPort>,
}

/// Switch configuration.
#[derive(Debug)]
pub struct OfpSwitchConfig {
    /// OFPC_* flags.
    flags: u16,
    /// Max bytes of new flow that datapath should send to the controller.
    miss_send_len: u16,
}

/// Packet received on port (datapath -> controller).
#[derive(Debug, PartialEq)]
pub struct OfpPacketIn {
    /// ID assigned by datapath.
    buffer_id: u32,
    /// Full length of frame.
    total_len: u16,
    /// Port on which frame was received.
    in_port: u16,
    /// Reason packet is being sent (one of OFPR_*)
    reason: u8,
    /// Ethernet frame, halfway through 32-bit word,
    /// so the IP header is 32-bit aligned.
    data: Vec<u8>,
}

/// Send packet (controller -> datapath).
#[derive(Debug)]
pub struct OfpPacketOut {
    /// ID assigned by datapath (OFP_NO_BUFFER if none).
    buffer_id: u32,
    /// Packet's input port (OFPP_NONE if none).
    in_port: u16,
    /// Actions.
    actions: Vec<OfpActionOutput>,
    /// Packet data. Only meaningful if buffer_id == OFP_NO_BUFFER.
    data: Vec<u8>,
}

/* ## -------------------------- ## */
/* ## OpenFlow Flow Match. ##      */
/* ## -------------------------- ## */

/// Flow wildcards.
pub mod wildcards {
    /// Ethernet destination address.
    pub const OFPFW_DL_DST: u32 = 1 << 3;
    /// Ethernet frame type.
    pub const OFPFW_DL_TYPE: u32 = 1 << 4;

    /// IP destination address wildcard bit count. Use of this field is
    /// different from the others: 0 is exact match, 1 ignores the LSB,
    /// 2 ignores the 2 least-significant bits, ..., 32 and higher wildcard
    /// the entire field.
    pub const OFPFW_NW_DST_SHIFT: u32 = 14;
    /// Width of the IP destination wildcard bit count.
    pub const OFPFW_NW_DST_BITS: u32 = 6;
    /// IP destination wildcard bit count field.
    pub const OFPFW_NW_DST_MASK: u32 = ((1 << OFPFW_NW_DST_BITS) - 1) << OFPFW_NW_DST_SHIFT;

    /// Wildcard all fields, source and destination address included.
    pub const OFPFW_ALL: u32 = (1 << 22) - 1;
}

/// Ethernet type of IPv4
pub const ETH_TYPE_IP: u16 = 0x0800;

/// Size of the fields to match against flows
pub const OFP_MATCH_LEN: usize = 40;

/* ## ----------------- ## */
/* ## OpenFlow Actions. ## */
/* ## ----------------- ## */

/// The type of an OpenFlow Action
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OfpActionType {
    /// Output to switch port.
    Output = 0,
    /// Ethernet source address.
    SetDlSrc = 4,
    /// Ethernet destination address.
    SetDlDst = 5,
}

/// Size of an action header in byte
pub const OFP_ACTION_HEADER_LEN: usize = 4;
/// Size of the `OfpActionType::Output` action in byte
pub const OFP_ACTION_OUTPUT_LEN: usize = 8;
/// Size of the `OfpActionType::SetDlSrc` and `OfpActionType::SetDlDst` actions in byte
pub const OFP_ACTION_DL_ADDR_LEN: usize = 16;

/// Action structure for `OfpActionType::Output`, which sends packets out 'port'.
///
/// When the 'port' is the `OFPP_CONTROLLER`, 'max_len' indicates the max
/// number of bytes to send. A 'max_len' of zero means no bytes of the
/// packet should be sent.
#[derive(Debug)]
pub struct OfpActionOutput {
    /// One of `OfpActionType::Output`.
    typ: u16,
    /// Length is 8.
    len: u16,
    /// Output port.
    port: u16,
    /// Max length to send to controller.
    max_len: u16,
}

/* ## --------------------------- ## */
/* ## OpenFlow Flow Modification. ## */
/* ## --------------------------- ## */

/// The command that is embedded in a flow mod message
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OfpFlowModCommand {
    /// New flow.
    Add = 0,
    /// Delete entry strictly matching wildcards and priority.
    DeleteStrict = 4,
}

/// Value used in `idle_timeout` and `hard_timeout` to indicate that the entry is permanent.
pub const OFP_FLOW_PERMANENT: u16 = 0;

/// By default, choose a priority in the middle.
pub const OFP_DEFAULT_PRIORITY: u16 = 0x8000;

/// Size of a flow mod message without actions:
/// header, match and the flow mod's own fields
pub const OFP_FLOW_MOD_LEN: usize = 8 + OFP_MATCH_LEN + 24;

/// A reserved buffer ID to express that no buffer is assigned
pub const OFP_NO_BUFFER: u32 = 0xffff_ffff;

/// Values for 'type' in `OfpErrorMsg`. These values are immutable: they will
/// not change in future versions of the protocol (although new values may be added).
#[derive(Debug)]
pub enum OfpErrorType {
    /// Hello protocol failed.
    HelloFailed = 0,
    /// Request was not understood.
    BadRequest = 1,
    /// Error in action description.
    BadAction = 2,
    /// Problem modifying flow entry.
    FlowModFailed = 3,
    /// Port mod request failed.
    PortModFailed = 4,
    /// Queue operation failed.
    QueueOpFailed = 5,
}

/// `OfpErrorMsg` 'code' values for `OfpErrorType::HelloFailed`.
///
/// 'data' contains an ASCII text string that may give failure details.
pub enum OfpHelloFailedCode {
    /// No compatible version.
    Incompatible = 0,
}

/// `OfpErrorMsg` 'code' values for `OfpErrorType::BadRequest`.
///
/// 'data' contains at least the first 64 bytes of the failed request.
#[derive(Debug)]
pub enum OfpBadRequestCode {
    /// ofp_header.version not supported.
    BadVersion = 0,
    /// ofp_header.type not supported.
    BadType = 1,
    /// Wrong request length for type.
    BadLen = 6,
}

/// Error message (datapath -> controller).
#[derive(Debug)]
pub struct OfpErrorMsg {
    typ: u16,
    code: u16,
    /// Variable-length data. Interpreted based on the type and code.
    data: Vec<u8>,
}

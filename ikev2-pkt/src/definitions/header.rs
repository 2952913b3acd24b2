//! Network-level header structs for the pieces of the protocol
//!
//! Every struct here is byte-for-byte the RFC 7296 layout, unaligned and
//! in network order, so it can be read from or written to any offset of
//! a datagram buffer.

use zerocopy::network_endian::{U16, U32, U64};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

/// The fixed 28-octet IKE header opening every datagram
///
/// ```text
///                          1                   2                   3
///      0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///     +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///     |                       IKE SA Initiator's SPI                  |
///     |                                                               |
///     +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///     |                       IKE SA Responder's SPI                  |
///     |                                                               |
///     +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///     |  Next Payload | MjVer | MnVer | Exchange Type |     Flags     |
///     +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///     |                          Message ID                           |
///     +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///     |                            Length                             |
///     +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, FromBytes, FromZeroes, AsBytes, Unaligned, Copy, Clone)]
#[repr(C, packed)]
pub struct IkeHeader {
    /// SPI chosen by the initiator of the IKE SA, never zero on the wire
    pub initiator_spi: U64,
    /// SPI chosen by the responder, zero in the very first request
    pub responder_spi: U64,
    /// Type of the first payload after this header, see
    /// [PayloadType](super::params::PayloadType)
    pub next_payload: u8,
    /// Major and minor version as two nibbles; this crate only speaks 2.0
    pub version: u8,
    /// The exchange this message belongs to, see
    /// [ExchangeType](super::params::ExchangeType)
    pub exchange_type: u8,
    /// INITIATOR, VERSION and RESPONSE bits; everything else is reserved
    pub flags: u8,
    /// Message identifier used for retransmission matching and windowing
    pub message_id: U32,
    /// Total length of the message including this header
    pub length: U32,
}

/// The generic header opening every payload
///
/// ```text
///                          1                   2                   3
///      0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///     +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///     | Next Payload  |C|  RESERVED   |         Payload Length        |
///     +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, FromBytes, FromZeroes, AsBytes, Unaligned, Copy, Clone)]
#[repr(C, packed)]
pub struct GenericPayloadHeader {
    /// Type of the payload following this one, or zero for the last
    pub next_payload: u8,
    /// Bit 7 is the critical bit; the rest must be sent as zero
    pub flags: u8,
    /// Length in octets of the payload including this 4-octet header
    pub payload_length: U16,
}

/// Protocol header for a Proposal substructure of an SA payload
///
/// ```text
///                          1                   2                   3
///      0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///     +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///     | Last Substruc |   RESERVED    |         Proposal Length       |
///     +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///     | Proposal Num  |  Protocol ID  |    SPI Size   |Num  Transforms|
///     +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///     ~                        SPI (variable)                         ~
///     +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///     |                                                               |
///     ~                        <Transforms>                           ~
///     |                                                               |
///     +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// Neither the variable-size SPI nor the transforms are part of the
/// header and thus not included in the struct.
#[derive(Debug, FromBytes, FromZeroes, AsBytes, Unaligned, Copy, Clone)]
#[repr(C, packed)]
pub struct ProposalHeader {
    /// 0 when this is the last proposal of the SA payload, 2 otherwise
    pub last_substruct: u8,
    /// Reserved, must be zero and must be ignored on receipt
    pub reserved: u8,
    /// Length in octets of the proposal including this header
    pub proposal_length: U16,
    /// Number of this proposal; the first is 1 and each following
    /// proposal increments by 1
    pub proposal_num: u8,
    /// Protocol the proposal negotiates for, see
    /// [SecurityProtocol](super::params::SecurityProtocol)
    pub protocol_id: u8,
    /// Size of the sending entity's SPI: 0 in an initial IKE
    /// negotiation, 8 for an IKE rekey, 4 for AH and ESP
    pub spi_size: u8,
    /// Number of transform substructures that follow
    pub num_transforms: u8,
}

/// Protocol header for a Transform substructure
///
/// ```text
///                          1                   2                   3
///      0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///     +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///     | Last Substruc |   RESERVED    |        Transform Length       |
///     +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///     |Transform Type |   RESERVED    |          Transform ID         |
///     +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///     |                                                               |
///     ~                      Transform Attributes                     ~
///     |                                                               |
///     +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// The transform attributes are not part of the header and thus not
/// included in the struct.
#[derive(Debug, FromBytes, FromZeroes, AsBytes, Unaligned, Copy, Clone)]
#[repr(C, packed)]
pub struct TransformHeader {
    /// 0 when this is the last transform of the proposal, 3 otherwise
    pub last_substruct: u8,
    /// Reserved, must be zero and must be ignored on receipt
    pub reserved: u8,
    /// Length in octets of the transform including this header
    pub transform_length: U16,
    /// Type of the transform, see
    /// [TransformType](super::params::TransformType)
    pub transform_type: u8,
    /// Reserved, must be zero and must be ignored on receipt
    pub reserved2: u8,
    /// Identifier of the concrete algorithm within the transform type;
    /// for example type 1 (encryption) with ID 20 selects AES-GCM-16
    pub transform_id: U16,
}

/// A fixed-length (TV form) transform attribute as per RFC 7296 §3.3.5
///
/// ```text
///                         1                   2                   3
///      0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///     +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///     |A|       Attribute Type        |    AF=0  Attribute Length     |
///     |F|                             |    AF=1  Attribute Value      |
///     +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// The only attribute this implementation emits is the key length,
/// which is always the TV form (AF bit set).
#[derive(Debug, FromBytes, FromZeroes, AsBytes, Unaligned, Copy, Clone)]
#[repr(C, packed)]
pub struct AttributeHeader {
    /// Attribute type with the format bit in the top position
    pub attribute_type: U16,
    /// The attribute value itself in the TV form
    pub attribute_value: U16,
}

/// Protocol header for key exchange payloads
///
/// ```text
///                          1                   2                   3
///      0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///     +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///     |   Diffie-Hellman Group Num    |           RESERVED            |
///     +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///     |                                                               |
///     ~                       Key Exchange Data                       ~
///     |                                                               |
///     +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// The key exchange data is not part of the header and thus not
/// included in the struct.
#[derive(Debug, FromBytes, FromZeroes, AsBytes, Unaligned, Copy, Clone)]
#[repr(C, packed)]
pub struct KeyExchangeHeader {
    /// DH group number the data was computed in
    pub dh_group_num: U16,
    /// Ignored but must be sent as zero
    pub reserved: U16,
}

/// Protocol header for the IDi and IDr payloads
#[derive(Debug, FromBytes, FromZeroes, AsBytes, Unaligned, Copy, Clone)]
#[repr(C, packed)]
pub struct IdHeader {
    /// Kind of identification data that follows, see
    /// [IdType](super::params::IdType)
    pub id_type: u8,
    /// Reserved, must be zero and must be ignored on receipt
    pub reserved: [u8; 3],
}

/// Protocol header for the Authentication payload
#[derive(Debug, FromBytes, FromZeroes, AsBytes, Unaligned, Copy, Clone)]
#[repr(C, packed)]
pub struct AuthHeader {
    /// Authentication method of the data that follows, see
    /// [AuthenticationMethod](super::params::AuthenticationMethod)
    pub auth_method: u8,
    /// Reserved, must be zero and must be ignored on receipt
    pub reserved: [u8; 3],
}

/// Protocol header for notify payloads
///
/// ```text
///                          1                   2                   3
///      0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///     +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///     |  Protocol ID  |   SPI Size    |      Notify Message Type      |
///     +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///     |                                                               |
///     ~                Security Parameter Index (SPI)                 ~
///     |                                                               |
///     +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///     |                                                               |
///     ~                       Notification Data                       ~
///     |                                                               |
///     +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// Neither the SPI nor the notification data is part of the header and
/// thus not included in the struct.
#[derive(Debug, FromBytes, FromZeroes, AsBytes, Unaligned, Copy, Clone)]
#[repr(C, packed)]
pub struct NotifyHeader {
    /// Type of the SA the notification concerns, or zero when the SPI
    /// field is empty
    pub protocol_id: u8,
    /// Length in octets of the SPI, zero for notifications about the
    /// IKE SA itself
    pub spi_size: u8,
    /// Notification type; values below 16384 report errors, the rest
    /// carry status, see [NotifyType](super::params::NotifyType)
    pub notify_message_type: U16,
}

impl NotifyHeader {
    /// Whether this notification reports an error rather than status
    pub fn is_error(&self) -> bool {
        self.notify_message_type.get() < 16384
    }
}

/// Protocol header for the Delete payload
#[derive(Debug, FromBytes, FromZeroes, AsBytes, Unaligned, Copy, Clone)]
#[repr(C, packed)]
pub struct DeleteHeader {
    /// Protocol of the SAs being deleted
    pub protocol_id: u8,
    /// Size in octets of each SPI that follows; zero for the IKE SA
    pub spi_size: u8,
    /// Number of SPIs that follow
    pub num_spis: U16,
}

/// Protocol header for the TSi and TSr payloads
#[derive(Debug, FromBytes, FromZeroes, AsBytes, Unaligned, Copy, Clone)]
#[repr(C, packed)]
pub struct TsPayloadHeader {
    /// Number of traffic selectors that follow
    pub num_ts: u8,
    /// Reserved, must be zero and must be ignored on receipt
    pub reserved: [u8; 3],
}

/// The fixed leading part of one traffic selector
///
/// ```text
///                          1                   2                   3
///      0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///     +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///     |   TS Type     |IP Protocol ID*|       Selector Length         |
///     +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///     |           Start Port*         |           End Port*           |
///     +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///     |                                                               |
///     ~                         Starting Address*                     ~
///     |                                                               |
///     +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///     |                                                               |
///     ~                         Ending Address*                       ~
///     |                                                               |
///     +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, FromBytes, FromZeroes, AsBytes, Unaligned, Copy, Clone)]
#[repr(C, packed)]
pub struct TrafficSelectorHeader {
    /// Address family of the range, see [TsType](super::params::TsType)
    pub ts_type: u8,
    /// IP protocol the selector is restricted to, or zero for any
    pub ip_protocol_id: u8,
    /// Length in octets of the whole selector including this header
    pub selector_length: U16,
    /// First port of the range, 0 with end 65535 meaning any
    pub start_port: U16,
    /// Last port of the range
    pub end_port: U16,
}

//! The packet itself: buffer, indices, container stack and lifecycle
//!
//! A [`Packet`] is either built outbound payload by payload and frozen
//! with [`Packet::finalize`], or parsed from an inbound datagram with
//! [`Packet::parse`] and (for encrypted exchanges) opened with
//! [`Packet::decrypt`]. Each packet is owned by exactly one thread from
//! creation to the end of its life; the only published artifact is the
//! finalized byte buffer.

mod build;
mod crypto;
mod parse;
mod wire;

use std::fmt;

use thiserror::Error;
use zerocopy::network_endian::{U32, U64};
use zerocopy::AsBytes;

use ikev2_token::TokenError;

use crate::definitions::header::IkeHeader;
use crate::definitions::params::{ExchangeType, PayloadType, FLAG_INITIATOR, FLAG_RESPONSE};
use crate::IKEV2_VERSION;

pub use build::Id;

/// Size of the buffer backing every packet; nothing larger is built or
/// accepted
pub const MAX_PACKET_SIZE: usize = 8192;

/// Octets of the fixed IKE header
pub(crate) const IKE_HEADER_LEN: usize = 28;
/// Offset of the header's next-payload slot, the head of the chain
pub(crate) const NEXT_PAYLOAD_OFFSET: usize = 16;
/// Offset of the header's total-length field
pub(crate) const LENGTH_OFFSET: usize = 24;

/// Failures of packet construction, validation and the crypto envelope
#[derive(Debug, Error)]
pub enum PacketError {
    /// The payload does not fit into the packet buffer; the caller may
    /// fragment or give up
    #[error("payload does not fit into the packet buffer")]
    OutOfSpace,
    /// Length arithmetic, version or flag checks failed
    #[error("malformed packet: {0}")]
    Malformed(&'static str),
    /// The payload set violates the rules of the exchange
    #[error("payload set violates exchange policy: {0}")]
    Policy(&'static str),
    /// The token refused to set up a cryptographic operation
    #[error("token refused to initialize the operation")]
    CryptoInit(#[source] TokenError),
    /// MAC or AEAD tag mismatch
    #[error("integrity check failed")]
    Integrity,
    /// A cryptographic operation failed for a reason other than a tag
    /// mismatch
    #[error("cryptographic operation failed")]
    CryptoOp(#[source] TokenError),
    /// Algorithm or exchange type this implementation does not speak
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
}

/// Location of one payload body inside the packet buffer
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PayloadIndex {
    /// Payload kind
    pub kind: PayloadType,
    /// Offset of the body, past the generic payload header
    pub off: usize,
    /// Body length, generic header excluded
    pub len: usize,
}

/// Location of one Notify payload, with its type pre-parsed
///
/// Notifications recur, so they get a second ordered index next to the
/// payload table; the cached type saves re-parsing the notify header.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct NotifyIndex {
    /// Offset of the notify header inside the buffer
    pub off: usize,
    /// Length from the notify header to the end of the payload
    pub len: usize,
    /// Notify message type in host order
    pub ntype: u16,
}

/// Open container awaiting its deferred length/count back-patch
#[derive(Debug, Copy, Clone)]
pub(crate) struct Container {
    pub(crate) kind: ContainerKind,
    pub(crate) start: usize,
}

#[derive(Debug, Copy, Clone)]
pub(crate) enum ContainerKind {
    /// SA payload; `start` is its generic header
    Sa,
    /// Proposal substructure; `start` is the proposal header
    Proposal {
        /// Transforms seen so far, patched into the header at close
        transforms: u8,
    },
    /// Transform substructure; `start` is the transform header
    Transform,
    /// Delete payload counting its SPIs
    Delete {
        /// SPIs appended so far
        spis: u16,
    },
    /// TSi/TSr payload counting its selectors
    TsPayload {
        /// Selectors appended so far
        selectors: u8,
    },
    /// SK payload; closed by the crypto envelope at finalize
    Sk,
}

/// Host-order copy of the header fields the codec keeps at hand
#[derive(Debug, Copy, Clone)]
pub(crate) struct HeaderFields {
    pub(crate) initiator_spi: u64,
    pub(crate) responder_spi: u64,
    pub(crate) exchange: ExchangeType,
    pub(crate) flags: u8,
    pub(crate) message_id: u32,
}

/// One IKEv2 datagram under construction or inspection
pub struct Packet {
    pub(crate) buf: Vec<u8>,
    pub(crate) limit: usize,
    pub(crate) header: HeaderFields,
    pub(crate) stack: Vec<Container>,
    pub(crate) payloads: Vec<PayloadIndex>,
    pub(crate) notifies: Vec<NotifyIndex>,
    /// Offset of the next-payload octet the next payload back-patches
    pub(crate) next_slot: usize,
    pub(crate) done: bool,
    /// First unknown payload kind seen with the critical bit set
    pub(crate) unknown_critical: Option<u8>,
}

impl Packet {
    /// Start an outbound request as the exchange initiator.
    pub fn new_initiator(
        initiator_spi: u64,
        responder_spi: u64,
        exchange: ExchangeType,
        message_id: u32,
    ) -> Self {
        Self::out_alloc(
            HeaderFields {
                initiator_spi,
                responder_spi,
                exchange,
                flags: FLAG_INITIATOR,
                message_id,
            },
        )
    }

    /// Start the outbound response to an inbound request, inheriting its
    /// SPIs, exchange type and message id.
    pub fn new_response(request: &Packet) -> Self {
        Self::out_alloc(HeaderFields {
            initiator_spi: request.header.initiator_spi,
            responder_spi: request.header.responder_spi,
            exchange: request.header.exchange,
            flags: FLAG_RESPONSE,
            message_id: request.header.message_id,
        })
    }

    fn out_alloc(header: HeaderFields) -> Self {
        let mut buf = Vec::with_capacity(MAX_PACKET_SIZE);
        let raw = IkeHeader {
            initiator_spi: U64::new(header.initiator_spi),
            responder_spi: U64::new(header.responder_spi),
            next_payload: PayloadType::NoNextPayload as u8,
            version: IKEV2_VERSION,
            exchange_type: header.exchange as u8,
            flags: header.flags,
            message_id: U32::new(header.message_id),
            length: U32::new(0),
        };
        buf.extend_from_slice(raw.as_bytes());
        Self {
            buf,
            limit: MAX_PACKET_SIZE,
            header,
            stack: Vec::new(),
            payloads: Vec::new(),
            notifies: Vec::new(),
            next_slot: NEXT_PAYLOAD_OFFSET,
            done: false,
            unknown_critical: None,
        }
    }

    /// The exchange this packet belongs to.
    pub fn exchange(&self) -> ExchangeType {
        self.header.exchange
    }

    /// The message identifier.
    pub fn message_id(&self) -> u32 {
        self.header.message_id
    }

    /// The initiator's SPI.
    pub fn initiator_spi(&self) -> u64 {
        self.header.initiator_spi
    }

    /// The responder's SPI.
    pub fn responder_spi(&self) -> u64 {
        self.header.responder_spi
    }

    /// Whether the response flag is set.
    pub fn is_response(&self) -> bool {
        self.header.flags & FLAG_RESPONSE != 0
    }

    /// Whether the message came from the original initiator.
    pub fn from_initiator(&self) -> bool {
        self.header.flags & FLAG_INITIATOR != 0
    }

    /// The datagram bytes. Only meaningful on an outbound packet after
    /// [`Packet::finalize`], or on an inbound packet at any time.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// All indexed payloads in order of appearance, inner payloads of a
    /// decrypted SK region appended after the outer ones.
    pub fn payloads(&self) -> &[PayloadIndex] {
        &self.payloads
    }

    /// All Notify payloads in order of appearance.
    pub fn notifies(&self) -> &[NotifyIndex] {
        &self.notifies
    }

    /// First payload of the given kind, if any.
    pub fn payload(&self, kind: PayloadType) -> Option<&PayloadIndex> {
        self.payloads.iter().find(|p| p.kind == kind)
    }

    /// Body bytes of an indexed payload.
    pub fn payload_bytes(&self, index: &PayloadIndex) -> &[u8] {
        &self.buf[index.off..index.off + index.len]
    }

    /// Bytes of an indexed notification, starting at its notify header.
    pub fn notify_bytes(&self, index: &NotifyIndex) -> &[u8] {
        &self.buf[index.off..index.off + index.len]
    }

    /// Kind of the first unknown payload that carried the critical bit,
    /// for the state machine to answer with UNSUPPORTED_CRITICAL_PAYLOAD.
    pub fn unknown_critical(&self) -> Option<u8> {
        self.unknown_critical
    }

    pub(crate) fn check_mutable(&self) -> Result<(), PacketError> {
        if self.done {
            return Err(PacketError::Malformed("packet is already finalized"));
        }
        Ok(())
    }
}

impl fmt::Display for Packet {
    /// Payload summary such as `SA, KE, No` or `N(NO_PROPOSAL_CHOSEN)`,
    /// used when logging a packet.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use crate::definitions::params::NotifyType;

        let mut notify_at = 0;
        for (i, pay) in self.payloads.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", pay.kind.short())?;
            if pay.kind == PayloadType::Notify {
                if let Some(ntfy) = self.notifies.get(notify_at) {
                    notify_at += 1;
                    match NotifyType::try_from(ntfy.ntype) {
                        Ok(known) => write!(f, "({known:?})")?,
                        Err(_) => write!(f, "({})", ntfy.ntype)?,
                    }
                }
            }
        }
        Ok(())
    }
}

//! # ikev2-pkt
//!
//! IKEv2 (RFC 7296) datagram construction and validation, including the
//! Encrypted-and-Authenticated (SK) payload envelope.
//!
//! The crate is the codec layer of an IKEv2 daemon: [`packet::Packet`]
//! builds outbound datagrams payload by payload, validates inbound ones
//! against the per-exchange composition rules, and wraps or unwraps the
//! SK payload using a PKCS#11-style token behind the
//! [`ikev2-token`](ikev2_token) contract. Exchange orchestration, socket
//! I/O and algorithm negotiation live elsewhere.

#![warn(missing_docs, clippy::unwrap_used, clippy::expect_used)]

pub mod alg;
pub mod definitions;
pub mod packet;
pub mod sa;

pub use zerocopy;

/// Version octet carried by every IKEv2 header, `<major>.<minor>` in 4
/// bits each with major 2 and minor 0.
pub const IKEV2_VERSION: u8 = 0b0010_0000;

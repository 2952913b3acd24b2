//! Inbound datagram validation and payload indexing
//!
//! The walk checks the length arithmetic of every payload link, builds
//! the payload and notify indices, and applies the per-exchange payload
//! composition rules. Any failure discards the packet silently; parse
//! errors are logged but never answered, to keep the DoS surface small.

use log::warn;
use zerocopy::FromBytes;

use crate::definitions::header::{GenericPayloadHeader, IkeHeader, NotifyHeader};
use crate::definitions::params::{
    ExchangeType, PayloadType, CRITICAL_PAYLOAD, FLAG_INITIATOR, FLAG_RESPONSE, NUM_PAYLOAD_KINDS,
    PAYLOAD_MAX, PAYLOAD_MIN,
};

use super::{HeaderFields, NotifyIndex, Packet, PacketError, PayloadIndex, IKE_HEADER_LEN};

impl Packet {
    /// Validate an inbound datagram and index its payloads.
    ///
    /// The buffer must be the exact datagram; the header length field
    /// has to match it. On success the packet is immutable except for
    /// [`Packet::decrypt`] extending the indices.
    pub fn parse(buf: Vec<u8>) -> Result<Packet, PacketError> {
        let header = IkeHeader::ref_from_prefix(&buf)
            .ok_or(PacketError::Malformed("datagram shorter than the IKE header"))?;
        if header.version >> 4 != 2 {
            warn!("dropping datagram with major version {}", header.version >> 4);
            return Err(PacketError::Malformed("major version is not 2"));
        }
        let flags = header.flags;
        let direction = flags & (FLAG_INITIATOR | FLAG_RESPONSE);
        if direction == 0 || direction == FLAG_INITIATOR | FLAG_RESPONSE {
            return Err(PacketError::Malformed(
                "exactly one of the initiator and response flags must be set",
            ));
        }
        if header.length.get() as usize != buf.len() {
            return Err(PacketError::Malformed(
                "header length does not match the datagram",
            ));
        }
        let exchange = ExchangeType::try_from(header.exchange_type)
            .map_err(|_| PacketError::Malformed("unknown exchange type"))?;
        let fields = HeaderFields {
            initiator_spi: header.initiator_spi.get(),
            responder_spi: header.responder_spi.get(),
            exchange,
            flags,
            message_id: header.message_id.get(),
        };
        let first = header.next_payload;

        let mut counts = [0usize; NUM_PAYLOAD_KINDS];
        let mut unknown_critical = None;
        let mut payloads = Vec::new();
        let mut notifies = Vec::new();
        walk(
            &buf[IKE_HEADER_LEN..],
            IKE_HEADER_LEN,
            first,
            &mut counts,
            &mut unknown_critical,
            &mut payloads,
            &mut notifies,
        )?;

        let count = |kind: PayloadType| counts[(kind as u8 - PAYLOAD_MIN) as usize];
        match exchange {
            ExchangeType::IkeAuth | ExchangeType::CreateChildSa | ExchangeType::Informational => {
                // Everything must still be under the envelope here; a
                // cleartext payload is dropped without decrypting
                // anything, the cheapest of the options RFC 7296 leaves
                // open.
                if count(PayloadType::Encrypted) != 1
                    || payloads.iter().any(|p| p.kind != PayloadType::Encrypted)
                {
                    warn!("unencrypted payload in a {exchange:?} message");
                    return Err(PacketError::Policy(
                        "expected exactly one SK payload and nothing else",
                    ));
                }
            }
            ExchangeType::IkeSaInit => sa_init_rules(&counts)?,
            ExchangeType::IkeSessionResume => {
                return Err(PacketError::Unsupported("IKE_SESSION_RESUME"))
            }
            ExchangeType::GsaAuth
            | ExchangeType::GsaRegistration
            | ExchangeType::GsaRekey
            | ExchangeType::GsaInbandRekey
            | ExchangeType::IkeIntermediate
            | ExchangeType::IkeFollowupKeyExchange => {
                return Err(PacketError::Unsupported("exchange type"))
            }
        }

        let limit = buf.len();
        Ok(Packet {
            buf,
            limit,
            header: fields,
            stack: Vec::new(),
            payloads,
            notifies,
            next_slot: 0,
            done: true,
            unknown_critical,
        })
    }
}

/// Payload composition rules for IKE_SA_INIT.
///
/// A bare notify (an error reply, a COOKIE demand) suspends the
/// SA/KE/nonce triplet requirement; otherwise exactly one of each must
/// be present. Payloads of later exchange stages are never acceptable.
fn sa_init_rules(counts: &[usize; NUM_PAYLOAD_KINDS]) -> Result<(), PacketError> {
    let count = |kind: PayloadType| counts[(kind as u8 - PAYLOAD_MIN) as usize];

    const FORBIDDEN: [PayloadType; 11] = [
        PayloadType::IdInitiator,
        PayloadType::IdResponder,
        PayloadType::Certificate,
        PayloadType::Authentication,
        PayloadType::Delete,
        PayloadType::TsInitiator,
        PayloadType::TsResponder,
        PayloadType::Encrypted,
        PayloadType::Configuration,
        PayloadType::Eap,
        PayloadType::Gspm,
    ];
    for kind in FORBIDDEN {
        if count(kind) > 0 {
            warn!("{} payload in an IKE_SA_INIT message", kind.short());
            return Err(PacketError::Policy("payload not allowed in IKE_SA_INIT"));
        }
    }
    if count(PayloadType::Notify) == 0
        && (count(PayloadType::SecurityAssociation) != 1
            || count(PayloadType::KeyExchange) != 1
            || count(PayloadType::Nonce) != 1)
    {
        warn!("IKE_SA_INIT without the SA/KE/nonce triplet");
        return Err(PacketError::Policy(
            "IKE_SA_INIT requires exactly one SA, KE and nonce payload",
        ));
    }
    Ok(())
}

/// Walk one payload chain covering exactly `region`, recording indices
/// relative to the whole packet buffer (`region` starts at `base`).
///
/// Unknown payload kinds are skipped but must still be well-formed; a
/// critical one is recorded for the state machine to answer.
pub(crate) fn walk(
    region: &[u8],
    base: usize,
    first: u8,
    counts: &mut [usize; NUM_PAYLOAD_KINDS],
    unknown_critical: &mut Option<u8>,
    payloads: &mut Vec<PayloadIndex>,
    notifies: &mut Vec<NotifyIndex>,
) -> Result<(), PacketError> {
    let mut next = first;
    let mut at = 0usize;

    while next != PayloadType::NoNextPayload as u8 {
        let header = GenericPayloadHeader::ref_from_prefix(&region[at..])
            .ok_or(PacketError::Malformed("truncated payload header"))?;
        let total = header.payload_length.get() as usize;
        if total < 4 || total > region.len() - at {
            return Err(PacketError::Malformed("payload length out of bounds"));
        }
        let kind_raw = next;
        next = header.next_payload;
        let body = at + 4;
        let body_len = total - 4;

        if (PAYLOAD_MIN..=PAYLOAD_MAX).contains(&kind_raw) {
            counts[(kind_raw - PAYLOAD_MIN) as usize] += 1;
            let kind = PayloadType::try_from(kind_raw)
                .map_err(|_| PacketError::Malformed("payload type"))?;
            payloads.push(PayloadIndex {
                kind,
                off: base + body,
                len: body_len,
            });
            if kind == PayloadType::Notify {
                if body_len < 4 {
                    return Err(PacketError::Malformed("notify payload too short"));
                }
                let notify = NotifyHeader::ref_from_prefix(&region[body..body + body_len])
                    .ok_or(PacketError::Malformed("truncated notify header"))?;
                if body_len < 4 + notify.spi_size as usize {
                    return Err(PacketError::Malformed("notify SPI exceeds the payload"));
                }
                notifies.push(NotifyIndex {
                    off: base + body,
                    len: body_len,
                    ntype: notify.notify_message_type.get(),
                });
            }
        } else {
            if region[at + 1] & CRITICAL_PAYLOAD != 0 && unknown_critical.is_none() {
                *unknown_critical = Some(kind_raw);
            }
            warn!("skipping unknown payload type {kind_raw}");
        }
        at += total;
    }

    if at != region.len() {
        return Err(PacketError::Malformed(
            "payload chain does not cover the region",
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::definitions::params::{
        EncryptionAlgorithm, ExchangeType, IntegrityAlgorithm, PseudorandomFunction,
        SecurityProtocol, TransformType,
    };
    use crate::packet::{Packet, PacketError};
    use crate::sa::IkeSa;

    use super::*;

    fn no_keys_sa() -> IkeSa {
        use ikev2_token::soft::SoftToken;
        use ikev2_token::SessionPool;
        use std::sync::Arc;
        IkeSa {
            encr: EncryptionAlgorithm::AesCbc,
            auth: IntegrityAlgorithm::HmacSha2_256_128,
            salt: Vec::new(),
            sk_ei: 0,
            sk_er: 0,
            sk_ai: 0,
            sk_ar: 0,
            initiator: true,
            vendor_peer: false,
            pool: Arc::new(SessionPool::new(Arc::new(SoftToken::new()))),
        }
    }

    fn built_sa_init() -> Vec<u8> {
        let mut pkt = Packet::new_initiator(0x1112131415161718, 0, ExchangeType::IkeSaInit, 0);
        pkt.add_sa().unwrap();
        pkt.add_proposal(1, SecurityProtocol::InternetKeyExchange, 0)
            .unwrap();
        pkt.add_xform_encr(EncryptionAlgorithm::AesCbc, 256, 256)
            .unwrap();
        pkt.add_transform(
            TransformType::IntegrityAlgorithm,
            IntegrityAlgorithm::HmacSha2_256_128 as u16,
        )
        .unwrap();
        pkt.add_transform(
            TransformType::PseudoRandomFunction,
            PseudorandomFunction::HmacSha2_256 as u16,
        )
        .unwrap();
        pkt.add_transform(TransformType::KeyExchangeMethod, 14).unwrap();
        pkt.add_ke(14, &[0u8; 32]).unwrap();
        pkt.add_nonce(32).unwrap();
        pkt.finalize(&no_keys_sa()).unwrap();
        pkt.as_bytes().to_vec()
    }

    #[test]
    fn built_packet_parses_back() {
        let pkt = Packet::parse(built_sa_init()).unwrap();
        assert_eq!(pkt.exchange(), ExchangeType::IkeSaInit);
        assert_eq!(pkt.initiator_spi(), 0x1112131415161718);
        assert!(!pkt.is_response());
        let kinds: Vec<_> = pkt.payloads().iter().map(|p| p.kind).collect();
        assert_eq!(
            kinds,
            [
                PayloadType::SecurityAssociation,
                PayloadType::KeyExchange,
                PayloadType::Nonce
            ]
        );
        assert!(pkt.notifies().is_empty());
        assert_eq!(pkt.payload(PayloadType::KeyExchange).unwrap().len, 36);
    }

    #[test]
    fn header_only_informational_is_rejected_in_cleartext() {
        let buf = vec![
            0x00, 0x04, 0xc0, 0x1d, 0xb4, 0x00, 0xb0, 0xc9, // initiator
            0x00, 0x00, 0x00, 0x00, 0x11, 0xf1, 0x5b, 0xa3, // responder
            0x00, // next payload
            0x20, // version
            0x25, // exchange type, INFORMATIONAL
            0x20, // flags, response
            0x3b, 0x9a, 0xc9, 0xff, // message ID
            0x00, 0x00, 0x00, 0x1c, // length
        ];
        assert!(matches!(
            Packet::parse(buf),
            Err(PacketError::Policy(_))
        ));
    }

    #[test]
    fn version_and_flag_checks() {
        let mut buf = built_sa_init();
        buf[17] = 0x10; // IKEv1 major
        assert!(matches!(
            Packet::parse(buf),
            Err(PacketError::Malformed(_))
        ));

        let mut buf = built_sa_init();
        buf[19] = 0x28; // initiator and response at once
        assert!(matches!(
            Packet::parse(buf),
            Err(PacketError::Malformed(_))
        ));

        let mut buf = built_sa_init();
        buf[19] = 0; // neither
        assert!(matches!(
            Packet::parse(buf),
            Err(PacketError::Malformed(_))
        ));
    }

    #[test]
    fn length_must_match_the_datagram() {
        let mut buf = built_sa_init();
        buf.push(0);
        assert!(matches!(
            Packet::parse(buf),
            Err(PacketError::Malformed(_))
        ));
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let mut buf = built_sa_init();
        // stretch the nonce payload beyond the datagram
        let len = buf.len();
        buf[len - 34] = 0xff;
        assert!(matches!(
            Packet::parse(buf),
            Err(PacketError::Malformed(_))
        ));
    }

    #[test]
    fn sa_init_triplet_is_required_without_notify() {
        let mut pkt = Packet::new_initiator(7, 0, ExchangeType::IkeSaInit, 0);
        pkt.add_sa().unwrap();
        pkt.add_proposal(1, SecurityProtocol::InternetKeyExchange, 0)
            .unwrap();
        pkt.add_nonce(32).unwrap();
        pkt.finalize(&no_keys_sa()).unwrap();
        assert!(matches!(
            Packet::parse(pkt.as_bytes().to_vec()),
            Err(PacketError::Policy(_))
        ));
    }

    #[test]
    fn bare_notify_response_is_legal_sa_init() {
        let mut pkt = Packet::new_initiator(7, 0, ExchangeType::IkeSaInit, 0);
        pkt.add_notify(None, 14, None, &[]).unwrap(); // NO_PROPOSAL_CHOSEN
        pkt.finalize(&no_keys_sa()).unwrap();
        let parsed = Packet::parse(pkt.as_bytes().to_vec()).unwrap();
        assert_eq!(parsed.notifies().len(), 1);
        assert_eq!(parsed.notifies()[0].ntype, 14);
        assert_eq!(format!("{parsed}"), "N(NoProposalChosen)");
    }

    #[test]
    fn unknown_payloads_are_skipped_but_counted_critical() {
        // SA_INIT response carrying a notify plus one unknown payload
        // (type 60) flagged critical
        let mut pkt = Packet::new_initiator(7, 0, ExchangeType::IkeSaInit, 0);
        pkt.add_notify(None, 16390, None, b"cookie").unwrap();
        pkt.finalize(&no_keys_sa()).unwrap();
        let mut buf = pkt.as_bytes().to_vec();

        // splice in an unknown payload by hand
        let notify_start = 28;
        buf[notify_start] = 60; // notify now chains to the unknown kind
        buf.extend_from_slice(&[0x00, 0x80, 0x00, 0x08, 1, 2, 3, 4]);
        let total = buf.len() as u32;
        buf[24..28].copy_from_slice(&total.to_be_bytes());

        let parsed = Packet::parse(buf).unwrap();
        assert_eq!(parsed.payloads().len(), 1); // unknown kind not indexed
        assert_eq!(parsed.unknown_critical(), Some(60));
    }

    #[test]
    fn notify_spi_size_is_bounded() {
        let mut pkt = Packet::new_initiator(7, 0, ExchangeType::IkeSaInit, 0);
        pkt.add_notify(None, 14, None, &[]).unwrap();
        pkt.finalize(&no_keys_sa()).unwrap();
        let mut buf = pkt.as_bytes().to_vec();
        buf[28 + 4 + 1] = 200; // SPI size far beyond the payload
        assert!(matches!(
            Packet::parse(buf),
            Err(PacketError::Malformed(_))
        ));
    }
}

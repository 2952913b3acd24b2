//! End-to-end scenarios over the public API: build a datagram, feed the
//! bytes back through the parser, open the envelope.

use std::sync::Arc;

use ikev2_pkt::definitions::params::{
    AuthenticationMethod, EncryptionAlgorithm, ExchangeType, IntegrityAlgorithm, PayloadType,
    PseudorandomFunction, SecurityProtocol, TransformType,
};
use ikev2_pkt::packet::{Id, Packet, PacketError};
use ikev2_pkt::sa::IkeSa;
use ikev2_token::soft::SoftToken;
use ikev2_token::SessionPool;

fn sa_with_keys(
    encr: EncryptionAlgorithm,
    auth: IntegrityAlgorithm,
    key_len: usize,
    auth_key_len: usize,
    salt_len: usize,
) -> IkeSa {
    let pool = Arc::new(SessionPool::new(Arc::new(SoftToken::new())));
    let (sk_e, sk_a) = {
        let session = pool.session().unwrap();
        let sk_e = session.create_key(&vec![0x13u8; key_len]).unwrap();
        let sk_a = if auth_key_len > 0 {
            session.create_key(&vec![0x37u8; auth_key_len]).unwrap()
        } else {
            0
        };
        (sk_e, sk_a)
    };
    IkeSa {
        encr,
        auth,
        salt: vec![0xa5; salt_len],
        sk_ei: sk_e,
        sk_er: sk_e,
        sk_ai: sk_a,
        sk_ar: sk_a,
        initiator: true,
        vendor_peer: false,
        pool,
    }
}

fn initiator_sa_init() -> Vec<u8> {
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
    pkt.add_transform(TransformType::KeyExchangeMethod, 14)
        .unwrap();
    pkt.add_ke(14, &[0u8; 32]).unwrap();
    pkt.add_nonce(32).unwrap();
    pkt.finalize(&sa_with_keys(
        EncryptionAlgorithm::AesCbc,
        IntegrityAlgorithm::HmacSha2_256_128,
        32,
        32,
        0,
    ))
    .unwrap();
    pkt.as_bytes().to_vec()
}

#[test]
fn sa_init_header_accounts_for_every_payload() {
    let raw = initiator_sa_init();
    // SA is 48, KE 40, the nonce 36
    assert_eq!(raw.len(), 28 + 48 + 40 + 36);
    assert_eq!(&raw[24..28], (raw.len() as u32).to_be_bytes().as_slice());
    // first link of the chain is the SA payload, the last ends it
    assert_eq!(raw[16], 33);
    assert_eq!(raw[28 + 48 + 40], 0);
}

#[test]
fn sa_init_parses_back_to_the_same_structure() {
    let pkt = Packet::parse(initiator_sa_init()).unwrap();
    assert_eq!(pkt.exchange(), ExchangeType::IkeSaInit);
    assert!(pkt.from_initiator());
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
    assert_eq!(format!("{pkt}"), "SA, KE, No");
}

#[test]
fn ike_auth_envelope_round_trips() {
    let sa = sa_with_keys(
        EncryptionAlgorithm::AesCbc,
        IntegrityAlgorithm::HmacSha2_256_128,
        32,
        32,
        0,
    );
    let mut pkt = Packet::new_initiator(0xaaaa, 0xbbbb, ExchangeType::IkeAuth, 1);
    pkt.add_sk(&sa).unwrap();
    pkt.add_id_i(&Id::Fqdn("initiator.example.org")).unwrap();
    pkt.add_auth(AuthenticationMethod::SharedKeyMessageIntegrityCode, &[7; 20])
        .unwrap();
    pkt.add_sa().unwrap();
    pkt.add_proposal(1, SecurityProtocol::EncapsulatingSecurityPayload, 0xc0ffee)
        .unwrap();
    pkt.add_transform(TransformType::EncryptionAlgorithm, 12)
        .unwrap();
    pkt.add_ts_i().unwrap();
    let from = "192.0.2.0:0".parse().unwrap();
    let to = "192.0.2.255:65535".parse().unwrap();
    pkt.add_ts(0, &from, &to).unwrap();
    pkt.add_ts_r().unwrap();
    pkt.add_ts(0, &from, &to).unwrap();
    pkt.finalize(&sa).unwrap();

    let mut parsed = Packet::parse(pkt.as_bytes().to_vec()).unwrap();
    let outer: Vec<_> = parsed.payloads().iter().map(|p| p.kind).collect();
    assert_eq!(outer, [PayloadType::Encrypted]);

    // SK body = IV + block-aligned ciphertext + 128-bit ICV
    let sk = *parsed.payload(PayloadType::Encrypted).unwrap();
    assert_eq!((sk.len - 16 - 16) % 16, 0);

    parsed.decrypt(&sa).unwrap();
    let kinds: Vec<_> = parsed.payloads().iter().map(|p| p.kind).collect();
    assert_eq!(
        kinds,
        [
            PayloadType::Encrypted,
            PayloadType::IdInitiator,
            PayloadType::Authentication,
            PayloadType::SecurityAssociation,
            PayloadType::TsInitiator,
            PayloadType::TsResponder,
        ]
    );
    let id = parsed.payload(PayloadType::IdInitiator).unwrap();
    assert_eq!(&parsed.payload_bytes(id)[4..], b"initiator.example.org");
}

#[test]
fn cleartext_payload_next_to_sk_is_policy_rejected() {
    let sa = sa_with_keys(
        EncryptionAlgorithm::AesCbc,
        IntegrityAlgorithm::HmacSha2_256_128,
        32,
        32,
        0,
    );
    let mut pkt = Packet::new_initiator(0xaaaa, 0xbbbb, ExchangeType::IkeAuth, 1);
    // an unprotected notify leaks in front of the envelope
    pkt.add_notify(None, 16384, None, &[]).unwrap();
    pkt.add_sk(&sa).unwrap();
    pkt.add_id_i(&Id::Fqdn("initiator.example.org")).unwrap();
    pkt.finalize(&sa).unwrap();

    assert!(matches!(
        Packet::parse(pkt.as_bytes().to_vec()),
        Err(PacketError::Policy(_))
    ));
}

#[test]
fn response_inherits_the_request_identity() {
    let request = Packet::parse(initiator_sa_init()).unwrap();
    let response = Packet::new_response(&request);
    assert_eq!(response.initiator_spi(), request.initiator_spi());
    assert_eq!(response.message_id(), request.message_id());
    assert_eq!(response.exchange(), ExchangeType::IkeSaInit);
    assert!(response.is_response());
}

//! The SK payload envelope
//!
//! Closing the SK container pads the plaintext region, derives the IV,
//! encrypts in place and computes the ICV; [`Packet::decrypt`] is the
//! inverse, re-running the payload walk over the recovered plaintext.
//! Both length fields the receiver authenticates (the SK payload's and
//! the IKE header's) are settled before any cipher touches the buffer.

use log::{info, warn};

use ikev2_token::{MechParams, Mechanism, TokenError};

use crate::alg::{self, EncrMode};
use crate::definitions::params::{IntegrityAlgorithm, PayloadType, NUM_PAYLOAD_KINDS};
use crate::sa::IkeSa;

use super::parse::walk;
use super::{Packet, PacketError, LENGTH_OFFSET};

impl Packet {
    /// Close the SK envelope over everything appended since
    /// [`Packet::add_sk`]. Called by finalize with the SK header offset.
    pub(crate) fn encrypt_sk(&mut self, sa: &IkeSa, sk_start: usize) -> Result<(), PacketError> {
        let mode = alg::mode(sa.encr);
        let iv_len = alg::iv_size(sa.encr);
        let icv_len = alg::icv_size(sa.encr, sa.auth);
        let block = alg::block_size(sa.encr).max(1);

        let iv_off = sk_start + 4;
        let data_off = iv_off + iv_len;
        let datalen = self.buf.len() - data_off;
        let padlen = (block - (datalen + 1) % block) % block;

        if self.write_left() < padlen + 1 + icv_len {
            info!("not enough space for the SK padding and ICV");
            return Err(PacketError::OutOfSpace);
        }
        // Padding octets carry the pad length; one extra loop iteration
        // writes the pad-length octet itself.
        for _ in 0..=padlen {
            self.put_u8(padlen as u8);
        }
        let icv_off = self.buf.len();
        self.buf.resize(icv_off + icv_len, 0);

        // The receiver authenticates both length fields, settle them
        // before the cipher runs.
        self.end_payload(sk_start);
        self.patch_u32(LENGTH_OFFSET, self.buf.len() as u32);

        match mode {
            EncrMode::Cbc => self.derive_cbc_iv(sa, iv_off, iv_len)?,
            EncrMode::Ctr | EncrMode::Ccm | EncrMode::Gcm => {
                // the message id is unique under one key, which is all a
                // counter-mode IV needs
                let msgid = self.header.message_id.to_be_bytes();
                self.buf[iv_off..iv_off + 4].copy_from_slice(&msgid);
            }
            EncrMode::None => {}
        }

        if mode != EncrMode::None {
            let iv = self.buf[iv_off..data_off].to_vec();
            let mech = sk_mechanism(sa, &iv, &self.buf[..iv_off], icv_len)?;
            let session = sa.pool.session().map_err(PacketError::CryptoInit)?;
            session
                .encrypt_init(&mech, sa.encr_key())
                .map_err(PacketError::CryptoInit)?;
            let (payload, tag) = self.buf.split_at_mut(icv_off);
            let data = &mut payload[data_off..];
            if matches!(mode, EncrMode::Ccm | EncrMode::Gcm) {
                session.encrypt(data, tag).map_err(PacketError::CryptoOp)?;
            } else {
                session.encrypt(data, &mut []).map_err(PacketError::CryptoOp)?;
            }
        }

        if !matches!(mode, EncrMode::Ccm | EncrMode::Gcm) && sa.auth != IntegrityAlgorithm::None {
            self.sign_icv(sa, icv_off, icv_len)?;
        }
        Ok(())
    }

    /// NIST SP 800-38A appendix C: encrypt the unique message id under
    /// the bulk key to obtain an unpredictable CBC IV.
    fn derive_cbc_iv(
        &mut self,
        sa: &IkeSa,
        iv_off: usize,
        iv_len: usize,
    ) -> Result<(), PacketError> {
        let kind = alg::ecb_mechanism(sa.encr).ok_or(PacketError::Unsupported(
            "no ECB mechanism to derive the CBC IV",
        ))?;
        let mut block = vec![0u8; alg::block_size(sa.encr)];
        block[..4].copy_from_slice(&self.header.message_id.to_be_bytes());
        let session = sa.pool.session().map_err(PacketError::CryptoInit)?;
        session
            .encrypt_init(&Mechanism::raw(kind), sa.encr_key())
            .map_err(PacketError::CryptoInit)?;
        session
            .encrypt(&mut block, &mut [])
            .map_err(PacketError::CryptoOp)?;
        self.buf[iv_off..iv_off + iv_len].copy_from_slice(&block[..iv_len]);
        Ok(())
    }

    /// MAC over everything from the header up to the ICV slot.
    fn sign_icv(&mut self, sa: &IkeSa, icv_off: usize, icv_len: usize) -> Result<(), PacketError> {
        let kind = alg::auth_mechanism(sa.auth)
            .ok_or(PacketError::Unsupported("no MAC mechanism for the ICV"))?;
        let mut mac = vec![0u8; icv_len];
        let session = sa.pool.session().map_err(PacketError::CryptoInit)?;
        session
            .sign_init(&Mechanism::raw(kind), sa.auth_key())
            .map_err(PacketError::CryptoInit)?;
        session
            .sign(&self.buf[..icv_off], &mut mac)
            .map_err(PacketError::CryptoOp)?;
        self.buf[icv_off..icv_off + icv_len].copy_from_slice(&mac);
        Ok(())
    }

    /// Verify, decrypt and re-index the SK payload of a parsed inbound
    /// packet. The recovered inner payloads and notifications are
    /// appended to the packet's indices.
    ///
    /// Failures never produce an error notification; an adversary must
    /// not learn which step rejected the packet.
    pub fn decrypt(&mut self, sa: &IkeSa) -> Result<(), PacketError> {
        let Some(&sk) = self
            .payloads
            .iter()
            .find(|p| p.kind == PayloadType::Encrypted)
        else {
            return Err(PacketError::Malformed("no SK payload to decrypt"));
        };
        let mode = alg::mode(sa.encr);
        let iv_len = alg::iv_size(sa.encr);
        let icv_len = alg::icv_size(sa.encr, sa.auth);
        if sk.len < iv_len + icv_len + 1 {
            info!(
                "SK payload too small: len {} iv {iv_len} icv {icv_len}",
                sk.len
            );
            return Err(PacketError::Malformed("SK payload too small"));
        }
        let iv_off = sk.off;
        let data_off = iv_off + iv_len;
        let datalen = sk.len - iv_len - icv_len;
        let icv_off = data_off + datalen;

        let aead = matches!(mode, EncrMode::Ccm | EncrMode::Gcm);
        if !aead && sa.auth != IntegrityAlgorithm::None {
            let kind = alg::auth_mechanism(sa.auth)
                .ok_or(PacketError::Unsupported("no MAC mechanism for the ICV"))?;
            let session = sa.pool.session().map_err(PacketError::CryptoInit)?;
            session
                .verify_init(&Mechanism::raw(kind), sa.auth_key())
                .map_err(PacketError::CryptoInit)?;
            session
                .verify(
                    &self.buf[..icv_off],
                    &self.buf[icv_off..icv_off + icv_len],
                )
                .map_err(integrity_error)?;
        }

        if mode != EncrMode::None {
            let iv = self.buf[iv_off..data_off].to_vec();
            let mech = sk_mechanism(sa, &iv, &self.buf[..iv_off], icv_len)?;
            let session = sa.pool.session().map_err(PacketError::CryptoInit)?;
            session
                .decrypt_init(&mech, sa.encr_key())
                .map_err(PacketError::CryptoInit)?;
            let (payload, tag) = self.buf.split_at_mut(icv_off);
            let data = &mut payload[data_off..];
            if aead {
                session.decrypt(data, &tag[..icv_len]).map_err(integrity_error)?;
            } else {
                session.decrypt(data, &[]).map_err(PacketError::CryptoOp)?;
            }
        }

        let padlen = self.buf[icv_off - 1] as usize;
        if padlen + 1 > datalen {
            return Err(PacketError::Malformed("pad length exceeds the SK payload"));
        }
        let plaintext_len = datalen - padlen - 1;

        if sa.vendor_peer {
            // Only peers running this implementation promise
            // PKCS#7-valued padding; RFC 7296 §3.14 lets everyone else
            // send arbitrary bytes.
            let pad = &self.buf[data_off + plaintext_len..icv_off - 1];
            if let Some(at) = pad.iter().position(|&b| b as usize != padlen) {
                warn!("padding validation failed at offset {at}, pad length {padlen}");
                return Err(PacketError::Malformed("invalid padding from a known peer"));
            }
        }

        // the SK generic header names the first inner payload
        let first = self.buf[sk.off - 4];
        let mut counts = [0usize; NUM_PAYLOAD_KINDS];
        let mut payloads = Vec::new();
        let mut notifies = Vec::new();
        walk(
            &self.buf[data_off..data_off + plaintext_len],
            data_off,
            first,
            &mut counts,
            &mut self.unknown_critical,
            &mut payloads,
            &mut notifies,
        )?;
        self.payloads.extend(payloads);
        self.notifies.extend(notifies);
        Ok(())
    }
}

fn integrity_error(err: TokenError) -> PacketError {
    match err {
        TokenError::SignatureInvalid => {
            warn!("integrity check failed");
            PacketError::Integrity
        }
        other => PacketError::CryptoOp(other),
    }
}

/// Assemble the token mechanism for the bulk cipher of `sa`, given the
/// wire IV and the associated-data prefix (header start up to the IV).
fn sk_mechanism(
    sa: &IkeSa,
    iv: &[u8],
    aad: &[u8],
    icv_len: usize,
) -> Result<Mechanism, PacketError> {
    let kind = alg::encr_mechanism(sa.encr)
        .ok_or(PacketError::Unsupported("cipher has no token mechanism"))?;
    let params = match alg::mode(sa.encr) {
        EncrMode::None => MechParams::None,
        EncrMode::Cbc => MechParams::Iv(iv.to_vec()),
        EncrMode::Ctr => {
            // RFC 3686 counter block: keyed nonce, the wire IV, then a
            // block counter starting at one
            let mut block = [0u8; 16];
            let salt = sa.salt.len().min(4);
            block[..salt].copy_from_slice(&sa.salt[..salt]);
            block[4..4 + iv.len()].copy_from_slice(iv);
            block[12..].copy_from_slice(&1u32.to_be_bytes());
            MechParams::Ctr(block.to_vec())
        }
        EncrMode::Ccm => {
            let mut nonce = Vec::with_capacity(sa.salt.len() + iv.len());
            nonce.extend_from_slice(&sa.salt);
            nonce.extend_from_slice(iv);
            MechParams::Ccm {
                nonce,
                aad: aad.to_vec(),
                mac_len: icv_len,
            }
        }
        EncrMode::Gcm => {
            let mut full_iv = Vec::with_capacity(sa.salt.len() + iv.len());
            full_iv.extend_from_slice(&sa.salt);
            full_iv.extend_from_slice(iv);
            MechParams::Gcm {
                iv: full_iv,
                aad: aad.to_vec(),
                tag_bits: icv_len * 8,
            }
        }
    };
    Ok(Mechanism { kind, params })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use ikev2_token::soft::SoftToken;
    use ikev2_token::{MechKind, SessionPool};

    use crate::definitions::params::{
        AuthenticationMethod, EncryptionAlgorithm, ExchangeType, SecurityProtocol, TransformType,
    };
    use crate::packet::{Id, Packet};

    use super::*;

    fn crypto_sa(
        encr: EncryptionAlgorithm,
        auth: IntegrityAlgorithm,
        key_len: usize,
        auth_key_len: usize,
        salt_len: usize,
    ) -> IkeSa {
        let pool = Arc::new(SessionPool::new(Arc::new(SoftToken::new())));
        let (sk_e, sk_a) = {
            let session = pool.session().unwrap();
            let sk_e = session.create_key(&vec![0x41u8; key_len]).unwrap();
            let sk_a = if auth_key_len > 0 {
                session.create_key(&vec![0x42u8; auth_key_len]).unwrap()
            } else {
                0
            };
            (sk_e, sk_a)
        };
        IkeSa {
            encr,
            auth,
            salt: vec![0x5a; salt_len],
            sk_ei: sk_e,
            sk_er: sk_e,
            sk_ai: sk_a,
            sk_ar: sk_a,
            initiator: true,
            vendor_peer: false,
            pool,
        }
    }

    fn build_ike_auth(sa: &IkeSa, message_id: u32) -> Vec<u8> {
        let mut pkt =
            Packet::new_initiator(0x0102030405060708, 0x1111222233334444, ExchangeType::IkeAuth, message_id);
        pkt.add_sk(sa).unwrap();
        pkt.add_id_i(&Id::Fqdn("gw.example.net")).unwrap();
        pkt.add_auth(AuthenticationMethod::SharedKeyMessageIntegrityCode, &[0x6b; 32])
            .unwrap();
        pkt.add_sa().unwrap();
        pkt.add_proposal(1, SecurityProtocol::EncapsulatingSecurityPayload, 0x01020304)
            .unwrap();
        pkt.add_transform(TransformType::EncryptionAlgorithm, 12).unwrap();
        pkt.add_ts_i().unwrap();
        let from = "10.1.0.0:0".parse().unwrap();
        let to = "10.1.255.255:65535".parse().unwrap();
        pkt.add_ts(0, &from, &to).unwrap();
        pkt.add_ts_r().unwrap();
        pkt.add_ts(0, &from, &to).unwrap();
        pkt.finalize(sa).unwrap();
        pkt.as_bytes().to_vec()
    }

    fn inner_kinds(pkt: &Packet) -> Vec<PayloadType> {
        pkt.payloads().iter().map(|p| p.kind).collect()
    }

    const INNER: [PayloadType; 6] = [
        PayloadType::Encrypted,
        PayloadType::IdInitiator,
        PayloadType::Authentication,
        PayloadType::SecurityAssociation,
        PayloadType::TsInitiator,
        PayloadType::TsResponder,
    ];

    #[test]
    fn cbc_hmac_round_trip() {
        let sa = crypto_sa(
            EncryptionAlgorithm::AesCbc,
            IntegrityAlgorithm::HmacSha2_256_128,
            32,
            32,
            0,
        );
        let raw = build_ike_auth(&sa, 1);

        let mut pkt = Packet::parse(raw).unwrap();
        assert_eq!(inner_kinds(&pkt), [PayloadType::Encrypted]);

        let sk = *pkt.payload(PayloadType::Encrypted).unwrap();
        // iv | ciphertext+pad+padlen | icv, ciphertext a block multiple
        assert_eq!((sk.len - 16 - 16) % 16, 0);

        pkt.decrypt(&sa).unwrap();
        assert_eq!(inner_kinds(&pkt), INNER);
        let id = pkt.payload(PayloadType::IdInitiator).unwrap();
        assert_eq!(&pkt.payload_bytes(id)[4..], b"gw.example.net");
        assert_eq!(format!("{pkt}"), "SK, IDi, AUTH, SA, TSi, TSr");
    }

    #[test]
    fn tampered_ciphertext_fails_integrity() {
        let sa = crypto_sa(
            EncryptionAlgorithm::AesCbc,
            IntegrityAlgorithm::HmacSha2_256_128,
            32,
            32,
            0,
        );
        let mut raw = build_ike_auth(&sa, 1);
        raw[28 + 4 + 16 + 2] ^= 0x01; // one ciphertext byte

        let mut pkt = Packet::parse(raw).unwrap();
        assert!(matches!(pkt.decrypt(&sa), Err(PacketError::Integrity)));
        // nothing was indexed beyond the SK payload
        assert_eq!(inner_kinds(&pkt), [PayloadType::Encrypted]);
    }

    #[test]
    fn tampered_icv_fails_integrity() {
        let sa = crypto_sa(
            EncryptionAlgorithm::AesCbc,
            IntegrityAlgorithm::HmacSha2_256_128,
            32,
            32,
            0,
        );
        let mut raw = build_ike_auth(&sa, 1);
        let last = raw.len() - 1;
        raw[last] ^= 0x80;
        let mut pkt = Packet::parse(raw).unwrap();
        assert!(matches!(pkt.decrypt(&sa), Err(PacketError::Integrity)));
    }

    #[test]
    fn gcm_round_trip_and_header_aad() {
        let sa = crypto_sa(EncryptionAlgorithm::AesGcm16, IntegrityAlgorithm::None, 32, 0, 4);
        let raw = build_ike_auth(&sa, 2);

        let mut pkt = Packet::parse(raw.clone()).unwrap();
        pkt.decrypt(&sa).unwrap();
        assert_eq!(inner_kinds(&pkt), INNER);

        // flipping a header bit breaks the associated data
        let mut bad = raw;
        bad[19] = 0x20; // INITIATOR became RESPONSE, still parseable
        let mut pkt = Packet::parse(bad).unwrap();
        assert!(matches!(pkt.decrypt(&sa), Err(PacketError::Integrity)));
    }

    #[test]
    fn ccm_round_trip() {
        let sa = crypto_sa(EncryptionAlgorithm::AesCcm8, IntegrityAlgorithm::None, 16, 0, 3);
        let raw = build_ike_auth(&sa, 3);
        let mut pkt = Packet::parse(raw).unwrap();
        pkt.decrypt(&sa).unwrap();
        assert_eq!(inner_kinds(&pkt), INNER);
    }

    #[test]
    fn ctr_round_trip() {
        let sa = crypto_sa(
            EncryptionAlgorithm::AesCtr,
            IntegrityAlgorithm::HmacSha1_96,
            32,
            20,
            0,
        );
        let raw = build_ike_auth(&sa, 4);
        let mut pkt = Packet::parse(raw).unwrap();
        pkt.decrypt(&sa).unwrap();
        assert_eq!(inner_kinds(&pkt), INNER);
    }

    #[test]
    fn null_encryption_still_authenticates() {
        let sa = crypto_sa(
            EncryptionAlgorithm::Null,
            IntegrityAlgorithm::HmacSha2_512_256,
            0,
            64,
            0,
        );
        let raw = build_ike_auth(&sa, 5);
        let mut pkt = Packet::parse(raw.clone()).unwrap();
        pkt.decrypt(&sa).unwrap();
        assert_eq!(inner_kinds(&pkt), INNER);

        let mut bad = raw;
        let len = bad.len();
        bad[len - 40] ^= 1;
        let mut pkt = Packet::parse(bad).unwrap();
        assert!(matches!(pkt.decrypt(&sa), Err(PacketError::Integrity)));
    }

    #[test]
    fn cbc_iv_differs_across_message_ids() {
        let sa = crypto_sa(
            EncryptionAlgorithm::AesCbc,
            IntegrityAlgorithm::HmacSha2_256_128,
            32,
            32,
            0,
        );
        let one = build_ike_auth(&sa, 1);
        let two = build_ike_auth(&sa, 2);
        assert_ne!(&one[32..48], &two[32..48]);
    }

    /// Hand-assemble an SK payload with deliberately wrong padding bytes
    /// (no MAC, so the padding is the only thing to object to).
    fn misopadded_datagram(sa: &IkeSa) -> Vec<u8> {
        let mut plain = [0u8; 16];
        plain[..8].copy_from_slice(&[0x00, 0x00, 0x00, 0x08, 0xde, 0xad, 0xbe, 0xef]);
        // seven padding octets left zero instead of 0x07
        plain[15] = 7;

        let iv = [0x55u8; 16];
        let session = sa.pool.session().unwrap();
        let mech = Mechanism {
            kind: MechKind::AesCbc,
            params: MechParams::Iv(iv.to_vec()),
        };
        session.encrypt_init(&mech, sa.sk_ei).unwrap();
        session.encrypt(&mut plain, &mut []).unwrap();

        let mut buf = Vec::new();
        buf.extend_from_slice(&1u64.to_be_bytes());
        buf.extend_from_slice(&2u64.to_be_bytes());
        buf.extend_from_slice(&[46, 0x20, 35, 0x08]); // SK next, v2.0, IKE_AUTH, initiator
        buf.extend_from_slice(&1u32.to_be_bytes()); // message id
        buf.extend_from_slice(&64u32.to_be_bytes()); // length
        buf.extend_from_slice(&[43, 0x00, 0x00, 36]); // SK header chaining to a vendor payload
        buf.extend_from_slice(&iv);
        buf.extend_from_slice(&plain);
        buf
    }

    #[test]
    fn padding_is_validated_only_for_known_peers() {
        let mut strict = crypto_sa(EncryptionAlgorithm::AesCbc, IntegrityAlgorithm::None, 32, 0, 0);
        strict.vendor_peer = true;

        let mut pkt = Packet::parse(misopadded_datagram(&strict)).unwrap();
        assert!(matches!(
            pkt.decrypt(&strict),
            Err(PacketError::Malformed(_))
        ));

        let mut lax = crypto_sa(EncryptionAlgorithm::AesCbc, IntegrityAlgorithm::None, 32, 0, 0);
        lax.vendor_peer = false;
        let mut pkt = Packet::parse(misopadded_datagram(&lax)).unwrap();
        pkt.decrypt(&lax).unwrap();
        assert_eq!(
            inner_kinds(&pkt),
            [PayloadType::Encrypted, PayloadType::VendorId]
        );
    }
}

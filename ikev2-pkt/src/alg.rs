//! Algorithm metadata driving the SK payload envelope
//!
//! Pure tables mapping negotiated transform identifiers to block, IV,
//! ICV and salt sizes, the cipher mode, the token mechanism, and key
//! lengths. Every match is exhaustive without a wildcard arm on purpose:
//! adding a new algorithm variant must fail compilation until each table
//! has an entry for it.

use ikev2_token::MechKind;

use crate::definitions::params::{EncryptionAlgorithm, IntegrityAlgorithm};

/// Structural mode of a negotiated cipher, deciding IV handling,
/// padding and whether the cipher authenticates on its own
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EncrMode {
    /// No cipher runs; the SK payload is laid out but left in the clear
    None,
    /// Block chaining with an unpredictable IV and a separate MAC
    Cbc,
    /// Counter mode with a separate MAC
    Ctr,
    /// Counter with CBC-MAC, self-authenticating
    Ccm,
    /// Galois/Counter mode, self-authenticating
    Gcm,
}

/// Cipher block size in octets; zero for the NULL pseudo-ciphers
pub fn block_size(encr: EncryptionAlgorithm) -> usize {
    use EncryptionAlgorithm as E;
    match encr {
        E::Null | E::NullAesGmac => 0,
        E::DesIv64
        | E::Des
        | E::DesIv32
        | E::TripleDes
        | E::Rc5
        | E::Rc4
        | E::Idea
        | E::Cast
        | E::Blowfish
        | E::TripleIdea => 8,
        E::AesCbc
        | E::AesCtr
        | E::XtsAes
        | E::AesCcm8
        | E::AesCcm12
        | E::AesCcm16
        | E::AesGcm8
        | E::AesGcm12
        | E::AesGcm16
        | E::CamelliaCbc
        | E::CamelliaCtr
        | E::CamelliaCcm8
        | E::CamelliaCcm12
        | E::CamelliaCcm16 => 16,
    }
}

/// Octets of IV written to the wire directly after the SK generic header
pub fn iv_size(encr: EncryptionAlgorithm) -> usize {
    use EncryptionAlgorithm as E;
    match encr {
        E::Null | E::NullAesGmac => 0,
        E::DesIv32 => 4,
        E::DesIv64 | E::Des | E::TripleDes | E::Rc5 | E::Rc4 | E::Idea | E::Cast | E::Blowfish
        | E::TripleIdea => 8,
        E::AesCbc | E::CamelliaCbc | E::XtsAes => 16,
        // counter and combined modes transmit an 8-octet IV and build
        // the full nonce from the keyed salt, RFC 3686 / 4106 / 4309
        E::AesCtr
        | E::CamelliaCtr
        | E::AesCcm8
        | E::AesCcm12
        | E::AesCcm16
        | E::AesGcm8
        | E::AesGcm12
        | E::AesGcm16
        | E::CamelliaCcm8
        | E::CamelliaCcm12
        | E::CamelliaCcm16 => 8,
    }
}

/// Octets of keyed salt prepended to the wire IV to form the nonce
pub fn salt_size(encr: EncryptionAlgorithm) -> usize {
    use EncryptionAlgorithm as E;
    match encr {
        E::AesCcm8
        | E::AesCcm12
        | E::AesCcm16
        | E::CamelliaCcm8
        | E::CamelliaCcm12
        | E::CamelliaCcm16 => 3,
        E::AesGcm8 | E::AesGcm12 | E::AesGcm16 => 4,
        E::DesIv64
        | E::Des
        | E::TripleDes
        | E::Rc5
        | E::Idea
        | E::Cast
        | E::Blowfish
        | E::TripleIdea
        | E::DesIv32
        | E::Rc4
        | E::Null
        | E::AesCbc
        | E::AesCtr
        | E::NullAesGmac
        | E::XtsAes
        | E::CamelliaCbc
        | E::CamelliaCtr => 0,
    }
}

/// Structural mode of the cipher
pub fn mode(encr: EncryptionAlgorithm) -> EncrMode {
    use EncryptionAlgorithm as E;
    match encr {
        E::Null | E::NullAesGmac | E::XtsAes => EncrMode::None,
        E::DesIv64
        | E::Des
        | E::DesIv32
        | E::TripleDes
        | E::Rc5
        | E::Rc4
        | E::Idea
        | E::Cast
        | E::Blowfish
        | E::TripleIdea
        | E::AesCbc
        | E::CamelliaCbc => EncrMode::Cbc,
        E::AesCtr | E::CamelliaCtr => EncrMode::Ctr,
        E::AesCcm8
        | E::AesCcm12
        | E::AesCcm16
        | E::CamelliaCcm8
        | E::CamelliaCcm12
        | E::CamelliaCcm16 => EncrMode::Ccm,
        E::AesGcm8 | E::AesGcm12 | E::AesGcm16 => EncrMode::Gcm,
    }
}

/// ICV length in octets for a negotiated cipher/integrity pair
///
/// Combined-mode ciphers fix the ICV by their suffix and must be
/// negotiated with no separate integrity algorithm.
pub fn icv_size(encr: EncryptionAlgorithm, auth: IntegrityAlgorithm) -> usize {
    use EncryptionAlgorithm as E;
    match encr {
        E::AesCcm8 | E::AesGcm8 | E::CamelliaCcm8 => {
            debug_assert_eq!(auth, IntegrityAlgorithm::None);
            return 8;
        }
        E::AesCcm12 | E::AesGcm12 | E::CamelliaCcm12 => {
            debug_assert_eq!(auth, IntegrityAlgorithm::None);
            return 12;
        }
        E::AesCcm16 | E::AesGcm16 | E::CamelliaCcm16 => {
            debug_assert_eq!(auth, IntegrityAlgorithm::None);
            return 16;
        }
        E::Null
        | E::NullAesGmac
        | E::DesIv64
        | E::Des
        | E::DesIv32
        | E::TripleDes
        | E::Rc5
        | E::Rc4
        | E::Idea
        | E::Cast
        | E::Blowfish
        | E::TripleIdea
        | E::AesCbc
        | E::AesCtr
        | E::XtsAes
        | E::CamelliaCbc
        | E::CamelliaCtr => {}
    }

    use IntegrityAlgorithm as A;
    match auth {
        A::None => 0,
        A::HmacMd5_96 | A::HmacSha1_96 | A::AesXcbc96 | A::AesCmac96 => 12,
        A::DesMac | A::KpdkMd5 | A::HmacMd5_128 | A::Aes128Gmac | A::HmacSha2_256_128 => 16,
        A::HmacSha1_160 => 20,
        A::Aes192Gmac | A::HmacSha2_384_192 => 24,
        A::Aes256Gmac | A::HmacSha2_512_256 => 32,
    }
}

/// Token mechanism performing the bulk cipher, if one exists
pub fn encr_mechanism(encr: EncryptionAlgorithm) -> Option<MechKind> {
    use EncryptionAlgorithm as E;
    match encr {
        E::Null | E::NullAesGmac | E::TripleIdea | E::XtsAes => None,
        E::DesIv64 | E::Des | E::DesIv32 => Some(MechKind::DesCbc),
        E::TripleDes => Some(MechKind::Des3Cbc),
        E::Rc5 => Some(MechKind::Rc5Cbc),
        E::Rc4 => Some(MechKind::Rc4),
        E::Idea => Some(MechKind::IdeaCbc),
        E::Cast => Some(MechKind::Cast5Cbc),
        E::Blowfish => Some(MechKind::BlowfishCbc),
        E::AesCbc => Some(MechKind::AesCbc),
        E::AesCtr => Some(MechKind::AesCtr),
        E::AesCcm8 | E::AesCcm12 | E::AesCcm16 => Some(MechKind::AesCcm),
        E::AesGcm8 | E::AesGcm12 | E::AesGcm16 => Some(MechKind::AesGcm),
        E::CamelliaCbc => Some(MechKind::CamelliaCbc),
        E::CamelliaCtr => Some(MechKind::CamelliaCtr),
        E::CamelliaCcm8 | E::CamelliaCcm12 | E::CamelliaCcm16 => Some(MechKind::CamelliaCcm),
    }
}

/// ECB mechanism used to derive the unpredictable CBC IV, if one exists
pub fn ecb_mechanism(encr: EncryptionAlgorithm) -> Option<MechKind> {
    use EncryptionAlgorithm as E;
    match encr {
        E::AesCbc => Some(MechKind::AesEcb),
        E::CamelliaCbc => Some(MechKind::CamelliaEcb),
        E::Null
        | E::NullAesGmac
        | E::DesIv64
        | E::Des
        | E::DesIv32
        | E::TripleDes
        | E::Rc5
        | E::Rc4
        | E::Idea
        | E::Cast
        | E::Blowfish
        | E::TripleIdea
        | E::AesCtr
        | E::AesCcm8
        | E::AesCcm12
        | E::AesCcm16
        | E::AesGcm8
        | E::AesGcm12
        | E::AesGcm16
        | E::XtsAes
        | E::CamelliaCtr
        | E::CamelliaCcm8
        | E::CamelliaCcm12
        | E::CamelliaCcm16 => None,
    }
}

/// Token mechanism computing the separate ICV, if one exists
pub fn auth_mechanism(auth: IntegrityAlgorithm) -> Option<MechKind> {
    use IntegrityAlgorithm as A;
    match auth {
        A::None => None,
        A::HmacMd5_96 | A::HmacMd5_128 | A::KpdkMd5 => Some(MechKind::HmacMd5),
        A::HmacSha1_96 | A::HmacSha1_160 => Some(MechKind::HmacSha1),
        A::DesMac => Some(MechKind::DesMac),
        A::AesXcbc96 => Some(MechKind::AesXcbcMac96),
        A::AesCmac96 => Some(MechKind::AesCmac),
        A::Aes128Gmac | A::Aes192Gmac | A::Aes256Gmac => Some(MechKind::AesGmac),
        A::HmacSha2_256_128 => Some(MechKind::HmacSha256),
        A::HmacSha2_384_192 => Some(MechKind::HmacSha384),
        A::HmacSha2_512_256 => Some(MechKind::HmacSha512),
    }
}

/// Octets of keying material a cipher consumes for a negotiated key
/// length attribute, or `None` when the attribute is invalid for it
///
/// Fixed-key ciphers ignore the attribute entirely. The AES and
/// Camellia families accept exactly 128, 192 or 256 bits. Combined
/// modes and GMAC include their keyed salt, per RFC 4106/4309/4543.
pub fn encr_key_octets(encr: EncryptionAlgorithm, attr_bits: u16) -> Option<usize> {
    use EncryptionAlgorithm as E;
    let stepped = |bits: u16, salt: usize| match bits {
        128 | 192 | 256 => Some(bits as usize / 8 + salt),
        _ => None,
    };
    match encr {
        E::Null => Some(0),
        E::DesIv64 | E::Des | E::DesIv32 => Some(8),
        E::TripleDes => Some(24),
        E::Idea | E::TripleIdea => Some(16),
        E::Rc4 | E::Rc5 | E::Blowfish | E::Cast => {
            if attr_bits == 0 || attr_bits % 8 != 0 {
                None
            } else {
                Some(attr_bits as usize / 8)
            }
        }
        E::AesCbc | E::AesCtr | E::CamelliaCbc | E::CamelliaCtr | E::XtsAes => {
            stepped(attr_bits, 0)
        }
        E::AesCcm8 | E::AesCcm12 | E::AesCcm16 | E::CamelliaCcm8 | E::CamelliaCcm12
        | E::CamelliaCcm16 => stepped(attr_bits, 3),
        E::AesGcm8 | E::AesGcm12 | E::AesGcm16 | E::NullAesGmac => stepped(attr_bits, 4),
    }
}

/// Octets of keying material an integrity algorithm consumes
///
/// HMAC keys are the hash output length (RFC 2404, RFC 4868); the GMAC
/// figures include the 4-octet salt of RFC 4543.
pub fn auth_key_octets(auth: IntegrityAlgorithm) -> usize {
    use IntegrityAlgorithm as A;
    match auth {
        A::None => 0,
        A::DesMac => 8,
        A::HmacMd5_96 | A::HmacMd5_128 | A::KpdkMd5 | A::AesXcbc96 | A::AesCmac96 => 16,
        A::HmacSha1_96 | A::HmacSha1_160 => 20,
        A::Aes128Gmac => 20,
        A::Aes192Gmac => 28,
        A::Aes256Gmac => 36,
        A::HmacSha2_256_128 => 32,
        A::HmacSha2_384_192 => 48,
        A::HmacSha2_512_256 => 64,
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn wire_iv_never_exceeds_the_block() {
        for encr in EncryptionAlgorithm::iter() {
            let (block, iv) = (block_size(encr), iv_size(encr));
            assert!(iv <= 16, "{encr:?}");
            if block == 0 {
                assert_eq!(iv, 0, "{encr:?}");
            }
        }
    }

    #[test]
    fn salt_only_for_combined_modes() {
        for encr in EncryptionAlgorithm::iter() {
            match mode(encr) {
                EncrMode::Ccm => assert_eq!(salt_size(encr), 3, "{encr:?}"),
                EncrMode::Gcm => assert_eq!(salt_size(encr), 4, "{encr:?}"),
                EncrMode::None | EncrMode::Cbc | EncrMode::Ctr => {
                    assert_eq!(salt_size(encr), 0, "{encr:?}")
                }
            }
            // the full nonce must fit a cipher block
            assert!(salt_size(encr) + iv_size(encr) <= 16, "{encr:?}");
        }
    }

    #[test]
    fn combined_modes_fix_their_icv() {
        assert_eq!(
            icv_size(EncryptionAlgorithm::AesGcm16, IntegrityAlgorithm::None),
            16
        );
        assert_eq!(
            icv_size(EncryptionAlgorithm::AesCcm8, IntegrityAlgorithm::None),
            8
        );
        assert_eq!(
            icv_size(
                EncryptionAlgorithm::AesCbc,
                IntegrityAlgorithm::HmacSha2_256_128
            ),
            16
        );
        assert_eq!(
            icv_size(EncryptionAlgorithm::AesCbc, IntegrityAlgorithm::HmacSha1_96),
            12
        );
        assert_eq!(
            icv_size(EncryptionAlgorithm::AesCbc, IntegrityAlgorithm::None),
            0
        );
    }

    #[test]
    fn aes_key_lengths_follow_the_attribute() {
        assert_eq!(encr_key_octets(EncryptionAlgorithm::AesCbc, 256), Some(32));
        assert_eq!(encr_key_octets(EncryptionAlgorithm::AesGcm16, 128), Some(20));
        assert_eq!(encr_key_octets(EncryptionAlgorithm::AesCcm8, 192), Some(27));
        assert_eq!(encr_key_octets(EncryptionAlgorithm::AesCbc, 200), None);
        assert_eq!(encr_key_octets(EncryptionAlgorithm::TripleDes, 0), Some(24));
        assert_eq!(auth_key_octets(IntegrityAlgorithm::HmacSha2_256_128), 32);
        assert_eq!(auth_key_octets(IntegrityAlgorithm::HmacSha1_96), 20);
    }

    #[test]
    fn every_mac_needing_cipher_has_a_mechanism() {
        for auth in IntegrityAlgorithm::iter() {
            if auth == IntegrityAlgorithm::None {
                assert!(auth_mechanism(auth).is_none());
            } else {
                assert!(auth_mechanism(auth).is_some(), "{auth:?}");
            }
        }
    }
}

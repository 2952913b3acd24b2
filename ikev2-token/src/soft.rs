//! In-memory software token
//!
//! [`SoftToken`] implements the [`Token`] contract on top of the
//! RustCrypto primitives. It backs the daemon when no hardware provider
//! is configured and is what every cryptographic test runs against.
//!
//! Mechanism coverage is the AES family (ECB, CBC, CTR, GCM with 96- or
//! 128-bit tags, CCM with 64/96/128-bit tags) plus HMAC-SHA1 and the
//! HMAC-SHA2 sizes. Everything else answers
//! [`TokenError::MechanismInvalid`]; the packet codec treats that the
//! same way it treats a hardware token lacking a mechanism.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{
    BlockDecrypt, BlockDecryptMut, BlockEncrypt, BlockEncryptMut, KeyInit, KeyIvInit, StreamCipher,
};
use aes_gcm::aead::AeadInPlace;
use aes_gcm::AesGcm;
use ccm::consts::{U11, U12, U16, U8};
use ccm::Ccm;
use hmac::{Hmac, Mac};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::mech::{MechKind, MechParams, Mechanism};
use crate::token::{ObjectHandle, SessionHandle, Token, TokenError};

/// Select a concrete AES type by key length and evaluate `$body` with it.
macro_rules! with_aes {
    ($key:expr, $aes:ident, $body:expr) => {
        match $key.len() {
            16 => {
                type $aes = aes::Aes128;
                $body
            }
            24 => {
                type $aes = aes::Aes192;
                $body
            }
            32 => {
                type $aes = aes::Aes256;
                $body
            }
            _ => Err(TokenError::KeySizeRange),
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpKind {
    Encrypt,
    Decrypt,
    Sign,
    Verify,
}

struct PendingOp {
    kind: OpKind,
    mech: Mechanism,
    key: Zeroizing<Vec<u8>>,
}

/// Software implementation of the [`Token`] contract
///
/// Key objects are process-global (PKCS#11 shares objects between the
/// sessions of one process) and zeroized on destruction. Each session
/// carries at most one pending operation, armed by the `*_init` call and
/// consumed by the single-part operation.
#[derive(Default)]
pub struct SoftToken {
    sessions: Mutex<HashMap<SessionHandle, Option<PendingOp>>>,
    objects: Mutex<HashMap<ObjectHandle, Zeroizing<Vec<u8>>>>,
    next_handle: AtomicU64,
}

impl SoftToken {
    /// Create an empty token.
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionHandle, Option<PendingOp>>> {
        match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn objects(&self) -> MutexGuard<'_, HashMap<ObjectHandle, Zeroizing<Vec<u8>>>> {
        match self.objects.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn begin(
        &self,
        session: SessionHandle,
        kind: OpKind,
        mech: &Mechanism,
        key: ObjectHandle,
    ) -> Result<(), TokenError> {
        let material = self
            .objects()
            .get(&key)
            .cloned()
            .ok_or(TokenError::KeyHandleInvalid)?;
        let mut sessions = self.sessions();
        let slot = sessions
            .get_mut(&session)
            .ok_or(TokenError::SessionHandleInvalid)?;
        *slot = Some(PendingOp {
            kind,
            mech: mech.clone(),
            key: material,
        });
        Ok(())
    }

    fn take(&self, session: SessionHandle, kind: OpKind) -> Result<PendingOp, TokenError> {
        let mut sessions = self.sessions();
        let slot = sessions
            .get_mut(&session)
            .ok_or(TokenError::SessionHandleInvalid)?;
        match slot.take() {
            Some(op) if op.kind == kind => Ok(op),
            _ => Err(TokenError::OperationNotInitialized),
        }
    }
}

impl Token for SoftToken {
    fn open_session(&self) -> Result<SessionHandle, TokenError> {
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed) + 1;
        self.sessions().insert(handle, None);
        Ok(handle)
    }

    fn close_session(&self, session: SessionHandle) -> Result<(), TokenError> {
        self.sessions()
            .remove(&session)
            .map(|_| ())
            .ok_or(TokenError::SessionHandleInvalid)
    }

    fn create_key(
        &self,
        session: SessionHandle,
        material: &[u8],
    ) -> Result<ObjectHandle, TokenError> {
        if !self.sessions().contains_key(&session) {
            return Err(TokenError::SessionHandleInvalid);
        }
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed) + 1;
        self.objects()
            .insert(handle, Zeroizing::new(material.to_vec()));
        Ok(handle)
    }

    fn destroy_object(
        &self,
        session: SessionHandle,
        object: ObjectHandle,
    ) -> Result<(), TokenError> {
        if !self.sessions().contains_key(&session) {
            return Err(TokenError::SessionHandleInvalid);
        }
        self.objects()
            .remove(&object)
            .map(|_| ())
            .ok_or(TokenError::KeyHandleInvalid)
    }

    fn encrypt_init(
        &self,
        session: SessionHandle,
        mech: &Mechanism,
        key: ObjectHandle,
    ) -> Result<(), TokenError> {
        self.begin(session, OpKind::Encrypt, mech, key)
    }

    fn encrypt(
        &self,
        session: SessionHandle,
        data: &mut [u8],
        tag_out: &mut [u8],
    ) -> Result<(), TokenError> {
        let op = self.take(session, OpKind::Encrypt)?;
        match op.mech.kind {
            MechKind::AesEcb => ecb_crypt(&op.key, data, true),
            MechKind::AesCbc => {
                let MechParams::Iv(iv) = &op.mech.params else {
                    return Err(TokenError::MechanismParamInvalid);
                };
                cbc_crypt(&op.key, iv, data, true)
            }
            MechKind::AesCtr => {
                let MechParams::Ctr(block) = &op.mech.params else {
                    return Err(TokenError::MechanismParamInvalid);
                };
                ctr_crypt(&op.key, block, data)
            }
            MechKind::AesGcm => {
                let MechParams::Gcm { iv, aad, tag_bits } = &op.mech.params else {
                    return Err(TokenError::MechanismParamInvalid);
                };
                gcm_encrypt(&op.key, iv, aad, *tag_bits, data, tag_out)
            }
            MechKind::AesCcm => {
                let MechParams::Ccm {
                    nonce,
                    aad,
                    mac_len,
                } = &op.mech.params
                else {
                    return Err(TokenError::MechanismParamInvalid);
                };
                ccm_encrypt(&op.key, nonce, aad, *mac_len, data, tag_out)
            }
            _ => Err(TokenError::MechanismInvalid),
        }
    }

    fn decrypt_init(
        &self,
        session: SessionHandle,
        mech: &Mechanism,
        key: ObjectHandle,
    ) -> Result<(), TokenError> {
        self.begin(session, OpKind::Decrypt, mech, key)
    }

    fn decrypt(
        &self,
        session: SessionHandle,
        data: &mut [u8],
        tag: &[u8],
    ) -> Result<(), TokenError> {
        let op = self.take(session, OpKind::Decrypt)?;
        match op.mech.kind {
            MechKind::AesEcb => ecb_crypt(&op.key, data, false),
            MechKind::AesCbc => {
                let MechParams::Iv(iv) = &op.mech.params else {
                    return Err(TokenError::MechanismParamInvalid);
                };
                cbc_crypt(&op.key, iv, data, false)
            }
            MechKind::AesCtr => {
                let MechParams::Ctr(block) = &op.mech.params else {
                    return Err(TokenError::MechanismParamInvalid);
                };
                ctr_crypt(&op.key, block, data)
            }
            MechKind::AesGcm => {
                let MechParams::Gcm { iv, aad, tag_bits } = &op.mech.params else {
                    return Err(TokenError::MechanismParamInvalid);
                };
                gcm_decrypt(&op.key, iv, aad, *tag_bits, data, tag)
            }
            MechKind::AesCcm => {
                let MechParams::Ccm {
                    nonce,
                    aad,
                    mac_len,
                } = &op.mech.params
                else {
                    return Err(TokenError::MechanismParamInvalid);
                };
                ccm_decrypt(&op.key, nonce, aad, *mac_len, data, tag)
            }
            _ => Err(TokenError::MechanismInvalid),
        }
    }

    fn sign_init(
        &self,
        session: SessionHandle,
        mech: &Mechanism,
        key: ObjectHandle,
    ) -> Result<(), TokenError> {
        self.begin(session, OpKind::Sign, mech, key)
    }

    fn sign(
        &self,
        session: SessionHandle,
        data: &[u8],
        mac_out: &mut [u8],
    ) -> Result<(), TokenError> {
        let op = self.take(session, OpKind::Sign)?;
        let full = hmac_digest(op.mech.kind, &op.key, data)?;
        if mac_out.is_empty() || mac_out.len() > full.len() {
            return Err(TokenError::DataLenRange);
        }
        mac_out.copy_from_slice(&full[..mac_out.len()]);
        Ok(())
    }

    fn verify_init(
        &self,
        session: SessionHandle,
        mech: &Mechanism,
        key: ObjectHandle,
    ) -> Result<(), TokenError> {
        self.begin(session, OpKind::Verify, mech, key)
    }

    fn verify(&self, session: SessionHandle, data: &[u8], mac: &[u8]) -> Result<(), TokenError> {
        let op = self.take(session, OpKind::Verify)?;
        let full = hmac_digest(op.mech.kind, &op.key, data)?;
        if mac.is_empty() || mac.len() > full.len() {
            return Err(TokenError::DataLenRange);
        }
        if bool::from(full[..mac.len()].ct_eq(mac)) {
            Ok(())
        } else {
            Err(TokenError::SignatureInvalid)
        }
    }
}

fn ecb_crypt(key: &[u8], data: &mut [u8], encrypt: bool) -> Result<(), TokenError> {
    if data.is_empty() || data.len() % 16 != 0 {
        return Err(TokenError::DataLenRange);
    }
    with_aes!(key, Aes, {
        let cipher = Aes::new_from_slice(key).map_err(|_| TokenError::KeySizeRange)?;
        for block in data.chunks_exact_mut(16) {
            if encrypt {
                cipher.encrypt_block(GenericArray::from_mut_slice(block));
            } else {
                cipher.decrypt_block(GenericArray::from_mut_slice(block));
            }
        }
        Ok(())
    })
}

fn cbc_crypt(key: &[u8], iv: &[u8], data: &mut [u8], encrypt: bool) -> Result<(), TokenError> {
    if iv.len() != 16 {
        return Err(TokenError::MechanismParamInvalid);
    }
    if data.is_empty() || data.len() % 16 != 0 {
        return Err(TokenError::DataLenRange);
    }
    with_aes!(key, Aes, {
        if encrypt {
            let mut cipher = cbc::Encryptor::<Aes>::new_from_slices(key, iv)
                .map_err(|_| TokenError::KeySizeRange)?;
            for block in data.chunks_exact_mut(16) {
                cipher.encrypt_block_mut(GenericArray::from_mut_slice(block));
            }
        } else {
            let mut cipher = cbc::Decryptor::<Aes>::new_from_slices(key, iv)
                .map_err(|_| TokenError::KeySizeRange)?;
            for block in data.chunks_exact_mut(16) {
                cipher.decrypt_block_mut(GenericArray::from_mut_slice(block));
            }
        }
        Ok(())
    })
}

fn ctr_crypt(key: &[u8], counter_block: &[u8], data: &mut [u8]) -> Result<(), TokenError> {
    if counter_block.len() != 16 {
        return Err(TokenError::MechanismParamInvalid);
    }
    with_aes!(key, Aes, {
        let mut cipher = ctr::Ctr128BE::<Aes>::new_from_slices(key, counter_block)
            .map_err(|_| TokenError::KeySizeRange)?;
        cipher.apply_keystream(data);
        Ok(())
    })
}

fn gcm_encrypt(
    key: &[u8],
    iv: &[u8],
    aad: &[u8],
    tag_bits: usize,
    data: &mut [u8],
    tag_out: &mut [u8],
) -> Result<(), TokenError> {
    if iv.len() != 12 {
        return Err(TokenError::MechanismParamInvalid);
    }
    with_aes!(key, Aes, match tag_bits {
        96 => aead_encrypt::<AesGcm<Aes, U12, U12>>(key, iv, aad, data, tag_out),
        128 => aead_encrypt::<AesGcm<Aes, U12, U16>>(key, iv, aad, data, tag_out),
        // The backend's minimum GCM tag width is 96 bits.
        _ => Err(TokenError::MechanismParamInvalid),
    })
}

fn gcm_decrypt(
    key: &[u8],
    iv: &[u8],
    aad: &[u8],
    tag_bits: usize,
    data: &mut [u8],
    tag: &[u8],
) -> Result<(), TokenError> {
    if iv.len() != 12 || tag.len() * 8 != tag_bits {
        return Err(TokenError::MechanismParamInvalid);
    }
    with_aes!(key, Aes, match tag_bits {
        96 => aead_decrypt::<AesGcm<Aes, U12, U12>>(key, iv, aad, data, tag),
        128 => aead_decrypt::<AesGcm<Aes, U12, U16>>(key, iv, aad, data, tag),
        _ => Err(TokenError::MechanismParamInvalid),
    })
}

fn ccm_encrypt(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    mac_len: usize,
    data: &mut [u8],
    tag_out: &mut [u8],
) -> Result<(), TokenError> {
    if nonce.len() != 11 {
        return Err(TokenError::MechanismParamInvalid);
    }
    with_aes!(key, Aes, match mac_len {
        8 => aead_encrypt::<Ccm<Aes, U8, U11>>(key, nonce, aad, data, tag_out),
        12 => aead_encrypt::<Ccm<Aes, U12, U11>>(key, nonce, aad, data, tag_out),
        16 => aead_encrypt::<Ccm<Aes, U16, U11>>(key, nonce, aad, data, tag_out),
        _ => Err(TokenError::MechanismParamInvalid),
    })
}

fn ccm_decrypt(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    mac_len: usize,
    data: &mut [u8],
    tag: &[u8],
) -> Result<(), TokenError> {
    if nonce.len() != 11 || tag.len() != mac_len {
        return Err(TokenError::MechanismParamInvalid);
    }
    with_aes!(key, Aes, match mac_len {
        8 => aead_decrypt::<Ccm<Aes, U8, U11>>(key, nonce, aad, data, tag),
        12 => aead_decrypt::<Ccm<Aes, U12, U11>>(key, nonce, aad, data, tag),
        16 => aead_decrypt::<Ccm<Aes, U16, U11>>(key, nonce, aad, data, tag),
        _ => Err(TokenError::MechanismParamInvalid),
    })
}

fn aead_encrypt<A>(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    data: &mut [u8],
    tag_out: &mut [u8],
) -> Result<(), TokenError>
where
    A: AeadInPlace + KeyInit,
{
    let cipher = A::new_from_slice(key).map_err(|_| TokenError::KeySizeRange)?;
    let tag = cipher
        .encrypt_in_place_detached(GenericArray::from_slice(nonce), aad, data)
        .map_err(|_| TokenError::General("aead encryption failed"))?;
    if tag_out.len() != tag.len() {
        return Err(TokenError::DataLenRange);
    }
    tag_out.copy_from_slice(&tag);
    Ok(())
}

fn aead_decrypt<A>(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    data: &mut [u8],
    tag: &[u8],
) -> Result<(), TokenError>
where
    A: AeadInPlace + KeyInit,
{
    let cipher = A::new_from_slice(key).map_err(|_| TokenError::KeySizeRange)?;
    cipher
        .decrypt_in_place_detached(
            GenericArray::from_slice(nonce),
            aad,
            data,
            GenericArray::from_slice(tag),
        )
        .map_err(|_| TokenError::SignatureInvalid)
}

fn hmac_digest(kind: MechKind, key: &[u8], data: &[u8]) -> Result<Vec<u8>, TokenError> {
    fn mac_bytes<M: Mac + KeyInit>(key: &[u8], data: &[u8]) -> Result<Vec<u8>, TokenError> {
        let mut mac = <M as Mac>::new_from_slice(key).map_err(|_| TokenError::KeySizeRange)?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    match kind {
        MechKind::HmacSha1 => mac_bytes::<Hmac<sha1::Sha1>>(key, data),
        MechKind::HmacSha256 => mac_bytes::<Hmac<sha2::Sha256>>(key, data),
        MechKind::HmacSha384 => mac_bytes::<Hmac<sha2::Sha384>>(key, data),
        MechKind::HmacSha512 => mac_bytes::<Hmac<sha2::Sha512>>(key, data),
        _ => Err(TokenError::MechanismInvalid),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hex_literal::hex;

    use super::*;

    fn setup(key: &[u8]) -> (SoftToken, SessionHandle, ObjectHandle) {
        let token = SoftToken::new();
        let session = token.open_session().unwrap();
        let object = token.create_key(session, key).unwrap();
        (token, session, object)
    }

    #[test]
    fn cbc_round_trip_changes_and_restores() {
        let key = [0x42u8; 32];
        let iv = [0x17u8; 16];
        let (token, session, object) = setup(&key);

        let plain = *b"an exact pair of cipher blocks!!";
        let mut buf = plain;

        let mech = Mechanism {
            kind: MechKind::AesCbc,
            params: MechParams::Iv(iv.to_vec()),
        };
        token.encrypt_init(session, &mech, object).unwrap();
        token.encrypt(session, &mut buf, &mut []).unwrap();
        assert_ne!(buf, plain);

        token.decrypt_init(session, &mech, object).unwrap();
        token.decrypt(session, &mut buf, &[]).unwrap();
        assert_eq!(buf, plain);
    }

    #[test]
    fn hmac_sha256_matches_rfc_4231_case_1() {
        let (token, session, object) = setup(&[0x0bu8; 20]);
        let mech = Mechanism::raw(MechKind::HmacSha256);

        let mut mac = [0u8; 32];
        token.sign_init(session, &mech, object).unwrap();
        token.sign(session, b"Hi There", &mut mac).unwrap();
        assert_eq!(
            mac,
            hex!("b0344c61d8db38535ca8afceaf0bf12b881dc200c9833da726e9376c2e32cff7")
        );

        // Truncated verification, as used for the 128-bit ICVs.
        token.verify_init(session, &mech, object).unwrap();
        token.verify(session, b"Hi There", &mac[..16]).unwrap();

        let mut bad = mac;
        bad[3] ^= 1;
        token.verify_init(session, &mech, object).unwrap();
        assert!(matches!(
            token.verify(session, b"Hi There", &bad[..16]),
            Err(TokenError::SignatureInvalid)
        ));
    }

    #[test]
    fn gcm_rejects_modified_aad() {
        let key = [9u8; 32];
        let (token, session, object) = setup(&key);
        let nonce = [1u8; 12];

        let mut buf = *b"sixteen byte msg";
        let mut tag = [0u8; 16];
        let mech = Mechanism {
            kind: MechKind::AesGcm,
            params: MechParams::Gcm {
                iv: nonce.to_vec(),
                aad: b"header".to_vec(),
                tag_bits: 128,
            },
        };
        token.encrypt_init(session, &mech, object).unwrap();
        token.encrypt(session, &mut buf, &mut tag).unwrap();

        let tampered = Mechanism {
            kind: MechKind::AesGcm,
            params: MechParams::Gcm {
                iv: nonce.to_vec(),
                aad: b"hEader".to_vec(),
                tag_bits: 128,
            },
        };
        token.decrypt_init(session, &tampered, object).unwrap();
        assert!(matches!(
            token.decrypt(session, &mut buf, &tag),
            Err(TokenError::SignatureInvalid)
        ));
    }

    #[test]
    fn operations_demand_matching_init() {
        let (token, session, object) = setup(&[1u8; 16]);
        let mech = Mechanism::raw(MechKind::HmacSha256);
        token.sign_init(session, &mech, object).unwrap();
        let mut out = [0u8; 16];
        assert!(matches!(
            token.encrypt(session, &mut out, &mut []),
            Err(TokenError::OperationNotInitialized)
        ));
    }
}

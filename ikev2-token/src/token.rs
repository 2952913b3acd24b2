//! The token contract: sessions, key objects and the init/operate call pairs

use thiserror::Error;

use crate::mech::Mechanism;

/// Opaque handle for a token session
pub type SessionHandle = u64;

/// Opaque handle for an object (a key) owned by the token
pub type ObjectHandle = u64;

/// Failures reported by a token implementation
///
/// The variants mirror the PKCS#11 return codes the IKEv2 daemon cares
/// about; everything else is folded into [`TokenError::General`].
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum TokenError {
    #[error("session handle is not valid")]
    SessionHandleInvalid,
    #[error("key handle is not valid")]
    KeyHandleInvalid,
    #[error("mechanism is not supported by this token")]
    MechanismInvalid,
    #[error("mechanism parameter is not valid")]
    MechanismParamInvalid,
    #[error("key size is not valid for the mechanism")]
    KeySizeRange,
    #[error("data length is not valid for the mechanism")]
    DataLenRange,
    #[error("no operation of the expected kind is active in the session")]
    OperationNotInitialized,
    #[error("signature or authentication tag did not verify")]
    SignatureInvalid,
    #[error("token failure: {0}")]
    General(&'static str),
}

/// A cryptographic token in the PKCS#11 mold
///
/// All operations are single-part and run in place on the caller's
/// buffer. AEAD mechanisms carry their tag in a dedicated argument
/// instead of appending it to the ciphertext; the caller hands in the
/// ICV slot of the packet it is working on.
///
/// Implementations must tolerate concurrent calls on distinct sessions;
/// a single session is only ever driven by one thread at a time.
pub trait Token: Send + Sync {
    /// Open a fresh session.
    fn open_session(&self) -> Result<SessionHandle, TokenError>;

    /// Close a session, destroying every object it created.
    ///
    /// Only called at process shutdown; see [`crate::pool::SessionPool`].
    fn close_session(&self, session: SessionHandle) -> Result<(), TokenError>;

    /// Import secret key material, returning the object handle for it.
    fn create_key(
        &self,
        session: SessionHandle,
        material: &[u8],
    ) -> Result<ObjectHandle, TokenError>;

    /// Destroy a key object.
    fn destroy_object(
        &self,
        session: SessionHandle,
        object: ObjectHandle,
    ) -> Result<(), TokenError>;

    /// Prepare an encryption operation in the session.
    fn encrypt_init(
        &self,
        session: SessionHandle,
        mech: &Mechanism,
        key: ObjectHandle,
    ) -> Result<(), TokenError>;

    /// Encrypt `data` in place; AEAD mechanisms write their tag to `tag_out`.
    fn encrypt(
        &self,
        session: SessionHandle,
        data: &mut [u8],
        tag_out: &mut [u8],
    ) -> Result<(), TokenError>;

    /// Prepare a decryption operation in the session.
    fn decrypt_init(
        &self,
        session: SessionHandle,
        mech: &Mechanism,
        key: ObjectHandle,
    ) -> Result<(), TokenError>;

    /// Decrypt `data` in place; AEAD mechanisms verify `tag` and fail with
    /// [`TokenError::SignatureInvalid`] on mismatch.
    fn decrypt(
        &self,
        session: SessionHandle,
        data: &mut [u8],
        tag: &[u8],
    ) -> Result<(), TokenError>;

    /// Prepare a MAC computation in the session.
    fn sign_init(
        &self,
        session: SessionHandle,
        mech: &Mechanism,
        key: ObjectHandle,
    ) -> Result<(), TokenError>;

    /// Compute a MAC over `data`, truncated to `mac_out.len()` octets.
    fn sign(
        &self,
        session: SessionHandle,
        data: &[u8],
        mac_out: &mut [u8],
    ) -> Result<(), TokenError>;

    /// Prepare a MAC verification in the session.
    fn verify_init(
        &self,
        session: SessionHandle,
        mech: &Mechanism,
        key: ObjectHandle,
    ) -> Result<(), TokenError>;

    /// Verify a (possibly truncated) MAC over `data`.
    ///
    /// A mismatch is [`TokenError::SignatureInvalid`], distinct from every
    /// other failure so callers can log integrity failures separately.
    fn verify(
        &self,
        session: SessionHandle,
        data: &[u8],
        mac: &[u8],
    ) -> Result<(), TokenError>;
}

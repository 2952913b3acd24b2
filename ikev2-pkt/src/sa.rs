//! The security-association contract consumed by the crypto envelope
//!
//! Negotiating the contents of this struct is the state machine's job;
//! the codec only reads it.

use std::sync::Arc;

use ikev2_token::{ObjectHandle, SessionPool};

use crate::definitions::params::{EncryptionAlgorithm, IntegrityAlgorithm};

/// Vendor ID payload advertised by this implementation
///
/// A peer that sent this vendor ID promises PKCS#7-valued padding inside
/// its SK payloads, which lets us validate the padding on receipt.
/// RFC 7296 §3.14 otherwise leaves the padding contents to the sender.
pub const LOCAL_VENDOR_ID: &[u8] = b"ikev2d-padchk-v1";

/// Keys, algorithm choices and peer facts of one IKE SA
///
/// The key fields are object handles living inside the token reachable
/// through `pool`; the raw keying material never passes through this
/// struct. `salt` is the keyed nonce prefix of the counter and combined
/// cipher modes, empty otherwise.
pub struct IkeSa {
    /// Negotiated bulk encryption algorithm
    pub encr: EncryptionAlgorithm,
    /// Negotiated integrity algorithm, `None` for combined-mode ciphers
    pub auth: IntegrityAlgorithm,
    /// Keyed salt derived next to the encryption keys
    pub salt: Vec<u8>,
    /// Encryption key protecting initiator-to-responder messages
    pub sk_ei: ObjectHandle,
    /// Encryption key protecting responder-to-initiator messages
    pub sk_er: ObjectHandle,
    /// Integrity key for initiator-to-responder messages
    pub sk_ai: ObjectHandle,
    /// Integrity key for responder-to-initiator messages
    pub sk_ar: ObjectHandle,
    /// Whether this end initiated the SA
    pub initiator: bool,
    /// Whether the peer advertised [`LOCAL_VENDOR_ID`] and therefore
    /// guarantees validatable padding
    pub vendor_peer: bool,
    /// Session pool over the token holding the keys
    pub pool: Arc<SessionPool>,
}

impl IkeSa {
    /// The encryption key for this end's envelope operations.
    pub(crate) fn encr_key(&self) -> ObjectHandle {
        if self.initiator {
            self.sk_ei
        } else {
            self.sk_er
        }
    }

    /// The integrity key for this end's envelope operations.
    pub(crate) fn auth_key(&self) -> ObjectHandle {
        if self.initiator {
            self.sk_ai
        } else {
            self.sk_ar
        }
    }
}

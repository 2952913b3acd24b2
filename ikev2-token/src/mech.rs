//! Mechanism descriptions handed to a token for one cryptographic operation

/// The algorithm family a token operation runs under
///
/// This is the analogue of a CK_MECHANISM_TYPE. The packet codec's
/// algorithm registry maps negotiated IKEv2 transform identifiers onto
/// these; a token implementation is free to support only a subset and
/// reject the rest with [`crate::TokenError::MechanismInvalid`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum MechKind {
    AesEcb,
    AesCbc,
    AesCtr,
    AesCcm,
    AesGcm,
    CamelliaEcb,
    CamelliaCbc,
    CamelliaCtr,
    CamelliaCcm,
    DesCbc,
    Des3Cbc,
    Rc4,
    Rc5Cbc,
    IdeaCbc,
    Cast5Cbc,
    BlowfishCbc,
    HmacMd5,
    HmacSha1,
    HmacSha256,
    HmacSha384,
    HmacSha512,
    DesMac,
    AesXcbcMac96,
    AesCmac,
    AesGmac,
}

/// Per-operation mechanism parameters
///
/// Parameters are owned so a token can keep them across the init/operate
/// pair without borrowing from the caller's packet buffer. They are all
/// small: an IV or counter block is at most 16 octets and the associated
/// data of an SK payload is the IKE header plus one payload header.
#[derive(Debug, Clone)]
pub enum MechParams {
    /// No parameter (ECB, MAC mechanisms)
    None,
    /// CBC initialization vector, one cipher block
    Iv(Vec<u8>),
    /// Full initial counter block for counter mode
    Ctr(Vec<u8>),
    /// CCM parameters
    Ccm {
        /// Nonce, salt followed by the wire IV
        nonce: Vec<u8>,
        /// Associated data, authenticated but not encrypted
        aad: Vec<u8>,
        /// MAC length in octets
        mac_len: usize,
    },
    /// GCM parameters
    Gcm {
        /// Full IV (salt followed by the wire IV)
        iv: Vec<u8>,
        /// Associated data, authenticated but not encrypted
        aad: Vec<u8>,
        /// Tag length in bits
        tag_bits: usize,
    },
}

/// A mechanism kind paired with its parameters, the unit handed to
/// [`crate::Token`] init calls
#[derive(Debug, Clone)]
pub struct Mechanism {
    /// Algorithm family
    pub kind: MechKind,
    /// Operation parameters
    pub params: MechParams,
}

impl Mechanism {
    /// Mechanism with no parameters
    pub fn raw(kind: MechKind) -> Self {
        Self {
            kind,
            params: MechParams::None,
        }
    }
}

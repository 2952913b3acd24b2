//! IKEv2 parameters and their parsers as defined in the IANA IKEv2 list
//! found at https://www.iana.org/assignments/ikev2-parameters/ikev2-parameters.xhtml

use serde::{Deserialize, Serialize};
use strum::EnumIter;

use super::UnparseableParameter;

/// Header flag marking the message as coming from the original initiator
pub const FLAG_INITIATOR: u8 = 0x08;
/// Header flag indicating a higher supported version, never sent
pub const FLAG_VERSION: u8 = 0x10;
/// Header flag marking the message as a response
pub const FLAG_RESPONSE: u8 = 0x20;

/// Generic-payload-header bit demanding rejection of unknown payloads
pub const CRITICAL_PAYLOAD: u8 = 0x80;

/// Transform-attribute bit selecting the fixed-length TV format
pub const FLAG_ATTRIBUTE_FORMAT: u16 = 0x8000;

/// Smallest assigned payload type value
pub const PAYLOAD_MIN: u8 = 33;
/// Largest payload type value this implementation accounts
pub const PAYLOAD_MAX: u8 = 49;
/// Number of accounted payload kinds, for per-kind counters
pub const NUM_PAYLOAD_KINDS: usize = (PAYLOAD_MAX - PAYLOAD_MIN + 1) as usize;

/// Type of the exchange being performed
///
/// This constrains the payloads sent in each message of the exchange.
/// Values 0-33 are reserved, 45-239 currently unassigned and 240-255
/// reserved for private use. Also see [UnparseableParameter].
#[derive(Debug, Ord, PartialOrd, Eq, PartialEq, Copy, Clone)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum ExchangeType {
    // RFC 7296
    IkeSaInit = 34,
    // RFC 7296
    IkeAuth = 35,
    // RFC 7296
    CreateChildSa = 36,
    // RFC 7296
    Informational = 37,
    // RFC 5723
    IkeSessionResume = 38,
    // draft-ietf-ipsecme-g-ikev2-22
    GsaAuth = 39,
    // draft-ietf-ipsecme-g-ikev2-22
    GsaRegistration = 40,
    // draft-ietf-ipsecme-g-ikev2-22
    GsaRekey = 41,
    // draft-ietf-ipsecme-g-ikev2-22
    GsaInbandRekey = 42,
    // RFC 9242
    IkeIntermediate = 43,
    // RFC 9370
    IkeFollowupKeyExchange = 44,
}

impl TryFrom<u8> for ExchangeType {
    type Error = UnparseableParameter;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0..=33 => Err(UnparseableParameter::Reserved),
            34 => Ok(ExchangeType::IkeSaInit),
            35 => Ok(ExchangeType::IkeAuth),
            36 => Ok(ExchangeType::CreateChildSa),
            37 => Ok(ExchangeType::Informational),
            38 => Ok(ExchangeType::IkeSessionResume),
            39 => Ok(ExchangeType::GsaAuth),
            40 => Ok(ExchangeType::GsaRegistration),
            41 => Ok(ExchangeType::GsaRekey),
            42 => Ok(ExchangeType::GsaInbandRekey),
            43 => Ok(ExchangeType::IkeIntermediate),
            44 => Ok(ExchangeType::IkeFollowupKeyExchange),
            45..=239 => Err(UnparseableParameter::Unassigned),
            240..=255 => Err(UnparseableParameter::PrivateUse),
        }
    }
}

/// Type of a payload, as carried in next-payload fields
///
/// Values 1-32 are reserved, 50-127 currently unassigned and 128-255
/// reserved for private use. Also see [UnparseableParameter].
#[derive(Debug, Ord, PartialOrd, Eq, PartialEq, Copy, Clone)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum PayloadType {
    // terminator of the payload chain, RFC 7296
    NoNextPayload = 0,
    // RFC 7296
    SecurityAssociation = 33,
    // RFC 7296
    KeyExchange = 34,
    // RFC 7296
    IdInitiator = 35,
    // RFC 7296
    IdResponder = 36,
    // RFC 7296
    Certificate = 37,
    // RFC 7296
    CertificateRequest = 38,
    // RFC 7296
    Authentication = 39,
    // RFC 7296
    Nonce = 40,
    // RFC 7296
    Notify = 41,
    // RFC 7296
    Delete = 42,
    // RFC 7296
    VendorId = 43,
    // RFC 7296
    TsInitiator = 44,
    // RFC 7296
    TsResponder = 45,
    // RFC 7296, the Encrypted and Authenticated (SK) payload
    Encrypted = 46,
    // RFC 7296
    Configuration = 47,
    // RFC 7296
    Eap = 48,
    // RFC 6467
    Gspm = 49,
}

impl PayloadType {
    /// Abbreviation used when describing a packet in logs
    pub fn short(&self) -> &'static str {
        match self {
            PayloadType::NoNextPayload => "-",
            PayloadType::SecurityAssociation => "SA",
            PayloadType::KeyExchange => "KE",
            PayloadType::IdInitiator => "IDi",
            PayloadType::IdResponder => "IDr",
            PayloadType::Certificate => "CERT",
            PayloadType::CertificateRequest => "CERTREQ",
            PayloadType::Authentication => "AUTH",
            PayloadType::Nonce => "No",
            PayloadType::Notify => "N",
            PayloadType::Delete => "D",
            PayloadType::VendorId => "V",
            PayloadType::TsInitiator => "TSi",
            PayloadType::TsResponder => "TSr",
            PayloadType::Encrypted => "SK",
            PayloadType::Configuration => "CP",
            PayloadType::Eap => "EAP",
            PayloadType::Gspm => "GSPM",
        }
    }
}

impl TryFrom<u8> for PayloadType {
    type Error = UnparseableParameter;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PayloadType::NoNextPayload),
            1..=32 => Err(UnparseableParameter::Reserved),
            33 => Ok(PayloadType::SecurityAssociation),
            34 => Ok(PayloadType::KeyExchange),
            35 => Ok(PayloadType::IdInitiator),
            36 => Ok(PayloadType::IdResponder),
            37 => Ok(PayloadType::Certificate),
            38 => Ok(PayloadType::CertificateRequest),
            39 => Ok(PayloadType::Authentication),
            40 => Ok(PayloadType::Nonce),
            41 => Ok(PayloadType::Notify),
            42 => Ok(PayloadType::Delete),
            43 => Ok(PayloadType::VendorId),
            44 => Ok(PayloadType::TsInitiator),
            45 => Ok(PayloadType::TsResponder),
            46 => Ok(PayloadType::Encrypted),
            47 => Ok(PayloadType::Configuration),
            48 => Ok(PayloadType::Eap),
            49 => Ok(PayloadType::Gspm),
            50..=127 => Err(UnparseableParameter::Unassigned),
            128..=255 => Err(UnparseableParameter::PrivateUse),
        }
    }
}

/// Protocol identifier used in proposals, notifications and deletions
#[derive(Debug, Ord, PartialOrd, Eq, PartialEq, Copy, Clone)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum SecurityProtocol {
    InternetKeyExchange = 1,
    AuthenticationHeader = 2,
    EncapsulatingSecurityPayload = 3,
    FcEspHeader = 4,
    FcCtAuthentication = 5,
}

impl TryFrom<u8> for SecurityProtocol {
    type Error = UnparseableParameter;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Err(UnparseableParameter::Reserved),
            1 => Ok(SecurityProtocol::InternetKeyExchange),
            2 => Ok(SecurityProtocol::AuthenticationHeader),
            3 => Ok(SecurityProtocol::EncapsulatingSecurityPayload),
            4 => Ok(SecurityProtocol::FcEspHeader),
            5 => Ok(SecurityProtocol::FcCtAuthentication),
            6..=200 => Err(UnparseableParameter::Unassigned),
            201..=255 => Err(UnparseableParameter::PrivateUse),
        }
    }
}

/// Type of a transform inside a proposal, RFC 7296 §3.3.2
#[derive(Debug, Ord, PartialOrd, Eq, PartialEq, Copy, Clone)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum TransformType {
    EncryptionAlgorithm = 1,
    PseudoRandomFunction = 2,
    IntegrityAlgorithm = 3,
    KeyExchangeMethod = 4,
    SequenceNumber = 5,
}

impl TryFrom<u8> for TransformType {
    type Error = UnparseableParameter;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Err(UnparseableParameter::Reserved),
            1 => Ok(TransformType::EncryptionAlgorithm),
            2 => Ok(TransformType::PseudoRandomFunction),
            3 => Ok(TransformType::IntegrityAlgorithm),
            4 => Ok(TransformType::KeyExchangeMethod),
            5 => Ok(TransformType::SequenceNumber),
            6..=240 => Err(UnparseableParameter::Unassigned),
            241..=255 => Err(UnparseableParameter::PrivateUse),
        }
    }
}

/// Transform attribute types; the key length is the only one in use
#[derive(Debug, Ord, PartialOrd, Eq, PartialEq, Copy, Clone)]
#[repr(u16)]
#[allow(missing_docs)]
pub enum AttributeType {
    KeyLength = 14,
}

/// Transform type 1: encryption algorithm identifiers
#[derive(Debug, Ord, PartialOrd, Eq, PartialEq, Copy, Clone, Serialize, Deserialize, EnumIter)]
#[repr(u16)]
#[allow(missing_docs)]
pub enum EncryptionAlgorithm {
    DesIv64 = 1,
    Des = 2,
    TripleDes = 3,
    Rc5 = 4,
    Idea = 5,
    Cast = 6,
    Blowfish = 7,
    TripleIdea = 8,
    DesIv32 = 9,
    Rc4 = 10,
    Null = 11,
    AesCbc = 12,
    AesCtr = 13,
    AesCcm8 = 14,
    AesCcm12 = 15,
    AesCcm16 = 16,
    AesGcm8 = 18,
    AesGcm12 = 19,
    AesGcm16 = 20,
    NullAesGmac = 21,
    XtsAes = 22,
    CamelliaCbc = 23,
    CamelliaCtr = 24,
    CamelliaCcm8 = 25,
    CamelliaCcm12 = 26,
    CamelliaCcm16 = 27,
}

impl TryFrom<u16> for EncryptionAlgorithm {
    type Error = UnparseableParameter;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Err(UnparseableParameter::Reserved),
            1 => Ok(EncryptionAlgorithm::DesIv64),
            2 => Ok(EncryptionAlgorithm::Des),
            3 => Ok(EncryptionAlgorithm::TripleDes),
            4 => Ok(EncryptionAlgorithm::Rc5),
            5 => Ok(EncryptionAlgorithm::Idea),
            6 => Ok(EncryptionAlgorithm::Cast),
            7 => Ok(EncryptionAlgorithm::Blowfish),
            8 => Ok(EncryptionAlgorithm::TripleIdea),
            9 => Ok(EncryptionAlgorithm::DesIv32),
            10 => Ok(EncryptionAlgorithm::Rc4),
            11 => Ok(EncryptionAlgorithm::Null),
            12 => Ok(EncryptionAlgorithm::AesCbc),
            13 => Ok(EncryptionAlgorithm::AesCtr),
            14 => Ok(EncryptionAlgorithm::AesCcm8),
            15 => Ok(EncryptionAlgorithm::AesCcm12),
            16 => Ok(EncryptionAlgorithm::AesCcm16),
            17 => Err(UnparseableParameter::Unassigned),
            18 => Ok(EncryptionAlgorithm::AesGcm8),
            19 => Ok(EncryptionAlgorithm::AesGcm12),
            20 => Ok(EncryptionAlgorithm::AesGcm16),
            21 => Ok(EncryptionAlgorithm::NullAesGmac),
            22 => Ok(EncryptionAlgorithm::XtsAes),
            23 => Ok(EncryptionAlgorithm::CamelliaCbc),
            24 => Ok(EncryptionAlgorithm::CamelliaCtr),
            25 => Ok(EncryptionAlgorithm::CamelliaCcm8),
            26 => Ok(EncryptionAlgorithm::CamelliaCcm12),
            27 => Ok(EncryptionAlgorithm::CamelliaCcm16),
            28..=1023 => Err(UnparseableParameter::Unassigned),
            1024..=65535 => Err(UnparseableParameter::PrivateUse),
        }
    }
}

/// Transform type 3: integrity algorithm identifiers
#[derive(Debug, Ord, PartialOrd, Eq, PartialEq, Copy, Clone, Serialize, Deserialize, EnumIter)]
#[repr(u16)]
#[allow(missing_docs)]
pub enum IntegrityAlgorithm {
    None = 0,
    HmacMd5_96 = 1,
    HmacSha1_96 = 2,
    DesMac = 3,
    KpdkMd5 = 4,
    AesXcbc96 = 5,
    HmacMd5_128 = 6,
    HmacSha1_160 = 7,
    AesCmac96 = 8,
    Aes128Gmac = 9,
    Aes192Gmac = 10,
    Aes256Gmac = 11,
    HmacSha2_256_128 = 12,
    HmacSha2_384_192 = 13,
    HmacSha2_512_256 = 14,
}

impl TryFrom<u16> for IntegrityAlgorithm {
    type Error = UnparseableParameter;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(IntegrityAlgorithm::None),
            1 => Ok(IntegrityAlgorithm::HmacMd5_96),
            2 => Ok(IntegrityAlgorithm::HmacSha1_96),
            3 => Ok(IntegrityAlgorithm::DesMac),
            4 => Ok(IntegrityAlgorithm::KpdkMd5),
            5 => Ok(IntegrityAlgorithm::AesXcbc96),
            6 => Ok(IntegrityAlgorithm::HmacMd5_128),
            7 => Ok(IntegrityAlgorithm::HmacSha1_160),
            8 => Ok(IntegrityAlgorithm::AesCmac96),
            9 => Ok(IntegrityAlgorithm::Aes128Gmac),
            10 => Ok(IntegrityAlgorithm::Aes192Gmac),
            11 => Ok(IntegrityAlgorithm::Aes256Gmac),
            12 => Ok(IntegrityAlgorithm::HmacSha2_256_128),
            13 => Ok(IntegrityAlgorithm::HmacSha2_384_192),
            14 => Ok(IntegrityAlgorithm::HmacSha2_512_256),
            15..=1023 => Err(UnparseableParameter::Unassigned),
            1024..=65535 => Err(UnparseableParameter::PrivateUse),
        }
    }
}

/// Transform type 2: pseudorandom function identifiers
#[derive(Debug, Ord, PartialOrd, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
#[repr(u16)]
#[allow(missing_docs)]
pub enum PseudorandomFunction {
    HmacMd5 = 1,
    HmacSha1 = 2,
    HmacTiger = 3,
    Aes128Xcbc = 4,
    HmacSha2_256 = 5,
    HmacSha2_384 = 6,
    HmacSha2_512 = 7,
    Aes128Cmac = 8,
}

impl TryFrom<u16> for PseudorandomFunction {
    type Error = UnparseableParameter;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Err(UnparseableParameter::Reserved),
            1 => Ok(PseudorandomFunction::HmacMd5),
            2 => Ok(PseudorandomFunction::HmacSha1),
            3 => Ok(PseudorandomFunction::HmacTiger),
            4 => Ok(PseudorandomFunction::Aes128Xcbc),
            5 => Ok(PseudorandomFunction::HmacSha2_256),
            6 => Ok(PseudorandomFunction::HmacSha2_384),
            7 => Ok(PseudorandomFunction::HmacSha2_512),
            8 => Ok(PseudorandomFunction::Aes128Cmac),
            9..=1023 => Err(UnparseableParameter::Unassigned),
            1024..=65535 => Err(UnparseableParameter::PrivateUse),
        }
    }
}

/// Transform type 4: key exchange method (Diffie-Hellman group) identifiers
#[derive(Debug, Ord, PartialOrd, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
#[repr(u16)]
#[allow(missing_docs)]
pub enum KeyExchangeMethod {
    ModP768 = 1,
    ModP1024 = 2,
    ModP1536 = 5,
    ModP2048 = 14,
    ModP3072 = 15,
    ModP4096 = 16,
    ModP6144 = 17,
    ModP8192 = 18,
    EcP256 = 19,
    EcP384 = 20,
    EcP521 = 21,
    ModP1024S160 = 22,
    ModP2048S224 = 23,
    ModP2048S256 = 24,
    EcP192 = 25,
    EcP224 = 26,
    BrainpoolP224 = 27,
    BrainpoolP256 = 28,
    BrainpoolP384 = 29,
    BrainpoolP512 = 30,
    Curve25519 = 31,
    Curve448 = 32,
}

impl TryFrom<u16> for KeyExchangeMethod {
    type Error = UnparseableParameter;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Err(UnparseableParameter::Reserved),
            1 => Ok(KeyExchangeMethod::ModP768),
            2 => Ok(KeyExchangeMethod::ModP1024),
            3..=4 => Err(UnparseableParameter::Reserved),
            5 => Ok(KeyExchangeMethod::ModP1536),
            6..=13 => Err(UnparseableParameter::Unassigned),
            14 => Ok(KeyExchangeMethod::ModP2048),
            15 => Ok(KeyExchangeMethod::ModP3072),
            16 => Ok(KeyExchangeMethod::ModP4096),
            17 => Ok(KeyExchangeMethod::ModP6144),
            18 => Ok(KeyExchangeMethod::ModP8192),
            19 => Ok(KeyExchangeMethod::EcP256),
            20 => Ok(KeyExchangeMethod::EcP384),
            21 => Ok(KeyExchangeMethod::EcP521),
            22 => Ok(KeyExchangeMethod::ModP1024S160),
            23 => Ok(KeyExchangeMethod::ModP2048S224),
            24 => Ok(KeyExchangeMethod::ModP2048S256),
            25 => Ok(KeyExchangeMethod::EcP192),
            26 => Ok(KeyExchangeMethod::EcP224),
            27 => Ok(KeyExchangeMethod::BrainpoolP224),
            28 => Ok(KeyExchangeMethod::BrainpoolP256),
            29 => Ok(KeyExchangeMethod::BrainpoolP384),
            30 => Ok(KeyExchangeMethod::BrainpoolP512),
            31 => Ok(KeyExchangeMethod::Curve25519),
            32 => Ok(KeyExchangeMethod::Curve448),
            33..=1023 => Err(UnparseableParameter::Unassigned),
            1024..=65535 => Err(UnparseableParameter::PrivateUse),
        }
    }
}

/// Kind of data carried by an IDi or IDr payload
#[derive(Debug, Ord, PartialOrd, Eq, PartialEq, Copy, Clone)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum IdType {
    Ipv4Addr = 1,
    Fqdn = 2,
    Rfc822Addr = 3,
    Ipv6Addr = 5,
    DerAsn1Dn = 9,
    DerAsn1Gn = 10,
    KeyId = 11,
    FcName = 12,
}

impl TryFrom<u8> for IdType {
    type Error = UnparseableParameter;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Err(UnparseableParameter::Reserved),
            1 => Ok(IdType::Ipv4Addr),
            2 => Ok(IdType::Fqdn),
            3 => Ok(IdType::Rfc822Addr),
            4 => Err(UnparseableParameter::Unassigned),
            5 => Ok(IdType::Ipv6Addr),
            6..=8 => Err(UnparseableParameter::Reserved),
            9 => Ok(IdType::DerAsn1Dn),
            10 => Ok(IdType::DerAsn1Gn),
            11 => Ok(IdType::KeyId),
            12 => Ok(IdType::FcName),
            13..=200 => Err(UnparseableParameter::Unassigned),
            201..=255 => Err(UnparseableParameter::PrivateUse),
        }
    }
}

/// Indicator for the encoding of certificates and related data
///
/// Values 0 and 5 are reserved, 16-200 unassigned and 201-255 reserved
/// for private use.
#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Copy)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum CertificateEncoding {
    PKCS7WrappedX509Certificate = 1,
    PGPCertificate = 2,
    DNSSignedKey = 3,
    X509CertificateSignature = 4,
    KerberosTokens = 6,
    CertificateRevocationList = 7,
    AuthorityRevocationList = 8,
    SPKICertificate = 9,
    X509CertificateAttribute = 10,
    RawRSAKey = 11, // deprecated
    HashUrlX509Certificate = 12,
    HashUrlX509Bundle = 13,
    OCSPContent = 14,
    RawPublicKey = 15,
}

impl TryFrom<u8> for CertificateEncoding {
    type Error = UnparseableParameter;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Err(UnparseableParameter::Reserved),
            1 => Ok(CertificateEncoding::PKCS7WrappedX509Certificate),
            2 => Ok(CertificateEncoding::PGPCertificate),
            3 => Ok(CertificateEncoding::DNSSignedKey),
            4 => Ok(CertificateEncoding::X509CertificateSignature),
            5 => Err(UnparseableParameter::Reserved),
            6 => Ok(CertificateEncoding::KerberosTokens),
            7 => Ok(CertificateEncoding::CertificateRevocationList),
            8 => Ok(CertificateEncoding::AuthorityRevocationList),
            9 => Ok(CertificateEncoding::SPKICertificate),
            10 => Ok(CertificateEncoding::X509CertificateAttribute),
            11 => Ok(CertificateEncoding::RawRSAKey),
            12 => Ok(CertificateEncoding::HashUrlX509Certificate),
            13 => Ok(CertificateEncoding::HashUrlX509Bundle),
            14 => Ok(CertificateEncoding::OCSPContent),
            15 => Ok(CertificateEncoding::RawPublicKey),
            16..=200 => Err(UnparseableParameter::Unassigned),
            201..=255 => Err(UnparseableParameter::PrivateUse),
        }
    }
}

/// Type of authentication method used in the AUTH payload
///
/// Value 0 is reserved, values 4-8 and 15-200 unassigned and 201-255
/// reserved for private use.
#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Copy)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum AuthenticationMethod {
    RSADigitalSignature = 1,
    SharedKeyMessageIntegrityCode = 2,
    DSSDigitalSignature = 3,
    ECDSAWithSHA256 = 9,  // with P-256 curve
    ECDSAWithSHA384 = 10, // with P-384 curve
    ECDSAWithSHA512 = 11, // with P-521 curve
    GenericSecurePassword = 12,
    NULLAuthentication = 13,
    DigitalSignature = 14,
}

impl TryFrom<u8> for AuthenticationMethod {
    type Error = UnparseableParameter;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Err(UnparseableParameter::Reserved),
            1 => Ok(AuthenticationMethod::RSADigitalSignature),
            2 => Ok(AuthenticationMethod::SharedKeyMessageIntegrityCode),
            3 => Ok(AuthenticationMethod::DSSDigitalSignature),
            4..=8 => Err(UnparseableParameter::Unassigned),
            9 => Ok(AuthenticationMethod::ECDSAWithSHA256),
            10 => Ok(AuthenticationMethod::ECDSAWithSHA384),
            11 => Ok(AuthenticationMethod::ECDSAWithSHA512),
            12 => Ok(AuthenticationMethod::GenericSecurePassword),
            13 => Ok(AuthenticationMethod::NULLAuthentication),
            14 => Ok(AuthenticationMethod::DigitalSignature),
            15..=200 => Err(UnparseableParameter::Unassigned),
            201..=255 => Err(UnparseableParameter::PrivateUse),
        }
    }
}

/// Address family of a traffic selector
#[derive(Debug, Ord, PartialOrd, Eq, PartialEq, Copy, Clone)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum TsType {
    Ipv4AddrRange = 7,
    Ipv6AddrRange = 8,
    FcAddrRange = 9,
}

/// Notification types carried by the Notify payload
///
/// Types below 16384 report errors; a request whose response carries an
/// unrecognized error type must be considered failed entirely. Status
/// types (16384 and up) must be ignored when unrecognized.
#[derive(Debug, Ord, PartialOrd, Eq, PartialEq, Copy, Clone)]
#[repr(u16)]
#[allow(missing_docs)]
pub enum NotifyType {
    UnsupportedCriticalPayload = 1,
    InvalidIkeSpi = 4,
    InvalidMajorVersion = 5,
    InvalidSyntax = 7,
    InvalidMessageId = 9,
    InvalidSpi = 11,
    NoProposalChosen = 14,
    InvalidKePayload = 17,
    AuthenticationFailed = 24,
    SinglePairRequired = 34,
    NoAdditionalSas = 35,
    InternalAddressFailure = 36,
    FailedCpRequired = 37,
    TsUnacceptable = 38,
    InvalidSelectors = 39,
    TemporaryFailure = 43,
    ChildSaNotFound = 44,
    InitialContact = 16384,
    SetWindowSize = 16385,
    AdditionalTsPossible = 16386,
    IpcompSupported = 16387,
    NatDetectionSourceIp = 16388,
    NatDetectionDestinationIp = 16389,
    Cookie = 16390,
    UseTransportMode = 16391,
    HttpCertLookupSupported = 16392,
    RekeySa = 16393,
    EspTfcPaddingNotSupported = 16394,
    NonFirstFragmentsAlso = 16395,
}

impl TryFrom<u16> for NotifyType {
    type Error = UnparseableParameter;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(NotifyType::UnsupportedCriticalPayload),
            4 => Ok(NotifyType::InvalidIkeSpi),
            5 => Ok(NotifyType::InvalidMajorVersion),
            7 => Ok(NotifyType::InvalidSyntax),
            9 => Ok(NotifyType::InvalidMessageId),
            11 => Ok(NotifyType::InvalidSpi),
            14 => Ok(NotifyType::NoProposalChosen),
            17 => Ok(NotifyType::InvalidKePayload),
            24 => Ok(NotifyType::AuthenticationFailed),
            34 => Ok(NotifyType::SinglePairRequired),
            35 => Ok(NotifyType::NoAdditionalSas),
            36 => Ok(NotifyType::InternalAddressFailure),
            37 => Ok(NotifyType::FailedCpRequired),
            38 => Ok(NotifyType::TsUnacceptable),
            39 => Ok(NotifyType::InvalidSelectors),
            43 => Ok(NotifyType::TemporaryFailure),
            44 => Ok(NotifyType::ChildSaNotFound),
            0 | 2..=3 | 6 | 8 | 10 | 12..=13 | 15..=16 | 18..=23 | 25..=33 | 40..=42 => {
                Err(UnparseableParameter::Reserved)
            }
            45..=8191 => Err(UnparseableParameter::Unassigned),
            8192..=16383 => Err(UnparseableParameter::PrivateUse),
            16384 => Ok(NotifyType::InitialContact),
            16385 => Ok(NotifyType::SetWindowSize),
            16386 => Ok(NotifyType::AdditionalTsPossible),
            16387 => Ok(NotifyType::IpcompSupported),
            16388 => Ok(NotifyType::NatDetectionSourceIp),
            16389 => Ok(NotifyType::NatDetectionDestinationIp),
            16390 => Ok(NotifyType::Cookie),
            16391 => Ok(NotifyType::UseTransportMode),
            16392 => Ok(NotifyType::HttpCertLookupSupported),
            16393 => Ok(NotifyType::RekeySa),
            16394 => Ok(NotifyType::EspTfcPaddingNotSupported),
            16395 => Ok(NotifyType::NonFirstFragmentsAlso),
            16396..=40959 => Err(UnparseableParameter::Unassigned),
            40960..=65535 => Err(UnparseableParameter::PrivateUse),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_type_round_trip() {
        for value in PAYLOAD_MIN..=PAYLOAD_MAX {
            #[allow(clippy::unwrap_used)]
            let parsed = PayloadType::try_from(value).unwrap();
            assert_eq!(parsed as u8, value);
        }
        assert_eq!(
            PayloadType::try_from(7),
            Err(UnparseableParameter::Reserved)
        );
        assert_eq!(
            PayloadType::try_from(99),
            Err(UnparseableParameter::Unassigned)
        );
        assert_eq!(
            PayloadType::try_from(250),
            Err(UnparseableParameter::PrivateUse)
        );
    }

    #[test]
    fn notify_regions() {
        assert_eq!(NotifyType::try_from(14), Ok(NotifyType::NoProposalChosen));
        assert_eq!(NotifyType::try_from(16390), Ok(NotifyType::Cookie));
        assert_eq!(NotifyType::try_from(0), Err(UnparseableParameter::Reserved));
        assert_eq!(
            NotifyType::try_from(9000),
            Err(UnparseableParameter::PrivateUse)
        );
    }
}

//! Outbound packet construction
//!
//! Payload-append operations in wire order, plus the container stack
//! that defers length and count back-patches until a container closes.
//! Containers nest SK < SA/Delete/TS < proposal < transform; opening a
//! sibling or an unrelated payload closes whatever cannot contain it.

use std::net::SocketAddr;

use rand::RngCore;
use zerocopy::network_endian::U16;
use zerocopy::AsBytes;

use crate::alg;
use crate::definitions::header::{
    AttributeHeader, AuthHeader, DeleteHeader, IdHeader, KeyExchangeHeader, NotifyHeader,
    ProposalHeader, TransformHeader, TrafficSelectorHeader, TsPayloadHeader,
};
use crate::definitions::params::{
    AttributeType, AuthenticationMethod, CertificateEncoding, EncryptionAlgorithm, IdType,
    PayloadType, SecurityProtocol, TransformType, TsType, FLAG_ATTRIBUTE_FORMAT,
};
use crate::sa::IkeSa;

use super::{Container, ContainerKind, Packet, PacketError, LENGTH_OFFSET};

/// Identification data for the IDi and IDr payloads
///
/// One strongly-typed variant per RFC 7296 §3.5 kind; the body length
/// follows from the variant, so no length juggling at the call site.
#[derive(Debug, Copy, Clone)]
pub enum Id<'a> {
    /// A literal IPv4 address
    Ipv4(std::net::Ipv4Addr),
    /// A literal IPv6 address
    Ipv6(std::net::Ipv6Addr),
    /// A fully-qualified domain name, no trailing dot
    Fqdn(&'a str),
    /// An RFC 822 mail address
    Rfc822(&'a str),
    /// A DER-encoded ASN.1 X.500 distinguished name
    Asn1Dn(&'a [u8]),
    /// A DER-encoded ASN.1 X.509 general name
    Asn1Gn(&'a [u8]),
    /// An opaque vendor-specific key identifier
    KeyId(&'a [u8]),
}

impl Id<'_> {
    fn id_type(&self) -> IdType {
        match self {
            Id::Ipv4(_) => IdType::Ipv4Addr,
            Id::Ipv6(_) => IdType::Ipv6Addr,
            Id::Fqdn(_) => IdType::Fqdn,
            Id::Rfc822(_) => IdType::Rfc822Addr,
            Id::Asn1Dn(_) => IdType::DerAsn1Dn,
            Id::Asn1Gn(_) => IdType::DerAsn1Gn,
            Id::KeyId(_) => IdType::KeyId,
        }
    }
}

impl Packet {
    /// Pop and settle the topmost container.
    pub(crate) fn close_top(&mut self) -> Result<(), PacketError> {
        let Some(container) = self.stack.pop() else {
            return Err(PacketError::Malformed("container stack underflow"));
        };
        let end = self.buf.len();
        match container.kind {
            ContainerKind::Transform => {
                self.patch_u16(container.start + 2, (end - container.start) as u16);
            }
            ContainerKind::Proposal { transforms } => {
                self.patch_u16(container.start + 2, (end - container.start) as u16);
                self.patch_u8(container.start + 7, transforms);
            }
            ContainerKind::Sa => self.end_payload(container.start),
            ContainerKind::Delete { spis } => {
                self.patch_u16(container.start + 4 + 2, spis);
                self.end_payload(container.start);
            }
            ContainerKind::TsPayload { selectors } => {
                self.patch_u8(container.start + 4, selectors);
                self.end_payload(container.start);
            }
            ContainerKind::Sk => {
                return Err(PacketError::Malformed("SK closes only through finalize"))
            }
        }
        Ok(())
    }

    /// Close every open container except an SK envelope.
    fn close_payloads(&mut self) -> Result<(), PacketError> {
        while let Some(top) = self.stack.last() {
            if matches!(top.kind, ContainerKind::Sk) {
                break;
            }
            self.close_top()?;
        }
        Ok(())
    }

    /// Open an SA payload. Proposals are appended with
    /// [`Packet::add_proposal`]; the payload length settles when the
    /// next non-SA payload opens or the packet finalizes.
    pub fn add_sa(&mut self) -> Result<(), PacketError> {
        self.check_mutable()?;
        self.close_payloads()?;
        if self.write_left() < 4 {
            return Err(PacketError::OutOfSpace);
        }
        let start = self.begin_payload(PayloadType::SecurityAssociation, false);
        self.stack.push(Container {
            kind: ContainerKind::Sa,
            start,
        });
        Ok(())
    }

    /// Open proposal number `num` for `proto` inside the current SA
    /// payload, closing a previous proposal.
    ///
    /// The SPI is omitted for an initial IKE negotiation (`spi == 0`),
    /// 8 octets for an IKE rekey and 4 octets for AH and ESP.
    pub fn add_proposal(
        &mut self,
        num: u8,
        proto: SecurityProtocol,
        spi: u64,
    ) -> Result<(), PacketError> {
        self.check_mutable()?;
        let spi_len: usize = match proto {
            SecurityProtocol::AuthenticationHeader
            | SecurityProtocol::EncapsulatingSecurityPayload => {
                if spi > u64::from(u32::MAX) {
                    return Err(PacketError::Malformed("child SA SPI exceeds 32 bits"));
                }
                4
            }
            SecurityProtocol::InternetKeyExchange => {
                if spi == 0 {
                    0
                } else {
                    8
                }
            }
            SecurityProtocol::FcEspHeader | SecurityProtocol::FcCtAuthentication => {
                return Err(PacketError::Unsupported("fibre channel SA proposals"))
            }
        };

        // A new proposal terminates the previous one in this SA.
        loop {
            let Some(&top) = self.stack.last() else {
                return Err(PacketError::Malformed("proposal outside an SA payload"));
            };
            match top.kind {
                ContainerKind::Transform => self.close_top()?,
                ContainerKind::Proposal { .. } => {
                    self.close_top()?;
                    self.patch_u8(top.start, 2);
                }
                ContainerKind::Sa => break,
                ContainerKind::Delete { .. }
                | ContainerKind::TsPayload { .. }
                | ContainerKind::Sk => {
                    return Err(PacketError::Malformed("proposal outside an SA payload"))
                }
            }
        }

        if self.write_left() < 8 + spi_len {
            return Err(PacketError::OutOfSpace);
        }
        let start = self.buf.len();
        let header = ProposalHeader {
            last_substruct: 0,
            reserved: 0,
            proposal_length: U16::new(0),
            proposal_num: num,
            protocol_id: proto as u8,
            spi_size: spi_len as u8,
            num_transforms: 0,
        };
        self.put_bytes(header.as_bytes());
        if spi_len == 4 {
            self.put_u32(spi as u32);
        } else if spi_len == 8 {
            self.put_u64(spi);
        }
        self.stack.push(Container {
            kind: ContainerKind::Proposal { transforms: 0 },
            start,
        });
        Ok(())
    }

    /// Open one transform inside the current proposal, closing a
    /// previous transform. Attributes follow through
    /// [`Packet::add_xform_attr_keylen`].
    pub fn add_transform(&mut self, xf_type: TransformType, xf_id: u16) -> Result<(), PacketError> {
        self.check_mutable()?;
        loop {
            let Some(&top) = self.stack.last() else {
                return Err(PacketError::Malformed("transform outside a proposal"));
            };
            match top.kind {
                ContainerKind::Transform => {
                    self.close_top()?;
                    self.patch_u8(top.start, 3);
                }
                ContainerKind::Proposal { .. } => break,
                ContainerKind::Sa
                | ContainerKind::Delete { .. }
                | ContainerKind::TsPayload { .. }
                | ContainerKind::Sk => {
                    return Err(PacketError::Malformed("transform outside a proposal"))
                }
            }
        }
        if self.write_left() < 8 {
            return Err(PacketError::OutOfSpace);
        }
        if let Some(Container {
            kind: ContainerKind::Proposal { transforms },
            ..
        }) = self.stack.last_mut()
        {
            *transforms = transforms
                .checked_add(1)
                .ok_or(PacketError::Malformed("too many transforms in proposal"))?;
        }
        let start = self.buf.len();
        let header = TransformHeader {
            last_substruct: 0,
            reserved: 0,
            transform_length: U16::new(8),
            transform_type: xf_type as u8,
            reserved2: 0,
            transform_id: U16::new(xf_id),
        };
        self.put_bytes(header.as_bytes());
        self.stack.push(Container {
            kind: ContainerKind::Transform,
            start,
        });
        Ok(())
    }

    /// Append a key-length attribute (TV form) to the open transform.
    pub fn add_xform_attr_keylen(&mut self, bits: u16) -> Result<(), PacketError> {
        self.check_mutable()?;
        if !matches!(
            self.stack.last().map(|c| c.kind),
            Some(ContainerKind::Transform)
        ) {
            return Err(PacketError::Malformed("attribute outside a transform"));
        }
        if self.write_left() < 4 {
            return Err(PacketError::OutOfSpace);
        }
        let header = AttributeHeader {
            attribute_type: U16::new(AttributeType::KeyLength as u16 | FLAG_ATTRIBUTE_FORMAT),
            attribute_value: U16::new(bits),
        };
        self.put_bytes(header.as_bytes());
        Ok(())
    }

    /// Expand an encryption algorithm with a key-size range into its
    /// transform family.
    ///
    /// Fixed-key legacy ciphers take no key length and are emitted once;
    /// ciphers with arbitrary key sizes are proposed at the two extremes
    /// only; the AES and Camellia families step through the range in
    /// 64-bit increments, one transform plus key-length attribute per
    /// step.
    pub fn add_xform_encr(
        &mut self,
        encr: EncryptionAlgorithm,
        min_bits: u16,
        max_bits: u16,
    ) -> Result<(), PacketError> {
        use EncryptionAlgorithm as E;
        let step = match encr {
            E::Null => return Err(PacketError::Unsupported("NULL encryption is not proposable")),
            // pseudo-cipher handled entirely by the integrity side
            E::NullAesGmac => return Ok(()),
            E::DesIv64 | E::Des | E::TripleDes | E::Idea | E::TripleIdea | E::DesIv32 => {
                if min_bits != 0 || max_bits != 0 {
                    return Err(PacketError::Malformed(
                        "fixed-key cipher takes no key length",
                    ));
                }
                return self.add_transform(TransformType::EncryptionAlgorithm, encr as u16);
            }
            E::Rc4 | E::Rc5 | E::Blowfish | E::Cast => {
                if min_bits == 0 && max_bits == 0 {
                    return self.add_transform(TransformType::EncryptionAlgorithm, encr as u16);
                }
                // Instead of hundreds of transforms across an arbitrary
                // range, propose only the extremes.
                if min_bits != max_bits {
                    self.add_transform(TransformType::EncryptionAlgorithm, encr as u16)?;
                    self.add_xform_attr_keylen(min_bits)?;
                }
                self.add_transform(TransformType::EncryptionAlgorithm, encr as u16)?;
                self.add_xform_attr_keylen(max_bits)?;
                return Ok(());
            }
            E::AesCbc
            | E::AesCtr
            | E::AesCcm8
            | E::AesCcm12
            | E::AesCcm16
            | E::AesGcm8
            | E::AesGcm12
            | E::AesGcm16
            | E::XtsAes => 64u16,
            E::CamelliaCbc | E::CamelliaCtr | E::CamelliaCcm8 | E::CamelliaCcm12
            | E::CamelliaCcm16 => {
                if min_bits < 128 || max_bits > 256 || min_bits > max_bits {
                    return Err(PacketError::Malformed(
                        "camellia key sizes must lie in 128..=256",
                    ));
                }
                64u16
            }
        };

        let mut bits = min_bits;
        while bits <= max_bits {
            self.add_transform(TransformType::EncryptionAlgorithm, encr as u16)?;
            self.add_xform_attr_keylen(bits)?;
            match bits.checked_add(step) {
                Some(next) => bits = next,
                None => break,
            }
        }
        Ok(())
    }

    /// Append a key exchange payload carrying the public value for
    /// `group`.
    pub fn add_ke(&mut self, group: u16, data: &[u8]) -> Result<(), PacketError> {
        self.check_mutable()?;
        self.close_payloads()?;
        if self.write_left() < 4 + 4 + data.len() {
            return Err(PacketError::OutOfSpace);
        }
        let start = self.begin_payload(PayloadType::KeyExchange, false);
        let header = KeyExchangeHeader {
            dh_group_num: U16::new(group),
            reserved: U16::new(0),
        };
        self.put_bytes(header.as_bytes());
        self.put_bytes(data);
        self.end_payload(start);
        Ok(())
    }

    /// Append a nonce payload of `len` freshly drawn random octets.
    /// RFC 7296 bounds nonces to 16..=256 octets.
    pub fn add_nonce(&mut self, len: usize) -> Result<(), PacketError> {
        self.check_mutable()?;
        if !(16..=256).contains(&len) {
            return Err(PacketError::Malformed("nonce length outside 16..=256"));
        }
        self.close_payloads()?;
        if self.write_left() < 4 + len {
            return Err(PacketError::OutOfSpace);
        }
        let start = self.begin_payload(PayloadType::Nonce, false);
        let body = self.buf.len();
        self.buf.resize(body + len, 0);
        rand::rng().fill_bytes(&mut self.buf[body..]);
        self.end_payload(start);
        Ok(())
    }

    /// Append the initiator identification payload.
    pub fn add_id_i(&mut self, id: &Id<'_>) -> Result<(), PacketError> {
        self.add_id(PayloadType::IdInitiator, id)
    }

    /// Append the responder identification payload.
    pub fn add_id_r(&mut self, id: &Id<'_>) -> Result<(), PacketError> {
        self.add_id(PayloadType::IdResponder, id)
    }

    fn add_id(&mut self, ptype: PayloadType, id: &Id<'_>) -> Result<(), PacketError> {
        self.check_mutable()?;
        let v4;
        let v6;
        let body: &[u8] = match id {
            Id::Ipv4(addr) => {
                v4 = addr.octets();
                &v4
            }
            Id::Ipv6(addr) => {
                v6 = addr.octets();
                &v6
            }
            Id::Fqdn(name) => name.as_bytes(),
            Id::Rfc822(addr) => addr.as_bytes(),
            Id::Asn1Dn(der) | Id::Asn1Gn(der) | Id::KeyId(der) => der,
        };
        self.close_payloads()?;
        if self.write_left() < 4 + 4 + body.len() {
            return Err(PacketError::OutOfSpace);
        }
        let start = self.begin_payload(ptype, false);
        let header = IdHeader {
            id_type: id.id_type() as u8,
            reserved: [0; 3],
        };
        self.put_bytes(header.as_bytes());
        self.put_bytes(body);
        self.end_payload(start);
        Ok(())
    }

    /// Append a certificate payload.
    pub fn add_cert(
        &mut self,
        encoding: CertificateEncoding,
        data: &[u8],
    ) -> Result<(), PacketError> {
        self.add_cert_common(PayloadType::Certificate, encoding, data)
    }

    /// Append a certificate request payload.
    pub fn add_certreq(
        &mut self,
        encoding: CertificateEncoding,
        data: &[u8],
    ) -> Result<(), PacketError> {
        self.add_cert_common(PayloadType::CertificateRequest, encoding, data)
    }

    fn add_cert_common(
        &mut self,
        ptype: PayloadType,
        encoding: CertificateEncoding,
        data: &[u8],
    ) -> Result<(), PacketError> {
        self.check_mutable()?;
        self.close_payloads()?;
        if self.write_left() < 4 + 1 + data.len() {
            return Err(PacketError::OutOfSpace);
        }
        let start = self.begin_payload(ptype, false);
        self.put_u8(encoding as u8);
        self.put_bytes(data);
        self.end_payload(start);
        Ok(())
    }

    /// Append an authentication payload.
    pub fn add_auth(
        &mut self,
        method: AuthenticationMethod,
        data: &[u8],
    ) -> Result<(), PacketError> {
        self.check_mutable()?;
        self.close_payloads()?;
        if self.write_left() < 4 + 4 + data.len() {
            return Err(PacketError::OutOfSpace);
        }
        let start = self.begin_payload(PayloadType::Authentication, false);
        let header = AuthHeader {
            auth_method: method as u8,
            reserved: [0; 3],
        };
        self.put_bytes(header.as_bytes());
        self.put_bytes(data);
        self.end_payload(start);
        Ok(())
    }

    /// Append a notification.
    ///
    /// `proto` is `None` for notifications concerning the IKE SA itself;
    /// child-SA notifications name their protocol and pass the 4-octet
    /// SPI.
    pub fn add_notify(
        &mut self,
        proto: Option<SecurityProtocol>,
        ntype: u16,
        spi: Option<u32>,
        data: &[u8],
    ) -> Result<(), PacketError> {
        self.check_mutable()?;
        self.close_payloads()?;
        let spi_size = if spi.is_some() { 4 } else { 0 };
        if self.write_left() < 4 + 4 + spi_size + data.len() {
            return Err(PacketError::OutOfSpace);
        }
        let start = self.begin_payload(PayloadType::Notify, false);
        let header = NotifyHeader {
            protocol_id: proto.map(|p| p as u8).unwrap_or(0),
            spi_size: spi_size as u8,
            notify_message_type: U16::new(ntype),
        };
        self.put_bytes(header.as_bytes());
        if let Some(spi) = spi {
            self.put_u32(spi);
        }
        self.put_bytes(data);
        self.end_payload(start);
        Ok(())
    }

    /// Open a delete payload for `proto`; SPIs follow through
    /// [`Packet::add_delete_spi`] and the count settles at close.
    pub fn add_delete(&mut self, proto: SecurityProtocol) -> Result<(), PacketError> {
        self.check_mutable()?;
        self.close_payloads()?;
        let spi_size = match proto {
            SecurityProtocol::InternetKeyExchange => 0,
            SecurityProtocol::AuthenticationHeader
            | SecurityProtocol::EncapsulatingSecurityPayload => 4,
            SecurityProtocol::FcEspHeader | SecurityProtocol::FcCtAuthentication => {
                return Err(PacketError::Unsupported("fibre channel SA deletion"))
            }
        };
        if self.write_left() < 4 + 4 {
            return Err(PacketError::OutOfSpace);
        }
        let start = self.begin_payload(PayloadType::Delete, false);
        let header = DeleteHeader {
            protocol_id: proto as u8,
            spi_size,
            num_spis: U16::new(0),
        };
        self.put_bytes(header.as_bytes());
        self.stack.push(Container {
            kind: ContainerKind::Delete { spis: 0 },
            start,
        });
        Ok(())
    }

    /// Append one SPI to the open delete payload. Deleting the IKE SA
    /// itself carries no SPIs.
    pub fn add_delete_spi(&mut self, spi: u32) -> Result<(), PacketError> {
        self.check_mutable()?;
        let Some(&Container {
            kind: ContainerKind::Delete { .. },
            start,
        }) = self.stack.last()
        else {
            return Err(PacketError::Malformed("SPI outside a delete payload"));
        };
        if self.buf[start + 5] != 4 {
            return Err(PacketError::Malformed("IKE SA deletion carries no SPIs"));
        }
        if self.write_left() < 4 {
            return Err(PacketError::OutOfSpace);
        }
        self.put_u32(spi);
        if let Some(Container {
            kind: ContainerKind::Delete { spis },
            ..
        }) = self.stack.last_mut()
        {
            *spis = spis
                .checked_add(1)
                .ok_or(PacketError::Malformed("too many SPIs in delete payload"))?;
        }
        Ok(())
    }

    /// Append a vendor ID payload.
    pub fn add_vendor(&mut self, vid: &[u8]) -> Result<(), PacketError> {
        self.check_mutable()?;
        self.close_payloads()?;
        if self.write_left() < 4 + vid.len() {
            return Err(PacketError::OutOfSpace);
        }
        let start = self.begin_payload(PayloadType::VendorId, false);
        self.put_bytes(vid);
        self.end_payload(start);
        Ok(())
    }

    /// Open the initiator traffic selector payload.
    pub fn add_ts_i(&mut self) -> Result<(), PacketError> {
        self.add_ts_payload(PayloadType::TsInitiator)
    }

    /// Open the responder traffic selector payload.
    pub fn add_ts_r(&mut self) -> Result<(), PacketError> {
        self.add_ts_payload(PayloadType::TsResponder)
    }

    fn add_ts_payload(&mut self, ptype: PayloadType) -> Result<(), PacketError> {
        self.check_mutable()?;
        self.close_payloads()?;
        if self.write_left() < 4 + 4 {
            return Err(PacketError::OutOfSpace);
        }
        let start = self.begin_payload(ptype, false);
        let header = TsPayloadHeader {
            num_ts: 0,
            reserved: [0; 3],
        };
        self.put_bytes(header.as_bytes());
        self.stack.push(Container {
            kind: ContainerKind::TsPayload { selectors: 0 },
            start,
        });
        Ok(())
    }

    /// Append one address-range selector to the open TS payload.
    ///
    /// The selector type follows from the address family; both ends
    /// must share one.
    pub fn add_ts(
        &mut self,
        ip_proto: u8,
        range_start: &SocketAddr,
        range_end: &SocketAddr,
    ) -> Result<(), PacketError> {
        self.check_mutable()?;
        if !matches!(
            self.stack.last().map(|c| c.kind),
            Some(ContainerKind::TsPayload { .. })
        ) {
            return Err(PacketError::Malformed("selector outside a TS payload"));
        }
        match (range_start, range_end) {
            (SocketAddr::V4(start), SocketAddr::V4(end)) => {
                if self.write_left() < 16 {
                    return Err(PacketError::OutOfSpace);
                }
                let header = TrafficSelectorHeader {
                    ts_type: TsType::Ipv4AddrRange as u8,
                    ip_protocol_id: ip_proto,
                    selector_length: U16::new(16),
                    start_port: U16::new(start.port()),
                    end_port: U16::new(end.port()),
                };
                self.put_bytes(header.as_bytes());
                self.put_bytes(&start.ip().octets());
                self.put_bytes(&end.ip().octets());
            }
            (SocketAddr::V6(start), SocketAddr::V6(end)) => {
                if self.write_left() < 40 {
                    return Err(PacketError::OutOfSpace);
                }
                let header = TrafficSelectorHeader {
                    ts_type: TsType::Ipv6AddrRange as u8,
                    ip_protocol_id: ip_proto,
                    selector_length: U16::new(40),
                    start_port: U16::new(start.port()),
                    end_port: U16::new(end.port()),
                };
                self.put_bytes(header.as_bytes());
                self.put_bytes(&start.ip().octets());
                self.put_bytes(&end.ip().octets());
            }
            _ => {
                return Err(PacketError::Malformed(
                    "traffic selector endpoints must share a family",
                ))
            }
        }
        if let Some(Container {
            kind: ContainerKind::TsPayload { selectors },
            ..
        }) = self.stack.last_mut()
        {
            *selectors = selectors
                .checked_add(1)
                .ok_or(PacketError::Malformed("too many traffic selectors"))?;
        }
        Ok(())
    }

    /// Open the SK envelope. Every payload appended afterwards lands
    /// inside it; [`Packet::finalize`] pads, encrypts and authenticates
    /// the region.
    pub fn add_sk(&mut self, sa: &IkeSa) -> Result<(), PacketError> {
        self.check_mutable()?;
        self.close_payloads()?;
        if self
            .stack
            .iter()
            .any(|c| matches!(c.kind, ContainerKind::Sk))
        {
            return Err(PacketError::Malformed("packet already has an SK payload"));
        }
        let iv_len = alg::iv_size(sa.encr);
        let need =
            4 + iv_len + alg::icv_size(sa.encr, sa.auth) + alg::block_size(sa.encr);
        if self.write_left() < need {
            return Err(PacketError::OutOfSpace);
        }
        let start = self.begin_payload(PayloadType::Encrypted, false);
        self.stack.push(Container {
            kind: ContainerKind::Sk,
            start,
        });
        // Reserve the IV slot; the envelope fills it at finalize time.
        let body = self.buf.len();
        self.buf.resize(body + iv_len, 0);
        Ok(())
    }

    /// Close all containers, run the SK envelope if one is open, settle
    /// the header length and freeze the packet.
    pub fn finalize(&mut self, sa: &IkeSa) -> Result<(), PacketError> {
        self.check_mutable()?;
        self.close_payloads()?;
        if let Some(&Container {
            kind: ContainerKind::Sk,
            start,
        }) = self.stack.last()
        {
            self.encrypt_sk(sa, start)?;
            self.stack.pop();
        }
        debug_assert!(self.stack.is_empty());
        self.patch_u32(LENGTH_OFFSET, self.buf.len() as u32);
        self.done = true;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use ikev2_token::soft::SoftToken;
    use ikev2_token::SessionPool;

    use crate::definitions::params::{
        EncryptionAlgorithm, ExchangeType, IntegrityAlgorithm, PseudorandomFunction,
    };
    use crate::packet::Packet;
    use crate::sa::IkeSa;

    use super::*;

    pub(crate) fn plain_sa() -> IkeSa {
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

    fn sa_init_packet() -> Packet {
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
        pkt.finalize(&plain_sa()).unwrap();
        pkt
    }

    #[test]
    fn sa_init_wire_layout() {
        let pkt = sa_init_packet();
        let raw = pkt.as_bytes();

        // SA(4 + 44) + KE(4 + 36) + Nonce(4 + 32)
        assert_eq!(raw.len(), 28 + 48 + 40 + 36);
        assert_eq!(&raw[24..28], (raw.len() as u32).to_be_bytes().as_slice());
        // header chains to the SA payload
        assert_eq!(raw[16], 33);

        assert_eq!(
            &raw[28..76],
            [
                0x22, 0x00, 0x00, 0x30, // SA generic header, next is KE
                0x00, 0x00, 0x00, 0x2c, 0x01, 0x01, 0x00, 0x04, // proposal header
                0x03, 0x00, 0x00, 0x0c, 0x01, 0x00, 0x00, 0x0c, // ENCR AES-CBC
                0x80, 0x0e, 0x01, 0x00, // KEYLEN 256
                0x03, 0x00, 0x00, 0x08, 0x03, 0x00, 0x00, 0x0c, // INTEG HMAC-SHA2-256-128
                0x03, 0x00, 0x00, 0x08, 0x02, 0x00, 0x00, 0x05, // PRF HMAC-SHA2-256
                0x00, 0x00, 0x00, 0x08, 0x04, 0x00, 0x00, 0x0e, // KE group 14, last
            ]
            .as_slice()
        );

        // KE payload chains to the nonce, which ends the chain
        assert_eq!(raw[76], 40);
        assert_eq!(&raw[78..80], [0x00, 0x28].as_slice());
        assert_eq!(&raw[80..84], [0x00, 0x0e, 0x00, 0x00].as_slice());
        assert_eq!(raw[116], 0);
        assert_eq!(&raw[118..120], [0x00, 0x24].as_slice());
    }

    #[test]
    fn encr_expansion_steps_through_the_range() {
        let mut pkt = Packet::new_initiator(1, 0, ExchangeType::IkeSaInit, 0);
        pkt.add_sa().unwrap();
        pkt.add_proposal(1, SecurityProtocol::InternetKeyExchange, 0)
            .unwrap();
        pkt.add_xform_encr(EncryptionAlgorithm::AesCbc, 128, 256)
            .unwrap();
        pkt.finalize(&plain_sa()).unwrap();
        let raw = pkt.as_bytes();

        // three (transform + KEYLEN) pairs of 12 octets each
        assert_eq!(raw[28 + 4 + 7], 3);
        assert_eq!(raw.len(), 28 + 4 + 8 + 3 * 12);
        for (i, bits) in [128u16, 192, 256].into_iter().enumerate() {
            let t = 28 + 4 + 8 + i * 12;
            assert_eq!(raw[t], if i == 2 { 0 } else { 3 });
            assert_eq!(&raw[t + 4..t + 8], [0x01, 0x00, 0x00, 0x0c].as_slice());
            assert_eq!(&raw[t + 8..t + 12][2..], bits.to_be_bytes().as_slice());
        }
    }

    #[test]
    fn fixed_key_ciphers_refuse_a_key_length() {
        let mut pkt = Packet::new_initiator(1, 0, ExchangeType::IkeSaInit, 0);
        pkt.add_sa().unwrap();
        pkt.add_proposal(1, SecurityProtocol::InternetKeyExchange, 0)
            .unwrap();
        assert!(pkt
            .add_xform_encr(EncryptionAlgorithm::TripleDes, 128, 256)
            .is_err());
        pkt.add_xform_encr(EncryptionAlgorithm::TripleDes, 0, 0)
            .unwrap();
    }

    #[test]
    fn arbitrary_key_ciphers_propose_the_extremes() {
        let mut pkt = Packet::new_initiator(1, 0, ExchangeType::IkeSaInit, 0);
        pkt.add_sa().unwrap();
        pkt.add_proposal(1, SecurityProtocol::InternetKeyExchange, 0)
            .unwrap();
        pkt.add_xform_encr(EncryptionAlgorithm::Blowfish, 128, 448)
            .unwrap();
        pkt.finalize(&plain_sa()).unwrap();
        // two pairs only, not five
        assert_eq!(pkt.as_bytes()[28 + 4 + 7], 2);
    }

    #[test]
    fn ike_rekey_proposal_carries_an_eight_octet_spi() {
        let mut pkt = Packet::new_initiator(1, 2, ExchangeType::CreateChildSa, 3);
        pkt.add_sa().unwrap();
        pkt.add_proposal(1, SecurityProtocol::InternetKeyExchange, 0xaabbccdd00112233)
            .unwrap();
        pkt.add_transform(TransformType::EncryptionAlgorithm, 12)
            .unwrap();
        pkt.finalize(&plain_sa()).unwrap();
        let raw = pkt.as_bytes();
        assert_eq!(raw[28 + 4 + 6], 8); // SPI size
        assert_eq!(
            &raw[28 + 4 + 8..28 + 4 + 16],
            0xaabbccdd00112233u64.to_be_bytes().as_slice()
        );
    }

    #[test]
    fn delete_counts_its_spis() {
        let mut pkt = Packet::new_initiator(1, 2, ExchangeType::Informational, 7);
        pkt.add_delete(SecurityProtocol::EncapsulatingSecurityPayload)
            .unwrap();
        pkt.add_delete_spi(0x01020304).unwrap();
        pkt.add_delete_spi(0x05060708).unwrap();
        pkt.finalize(&plain_sa()).unwrap();
        let raw = pkt.as_bytes();
        assert_eq!(
            &raw[28..44],
            [
                0x00, 0x00, 0x00, 0x10, // generic header, 16 octets
                0x03, 0x04, 0x00, 0x02, // ESP, SPI size 4, two SPIs
                0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08,
            ]
            .as_slice()
        );
    }

    #[test]
    fn ike_delete_refuses_spis() {
        let mut pkt = Packet::new_initiator(1, 2, ExchangeType::Informational, 7);
        pkt.add_delete(SecurityProtocol::InternetKeyExchange).unwrap();
        assert!(pkt.add_delete_spi(1).is_err());
    }

    #[test]
    fn ts_payload_counts_selectors() {
        let mut pkt = Packet::new_initiator(1, 2, ExchangeType::IkeAuth, 1);
        pkt.add_ts_i().unwrap();
        let from = "10.0.0.0:0".parse().unwrap();
        let to = "10.0.0.255:65535".parse().unwrap();
        pkt.add_ts(0, &from, &to).unwrap();
        pkt.finalize(&plain_sa()).unwrap();
        let raw = pkt.as_bytes();
        assert_eq!(
            &raw[28..52],
            [
                0x00, 0x00, 0x00, 0x18, // generic header
                0x01, 0x00, 0x00, 0x00, // one selector
                0x07, 0x00, 0x00, 0x10, // IPv4 range, 16 octets
                0x00, 0x00, 0xff, 0xff, // full port range
                10, 0, 0, 0, 10, 0, 0, 255,
            ]
            .as_slice()
        );
    }

    #[test]
    fn mixed_family_selector_is_rejected() {
        let mut pkt = Packet::new_initiator(1, 2, ExchangeType::IkeAuth, 1);
        pkt.add_ts_i().unwrap();
        let from = "10.0.0.0:0".parse().unwrap();
        let to = "[::1]:0".parse().unwrap();
        assert!(pkt.add_ts(0, &from, &to).is_err());
    }

    #[test]
    fn nonce_length_is_bounded() {
        let mut pkt = Packet::new_initiator(1, 0, ExchangeType::IkeSaInit, 0);
        assert!(pkt.add_nonce(8).is_err());
        assert!(pkt.add_nonce(257).is_err());
        pkt.add_nonce(16).unwrap();
    }

    #[test]
    fn finalize_freezes_the_packet() {
        let mut pkt = sa_init_packet();
        assert!(pkt.add_nonce(16).is_err());
    }

    #[test]
    fn oversized_payload_reports_out_of_space() {
        let mut pkt = Packet::new_initiator(1, 0, ExchangeType::IkeSaInit, 0);
        let huge = vec![0u8; super::super::MAX_PACKET_SIZE];
        assert!(matches!(
            pkt.add_vendor(&huge),
            Err(PacketError::OutOfSpace)
        ));
    }
}

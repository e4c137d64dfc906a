// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! SCEP PKI messages.
//!
//! A PKI message is a CMS SignedData whose encapsulated content is the
//! DER of a `pkcsPKIEnvelope` (CMS EnvelopedData) and whose signer info
//! carries the SCEP authenticated attributes:
//!
//! ```text
//! ContentInfo (signedData)
//!   SignedData
//!     encapContentInfo (id-data) -> OCTET STRING -> ContentInfo (envelopedData)
//!     certificates                -> signer certificate
//!     signerInfo.signedAttrs      -> transactionID, messageType, senderNonce,
//!                                    recipientNonce, pkiStatus, failInfo
//! ```

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use cms::builder::{SignedDataBuilder, SignerInfoBuilder};
use cms::cert::{CertificateChoices, IssuerAndSerialNumber};
use cms::content_info::ContentInfo;
use cms::signed_data::{EncapsulatedContentInfo, SignedData, SignerIdentifier};
use const_oid::db::rfc5911::ID_DATA;
use const_oid::db::rfc5912::ID_SHA_256;
use der::{Any, Decode, Encode, Tag, Tagged};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs1v15::SigningKey;
use rsa::RsaPrivateKey;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use tracing::debug;
use x509_cert::attr::Attribute;
use x509_cert::request::CertReq;
use x509_cert::Certificate;

use super::csr_request::CsrRequest;
use super::envelope;
use crate::asn1;
use crate::ca::CaMaterial;
use crate::csr::self_signed_certificate;
use crate::error::{Result, ScepError};
use crate::types::pkcs7::{extract_certificates, extract_signed_data};
use crate::types::{degenerate_certificates, oid, parse_certs_only};
use crate::types::{MessageType, PkiFailInfo, PkiStatus};

/// Length of generated sender nonces.
pub const NONCE_LEN: usize = 16;

/// The payload of a CertRep message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertRepMessage {
    /// Outcome of the request.
    pub status: PkiStatus,
    /// Failure reason, present when `status` is `Failure`.
    pub fail_info: Option<PkiFailInfo>,
    /// Echo of the request's sender nonce.
    pub recipient_nonce: Option<Vec<u8>>,
    /// The issued certificate, once the envelope has been decrypted.
    pub certificate: Option<Certificate>,
}

/// Parameters a requester uses to build an enrollment message.
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    /// `PKCSReq`, `RenewalReq` or `UpdateReq`.
    pub message_type: MessageType,
    /// Certificate signing the outer message (self-signed for initial enrollment).
    pub signer_certificate: Certificate,
    /// Private key matching `signer_certificate`.
    pub signer_key: RsaPrivateKey,
    /// Certificates the request is encrypted for, normally the CA certificate.
    pub recipients: Vec<Certificate>,
}

impl RequestTemplate {
    /// Template signed by a fresh self-signed certificate for `signer_key`,
    /// as used for initial enrollment.
    pub fn self_signed(
        message_type: MessageType,
        subject: &str,
        signer_key: RsaPrivateKey,
        recipients: Vec<Certificate>,
    ) -> Result<Self> {
        let signer_certificate = self_signed_certificate(subject, &signer_key, 1)?;
        Ok(Self {
            message_type,
            signer_certificate,
            signer_key,
            recipients,
        })
    }
}

/// A SCEP PKI message.
#[derive(Debug, Clone)]
pub struct PkiMessage {
    /// The DER SignedData as sent or received.
    pub raw: Vec<u8>,
    /// Transaction identifier.
    pub transaction_id: String,
    /// Message type.
    pub message_type: MessageType,
    /// Sender nonce. Required on every request message.
    pub sender_nonce: Option<Vec<u8>>,
    /// Recipient nonce, set on responses.
    pub recipient_nonce: Option<Vec<u8>>,
    /// Certificate of the message signer.
    pub signer_certificate: Option<Certificate>,
    /// DER of the encrypted `pkcsPKIEnvelope`. Empty when there is none.
    pub envelope: Vec<u8>,
    /// The request, once the envelope of a CSR-carrying message is decrypted.
    pub csr_request: Option<CsrRequest>,
    /// Response payload of a CertRep message.
    pub cert_rep: Option<CertRepMessage>,
}

impl PkiMessage {
    /// Decode a DER PKI message and its SCEP attributes.
    ///
    /// Fails with [`ScepError::MalformedMessage`] when the outer structure
    /// or a required attribute cannot be decoded, and with
    /// [`ScepError::MissingNonce`] when a request carries no senderNonce.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let content_info = ContentInfo::from_der(bytes)
            .map_err(|e| ScepError::malformed(format!("Failed to parse ContentInfo: {}", e)))?;
        let signed_data = extract_signed_data(&content_info)?;

        let signer_info = signed_data
            .signer_infos
            .0
            .iter()
            .next()
            .ok_or_else(|| ScepError::malformed("SignedData has no signer info"))?;
        let attrs = signer_info
            .signed_attrs
            .as_ref()
            .ok_or_else(|| ScepError::malformed("Signer info has no signed attributes"))?;

        let transaction_id = asn1::find_attribute(attrs, oid::TRANSACTION_ID)
            .ok_or_else(|| ScepError::malformed("Missing transactionID attribute"))
            .and_then(asn1::decode_printable_string)?;

        let message_type = asn1::find_attribute(attrs, oid::MESSAGE_TYPE)
            .ok_or_else(|| ScepError::malformed("Missing messageType attribute"))
            .and_then(asn1::decode_integer)
            .and_then(MessageType::try_from)?;

        let sender_nonce = asn1::find_attribute(attrs, oid::SENDER_NONCE)
            .map(asn1::decode_octet_string)
            .transpose()?;

        if message_type.is_request() && sender_nonce.is_none() {
            return Err(ScepError::MissingNonce);
        }

        let recipient_nonce = asn1::find_attribute(attrs, oid::RECIPIENT_NONCE)
            .map(asn1::decode_octet_string)
            .transpose()?;

        let cert_rep = if message_type == MessageType::CertRep {
            let status = asn1::find_attribute(attrs, oid::PKI_STATUS)
                .ok_or_else(|| ScepError::malformed("CertRep without pkiStatus attribute"))
                .and_then(asn1::decode_integer)?;
            let status = PkiStatus::from_i32(status)
                .ok_or_else(|| ScepError::malformed(format!("Unknown pkiStatus {}", status)))?;

            let fail_info = match asn1::find_attribute(attrs, oid::FAIL_INFO) {
                Some(value) => {
                    let code = asn1::decode_integer(value)?;
                    Some(PkiFailInfo::from_i32(code).ok_or_else(|| {
                        ScepError::malformed(format!("Unknown failInfo {}", code))
                    })?)
                }
                None => None,
            };

            Some(CertRepMessage {
                status,
                fail_info,
                recipient_nonce: recipient_nonce.clone(),
                certificate: None,
            })
        } else {
            None
        };

        let envelope = match &signed_data.encap_content_info.econtent {
            Some(content) if content.tag() == Tag::OctetString => content.value().to_vec(),
            Some(content) => {
                return Err(ScepError::malformed(format!(
                    "Encapsulated content is {}, expected OCTET STRING",
                    content.tag()
                )))
            }
            None => Vec::new(),
        };

        let signer_certificate = find_signer_certificate(&signed_data, &signer_info.sid)?;

        debug!(
            "Parsed {} message, transactionID {}, envelope {} bytes",
            message_type,
            transaction_id,
            envelope.len()
        );

        Ok(Self {
            raw: bytes.to_vec(),
            transaction_id,
            message_type,
            sender_nonce,
            recipient_nonce,
            signer_certificate,
            envelope,
            csr_request: None,
            cert_rep,
        })
    }

    /// Decrypt the `pkcsPKIEnvelope` with the given certificate and key.
    ///
    /// The CA opens enrollment requests with its own certificate and key;
    /// a requester opens a CertRep with its signer certificate and key.
    /// CSR-carrying messages have their request parsed, its self-signature
    /// verified and its challenge password extracted. A successful CertRep
    /// yields the issued certificate; a CertRep without a payload is
    /// returned unchanged.
    pub fn decrypt_envelope(
        mut self,
        certificate: &Certificate,
        private_key: &RsaPrivateKey,
    ) -> Result<Self> {
        match self.message_type {
            MessageType::PkcsReq | MessageType::RenewalReq | MessageType::UpdateReq => {
                let decrypted = envelope::open(&self.envelope, certificate, private_key)?;
                let request = CsrRequest::from_der(decrypted, self.signer_certificate.clone())?;
                debug!(
                    "Decrypted {} for subject {}",
                    self.message_type,
                    request.subject()
                );
                self.csr_request = Some(request);
            }
            MessageType::CertRep => {
                let cert_rep = self
                    .cert_rep
                    .as_mut()
                    .ok_or_else(|| ScepError::malformed("CertRep without status"))?;

                if cert_rep.status == PkiStatus::Success && !self.envelope.is_empty() {
                    let decrypted = envelope::open(&self.envelope, certificate, private_key)?;
                    let issued = parse_certs_only(&decrypted)?
                        .into_iter()
                        .next()
                        .ok_or_else(|| ScepError::decryption("CertRep bundle is empty"))?;
                    cert_rep.certificate = Some(issued);
                }
            }
            other => {
                return Err(ScepError::unsupported_message_type(other.as_str()));
            }
        }

        Ok(self)
    }

    /// Build a CertRep granting `issued` in answer to `request`.
    ///
    /// The issued certificate is wrapped in a degenerate bundle, encrypted
    /// for the requester's signer certificate and signed by the CA.
    pub fn build_success_response(
        request: &PkiMessage,
        ca: &CaMaterial,
        issued: &Certificate,
    ) -> Result<PkiMessage> {
        let requester = request.signer_certificate.as_ref().ok_or_else(|| {
            ScepError::malformed("Request carries no signer certificate to encrypt for")
        })?;

        let bundle = degenerate_certificates(std::slice::from_ref(issued))?;
        let sealed = envelope::seal(&bundle, std::slice::from_ref(requester))?;

        let sender_nonce = generate_nonce();
        let mut attributes = vec![
            asn1::attribute(
                oid::TRANSACTION_ID,
                asn1::encode_printable_string(&request.transaction_id)?,
            )?,
            asn1::attribute(
                oid::MESSAGE_TYPE,
                asn1::encode_integer(MessageType::CertRep.as_i32())?,
            )?,
            asn1::attribute(
                oid::PKI_STATUS,
                asn1::encode_integer(PkiStatus::Success.as_i32())?,
            )?,
            asn1::attribute(oid::SENDER_NONCE, asn1::encode_octet_string(&sender_nonce)?)?,
        ];
        if let Some(nonce) = &request.sender_nonce {
            attributes.push(asn1::attribute(
                oid::RECIPIENT_NONCE,
                asn1::encode_octet_string(nonce)?,
            )?);
        }

        let raw = sign_message(
            Some(&sealed),
            attributes,
            ca.certificate(),
            ca.private_key(),
        )?;

        Ok(PkiMessage {
            raw,
            transaction_id: request.transaction_id.clone(),
            message_type: MessageType::CertRep,
            sender_nonce: Some(sender_nonce),
            recipient_nonce: request.sender_nonce.clone(),
            signer_certificate: Some(ca.certificate().clone()),
            envelope: sealed,
            csr_request: None,
            cert_rep: Some(CertRepMessage {
                status: PkiStatus::Success,
                fail_info: None,
                recipient_nonce: request.sender_nonce.clone(),
                certificate: Some(issued.clone()),
            }),
        })
    }

    /// Build a signed CertRep rejecting `request` with `fail_info`.
    ///
    /// `request` is `None` when the inbound bytes could not be parsed; the
    /// response then carries an empty transactionID and no recipientNonce.
    pub fn build_failure_response(
        request: Option<&PkiMessage>,
        ca: &CaMaterial,
        fail_info: PkiFailInfo,
    ) -> Result<PkiMessage> {
        let transaction_id = request
            .map(|r| r.transaction_id.clone())
            .unwrap_or_default();
        let recipient_nonce = request.and_then(|r| r.sender_nonce.clone());

        let sender_nonce = generate_nonce();
        let mut attributes = vec![
            asn1::attribute(
                oid::TRANSACTION_ID,
                asn1::encode_printable_string(&transaction_id)?,
            )?,
            asn1::attribute(
                oid::MESSAGE_TYPE,
                asn1::encode_integer(MessageType::CertRep.as_i32())?,
            )?,
            asn1::attribute(
                oid::PKI_STATUS,
                asn1::encode_integer(PkiStatus::Failure.as_i32())?,
            )?,
            asn1::attribute(oid::FAIL_INFO, asn1::encode_integer(fail_info.as_i32())?)?,
            asn1::attribute(oid::SENDER_NONCE, asn1::encode_octet_string(&sender_nonce)?)?,
        ];
        if let Some(nonce) = &recipient_nonce {
            attributes.push(asn1::attribute(
                oid::RECIPIENT_NONCE,
                asn1::encode_octet_string(nonce)?,
            )?);
        }

        let raw = sign_message(None, attributes, ca.certificate(), ca.private_key())?;

        Ok(PkiMessage {
            raw,
            transaction_id,
            message_type: MessageType::CertRep,
            sender_nonce: Some(sender_nonce),
            recipient_nonce: recipient_nonce.clone(),
            signer_certificate: Some(ca.certificate().clone()),
            envelope: Vec::new(),
            csr_request: None,
            cert_rep: Some(CertRepMessage {
                status: PkiStatus::Failure,
                fail_info: Some(fail_info),
                recipient_nonce,
                certificate: None,
            }),
        })
    }

    /// Build an enrollment request around a DER PKCS#10 request.
    ///
    /// The request is encrypted for the template's recipients and signed
    /// with the template's signer key. The transactionID is derived from
    /// the request's public key.
    pub fn new_csr_request(csr_der: &[u8], template: &RequestTemplate) -> Result<PkiMessage> {
        if !template.message_type.carries_csr() {
            return Err(ScepError::unsupported_message_type(
                template.message_type.as_str(),
            ));
        }

        let request = CertReq::from_der(csr_der)
            .map_err(|e| ScepError::malformed(format!("Invalid PKCS#10 request: {}", e)))?;
        let transaction_id = transaction_id(&request.info.public_key)?;

        let sealed = envelope::seal(csr_der, &template.recipients)?;
        let sender_nonce = generate_nonce();

        let attributes = vec![
            asn1::attribute(
                oid::TRANSACTION_ID,
                asn1::encode_printable_string(&transaction_id)?,
            )?,
            asn1::attribute(
                oid::MESSAGE_TYPE,
                asn1::encode_integer(template.message_type.as_i32())?,
            )?,
            asn1::attribute(oid::SENDER_NONCE, asn1::encode_octet_string(&sender_nonce)?)?,
        ];

        let raw = sign_message(
            Some(&sealed),
            attributes,
            &template.signer_certificate,
            &template.signer_key,
        )?;

        Ok(PkiMessage {
            raw,
            transaction_id,
            message_type: template.message_type,
            sender_nonce: Some(sender_nonce),
            recipient_nonce: None,
            signer_certificate: Some(template.signer_certificate.clone()),
            envelope: sealed,
            csr_request: None,
            cert_rep: None,
        })
    }
}

/// SHA-1 of the DER public key, base64url without padding.
pub fn transaction_id(public_key: &SubjectPublicKeyInfoOwned) -> Result<String> {
    let digest = Sha1::digest(public_key.to_der()?);
    Ok(URL_SAFE_NO_PAD.encode(digest))
}

/// A fresh random nonce.
pub fn generate_nonce() -> Vec<u8> {
    let mut nonce = vec![0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Sign SCEP attributes (and the envelope, if any) as CMS SignedData.
///
/// The signer certificate is included in the certificate set. Without
/// content the message digest covers the empty string.
pub fn sign_message(
    content: Option<&[u8]>,
    attributes: Vec<Attribute>,
    certificate: &Certificate,
    private_key: &RsaPrivateKey,
) -> Result<Vec<u8>> {
    let econtent = content
        .map(|bytes| Any::new(Tag::OctetString, bytes.to_vec()))
        .transpose()?;
    let encap_content_info = EncapsulatedContentInfo {
        econtent_type: ID_DATA,
        econtent,
    };

    let empty_digest = Sha256::digest(b"").to_vec();
    let external_digest = content.is_none().then_some(empty_digest.as_slice());

    let digest_algorithm = AlgorithmIdentifierOwned {
        oid: ID_SHA_256,
        parameters: None,
    };
    let signer = SigningKey::<Sha256>::new(private_key.clone());
    let sid = SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
        issuer: certificate.tbs_certificate.issuer.clone(),
        serial_number: certificate.tbs_certificate.serial_number.clone(),
    });

    let mut signer_info = SignerInfoBuilder::new(
        &signer,
        sid,
        digest_algorithm.clone(),
        &encap_content_info,
        external_digest,
    )
    .map_err(|e| ScepError::signing(format!("Failed to create signer info: {}", e)))?;

    for attribute in attributes {
        signer_info
            .add_signed_attribute(attribute)
            .map_err(|e| ScepError::signing(format!("Failed to add signed attribute: {}", e)))?;
    }

    let mut builder = SignedDataBuilder::new(&encap_content_info);
    builder
        .add_digest_algorithm(digest_algorithm)
        .map_err(|e| ScepError::signing(format!("Failed to add digest algorithm: {}", e)))?
        .add_certificate(CertificateChoices::Certificate(certificate.clone()))
        .map_err(|e| ScepError::signing(format!("Failed to add certificate: {}", e)))?
        .add_signer_info::<SigningKey<Sha256>, rsa::pkcs1v15::Signature>(signer_info)
        .map_err(|e| ScepError::signing(format!("Failed to add signer info: {}", e)))?;

    let content_info = builder
        .build()
        .map_err(|e| ScepError::signing(format!("Failed to build SignedData: {}", e)))?;

    Ok(content_info.to_der()?)
}

/// The certificate matching the signer identifier, else the first one.
fn find_signer_certificate(
    signed_data: &SignedData,
    sid: &SignerIdentifier,
) -> Result<Option<Certificate>> {
    let certificates = extract_certificates(signed_data)?;

    if let SignerIdentifier::IssuerAndSerialNumber(id) = sid {
        if let Some(cert) = certificates.iter().find(|cert| {
            cert.tbs_certificate.issuer == id.issuer
                && cert.tbs_certificate.serial_number == id.serial_number
        }) {
            return Ok(Some(cert.clone()));
        }
    }

    Ok(certificates.into_iter().next())
}

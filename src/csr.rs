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

//! CSR (Certificate Signing Request) generation utilities.
//!
//! SCEP requesters need RSA keys (the CA answers by key transport to the
//! requester's key), so requests are built directly from `x509-cert`
//! structures and signed with `rsa`.

use std::str::FromStr;
use std::time::{Duration, SystemTime};

use der::asn1::{BitString, SetOfVec};
use der::{Decode, Encode};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs8::EncodePublicKey;
use rsa::{RsaPrivateKey, RsaPublicKey};
use spki::SubjectPublicKeyInfoOwned;
use x509_cert::ext::pkix::{KeyUsage, KeyUsages};
use x509_cert::name::Name;
use x509_cert::request::{CertReq, CertReqInfo, Version};
use x509_cert::Certificate;

use crate::algorithms::SignatureAlgorithm;
use crate::asn1;
use crate::error::{Result, ScepError};
use crate::types::oid;
use crate::x509::{self, CertificateTemplate};

/// RFC 4514 order, least significant first.
const RDN_ORDER: [&str; 6] = ["CN", "OU", "O", "L", "ST", "C"];

/// Builder for creating Certificate Signing Requests.
///
/// # Example
///
/// ```no_run
/// use scep_server::csr::CsrBuilder;
///
/// let (csr_der, private_key) = CsrBuilder::new()
///     .common_name("device.example.com")
///     .organization("Example Corp")
///     .country("US")
///     .challenge_password("secret")
///     .generate(2048)
///     .expect("Failed to generate CSR");
/// ```
#[derive(Debug, Clone)]
pub struct CsrBuilder {
    // (attribute type, value), one entry per attribute type
    rdns: Vec<(&'static str, String)>,
    challenge_password: Option<String>,
    algorithm: SignatureAlgorithm,
}

impl Default for CsrBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CsrBuilder {
    /// Create a new CSR builder with default parameters.
    pub fn new() -> Self {
        Self {
            rdns: Vec::new(),
            challenge_password: None,
            algorithm: SignatureAlgorithm::Sha256WithRsa,
        }
    }

    /// Set the Common Name (CN) for the subject.
    pub fn common_name(self, cn: impl Into<String>) -> Self {
        self.rdn("CN", cn)
    }

    /// Set the Organizational Unit (OU) for the subject.
    pub fn organizational_unit(self, ou: impl Into<String>) -> Self {
        self.rdn("OU", ou)
    }

    /// Set the Organization (O) for the subject.
    pub fn organization(self, org: impl Into<String>) -> Self {
        self.rdn("O", org)
    }

    /// Set the Locality (L) for the subject.
    pub fn locality(self, locality: impl Into<String>) -> Self {
        self.rdn("L", locality)
    }

    /// Set the State/Province (ST) for the subject.
    pub fn state(self, state: impl Into<String>) -> Self {
        self.rdn("ST", state)
    }

    /// Set the Country (C) for the subject.
    pub fn country(self, country: impl Into<String>) -> Self {
        self.rdn("C", country)
    }

    /// Set the PKCS#9 challengePassword attribute.
    pub fn challenge_password(mut self, password: impl Into<String>) -> Self {
        self.challenge_password = Some(password.into());
        self
    }

    /// Set the request signature algorithm (default SHA-256 with RSA).
    pub fn signature_algorithm(mut self, algorithm: SignatureAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// The subject as an RFC 4514 string.
    ///
    /// Attributes are ordered CN, OU, O, L, ST, C whatever order they were
    /// set in, so the encoded name runs from country down to common name.
    pub fn subject_string(&self) -> String {
        let mut rdns: Vec<&(&'static str, String)> = self.rdns.iter().collect();
        rdns.sort_by_key(|(kind, _)| RDN_ORDER.iter().position(|k| k == kind));
        rdns.iter()
            .map(|(kind, value)| format!("{}={}", kind, escape_rdn_value(value)))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Build the CSR with a new RSA key of `key_bits` bits.
    ///
    /// Returns the DER-encoded CSR and the generated private key.
    pub fn generate(self, key_bits: usize) -> Result<(Vec<u8>, RsaPrivateKey)> {
        let private_key = RsaPrivateKey::new(&mut OsRng, key_bits)
            .map_err(|e| ScepError::signing(format!("Failed to generate RSA key: {}", e)))?;
        let csr_der = self.build_with_key(&private_key)?;
        Ok((csr_der, private_key))
    }

    /// Build the CSR using the provided key.
    ///
    /// Returns only the DER-encoded CSR.
    pub fn build_with_key(self, private_key: &RsaPrivateKey) -> Result<Vec<u8>> {
        let subject = Name::from_str(&self.subject_string())
            .map_err(|e| ScepError::config(format!("Invalid subject name: {}", e)))?;

        let mut attributes = SetOfVec::new();
        if let Some(password) = &self.challenge_password {
            attributes.insert(asn1::attribute(
                oid::CHALLENGE_PASSWORD,
                asn1::encode_printable_string(password)?,
            )?)?;
        }

        let info = CertReqInfo {
            version: Version::V1,
            subject,
            public_key: public_key_info(&RsaPublicKey::from(private_key))?,
            attributes,
        };

        let signature = self.algorithm.sign(private_key, &info.to_der()?)?;

        let request = CertReq {
            info,
            algorithm: self.algorithm.algorithm_identifier()?,
            signature: BitString::from_bytes(&signature)?,
        };

        Ok(request.to_der()?)
    }

    fn rdn(mut self, kind: &'static str, value: impl Into<String>) -> Self {
        self.rdns.retain(|(existing, _)| *existing != kind);
        self.rdns.push((kind, value.into()));
        self
    }
}

/// A self-signed certificate for a requester key.
///
/// SCEP requesters without a certificate sign their first request with a
/// self-signed certificate over the key being enrolled.
pub fn self_signed_certificate(
    subject: &str,
    private_key: &RsaPrivateKey,
    validity_days: u32,
) -> Result<Certificate> {
    let name = Name::from_str(subject)
        .map_err(|e| ScepError::config(format!("Invalid subject name: {}", e)))?;
    let spki = public_key_info(&RsaPublicKey::from(private_key))?;

    let mut serial = [0u8; 8];
    OsRng.fill_bytes(&mut serial);
    serial[0] &= 0x7F;
    serial[0] |= 0x01;

    let now = SystemTime::now();
    CertificateTemplate {
        serial_number: x509::serial_number(&serial)?,
        issuer: name.clone(),
        subject: name,
        subject_public_key_info: spki,
        not_before: now - Duration::from_secs(10 * 60),
        not_after: now + x509::days(validity_days),
        extensions: vec![x509::extension(
            &KeyUsage(KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment),
            true,
        )?],
    }
    .sign(SignatureAlgorithm::Sha256WithRsa, private_key)
}

/// Encode an RSA public key as a `SubjectPublicKeyInfo`.
pub(crate) fn public_key_info(public_key: &RsaPublicKey) -> Result<SubjectPublicKeyInfoOwned> {
    let document = public_key
        .to_public_key_der()
        .map_err(|e| ScepError::signing(format!("Failed to encode public key: {}", e)))?;
    Ok(SubjectPublicKeyInfoOwned::from_der(document.as_bytes())?)
}

fn escape_rdn_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

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

//! CA material: the CA certificate, its private key and any chain
//! certificates handed out by GetCACert.
//!
//! A [`CaMaterial`] is built once at startup and shared by reference (for
//! example behind an `Arc`) between the dispatcher and the CSR signer. The
//! private key never leaves this crate.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use der::pem::LineEnding;
use der::{DecodePem, Encode, EncodePem};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use tracing::debug;
use x509_cert::ext::pkix::{BasicConstraints, KeyUsage, KeyUsages};
use x509_cert::name::Name;
use x509_cert::Certificate;

use crate::algorithms::SignatureAlgorithm;
use crate::config::CaConfig;
use crate::csr::public_key_info;
use crate::error::{Result, ScepError};
use crate::types::degenerate_certificates;
use crate::x509::{self, CertificateTemplate};

/// The CA certificate, private key and additional chain certificates.
pub struct CaMaterial {
    certificate: Certificate,
    certificate_der: Vec<u8>,
    private_key: RsaPrivateKey,
    additional_certificates: Vec<Certificate>,
}

impl CaMaterial {
    /// Pair a CA certificate with its private key.
    ///
    /// Fails with [`ScepError::Config`] when the key does not match the
    /// certificate's public key.
    pub fn new(
        certificate: Certificate,
        private_key: RsaPrivateKey,
        additional_certificates: Vec<Certificate>,
    ) -> Result<Self> {
        let spki_der = certificate.tbs_certificate.subject_public_key_info.to_der()?;
        let certificate_key = RsaPublicKey::from_public_key_der(&spki_der).map_err(|e| {
            ScepError::config(format!("CA certificate does not hold an RSA key: {}", e))
        })?;

        if certificate_key != RsaPublicKey::from(&private_key) {
            return Err(ScepError::config(
                "CA private key does not match the CA certificate",
            ));
        }

        let certificate_der = certificate.to_der()?;

        Ok(Self {
            certificate,
            certificate_der,
            private_key,
            additional_certificates,
        })
    }

    /// Load CA material from PEM text.
    ///
    /// The key may be PKCS#8 (`PRIVATE KEY`) or PKCS#1 (`RSA PRIVATE KEY`).
    /// `additional_pem` may hold any number of concatenated certificates.
    pub fn from_pem(
        certificate_pem: &str,
        private_key_pem: &str,
        additional_pem: Option<&str>,
    ) -> Result<Self> {
        let certificate = Certificate::from_pem(certificate_pem.as_bytes())
            .map_err(|e| ScepError::invalid_pem(format!("CA certificate: {}", e)))?;

        let private_key = RsaPrivateKey::from_pkcs8_pem(private_key_pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(private_key_pem))
            .map_err(|e| ScepError::invalid_pem(format!("CA private key: {}", e)))?;

        let additional_certificates = match additional_pem {
            Some(pem) if !pem.trim().is_empty() => Certificate::load_pem_chain(pem.as_bytes())
                .map_err(|e| ScepError::invalid_pem(format!("Additional certificates: {}", e)))?,
            _ => Vec::new(),
        };

        debug!(
            "Loaded CA {} with {} additional certificate(s)",
            certificate.tbs_certificate.subject,
            additional_certificates.len()
        );

        Self::new(certificate, private_key, additional_certificates)
    }

    /// Load CA material as described by the configuration.
    pub fn from_config(config: &CaConfig) -> Result<Self> {
        let certificate_pem = config.certificate_pem()?;
        let private_key_pem = config.private_key_pem()?;
        let additional_pem = config.additional_certificates_pem()?;

        Self::from_pem(&certificate_pem, &private_key_pem, additional_pem.as_deref())
    }

    /// Generate a self-signed RSA CA valid for `years` years.
    pub fn generate(subject: &str, years: u32, key_bits: usize) -> Result<Self> {
        let private_key = RsaPrivateKey::new(&mut OsRng, key_bits)
            .map_err(|e| ScepError::signing(format!("Failed to generate CA key: {}", e)))?;
        Self::generate_with_key(subject, years, private_key)
    }

    /// Build a self-signed CA certificate around an existing key.
    pub fn generate_with_key(subject: &str, years: u32, private_key: RsaPrivateKey) -> Result<Self> {
        let name = Name::from_str(subject)
            .map_err(|e| ScepError::config(format!("Invalid CA subject {:?}: {}", subject, e)))?;
        let spki = public_key_info(&RsaPublicKey::from(&private_key))?;

        let mut serial = [0u8; 8];
        OsRng.fill_bytes(&mut serial);
        serial[0] &= 0x7F;
        serial[0] |= 0x01;

        let now = SystemTime::now();
        let extensions = vec![
            x509::extension(&x509::subject_key_identifier(&spki)?, false)?,
            x509::extension(
                &BasicConstraints {
                    ca: true,
                    path_len_constraint: None,
                },
                true,
            )?,
            x509::extension(
                &KeyUsage(KeyUsages::KeyCertSign | KeyUsages::CRLSign),
                true,
            )?,
        ];

        let certificate = CertificateTemplate {
            serial_number: x509::serial_number(&serial)?,
            issuer: name.clone(),
            subject: name,
            subject_public_key_info: spki,
            not_before: now - Duration::from_secs(10 * 60),
            not_after: now + x509::days(years.saturating_mul(365)),
            extensions,
        }
        .sign(SignatureAlgorithm::Sha256WithRsa, &private_key)?;

        Self::new(certificate, private_key, Vec::new())
    }

    /// Add chain certificates returned after the CA certificate by GetCACert.
    pub fn with_additional_certificates(mut self, certificates: Vec<Certificate>) -> Self {
        self.additional_certificates = certificates;
        self
    }

    /// The CA certificate.
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// The DER encoding of the CA certificate.
    pub fn certificate_der(&self) -> &[u8] {
        &self.certificate_der
    }

    /// Additional chain certificates.
    pub fn additional_certificates(&self) -> &[Certificate] {
        &self.additional_certificates
    }

    pub(crate) fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    /// The CA certificate's subject DN.
    pub fn subject(&self) -> &Name {
        &self.certificate.tbs_certificate.subject
    }

    /// The algorithm the CA certificate itself is signed with.
    pub fn signature_algorithm(&self) -> Result<SignatureAlgorithm> {
        SignatureAlgorithm::from_algorithm_identifier(&self.certificate.signature_algorithm)
    }

    /// Number of certificates GetCACert hands out.
    pub fn total_certificates(&self) -> usize {
        1 + self.additional_certificates.len()
    }

    /// The GetCACert payload.
    ///
    /// The DER CA certificate alone when there is no chain, otherwise a
    /// degenerate PKCS#7 bundle of the CA certificate followed by the
    /// additional certificates.
    pub fn degenerate_bundle(&self) -> Result<Vec<u8>> {
        if self.additional_certificates.is_empty() {
            return Ok(self.certificate_der.clone());
        }

        let mut certificates = Vec::with_capacity(self.total_certificates());
        certificates.push(self.certificate.clone());
        certificates.extend(self.additional_certificates.iter().cloned());

        degenerate_certificates(&certificates)
    }

    /// PEM encodings of the CA certificate and PKCS#8 private key.
    pub fn to_pem(&self) -> Result<(String, String)> {
        let certificate_pem = self.certificate.to_pem(LineEnding::LF)?;
        let private_key_pem = self
            .private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| ScepError::invalid_pem(format!("Failed to encode CA key: {}", e)))?;
        Ok((certificate_pem, private_key_pem.to_string()))
    }
}

impl fmt::Debug for CaMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaMaterial")
            .field("subject", &self.subject().to_string())
            .field("additional_certificates", &self.additional_certificates.len())
            .finish_non_exhaustive()
    }
}

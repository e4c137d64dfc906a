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

//! PKCS#10 requests recovered from a decrypted `pkcsPKIEnvelope`.

use der::{Decode, Encode};
use rsa::pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;
use spki::SubjectPublicKeyInfoOwned;
use x509_cert::name::Name;
use x509_cert::request::CertReq;
use x509_cert::Certificate;

use crate::algorithms::SignatureAlgorithm;
use crate::asn1;
use crate::error::{Result, ScepError};
use crate::types::{oid, PkiStatus};

/// A verified certificate signing request.
#[derive(Debug, Clone)]
pub struct CsrRequest {
    /// The decrypted request bytes.
    pub raw: Vec<u8>,
    /// The parsed request.
    pub request: CertReq,
    /// The PKCS#9 challengePassword attribute, when present.
    pub challenge_password: Option<String>,
    /// The certificate that signed the outer SCEP message.
    pub signer_certificate: Option<Certificate>,
    /// Protocol status of the request.
    pub status: PkiStatus,
}

impl CsrRequest {
    /// Parse a DER request and verify its self-signature.
    pub fn from_der(raw: Vec<u8>, signer_certificate: Option<Certificate>) -> Result<Self> {
        let request = CertReq::from_der(&raw)
            .map_err(|e| ScepError::decryption(format!("Invalid PKCS#10 request: {}", e)))?;

        verify_self_signature(&request)?;
        let challenge_password = extract_challenge_password(&request)?;

        Ok(Self {
            raw,
            request,
            challenge_password,
            signer_certificate,
            status: PkiStatus::Success,
        })
    }

    /// The requested subject DN.
    pub fn subject(&self) -> &Name {
        &self.request.info.subject
    }

    /// The requested public key.
    pub fn public_key(&self) -> &SubjectPublicKeyInfoOwned {
        &self.request.info.public_key
    }
}

/// Verify the request's signature with the public key it carries.
pub fn verify_self_signature(request: &CertReq) -> Result<()> {
    let algorithm = SignatureAlgorithm::from_oid(&request.algorithm.oid).ok_or_else(|| {
        ScepError::invalid_signature(format!(
            "Unsupported request signature algorithm {}",
            request.algorithm.oid
        ))
    })?;

    let spki_der = request.info.public_key.to_der()?;
    let public_key = RsaPublicKey::from_public_key_der(&spki_der)
        .map_err(|e| ScepError::invalid_signature(format!("Request key is not RSA: {}", e)))?;

    let signature = request.signature.as_bytes().ok_or_else(|| {
        ScepError::invalid_signature("Request signature has unused bits")
    })?;

    algorithm.verify(&public_key, &request.info.to_der()?, signature)
}

/// Extract the challengePassword attribute. Absence is not an error.
fn extract_challenge_password(request: &CertReq) -> Result<Option<String>> {
    let Some(attr) = request
        .info
        .attributes
        .iter()
        .find(|attr| attr.oid == oid::CHALLENGE_PASSWORD)
    else {
        return Ok(None);
    };

    match attr.values.iter().next() {
        Some(value) => asn1::decode_printable_string(value).map(Some),
        None => Ok(None),
    }
}

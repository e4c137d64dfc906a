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

//! PKCS#7/CMS "certs-only" (degenerate) SignedData utilities.
//!
//! GetCACert answers with a degenerate bundle when the CA has a chain, and a
//! successful CertRep carries the issued certificate as one inside its
//! enveloped payload.

use cms::content_info::{CmsVersion, ContentInfo};
use cms::signed_data::{EncapsulatedContentInfo, SignedData};
use const_oid::db::rfc5911::{ID_DATA, ID_SIGNED_DATA};
use der::{Decode, Encode, Header, Length, Tag, TagNumber};
use x509_cert::Certificate;

use crate::error::{Result, ScepError};

/// Build a degenerate certificates-only SignedData `ContentInfo`.
///
/// Certificates are emitted in the order given. The bundle carries no
/// digest algorithms, no content and no signer infos.
pub fn degenerate_certificates(certs: &[Certificate]) -> Result<Vec<u8>> {
    if certs.is_empty() {
        return Err(ScepError::certificate_parsing(
            "Degenerate bundle needs at least one certificate",
        ));
    }

    let mut cert_bytes = Vec::new();
    for cert in certs {
        cert_bytes.extend_from_slice(&cert.to_der()?);
    }

    // SignedData ::= SEQUENCE {
    //   version, digestAlgorithms, encapContentInfo,
    //   certificates [0] IMPLICIT CertificateSet, signerInfos }
    let mut signed_data = Vec::new();
    signed_data.extend_from_slice(&CmsVersion::V1.to_der()?);
    signed_data.extend_from_slice(&tlv(Tag::Set, &[])?);
    signed_data.extend_from_slice(
        &EncapsulatedContentInfo {
            econtent_type: ID_DATA,
            econtent: None,
        }
        .to_der()?,
    );
    signed_data.extend_from_slice(&tlv(
        Tag::ContextSpecific {
            constructed: true,
            number: TagNumber::N0,
        },
        &cert_bytes,
    )?);
    signed_data.extend_from_slice(&tlv(Tag::Set, &[])?);
    let signed_data = tlv(Tag::Sequence, &signed_data)?;

    // ContentInfo ::= SEQUENCE { contentType, content [0] EXPLICIT }
    let mut content_info = ID_SIGNED_DATA.to_der()?;
    content_info.extend_from_slice(&tlv(
        Tag::ContextSpecific {
            constructed: true,
            number: TagNumber::N0,
        },
        &signed_data,
    )?);

    tlv(Tag::Sequence, &content_info)
}

/// Parse a DER PKCS#7 certs-only structure into its certificates.
pub fn parse_certs_only(der_bytes: &[u8]) -> Result<Vec<Certificate>> {
    let content_info = ContentInfo::from_der(der_bytes)
        .map_err(|e| ScepError::malformed(format!("Failed to parse ContentInfo: {}", e)))?;

    let signed_data = extract_signed_data(&content_info)?;

    extract_certificates(&signed_data)
}

/// Extract SignedData from ContentInfo.
pub(crate) fn extract_signed_data(content_info: &ContentInfo) -> Result<SignedData> {
    if content_info.content_type != ID_SIGNED_DATA {
        return Err(ScepError::malformed(format!(
            "Expected SignedData OID, got {}",
            content_info.content_type
        )));
    }

    content_info
        .content
        .decode_as::<SignedData>()
        .map_err(|e| ScepError::malformed(format!("Failed to parse SignedData: {}", e)))
}

/// Extract certificates from SignedData.
pub(crate) fn extract_certificates(signed_data: &SignedData) -> Result<Vec<Certificate>> {
    let cert_set = match &signed_data.certificates {
        Some(certs) => certs,
        None => return Ok(Vec::new()),
    };

    let mut certificates = Vec::new();

    for cert_choice in cert_set.0.iter() {
        // Only plain X.509 certificates are of interest here
        let cert_der = cert_choice
            .to_der()
            .map_err(|e| ScepError::malformed(format!("Failed to encode certificate: {}", e)))?;

        match Certificate::from_der(&cert_der) {
            Ok(cert) => certificates.push(cert),
            Err(e) => {
                tracing::warn!("Skipping non-X.509 certificate: {}", e);
            }
        }
    }

    Ok(certificates)
}

/// Encode a definite-length TLV around already-encoded content.
fn tlv(tag: Tag, content: &[u8]) -> Result<Vec<u8>> {
    let header = Header::new(tag, Length::try_from(content.len())?)?;
    let mut out = header.to_der()?;
    out.extend_from_slice(content);
    Ok(out)
}

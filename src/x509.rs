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

//! X.509 certificate assembly shared by CA bootstrap and CSR signing.

use std::time::{Duration, SystemTime};

use const_oid::AssociatedOid;
use der::asn1::{BitString, GeneralizedTime, OctetString, UtcTime};
use der::{DateTime, Encode};
use rsa::RsaPrivateKey;
use sha1::{Digest, Sha1};
use spki::SubjectPublicKeyInfoOwned;
use x509_cert::certificate::{TbsCertificate, Version};
use x509_cert::ext::pkix::SubjectKeyIdentifier;
use x509_cert::ext::Extension;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::{Time, Validity};
use x509_cert::Certificate;

use crate::algorithms::SignatureAlgorithm;
use crate::error::{Result, ScepError};

/// Fields of a certificate before it is signed.
pub(crate) struct CertificateTemplate {
    pub serial_number: SerialNumber,
    pub issuer: Name,
    pub subject: Name,
    pub subject_public_key_info: SubjectPublicKeyInfoOwned,
    pub not_before: SystemTime,
    pub not_after: SystemTime,
    pub extensions: Vec<Extension>,
}

impl CertificateTemplate {
    /// Sign the template with `key` using `algorithm`.
    pub fn sign(self, algorithm: SignatureAlgorithm, key: &RsaPrivateKey) -> Result<Certificate> {
        let signature_algorithm = algorithm.algorithm_identifier()?;

        let tbs_certificate = TbsCertificate {
            version: Version::V3,
            serial_number: self.serial_number,
            signature: signature_algorithm.clone(),
            issuer: self.issuer,
            validity: Validity {
                not_before: to_time(self.not_before)?,
                not_after: to_time(self.not_after)?,
            },
            subject: self.subject,
            subject_public_key_info: self.subject_public_key_info,
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: Some(self.extensions),
        };

        let tbs_der = tbs_certificate
            .to_der()
            .map_err(|e| ScepError::signing(format!("Failed to encode TBSCertificate: {}", e)))?;
        let signature = algorithm.sign(key, &tbs_der)?;

        Ok(Certificate {
            tbs_certificate,
            signature_algorithm,
            signature: BitString::from_bytes(&signature)?,
        })
    }
}

/// Encode an extension value.
pub(crate) fn extension<E>(value: &E, critical: bool) -> Result<Extension>
where
    E: AssociatedOid + Encode,
{
    Ok(Extension {
        extn_id: E::OID,
        critical,
        extn_value: OctetString::new(value.to_der()?)?,
    })
}

/// SHA-1 of the DER `SubjectPublicKeyInfo`.
pub(crate) fn subject_key_identifier(
    spki: &SubjectPublicKeyInfoOwned,
) -> Result<SubjectKeyIdentifier> {
    let digest = Sha1::digest(spki.to_der()?);
    Ok(SubjectKeyIdentifier(OctetString::new(digest.to_vec())?))
}

/// Build a serial number from unsigned big-endian bytes.
pub(crate) fn serial_number(bytes: &[u8]) -> Result<SerialNumber> {
    SerialNumber::new(bytes).map_err(|e| ScepError::signing(format!("Invalid serial number: {}", e)))
}

/// Upper-case hex of a serial number's bytes.
pub fn serial_hex(serial: &SerialNumber) -> String {
    serial
        .as_bytes()
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect()
}

/// UTCTime through 2049, GeneralizedTime afterwards (RFC 5280 4.1.2.5).
fn to_time(time: SystemTime) -> Result<Time> {
    let date_time = DateTime::from_system_time(time)?;
    if date_time.year() < 2050 {
        Ok(Time::UtcTime(UtcTime::from_date_time(date_time)?))
    } else {
        Ok(Time::GeneralTime(GeneralizedTime::from_date_time(date_time)))
    }
}

/// A duration of whole days.
pub(crate) fn days(count: u32) -> Duration {
    Duration::from_secs(u64::from(count) * 24 * 60 * 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_hex() {
        let serial = serial_number(&[0x01, 0xAB]).unwrap();
        assert_eq!(serial_hex(&serial), "01AB");
    }

    #[test]
    fn test_time_encoding_switches_at_2050() {
        let before = SystemTime::UNIX_EPOCH + Duration::from_secs(2_000_000_000);
        assert!(matches!(to_time(before).unwrap(), Time::UtcTime(_)));

        let after = SystemTime::UNIX_EPOCH + Duration::from_secs(2_600_000_000);
        assert!(matches!(to_time(after).unwrap(), Time::GeneralTime(_)));
    }

    #[test]
    fn test_days() {
        assert_eq!(days(1), Duration::from_secs(86_400));
    }
}

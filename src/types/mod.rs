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

//! SCEP protocol enumerations, object identifiers and PKCS#7 helpers.

pub mod pkcs7;

pub use pkcs7::{degenerate_certificates, parse_certs_only};

use std::fmt;

use crate::error::{Result, ScepError};

/// SCEP message types (RFC 8894 Section 3.2.1.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Response to a certificate or CRL request.
    CertRep = 3,
    /// Renewal of an existing certificate.
    RenewalReq = 17,
    /// Update request (legacy renewal).
    UpdateReq = 18,
    /// Initial certificate enrollment.
    PkcsReq = 19,
    /// Poll for a pending certificate.
    CertPoll = 20,
    /// Retrieve a certificate.
    GetCert = 21,
    /// Retrieve a CRL.
    GetCrl = 22,
}

impl MessageType {
    /// Parse from the integer carried in the messageType attribute.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            3 => Some(Self::CertRep),
            17 => Some(Self::RenewalReq),
            18 => Some(Self::UpdateReq),
            19 => Some(Self::PkcsReq),
            20 => Some(Self::CertPoll),
            21 => Some(Self::GetCert),
            22 => Some(Self::GetCrl),
            _ => None,
        }
    }

    /// The integer value carried on the wire.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the message type name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CertRep => "CertRep",
            Self::RenewalReq => "RenewalReq",
            Self::UpdateReq => "UpdateReq",
            Self::PkcsReq => "PKCSReq",
            Self::CertPoll => "CertPoll",
            Self::GetCert => "GetCert",
            Self::GetCrl => "GetCRL",
        }
    }

    /// Returns true for messages sent by a client to the CA.
    pub fn is_request(&self) -> bool {
        !matches!(self, Self::CertRep)
    }

    /// Returns true for messages whose envelope carries a PKCS#10 request.
    pub fn carries_csr(&self) -> bool {
        matches!(self, Self::PkcsReq | Self::RenewalReq | Self::UpdateReq)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<i32> for MessageType {
    type Error = ScepError;

    fn try_from(value: i32) -> Result<Self> {
        Self::from_i32(value)
            .ok_or_else(|| ScepError::malformed(format!("Unknown messageType {}", value)))
    }
}

/// pkiStatus values (RFC 8894 Section 3.2.1.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PkiStatus {
    /// Request granted.
    #[default]
    Success = 0,
    /// Request rejected.
    Failure = 2,
    /// Request pending manual approval.
    Pending = 3,
}

impl PkiStatus {
    /// Parse from the integer carried in the pkiStatus attribute.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Success),
            2 => Some(Self::Failure),
            3 => Some(Self::Pending),
            _ => None,
        }
    }

    /// The integer value carried on the wire.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// failInfo values (RFC 8894 Section 3.2.1.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PkiFailInfo {
    /// Unrecognized or unsupported algorithm.
    BadAlg = 0,
    /// Integrity check failed.
    BadMessageCheck = 1,
    /// Transaction not permitted or supported.
    BadRequest = 2,
    /// Message time field was not sufficiently close to the system time.
    BadTime = 3,
    /// No certificate could be identified matching the provided criteria.
    BadCertId = 4,
}

impl PkiFailInfo {
    /// Parse from the integer carried in the failInfo attribute.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::BadAlg),
            1 => Some(Self::BadMessageCheck),
            2 => Some(Self::BadRequest),
            3 => Some(Self::BadTime),
            4 => Some(Self::BadCertId),
            _ => None,
        }
    }

    /// The integer value carried on the wire.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// SCEP signed-attribute OIDs (arc 2.16.840.1.113733.1.9).
pub mod oid {
    use const_oid::ObjectIdentifier;

    /// messageType (2.16.840.1.113733.1.9.2)
    pub const MESSAGE_TYPE: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("2.16.840.1.113733.1.9.2");

    /// pkiStatus (2.16.840.1.113733.1.9.3)
    pub const PKI_STATUS: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("2.16.840.1.113733.1.9.3");

    /// failInfo (2.16.840.1.113733.1.9.4)
    pub const FAIL_INFO: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("2.16.840.1.113733.1.9.4");

    /// senderNonce (2.16.840.1.113733.1.9.5)
    pub const SENDER_NONCE: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("2.16.840.1.113733.1.9.5");

    /// recipientNonce (2.16.840.1.113733.1.9.6)
    pub const RECIPIENT_NONCE: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("2.16.840.1.113733.1.9.6");

    /// transactionID (2.16.840.1.113733.1.9.7)
    pub const TRANSACTION_ID: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("2.16.840.1.113733.1.9.7");

    /// PKCS#9 challengePassword (1.2.840.113549.1.9.7)
    pub const CHALLENGE_PASSWORD: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.7");
}

/// Content types used by a SCEP transport.
pub mod content_types {
    /// Single CA certificate (GetCACert).
    pub const X509_CA_CERT: &str = "application/x-x509-ca-cert";

    /// CA/RA certificate bundle (GetCACert with more than one certificate).
    pub const X509_CA_RA_CERT: &str = "application/x-x509-ca-ra-cert";

    /// PKI message (PKIOperation).
    pub const PKI_MESSAGE: &str = "application/x-pki-message";

    /// Plain text (GetCACaps).
    pub const TEXT_PLAIN: &str = "text/plain";
}

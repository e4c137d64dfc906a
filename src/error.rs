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

//! Error types for the SCEP engine.
//!
//! Every stage of a PKIOperation returns [`Result`]. The dispatcher turns any
//! error raised inside that chain into a signed failure response, so the
//! detail carried here is for operators (logs), never for the wire.

use thiserror::Error;

use crate::types::PkiFailInfo;

/// Result type alias using [`ScepError`].
pub type Result<T> = std::result::Result<T, ScepError>;

/// Errors that can occur while serving SCEP operations.
#[derive(Debug, Error)]
pub enum ScepError {
    /// The outer PKCS#7 structure (or one of its SCEP attributes) could not be decoded.
    #[error("Malformed PKI message: {0}")]
    MalformedMessage(String),

    /// A request-class message did not carry a senderNonce attribute.
    #[error("PKI message must include a senderNonce attribute")]
    MissingNonce,

    /// The message type is known to SCEP but not handled by this engine.
    #[error("Unsupported message type: {0}")]
    UnsupportedMessageType(String),

    /// No recipient entry of the enveloped data matches the decrypting certificate.
    #[error("No matching recipient found for the provided certificate")]
    NoMatchingRecipient,

    /// The certificate request self-signature does not verify.
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// Any lower-level failure while opening the enveloped data.
    #[error("Failed to decrypt PKI envelope: {0}")]
    DecryptionFailed(String),

    /// Certificate issuance or CMS signing failed.
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// The serial allocator could not produce a serial number.
    #[error("Serial number allocation failed: {0}")]
    SerialAllocationFailed(String),

    /// An issued certificate could not be persisted.
    #[error("Depot write failed: {0}")]
    DepotWriteFailed(String),

    /// The persistence layer failed or did not answer in time.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The operation was cancelled by the caller.
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid configuration or CA material.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failed to parse or encode an X.509 certificate.
    #[error("Certificate parsing error: {0}")]
    CertificateParsing(String),

    /// Invalid PEM data.
    #[error("Invalid PEM data: {0}")]
    InvalidPem(String),

    /// DER encoding/decoding error.
    #[error("DER error: {0}")]
    Der(#[from] der::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScepError {
    /// Create a malformed message error with the given message.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedMessage(msg.into())
    }

    /// Create an unsupported message type error.
    pub fn unsupported_message_type(msg: impl Into<String>) -> Self {
        Self::UnsupportedMessageType(msg.into())
    }

    /// Create an invalid signature error.
    pub fn invalid_signature(msg: impl Into<String>) -> Self {
        Self::InvalidSignature(msg.into())
    }

    /// Create a decryption error.
    pub fn decryption(msg: impl Into<String>) -> Self {
        Self::DecryptionFailed(msg.into())
    }

    /// Create a signing error.
    pub fn signing(msg: impl Into<String>) -> Self {
        Self::SigningFailed(msg.into())
    }

    /// Create a serial allocation error.
    pub fn serial_allocation(msg: impl Into<String>) -> Self {
        Self::SerialAllocationFailed(msg.into())
    }

    /// Create a depot write error.
    pub fn depot_write(msg: impl Into<String>) -> Self {
        Self::DepotWriteFailed(msg.into())
    }

    /// Create a storage unavailable error.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::StorageUnavailable(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a certificate parsing error.
    pub fn certificate_parsing(msg: impl Into<String>) -> Self {
        Self::CertificateParsing(msg.into())
    }

    /// Create an invalid PEM error.
    pub fn invalid_pem(msg: impl Into<String>) -> Self {
        Self::InvalidPem(msg.into())
    }

    /// The fail-info code a PKIOperation answers with for this error.
    ///
    /// Internal detail never reaches the wire, so every failure in the
    /// request chain is reported as `badRequest`.
    pub fn fail_info(&self) -> PkiFailInfo {
        PkiFailInfo::BadRequest
    }

    /// Returns true for errors that indicate broken configuration or CA
    /// material rather than a bad request.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::InvalidPem(_) | Self::CertificateParsing(_) | Self::Io(_)
        )
    }
}

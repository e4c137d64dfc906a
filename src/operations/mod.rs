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

//! SCEP operation implementations.
//!
//! This module contains the implementation details for each SCEP
//! operation. The public API is exposed through
//! [`ScepService`](crate::service::ScepService). The items here are what a
//! transport needs around it: parsing the `operation` query value, decoding
//! a GET `message` and choosing the response content type.

pub mod getcacaps;
pub mod getcacert;
pub mod pkioperation;

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;

use crate::error::{Result, ScepError};
use crate::types::content_types;

pub use getcacaps::CAPABILITIES;

/// The three SCEP operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Capability discovery.
    GetCaCaps,
    /// CA certificate (or chain) retrieval.
    GetCaCert,
    /// Enrollment message exchange.
    PkiOperation,
}

impl Operation {
    /// The `operation` query value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetCaCaps => "GetCACaps",
            Self::GetCaCert => "GetCACert",
            Self::PkiOperation => "PKIOperation",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = ScepError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "GetCACaps" => Ok(Self::GetCaCaps),
            "GetCACert" => Ok(Self::GetCaCert),
            "PKIOperation" => Ok(Self::PkiOperation),
            other => Err(ScepError::malformed(format!("Unknown operation: {:?}", other))),
        }
    }
}

/// What a response body holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// Capability list.
    Capabilities,
    /// GetCACert payload holding `count` certificates.
    CaCertificates {
        /// Number of certificates in the payload.
        count: usize,
    },
    /// Signed PKI message.
    PkiMessage,
}

/// An operation result ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScepResponse {
    /// Body kind, which selects the content type.
    pub kind: ResponseKind,
    /// Response body bytes.
    pub body: Vec<u8>,
}

impl ScepResponse {
    /// The HTTP content type for this response.
    pub fn content_type(&self) -> &'static str {
        match self.kind {
            ResponseKind::CaCertificates { count } if count > 1 => content_types::X509_CA_RA_CERT,
            ResponseKind::CaCertificates { .. } => content_types::X509_CA_CERT,
            ResponseKind::PkiMessage => content_types::PKI_MESSAGE,
            ResponseKind::Capabilities => content_types::TEXT_PLAIN,
        }
    }
}

/// Decode the `message` query parameter of a GET PKIOperation.
///
/// Clients send base64url, though many send standard base64 with padding;
/// both are accepted.
pub fn decode_message(message: &str) -> Result<Vec<u8>> {
    let message = message.trim();
    let unpadded = message.trim_end_matches('=');

    URL_SAFE_NO_PAD
        .decode(unpadded)
        .or_else(|_| STANDARD.decode(message))
        .map_err(|e| ScepError::malformed(format!("Invalid base64 message: {}", e)))
}

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

//! GetCACert operation.

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::ca::CaMaterial;
use crate::error::Result;

/// The GetCACert body and the number of certificates in it.
///
/// With no chain the body is the DER CA certificate itself, otherwise a
/// degenerate PKCS#7 bundle.
pub fn ca_certificates(ca: &CaMaterial) -> Result<(Vec<u8>, usize)> {
    let body = ca.degenerate_bundle()?;
    let count = ca.total_certificates();
    debug!("GetCACert returning {} certificate(s)", count);
    Ok((body, count))
}

/// SHA-256 fingerprint of the CA certificate, for out-of-band verification.
pub fn ca_fingerprint(ca: &CaMaterial) -> [u8; 32] {
    Sha256::digest(ca.certificate_der()).into()
}

/// Format a fingerprint as a colon-separated hex string.
///
/// Example output: "AB:CD:EF:01:23:45:..."
pub fn format_fingerprint(fp: &[u8]) -> String {
    fp.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

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

//! Certificate depot.
//!
//! Issued certificates are stored as DER under `{name}.{SERIAL}`, where
//! `name` is the RFC 4514 subject of the certificate (or the base64 SHA-1
//! of its encoding when the subject is empty) and `SERIAL` is the serial
//! number in upper-case hex.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use der::Encode;
use sha1::{Digest, Sha1};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use x509_cert::Certificate;

use crate::error::{Result, ScepError};
use crate::storage::Storage;
use crate::x509::serial_hex;

/// Durable store of issued certificates.
#[derive(Debug, Clone)]
pub struct Depot {
    storage: Storage,
}

impl Depot {
    /// A depot over `storage`.
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Read the DER certificate stored under `key`.
    pub async fn get(&self, key: &str, cancel: &CancellationToken) -> Result<Option<Vec<u8>>> {
        self.storage.get_value(key, cancel).await
    }

    /// Store `value` under `key`.
    ///
    /// Writing the same bytes twice is accepted. A different value under
    /// an occupied key is refused with [`ScepError::DepotWriteFailed`].
    pub async fn put(&self, key: &str, value: &[u8], cancel: &CancellationToken) -> Result<()> {
        let existing = self
            .storage
            .get_value(key, cancel)
            .await
            .map_err(|e| write_error(key, e))?;

        match existing {
            Some(stored) if stored == value => {
                debug!("Depot entry {} already present", key);
                return Ok(());
            }
            Some(_) => {
                return Err(ScepError::depot_write(format!(
                    "{} already holds a different certificate",
                    key
                )));
            }
            None => {}
        }

        self.storage
            .set_value(key, value, cancel)
            .await
            .map_err(|e| write_error(key, e))?;
        debug!("Stored {} ({} bytes)", key, value.len());
        Ok(())
    }

    /// Store an issued certificate under [`certificate_key`].
    ///
    /// Returns the key used.
    pub async fn put_certificate(
        &self,
        certificate: &Certificate,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let key = certificate_key(certificate)?;
        let der = certificate
            .to_der()
            .map_err(|e| ScepError::depot_write(format!("Failed to encode {}: {}", key, e)))?;
        self.put(&key, &der, cancel).await?;
        Ok(key)
    }

    /// Returns true if a certificate byte-equal to `certificate` is stored
    /// under any key for `name`.
    pub async fn has_subject(
        &self,
        name: &str,
        certificate: &Certificate,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let der = certificate.to_der()?;
        self.storage
            .has_subject_prefix(&format!("{}.", name), &der, cancel)
            .await
    }
}

/// The depot name of a certificate.
pub fn depot_name(certificate: &Certificate) -> Result<String> {
    let subject = &certificate.tbs_certificate.subject;
    if subject.0.is_empty() {
        let digest = Sha1::digest(certificate.to_der()?);
        return Ok(STANDARD.encode(digest));
    }
    Ok(subject.to_string())
}

/// The depot key of a certificate: `{name}.{SERIAL}`.
pub fn certificate_key(certificate: &Certificate) -> Result<String> {
    Ok(format!(
        "{}.{}",
        depot_name(certificate)?,
        serial_hex(&certificate.tbs_certificate.serial_number)
    ))
}

// Cancellation stays distinguishable from a failed write.
fn write_error(key: &str, error: ScepError) -> ScepError {
    match error {
        ScepError::Cancelled => ScepError::Cancelled,
        other => ScepError::depot_write(format!("{}: {}", key, other)),
    }
}

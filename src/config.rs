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

//! Configuration types for the SCEP engine.
//!
//! The full configuration is TOML:
//!
//! ```toml
//! [ca]
//! certificate_path = "/etc/scep/ca.pem"
//! private_key_path = "/etc/scep/ca.key"
//!
//! [signer]
//! validity_days = 365
//! server_attrs = false
//! signature_algorithm = "sha256-with-rsa"
//!
//! [storage]
//! timeout_secs = 30
//! sqlite_path = "/var/lib/scep/depot.sqlite"
//!
//! [logging]
//! level = "info"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::algorithms::SignatureAlgorithm;
use crate::error::{Result, ScepError};
use crate::logging::LogConfig;

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScepConfig {
    /// CA certificate and key.
    #[serde(default)]
    pub ca: CaConfig,

    /// Certificate issuance settings.
    #[serde(default)]
    pub signer: SignerConfig,

    /// Persistence settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LogConfig,
}

impl ScepConfig {
    /// Start building a configuration.
    pub fn builder() -> ScepConfigBuilder {
        ScepConfigBuilder::new()
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or has unknown fields.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| ScepError::config(format!("Invalid TOML: {e}")))
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ScepError::config(format!("TOML serialize: {e}")))
    }

    /// Read and parse a TOML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ScepError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }
}

/// Where the CA certificate and key come from.
///
/// Each item is given either inline as PEM text or as a path to a PEM file.
/// Inline text wins when both are set.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaConfig {
    /// CA certificate, PEM.
    #[serde(default)]
    pub certificate_pem: Option<String>,

    /// Path to the CA certificate PEM file.
    #[serde(default)]
    pub certificate_path: Option<PathBuf>,

    /// CA private key, PEM (PKCS#8 or PKCS#1).
    #[serde(default)]
    pub private_key_pem: Option<String>,

    /// Path to the CA private key PEM file.
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,

    /// Chain certificates returned after the CA certificate, PEM.
    #[serde(default)]
    pub additional_certificates_pem: Option<String>,

    /// Path to a PEM file of chain certificates.
    #[serde(default)]
    pub additional_certificates_path: Option<PathBuf>,
}

impl CaConfig {
    /// CA material from file paths.
    pub fn from_files(certificate: impl Into<PathBuf>, private_key: impl Into<PathBuf>) -> Self {
        Self {
            certificate_path: Some(certificate.into()),
            private_key_path: Some(private_key.into()),
            ..Self::default()
        }
    }

    /// CA material from inline PEM.
    pub fn from_pem(certificate: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            certificate_pem: Some(certificate.into()),
            private_key_pem: Some(private_key.into()),
            ..Self::default()
        }
    }

    /// The CA certificate PEM text.
    pub fn certificate_pem(&self) -> Result<String> {
        resolve("CA certificate", &self.certificate_pem, &self.certificate_path)?
            .ok_or_else(|| ScepError::config("No CA certificate configured"))
    }

    /// The CA private key PEM text.
    pub fn private_key_pem(&self) -> Result<String> {
        resolve("CA private key", &self.private_key_pem, &self.private_key_path)?
            .ok_or_else(|| ScepError::config("No CA private key configured"))
    }

    /// The chain certificates PEM text, if any.
    pub fn additional_certificates_pem(&self) -> Result<Option<String>> {
        resolve(
            "additional certificates",
            &self.additional_certificates_pem,
            &self.additional_certificates_path,
        )
    }
}

impl std::fmt::Debug for CaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaConfig")
            .field("certificate_pem", &self.certificate_pem.is_some())
            .field("certificate_path", &self.certificate_path)
            .field("private_key_pem", &self.private_key_pem.is_some())
            .field("private_key_path", &self.private_key_path)
            .field(
                "additional_certificates_pem",
                &self.additional_certificates_pem.is_some(),
            )
            .field(
                "additional_certificates_path",
                &self.additional_certificates_path,
            )
            .finish()
    }
}

fn resolve(what: &str, inline: &Option<String>, path: &Option<PathBuf>) -> Result<Option<String>> {
    if let Some(pem) = inline {
        return Ok(Some(pem.clone()));
    }
    match path {
        Some(path) => std::fs::read_to_string(path).map(Some).map_err(|e| {
            ScepError::config(format!(
                "Failed to read {} from {}: {}",
                what,
                path.display(),
                e
            ))
        }),
        None => Ok(None),
    }
}

/// Certificate issuance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignerConfig {
    /// Days before expiry within which a subject may renew.
    #[serde(default = "default_allow_renewal_days")]
    pub allow_renewal_days: u32,

    /// Lifetime of issued certificates in days.
    #[serde(default = "default_validity_days")]
    pub validity_days: u32,

    /// Issue server-profile certificates (key encipherment, serverAuth).
    #[serde(default)]
    pub server_attrs: bool,

    /// Signature algorithm for issued certificates.
    /// Defaults to the algorithm of the CA certificate.
    #[serde(default)]
    pub signature_algorithm: Option<SignatureAlgorithm>,
}

fn default_allow_renewal_days() -> u32 {
    14
}

fn default_validity_days() -> u32 {
    365
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            allow_renewal_days: default_allow_renewal_days(),
            validity_days: default_validity_days(),
            server_attrs: false,
            signature_algorithm: None,
        }
    }
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Upper bound on any single persistence call, in seconds.
    #[serde(default = "default_storage_timeout")]
    pub timeout_secs: u64,

    /// SQLite database file. In-memory storage is used when unset.
    #[serde(default)]
    pub sqlite_path: Option<PathBuf>,
}

fn default_storage_timeout() -> u64 {
    30
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_storage_timeout(),
            sqlite_path: None,
        }
    }
}

impl StorageConfig {
    /// The per-call timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Builder for [`ScepConfig`].
#[derive(Debug, Default)]
pub struct ScepConfigBuilder {
    config: ScepConfig,
}

impl ScepConfigBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the CA material source.
    pub fn ca(mut self, ca: CaConfig) -> Self {
        self.config.ca = ca;
        self
    }

    /// Set the lifetime of issued certificates.
    pub fn validity_days(mut self, days: u32) -> Self {
        self.config.signer.validity_days = days;
        self
    }

    /// Set the renewal window.
    pub fn allow_renewal_days(mut self, days: u32) -> Self {
        self.config.signer.allow_renewal_days = days;
        self
    }

    /// Issue server-profile certificates.
    pub fn server_attrs(mut self, enabled: bool) -> Self {
        self.config.signer.server_attrs = enabled;
        self
    }

    /// Sign issued certificates with `algorithm` instead of the CA's own.
    pub fn signature_algorithm(mut self, algorithm: SignatureAlgorithm) -> Self {
        self.config.signer.signature_algorithm = Some(algorithm);
        self
    }

    /// Set the per-call storage timeout.
    pub fn storage_timeout(mut self, timeout: Duration) -> Self {
        self.config.storage.timeout_secs = timeout.as_secs();
        self
    }

    /// Persist to a SQLite database at `path`.
    pub fn sqlite_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.storage.sqlite_path = Some(path.into());
        self
    }

    /// Set the logging configuration.
    pub fn logging(mut self, logging: LogConfig) -> Self {
        self.config.logging = logging;
        self
    }

    /// Build the configuration.
    ///
    /// Fails when the signer validity or storage timeout is zero.
    pub fn build(self) -> Result<ScepConfig> {
        if self.config.signer.validity_days == 0 {
            return Err(ScepError::config("validity_days must be at least 1"));
        }
        if self.config.storage.timeout_secs == 0 {
            return Err(ScepError::config("storage timeout must be at least 1 second"));
        }
        Ok(self.config)
    }
}

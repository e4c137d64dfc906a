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

//! CSR signing pipeline.
//!
//! [`DefaultCsrSigner`] turns a verified [`CsrRequest`] into an end-entity
//! certificate issued by the CA:
//!
//! - serial from the [`SerialNumberGenerator`]
//! - issuer = CA subject, subject and key from the request
//! - validity `[now - 10 min, now + validity_days]`
//! - subjectKeyIdentifier, basicConstraints `CA=false`, keyUsage and
//!   extendedKeyUsage
//!
//! The certificate is stored in the [`Depot`] before it is returned. A
//! certificate that could not be stored is never handed out.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use const_oid::db::rfc5280::{ID_KP_CLIENT_AUTH, ID_KP_SERVER_AUTH};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use x509_cert::ext::pkix::{BasicConstraints, ExtendedKeyUsage, KeyUsage, KeyUsages};
use x509_cert::ext::Extension;
use x509_cert::Certificate;

use crate::ca::CaMaterial;
use crate::config::SignerConfig;
use crate::depot::{depot_name, Depot};
use crate::error::{Result, ScepError};
use crate::pki::CsrRequest;
use crate::serial::SerialNumberGenerator;
use crate::x509::{self, CertificateTemplate};

/// Clock skew allowance applied to `notBefore`.
const BACKDATE: Duration = Duration::from_secs(10 * 60);

/// Issues certificates for verified requests.
#[async_trait]
pub trait CsrSigner: Send + Sync {
    /// Issue and persist a certificate for `request`.
    async fn sign_csr(&self, request: &CsrRequest, cancel: &CancellationToken)
        -> Result<Certificate>;
}

/// The CA-backed [`CsrSigner`].
pub struct DefaultCsrSigner {
    ca: Arc<CaMaterial>,
    serials: Arc<dyn SerialNumberGenerator>,
    depot: Depot,
    config: SignerConfig,
}

impl DefaultCsrSigner {
    /// A signer issuing from `ca`.
    pub fn new(
        ca: Arc<CaMaterial>,
        serials: Arc<dyn SerialNumberGenerator>,
        depot: Depot,
        config: SignerConfig,
    ) -> Self {
        Self {
            ca,
            serials,
            depot,
            config,
        }
    }

    /// The signer settings.
    pub fn config(&self) -> &SignerConfig {
        &self.config
    }

    fn extensions(&self, request: &CsrRequest) -> Result<Vec<Extension>> {
        let key_usage = if self.config.server_attrs {
            KeyUsage(
                KeyUsages::DigitalSignature
                    | KeyUsages::KeyEncipherment
                    | KeyUsages::DataEncipherment,
            )
        } else {
            KeyUsage(KeyUsages::DigitalSignature.into())
        };

        let mut purposes = vec![ID_KP_CLIENT_AUTH];
        if self.config.server_attrs {
            purposes.push(ID_KP_SERVER_AUTH);
        }

        Ok(vec![
            x509::extension(&x509::subject_key_identifier(request.public_key())?, false)?,
            x509::extension(
                &BasicConstraints {
                    ca: false,
                    path_len_constraint: None,
                },
                true,
            )?,
            x509::extension(&key_usage, true)?,
            x509::extension(&ExtendedKeyUsage(purposes), false)?,
        ])
    }

    fn issue(&self, request: &CsrRequest, serial: &[u8]) -> Result<Certificate> {
        let algorithm = match self.config.signature_algorithm {
            Some(algorithm) => algorithm,
            None => self.ca.signature_algorithm()?,
        };

        let now = SystemTime::now();
        CertificateTemplate {
            serial_number: x509::serial_number(serial)?,
            issuer: self.ca.subject().clone(),
            subject: request.subject().clone(),
            subject_public_key_info: request.public_key().clone(),
            not_before: now - BACKDATE,
            not_after: now + x509::days(self.config.validity_days),
            extensions: self.extensions(request)?,
        }
        .sign(algorithm, self.ca.private_key())
    }
}

#[async_trait]
impl CsrSigner for DefaultCsrSigner {
    async fn sign_csr(
        &self,
        request: &CsrRequest,
        cancel: &CancellationToken,
    ) -> Result<Certificate> {
        let serial = self.serials.next_serial(cancel).await?;

        let certificate = self
            .issue(request, &serial.to_bytes_be())
            .map_err(signing_error)?;

        let name = depot_name(&certificate).map_err(signing_error)?;
        if self.depot.has_subject(&name, &certificate, cancel).await? {
            // Revocation of the earlier certificate is not implemented.
            warn!(
                "{} already holds a certificate (renewal window {} days)",
                name, self.config.allow_renewal_days
            );
        }

        let key = self.depot.put_certificate(&certificate, cancel).await?;
        debug!("Stored issued certificate as {}", key);

        info!(
            "Issued certificate serial {} to {} (valid {} days)",
            serial, name, self.config.validity_days
        );
        Ok(certificate)
    }
}

impl std::fmt::Debug for DefaultCsrSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultCsrSigner")
            .field("ca", &self.ca)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn signing_error(error: ScepError) -> ScepError {
    match error {
        ScepError::SigningFailed(_) => error,
        other => ScepError::signing(other.to_string()),
    }
}

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

//! SCEP service implementation.
//!
//! [`ScepService`] dispatches the three SCEP operations. It keeps no state
//! of its own beyond the shared CA material and signer.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::ca::CaMaterial;
use crate::config::{ScepConfig, SignerConfig};
use crate::depot::Depot;
use crate::error::Result;
use crate::operations::{
    decode_message, getcacaps, getcacert, pkioperation, Operation, ResponseKind, ScepResponse,
};
use crate::serial::DbSerialNumberGenerator;
use crate::signer::{CsrSigner, DefaultCsrSigner};
use crate::storage::Storage;

/// SCEP operation dispatcher.
///
/// # Example
///
/// ```no_run
/// use scep_server::{ScepConfig, ScepService};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ScepConfig::from_file("/etc/scep/config.toml")?;
/// let service = ScepService::from_config(&config)?;
///
/// let (body, count) = service.get_ca_cert()?;
/// println!("GetCACert: {} bytes, {} certificate(s)", body.len(), count);
///
/// # let request_der = Vec::new();
/// let response = service
///     .pki_operation(&request_der, &CancellationToken::new())
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ScepService {
    ca: Arc<CaMaterial>,
    signer: Arc<dyn CsrSigner>,
}

impl ScepService {
    /// A service issuing with `signer` from `ca`.
    pub fn new(ca: Arc<CaMaterial>, signer: Arc<dyn CsrSigner>) -> Self {
        Self { ca, signer }
    }

    /// A service whose serial counter and depot live in `storage`.
    pub fn with_storage(ca: Arc<CaMaterial>, storage: Storage, config: SignerConfig) -> Self {
        let serials = Arc::new(DbSerialNumberGenerator::new(storage.clone()));
        let depot = Depot::new(storage);
        let signer = DefaultCsrSigner::new(Arc::clone(&ca), serials, depot, config);
        Self::new(ca, Arc::new(signer))
    }

    /// Load CA material and open storage as configured.
    ///
    /// Errors here are fatal configuration errors.
    pub fn from_config(config: &ScepConfig) -> Result<Self> {
        let ca = Arc::new(CaMaterial::from_config(&config.ca)?);
        let storage = Storage::from_config(&config.storage)?;
        debug!("SCEP service ready for {:?}", ca);
        Ok(Self::with_storage(ca, storage, config.signer.clone()))
    }

    /// The CA material.
    pub fn ca(&self) -> &Arc<CaMaterial> {
        &self.ca
    }

    /// GetCACaps: the newline-separated capability list.
    pub fn get_ca_caps(&self) -> String {
        getcacaps::capabilities_text()
    }

    /// GetCACert: the certificate payload and the number of certificates.
    pub fn get_ca_cert(&self) -> Result<(Vec<u8>, usize)> {
        getcacert::ca_certificates(&self.ca)
    }

    /// PKIOperation: the DER CertRep answering `message`.
    ///
    /// Protocol failures, cancellation included, are answered with a
    /// failure CertRep. An error is returned only when no response can be
    /// signed at all.
    pub async fn pki_operation(
        &self,
        message: &[u8],
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        pkioperation::process(&self.ca, self.signer.as_ref(), message, cancel).await
    }

    /// Run `operation` with an already-decoded message body.
    pub async fn handle(
        &self,
        operation: Operation,
        message: Option<&[u8]>,
        cancel: &CancellationToken,
    ) -> Result<ScepResponse> {
        match operation {
            Operation::GetCaCaps => Ok(ScepResponse {
                kind: ResponseKind::Capabilities,
                body: self.get_ca_caps().into_bytes(),
            }),
            Operation::GetCaCert => {
                let (body, count) = self.get_ca_cert()?;
                Ok(ScepResponse {
                    kind: ResponseKind::CaCertificates { count },
                    body,
                })
            }
            Operation::PkiOperation => {
                let body = self
                    .pki_operation(message.unwrap_or_default(), cancel)
                    .await?;
                Ok(ScepResponse {
                    kind: ResponseKind::PkiMessage,
                    body,
                })
            }
        }
    }

    /// Run a GET request: `operation` and `message` as found in the query.
    ///
    /// For PKIOperation the message is base64 and is decoded first; an
    /// undecodable message is answered like any other malformed request.
    /// For GetCACert the message names a CA and is ignored.
    pub async fn handle_get(
        &self,
        operation: &str,
        message: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<ScepResponse> {
        let operation: Operation = operation.parse()?;

        let decoded = match (operation, message) {
            (Operation::PkiOperation, Some(message)) => match decode_message(message) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!("Discarding GET PKIOperation message: {}", e);
                    None
                }
            },
            _ => None,
        };

        self.handle(operation, decoded.as_deref(), cancel).await
    }
}

impl std::fmt::Debug for ScepService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScepService")
            .field("ca", &self.ca)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::pki::PkiMessage;
    use crate::storage::MemoryDbAdapter;
    use crate::types::{MessageType, PkiFailInfo, PkiStatus};

    fn service() -> ScepService {
        let key = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
        let ca = Arc::new(CaMaterial::generate_with_key("CN=Test CA", 5, key).unwrap());
        let storage = Storage::new(Arc::new(MemoryDbAdapter::new()), Duration::from_secs(5));
        ScepService::with_storage(ca, storage, SignerConfig::default())
    }

    #[tokio::test]
    async fn test_get_ca_caps() {
        let service = service();
        let response = service
            .handle(Operation::GetCaCaps, None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.content_type(), "text/plain");
        assert!(String::from_utf8(response.body)
            .unwrap()
            .contains("POSTPKIOperation"));
    }

    #[tokio::test]
    async fn test_get_ca_cert_single() {
        let service = service();
        let response = service
            .handle_get("GetCACert", Some("ignored"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.kind, ResponseKind::CaCertificates { count: 1 });
        assert_eq!(response.content_type(), "application/x-x509-ca-cert");
        assert_eq!(response.body, service.ca().certificate_der());
    }

    #[tokio::test]
    async fn test_garbage_is_failure_response() {
        let service = service();
        let body = service
            .pki_operation(b"definitely not DER", &CancellationToken::new())
            .await
            .unwrap();

        let response = PkiMessage::parse(&body).unwrap();
        assert_eq!(response.message_type, MessageType::CertRep);
        let rep = response.cert_rep.unwrap();
        assert_eq!(rep.status, PkiStatus::Failure);
        assert_eq!(rep.fail_info, Some(PkiFailInfo::BadRequest));
        assert!(rep.recipient_nonce.is_none());
    }

    #[tokio::test]
    async fn test_get_with_bad_base64_is_failure_response() {
        let service = service();
        let response = service
            .handle_get("PKIOperation", Some("%%%"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.content_type(), "application/x-pki-message");

        let rep = PkiMessage::parse(&response.body).unwrap().cert_rep.unwrap();
        assert_eq!(rep.status, PkiStatus::Failure);
    }

    #[tokio::test]
    async fn test_from_config() {
        let ca = CaMaterial::generate("CN=Configured CA", 1, 1024).unwrap();
        let (certificate, key) = ca.to_pem().unwrap();
        let config = ScepConfig::builder()
            .ca(crate::config::CaConfig::from_pem(certificate, key))
            .validity_days(30)
            .build()
            .unwrap();

        let service = ScepService::from_config(&config).unwrap();
        assert_eq!(service.ca().certificate(), ca.certificate());
        let (body, count) = service.get_ca_cert().unwrap();
        assert_eq!(count, 1);
        assert_eq!(body, ca.certificate_der());
    }

    #[test]
    fn test_from_config_without_ca_is_fatal() {
        let err = ScepService::from_config(&ScepConfig::default()).unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_unknown_operation() {
        let service = service();
        let result = service
            .handle_get("GetNextCACert", None, &CancellationToken::new())
            .await;
        assert!(result.is_err());
    }
}

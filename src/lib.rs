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

//! # scep-server
//!
//! The server side of SCEP (RFC 8894, Simple Certificate Enrollment
//! Protocol): PKI message parsing and construction, CSR signing, serial
//! number allocation and the certificate depot.
//!
//! The crate is transport-agnostic. An HTTP front end maps the `operation`
//! query parameter onto [`ScepService`] and writes back the bytes and
//! content type of the returned [`ScepResponse`].
//!
//! ## Features
//!
//! - **All SCEP operations**: GetCACaps, GetCACert, PKIOperation
//! - **PKCS#7 messages**: SignedData over EnvelopedData with SCEP attributes
//! - **Certificate issuance** with configurable validity, profile and algorithm
//! - **Exactly-once serials** under concurrent requests
//! - **Pluggable storage** with in-memory and SQLite adapters
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use scep_server::storage::{MemoryDbAdapter, Storage};
//! use scep_server::{CaMaterial, ScepService, SignerConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Bootstrap a CA valid for five years
//!     let ca = Arc::new(CaMaterial::generate("CN=Example SCEP CA,O=Example", 5, 2048)?);
//!
//!     let storage = Storage::new(Arc::new(MemoryDbAdapter::new()), Duration::from_secs(30));
//!     let service = ScepService::with_storage(ca, storage, SignerConfig::default());
//!
//!     println!("{}", service.get_ca_caps());
//!
//!     # let request_der = Vec::new();
//!     // Always yields a signed CertRep, success or failure
//!     let response = service
//!         .pki_operation(&request_der, &CancellationToken::new())
//!         .await?;
//!     println!("CertRep: {} bytes", response.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Cargo Features
//!
//! - `sqlite`: Enables [`storage::SqliteDbAdapter`] using `rusqlite`
//!
//! ## RFC 8894 Compliance
//!
//! This library implements:
//! - Section 3.2: SCEP message object processing (`pki`)
//! - Section 3.3: SCEP message types PKCSReq, RenewalReq, UpdateReq and CertRep
//! - Section 3.5.2: CA capabilities (`operations::getcacaps`)
//! - Section 4.2: CA certificate distribution (`operations::getcacert`)
//! - Section 4.3: Certificate enrollment (`operations::pkioperation`)

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod algorithms;
pub mod asn1;
pub mod ca;
pub mod config;
pub mod csr;
pub mod depot;
pub mod error;
pub mod logging;
pub mod operations;
pub mod pki;
pub mod serial;
pub mod service;
pub mod signer;
pub mod storage;
pub mod types;
pub mod x509;

// Re-export main types at crate root for convenience
pub use algorithms::SignatureAlgorithm;
pub use ca::CaMaterial;
pub use config::{CaConfig, ScepConfig, ScepConfigBuilder, SignerConfig, StorageConfig};
pub use depot::Depot;
pub use error::{Result, ScepError};
pub use operations::{Operation, ResponseKind, ScepResponse};
pub use pki::{CsrRequest, PkiMessage};
pub use serial::{DbSerialNumberGenerator, SerialNumberGenerator};
pub use service::ScepService;
pub use signer::{CsrSigner, DefaultCsrSigner};
pub use types::{MessageType, PkiFailInfo, PkiStatus};

// Re-export x509_cert::Certificate for convenience
pub use x509_cert::Certificate;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

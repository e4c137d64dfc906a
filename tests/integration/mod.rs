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

//! Integration test utilities and helpers
//!
//! This module provides common test infrastructure for SCEP integration
//! tests: an in-memory CA service, a requester identity that builds and
//! opens PKI messages, and hand-built malformed messages.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rsa::RsaPrivateKey;
use scep_server::csr::CsrBuilder;
use scep_server::pki::{envelope, sign_message, PkiMessage, RequestTemplate};
use scep_server::serial::SERIAL_KEY;
use scep_server::storage::{DbAdapter, MemoryDbAdapter, Storage};
use scep_server::types::oid;
use scep_server::{
    asn1, CaMaterial, Certificate, MessageType, ScepError, ScepService, SignerConfig,
};

/// Subject of the CA used across the tests
pub const CA_SUBJECT: &str = "CN=Integration Test CA,O=Example";

/// A CA service over in-memory storage
pub struct TestCa {
    pub service: ScepService,
    pub ca: Arc<CaMaterial>,
    pub storage: Storage,
    pub adapter: Arc<MemoryDbAdapter>,
}

impl TestCa {
    /// A fresh CA valid for `years` with default signer settings
    pub fn new(years: u32) -> Self {
        Self::with_config(years, SignerConfig::default())
    }

    /// A fresh CA with the given signer settings
    pub fn with_config(years: u32, config: SignerConfig) -> Self {
        let key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("CA key");
        let ca = CaMaterial::generate_with_key(CA_SUBJECT, years, key).expect("CA material");
        Self::from_material(ca, config)
    }

    /// A service around existing CA material
    pub fn from_material(ca: CaMaterial, config: SignerConfig) -> Self {
        let ca = Arc::new(ca);
        let adapter = Arc::new(MemoryDbAdapter::new());
        let storage = Storage::new(adapter.clone(), Duration::from_secs(10));
        let service = ScepService::with_storage(Arc::clone(&ca), storage.clone(), config);
        Self {
            service,
            ca,
            storage,
            adapter,
        }
    }
}

/// Which writes a [`FailingWrites`] adapter refuses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    /// The serial counter key
    Serial,
    /// Every other key, i.e. depot entries
    Depot,
}

/// An in-memory adapter whose writes fail for one class of keys
pub struct FailingWrites {
    pub inner: MemoryDbAdapter,
    pub fail_on: FailOn,
}

impl FailingWrites {
    pub fn new(fail_on: FailOn) -> Self {
        Self {
            inner: MemoryDbAdapter::new(),
            fail_on,
        }
    }
}

#[async_trait]
impl DbAdapter for FailingWrites {
    async fn get_value(&self, key: &str) -> scep_server::Result<Option<Vec<u8>>> {
        self.inner.get_value(key).await
    }

    async fn set_value(&self, key: &str, value: &[u8]) -> scep_server::Result<()> {
        let is_serial = key == SERIAL_KEY;
        match (self.fail_on, is_serial) {
            (FailOn::Serial, true) | (FailOn::Depot, false) => {
                Err(ScepError::storage(format!("write to {} refused", key)))
            }
            _ => self.inner.set_value(key, value).await,
        }
    }

    async fn has_subject_prefix(
        &self,
        name: &str,
        certificate: &[u8],
    ) -> scep_server::Result<bool> {
        self.inner.has_subject_prefix(name, certificate).await
    }
}

/// A service over `adapter` and a fresh CA
pub fn service_with_adapter(adapter: Arc<dyn DbAdapter>) -> (ScepService, Arc<CaMaterial>) {
    let key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("CA key");
    let ca = Arc::new(CaMaterial::generate_with_key(CA_SUBJECT, 1, key).expect("CA material"));
    let storage = Storage::new(adapter, Duration::from_secs(10));
    let service = ScepService::with_storage(Arc::clone(&ca), storage, SignerConfig::default());
    (service, ca)
}

/// An enrolling client: an RSA key and its self-signed certificate
#[derive(Clone)]
pub struct Requester {
    pub key: RsaPrivateKey,
    pub certificate: Certificate,
}

impl Requester {
    /// A requester with a new key of `bits` bits
    pub fn new(bits: usize) -> Self {
        let key = RsaPrivateKey::new(&mut rand::thread_rng(), bits).expect("requester key");
        Self::from_key(key)
    }

    /// A requester around an existing key
    pub fn from_key(key: RsaPrivateKey) -> Self {
        let certificate = scep_server::csr::self_signed_certificate("CN=requester", &key, 1)
            .expect("self-signed certificate");
        Self { key, certificate }
    }

    /// DER PKCS#10 request for `CN=<cn>` over this requester's key
    pub fn csr(&self, cn: &str) -> Vec<u8> {
        CsrBuilder::new()
            .common_name(cn)
            .challenge_password("secret")
            .build_with_key(&self.key)
            .expect("CSR")
    }

    /// A PKCSReq for `CN=<cn>` encrypted for `ca`
    pub fn enrollment(&self, ca: &CaMaterial, cn: &str) -> PkiMessage {
        self.request(MessageType::PkcsReq, ca.certificate(), cn)
    }

    /// A request of `message_type` encrypted for `recipient`
    pub fn request(
        &self,
        message_type: MessageType,
        recipient: &Certificate,
        cn: &str,
    ) -> PkiMessage {
        let template = RequestTemplate {
            message_type,
            signer_certificate: self.certificate.clone(),
            signer_key: self.key.clone(),
            recipients: vec![recipient.clone()],
        };
        PkiMessage::new_csr_request(&self.csr(cn), &template).expect("PKI message")
    }

    /// Parse a CertRep and open its envelope with this requester's key
    pub fn open_response(&self, bytes: &[u8]) -> PkiMessage {
        PkiMessage::parse(bytes)
            .expect("CertRep parses")
            .decrypt_envelope(&self.certificate, &self.key)
            .expect("CertRep decrypts")
    }

    /// The certificate issued in a successful CertRep
    pub fn issued_certificate(&self, bytes: &[u8]) -> Certificate {
        self.open_response(bytes)
            .cert_rep
            .and_then(|rep| rep.certificate)
            .expect("CertRep carries a certificate")
    }
}

/// A PKCSReq carrying everything except a senderNonce
pub fn request_without_nonce(requester: &Requester, ca: &CaMaterial) -> Vec<u8> {
    let csr = requester.csr("no-nonce");
    let sealed = envelope::seal(&csr, std::slice::from_ref(ca.certificate())).expect("seal");

    let attributes = vec![
        asn1::attribute(
            oid::TRANSACTION_ID,
            asn1::encode_printable_string("no-nonce-transaction").expect("transactionID"),
        )
        .expect("attribute"),
        asn1::attribute(
            oid::MESSAGE_TYPE,
            asn1::encode_integer(MessageType::PkcsReq.as_i32()).expect("messageType"),
        )
        .expect("attribute"),
    ];

    sign_message(
        Some(&sealed),
        attributes,
        &requester.certificate,
        &requester.key,
    )
    .expect("signed message")
}

/// Bytes that are not a PKCS#7 structure
pub fn random_bytes(len: usize) -> Vec<u8> {
    use rand::RngCore;
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    // Never a SEQUENCE tag, so the outer decode always fails
    bytes[0] = 0x04;
    bytes
}

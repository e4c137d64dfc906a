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

//! Integration tests for PKIOperation

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use der::Encode;
use rsa::RsaPrivateKey;

use crate::integration::{
    random_bytes, request_without_nonce, service_with_adapter, FailOn, FailingWrites, Requester,
    TestCa,
};
use scep_server::depot::certificate_key;
use scep_server::pki::transaction_id;
use scep_server::serial::SERIAL_KEY;
use scep_server::storage::DbAdapter;
use scep_server::{
    CaMaterial, MessageType, PkiFailInfo, PkiMessage, PkiStatus, ScepError, SignatureAlgorithm,
    SignerConfig,
};
use tokio_util::sync::CancellationToken;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[tokio::test]
async fn test_enrollment_round_trip() {
    let ca = TestCa::new(1);
    let requester = Requester::new(1024);
    let cancel = CancellationToken::new();

    let request = requester.enrollment(&ca.ca, "device.example.com");
    let body = ca
        .service
        .pki_operation(&request.raw, &cancel)
        .await
        .expect("PKIOperation always answers");

    let response = requester.open_response(&body);
    assert_eq!(response.message_type, MessageType::CertRep);
    assert_eq!(response.transaction_id, request.transaction_id);
    assert_eq!(response.recipient_nonce, request.sender_nonce);
    assert_ne!(response.sender_nonce, request.sender_nonce);
    assert_eq!(response.signer_certificate.as_ref(), Some(ca.ca.certificate()));

    let rep = response.cert_rep.expect("CertRep payload");
    assert_eq!(rep.status, PkiStatus::Success);
    assert!(rep.fail_info.is_none());

    // The certificate the requester receives is the one the signer stored
    let issued = rep.certificate.expect("issued certificate");
    assert_eq!(&issued.tbs_certificate.issuer, ca.service.ca().subject());

    let key = certificate_key(&issued).unwrap();
    let depot_bytes = ca
        .storage
        .get_value(&key, &cancel)
        .await
        .unwrap()
        .expect("issued certificate is in the depot");
    assert_eq!(depot_bytes, issued.to_der().unwrap());
}

#[tokio::test]
async fn test_cname_scenario() {
    let ca = TestCa::new(5);
    let requester = Requester::new(2048);
    let cancel = CancellationToken::new();

    let submitted = SystemTime::now();
    let request = requester.enrollment(&ca.ca, "cname");
    let body = ca.service.pki_operation(&request.raw, &cancel).await.unwrap();
    let issued = requester.issued_certificate(&body);

    let tbs = &issued.tbs_certificate;
    assert_eq!(&tbs.issuer, ca.ca.subject());
    assert_eq!(tbs.subject.to_string(), "CN=cname");

    let not_before = tbs.validity.not_before.to_system_time();
    let not_after = tbs.validity.not_after.to_system_time();
    let backdate = submitted
        .duration_since(not_before)
        .expect("not-before precedes submission");
    assert!(backdate <= Duration::from_secs(10 * 60 + 1));
    assert!(not_after <= submitted + DAY * 365 * 5 + Duration::from_secs(60));

    // A second enrollment in the same run gets a new serial
    let again = requester.enrollment(&ca.ca, "cname");
    let body = ca.service.pki_operation(&again.raw, &cancel).await.unwrap();
    let second = requester.issued_certificate(&body);
    assert_ne!(
        second.tbs_certificate.serial_number,
        issued.tbs_certificate.serial_number
    );
}

#[tokio::test]
async fn test_signature_algorithm_follows_ca() {
    let ca = TestCa::new(1);
    let requester = Requester::new(1024);
    let cancel = CancellationToken::new();

    let request = requester.enrollment(&ca.ca, "device");
    let body = ca.service.pki_operation(&request.raw, &cancel).await.unwrap();
    let issued = requester.issued_certificate(&body);

    assert_eq!(
        issued.signature_algorithm,
        ca.ca.certificate().signature_algorithm
    );
    assert_eq!(
        issued.tbs_certificate.signature,
        ca.ca.certificate().signature_algorithm
    );
}

#[tokio::test]
async fn test_configured_signature_algorithm() {
    let ca = TestCa::with_config(
        1,
        SignerConfig {
            signature_algorithm: Some(SignatureAlgorithm::Sha512WithRsa),
            ..SignerConfig::default()
        },
    );
    let requester = Requester::new(1024);

    let request = requester.enrollment(&ca.ca, "device");
    let body = ca
        .service
        .pki_operation(&request.raw, &CancellationToken::new())
        .await
        .unwrap();
    let issued = requester.issued_certificate(&body);

    assert_eq!(
        SignatureAlgorithm::from_algorithm_identifier(&issued.signature_algorithm).unwrap(),
        SignatureAlgorithm::Sha512WithRsa
    );
}

#[tokio::test]
async fn test_renewal_request_is_signed() {
    let ca = TestCa::new(1);
    let requester = Requester::new(1024);

    let request = requester.request(MessageType::RenewalReq, ca.ca.certificate(), "device");
    let body = ca
        .service
        .pki_operation(&request.raw, &CancellationToken::new())
        .await
        .unwrap();

    let rep = requester.open_response(&body).cert_rep.unwrap();
    assert_eq!(rep.status, PkiStatus::Success);
}

#[tokio::test]
async fn test_transaction_id_determinism() {
    let ca = TestCa::new(1);
    let requester = Requester::new(1024);
    let other = Requester::new(1024);

    let first = requester.enrollment(&ca.ca, "device");
    let second = requester.enrollment(&ca.ca, "another-name");
    let third = other.enrollment(&ca.ca, "device");

    assert_eq!(first.transaction_id, second.transaction_id);
    assert_ne!(first.transaction_id, third.transaction_id);
    assert_ne!(first.sender_nonce, second.sender_nonce);

    let spki = scep_server::pki::CsrRequest::from_der(requester.csr("device"), None)
        .unwrap()
        .public_key()
        .clone();
    assert_eq!(transaction_id(&spki).unwrap(), first.transaction_id);

    // Parsed from the wire, the ID is unchanged
    let parsed = PkiMessage::parse(&first.raw).unwrap();
    assert_eq!(parsed.transaction_id, first.transaction_id);
}

#[tokio::test]
async fn test_missing_nonce_rejected_before_decryption() {
    let ca = TestCa::new(1);
    let requester = Requester::new(1024);

    // Encrypted for another CA: decrypting would fail with NoMatchingRecipient
    let stranger = {
        let key = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
        CaMaterial::generate_with_key("CN=Stranger", 1, key).unwrap()
    };
    let bytes = request_without_nonce(&requester, &stranger);

    assert!(matches!(
        PkiMessage::parse(&bytes),
        Err(ScepError::MissingNonce)
    ));

    let body = ca
        .service
        .pki_operation(&bytes, &CancellationToken::new())
        .await
        .unwrap();
    let rep = PkiMessage::parse(&body).unwrap().cert_rep.unwrap();
    assert_eq!(rep.status, PkiStatus::Failure);
    assert_eq!(rep.fail_info, Some(PkiFailInfo::BadRequest));
}

#[tokio::test]
async fn test_random_bytes_are_malformed() {
    let ca = TestCa::new(1);

    for len in [1, 16, 300] {
        let bytes = random_bytes(len);
        assert!(matches!(
            PkiMessage::parse(&bytes),
            Err(ScepError::MalformedMessage(_))
        ));

        let body = ca
            .service
            .pki_operation(&bytes, &CancellationToken::new())
            .await
            .unwrap();
        let response = PkiMessage::parse(&body).unwrap();
        assert!(response.transaction_id.is_empty());
        assert_eq!(
            response.cert_rep.unwrap().fail_info,
            Some(PkiFailInfo::BadRequest)
        );
    }
}

#[tokio::test]
async fn test_wrong_recipient_is_failure_response() {
    let ca = TestCa::new(1);
    let requester = Requester::new(1024);
    let stranger = {
        let key = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
        CaMaterial::generate_with_key("CN=Stranger", 1, key).unwrap()
    };

    let request = requester.enrollment(&stranger, "device");
    let body = ca
        .service
        .pki_operation(&request.raw, &CancellationToken::new())
        .await
        .unwrap();

    let response = PkiMessage::parse(&body).unwrap();
    assert_eq!(response.transaction_id, request.transaction_id);
    assert_eq!(response.recipient_nonce, request.sender_nonce);
    assert!(response.envelope.is_empty());

    let rep = response.cert_rep.unwrap();
    assert_eq!(rep.status, PkiStatus::Failure);
    assert_eq!(rep.fail_info, Some(PkiFailInfo::BadRequest));
    assert!(ca.adapter.is_empty().await, "nothing issued");
}

#[tokio::test]
async fn test_cancelled_operation_is_failure_response() {
    let ca = TestCa::new(1);
    let requester = Requester::new(1024);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let request = requester.enrollment(&ca.ca, "device");
    let body = ca.service.pki_operation(&request.raw, &cancel).await.unwrap();

    let rep = PkiMessage::parse(&body).unwrap().cert_rep.unwrap();
    assert_eq!(rep.status, PkiStatus::Failure);
    assert!(ca.adapter.is_empty().await);
}

#[tokio::test]
async fn test_get_pki_operation() {
    let ca = TestCa::new(1);
    let requester = Requester::new(1024);

    let request = requester.enrollment(&ca.ca, "device");
    let message = URL_SAFE_NO_PAD.encode(&request.raw);

    let response = ca
        .service
        .handle_get("PKIOperation", Some(&message), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(response.content_type(), "application/x-pki-message");

    let issued = requester.issued_certificate(&response.body);
    assert_eq!(issued.tbs_certificate.subject.to_string(), "CN=device");
}

#[tokio::test]
async fn test_depot_write_failure_is_never_success() {
    let adapter = Arc::new(FailingWrites::new(FailOn::Depot));
    let (service, ca) = service_with_adapter(adapter.clone());
    let requester = Requester::new(1024);

    let request = requester.enrollment(&ca, "device");
    let body = service
        .pki_operation(&request.raw, &CancellationToken::new())
        .await
        .expect("PKIOperation always answers");

    let response = PkiMessage::parse(&body).unwrap();
    assert_eq!(response.transaction_id, request.transaction_id);
    assert!(response.envelope.is_empty(), "no certificate leaves the CA");

    let rep = response.cert_rep.unwrap();
    assert_eq!(rep.status, PkiStatus::Failure);
    assert_eq!(rep.fail_info, Some(PkiFailInfo::BadRequest));
    assert!(rep.certificate.is_none());

    // The serial was consumed, but nothing was stored besides the counter
    assert!(adapter.inner.get_value(SERIAL_KEY).await.unwrap().is_some());
    assert_eq!(adapter.inner.len().await, 1);
}

#[tokio::test]
async fn test_serial_write_failure_is_never_success() {
    let adapter = Arc::new(FailingWrites::new(FailOn::Serial));
    let (service, ca) = service_with_adapter(adapter.clone());
    let requester = Requester::new(1024);

    let request = requester.enrollment(&ca, "device");
    let body = service
        .pki_operation(&request.raw, &CancellationToken::new())
        .await
        .expect("PKIOperation always answers");

    let response = PkiMessage::parse(&body).unwrap();
    assert!(response.envelope.is_empty());

    let rep = response.cert_rep.unwrap();
    assert_eq!(rep.status, PkiStatus::Failure);
    assert_eq!(rep.fail_info, Some(PkiFailInfo::BadRequest));
    assert!(adapter.inner.is_empty().await, "nothing issued");
}

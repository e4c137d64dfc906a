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

//! Integration tests for GetCACert

use crate::integration::TestCa;
use rsa::RsaPrivateKey;
use scep_server::types::parse_certs_only;
use scep_server::{CaMaterial, Certificate, Operation, ResponseKind, SignerConfig};
use tokio_util::sync::CancellationToken;

fn chain_certificate(subject: &str) -> Certificate {
    let key = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
    CaMaterial::generate_with_key(subject, 1, key)
        .unwrap()
        .certificate()
        .clone()
}

#[tokio::test]
async fn test_single_ca_certificate() {
    let ca = TestCa::new(1);

    let (body, count) = ca.service.get_ca_cert().expect("GetCACert");

    assert_eq!(count, 1);
    assert_eq!(body, ca.ca.certificate_der());

    let response = ca
        .service
        .handle(Operation::GetCaCert, None, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(response.content_type(), "application/x-x509-ca-cert");
}

#[tokio::test]
async fn test_ca_with_chain() {
    let key = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
    let chain = vec![
        chain_certificate("CN=Intermediate"),
        chain_certificate("CN=Root"),
    ];
    let material = CaMaterial::generate_with_key("CN=Issuing CA", 1, key)
        .unwrap()
        .with_additional_certificates(chain.clone());
    let ca = TestCa::from_material(material, SignerConfig::default());

    let (body, count) = ca.service.get_ca_cert().expect("GetCACert");
    assert_eq!(count, chain.len() + 1);

    let certificates = parse_certs_only(&body).expect("degenerate bundle");
    assert_eq!(certificates.len(), 3);
    assert!(certificates.contains(ca.ca.certificate()));
    for cert in &chain {
        assert!(certificates.contains(cert));
    }

    let response = ca
        .service
        .handle(Operation::GetCaCert, None, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(response.kind, ResponseKind::CaCertificates { count: 3 });
    assert_eq!(response.content_type(), "application/x-x509-ca-ra-cert");
}

#[tokio::test]
async fn test_bundle_order_on_the_wire() {
    let key = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
    let chain = vec![chain_certificate("CN=Zeta"), chain_certificate("CN=Alpha")];
    let material = CaMaterial::generate_with_key("CN=Issuing CA", 1, key)
        .unwrap()
        .with_additional_certificates(chain.clone());

    let body = material.degenerate_bundle().unwrap();
    let position = |cert: &Certificate| {
        let der = der::Encode::to_der(cert).unwrap();
        body.windows(der.len())
            .position(|window| window == der.as_slice())
            .expect("certificate present in bundle")
    };

    let ca_at = position(material.certificate());
    let first_at = position(&chain[0]);
    let second_at = position(&chain[1]);
    assert!(ca_at < first_at);
    assert!(first_at < second_at);
}

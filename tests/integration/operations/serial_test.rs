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

//! Serial uniqueness across concurrent PKIOperations

use std::collections::HashSet;
use std::sync::Arc;

use rsa::BigUint;
use scep_server::serial::SERIAL_KEY;
use scep_server::PkiStatus;
use tokio_util::sync::CancellationToken;

use crate::integration::{Requester, TestCa};

const CONCURRENT_REQUESTS: usize = 50;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_enrollments_get_unique_serials() {
    let ca = Arc::new(TestCa::new(1));
    let requester = Arc::new(Requester::new(1024));

    // Build every request up front so the operations overlap
    let requests: Vec<Vec<u8>> = (0..CONCURRENT_REQUESTS)
        .map(|i| requester.enrollment(&ca.ca, &format!("device-{}", i)).raw)
        .collect();

    let mut handles = Vec::with_capacity(CONCURRENT_REQUESTS);
    for raw in requests {
        let ca = Arc::clone(&ca);
        handles.push(tokio::spawn(async move {
            ca.service
                .pki_operation(&raw, &CancellationToken::new())
                .await
                .expect("PKIOperation always answers")
        }));
    }

    let mut serials = HashSet::new();
    for handle in handles {
        let body = handle.await.expect("task completes");
        let response = requester.open_response(&body);
        let rep = response.cert_rep.expect("CertRep payload");
        assert_eq!(rep.status, PkiStatus::Success);

        let issued = rep.certificate.expect("issued certificate");
        let serial = issued.tbs_certificate.serial_number.as_bytes().to_vec();
        assert!(serials.insert(serial), "duplicate serial issued");
    }
    assert_eq!(serials.len(), CONCURRENT_REQUESTS);

    // Counter holds the last issued serial, plus one entry per certificate
    let counter = ca
        .storage
        .get_value(SERIAL_KEY, &CancellationToken::new())
        .await
        .unwrap()
        .expect("serial counter persisted");
    assert_eq!(
        BigUint::from_bytes_be(&counter),
        BigUint::from((CONCURRENT_REQUESTS + 1) as u32)
    );
    assert_eq!(ca.adapter.len().await, CONCURRENT_REQUESTS + 1);
}

#[tokio::test]
async fn test_sequential_serials_increase() {
    let ca = TestCa::new(1);
    let requester = Requester::new(1024);
    let cancel = CancellationToken::new();

    let mut previous = BigUint::from(0u32);
    for i in 0..5 {
        let request = requester.enrollment(&ca.ca, &format!("device-{}", i));
        let body = ca.service.pki_operation(&request.raw, &cancel).await.unwrap();
        let issued = requester.issued_certificate(&body);

        let serial = BigUint::from_bytes_be(issued.tbs_certificate.serial_number.as_bytes());
        assert!(serial > previous);
        previous = serial;
    }
    assert_eq!(previous, BigUint::from(6u32));
}

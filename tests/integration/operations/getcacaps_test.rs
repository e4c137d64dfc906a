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

//! Integration tests for GetCACaps

use crate::integration::TestCa;
use scep_server::Operation;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_capabilities_listed() {
    let ca = TestCa::new(1);

    let caps = ca.service.get_ca_caps();
    let lines: Vec<&str> = caps.lines().collect();

    for expected in ["Renewal", "SHA-1", "SHA-256", "AES", "DES3", "POSTPKIOperation"] {
        assert!(lines.contains(&expected), "missing capability {}", expected);
    }
}

#[tokio::test]
async fn test_capabilities_via_get() {
    let ca = TestCa::new(1);

    let response = ca
        .service
        .handle_get("GetCACaps", None, &CancellationToken::new())
        .await
        .expect("GetCACaps never fails");

    assert_eq!(response.content_type(), "text/plain");
    assert_eq!(response.body, ca.service.get_ca_caps().into_bytes());

    // Idempotent
    let again = ca
        .service
        .handle(Operation::GetCaCaps, None, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(again, response);
}

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

//! Integration tests for storage configuration and durable adapters

use scep_server::storage::Storage;
use scep_server::StorageConfig;

#[test]
fn test_default_storage_is_in_memory() {
    let storage = Storage::from_config(&StorageConfig::default()).expect("memory storage");
    assert_eq!(storage.timeout().as_secs(), 30);
}

#[cfg(not(feature = "sqlite"))]
#[test]
fn test_sqlite_path_needs_feature() {
    use scep_server::ScepError;

    let config = StorageConfig {
        sqlite_path: Some("/tmp/depot.sqlite".into()),
        ..StorageConfig::default()
    };
    assert!(matches!(
        Storage::from_config(&config),
        Err(ScepError::Config(_))
    ));
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_serials_survive_restart() {
    use std::sync::Arc;

    use scep_server::depot::certificate_key;
    use scep_server::{ScepService, SignerConfig};
    use tokio_util::sync::CancellationToken;

    use crate::integration::{Requester, TestCa};

    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig {
        sqlite_path: Some(dir.path().join("depot.sqlite")),
        ..StorageConfig::default()
    };
    let ca = TestCa::new(1);
    let requester = Requester::new(1024);
    let cancel = CancellationToken::new();

    let first = {
        let storage = Storage::from_config(&config).unwrap();
        let service =
            ScepService::with_storage(Arc::clone(&ca.ca), storage, SignerConfig::default());
        let request = requester.enrollment(&ca.ca, "device");
        let body = service.pki_operation(&request.raw, &cancel).await.unwrap();
        requester.issued_certificate(&body)
    };

    // Reopen the same database
    let storage = Storage::from_config(&config).unwrap();
    let service =
        ScepService::with_storage(Arc::clone(&ca.ca), storage.clone(), SignerConfig::default());
    let request = requester.enrollment(&ca.ca, "device");
    let body = service.pki_operation(&request.raw, &cancel).await.unwrap();
    let second = requester.issued_certificate(&body);

    assert_ne!(
        first.tbs_certificate.serial_number,
        second.tbs_certificate.serial_number
    );
    assert!(storage
        .get_value(&certificate_key(&first).unwrap(), &cancel)
        .await
        .unwrap()
        .is_some());
}

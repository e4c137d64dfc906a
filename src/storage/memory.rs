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

//! In-process key/value adapter.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::DbAdapter;
use crate::error::Result;

/// A [`DbAdapter`] over an ordered in-memory map.
///
/// Suitable for tests and single-process deployments that do not need
/// issued certificates or the serial counter to survive a restart.
#[derive(Debug, Default)]
pub struct MemoryDbAdapter {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryDbAdapter {
    /// Create an empty adapter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// All keys starting with `prefix`, in order.
    pub async fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries
            .read()
            .await
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect()
    }
}

#[async_trait]
impl DbAdapter for MemoryDbAdapter {
    async fn get_value(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set_value(&self, key: &str, value: &[u8]) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn has_subject_prefix(&self, name: &str, certificate: &[u8]) -> Result<bool> {
        let entries = self.entries.read().await;
        let found = entries
            .range(name.to_string()..)
            .take_while(|(key, _)| key.starts_with(name))
            .any(|(_, value)| value.as_slice() == certificate);
        Ok(found)
    }
}

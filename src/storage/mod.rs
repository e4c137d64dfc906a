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

//! Key/value persistence for the serial counter and the certificate depot.
//!
//! Backends implement [`DbAdapter`]. The engine never calls an adapter
//! directly: every call goes through [`Storage`], which bounds it with a
//! timeout and aborts it when the caller's [`CancellationToken`] fires.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use scep_server::storage::{MemoryDbAdapter, Storage};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> scep_server::Result<()> {
//! let storage = Storage::new(Arc::new(MemoryDbAdapter::new()), Duration::from_secs(30));
//! let cancel = CancellationToken::new();
//!
//! storage.set_value("serial", &[0x02], &cancel).await?;
//! assert_eq!(storage.get_value("serial", &cancel).await?, Some(vec![0x02]));
//! # Ok(())
//! # }
//! ```

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::MemoryDbAdapter;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDbAdapter;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::StorageConfig;
use crate::error::{Result, ScepError};

/// Minimal key/value contract a persistence backend must satisfy.
#[async_trait]
pub trait DbAdapter: Send + Sync {
    /// Read the value stored under `key`.
    async fn get_value(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set_value(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Returns true if any value stored under a key starting with `name`
    /// is byte-equal to `certificate`.
    async fn has_subject_prefix(&self, name: &str, certificate: &[u8]) -> Result<bool>;
}

/// Time-bounded, cancellable access to a [`DbAdapter`].
#[derive(Clone)]
pub struct Storage {
    adapter: Arc<dyn DbAdapter>,
    timeout: Duration,
}

impl Storage {
    /// Wrap an adapter. Every call must finish within `timeout`.
    pub fn new(adapter: Arc<dyn DbAdapter>, timeout: Duration) -> Self {
        Self { adapter, timeout }
    }

    /// Storage as described by the configuration: SQLite when a path is
    /// set, otherwise an in-memory map.
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let adapter: Arc<dyn DbAdapter> = match &config.sqlite_path {
            #[cfg(feature = "sqlite")]
            Some(path) => Arc::new(SqliteDbAdapter::open(path)?),
            #[cfg(not(feature = "sqlite"))]
            Some(path) => {
                return Err(ScepError::config(format!(
                    "sqlite_path {} requires the `sqlite` feature",
                    path.display()
                )))
            }
            None => {
                tracing::warn!("No sqlite_path configured; issued certificates are kept in memory");
                Arc::new(MemoryDbAdapter::new())
            }
        };
        Ok(Self::new(adapter, config.timeout()))
    }

    /// The per-call timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Read the value stored under `key`.
    pub async fn get_value(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<u8>>> {
        self.bounded("get_value", cancel, self.adapter.get_value(key))
            .await
    }

    /// Store `value` under `key`.
    pub async fn set_value(
        &self,
        key: &str,
        value: &[u8],
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.bounded("set_value", cancel, self.adapter.set_value(key, value))
            .await
    }

    /// Prefix scan for a byte-equal certificate.
    pub async fn has_subject_prefix(
        &self,
        name: &str,
        certificate: &[u8],
        cancel: &CancellationToken,
    ) -> Result<bool> {
        self.bounded(
            "has_subject_prefix",
            cancel,
            self.adapter.has_subject_prefix(name, certificate),
        )
        .await
    }

    async fn bounded<T, F>(
        &self,
        operation: &str,
        cancel: &CancellationToken,
        call: F,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("Storage {} cancelled", operation);
                Err(ScepError::Cancelled)
            }
            result = tokio::time::timeout(self.timeout, call) => match result {
                Ok(inner) => inner,
                Err(_) => Err(ScepError::storage(format!(
                    "{} did not complete within {:?}",
                    operation, self.timeout
                ))),
            },
        }
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

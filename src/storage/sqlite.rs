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

//! SQLite-backed key/value adapter.
//!
//! All values live in one table:
//!
//! ```sql
//! CREATE TABLE scep_certificates (key TEXT PRIMARY KEY, value BLOB NOT NULL)
//! ```
//!
//! `rusqlite` is synchronous, so each call runs on the blocking pool.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::DbAdapter;
use crate::error::{Result, ScepError};

const CREATE_TABLE: &str =
    "CREATE TABLE IF NOT EXISTS scep_certificates (key TEXT PRIMARY KEY, value BLOB NOT NULL)";

/// A [`DbAdapter`] persisting to a SQLite database file.
#[derive(Debug, Clone)]
pub struct SqliteDbAdapter {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteDbAdapter {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let connection = Connection::open(path).map_err(|e| {
            ScepError::storage(format!(
                "Failed to open SQLite database '{}': {}",
                path.display(),
                e
            ))
        })?;
        debug!("Opened SQLite depot at {}", path.display());
        Self::with_connection(connection)
    }

    /// An adapter over a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let connection = Connection::open_in_memory()
            .map_err(|e| ScepError::storage(format!("Failed to open SQLite database: {}", e)))?;
        Self::with_connection(connection)
    }

    fn with_connection(connection: Connection) -> Result<Self> {
        connection
            .execute(CREATE_TABLE, [])
            .map_err(|e| ScepError::storage(format!("Failed to create table: {}", e)))?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let connection = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || {
            let guard = connection
                .lock()
                .map_err(|_| ScepError::storage("SQLite connection lock poisoned"))?;
            f(&guard).map_err(|e| ScepError::storage(format!("SQLite error: {}", e)))
        })
        .await
        .map_err(|e| ScepError::storage(format!("SQLite task failed: {}", e)))?
    }
}

#[async_trait]
impl DbAdapter for SqliteDbAdapter {
    async fn get_value(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let key = key.to_string();
        self.with_blocking(move |conn| {
            conn.query_row(
                "SELECT value FROM scep_certificates WHERE key = ?1",
                params![key],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()
        })
        .await
    }

    async fn set_value(&self, key: &str, value: &[u8]) -> Result<()> {
        let key = key.to_string();
        let value = value.to_vec();
        self.with_blocking(move |conn| {
            conn.execute(
                "INSERT INTO scep_certificates (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .map(|_| ())
        })
        .await
    }

    async fn has_subject_prefix(&self, name: &str, certificate: &[u8]) -> Result<bool> {
        let name = name.to_string();
        let certificate = certificate.to_vec();
        self.with_blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT value FROM scep_certificates WHERE substr(key, 1, length(?1)) = ?1",
            )?;
            let mut rows = stmt.query(params![name])?;
            while let Some(row) = rows.next()? {
                let value: Vec<u8> = row.get(0)?;
                if value == certificate {
                    return Ok(true);
                }
            }
            Ok(false)
        })
        .await
    }
}

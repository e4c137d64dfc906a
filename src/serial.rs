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

//! Certificate serial number allocation.
//!
//! The counter is persisted big-endian under the `serial` key. Storage
//! offers no multi-key transactions, so [`DbSerialNumberGenerator`] holds
//! an async mutex across the whole read-increment-write.

use async_trait::async_trait;
use rsa::BigUint;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Result, ScepError};
use crate::storage::Storage;

/// Storage key of the serial counter.
pub const SERIAL_KEY: &str = "serial";

/// Source of unique, strictly increasing certificate serial numbers.
#[async_trait]
pub trait SerialNumberGenerator: Send + Sync {
    /// Allocate the next serial number.
    async fn next_serial(&self, cancel: &CancellationToken) -> Result<BigUint>;
}

/// Serial allocator backed by a persisted counter.
#[derive(Debug)]
pub struct DbSerialNumberGenerator {
    storage: Storage,
    lock: Mutex<()>,
}

impl DbSerialNumberGenerator {
    /// An allocator persisting its counter in `storage`.
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            lock: Mutex::new(()),
        }
    }

    async fn read_counter(&self, cancel: &CancellationToken) -> Result<BigUint> {
        let stored = self.storage.get_value(SERIAL_KEY, cancel).await?;
        // An empty value counts as an unset counter
        match stored {
            Some(bytes) if !bytes.is_empty() => Ok(BigUint::from_bytes_be(&bytes)),
            _ => Ok(BigUint::from(1u32)),
        }
    }
}

#[async_trait]
impl SerialNumberGenerator for DbSerialNumberGenerator {
    async fn next_serial(&self, cancel: &CancellationToken) -> Result<BigUint> {
        let _guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ScepError::Cancelled),
            guard = self.lock.lock() => guard,
        };

        let current = self.read_counter(cancel).await.map_err(allocation_error)?;
        let next = current + BigUint::from(1u32);

        self.storage
            .set_value(SERIAL_KEY, &next.to_bytes_be(), cancel)
            .await
            .map_err(allocation_error)?;

        debug!("Allocated serial {}", next);
        Ok(next)
    }
}

fn allocation_error(error: ScepError) -> ScepError {
    match error {
        ScepError::Cancelled | ScepError::SerialAllocationFailed(_) => error,
        other => ScepError::serial_allocation(other.to_string()),
    }
}

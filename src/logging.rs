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

//! Logging setup.
//!
//! The engine logs through `tracing`. Hosts that do not install their own
//! subscriber can call [`init_logging`]:
//!
//! ```toml
//! [logging]
//! level = "info"
//! json_format = false
//! with_target = false
//! ```
//!
//! `RUST_LOG`, when set, overrides `level`.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::error::{Result, ScepError};

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Filter directive: "trace", "debug", "info", "warn", "error", or a
    /// full `EnvFilter` directive such as `"scep_server=debug,info"`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable text.
    #[serde(default)]
    pub json_format: bool,

    /// Include the event target (module path) in each line.
    #[serde(default)]
    pub with_target: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            with_target: false,
        }
    }
}

impl LogConfig {
    /// A config logging at `level`.
    pub fn with_level(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Self::default()
        }
    }

    /// The filter this config selects, ignoring `RUST_LOG`.
    pub fn filter(&self) -> Result<EnvFilter> {
        EnvFilter::try_new(&self.level)
            .map_err(|e| ScepError::config(format!("Invalid log level {:?}: {}", self.level, e)))
    }
}

/// Install a global `tracing` subscriber for `config`.
///
/// Fails if the level is not a valid filter or a global subscriber is
/// already installed.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => config.filter()?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target);

    let installed = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| ScepError::config(format!("Failed to install logger: {}", e)))
}

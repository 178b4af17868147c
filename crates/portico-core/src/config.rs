// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application and bridge configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// Tunables for one bridge session (either side of the boundary).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Default timeout for host-originated `request` calls.
    pub request_timeout_ms: u64,
    /// Default timeout for content-originated `call` requests.
    pub call_timeout_ms: u64,
    /// How deep the binary transcoder walks an inbound payload.
    pub max_payload_depth: usize,
    /// Serialized payloads larger than this are logged without their length.
    pub log_payload_limit: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            call_timeout_ms: 30_000,
            max_payload_depth: 32,
            log_payload_limit: 2048,
        }
    }
}

impl BridgeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

/// Persistent shell settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// The external page rendered by the content surface.
    pub content_url: String,
    /// `tracing` filter used when `RUST_LOG` is not set.
    pub log_filter: String,
    /// Bridge tunables.
    pub bridge: BridgeConfig,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            content_url: "https://example.com/".into(),
            log_filter: "info".into(),
            bridge: BridgeConfig::default(),
        }
    }
}

impl ShellConfig {
    /// Load settings from a JSON file. Missing fields fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)?;
        serde_json::from_str(&data)
            .map_err(|e| BridgeError::Config(format!("{}: {e}", path.display())))
    }

    /// Write settings as pretty-printed JSON.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

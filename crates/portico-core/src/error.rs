// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Portico.
//
// The `Display` text of each variant is the exact string placed in the
// `error` field of a failure reply, so content-side callers see
// `Unknown action: foo` rather than a wrapped description.

use thiserror::Error;

use crate::envelope::DecodeError;

/// Top-level error type for all Portico operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    // -- Protocol errors --
    #[error("not a bridge message: {0}")]
    Decode(#[from] DecodeError),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// Error raised by a handler body. Carries the handler's own message.
    #[error("{0}")]
    Handler(String),

    #[error("Handler panicked: {0}")]
    HandlerPanicked(String),

    #[error("Handler timeout: {0}")]
    HandlerTimeout(String),

    #[error("Request timeout: {0}")]
    RequestTimeout(String),

    /// A correlated request received a failure reply.
    #[error("{0}")]
    Remote(String),

    #[error("Invalid arguments for {action}: {detail}")]
    InvalidArguments { action: String, detail: String },

    #[error("invalid binary payload: {0}")]
    Binary(String),

    // -- Surface / session --
    #[error("Surface detached: {0}")]
    SurfaceDetached(String),

    #[error("content surface error: {0}")]
    Surface(String),

    #[error("Not running inside the app shell: {0}")]
    NotInApp(String),

    #[error("Bridge session closed: {0}")]
    SessionClosed(String),

    #[error("security token error: {0}")]
    Token(String),

    #[error("async runtime unavailable: {0}")]
    Runtime(String),

    // -- Configuration / persistence --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Platform capabilities --
    #[error("{0}")]
    Platform(String),

    #[error("feature not available on this platform")]
    PlatformUnavailable,
}

impl BridgeError {
    /// Shorthand for a handler-raised error.
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler(message.into())
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_messages_match_wire_contract() {
        assert_eq!(
            BridgeError::UnknownAction("doesNotExist".into()).to_string(),
            "Unknown action: doesNotExist"
        );
        assert_eq!(
            BridgeError::HandlerTimeout("slow".into()).to_string(),
            "Handler timeout: slow"
        );
        assert_eq!(
            BridgeError::RequestTimeout("ping".into()).to_string(),
            "Request timeout: ping"
        );
        assert_eq!(BridgeError::handler("disk full").to_string(), "disk full");
    }
}

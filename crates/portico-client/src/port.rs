// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content → host transport seam.

use std::sync::{Arc, Mutex, PoisonError};

use portico_core::error::Result;

/// Whatever the embedding exposes for posting a string to the host
/// (`webkit.messageHandlers`, a JS interface object, a channel...).
pub trait HostPort: Send + Sync {
    fn post_message(&self, raw: &str) -> Result<()>;
}

/// Port that keeps every posted string.
#[derive(Default)]
pub struct RecordingPort {
    posted: Mutex<Vec<String>>,
}

impl RecordingPort {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn posted(&self) -> Vec<String> {
        self.posted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl HostPort for RecordingPort {
    fn post_message(&self, raw: &str) -> Result<()> {
        self.posted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(raw.to_owned());
        Ok(())
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shell settings loading.

use std::path::Path;

use portico_core::ShellConfig;
use portico_core::error::{BridgeError, Result};

/// Load settings from `path`.
///
/// A missing file is not an error and yields `Ok(None)`.  A file that exists
/// but cannot be read or parsed is reported so the caller can log it once
/// logging is up.
pub fn load(path: &Path) -> Result<Option<ShellConfig>> {
    match ShellConfig::load(path) {
        Ok(config) => Ok(Some(config)),
        Err(BridgeError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-aware data directory and config file resolution.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "PORTICO_CONFIG";

const CONFIG_FILE: &str = "config.json";

/// Return the application data directory, creating it if needed.
///
/// On desktop this uses a conventional location. On mobile the embedding
/// should provide the app's documents directory instead.
pub fn data_dir() -> PathBuf {
    let dir = dirs_fallback().join("portico");
    std::fs::create_dir_all(&dir).ok();
    dir
}

/// Where the shell config lives for this process.
pub fn config_path() -> PathBuf {
    resolve_config_path(std::env::var_os(CONFIG_ENV), &data_dir())
}

/// `PORTICO_CONFIG` wins when set and non-empty, otherwise the data dir.
pub fn resolve_config_path(explicit: Option<OsString>, data_dir: &Path) -> PathBuf {
    match explicit {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => data_dir.join(CONFIG_FILE),
    }
}

fn dirs_fallback() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    PathBuf::from("/tmp")
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! Portico — Native capabilities exposed to the page.
//!
//! [`traits`] defines one trait per device capability, grouped under
//! [`PlatformBridge`](traits::PlatformBridge).  [`builtins`] adapts each
//! capability to a bridge action, and [`capture`] relays live camera and
//! microphone output back to the page.

use std::sync::Arc;

pub mod builtins;
pub mod capture;
pub mod desktop;
pub mod traits;

pub use builtins::{BuiltinAction, BuiltinRequest, register_builtins};
pub use capture::CaptureRelay;
pub use desktop::DesktopPlatform;
pub use traits::PlatformBridge;

/// The platform backend for the current build target.
///
/// Only the in-memory desktop backend ships in this workspace; mobile
/// embeddings pass their own `PlatformBridge` to `register_builtins`.
pub fn default_platform() -> Arc<dyn PlatformBridge> {
    Arc::new(DesktopPlatform::new())
}

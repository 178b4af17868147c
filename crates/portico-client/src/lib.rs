// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! Portico — Content side of the message bridge.
//!
//! [`ContentClient`] is the Rust counterpart of the injected
//! `window.PorticoBridge` program: it posts authenticated requests to the
//! host, correlates the host's replies, and fans host notifications out to
//! listeners.  It is used by content compiled to run in-process and by
//! loopback tests of the host bridge.

pub mod client;
pub mod port;

pub use client::{ContentClient, ListenerId, Notification};
pub use port::HostPort;

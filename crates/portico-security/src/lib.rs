// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! portico-security — Authentication of content → host bridge messages.
//!
//! The host generates one random session token per process.  It is baked
//! into the client program injected into the content surface before any page
//! script runs, and every inbound message must present it.  Messages posted
//! by anything other than that client (injected frames, hostile scripts that
//! load before the client) fail the guard and are never dispatched.

pub mod guard;
pub mod token;

pub use guard::{GuardVerdict, TokenGuard};
pub use token::SessionToken;

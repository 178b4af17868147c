// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! Portico — Host side of the content/host message bridge.
//!
//! A [`BridgeSession`] owns everything the host needs to talk to the page
//! rendered in the content surface: the session token guard, the handler
//! registry, the table of host-originated requests awaiting replies, and the
//! swappable reference to the current surface.  It is created once per host
//! process and cloned into whatever needs it.
//!
//! Data flows as ordinary function calls right up to the point where a
//! serialized message becomes a program string evaluated in the surface; that
//! step lives only in [`outbound`].

pub mod bootstrap;
pub mod inbound;
pub mod outbound;
pub mod registry;
pub mod responder;
pub mod session;
pub mod surface;

pub use registry::{Handler, HandlerOptions, HandlerRegistry};
pub use responder::Responder;
pub use session::{BridgeSession, WeakBridgeSession};
pub use surface::{ContentSurface, RecordingSurface};

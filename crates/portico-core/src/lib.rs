// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Portico — Core wire types, correlation bookkeeping, and error definitions
// shared by the host bridge and the content-side client.

pub mod binary;
pub mod config;
pub mod correlation;
pub mod envelope;
pub mod error;

pub use binary::{BinaryPayload, Payload};
pub use config::{BridgeConfig, ShellConfig};
pub use correlation::{PendingRequests, new_correlation_id};
pub use envelope::{DecodeError, Direction, Message, Reply};
pub use error::BridgeError;

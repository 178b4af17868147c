// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Request/response correlation.
//
// Both sides of the bridge keep one `PendingRequests` table.  A caller
// registers a ticket (fresh correlation id + one-shot reply slot), sends its
// message, then awaits the ticket with a timeout.  Replies are matched by
// correlation id only, so any number of concurrent requests for the same
// action can be in flight.
//
// Exactly-once settlement falls out of the types: the reply slot is a
// `oneshot` sender that is removed from the table before it is used, and the
// ticket's drop guard removes the entry on timeout or cancellation.  A reply
// that arrives after that finds no entry and is dropped.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

use crate::envelope::{Reply, now_millis};
use crate::error::{BridgeError, Result};

type Settlement = std::result::Result<Value, String>;

/// Generate a correlation id: time-based prefix plus a random suffix.
pub fn new_correlation_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{:x}-{}", now_millis(), &suffix[..12])
}

struct PendingEntry {
    action: String,
    reply_tx: oneshot::Sender<Settlement>,
}

/// In-flight correlated requests, keyed by correlation id.
#[derive(Default)]
pub struct PendingRequests {
    entries: Mutex<HashMap<String, PendingEntry>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, PendingEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a reply slot for a new request to `action`.
    pub fn register(&self, action: &str) -> PendingTicket<'_> {
        let id = new_correlation_id();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.entries().insert(
            id.clone(),
            PendingEntry {
                action: action.to_owned(),
                reply_tx,
            },
        );
        PendingTicket {
            table: self,
            id,
            action: action.to_owned(),
            reply_rx: Some(reply_rx),
        }
    }

    /// Route a reply to its waiting request.
    ///
    /// Returns `false` if no request with that id is pending (already timed
    /// out, cancelled, or never existed).
    pub fn complete(&self, reply: Reply) -> bool {
        let Some(entry) = self.entries().remove(&reply.correlation_id) else {
            debug!(
                correlation_id = %reply.correlation_id,
                "dropping reply with no pending request"
            );
            return false;
        };
        debug!(
            correlation_id = %reply.correlation_id,
            action = %entry.action,
            success = reply.success,
            "reply matched pending request"
        );
        // The receiver may already be gone if the waiter was dropped between
        // our removal and this send; nothing else to settle in that case.
        entry.reply_tx.send(reply.into_result()).is_ok()
    }

    pub fn contains(&self, correlation_id: &str) -> bool {
        self.entries().contains_key(correlation_id)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Drop every pending request. Waiters observe `SessionClosed`.
    pub fn clear(&self) -> usize {
        let drained: Vec<_> = self.entries().drain().collect();
        drained.len()
    }

    fn remove(&self, correlation_id: &str) {
        self.entries().remove(correlation_id);
    }
}

/// Handle for one in-flight request.
///
/// Dropping the ticket (including dropping the future awaiting it) removes
/// the pending entry.
pub struct PendingTicket<'a> {
    table: &'a PendingRequests,
    id: String,
    action: String,
    reply_rx: Option<oneshot::Receiver<Settlement>>,
}

impl PendingTicket<'_> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    /// Wait for the matching reply, at most `timeout`.
    pub async fn wait(mut self, timeout: Duration) -> Result<Value> {
        let Some(reply_rx) = self.reply_rx.take() else {
            return Err(BridgeError::SessionClosed(self.action.clone()));
        };
        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(Ok(data))) => Ok(data),
            Ok(Ok(Err(message))) => Err(BridgeError::Remote(message)),
            Ok(Err(_closed)) => Err(BridgeError::SessionClosed(self.action.clone())),
            Err(_elapsed) => {
                debug!(correlation_id = %self.id, action = %self.action, "request timed out");
                Err(BridgeError::RequestTimeout(self.action.clone()))
            }
        }
    }
}

impl Drop for PendingTicket<'_> {
    fn drop(&mut self) {
        self.table.remove(&self.id);
    }
}

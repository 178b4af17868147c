// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The respond capability handed to every handler invocation.
//
// A `Responder` is consumed by `respond`, so a handler body can answer at
// most once.  The handler timeout and the error path in `inbound` share the
// same slot and race it through one atomic flag; the first settlement is the
// only one that reaches the wire.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use portico_core::Reply;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::outbound::Outbound;

/// One invocation's reply slot.
pub(crate) struct ReplySlot {
    action: String,
    correlation_id: Option<String>,
    settled: AtomicBool,
    outbound: Arc<Outbound>,
}

impl ReplySlot {
    pub(crate) fn new(
        action: String,
        correlation_id: Option<String>,
        outbound: Arc<Outbound>,
    ) -> Arc<Self> {
        Arc::new(Self {
            action,
            correlation_id,
            settled: AtomicBool::new(false),
            outbound,
        })
    }

    pub(crate) fn action(&self) -> &str {
        &self.action
    }

    pub(crate) fn is_settled(&self) -> bool {
        self.settled.load(Ordering::Acquire)
    }

    /// Settle the slot. Returns `false` if it was already settled.
    ///
    /// Uncorrelated invocations settle without sending anything.
    pub(crate) fn settle(&self, result: Result<Value, String>) -> bool {
        if self
            .settled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(action = %self.action, "response already sent; ignoring");
            return false;
        }
        match &self.correlation_id {
            Some(id) => self.outbound.send_reply(Reply::from_result(id.clone(), result)),
            None => {
                if let Err(error) = result {
                    debug!(action = %self.action, error = %error, "failure with no one to tell");
                }
            }
        }
        true
    }
}

/// Capability to answer one inbound message.
pub struct Responder {
    slot: Arc<ReplySlot>,
}

impl Responder {
    pub(crate) fn new(slot: Arc<ReplySlot>) -> Self {
        Self { slot }
    }

    pub fn action(&self) -> &str {
        self.slot.action()
    }

    /// Correlation id of the message being answered, if the sender asked
    /// for a reply.
    pub fn correlation_id(&self) -> Option<&str> {
        self.slot.correlation_id.as_deref()
    }

    /// Whether something (this responder, a timeout) already answered.
    pub fn is_settled(&self) -> bool {
        self.slot.is_settled()
    }

    /// Send the reply. Returns `false` if the invocation was already
    /// settled, e.g. by its timeout.
    pub fn respond(self, result: Result<Value, String>) -> bool {
        self.slot.settle(result)
    }

    /// Reply with a serializable success value.
    pub fn success<T: Serialize>(self, data: T) -> bool {
        match serde_json::to_value(data) {
            Ok(value) => self.respond(Ok(value)),
            Err(e) => self.respond(Err(e.to_string())),
        }
    }

    pub fn failure(self, error: impl Into<String>) -> bool {
        self.respond(Err(error.into()))
    }
}

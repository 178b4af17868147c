// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Action → handler table.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use portico_core::Payload;
use portico_core::error::Result;
use tracing::debug;

use crate::responder::Responder;

/// Boxed future returned by a handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// Host-side code bound to one action.
///
/// Any `Fn(Payload, Responder) -> impl Future<Output = Result<()>>` closure
/// is a handler. Returning `Err` sends a failure reply carrying the error's
/// message, unless the responder was already used.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, payload: Payload, responder: Responder) -> HandlerFuture;
}

impl<F, Fut> Handler for F
where
    F: Fn(Payload, Responder) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    fn call(&self, payload: Payload, responder: Responder) -> HandlerFuture {
        Box::pin(self(payload, responder))
    }
}

/// Per-registration options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandlerOptions {
    /// Answer `Handler timeout: <action>` if the handler has not responded
    /// within this long.
    pub timeout: Option<Duration>,
    /// Remove the registration before its first invocation.
    pub once: bool,
}

impl HandlerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }
}

#[derive(Clone)]
pub(crate) struct Registration {
    pub(crate) handler: Arc<dyn Handler>,
    pub(crate) options: HandlerOptions,
}

/// Registered handlers, keyed by action.
#[derive(Default)]
pub struct HandlerRegistry {
    entries: Mutex<HashMap<String, Registration>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Registration>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind `handler` to `action`. Returns `true` if an earlier
    /// registration was replaced.
    pub fn register<H: Handler>(&self, action: &str, handler: H, options: HandlerOptions) -> bool {
        let registration = Registration {
            handler: Arc::new(handler),
            options,
        };
        let replaced = self
            .entries()
            .insert(action.to_owned(), registration)
            .is_some();
        debug!(action, replaced, once = options.once, "handler registered");
        replaced
    }

    /// Remove the handler for `action`. No-op if none is registered.
    pub fn unregister(&self, action: &str) -> bool {
        self.entries().remove(action).is_some()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn contains(&self, action: &str) -> bool {
        self.entries().contains_key(action)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Registered actions, sorted.
    pub fn actions(&self) -> Vec<String> {
        let mut actions: Vec<_> = self.entries().keys().cloned().collect();
        actions.sort();
        actions
    }

    /// Fetch the registration for a dispatch. One-shot registrations are
    /// removed here, before the handler runs.
    pub(crate) fn lookup(&self, action: &str) -> Option<Registration> {
        let mut entries = self.entries();
        let once = entries.get(action)?.options.once;
        if once {
            entries.remove(action)
        } else {
            entries.get(action).cloned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn noop(_payload: Payload, _responder: Responder) -> Result<()> {
        Ok(())
    }

    #[test]
    fn register_replaces_and_unregister_is_idempotent() {
        let registry = HandlerRegistry::new();
        assert!(!registry.register("echo", noop, HandlerOptions::new()));
        assert!(registry.register("echo", noop, HandlerOptions::new()));
        assert_eq!(registry.len(), 1);

        assert!(registry.unregister("echo"));
        assert!(!registry.unregister("echo"));
        assert!(registry.is_empty());
    }

    #[test]
    fn once_registration_removed_on_lookup() {
        let registry = HandlerRegistry::new();
        registry.register("init", noop, HandlerOptions::new().once());
        registry.register("ping", noop, HandlerOptions::new());

        assert!(registry.lookup("init").is_some());
        assert!(registry.lookup("init").is_none());
        assert!(registry.lookup("ping").is_some());
        assert!(registry.lookup("ping").is_some());
        assert_eq!(registry.actions(), vec!["ping".to_string()]);
    }

    #[test]
    fn clear_removes_everything() {
        let registry = HandlerRegistry::new();
        registry.register("a", noop, HandlerOptions::new());
        registry.register("b", noop, HandlerOptions::new().with_timeout(Duration::from_secs(1)));
        registry.clear();
        assert!(!registry.contains("a"));
        assert!(registry.is_empty());
    }
}

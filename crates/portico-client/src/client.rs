// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content-side bridge client.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use portico_core::error::{BridgeError, Result};
use portico_core::{BridgeConfig, Direction, Message, PendingRequests, Reply};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::port::HostPort;

/// Listener key that receives every notification.
pub const WILDCARD: &str = "*";

/// Handle returned by [`ContentClient::on`], used to remove one listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// A host → content message as seen by listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub action: String,
    pub payload: Value,
    /// Set when the host expects an answer via [`ContentClient::reply`].
    pub correlation_id: Option<String>,
    pub timestamp: i64,
}

impl Notification {
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(T::deserialize(&self.payload)?)
    }
}

type Callback = Arc<dyn Fn(&Notification) + Send + Sync>;

struct Listener {
    id: ListenerId,
    once: bool,
    callback: Callback,
}

struct ClientInner {
    token: String,
    port: RwLock<Option<Arc<dyn HostPort>>>,
    pending: PendingRequests,
    listeners: Mutex<HashMap<String, Vec<Listener>>>,
    next_listener: AtomicU64,
    call_timeout: Duration,
}

/// Content end of the bridge. Cheap to clone.
#[derive(Clone)]
pub struct ContentClient {
    inner: Arc<ClientInner>,
}

impl ContentClient {
    /// `token` is the session token the host baked into the bootstrap.
    pub fn new(token: impl Into<String>, config: &BridgeConfig) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                token: token.into(),
                port: RwLock::new(None),
                pending: PendingRequests::new(),
                listeners: Mutex::new(HashMap::new()),
                next_listener: AtomicU64::new(1),
                call_timeout: config.call_timeout(),
            }),
        }
    }

    /// Connect to (or, with `None`, disconnect from) the host.
    pub fn attach_port(&self, port: Option<Arc<dyn HostPort>>) {
        *self.inner.port.write().unwrap_or_else(PoisonError::into_inner) = port;
    }

    fn port(&self) -> Option<Arc<dyn HostPort>> {
        self.inner
            .port
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn listeners(&self) -> MutexGuard<'_, HashMap<String, Vec<Listener>>> {
        self.inner.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a host is reachable.
    pub fn is_app(&self) -> bool {
        self.port().is_some()
    }

    fn post(&self, message: Message) -> Result<()> {
        let Some(port) = self.port() else {
            return Err(BridgeError::NotInApp(message.action));
        };
        let raw = message.with_token(self.inner.token.clone()).encode()?;
        port.post_message(&raw)
    }

    /// Fire-and-forget request. Returns `false` if nothing was posted.
    pub fn send(&self, action: &str, payload: Value) -> bool {
        match self.post(Message::to_host(action, payload)) {
            Ok(()) => true,
            Err(e) => {
                debug!(action, error = %e, "send failed");
                false
            }
        }
    }

    /// Correlated request. `timeout` defaults to the configured call
    /// timeout.
    pub async fn call(&self, action: &str, payload: Value, timeout: Option<Duration>) -> Result<Value> {
        if !self.is_app() {
            return Err(BridgeError::NotInApp(action.to_owned()));
        }
        let timeout = timeout.unwrap_or(self.inner.call_timeout);
        let ticket = self.inner.pending.register(action);
        self.post(Message::to_host(action, payload).with_correlation_id(ticket.id()))?;
        ticket.wait(timeout).await
    }

    /// Answer a host `request`.
    pub fn reply(&self, correlation_id: &str, result: std::result::Result<Value, String>) -> bool {
        let message = match Reply::from_result(correlation_id, result).into_message(Direction::ToHost) {
            Ok(message) => message,
            Err(e) => {
                warn!(correlation_id, error = %e, "could not build reply");
                return false;
            }
        };
        match self.post(message) {
            Ok(()) => true,
            Err(e) => {
                debug!(correlation_id, error = %e, "reply not delivered");
                false
            }
        }
    }

    // -- Listeners --

    fn add_listener<F>(&self, action: &str, once: bool, callback: F) -> ListenerId
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners()
            .entry(action.to_owned())
            .or_default()
            .push(Listener {
                id,
                once,
                callback: Arc::new(callback),
            });
        id
    }

    /// Listen for `action`, or every notification with `"*"`.
    pub fn on<F>(&self, action: &str, callback: F) -> ListenerId
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.add_listener(action, false, callback)
    }

    /// Like [`on`](Self::on) but removed before its first call.
    pub fn once<F>(&self, action: &str, callback: F) -> ListenerId
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.add_listener(action, true, callback)
    }

    /// Remove one listener, or all listeners for `action` when `id` is
    /// `None`. Returns whether anything was removed.
    pub fn off(&self, action: &str, id: Option<ListenerId>) -> bool {
        let mut listeners = self.listeners();
        let Some(id) = id else {
            return listeners.remove(action).is_some();
        };
        let Some(list) = listeners.get_mut(action) else {
            return false;
        };
        let before = list.len();
        list.retain(|l| l.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            listeners.remove(action);
        }
        removed
    }

    /// Resolve with the next notification for `action`.
    pub async fn wait_for(&self, action: &str, timeout: Duration) -> Result<Notification> {
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        let id = self.once(action, move |notification| {
            if let Some(tx) = tx.lock().unwrap_or_else(PoisonError::into_inner).take() {
                let _ = tx.send(notification.clone());
            }
        });
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(notification)) => Ok(notification),
            Ok(Err(_)) => Err(BridgeError::SessionClosed(action.to_owned())),
            Err(_) => {
                self.off(action, Some(id));
                Err(BridgeError::RequestTimeout(action.to_owned()))
            }
        }
    }

    // -- Host → content --

    /// Delivery entry point for host messages.
    ///
    /// Returns `false` for anything that is not a host → content bridge
    /// message.
    pub fn receive(&self, raw: &str) -> bool {
        let message = match Message::decode(raw) {
            Ok(message) => message,
            Err(e) => {
                trace!(reason = %e, "ignoring non-bridge message");
                return false;
            }
        };
        if message.direction != Direction::FromHost {
            return false;
        }
        if message.is_reply() {
            match Reply::from_payload(&message.payload) {
                Some(reply) => {
                    self.inner.pending.complete(reply);
                }
                None => warn!("bridgeResponse without a usable reply payload"),
            }
            return true;
        }

        let notification = Notification {
            action: message.action,
            payload: message.payload,
            correlation_id: message.correlation_id,
            timestamp: message.timestamp,
        };
        self.emit(&notification.action, &notification);
        self.emit(WILDCARD, &notification);
        true
    }

    fn emit(&self, key: &str, notification: &Notification) {
        let callbacks: Vec<Callback> = {
            let mut listeners = self.listeners();
            let Some(list) = listeners.get_mut(key) else {
                return;
            };
            let callbacks = list.iter().map(|l| Arc::clone(&l.callback)).collect();
            list.retain(|l| !l.once);
            if list.is_empty() {
                listeners.remove(key);
            }
            callbacks
        };
        for callback in callbacks {
            if panic::catch_unwind(AssertUnwindSafe(|| callback(notification))).is_err() {
                warn!(action = %notification.action, listener = key, "listener panicked");
            }
        }
    }

    /// Correlated calls still waiting for a reply.
    pub fn pending_calls(&self) -> usize {
        self.inner.pending.len()
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The host bridge session.
//
// One session exists per host process.  It is a cheap `Clone` handle; every
// clone shares the same token, registry, pending table and surface slot.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use portico_core::error::{BridgeError, Result};
use portico_core::{BridgeConfig, Message, PendingRequests};
use portico_security::{SessionToken, TokenGuard};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::{AbortHandle, JoinSet};
use tracing::{debug, info, instrument, warn};

use crate::bootstrap;
use crate::outbound::Outbound;
use crate::registry::{Handler, HandlerOptions, HandlerRegistry};
use crate::responder::ReplySlot;
use crate::surface::ContentSurface;

pub(crate) struct SessionInner {
    pub(crate) config: BridgeConfig,
    pub(crate) guard: TokenGuard,
    pub(crate) registry: HandlerRegistry,
    pub(crate) pending: PendingRequests,
    pub(crate) outbound: Arc<Outbound>,
    pub(crate) runtime: Handle,
    in_flight: AtomicUsize,
    idle: Notify,
    timers: Mutex<JoinSet<()>>,
}

impl SessionInner {
    pub(crate) fn handler_started(&self) {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn handler_finished(&self) {
        if self.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }

    /// Start the deadline for one handler invocation.
    ///
    /// The timer counts as in flight until it fires or is aborted, and
    /// `shutdown` aborts every timer still armed.
    pub(crate) fn arm_timeout(self: &Arc<Self>, slot: &Arc<ReplySlot>, timeout: Duration) -> AbortHandle {
        self.handler_started();
        let armed = TimerArmed(Arc::downgrade(self));
        let slot = Arc::clone(slot);
        let mut timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        while timers.try_join_next().is_some() {}
        timers.spawn_on(
            async move {
                let _armed = armed;
                tokio::time::sleep(timeout).await;
                let error = BridgeError::HandlerTimeout(slot.action().to_owned());
                if slot.settle(Err(error.to_string())) {
                    warn!(action = %slot.action(), timeout_ms = timeout.as_millis() as u64, "handler timed out");
                }
            },
            &self.runtime,
        )
    }

    fn abort_timers(&self) -> usize {
        let mut timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        while timers.try_join_next().is_some() {}
        let armed = timers.len();
        timers.abort_all();
        armed
    }
}

/// Held by a timer task; releases its in-flight count however the task ends.
struct TimerArmed(Weak<SessionInner>);

impl Drop for TimerArmed {
    fn drop(&mut self) {
        if let Some(inner) = self.0.upgrade() {
            inner.handler_finished();
        }
    }
}

/// Host end of the bridge.
#[derive(Clone)]
pub struct BridgeSession {
    pub(crate) inner: Arc<SessionInner>,
}

impl BridgeSession {
    /// Create a session with a freshly generated token.
    ///
    /// Must be called from within a tokio runtime; handler tasks are
    /// spawned onto that runtime.
    pub fn new(config: BridgeConfig) -> Result<Self> {
        Self::with_token(config, SessionToken::generate()?)
    }

    #[instrument(skip_all)]
    pub fn with_token(config: BridgeConfig, token: SessionToken) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| BridgeError::Runtime(e.to_string()))?;
        info!(
            token = %token.fingerprint(),
            request_timeout_ms = config.request_timeout_ms,
            "bridge session created"
        );
        Ok(Self {
            inner: Arc::new(SessionInner {
                outbound: Arc::new(Outbound::new(&config)),
                guard: TokenGuard::new(token),
                registry: HandlerRegistry::new(),
                pending: PendingRequests::new(),
                config,
                runtime,
                in_flight: AtomicUsize::new(0),
                idle: Notify::new(),
                timers: Mutex::new(JoinSet::new()),
            }),
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    /// A handle that does not keep the session alive.
    pub fn downgrade(&self) -> WeakBridgeSession {
        WeakBridgeSession {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn token(&self) -> &SessionToken {
        self.inner.guard.token()
    }

    /// The content-side client program, with this session's token baked in.
    /// Inject it at the earliest load point of every page.
    pub fn bootstrap_script(&self) -> String {
        bootstrap::render(self.token(), &self.inner.config)
    }

    /// Attach a new surface, or detach with `None`.
    pub fn attach_surface(&self, surface: Option<Arc<dyn ContentSurface>>) {
        let attaching = surface.is_some();
        let was_attached = self.inner.outbound.attach(surface);
        debug!(attaching, was_attached, "content surface changed");
    }

    pub fn is_attached(&self) -> bool {
        self.inner.outbound.is_attached()
    }

    // -- Handlers --

    /// Bind `handler` to `action`, replacing any earlier registration.
    pub fn register_handler<H: Handler>(&self, action: &str, handler: H, options: HandlerOptions) {
        self.inner.registry.register(action, handler, options);
    }

    pub fn unregister_handler(&self, action: &str) {
        self.inner.registry.unregister(action);
    }

    pub fn clear_handlers(&self) {
        self.inner.registry.clear();
    }

    pub fn has_handler(&self, action: &str) -> bool {
        self.inner.registry.contains(action)
    }

    pub fn handler_count(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn handler_actions(&self) -> Vec<String> {
        self.inner.registry.actions()
    }

    // -- Host → content --

    /// Fire-and-forget notification.
    pub fn notify(&self, action: &str, payload: Value) {
        self.inner.outbound.send(&Message::from_host(action, payload));
    }

    /// Ask the content side for something and wait for its reply.
    ///
    /// `timeout` defaults to the configured request timeout. With no surface
    /// attached the call fails at once with `Surface detached: <action>`.
    pub async fn request(
        &self,
        action: &str,
        payload: Value,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        let timeout = timeout.unwrap_or_else(|| self.inner.config.request_timeout());
        let ticket = self.inner.pending.register(action);
        let message = Message::from_host(action, payload).with_correlation_id(ticket.id());
        self.inner.outbound.deliver(&message)?;
        ticket.wait(timeout).await
    }

    /// Handler tasks spawned by `dispatch_inbound` that have not finished.
    pub fn handlers_in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Wait until no handler task is running.
    pub async fn wait_idle(&self) {
        loop {
            let idle = self.inner.idle.notified();
            if self.handlers_in_flight() == 0 {
                return;
            }
            idle.await;
        }
    }

    pub fn pending_requests(&self) -> usize {
        self.inner.pending.len()
    }

    /// Inbound messages rejected by the token guard so far.
    pub fn rejected_messages(&self) -> u64 {
        self.inner.guard.rejected_count()
    }

    /// Tear the session down: drop all handlers, detach the surface,
    /// cancel handler deadlines, and fail every outstanding request.
    pub fn shutdown(&self) {
        self.inner.registry.clear();
        self.inner.outbound.attach(None);
        let timers = self.inner.abort_timers();
        let failed = self.inner.pending.clear();
        info!(failed_requests = failed, cancelled_timers = timers, "bridge session shut down");
    }
}

impl fmt::Debug for BridgeSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeSession")
            .field("token", &self.token().fingerprint())
            .field("handlers", &self.handler_count())
            .field("pending_requests", &self.pending_requests())
            .field("in_flight", &self.handlers_in_flight())
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// Non-owning counterpart of [`BridgeSession`], for parts of the host that
/// the session itself keeps alive.
#[derive(Clone, Debug, Default)]
pub struct WeakBridgeSession {
    inner: Weak<SessionInner>,
}

impl WeakBridgeSession {
    pub fn upgrade(&self) -> Option<BridgeSession> {
        self.inner.upgrade().map(|inner| BridgeSession { inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responder::Responder;
    use crate::surface::RecordingSurface;
    use portico_core::{Direction, Payload, Reply};
    use serde_json::json;

    fn session() -> BridgeSession {
        let token = SessionToken::from_string("tok").expect("token");
        BridgeSession::with_token(BridgeConfig::default(), token).expect("session")
    }

    async fn wait_for_delivery(surface: &RecordingSurface, count: usize) {
        while surface.messages().len() < count {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn construction_outside_runtime_fails() {
        let token = SessionToken::from_string("tok").expect("token");
        let err = BridgeSession::with_token(BridgeConfig::default(), token).unwrap_err();
        assert!(matches!(err, BridgeError::Runtime(_)));
    }

    #[tokio::test]
    async fn debug_output_hides_the_token() {
        let session = session();
        let shown = format!("{session:?}");
        assert!(shown.starts_with("BridgeSession"));
        assert!(shown.contains(&session.token().fingerprint()));
        assert!(!shown.contains("\"tok\""));
    }

    #[tokio::test]
    async fn weak_handle_does_not_keep_the_session_alive() {
        let session = session();
        let weak = session.downgrade();
        assert_eq!(weak.upgrade().map(|s| s.handler_count()), Some(0));

        drop(session);
        assert!(weak.upgrade().is_none());
    }

    #[tokio::test]
    async fn request_without_surface_rejects_immediately() {
        let session = session();
        let err = session
            .request("ping", json!({}), Some(Duration::from_millis(50)))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("ping"));
        assert_eq!(session.pending_requests(), 0);
    }

    #[tokio::test]
    async fn request_resolves_from_content_reply() {
        let session = session();
        let surface = RecordingSurface::new();
        session.attach_surface(Some(surface.clone()));

        let task = tokio::spawn({
            let session = session.clone();
            async move { session.request("getScrollPosition", json!({}), None).await }
        });
        wait_for_delivery(&surface, 1).await;

        let sent = &surface.messages()[0];
        assert_eq!(sent.action, "getScrollPosition");
        let id = sent.correlation_id.clone().expect("correlated");

        let reply = Reply::success(id, json!({ "y": 120 }))
            .into_message(Direction::ToHost)
            .expect("message")
            .with_token("tok")
            .encode()
            .expect("encode");
        assert!(session.dispatch_inbound(&reply));

        let data = task.await.expect("join").expect("reply");
        assert_eq!(data, json!({ "y": 120 }));
        assert_eq!(session.pending_requests(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn request_times_out_and_late_reply_is_dropped() {
        let session = session();
        let surface = RecordingSurface::new();
        session.attach_surface(Some(surface.clone()));

        let err = session
            .request("slow", json!({}), Some(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Request timeout: slow");

        let id = surface.messages()[0].correlation_id.clone().expect("correlated");
        let late = Reply::success(id, json!(1))
            .into_message(Direction::ToHost)
            .expect("message")
            .with_token("tok")
            .encode()
            .expect("encode");
        // Still a valid bridge message; it just has no one waiting.
        assert!(session.dispatch_inbound(&late));
    }

    #[tokio::test]
    async fn shutdown_fails_pending_and_detaches() {
        let session = session();
        let surface = RecordingSurface::new();
        session.attach_surface(Some(surface.clone()));
        session.register_handler(
            "echo",
            |_payload: Payload, _responder: Responder| async { Ok::<_, BridgeError>(()) },
            HandlerOptions::new(),
        );

        let task = tokio::spawn({
            let session = session.clone();
            async move { session.request("ping", json!({}), None).await }
        });
        wait_for_delivery(&surface, 1).await;

        session.shutdown();
        let err = task.await.expect("join").unwrap_err();
        assert_eq!(err.to_string(), "Bridge session closed: ping");
        assert!(!session.is_attached());
        assert_eq!(session.handler_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_idle_tracks_running_handlers() {
        let session = session();
        session.attach_surface(Some(RecordingSurface::new()));
        session.register_handler(
            "slow",
            |_payload: Payload, responder: Responder| async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                responder.success(true);
                Ok::<_, BridgeError>(())
            },
            HandlerOptions::new(),
        );

        session.wait_idle().await;
        let raw = Message::to_host("slow", json!({}))
            .with_token("tok")
            .encode()
            .expect("encode");
        assert!(session.dispatch_inbound(&raw));
        assert_eq!(session.handlers_in_flight(), 1);

        session.wait_idle().await;
        assert_eq!(session.handlers_in_flight(), 0);
    }

    #[tokio::test]
    async fn notify_is_uncorrelated() {
        let session = session();
        let surface = RecordingSurface::new();
        session.notify("dropped", json!({}));
        session.attach_surface(Some(surface.clone()));
        session.notify("orientationChanged", json!({ "orientation": "landscape" }));

        let messages = surface.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].action, "orientationChanged");
        assert_eq!(messages[0].correlation_id, None);
    }
}

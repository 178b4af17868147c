// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content → host dispatch.
//
// Pipeline for one raw string from the transport:
//
//   decode → direction check → token guard → (reply? → correlator)
//          → transcode → registry lookup → spawn handler task
//
// Everything up to the spawn is synchronous.  The return value tells the
// transport whether the string was a bridge message at all; guard failures
// are indistinguishable from foreign traffic to the sender.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use portico_core::binary::transcode;
use portico_core::error::BridgeError;
use portico_core::{Direction, Message, Payload, Reply};
use tokio::task::AbortHandle;
use tracing::{debug, trace, warn};

use crate::registry::Registration;
use crate::responder::{ReplySlot, Responder};
use crate::session::BridgeSession;

impl BridgeSession {
    /// Feed one raw transport string into the bridge.
    ///
    /// Returns `false` if it is not a bridge message for this session
    /// (unparseable, unknown channel, wrong direction, or a bad token).
    pub fn dispatch_inbound(&self, raw: &str) -> bool {
        let message = match Message::decode(raw) {
            Ok(message) => message,
            Err(e) => {
                trace!(reason = %e, "ignoring non-bridge message");
                return false;
            }
        };
        if message.direction != Direction::ToHost {
            trace!(action = %message.action, "host-direction message on inbound channel ignored");
            return false;
        }

        let verdict = self.inner.guard.check(message.security_token.as_deref());
        if !verdict.is_accepted() {
            warn!(action = %message.action, verdict = %verdict, "inbound message rejected");
            return false;
        }

        if message.is_reply() {
            self.route_reply(&message);
            return true;
        }

        let Message {
            action,
            payload,
            correlation_id,
            ..
        } = message;
        let payload = transcode(payload, self.inner.config.max_payload_depth);

        match self.inner.registry.lookup(&action) {
            Some(registration) => self.invoke(action, correlation_id, payload, registration),
            None => self.reject_unknown(action, correlation_id),
        }
        true
    }

    fn route_reply(&self, message: &Message) {
        match Reply::from_payload(&message.payload) {
            Some(reply) => {
                self.inner.pending.complete(reply);
            }
            None => warn!("bridgeResponse without a usable reply payload"),
        }
    }

    fn reject_unknown(&self, action: String, correlation_id: Option<String>) {
        match correlation_id {
            Some(id) => {
                debug!(action = %action, correlation_id = %id, "no handler registered");
                let error = BridgeError::UnknownAction(action).to_string();
                self.inner.outbound.send_reply(Reply::failure(id, error));
            }
            None => debug!(action = %action, "no handler registered; notification dropped"),
        }
    }

    fn invoke(
        &self,
        action: String,
        correlation_id: Option<String>,
        payload: Payload,
        registration: Registration,
    ) {
        debug!(
            action = %action,
            correlation_id = correlation_id.as_deref().unwrap_or("-"),
            binaries = payload.has_binary(),
            "dispatching to handler"
        );
        let runtime = &self.inner.runtime;
        let slot = ReplySlot::new(action, correlation_id, Arc::clone(&self.inner.outbound));

        let timer = registration
            .options
            .timeout
            .map(|timeout| self.inner.arm_timeout(&slot, timeout));

        let responder = Responder::new(Arc::clone(&slot));
        let handler = registration.handler;
        let future = match panic::catch_unwind(AssertUnwindSafe(|| handler.call(payload, responder))) {
            Ok(future) => future,
            Err(_) => {
                let error = BridgeError::HandlerPanicked(slot.action().to_owned());
                finish(&slot, Some(error), timer);
                return;
            }
        };

        let inner = Arc::clone(&self.inner);
        inner.handler_started();
        let task = runtime.spawn(future);
        runtime.spawn(async move {
            let error = match task.await {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e),
                Err(join) if join.is_panic() => {
                    Some(BridgeError::HandlerPanicked(slot.action().to_owned()))
                }
                Err(_) => {
                    debug!(action = %slot.action(), "handler task cancelled");
                    None
                }
            };
            finish(&slot, error, timer);
            inner.handler_finished();
        });
    }
}

/// Report a handler error, then stop the timeout if nothing is left for it
/// to do.
fn finish(slot: &ReplySlot, error: Option<BridgeError>, timer: Option<AbortHandle>) {
    if let Some(error) = error {
        warn!(action = %slot.action(), error = %error, "handler failed");
        slot.settle(Err(error.to_string()));
    }
    if slot.is_settled() {
        if let Some(timer) = timer {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use portico_core::error::Result;
    use portico_core::{BinaryPayload, BridgeConfig};
    use portico_security::SessionToken;
    use serde_json::{Value, json};

    use super::*;
    use crate::registry::HandlerOptions;
    use crate::surface::RecordingSurface;

    const TOKEN: &str = "test-session-token";

    fn harness() -> (BridgeSession, Arc<RecordingSurface>) {
        let token = SessionToken::from_string(TOKEN).expect("token");
        let session = BridgeSession::with_token(BridgeConfig::default(), token).expect("session");
        let surface = RecordingSurface::new();
        session.attach_surface(Some(surface.clone()));
        (session, surface)
    }

    fn inbound(action: &str, payload: Value, correlation_id: Option<&str>) -> String {
        let mut message = Message::to_host(action, payload).with_token(TOKEN);
        message.correlation_id = correlation_id.map(str::to_owned);
        message.encode().expect("encode")
    }

    /// Let spawned handler tasks run to completion.
    async fn drain() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    async fn echo(payload: Payload, responder: Responder) -> Result<()> {
        responder.success(json!({ "echoed": payload.value() }));
        Ok(())
    }

    async fn silent(_payload: Payload, _responder: Responder) -> Result<()> {
        Ok(())
    }

    async fn responds_late(_payload: Payload, responder: Responder) -> Result<()> {
        tokio::time::sleep(Duration::from_millis(500)).await;
        responder.success("too late");
        Ok(())
    }

    async fn fails(_payload: Payload, _responder: Responder) -> Result<()> {
        Err(BridgeError::handler("disk full"))
    }

    async fn panics_while_running(_payload: Payload, _responder: Responder) -> Result<()> {
        panic!("handler bug")
    }

    fn panics_while_building(_payload: Payload, _responder: Responder) -> std::future::Ready<Result<()>> {
        panic!("handler bug")
    }

    fn counting(hits: &Arc<AtomicUsize>) -> impl Fn(Payload, Responder) -> std::future::Ready<Result<()>> + Send + Sync + 'static {
        let hits = Arc::clone(hits);
        move |_payload, responder| {
            hits.fetch_add(1, Ordering::SeqCst);
            responder.success(true);
            std::future::ready(Ok(()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn echo_round_trip() {
        let (session, surface) = harness();
        session.register_handler("echo", echo, HandlerOptions::new());

        assert!(session.dispatch_inbound(&inbound("echo", json!({ "x": 1 }), Some("r1"))));
        drain().await;

        assert_eq!(
            surface.replies(),
            vec![Reply::success("r1", json!({ "echoed": { "x": 1 } }))]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_action_is_reported_to_correlated_caller() {
        let (session, surface) = harness();

        assert!(session.dispatch_inbound(&inbound("doesNotExist", json!({}), Some("r2"))));
        assert_eq!(
            surface.replies(),
            vec![Reply::failure("r2", "Unknown action: doesNotExist")]
        );

        // Without a correlation id there is no one to tell.
        surface.clear();
        assert!(session.dispatch_inbound(&inbound("doesNotExist", json!({}), None)));
        assert!(surface.scripts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn handler_timeout_wins_and_late_respond_is_ignored() {
        let (session, surface) = harness();
        session.register_handler(
            "slow",
            responds_late,
            HandlerOptions::new().with_timeout(Duration::from_millis(100)),
        );

        assert!(session.dispatch_inbound(&inbound("slow", json!({}), Some("r3"))));
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(surface.replies(), vec![Reply::failure("r3", "Handler timeout: slow")]);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(surface.replies().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_disarmed_after_response() {
        let (session, surface) = harness();
        session.register_handler(
            "echo",
            echo,
            HandlerOptions::new().with_timeout(Duration::from_millis(100)),
        );

        session.dispatch_inbound(&inbound("echo", json!(7), Some("r4")));
        tokio::time::sleep(Duration::from_millis(300)).await;

        let replies = surface.replies();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].success);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_handler_with_timeout_gets_timeout_reply() {
        let (session, surface) = harness();
        session.register_handler(
            "quiet",
            silent,
            HandlerOptions::new().with_timeout(Duration::from_millis(100)),
        );

        session.dispatch_inbound(&inbound("quiet", json!({}), Some("r5")));
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(surface.replies(), vec![Reply::failure("r5", "Handler timeout: quiet")]);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_idle_covers_pending_handler_deadlines() {
        let (session, surface) = harness();
        session.register_handler(
            "quiet",
            silent,
            HandlerOptions::new().with_timeout(Duration::from_millis(100)),
        );

        session.dispatch_inbound(&inbound("quiet", json!({}), Some("r9")));
        drain().await;
        assert_eq!(session.handlers_in_flight(), 1);

        session.wait_idle().await;
        assert_eq!(surface.replies(), vec![Reply::failure("r9", "Handler timeout: quiet")]);
        assert_eq!(session.handlers_in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_handler_deadlines() {
        let (session, _surface) = harness();
        session.register_handler(
            "quiet",
            silent,
            HandlerOptions::new().with_timeout(Duration::from_millis(100)),
        );

        session.dispatch_inbound(&inbound("quiet", json!({}), Some("r10")));
        drain().await;
        session.shutdown();

        let next = RecordingSurface::new();
        session.attach_surface(Some(next.clone()));
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(next.scripts().is_empty());
        assert_eq!(session.handlers_in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_or_missing_token_is_not_a_bridge_message() {
        let (session, surface) = harness();
        let hits = Arc::new(AtomicUsize::new(0));
        session.register_handler("echo", counting(&hits), HandlerOptions::new());

        let spoofed = Message::to_host("echo", json!({}))
            .with_token("wrong")
            .with_correlation_id("r6")
            .encode()
            .expect("encode");
        let anonymous = Message::to_host("echo", json!({}))
            .with_correlation_id("r7")
            .encode()
            .expect("encode");

        assert!(!session.dispatch_inbound(&spoofed));
        assert!(!session.dispatch_inbound(&anonymous));
        drain().await;

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(surface.scripts().is_empty());
        assert_eq!(session.rejected_messages(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn once_handler_runs_exactly_once() {
        let (session, surface) = harness();
        let hits = Arc::new(AtomicUsize::new(0));
        session.register_handler("init", counting(&hits), HandlerOptions::new().once());

        assert!(session.dispatch_inbound(&inbound("init", json!({}), Some("a"))));
        assert!(!session.has_handler("init"));
        assert!(session.dispatch_inbound(&inbound("init", json!({}), Some("b"))));
        drain().await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(
            surface.replies(),
            vec![
                Reply::success("a", json!(true)),
                Reply::failure("b", "Unknown action: init"),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn junk_input_has_no_effect() {
        let (session, surface) = harness();
        let hits = Arc::new(AtomicUsize::new(0));
        session.register_handler("echo", counting(&hits), HandlerOptions::new());

        let junk = [
            "",
            "hello",
            "{",
            "null",
            "[\"request-to-host:echo\"]",
            r#"{"type":"webpackOk"}"#,
            r#"{"channel":"echo","securityToken":"test-session-token"}"#,
            r#"{"channel":"request-to-host:","securityToken":"test-session-token"}"#,
            r#"{"channel":"notify-from-host:echo","securityToken":"test-session-token"}"#,
        ];
        for raw in junk {
            assert!(!session.dispatch_inbound(raw), "accepted {raw:?}");
        }
        drain().await;

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(surface.scripts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn handler_error_becomes_failure_reply() {
        let (session, surface) = harness();
        session.register_handler("save", fails, HandlerOptions::new());

        session.dispatch_inbound(&inbound("save", json!({}), Some("r8")));
        session.dispatch_inbound(&inbound("save", json!({}), None));
        drain().await;

        assert_eq!(surface.replies(), vec![Reply::failure("r8", "disk full")]);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_handlers_do_not_take_dispatch_down() {
        let (session, surface) = harness();
        session.register_handler("buggy", panics_while_running, HandlerOptions::new());
        session.register_handler("eager", panics_while_building, HandlerOptions::new());
        session.register_handler("echo", echo, HandlerOptions::new());

        assert!(session.dispatch_inbound(&inbound("buggy", json!({}), Some("p1"))));
        assert!(session.dispatch_inbound(&inbound("eager", json!({}), Some("p2"))));
        assert!(session.dispatch_inbound(&inbound("echo", json!(1), Some("p3"))));
        drain().await;

        let replies = surface.replies();
        assert!(replies.contains(&Reply::failure("p1", "Handler panicked: buggy")));
        assert!(replies.contains(&Reply::failure("p2", "Handler panicked: eager")));
        assert!(replies.contains(&Reply::success("p3", json!({ "echoed": 1 }))));
    }

    #[tokio::test(start_paused = true)]
    async fn binary_payloads_are_indexed_for_handlers() {
        let (session, surface) = harness();
        session.register_handler(
            "upload",
            |payload: Payload, responder: Responder| async move {
                let photo = payload
                    .binary("/photo")
                    .ok_or_else(|| BridgeError::handler("no photo"))?;
                let bytes = photo.bytes()?;
                responder.success(json!({ "size": bytes.len(), "mimeType": photo.mime_type() }));
                Ok::<_, BridgeError>(())
            },
            HandlerOptions::new(),
        );

        let photo = BinaryPayload::from_bytes(&[1, 2, 3, 4], "image/png", None).to_value();
        session.dispatch_inbound(&inbound("upload", json!({ "photo": photo }), Some("u1")));
        drain().await;

        assert_eq!(
            surface.replies(),
            vec![Reply::success("u1", json!({ "size": 4, "mimeType": "image/png" }))]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_invocations_answer_their_own_ids() {
        let (session, surface) = harness();
        session.register_handler("echo", echo, HandlerOptions::new());

        for n in 0..5 {
            session.dispatch_inbound(&inbound("echo", json!(n), Some(format!("c{n}").as_str())));
        }
        drain().await;

        let mut replies = surface.replies();
        replies.sort_by(|a, b| a.correlation_id.cmp(&b.correlation_id));
        assert_eq!(replies.len(), 5);
        for (n, reply) in replies.iter().enumerate() {
            assert_eq!(reply.correlation_id, format!("c{n}"));
            assert_eq!(reply.data, Some(json!({ "echoed": n })));
        }
    }

    mod proptest_dispatch {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn arbitrary_text_is_never_dispatched(raw in ".{0,200}") {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("runtime");
                let _entered = rt.enter();
                let (session, surface) = harness();
                let hits = Arc::new(AtomicUsize::new(0));
                session.register_handler("echo", counting(&hits), HandlerOptions::new());

                prop_assert!(!session.dispatch_inbound(&raw));
                prop_assert_eq!(hits.load(Ordering::SeqCst), 0);
                prop_assert!(surface.scripts().is_empty());
            }

            #[test]
            fn arbitrary_json_objects_without_the_token_are_rejected(
                channel in "[a-z:-]{0,30}",
                token in proptest::option::of("[a-zA-Z0-9-]{0,24}"),
                id in proptest::option::of("[a-z0-9]{1,8}"),
            ) {
                prop_assume!(token.as_deref() != Some(TOKEN));
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("runtime");
                let _entered = rt.enter();
                let (session, surface) = harness();
                session.register_handler("echo", echo, HandlerOptions::new());

                let raw = json!({
                    "channel": channel,
                    "payload": {},
                    "securityToken": token,
                    "correlationId": id,
                })
                .to_string();
                prop_assert!(!session.dispatch_inbound(&raw));
                prop_assert!(surface.scripts().is_empty());
            }
        }
    }
}

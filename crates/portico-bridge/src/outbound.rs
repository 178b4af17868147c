// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Host → content delivery.
//
// A message is serialized once and wrapped in a small self-contained program
// that, when evaluated in the page:
//
//   1. reconstructs the message object from a JSON literal,
//   2. dispatches it on `window` as a `MessageEvent("message")`,
//   3. calls the legacy `window.onNativeMessage(message)` hook if present.
//
// The program is an IIFE, so running it twice is harmless and the message
// object never lands in global scope.  Delivery is best effort: with no
// surface attached the message is logged and dropped.

use std::sync::Arc;

use portico_core::binary::contains_binary;
use portico_core::envelope::Direction;
use portico_core::error::{BridgeError, Result};
use portico_core::{BridgeConfig, Message, Reply};
use tracing::{debug, trace, warn};

use crate::surface::{ContentSurface, SurfaceSlot};

const DELIVERY_PREFIX: &str = "(function(){var m=";
const DELIVERY_SUFFIX: &str = ";try{window.dispatchEvent(new MessageEvent('message',{data:m}));}catch(e){}\
try{if(typeof window.onNativeMessage==='function'){window.onNativeMessage(m);}}catch(e){}})();true;";

/// How far the log heuristic looks for binary tags.
const BINARY_SNIFF_DEPTH: usize = 4;

/// Wrap a serialized message in a delivery program.
///
/// JSON is valid JS except for raw U+2028/U+2029 in older engines, so those
/// are escaped. The escaped form is still valid JSON for the same value.
pub fn delivery_script(serialized: &str) -> String {
    let escaped = serialized
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029");
    format!("{DELIVERY_PREFIX}{escaped}{DELIVERY_SUFFIX}")
}

/// Recover the serialized message from a delivery program.
pub fn extract_delivery(script: &str) -> Option<&str> {
    script
        .strip_prefix(DELIVERY_PREFIX)?
        .strip_suffix(DELIVERY_SUFFIX)
}

/// The host → content channel.
pub struct Outbound {
    slot: SurfaceSlot,
    log_payload_limit: usize,
}

impl Outbound {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            slot: SurfaceSlot::default(),
            log_payload_limit: config.log_payload_limit,
        }
    }

    pub fn attach(&self, surface: Option<Arc<dyn ContentSurface>>) -> bool {
        self.slot.attach(surface)
    }

    pub fn is_attached(&self) -> bool {
        self.slot.is_attached()
    }

    /// Serialize and inject `message`, reporting failures to the caller.
    pub fn deliver(&self, message: &Message) -> Result<()> {
        let Some(surface) = self.slot.current() else {
            return Err(BridgeError::SurfaceDetached(message.action.clone()));
        };
        let serialized = message.encode()?;
        self.log_delivery(message, serialized.len());
        surface.evaluate_script(&delivery_script(&serialized))
    }

    /// Best-effort delivery: failures are logged, never returned.
    pub fn send(&self, message: &Message) {
        match self.deliver(message) {
            Ok(()) => {}
            Err(BridgeError::SurfaceDetached(action)) => {
                debug!(action = %action, "no content surface attached; message dropped");
            }
            Err(e) => {
                warn!(action = %message.action, error = %e, "content surface delivery failed");
            }
        }
    }

    /// Deliver a `bridgeResponse` to the content side.
    pub fn send_reply(&self, reply: Reply) {
        let correlation_id = reply.correlation_id.clone();
        match reply.into_message(Direction::FromHost) {
            Ok(message) => self.send(&message),
            Err(e) => warn!(correlation_id = %correlation_id, error = %e, "could not build reply"),
        }
    }

    // Camera frames and audio chunks arrive many times a second; keep their
    // sizes out of routine logs.
    fn log_delivery(&self, message: &Message, serialized_len: usize) {
        if serialized_len > self.log_payload_limit
            || contains_binary(&message.payload, BINARY_SNIFF_DEPTH)
        {
            trace!(action = %message.action, "delivering bulk payload");
        } else {
            debug!(
                action = %message.action,
                correlation_id = message.correlation_id.as_deref().unwrap_or("-"),
                bytes = serialized_len,
                "delivering message to content"
            );
        }
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Relay from native capture pipelines to the page.
//
// Each frame or chunk becomes one host → content notification with the
// bytes in a binary-tagged payload.  Status changes become `cameraStatus` /
// `microphoneStatus` notifications.

use std::sync::atomic::{AtomicU64, Ordering};

use portico_bridge::{BridgeSession, WeakBridgeSession};
use portico_core::BinaryPayload;
use serde_json::{Value, json};
use tracing::trace;

use crate::traits::{CaptureDevice, CaptureSink, CaptureStatus};

pub const CAMERA_FRAME: &str = "cameraFrame";
pub const MICROPHONE_CHUNK: &str = "microphoneChunk";
pub const CAMERA_STATUS: &str = "cameraStatus";
pub const MICROPHONE_STATUS: &str = "microphoneStatus";

/// MIME type of microphone chunks.
pub const PCM_MIME_TYPE: &str = "audio/pcm";

/// [`CaptureSink`] that forwards everything over a bridge session.
///
/// The relay is owned by handlers registered on that session, so it only
/// holds a weak handle; output after the session is gone is dropped.
pub struct CaptureRelay {
    session: WeakBridgeSession,
    frames: AtomicU64,
    chunks: AtomicU64,
}

impl CaptureRelay {
    pub fn new(session: &BridgeSession) -> Self {
        Self {
            session: session.downgrade(),
            frames: AtomicU64::new(0),
            chunks: AtomicU64::new(0),
        }
    }

    pub fn frames_relayed(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn chunks_relayed(&self) -> u64 {
        self.chunks.load(Ordering::Relaxed)
    }

    fn notify(&self, action: &str, payload: Value) {
        match self.session.upgrade() {
            Some(session) => session.notify(action, payload),
            None => trace!(action, "bridge session gone; capture output dropped"),
        }
    }
}

impl CaptureSink for CaptureRelay {
    fn camera_frame(&self, frame: &[u8], mime_type: &str, width: u32, height: u32) {
        let sequence = self.frames.fetch_add(1, Ordering::Relaxed);
        trace!(sequence, bytes = frame.len(), "relaying camera frame");
        self.notify(
            CAMERA_FRAME,
            json!({
                "frame": BinaryPayload::from_bytes(frame, mime_type, None).to_value(),
                "width": width,
                "height": height,
                "sequence": sequence,
            }),
        );
    }

    fn microphone_chunk(&self, chunk: &[u8], sample_rate: u32) {
        let sequence = self.chunks.fetch_add(1, Ordering::Relaxed);
        trace!(sequence, bytes = chunk.len(), "relaying microphone chunk");
        self.notify(
            MICROPHONE_CHUNK,
            json!({
                "chunk": BinaryPayload::from_bytes(chunk, PCM_MIME_TYPE, None).to_value(),
                "sampleRate": sample_rate,
                "sequence": sequence,
            }),
        );
    }

    fn status_changed(&self, device: CaptureDevice, status: &CaptureStatus) {
        let action = match device {
            CaptureDevice::Camera => CAMERA_STATUS,
            CaptureDevice::Microphone => MICROPHONE_STATUS,
        };
        self.notify(
            action,
            json!({ "active": status.active, "permission": status.permission }),
        );
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The content surface seam.
//
// The embedded browser control is an external collaborator.  All the bridge
// needs from it is a way to evaluate a program in the page's execution
// context.  Surfaces come and go (navigation, crash recovery, activity
// recreation), so the session holds a single swappable slot.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use portico_core::Message;
use portico_core::error::Result;

use crate::outbound::extract_delivery;

/// Something that can run a program inside the content execution context.
pub trait ContentSurface: Send + Sync {
    /// Evaluate `script` in the page. Fire-and-forget; the result of the
    /// evaluation is not observed.
    fn evaluate_script(&self, script: &str) -> Result<()>;
}

/// The current surface, if any.
#[derive(Default)]
pub struct SurfaceSlot {
    current: RwLock<Option<Arc<dyn ContentSurface>>>,
}

impl SurfaceSlot {
    /// Replace the current surface. `None` detaches.
    ///
    /// Returns whether a surface was attached before the call.
    pub fn attach(&self, surface: Option<Arc<dyn ContentSurface>>) -> bool {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let was_attached = current.is_some();
        *current = surface;
        was_attached
    }

    pub fn current(&self) -> Option<Arc<dyn ContentSurface>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_attached(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// Surface that records every program it is asked to evaluate.
///
/// Used by headless hosts and tests to observe what would have been
/// delivered to the page.
#[derive(Default)]
pub struct RecordingSurface {
    scripts: Mutex<Vec<String>>,
}

impl RecordingSurface {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn scripts(&self) -> Vec<String> {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Decode the message carried by each recorded delivery program.
    pub fn messages(&self) -> Vec<Message> {
        self.scripts()
            .iter()
            .filter_map(|script| extract_delivery(script))
            .filter_map(|raw| Message::decode(raw).ok())
            .collect()
    }

    /// Only the `bridgeResponse` messages.
    pub fn replies(&self) -> Vec<portico_core::Reply> {
        self.messages()
            .iter()
            .filter(|m| m.is_reply())
            .filter_map(|m| portico_core::Reply::from_payload(&m.payload))
            .collect()
    }

    pub fn clear(&self) {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl ContentSurface for RecordingSurface {
    fn evaluate_script(&self, script: &str) -> Result<()> {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(script.to_owned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_swaps_and_detaches() {
        let slot = SurfaceSlot::default();
        assert!(!slot.is_attached());

        let first = RecordingSurface::new();
        assert!(!slot.attach(Some(first.clone())));
        assert!(slot.is_attached());

        let second = RecordingSurface::new();
        assert!(slot.attach(Some(second)));
        assert!(slot.attach(None));
        assert!(slot.current().is_none());
    }
}

// SPDX-License-Identifier: CEPL-1.0
use portable_atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative stop flag checked by every bounded wait in the frame loop.
///
/// Cloning shares the flag. The event handler raises it on close; the
/// renderer checks it on entry to each frame and after every bounded wait.
/// A wait that times out returns to the caller instead of retrying, so the
/// event loop keeps running and can deliver the close request.
#[derive(Clone, Debug, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        if !self.flag.swap(true, Ordering::AcqRel) {
            tracing::info!("shutdown requested");
        }
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

#[cfg(test)]
#[path = "shutdown_tests.rs"]
mod tests;

// SPDX-License-Identifier: CEPL-1.0
use std::time::{Duration, Instant};

/// Measures the elapsed time between consecutive frames.
#[derive(Debug)]
pub struct FrameClock {
    last: Instant,
}

impl FrameClock {
    pub fn new() -> Self {
        Self { last: Instant::now() }
    }

    /// Seconds since the previous tick.
    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> f32 {
        let dt = now.saturating_duration_since(self.last);
        self.last = now;
        dt.as_secs_f32()
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts presented frames and reports once per window.
#[derive(Debug)]
pub struct FpsCounter {
    frames: u32,
    window_start: Instant,
    window: Duration,
}

impl FpsCounter {
    pub fn new(window: Duration) -> Self {
        Self {
            frames: 0,
            window_start: Instant::now(),
            window,
        }
    }

    pub fn frame(&mut self) {
        self.frames = self.frames.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.frames = 0;
    }

    /// Returns the frame count of the window that just closed, if any.
    pub fn poll(&mut self, now: Instant) -> Option<u32> {
        if now.saturating_duration_since(self.window_start) < self.window {
            return None;
        }
        let n = self.frames;
        self.frames = 0;
        self.window_start = now;
        Some(n)
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;

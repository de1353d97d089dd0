//! Trailing-edge debounce for cache writes.
//!
//! [`FlushSchedule`] holds no timer. Callers feed it "now" and act on the
//! returned [`FlushAction`], which keeps the coalescing rule testable without
//! sleeping.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushAction {
    /// Nothing is dirty.
    Idle,
    /// Dirty, but the table was touched too recently. Check again after the
    /// given delay.
    Wait(Duration),
    /// The window has passed since the last touch; write now.
    Flush,
}

#[derive(Debug, Clone)]
pub struct FlushSchedule {
    window: Duration,
    last_touch: Option<Instant>,
    /// A flush task is alive and will observe further touches.
    running: bool,
}

impl FlushSchedule {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_touch: None,
            running: false,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_dirty(&self) -> bool {
        self.last_touch.is_some()
    }

    /// Record a change to the table.
    ///
    /// Returns true when no flush task is running and the caller must start
    /// one.
    pub fn touch(&mut self, now: Instant) -> bool {
        self.last_touch = Some(now);
        if self.running {
            false
        } else {
            self.running = true;
            true
        }
    }

    pub fn next_action(&self, now: Instant) -> FlushAction {
        match self.last_touch {
            None => FlushAction::Idle,
            Some(touched) => {
                let quiet = now.saturating_duration_since(touched);
                if quiet >= self.window {
                    FlushAction::Flush
                } else {
                    FlushAction::Wait(self.window - quiet)
                }
            }
        }
    }

    /// Clear the dirty mark right before a write. Touches that arrive while
    /// the write is in progress mark the table dirty again.
    pub fn begin_flush(&mut self) {
        self.last_touch = None;
    }

    /// The flush task is exiting. Must be called under the same lock that
    /// observed [`FlushAction::Idle`], otherwise a touch could be lost.
    pub fn stop(&mut self) {
        self.running = false;
    }
}

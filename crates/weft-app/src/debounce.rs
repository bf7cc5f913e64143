//! Trailing-edge debouncing for outgoing rerun requests.
//!
//! A burst of widget changes inside the quiet window collapses into one
//! action: every call supersedes the previous one, and only the last
//! survivor runs once the window elapses.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Coalesces rapid calls into the trailing one.
///
/// With a zero window, actions run synchronously on the caller — the default
/// for unit-level use. With a non-zero window, actions are scheduled on the
/// tokio runtime, so `call` must be invoked from within one.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    generation: Arc<AtomicU64>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Schedule `action` after the quiet window, superseding any pending
    /// call.
    pub fn call<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let my_generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        if self.window.is_zero() {
            action();
            return;
        }

        let generation = Arc::clone(&self.generation);
        let window = self.window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            // Only the latest call survives the window.
            if generation.load(Ordering::SeqCst) == my_generation {
                action();
            }
        });
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

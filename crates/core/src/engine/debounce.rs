//! Per-item vote debounce

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Entries are pruned once the map grows past this
const PRUNE_THRESHOLD: usize = 1024;

/// Admits at most one vote per item id within the window.
///
/// This throttles rapid repeated taps from one process. It is not a
/// consistency mechanism; the store guards do that.
#[derive(Debug)]
pub struct VoteDebouncer {
    window: Duration,
    last_vote: Mutex<HashMap<String, Instant>>,
}

impl VoteDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_vote: Mutex::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a vote on `item_id` now. Returns false inside the window.
    pub fn try_acquire(&self, item_id: &str) -> bool {
        self.try_acquire_at(item_id, Instant::now())
    }

    fn try_acquire_at(&self, item_id: &str, now: Instant) -> bool {
        if self.window.is_zero() {
            return true;
        }

        let mut last_vote = self.entries();
        if let Some(previous) = last_vote.get(item_id) {
            if now.saturating_duration_since(*previous) < self.window {
                return false;
            }
        }

        if last_vote.len() >= PRUNE_THRESHOLD {
            let window = self.window;
            last_vote.retain(|_, at| now.saturating_duration_since(*at) < window);
        }
        last_vote.insert(item_id.to_string(), now);
        true
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Instant>> {
        match self.last_vote.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("Debounce mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

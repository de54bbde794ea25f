//! Session tokens for discarding superseded results.
//!
//! Every orchestrator query is stamped with a token from a shared
//! [`SessionClock`]. Before a result is applied to anything externally
//! visible, its token is compared with the latest one issued; a mismatch
//! means a newer query exists and the result is dropped. There is only ever
//! one writer per slot, so a plain compare-and-discard suffices.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionToken(pub u64);

/// Monotonic token source shared by everything that issues queries.
#[derive(Debug, Default)]
pub struct SessionClock {
    latest: AtomicU64,
}

impl SessionClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a token newer than every token issued before it.
    pub fn issue(&self) -> SessionToken {
        SessionToken(self.latest.fetch_add(1, Ordering::AcqRel) + 1)
    }

    pub fn latest(&self) -> SessionToken {
        SessionToken(self.latest.load(Ordering::Acquire))
    }

    pub fn is_current(&self, token: SessionToken) -> bool {
        self.latest() == token
    }
}

/// Externally visible value that only accepts results from the latest query.
#[derive(Debug)]
pub struct LatestSlot<T> {
    clock: Arc<SessionClock>,
    value: Mutex<Option<(SessionToken, T)>>,
}

impl<T: Clone> LatestSlot<T> {
    pub fn new(clock: Arc<SessionClock>) -> Self {
        Self { clock, value: Mutex::new(None) }
    }

    /// Store `value` if `token` is still the latest issued and no newer
    /// result has landed. Returns whether it was applied; stale results are
    /// dropped without error.
    pub fn apply(&self, token: SessionToken, value: T) -> bool {
        let mut slot = self.value.lock().unwrap_or_else(|p| p.into_inner());
        let older_than_stored = slot.as_ref().is_some_and(|(stored, _)| token < *stored);
        if older_than_stored || !self.clock.is_current(token) {
            tracing::debug!(
                target: "riskscape::session",
                token = token.0,
                latest = self.clock.latest().0,
                "stale result discarded"
            );
            return false;
        }
        *slot = Some((token, value));
        true
    }

    pub fn get(&self) -> Option<T> {
        self.value
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .as_ref()
            .map(|(_, v)| v.clone())
    }

    pub fn token(&self) -> Option<SessionToken> {
        self.value.lock().unwrap_or_else(|p| p.into_inner()).as_ref().map(|(t, _)| *t)
    }
}

//! Shared health state for the /health endpoint.
//! Updated by the resolution consumer, read by the API.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::session::ResolveOutcome;

/// Resolver counters. Updated by the resolution consumer, read by API.
#[derive(Default)]
pub struct HealthState {
    pub sessions_joined: AtomicU64,
    pub resolutions_ignored: AtomicU64,
    pub resolutions_failed: AtomicU64,
    pub resolutions_abandoned: AtomicU64,
}

#[derive(Debug, Serialize)]
pub struct HealthSnapshot {
    pub status: &'static str,
    pub observing: bool,
    /// Live subscribers on `gameOrSessionChosen`, the resolver included.
    pub session_subscribers: usize,
    pub games_tracked: usize,
    pub sessions_joined: u64,
    pub resolutions_ignored: u64,
    pub resolutions_failed: u64,
    pub resolutions_abandoned: u64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: &ResolveOutcome) {
        let counter = match outcome {
            ResolveOutcome::Joined(_) => &self.sessions_joined,
            ResolveOutcome::Ignored(_) => &self.resolutions_ignored,
            ResolveOutcome::Failed(_) => &self.resolutions_failed,
            ResolveOutcome::Abandoned => &self.resolutions_abandoned,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, observing: bool, session_subscribers: usize, games_tracked: usize) -> HealthSnapshot {
        HealthSnapshot {
            status: if observing { "ok" } else { "degraded" },
            observing,
            session_subscribers,
            games_tracked,
            sessions_joined: self.sessions_joined.load(Ordering::Relaxed),
            resolutions_ignored: self.resolutions_ignored.load(Ordering::Relaxed),
            resolutions_failed: self.resolutions_failed.load(Ordering::Relaxed),
            resolutions_abandoned: self.resolutions_abandoned.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{IgnoreReason, ResolveError};

    #[test]
    fn outcomes_land_in_their_counters() {
        let health = HealthState::new();
        health.record(&ResolveOutcome::Ignored(IgnoreReason::AlreadyResolved));
        health.record(&ResolveOutcome::Ignored(IgnoreReason::NoCode));
        health.record(&ResolveOutcome::Failed(ResolveError::MissingIdentity { code: "123456".into() }));
        health.record(&ResolveOutcome::Abandoned);

        let snap = health.snapshot(true, 1, 3);
        assert_eq!(snap.status, "ok");
        assert_eq!(snap.session_subscribers, 1);
        assert_eq!(snap.games_tracked, 3);
        assert_eq!(snap.sessions_joined, 0);
        assert_eq!(snap.resolutions_ignored, 2);
        assert_eq!(snap.resolutions_failed, 1);
        assert_eq!(snap.resolutions_abandoned, 1);
        assert_eq!(health.snapshot(false, 0, 0).status, "degraded");
    }
}

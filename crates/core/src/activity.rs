//! User activity tracking and proactive renewal
//!
//! The monitor keeps the credential fresh while the user is active and lets it
//! lapse in an idle tab; the next interactive request then goes through the
//! 401 path on its own.

use std::cell::Cell;
use std::rc::Rc;

use crate::context::SessionContext;
use crate::credential::renewal_due;
use crate::failure::SessionFailureHandler;
use crate::paths::is_protected;
use crate::refresh::RefreshCoordinator;

/// Interaction and renewal-attempt timestamps (epoch milliseconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityState {
    pub last_activity_at: u64,
    pub last_renewal_attempt_at: Option<u64>,
}

/// What one heartbeat tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    /// User idle past the ceiling; credential left to lapse
    Idle,
    /// Nothing stored, nothing to renew
    Unauthenticated,
    /// Credential outside the skew window
    NotDue,
    /// Due, but the minimum gap since the last attempt has not elapsed
    Throttled,
    Renewed,
    /// Renewal failed and the session was escalated as expired
    Failed,
}

/// Whether a protected navigation may go ahead
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationDecision {
    Proceed,
    Block,
}

/// Idle when strictly more than `ceiling_ms` has passed since the last activity
pub const fn is_idle_at(now_ms: u64, last_activity_at: u64, ceiling_ms: u64) -> bool {
    now_ms.saturating_sub(last_activity_at) > ceiling_ms
}

pub struct ActivityMonitor {
    ctx: SessionContext,
    coordinator: Rc<RefreshCoordinator>,
    failures: Rc<SessionFailureHandler>,
    state: Cell<ActivityState>,
}

impl ActivityMonitor {
    /// Page load counts as activity
    pub fn new(
        ctx: SessionContext,
        coordinator: Rc<RefreshCoordinator>,
        failures: Rc<SessionFailureHandler>,
    ) -> Self {
        let now = ctx.clock.now_ms();
        Self {
            ctx,
            coordinator,
            failures,
            state: Cell::new(ActivityState {
                last_activity_at: now,
                last_renewal_attempt_at: None,
            }),
        }
    }

    pub fn state(&self) -> ActivityState {
        self.state.get()
    }

    /// Note a user interaction. Bursts are coalesced: at most one update per
    /// debounce window. Returns whether the timestamp moved.
    pub fn record_interaction(&self) -> bool {
        let now = self.ctx.clock.now_ms();
        let mut state = self.state.get();
        let window = self.ctx.config.timing.activity_debounce_ms;
        if now < state.last_activity_at.saturating_add(window) {
            return false;
        }
        state.last_activity_at = now;
        self.state.set(state);
        true
    }

    pub fn is_idle(&self) -> bool {
        is_idle_at(
            self.ctx.clock.now_ms(),
            self.state.get().last_activity_at,
            self.ctx.config.timing.idle_ceiling_ms,
        )
    }

    /// `None` when no credential is stored
    fn credential_due(&self) -> Option<bool> {
        let credential = self.ctx.store.get()?;
        Some(renewal_due(
            credential.as_str(),
            self.ctx.clock.now_secs(),
            self.ctx.config.timing.renewal_skew_secs,
        ))
    }

    fn gap_elapsed(&self, now: u64) -> bool {
        self.state.get().last_renewal_attempt_at.is_none_or(|last| {
            now.saturating_sub(last) >= self.ctx.config.timing.min_renewal_gap_ms
        })
    }

    fn mark_attempt(&self, now: u64) {
        let mut state = self.state.get();
        state.last_renewal_attempt_at = Some(now);
        self.state.set(state);
    }

    /// One periodic tick
    pub async fn heartbeat(&self) -> HeartbeatOutcome {
        if self.is_idle() {
            debug!("user idle, skipping proactive renewal");
            return HeartbeatOutcome::Idle;
        }
        let Some(due) = self.credential_due() else {
            return HeartbeatOutcome::Unauthenticated;
        };
        if !due {
            return HeartbeatOutcome::NotDue;
        }

        let now = self.ctx.clock.now_ms();
        if !self.gap_elapsed(now) {
            debug!("renewal due but throttled");
            return HeartbeatOutcome::Throttled;
        }
        self.mark_attempt(now);

        info!("credential near expiry, renewing proactively");
        if self.renew().await {
            HeartbeatOutcome::Renewed
        } else {
            HeartbeatOutcome::Failed
        }
    }

    /// Whether navigating to `path` must wait for a renewal first
    pub fn navigation_requires_renewal(&self, path: &str) -> bool {
        is_protected(path, &self.ctx.config.protected_prefixes)
            && !self.is_idle()
            && self.credential_due() == Some(true)
    }

    /// Gate an in-app navigation or form submission to `path`.
    ///
    /// Costs nothing when no renewal is needed. Otherwise waits for a renewal
    /// (joining one already in flight) and blocks if it fails.
    pub async fn guard_navigation(&self, path: &str) -> NavigationDecision {
        if !self.navigation_requires_renewal(path) {
            return NavigationDecision::Proceed;
        }

        if !self.coordinator.is_renewing() {
            let now = self.ctx.clock.now_ms();
            if !self.gap_elapsed(now) {
                debug!(path, "navigation renewal throttled, proceeding");
                return NavigationDecision::Proceed;
            }
            self.mark_attempt(now);
        }

        debug!(path, "holding navigation for renewal");
        if self.renew().await {
            NavigationDecision::Proceed
        } else {
            NavigationDecision::Block
        }
    }

    async fn renew(&self) -> bool {
        match self.coordinator.renew_once().await {
            Ok(_) => true,
            Err(failure) => {
                warn!(error = %failure, "proactive renewal failed");
                self.failures.expired().await;
                false
            }
        }
    }
}

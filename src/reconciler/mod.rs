// SPDX-License-Identifier: MIT
//! Bootstrap reconciler — drives one session check → profile fetch →
//! decision pass to a terminal phase, under a single-flight guard and a
//! hard per-attempt deadline.
//!
//! # State machine
//!
//! ```text
//! Idle ──reconcile()──► Running ──valid profile──────────► Succeeded (user)
//!                         │  ├──no session / no row──────► Succeeded (sign-in)
//!                         │  ├──error, retry budget left─► Running (timer re-entry)
//!                         │  └──error, budget spent──────► Failed
//!                         ▲──────────────(manual retry)────────┘
//! ```
//!
//! A trigger while an attempt is in flight is dropped, not queued. Retries
//! re-enter through the entry point as fresh transitions via a one-shot
//! timer — recursion never nests. During a pending retry the phase stays
//! `Running` so the shell keeps showing the loading view; the released
//! guard is what lets a visibility trigger start a fresh attempt in that
//! window.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::accessor::SessionAccessor;
use crate::backend::{Backend, Profile};
use crate::config::BootstrapProfile;
use crate::deadline::with_deadline;
use crate::error::{BootstrapError, ErrorClass};
use crate::events::{StateBroadcaster, StateChange};

// ─── Phases & snapshot ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Running,
    Succeeded,
    Failed,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::Running => write!(f, "running"),
            Phase::Succeeded => write!(f, "succeeded"),
            Phase::Failed => write!(f, "failed"),
        }
    }
}

/// Read-only copy of the reconciler state, handed to the gate and events.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    pub phase: Phase,
    pub retry_count: u32,
    pub authenticated_user: Option<Profile>,
    pub last_error: Option<(ErrorClass, String)>,
    pub show_login: bool,
    pub attempt: u64,
}

impl StateSnapshot {
    pub fn error_message(&self) -> Option<&str> {
        self.last_error.as_ref().map(|(_, msg)| msg.as_str())
    }
}

// ─── Inner state ─────────────────────────────────────────────────────────────

#[derive(Debug)]
struct Inner {
    phase: Phase,
    retry_count: u32,
    authenticated_user: Option<Profile>,
    last_error: Option<(ErrorClass, String)>,
    show_login: bool,
}

impl Inner {
    fn new() -> Self {
        Self {
            phase: Phase::Idle,
            retry_count: 0,
            authenticated_user: None,
            last_error: None,
            show_login: false,
        }
    }

    fn snapshot(&self, attempt: u64) -> StateSnapshot {
        StateSnapshot {
            phase: self.phase,
            retry_count: self.retry_count,
            authenticated_user: self.authenticated_user.clone(),
            last_error: self.last_error.clone(),
            show_login: self.show_login,
            attempt,
        }
    }

    fn change(&self, attempt: u64) -> StateChange {
        StateChange {
            phase: self.phase.to_string(),
            attempt,
            retry_count: self.retry_count,
            authenticated_email: self.authenticated_user.as_ref().map(|p| p.email.clone()),
            role: self.authenticated_user.as_ref().map(|p| p.role),
            show_login: self.show_login,
            error: self.last_error.as_ref().map(|(_, msg)| msg.clone()),
        }
    }
}

/// Releases the single-flight guard on every exit path.
struct FlightGuard(Arc<AtomicBool>);

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// ─── Reconciler ──────────────────────────────────────────────────────────────

/// Thread-safe bootstrap state machine.
///
/// Cheaply cloneable — all clones share the same internal state via `Arc`.
#[derive(Clone)]
pub struct Reconciler {
    accessor: SessionAccessor,
    backend: Arc<dyn Backend>,
    budgets: Arc<BootstrapProfile>,
    broadcaster: StateBroadcaster,
    inner: Arc<RwLock<Inner>>,
    /// Single-flight guard — separate from the phase, so a pending retry
    /// window leaves the entry point open while the phase stays Running.
    in_flight: Arc<AtomicBool>,
    /// Monotonic attempt tag. An attempt whose tag is no longer current
    /// was abandoned (e.g. by logout) and must not touch newer state.
    attempt_seq: Arc<AtomicU64>,
}

impl Reconciler {
    pub fn new(
        backend: Arc<dyn Backend>,
        budgets: BootstrapProfile,
        broadcaster: StateBroadcaster,
    ) -> Self {
        Self {
            accessor: SessionAccessor::new(backend.clone(), budgets.clone()),
            backend,
            budgets: Arc::new(budgets),
            broadcaster,
            inner: Arc::new(RwLock::new(Inner::new())),
            in_flight: Arc::new(AtomicBool::new(false)),
            attempt_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn snapshot(&self) -> StateSnapshot {
        self.inner
            .read()
            .await
            .snapshot(self.attempt_seq.load(Ordering::SeqCst))
    }

    /// Run one reconciliation toward a terminal phase.
    ///
    /// A call while an attempt is in flight, or while an authenticated
    /// user is already established, is a no-op.
    pub async fn reconcile(&self) {
        self.run(false).await;
    }

    /// Reconcile even when a user is already established (manual refresh).
    pub async fn force_reconcile(&self) {
        self.run(true).await;
    }

    /// Reset the retry budget and reconcile — the error view's retry action.
    pub async fn manual_retry(&self) {
        {
            let mut inner = self.inner.write().await;
            inner.retry_count = 0;
            inner.last_error = None;
        }
        info!("manual retry requested");
        self.run(true).await;
    }

    /// Sign out and return to Idle.
    ///
    /// Bumping the attempt tag abandons any in-flight attempt: its result
    /// arrives stale and is discarded instead of resurrecting the session.
    pub async fn logout(&self) {
        if let Err(e) = self.backend.sign_out().await {
            warn!(err = %e, "sign-out failed during logout");
        }
        let attempt = self.attempt_seq.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut inner = self.inner.write().await;
            *inner = Inner::new();
        }
        info!("signed out — reconciler reset");
        self.publish(attempt).await;
    }

    // ─── Attempt machinery ───────────────────────────────────────────────

    async fn run(&self, force: bool) {
        // Single-flight: a concurrent trigger is dropped, not queued.
        if self.in_flight.swap(true, Ordering::SeqCst) {
            debug!("reconcile already in flight — trigger dropped");
            return;
        }
        let _guard = FlightGuard(Arc::clone(&self.in_flight));

        // Established users don't re-bootstrap on passive triggers.
        if !force {
            let inner = self.inner.read().await;
            if inner.phase == Phase::Succeeded && inner.authenticated_user.is_some() {
                debug!("user already established — trigger dropped");
                return;
            }
        }

        let attempt = self.attempt_seq.fetch_add(1, Ordering::SeqCst) + 1;

        {
            let mut inner = self.inner.write().await;
            inner.phase = Phase::Running;
            inner.show_login = false;
            inner.last_error = None;
        }
        self.publish(attempt).await;
        info!(attempt, "bootstrap attempt started");

        let outcome = with_deadline(self.budgets.total_init_timeout, self.attempt_once()).await;
        let result = match outcome {
            Ok(res) => res,
            Err(e) => Err(BootstrapError::Timeout { limit_ms: e.limit_ms }),
        };

        if self.attempt_seq.load(Ordering::SeqCst) != attempt {
            warn!(attempt, "stale attempt result discarded");
            return;
        }

        match result {
            Ok(user) => self.settle(attempt, user).await,
            Err(err) => self.handle_failure(attempt, err).await,
        }
    }

    /// One bootstrap pass: session, then profile, then the decision.
    /// `Ok(None)` means "no authenticated user — show sign-in".
    async fn attempt_once(&self) -> Result<Option<Profile>, BootstrapError> {
        let Some(session) = self.accessor.fetch_session().await? else {
            debug!("no active session");
            return Ok(None);
        };

        match self.accessor.fetch_profile(&session).await {
            Ok(Some(profile)) => Ok(Some(profile)),
            // No row, or the session lapsed between the two fetches:
            // invalidate it so the next pass starts clean.
            Ok(None) | Err(BootstrapError::NotFound { .. }) => {
                warn!(email = %session.user_email, "session has no usable profile — invalidating");
                if let Err(e) = self.backend.sign_out().await {
                    warn!(err = %e, "sign-out of orphaned session failed");
                }
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    async fn settle(&self, attempt: u64, user: Option<Profile>) {
        {
            let mut inner = self.inner.write().await;
            inner.phase = Phase::Succeeded;
            inner.retry_count = 0;
            inner.show_login = user.is_none();
            inner.authenticated_user = user.clone();
            inner.last_error = None;
        }
        match &user {
            Some(p) => info!(attempt, email = %p.email, role = %p.role, "bootstrap succeeded"),
            None => info!(attempt, "bootstrap finished without a user — showing sign-in"),
        }
        self.publish(attempt).await;
    }

    async fn handle_failure(&self, attempt: u64, err: BootstrapError) {
        let class = ErrorClass::of(&err);
        let (retry_count, will_retry) = {
            let mut inner = self.inner.write().await;
            inner.retry_count += 1;
            let budget_left = inner.retry_count < self.budgets.max_retries;
            let will_retry =
                class.is_retryable() && budget_left && self.budgets.class.is_remote();
            if !will_retry {
                inner.phase = Phase::Failed;
                inner.show_login = false;
                inner.last_error = Some((class, class.user_message().to_string()));
            }
            (inner.retry_count, will_retry)
        };

        if will_retry {
            warn!(
                attempt,
                retry_count,
                delay_ms = self.budgets.retry_delay.as_millis() as u64,
                err = %err,
                "bootstrap attempt failed — retry scheduled"
            );
            self.schedule_retry(self.budgets.retry_delay);
        } else {
            warn!(attempt, retry_count, class = %class, err = %err, "bootstrap failed");
        }
        self.publish(attempt).await;
    }

    /// One-shot timer that re-enters the entry point as a fresh transition.
    fn schedule_retry(&self, delay: Duration) {
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.run(false).await;
        });
    }

    async fn publish(&self, attempt: u64) {
        let change = self.inner.read().await.change(attempt);
        self.broadcaster.publish(change);
    }
}

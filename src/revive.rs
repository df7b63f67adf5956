//! Visibility/focus re-check trigger.
//!
//! The embedding shell publishes a [`HostSignal`] when the page regains
//! visibility or the window regains focus. The watcher re-enters the
//! reconciler after a short delay when a signal arrives while no user is
//! established. The reconciler's single-flight guard is the only
//! de-duplication between this path and a scheduled retry.

use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::reconciler::{Phase, Reconciler};

/// Host-shell notifications that may warrant a session re-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSignal {
    /// The page became visible again.
    Visibility,
    /// The window regained focus.
    Focus,
}

/// Source of host signals. The shell keeps the sender; watchers subscribe.
#[derive(Clone)]
pub struct HostSignals {
    tx: broadcast::Sender<HostSignal>,
}

impl Default for HostSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl HostSignals {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    /// Publish a signal. No subscribers is fine.
    pub fn notify(&self, signal: HostSignal) {
        let _ = self.tx.send(signal);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HostSignal> {
        self.tx.subscribe()
    }
}

/// Background task that turns host signals into reconciliation re-checks.
///
/// Dropping the watcher aborts the task — no trigger outlives its owner.
pub struct ReviveWatcher {
    handle: JoinHandle<()>,
}

impl ReviveWatcher {
    pub fn spawn(reconciler: Reconciler, signals: &HostSignals, recheck_delay: Duration) -> Self {
        let mut rx = signals.subscribe();
        let handle = tokio::spawn(async move {
            info!(delay_ms = recheck_delay.as_millis() as u64, "revive watcher started");
            loop {
                match rx.recv().await {
                    Ok(signal) => {
                        let snap = reconciler.snapshot().await;
                        let wants_recheck =
                            snap.phase == Phase::Succeeded && snap.authenticated_user.is_none();
                        if !wants_recheck {
                            debug!(?signal, phase = %snap.phase, "host signal ignored");
                            continue;
                        }
                        debug!(?signal, "re-check scheduled");
                        tokio::time::sleep(recheck_delay).await;
                        reconciler.reconcile().await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "host signals lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Self { handle }
    }
}

impl Drop for ReviveWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Role;
    use crate::config::{BootstrapProfile, DeploymentClass};
    use crate::events::StateBroadcaster;
    use crate::testutil::{profile, session, MockBackend, Reply};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    const EMAIL: &str = "ana@example.com";

    fn wire(backend: Arc<MockBackend>) -> (Reconciler, HostSignals, ReviveWatcher) {
        let rec = Reconciler::new(
            backend,
            BootstrapProfile::instant(DeploymentClass::Remote),
            StateBroadcaster::new(),
        );
        let signals = HostSignals::new();
        let watcher = ReviveWatcher::spawn(rec.clone(), &signals, Duration::from_millis(5));
        (rec, signals, watcher)
    }

    #[tokio::test]
    async fn visibility_signal_recovers_an_unauthenticated_shell() {
        let backend = Arc::new(MockBackend::scripted(
            vec![Reply::Ok(None), Reply::Ok(Some(session(EMAIL, 60_000)))],
            vec![Reply::Ok(Some(profile(EMAIL, Role::User)))],
        ));
        let (rec, signals, _watcher) = wire(backend.clone());

        rec.reconcile().await;
        assert!(rec.snapshot().await.show_login);

        signals.notify(HostSignal::Visibility);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(backend.session_calls.load(Ordering::SeqCst), 2);
        assert!(rec.snapshot().await.authenticated_user.is_some());
    }

    #[tokio::test]
    async fn signals_are_ignored_once_authenticated() {
        let backend = Arc::new(MockBackend::scripted(
            vec![Reply::Ok(Some(session(EMAIL, 60_000)))],
            vec![Reply::Ok(Some(profile(EMAIL, Role::User)))],
        ));
        let (rec, signals, _watcher) = wire(backend.clone());

        rec.reconcile().await;
        signals.notify(HostSignal::Focus);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(backend.session_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dropping_the_watcher_stops_future_rechecks() {
        let backend = Arc::new(MockBackend::signed_out());
        let (rec, signals, watcher) = wire(backend.clone());

        rec.reconcile().await;
        drop(watcher);

        signals.notify(HostSignal::Visibility);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(backend.session_calls.load(Ordering::SeqCst), 1);
    }
}

pub mod accessor;
pub mod backend;
pub mod config;
pub mod deadline;
pub mod error;
pub mod events;
pub mod gate;
pub mod reconciler;
pub mod revive;

#[cfg(test)]
pub(crate) mod testutil;

use std::sync::Arc;

use config::VouchdConfig;
use events::StateBroadcaster;
use reconciler::Reconciler;
use revive::HostSignals;

/// Shared handles an embedding shell wires once and clones everywhere.
#[derive(Clone)]
pub struct BootstrapContext {
    pub config: Arc<VouchdConfig>,
    pub reconciler: Reconciler,
    pub broadcaster: StateBroadcaster,
    pub signals: HostSignals,
}

impl BootstrapContext {
    /// Wire a context over a backend collaborator.
    ///
    /// The budgets are selected from the config's serving origin; the
    /// broadcaster and signal source are shared with the reconciler and
    /// any revive watcher spawned from this context.
    pub fn new(config: VouchdConfig, backend: Arc<dyn backend::Backend>) -> Self {
        let broadcaster = StateBroadcaster::new();
        let reconciler = Reconciler::new(backend, config.profile(), broadcaster.clone());
        Self {
            config: Arc::new(config),
            reconciler,
            broadcaster,
            signals: HostSignals::new(),
        }
    }

    /// Spawn the visibility/focus watcher for this context.
    pub fn spawn_revive_watcher(&self) -> revive::ReviveWatcher {
        revive::ReviveWatcher::spawn(
            self.reconciler.clone(),
            &self.signals,
            self.config.profile().recheck_delay,
        )
    }
}

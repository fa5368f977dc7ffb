//! Background score recalculation
//!
//! Periodically recomputes influence and reputation for every known agent.
//! Agents are scored independently: a failure for one is logged and skipped,
//! leaving that agent's prior scores untouched.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use concord_store::AgentDirectory;
use concord_types::Result;

use crate::influence::InfluenceMetricsEngine;
use crate::reputation::ReputationEngine;

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between recalculation sweeps
    pub interval: Duration,
    pub enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            enabled: true,
        }
    }
}

/// Handle to a running scheduler task
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal shutdown and wait for the task to exit
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}

/// Periodic influence/reputation recalculation over all known agents
#[derive(Clone)]
pub struct RecalculationScheduler {
    directory: Arc<dyn AgentDirectory>,
    influence: InfluenceMetricsEngine,
    reputation: ReputationEngine,
    config: SchedulerConfig,
}

impl RecalculationScheduler {
    pub fn new(
        directory: Arc<dyn AgentDirectory>,
        influence: InfluenceMetricsEngine,
        reputation: ReputationEngine,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            directory,
            influence,
            reputation,
            config,
        }
    }

    /// One full sweep; returns the number of agents successfully rescored
    pub async fn run_once(&self) -> Result<u32> {
        let agents = self.directory.list_ids().await?;
        let mut rescored = 0;

        for agent_id in agents {
            let influence = self.influence.calculate(&agent_id).await;
            let reputation = self.reputation.calculate(&agent_id).await;
            match (influence, reputation) {
                (Ok(_), Ok(_)) => rescored += 1,
                (Err(e), _) | (_, Err(e)) => {
                    warn!(agent_id = %agent_id, error = %e, "recalculation failed for agent");
                }
            }
        }

        info!(rescored, "recalculation sweep finished");
        Ok(rescored)
    }

    /// Spawn the periodic task; dropping the handle does not stop it
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let scheduler = self;

        let handle = tokio::spawn(async move {
            if !scheduler.config.enabled {
                return;
            }
            let mut ticker = tokio::time::interval(scheduler.config.interval);
            // The first tick fires immediately; skip it so the first sweep
            // happens one interval after start.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = scheduler.run_once().await {
                            warn!(error = %e, "recalculation sweep failed");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("recalculation scheduler shutting down");
                            break;
                        }
                    }
                }
            }
        });

        SchedulerHandle {
            shutdown: shutdown_tx,
            handle,
        }
    }
}

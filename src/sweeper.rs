use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::faucet::AdmissionController;

/// Periodically drops cooldown entries that expired without a follow-up
/// request, keeping the ledger bounded by active identities.
pub struct CooldownSweeper {
    admission: Arc<AdmissionController>,
    interval: Duration,
}

impl CooldownSweeper {
    pub fn new(admission: Arc<AdmissionController>, interval: Duration) -> Self {
        assert!(
            interval >= Duration::from_millis(10),
            "Sweep interval too small"
        );
        Self {
            admission,
            interval,
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("Starting cooldown sweeper every {:?}", self.interval);
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    match changed {
                        Ok(_) => {
                            if *shutdown.borrow() {
                                info!("Sweeper shutdown signal received");
                                break;
                            }
                        }
                        Err(_) => {
                            warn!("Shutdown channel closed unexpectedly. Exiting sweeper loop");
                            break;
                        }
                    }
                }
                _ = sleep(self.interval) => {
                    self.tick();
                }
            }
        }
    }

    fn tick(&self) -> usize {
        let purged = self.admission.purge_expired(Utc::now());
        if purged > 0 {
            let snapshot = self.admission.snapshot();
            debug!(
                purged,
                tracked = snapshot.tracked,
                in_flight = snapshot.in_flight,
                "Purged expired cooldown entries"
            );
        }
        purged
    }
}

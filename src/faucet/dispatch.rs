use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::time::timeout;
use tracing::{info, warn};

use super::admission::{AdmissionController, AdmissionTicket, Disposition};
use super::ports::TransferService;
use super::types::{FailureKind, OutcomeRecord, TransferResult};

#[derive(Debug, Clone, Copy)]
pub struct DispatchPolicy {
    /// Upper bound on one transfer call; past it the entry is force-cleared.
    pub max_duration: Duration,
    /// Keep the cooldown after failed transfers instead of clearing it.
    /// Timeouts are always cleared.
    pub penalize_failures: bool,
}

#[derive(Clone)]
pub struct DispatchCoordinator {
    admission: Arc<AdmissionController>,
    transfers: Arc<dyn TransferService>,
    policy: DispatchPolicy,
}

impl DispatchCoordinator {
    pub fn new(
        admission: Arc<AdmissionController>,
        transfers: Arc<dyn TransferService>,
        policy: DispatchPolicy,
    ) -> Self {
        assert!(
            policy.max_duration > Duration::ZERO,
            "Dispatch duration bound must be positive"
        );
        Self {
            admission,
            transfers,
            policy,
        }
    }

    /// Issues exactly one transfer for the ticket and settles its ledger entry.
    pub async fn dispatch(&self, ticket: AdmissionTicket) -> OutcomeRecord {
        let started = Instant::now();
        let submission = self.transfers.submit_transfer(ticket.target_address());
        let result = match timeout(self.policy.max_duration, submission).await {
            Ok(result) => result,
            Err(_) => TransferResult::failure(
                FailureKind::Timeout,
                format!(
                    "transfer did not resolve within {}ms",
                    self.policy.max_duration.as_millis()
                ),
            ),
        };

        let disposition = self.disposition_for(&result);
        self.admission.complete(&ticket, disposition);

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match &result {
            TransferResult::Success { tx_hash } => info!(
                identity = %ticket.identity(),
                address = ticket.target_address(),
                tx_hash = %tx_hash,
                elapsed_ms,
                "Faucet transfer confirmed"
            ),
            TransferResult::Failure(failure) => warn!(
                identity = %ticket.identity(),
                address = ticket.target_address(),
                kind = %failure.kind,
                elapsed_ms,
                "Faucet transfer failed: {}",
                failure.reason
            ),
        }

        OutcomeRecord {
            identity: ticket.identity().clone(),
            target_address: ticket.target_address().to_string(),
            result,
            recorded_at: Utc::now(),
        }
    }

    fn disposition_for(&self, result: &TransferResult) -> Disposition {
        match result {
            TransferResult::Success { .. } => Disposition::Retain,
            TransferResult::Failure(failure) if failure.kind == FailureKind::Timeout => {
                Disposition::Clear
            }
            TransferResult::Failure(_) if self.policy.penalize_failures => Disposition::Retain,
            TransferResult::Failure(_) => Disposition::Clear,
        }
    }
}

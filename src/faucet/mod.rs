//! Request admission and dispatch engine.
//!
//! Flow per request: [`AdmissionController::evaluate`] decides under the ledger
//! lock, admitted tickets go to [`DispatchCoordinator::dispatch`] on their own
//! task, and [`OutcomeReporter`] notifies the requester and writes the audit
//! record. Rejections go straight to the reporter.

pub mod admission;
pub mod dispatch;
pub mod error;
pub mod ledger;
pub mod ports;
pub mod reporter;
pub mod types;

#[cfg(test)]
pub mod testing;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error};

pub use admission::{
    AdmissionController, AdmissionDecision, AdmissionPolicy, AdmissionTicket, Disposition,
    Eligibility, LedgerSnapshot, Rejection,
};
pub use dispatch::{DispatchCoordinator, DispatchPolicy};
pub use error::{AuditError, FaucetError, LedgerError, NotifyError};
pub use ports::{AuditSink, Notifier, TransferService};
pub use reporter::{MessageSettings, OutcomeReporter};
pub use types::{FailureKind, Identity, OutcomeRecord, RequestEvent, TransferResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    Rejected {
        rejection: Rejection,
        message: String,
    },
    Completed {
        record: OutcomeRecord,
        message: String,
        next_eligible_at: DateTime<Utc>,
    },
}

pub struct FaucetEngine {
    admission: Arc<AdmissionController>,
    dispatcher: DispatchCoordinator,
    reporter: OutcomeReporter,
}

impl FaucetEngine {
    pub fn new(
        admission: Arc<AdmissionController>,
        dispatcher: DispatchCoordinator,
        reporter: OutcomeReporter,
    ) -> Self {
        Self {
            admission,
            dispatcher,
            reporter,
        }
    }

    pub fn admission(&self) -> &Arc<AdmissionController> {
        &self.admission
    }

    pub async fn handle_request(&self, event: RequestEvent) -> Result<RequestOutcome, FaucetError> {
        let ticket = match self.admission.evaluate(&event)? {
            AdmissionDecision::Admit(ticket) => ticket,
            AdmissionDecision::Reject(rejection) => {
                debug!(identity = %event.identity, ?rejection, "Faucet request rejected");
                let message = self.reporter.report_rejection(&event, &rejection).await;
                return Ok(RequestOutcome::Rejected { rejection, message });
            }
        };

        // Detached so a dropped caller cannot abandon the transfer with the
        // entry still marked in flight.
        let dispatcher = self.dispatcher.clone();
        let reporter = self.reporter.clone();
        let task_ticket = ticket.clone();
        let handle = tokio::spawn(async move {
            let record = dispatcher.dispatch(task_ticket).await;
            let message = reporter.report_outcome(&record).await;
            (record, message)
        });

        match handle.await {
            Ok((record, message)) => Ok(RequestOutcome::Completed {
                record,
                message,
                next_eligible_at: ticket.next_eligible_at(),
            }),
            Err(join_err) => {
                error!(identity = %ticket.identity(), "Dispatch task aborted: {join_err}");
                self.admission.complete(&ticket, Disposition::Clear);
                let record = OutcomeRecord {
                    identity: ticket.identity().clone(),
                    target_address: ticket.target_address().to_string(),
                    result: TransferResult::failure(
                        FailureKind::Node,
                        format!("dispatch aborted: {join_err}"),
                    ),
                    recorded_at: Utc::now(),
                };
                self.reporter.report_outcome(&record).await;
                Err(FaucetError::DispatchAborted {
                    identity: ticket.identity().clone(),
                    message: join_err.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeDelta, TimeZone};

    use super::*;
    use testing::{RecordingAudit, RecordingNotifier, ScriptedTransfer};

    struct Harness {
        engine: Arc<FaucetEngine>,
        transfer: Arc<ScriptedTransfer>,
        notifier: Arc<RecordingNotifier>,
        audit: Arc<RecordingAudit>,
    }

    fn harness(transfer: ScriptedTransfer) -> Harness {
        let admission = Arc::new(AdmissionController::new(AdmissionPolicy {
            cooldown: TimeDelta::seconds(3_600),
            address_uniqueness: false,
        }));
        let transfer = Arc::new(transfer);
        let notifier = Arc::new(RecordingNotifier::default());
        let audit = Arc::new(RecordingAudit::default());
        let dispatcher = DispatchCoordinator::new(
            Arc::clone(&admission),
            transfer.clone(),
            DispatchPolicy {
                max_duration: Duration::from_secs(2),
                penalize_failures: false,
            },
        );
        let reporter = OutcomeReporter::new(
            notifier.clone(),
            audit.clone(),
            MessageSettings {
                cooldown: Duration::from_secs(3_600),
                explorer_url: None,
            },
        );
        Harness {
            engine: Arc::new(FaucetEngine::new(admission, dispatcher, reporter)),
            transfer,
            notifier,
            audit,
        }
    }

    fn event_at(identity: &str, offset_secs: i64) -> RequestEvent {
        let at = Utc.timestamp_opt(1_700_000_000 + offset_secs, 0).unwrap();
        RequestEvent::new(Identity::new(identity), "addr", at)
    }

    #[tokio::test]
    async fn successful_request_then_cooldown_rejection() {
        let h = harness(ScriptedTransfer::always(TransferResult::success("H1")));

        let (record, message) = match h.engine.handle_request(event_at("U1", 0)).await.unwrap() {
            RequestOutcome::Completed { record, message, .. } => (record, message),
            other => panic!("expected completion, got {other:?}"),
        };
        assert_eq!(record.identity, Identity::new("U1"));
        assert_eq!(record.result.tx_hash(), Some("H1"));
        assert_eq!(message, "tx_hash: `H1`");

        let second = h.engine.handle_request(event_at("U1", 10)).await.unwrap();
        assert_eq!(
            second,
            RequestOutcome::Rejected {
                rejection: Rejection::CooldownActive {
                    remaining: Duration::from_secs(3_590)
                },
                message: "You can request coins no more than once every 1 hours. \
                          The next attempt is possible after 59.83 minutes"
                    .to_string(),
            }
        );

        assert_eq!(h.transfer.calls(), 1);
        assert_eq!(h.audit.records().len(), 1);
        assert_eq!(h.notifier.messages().len(), 2);
    }

    #[tokio::test]
    async fn failed_request_does_not_lock_out() {
        let h = harness(ScriptedTransfer::always(TransferResult::failure(
            FailureKind::InsufficientFee,
            "insufficient fee",
        )));

        let first = h.engine.handle_request(event_at("U2", 0)).await.unwrap();
        assert!(matches!(
            first,
            RequestOutcome::Completed { ref record, .. } if record.result.tag() == "insufficient_fee"
        ));
        let second = h.engine.handle_request(event_at("U2", 1)).await.unwrap();
        assert!(matches!(second, RequestOutcome::Completed { .. }));

        assert_eq!(h.transfer.calls(), 2);
        let records = h.audit.records();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.identity == Identity::new("U2")));
    }

    #[tokio::test]
    async fn simultaneous_requests_dispatch_once() {
        let h = harness(ScriptedTransfer::delayed(
            TransferResult::success("H3"),
            Duration::from_millis(50),
        ));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let engine = Arc::clone(&h.engine);
                tokio::spawn(async move { engine.handle_request(event_at("U3", 0)).await.unwrap() })
            })
            .collect();

        let mut completed = 0;
        for task in tasks {
            match task.await.unwrap() {
                RequestOutcome::Completed { .. } => completed += 1,
                RequestOutcome::Rejected { rejection, .. } => assert!(matches!(
                    rejection,
                    Rejection::CooldownActive { .. } | Rejection::InFlight
                )),
            }
        }

        assert_eq!(completed, 1);
        assert_eq!(h.transfer.calls(), 1);
        assert_eq!(h.audit.records().len(), 1);
    }

    #[tokio::test]
    async fn every_admission_produces_one_record() {
        let h = harness(ScriptedTransfer::always(TransferResult::success("H4")));
        for identity in ["A", "B", "C"] {
            h.engine.handle_request(event_at(identity, 0)).await.unwrap();
            h.engine.handle_request(event_at(identity, 5)).await.unwrap();
        }
        assert_eq!(h.transfer.calls(), 3);
        assert_eq!(h.audit.records().len(), 3);
        assert_eq!(h.engine.admission().snapshot().tracked, 3);
    }

    #[tokio::test]
    async fn aborted_dispatch_is_still_reported() {
        let h = harness(ScriptedTransfer::panicking());

        let err = h.engine.handle_request(event_at("U6", 0)).await.unwrap_err();
        assert!(matches!(err, FaucetError::DispatchAborted { .. }));

        let records = h.audit.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].identity, Identity::new("U6"));
        assert_eq!(records[0].result.tag(), "node_error");
        assert_eq!(h.notifier.messages().len(), 1);
        assert_eq!(h.engine.admission().snapshot().tracked, 0);

        let retry = h.engine.admission().evaluate(&event_at("U6", 1)).unwrap();
        assert!(matches!(retry, AdmissionDecision::Admit(_)));
    }
}

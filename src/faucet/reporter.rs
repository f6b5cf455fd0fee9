use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use super::admission::Rejection;
use super::ports::{AuditSink, Notifier};
use super::types::{Identity, OutcomeRecord, RequestEvent, TransferResult};

const TRANSPORT_FAILURE_MESSAGE: &str = "can't complete the request right now, please try again later";

#[derive(Debug, Clone)]
pub struct MessageSettings {
    pub cooldown: Duration,
    /// Prefix for transaction links, e.g. `https://explorer/transactions/`.
    pub explorer_url: Option<String>,
}

/// Stateless formatter in front of the notifier and the audit sink. Failures of
/// either collaborator are logged here and go no further.
#[derive(Clone)]
pub struct OutcomeReporter {
    notifier: Arc<dyn Notifier>,
    audit: Arc<dyn AuditSink>,
    settings: MessageSettings,
}

impl OutcomeReporter {
    pub fn new(notifier: Arc<dyn Notifier>, audit: Arc<dyn AuditSink>, settings: MessageSettings) -> Self {
        Self {
            notifier,
            audit,
            settings,
        }
    }

    pub async fn report_rejection(&self, event: &RequestEvent, rejection: &Rejection) -> String {
        let message = self.rejection_message(event, rejection);
        self.deliver(&event.identity, &message).await;
        message
    }

    pub async fn report_outcome(&self, record: &OutcomeRecord) -> String {
        let message = self.outcome_message(record);
        self.deliver(&record.identity, &message).await;
        if let Err(err) = self.audit.record_outcome(record).await {
            warn!(
                identity = %record.identity,
                result = record.result.tag(),
                "Failed to record faucet outcome: {err}"
            );
        }
        message
    }

    pub fn rejection_message(&self, event: &RequestEvent, rejection: &Rejection) -> String {
        match rejection {
            Rejection::CooldownActive { remaining } => format!(
                "You can request coins no more than once every {} hours. \
                 The next attempt is possible after {} minutes",
                format_hours(self.settings.cooldown),
                format_minutes(*remaining)
            ),
            Rejection::InFlight => {
                "Your previous request is still being processed, please wait for its result".to_string()
            }
            Rejection::AddressReserved { remaining } => format!(
                "Address {} already has a pending faucet payout. \
                 The next attempt is possible after {} minutes",
                event.target_address,
                format_minutes(*remaining)
            ),
        }
    }

    pub fn outcome_message(&self, record: &OutcomeRecord) -> String {
        match &record.result {
            TransferResult::Success { tx_hash } => {
                let prefix = self.settings.explorer_url.as_deref().unwrap_or_default();
                format!("tx_hash: `{prefix}{tx_hash}`")
            }
            TransferResult::Failure(failure) if failure.kind.is_policy_rejection() => {
                failure.reason.clone()
            }
            TransferResult::Failure(_) => TRANSPORT_FAILURE_MESSAGE.to_string(),
        }
    }

    async fn deliver(&self, identity: &Identity, message: &str) {
        if let Err(err) = self.notifier.notify(identity, message).await {
            warn!(identity = %identity, "Failed to deliver faucet notification: {err}");
        }
    }
}

fn format_hours(window: Duration) -> String {
    let secs = window.as_secs();
    if secs % 3_600 == 0 {
        format!("{}", secs / 3_600)
    } else {
        format!("{:.2}", secs as f64 / 3_600.0)
    }
}

fn format_minutes(remaining: Duration) -> String {
    format!("{:.2}", remaining.as_secs_f64() / 60.0)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::faucet::testing::{RecordingAudit, RecordingNotifier, event_now};
    use crate::faucet::types::FailureKind;

    fn reporter(
        notifier: Arc<RecordingNotifier>,
        audit: Arc<RecordingAudit>,
    ) -> OutcomeReporter {
        OutcomeReporter::new(
            notifier,
            audit,
            MessageSettings {
                cooldown: Duration::from_secs(86_400),
                explorer_url: Some("https://explorer.test/transactions/".to_string()),
            },
        )
    }

    fn record(result: TransferResult) -> OutcomeRecord {
        OutcomeRecord {
            identity: Identity::new("U1"),
            target_address: "addr".to_string(),
            result,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(format_hours(Duration::from_secs(86_400)), "24");
        assert_eq!(format_hours(Duration::from_secs(5_400)), "1.50");
        assert_eq!(format_minutes(Duration::from_secs(3_590)), "59.83");
        assert_eq!(format_minutes(Duration::ZERO), "0.00");
    }

    #[tokio::test]
    async fn rejection_is_notified_but_not_audited() {
        let notifier = Arc::new(RecordingNotifier::default());
        let audit = Arc::new(RecordingAudit::default());
        let reporter = reporter(notifier.clone(), audit.clone());

        let message = reporter
            .report_rejection(
                &event_now("U1", "addr"),
                &Rejection::CooldownActive {
                    remaining: Duration::from_secs(90),
                },
            )
            .await;

        assert!(message.contains("once every 24 hours"));
        assert!(message.ends_with("after 1.50 minutes"));
        assert_eq!(notifier.messages(), vec![(Identity::new("U1"), message)]);
        assert!(audit.records().is_empty());
    }

    #[tokio::test]
    async fn outcome_messages_by_result() {
        let notifier = Arc::new(RecordingNotifier::default());
        let audit = Arc::new(RecordingAudit::default());
        let reporter = reporter(notifier.clone(), audit.clone());

        let success = reporter.report_outcome(&record(TransferResult::success("H1"))).await;
        assert_eq!(success, "tx_hash: `https://explorer.test/transactions/H1`");

        let fee = reporter
            .report_outcome(&record(TransferResult::failure(
                FailureKind::InsufficientFee,
                "insufficient fee; got: 10uatom required: 20uatom",
            )))
            .await;
        assert_eq!(fee, "insufficient fee; got: 10uatom required: 20uatom");

        let network = reporter
            .report_outcome(&record(TransferResult::failure(
                FailureKind::Network,
                "connection refused",
            )))
            .await;
        assert_eq!(network, TRANSPORT_FAILURE_MESSAGE);

        assert_eq!(notifier.messages().len(), 3);
        let tags: Vec<_> = audit.records().iter().map(|r| r.result.tag()).collect();
        assert_eq!(tags, vec!["success", "insufficient_fee", "network_error"]);
    }

    #[tokio::test]
    async fn collaborator_failures_are_swallowed() {
        let notifier = Arc::new(RecordingNotifier::failing());
        let audit = Arc::new(RecordingAudit::failing());
        let reporter = reporter(notifier, audit);

        let message = reporter.report_outcome(&record(TransferResult::success("H9"))).await;
        assert!(message.contains("H9"));
    }
}

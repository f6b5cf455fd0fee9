//! Audit sinks for faucet outcomes.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::{DatabaseConnection, EntityTrait};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::entities::faucet_outcome;
use crate::entities::prelude::FaucetOutcome;
use crate::faucet::{AuditError, AuditSink, OutcomeRecord};

pub struct DatabaseAuditSink {
    database: DatabaseConnection,
    drip_amount: i64,
}

impl DatabaseAuditSink {
    pub fn new(database: DatabaseConnection, drip_amount: u64) -> Self {
        let drip_amount = i64::try_from(drip_amount).unwrap_or(i64::MAX);
        assert!(drip_amount > 0, "Drip amount must be positive");
        Self {
            database,
            drip_amount,
        }
    }
}

#[async_trait]
impl AuditSink for DatabaseAuditSink {
    async fn record_outcome(&self, record: &OutcomeRecord) -> Result<(), AuditError> {
        let amount = if record.result.is_success() {
            self.drip_amount
        } else {
            0
        };
        let row = faucet_outcome::ActiveModel {
            id: NotSet,
            identity: Set(record.identity.to_string()),
            recipient_address: Set(record.target_address.clone()),
            result: Set(record.result.tag().to_string()),
            tx_hash: Set(record.result.tx_hash().map(str::to_string)),
            failure_reason: Set(record.result.failure_reason().map(|f| f.reason.clone())),
            amount: Set(amount),
            created_at: Set(record.recorded_at.fixed_offset()),
        };

        FaucetOutcome::insert(row).exec(&self.database).await?;
        Ok(())
    }
}

/// Semicolon-delimited append-only log, one line per outcome.
pub struct CsvAuditSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        assert!(
            !path.as_os_str().is_empty(),
            "Audit file path must not be empty"
        );
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl AuditSink for CsvAuditSink {
    async fn record_outcome(&self, record: &OutcomeRecord) -> Result<(), AuditError> {
        let line = csv_line(record);
        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        debug!(path = %self.path.display(), "Appended faucet outcome");
        Ok(())
    }
}

fn csv_line(record: &OutcomeRecord) -> String {
    let detail = match (record.result.tx_hash(), record.result.failure_reason()) {
        (Some(hash), _) => hash.to_string(),
        (None, Some(failure)) => csv_field(&failure.reason),
        (None, None) => String::new(),
    };
    format!(
        "{};{};{};{};{}\n",
        csv_field(record.identity.as_str()),
        record.target_address,
        record.result.tag(),
        detail,
        record.recorded_at.format("%Y-%m-%d %H:%M:%S")
    )
}

fn csv_field(value: &str) -> String {
    value.replace([';', '\n', '\r'], " ")
}

/// Writes to every sink; one failing sink does not stop the others.
pub struct CompositeAuditSink {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl CompositeAuditSink {
    pub fn new(sinks: Vec<Arc<dyn AuditSink>>) -> Self {
        Self { sinks }
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl AuditSink for CompositeAuditSink {
    async fn record_outcome(&self, record: &OutcomeRecord) -> Result<(), AuditError> {
        let mut failed = 0;
        for sink in &self.sinks {
            if let Err(err) = sink.record_outcome(record).await {
                warn!(identity = %record.identity, "Audit sink rejected outcome: {err}");
                failed += 1;
            }
        }
        if failed > 0 {
            return Err(AuditError::Partial {
                failed,
                total: self.sinks.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::faucet::testing::RecordingAudit;
    use crate::faucet::{FailureKind, Identity, TransferResult};

    fn record(result: TransferResult) -> OutcomeRecord {
        OutcomeRecord {
            identity: Identity::new("1234"),
            target_address: "cosmos1abc".to_string(),
            result,
            recorded_at: Utc.with_ymd_and_hms(2026, 10, 16, 8, 30, 5).unwrap(),
        }
    }

    #[test]
    fn csv_lines_carry_tag_and_timestamp() {
        assert_eq!(
            csv_line(&record(TransferResult::success("ABCD"))),
            "1234;cosmos1abc;success;ABCD;2026-10-16 08:30:05\n"
        );
        assert_eq!(
            csv_line(&record(TransferResult::failure(
                FailureKind::InsufficientFee,
                "insufficient fee; required: 20uatom"
            ))),
            "1234;cosmos1abc;insufficient_fee;insufficient fee  required: 20uatom;2026-10-16 08:30:05\n"
        );
    }

    #[test]
    fn csv_identity_cannot_shift_columns() {
        let mut outcome = record(TransferResult::success("ABCD"));
        outcome.identity = Identity::new("discord;42\nx");
        let line = csv_line(&outcome);
        assert_eq!(line, "discord 42 x;cosmos1abc;success;ABCD;2026-10-16 08:30:05\n");
        assert_eq!(line.matches(';').count(), 4);
    }

    #[tokio::test]
    async fn csv_sink_appends() {
        let path = std::env::temp_dir().join(format!(
            "faucet-audit-{}-{}.csv",
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let sink = CsvAuditSink::new(&path);
        sink.record_outcome(&record(TransferResult::success("AA")))
            .await
            .unwrap();
        sink.record_outcome(&record(TransferResult::failure(FailureKind::Network, "refused")))
            .await
            .unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("1234;cosmos1abc;network_error;refused;"));
        tokio::fs::remove_file(&path).await.ok();
    }

    #[tokio::test]
    async fn composite_reaches_every_sink() {
        let healthy = Arc::new(RecordingAudit::default());
        let broken = Arc::new(RecordingAudit::failing());
        let composite = CompositeAuditSink::new(vec![
            broken.clone() as Arc<dyn AuditSink>,
            healthy.clone() as Arc<dyn AuditSink>,
        ]);

        let err = composite
            .record_outcome(&record(TransferResult::success("AA")))
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::Partial { failed: 1, total: 2 }));
        assert_eq!(healthy.records().len(), 1);
    }
}

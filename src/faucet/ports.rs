use async_trait::async_trait;

use super::error::{AuditError, NotifyError};
use super::types::{Identity, OutcomeRecord, TransferResult};

/// Funded transfer to an address. Failures come back as structured results;
/// retry policy, if any, lives behind this trait.
#[async_trait]
pub trait TransferService: Send + Sync {
    async fn submit_transfer(&self, address: &str) -> TransferResult;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, identity: &Identity, message: &str) -> Result<(), NotifyError>;
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record_outcome(&self, record: &OutcomeRecord) -> Result<(), AuditError>;
}

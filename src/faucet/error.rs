use super::types::Identity;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("cooldown entry already present for identity {identity}")]
    DuplicateEntry { identity: Identity },
    #[error("no cooldown entry tracked for identity {identity}")]
    UnknownIdentity { identity: Identity },
}

#[derive(Debug, thiserror::Error)]
pub enum FaucetError {
    #[error("cooldown ledger invariant broken: {0}")]
    Ledger(#[from] LedgerError),
    #[error("dispatch task for {identity} aborted: {message}")]
    DispatchAborted { identity: Identity, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification channel unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("audit file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{failed} of {total} audit sinks rejected the record")]
    Partial { failed: usize, total: usize },
}

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque requester key. Two events with equal identities share one cooldown.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        assert!(!value.is_empty(), "Identity must not be empty");
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single inbound "request funds" event handed over by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEvent {
    pub identity: Identity,
    pub target_address: String,
    pub received_at: DateTime<Utc>,
}

impl RequestEvent {
    pub fn new(identity: Identity, target_address: impl Into<String>, received_at: DateTime<Utc>) -> Self {
        Self {
            identity,
            target_address: target_address.into(),
            received_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CooldownEntry {
    pub identity: Identity,
    pub target_address: String,
    pub next_eligible_at: DateTime<Utc>,
    pub in_flight: bool,
    /// Admission counter value; completions carrying an older value are ignored.
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InsufficientFee,
    InsufficientFunds,
    Network,
    Node,
    Timeout,
}

impl FailureKind {
    /// Policy-level rejections carry a reason the requester can act on.
    pub fn is_policy_rejection(self) -> bool {
        matches!(self, Self::InsufficientFee | Self::InsufficientFunds)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::InsufficientFee => "insufficient_fee",
            Self::InsufficientFunds => "insufficient_funds",
            Self::Network => "network_error",
            Self::Node => "node_error",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferFailure {
    pub kind: FailureKind,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransferResult {
    Success { tx_hash: String },
    Failure(TransferFailure),
}

impl TransferResult {
    pub fn success(tx_hash: impl Into<String>) -> Self {
        let tx_hash = tx_hash.into();
        assert!(!tx_hash.is_empty(), "Successful transfer must carry a tx hash");
        Self::Success { tx_hash }
    }

    pub fn failure(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self::Failure(TransferFailure {
            kind,
            reason: reason.into(),
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn tx_hash(&self) -> Option<&str> {
        match self {
            Self::Success { tx_hash } => Some(tx_hash),
            Self::Failure(_) => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&TransferFailure> {
        match self {
            Self::Success { .. } => None,
            Self::Failure(failure) => Some(failure),
        }
    }

    /// Short tag stored alongside audit rows.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Failure(failure) => failure.kind.as_str(),
        }
    }
}

/// Append-only audit value produced for every dispatch attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeRecord {
    pub identity: Identity,
    pub target_address: String,
    pub result: TransferResult,
    pub recorded_at: DateTime<Utc>,
}

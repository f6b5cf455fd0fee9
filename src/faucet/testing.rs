//! In-memory collaborators for engine tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use super::error::{AuditError, NotifyError};
use super::ports::{AuditSink, Notifier, TransferService};
use super::types::{Identity, OutcomeRecord, RequestEvent, TransferResult};

pub fn event_now(identity: &str, address: &str) -> RequestEvent {
    RequestEvent::new(Identity::new(identity), address, Utc::now())
}

enum Behaviour {
    Always(TransferResult),
    Delayed(TransferResult, Duration),
    Hang,
    Panic,
}

pub struct ScriptedTransfer {
    behaviour: Behaviour,
    calls: AtomicUsize,
}

impl ScriptedTransfer {
    pub fn always(result: TransferResult) -> Self {
        Self::with(Behaviour::Always(result))
    }

    pub fn delayed(result: TransferResult, delay: Duration) -> Self {
        Self::with(Behaviour::Delayed(result, delay))
    }

    pub fn hanging() -> Self {
        Self::with(Behaviour::Hang)
    }

    pub fn panicking() -> Self {
        Self::with(Behaviour::Panic)
    }

    fn with(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransferService for ScriptedTransfer {
    async fn submit_transfer(&self, _address: &str) -> TransferResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behaviour {
            Behaviour::Always(result) => result.clone(),
            Behaviour::Delayed(result, delay) => {
                tokio::time::sleep(*delay).await;
                result.clone()
            }
            Behaviour::Hang => std::future::pending::<TransferResult>().await,
            Behaviour::Panic => panic!("transfer backend crashed"),
        }
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(Identity, String)>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::default(),
            fail: true,
        }
    }

    pub fn messages(&self) -> Vec<(Identity, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, identity: &Identity, message: &str) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Unavailable("gateway offline".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((identity.clone(), message.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingAudit {
    pub records: Mutex<Vec<OutcomeRecord>>,
    pub fail: bool,
}

impl RecordingAudit {
    pub fn failing() -> Self {
        Self {
            records: Mutex::default(),
            fail: true,
        }
    }

    pub fn records(&self) -> Vec<OutcomeRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditSink for RecordingAudit {
    async fn record_outcome(&self, record: &OutcomeRecord) -> Result<(), AuditError> {
        if self.fail {
            return Err(AuditError::Io(std::io::Error::other("disk full")));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

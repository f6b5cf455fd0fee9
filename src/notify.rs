use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::Serialize;
use tracing::info;

use crate::config::NotificationConfig;
use crate::faucet::{Identity, Notifier, NotifyError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationView {
    pub identity: Identity,
    pub message: String,
    pub delivered_at: DateTime<Utc>,
}

/// Keeps the latest message per identity for the gateway to pick up.
pub struct NotificationMailbox {
    latest: Cache<String, Arc<NotificationView>>,
}

impl NotificationMailbox {
    pub fn new(config: &NotificationConfig) -> Self {
        assert!(
            config.max_capacity >= 100,
            "Notification mailbox capacity threshold"
        );
        let latest = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(Duration::from_secs(config.ttl_seconds))
            .build();
        Self { latest }
    }

    pub async fn latest(&self, identity: &Identity) -> Option<Arc<NotificationView>> {
        self.latest.get(identity.as_str()).await
    }

    pub fn entry_count(&self) -> u64 {
        self.latest.entry_count()
    }
}

#[async_trait]
impl Notifier for NotificationMailbox {
    async fn notify(&self, identity: &Identity, message: &str) -> Result<(), NotifyError> {
        info!(identity = %identity, "{message}");
        let view = NotificationView {
            identity: identity.clone(),
            message: message.to_string(),
            delivered_at: Utc::now(),
        };
        self.latest
            .insert(identity.as_str().to_string(), Arc::new(view))
            .await;
        Ok(())
    }
}

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use jsonrpsee::core::client::{ClientT, Error as ClientError};
use jsonrpsee::core::params::ObjectParams;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use serde::Deserialize;

use crate::faucet::{FailureKind, TransferResult, TransferService};

const TX_HASH_BYTES: usize = 32;

/// Shared JSON-RPC client for the chain node. Clones share one connection pool.
#[derive(Clone)]
pub struct RpcClient {
    inner: HttpClient,
    drip: DripSettings,
}

#[derive(Debug, Clone)]
pub struct DripSettings {
    pub amount: u64,
    pub denomination: String,
}

impl RpcClient {
    pub fn new(endpoint: &str, timeout: Duration, drip: DripSettings) -> Result<Self> {
        assert!(!endpoint.is_empty(), "RPC endpoint must be provided");
        assert!(
            timeout >= Duration::from_millis(100),
            "Timeout below 100ms is unsafe"
        );
        assert!(drip.amount > 0, "Drip amount must be positive");

        let client = HttpClientBuilder::default()
            .request_timeout(timeout)
            .build(endpoint)
            .with_context(|| format!("Failed to build RPC client for {endpoint}"))?;

        Ok(Self {
            inner: client,
            drip,
        })
    }

    pub async fn faucet_drip(&self, address: &str) -> Result<DripResponse, ClientError> {
        assert!(!address.is_empty(), "Recipient address must be provided");
        let mut params = ObjectParams::new();
        params.insert("recipient", address)?;
        params.insert("amount", self.drip.amount)?;
        params.insert("denom", &self.drip.denomination)?;

        self.inner.request("faucet_drip", params).await
    }
}

#[async_trait]
impl TransferService for RpcClient {
    async fn submit_transfer(&self, address: &str) -> TransferResult {
        match self.faucet_drip(address).await {
            Ok(response) => classify_drip_response(response),
            Err(err) => classify_client_error(&err),
        }
    }
}

/// Broadcast result as reported by the node. A non-zero `code` means the
/// transaction was rejected and `raw_log` explains why.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DripResponse {
    #[serde(default, alias = "txhash")]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub raw_log: Option<String>,
}

pub fn classify_drip_response(response: DripResponse) -> TransferResult {
    let code = response.code.unwrap_or(0);
    if code != 0 {
        let reason = response
            .raw_log
            .filter(|log| !log.is_empty())
            .unwrap_or_else(|| format!("transaction rejected with code {code}"));
        return TransferResult::failure(classify_reason(&reason), reason);
    }

    match response.tx_hash {
        Some(hash) if is_tx_hash(&hash) => TransferResult::success(hash.to_ascii_uppercase()),
        Some(hash) => TransferResult::failure(
            FailureKind::Node,
            format!("node returned malformed tx hash {hash:?}"),
        ),
        None => TransferResult::failure(FailureKind::Node, "node response carried no tx hash"),
    }
}

pub fn classify_client_error(err: &ClientError) -> TransferResult {
    match err {
        ClientError::Call(call) => {
            TransferResult::failure(classify_reason(call.message()), call.message().to_string())
        }
        ClientError::RequestTimeout => {
            TransferResult::failure(FailureKind::Timeout, "node request timed out")
        }
        ClientError::Transport(inner) => {
            TransferResult::failure(FailureKind::Network, inner.to_string())
        }
        other => TransferResult::failure(FailureKind::Node, other.to_string()),
    }
}

pub fn classify_reason(reason: &str) -> FailureKind {
    let lowered = reason.to_ascii_lowercase();
    if lowered.contains("insufficient fee") {
        FailureKind::InsufficientFee
    } else if lowered.contains("insufficient funds") {
        FailureKind::InsufficientFunds
    } else {
        FailureKind::Node
    }
}

fn is_tx_hash(value: &str) -> bool {
    matches!(hex::decode(value), Ok(bytes) if bytes.len() == TX_HASH_BYTES)
}

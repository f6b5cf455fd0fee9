//! Faucet HTTP handlers: the gateway in front of the admission engine.
//!
//! - `POST /drip` turns a request into a [`RequestEvent`] and runs it
//! - `GET /check/{identity}` peeks at the cooldown without mutating it
//! - `GET /status` reports the engine snapshot
//! - `GET /history` lists audit rows (database deployments only)
//! - `GET /notifications/{identity}` returns the last message for a requester
//!
//! The requester identity is the peer IP unless a trusted gateway header is
//! configured, in which case the header is mandatory.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::address::sanitize_identity;
use crate::entities::faucet_outcome;
use crate::entities::prelude::FaucetOutcome;
use crate::faucet::{Eligibility, Identity, Rejection, RequestEvent, RequestOutcome, TransferResult};
use crate::notify::NotificationView;
use crate::state::AppState;

use super::HttpError;

/// Maximum requests to return in history
pub const MAX_HISTORY_LIMIT: u64 = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/drip", post(request_drip))
        .route("/status", get(get_status))
        .route("/history", get(get_history))
        .route("/check/{identity}", get(check_eligibility))
        .route("/notifications/{identity}", get(get_notification))
}

/// Request body for faucet drip
#[derive(Debug, Deserialize)]
pub struct FaucetDripRequest {
    /// Recipient wallet address
    pub address: String,
}

/// Response from faucet drip, for admitted and rejected requests alike
#[derive(Debug, Serialize, Deserialize)]
pub struct FaucetDripResponse {
    pub success: bool,
    pub identity: String,
    pub recipient: String,
    pub tx_hash: Option<String>,
    pub failure: Option<String>,
    pub amount: u64,
    pub denomination: String,
    pub message: String,
    pub next_eligible_at: Option<DateTime<Utc>>,
    pub wait_seconds: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FaucetStatusResponse {
    pub faucet_address: String,
    pub drip_amount: u64,
    pub denomination: String,
    pub cooldown_seconds: u64,
    pub address_uniqueness: bool,
    pub tracked_identities: usize,
    pub in_flight: usize,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EligibilityResponse {
    pub identity: String,
    pub eligible: bool,
    pub in_flight: bool,
    pub next_eligible_at: Option<DateTime<Utc>>,
    pub wait_seconds: Option<u64>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct FaucetHistoryEntry {
    pub identity: String,
    pub recipient: String,
    pub result: String,
    pub tx_hash: Option<String>,
    pub failure_reason: Option<String>,
    pub amount: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Default)]
pub struct HistoryQuery {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub address: Option<String>,
    pub identity: Option<String>,
}

async fn request_drip(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<FaucetDripRequest>,
) -> Result<(StatusCode, Json<FaucetDripResponse>), HttpError> {
    let profile = &state.profile;
    let address = profile
        .address_rules
        .sanitize(&request.address)
        .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;
    let identity = resolve_identity(&state, &headers, peer)?;

    let event = RequestEvent::new(identity.clone(), address.clone(), Utc::now());
    let outcome = state.engine.handle_request(event).await.map_err(|err| {
        error!(identity = %identity, "Faucet engine failure: {err}");
        HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    })?;

    let mut response = FaucetDripResponse {
        success: false,
        identity: identity.to_string(),
        recipient: address,
        tx_hash: None,
        failure: None,
        amount: 0,
        denomination: profile.denomination.clone(),
        message: String::new(),
        next_eligible_at: None,
        wait_seconds: None,
    };

    let status = match outcome {
        RequestOutcome::Rejected { rejection, message } => {
            response.message = message;
            response.failure = Some(rejection_tag(&rejection).to_string());
            response.wait_seconds = match rejection {
                Rejection::CooldownActive { remaining }
                | Rejection::AddressReserved { remaining } => Some(remaining.as_secs()),
                Rejection::InFlight => None,
            };
            StatusCode::TOO_MANY_REQUESTS
        }
        RequestOutcome::Completed {
            record,
            message,
            next_eligible_at,
        } => {
            response.message = message;
            match record.result {
                TransferResult::Success { tx_hash } => {
                    response.success = true;
                    response.amount = profile.drip_amount;
                    response.tx_hash = Some(tx_hash);
                    response.next_eligible_at = Some(next_eligible_at);
                    StatusCode::OK
                }
                TransferResult::Failure(failure) => {
                    response.failure = Some(failure.kind.as_str().to_string());
                    StatusCode::BAD_GATEWAY
                }
            }
        }
    };

    Ok((status, Json(response)))
}

async fn get_status(State(state): State<AppState>) -> Json<FaucetStatusResponse> {
    let snapshot = state.engine.admission().snapshot();
    let profile = &state.profile;
    Json(FaucetStatusResponse {
        faucet_address: profile.faucet_address.clone(),
        drip_amount: profile.drip_amount,
        denomination: profile.denomination.clone(),
        cooldown_seconds: profile.cooldown.as_secs(),
        address_uniqueness: profile.address_uniqueness,
        tracked_identities: snapshot.tracked,
        in_flight: snapshot.in_flight,
        status: "operational".to_string(),
    })
}

async fn check_eligibility(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<Json<EligibilityResponse>, HttpError> {
    let identity = sanitize_identity(&identity)
        .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;

    let response = match state.engine.admission().peek(&identity, Utc::now()) {
        Eligibility::Eligible => EligibilityResponse {
            identity: identity.to_string(),
            eligible: true,
            in_flight: false,
            next_eligible_at: None,
            wait_seconds: None,
            message: "You are eligible to request tokens".to_string(),
        },
        Eligibility::CoolingDown {
            remaining,
            next_eligible_at,
        } => {
            let wait_seconds = remaining.as_secs();
            EligibilityResponse {
                identity: identity.to_string(),
                eligible: false,
                in_flight: false,
                next_eligible_at: Some(next_eligible_at),
                wait_seconds: Some(wait_seconds),
                message: format!(
                    "Please wait {}h {}m before requesting again",
                    wait_seconds / 3600,
                    (wait_seconds % 3600) / 60
                ),
            }
        }
        Eligibility::InFlight => EligibilityResponse {
            identity: identity.to_string(),
            eligible: false,
            in_flight: true,
            next_eligible_at: None,
            wait_seconds: None,
            message: "A request is still being processed".to_string(),
        },
    };
    Ok(Json(response))
}

async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<FaucetHistoryEntry>>, HttpError> {
    let database = state.database.as_ref().ok_or_else(|| {
        HttpError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "Faucet history requires a database".to_string(),
        )
    })?;
    let limit = query.limit.unwrap_or(20).min(MAX_HISTORY_LIMIT);
    let offset = query.offset.unwrap_or(0);

    let mut select = FaucetOutcome::find();
    if let Some(address) = query.address {
        select = select.filter(faucet_outcome::Column::RecipientAddress.eq(address.to_ascii_lowercase()));
    }
    if let Some(identity) = query.identity {
        select = select.filter(faucet_outcome::Column::Identity.eq(identity.trim().to_string()));
    }

    let rows = select
        .order_by_desc(faucet_outcome::Column::CreatedAt)
        .limit(limit)
        .offset(offset)
        .all(database)
        .await
        .map_err(|e| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let entries = rows
        .into_iter()
        .map(|row| FaucetHistoryEntry {
            identity: row.identity,
            recipient: row.recipient_address,
            result: row.result,
            tx_hash: row.tx_hash,
            failure_reason: row.failure_reason,
            amount: u64::try_from(row.amount).unwrap_or_default(),
            created_at: row.created_at.with_timezone(&Utc),
        })
        .collect();

    Ok(Json(entries))
}

async fn get_notification(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<Json<NotificationView>, HttpError> {
    let identity = sanitize_identity(&identity)
        .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;
    let view = state.mailbox.latest(&identity).await.ok_or_else(|| {
        HttpError::new(
            StatusCode::NOT_FOUND,
            format!("No notifications for {identity}"),
        )
    })?;
    Ok(Json((*view).clone()))
}

fn resolve_identity(
    state: &AppState,
    headers: &HeaderMap,
    peer: SocketAddr,
) -> Result<Identity, HttpError> {
    let Some(header) = state.profile.identity_header.as_deref() else {
        return Ok(Identity::new(peer.ip().to_string()));
    };
    let value = headers
        .get(header)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            HttpError::new(
                StatusCode::BAD_REQUEST,
                format!("Missing requester identity header {header}"),
            )
        })?;
    sanitize_identity(value).map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))
}

fn rejection_tag(rejection: &Rejection) -> &'static str {
    match rejection {
        Rejection::CooldownActive { .. } => "cooldown_active",
        Rejection::InFlight => "in_flight",
        Rejection::AddressReserved { .. } => "address_reserved",
    }
}

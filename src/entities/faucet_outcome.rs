//! Audit rows written for every faucet dispatch attempt.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "faucet_outcomes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Requester identity as seen by the gateway
    #[sea_orm(column_type = "String(StringLen::N(128))")]
    pub identity: String,
    /// Recipient wallet address
    #[sea_orm(column_type = "String(StringLen::N(128))")]
    pub recipient_address: String,
    /// Result tag: `success` or a failure kind
    #[sea_orm(column_type = "String(StringLen::N(32))")]
    pub result: String,
    /// Transaction hash when the transfer went through
    #[sea_orm(column_type = "String(StringLen::N(128))", nullable)]
    pub tx_hash: Option<String>,
    /// Failure detail reported by the node or the dispatcher
    #[sea_orm(column_type = "Text", nullable)]
    pub failure_reason: Option<String>,
    /// Amount of tokens sent (in base units)
    pub amount: i64,
    /// Timestamp of the outcome
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

use std::sync::Arc;
use std::time::{Duration, Instant};

use sea_orm::DatabaseConnection;

use crate::address::AddressRules;
use crate::config::FaucetServiceConfig;
use crate::faucet::FaucetEngine;
use crate::notify::NotificationMailbox;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<FaucetEngine>,
    pub mailbox: Arc<NotificationMailbox>,
    pub database: Option<DatabaseConnection>,
    pub profile: Arc<FaucetProfile>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        engine: Arc<FaucetEngine>,
        mailbox: Arc<NotificationMailbox>,
        database: Option<DatabaseConnection>,
        profile: FaucetProfile,
    ) -> Self {
        assert!(
            profile.cooldown > Duration::ZERO,
            "Cooldown must be configured"
        );
        Self {
            engine,
            mailbox,
            database,
            profile: Arc::new(profile),
            start_time: Instant::now(),
        }
    }
}

/// Static faucet facts the HTTP surface reports and validates against.
#[derive(Debug, Clone)]
pub struct FaucetProfile {
    pub faucet_address: String,
    pub drip_amount: u64,
    pub denomination: String,
    pub cooldown: Duration,
    pub address_uniqueness: bool,
    pub address_rules: AddressRules,
    /// Lower-cased header name carrying a trusted requester identity.
    pub identity_header: Option<String>,
    pub rpc_timeout: Duration,
}

impl FaucetProfile {
    pub fn from_config(config: &FaucetServiceConfig) -> Self {
        Self {
            faucet_address: config.chain.faucet_address.clone(),
            drip_amount: config.chain.drip_amount,
            denomination: config.chain.denomination.clone(),
            cooldown: config.faucet.cooldown(),
            address_uniqueness: config.faucet.address_uniqueness,
            address_rules: AddressRules::new(&config.chain.bech32_hrp, config.chain.address_length),
            identity_header: config.gateway.identity_header.clone(),
            rpc_timeout: config.chain.request_timeout(),
        }
    }
}

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::TimeDelta;
use config::{Config, ConfigError, File, FileFormat};
use serde::Deserialize;

use crate::faucet::{AdmissionPolicy, DispatchPolicy};

#[derive(Debug, Clone, Deserialize)]
pub struct FaucetServiceConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    pub chain: ChainConfig,
    pub faucet: FaucetConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

impl FaucetServiceConfig {
    pub fn load() -> Result<Self> {
        let configured_path =
            std::env::var("FAUCET_CONFIG").unwrap_or_else(|_| "config/faucet.toml".to_string());
        assert!(
            !configured_path.is_empty(),
            "Configuration path must be non-empty"
        );
        assert!(
            configured_path.len() < 4096,
            "Configuration path length exceeds hard limit"
        );

        let mut builder = Config::builder()
            .add_source(File::new(&configured_path, FileFormat::Toml).required(true));

        if let Ok(env_override) = std::env::var("FAUCET_ENV") {
            if !env_override.is_empty() {
                let env_file = format!("config/faucet.{}.toml", env_override);
                if Path::new(&env_file).exists() {
                    builder = builder.add_source(File::new(&env_file, FileFormat::Toml));
                }
            }
        }

        let settings = builder
            .build()
            .map_err(|err| map_config_error(err, &configured_path))?;
        Self::from_settings(settings)
    }

    fn from_settings(settings: Config) -> Result<Self> {
        let mut config: Self = settings
            .try_deserialize()
            .context("Failed to deserialize faucet configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&mut self) -> Result<()> {
        assert!(
            self.server.port > 0,
            "Server port must be greater than zero"
        );
        if let Some(database) = &self.database {
            assert!(!database.url.is_empty(), "Database URL must be specified");
            assert!(
                database.max_connections >= database.min_connections.unwrap_or(1),
                "Max connections must be >= min connections"
            );
        }
        self.chain.ensure_bounds()?;
        self.faucet.ensure_bounds()?;
        self.notifications.ensure_bounds()?;
        if let Some(header) = &self.gateway.identity_header {
            assert!(!header.trim().is_empty(), "Identity header name must not be blank");
            self.gateway.identity_header = Some(header.trim().to_ascii_lowercase());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: Option<IpAddr>,
    pub port: u16,
}

impl ServerConfig {
    pub fn address(&self) -> SocketAddr {
        let host = self.host.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert!(self.port != 0, "HTTP port cannot be zero");
        assert!(self.port < 65535, "HTTP port must be below 65535");
        SocketAddr::new(host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub request_timeout_ms: Option<u64>,
    pub bech32_hrp: String,
    pub address_length: usize,
    pub drip_amount: u64,
    pub denomination: String,
    pub faucet_address: String,
    #[serde(default)]
    pub explorer_url: Option<String>,
}

impl ChainConfig {
    pub fn request_timeout(&self) -> Duration {
        let millis = self.request_timeout_ms.unwrap_or(3_000);
        assert!(millis >= 100, "RPC timeout must be at least 100ms");
        assert!(millis <= 60_000, "RPC timeout cannot exceed 60 seconds");
        Duration::from_millis(millis)
    }

    /// Explorer prefix that a tx hash is appended to.
    pub fn explorer_tx_prefix(&self) -> Option<String> {
        self.explorer_url
            .as_deref()
            .map(|url| url.trim().trim_end_matches('/'))
            .filter(|url| !url.is_empty())
            .map(|url| format!("{url}/transactions/"))
    }

    fn ensure_bounds(&self) -> Result<()> {
        assert!(!self.rpc_url.is_empty(), "RPC endpoint must be specified");
        assert!(!self.bech32_hrp.is_empty(), "Bech32 prefix must be specified");
        assert!(
            self.address_length > self.bech32_hrp.len(),
            "Address length must exceed the bech32 prefix"
        );
        assert!(self.address_length <= 128, "Address length exceeds defensive limit");
        assert!(self.drip_amount > 0, "Drip amount must be positive");
        assert!(!self.denomination.is_empty(), "Denomination must be specified");
        assert!(!self.faucet_address.is_empty(), "Faucet address must be specified");
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FaucetConfig {
    #[serde(alias = "request_timeout")]
    pub cooldown_seconds: u64,
    #[serde(default = "FaucetConfig::default_max_dispatch_ms")]
    pub max_dispatch_ms: u64,
    #[serde(default)]
    pub address_uniqueness: bool,
    #[serde(default)]
    pub penalize_failures: bool,
    #[serde(default = "FaucetConfig::default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

impl FaucetConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }

    pub fn admission_policy(&self) -> AdmissionPolicy {
        AdmissionPolicy {
            cooldown: TimeDelta::seconds(self.cooldown_seconds as i64),
            address_uniqueness: self.address_uniqueness,
        }
    }

    pub fn dispatch_policy(&self) -> DispatchPolicy {
        DispatchPolicy {
            max_duration: Duration::from_millis(self.max_dispatch_ms),
            penalize_failures: self.penalize_failures,
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        assert!(
            self.sweep_interval_ms >= 1_000,
            "Sweep interval must be >= 1 second"
        );
        Duration::from_millis(self.sweep_interval_ms)
    }

    fn ensure_bounds(&self) -> Result<()> {
        assert!(self.cooldown_seconds > 0, "Cooldown must be positive");
        assert!(
            self.cooldown_seconds <= 30 * 86_400,
            "Cooldown cannot exceed 30 days"
        );
        assert!(
            self.max_dispatch_ms >= 1_000,
            "Dispatch bound must be at least one second"
        );
        assert!(
            self.max_dispatch_ms <= 600_000,
            "Dispatch bound cannot exceed ten minutes"
        );
        assert!(
            self.sweep_interval_ms >= 1_000,
            "Sweep interval must be >= 1 second"
        );
        Ok(())
    }

    const fn default_max_dispatch_ms() -> u64 {
        60_000
    }

    const fn default_sweep_interval_ms() -> u64 {
        300_000
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    /// Header carrying the requester identity from a trusted gateway. Without
    /// it the peer IP is the identity.
    #[serde(default)]
    pub identity_header: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditConfig {
    #[serde(default)]
    pub csv_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    pub max_capacity: u64,
    pub ttl_seconds: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            ttl_seconds: 86_400,
        }
    }
}

impl NotificationConfig {
    fn ensure_bounds(&self) -> Result<()> {
        assert!(
            self.max_capacity >= 100,
            "Notification mailbox capacity must be at least 100"
        );
        assert!(
            self.ttl_seconds <= 7 * 86_400,
            "Notification TTL cannot exceed one week"
        );
        Ok(())
    }
}

fn map_config_error(err: ConfigError, path: &str) -> ConfigError {
    match err {
        ConfigError::NotFound(_) => ConfigError::NotFound(path.to_string()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [server]
        port = 8088

        [chain]
        rpc_url = "http://127.0.0.1:26657"
        bech32_hrp = "cosmos"
        address_length = 45
        drip_amount = 10000000
        denomination = "uatom"
        faucet_address = "cosmos1faucet"
        explorer_url = "https://explorer.test/"

        [faucet]
        request_timeout = 86400
        address_uniqueness = true
    "#;

    fn parse(source: &str) -> Result<FaucetServiceConfig> {
        let settings = Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?;
        FaucetServiceConfig::from_settings(settings)
    }

    #[test]
    fn sample_config_uses_defaults() {
        let config = parse(SAMPLE).expect("sample config parses");
        assert!(config.database.is_none());
        assert_eq!(config.faucet.cooldown(), Duration::from_secs(86_400));
        assert_eq!(config.faucet.max_dispatch_ms, 60_000);
        assert!(config.faucet.address_uniqueness);
        assert!(!config.faucet.penalize_failures);
        assert_eq!(config.notifications.max_capacity, 10_000);
        assert_eq!(
            config.chain.explorer_tx_prefix().as_deref(),
            Some("https://explorer.test/transactions/")
        );
        assert_eq!(
            config.faucet.admission_policy().cooldown,
            TimeDelta::seconds(86_400)
        );
    }

    #[test]
    fn identity_header_is_normalized() {
        let source = format!("{SAMPLE}\n[gateway]\nidentity_header = \" X-Faucet-Identity \"\n");
        let config = parse(&source).expect("config parses");
        assert_eq!(
            config.gateway.identity_header.as_deref(),
            Some("x-faucet-identity")
        );
    }

    #[test]
    #[should_panic(expected = "Cooldown must be positive")]
    fn zero_cooldown_is_rejected() {
        let source = SAMPLE.replace("request_timeout = 86400", "cooldown_seconds = 0");
        let _ = parse(&source);
    }
}

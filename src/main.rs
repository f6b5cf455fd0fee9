mod address;
mod audit;
mod config;
mod entities;
mod faucet;
mod http;
mod notify;
mod rpc;
mod state;
mod sweeper;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::audit::{CompositeAuditSink, CsvAuditSink, DatabaseAuditSink};
use crate::config::FaucetServiceConfig;
use crate::faucet::{
    AdmissionController, AuditSink, DispatchCoordinator, FaucetEngine, MessageSettings,
    OutcomeReporter,
};
use crate::notify::NotificationMailbox;
use crate::rpc::{DripSettings, RpcClient};
use crate::state::{AppState, FaucetProfile};
use crate::sweeper::CooldownSweeper;
use anyhow::{Context, Result};
use axum::Router;
use migration::MigratorTrait;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const FALLBACK_AUDIT_PATH: &str = "faucet_audit.csv";

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = FaucetServiceConfig::load().context("Failed to load configuration")?;
    let database = match &config.database {
        Some(_) => {
            let database = connect_database(&config).await?;
            run_migrations(&database).await?;
            Some(database)
        }
        None => {
            warn!("No database configured; faucet history endpoint is disabled");
            None
        }
    };

    let rpc_client = RpcClient::new(
        &config.chain.rpc_url,
        config.chain.request_timeout(),
        DripSettings {
            amount: config.chain.drip_amount,
            denomination: config.chain.denomination.clone(),
        },
    )
    .context("Failed to initialize RPC client")?;

    let admission = Arc::new(AdmissionController::new(config.faucet.admission_policy()));
    let dispatcher = DispatchCoordinator::new(
        Arc::clone(&admission),
        Arc::new(rpc_client),
        config.faucet.dispatch_policy(),
    );
    let mailbox = Arc::new(NotificationMailbox::new(&config.notifications));
    let reporter = OutcomeReporter::new(
        mailbox.clone(),
        build_audit_sink(&config, database.clone()),
        MessageSettings {
            cooldown: config.faucet.cooldown(),
            explorer_url: config.chain.explorer_tx_prefix(),
        },
    );
    let engine = Arc::new(FaucetEngine::new(
        Arc::clone(&admission),
        dispatcher,
        reporter,
    ));
    let app_state = AppState::new(
        engine,
        mailbox,
        database,
        FaucetProfile::from_config(&config),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = CooldownSweeper::new(admission, config.faucet.sweep_interval());
    let sweeper_handle = tokio::spawn(sweeper.run(shutdown_rx));

    let listener = TcpListener::bind(config.server.address())
        .await
        .context("Failed to bind HTTP listener")?;
    let local_addr = listener
        .local_addr()
        .context("Failed to obtain listener address")?;
    info!(
        cooldown_secs = config.faucet.cooldown().as_secs(),
        drip_amount = config.chain.drip_amount,
        "Faucet listening on {local_addr}"
    );

    let router: Router = http::router(app_state);
    let server = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    );
    server
        .with_graceful_shutdown(shutdown_signal(shutdown_tx.clone()))
        .await
        .context("HTTP server exited with error")?;

    shutdown_tx.send(true).ok();
    if let Err(join_err) = sweeper_handle.await {
        error!("Sweeper task join error: {join_err}");
    }

    Ok(())
}

fn init_tracing() {
    let default_filter = "info";
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());
    assert!(!filter.is_empty(), "Tracing filter must not be empty");
    assert!(filter.len() < 256, "Tracing filter length exceeds bounds");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .compact()
        .init();
}

fn build_audit_sink(
    config: &FaucetServiceConfig,
    database: Option<DatabaseConnection>,
) -> Arc<dyn AuditSink> {
    let mut sinks: Vec<Arc<dyn AuditSink>> = Vec::new();
    if let Some(database) = database {
        sinks.push(Arc::new(DatabaseAuditSink::new(
            database,
            config.chain.drip_amount,
        )));
    }
    if let Some(path) = &config.audit.csv_path {
        sinks.push(Arc::new(CsvAuditSink::new(path)));
    }
    if sinks.is_empty() {
        warn!("No audit sink configured; appending outcomes to {FALLBACK_AUDIT_PATH}");
        sinks.push(Arc::new(CsvAuditSink::new(FALLBACK_AUDIT_PATH)));
    }

    let composite = CompositeAuditSink::new(sinks);
    assert!(!composite.is_empty(), "At least one audit sink is required");
    Arc::new(composite)
}

async fn connect_database(config: &FaucetServiceConfig) -> Result<DatabaseConnection> {
    let database = config
        .database
        .as_ref()
        .context("Database configuration missing")?;
    let mut options = ConnectOptions::new(database.url.clone());
    options
        .max_connections(database.max_connections)
        .sqlx_logging(true)
        .sqlx_logging_level(tracing::log::LevelFilter::Debug)
        .acquire_timeout(Duration::from_secs(10));

    if let Some(min) = database.min_connections {
        options.min_connections(min);
    }

    assert!(
        database.max_connections <= 128,
        "Connection pool oversized"
    );

    Database::connect(options)
        .await
        .context("Failed to connect to PostgreSQL")
}

async fn run_migrations(database: &DatabaseConnection) -> Result<()> {
    migration::Migrator::up(database, None)
        .await
        .context("Database migrations failed")
}

async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {err}");
        return;
    }
    shutdown_tx.send(true).ok();
    info!("Shutdown signal dispatched");
}

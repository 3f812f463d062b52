//! copytrade: watches a set of tracked wallets on the venue and replicates
//! their trades from the operator's own account, subject to per-wallet
//! filters and a global commitment-based stop-loss.

use anyhow::{Context, Result};
use clap::Parser;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use execution_engine::{detector, Coordinator, Executor, ExecutorConfig};
use policy_engine::{PolicyEngine, StopLossConfig, StopLossGuard};
use venue_core::api::{DataApiClient, PushStream, StreamState, VenueClient};
use venue_core::config::{CredentialConfig, StorageConfig};
use venue_core::types::wallet::PerWalletPolicy;
use venue_core::GlobalConfig;
use wallet_store::{GlobalConfigDoc, InMemoryStorage, Poller, PollerConfig, PostgresStorage, Storage};

#[derive(Parser)]
#[command(name = "copytrade", about = "Copy-trading engine for a prediction-market venue")]
struct Args {
    /// Simulate the full pipeline without submitting orders.
    #[arg(long, conflicts_with = "live")]
    dry_run: bool,

    /// Place real orders through the venue's order-book API.
    #[arg(long, conflicts_with = "dry_run")]
    live: bool,
}

/// Refreshed on a timer from Storage; read synchronously by the Poller and
/// Detector, which can't await a Storage read on every trade.
fn spawn_policy_cache_refresh(
    storage: Arc<dyn Storage>,
    cache: Arc<DashMap<String, PerWalletPolicy>>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match storage.list_wallets().await {
                Ok(wallets) => {
                    cache.clear();
                    for wallet in wallets {
                        cache.insert(wallet.address.to_lowercase(), wallet.policy);
                    }
                }
                Err(e) => warn!(error = %e, "failed to refresh policy cache"),
            }
        }
    })
}

/// Resolves the configured credential down to a plaintext signing key,
/// decrypting it first if it was supplied encrypted-at-rest. Either way,
/// validates the key through `TradingWallet` and logs the resolved
/// operator address before any venue I/O happens.
fn resolve_signing_key(credentials: CredentialConfig) -> Result<CredentialConfig> {
    let signing_key = match credentials {
        CredentialConfig::Plain { signing_key } => signing_key,
        CredentialConfig::Encrypted { ciphertext, passphrase } => {
            info!("decrypting signing key");
            signer_auth::EncryptedSigningKey::from_base64(&ciphertext)
                .context("parsing SIGNING_KEY_ENCRYPTED")?
                .decrypt(passphrase.as_bytes())
                .context("decrypting SIGNING_KEY_ENCRYPTED")?
        }
    };

    let wallet = signer_auth::TradingWallet::from_private_key(&signing_key).context("validating signing key")?;
    info!(operator = %wallet.address_string(), "signing key resolved");

    Ok(CredentialConfig::Plain { signing_key })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if !args.dry_run && !args.live {
        anyhow::bail!("must specify either --dry-run or --live");
    }
    let live_trading = args.live;

    let mut config = GlobalConfig::from_env().context("loading configuration")?;
    config.credentials = resolve_signing_key(config.credentials)?;

    let venue = Arc::new(VenueClient::from_config(&config).await.context("constructing venue client")?);
    let operator_address = format!("{:?}", venue.signer_address);
    info!(operator = %operator_address, mode = if live_trading { "live" } else { "dry-run" }, "starting copytrade engine");

    let storage: Arc<dyn Storage> = match &config.storage {
        StorageConfig::InMemory => Arc::new(InMemoryStorage::new()),
        StorageConfig::Postgres { url } => {
            let pool = sqlx::PgPool::connect(url).await.context("connecting to postgres")?;
            Arc::new(PostgresStorage::new(pool))
        }
    };

    storage
        .save_config(&GlobalConfigDoc {
            default_trade_size_usd: config.default_trade_size_usd,
            poll_interval_ms: config.poll_interval.as_millis() as u64,
            stop_loss_enabled: config.stop_loss.enabled,
            stop_loss_max_commitment_percent: config.stop_loss.max_commitment_pct,
        })
        .await
        .context("persisting startup config")?;

    let policy_cache: Arc<DashMap<String, PerWalletPolicy>> = Arc::new(DashMap::new());
    spawn_policy_cache_refresh(storage.clone(), policy_cache.clone(), config.poll_interval);

    let lookup_cache = policy_cache.clone();
    let policy_lookup: wallet_store::PolicyLookup =
        Arc::new(move |address: &str| lookup_cache.get(&address.to_lowercase()).map(|e| e.value().clone()));

    let poller_data = Arc::new(DataApiClient::new(config.venue.data_api.clone()));
    let poller = Arc::new(Poller::new(
        poller_data,
        PollerConfig { poll_interval: config.poll_interval, ..PollerConfig::default() },
        policy_lookup.clone(),
    ));

    let active_wallets: HashSet<String> =
        storage.list_active().await.context("loading tracked wallets")?.into_iter().map(|w| w.address).collect();
    for wallet in storage.list_wallets().await.context("seeding policy cache")? {
        policy_cache.insert(wallet.address.to_lowercase(), wallet.policy);
    }
    poller.set_wallets(active_wallets.clone()).await;
    poller.start();

    let (push_rx, _stream_state) = match &config.venue.ws_url {
        Some(ws_url) => PushStream::new(ws_url.clone()).start(active_wallets),
        None => {
            warn!("no VENUE_WS_URL configured; running on polling alone");
            let (_tx, rx) = tokio::sync::mpsc::channel(1);
            (rx, tokio::sync::watch::channel(StreamState::Disconnected).1)
        }
    };

    let (detected_tx, detected_rx) = tokio::sync::mpsc::channel(1000);
    detector::spawn(poller.subscribe(), push_rx, policy_lookup, detected_tx);

    let stop_loss = StopLossGuard::new(StopLossConfig {
        enabled: config.stop_loss.enabled,
        max_commitment_percent: config.stop_loss.max_commitment_pct,
    });
    let policy = Arc::new(PolicyEngine::new(
        storage.clone(),
        venue.clone(),
        stop_loss,
        config.default_trade_size_usd,
        operator_address,
    ));
    let executor = Arc::new(Executor::new(venue.clone(), ExecutorConfig { live_trading }));

    let coordinator = Arc::new(Coordinator::new(storage.clone(), policy, executor));
    coordinator.initialize(24 * 7).await.context("initializing coordinator")?;
    coordinator.mark_running().await;

    let run_handle = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.run(detected_rx).await })
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
        result = run_handle => {
            if let Err(e) = result {
                error!(error = %e, "coordinator pipeline task panicked");
            }
        }
    }

    poller.stop().await;
    coordinator.stop().await;
    info!("shutdown complete");
    Ok(())
}

//! Randomness Beacon Node
//!
//! Runs one beacon instance behind a JSON-RPC endpoint. The beacon stays
//! idle until a client calls `setup`; after that it produces a round every
//! interval until stopped. State is persisted to disk and production
//! resumes on restart without a new setup.

use anyhow::Result;
use beacon_rpc::{HttpNotifier, HttpRpcServer, RpcContext};
use beacon_runtime::{BeaconService, LocalRoundProtocol, PersistentStore, SledLedger, StoragePolicy};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;

use config::{NodeConfig, StorageKind};

/// Randomness beacon node
#[derive(Parser, Debug)]
#[command(name = "beacon-node")]
#[command(about = "Distributed public-randomness beacon", long_about = None)]
struct Args {
    /// JSON config file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// HTTP RPC bind address
    #[arg(long)]
    rpc_addr: Option<String>,

    /// Data directory for persistent state
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Storage policy for published rounds
    #[arg(long, value_enum)]
    storage: Option<StorageKind>,

    /// Round timeout unit in milliseconds (a round gets 2 x members units)
    #[arg(long)]
    round_timeout_unit_ms: Option<u64>,

    /// How long setup waits for the first round, in seconds
    #[arg(long)]
    ready_timeout_secs: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply(self, config: &mut NodeConfig) {
        if let Some(rpc_addr) = self.rpc_addr {
            config.rpc_addr = rpc_addr;
        }
        if let Some(data_dir) = self.data_dir {
            config.data_dir = data_dir;
        }
        if let Some(storage) = self.storage {
            config.storage = storage;
        }
        if let Some(unit) = self.round_timeout_unit_ms {
            config.round_timeout_unit_ms = unit;
        }
        if let Some(secs) = self.ready_timeout_secs {
            config.ready_timeout_secs = secs;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if self.verbose {
            config.log_level = "debug".to_string();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => NodeConfig::load(path)?,
        None => NodeConfig::default(),
    };
    args.apply(&mut config);

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    run(config).await
}

async fn run(config: NodeConfig) -> Result<()> {
    tracing::info!("Starting randomness beacon node");
    tracing::info!("  HTTP RPC: {}", config.rpc_addr);
    tracing::info!("  Storage: {:?}", config.storage);
    tracing::info!("  Round timeout unit: {}ms", config.round_timeout_unit_ms);
    tracing::info!("  Data directory: {:?}", config.data_dir);

    std::fs::create_dir_all(&config.data_dir)?;
    let persistent_store = Arc::new(PersistentStore::open(&config.data_dir)?);

    let policy = match config.storage {
        StorageKind::Ledger => StoragePolicy::Ledger(Arc::new(SledLedger::open(&persistent_store)?)),
        StorageKind::Memory => StoragePolicy::InMemory,
    };

    let service = BeaconService::builder(Arc::new(LocalRoundProtocol::new()))
        .storage_policy(policy)
        .notifier(Arc::new(HttpNotifier::new()?))
        .persistent_store(persistent_store.clone())
        .config(config.beacon_config())
        .build();

    match service.load().await {
        Ok(true) => tracing::info!("Resumed round production from persisted state"),
        Ok(false) => tracing::info!("Waiting for setup"),
        Err(e) => tracing::error!("Couldn't restore beacon state, waiting for setup: {}", e),
    }

    // Start HTTP RPC server
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let http_context = Arc::new(RpcContext::new(service.clone()));
    let http_addr = config.rpc_addr.clone();
    let http_server = tokio::spawn(async move {
        let server = HttpRpcServer::new(http_context);
        let stopped = async move {
            let _ = stop_rx.await;
        };
        if let Err(e) = server.run(&http_addr, stopped).await {
            tracing::error!("HTTP RPC server error: {}", e);
        }
    });

    tracing::info!("Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down...");
    service.shutdown().await;

    let _ = stop_tx.send(());
    if let Err(e) = http_server.await {
        tracing::error!("HTTP RPC server task failed: {}", e);
    }

    if let Err(e) = persistent_store.flush() {
        tracing::error!("Failed to flush persistent store: {}", e);
    }

    tracing::info!("Beacon node stopped");
    Ok(())
}

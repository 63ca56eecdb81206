//! Flash-Loan DEX Arbitrage Bot
//!
//! Main entry point. Loads the TOML config and `.env` secrets, connects to
//! the first healthy RPC endpoint, verifies the receiver contract, then
//! hands control to the scan loop until SIGINT/SIGTERM.
//!
//! Usage:
//!   flasharb-bot --config config/flasharb.toml [--dry-run] [--once] [--log-json]
//!
//! Author: AI-Generated
//! Created: 2026-02-10

use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use clap::Parser;
use flasharb_bot::config::{BotConfig, Secrets, DEFAULT_CONFIG_PATH};
use flasharb_bot::rpc::{AlloyConnector, GasOracle};
use flasharb_bot::{Session, StopSignal, Supervisor};
use futures::StreamExt;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Flash-loan arbitrage across constant-product and concentrated-liquidity DEXes
#[derive(Parser)]
#[command(name = "flasharb-bot")]
struct Args {
    /// TOML config file
    #[arg(short, long, env = "FLASHARB_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Build and log transactions without sending them (overrides config)
    #[arg(long)]
    dry_run: bool,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        fmt().json().with_env_filter(filter).with_target(false).init();
    } else {
        fmt().with_env_filter(filter).with_target(false).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_json);

    info!("===========================================");
    info!("   Flash-Loan DEX Arbitrage Bot");
    info!("===========================================");

    let config = BotConfig::load(&args.config)?;
    let mut settings = config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", args.config.display()))?;
    if args.dry_run {
        settings.execution.dry_run = true;
    }
    info!("Configuration loaded from {} (chain_id: {})", args.config.display(), settings.chain_id);
    info!(
        "Borrow {} | targets: {} | venues: {} | receiver {:?} ({:?})",
        settings.borrowed.symbol,
        settings
            .targets
            .iter()
            .map(|t| t.symbol.as_str())
            .collect::<Vec<_>>()
            .join(","),
        settings.venues.iter().map(|v| v.name()).collect::<Vec<_>>().join(","),
        settings.receiver,
        settings.shape
    );

    let secrets = Secrets::from_env()?;
    let signer: PrivateKeySigner = secrets
        .private_key
        .trim()
        .trim_start_matches("0x")
        .parse()
        .context("PRIVATE_KEY is not a valid hex key")?;
    info!("Wallet: {:?}", signer.address());

    let gas_oracle = GasOracle::new(
        settings.gas_oracle_url.clone(),
        secrets.gas_oracle_api_key.clone(),
        settings.gas_speed,
        settings.rpc_timeout,
    );
    let connector = Arc::new(AlloyConnector::new(signer, settings.chain_id, settings.rpc_timeout));
    let session = Session::open(Arc::new(settings), connector).await?;

    let stop = StopSignal::new();
    let mut signals = Signals::new([SIGINT, SIGTERM]).context("Failed to install signal handlers")?;
    let handle = signals.handle();
    let on_signal = stop.clone();
    let signal_task = tokio::spawn(async move {
        if let Some(sig) = signals.next().await {
            warn!("Received signal {} - finishing current step and stopping", sig);
            on_signal.trigger();
        }
    });

    let mut supervisor = Supervisor::new(session, gas_oracle, stop);
    let result = supervisor.run(args.once).await;

    handle.close();
    signal_task.abort();
    result
}

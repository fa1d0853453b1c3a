use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use solana_sdk::signer::Signer;
use tokio::{signal, sync::watch};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use raydium_swapper::{
    builder::SwapDirection, PoolKeyRegistry, PoolSource, RpcLedger, SwapDetailReporter,
    SwapPlan, SwapScheduler, SwapTransactionBuilder, SwapperConfig, WalletBook,
};

#[derive(Parser, Debug)]
#[command(name = "raydium-swapper")]
#[command(about = "Unattended token swaps against Raydium AMM pools")]
struct Args {
    /// Path to swapper configuration file
    #[arg(short, long, default_value = "swapper.toml")]
    config: String,

    /// Token to sell (input of an `in` swap)
    #[arg(long = "tokenAAddress")]
    token_a_address: Option<String>,

    /// Token to receive
    #[arg(long = "tokenBAddress")]
    token_b_address: Option<String>,

    /// Decimal token amount, input or output depending on direction
    #[arg(long)]
    amount: Option<String>,

    /// Whether the amount is the exact input or the desired output
    #[arg(long)]
    direction: Option<SwapDirection>,

    /// Wallet number from the configured wallet map
    #[arg(long = "walletNumber")]
    wallet_number: Option<u8>,

    /// Keep swapping random amounts until interrupted
    #[arg(long = "loop")]
    run_loop: bool,

    /// Simulate instead of broadcasting
    #[arg(long)]
    simulate: bool,

    /// RPC URL for Solana cluster
    #[arg(long = "rpc-url", env = "RPC_URL")]
    rpc_url: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    info!("Starting Raydium swapper");

    let config = load_config(&args)?;
    info!("RPC URL: {}", config.rpc_url);
    if config.execute_swap {
        info!("Execute mode: swaps are broadcast");
    } else {
        warn!("Simulation mode: no transaction will be broadcast");
    }

    let wallets = WalletBook::from_config(&config.wallets)?;
    let wallet_number = args.wallet_number.unwrap_or(config.default_wallet);
    let payer = Arc::new(wallets.load_keypair(wallet_number)?);
    info!("Wallet {}: {}", wallet_number, payer.pubkey());

    let source = PoolSource::parse(&config.liquidity_source);
    let registry = Arc::new(PoolKeyRegistry::load(&source).await?);

    let reporter = SwapDetailReporter::new(&config.report_path);
    if config.execute_swap {
        reporter.reset()?;
    }

    let ledger = Arc::new(RpcLedger::new(config.rpc_url.clone()));
    let builder =
        SwapTransactionBuilder::new(payer, config.slippage_tolerance(), config.fees.clone());
    let mut scheduler = SwapScheduler::new(
        registry,
        ledger,
        builder,
        reporter,
        SwapPlan::from_config(&config),
        config.retry.clone(),
        config.schedule.clone(),
    );

    if !config.schedule.enabled {
        let amount = config.swap.amount()?;
        scheduler.run_logged(amount).await?;
        return Ok(());
    }

    info!(
        "Loop mode: amounts {}..={}, pauses {}s..={}s",
        config.schedule.min_amount,
        config.schedule.max_amount,
        config.schedule.min_interval_secs,
        config.schedule.max_interval_secs
    );

    let (stop_tx, mut stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl-C, finishing current cycle");
                let _ = stop_tx.send(true);
            }
            Err(e) => {
                error!("Unable to listen for shutdown signal: {}", e);
                // Keep the sender alive so the loop is not stopped
                std::future::pending::<()>().await;
                drop(stop_tx);
            }
        }
    });
    let shutdown = async move {
        let _ = stop_rx.wait_for(|stop| *stop).await;
    };

    let stats = scheduler.run_until(shutdown, &mut rand::thread_rng()).await;
    info!(
        "Stopped after {} cycles ({} succeeded, {} failed)",
        stats.cycles, stats.succeeded, stats.failed
    );
    Ok(())
}

/// Load the file, apply CLI overrides, then validate once
fn load_config(args: &Args) -> Result<SwapperConfig> {
    let mut config = if std::path::Path::new(&args.config).exists() {
        SwapperConfig::load(&args.config)?
    } else {
        warn!("Config file {} not found, using defaults", args.config);
        SwapperConfig::default()
    };

    if let Some(rpc_url) = &args.rpc_url {
        config.rpc_url = rpc_url.clone();
    }
    if let Some(token_a) = &args.token_a_address {
        config.swap.token_a = token_a.clone();
    }
    if let Some(token_b) = &args.token_b_address {
        config.swap.token_b = token_b.clone();
    }
    if let Some(amount) = &args.amount {
        config.swap.amount = amount.clone();
    }
    if let Some(direction) = args.direction {
        config.swap.direction = direction;
    }
    if args.run_loop {
        config.schedule.enabled = true;
    }
    if args.simulate {
        config.execute_swap = false;
    }

    config
        .validate()
        .with_context(|| format!("Invalid configuration ({})", args.config))?;
    Ok(config)
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!("raydium_swapper={},raydium_swap_math={}", level, level).into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

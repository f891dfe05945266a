/*
[INPUT]:  CLI arguments, YAML configuration file, OS shutdown signals
[OUTPUT]: A running scalping engine with graceful shutdown
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, startup flow, or shutdown handling
*/

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::rolling;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

mod cli;

use bybit_scalp_adapter::{BybitClient, ClientConfig, Credentials};
use bybit_scalp_strategy::{
    EngineCommand, Exchange, LiveExchange, ScalpConfig, ScalpEngine,
};

const REPORT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(
    name = "bybit-scalp",
    version,
    about = "Maker-based scalping engine for Bybit v5"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(short, long, value_name = "LEVEL", default_value = "info")]
    log_level: String,
    #[arg(long)]
    dry_run: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Interactively scaffold a configuration file
    Init {
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    if let Some(Commands::Init { output }) = args.command {
        init_tracing(&args.log_level)?;
        return cli::init::run_init(output);
    }

    init_tracing(&args.log_level)?;

    let config_path = args
        .config
        .context("--config is required unless running `init`")?;
    let config = load_config(&config_path)?;
    config.validate().context("invalid configuration")?;
    log_session_config(&config);

    if args.dry_run {
        info!("dry-run requested; configuration validated");
        return Ok(());
    }

    let client = build_client(&config)?;
    probe_wallet(&client).await;

    let exchange: Arc<dyn Exchange> = Arc::new(LiveExchange::new(
        client,
        config.category,
        config.symbol.clone(),
    ));

    let engine = ScalpEngine::new(config)?;
    let (command_tx, command_rx) = mpsc::channel(8);
    let (snapshot_tx, snapshot_rx) = watch::channel(engine.snapshot());

    let shutdown = CancellationToken::new();
    setup_signal_handlers(shutdown.clone());

    info!("starting engine");
    let engine_task = tokio::spawn(engine.run(exchange, command_rx, snapshot_tx, shutdown.clone()));

    command_tx
        .send(EngineCommand::Start)
        .await
        .context("engine command channel closed")?;

    let mut report = tokio::time::interval(REPORT_INTERVAL);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = report.tick() => {
                let snapshot = snapshot_rx.borrow().clone();
                info!(
                    state = ?snapshot.state,
                    waiting = snapshot.waiting_for_market_sell,
                    open_buys = snapshot.open_buys.len(),
                    open_tps = snapshot.open_tps.len(),
                    buys_filled = snapshot.stats.buys_filled,
                    sells_filled = snapshot.stats.sells_filled,
                    realized_pnl = %snapshot.stats.realized_pnl,
                    estimated_profit = %snapshot.estimated_profit,
                    "status"
                );
            }
        }
    }
    info!("shutdown signal received");

    engine_task
        .await
        .context("join engine task")?
        .context("engine run failed")?;

    let snapshot = snapshot_rx.borrow().clone();
    info!(
        buys_filled = snapshot.stats.buys_filled,
        sells_filled = snapshot.stats.sells_filled,
        buys_canceled = snapshot.stats.buys_canceled,
        sells_canceled = snapshot.stats.sells_canceled,
        realized_pnl = %snapshot.stats.realized_pnl,
        "session summary"
    );

    Ok(())
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    let log_dir = std::env::current_dir()
        .context("resolve current directory")?
        .join("logs");
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("create log directory {}", log_dir.display()))?;
    let file_appender = rolling::daily(&log_dir, "bybit-scalp.log");
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_filter(filter.clone());
    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_filter(filter);
    tracing_subscriber::registry()
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}

fn load_config(path: &Path) -> Result<ScalpConfig> {
    let path_str = path.to_str().context("config path must be valid utf-8")?;
    ScalpConfig::from_file(path_str).context("load config")
}

fn build_client(config: &ScalpConfig) -> Result<BybitClient> {
    let mut client = match &config.base_url {
        Some(base_url) => BybitClient::with_config_and_base_url(ClientConfig::default(), base_url),
        None => BybitClient::new(),
    }
    .map_err(|err| anyhow!("create BybitClient failed: {err}"))?;

    client.set_credentials(Credentials {
        api_key: config.credentials.api_key.clone(),
        api_secret: config.credentials.api_secret.clone(),
    });

    Ok(client)
}

async fn probe_wallet(client: &BybitClient) {
    match client.wallet_balance("UNIFIED").await {
        Ok(Some(account)) => info!(
            account_type = %account.account_type,
            total_equity = %account.total_equity,
            "wallet balance"
        ),
        Ok(None) => warn!("wallet balance query returned no accounts"),
        Err(err) => warn!(error = %err, "wallet balance query failed"),
    }
}

fn log_session_config(config: &ScalpConfig) {
    info!(
        symbol = %config.symbol,
        category = ?config.category,
        tick_size = %config.tick_size,
        order_qty = %config.order_qty,
        max_buy_orders = config.max_buy_orders,
        offset_ticks = config.offset_ticks,
        layer_step_ticks = config.layer_step_ticks,
        buy_ttl_secs = config.buy_ttl_secs,
        reprice_ticks = config.reprice_ticks,
        tp_ticks = config.tp_ticks,
        max_tp_orders = config.max_tp_orders,
        loop_interval_ms = config.loop_interval_ms,
        wait_after_buy_fill_ms = config.wait_after_buy_fill_ms,
        sell_all_on_stop = config.sell_all_on_stop,
        "session configuration"
    );
}

fn setup_signal_handlers(shutdown: CancellationToken) {
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install SIGINT handler");
            return;
        }
        info!("received SIGINT");
        shutdown_clone.cancel();
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let shutdown_clone = shutdown.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("received SIGTERM");
                    shutdown_clone.cancel();
                }
                Err(err) => {
                    warn!(error = %err, "failed to install SIGTERM handler");
                }
            }
        });
    }
}

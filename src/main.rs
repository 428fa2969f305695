//! Hedged volume farming bot for USDT-margined perpetual futures.
//!
//! Opens offsetting LONG/SHORT positions on one account (or one leg on each of
//! two accounts), holds them briefly, closes, and repeats until the
//! cumulative loss cap is reached or the operator stops it.

mod api;
mod config;
mod error;
mod models;
mod trading;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::api::AsterClient;
use crate::config::{mask, Settings};
use crate::trading::{
    AccountSession, CycleEngine, DualAccountCoordinator, PositionSizer, Termination, ThreadRandom,
    TradingConfig, TradingMode, VolumeCycle,
};

/// Hedged volume farming CLI.
#[derive(Parser)]
#[command(name = "hedgefarm")]
#[command(about = "Generate futures volume with hedged positions under a loss cap", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configured mode until the loss cap, an error, or Ctrl+C
    Run,

    /// Show the effective configuration
    Config,

    /// Show available USDT and open positions per account
    Balance,

    /// Close every open position on the symbol
    Close,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Run => run(&cli.settings).await?,
        Commands::Config => show_config(&cli.settings),
        Commands::Balance => show_balances(&cli.settings).await?,
        Commands::Close => close_positions(&cli.settings).await?,
    }

    Ok(())
}

async fn run(settings: &Settings) -> Result<()> {
    let config = settings.trading_config()?;
    let mut sessions = build_sessions(settings, &config)?.into_iter();

    println!("\n=== Hedged Volume Farming ===");
    println!("Mode:      {}", config.mode);
    println!("Symbol:    {}", config.symbol);
    println!("Leverage:  {}x", config.leverage);
    println!("Max Loss:  {} USDT", config.risk.max_loss_usdt);
    match config.mode {
        TradingMode::Dual => {
            println!("Deviation: {}%", config.dual.max_position_deviation_percent);
            println!("Hold Time: {}", config.dual.hold_time);
        }
        _ => println!("Close:     {}", config.close_time),
    }
    println!("Delay:     {}", config.risk.cycle_delay);
    println!("\nPress Ctrl+C to stop.\n");

    let report = match config.mode {
        TradingMode::SinglePair | TradingMode::Volume => {
            let session = sessions.next().context("no account configured")?;
            let cycle = VolumeCycle::new(session, &config, Box::new(ThreadRandom::new()));
            let mut engine = CycleEngine::new(cycle, config.risk.clone(), Box::new(ThreadRandom::new()));
            if config.mode == TradingMode::SinglePair {
                engine = engine.with_max_cycles(1);
            }
            engine.run(shutdown_signal()).await
        }
        TradingMode::Dual => {
            let a = sessions.next().context("first account missing")?;
            let b = sessions.next().context("second account missing")?;
            let coordinator = DualAccountCoordinator::new(a, b, &config, Box::new(ThreadRandom::new()));
            CycleEngine::new(coordinator, config.risk.clone(), Box::new(ThreadRandom::new()))
                .run(shutdown_signal())
                .await
        }
    };

    println!("\n{}", report);

    if let Termination::Aborted(e) = report.termination {
        return Err(e).context("trading stopped on error");
    }
    Ok(())
}

fn show_config(settings: &Settings) {
    println!("\n=== API ===\n");
    println!("  Base URL:           {}", settings.base_url);
    println!("  API Key:            {}", mask(settings.api_key.as_deref()));
    println!("  API Key 2:          {}", mask(settings.api_key2.as_deref()));
    println!("  Timeout:            {}s", settings.request_timeout);
    println!("  Retries:            {} (delay {}s)", settings.retry_attempts, settings.retry_delay);

    let config = match settings.trading_config() {
        Ok(config) => config,
        Err(e) => {
            println!("\nInvalid configuration: {}", e);
            return;
        }
    };

    println!("\n=== Trading ===\n");
    println!("  Mode:               {}", config.mode);
    println!("  Symbol:             {}", config.symbol);
    println!("  Leverage:           {}x", config.leverage);
    println!("  Balance Used:       {}%", config.balance_percentage);
    println!("  Liquidity Mult.:    {}", config.liquidity_multiplier);
    println!("  Hedge Mode:         {}", config.hedge_mode);

    println!("\n=== Risk ===\n");
    println!("  Max Loss:           {} USDT", config.risk.max_loss_usdt);
    println!("  Cycle Delay:        {}", config.risk.cycle_delay);
    println!("  Close Time:         {}", config.close_time);
    println!("  Max Deviation:      {}%", config.dual.max_position_deviation_percent);
    println!("  Dual Hold Time:     {}", config.dual.hold_time);
}

async fn show_balances(settings: &Settings) -> Result<()> {
    let config = settings.trading_config()?;
    let sessions = build_sessions(settings, &config)?;

    for session in &sessions {
        let balance = session.usdt_balance().await?;
        let positions = session.position_details(&config.symbol).await?;

        println!("\n=== {} ===", session.label());
        println!("Available: {:.4} USDT", balance);

        if positions.is_empty() {
            println!("No open positions on {}", config.symbol);
            continue;
        }

        println!("\n{:<6} {:>14} {:>14} {:>12} {:>12}", "SIDE", "AMOUNT", "ENTRY", "PNL", "MARGIN");
        println!("{}", "-".repeat(62));
        for p in &positions {
            println!(
                "{:<6} {:>14} {:>14} {:>12.4} {:>12.4}",
                p.side, p.amount, p.entry_price, p.unrealized_pnl, p.margin
            );
        }
    }

    Ok(())
}

async fn close_positions(settings: &Settings) -> Result<()> {
    let config = settings.trading_config()?;
    let sessions = build_sessions(settings, &config)?;

    for session in &sessions {
        let closed = session
            .close_all(&config.symbol)
            .await
            .with_context(|| format!("closing positions on {}", session.label()))?;
        println!("{}: closed {} position(s) on {}", session.label(), closed, config.symbol);
    }

    Ok(())
}

/// One session per account the mode trades on, each with its own client.
fn build_sessions(settings: &Settings, config: &TradingConfig) -> Result<Vec<AccountSession>> {
    let client_settings = settings.client_settings();

    settings
        .credentials(config.mode)?
        .iter()
        .enumerate()
        .map(|(i, credentials)| -> Result<AccountSession> {
            let client = AsterClient::new(credentials, &client_settings)
                .with_context(|| format!("building client for account {}", i + 1))?;
            Ok(AccountSession::new(
                format!("Account {}", i + 1),
                Arc::new(client),
                PositionSizer::from_config(config),
                Box::new(ThreadRandom::new()),
            ))
        })
        .collect()
}

/// Resolves on Ctrl+C. Never resolves if the handler cannot be installed.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Ctrl+C received"),
        Err(e) => {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}

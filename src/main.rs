//! Scalper Core - Command line entry point
//!
//! Evaluates single trades, runs paper tests and hosts a trading session.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use scalper_core::config::load_config;
use scalper_core::{
    Direction, PaperTestThresholds, ProfitEngine, TokioScheduler, TradeContext, TradingSession,
    WatchdogHandler,
};

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate whether a trade may close at the current price
    Evaluate {
        #[arg(long)]
        venue: String,
        #[arg(long)]
        direction: Direction,
        #[arg(long)]
        entry: Decimal,
        #[arg(long)]
        current: Decimal,
        /// Position size in quote currency
        #[arg(long)]
        size: Decimal,
        /// Minimum net profit; defaults to profit.min_profit_threshold
        #[arg(long)]
        min_profit: Option<Decimal>,
    },
    /// Price at which a close nets the target profit after fees
    MinExit {
        #[arg(long)]
        venue: String,
        #[arg(long)]
        direction: Direction,
        #[arg(long)]
        entry: Decimal,
        #[arg(long)]
        size: Decimal,
        #[arg(long, default_value = "0")]
        target: Decimal,
    },
    /// Validate signal thresholds against a synthetic price series
    PaperTest {
        #[arg(long, default_value_t = 50)]
        trades: usize,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        min_score: Option<f64>,
        #[arg(long)]
        min_confluence: Option<u32>,
        #[arg(long)]
        min_volume_ratio: Option<f64>,
        #[arg(long)]
        target_hit_rate: Option<f64>,
    },
    /// Run a trading session until Ctrl-C
    Run {
        /// Comma-separated module names to register with the watchdog
        #[arg(long, default_value = "pair-scanner,ai-analyzer,order-executor")]
        modules: String,
    },
}

/// Logs watchdog callbacks; real module restarts belong to the embedding bot
struct LoggingHandler;

impl WatchdogHandler for LoggingHandler {
    fn on_restart(&self, module: &str, restart_count: u32) {
        warn!(module = module, restart_count = restart_count, "Restart requested");
    }

    fn on_connection_lost(&self, venue: &str, reconnect_attempts: u32) {
        warn!(venue = venue, attempts = reconnect_attempts, "Reconnect requested");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();
    let config = load_config(Some(&args.config))?;

    // Initialize logging
    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.settings.log_level.clone());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Configuration file: {}", args.config);

    let engine =
        ProfitEngine::new(config.fees.clone()).with_fee_margin(config.profit.fee_margin);

    match args.command {
        Command::Evaluate {
            venue,
            direction,
            entry,
            current,
            size,
            min_profit,
        } => {
            let ctx = TradeContext::new(venue, direction, entry, current, size)
                .with_min_profit(min_profit.unwrap_or(config.profit.min_profit_threshold));
            let verdict = engine.evaluate(&ctx);
            println!("{}", serde_json::to_string_pretty(&verdict)?);
        }
        Command::MinExit {
            venue,
            direction,
            entry,
            size,
            target,
        } => match engine.minimum_exit_price(entry, size, &venue, target, direction) {
            Some(price) => println!("{}", price.round_dp(8)),
            None => anyhow::bail!("no positive exit price reaches a net profit of {target}"),
        },
        Command::PaperTest {
            trades,
            seed,
            min_score,
            min_confluence,
            min_volume_ratio,
            target_hit_rate,
        } => {
            let mut paper = config.paper_test.clone();
            if seed.is_some() {
                paper.seed = seed;
            }
            let defaults = paper.thresholds.clone();
            let thresholds = PaperTestThresholds {
                min_score: min_score.unwrap_or(defaults.min_score),
                min_confluence: min_confluence.unwrap_or(defaults.min_confluence),
                min_volume_ratio: min_volume_ratio.unwrap_or(defaults.min_volume_ratio),
                target_hit_rate: target_hit_rate.unwrap_or(defaults.target_hit_rate),
                ..defaults
            };

            let runner = scalper_core::PaperTestRunner::new(paper, engine);
            let result = runner.run(trades, &thresholds);
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Run { modules } => {
            let venues: Vec<String> = config.sandbox.venues.keys().cloned().collect();
            let mut session = TradingSession::from_config(config, Arc::new(LoggingHandler))?;

            for module in modules.split(',').map(str::trim).filter(|m| !m.is_empty()) {
                session.watchdog().register_module(module);
            }
            for venue in &venues {
                session.watchdog().register_connection(venue);
            }

            session.start(&TokioScheduler);
            info!("Session running, press Ctrl-C to stop");

            tokio::signal::ctrl_c().await?;
            info!("Received shutdown signal, cleaning up...");

            session.stop().await;
            let status = session.watchdog().get_status();
            info!(overall = %status.overall_health, "Final watchdog status");
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}

//! Configuration types

use std::collections::HashMap;
use std::path::PathBuf;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::profit::{FeeSchedule, DEFAULT_FEE_MARGIN};
use crate::sandbox::PaperTestThresholds;
use crate::telemetry::ExecutionThresholds;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Per-venue maker/taker fees
    #[serde(default)]
    pub fees: FeeSchedule,
    /// Profit gate settings
    #[serde(default)]
    pub profit: ProfitConfig,
    /// Health watchdog settings
    #[serde(default)]
    pub watchdog: WatchdogConfig,
    /// Simulated venues
    #[serde(default)]
    pub sandbox: SandboxConfig,
    /// Paper-test runner settings
    #[serde(default)]
    pub paper_test: PaperTestConfig,
    /// Execution telemetry alerting
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// General application settings
    #[serde(default)]
    pub settings: AppSettings,
}

/// Profit decision engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfitConfig {
    /// Multiple of round-trip fees a net profit must reach before closing
    #[serde(default = "default_fee_margin")]
    pub fee_margin: Decimal,
    /// Default minimum net profit (quote currency) for a close
    #[serde(default)]
    pub min_profit_threshold: Decimal,
}

impl Default for ProfitConfig {
    fn default() -> Self {
        Self {
            fee_margin: default_fee_margin(),
            min_profit_threshold: Decimal::ZERO,
        }
    }
}

fn default_fee_margin() -> Decimal {
    DEFAULT_FEE_MARGIN
}

/// Health watchdog configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// Period of the health check cycle
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Silence after which a module counts as stalled
    #[serde(default = "default_max_stall_time_ms")]
    pub max_stall_time_ms: u64,
    /// Errors in a row that flip a module to unhealthy
    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,
    /// Reconnect attempts recorded on each connection entry
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Restart ceiling per module (None = retry forever)
    #[serde(default)]
    pub max_restart_attempts: Option<u32>,
    /// Snapshots older than this are discarded on start
    #[serde(default = "default_snapshot_max_age_ms")]
    pub snapshot_max_age_ms: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            max_stall_time_ms: default_max_stall_time_ms(),
            max_consecutive_errors: default_max_consecutive_errors(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            max_restart_attempts: None,
            snapshot_max_age_ms: default_snapshot_max_age_ms(),
        }
    }
}

fn default_heartbeat_interval_ms() -> u64 {
    5_000
}

fn default_max_stall_time_ms() -> u64 {
    15_000
}

fn default_max_consecutive_errors() -> u32 {
    5
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_snapshot_max_age_ms() -> u64 {
    5 * 60 * 1_000
}

/// One simulated venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxVenueConfig {
    /// Starting quote balance
    #[serde(default = "default_initial_balance")]
    pub initial_balance: Decimal,
    /// Leverage applied when computing required margin
    #[serde(default = "default_leverage")]
    pub leverage: Decimal,
}

impl Default for SandboxVenueConfig {
    fn default() -> Self {
        Self {
            initial_balance: default_initial_balance(),
            leverage: default_leverage(),
        }
    }
}

fn default_initial_balance() -> Decimal {
    dec!(10000)
}

fn default_leverage() -> Decimal {
    Decimal::ONE
}

/// Sandbox execution configuration
///
/// Only venues listed here are simulated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxConfig {
    #[serde(default = "default_sandbox_venues")]
    pub venues: HashMap<String, SandboxVenueConfig>,
    /// Lower bound of the slippage band, as a fraction of price
    #[serde(default = "default_min_slippage")]
    pub min_slippage: Decimal,
    /// Upper bound of the slippage band, as a fraction of price
    #[serde(default = "default_max_slippage")]
    pub max_slippage: Decimal,
    /// Fixed RNG seed for reproducible fills
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            venues: default_sandbox_venues(),
            min_slippage: default_min_slippage(),
            max_slippage: default_max_slippage(),
            seed: None,
        }
    }
}

fn default_sandbox_venues() -> HashMap<String, SandboxVenueConfig> {
    HashMap::from([
        ("binance".to_string(), SandboxVenueConfig::default()),
        ("bybit".to_string(), SandboxVenueConfig::default()),
    ])
}

fn default_min_slippage() -> Decimal {
    dec!(0.0001)
}

fn default_max_slippage() -> Decimal {
    dec!(0.0005)
}

/// Paper-test runner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperTestConfig {
    /// Venue whose fees apply to simulated trades
    #[serde(default = "default_paper_venue")]
    pub venue: String,
    /// Starting price of the synthetic series
    #[serde(default = "default_base_price")]
    pub base_price: f64,
    /// Maximum relative move per step of the random walk
    #[serde(default = "default_volatility")]
    pub volatility: f64,
    /// Candles per scored window
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Series length is `num_trades * series_multiplier + window_size`
    #[serde(default = "default_series_multiplier")]
    pub series_multiplier: usize,
    /// Quote notional per simulated trade
    #[serde(default = "default_position_size")]
    pub position_size: Decimal,
    /// Favourable move captured by a winning trade (fraction of price)
    #[serde(default = "default_take_profit_pct")]
    pub take_profit_pct: Decimal,
    /// Quote amount lost by every losing trade
    #[serde(default = "default_fixed_loss")]
    pub fixed_loss: Decimal,
    /// Fixed RNG seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,
    /// Thresholds used when none are given on the command line
    #[serde(default)]
    pub thresholds: PaperTestThresholds,
}

impl Default for PaperTestConfig {
    fn default() -> Self {
        Self {
            venue: default_paper_venue(),
            base_price: default_base_price(),
            volatility: default_volatility(),
            window_size: default_window_size(),
            series_multiplier: default_series_multiplier(),
            position_size: default_position_size(),
            take_profit_pct: default_take_profit_pct(),
            fixed_loss: default_fixed_loss(),
            seed: None,
            thresholds: PaperTestThresholds::default(),
        }
    }
}

fn default_paper_venue() -> String {
    "binance".to_string()
}

fn default_base_price() -> f64 {
    50_000.0
}

fn default_volatility() -> f64 {
    0.002
}

fn default_window_size() -> usize {
    20
}

fn default_series_multiplier() -> usize {
    40
}

fn default_position_size() -> Decimal {
    dec!(100)
}

fn default_take_profit_pct() -> Decimal {
    dec!(0.006)
}

fn default_fixed_loss() -> Decimal {
    dec!(0.35)
}

/// Outbound webhook configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Endpoint receiving alert payloads; alerts stay local when unset
    #[serde(default)]
    pub url: Option<String>,
    /// Forward `slow_total` alerts
    #[serde(default = "default_true")]
    pub on_slow_total: bool,
    /// Forward `slow_phase` alerts
    #[serde(default = "default_true")]
    pub on_slow_phase: bool,
    /// Request timeout in seconds
    #[serde(default = "default_webhook_timeout")]
    pub timeout_seconds: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            on_slow_total: true,
            on_slow_phase: true,
            timeout_seconds: default_webhook_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_webhook_timeout() -> u64 {
    10
}

/// Execution telemetry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Initial thresholds; a persisted copy takes precedence
    #[serde(default)]
    pub thresholds: ExecutionThresholds,
    /// Minimum time between two dispatches with the same cooldown key
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    /// Size of the recent-alert ring buffer
    #[serde(default = "default_max_alerts")]
    pub max_alerts: usize,
    /// Trade ids remembered for de-duplication
    #[serde(default = "default_max_tracked_trades")]
    pub max_tracked_trades: usize,
    #[serde(default)]
    pub webhook: WebhookConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            thresholds: ExecutionThresholds::default(),
            cooldown_ms: default_cooldown_ms(),
            max_alerts: default_max_alerts(),
            max_tracked_trades: default_max_tracked_trades(),
            webhook: WebhookConfig::default(),
        }
    }
}

fn default_cooldown_ms() -> u64 {
    60_000
}

fn default_max_alerts() -> usize {
    50
}

fn default_max_tracked_trades() -> usize {
    1_000
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory holding persisted snapshots and thresholds
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            state_dir: default_state_dir(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("./state")
}

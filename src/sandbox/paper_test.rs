//! Strategy threshold validation over synthetic price paths
//!
//! The runner slides a window over a generated candle series, scores a
//! signal for each window and simulates a trade when the signal clears every
//! threshold. Winning trades are priced through [`ProfitEngine`], so a
//! take-profit that would not survive fees counts as skipped, never as a win.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::common::types::Direction;
use crate::config::PaperTestConfig;
use crate::profit::{ProfitEngine, TradeContext};

/// Number of indicators voting in a signal
pub const INDICATOR_COUNT: u32 = 5;

/// Criteria a signal must clear before a trade is attempted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperTestThresholds {
    /// Minimum signal score (0-100)
    #[serde(default = "default_min_score")]
    pub min_score: f64,
    /// Minimum number of agreeing indicators
    #[serde(default = "default_min_confluence")]
    pub min_confluence: u32,
    /// Minimum last-candle volume relative to the window average
    #[serde(default = "default_min_volume_ratio")]
    pub min_volume_ratio: f64,
    /// Hit rate the run must reach to pass
    #[serde(default = "default_target_hit_rate")]
    pub target_hit_rate: f64,
    /// Minimum net profit (quote) a winning trade must realize
    #[serde(default = "default_min_net_profit")]
    pub min_net_profit: Decimal,
}

impl Default for PaperTestThresholds {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
            min_confluence: default_min_confluence(),
            min_volume_ratio: default_min_volume_ratio(),
            target_hit_rate: default_target_hit_rate(),
            min_net_profit: default_min_net_profit(),
        }
    }
}

fn default_min_score() -> f64 {
    60.0
}

fn default_min_confluence() -> u32 {
    3
}

fn default_min_volume_ratio() -> f64 {
    1.2
}

fn default_target_hit_rate() -> f64 {
    0.55
}

fn default_min_net_profit() -> Decimal {
    dec!(0.1)
}

/// Why a window did not produce a counted trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Score,
    Confluence,
    Volume,
    /// Signal fired and won, but the net profit missed the floor
    NetProfitFloor,
}

impl SkipReason {
    const ALL: [SkipReason; 4] = [
        SkipReason::Score,
        SkipReason::Confluence,
        SkipReason::Volume,
        SkipReason::NetProfitFloor,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Score => write!(f, "score"),
            SkipReason::Confluence => write!(f, "confluence"),
            SkipReason::Volume => write!(f, "volume"),
            SkipReason::NetProfitFloor => write!(f, "net_profit_floor"),
        }
    }
}

/// Skips attributed to one criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureCount {
    pub reason: SkipReason,
    pub count: usize,
}

/// Aggregate of one paper-test run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperTestResult {
    pub passed: bool,
    /// `wins / (wins + losses)`, 0 when nothing traded
    pub hit_rate: f64,
    /// `wins + losses`
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub trades_skipped: usize,
    #[serde(rename = "totalPnL")]
    pub total_pnl: Decimal,
    /// Mean score of executed trades
    pub avg_signal_score: f64,
    /// Mean confluence of executed trades
    pub avg_confluence: f64,
    /// Non-zero skip counts in priority order
    pub failure_breakdown: Vec<FailureCount>,
    /// Always `wins + losses + trades_skipped`
    pub windows_evaluated: usize,
}

/// One synthetic candle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    pub price: f64,
    pub volume: f64,
}

/// Signal scored from one window of candles
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signal {
    pub direction: Direction,
    /// 0-100
    pub score: f64,
    /// Indicators agreeing with `direction`
    pub confluence: u32,
    pub volume_ratio: f64,
    pub win_probability: f64,
}

impl Signal {
    /// First failing criterion in priority order (score, confluence, volume)
    pub fn first_failure(&self, thresholds: &PaperTestThresholds) -> Option<SkipReason> {
        if self.score < thresholds.min_score {
            Some(SkipReason::Score)
        } else if self.confluence < thresholds.min_confluence {
            Some(SkipReason::Confluence)
        } else if self.volume_ratio < thresholds.min_volume_ratio {
            Some(SkipReason::Volume)
        } else {
            None
        }
    }
}

/// Bounded random walk with synthetic volume
///
/// Each step moves the price by at most `volatility` (relative) and never
/// below half of `base_price`. Roughly one candle in ten carries a volume
/// spike.
pub fn generate_price_series<R: Rng>(
    rng: &mut R,
    base_price: f64,
    volatility: f64,
    len: usize,
) -> Vec<Candle> {
    let floor = base_price * 0.5;
    let volatility = volatility.abs();
    let mut price = base_price;
    let mut series = Vec::with_capacity(len);

    for _ in 0..len {
        let step = if volatility > 0.0 {
            rng.gen_range(-volatility..=volatility)
        } else {
            0.0
        };
        price = (price * (1.0 + step)).max(floor);

        let mut volume = 1_000.0 * rng.gen_range(0.5..1.5);
        if rng.gen_bool(0.1) {
            volume *= rng.gen_range(2.0..4.0);
        }
        series.push(Candle { price, volume });
    }
    series
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

fn vote(value: f64, dead_band: f64) -> Option<Direction> {
    if value > dead_band {
        Some(Direction::Long)
    } else if value < -dead_band {
        Some(Direction::Short)
    } else {
        None
    }
}

/// Score a window of candles
///
/// Five indicators vote long, short or abstain: short versus long moving
/// average, window momentum, share of rising candles, last candle direction
/// and position inside the window range. The majority sets the direction.
pub fn score_window(window: &[Candle], volatility: f64) -> Signal {
    let (Some(first), Some(last)) = (window.first(), window.last()) else {
        return Signal {
            direction: Direction::Long,
            score: 0.0,
            confluence: 0,
            volume_ratio: 0.0,
            win_probability: 0.0,
        };
    };

    let dead_band = volatility.abs() * 0.1;
    let fast_len = window.len().min(5);
    let fast = mean(window[window.len() - fast_len..].iter().map(|c| c.price));
    let slow = mean(window.iter().map(|c| c.price));
    let momentum = (last.price - first.price) / first.price;

    let steps = window.len().saturating_sub(1).max(1) as f64;
    let rising = window.windows(2).filter(|w| w[1].price > w[0].price).count() as f64;
    let rising_share = rising / steps - 0.5;

    let last_move = match window.len() {
        n if n >= 2 => (last.price - window[n - 2].price) / window[n - 2].price,
        _ => 0.0,
    };

    let high = window.iter().map(|c| c.price).fold(f64::MIN, f64::max);
    let low = window.iter().map(|c| c.price).fold(f64::MAX, f64::min);
    let range_pos = if high > low {
        (last.price - low) / (high - low) - 0.5
    } else {
        0.0
    };

    let votes = [
        vote((fast - slow) / slow, dead_band),
        vote(momentum, dead_band),
        vote(rising_share, 0.05),
        vote(last_move, dead_band),
        vote(range_pos, 0.1),
    ];
    let longs = votes.iter().filter(|v| **v == Some(Direction::Long)).count() as u32;
    let shorts = votes.iter().filter(|v| **v == Some(Direction::Short)).count() as u32;
    let (direction, confluence) = if shorts > longs {
        (Direction::Short, shorts)
    } else {
        (Direction::Long, longs)
    };

    let avg_volume = mean(window.iter().map(|c| c.volume));
    let volume_ratio = if avg_volume > 0.0 {
        last.volume / avg_volume
    } else {
        0.0
    };

    let expected_move = volatility.abs().max(f64::EPSILON) * steps.sqrt();
    let strength = (momentum.abs() / expected_move).min(1.0);
    let score = (confluence as f64 / INDICATOR_COUNT as f64) * 60.0
        + strength * 25.0
        + (volume_ratio / 2.0).min(1.0) * 15.0;

    let win_probability =
        (0.35 + score / 100.0 * 0.4 + confluence as f64 / INDICATOR_COUNT as f64 * 0.1)
            .clamp(0.05, 0.95);

    Signal {
        direction,
        score,
        confluence,
        volume_ratio,
        win_probability,
    }
}

/// Runs threshold validation against synthetic data
#[derive(Debug, Clone)]
pub struct PaperTestRunner {
    config: PaperTestConfig,
    engine: ProfitEngine,
}

impl PaperTestRunner {
    pub fn new(config: PaperTestConfig, engine: ProfitEngine) -> Self {
        Self { config, engine }
    }

    pub fn config(&self) -> &PaperTestConfig {
        &self.config
    }

    fn rng(&self) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Generate a series sized for `num_trades` and run over it
    #[instrument(skip(self, thresholds), fields(venue = %self.config.venue))]
    pub fn run(&self, num_trades: usize, thresholds: &PaperTestThresholds) -> PaperTestResult {
        let mut rng = self.rng();
        let len = num_trades
            .saturating_mul(self.config.series_multiplier)
            .saturating_add(self.config.window_size);
        let series =
            generate_price_series(&mut rng, self.config.base_price, self.config.volatility, len);
        self.run_on_series(&mut rng, &series, num_trades, thresholds)
    }

    /// Run over a caller-supplied series
    ///
    /// Stops once `wins + losses == num_trades` or the series runs out.
    pub fn run_on_series<R: Rng>(
        &self,
        rng: &mut R,
        series: &[Candle],
        num_trades: usize,
        thresholds: &PaperTestThresholds,
    ) -> PaperTestResult {
        let window_size = self.config.window_size.max(2);
        let mut wins = 0usize;
        let mut losses = 0usize;
        let mut skipped = [0usize; 4];
        let mut total_pnl = Decimal::ZERO;
        let mut score_sum = 0.0;
        let mut confluence_sum = 0.0;
        let mut windows_evaluated = 0usize;

        if series.len() >= window_size {
            for window in series.windows(window_size) {
                if wins + losses >= num_trades {
                    break;
                }
                windows_evaluated += 1;

                let signal = score_window(window, self.config.volatility);
                if let Some(reason) = signal.first_failure(thresholds) {
                    skipped[reason.index()] += 1;
                    continue;
                }

                if rng.gen_bool(signal.win_probability) {
                    match self.winning_net_profit(window, &signal, thresholds) {
                        Some(net) => {
                            wins += 1;
                            total_pnl += net;
                        }
                        None => {
                            skipped[SkipReason::NetProfitFloor.index()] += 1;
                            continue;
                        }
                    }
                } else {
                    losses += 1;
                    total_pnl -= self.config.fixed_loss;
                }
                score_sum += signal.score;
                confluence_sum += signal.confluence as f64;
            }
        }

        let total_trades = wins + losses;
        let hit_rate = if total_trades > 0 {
            wins as f64 / total_trades as f64
        } else {
            0.0
        };
        let (avg_signal_score, avg_confluence) = if total_trades > 0 {
            (
                score_sum / total_trades as f64,
                confluence_sum / total_trades as f64,
            )
        } else {
            (0.0, 0.0)
        };

        let failure_breakdown = SkipReason::ALL
            .iter()
            .filter(|reason| skipped[reason.index()] > 0)
            .map(|&reason| FailureCount {
                reason,
                count: skipped[reason.index()],
            })
            .collect();

        let result = PaperTestResult {
            passed: hit_rate >= thresholds.target_hit_rate,
            hit_rate,
            total_trades,
            wins,
            losses,
            trades_skipped: skipped.iter().sum(),
            total_pnl,
            avg_signal_score,
            avg_confluence,
            failure_breakdown,
            windows_evaluated,
        };

        info!(
            passed = result.passed,
            hit_rate = result.hit_rate,
            wins = result.wins,
            losses = result.losses,
            skipped = result.trades_skipped,
            total_pnl = %result.total_pnl,
            "Paper test finished"
        );
        result
    }

    /// Net profit of a take-profit exit, `None` if the profit gate refuses it
    fn winning_net_profit(
        &self,
        window: &[Candle],
        signal: &Signal,
        thresholds: &PaperTestThresholds,
    ) -> Option<Decimal> {
        let entry = window.last().and_then(|c| Decimal::from_f64(c.price))?;
        let entry = entry.round_dp(8);
        let sign = Decimal::from(signal.direction.sign());
        let exit = entry * (Decimal::ONE + sign * self.config.take_profit_pct);

        let ctx = TradeContext::new(
            self.config.venue.clone(),
            signal.direction,
            entry,
            exit,
            self.config.position_size,
        )
        .with_min_profit(thresholds.min_net_profit);
        let verdict = self.engine.evaluate(&ctx);

        if verdict.should_close {
            Some(verdict.net_profit)
        } else {
            debug!(reason = %verdict.reason_text, "Winning signal reclassified as skipped");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner() -> PaperTestRunner {
        PaperTestRunner::new(
            PaperTestConfig {
                seed: Some(11),
                ..PaperTestConfig::default()
            },
            ProfitEngine::default(),
        )
    }

    fn open_thresholds() -> PaperTestThresholds {
        PaperTestThresholds {
            min_score: 0.0,
            min_confluence: 0,
            min_volume_ratio: 0.0,
            ..PaperTestThresholds::default()
        }
    }

    fn assert_exhaustive(result: &PaperTestResult) {
        assert_eq!(
            result.wins + result.losses + result.trades_skipped,
            result.windows_evaluated
        );
        assert_eq!(
            result.failure_breakdown.iter().map(|f| f.count).sum::<usize>(),
            result.trades_skipped
        );
    }

    #[test]
    fn test_series_respects_floor() {
        let mut rng = StdRng::seed_from_u64(3);
        let series = generate_price_series(&mut rng, 100.0, 0.2, 2_000);
        assert_eq!(series.len(), 2_000);
        assert!(series.iter().all(|c| c.price >= 50.0));
        assert!(series.iter().all(|c| c.volume > 0.0));
    }

    #[test]
    fn test_rising_window_scores_long() {
        let window: Vec<Candle> = (0..20)
            .map(|i| Candle {
                price: 100.0 * (1.0 + 0.002 * i as f64),
                volume: if i == 19 { 3_000.0 } else { 1_000.0 },
            })
            .collect();
        let signal = score_window(&window, 0.002);
        assert_eq!(signal.direction, Direction::Long);
        assert_eq!(signal.confluence, INDICATOR_COUNT);
        assert!(signal.volume_ratio > 2.5);
        assert!(signal.score > 90.0);
        assert!(signal.win_probability <= 0.95);
    }

    #[test]
    fn test_first_failure_priority() {
        let signal = Signal {
            direction: Direction::Long,
            score: 10.0,
            confluence: 1,
            volume_ratio: 0.5,
            win_probability: 0.5,
        };
        let thresholds = PaperTestThresholds::default();
        assert_eq!(signal.first_failure(&thresholds), Some(SkipReason::Score));

        let signal = Signal { score: 80.0, ..signal };
        assert_eq!(signal.first_failure(&thresholds), Some(SkipReason::Confluence));

        let signal = Signal { confluence: 4, ..signal };
        assert_eq!(signal.first_failure(&thresholds), Some(SkipReason::Volume));

        let signal = Signal { volume_ratio: 2.0, ..signal };
        assert_eq!(signal.first_failure(&thresholds), None);
    }

    #[test]
    fn test_outcomes_are_exhaustive() {
        let result = runner().run(30, &PaperTestThresholds::default());
        assert_exhaustive(&result);
        assert!(result.total_trades <= 30);
    }

    #[test]
    fn test_impossible_score_skips_everything() {
        let thresholds = PaperTestThresholds {
            min_score: 101.0,
            ..PaperTestThresholds::default()
        };
        let result = runner().run(5, &thresholds);
        assert_eq!(result.total_trades, 0);
        assert!(!result.passed);
        assert_eq!(result.hit_rate, 0.0);
        assert_eq!(
            result.failure_breakdown,
            vec![FailureCount {
                reason: SkipReason::Score,
                count: result.windows_evaluated,
            }]
        );
        assert_exhaustive(&result);
    }

    #[test]
    fn test_stops_at_requested_trades() {
        let result = runner().run(10, &open_thresholds());
        assert_eq!(result.total_trades, 10);
        assert_eq!(result.trades_skipped, 0);
        assert_eq!(result.windows_evaluated, 10);
        assert!(result.avg_confluence <= INDICATOR_COUNT as f64);
    }

    #[test]
    fn test_unreachable_floor_reclassifies_wins() {
        let thresholds = PaperTestThresholds {
            min_net_profit: dec!(1000),
            ..open_thresholds()
        };
        let result = runner().run(10, &thresholds);
        assert_eq!(result.wins, 0);
        assert_eq!(result.total_pnl, dec!(-0.35) * Decimal::from(result.losses));
        assert!(result
            .failure_breakdown
            .iter()
            .all(|f| f.reason == SkipReason::NetProfitFloor));
        assert_exhaustive(&result);
    }

    #[test]
    fn test_same_seed_same_result() {
        let a = runner().run(20, &PaperTestThresholds::default());
        let b = runner().run(20, &PaperTestThresholds::default());
        assert_eq!(a, b);
    }

    #[test]
    fn test_short_series_evaluates_nothing() {
        let mut rng = StdRng::seed_from_u64(1);
        let series = generate_price_series(&mut rng, 100.0, 0.01, 5);
        let result = runner().run_on_series(&mut rng, &series, 3, &open_thresholds());
        assert_eq!(result.windows_evaluated, 0);
        assert!(!result.passed);
    }

    #[test]
    fn test_result_wire_names() {
        let result = runner().run(3, &open_thresholds());
        let value = serde_json::to_value(&result).unwrap();
        assert!(value.get("totalPnL").is_some());
        assert!(value.get("tradesSkipped").is_some());
        assert!(value.get("failureBreakdown").is_some());
    }
}

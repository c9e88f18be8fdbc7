use serde::{Deserialize, Serialize};

/// Per-phase and total latency limits for a trade execution
///
/// Persisted as-is under the `execution-time-thresholds` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionThresholds {
    #[serde(default = "default_total_ms", alias = "total_ms")]
    pub total_ms: u64,
    #[serde(default = "default_pair_selection_ms", alias = "pair_selection_ms")]
    pub pair_selection_ms: u64,
    #[serde(default = "default_ai_analysis_ms", alias = "ai_analysis_ms")]
    pub ai_analysis_ms: u64,
    #[serde(default = "default_order_placement_ms", alias = "order_placement_ms")]
    pub order_placement_ms: u64,
    #[serde(default = "default_confirmation_ms", alias = "confirmation_ms")]
    pub confirmation_ms: u64,
    /// When false, trades are still marked as checked but raise nothing
    #[serde(default = "default_enable_alerts", alias = "enable_alerts")]
    pub enable_alerts: bool,
}

impl Default for ExecutionThresholds {
    fn default() -> Self {
        Self {
            total_ms: default_total_ms(),
            pair_selection_ms: default_pair_selection_ms(),
            ai_analysis_ms: default_ai_analysis_ms(),
            order_placement_ms: default_order_placement_ms(),
            confirmation_ms: default_confirmation_ms(),
            enable_alerts: default_enable_alerts(),
        }
    }
}

impl ExecutionThresholds {
    pub fn for_phase(&self, phase: Phase) -> u64 {
        match phase {
            Phase::PairSelection => self.pair_selection_ms,
            Phase::AiAnalysis => self.ai_analysis_ms,
            Phase::OrderPlacement => self.order_placement_ms,
            Phase::Confirmation => self.confirmation_ms,
        }
    }
}

fn default_total_ms() -> u64 {
    5_000
}

fn default_pair_selection_ms() -> u64 {
    1_000
}

fn default_ai_analysis_ms() -> u64 {
    2_000
}

fn default_order_placement_ms() -> u64 {
    1_000
}

fn default_confirmation_ms() -> u64 {
    1_000
}

fn default_enable_alerts() -> bool {
    true
}

/// Stage of a trade execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    PairSelection,
    AiAnalysis,
    OrderPlacement,
    Confirmation,
}

impl Phase {
    /// Execution order
    pub const ALL: [Phase; 4] = [
        Phase::PairSelection,
        Phase::AiAnalysis,
        Phase::OrderPlacement,
        Phase::Confirmation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::PairSelection => "pair_selection",
            Phase::AiAnalysis => "ai_analysis",
            Phase::OrderPlacement => "order_placement",
            Phase::Confirmation => "confirmation",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Measured phase durations of one completed trade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeExecutionTiming {
    pub trade_id: String,
    pub venue: String,
    pub pair: String,
    #[serde(default)]
    pub pair_selection_ms: u64,
    #[serde(default)]
    pub ai_analysis_ms: u64,
    #[serde(default)]
    pub order_placement_ms: u64,
    #[serde(default)]
    pub confirmation_ms: u64,
}

impl TradeExecutionTiming {
    pub fn new(
        trade_id: impl Into<String>,
        venue: impl Into<String>,
        pair: impl Into<String>,
    ) -> Self {
        Self {
            trade_id: trade_id.into(),
            venue: venue.into(),
            pair: pair.into(),
            pair_selection_ms: 0,
            ai_analysis_ms: 0,
            order_placement_ms: 0,
            confirmation_ms: 0,
        }
    }

    /// Builder-style setter for one phase
    pub fn with_phase(mut self, phase: Phase, ms: u64) -> Self {
        *self.phase_slot(phase) = ms;
        self
    }

    pub fn phase_ms(&self, phase: Phase) -> u64 {
        match phase {
            Phase::PairSelection => self.pair_selection_ms,
            Phase::AiAnalysis => self.ai_analysis_ms,
            Phase::OrderPlacement => self.order_placement_ms,
            Phase::Confirmation => self.confirmation_ms,
        }
    }

    pub(crate) fn phase_slot(&mut self, phase: Phase) -> &mut u64 {
        match phase {
            Phase::PairSelection => &mut self.pair_selection_ms,
            Phase::AiAnalysis => &mut self.ai_analysis_ms,
            Phase::OrderPlacement => &mut self.order_placement_ms,
            Phase::Confirmation => &mut self.confirmation_ms,
        }
    }

    /// Sum of all phase durations
    pub fn total_ms(&self) -> u64 {
        Phase::ALL
            .iter()
            .fold(0u64, |acc, p| acc.saturating_add(self.phase_ms(*p)))
    }
}

/// Kind of latency alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    SlowTotal,
    SlowPhase,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertKind::SlowTotal => write!(f, "slow_total"),
            AlertKind::SlowPhase => write!(f, "slow_phase"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

impl Severity {
    /// Critical beyond twice the threshold
    pub fn classify(duration_ms: u64, threshold_ms: u64) -> Self {
        if duration_ms > threshold_ms.saturating_mul(2) {
            Severity::Critical
        } else {
            Severity::Warning
        }
    }
}

/// Latency alert raised for one trade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionAlert {
    pub id: String,
    pub kind: AlertKind,
    /// Set for `slow_phase` alerts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    pub duration_ms: u64,
    pub threshold_ms: u64,
    pub trade_id: String,
    pub venue: String,
    pub pair: String,
    /// Epoch milliseconds
    pub timestamp: i64,
}

impl ExecutionAlert {
    pub fn severity(&self) -> Severity {
        Severity::classify(self.duration_ms, self.threshold_ms)
    }

    /// Phase name, or `"total"` for `slow_total`
    pub fn scope(&self) -> &'static str {
        self.phase.map(|p| p.as_str()).unwrap_or("total")
    }
}

/// Trade details carried by an outbound alert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertTradeData {
    pub trade_id: String,
    pub pair: String,
    pub venue: String,
    pub duration_ms: u64,
    pub threshold_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
}

/// Body POSTed to the alert webhook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub alert_type: AlertKind,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub trade_data: AlertTradeData,
}

impl From<&ExecutionAlert> for AlertPayload {
    fn from(alert: &ExecutionAlert) -> Self {
        let (title, message) = match alert.phase {
            Some(phase) => (
                format!("Slow {} phase", phase),
                format!(
                    "Trade {} on {} {}: {} took {} ms (threshold {} ms)",
                    alert.trade_id, alert.venue, alert.pair, phase, alert.duration_ms, alert.threshold_ms
                ),
            ),
            None => (
                "Slow trade execution".to_string(),
                format!(
                    "Trade {} on {} {}: execution took {} ms (threshold {} ms)",
                    alert.trade_id, alert.venue, alert.pair, alert.duration_ms, alert.threshold_ms
                ),
            ),
        };

        Self {
            alert_type: alert.kind,
            title,
            message,
            severity: alert.severity(),
            trade_data: AlertTradeData {
                trade_id: alert.trade_id.clone(),
                pair: alert.pair.clone(),
                venue: alert.venue.clone(),
                duration_ms: alert.duration_ms,
                threshold_ms: alert.threshold_ms,
                phase: alert.phase,
            },
        }
    }
}

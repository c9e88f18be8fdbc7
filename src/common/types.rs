//! Shared types used across all components

use serde::{Deserialize, Serialize};

/// Position direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short. Multiplies a price move into a PnL sign.
    pub fn sign(&self) -> i64 {
        match self {
            Direction::Long => 1,
            Direction::Short => -1,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => write!(f, "long"),
            Direction::Short => write!(f, "short"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "long" | "buy" => Ok(Direction::Long),
            "short" | "sell" => Ok(Direction::Short),
            other => Err(format!("unknown direction: {other}")),
        }
    }
}

/// Liveness report emitted by a trading-loop module
///
/// Modules that run on their own tasks push these into the session's
/// health channel instead of holding a reference to the watchdog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthEvent {
    /// Periodic "still alive" signal
    Heartbeat { module: String },
    /// A unit of work succeeded
    Success { module: String },
    /// A unit of work failed
    Error { module: String, error: String },
    /// Exchange connectivity observation
    ConnectionStatus { venue: String, connected: bool },
}

impl HealthEvent {
    /// Module or venue name this event refers to
    pub fn subject(&self) -> &str {
        match self {
            HealthEvent::Heartbeat { module }
            | HealthEvent::Success { module }
            | HealthEvent::Error { module, .. } => module,
            HealthEvent::ConnectionStatus { venue, .. } => venue,
        }
    }
}

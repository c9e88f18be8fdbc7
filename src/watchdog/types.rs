use serde::{Deserialize, Serialize};

/// Health record of one monitored trading module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleHealth {
    pub name: String,
    /// Epoch milliseconds of the last heartbeat (or restart)
    pub last_heartbeat_at: i64,
    pub healthy: bool,
    pub consecutive_errors: u32,
    pub restart_count: u32,
}

impl ModuleHealth {
    pub fn new(name: impl Into<String>, now_ms: i64) -> Self {
        Self {
            name: name.into(),
            last_heartbeat_at: now_ms,
            healthy: true,
            consecutive_errors: 0,
            restart_count: 0,
        }
    }

    /// Milliseconds since the last heartbeat
    pub fn silence_ms(&self, now_ms: i64) -> i64 {
        now_ms - self.last_heartbeat_at
    }
}

/// Connectivity record of one exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionHealth {
    pub venue: String,
    pub connected: bool,
    /// Epoch milliseconds of the last status report
    pub last_checked_at: i64,
    pub reconnect_attempts: u32,
    pub max_reconnect_attempts: u32,
}

impl ConnectionHealth {
    pub fn new(venue: impl Into<String>, now_ms: i64, max_reconnect_attempts: u32) -> Self {
        Self {
            venue: venue.into(),
            connected: true,
            last_checked_at: now_ms,
            reconnect_attempts: 0,
            max_reconnect_attempts,
        }
    }

    /// Whether reconnect attempts have reached the configured maximum
    pub fn reconnects_exhausted(&self) -> bool {
        self.reconnect_attempts >= self.max_reconnect_attempts
    }
}

/// Aggregate health of everything the watchdog tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallHealth {
    /// Every module and connection is fine
    Healthy,
    /// Something is unhealthy, but less than half of each population
    Degraded,
    /// At least half of the modules or half of the connections are unhealthy
    Critical,
}

impl OverallHealth {
    /// Classify from population sizes and unhealthy counts
    pub fn classify(
        modules: usize,
        unhealthy_modules: usize,
        connections: usize,
        unhealthy_connections: usize,
    ) -> Self {
        if unhealthy_modules == 0 && unhealthy_connections == 0 {
            return OverallHealth::Healthy;
        }
        let half_or_more = |total: usize, bad: usize| total > 0 && bad * 2 >= total;
        if half_or_more(modules, unhealthy_modules)
            || half_or_more(connections, unhealthy_connections)
        {
            OverallHealth::Critical
        } else {
            OverallHealth::Degraded
        }
    }
}

impl std::fmt::Display for OverallHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverallHealth::Healthy => write!(f, "healthy"),
            OverallHealth::Degraded => write!(f, "degraded"),
            OverallHealth::Critical => write!(f, "critical"),
        }
    }
}

/// Answer to a status poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchdogStatus {
    pub is_active: bool,
    /// Sorted by name
    pub modules: Vec<ModuleHealth>,
    /// Sorted by venue
    pub connections: Vec<ConnectionHealth>,
    pub overall_health: OverallHealth,
}

/// Persisted watchdog state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchdogSnapshot {
    /// Epoch milliseconds when the snapshot was taken
    pub last_check_time: i64,
    pub modules: Vec<(String, ModuleHealth)>,
    pub connections: Vec<(String, ConnectionHealth)>,
}

impl WatchdogSnapshot {
    /// Whether a snapshot taken at `last_check_time` is still usable at `now_ms`
    pub fn is_fresh(&self, now_ms: i64, max_age_ms: u64) -> bool {
        let age = now_ms - self.last_check_time;
        age >= 0 && (age as u64) < max_age_ms
    }
}

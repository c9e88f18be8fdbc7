//! Channel type definitions for inter-task communication

use tokio::sync::mpsc;

use super::types::HealthEvent;

/// Default channel buffer size
pub const DEFAULT_CHANNEL_SIZE: usize = 1000;

/// Create a new health event channel with the default buffer size
pub fn create_health_channel() -> (mpsc::Sender<HealthEvent>, mpsc::Receiver<HealthEvent>) {
    mpsc::channel(DEFAULT_CHANNEL_SIZE)
}

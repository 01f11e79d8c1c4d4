use std::time::Duration;

/// Default edge length of the square game grid.
pub const GRID_SIZE: u8 = 5;

/// Connection attempts allowed before a driver gives up for good.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 12;

/// Wait between a dropped connection and the next attempt.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(1000);

/// Every outbound frame waits this long before it is written.
pub const SEND_DELAY: Duration = Duration::from_millis(1000);

/// Lower bound on the time between deciding to attack and sending the attack.
pub const MIN_ATTACK_DELAY: Duration = Duration::from_millis(3250);

/// Upper bound on a single call to the prediction service.
pub const PREDICTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Close code used for a clean shutdown of the game connection.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Tunables shared by every driver spawned from the same process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub grid_size: u8,
    pub reconnect_delay: Duration,
    pub max_reconnect_attempts: u32,
    pub send_delay: Duration,
    pub min_attack_delay: Duration,
    pub prediction_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            grid_size: GRID_SIZE,
            reconnect_delay: RECONNECT_DELAY,
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
            send_delay: SEND_DELAY,
            min_attack_delay: MIN_ATTACK_DELAY,
            prediction_timeout: PREDICTION_TIMEOUT,
        }
    }
}

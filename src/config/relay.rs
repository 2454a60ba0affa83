//! Relay scheduling and identifier generator configuration.

use serde::Deserialize;

/// Outbox relay configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Seconds between relay passes. Default: 5.
    pub interval_secs: u64,
    /// Previous day buckets drained before the current one. Default: 0.
    pub lookback_days: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            lookback_days: 0,
        }
    }
}

/// Identifier generator configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IdGeneratorConfig {
    /// Machine id packed into the low 16 bits of every id.
    pub machine_id: u16,
    /// Epoch the elapsed-time component counts from, in Unix milliseconds.
    pub epoch_ms: i64,
}

impl Default for IdGeneratorConfig {
    fn default() -> Self {
        Self {
            machine_id: 1,
            // 2024-01-01 00:00:00 UTC
            epoch_ms: 1_704_067_200_000,
        }
    }
}

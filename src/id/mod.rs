//! Unique identifier generation.
//!
//! Identifiers are snowflake-style: roughly time-ordered 63-bit values laid
//! out as
//!
//! ```text
//! | 39 bits elapsed (10ms units) | 8 bits sequence | 16 bits machine id |
//! ```
//!
//! The generator is an explicit collaborator with an `init`/`shutdown`
//! lifecycle and is injected wherever ids are needed.

use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use tracing::info;

use crate::config::IdGeneratorConfig;

const BITS_TIME: u32 = 39;
const BITS_SEQUENCE: u32 = 8;
const BITS_MACHINE: u32 = 16;

const MAX_SEQUENCE: u64 = (1 << BITS_SEQUENCE) - 1;
const MAX_ELAPSED: i64 = (1 << BITS_TIME) - 1;

/// Length of one time unit in milliseconds.
const TIME_UNIT_MS: i64 = 10;

/// Result type for id generation.
pub type Result<T> = std::result::Result<T, IdError>;

/// Errors that can occur while generating identifiers.
#[derive(Debug, thiserror::Error)]
pub enum IdError {
    #[error("Id generator not initialized")]
    NotInitialized,

    #[error("Id generator has been shut down")]
    ShutDown,

    #[error("Start time {0} is in the future")]
    StartTimeInFuture(DateTime<Utc>),

    #[error("Invalid epoch: {0} ms")]
    InvalidEpoch(i64),

    #[error("Time overflow: elapsed time exceeds 39 bits")]
    TimeOverflow,

    #[error("Generator state lock poisoned")]
    Poisoned,
}

/// Source of globally unique, roughly time-ordered identifiers.
pub trait IdGenerator: Send + Sync {
    /// Produce a fresh identifier.
    fn generate_id(&self) -> Result<u64>;
}

#[derive(Debug)]
enum Lifecycle {
    Created,
    Running { elapsed: i64, sequence: u64 },
    Stopped,
}

/// Snowflake generator with a 10ms tick, 8-bit sequence and 16-bit machine id.
pub struct SnowflakeGenerator {
    start_time: DateTime<Utc>,
    machine_id: u16,
    state: Mutex<Lifecycle>,
}

impl SnowflakeGenerator {
    /// Create an uninitialized generator.
    pub fn new(machine_id: u16, start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            machine_id,
            state: Mutex::new(Lifecycle::Created),
        }
    }

    /// Create a generator from configuration.
    pub fn from_config(config: &IdGeneratorConfig) -> Result<Self> {
        let start_time = Utc
            .timestamp_millis_opt(config.epoch_ms)
            .single()
            .ok_or(IdError::InvalidEpoch(config.epoch_ms))?;
        Ok(Self::new(config.machine_id, start_time))
    }

    /// Validate settings and start handing out ids.
    pub fn init(&self) -> Result<()> {
        if self.start_time > Utc::now() {
            return Err(IdError::StartTimeInFuture(self.start_time));
        }

        let mut state = self.state.lock().map_err(|_| IdError::Poisoned)?;
        *state = Lifecycle::Running {
            elapsed: 0,
            sequence: MAX_SEQUENCE,
        };

        info!(
            machine_id = self.machine_id,
            start_time = %self.start_time,
            "Id generator initialized"
        );
        Ok(())
    }

    /// Stop handing out ids. Subsequent calls to `generate_id` fail.
    pub fn shutdown(&self) -> Result<()> {
        let mut state = self.state.lock().map_err(|_| IdError::Poisoned)?;
        *state = Lifecycle::Stopped;
        info!(machine_id = self.machine_id, "Id generator shut down");
        Ok(())
    }

    fn current_elapsed(&self) -> i64 {
        (Utc::now() - self.start_time).num_milliseconds() / TIME_UNIT_MS
    }

    fn compose(&self, elapsed: i64, sequence: u64) -> Result<u64> {
        if elapsed > MAX_ELAPSED {
            return Err(IdError::TimeOverflow);
        }
        Ok((elapsed as u64) << (BITS_SEQUENCE + BITS_MACHINE)
            | sequence << BITS_MACHINE
            | u64::from(self.machine_id))
    }
}

impl IdGenerator for SnowflakeGenerator {
    fn generate_id(&self) -> Result<u64> {
        let mut state = self.state.lock().map_err(|_| IdError::Poisoned)?;
        let (elapsed, sequence) = match &mut *state {
            Lifecycle::Created => return Err(IdError::NotInitialized),
            Lifecycle::Stopped => return Err(IdError::ShutDown),
            Lifecycle::Running { elapsed, sequence } => (elapsed, sequence),
        };

        let now = self.current_elapsed();
        if now > *elapsed {
            *elapsed = now;
            *sequence = 0;
        } else {
            // Same tick (or clock went backwards): advance the sequence and
            // borrow the next tick once it wraps.
            *sequence = (*sequence + 1) & MAX_SEQUENCE;
            if *sequence == 0 {
                *elapsed += 1;
            }
        }

        self.compose(*elapsed, *sequence)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::Duration;

    use super::*;

    fn running() -> SnowflakeGenerator {
        let generator = SnowflakeGenerator::new(3, Utc::now() - Duration::days(1));
        generator.init().unwrap();
        generator
    }

    #[test]
    fn test_generate_before_init_fails() {
        let generator = SnowflakeGenerator::new(1, Utc::now() - Duration::days(1));
        assert!(matches!(
            generator.generate_id(),
            Err(IdError::NotInitialized)
        ));
    }

    #[test]
    fn test_generate_after_shutdown_fails() {
        let generator = running();
        generator.generate_id().unwrap();
        generator.shutdown().unwrap();
        assert!(matches!(generator.generate_id(), Err(IdError::ShutDown)));
    }

    #[test]
    fn test_start_time_in_future_rejected() {
        let generator = SnowflakeGenerator::new(1, Utc::now() + Duration::days(1));
        assert!(matches!(
            generator.init(),
            Err(IdError::StartTimeInFuture(_))
        ));
    }

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let generator = running();
        let ids: Vec<u64> = (0..2_000).map(|_| generator.generate_id().unwrap()).collect();

        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
        assert!(ids.iter().all(|id| *id > 0));
    }

    #[test]
    fn test_machine_id_in_low_bits() {
        let generator = running();
        let id = generator.generate_id().unwrap();
        assert_eq!(id & 0xFFFF, 3);
    }

    #[test]
    fn test_from_config_default_epoch() {
        let generator = SnowflakeGenerator::from_config(&IdGeneratorConfig::default()).unwrap();
        generator.init().unwrap();
        assert!(generator.generate_id().unwrap() > 0);
    }
}

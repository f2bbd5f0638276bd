//! Engine configuration
//!
//! All knobs are plain data so front-ends can persist them next to their own
//! settings. Missing fields fall back to [`EngineConfig::default`].

use crate::constants::{DEFAULT_MAX_IN_FLIGHT, DMG_CLOCK_HZ, LENGTH_CLOCK_DIVISOR};
use crate::{GbSoundError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound for the message queue (a full frame of register writes fits easily)
const MAX_QUEUE_CAPACITY: usize = 64 * 1024;

/// Sound engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Emulated CPU clock in Hz, used to turn hardware rates into cycle counts
    pub clock_speed: u32,

    /// Deliver messages at the emulated cycle they happened ("hyper-sync")
    /// instead of as soon as they are computed
    pub accurate_sync: bool,

    /// Capacity of the bounded message queue (in messages)
    pub queue_capacity: usize,

    /// Sent-but-unreceived messages tolerated before sends are dropped
    pub max_in_flight: u32,

    /// Longest time a cycle-accurate handshake may spin before falling back
    /// to immediate delivery (microseconds)
    pub sync_timeout_micros: u64,
}

impl EngineConfig {
    /// Configuration that delivers every message immediately
    pub fn best_effort() -> Self {
        EngineConfig {
            clock_speed: DMG_CLOCK_HZ,
            accurate_sync: false,
            queue_capacity: 256,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            // One emulated frame (70224 cycles at 4.19 MHz)
            sync_timeout_micros: 16_743,
        }
    }

    /// Configuration that aligns delivery to emulated cycles
    pub fn accurate() -> Self {
        EngineConfig {
            accurate_sync: true,
            ..Self::best_effort()
        }
    }

    /// Parse a configuration from JSON, then validate it
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every value keeps the timing math well defined
    pub fn validate(&self) -> Result<()> {
        if i64::from(self.clock_speed) < LENGTH_CLOCK_DIVISOR {
            return Err(GbSoundError::ConfigError(format!(
                "clock speed {} Hz is below the {} Hz length clock",
                self.clock_speed, LENGTH_CLOCK_DIVISOR
            )));
        }
        if self.clock_speed > i32::MAX as u32 {
            return Err(GbSoundError::ConfigError(format!(
                "clock speed {} Hz does not fit the cycle counters",
                self.clock_speed
            )));
        }
        if self.queue_capacity == 0 || self.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(GbSoundError::ConfigError(format!(
                "queue capacity must be within 1..={MAX_QUEUE_CAPACITY}, got {}",
                self.queue_capacity
            )));
        }
        if self.max_in_flight == 0 {
            return Err(GbSoundError::ConfigError(
                "max_in_flight must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Handshake timeout as a [`Duration`]
    pub fn sync_timeout(&self) -> Duration {
        Duration::from_micros(self.sync_timeout_micros)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::best_effort()
    }
}

// Scheduler configuration - timing constants and tone settings
// Stored as RON so it can be tweaked without recompiling

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Timing and sound constants shared by the metronome and the sequence player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// How far ahead of the audio clock events are committed (seconds)
    pub lookahead_secs: f64,

    /// Metronome poll cadence (milliseconds)
    pub metronome_poll_ms: f64,

    /// Sequence player poll cadence (milliseconds)
    pub player_poll_ms: f64,

    /// Length of a metronome beep (seconds)
    pub beep_duration_secs: f64,

    /// Beep pitch on accented beats
    pub accent_frequency_hz: f32,

    /// Beep pitch on regular beats
    pub regular_frequency_hz: f32,

    /// Capacity of the tone queue feeding the audio callback
    pub tone_queue_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lookahead_secs: 0.1,
            metronome_poll_ms: 50.0,
            player_poll_ms: 33.0,
            beep_duration_secs: 0.04,
            accent_frequency_hz: 300.0,
            regular_frequency_hz: 200.0,
            tone_queue_capacity: 1024,
        }
    }
}

impl SchedulerConfig {
    /// Parse a configuration from RON text and validate it
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: SchedulerConfig = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_ron_str(&text)
    }

    /// Serialize to pretty RON
    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::Invalid(format!("Failed to serialize to RON: {}", e)))
    }

    /// Check that every constant is usable
    ///
    /// Both poll intervals must be strictly shorter than the lookahead window,
    /// otherwise events can fall into the gap between two polls.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("lookahead_secs", self.lookahead_secs),
            ("metronome_poll_ms", self.metronome_poll_ms),
            ("player_poll_ms", self.player_poll_ms),
            ("beep_duration_secs", self.beep_duration_secs),
            ("accent_frequency_hz", self.accent_frequency_hz as f64),
            ("regular_frequency_hz", self.regular_frequency_hz as f64),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }

        let lookahead_ms = self.lookahead_secs * 1000.0;
        for (name, poll_ms) in [
            ("metronome_poll_ms", self.metronome_poll_ms),
            ("player_poll_ms", self.player_poll_ms),
        ] {
            if poll_ms >= lookahead_ms {
                return Err(ConfigError::Invalid(format!(
                    "{} ({}ms) must be shorter than the lookahead window ({}ms)",
                    name, poll_ms, lookahead_ms
                )));
            }
        }

        if self.tone_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "tone_queue_capacity must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

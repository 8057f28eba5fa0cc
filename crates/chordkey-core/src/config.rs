use crate::chord::ChordMode;
use crate::gesture::GESTURE_DELAY_PAUSE_MS;
use crate::grid::Dimensions;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

const MAX_DELAY_MS: u64 = 10_000;
const MAX_INTERVAL_SECS: u64 = 3600;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Which contacts the keyboard reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TouchInput {
    /// Pointer only.
    None,
    /// One contact at a time.
    Single,
    #[default]
    Multi,
}

/// Where raw events come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EventHandling {
    /// Toolkit events delivered to the keyboard window.
    #[default]
    Gtk,
    /// Raw device events; initial presses must hit the keyboard window.
    XInput,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    #[serde(default)]
    pub touch_input: TouchInput,
    #[serde(default)]
    pub event_handling: EventHandling,
    #[serde(default = "default_true")]
    pub delay_sequence_begin: bool,
    #[serde(default = "default_gesture_detection_span_ms")]
    pub gesture_detection_span_ms: u64,
    #[serde(default = "default_gesture_delay_pause_ms")]
    pub gesture_delay_pause_ms: u64,
    #[serde(default = "default_stale_sequence_secs")]
    pub stale_sequence_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// 0 processes touch ends immediately.
    #[serde(default)]
    pub touch_release_delay_ms: u64,
    /// Release all sticky modifiers after this long without contacts.
    #[serde(default)]
    pub sticky_key_release_delay_secs: Option<f64>,
    #[serde(default)]
    pub dimensions: Dimensions,
}

fn default_true() -> bool {
    true
}

fn default_gesture_detection_span_ms() -> u64 {
    100
}

fn default_gesture_delay_pause_ms() -> u64 {
    GESTURE_DELAY_PAUSE_MS
}

fn default_stale_sequence_secs() -> u64 {
    30
}

fn default_sweep_interval_secs() -> u64 {
    5
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            touch_input: TouchInput::Multi,
            event_handling: EventHandling::Gtk,
            delay_sequence_begin: true,
            gesture_detection_span_ms: 100,
            gesture_delay_pause_ms: GESTURE_DELAY_PAUSE_MS,
            stale_sequence_secs: 30,
            sweep_interval_secs: 5,
            touch_release_delay_ms: 0,
            sticky_key_release_delay_secs: None,
            dimensions: Dimensions::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&text)?;
        info!("Config loaded from {:?}", path.as_ref());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let dim = &self.dimensions;
        if dim.left_cols == 0 || dim.right_cols == 0 {
            return Err(ConfigError::Invalid {
                field: "dimensions",
                reason: "panes need at least one column",
            });
        }
        if dim.rows == 0 {
            return Err(ConfigError::Invalid {
                field: "dimensions.rows",
                reason: "panes need at least one row",
            });
        }
        if !(dim.key_width.is_finite() && dim.key_width > 0.0) {
            return Err(ConfigError::Invalid {
                field: "dimensions.key_width",
                reason: "must be positive",
            });
        }
        if self.stale_sequence_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "stale_sequence_secs",
                reason: "must be at least one second",
            });
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "sweep_interval_secs",
                reason: "must be at least one second",
            });
        }
        if self.stale_sequence_secs > MAX_INTERVAL_SECS {
            return Err(ConfigError::Invalid {
                field: "stale_sequence_secs",
                reason: "must be at most one hour",
            });
        }
        if self.sweep_interval_secs > MAX_INTERVAL_SECS {
            return Err(ConfigError::Invalid {
                field: "sweep_interval_secs",
                reason: "must be at most one hour",
            });
        }
        if self.gesture_detection_span_ms > MAX_DELAY_MS {
            return Err(ConfigError::Invalid {
                field: "gesture_detection_span_ms",
                reason: "must be at most ten seconds",
            });
        }
        if self.touch_release_delay_ms > MAX_DELAY_MS {
            return Err(ConfigError::Invalid {
                field: "touch_release_delay_ms",
                reason: "must be at most ten seconds",
            });
        }
        if let Some(delay) = self.sticky_key_release_delay_secs {
            if !(delay.is_finite() && delay >= 0.0) {
                return Err(ConfigError::Invalid {
                    field: "sticky_key_release_delay_secs",
                    reason: "must be a non-negative number",
                });
            }
            if delay > MAX_INTERVAL_SECS as f64 {
                return Err(ConfigError::Invalid {
                    field: "sticky_key_release_delay_secs",
                    reason: "must be at most one hour",
                });
            }
        }
        Ok(())
    }

    pub fn multi_touch(&self) -> bool {
        self.touch_input == TouchInput::Multi
    }

    pub fn touch_enabled(&self) -> bool {
        self.touch_input != TouchInput::None
    }

    pub fn chord_mode(&self) -> ChordMode {
        match self.touch_input {
            TouchInput::Multi => ChordMode::Concurrent,
            TouchInput::Single | TouchInput::None => ChordMode::Sequential,
        }
    }

    pub fn gesture_span(&self) -> Duration {
        Duration::from_millis(self.gesture_detection_span_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_sequence_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn touch_release_delay(&self) -> Option<Duration> {
        (self.touch_release_delay_ms > 0).then(|| Duration::from_millis(self.touch_release_delay_ms))
    }

    pub fn sticky_release_delay(&self) -> Option<Duration> {
        self.sticky_key_release_delay_secs
            .filter(|d| *d > 0.0)
            .and_then(|d| Duration::try_from_secs_f64(d).ok())
    }
}

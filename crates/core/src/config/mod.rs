use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{CueSyncError, Result};

/// Top-level configuration structure for the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub timeline: TimelineConfig,
    pub envelope: EnvelopeConfig,
    pub markers: MarkerConfig,
    pub playback: PlaybackConfig,
}

impl EngineConfig {
    /// Reads a JSON configuration file. Keys that are absent keep their
    /// default values.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&text)?;
        tracing::debug!(?path, "loaded engine configuration");
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.timeline.visible_duration_seconds > 0.0) {
            return Err(CueSyncError::InvalidInput(
                "timeline.visible_duration_seconds must be positive",
            ));
        }
        if self.envelope.visual_rate_hz == 0 {
            return Err(CueSyncError::InvalidInput(
                "envelope.visual_rate_hz must be positive",
            ));
        }
        if self.envelope.decode_sample_rate == 0 {
            return Err(CueSyncError::InvalidInput(
                "envelope.decode_sample_rate must be positive",
            ));
        }
        if !(self.markers.hit_tolerance_px >= 0.0) {
            return Err(CueSyncError::InvalidInput(
                "markers.hit_tolerance_px must not be negative",
            ));
        }
        if self.playback.poll_interval_ms == 0 {
            return Err(CueSyncError::InvalidInput(
                "playback.poll_interval_ms must be positive",
            ));
        }
        Ok(())
    }
}

/// Scrolling window settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    pub visible_duration_seconds: f64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            visible_duration_seconds: 30.0,
        }
    }
}

/// Configuration specific to waveform envelope generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeConfig {
    /// Envelope pairs emitted per second of audio.
    pub visual_rate_hz: u32,
    /// Rate headerless PCM is assumed to be normalized to.
    pub decode_sample_rate: u32,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            visual_rate_hz: 100,
            decode_sample_rate: 8_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    pub hit_tolerance_px: f64,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            hit_tolerance_px: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub poll_interval_ms: u64,
}

impl PlaybackConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 30,
        }
    }
}

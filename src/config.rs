//! Engine configuration.

use crate::Result;
use chorale_core::{Error as CoreError, RampOptions, RampShape, DEFAULT_RAMP_DURATION};
use chorale_voice::VoiceLimits;
use serde::{Deserialize, Serialize};

/// Settings fixed at engine construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_static_voices: usize,
    pub max_streamed_voices: usize,
    pub max_spatial_voices: usize,
    /// Physical pool size. Defaults to static + streamed.
    pub physical_voices: Option<usize>,
    /// Ramp applied to parameter changes that don't pass their own, in seconds.
    pub parameter_ramp_duration: f64,
    /// Master volume applied to the default main bus.
    pub volume: f32,
    /// Unlock the audio resource while building.
    pub auto_unlock: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let limits = VoiceLimits::default();
        Self {
            max_static_voices: limits.max_static,
            max_streamed_voices: limits.max_streamed,
            max_spatial_voices: limits.max_spatial,
            physical_voices: limits.physical,
            parameter_ramp_duration: DEFAULT_RAMP_DURATION,
            volume: 1.0,
            auto_unlock: true,
        }
    }
}

impl EngineConfig {
    pub fn voice_limits(&self) -> VoiceLimits {
        VoiceLimits {
            max_static: self.max_static_voices,
            max_streamed: self.max_streamed_voices,
            max_spatial: self.max_spatial_voices,
            physical: self.physical_voices,
        }
    }

    pub fn parameter_ramp(&self) -> RampOptions {
        RampOptions::new(self.parameter_ramp_duration, RampShape::Linear)
    }

    pub fn validate(&self) -> Result<()> {
        self.voice_limits().validate()?;
        self.parameter_ramp().validate()?;
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(CoreError::InvalidConfig(format!(
                "volume {} must be a finite, non-negative gain",
                self.volume
            ))
            .into());
        }
        Ok(())
    }
}

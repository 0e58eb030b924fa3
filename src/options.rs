//! Persisted sound options.
//!
//! A flat record: unknown keys are ignored and missing keys take their
//! defaults, so older and newer saves load either way.

use crate::Result;
use chorale_core::{DistanceModel, Error as CoreError, SpatialSettings};
use chorale_voice::PlaybackParams;
use core::f32::consts::TAU;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundOptions {
    /// Start playing as soon as the sound is created.
    pub autoplay: bool,
    #[serde(rename = "loop")]
    pub looping: bool,
    pub loop_start: f64,
    /// Zero loops the whole sound.
    pub loop_end: f64,
    pub volume: f32,
    pub playback_rate: f64,
    /// Detune in cents, applied on top of `playback_rate`.
    pub pitch: f64,
    pub start_offset: f64,
    /// Seconds to play. Zero plays to the end.
    pub duration: f64,
    /// Voices a single sound may hold at once.
    pub max_instances: usize,
    pub priority: i32,
    pub spatial_enabled: bool,
    pub stereo_enabled: bool,
    pub analyzer_enabled: bool,
    pub distance_model: DistanceModel,
    pub min_distance: f32,
    pub max_distance: f32,
    pub rolloff_factor: f32,
    pub cone_inner_angle: f32,
    pub cone_outer_angle: f32,
    pub cone_outer_volume: f32,
    pub stereo_pan: f32,
}

impl Default for SoundOptions {
    fn default() -> Self {
        let spatial = SpatialSettings::default();
        Self {
            autoplay: false,
            looping: false,
            loop_start: 0.0,
            loop_end: 0.0,
            volume: 1.0,
            playback_rate: 1.0,
            pitch: 0.0,
            start_offset: 0.0,
            duration: 0.0,
            max_instances: 8,
            priority: 0,
            spatial_enabled: false,
            stereo_enabled: false,
            analyzer_enabled: false,
            distance_model: spatial.distance_model,
            min_distance: spatial.min_distance,
            max_distance: spatial.max_distance,
            rolloff_factor: spatial.rolloff_factor,
            cone_inner_angle: TAU,
            cone_outer_angle: TAU,
            cone_outer_volume: spatial.cone_outer_volume,
            stereo_pan: 0.0,
        }
    }
}

impl SoundOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        let options: SoundOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_instances == 0 {
            return Err(invalid("max_instances", "must be at least 1".to_string()));
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(invalid("volume", format!("{} is not a valid gain", self.volume)));
        }
        if !self.pitch.is_finite() {
            return Err(invalid("pitch", format!("{} is not finite", self.pitch)));
        }
        if !self.duration.is_finite() || self.duration < 0.0 {
            return Err(invalid("duration", format!("{} must be >= 0", self.duration)));
        }
        if self.stereo_pan.is_nan() {
            return Err(invalid("stereo_pan", "is NaN".to_string()));
        }
        self.playback_params().validate()?;
        if self.spatial_enabled {
            self.spatial_settings().validate()?;
        }
        Ok(())
    }

    /// Effective rate after applying `pitch`.
    pub fn effective_rate(&self) -> f64 {
        self.playback_rate * 2f64.powf(self.pitch / 1200.0)
    }

    /// Voice playback parameters. `end` is left open when `duration` is zero;
    /// the caller fills it from the buffer length.
    pub fn playback_params(&self) -> PlaybackParams {
        PlaybackParams {
            offset: self.start_offset,
            end: (self.duration > 0.0).then_some(self.start_offset + self.duration),
            loop_start: self.loop_start,
            loop_end: self.loop_end,
            rate: self.effective_rate(),
        }
    }

    pub fn spatial_settings(&self) -> SpatialSettings {
        SpatialSettings {
            cone_inner_angle: self.cone_inner_angle,
            cone_outer_angle: self.cone_outer_angle,
            cone_outer_volume: self.cone_outer_volume,
            distance_model: self.distance_model,
            min_distance: self.min_distance,
            max_distance: self.max_distance,
            rolloff_factor: self.rolloff_factor,
            ..SpatialSettings::default()
        }
    }
}

fn invalid(name: &'static str, reason: String) -> crate::Error {
    CoreError::InvalidParameter(name, reason).into()
}

/// Per-call overrides for [`Sound::play_with`](crate::Sound::play_with).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayOptions {
    pub start_offset: Option<f64>,
    /// Seconds to play. Zero plays to the end.
    pub duration: Option<f64>,
    pub looping: Option<bool>,
    pub loop_start: Option<f64>,
    pub loop_end: Option<f64>,
}

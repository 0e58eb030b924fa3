//! Builder for configuring and constructing an `AudioEngine`.

use crate::config::EngineConfig;
use crate::{AudioEngine, Result};
use chorale_core::compat::Arc;
use chorale_core::AudioBackend;

/// The backend is required. Everything else has a default, see
/// [`EngineConfig`].
///
/// # Example
///
/// ```ignore
/// use chorale::prelude::*;
///
/// let engine = AudioEngine::builder(backend)
///     .max_static_voices(32)
///     .max_streamed_voices(4)
///     .volume(0.8)
///     .build()?;
/// ```
pub struct AudioEngineBuilder {
    backend: Arc<dyn AudioBackend>,
    config: EngineConfig,
}

impl AudioEngineBuilder {
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self {
            backend,
            config: EngineConfig::default(),
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Default: 64
    pub fn max_static_voices(mut self, count: usize) -> Self {
        self.config.max_static_voices = count;
        self
    }

    /// Default: 8
    pub fn max_streamed_voices(mut self, count: usize) -> Self {
        self.config.max_streamed_voices = count;
        self
    }

    /// Default: 64
    pub fn max_spatial_voices(mut self, count: usize) -> Self {
        self.config.max_spatial_voices = count;
        self
    }

    /// Default: static + streamed
    pub fn physical_voices(mut self, count: usize) -> Self {
        self.config.physical_voices = Some(count);
        self
    }

    /// Default: 0.01 s
    pub fn parameter_ramp_duration(mut self, seconds: f64) -> Self {
        self.config.parameter_ramp_duration = seconds;
        self
    }

    /// Default: 1.0
    pub fn volume(mut self, volume: f32) -> Self {
        self.config.volume = volume;
        self
    }

    /// Default: true
    pub fn auto_unlock(mut self, enabled: bool) -> Self {
        self.config.auto_unlock = enabled;
        self
    }

    pub async fn build_async(self) -> Result<AudioEngine> {
        AudioEngine::create(self.backend, self.config).await
    }

    /// Blocking variant of [`build_async`](Self::build_async).
    pub fn build(self) -> Result<AudioEngine> {
        pollster::block_on(self.build_async())
    }
}

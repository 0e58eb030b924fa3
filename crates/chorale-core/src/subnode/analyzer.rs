//! Frequency analyzer tap.
//!
//! The backend fills raw magnitude spectra in dB. Temporal smoothing and the
//! byte mapping are done here so every backend reports identical numbers.

use super::SubNodeHandle;
use crate::backend::AudioBackend;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

pub const MIN_FFT_SIZE: usize = 32;
pub const MAX_FFT_SIZE: usize = 32768;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerSettings {
    pub fft_size: usize,
    pub min_decibels: f32,
    pub max_decibels: f32,
    /// 0.0 = no averaging, 1.0 = frozen.
    pub smoothing: f32,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            min_decibels: -100.0,
            max_decibels: -30.0,
            smoothing: 0.8,
        }
    }
}

impl AnalyzerSettings {
    pub fn validate(&self) -> Result<()> {
        if !self.fft_size.is_power_of_two()
            || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&self.fft_size)
        {
            return Err(Error::InvalidAnalyzer(format!(
                "fft_size {} must be a power of two in {}..={}",
                self.fft_size, MIN_FFT_SIZE, MAX_FFT_SIZE
            )));
        }
        if self.min_decibels.is_nan()
            || self.max_decibels.is_nan()
            || self.min_decibels >= self.max_decibels
        {
            return Err(Error::InvalidAnalyzer(format!(
                "min_decibels {} must be below max_decibels {}",
                self.min_decibels, self.max_decibels
            )));
        }
        if !(0.0..=1.0).contains(&self.smoothing) {
            return Err(Error::InvalidAnalyzer(format!(
                "smoothing {} must be within 0..=1",
                self.smoothing
            )));
        }
        Ok(())
    }

    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }
}

#[derive(Debug, Clone)]
pub struct AnalyzerSubNode {
    handle: SubNodeHandle,
    settings: AnalyzerSettings,
    /// Previous frame, linear magnitude.
    history: Vec<f32>,
}

impl AnalyzerSubNode {
    pub(crate) fn new(handle: SubNodeHandle) -> Self {
        let settings = AnalyzerSettings::default();
        Self {
            handle,
            history: vec![0.0; settings.bin_count()],
            settings,
        }
    }

    pub fn handle(&self) -> SubNodeHandle {
        self.handle
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: AnalyzerSettings) -> Result<()> {
        settings.validate()?;
        if settings.fft_size != self.settings.fft_size {
            self.history = vec![0.0; settings.bin_count()];
        }
        self.settings = settings;
        Ok(())
    }

    /// Smoothed spectrum in dB, one value per bin.
    pub fn float_frequency_data(&mut self, backend: &dyn AudioBackend) -> Vec<f32> {
        let mut raw = vec![self.settings.min_decibels; self.settings.bin_count()];
        backend.frequency_data(self.handle.primitive, &mut raw);

        let k = self.settings.smoothing;
        raw.iter_mut()
            .zip(self.history.iter_mut())
            .for_each(|(db, prev)| {
                let linear = if db.is_finite() { 10f32.powf(*db / 20.0) } else { 0.0 };
                *prev = k * *prev + (1.0 - k) * linear;
                *db = if *prev > 0.0 {
                    20.0 * prev.log10()
                } else {
                    f32::NEG_INFINITY
                };
            });
        raw
    }

    /// Spectrum scaled onto 0..=255 between the min and max decibels.
    pub fn byte_frequency_data(&mut self, backend: &dyn AudioBackend) -> Vec<u8> {
        let (min, max) = (self.settings.min_decibels, self.settings.max_decibels);
        self.float_frequency_data(backend)
            .into_iter()
            .map(|db| {
                let scaled = 255.0 * (db - min) / (max - min);
                if scaled.is_nan() {
                    0
                } else {
                    scaled.clamp(0.0, 255.0) as u8
                }
            })
            .collect()
    }
}

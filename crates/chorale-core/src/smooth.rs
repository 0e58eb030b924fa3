//! Time-based parameter ramps for click-free parameter changes.
//!
//! Parameters are never jumped to a new value while audio is running. A change
//! schedules a [`ParamRamp`] starting at the current clock time; the backend
//! receives the same ramp so it can interpolate on the audio thread.
//!
//! # Example
//!
//! ```
//! use chorale_core::{RampOptions, SmoothedParam};
//!
//! let mut gain = SmoothedParam::new(1.0);
//!
//! // 10ms linear ramp starting at t = 2.0s
//! gain.set_target(0.5, 2.0, &RampOptions::default()).unwrap();
//!
//! assert!(gain.is_smoothing(2.005));
//! assert_eq!(gain.value_at(2.5), 0.5);
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Process-wide default duration for parameter changes, in seconds.
pub const DEFAULT_RAMP_DURATION: f64 = 0.01;

/// Curve used to move between the start and end value of a ramp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RampShape {
    /// Straight line (default)
    #[default]
    Linear,
    /// Slow start, fast finish. Sounds natural for fade-ins.
    Exponential,
    /// Fast start, slow finish. Sounds natural for fade-outs.
    Logarithmic,
    /// Jump straight to the end value.
    None,
}

impl RampShape {
    /// Map linear progress `t` (0..=1) onto the curve (0..=1).
    #[inline]
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            RampShape::Linear => t,
            RampShape::Exponential => (2f64.powf(10.0 * t) - 1.0) / 1023.0,
            RampShape::Logarithmic => (1.0 + 9.0 * t).log10(),
            RampShape::None => 1.0,
        }
    }
}

/// How a parameter change should be applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampOptions {
    /// Ramp length in seconds. Zero means "apply immediately".
    pub duration: f64,
    pub shape: RampShape,
}

impl Default for RampOptions {
    fn default() -> Self {
        Self {
            duration: DEFAULT_RAMP_DURATION,
            shape: RampShape::Linear,
        }
    }
}

impl RampOptions {
    pub fn new(duration: f64, shape: RampShape) -> Self {
        Self { duration, shape }
    }

    pub fn immediate() -> Self {
        Self {
            duration: 0.0,
            shape: RampShape::None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.duration.is_finite() || self.duration < 0.0 {
            return Err(Error::InvalidRamp(format!(
                "duration {} must be a finite, non-negative number of seconds",
                self.duration
            )));
        }
        Ok(())
    }

    fn is_immediate(&self) -> bool {
        self.duration == 0.0 || self.shape == RampShape::None
    }
}

/// A scheduled transition between two values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRamp {
    pub from: f32,
    pub to: f32,
    pub start_time: f64,
    pub duration: f64,
    pub shape: RampShape,
}

impl ParamRamp {
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    pub fn is_finished(&self, time: f64) -> bool {
        time >= self.end_time()
    }

    pub fn value_at(&self, time: f64) -> f32 {
        if time <= self.start_time {
            return self.from;
        }
        if self.duration <= 0.0 || self.is_finished(time) {
            return self.to;
        }

        let progress = (time - self.start_time) / self.duration;
        let curve = self.shape.apply(progress) as f32;
        self.from + (self.to - self.from) * curve
    }
}

/// A parameter value with an optional in-flight ramp.
///
/// Unlike a per-sample smoother this is evaluated against the backend clock,
/// so the control thread can query "what is the gain right now" at any time.
#[derive(Debug, Clone)]
pub struct SmoothedParam {
    target: f32,
    ramp: Option<ParamRamp>,
}

impl SmoothedParam {
    pub fn new(initial: f32) -> Self {
        Self {
            target: initial,
            ramp: None,
        }
    }

    /// Value the parameter is heading to (or sitting at).
    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    /// Value at the given clock time.
    pub fn value_at(&self, time: f64) -> f32 {
        match &self.ramp {
            Some(ramp) => ramp.value_at(time),
            None => self.target,
        }
    }

    #[inline]
    pub fn is_smoothing(&self, time: f64) -> bool {
        self.ramp.is_some_and(|r| !r.is_finished(time))
    }

    pub fn ramp(&self) -> Option<&ParamRamp> {
        self.ramp.as_ref()
    }

    /// Schedule a move to `target` starting at `time`.
    ///
    /// Returns the ramp that was scheduled, or `None` when the change is
    /// applied immediately. Invalid options leave the parameter untouched.
    pub fn set_target(
        &mut self,
        target: f32,
        time: f64,
        options: &RampOptions,
    ) -> Result<Option<ParamRamp>> {
        options.validate()?;
        if !target.is_finite() {
            return Err(Error::InvalidRamp(format!("target {} is not finite", target)));
        }

        if options.is_immediate() {
            self.set_immediate(target);
            return Ok(None);
        }

        let ramp = ParamRamp {
            from: self.value_at(time),
            to: target,
            start_time: time,
            duration: options.duration,
            shape: options.shape,
        };
        self.target = target;
        self.ramp = Some(ramp);
        Ok(Some(ramp))
    }

    #[inline]
    pub fn set_immediate(&mut self, value: f32) {
        self.target = value;
        self.ramp = None;
    }

    #[inline]
    pub fn skip_to_target(&mut self) {
        self.ramp = None;
    }
}

impl Default for SmoothedParam {
    fn default() -> Self {
        Self::new(1.0)
    }
}

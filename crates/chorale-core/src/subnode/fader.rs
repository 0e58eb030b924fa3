//! Transient gain multiplier used for fades.
//!
//! The fader sits in front of the volume stage and multiplies it. At rest it
//! is 1.0; a fade moves it along a ramp and cancelling puts it back to 1.0.

use super::SubNodeHandle;
use crate::backend::{AudioBackend, Param};
use crate::error::Result;
use crate::smooth::{RampOptions, SmoothedParam};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeDirection {
    In,
    Out,
}

#[derive(Debug, Clone)]
pub struct FaderSubNode {
    handle: SubNodeHandle,
    level: SmoothedParam,
}

impl FaderSubNode {
    pub(crate) fn new(handle: SubNodeHandle) -> Self {
        Self {
            handle,
            level: SmoothedParam::new(1.0),
        }
    }

    pub fn handle(&self) -> SubNodeHandle {
        self.handle
    }

    /// Current multiplier.
    pub fn multiplier_at(&self, time: f64) -> f32 {
        self.level.value_at(time)
    }

    /// Whether the multiplier is away from rest or still moving.
    pub fn is_fading(&self, time: f64) -> bool {
        self.level.is_smoothing(time) || self.level.target() != 1.0
    }

    /// Fade in jumps to silence first, fade out starts from wherever it is.
    pub(crate) fn fade(
        &mut self,
        backend: &dyn AudioBackend,
        direction: FadeDirection,
        time: f64,
        options: &RampOptions,
    ) -> Result<()> {
        options.validate()?;
        let prim = self.handle.primitive;

        let target = match direction {
            FadeDirection::In => {
                self.level.set_immediate(0.0);
                backend.cancel_ramp(prim, Param::Gain, 0.0);
                1.0
            }
            FadeDirection::Out => 0.0,
        };

        let ramp = self.level.set_target(target, time, options)?;
        backend.set_param(prim, Param::Gain, target, ramp.as_ref());
        Ok(())
    }

    /// Drop any fade and restore unity. No-op when at rest.
    pub(crate) fn cancel(&mut self, backend: &dyn AudioBackend) {
        if self.level.ramp().is_none() && self.level.target() == 1.0 {
            return;
        }
        self.level.set_immediate(1.0);
        backend.cancel_ramp(self.handle.primitive, Param::Gain, 1.0);
    }
}

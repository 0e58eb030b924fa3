//! Persistent gain stage.

use super::SubNodeHandle;
use crate::backend::{AudioBackend, Param};
use crate::error::{Error, Result};
use crate::smooth::{RampOptions, SmoothedParam};

#[derive(Debug, Clone)]
pub struct VolumeSubNode {
    handle: SubNodeHandle,
    gain: SmoothedParam,
}

impl VolumeSubNode {
    pub(crate) fn new(handle: SubNodeHandle) -> Self {
        Self {
            handle,
            gain: SmoothedParam::new(1.0),
        }
    }

    pub fn handle(&self) -> SubNodeHandle {
        self.handle
    }

    /// Level the stage is set to (the ramp target while ramping).
    pub fn volume(&self) -> f32 {
        self.gain.target()
    }

    pub fn value_at(&self, time: f64) -> f32 {
        self.gain.value_at(time)
    }

    pub fn is_ramping(&self, time: f64) -> bool {
        self.gain.is_smoothing(time)
    }

    /// Validate without touching anything.
    pub fn check(value: f32) -> Result<()> {
        if value.is_nan() || value < 0.0 {
            return Err(Error::InvalidParameter(
                "volume",
                format!("{} must be a non-negative number", value),
            ));
        }
        Ok(())
    }

    pub(crate) fn set(
        &mut self,
        backend: &dyn AudioBackend,
        value: f32,
        time: f64,
        ramp: &RampOptions,
    ) -> Result<()> {
        Self::check(value)?;
        let scheduled = self.gain.set_target(value, time, ramp)?;
        backend.set_param(self.handle.primitive, Param::Gain, value, scheduled.as_ref());
        Ok(())
    }
}

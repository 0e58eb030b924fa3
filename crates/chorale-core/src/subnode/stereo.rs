//! Stereo panner stage.

use super::SubNodeHandle;
use crate::backend::{AudioBackend, Param};
use crate::error::{Error, Result};
use crate::smooth::{RampOptions, SmoothedParam};

#[derive(Debug, Clone)]
pub struct StereoSubNode {
    handle: SubNodeHandle,
    pan: SmoothedParam,
}

impl StereoSubNode {
    pub(crate) fn new(handle: SubNodeHandle) -> Self {
        Self {
            handle,
            pan: SmoothedParam::new(0.0),
        }
    }

    pub fn handle(&self) -> SubNodeHandle {
        self.handle
    }

    /// -1.0 is hard left, 1.0 hard right.
    pub fn pan(&self) -> f32 {
        self.pan.target()
    }

    /// Out-of-range values are clamped. NaN is rejected.
    pub(crate) fn set_pan(
        &mut self,
        backend: &dyn AudioBackend,
        pan: f32,
        time: f64,
        ramp: &RampOptions,
    ) -> Result<()> {
        if pan.is_nan() {
            return Err(Error::InvalidParameter("pan", "NaN".to_string()));
        }
        let pan = pan.clamp(-1.0, 1.0);
        let scheduled = self.pan.set_target(pan, time, ramp)?;
        backend.set_param(self.handle.primitive, Param::Pan, pan, scheduled.as_ref());
        Ok(())
    }
}

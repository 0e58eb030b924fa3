//! 3D positioner stage.

use super::SubNodeHandle;
use crate::backend::AudioBackend;
use crate::error::{Error, Result};
use crate::spatial::{DistanceModel, PanningModel, Quaternion, TransformProvider, Vector3};
use core::f32::consts::TAU;
use core::fmt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Source placement and attenuation. Angles are in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialSettings {
    pub position: Vector3,
    pub orientation: Quaternion,
    pub cone_inner_angle: f32,
    pub cone_outer_angle: f32,
    /// Gain outside the outer cone.
    pub cone_outer_volume: f32,
    pub distance_model: DistanceModel,
    pub min_distance: f32,
    pub max_distance: f32,
    pub rolloff_factor: f32,
    pub panning_model: PanningModel,
}

impl Default for SpatialSettings {
    fn default() -> Self {
        Self {
            position: Vector3::ZERO,
            orientation: Quaternion::IDENTITY,
            cone_inner_angle: TAU,
            cone_outer_angle: TAU,
            cone_outer_volume: 0.0,
            distance_model: DistanceModel::default(),
            min_distance: 1.0,
            max_distance: 10000.0,
            rolloff_factor: 1.0,
            panning_model: PanningModel::default(),
        }
    }
}

impl SpatialSettings {
    pub fn validate(&self) -> Result<()> {
        let (inner, outer) = (self.cone_inner_angle, self.cone_outer_angle);
        if inner.is_nan() || outer.is_nan() || outer < inner {
            return Err(Error::InvalidConeAngles { inner, outer });
        }
        if !self.position.is_finite() {
            return Err(Error::InvalidParameter(
                "position",
                format!("{:?} is not finite", self.position),
            ));
        }
        if self.min_distance.is_nan()
            || self.max_distance.is_nan()
            || self.min_distance <= 0.0
            || self.min_distance > self.max_distance
        {
            return Err(Error::InvalidParameter(
                "min_distance",
                format!(
                    "{} must be positive and not above max_distance {}",
                    self.min_distance, self.max_distance
                ),
            ));
        }
        if self.rolloff_factor.is_nan() || self.rolloff_factor < 0.0 {
            return Err(Error::InvalidParameter(
                "rolloff_factor",
                format!("{} must be non-negative", self.rolloff_factor),
            ));
        }
        if !(0.0..=1.0).contains(&self.cone_outer_volume) {
            return Err(Error::InvalidParameter(
                "cone_outer_volume",
                format!("{} must be within 0..=1", self.cone_outer_volume),
            ));
        }
        Ok(())
    }

    /// Distance attenuation for a listener at `listener`.
    pub fn distance_gain(&self, listener: Vector3) -> f32 {
        self.distance_model.gain(
            self.position.distance(listener),
            self.min_distance,
            self.max_distance,
            self.rolloff_factor,
        )
    }

    /// Cone attenuation for a listener at `listener`.
    pub fn cone_gain(&self, listener: Vector3) -> f32 {
        if self.cone_inner_angle >= TAU {
            return 1.0;
        }
        let to_listener = (listener - self.position).normalized();
        if to_listener == Vector3::ZERO {
            return 1.0;
        }
        let angle = self
            .orientation
            .forward()
            .dot(to_listener)
            .clamp(-1.0, 1.0)
            .acos();
        let (half_inner, half_outer) = (self.cone_inner_angle * 0.5, self.cone_outer_angle * 0.5);

        if angle <= half_inner {
            1.0
        } else if angle >= half_outer {
            self.cone_outer_volume
        } else {
            let t = (angle - half_inner) / (half_outer - half_inner);
            1.0 + (self.cone_outer_volume - 1.0) * t
        }
    }
}

pub struct SpatialSubNode {
    handle: SubNodeHandle,
    settings: SpatialSettings,
    transform: Option<Arc<dyn TransformProvider>>,
}

impl fmt::Debug for SpatialSubNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpatialSubNode")
            .field("handle", &self.handle)
            .field("settings", &self.settings)
            .field("attached", &self.transform.is_some())
            .finish()
    }
}

impl SpatialSubNode {
    pub(crate) fn new(handle: SubNodeHandle) -> Self {
        Self {
            handle,
            settings: SpatialSettings::default(),
            transform: None,
        }
    }

    pub fn handle(&self) -> SubNodeHandle {
        self.handle
    }

    pub fn settings(&self) -> &SpatialSettings {
        &self.settings
    }

    pub fn is_attached(&self) -> bool {
        self.transform.is_some()
    }

    pub(crate) fn set_settings(
        &mut self,
        backend: &dyn AudioBackend,
        settings: SpatialSettings,
    ) -> Result<()> {
        settings.validate()?;
        self.settings = settings;
        backend.update_spatial(self.handle.primitive, &self.settings);
        Ok(())
    }

    /// Follow a transform. Position and orientation are polled every tick.
    pub(crate) fn attach(&mut self, backend: &dyn AudioBackend, provider: Arc<dyn TransformProvider>) {
        self.transform = Some(provider);
        self.update(backend);
    }

    pub(crate) fn detach(&mut self) -> bool {
        self.transform.take().is_some()
    }

    /// Pull the attached transform. Returns true when the backend was updated.
    pub(crate) fn update(&mut self, backend: &dyn AudioBackend) -> bool {
        let Some(provider) = &self.transform else {
            return false;
        };
        let position = provider.world_position();
        let orientation = provider.world_orientation();
        if !position.is_finite() {
            return false;
        }
        if position == self.settings.position && orientation == self.settings.orientation {
            return false;
        }

        self.settings.position = position;
        self.settings.orientation = orientation;
        backend.update_spatial(self.handle.primitive, &self.settings);
        true
    }
}

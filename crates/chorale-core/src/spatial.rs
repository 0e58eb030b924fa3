//! Spatial math and the transform collaborator interface.
//!
//! The engine does not own a scene graph. Anything that can report a world
//! position and orientation implements [`TransformProvider`]; listeners and
//! spatial sub-nodes poll it once per tick.

use core::ops::{Add, Mul, Sub};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3::new(0.0, 0.0, 0.0);
    pub const UP: Vector3 = Vector3::new(0.0, 1.0, 0.0);
    pub const FORWARD: Vector3 = Vector3::new(0.0, 0.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Vector3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Vector3) -> Vector3 {
        Vector3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn distance(self, other: Vector3) -> f32 {
        (self - other).length()
    }

    pub fn normalized(self) -> Vector3 {
        let len = self.length();
        if len <= f32::EPSILON {
            return Vector3::ZERO;
        }
        self * (1.0 / len)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Vector3 {
    type Output = Vector3;
    fn add(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vector3 {
    type Output = Vector3;
    fn sub(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vector3 {
    type Output = Vector3;
    fn mul(self, rhs: f32) -> Vector3 {
        Vector3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Unit quaternion describing an orientation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    pub fn from_axis_angle(axis: Vector3, radians: f32) -> Self {
        let axis = axis.normalized();
        let (sin, cos) = (radians * 0.5).sin_cos();
        Self {
            x: axis.x * sin,
            y: axis.y * sin,
            z: axis.z * sin,
            w: cos,
        }
    }

    /// Rotate a vector by this orientation.
    pub fn rotate(self, v: Vector3) -> Vector3 {
        let q = Vector3::new(self.x, self.y, self.z);
        let t = q.cross(v) * 2.0;
        v + t * self.w + q.cross(t)
    }

    /// Direction the orientation is facing (rotated +Z).
    pub fn forward(self) -> Vector3 {
        self.rotate(Vector3::FORWARD)
    }

    pub fn up(self) -> Vector3 {
        self.rotate(Vector3::UP)
    }
}

/// World transform source for listeners and spatial sub-nodes.
pub trait TransformProvider: Send + Sync {
    fn world_position(&self) -> Vector3;

    fn world_orientation(&self) -> Quaternion {
        Quaternion::IDENTITY
    }
}

/// Distance attenuation curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceModel {
    Linear,
    #[default]
    Inverse,
    Exponential,
}

impl DistanceModel {
    /// Gain at `distance` for the given reference/max distance and rolloff.
    pub fn gain(self, distance: f32, min_distance: f32, max_distance: f32, rolloff: f32) -> f32 {
        let min_distance = min_distance.max(f32::EPSILON);
        match self {
            DistanceModel::Linear => {
                let d = distance.clamp(min_distance, max_distance);
                let span = (max_distance - min_distance).max(f32::EPSILON);
                (1.0 - rolloff * (d - min_distance) / span).clamp(0.0, 1.0)
            }
            DistanceModel::Inverse => {
                let d = distance.max(min_distance);
                min_distance / (min_distance + rolloff * (d - min_distance))
            }
            DistanceModel::Exponential => {
                let d = distance.max(min_distance);
                (d / min_distance).powf(-rolloff)
            }
        }
    }
}

/// Panning algorithm used by spatial sub-nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanningModel {
    #[default]
    EqualPower,
    Hrtf,
}

//! Device/backend abstraction.
//!
//! The graph kernel never touches real signal processing. Every node, pin and
//! sub-node is bound to an opaque [`PrimitiveId`] handed out by an
//! [`AudioBackend`], and every pin-level connection is mirrored to the backend
//! as a `connect`/`disconnect` pair.
//!
//! Operations that can wait on I/O or a user gesture (primitive creation,
//! decoding, resume) return a [`BackendFuture`]. Everything else is
//! synchronous.

use crate::error::Result;
use crate::smooth::ParamRamp;
use crate::spatial::{Quaternion, Vector3};
use crate::subnode::{SpatialSettings, SubNodeKind};
use core::fmt;
use core::future::Future;
use core::pin::Pin;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Boxed future returned by asynchronous backend calls.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Opaque handle to a backend signal-processing object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimitiveId(pub u64);

impl fmt::Display for PrimitiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "prim#{}", self.0)
    }
}

/// What kind of primitive the graph is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    /// The device output every main bus ends at.
    Destination,
    /// Unity pass-through used as the head of a bus or send chain.
    Junction,
    /// Summing point all voices of one sound feed into.
    Source,
    /// Processing stage inside a sub-node chain.
    SubNode(SubNodeKind),
    /// Spatial listener.
    Listener,
}

/// Scalar parameters a backend primitive can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    Gain,
    Pan,
}

/// Lifecycle of the underlying audio resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextState {
    Closed,
    /// Suspended by the platform (phone call, another app took the device).
    Interrupted,
    Running,
    /// Waiting for unlock or suspended on request.
    #[default]
    Suspended,
}

/// Where a sound's data comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum SoundSource {
    /// Location the backend knows how to fetch.
    Url(String),
    /// Encoded bytes already in memory.
    Encoded(Arc<[u8]>),
    /// A buffer that has already been decoded.
    Buffer(SoundBuffer),
}

impl SoundSource {
    /// File extension of a URL source, lower-cased, without query string.
    pub fn format_hint(&self) -> Option<String> {
        match self {
            SoundSource::Url(url) => {
                let path = url.split(['?', '#']).next().unwrap_or(url);
                let file = path.rsplit('/').next().unwrap_or(path);
                file.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())
            }
            _ => None,
        }
    }
}

impl From<&str> for SoundSource {
    fn from(url: &str) -> Self {
        SoundSource::Url(url.to_string())
    }
}

impl From<String> for SoundSource {
    fn from(url: String) -> Self {
        SoundSource::Url(url)
    }
}

impl From<SoundBuffer> for SoundSource {
    fn from(buffer: SoundBuffer) -> Self {
        SoundSource::Buffer(buffer)
    }
}

/// Decoded (or opened, for streams) audio data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundBuffer {
    pub id: u64,
    /// Length in seconds. `None` for live or unbounded streams.
    pub duration: Option<f64>,
    pub channels: u16,
    pub sample_rate: u32,
}

/// Instruction to begin playback on one physical voice.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceStart {
    pub physical: usize,
    pub buffer: SoundBuffer,
    /// Primitive the voice output is wired into.
    pub output: PrimitiveId,
    /// Position to start from, in seconds.
    pub offset: f64,
    pub looping: bool,
    pub loop_start: f64,
    pub loop_end: f64,
    pub playback_rate: f32,
}

/// Device/backend interface the graph kernel depends on.
pub trait AudioBackend: Send + Sync {
    /// Instantiate a primitive. May wait on device readiness.
    fn create_primitive(&self, kind: PrimitiveKind) -> BackendFuture<'_, PrimitiveId>;

    fn release_primitive(&self, primitive: PrimitiveId);

    fn connect(&self, from: PrimitiveId, to: PrimitiveId);

    fn disconnect(&self, from: PrimitiveId, to: PrimitiveId);

    /// Set a scalar parameter, optionally along a ramp.
    fn set_param(&self, primitive: PrimitiveId, param: Param, value: f32, ramp: Option<&ParamRamp>);

    /// Cancel any ramp scheduled on the parameter and hold `value`.
    fn cancel_ramp(&self, primitive: PrimitiveId, param: Param, value: f32) {
        self.set_param(primitive, param, value, None);
    }

    fn update_spatial(&self, primitive: PrimitiveId, settings: &SpatialSettings);

    fn update_listener(&self, primitive: PrimitiveId, position: Vector3, orientation: Quaternion);

    /// Fill `out` with the analyzer's current frequency magnitudes in dB.
    fn frequency_data(&self, primitive: PrimitiveId, out: &mut [f32]);

    /// Playback clock in seconds.
    fn current_time(&self) -> f64;

    /// Whether an encoded format (file extension, e.g. `"ogg"`) is decodable.
    fn is_format_supported(&self, format: &str) -> bool;

    /// Decode a static buffer, or open a stream when `streaming` is set.
    fn load(&self, source: &SoundSource, streaming: bool) -> BackendFuture<'_, SoundBuffer>;

    fn state(&self) -> ContextState;

    fn resume(&self) -> BackendFuture<'_, ()>;

    fn suspend(&self) -> BackendFuture<'_, ()>;

    /// Clear a user-gesture gate. Most backends have none.
    fn unlock(&self) -> BackendFuture<'_, ()> {
        self.resume()
    }

    fn start_voice(&self, start: &VoiceStart);

    fn stop_voice(&self, physical: usize);
}

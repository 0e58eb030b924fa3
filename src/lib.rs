//! # Chorale - Game Audio Engine
//!
//! Buses, sends, spatial sounds and virtual voices behind one engine handle.
//!
//! ## Architecture
//!
//! Chorale is an umbrella crate that coordinates:
//! - **chorale-core** - Node graph (pins, connections, sub-node chains, ramps, backend trait)
//! - **chorale-voice** - Virtual voice scheduling against a fixed physical voice pool
//!
//! The engine itself owns the collections (main buses, auxiliary buses,
//! sounds, listeners), the dispose cascade and the per-frame tick.
//!
//! ## Quick Start
//!
//! ```ignore
//! use chorale::prelude::*;
//!
//! let engine = AudioEngine::builder(backend).build_async().await?;
//! let music = engine.create_main_bus_async("music").await?;
//! let reverb = engine.create_bus_async("reverb", Some(&music)).await?;
//!
//! let step = engine
//!     .create_sound_async("step", "sfx/step.ogg", SoundOptions::default())
//!     .await?;
//! step.create_send_async(&reverb, TapPoint::PostFader).await?.set_gain(0.3, None)?;
//! step.play()?;
//!
//! // every frame
//! engine.tick();
//! ```
//!
//! ## Ticking
//!
//! Nothing happens on a timer. [`AudioEngine::tick`] rewires dirty sub-node
//! chains, polls transforms and listeners, runs the voice scheduler and hands
//! the resulting start/stop commands to the backend.

/// Re-export of chorale-core for direct access
pub use chorale_core as core;

/// Re-export of chorale-voice for direct access
pub use chorale_voice as voice;

// Core types
pub use chorale_core::{
    AnalyzerSettings, AudioBackend, ContextState, DistanceModel, FadeDirection, NodeEvent,
    NodeEventKind, NodeId, ObserverId, PanningModel, Quaternion, RampOptions, RampShape,
    SoundBuffer, SoundSource, SpatialSettings, SubNodeKind, TapPoint, TransformProvider, Vector3,
};

// Voice types
pub use chorale_voice::{VoiceCommand, VoiceId, VoiceLimits, VoiceState};

mod error;
pub use error::{Error, Result};

mod config;
pub use config::EngineConfig;

mod options;
pub use options::{PlayOptions, SoundOptions};

mod builder;
mod engine;
pub use builder::AudioEngineBuilder;
pub use engine::{AudioEngine, EngineId};

mod node;
pub use node::NodeHandle;

mod bus;
pub use bus::{AuxSend, Bus, BusKind};

mod sound;
pub use sound::Sound;

mod listener;
pub use listener::{Listener, ListenerId};

pub mod registry;
pub use registry::{
    create_bus_async, create_main_bus_async, create_sound_async, create_sound_buffer_async,
    create_streaming_sound_async, last_created_engine,
};

/// Convenience prelude for common imports
pub mod prelude {
    // Main engine
    pub use crate::{AudioEngine, AudioEngineBuilder, EngineConfig};

    // Graph handles
    pub use crate::{AuxSend, Bus, Listener, NodeHandle, Sound};

    // Options and parameters
    pub use crate::{PlayOptions, RampOptions, RampShape, SoundOptions, TapPoint};

    pub use crate::{AudioBackend, ContextState, SubNodeKind, VoiceState};
    pub use crate::{Error, Result};
}

//! Integration test modules for chorale
//!
//! - engine: lifecycle, configuration, master volume, events
//! - routing: buses, output routes, sub-node stages, sends
//! - sounds: loading, playback control, voice scheduling
//! - listeners: listener placement and transforms

pub mod engine;
pub mod listeners;
pub mod routing;
pub mod sounds;

//! Virtual voice scheduling for chorale.
//!
//! Any number of sounds may ask to play; only a fixed number of physical
//! voices exist. The scheduler arbitrates between them every tick:
//!
//! - **[`VirtualVoice`]** - a logical playback request with its own clock
//! - **[`VoiceScheduler`]** - priority sort, per-category limits, mute/unmute
//! - **[`PhysicalPool`]** - the hardware channels, kept compacted
//!
//! # Quick Start
//!
//! ```ignore
//! use chorale_voice::{PlaybackParams, VoiceFlags, VoiceLimits, VoiceScheduler};
//!
//! let mut scheduler = VoiceScheduler::new(VoiceLimits::default())?;
//! let voice = scheduler.acquire(sound_node, VoiceFlags::default(), 0);
//! scheduler.start(voice, PlaybackParams::default(), now)?;
//!
//! for command in scheduler.tick(now) {
//!     // hand Start/Stop/Mute/Pause to the backend
//! }
//! ```

pub mod error;
pub use error::{Error, Result};

mod voice;
pub use voice::{compare, PlaybackParams, VirtualVoice, VoiceFlags, VoiceId, VoiceState};

mod physical;
pub use physical::{PhysicalPool, PhysicalVoice};

mod scheduler;
pub use scheduler::{CategoryCounts, VoiceCommand, VoiceLimits, VoiceScheduler};

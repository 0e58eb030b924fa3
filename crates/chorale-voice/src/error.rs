//! Error types for chorale-voice.

use crate::voice::VoiceId;
use thiserror::Error;

/// Result type alias for chorale-voice operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in chorale-voice.
///
/// Running out of voices is not one of them: the scheduler mutes instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Invalid limit configuration.
    #[error("Invalid voice limits: {0}")]
    InvalidLimits(String),

    /// Voice id was never handed out.
    #[error("Unknown voice {0}")]
    UnknownVoice(VoiceId),

    /// Voice was released by its owner.
    #[error("Voice {0} has been released")]
    Released(VoiceId),

    /// Invalid playback parameter.
    #[error("Invalid playback parameter: {0}")]
    InvalidPlayback(String),
}

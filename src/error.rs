//! Centralized error type for the chorale umbrella crate.
//!
//! Wraps the subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] chorale_core::Error),

    #[error("Voice: {0}")]
    Voice(#[from] chorale_voice::Error),

    /// Free function called with no engine given and none registered.
    #[error("No audio engine has been created")]
    NoEngine,

    #[error("Sound options: {0}")]
    Options(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn disposed(what: impl Into<String>) -> Self {
        Error::Core(chorale_core::Error::Disposed(what.into()))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

//! Virtual voices: logical playback requests independent of hardware.
//!
//! A virtual voice keeps advancing its logical position while muted, so that
//! when it regains a physical voice it resumes where it would have been.

use crate::error::{Error, Result};
use chorale_core::NodeId;
use core::cmp::Ordering;
use serde::{Deserialize, Serialize};

/// Index of a virtual voice. Stable for the voice's lifetime and reused
/// after the voice is released.
pub type VoiceId = usize;

/// Voice lifecycle. Declaration order is the sort order: lower is more active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceState {
    /// Waiting for its first physical voice
    Starting,
    /// Started again from the beginning, waiting for a physical voice
    Restarting,
    /// Resumed after a pause, waiting for a physical voice
    Resuming,
    /// Capacity returned after a mute, waiting for a physical voice
    Unmuting,
    /// Bound to a physical voice and audible
    Started,
    /// Losing its physical voice to capacity pressure
    Muting,
    /// Logically playing without a physical voice
    Muted,
    /// Pause requested, applied on the next tick
    Pausing,
    Paused,
    /// Stop requested, applied on the next tick
    Stopping,
    /// Idle and recyclable
    #[default]
    Stopped,
}

impl VoiceState {
    /// Waiting to be bound to a physical voice.
    #[inline]
    pub fn is_waiting(self) -> bool {
        self < VoiceState::Started
    }

    /// Competes for capacity on the next tick.
    #[inline]
    pub fn wants_capacity(self) -> bool {
        self <= VoiceState::Started || self == VoiceState::Muted
    }

    /// Logically playing, audible or not.
    #[inline]
    pub fn is_playing(self) -> bool {
        self <= VoiceState::Muted
    }
}

/// Capacity categories a voice counts against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct VoiceFlags {
    pub looping: bool,
    /// Streamed from disk or network rather than decoded in memory.
    pub streamed: bool,
    pub spatial: bool,
}

/// What to play, in seconds of media time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackParams {
    /// Position to start from.
    pub offset: f64,
    /// Position playback ends at when not looping. `None` plays forever.
    pub end: Option<f64>,
    pub loop_start: f64,
    /// Zero or below `loop_start` loops the whole media up to `end`.
    pub loop_end: f64,
    pub rate: f64,
}

impl Default for PlaybackParams {
    fn default() -> Self {
        Self {
            offset: 0.0,
            end: None,
            loop_start: 0.0,
            loop_end: 0.0,
            rate: 1.0,
        }
    }
}

impl PlaybackParams {
    pub fn validate(&self) -> Result<()> {
        if !self.offset.is_finite() || self.offset < 0.0 {
            return Err(Error::InvalidPlayback(format!(
                "offset {} must be a non-negative number of seconds",
                self.offset
            )));
        }
        if !self.rate.is_finite() || self.rate <= 0.0 {
            return Err(Error::InvalidPlayback(format!(
                "rate {} must be positive",
                self.rate
            )));
        }
        if self.end.is_some_and(|end| end.is_nan() || end < 0.0) {
            return Err(Error::InvalidPlayback(format!(
                "end {:?} must be non-negative",
                self.end
            )));
        }
        Ok(())
    }

    fn loop_region(&self) -> Option<(f64, f64)> {
        let end = if self.loop_end > self.loop_start {
            self.loop_end
        } else {
            self.end?
        };
        (end > self.loop_start).then_some((self.loop_start, end))
    }
}

/// One logical attempt to play a sound.
#[derive(Debug, Clone)]
pub struct VirtualVoice {
    pub(crate) id: VoiceId,
    pub(crate) source: NodeId,
    pub(crate) state: VoiceState,
    pub(crate) priority: i32,
    pub(crate) flags: VoiceFlags,
    pub(crate) physical: Option<usize>,
    pub(crate) params: PlaybackParams,
    /// Media position at `anchor`.
    pub(crate) position: f64,
    /// Clock time the position was taken at. `None` while frozen.
    pub(crate) anchor: Option<f64>,
    pub(crate) owned: bool,
}

impl VirtualVoice {
    pub(crate) fn new(id: VoiceId, source: NodeId, flags: VoiceFlags, priority: i32) -> Self {
        Self {
            id,
            source,
            state: VoiceState::Stopped,
            priority,
            flags,
            physical: None,
            params: PlaybackParams::default(),
            position: 0.0,
            anchor: None,
            owned: true,
        }
    }

    pub fn id(&self) -> VoiceId {
        self.id
    }

    /// Node the voice plays into.
    pub fn source(&self) -> NodeId {
        self.source
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn flags(&self) -> VoiceFlags {
        self.flags
    }

    /// Physical channel currently bound, if any.
    pub fn physical(&self) -> Option<usize> {
        self.physical
    }

    pub fn params(&self) -> &PlaybackParams {
        &self.params
    }

    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// Media position at clock time `now`, wrapped into the loop region.
    pub fn position_at(&self, now: f64) -> f64 {
        let elapsed = self
            .anchor
            .map_or(0.0, |t| (now - t).max(0.0) * self.params.rate);
        let raw = self.position + elapsed;

        if self.flags.looping {
            if let Some((start, end)) = self.params.loop_region() {
                if raw >= end {
                    return start + (raw - start).rem_euclid(end - start);
                }
            }
        }
        raw
    }

    /// A non-looping voice that has played past its end.
    pub fn is_finished_at(&self, now: f64) -> bool {
        !self.flags.looping && self.params.end.is_some_and(|end| self.position_at(now) >= end)
    }

    pub(crate) fn freeze(&mut self, now: f64) {
        self.position = self.position_at(now);
        self.anchor = None;
    }

    pub(crate) fn run_from(&mut self, position: f64, now: f64) {
        self.position = position;
        self.anchor = Some(now);
    }
}

/// Scheduling order: state, then priority (high first), then looping first,
/// then streamed first.
pub fn compare(a: &VirtualVoice, b: &VirtualVoice) -> Ordering {
    a.state
        .cmp(&b.state)
        .then_with(|| b.priority.cmp(&a.priority))
        .then_with(|| b.flags.looping.cmp(&a.flags.looping))
        .then_with(|| b.flags.streamed.cmp(&a.flags.streamed))
}

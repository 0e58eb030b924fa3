//! Sounds: a source node plus a small round-robin pool of virtual voices.
//!
//! Repeated `play` calls cycle through at most `max_instances` voices. Once
//! the pool is full the oldest slot is restarted instead of asking the
//! scheduler for another voice.

use crate::engine::AudioEngine;
use crate::node::NodeHandle;
use crate::options::{PlayOptions, SoundOptions};
use crate::{Error, Result};
use chorale_core::{NodeId, PrimitiveId, SoundBuffer};
use chorale_voice::{PlaybackParams, VoiceFlags, VoiceId, VoiceState};
use core::ops::Deref;

/// Engine-side bookkeeping for one sound.
#[derive(Debug, Clone)]
pub(crate) struct SoundEntry {
    pub(crate) primitive: PrimitiveId,
    pub(crate) buffer: SoundBuffer,
    pub(crate) options: SoundOptions,
    pub(crate) streaming: bool,
    pub(crate) voices: Vec<VoiceId>,
    pub(crate) next_voice_index: usize,
}

impl SoundEntry {
    pub(crate) fn new(
        primitive: PrimitiveId,
        buffer: SoundBuffer,
        options: SoundOptions,
        streaming: bool,
    ) -> Self {
        Self {
            primitive,
            buffer,
            options,
            streaming,
            voices: Vec::new(),
            next_voice_index: 0,
        }
    }

    fn params(&self, overrides: &PlayOptions) -> (PlaybackParams, bool) {
        let options = &self.options;
        let looping = overrides.looping.unwrap_or(options.looping);
        let offset = overrides.start_offset.unwrap_or(options.start_offset);
        let duration = overrides.duration.unwrap_or(options.duration);

        let end = if duration > 0.0 {
            Some(offset + duration)
        } else {
            self.buffer.duration
        };
        let params = PlaybackParams {
            offset,
            end,
            loop_start: overrides.loop_start.unwrap_or(options.loop_start),
            loop_end: overrides.loop_end.unwrap_or(options.loop_end),
            rate: options.effective_rate(),
        };
        (params, looping)
    }
}

/// Handle to a static or streaming sound.
#[derive(Debug, Clone, PartialEq)]
pub struct Sound {
    node: NodeHandle,
}

impl Sound {
    pub(crate) fn new(engine: AudioEngine, id: NodeId) -> Self {
        Self {
            node: NodeHandle::new(engine, id),
        }
    }

    fn missing(&self) -> Error {
        Error::disposed(format!("sound {}", self.node.id()))
    }

    pub fn options(&self) -> Option<SoundOptions> {
        self.node
            .engine()
            .collections()
            .sounds
            .get(&self.node.id())
            .map(|s| s.options)
    }

    pub fn buffer(&self) -> Option<SoundBuffer> {
        self.node
            .engine()
            .collections()
            .sounds
            .get(&self.node.id())
            .map(|s| s.buffer)
    }

    pub fn is_streaming(&self) -> bool {
        self.node
            .engine()
            .collections()
            .sounds
            .get(&self.node.id())
            .is_some_and(|s| s.streaming)
    }

    /// Voices this sound currently holds, oldest first.
    pub fn voices(&self) -> Vec<VoiceId> {
        self.node
            .engine()
            .collections()
            .sounds
            .get(&self.node.id())
            .map(|s| s.voices.clone())
            .unwrap_or_default()
    }

    /// Play with the sound's own options.
    pub fn play(&self) -> Result<VoiceId> {
        self.play_with(PlayOptions::default())
    }

    /// Request playback on the next voice of the pool. The voice becomes
    /// audible on the next tick if the scheduler has room for it.
    pub fn play_with(&self, overrides: PlayOptions) -> Result<VoiceId> {
        let engine = self.node.engine();
        engine.ensure_live()?;
        let id = self.node.id();
        let now = engine.current_time();

        let mut collections = engine.collections();
        let entry = collections.sounds.get_mut(&id).ok_or_else(|| self.missing())?;
        let (params, looping) = entry.params(&overrides);
        let flags = VoiceFlags {
            looping,
            streamed: entry.streaming,
            spatial: entry.options.spatial_enabled,
        };
        let max = entry.options.max_instances.max(1);

        let mut voices = engine.voices();
        let voice = if entry.voices.len() < max {
            let voice = voices.acquire(id, flags, entry.options.priority);
            entry.voices.push(voice);
            voice
        } else {
            let voice = entry.voices[entry.next_voice_index % entry.voices.len()];
            voices.set_flags(voice, flags)?;
            voice
        };
        entry.next_voice_index = (entry.next_voice_index + 1) % max;
        voices.start(voice, params, now)?;

        tracing::trace!("{} play on voice {}", id, voice);
        Ok(voice)
    }

    /// Pause every playing voice of this sound.
    pub fn pause(&self) -> Result<()> {
        self.for_each_voice(|voices, voice, now| voices.pause(voice, now).map(drop))
    }

    pub fn resume(&self) -> Result<()> {
        self.for_each_voice(|voices, voice, now| voices.resume(voice, now).map(drop))
    }

    pub fn stop(&self) -> Result<()> {
        self.for_each_voice(|voices, voice, _| voices.stop(voice).map(drop))
    }

    fn for_each_voice(
        &self,
        mut f: impl FnMut(&mut chorale_voice::VoiceScheduler, VoiceId, f64) -> chorale_voice::Result<()>,
    ) -> Result<()> {
        let engine = self.node.engine();
        engine.ensure_live()?;
        let now = engine.current_time();
        let collections = engine.collections();
        let entry = collections
            .sounds
            .get(&self.node.id())
            .ok_or_else(|| self.missing())?;
        let mut voices = engine.voices();
        for voice in &entry.voices {
            f(&mut *voices, *voice, now)?;
        }
        Ok(())
    }

    /// Most active state among the sound's voices, `Stopped` when it has none.
    pub fn state(&self) -> VoiceState {
        let engine = self.node.engine();
        let collections = engine.collections();
        let Some(entry) = collections.sounds.get(&self.node.id()) else {
            return VoiceState::Stopped;
        };
        let voices = engine.voices();
        entry
            .voices
            .iter()
            .filter_map(|v| voices.state(*v))
            .min()
            .unwrap_or(VoiceState::Stopped)
    }

    pub fn set_priority(&self, priority: i32) -> Result<()> {
        let engine = self.node.engine();
        let mut collections = engine.collections();
        let entry = collections
            .sounds
            .get_mut(&self.node.id())
            .ok_or_else(|| self.missing())?;
        entry.options.priority = priority;
        let mut voices = engine.voices();
        for voice in &entry.voices {
            voices.set_priority(*voice, priority)?;
        }
        Ok(())
    }
}

impl Deref for Sound {
    type Target = NodeHandle;

    fn deref(&self) -> &NodeHandle {
        &self.node
    }
}

//! Per-tick arbitration of virtual voices against the physical pool.
//!
//! Each [`VoiceScheduler::tick`]:
//!
//! 1. applies pending stop/pause requests and retires muted voices that have
//!    run past their end;
//! 2. stable-sorts every voice by [`compare`];
//! 3. walks the sorted list, admitting voices while their categories
//!    (static/streamed, plus spatial) have room. Started voices that don't
//!    fit are muted, waiting ones go straight to muted;
//! 4. compacts the physical pool;
//! 5. binds admitted waiting voices to free slots in sorted order. Voices
//!    left without a slot are muted and compete again next tick.
//!
//! The scheduler never talks to a backend. It returns [`VoiceCommand`]s for
//! the caller to apply.

use crate::error::{Error, Result};
use crate::physical::PhysicalPool;
use crate::voice::{compare, PlaybackParams, VirtualVoice, VoiceFlags, VoiceId, VoiceState};
use chorale_core::NodeId;
use serde::{Deserialize, Serialize};

/// Category maxima and pool size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceLimits {
    pub max_static: usize,
    pub max_streamed: usize,
    pub max_spatial: usize,
    /// Physical pool size. Defaults to `max_static + max_streamed`.
    pub physical: Option<usize>,
}

impl Default for VoiceLimits {
    fn default() -> Self {
        Self {
            max_static: 64,
            max_streamed: 8,
            max_spatial: 64,
            physical: None,
        }
    }
}

impl VoiceLimits {
    pub fn physical_voices(&self) -> usize {
        self.physical
            .unwrap_or(self.max_static.saturating_add(self.max_streamed))
    }

    pub fn validate(&self) -> Result<()> {
        if self.physical_voices() == 0 {
            return Err(Error::InvalidLimits(
                "physical pool must hold at least one voice".to_string(),
            ));
        }
        Ok(())
    }

    fn admits(&self, counts: &CategoryCounts, flags: VoiceFlags) -> bool {
        let primary = if flags.streamed {
            counts.streamed < self.max_streamed
        } else {
            counts.static_ < self.max_static
        };
        primary && (!flags.spatial || counts.spatial < self.max_spatial)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CategoryCounts {
    pub static_: usize,
    pub streamed: usize,
    pub spatial: usize,
}

impl CategoryCounts {
    fn add(&mut self, flags: VoiceFlags) {
        if flags.streamed {
            self.streamed += 1;
        } else {
            self.static_ += 1;
        }
        if flags.spatial {
            self.spatial += 1;
        }
    }
}

/// Instruction for the backend, produced by a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VoiceCommand {
    /// Begin playback on `physical` from `offset` seconds.
    Start {
        voice: VoiceId,
        physical: usize,
        offset: f64,
    },
    Stop { voice: VoiceId, physical: usize },
    /// Capacity taken away. The voice keeps playing logically.
    Mute { voice: VoiceId, physical: usize },
    Pause { voice: VoiceId, physical: usize },
}

impl VoiceCommand {
    pub fn voice(&self) -> VoiceId {
        match *self {
            VoiceCommand::Start { voice, .. }
            | VoiceCommand::Stop { voice, .. }
            | VoiceCommand::Mute { voice, .. }
            | VoiceCommand::Pause { voice, .. } => voice,
        }
    }

    pub fn physical(&self) -> usize {
        match *self {
            VoiceCommand::Start { physical, .. }
            | VoiceCommand::Stop { physical, .. }
            | VoiceCommand::Mute { physical, .. }
            | VoiceCommand::Pause { physical, .. } => physical,
        }
    }
}

/// Virtual voice table plus the physical pool.
#[derive(Debug, Clone)]
pub struct VoiceScheduler {
    limits: VoiceLimits,
    voices: Vec<VirtualVoice>,
    /// Scheduling order, carried across ticks so ties keep their order.
    order: Vec<VoiceId>,
    /// Released, stopped voices ready for reuse.
    free: Vec<VoiceId>,
    pool: PhysicalPool,
    /// Commands raised outside a tick, emitted by the next one.
    pending: Vec<VoiceCommand>,
}

impl VoiceScheduler {
    pub fn new(limits: VoiceLimits) -> Result<Self> {
        limits.validate()?;
        Ok(Self {
            pool: PhysicalPool::new(limits.physical_voices()),
            limits,
            voices: Vec::new(),
            order: Vec::new(),
            free: Vec::new(),
            pending: Vec::new(),
        })
    }

    pub fn limits(&self) -> &VoiceLimits {
        &self.limits
    }

    pub fn pool(&self) -> &PhysicalPool {
        &self.pool
    }

    pub fn voice(&self, id: VoiceId) -> Option<&VirtualVoice> {
        self.voices.get(id)
    }

    pub fn voices(&self) -> &[VirtualVoice] {
        &self.voices
    }

    /// Current scheduling order.
    pub fn order(&self) -> &[VoiceId] {
        &self.order
    }

    pub fn state(&self, id: VoiceId) -> Option<VoiceState> {
        self.voices.get(id).map(|v| v.state)
    }

    /// Voices per state.
    pub fn count(&self, state: VoiceState) -> usize {
        self.voices.iter().filter(|v| v.state == state).count()
    }

    fn owned_mut(&mut self, id: VoiceId) -> Result<&mut VirtualVoice> {
        let voice = self.voices.get_mut(id).ok_or(Error::UnknownVoice(id))?;
        if !voice.owned {
            return Err(Error::Released(id));
        }
        Ok(voice)
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Hand out a stopped voice, recycling a released one when available.
    pub fn acquire(&mut self, source: NodeId, flags: VoiceFlags, priority: i32) -> VoiceId {
        match self.free.pop() {
            Some(id) => {
                self.voices[id] = VirtualVoice::new(id, source, flags, priority);
                id
            }
            None => {
                let id = self.voices.len();
                self.voices.push(VirtualVoice::new(id, source, flags, priority));
                self.order.push(id);
                id
            }
        }
    }

    /// Play from `params.offset`. A voice that is already playing restarts.
    pub fn start(&mut self, id: VoiceId, params: PlaybackParams, now: f64) -> Result<()> {
        params.validate()?;
        let voice = self.owned_mut(id)?;
        let previous = voice.state;
        let bound = voice.physical.take();

        voice.params = params;
        voice.run_from(params.offset, now);
        voice.state = if previous == VoiceState::Stopped {
            VoiceState::Starting
        } else {
            VoiceState::Restarting
        };

        if let Some(physical) = bound {
            self.pending.push(VoiceCommand::Stop {
                voice: id,
                physical,
            });
        }
        // newest request goes last among equals
        self.order.retain(|v| *v != id);
        self.order.push(id);
        tracing::trace!("voice {} {:?} -> {:?}", id, previous, self.voices[id].state);
        Ok(())
    }

    /// Request a pause. Takes effect on the next tick.
    pub fn pause(&mut self, id: VoiceId, now: f64) -> Result<bool> {
        let voice = self.owned_mut(id)?;
        if !voice.state.is_playing() {
            return Ok(false);
        }
        voice.freeze(now);
        voice.state = if voice.physical.is_some() {
            VoiceState::Pausing
        } else {
            VoiceState::Paused
        };
        Ok(true)
    }

    /// Continue a paused voice from where it stopped.
    pub fn resume(&mut self, id: VoiceId, now: f64) -> Result<bool> {
        let voice = self.owned_mut(id)?;
        match voice.state {
            VoiceState::Paused => {
                voice.anchor = Some(now);
                voice.state = VoiceState::Resuming;
                Ok(true)
            }
            // not yet applied: the physical voice is still running
            VoiceState::Pausing => {
                voice.anchor = Some(now);
                voice.state = VoiceState::Started;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Request a stop. Takes effect on the next tick.
    pub fn stop(&mut self, id: VoiceId) -> Result<bool> {
        let voice = self.voices.get_mut(id).ok_or(Error::UnknownVoice(id))?;
        if matches!(voice.state, VoiceState::Stopped | VoiceState::Stopping) {
            return Ok(false);
        }
        voice.state = VoiceState::Stopping;
        Ok(true)
    }

    /// Backend reports that a physical channel ran out of media.
    pub fn physical_ended(&mut self, physical: usize) -> Option<VoiceId> {
        let voice = self
            .voices
            .iter_mut()
            .find(|v| v.physical == Some(physical) && !v.flags.looping)?;
        voice.physical = None;
        voice.anchor = None;
        voice.state = VoiceState::Stopped;
        let id = voice.id;
        if !voice.owned {
            self.free.push(id);
        }
        Some(id)
    }

    /// Give the voice back. It is stopped (on the next tick) and recycled.
    pub fn release(&mut self, id: VoiceId) -> Result<()> {
        let voice = self.owned_mut(id)?;
        voice.owned = false;
        if voice.state == VoiceState::Stopped {
            self.free.push(id);
        } else {
            voice.state = VoiceState::Stopping;
        }
        Ok(())
    }

    pub fn set_priority(&mut self, id: VoiceId, priority: i32) -> Result<()> {
        self.owned_mut(id)?.priority = priority;
        Ok(())
    }

    /// Change the categories a voice counts against. Applies from the next tick.
    pub fn set_flags(&mut self, id: VoiceId, flags: VoiceFlags) -> Result<()> {
        self.owned_mut(id)?.flags = flags;
        Ok(())
    }

    /// Stop everything immediately. Returns stop commands for bound voices.
    pub fn stop_all(&mut self) -> Vec<VoiceCommand> {
        let mut commands = core::mem::take(&mut self.pending);
        for voice in &mut self.voices {
            if let Some(physical) = voice.physical.take() {
                commands.push(VoiceCommand::Stop {
                    voice: voice.id,
                    physical,
                });
            }
            voice.state = VoiceState::Stopped;
            voice.anchor = None;
        }
        self.pool.clear();
        commands
    }

    // =========================================================================
    // Tick
    // =========================================================================

    pub fn tick(&mut self, now: f64) -> Vec<VoiceCommand> {
        let mut commands = core::mem::take(&mut self.pending);

        self.apply_requests(now, &mut commands);

        let voices = &self.voices;
        self.order.sort_by(|a, b| compare(&voices[*a], &voices[*b]));

        let waiting = self.admit(&mut commands);

        self.pool.compact(&self.voices);
        self.assign(waiting, now, &mut commands);

        if !commands.is_empty() {
            tracing::debug!(
                "voice tick: {} commands, {} bound / {} physical",
                commands.len(),
                self.pool.bound_count(),
                self.pool.len()
            );
        }
        commands
    }

    fn apply_requests(&mut self, now: f64, commands: &mut Vec<VoiceCommand>) {
        for voice in &mut self.voices {
            match voice.state {
                VoiceState::Stopping => {
                    if let Some(physical) = voice.physical.take() {
                        commands.push(VoiceCommand::Stop {
                            voice: voice.id,
                            physical,
                        });
                    }
                    voice.anchor = None;
                    voice.state = VoiceState::Stopped;
                    if !voice.owned {
                        self.free.push(voice.id);
                    }
                }
                VoiceState::Pausing => {
                    if let Some(physical) = voice.physical.take() {
                        commands.push(VoiceCommand::Pause {
                            voice: voice.id,
                            physical,
                        });
                    }
                    voice.state = VoiceState::Paused;
                }
                VoiceState::Muted if voice.is_finished_at(now) => {
                    voice.anchor = None;
                    voice.state = VoiceState::Stopped;
                    if !voice.owned {
                        self.free.push(voice.id);
                    }
                }
                _ => {}
            }
        }
    }

    /// Walk in sorted order, mute what doesn't fit. Returns admitted voices
    /// still waiting for a slot, in order.
    fn admit(&mut self, commands: &mut Vec<VoiceCommand>) -> Vec<VoiceId> {
        let mut counts = CategoryCounts::default();
        let mut waiting = Vec::new();

        for &id in &self.order {
            let voice = &mut self.voices[id];
            if !voice.state.wants_capacity() {
                continue;
            }

            if self.limits.admits(&counts, voice.flags) {
                counts.add(voice.flags);
                match voice.state {
                    VoiceState::Started => {}
                    VoiceState::Muted => {
                        voice.state = VoiceState::Unmuting;
                        waiting.push(id);
                    }
                    _ => waiting.push(id),
                }
                continue;
            }

            match voice.state {
                VoiceState::Started => {
                    voice.state = VoiceState::Muting;
                    if let Some(physical) = voice.physical.take() {
                        commands.push(VoiceCommand::Mute {
                            voice: id,
                            physical,
                        });
                    }
                    voice.state = VoiceState::Muted;
                }
                VoiceState::Muted => {}
                _ => voice.state = VoiceState::Muted,
            }
        }
        waiting
    }

    fn assign(&mut self, waiting: Vec<VoiceId>, now: f64, commands: &mut Vec<VoiceCommand>) {
        for id in waiting {
            let voice = &mut self.voices[id];
            match self.pool.bind_next(id) {
                Some(physical) => {
                    voice.physical = Some(physical);
                    voice.state = VoiceState::Started;
                    commands.push(VoiceCommand::Start {
                        voice: id,
                        physical,
                        offset: voice.position_at(now),
                    });
                }
                None => {
                    tracing::trace!("voice {} found no physical slot, muting", id);
                    voice.state = VoiceState::Muted;
                }
            }
        }
    }
}

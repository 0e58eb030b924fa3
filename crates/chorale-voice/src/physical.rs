//! Fixed-size pool of hardware playback channels.
//!
//! Slots are kept partitioned: every bound slot sits in a prefix of the pool,
//! every free slot after it. Compaction restores that after voices drop out,
//! in a single pass.

use crate::voice::{VirtualVoice, VoiceId, VoiceState};

/// One hardware channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysicalVoice {
    /// Backend channel index. Stays with the channel when slots move.
    pub channel: usize,
    pub bound: Option<VoiceId>,
}

#[derive(Debug, Clone)]
pub struct PhysicalPool {
    slots: Vec<PhysicalVoice>,
    /// Length of the bound prefix after the last compaction/assignment.
    bound: usize,
}

impl PhysicalPool {
    pub fn new(size: usize) -> Self {
        Self {
            slots: (0..size)
                .map(|channel| PhysicalVoice {
                    channel,
                    bound: None,
                })
                .collect(),
            bound: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[PhysicalVoice] {
        &self.slots
    }

    pub fn bound_count(&self) -> usize {
        self.bound
    }

    pub fn free_count(&self) -> usize {
        self.slots.len() - self.bound
    }

    /// Unbind slots whose voice no longer holds them, then move the bound
    /// ones down into a contiguous prefix. Relative order is kept.
    pub fn compact(&mut self, voices: &[VirtualVoice]) -> usize {
        let mut write = 0;
        for read in 0..self.slots.len() {
            let slot = &mut self.slots[read];
            let keep = slot.bound.is_some_and(|id| {
                voices.get(id).is_some_and(|v| {
                    v.physical == Some(slot.channel) && v.state == VoiceState::Started
                })
            });
            if !keep {
                slot.bound = None;
                continue;
            }
            self.slots.swap(write, read);
            write += 1;
        }
        self.bound = write;
        write
    }

    /// Bind the first free slot to `voice`. Returns its channel.
    pub fn bind_next(&mut self, voice: VoiceId) -> Option<usize> {
        let slot = self.slots.get_mut(self.bound)?;
        debug_assert!(slot.bound.is_none(), "slot {} already bound", slot.channel);
        slot.bound = Some(voice);
        self.bound += 1;
        Some(slot.channel)
    }

    pub fn find(&self, channel: usize) -> Option<&PhysicalVoice> {
        self.slots.iter().find(|s| s.channel == channel)
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.bound = None;
        }
        self.bound = 0;
    }
}

// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Fixed-size voice pools and voice stealing.

use tracing::{debug, warn};

/// What the pool needs to know about a voice to pick one for a new note.
pub trait PooledVoice {
    fn is_active(&self) -> bool;
    fn channel(&self) -> u8;
    /// The playing key, or -1.
    fn key(&self) -> i32;
    /// Note-on sequence number; lower is older.
    fn order(&self) -> u64;
    fn kill(&mut self);
}

/// A fixed set of voices that is allocated once and recycled.
pub struct VoicePool<V> {
    voices: Vec<V>,
    next_order: u64,
}

impl<V: PooledVoice> VoicePool<V> {
    pub fn new(size: usize, mut factory: impl FnMut() -> V) -> Self {
        Self {
            voices: (0..size).map(|_| factory()).collect(),
            next_order: 1,
        }
    }

    /// Returns the next note-on sequence number.
    pub fn next_order(&mut self) -> u64 {
        let order = self.next_order;
        self.next_order += 1;
        order
    }

    /// Picks a voice for a new note: a free voice, else one already playing
    /// this channel and key, else the oldest. A stolen voice is killed first.
    /// Returns `None` only for an empty pool.
    pub fn allocate(&mut self, channel: u8, key: i32) -> Option<&mut V> {
        if let Some(index) = self.voices.iter().position(|v| !v.is_active()) {
            return self.voices.get_mut(index);
        }

        let index = match self
            .voices
            .iter()
            .position(|v| v.channel() == channel && v.key() == key)
        {
            Some(index) => {
                debug!(channel, key, "Reusing voice playing the same note");
                index
            }
            None => {
                let (index, _) = self
                    .voices
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, v)| v.order())?;
                warn!(
                    max_voices = self.voices.len(),
                    "Voice limit reached, stealing oldest"
                );
                index
            }
        };

        let voice = self.voices.get_mut(index)?;
        voice.kill();
        Some(voice)
    }

    pub fn voices(&self) -> &[V] {
        &self.voices
    }

    pub fn voices_mut(&mut self) -> &mut [V] {
        &mut self.voices
    }

    pub fn active(&self) -> impl Iterator<Item = &V> {
        self.voices.iter().filter(|v| v.is_active())
    }

    pub fn active_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.voices.iter_mut().filter(|v| v.is_active())
    }

    /// Returns the current number of active voices.
    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// Silences every voice.
    pub fn kill_all(&mut self) {
        for voice in &mut self.voices {
            voice.kill();
        }
    }
}

impl<V: PooledVoice> std::fmt::Debug for VoicePool<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoicePool")
            .field("active_voices", &self.active_count())
            .field("max_voices", &self.voices.len())
            .finish()
    }
}

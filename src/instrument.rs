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

//! Interchangeable instruments driven by blocks of audio and MIDI.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::tuning::Temperament;

mod default_synth;
mod soundbank;

pub use default_synth::DefaultSynth;
pub use soundbank::SoundBankInstrument;

#[derive(Debug, thiserror::Error)]
pub enum InstrumentError {
    #[error("Invalid instrument state: {0}")]
    State(#[from] serde_json::Error),

    #[error("Unknown instrument \"{0}\"")]
    Unknown(String),
}

/// What an instrument tells its host about itself.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstrumentDescription {
    pub name: String,
    pub identifier: String,
    pub manufacturer: String,
    pub version: String,
    pub is_instrument: bool,
    pub num_inputs: u32,
    pub num_outputs: u32,
}

/// A MIDI message at a frame offset within a block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimedEvent {
    pub offset: usize,
    pub data: Vec<u8>,
}

impl TimedEvent {
    pub fn new(offset: usize, data: &[u8]) -> TimedEvent {
        TimedEvent {
            offset,
            data: data.to_vec(),
        }
    }
}

pub trait Instrument: Send {
    fn fill_description(&self, description: &mut InstrumentDescription);

    fn prepare_to_play(&mut self, sample_rate: f64, block_size: usize);

    /// Replaces the contents of `left` and `right` with the next block,
    /// applying each event at its offset.
    fn process_block(&mut self, left: &mut [f32], right: &mut [f32], events: &[TimedEvent]);

    /// Silences everything.
    fn reset(&mut self);

    fn get_state_information(&self) -> Result<Vec<u8>, InstrumentError>;

    fn set_state_information(&mut self, data: &[u8]) -> Result<(), InstrumentError>;

    fn set_temperament(&mut self, temperament: Temperament);
}

/// The available instruments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentKind {
    DefaultSynth,
    SoundBank,
}

impl InstrumentKind {
    pub const ALL: [InstrumentKind; 2] = [InstrumentKind::DefaultSynth, InstrumentKind::SoundBank];

    pub fn identifier(&self) -> &'static str {
        match self {
            InstrumentKind::DefaultSynth => "default_synth",
            InstrumentKind::SoundBank => "soundbank",
        }
    }

    pub fn create(&self, max_voices: usize) -> Box<dyn Instrument> {
        match self {
            InstrumentKind::DefaultSynth => Box::new(DefaultSynth::new(max_voices)),
            InstrumentKind::SoundBank => Box::new(SoundBankInstrument::new(max_voices)),
        }
    }
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

impl FromStr for InstrumentKind {
    type Err = InstrumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InstrumentKind::ALL
            .into_iter()
            .find(|kind| kind.identifier() == s)
            .ok_or_else(|| InstrumentError::Unknown(s.to_string()))
    }
}

/// Creates an instrument by identifier.
pub fn create(identifier: &str, max_voices: usize) -> Result<Box<dyn Instrument>, InstrumentError> {
    Ok(identifier.parse::<InstrumentKind>()?.create(max_voices))
}

/// Clears the outputs and renders them in pieces, handling each event just
/// before the frame it belongs to. Events past the end of the block are
/// handled at the end.
pub(crate) fn render_split(
    left: &mut [f32],
    right: &mut [f32],
    events: &[TimedEvent],
    mut handle: impl FnMut(&[u8]),
    mut render: impl FnMut(&mut [f32], &mut [f32]),
) {
    left.fill(0.0);
    right.fill(0.0);
    let frames = left.len().min(right.len());

    let mut position = 0;
    for event in events {
        let offset = event.offset.clamp(position, frames);
        if offset > position {
            render(&mut left[position..offset], &mut right[position..offset]);
            position = offset;
        }
        handle(&event.data);
    }
    if position < frames {
        render(&mut left[position..frames], &mut right[position..frames]);
    }
}

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

//! A plain sine synthesizer, playable without any soundbank.

use std::f64::consts::TAU;

use midly::{live::LiveEvent, MidiMessage};
use tracing::debug;

use super::{render_split, Instrument, InstrumentDescription, InstrumentError, TimedEvent};
use crate::soundbank::EnvelopeParameters;
use crate::synth::{Envelope, PooledVoice, VoicePool};
use crate::tuning::Temperament;

/// Peak level of a full-velocity note.
const LEVEL: f32 = 0.15;

fn envelope_parameters() -> EnvelopeParameters {
    EnvelopeParameters {
        attack: 0.001,
        decay: 1.0,
        sustain: 20.0,
        release: 0.5,
        ..EnvelopeParameters::amplitude()
    }
}

struct SineVoice {
    active: bool,
    channel: u8,
    key: i32,
    order: u64,
    key_down: bool,
    frequency: f64,
    phase: f64,
    phase_delta: f64,
    level: f32,
    envelope: Envelope,
}

impl Default for SineVoice {
    fn default() -> Self {
        SineVoice {
            active: false,
            channel: 0,
            key: -1,
            order: 0,
            key_down: false,
            frequency: 0.0,
            phase: 0.0,
            phase_delta: 0.0,
            level: 0.0,
            envelope: Envelope::new(false),
        }
    }
}

impl SineVoice {
    fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let sample = self.phase.sin() as f32 * self.level * self.envelope.level();
            *l += sample;
            *r += sample;
            self.phase = (self.phase + self.phase_delta) % TAU;
            self.envelope.next();
            if self.envelope.is_done() {
                self.kill();
                break;
            }
        }
    }
}

impl PooledVoice for SineVoice {
    fn is_active(&self) -> bool {
        self.active
    }

    fn channel(&self) -> u8 {
        self.channel
    }

    fn key(&self) -> i32 {
        self.key
    }

    fn order(&self) -> u64 {
        self.order
    }

    fn kill(&mut self) {
        self.active = false;
        self.key = -1;
        self.key_down = false;
    }
}

pub struct DefaultSynth {
    pool: VoicePool<SineVoice>,
    temperament: Temperament,
    sample_rate: f64,
}

impl DefaultSynth {
    pub fn new(max_voices: usize) -> DefaultSynth {
        DefaultSynth {
            pool: VoicePool::new(max_voices, SineVoice::default),
            temperament: Temperament::twelve_tone(),
            sample_rate: 44100.0,
        }
    }

    pub fn note_on(&mut self, channel: u8, key: u8, velocity: u8) {
        if velocity == 0 {
            self.note_off(channel, key);
            return;
        }
        let note = self.temperament.unmap_microtonal_note(key as i32, channel);
        let frequency = self.temperament.note_in_hertz(note as f64);
        let sample_rate = self.sample_rate;
        let order = self.pool.next_order();
        let Some(voice) = self.pool.allocate(channel, note) else {
            return;
        };

        voice.active = true;
        voice.channel = channel;
        voice.key = note;
        voice.order = order;
        voice.key_down = true;
        voice.frequency = frequency;
        voice.phase = 0.0;
        voice.phase_delta = TAU * frequency / sample_rate;
        voice.level = velocity as f32 / 127.0 * LEVEL;
        voice.envelope.start_note(
            &envelope_parameters(),
            &EnvelopeParameters::zero(),
            1.0,
            sample_rate as f32,
        );
    }

    pub fn note_off(&mut self, channel: u8, key: u8) {
        let note = self.temperament.unmap_microtonal_note(key as i32, channel);
        for voice in self.pool.active_mut() {
            if voice.channel == channel && voice.key == note && voice.key_down {
                voice.key_down = false;
                voice.envelope.note_off();
            }
        }
    }

    pub fn active_voices(&self) -> usize {
        self.pool.active_count()
    }

    fn handle_midi(&mut self, raw: &[u8]) {
        let event = match LiveEvent::parse(raw) {
            Ok(event) => event,
            Err(e) => {
                debug!(error = ?e, "Failed to parse MIDI event");
                return;
            }
        };
        let LiveEvent::Midi { channel, message } = event else {
            return;
        };
        let channel = channel.as_int() + 1;
        match message {
            MidiMessage::NoteOn { key, vel } => self.note_on(channel, key.as_int(), vel.as_int()),
            MidiMessage::NoteOff { key, .. } => self.note_off(channel, key.as_int()),
            MidiMessage::Controller { controller, .. } => match controller.as_int() {
                120 => self.reset(),
                123 => {
                    for voice in self.pool.active_mut() {
                        voice.key_down = false;
                        voice.envelope.note_off();
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }
}

impl Instrument for DefaultSynth {
    fn fill_description(&self, description: &mut InstrumentDescription) {
        *description = InstrumentDescription {
            name: "Default Synth".to_string(),
            identifier: super::InstrumentKind::DefaultSynth.identifier().to_string(),
            manufacturer: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            is_instrument: true,
            num_inputs: 0,
            num_outputs: 2,
        };
    }

    fn prepare_to_play(&mut self, sample_rate: f64, _block_size: usize) {
        self.sample_rate = sample_rate;
    }

    fn process_block(&mut self, left: &mut [f32], right: &mut [f32], events: &[TimedEvent]) {
        // Both closures need the synth.
        let synth = std::cell::RefCell::new(self);
        render_split(
            left,
            right,
            events,
            |data| synth.borrow_mut().handle_midi(data),
            |l, r| {
                for voice in synth.borrow_mut().pool.active_mut() {
                    voice.render(l, r);
                }
            },
        );
    }

    fn reset(&mut self) {
        self.pool.kill_all();
    }

    fn get_state_information(&self) -> Result<Vec<u8>, InstrumentError> {
        Ok(Vec::new())
    }

    fn set_state_information(&mut self, _data: &[u8]) -> Result<(), InstrumentError> {
        Ok(())
    }

    fn set_temperament(&mut self, temperament: Temperament) {
        self.pool.kill_all();
        self.temperament = temperament;
    }
}

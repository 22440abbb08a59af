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

//! The polyphonic soundbank synthesizer.

use std::path::{Path, PathBuf};

use midly::{live::LiveEvent, MidiMessage};
use parking_lot::Mutex;
use tracing::{debug, info};

use super::pool::{PooledVoice, VoicePool};
use super::voice::{NoteStart, Voice, PITCH_WHEEL_CENTER};
use crate::soundbank::{Region, SoundBank, Trigger};
use crate::tuning::Temperament;

/// Default size of the voice pool.
pub const DEFAULT_VOICES: usize = 64;

const NUM_CHANNELS: usize = 16;

const SUSTAIN_PEDAL: u8 = 64;
const ALL_SOUND_OFF: u8 = 120;
const ALL_NOTES_OFF: u8 = 123;

struct EngineState {
    bank: SoundBank,
    pool: VoicePool<Voice>,
    temperament: Temperament,
    output_rate: f64,
    pitch_wheel: [i32; NUM_CHANNELS],
    sustain_pedal: [bool; NUM_CHANNELS],
    /// Last note-on velocity per channel and key, for release regions.
    velocities: [[u8; 128]; NUM_CHANNELS],
}

/// Plays the selected preset of a soundbank. Every operation takes the engine
/// lock, so rendering, note events and bank swaps never interleave. Channels
/// are numbered from 1.
pub struct SynthEngine {
    state: Mutex<EngineState>,
}

impl Default for SynthEngine {
    fn default() -> Self {
        SynthEngine::new(DEFAULT_VOICES)
    }
}

impl SynthEngine {
    pub fn new(max_voices: usize) -> SynthEngine {
        SynthEngine {
            state: Mutex::new(EngineState {
                bank: SoundBank::empty(),
                pool: VoicePool::new(max_voices, Voice::default),
                temperament: Temperament::twelve_tone(),
                output_rate: 44100.0,
                pitch_wheel: [PITCH_WHEEL_CENTER; NUM_CHANNELS],
                sustain_pedal: [false; NUM_CHANNELS],
                velocities: [[0; 128]; NUM_CHANNELS],
            }),
        }
    }

    /// Loads a soundbank and makes it current. The file is read and decoded
    /// before the engine is locked. Returns the number of presets.
    pub fn load(&self, path: &Path) -> usize {
        let bank = SoundBank::load(path);
        let presets = bank.presets().len();
        self.install_bank(bank);
        presets
    }

    /// Replaces the current bank, silencing all voices and selecting the first
    /// preset.
    pub fn install_bank(&self, mut bank: SoundBank) {
        bank.select(0);
        let mut state = self.state.lock();
        state.pool.kill_all();
        state.bank = bank;
    }

    pub fn note_on(&self, channel: u8, key: u8, velocity: u8) {
        if velocity == 0 {
            self.note_off(channel, key, 0);
            return;
        }
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let note = state.temperament.unmap_microtonal_note(key as i32, channel);
        let match_key = state.temperament.to_twelve_tone_key(note);
        let regions = state.bank.active_regions();

        // Choke whatever the new note's group silences.
        let group = regions
            .iter()
            .find(|region| region.matches(match_key, velocity, Trigger::Attack))
            .map(|region| region.group)
            .unwrap_or(0);
        if group != 0 {
            for voice in state.pool.active_mut() {
                if voice.region().off_by == group {
                    voice.stop_note_for_group();
                }
            }
        }

        let mut any_notes_playing = false;
        for voice in state.pool.active_mut() {
            if voice.channel() == channel && voice.is_key_down() {
                if voice.key() == note {
                    if !voice.is_one_shot() {
                        voice.stop_note_quick();
                    }
                } else {
                    any_notes_playing = true;
                }
            }
        }

        let trigger = if any_notes_playing {
            Trigger::Legato
        } else {
            Trigger::First
        };
        let pitch_wheel = state.pitch_wheel[channel_index(channel)];
        for region in regions
            .iter()
            .filter(|region| region.matches(match_key, velocity, trigger))
        {
            start_voice(
                &state.bank,
                &mut state.pool,
                &state.temperament,
                state.output_rate,
                region,
                channel,
                note,
                velocity,
                pitch_wheel,
            );
        }

        state.velocities[channel_index(channel)][key as usize & 0x7f] = velocity;
    }

    pub fn note_off(&self, channel: u8, key: u8, _velocity: u8) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let note = state.temperament.unmap_microtonal_note(key as i32, channel);
        let index = channel_index(channel);
        let pedal = state.sustain_pedal[index];

        for voice in state.pool.active_mut() {
            if voice.channel() == channel && voice.key() == note && voice.is_key_down() {
                if pedal {
                    voice.set_key_down(false);
                    voice.set_sustained(true);
                } else {
                    voice.stop_note(true);
                }
            }
        }

        let velocity = state.velocities[index][key as usize & 0x7f];
        let match_key = state.temperament.to_twelve_tone_key(note);
        let release = state
            .bank
            .active_regions()
            .iter()
            .find(|region| region.matches(match_key, velocity, Trigger::Release));
        if let Some(region) = release {
            let pitch_wheel = state.pitch_wheel[index];
            if let Some(voice) = start_voice(
                &state.bank,
                &mut state.pool,
                &state.temperament,
                state.output_rate,
                region,
                channel,
                note,
                velocity,
                pitch_wheel,
            ) {
                voice.set_key_down(false);
            }
        }
    }

    /// Moves a channel's pitch wheel (0 to 16383, centre 8192).
    pub fn pitch_wheel(&self, channel: u8, value: i32) {
        let mut state = self.state.lock();
        state.pitch_wheel[channel_index(channel)] = value;
        for voice in state.pool.active_mut() {
            if voice.channel() == channel {
                voice.pitch_wheel_moved(value);
            }
        }
    }

    pub fn controller(&self, channel: u8, number: u8, value: u8) {
        match number {
            SUSTAIN_PEDAL => self.sustain_pedal(channel, value >= 64),
            ALL_SOUND_OFF => self.all_notes_off(Some(channel), false),
            ALL_NOTES_OFF => self.all_notes_off(Some(channel), true),
            _ => debug!(channel, number, value, "Ignoring controller"),
        }
    }

    fn sustain_pedal(&self, channel: u8, down: bool) {
        let mut state = self.state.lock();
        state.sustain_pedal[channel_index(channel)] = down;
        if down {
            return;
        }
        for voice in state.pool.active_mut() {
            if voice.channel() == channel && voice.is_sustained() {
                voice.set_sustained(false);
                voice.stop_note(true);
            }
        }
    }

    /// Stops every note on a channel, or on all channels. Without a tail the
    /// voices are cut immediately.
    pub fn all_notes_off(&self, channel: Option<u8>, allow_tail: bool) {
        let mut state = self.state.lock();
        for voice in state.pool.active_mut() {
            if channel.map_or(true, |c| voice.channel() == c) {
                voice.stop_note(allow_tail);
            }
        }
    }

    /// Applies a raw MIDI message.
    pub fn handle_midi(&self, raw: &[u8]) {
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
            MidiMessage::NoteOn { key, vel } if vel.as_int() == 0 => {
                self.note_off(channel, key.as_int(), 0)
            }
            MidiMessage::NoteOn { key, vel } => self.note_on(channel, key.as_int(), vel.as_int()),
            MidiMessage::NoteOff { key, vel } => {
                self.note_off(channel, key.as_int(), vel.as_int())
            }
            MidiMessage::PitchBend { bend } => self.pitch_wheel(channel, bend.0.as_int() as i32),
            MidiMessage::Controller { controller, value } => {
                self.controller(channel, controller.as_int(), value.as_int())
            }
            MidiMessage::ProgramChange { program } => {
                self.set_current_program(program.as_int() as usize);
            }
            _ => {}
        }
    }

    /// Adds the next block of audio into `left` and `right`.
    pub fn render(&self, left: &mut [f32], right: &mut [f32]) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let store = state.bank.store();
        for voice in state.pool.active_mut() {
            match voice.buffer().and_then(|handle| store.buffer(handle)) {
                Some(buffer) => voice.render(buffer, left, right),
                None => voice.kill(),
            }
        }
    }

    /// Selects a preset, silencing all voices. Out of range indices select the
    /// first preset. Returns the selected index.
    pub fn set_current_program(&self, index: usize) -> usize {
        let mut state = self.state.lock();
        state.pool.kill_all();
        let selected = state.bank.select(index);
        info!(
            program = selected,
            name = state.bank.preset(selected).map(|p| p.display_name()),
            "Program selected"
        );
        selected
    }

    pub fn current_program(&self) -> usize {
        self.state.lock().bank.selected()
    }

    pub fn num_programs(&self) -> usize {
        self.state.lock().bank.presets().len()
    }

    pub fn program_name(&self, index: usize) -> Option<String> {
        self.state.lock().bank.preset(index).map(|p| p.display_name())
    }

    pub fn program_names(&self) -> Vec<String> {
        let state = self.state.lock();
        state.bank.presets().iter().map(|p| p.display_name()).collect()
    }

    /// The file the current bank came from.
    pub fn bank_path(&self) -> Option<PathBuf> {
        self.state.lock().bank.path().map(Path::to_path_buf)
    }

    pub fn errors(&self) -> Vec<String> {
        self.state.lock().bank.errors().to_vec()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.state.lock().bank.warnings().to_vec()
    }

    pub fn set_temperament(&self, temperament: Temperament) {
        let mut state = self.state.lock();
        state.pool.kill_all();
        state.temperament = temperament;
    }

    pub fn temperament(&self) -> Temperament {
        self.state.lock().temperament.clone()
    }

    pub fn set_output_rate(&self, rate: f64) {
        self.state.lock().output_rate = rate;
    }

    pub fn output_rate(&self) -> f64 {
        self.state.lock().output_rate
    }

    pub fn active_voices(&self) -> usize {
        self.state.lock().pool.active_count()
    }
}

impl std::fmt::Debug for SynthEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SynthEngine")
            .field("bank", &state.bank.path())
            .field("program", &state.bank.selected())
            .field("voices", &state.pool)
            .field("output_rate", &state.output_rate)
            .finish()
    }
}

fn channel_index(channel: u8) -> usize {
    (channel.clamp(1, NUM_CHANNELS as u8) - 1) as usize
}

/// Starts a region on a pooled voice. Regions that cannot sound do not take a
/// voice.
#[allow(clippy::too_many_arguments)]
fn start_voice<'a>(
    bank: &SoundBank,
    pool: &'a mut VoicePool<Voice>,
    temperament: &Temperament,
    output_rate: f64,
    region: &Region,
    channel: u8,
    key: i32,
    velocity: u8,
    pitch_wheel: i32,
) -> Option<&'a mut Voice> {
    let handle = region.sample?;
    let sample = bank.store().sample(handle)?;
    let frames = bank.store().sample_buffer(handle)?.num_frames() as u64;
    if region.negative_end {
        return None;
    }

    let order = pool.next_order();
    let voice = pool.allocate(channel, key)?;
    let started = voice.start_note(NoteStart {
        region,
        sample,
        frames,
        channel,
        key,
        velocity,
        pitch_wheel,
        temperament,
        output_rate,
        order,
    });
    started.then_some(voice)
}

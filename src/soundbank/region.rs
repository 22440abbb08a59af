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

//! Resolved playback rules.

use crate::samples::SampleHandle;

/// The event that starts a region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    Attack,
    Release,
    First,
    Legato,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopMode {
    /// Use the loop embedded in the sample, if it has one.
    SampleLoop,
    NoLoop,
    OneShot,
    LoopContinuous,
    /// Loop while the key is held, then play the tail.
    LoopSustain,
}

/// How a voice is silenced when another region chokes it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OffMode {
    Fast,
    Normal,
}

/// Amplitude envelope times in seconds, start and sustain in percent.
#[derive(Clone, Debug, PartialEq)]
pub struct EnvelopeParameters {
    pub delay: f32,
    pub start: f32,
    pub attack: f32,
    pub hold: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

impl EnvelopeParameters {
    /// An envelope that opens instantly and sustains at full level.
    pub fn amplitude() -> Self {
        EnvelopeParameters {
            sustain: 100.0,
            ..EnvelopeParameters::zero()
        }
    }

    /// All zero. Used for velocity modulation amounts.
    pub fn zero() -> Self {
        EnvelopeParameters {
            delay: 0.0,
            start: 0.0,
            attack: 0.0,
            hold: 0.0,
            decay: 0.0,
            sustain: 0.0,
            release: 0.0,
        }
    }
}

impl Default for EnvelopeParameters {
    fn default() -> Self {
        EnvelopeParameters::amplitude()
    }
}

/// A fully resolved, self-contained playback rule.
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    pub sample: Option<SampleHandle>,

    pub lokey: u8,
    pub hikey: u8,
    pub lovel: u8,
    pub hivel: u8,
    pub trigger: Trigger,

    /// Choke group of this region. Zero means none.
    pub group: u32,
    /// Voices of this region are silenced when a region of this group starts.
    pub off_by: u32,
    pub off_mode: OffMode,

    /// Frames into the sample where playback starts.
    pub offset: u64,
    /// Last frame to play. Zero means the end of the sample.
    pub end: u64,
    /// A negative end silences the region.
    pub negative_end: bool,
    pub loop_mode: LoopMode,
    pub loop_start: u64,
    pub loop_end: u64,

    /// Semitones.
    pub transpose: i32,
    /// Cents.
    pub tune: i32,
    pub pitch_keycenter: i32,
    /// Percent.
    pub pitch_keytrack: i32,
    /// Cents.
    pub bend_up: i32,
    /// Cents.
    pub bend_down: i32,

    /// Decibels.
    pub volume: f32,
    /// -100 (left) to 100 (right).
    pub pan: f32,
    /// Percent.
    pub amp_veltrack: f32,

    pub ampeg: EnvelopeParameters,
    /// Added to `ampeg` at full velocity.
    pub ampeg_veltrack: EnvelopeParameters,
}

impl Default for Region {
    fn default() -> Self {
        Region {
            sample: None,
            lokey: 0,
            hikey: 127,
            lovel: 0,
            hivel: 127,
            trigger: Trigger::Attack,
            group: 0,
            off_by: 0,
            off_mode: OffMode::Fast,
            offset: 0,
            end: 0,
            negative_end: false,
            loop_mode: LoopMode::SampleLoop,
            loop_start: 0,
            loop_end: 0,
            transpose: 0,
            tune: 0,
            pitch_keycenter: 60,
            pitch_keytrack: 100,
            bend_up: 200,
            bend_down: -200,
            volume: 0.0,
            pan: 0.0,
            amp_veltrack: 100.0,
            ampeg: EnvelopeParameters::amplitude(),
            ampeg_veltrack: EnvelopeParameters::zero(),
        }
    }
}

impl Region {
    /// Whether this region plays for the given key, velocity and trigger. Attack
    /// regions answer to both the first note and legato notes.
    pub fn matches(&self, key: i32, velocity: u8, trigger: Trigger) -> bool {
        let key_matches = key >= self.lokey as i32 && key <= self.hikey as i32;
        let velocity_matches = velocity >= self.lovel && velocity <= self.hivel;
        let trigger_matches = trigger == self.trigger
            || (self.trigger == Trigger::Attack
                && (trigger == Trigger::First || trigger == Trigger::Legato));
        key_matches && velocity_matches && trigger_matches
    }

    pub fn has_loop(&self) -> bool {
        self.loop_start < self.loop_end
    }
}

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

//! Amplitude envelope generator.

use crate::soundbank::EnvelopeParameters;

/// Time constant of exponential segments: the level falls by this many
/// nepers over the segment, about -80 dB.
const EXPONENTIAL_TIME_CONSTANT: f32 = -9.226;

/// Minimum release time in seconds.
const MIN_RELEASE: f32 = 0.01;

/// Length of a forced fade in seconds.
const FAST_RELEASE: f32 = 0.01;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Segment {
    Delay,
    Attack,
    Hold,
    Decay,
    Sustain,
    Release,
    Done,
}

/// Runtime state of a DAHDSR envelope. Levels run from 0 to 1.
#[derive(Clone, Debug)]
pub struct Envelope {
    parameters: EnvelopeParameters,
    sample_rate: f32,
    exponential: bool,
    segment: Segment,
    /// Whether the current segment multiplies rather than adds its slope.
    multiplies: bool,
    level: f32,
    slope: f32,
    samples_until_next: i32,
}

impl Envelope {
    pub fn new(exponential: bool) -> Envelope {
        Envelope {
            parameters: EnvelopeParameters::amplitude(),
            sample_rate: 44100.0,
            exponential,
            segment: Segment::Done,
            multiplies: false,
            level: 0.0,
            slope: 0.0,
            samples_until_next: 0,
        }
    }

    /// Starts the envelope. `velocity` runs from 0 to 1 and scales the
    /// velocity modulation added to every parameter.
    pub fn start_note(
        &mut self,
        parameters: &EnvelopeParameters,
        velocity_modulation: &EnvelopeParameters,
        velocity: f32,
        sample_rate: f32,
    ) {
        self.parameters = EnvelopeParameters {
            delay: parameters.delay + velocity * velocity_modulation.delay,
            start: parameters.start + velocity * velocity_modulation.start,
            attack: parameters.attack + velocity * velocity_modulation.attack,
            hold: parameters.hold + velocity * velocity_modulation.hold,
            decay: parameters.decay + velocity * velocity_modulation.decay,
            sustain: (parameters.sustain + velocity * velocity_modulation.sustain)
                .clamp(0.0, 100.0),
            release: parameters.release + velocity * velocity_modulation.release,
        };
        self.sample_rate = sample_rate;

        self.segment = Segment::Delay;
        self.multiplies = false;
        self.level = 0.0;
        self.slope = 0.0;
        self.samples_until_next = (self.parameters.delay * sample_rate) as i32;
        if self.samples_until_next <= 0 {
            self.start_attack();
        }
    }

    /// Moves to the release segment.
    pub fn note_off(&mut self) {
        self.start_release();
    }

    /// Fades out over a few milliseconds, regardless of the release time.
    pub fn fast_release(&mut self) {
        self.segment = Segment::Release;
        self.multiplies = false;
        self.samples_until_next = ((FAST_RELEASE * self.sample_rate) as i32).max(1);
        self.slope = -self.level / self.samples_until_next as f32;
    }

    /// Advances one sample.
    pub fn next(&mut self) {
        if matches!(self.segment, Segment::Sustain | Segment::Done) {
            return;
        }
        if self.multiplies {
            self.level *= self.slope;
        } else {
            self.level += self.slope;
        }
        self.samples_until_next -= 1;
        if self.samples_until_next < 0 {
            self.next_segment();
        }
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn segment(&self) -> Segment {
        self.segment
    }

    pub fn is_done(&self) -> bool {
        self.segment == Segment::Done
    }

    pub fn is_releasing(&self) -> bool {
        self.segment == Segment::Release
    }

    fn next_segment(&mut self) {
        match self.segment {
            Segment::Delay => self.start_attack(),
            Segment::Attack => self.start_hold(),
            Segment::Hold => self.start_decay(),
            Segment::Decay => self.start_sustain(),
            Segment::Sustain => {}
            Segment::Release => self.finish(),
            Segment::Done => {}
        }
    }

    fn samples(&self, seconds: f32) -> i32 {
        (seconds * self.sample_rate) as i32
    }

    fn start_attack(&mut self) {
        if self.parameters.attack <= 0.0 {
            self.level = 1.0;
            self.start_hold();
            return;
        }
        self.segment = Segment::Attack;
        self.multiplies = false;
        self.level = self.parameters.start / 100.0;
        self.samples_until_next = self.samples(self.parameters.attack).max(1);
        self.slope = (1.0 - self.level) / self.samples_until_next as f32;
    }

    fn start_hold(&mut self) {
        self.level = 1.0;
        self.slope = 0.0;
        if self.parameters.hold <= 0.0 {
            self.start_decay();
            return;
        }
        self.segment = Segment::Hold;
        self.multiplies = false;
        self.samples_until_next = self.samples(self.parameters.hold).max(1);
    }

    fn start_decay(&mut self) {
        if self.parameters.decay <= 0.0 {
            self.start_sustain();
            return;
        }
        self.segment = Segment::Decay;
        self.multiplies = self.exponential;
        self.samples_until_next = self.samples(self.parameters.decay).max(1);
        let sustain = self.parameters.sustain / 100.0;
        if self.exponential {
            let magnitude = EXPONENTIAL_TIME_CONSTANT / self.samples_until_next as f32;
            self.slope = magnitude.exp();
            if sustain > 0.0 {
                // Stop where the curve crosses the sustain level.
                let samples = ((sustain / self.level).ln() / magnitude) as i32;
                if samples <= 0 {
                    self.start_sustain();
                    return;
                }
                self.samples_until_next = samples;
            }
        } else {
            self.slope = (sustain - self.level) / self.samples_until_next as f32;
        }
    }

    fn start_sustain(&mut self) {
        if self.parameters.sustain <= 0.0 {
            self.start_release();
            return;
        }
        self.segment = Segment::Sustain;
        self.level = self.parameters.sustain / 100.0;
        self.slope = 0.0;
        self.samples_until_next = i32::MAX;
    }

    fn start_release(&mut self) {
        self.segment = Segment::Release;
        self.multiplies = self.exponential;
        let release = self.parameters.release.max(MIN_RELEASE);
        self.samples_until_next = self.samples(release).max(1);
        if self.multiplies {
            self.slope = (EXPONENTIAL_TIME_CONSTANT / self.samples_until_next as f32).exp();
        } else {
            self.slope = -self.level / self.samples_until_next as f32;
        }
    }

    fn finish(&mut self) {
        self.segment = Segment::Done;
        self.level = 0.0;
        self.slope = 0.0;
    }
}

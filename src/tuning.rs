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

//! Tuning systems. A temperament divides a period (usually the octave) into a
//! number of equal keys and maps the twelve chromatic notes onto them.

/// Frequency of the reference A.
const CONCERT_A: f64 = 440.0;

#[derive(Clone, Debug, PartialEq)]
pub struct Temperament {
    period_size: i32,
    period_range: f64,
    /// Key offset within a period of each of the twelve chromatic notes.
    chromatic_map: [i32; 12],
}

impl Default for Temperament {
    fn default() -> Self {
        Temperament::twelve_tone()
    }
}

impl Temperament {
    /// Twelve tone equal temperament, in which every conversion is the identity.
    pub fn twelve_tone() -> Temperament {
        Temperament::equal(12, 2.0)
    }

    /// Equal division of `period_range` into `period_size` keys. Chromatic notes
    /// map to the nearest key.
    pub fn equal(period_size: i32, period_range: f64) -> Temperament {
        let period_size = period_size.max(1);
        let mut chromatic_map = [0; 12];
        for (semitone, key) in chromatic_map.iter_mut().enumerate() {
            *key = (semitone as f64 * period_size as f64 / 12.0).round() as i32;
        }
        Temperament::with_map(period_size, period_range, chromatic_map)
    }

    pub fn with_map(period_size: i32, period_range: f64, chromatic_map: [i32; 12]) -> Temperament {
        Temperament {
            period_size: period_size.max(1),
            period_range: if period_range > 1.0 { period_range } else { 2.0 },
            chromatic_map,
        }
    }

    pub fn period_size(&self) -> i32 {
        self.period_size
    }

    pub fn period_range(&self) -> f64 {
        self.period_range
    }

    pub fn chromatic_map(&self) -> &[i32; 12] {
        &self.chromatic_map
    }

    pub fn is_twelve_tone(&self) -> bool {
        self.period_size == 12 && self.period_range == 2.0
    }

    pub fn middle_c(&self) -> i32 {
        5 * self.period_size
    }

    pub fn middle_a(&self) -> i32 {
        self.middle_c() + self.chromatic_map[9]
    }

    /// Frequency of a key, which may be fractional.
    pub fn note_in_hertz(&self, key: f64) -> f64 {
        CONCERT_A
            * self
                .period_range
                .powf((key - self.middle_a() as f64) / self.period_size as f64)
    }

    /// Spreads the keys of large temperaments across MIDI channels: channel 1
    /// holds keys 0-127, channel 2 keys 128-255, and so on.
    pub fn unmap_microtonal_note(&self, key: i32, channel: u8) -> i32 {
        if self.period_size > 12 {
            key + 128 * (channel.max(1) as i32 - 1)
        } else {
            key
        }
    }

    /// Number of keys spanning the same interval as `semitones` twelve tone
    /// semitones.
    pub fn semitones_to_keys(&self, semitones: f64) -> f64 {
        semitones * self.period_size as f64 / (12.0 * self.period_range.log2())
    }

    /// The twelve tone key closest in pitch to a key of this temperament.
    pub fn to_twelve_tone_key(&self, key: i32) -> i32 {
        if self.is_twelve_tone() {
            return key;
        }
        let semitones = (key - self.middle_a()) as f64 * 12.0 * self.period_range.log2()
            / self.period_size as f64;
        69 + semitones.round() as i32
    }
}

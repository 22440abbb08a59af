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

//! Generator inheritance. A zone's parameters are built by folding its
//! generators over a base, and preset zones are then layered onto instrument
//! zones as deltas:
//!
//! 1. preset global = relative defaults + global preset zone
//! 2. preset zone = preset global + zone generators
//! 3. instrument global = absolute defaults (seeded with the preset zone's ranges)
//!    + global instrument zone
//! 4. instrument zone = instrument global + zone generators
//! 5. region = finalize(instrument zone + preset zone deltas, sample header)

use super::{
    diagnostics::Diagnostics,
    generator::{self, generator_name},
    hydra::{Generator, SampleHeader},
    region::{LoopMode, OffMode, Region},
};
use crate::samples::SampleHandle;

/// Time, in timecents, used for envelope stages a zone does not set.
const DEFAULT_TIMECENTS: f32 = -12000.0;
const MAX_GAIN_DB: f32 = 6.0;

/// Zone parameters in the units the file stores them in: timecents for envelope
/// times, centibels for sustain, frames for offsets.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ZoneParameters {
    pub key_range: (u8, u8),
    pub vel_range: (u8, u8),
    pub offset: i64,
    pub end: i64,
    pub loop_start: i64,
    pub loop_end: i64,
    pub transpose: i32,
    pub tune: i32,
    pub key_track: i32,
    pub root_key: i32,
    pub volume: f32,
    pub pan: f32,
    pub delay: f32,
    pub attack: f32,
    pub hold: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
    pub loop_mode: LoopMode,
    pub exclusive_class: u32,
    pub instrument: Option<u16>,
    pub sample_id: Option<u16>,
}

impl ZoneParameters {
    /// Defaults for preset zones, whose values are added to instrument zones.
    pub fn relative() -> ZoneParameters {
        ZoneParameters {
            key_range: (0, 127),
            vel_range: (0, 127),
            offset: 0,
            end: 0,
            loop_start: 0,
            loop_end: 0,
            transpose: 0,
            tune: 0,
            key_track: 0,
            root_key: -1,
            volume: 0.0,
            pan: 0.0,
            delay: 0.0,
            attack: 0.0,
            hold: 0.0,
            decay: 0.0,
            sustain: 0.0,
            release: 0.0,
            loop_mode: LoopMode::NoLoop,
            exclusive_class: 0,
            instrument: None,
            sample_id: None,
        }
    }

    /// Defaults for instrument zones.
    pub fn absolute() -> ZoneParameters {
        ZoneParameters {
            key_track: 100,
            delay: DEFAULT_TIMECENTS,
            attack: DEFAULT_TIMECENTS,
            hold: DEFAULT_TIMECENTS,
            decay: DEFAULT_TIMECENTS,
            release: DEFAULT_TIMECENTS,
            ..ZoneParameters::relative()
        }
    }

    /// Copies the key and velocity ranges of a preset zone. The instrument
    /// zone's own range generators still replace them.
    pub fn with_ranges_of(mut self, other: &ZoneParameters) -> ZoneParameters {
        self.key_range = other.key_range;
        self.vel_range = other.vel_range;
        self
    }

    pub fn apply(&mut self, generator: &Generator, diagnostics: &mut Diagnostics) {
        let amount = generator.short();
        match generator.operator {
            generator::START_ADDRS_OFFSET => self.offset += amount as i64,
            generator::END_ADDRS_OFFSET => self.end += amount as i64,
            generator::STARTLOOP_ADDRS_OFFSET => self.loop_start += amount as i64,
            generator::ENDLOOP_ADDRS_OFFSET => self.loop_end += amount as i64,
            generator::START_ADDRS_COARSE_OFFSET => self.offset += amount as i64 * 32768,
            generator::END_ADDRS_COARSE_OFFSET => self.end += amount as i64 * 32768,
            generator::STARTLOOP_ADDRS_COARSE_OFFSET => self.loop_start += amount as i64 * 32768,
            generator::ENDLOOP_ADDRS_COARSE_OFFSET => self.loop_end += amount as i64 * 32768,
            generator::PAN => self.pan = amount as f32 * 0.2,
            generator::DELAY_VOL_ENV => self.delay = amount as f32,
            generator::ATTACK_VOL_ENV => self.attack = amount as f32,
            generator::HOLD_VOL_ENV => self.hold = amount as f32,
            generator::DECAY_VOL_ENV => self.decay = amount as f32,
            generator::SUSTAIN_VOL_ENV => self.sustain = amount as f32,
            generator::RELEASE_VOL_ENV => self.release = amount as f32,
            generator::KEY_RANGE => self.key_range = ordered_range(generator.range()),
            generator::VEL_RANGE => self.vel_range = ordered_range(generator.range()),
            generator::INITIAL_ATTENUATION => self.volume -= amount as f32 / 10.0,
            generator::COARSE_TUNE => self.transpose += amount as i32,
            generator::FINE_TUNE => self.tune += amount as i32,
            generator::SAMPLE_MODES => {
                self.loop_mode = match generator.word() & 3 {
                    1 => LoopMode::LoopContinuous,
                    3 => LoopMode::LoopSustain,
                    _ => LoopMode::NoLoop,
                }
            }
            generator::SCALE_TUNING => self.key_track = amount as i32,
            generator::EXCLUSIVE_CLASS => self.exclusive_class = generator.word() as u32,
            generator::OVERRIDING_ROOT_KEY => self.root_key = amount as i32,
            generator::INSTRUMENT => self.instrument = Some(generator.word()),
            generator::SAMPLE_ID => self.sample_id = Some(generator.word()),
            generator::END_OPER => {}
            operator => diagnostics.unsupported(&generator_name(operator)),
        }
    }

    /// Adds a preset zone's deltas. Ranges, loop mode and the referenced
    /// sample stay those of the instrument zone.
    pub fn add_relative(&self, delta: &ZoneParameters) -> ZoneParameters {
        ZoneParameters {
            offset: self.offset + delta.offset,
            end: self.end + delta.end,
            loop_start: self.loop_start + delta.loop_start,
            loop_end: self.loop_end + delta.loop_end,
            transpose: self.transpose + delta.transpose,
            tune: self.tune + delta.tune,
            key_track: self.key_track + delta.key_track,
            volume: self.volume + delta.volume,
            pan: self.pan + delta.pan,
            delay: self.delay + delta.delay,
            attack: self.attack + delta.attack,
            hold: self.hold + delta.hold,
            decay: self.decay + delta.decay,
            sustain: self.sustain + delta.sustain,
            release: self.release + delta.release,
            ..self.clone()
        }
    }
}

pub(crate) fn ordered_range((lo, hi): (u8, u8)) -> (u8, u8) {
    let (lo, hi) = (lo.min(127), hi.min(127));
    if lo <= hi {
        (lo, hi)
    } else {
        (hi, lo)
    }
}

/// Folds a zone's generators over a base.
pub(crate) fn resolve(
    base: &ZoneParameters,
    generators: &[Generator],
    diagnostics: &mut Diagnostics,
) -> ZoneParameters {
    let mut zone = base.clone();
    for generator in generators {
        zone.apply(generator, diagnostics);
    }
    zone
}

pub fn timecents_to_seconds(timecents: f32) -> f32 {
    2f32.powf(timecents / 1200.0)
}

/// Converts an attenuation in centibels to a level in percent.
pub fn centibels_to_percent(centibels: f32) -> f32 {
    100.0 * 10f32.powf(-centibels / 200.0)
}

/// Builds the final region for a combined zone and the sample it plays.
pub(crate) fn finalize(
    zone: &ZoneParameters,
    header: &SampleHeader,
    sample: Option<SampleHandle>,
    diagnostics: &mut Diagnostics,
) -> Region {
    let mut region = Region {
        sample,
        lokey: zone.key_range.0,
        hikey: zone.key_range.1,
        lovel: zone.vel_range.0,
        hivel: zone.vel_range.1,
        loop_mode: zone.loop_mode,
        group: zone.exclusive_class,
        off_by: zone.exclusive_class,
        off_mode: OffMode::Fast,
        transpose: zone.transpose,
        tune: zone.tune + header.pitch_correction as i32,
        pitch_keytrack: zone.key_track,
        pan: zone.pan.clamp(-100.0, 100.0),
        volume: zone.volume,
        ..Default::default()
    };

    region.offset = (zone.offset + header.start as i64).max(0) as u64;
    region.end = (zone.end + header.end as i64).max(0) as u64;
    region.loop_start = (zone.loop_start + header.loop_start as i64).max(0) as u64;
    let mut loop_end = zone.loop_end + header.loop_end as i64;
    if header.loop_end > 0 {
        loop_end -= 1;
    }
    region.loop_end = loop_end.max(0) as u64;

    region.pitch_keycenter = if zone.root_key >= 0 {
        zone.root_key
    } else if header.original_pitch <= 127 {
        header.original_pitch as i32
    } else {
        60
    };

    region.ampeg.delay = timecents_to_seconds(zone.delay).clamp(0.001, 20.0);
    region.ampeg.attack = timecents_to_seconds(zone.attack).clamp(0.001, 100.0);
    region.ampeg.hold = timecents_to_seconds(zone.hold).clamp(0.001, 20.0);
    region.ampeg.decay = timecents_to_seconds(zone.decay).clamp(0.001, 100.0);
    region.ampeg.sustain = centibels_to_percent(zone.sustain).clamp(0.0, 100.0);
    region.ampeg.release = timecents_to_seconds(zone.release).clamp(0.001, 100.0);

    if region.volume > MAX_GAIN_DB {
        region.volume = MAX_GAIN_DB;
        diagnostics.unsupported("extreme gain in initialAttenuation");
    }

    region
}

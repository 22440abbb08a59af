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

//! Generator operators of the SF2 2.01 format.

pub(crate) const START_ADDRS_OFFSET: u16 = 0;
pub(crate) const END_ADDRS_OFFSET: u16 = 1;
pub(crate) const STARTLOOP_ADDRS_OFFSET: u16 = 2;
pub(crate) const ENDLOOP_ADDRS_OFFSET: u16 = 3;
pub(crate) const START_ADDRS_COARSE_OFFSET: u16 = 4;
pub(crate) const END_ADDRS_COARSE_OFFSET: u16 = 12;
pub(crate) const PAN: u16 = 17;
pub(crate) const DELAY_VOL_ENV: u16 = 33;
pub(crate) const ATTACK_VOL_ENV: u16 = 34;
pub(crate) const HOLD_VOL_ENV: u16 = 35;
pub(crate) const DECAY_VOL_ENV: u16 = 36;
pub(crate) const SUSTAIN_VOL_ENV: u16 = 37;
pub(crate) const RELEASE_VOL_ENV: u16 = 38;
pub(crate) const INSTRUMENT: u16 = 41;
pub(crate) const KEY_RANGE: u16 = 43;
pub(crate) const VEL_RANGE: u16 = 44;
pub(crate) const STARTLOOP_ADDRS_COARSE_OFFSET: u16 = 45;
pub(crate) const INITIAL_ATTENUATION: u16 = 48;
pub(crate) const ENDLOOP_ADDRS_COARSE_OFFSET: u16 = 50;
pub(crate) const COARSE_TUNE: u16 = 51;
pub(crate) const FINE_TUNE: u16 = 52;
pub(crate) const SAMPLE_ID: u16 = 53;
pub(crate) const SAMPLE_MODES: u16 = 54;
pub(crate) const SCALE_TUNING: u16 = 56;
pub(crate) const EXCLUSIVE_CLASS: u16 = 57;
pub(crate) const OVERRIDING_ROOT_KEY: u16 = 58;
pub(crate) const END_OPER: u16 = 60;

const NAMES: [&str; 61] = [
    "startAddrsOffset",
    "endAddrsOffset",
    "startloopAddrsOffset",
    "endloopAddrsOffset",
    "startAddrsCoarseOffset",
    "modLfoToPitch",
    "vibLfoToPitch",
    "modEnvToPitch",
    "initialFilterFc",
    "initialFilterQ",
    "modLfoToFilterFc",
    "modEnvToFilterFc",
    "endAddrsCoarseOffset",
    "modLfoToVolume",
    "unused1",
    "chorusEffectsSend",
    "reverbEffectsSend",
    "pan",
    "unused2",
    "unused3",
    "unused4",
    "delayModLFO",
    "freqModLFO",
    "delayVibLFO",
    "freqVibLFO",
    "delayModEnv",
    "attackModEnv",
    "holdModEnv",
    "decayModEnv",
    "sustainModEnv",
    "releaseModEnv",
    "keynumToModEnvHold",
    "keynumToModEnvDecay",
    "delayVolEnv",
    "attackVolEnv",
    "holdVolEnv",
    "decayVolEnv",
    "sustainVolEnv",
    "releaseVolEnv",
    "keynumToVolEnvHold",
    "keynumToVolEnvDecay",
    "instrument",
    "reserved1",
    "keyRange",
    "velRange",
    "startloopAddrsCoarseOffset",
    "keynum",
    "velocity",
    "initialAttenuation",
    "reserved2",
    "endloopAddrsCoarseOffset",
    "coarseTune",
    "fineTune",
    "sampleID",
    "sampleModes",
    "reserved3",
    "scaleTuning",
    "exclusiveClass",
    "overridingRootKey",
    "unused5",
    "endOper",
];

/// Returns the name of a generator operator, used in diagnostics.
pub(crate) fn generator_name(operator: u16) -> String {
    match NAMES.get(operator as usize) {
        Some(name) => name.to_string(),
        None => format!("generator #{}", operator),
    }
}

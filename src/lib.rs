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

//! A sample-playback synthesizer for SF2, SF3 and SFZ soundbanks.
pub mod audio;
pub mod config;
pub mod instrument;
pub mod midi;
pub mod samples;
pub mod soundbank;
pub mod synth;
#[cfg(test)]
mod testutil;
pub mod tuning;

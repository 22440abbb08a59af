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

use std::{io, path::PathBuf};

use crate::samples::SampleDecodeError;

/// Errors that stop a soundbank from loading. These are never propagated out of
/// [`crate::soundbank::SoundBank::load`]; they are recorded as diagnostics and the
/// bank is left without presets.
#[derive(Debug, thiserror::Error)]
pub enum SoundbankError {
    #[error("Unable to read \"{path}\": {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Unknown soundbank type \"{0}\".")]
    UnknownFormat(String),

    #[error("Not a RIFF file.")]
    NotRiff,

    #[error("Unexpected end of data at byte {offset} (wanted {wanted} more bytes).")]
    UnexpectedEof { offset: usize, wanted: usize },

    #[error("Invalid SF2 file (missing or incomplete hydra).")]
    IncompleteHydra,

    #[error("SF2 is missing its \"smpl\" chunk.")]
    MissingSampleData,

    #[error("Invalid SF2 file (zone index out of range).")]
    ZoneOutOfRange,

    #[error("Instrument out of range.")]
    InstrumentOutOfRange,

    #[error("Sample out of range.")]
    SampleOutOfRange,

    #[error("Couldn't load sample \"{0}\"")]
    SampleLoad(String),

    #[error("Couldn't decode compressed sample data: {0}")]
    Decode(#[from] SampleDecodeError),
}

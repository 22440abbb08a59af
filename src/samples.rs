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

//! Sample storage for soundbanks.
//!
//! All audio is decoded into memory when a bank is loaded so that rendering
//! never touches the disk.

mod decode;
mod store;

pub use decode::{decode_compressed, decode_file, DecodedAudio, SampleDecodeError};
pub use store::{BufferHandle, PcmBuffer, Sample, SampleHandle, SampleStore};

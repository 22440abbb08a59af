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

//! The nine parallel record arrays of the `pdta` list.

use super::{
    error::SoundbankError,
    riff::{ByteReader, Chunk},
};

const PRESET_HEADER_SIZE: usize = 38;
const BAG_SIZE: usize = 4;
const MODULATOR_SIZE: usize = 10;
const GENERATOR_SIZE: usize = 4;
const INSTRUMENT_HEADER_SIZE: usize = 22;
const SAMPLE_HEADER_SIZE: usize = 46;
const NAME_WIDTH: usize = 20;

/// Set in a sample header's type when the sample data is a compressed stream.
pub(crate) const SAMPLE_TYPE_COMPRESSED: u16 = 0x10;

#[derive(Clone, Debug)]
pub(crate) struct PresetHeader {
    pub name: String,
    pub program: u16,
    pub bank: u16,
    pub bag_index: u16,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Bag {
    pub generator_index: u16,
    pub modulator_index: u16,
}

/// A generator record. The amount is kept raw and interpreted per operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Generator {
    pub operator: u16,
    pub amount: u16,
}

impl Generator {
    pub fn short(&self) -> i16 {
        self.amount as i16
    }

    pub fn word(&self) -> u16 {
        self.amount
    }

    /// Returns the (low, high) bytes of a range amount.
    pub fn range(&self) -> (u8, u8) {
        ((self.amount & 0xff) as u8, (self.amount >> 8) as u8)
    }
}

#[derive(Clone, Debug)]
pub(crate) struct InstrumentHeader {
    pub name: String,
    pub bag_index: u16,
}

#[derive(Clone, Debug)]
pub(crate) struct SampleHeader {
    pub name: String,
    pub start: u32,
    pub end: u32,
    pub loop_start: u32,
    pub loop_end: u32,
    pub sample_rate: u32,
    pub original_pitch: u8,
    pub pitch_correction: i8,
    pub sample_type: u16,
}

impl SampleHeader {
    pub fn is_compressed(&self) -> bool {
        self.sample_type & SAMPLE_TYPE_COMPRESSED != 0
    }
}

/// The preset/instrument/sample description of a bank. Every array still
/// carries its terminal record.
#[derive(Debug, Default)]
pub(crate) struct Hydra {
    pub preset_headers: Vec<PresetHeader>,
    pub preset_bags: Vec<Bag>,
    pub preset_modulators: usize,
    pub preset_generators: Vec<Generator>,
    pub instrument_headers: Vec<InstrumentHeader>,
    pub instrument_bags: Vec<Bag>,
    pub instrument_modulators: usize,
    pub instrument_generators: Vec<Generator>,
    pub sample_headers: Vec<SampleHeader>,
}

impl Hydra {
    pub fn read(bytes: &[u8], pdta: &Chunk) -> Result<Hydra, SoundbankError> {
        let mut hydra = Hydra::default();

        for chunk in pdta.children(bytes) {
            match &chunk.id {
                b"phdr" => {
                    hydra.preset_headers =
                        read_records(bytes, &chunk, PRESET_HEADER_SIZE, read_preset_header)?
                }
                b"pbag" => hydra.preset_bags = read_records(bytes, &chunk, BAG_SIZE, read_bag)?,
                b"pmod" => hydra.preset_modulators = chunk.size / MODULATOR_SIZE,
                b"pgen" => {
                    hydra.preset_generators =
                        read_records(bytes, &chunk, GENERATOR_SIZE, read_generator)?
                }
                b"inst" => {
                    hydra.instrument_headers = read_records(
                        bytes,
                        &chunk,
                        INSTRUMENT_HEADER_SIZE,
                        read_instrument_header,
                    )?
                }
                b"ibag" => {
                    hydra.instrument_bags = read_records(bytes, &chunk, BAG_SIZE, read_bag)?
                }
                b"imod" => hydra.instrument_modulators = chunk.size / MODULATOR_SIZE,
                b"igen" => {
                    hydra.instrument_generators =
                        read_records(bytes, &chunk, GENERATOR_SIZE, read_generator)?
                }
                b"shdr" => {
                    hydra.sample_headers =
                        read_records(bytes, &chunk, SAMPLE_HEADER_SIZE, read_sample_header)?
                }
                _ => {}
            }
        }

        if !hydra.is_complete() {
            return Err(SoundbankError::IncompleteHydra);
        }
        Ok(hydra)
    }

    fn is_complete(&self) -> bool {
        !self.preset_headers.is_empty()
            && !self.preset_bags.is_empty()
            && self.preset_modulators > 0
            && !self.preset_generators.is_empty()
            && !self.instrument_headers.is_empty()
            && !self.instrument_bags.is_empty()
            && self.instrument_modulators > 0
            && !self.instrument_generators.is_empty()
            && !self.sample_headers.is_empty()
    }

    /// Whether any sample header marks its data as a compressed stream.
    pub fn has_compressed_samples(&self) -> bool {
        self.sample_headers.iter().any(SampleHeader::is_compressed)
    }
}

fn read_records<T>(
    bytes: &[u8],
    chunk: &Chunk,
    record_size: usize,
    read: fn(&mut ByteReader) -> Result<T, SoundbankError>,
) -> Result<Vec<T>, SoundbankError> {
    let count = chunk.size / record_size;
    let mut reader = ByteReader::at(bytes, chunk.start);
    (0..count).map(|_| read(&mut reader)).collect()
}

fn read_preset_header(reader: &mut ByteReader) -> Result<PresetHeader, SoundbankError> {
    let name = reader.read_name(NAME_WIDTH)?;
    let program = reader.read_u16()?;
    let bank = reader.read_u16()?;
    let bag_index = reader.read_u16()?;
    // Library, genre and morphology are reserved.
    reader.read_u32()?;
    reader.read_u32()?;
    reader.read_u32()?;
    Ok(PresetHeader {
        name,
        program,
        bank,
        bag_index,
    })
}

fn read_bag(reader: &mut ByteReader) -> Result<Bag, SoundbankError> {
    Ok(Bag {
        generator_index: reader.read_u16()?,
        modulator_index: reader.read_u16()?,
    })
}

fn read_generator(reader: &mut ByteReader) -> Result<Generator, SoundbankError> {
    Ok(Generator {
        operator: reader.read_u16()?,
        amount: reader.read_u16()?,
    })
}

fn read_instrument_header(reader: &mut ByteReader) -> Result<InstrumentHeader, SoundbankError> {
    Ok(InstrumentHeader {
        name: reader.read_name(NAME_WIDTH)?,
        bag_index: reader.read_u16()?,
    })
}

fn read_sample_header(reader: &mut ByteReader) -> Result<SampleHeader, SoundbankError> {
    let name = reader.read_name(NAME_WIDTH)?;
    let start = reader.read_u32()?;
    let end = reader.read_u32()?;
    let loop_start = reader.read_u32()?;
    let loop_end = reader.read_u32()?;
    let sample_rate = reader.read_u32()?;
    let original_pitch = reader.read_u8()?;
    let pitch_correction = reader.read_i8()?;
    let _sample_link = reader.read_u16()?;
    let sample_type = reader.read_u16()?;
    Ok(SampleHeader {
        name,
        start,
        end,
        loop_start,
        loop_end,
        sample_rate,
        original_pitch,
        pitch_correction,
        sample_type,
    })
}

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

//! Builds small SF2 files in memory.

/// A sample header. Offsets are in frames of the shared `smpl` data (or in bytes
/// for compressed samples).
#[derive(Clone, Debug)]
pub struct TestSample {
    pub name: &'static str,
    pub start: u32,
    pub end: u32,
    pub loop_start: u32,
    pub loop_end: u32,
    pub sample_rate: u32,
    pub original_pitch: u8,
    pub pitch_correction: i8,
    pub sample_type: u16,
}

impl TestSample {
    pub fn new(name: &'static str, start: u32, end: u32, loop_start: u32, loop_end: u32) -> Self {
        TestSample {
            name,
            start,
            end,
            loop_start,
            loop_end,
            sample_rate: 44100,
            original_pitch: 60,
            pitch_correction: 0,
            sample_type: 1,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct TestZone {
    pub generators: Vec<(u16, u16)>,
    pub modulators: usize,
}

impl TestZone {
    pub fn new(generators: Vec<(u16, u16)>) -> Self {
        TestZone {
            generators,
            modulators: 0,
        }
    }

    pub fn with_modulators(mut self, count: usize) -> Self {
        self.modulators = count;
        self
    }

    pub fn short(operator: u16, amount: i16) -> (u16, u16) {
        (operator, amount as u16)
    }

    pub fn key_range(lo: u8, hi: u8) -> (u16, u16) {
        (43, lo as u16 | ((hi as u16) << 8))
    }

    pub fn vel_range(lo: u8, hi: u8) -> (u16, u16) {
        (44, lo as u16 | ((hi as u16) << 8))
    }

    pub fn instrument(index: u16) -> (u16, u16) {
        (41, index)
    }

    pub fn sample(index: u16) -> (u16, u16) {
        (53, index)
    }
}

#[derive(Clone, Debug)]
pub struct TestInstrument {
    pub name: &'static str,
    pub zones: Vec<TestZone>,
}

impl TestInstrument {
    pub fn new(name: &'static str, zones: Vec<TestZone>) -> Self {
        TestInstrument { name, zones }
    }
}

#[derive(Clone, Debug)]
pub struct TestPreset {
    pub name: &'static str,
    pub bank: u16,
    pub program: u16,
    pub zones: Vec<TestZone>,
}

impl TestPreset {
    pub fn new(name: &'static str, bank: u16, program: u16, zones: Vec<TestZone>) -> Self {
        TestPreset {
            name,
            bank,
            program,
            zones,
        }
    }
}

pub struct Sf2Builder {
    pub pcm: Vec<i16>,
    /// Raw `smpl` payload used instead of `pcm` when set.
    pub sample_data: Option<Vec<u8>>,
    pub samples: Vec<TestSample>,
    pub instruments: Vec<TestInstrument>,
    pub presets: Vec<TestPreset>,
    omitted: Vec<&'static str>,
}

impl Sf2Builder {
    pub fn new(pcm: Vec<i16>) -> Self {
        Sf2Builder {
            pcm,
            sample_data: None,
            samples: Vec::new(),
            instruments: Vec::new(),
            presets: Vec::new(),
            omitted: Vec::new(),
        }
    }

    /// Leaves the named chunk out of the file.
    pub fn omit_chunk(&mut self, id: &'static str) {
        self.omitted.push(id);
    }

    pub fn build(&self) -> Vec<u8> {
        let mut info = b"INFO".to_vec();
        info.extend(chunk(b"ifil", &[2, 0, 1, 0]));

        let smpl = match &self.sample_data {
            Some(data) => data.clone(),
            None => self.pcm.iter().flat_map(|s| s.to_le_bytes()).collect(),
        };
        let mut sdta = b"sdta".to_vec();
        if !self.omitted.contains(&"smpl") {
            sdta.extend(chunk(b"smpl", &smpl));
        }

        let (phdr, pbag, pmod, pgen) = self.preset_records();
        let (inst, ibag, imod, igen) = self.instrument_records();
        let shdr = self.sample_records();

        let mut pdta = b"pdta".to_vec();
        for (id, payload) in [
            (b"phdr", phdr),
            (b"pbag", pbag),
            (b"pmod", pmod),
            (b"pgen", pgen),
            (b"inst", inst),
            (b"ibag", ibag),
            (b"imod", imod),
            (b"igen", igen),
            (b"shdr", shdr),
        ] {
            if !self.omitted.iter().any(|o| o.as_bytes() == id) {
                pdta.extend(chunk(id, &payload));
            }
        }

        let mut riff = b"sfbk".to_vec();
        riff.extend(chunk(b"LIST", &info));
        riff.extend(chunk(b"LIST", &sdta));
        riff.extend(chunk(b"LIST", &pdta));
        chunk(b"RIFF", &riff)
    }

    fn preset_records(&self) -> (Vec<u8>, Vec<u8>, Vec<u8>, Vec<u8>) {
        let mut headers = Vec::new();
        let mut zones = Vec::new();
        for preset in &self.presets {
            headers.extend(name(preset.name));
            headers.extend(preset.program.to_le_bytes());
            headers.extend(preset.bank.to_le_bytes());
            headers.extend((zones.len() as u16).to_le_bytes());
            headers.extend([0u8; 12]);
            zones.extend(preset.zones.iter().cloned());
        }
        headers.extend(name("EOP"));
        headers.extend([0u8; 4]);
        headers.extend((zones.len() as u16).to_le_bytes());
        headers.extend([0u8; 12]);

        let (bags, modulators, generators) = zone_records(&zones);
        (headers, bags, modulators, generators)
    }

    fn instrument_records(&self) -> (Vec<u8>, Vec<u8>, Vec<u8>, Vec<u8>) {
        let mut headers = Vec::new();
        let mut zones = Vec::new();
        for instrument in &self.instruments {
            headers.extend(name(instrument.name));
            headers.extend((zones.len() as u16).to_le_bytes());
            zones.extend(instrument.zones.iter().cloned());
        }
        headers.extend(name("EOI"));
        headers.extend((zones.len() as u16).to_le_bytes());

        let (bags, modulators, generators) = zone_records(&zones);
        (headers, bags, modulators, generators)
    }

    fn sample_records(&self) -> Vec<u8> {
        let mut records = Vec::new();
        for sample in &self.samples {
            records.extend(name(sample.name));
            for value in [
                sample.start,
                sample.end,
                sample.loop_start,
                sample.loop_end,
                sample.sample_rate,
            ] {
                records.extend(value.to_le_bytes());
            }
            records.push(sample.original_pitch);
            records.push(sample.pitch_correction as u8);
            records.extend(0u16.to_le_bytes());
            records.extend(sample.sample_type.to_le_bytes());
        }
        records.extend(name("EOS"));
        records.extend([0u8; 26]);
        records
    }
}

fn zone_records(zones: &[TestZone]) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
    let mut bags = Vec::new();
    let mut modulators = Vec::new();
    let mut generators = Vec::new();
    let mut generator_count = 0u16;
    let mut modulator_count = 0u16;
    for zone in zones {
        bags.extend(generator_count.to_le_bytes());
        bags.extend(modulator_count.to_le_bytes());
        for (operator, amount) in &zone.generators {
            generators.extend(operator.to_le_bytes());
            generators.extend(amount.to_le_bytes());
            generator_count += 1;
        }
        for _ in 0..zone.modulators {
            modulators.extend([0u8; 10]);
            modulator_count += 1;
        }
    }
    bags.extend(generator_count.to_le_bytes());
    bags.extend(modulator_count.to_le_bytes());
    modulators.extend([0u8; 10]);
    generators.extend([0u8; 4]);
    (bags, modulators, generators)
}

fn name(name: &str) -> Vec<u8> {
    let mut bytes = name.as_bytes().to_vec();
    bytes.resize(20, 0);
    bytes
}

fn chunk(id: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut bytes = id.to_vec();
    bytes.extend((payload.len() as u32).to_le_bytes());
    bytes.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        bytes.push(0);
    }
    bytes
}

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

//! SF2 banks and their compressed SF3 variant.

use super::{
    diagnostics::Diagnostics,
    error::SoundbankError,
    hydra::{Bag, Generator, Hydra},
    preset::Preset,
    resolve::{finalize, resolve, ZoneParameters},
    riff::{ByteReader, Chunk},
};
use crate::samples::{decode_compressed, PcmBuffer, SampleDecodeError, SampleStore};

/// Frames of silence appended to uncompressed sample data so that
/// interpolation never reads past the end.
const PADDING_FRAMES: usize = 4;

pub(crate) struct Sf2Contents {
    pub presets: Vec<Preset>,
    pub store: SampleStore,
}

/// One zone of a preset or instrument.
struct Zone<'a> {
    generators: &'a [Generator],
    has_modulators: bool,
}

/// Reads a whole SF2 file. Problems with individual zones are recorded and the
/// zone skipped; structural problems fail the whole bank.
pub(crate) fn read(
    bytes: &[u8],
    compressed_hint: bool,
    diagnostics: &mut Diagnostics,
) -> Result<Sf2Contents, SoundbankError> {
    read_with_decoder(bytes, compressed_hint, diagnostics, decode_stream)
}

/// Decodes one compressed stream to mono.
fn decode_stream(bytes: &[u8]) -> Result<Vec<f32>, SampleDecodeError> {
    decode_compressed(bytes).map(|audio| audio.buffer.to_mono())
}

fn read_with_decoder<F>(
    bytes: &[u8],
    compressed_hint: bool,
    diagnostics: &mut Diagnostics,
    decode: F,
) -> Result<Sf2Contents, SoundbankError>
where
    F: Fn(&[u8]) -> Result<Vec<f32>, SampleDecodeError> + Sync,
{
    let mut reader = ByteReader::new(bytes);
    let riff = Chunk::read(&mut reader)?;
    if &riff.id != b"RIFF" {
        return Err(SoundbankError::NotRiff);
    }

    let mut smpl = None;
    let mut pdta = None;
    for chunk in riff.children(bytes) {
        if chunk.is_list(b"sdta") {
            smpl = chunk
                .children(bytes)
                .into_iter()
                .find(|child| &child.id == b"smpl");
        } else if chunk.is_list(b"pdta") {
            pdta = Some(chunk);
        }
    }

    let pdta = pdta.ok_or(SoundbankError::IncompleteHydra)?;
    let hydra = Hydra::read(bytes, &pdta)?;
    let data = smpl
        .as_ref()
        .and_then(|chunk| chunk.data(bytes))
        .ok_or(SoundbankError::MissingSampleData)?;

    let compressed = compressed_hint || hydra.has_compressed_samples();
    let mut store = SampleStore::new();
    if compressed {
        store.set_shared_buffer(PcmBuffer::default());
    } else {
        store.set_shared_buffer(PcmBuffer::mono(convert_pcm(data)));
    }

    let mut presets = build_presets(&hydra, &mut store, diagnostics);
    if compressed {
        decompress(&mut presets, data, &mut store, diagnostics, decode);
    }
    presets.sort_by_key(|preset| (preset.bank(), preset.program()));

    Ok(Sf2Contents { presets, store })
}

fn convert_pcm(data: &[u8]) -> Vec<f32> {
    let mut samples: Vec<f32> = data
        .chunks_exact(2)
        .map(|bytes| i16::from_le_bytes([bytes[0], bytes[1]]) as f32 / 32767.0)
        .collect();
    samples.extend([0.0; PADDING_FRAMES]);
    samples
}

/// Returns the zones in `first..last` of a bag array.
fn zones<'a>(
    bags: &[Bag],
    generators: &'a [Generator],
    first: u16,
    last: u16,
) -> Result<Vec<Zone<'a>>, SoundbankError> {
    (first..last)
        .map(|index| {
            let bag = bags.get(index as usize);
            let next = bags.get(index as usize + 1);
            let (bag, next) = bag.zip(next).ok_or(SoundbankError::ZoneOutOfRange)?;
            let generators = generators
                .get(bag.generator_index as usize..next.generator_index as usize)
                .ok_or(SoundbankError::ZoneOutOfRange)?;
            Ok(Zone {
                generators,
                has_modulators: next.modulator_index > bag.modulator_index,
            })
        })
        .collect()
}

fn build_presets(
    hydra: &Hydra,
    store: &mut SampleStore,
    diagnostics: &mut Diagnostics,
) -> Vec<Preset> {
    let mut presets = Vec::new();
    for pair in hydra.preset_headers.windows(2) {
        let (header, next) = (&pair[0], &pair[1]);
        let mut preset = Preset::new(&header.name, header.bank, header.program);
        if let Err(e) = add_preset_zones(
            hydra,
            header.bag_index,
            next.bag_index,
            &mut preset,
            store,
            diagnostics,
        ) {
            diagnostics.error(e.to_string());
        }
        presets.push(preset);
    }
    presets
}

fn add_preset_zones(
    hydra: &Hydra,
    first: u16,
    last: u16,
    preset: &mut Preset,
    store: &mut SampleStore,
    diagnostics: &mut Diagnostics,
) -> Result<(), SoundbankError> {
    let zones = zones(&hydra.preset_bags, &hydra.preset_generators, first, last)?;
    let mut global = ZoneParameters::relative();

    for (index, zone) in zones.iter().enumerate() {
        if zone.has_modulators {
            diagnostics.unsupported("any modulator");
        }
        let parameters = resolve(&global, zone.generators, diagnostics);
        match parameters.instrument {
            Some(instrument) => {
                if let Err(e) =
                    add_instrument(hydra, instrument, &parameters, preset, store, diagnostics)
                {
                    diagnostics.error(e.to_string());
                }
            }
            // Only the first zone may be global; later zones without an
            // instrument are ignored.
            None if index == 0 => global = parameters,
            None => {}
        }
    }
    Ok(())
}

fn add_instrument(
    hydra: &Hydra,
    instrument: u16,
    preset_zone: &ZoneParameters,
    preset: &mut Preset,
    store: &mut SampleStore,
    diagnostics: &mut Diagnostics,
) -> Result<(), SoundbankError> {
    let index = instrument as usize;
    // The last header is the terminal record.
    if index + 1 >= hydra.instrument_headers.len() {
        return Err(SoundbankError::InstrumentOutOfRange);
    }
    let first = hydra.instrument_headers[index].bag_index;
    let last = hydra.instrument_headers[index + 1].bag_index;
    let zones = zones(&hydra.instrument_bags, &hydra.instrument_generators, first, last)?;

    let mut global = ZoneParameters::absolute().with_ranges_of(preset_zone);
    for (zone_index, zone) in zones.iter().enumerate() {
        if zone.has_modulators {
            diagnostics.unsupported("any modulator");
        }
        let parameters = resolve(&global, zone.generators, diagnostics);
        let sample_id = match parameters.sample_id {
            Some(sample_id) => sample_id as usize,
            None => {
                if zone_index == 0 {
                    global = parameters;
                }
                continue;
            }
        };

        let header = match hydra.sample_headers.get(sample_id) {
            Some(header) if sample_id + 1 < hydra.sample_headers.len() => header,
            _ => {
                diagnostics.error(SoundbankError::SampleOutOfRange.to_string());
                continue;
            }
        };
        let sample = store.sample_for_rate(header.sample_rate);
        let combined = parameters.add_relative(preset_zone);
        preset.add_region(finalize(&combined, header, Some(sample), diagnostics));
    }
    Ok(())
}

/// Decodes the compressed streams regions refer to and rewrites the regions'
/// byte offsets into frame offsets of the decoded buffer. Loop points of
/// compressed samples are relative to the sample start.
fn decompress<F>(
    presets: &mut [Preset],
    data: &[u8],
    store: &mut SampleStore,
    diagnostics: &mut Diagnostics,
    decode: F,
) where
    F: Fn(&[u8]) -> Result<Vec<f32>, SampleDecodeError> + Sync,
{
    let ranges: Vec<(u64, u64)> = presets
        .iter()
        .flat_map(|preset| preset.regions())
        .filter(|region| region.sample.is_some())
        .map(|region| (region.offset, region.end))
        .collect();

    let (frames, errors) = store.decompress_ranges(data, &ranges, decode);
    for (_, e) in errors {
        diagnostics.error(SoundbankError::Decode(e).to_string());
    }

    for preset in presets.iter_mut() {
        for region in preset.regions_mut().iter_mut() {
            match frames.get(&(region.offset, region.end)) {
                Some(&(start, end)) => {
                    region.offset = start;
                    region.end = end;
                    region.loop_start += start;
                    region.loop_end += start;
                }
                None => region.sample = None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soundbank::{generator, region::LoopMode};
    use crate::testutil::sf2::{Sf2Builder, TestInstrument, TestPreset, TestSample, TestZone};

    fn piano_builder() -> Sf2Builder {
        let mut builder = Sf2Builder::new(vec![0, 16383, 32767, -32767, 0, 0, 0, 0, 0, 0]);
        builder.samples.push(TestSample::new("Tone", 0, 8, 2, 6));
        builder.instruments.push(TestInstrument::new(
            "Tone",
            vec![
                // Global zone.
                TestZone::new(vec![TestZone::short(generator::ATTACK_VOL_ENV, 0)]),
                TestZone::new(vec![
                    TestZone::key_range(48, 72),
                    TestZone::short(generator::SAMPLE_MODES, 1),
                    TestZone::sample(0),
                ]),
            ],
        ));
        builder
    }

    #[test]
    fn test_presets_are_sorted_and_named() {
        let mut builder = piano_builder();
        for (name, bank, program) in [("Strings", 0, 5), ("Drums", 128, 0), ("Piano", 0, 1)] {
            builder.presets.push(TestPreset::new(
                name,
                bank,
                program,
                vec![TestZone::new(vec![TestZone::instrument(0)])],
            ));
        }

        let mut diagnostics = Diagnostics::default();
        let contents = read(&builder.build(), false, &mut diagnostics).unwrap();
        let names: Vec<String> = contents.presets.iter().map(Preset::display_name).collect();
        assert_eq!(names, vec!["1: Piano", "5: Strings", "128/0: Drums"]);
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn test_pcm_is_converted_and_padded() {
        let mut builder = piano_builder();
        builder.presets.push(TestPreset::new(
            "Piano",
            0,
            0,
            vec![TestZone::new(vec![TestZone::instrument(0)])],
        ));
        let mut diagnostics = Diagnostics::default();
        let contents = read(&builder.build(), false, &mut diagnostics).unwrap();

        let region = &contents.presets[0].regions()[0];
        let buffer = contents.store.sample_buffer(region.sample.unwrap()).unwrap();
        assert_eq!(buffer.num_frames(), 14);
        assert_eq!(buffer.channel(0)[2], 1.0);
        assert_eq!(buffer.channel(0)[3], -1.0);
        assert_eq!(&buffer.channel(0)[10..], &[0.0; 4]);
    }

    #[test]
    fn test_zones_resolve_into_regions() {
        let mut builder = piano_builder();
        builder.presets.push(TestPreset::new(
            "Piano",
            0,
            0,
            vec![
                TestZone::new(vec![TestZone::short(generator::PAN, 250)]),
                TestZone::new(vec![
                    TestZone::short(generator::COARSE_TUNE, 2),
                    TestZone::instrument(0),
                ]),
            ],
        ));
        let mut diagnostics = Diagnostics::default();
        let contents = read(&builder.build(), false, &mut diagnostics).unwrap();

        let regions = contents.presets[0].regions();
        assert_eq!(regions.len(), 1);
        let region = &regions[0];
        assert_eq!((region.lokey, region.hikey), (48, 72));
        assert_eq!(region.loop_mode, LoopMode::LoopContinuous);
        assert_eq!((region.offset, region.end), (0, 8));
        assert_eq!((region.loop_start, region.loop_end), (2, 5));
        assert_eq!(region.transpose, 2);
        assert!((region.pan - 50.0).abs() < 1e-4);
        assert_eq!(region.pitch_keycenter, 60);
        assert_eq!(region.ampeg.attack, 1.0);
    }

    #[test]
    fn test_instrument_out_of_range() {
        let mut builder = piano_builder();
        builder.presets.push(TestPreset::new(
            "Broken",
            0,
            0,
            vec![TestZone::new(vec![TestZone::instrument(7)])],
        ));
        builder.presets.push(TestPreset::new(
            "Fine",
            0,
            1,
            vec![TestZone::new(vec![TestZone::instrument(0)])],
        ));
        let mut diagnostics = Diagnostics::default();
        let contents = read(&builder.build(), false, &mut diagnostics).unwrap();
        assert_eq!(diagnostics.errors(), &["Instrument out of range.".to_string()]);
        assert_eq!(contents.presets.len(), 2);
        assert!(contents.presets[0].regions().is_empty());
        assert_eq!(contents.presets[1].regions().len(), 1);
    }

    #[test]
    fn test_modulators_are_reported() {
        let mut builder = piano_builder();
        builder.presets.push(TestPreset::new(
            "Piano",
            0,
            0,
            vec![TestZone::new(vec![TestZone::instrument(0)]).with_modulators(2)],
        ));
        let mut diagnostics = Diagnostics::default();
        read(&builder.build(), false, &mut diagnostics).unwrap();
        assert_eq!(
            diagnostics.warnings(),
            &["unsupported opcode: any modulator".to_string()]
        );
    }

    #[test]
    fn test_missing_sample_data() {
        let mut builder = piano_builder();
        builder.presets.push(TestPreset::new(
            "Piano",
            0,
            0,
            vec![TestZone::new(vec![TestZone::instrument(0)])],
        ));
        builder.omit_chunk("smpl");
        let mut diagnostics = Diagnostics::default();
        assert!(matches!(
            read(&builder.build(), false, &mut diagnostics),
            Err(SoundbankError::MissingSampleData)
        ));
    }

    #[test]
    fn test_truncated_hydra() {
        let mut builder = piano_builder();
        builder.presets.push(TestPreset::new(
            "Piano",
            0,
            0,
            vec![TestZone::new(vec![TestZone::instrument(0)])],
        ));
        let mut bytes = builder.build();
        bytes.truncate(bytes.len() - 30);
        let mut diagnostics = Diagnostics::default();
        assert!(matches!(
            read(&bytes, false, &mut diagnostics),
            Err(SoundbankError::IncompleteHydra)
        ));
    }

    #[test]
    fn test_not_riff() {
        let mut diagnostics = Diagnostics::default();
        assert!(matches!(
            read(b"RIFXnothing here", false, &mut diagnostics),
            Err(SoundbankError::NotRiff)
        ));
    }

    #[test]
    fn test_undecodable_compressed_streams_are_silent() {
        let mut builder = piano_builder();
        builder.sample_data = Some(vec![7u8; 64]);
        builder.samples[0].sample_type = 0x11;
        builder.samples[0].end = 64;
        builder.presets.push(TestPreset::new(
            "Piano",
            0,
            0,
            vec![TestZone::new(vec![TestZone::instrument(0)])],
        ));
        let mut diagnostics = Diagnostics::default();
        let contents = read(&builder.build(), false, &mut diagnostics).unwrap();
        assert_eq!(contents.presets[0].regions().len(), 1);
        assert!(contents.presets[0].regions()[0].sample.is_none());
        assert!(diagnostics.errors()[0].starts_with("Couldn't decode compressed sample data"));
    }

    #[test]
    fn test_shared_compressed_streams_are_rewritten_once() {
        let mut builder = Sf2Builder::new(Vec::new());
        builder.sample_data = Some((0..64).collect());
        let mut low = TestSample::new("Low", 0, 24, 2, 6);
        low.sample_type = 0x11;
        let mut high = TestSample::new("High", 24, 64, 4, 10);
        high.sample_type = 0x11;
        builder.samples.extend([low, high]);
        builder.instruments.push(TestInstrument::new(
            "Split",
            vec![
                TestZone::new(vec![TestZone::key_range(0, 59), TestZone::sample(0)]),
                TestZone::new(vec![TestZone::key_range(60, 127), TestZone::sample(1)]),
            ],
        ));
        for (name, program) in [("A", 0), ("B", 1)] {
            builder.presets.push(TestPreset::new(
                name,
                0,
                program,
                vec![TestZone::new(vec![TestZone::instrument(0)])],
            ));
        }

        // Two frames per byte so frame offsets differ from byte offsets.
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let decode = |bytes: &[u8]| -> Result<Vec<f32>, SampleDecodeError> {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(bytes.iter().flat_map(|b| [*b as f32, *b as f32]).collect())
        };
        let mut diagnostics = Diagnostics::default();
        let contents = read_with_decoder(&builder.build(), false, &mut diagnostics, decode).unwrap();
        assert!(!diagnostics.has_errors());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);

        let layout = |preset: &Preset| -> Vec<(u64, u64, u64, u64)> {
            preset
                .regions()
                .iter()
                .map(|r| (r.offset, r.end, r.loop_start, r.loop_end))
                .collect()
        };
        let expected = vec![(0, 48, 2, 5), (48, 128, 52, 57)];
        assert_eq!(layout(&contents.presets[0]), expected);
        assert_eq!(layout(&contents.presets[1]), expected);

        let region = &contents.presets[1].regions()[1];
        let buffer = contents.store.sample_buffer(region.sample.unwrap()).unwrap();
        assert_eq!(buffer.num_frames(), 128);
        assert_eq!(buffer.channel(0)[48], 24.0);
    }
}

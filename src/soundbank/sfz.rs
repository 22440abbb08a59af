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

//! SFZ text banks.

use std::path::{Path, PathBuf};

use pest::Parser;
use pest_derive::Parser;

use super::{
    diagnostics::Diagnostics,
    preset::Preset,
    region::{LoopMode, OffMode, Region, Trigger},
    resolve::ordered_range,
};
use crate::samples::SampleStore;

#[derive(Parser)]
#[grammar = "src/soundbank/sfz.pest"]
struct SfzLineParser;

/// Semitones above A for each note letter, A to G, shifted so that
/// `octave * 12 + NOTE_OFFSETS[letter] + 9` puts A3 at 57.
const NOTE_OFFSETS: [i32; 7] = [12, 14, 3, 5, 7, 8, 10];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Building {
    Nothing,
    Group,
    Region,
}

struct SfzReader<'a> {
    store: &'a mut SampleStore,
    diagnostics: &'a mut Diagnostics,
    base_dir: PathBuf,
    default_path: PathBuf,
    group: Region,
    region: Region,
    building: Building,
    in_control: bool,
    regions: Vec<Region>,
}

/// Parses an SFZ file into a single preset. Sample files are registered with the
/// store but not decoded.
pub(crate) fn read(
    source: &str,
    base_dir: &Path,
    name: &str,
    store: &mut SampleStore,
    diagnostics: &mut Diagnostics,
) -> Preset {
    let mut reader = SfzReader {
        store,
        diagnostics,
        base_dir: base_dir.to_path_buf(),
        default_path: PathBuf::new(),
        group: Region::default(),
        region: Region::default(),
        building: Building::Nothing,
        in_control: false,
        regions: Vec::new(),
    };

    for (index, line) in source.lines().enumerate() {
        reader.read_line(line, index + 1);
    }
    reader.finish_region();

    let mut preset = Preset::new(name, 0, 0);
    for region in reader.regions {
        preset.add_region(region);
    }
    preset
}

impl SfzReader<'_> {
    fn read_line(&mut self, text: &str, line: usize) {
        let pairs = match SfzLineParser::parse(Rule::line, text) {
            Ok(mut pairs) => match pairs.next() {
                Some(pair) => pair.into_inner(),
                None => return,
            },
            Err(_) => {
                self.diagnostics.error_at_line("Malformed line", line);
                return;
            }
        };

        for pair in pairs {
            match pair.as_rule() {
                Rule::comment => break,
                Rule::tag => {
                    let name = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
                    self.tag(name, line);
                }
                Rule::bad_tag => self.diagnostics.error_at_line("Unterminated tag", line),
                Rule::path_opcode | Rule::plain_opcode => {
                    let mut inner = pair.into_inner();
                    let opcode = inner.next().map(|p| p.as_str()).unwrap_or("");
                    let value = inner.next().map(|p| p.as_str().trim()).unwrap_or("");
                    self.opcode(opcode, value, line);
                }
                Rule::bad_opcode => self.diagnostics.error_at_line("Malformed parameter", line),
                _ => {}
            }
        }
    }

    fn tag(&mut self, name: &str, line: usize) {
        match name {
            "region" => {
                self.finish_region();
                self.region = self.group.clone();
                self.building = Building::Region;
                self.in_control = false;
            }
            "group" => {
                self.finish_region();
                self.group = Region::default();
                self.building = Building::Group;
                self.in_control = false;
            }
            "control" => {
                self.finish_region();
                self.group = Region::default();
                self.building = Building::Nothing;
                self.in_control = true;
            }
            _ => self.diagnostics.error_at_line("Illegal tag", line),
        }
    }

    fn finish_region(&mut self) {
        if self.building == Building::Region {
            let mut region = self.region.clone();
            (region.lokey, region.hikey) = ordered_range((region.lokey, region.hikey));
            (region.lovel, region.hivel) = ordered_range((region.lovel, region.hivel));
            self.regions.push(region);
        }
    }

    fn current(&mut self) -> Option<&mut Region> {
        match self.building {
            Building::Region => Some(&mut self.region),
            Building::Group => Some(&mut self.group),
            Building::Nothing => None,
        }
    }

    fn opcode(&mut self, opcode: &str, value: &str, line: usize) {
        if self.in_control {
            match opcode {
                "default_path" => self.default_path = PathBuf::from(value.replace('\\', "/")),
                _ => self
                    .diagnostics
                    .unsupported(&format!("{} (in <control>)", opcode)),
            }
            return;
        }

        match opcode {
            "sample" => self.sample(value, line),
            "default_path" => self
                .diagnostics
                .error_at_line("\"default_path\" outside of <control> tag", line),
            _ => {
                if self.building == Building::Nothing {
                    self.diagnostics
                        .error_at_line("Setting a parameter outside a region or group", line);
                    return;
                }
                let handled = match self.current() {
                    Some(region) => apply_opcode(region, opcode, value),
                    None => true,
                };
                if !handled {
                    self.diagnostics.unsupported(opcode);
                }
                if opcode == "loop_mode" && !is_loop_mode(value) {
                    self.diagnostics
                        .unsupported(&format!("loop_mode={}", value));
                }
            }
        }
    }

    fn sample(&mut self, value: &str, line: usize) {
        if self.building == Building::Nothing {
            self.diagnostics
                .error_at_line("Adding sample outside a group or region", line);
            return;
        }
        if value.is_empty() {
            self.diagnostics.error_at_line("Empty sample path", line);
            return;
        }
        let relative = value.replace('\\', "/");
        let path = self.base_dir.join(&self.default_path).join(&relative);
        let handle = self.store.add_file_sample(&path, &relative);
        if let Some(region) = self.current() {
            region.sample = Some(handle);
        }
    }
}

fn is_loop_mode(value: &str) -> bool {
    matches!(
        value,
        "no_loop" | "one_shot" | "loop_continuous" | "loop_sustain"
    )
}

/// Applies one opcode. Returns false when the opcode is not supported.
fn apply_opcode(region: &mut Region, opcode: &str, value: &str) -> bool {
    match opcode {
        "lokey" => region.lokey = parse_key(value),
        "hikey" => region.hikey = parse_key(value),
        "key" => {
            let key = parse_key(value);
            region.lokey = key;
            region.hikey = key;
            region.pitch_keycenter = key as i32;
        }
        "lovel" => region.lovel = parse_int(value).clamp(0, 127) as u8,
        "hivel" => region.hivel = parse_int(value).clamp(0, 127) as u8,
        "trigger" => {
            region.trigger = match value {
                "release" => Trigger::Release,
                "first" => Trigger::First,
                "legato" => Trigger::Legato,
                _ => Trigger::Attack,
            }
        }
        "group" => region.group = parse_int(value).max(0) as u32,
        "off_by" => region.off_by = parse_int(value).max(0) as u32,
        "off_mode" => {
            region.off_mode = match value {
                "normal" => OffMode::Normal,
                _ => OffMode::Fast,
            }
        }
        "offset" => region.offset = parse_int(value).max(0) as u64,
        "end" => {
            let end = parse_int(value);
            if end < 0 {
                region.negative_end = true;
            } else {
                region.end = end as u64;
            }
        }
        "loop_mode" => {
            if let Some(mode) = match value {
                "no_loop" => Some(LoopMode::NoLoop),
                "one_shot" => Some(LoopMode::OneShot),
                "loop_continuous" => Some(LoopMode::LoopContinuous),
                "loop_sustain" => Some(LoopMode::LoopSustain),
                _ => None,
            } {
                region.loop_mode = mode;
            }
        }
        "loop_start" => region.loop_start = parse_int(value).max(0) as u64,
        "loop_end" => region.loop_end = parse_int(value).max(0) as u64,
        "transpose" => region.transpose = parse_int(value),
        "tune" => region.tune = parse_int(value),
        "pitch_keycenter" => region.pitch_keycenter = parse_key(value) as i32,
        "pitch_keytrack" => region.pitch_keytrack = parse_int(value),
        "bendup" => region.bend_up = parse_int(value),
        "benddown" => region.bend_down = parse_int(value),
        "volume" => region.volume = parse_float(value),
        "pan" => region.pan = parse_float(value).clamp(-100.0, 100.0),
        "amp_veltrack" => region.amp_veltrack = parse_float(value),
        "ampeg_delay" => region.ampeg.delay = parse_float(value),
        "ampeg_start" => region.ampeg.start = parse_float(value),
        "ampeg_attack" => region.ampeg.attack = parse_float(value),
        "ampeg_hold" => region.ampeg.hold = parse_float(value),
        "ampeg_decay" => region.ampeg.decay = parse_float(value),
        "ampeg_sustain" => region.ampeg.sustain = parse_float(value),
        "ampeg_release" => region.ampeg.release = parse_float(value),
        "ampeg_vel2delay" => region.ampeg_veltrack.delay = parse_float(value),
        "ampeg_vel2attack" => region.ampeg_veltrack.attack = parse_float(value),
        "ampeg_vel2hold" => region.ampeg_veltrack.hold = parse_float(value),
        "ampeg_vel2decay" => region.ampeg_veltrack.decay = parse_float(value),
        "ampeg_vel2sustain" => region.ampeg_veltrack.sustain = parse_float(value),
        "ampeg_vel2release" => region.ampeg_veltrack.release = parse_float(value),
        _ => return false,
    }
    true
}

/// Length of the leading `[+-]digits` run.
fn integer_prefix(value: &str) -> usize {
    let bytes = value.as_bytes();
    let sign = matches!(bytes.first(), Some(b'-') | Some(b'+')) as usize;
    sign + bytes[sign..].iter().take_while(|b| b.is_ascii_digit()).count()
}

/// Parses a leading integer, ignoring anything after it. Returns 0 when there
/// is none.
fn parse_int(value: &str) -> i32 {
    value[..integer_prefix(value)].parse().unwrap_or(0)
}

/// Parses a leading decimal number. Returns 0 when there is none.
fn parse_float(value: &str) -> f32 {
    let mut end = integer_prefix(value);
    let bytes = value.as_bytes();
    if bytes.get(end) == Some(&b'.') {
        end += 1 + bytes[end + 1..].iter().take_while(|b| b.is_ascii_digit()).count();
    }
    value[..end].parse().unwrap_or(0.0)
}

/// Parses a key given either as a MIDI note number or as a note name with an
/// octave, such as `c4`, `F#2` or `Bb3` (A3 is 57).
fn parse_key(value: &str) -> u8 {
    let mut chars = value.chars();
    let key = match chars.next().map(|c| c.to_ascii_uppercase()) {
        Some(letter @ 'A'..='G') => {
            let mut key = NOTE_OFFSETS[(letter as u8 - b'A') as usize];
            let rest = chars.as_str();
            let rest = match rest.as_bytes().first() {
                Some(b'#') => {
                    key += 1;
                    &rest[1..]
                }
                Some(b'b') => {
                    key -= 1;
                    &rest[1..]
                }
                _ => rest,
            };
            // Octaves past the keyboard would overflow; they clamp anyway.
            parse_int(rest).clamp(-2, 11) * 12 + key + 9
        }
        _ => parse_int(value),
    };
    key.clamp(0, 127) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> (Preset, SampleStore, Diagnostics) {
        let mut store = SampleStore::new();
        let mut diagnostics = Diagnostics::default();
        let preset = read(
            source,
            Path::new("/banks/piano"),
            "piano",
            &mut store,
            &mut diagnostics,
        );
        (preset, store, diagnostics)
    }

    #[test]
    fn test_note_names() {
        assert_eq!(parse_key("A3"), 57);
        assert_eq!(parse_key("c4"), 60);
        assert_eq!(parse_key("C#4"), 61);
        assert_eq!(parse_key("Db4"), 61);
        assert_eq!(parse_key("bb3"), 58);
        assert_eq!(parse_key("c-1"), 0);
        assert_eq!(parse_key("64"), 64);
        assert_eq!(parse_key("200"), 127);
        assert_eq!(parse_key("x"), 0);
    }

    #[test]
    fn test_lenient_numbers() {
        assert_eq!(parse_int("12abc"), 12);
        assert_eq!(parse_int("-7"), -7);
        assert_eq!(parse_int("abc"), 0);
        assert_eq!(parse_int(""), 0);
        assert_eq!(parse_float("-3.5dB"), -3.5);
        assert_eq!(parse_float("2."), 2.0);
        assert_eq!(parse_float("x"), 0.0);
    }

    #[test]
    fn test_regions_inherit_group() {
        let (preset, _, diagnostics) = parse(
            "<group> lovel=64 hivel=127 ampeg_release=0.5\n\
             <region> key=60 sample=a.wav\n\
             <region> lokey=61 hikey=c#5 pitch_keycenter=62 sample=b.wav ampeg_release=1\n\
             <group>\n\
             <region> sample=c.wav\n",
        );
        assert!(diagnostics.errors().is_empty(), "{:?}", diagnostics.errors());

        let regions = preset.regions();
        assert_eq!(regions.len(), 3);
        assert_eq!((regions[0].lokey, regions[0].hikey), (60, 60));
        assert_eq!(regions[0].pitch_keycenter, 60);
        assert_eq!(regions[0].lovel, 64);
        assert_eq!(regions[0].ampeg.release, 0.5);

        assert_eq!((regions[1].lokey, regions[1].hikey), (61, 73));
        assert_eq!(regions[1].pitch_keycenter, 62);
        assert_eq!(regions[1].ampeg.release, 1.0);
        assert_eq!(regions[1].lovel, 64);

        assert_eq!(regions[2].lovel, 0);
        assert_eq!(regions[2].ampeg.release, 0.0);
        assert_eq!(preset.name(), "piano");
    }

    #[test]
    fn test_sample_paths() {
        let (preset, store, _) = parse(
            "<control> default_path=..\\samples\\\n\
             <region> sample=Grand Piano C4.wav lokey=60\n\
             <region> sample=Grand Piano C4.wav\tlokey=61\n\
             <region> sample=sub/x.flac // a comment\n",
        );
        let regions = preset.regions();
        assert_eq!(regions.len(), 3);
        assert_eq!(regions[0].lokey, 60);
        assert_eq!(regions[1].lokey, 61);
        assert_eq!(regions[0].sample, regions[1].sample);
        assert_ne!(regions[0].sample, regions[2].sample);
        assert_eq!(store.len(), 2);

        let sample = store.sample(regions[0].sample.unwrap()).unwrap();
        assert_eq!(sample.name(), "Grand Piano C4.wav");
        let sample = store.sample(regions[2].sample.unwrap()).unwrap();
        assert_eq!(sample.name(), "sub/x.flac");
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        let (preset, _, diagnostics) = parse(
            "lokey=5\n\
             <region> sample=a.wav\n\
             <bogus>\n\
             <region lokey=3\n\
             <region> hikey\n\
             default_path=x\n\
             <control> sample=a.wav\n\
             <region> sample=\n",
        );
        assert_eq!(
            diagnostics.errors(),
            &[
                "Setting a parameter outside a region or group (line 1).".to_string(),
                "Illegal tag (line 3).".to_string(),
                "Unterminated tag (line 4).".to_string(),
                "Malformed parameter (line 5).".to_string(),
                "\"default_path\" outside of <control> tag (line 6).".to_string(),
                "Empty sample path (line 8).".to_string(),
            ]
        );
        assert_eq!(
            diagnostics.warnings(),
            &["unsupported opcode: sample (in <control>)".to_string()]
        );
        assert_eq!(preset.regions().len(), 3);
    }

    #[test]
    fn test_sample_outside_region() {
        let (_, _, diagnostics) = parse("sample=a.wav\n");
        assert_eq!(
            diagnostics.errors(),
            &["Adding sample outside a group or region (line 1).".to_string()]
        );
    }

    #[test]
    fn test_unsupported_opcodes_warn_once() {
        let (_, _, diagnostics) = parse(
            "<region> sample=a.wav cutoff=500 loop_mode=loop_forever\n\
             <region> sample=a.wav cutoff=800\n",
        );
        assert_eq!(
            diagnostics.warnings(),
            &[
                "unsupported opcode: cutoff".to_string(),
                "unsupported opcode: loop_mode=loop_forever".to_string(),
            ]
        );
    }

    #[test]
    fn test_playback_opcodes() {
        let (preset, _, diagnostics) = parse(
            "<region> sample=a.wav trigger=release group=2 off_by=3 off_mode=normal \
             offset=10 end=-1 loop_mode=loop_sustain loop_start=100 loop_end=200 \
             transpose=-12 tune=15 pitch_keytrack=50 bendup=1200 benddown=-1200 \
             volume=-6.5 pan=-150 amp_veltrack=30 ampeg_attack=0.2 ampeg_sustain=40 \
             ampeg_vel2attack=-0.1\n",
        );
        assert!(diagnostics.warnings().is_empty());
        let region = &preset.regions()[0];
        assert_eq!(region.trigger, Trigger::Release);
        assert_eq!((region.group, region.off_by), (2, 3));
        assert_eq!(region.off_mode, OffMode::Normal);
        assert_eq!(region.offset, 10);
        assert!(region.negative_end);
        assert_eq!(region.loop_mode, LoopMode::LoopSustain);
        assert_eq!((region.loop_start, region.loop_end), (100, 200));
        assert_eq!((region.transpose, region.tune), (-12, 15));
        assert_eq!(region.pitch_keytrack, 50);
        assert_eq!((region.bend_up, region.bend_down), (1200, -1200));
        assert_eq!(region.volume, -6.5);
        assert_eq!(region.pan, -100.0);
        assert_eq!(region.amp_veltrack, 30.0);
        assert_eq!(region.ampeg.attack, 0.2);
        assert_eq!(region.ampeg.sustain, 40.0);
        assert_eq!(region.ampeg_veltrack.attack, -0.1);
    }

    #[test]
    fn test_huge_octaves_clamp() {
        assert_eq!(parse_key("C999999999"), 127);
        assert_eq!(parse_key("c-999999999"), 0);
        assert_eq!(parse_key("G#2147483647"), 127);

        let (preset, _, diagnostics) = parse("<region> key=C999999999 sample=a.wav\n");
        assert!(diagnostics.errors().is_empty());
        let region = &preset.regions()[0];
        assert_eq!((region.lokey, region.hikey), (127, 127));
        assert_eq!(region.pitch_keycenter, 127);
    }

    #[test]
    fn test_reversed_ranges_are_ordered() {
        let (preset, _, _) = parse(
            "<group> lokey=72 hikey=48\n\
             <region> lovel=100 hivel=20 sample=a.wav\n",
        );
        let region = &preset.regions()[0];
        assert_eq!((region.lokey, region.hikey), (48, 72));
        assert_eq!((region.lovel, region.hivel), (20, 100));
        assert!(region.matches(60, 64, Trigger::Attack));
    }
}

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

use std::path::Path;

use tracing::{info, warn};

use super::{
    render_split, Instrument, InstrumentDescription, InstrumentError, InstrumentKind, TimedEvent,
};
use crate::config::EngineParameters;
use crate::soundbank::SoundBank;
use crate::synth::SynthEngine;
use crate::tuning::Temperament;

/// Plays SF2, SF3 and SFZ banks. Its state is the bank path and program.
pub struct SoundBankInstrument {
    engine: SynthEngine,
    parameters: EngineParameters,
}

impl SoundBankInstrument {
    pub fn new(max_voices: usize) -> SoundBankInstrument {
        SoundBankInstrument {
            engine: SynthEngine::new(max_voices),
            parameters: EngineParameters::default(),
        }
    }

    /// Loads a bank and selects its first program. Returns the number of
    /// programs.
    pub fn load(&mut self, path: &Path) -> usize {
        let programs = self.engine.load(path);
        let file_path = path.to_string_lossy();
        if path.to_str().is_none() {
            warn!(path = ?path, "Bank path is not valid UTF-8, saving it lossily");
        }
        self.parameters = EngineParameters::new(Some(file_path.as_ref()), 0);
        programs
    }

    /// Returns the program actually selected.
    pub fn set_program(&mut self, index: usize) -> usize {
        let selected = self.engine.set_current_program(index);
        self.parameters = self.parameters.clone().with_program(selected);
        selected
    }

    /// Brings the instrument to the given parameters. The bank is only
    /// reloaded when its path changes.
    pub fn apply_parameters(&mut self, parameters: &EngineParameters) {
        if parameters.file_path() != self.parameters.file_path() {
            match parameters.file_path() {
                Some(path) => {
                    self.load(Path::new(path));
                }
                None => {
                    self.engine.install_bank(SoundBank::empty());
                    self.parameters.reset();
                }
            }
        }
        self.set_program(parameters.program_index());
    }

    /// The current parameters, including program changes made over MIDI.
    pub fn parameters(&self) -> EngineParameters {
        self.parameters
            .clone()
            .with_program(self.engine.current_program())
    }

    pub fn engine(&self) -> &SynthEngine {
        &self.engine
    }
}

impl Instrument for SoundBankInstrument {
    fn fill_description(&self, description: &mut InstrumentDescription) {
        *description = InstrumentDescription {
            name: "SoundBank Synth".to_string(),
            identifier: InstrumentKind::SoundBank.identifier().to_string(),
            manufacturer: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            is_instrument: true,
            num_inputs: 0,
            num_outputs: 2,
        };
    }

    fn prepare_to_play(&mut self, sample_rate: f64, _block_size: usize) {
        self.engine.set_output_rate(sample_rate);
    }

    fn process_block(&mut self, left: &mut [f32], right: &mut [f32], events: &[TimedEvent]) {
        let engine = &self.engine;
        render_split(
            left,
            right,
            events,
            |data| engine.handle_midi(data),
            |l, r| engine.render(l, r),
        );
    }

    fn reset(&mut self) {
        self.engine.all_notes_off(None, false);
    }

    fn get_state_information(&self) -> Result<Vec<u8>, InstrumentError> {
        Ok(serde_json::to_vec(&self.parameters())?)
    }

    fn set_state_information(&mut self, data: &[u8]) -> Result<(), InstrumentError> {
        let parameters: EngineParameters = serde_json::from_slice(data)?;
        info!(
            file_path = parameters.file_path(),
            program = parameters.program_index(),
            "Restoring soundbank state"
        );
        self.apply_parameters(&parameters);
        Ok(())
    }

    fn set_temperament(&mut self, temperament: Temperament) {
        self.engine.set_temperament(temperament);
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::testutil::{
        audio::{calculate_rms, sine_i16},
        sf2::{Sf2Builder, TestInstrument, TestPreset, TestSample, TestZone},
    };

    fn write_bank(path: &Path) {
        let mut builder = Sf2Builder::new(sine_i16(440.0, 0.5, 44100, 4410));
        builder.samples.push(TestSample::new("Sine", 0, 4410, 441, 4000));
        builder.instruments.push(TestInstrument::new(
            "Sine",
            vec![TestZone::new(vec![
                TestZone::short(crate::soundbank::generator::SAMPLE_MODES, 1),
                TestZone::sample(0),
            ])],
        ));
        for (name, program) in [("Low", 0), ("High", 1), ("Top", 2)] {
            builder.presets.push(TestPreset::new(
                name,
                0,
                program,
                vec![TestZone::new(vec![TestZone::instrument(0)])],
            ));
        }
        fs::write(path, builder.build()).unwrap();
    }

    #[test]
    fn test_plays_midi() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("bank.sf2");
        write_bank(&path);

        let mut instrument = SoundBankInstrument::new(8);
        instrument.prepare_to_play(44100.0, 512);
        assert_eq!(instrument.load(&path), 3);

        let mut left = vec![0.0; 512];
        let mut right = vec![0.0; 512];
        instrument.process_block(&mut left, &mut right, &[TimedEvent::new(0, &[0x90, 60, 127])]);
        assert!(calculate_rms(&left) > 0.1);
        assert_eq!(instrument.engine().active_voices(), 1);

        instrument.reset();
        assert_eq!(instrument.engine().active_voices(), 0);
        Ok(())
    }

    #[test]
    fn test_state_round_trip() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("bank.sf2");
        write_bank(&path);

        let mut instrument = SoundBankInstrument::new(8);
        instrument.load(&path);
        instrument.set_program(2);
        let state = instrument.get_state_information()?;

        let mut restored = SoundBankInstrument::new(8);
        restored.set_state_information(&state)?;
        assert_eq!(restored.parameters(), instrument.parameters());
        assert_eq!(restored.engine().num_programs(), 3);
        assert_eq!(restored.engine().current_program(), 2);
        Ok(())
    }

    #[test]
    fn test_program_change_without_reload() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("bank.sf2");
        write_bank(&path);

        let mut instrument = SoundBankInstrument::new(8);
        instrument.load(&path);
        // Removing the file proves the bank is not read again.
        fs::remove_file(&path)?;
        instrument.apply_parameters(&EngineParameters::new(path.to_str(), 1));
        assert_eq!(instrument.engine().num_programs(), 3);
        assert_eq!(instrument.engine().current_program(), 1);

        // Program changes over MIDI show up in the saved state.
        let mut left = vec![0.0; 16];
        let mut right = vec![0.0; 16];
        instrument.process_block(&mut left, &mut right, &[TimedEvent::new(0, &[0xC0, 2])]);
        assert_eq!(instrument.parameters().program_index(), 2);

        instrument.apply_parameters(&EngineParameters::default());
        assert_eq!(instrument.engine().num_programs(), 0);
        Ok(())
    }

    #[test]
    fn test_bad_state() {
        let mut instrument = SoundBankInstrument::new(8);
        assert!(matches!(
            instrument.set_state_information(b"not json"),
            Err(InstrumentError::State(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_bank_path_is_kept() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let mut instrument = SoundBankInstrument::new(4);
        let path = Path::new(OsStr::from_bytes(b"/banks/pian\xffo.sf2"));
        assert_eq!(instrument.load(path), 0);
        assert_eq!(
            instrument.parameters().file_path(),
            Some("/banks/pian\u{FFFD}o.sf2")
        );
    }
}

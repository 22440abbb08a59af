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

use config::{Config, File};
use serde::{Deserialize, Serialize};

use super::{audio::Audio, engine::EngineParameters, error::ConfigError, tuning::Tuning};
use crate::instrument::InstrumentKind;
use crate::synth::DEFAULT_VOICES;

/// The configuration for live playing.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct Player {
    /// The audio output.
    #[serde(default)]
    audio: Audio,

    /// The MIDI input to listen to. Without one the player only renders silence.
    midi_device: Option<String>,

    /// Size of the voice pool (default: 64)
    max_voices: Option<usize>,

    /// Which instrument to play (default: soundbank)
    instrument: Option<InstrumentKind>,

    /// The soundbank and program to start with.
    #[serde(default)]
    engine: EngineParameters,

    tuning: Option<Tuning>,
}

impl Player {
    /// Deserializes a file from the path into a player configuration.
    pub fn deserialize(path: &Path) -> Result<Player, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Player>()?)
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    pub fn midi_device(&self) -> Option<&str> {
        self.midi_device.as_deref()
    }

    pub fn max_voices(&self) -> usize {
        self.max_voices.unwrap_or(DEFAULT_VOICES).max(1)
    }

    pub fn instrument(&self) -> InstrumentKind {
        self.instrument.unwrap_or(InstrumentKind::SoundBank)
    }

    pub fn engine(&self) -> &EngineParameters {
        &self.engine
    }

    /// Returns the engine parameters with a relative bank path joined onto
    /// the given directory, usually the one holding the config file.
    pub fn engine_relative_to(&self, dir: &Path) -> EngineParameters {
        match self.engine.file_path() {
            Some(file_path) if Path::new(file_path).is_relative() => {
                let joined = dir.join(file_path);
                self.engine
                    .clone()
                    .with_file(Some(joined.to_string_lossy().as_ref()))
            }
            _ => self.engine.clone(),
        }
    }

    pub fn tuning(&self) -> Option<&Tuning> {
        self.tuning.as_ref()
    }
}

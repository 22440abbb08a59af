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

use std::{fs, path::Path};

use config::{Config, File};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::ConfigError;

/// The persisted state of a soundbank instrument: which bank is loaded and
/// which of its programs is selected.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineParameters {
    /// Path to the SF2, SF3 or SFZ file.
    #[serde(default)]
    file_path: Option<String>,

    #[serde(default)]
    program_index: usize,
}

impl EngineParameters {
    pub fn new(file_path: Option<&str>, program_index: usize) -> EngineParameters {
        EngineParameters {
            file_path: file_path.map(str::to_string),
            program_index,
        }
    }

    /// Deserializes a file from the path into engine parameters.
    pub fn deserialize(path: &Path) -> Result<EngineParameters, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<EngineParameters>()?)
    }

    /// Serialize and save the parameters to a YAML file at the given path.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let serialized = serde_yml::to_string(self)?;
        info!(path = ?path, "Saving engine parameters");
        fs::write(path, serialized)?;
        Ok(())
    }

    pub fn file_path(&self) -> Option<&str> {
        self.file_path.as_deref()
    }

    pub fn program_index(&self) -> usize {
        self.program_index
    }

    pub fn with_file(mut self, file_path: Option<&str>) -> EngineParameters {
        self.file_path = file_path.map(str::to_string);
        self
    }

    pub fn with_program(mut self, program_index: usize) -> EngineParameters {
        self.program_index = program_index;
        self
    }

    /// Forgets the bank and selects the first program.
    pub fn reset(&mut self) {
        *self = EngineParameters::default();
    }
}

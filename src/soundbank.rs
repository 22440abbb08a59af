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

//! Soundbank loading: SF2, SF3 and SFZ files resolved into presets of
//! self-contained regions.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};

use tracing::{info, warn};

use crate::samples::SampleStore;

mod diagnostics;
mod error;
pub(crate) mod generator;
mod hydra;
mod preset;
mod region;
mod resolve;
mod riff;
mod sf2;
mod sfz;

pub use diagnostics::Diagnostics;
pub use error::SoundbankError;
pub use preset::Preset;
pub use region::{EnvelopeParameters, LoopMode, OffMode, Region, Trigger};
pub use resolve::{centibels_to_percent, timecents_to_seconds};

/// A loaded soundbank. Loading never fails outright: problems are collected in
/// the bank's diagnostics and a broken file simply has no presets.
#[derive(Debug, Default)]
pub struct SoundBank {
    path: Option<PathBuf>,
    presets: Vec<Preset>,
    store: SampleStore,
    diagnostics: Diagnostics,
    selected: usize,
}

impl SoundBank {
    /// A bank with no presets that plays nothing.
    pub fn empty() -> SoundBank {
        SoundBank::default()
    }

    /// Loads a bank, choosing the format by file extension.
    pub fn load(path: &Path) -> SoundBank {
        let start = Instant::now();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let mut bank = match extension.as_str() {
            "sf2" | "sf3" => match fs::read(path) {
                Ok(bytes) => SoundBank::from_sf2_bytes(&bytes, extension == "sf3"),
                Err(source) => SoundBank::failed(SoundbankError::Io {
                    path: path.to_path_buf(),
                    source,
                }),
            },
            "sfz" => match fs::read_to_string(path) {
                Ok(source) => {
                    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
                    let name = path
                        .file_stem()
                        .and_then(|stem| stem.to_str())
                        .unwrap_or("");
                    SoundBank::from_sfz_str(&source, base_dir, name)
                }
                Err(source) => SoundBank::failed(SoundbankError::Io {
                    path: path.to_path_buf(),
                    source,
                }),
            },
            _ => SoundBank::failed(SoundbankError::UnknownFormat(
                path.display().to_string(),
            )),
        };
        bank.path = Some(path.to_path_buf());

        if bank.presets.is_empty() {
            warn!(path = ?path, errors = bank.errors().len(), "Soundbank has no presets");
        }
        info!(
            path = ?path,
            presets = bank.presets.len(),
            samples = bank.store.len(),
            memory_kb = bank.store.total_memory_usage() / 1024,
            errors = bank.errors().len(),
            warnings = bank.warnings().len(),
            elapsed_ms = start.elapsed().as_millis(),
            "Soundbank loaded"
        );
        bank
    }

    /// Reads an SF2 (or, when `compressed` is set or detected, SF3) image.
    pub fn from_sf2_bytes(bytes: &[u8], compressed: bool) -> SoundBank {
        let mut diagnostics = Diagnostics::default();
        match sf2::read(bytes, compressed, &mut diagnostics) {
            Ok(contents) => SoundBank {
                path: None,
                presets: contents.presets,
                store: contents.store,
                diagnostics,
                selected: 0,
            },
            Err(e) => {
                diagnostics.error(e.to_string());
                SoundBank {
                    diagnostics,
                    ..SoundBank::default()
                }
            }
        }
    }

    /// Reads SFZ text and loads the sample files it references. Relative
    /// sample paths are resolved against `base_dir`.
    pub fn from_sfz_str(source: &str, base_dir: &Path, name: &str) -> SoundBank {
        let mut store = SampleStore::new();
        let mut diagnostics = Diagnostics::default();
        let preset = sfz::read(source, base_dir, name, &mut store, &mut diagnostics);
        for failed in store.load_file_samples() {
            diagnostics.error(SoundbankError::SampleLoad(failed).to_string());
        }
        SoundBank {
            path: None,
            presets: vec![preset],
            store,
            diagnostics,
            selected: 0,
        }
    }

    fn failed(error: SoundbankError) -> SoundBank {
        let mut bank = SoundBank::default();
        bank.diagnostics.error(error.to_string());
        bank
    }

    /// The file this bank was loaded from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn presets(&self) -> &[Preset] {
        &self.presets
    }

    pub fn preset(&self, index: usize) -> Option<&Preset> {
        self.presets.get(index)
    }

    /// Selects a preset. Out of range indices select the first preset.
    /// Returns the index actually selected.
    pub fn select(&mut self, index: usize) -> usize {
        self.selected = if index < self.presets.len() { index } else { 0 };
        self.selected
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    /// Regions of the selected preset.
    pub fn active_regions(&self) -> &[Region] {
        self.presets
            .get(self.selected)
            .map(Preset::regions)
            .unwrap_or(&[])
    }

    pub fn store(&self) -> &SampleStore {
        &self.store
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn errors(&self) -> &[String] {
        self.diagnostics.errors()
    }

    pub fn warnings(&self) -> &[String] {
        self.diagnostics.warnings()
    }
}

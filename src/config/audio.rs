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

use serde::{Deserialize, Serialize};

const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// A YAML representation of the audio output configuration.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Audio {
    /// The audio device, or "default".
    device: String,

    /// Output sample rate in Hz (default: 44100)
    sample_rate: Option<u32>,

    /// Stream buffer size in frames. When unset the backend chooses.
    buffer_size: Option<u32>,
}

impl Default for Audio {
    fn default() -> Self {
        Audio::new("default")
    }
}

impl Audio {
    /// New will create a new Audio configuration.
    pub fn new(device: &str) -> Audio {
        Audio {
            device: device.to_string(),
            sample_rate: None,
            buffer_size: None,
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Returns the output sample rate (default: 44100)
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    pub fn buffer_size(&self) -> Option<u32> {
        self.buffer_size
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;

    #[test]
    fn test_defaults() {
        let audio: Audio = Config::builder()
            .add_source(File::from_str("device: Speakers", FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(audio.device(), "Speakers");
        assert_eq!(audio.sample_rate(), 44100);
        assert_eq!(audio.buffer_size(), None);
    }

    #[test]
    fn test_explicit_values() {
        let audio: Audio = Config::builder()
            .add_source(File::from_str(
                "device: default\nsample_rate: 48000\nbuffer_size: 128",
                FileFormat::Yaml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(audio.sample_rate(), 48000);
        assert_eq!(audio.buffer_size(), Some(128));
    }
}

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

use super::error::ConfigError;
use crate::tuning::Temperament;

/// A YAML representation of a tuning system.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Tuning {
    /// Keys per period (default: 12)
    period_size: Option<i32>,

    /// Frequency ratio of one period (default: 2.0, the octave)
    period_range: Option<f64>,

    /// Key offset of each chromatic note within the period. Derived from the
    /// period size when unset.
    chromatic_map: Option<Vec<i32>>,
}

impl Tuning {
    pub fn new(period_size: i32, period_range: f64) -> Tuning {
        Tuning {
            period_size: Some(period_size),
            period_range: Some(period_range),
            chromatic_map: None,
        }
    }

    pub fn period_size(&self) -> i32 {
        self.period_size.unwrap_or(12)
    }

    pub fn period_range(&self) -> f64 {
        self.period_range.unwrap_or(2.0)
    }

    /// Builds the temperament this configuration describes.
    pub fn temperament(&self) -> Result<Temperament, ConfigError> {
        let period_size = self.period_size();
        if period_size < 1 {
            return Err(ConfigError::Invalid(format!(
                "period_size must be at least 1, got {}",
                period_size
            )));
        }
        let period_range = self.period_range();
        if period_range <= 1.0 {
            return Err(ConfigError::Invalid(format!(
                "period_range must be greater than 1, got {}",
                period_range
            )));
        }

        match &self.chromatic_map {
            None => Ok(Temperament::equal(period_size, period_range)),
            Some(map) => {
                let map: [i32; 12] = map.as_slice().try_into().map_err(|_| {
                    ConfigError::Invalid(format!(
                        "chromatic_map needs 12 entries, got {}",
                        map.len()
                    ))
                })?;
                Ok(Temperament::with_map(period_size, period_range, map))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;

    fn parse(yaml: &str) -> Tuning {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_equal_temperament() {
        let temperament = parse("period_size: 19").temperament().unwrap();
        assert_eq!(temperament.period_size(), 19);
        assert_eq!(temperament.period_range(), 2.0);
    }

    #[test]
    fn test_chromatic_map() {
        let tuning = parse(
            "period_size: 24\nchromatic_map: [0, 2, 4, 6, 8, 10, 12, 14, 16, 18, 20, 22]",
        );
        let temperament = tuning.temperament().unwrap();
        assert_eq!(temperament.middle_a(), 120 + 18);

        let tuning = parse("chromatic_map: [0, 1, 2]");
        assert!(matches!(tuning.temperament(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_invalid_values() {
        assert!(Tuning::new(0, 2.0).temperament().is_err());
        assert!(Tuning::new(12, 1.0).temperament().is_err());
        assert!(Tuning::new(12, 2.0).temperament().unwrap().is_twelve_tone());
    }
}

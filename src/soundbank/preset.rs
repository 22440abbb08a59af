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

use super::region::Region;

/// A named, bank/program addressed collection of regions.
#[derive(Clone, Debug, Default)]
pub struct Preset {
    name: String,
    bank: u16,
    program: u16,
    regions: Vec<Region>,
}

impl Preset {
    pub fn new(name: &str, bank: u16, program: u16) -> Preset {
        Preset {
            name: name.to_string(),
            bank,
            program,
            regions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bank(&self) -> u16 {
        self.bank
    }

    pub fn program(&self) -> u16 {
        self.program
    }

    /// The name shown in program lists, `bank/program: name`. The bank is
    /// omitted when it is zero.
    pub fn display_name(&self) -> String {
        if self.bank == 0 {
            format!("{}: {}", self.program, self.name)
        } else {
            format!("{}/{}: {}", self.bank, self.program, self.name)
        }
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub(crate) fn regions_mut(&mut self) -> &mut Vec<Region> {
        &mut self.regions
    }

    pub fn add_region(&mut self, region: Region) {
        self.regions.push(region);
    }
}

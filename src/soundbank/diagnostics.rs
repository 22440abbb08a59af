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

use std::collections::HashSet;

use tracing::{debug, warn};

/// Human readable problems found while loading a soundbank. Nothing here stops
/// a load; errors usually mean some or all presets are missing.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    errors: Vec<String>,
    warnings: Vec<String>,
    unsupported: HashSet<String>,
}

impl Diagnostics {
    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(error = message, "Soundbank error");
        self.errors.push(message);
    }

    /// Records an error from a line of a text soundbank.
    pub fn error_at_line(&mut self, message: &str, line: usize) {
        self.error(format!("{} (line {}).", message, line));
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        debug!(warning = message, "Soundbank warning");
        self.warnings.push(message);
    }

    /// Warns about an unsupported opcode once per bank.
    pub fn unsupported(&mut self, opcode: &str) {
        if self.unsupported.insert(opcode.to_string()) {
            self.warning(format!("unsupported opcode: {}", opcode));
        }
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

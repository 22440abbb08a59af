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

//! MIDI input devices. Raw messages are forwarded to a channel and consumed
//! by whoever owns the receiving end, usually the audio callback.
use std::{error::Error, fmt, sync::Arc};

use tokio::sync::mpsc::Sender;

mod midir;
pub mod mock;

/// A MIDI device that can listen for inputs.
pub trait Device: fmt::Display + std::marker::Send + std::marker::Sync {
    /// Returns the name of the device.
    fn name(&self) -> String;

    /// Watches MIDI input for events and sends them to the given sender.
    fn watch_events(&self, sender: Sender<Vec<u8>>) -> Result<(), Box<dyn Error>>;

    /// Stops watching events.
    fn stop_watch_events(&self);
}

/// Lists devices known to midir.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, Box<dyn Error>> {
    midir::list()
}

/// Gets a device with the given name.
pub fn get_device(name: &str) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    if name.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(name)));
    };

    Ok(Arc::new(midir::get(name)?))
}

/// Picks the single entry whose name contains the query.
pub(crate) fn select_by_name<T>(
    candidates: Vec<T>,
    query: &str,
    name: impl Fn(&T) -> &str,
) -> Result<T, Box<dyn Error>> {
    let mut matches = candidates
        .into_iter()
        .filter(|candidate| name(candidate).contains(query))
        .collect::<Vec<T>>();

    if matches.is_empty() {
        return Err(format!("no device found with name {}", query).into());
    }
    if matches.len() > 1 {
        return Err(format!(
            "found too many devices that match ({}), use a less ambiguous device name",
            matches
                .iter()
                .map(|candidate| name(candidate).to_string())
                .collect::<Vec<String>>()
                .join(", ")
        )
        .into());
    }

    Ok(matches.swap_remove(0))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_select_by_name() {
        let names = || vec!["Keystation 49", "Launchpad", "Keystation 88"];

        let found = select_by_name(names(), "Launch", |name| *name).unwrap();
        assert_eq!(found, "Launchpad");

        let err = select_by_name(names(), "Keystation", |name| *name).unwrap_err();
        assert!(err.to_string().contains("Keystation 49, Keystation 88"));

        let err = select_by_name(names(), "Piano", |name| *name).unwrap_err();
        assert_eq!(err.to_string(), "no device found with name Piano");
    }

    #[tokio::test]
    async fn test_mock_device_forwards_events() {
        let device = get_device("mock-keys").unwrap();
        assert_eq!(device.name(), "mock-keys");
        let (sender, mut receiver) = tokio::sync::mpsc::channel(4);
        device.watch_events(sender).unwrap();
        assert!(device.watch_events(tokio::sync::mpsc::channel(1).0).is_err());

        let mock = mock::Device::get("mock-direct");
        let (sender, mut direct) = tokio::sync::mpsc::channel(4);
        mock.watch_events(sender).unwrap();
        mock.mock_event(&[0x90, 60, 100]);
        assert_eq!(direct.recv().await, Some(vec![0x90, 60, 100]));

        mock.stop_watch_events();
        mock.mock_event(&[0x80, 60, 0]);
        assert!(direct.try_recv().is_err());

        device.stop_watch_events();
        assert!(receiver.recv().await.is_none());
    }
}

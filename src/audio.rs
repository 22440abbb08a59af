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

//! Audio output. Devices pull stereo blocks from a renderer closure.
use std::{
    error::Error,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

use tracing::error;

use crate::config;

pub mod cpal;
pub mod mock;
pub mod thread_priority;

/// Fills the left and right slices with the next block of audio.
pub type Renderer = Box<dyn FnMut(&mut [f32], &mut [f32]) + Send>;

pub trait Device: fmt::Display + std::marker::Send + std::marker::Sync {
    /// Returns the name of the device.
    fn name(&self) -> String;

    /// Starts pulling audio from the renderer. Playback continues until the
    /// returned handle is stopped or dropped.
    fn play(&self, renderer: Renderer) -> Result<Playback, Box<dyn Error>>;
}

/// A running output stream.
pub struct Playback {
    stop: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl Playback {
    /// Runs the body on its own thread. The body must return once the flag it
    /// is handed becomes true.
    pub(crate) fn spawn<F>(body: F) -> Playback
    where
        F: FnOnce(Arc<AtomicBool>) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        Playback {
            stop,
            thread: Some(thread::spawn(move || body(thread_stop))),
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .map(|thread| !thread.is_finished())
            .unwrap_or(false)
    }

    /// Stops playback and waits for the output thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Audio output thread panicked");
            }
        }
    }
}

impl Drop for Playback {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for Playback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Playback")
            .field("running", &self.is_running())
            .finish()
    }
}

/// Writes a stereo block into an interleaved buffer with the given channel
/// count. A mono output receives the average of both sides; channels past the
/// second are silent.
pub(crate) fn interleave<T, F>(left: &[f32], right: &[f32], data: &mut [T], channels: usize, convert: F)
where
    T: Copy,
    F: Fn(f32) -> T,
{
    if channels == 0 {
        return;
    }
    let silence = convert(0.0);
    for (frame, out) in data.chunks_mut(channels).enumerate() {
        let l = left.get(frame).copied().unwrap_or(0.0);
        let r = right.get(frame).copied().unwrap_or(0.0);
        match out.len() {
            1 => out[0] = convert((l + r) * 0.5),
            _ => {
                out[0] = convert(l);
                out[1] = convert(r);
                out[2..].fill(silence);
            }
        }
    }
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Gets the device named by the audio configuration.
pub fn get_device(config: &config::Audio) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(device, config.sample_rate())));
    };

    Ok(Arc::new(cpal::Device::get(config)?))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_interleave_stereo() {
        let mut data = [9.0f32; 8];
        interleave(&[0.1, 0.2], &[0.3, 0.4], &mut data, 4, |v| v);
        assert_eq!(data, [0.1, 0.3, 0.0, 0.0, 0.2, 0.4, 0.0, 0.0]);
    }

    #[test]
    fn test_interleave_mono_averages() {
        let mut data = [0i16; 2];
        interleave(&[0.5, -1.0], &[0.0, 1.0], &mut data, 1, |v| (v * 100.0) as i16);
        assert_eq!(data, [25, 0]);
    }

    #[test]
    fn test_get_mock_device() -> Result<(), Box<dyn Error>> {
        let device = get_device(&config::Audio::new("mock-output"))?;
        assert_eq!(device.name(), "mock-output");
        Ok(())
    }
}

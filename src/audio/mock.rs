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

use std::{
    error::Error,
    fmt,
    sync::{atomic::Ordering, Arc},
    thread,
    time::Duration,
};

use parking_lot::Mutex;
use tracing::{info, span, Level};

use super::{Playback, Renderer};

/// Frames pulled from the renderer per block.
const BLOCK_FRAMES: usize = 64;

/// A mock device. Pulls blocks from the renderer and keeps the most recent
/// second of output instead of playing it.
#[derive(Clone)]
pub struct Device {
    name: String,
    sample_rate: u32,
    captured: Arc<Mutex<Vec<(f32, f32)>>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str, sample_rate: u32) -> Device {
        Device {
            name: name.to_string(),
            sample_rate,
            captured: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns the frames captured so far.
    pub fn captured(&self) -> Vec<(f32, f32)> {
        self.captured.lock().clone()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}

impl super::Device for Device {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn play(&self, mut renderer: Renderer) -> Result<Playback, Box<dyn Error>> {
        let span = span!(Level::INFO, "play (mock)");
        let _enter = span.enter();
        info!(device = self.name, "Starting mock output.");

        let captured = self.captured.clone();
        let limit = self.sample_rate.max(1) as usize;
        let block_time =
            Duration::from_secs_f64(BLOCK_FRAMES as f64 / self.sample_rate.max(1) as f64);
        Ok(Playback::spawn(move |stop| {
            let mut left = vec![0.0f32; BLOCK_FRAMES];
            let mut right = vec![0.0f32; BLOCK_FRAMES];
            while !stop.load(Ordering::Relaxed) {
                left.fill(0.0);
                right.fill(0.0);
                renderer(&mut left, &mut right);
                {
                    let mut captured = captured.lock();
                    captured.extend(left.iter().copied().zip(right.iter().copied()));
                    if captured.len() > limit {
                        let excess = captured.len() - limit;
                        captured.drain(..excess);
                    }
                }
                thread::sleep(block_time);
            }
        }))
    }
}

#[cfg(test)]
mod test {
    use std::time::Instant;

    use super::*;
    use crate::audio::Device as _;

    #[test]
    fn test_mock_pulls_from_renderer() -> Result<(), Box<dyn Error>> {
        let device = Device::get("mock", 8000);
        let playback = device.play(Box::new(|left: &mut [f32], right: &mut [f32]| {
            left.fill(0.25);
            right.fill(-0.25);
        }))?;
        assert!(playback.is_running());

        let deadline = Instant::now() + Duration::from_secs(5);
        while device.captured().len() < BLOCK_FRAMES && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        playback.stop();

        let captured = device.captured();
        assert!(captured.len() >= BLOCK_FRAMES);
        assert!(captured.iter().all(|frame| *frame == (0.25, -0.25)));
        Ok(())
    }
}

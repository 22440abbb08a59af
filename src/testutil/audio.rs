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

use std::{error::Error, path::Path};

use hound::{SampleFormat, WavSpec, WavWriter};

/// Writes interleaved 16 bit PCM frames, one inner vector per channel.
pub fn write_wav(path: &Path, channels: &[Vec<i16>], sample_rate: u32) -> Result<(), Box<dyn Error>> {
    let num_channels = channels.len();
    assert!(num_channels > 0, "Need at least one channel!");
    let mut writer = WavWriter::create(
        path,
        WavSpec {
            channels: num_channels as u16,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        },
    )?;

    let frames = channels[0].len();
    for frame in 0..frames {
        for channel in channels {
            writer.write_sample(channel[frame])?;
        }
    }
    writer.finalize()?;

    Ok(())
}

/// Generates a 16 bit sine wave at the given amplitude (0.0 - 1.0).
pub fn sine_i16(frequency: f32, amplitude: f32, sample_rate: u32, frames: usize) -> Vec<i16> {
    (0..frames)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            ((2.0 * std::f32::consts::PI * frequency * t).sin() * amplitude * i16::MAX as f32)
                as i16
        })
        .collect()
}

/// Calculate RMS (Root Mean Square) of a signal
pub fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|&x| x * x).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

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
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    time::Instant,
};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::decode::{decode_file, SampleDecodeError};

/// Index of a [`Sample`] in a [`SampleStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SampleHandle(usize);

/// Index of a [`PcmBuffer`] in a [`SampleStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferHandle(usize);

/// Planar f32 audio.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PcmBuffer {
    planes: Vec<Vec<f32>>,
}

impl PcmBuffer {
    pub fn mono(data: Vec<f32>) -> PcmBuffer {
        PcmBuffer { planes: vec![data] }
    }

    pub fn from_planes(planes: Vec<Vec<f32>>) -> PcmBuffer {
        PcmBuffer { planes }
    }

    pub fn num_channels(&self) -> usize {
        self.planes.len()
    }

    pub fn num_frames(&self) -> usize {
        self.planes.first().map(Vec::len).unwrap_or(0)
    }

    /// Returns a channel's samples, or an empty slice if there is no such channel.
    pub fn channel(&self, channel: usize) -> &[f32] {
        self.planes.get(channel).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Averages all channels into one.
    pub fn to_mono(&self) -> Vec<f32> {
        match self.planes.len() {
            0 => Vec::new(),
            1 => self.planes[0].clone(),
            channels => (0..self.num_frames())
                .map(|frame| {
                    self.planes.iter().map(|plane| plane[frame]).sum::<f32>() / channels as f32
                })
                .collect(),
        }
    }

    /// Appends mono frames to the first channel and returns the frame they start at.
    fn append_mono(&mut self, data: &[f32]) -> u64 {
        if self.planes.is_empty() {
            self.planes.push(Vec::new());
        }
        let start = self.planes[0].len() as u64;
        self.planes[0].extend_from_slice(data);
        start
    }

    pub fn memory_size(&self) -> usize {
        self.planes.iter().map(Vec::len).sum::<usize>() * std::mem::size_of::<f32>()
    }
}

/// A playable sample: a buffer plus the rate it was recorded at.
#[derive(Clone, Debug)]
pub struct Sample {
    name: String,
    path: Option<PathBuf>,
    buffer: Option<BufferHandle>,
    sample_rate: f64,
    loop_start: u64,
    loop_end: u64,
}

impl Sample {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The buffer holding this sample's audio. `None` until it has been loaded.
    pub fn buffer(&self) -> Option<BufferHandle> {
        self.buffer
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn loop_start(&self) -> u64 {
        self.loop_start
    }

    pub fn loop_end(&self) -> u64 {
        self.loop_end
    }

    pub fn has_loop(&self) -> bool {
        self.loop_start < self.loop_end
    }
}

/// Owns every decoded buffer of a soundbank. Regions and voices refer to
/// samples by handle.
#[derive(Default)]
pub struct SampleStore {
    buffers: Vec<PcmBuffer>,
    samples: Vec<Sample>,
    by_path: HashMap<PathBuf, SampleHandle>,
    by_rate: HashMap<u32, SampleHandle>,
    shared: Option<BufferHandle>,
}

impl SampleStore {
    pub fn new() -> SampleStore {
        SampleStore::default()
    }

    pub fn add_buffer(&mut self, buffer: PcmBuffer) -> BufferHandle {
        self.buffers.push(buffer);
        BufferHandle(self.buffers.len() - 1)
    }

    /// Adds the buffer that all rate-addressed samples share.
    pub fn set_shared_buffer(&mut self, buffer: PcmBuffer) -> BufferHandle {
        let handle = self.add_buffer(buffer);
        self.shared = Some(handle);
        handle
    }

    /// Returns the sample playing the shared buffer at the given native rate,
    /// creating it on first use.
    pub fn sample_for_rate(&mut self, sample_rate: u32) -> SampleHandle {
        if let Some(handle) = self.by_rate.get(&sample_rate) {
            return *handle;
        }
        let handle = self.push_sample(Sample {
            name: format!("{} Hz", sample_rate),
            path: None,
            buffer: self.shared,
            sample_rate: sample_rate as f64,
            loop_start: 0,
            loop_end: 0,
        });
        self.by_rate.insert(sample_rate, handle);
        handle
    }

    /// Registers a sample file. The same path always yields the same handle.
    /// The audio is read by [`SampleStore::load_file_samples`].
    pub fn add_file_sample(&mut self, path: &Path, name: &str) -> SampleHandle {
        if let Some(handle) = self.by_path.get(path) {
            return *handle;
        }
        let handle = self.push_sample(Sample {
            name: name.to_string(),
            path: Some(path.to_path_buf()),
            buffer: None,
            sample_rate: 44100.0,
            loop_start: 0,
            loop_end: 0,
        });
        self.by_path.insert(path.to_path_buf(), handle);
        handle
    }

    fn push_sample(&mut self, sample: Sample) -> SampleHandle {
        self.samples.push(sample);
        SampleHandle(self.samples.len() - 1)
    }

    /// Decodes every registered sample file that has not been loaded yet.
    /// Returns the names of the samples that failed.
    pub fn load_file_samples(&mut self) -> Vec<String> {
        let pending: Vec<(SampleHandle, PathBuf)> = self
            .samples
            .iter()
            .enumerate()
            .filter(|(_, sample)| sample.buffer.is_none())
            .filter_map(|(i, sample)| sample.path.clone().map(|path| (SampleHandle(i), path)))
            .collect();

        let decoded: Vec<_> = pending
            .par_iter()
            .map(|(handle, path)| (*handle, path, decode_file(path)))
            .collect();

        let mut failed = Vec::new();
        for (handle, path, result) in decoded {
            match result {
                Ok(audio) => {
                    debug!(
                        path = ?path,
                        channels = audio.buffer.num_channels(),
                        frames = audio.buffer.num_frames(),
                        sample_rate = audio.sample_rate,
                        "Sample loaded"
                    );
                    let buffer = self.add_buffer(audio.buffer);
                    let sample = &mut self.samples[handle.0];
                    sample.buffer = Some(buffer);
                    sample.sample_rate = audio.sample_rate as f64;
                }
                Err(e) => {
                    warn!(path = ?path, error = %e, "Failed to load sample");
                    failed.push(self.samples[handle.0].name.clone());
                }
            }
        }
        failed
    }

    /// Decodes compressed streams out of `data` into the shared buffer. Each
    /// distinct (start, end) byte range is decoded once; the result maps every
    /// range to the frames it occupies in the shared buffer. An end of zero
    /// means the stream runs to the end of `data`.
    pub fn decompress_ranges<F>(
        &mut self,
        data: &[u8],
        ranges: &[(u64, u64)],
        decode: F,
    ) -> (
        HashMap<(u64, u64), (u64, u64)>,
        Vec<((u64, u64), SampleDecodeError)>,
    )
    where
        F: Fn(&[u8]) -> Result<Vec<f32>, SampleDecodeError> + Sync,
    {
        let started = Instant::now();
        let mut unique = Vec::new();
        let mut seen = HashSet::new();
        for range in ranges {
            if seen.insert(*range) {
                unique.push(*range);
            }
        }

        let decoded: Vec<Result<Vec<f32>, SampleDecodeError>> = unique
            .par_iter()
            .map(|&(start, end)| {
                let stop = if end > 0 { end } else { data.len() as u64 };
                match data.get(start as usize..stop as usize) {
                    Some(bytes) if !bytes.is_empty() => decode(bytes),
                    _ => Err(SampleDecodeError::Empty),
                }
            })
            .collect();

        let shared = match self.shared {
            Some(handle) => handle,
            None => self.set_shared_buffer(PcmBuffer::default()),
        };

        let mut frames = HashMap::new();
        let mut errors = Vec::new();
        for (range, result) in unique.into_iter().zip(decoded) {
            match result {
                Ok(samples) => {
                    let buffer = &mut self.buffers[shared.0];
                    let start = buffer.append_mono(&samples);
                    frames.insert(range, (start, start + samples.len() as u64));
                }
                Err(e) => errors.push((range, e)),
            }
        }

        info!(
            streams = frames.len(),
            failed = errors.len(),
            frames = self.buffers[shared.0].num_frames(),
            elapsed_ms = started.elapsed().as_millis(),
            "Decompressed sample streams"
        );
        (frames, errors)
    }

    pub fn sample(&self, handle: SampleHandle) -> Option<&Sample> {
        self.samples.get(handle.0)
    }

    pub fn buffer(&self, handle: BufferHandle) -> Option<&PcmBuffer> {
        self.buffers.get(handle.0)
    }

    /// Returns the loaded buffer of a sample.
    pub fn sample_buffer(&self, handle: SampleHandle) -> Option<&PcmBuffer> {
        self.sample(handle)
            .and_then(|sample| sample.buffer)
            .and_then(|buffer| self.buffer(buffer))
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns the total memory used by decoded audio.
    pub fn total_memory_usage(&self) -> usize {
        self.buffers.iter().map(PcmBuffer::memory_size).sum()
    }
}

impl std::fmt::Debug for SampleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleStore")
            .field("samples", &self.samples.len())
            .field("buffers", &self.buffers.len())
            .field("total_memory_kb", &(self.total_memory_usage() / 1024))
            .finish()
    }
}

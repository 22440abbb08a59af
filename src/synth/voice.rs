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

//! A single sounding note of a region.

use super::envelope::Envelope;
use super::pool::PooledVoice;
use crate::samples::{BufferHandle, PcmBuffer, Sample};
use crate::soundbank::{LoopMode, OffMode, Region};
use crate::tuning::Temperament;

/// Gain applied to every voice, in decibels.
const GLOBAL_GAIN_DB: f32 = -1.0;

/// Pitch wheel centre.
pub const PITCH_WHEEL_CENTER: i32 = 8192;

/// Everything a voice needs to start playing.
pub struct NoteStart<'a> {
    pub region: &'a Region,
    pub sample: &'a Sample,
    /// Frames in the sample's buffer.
    pub frames: u64,
    pub channel: u8,
    pub key: i32,
    pub velocity: u8,
    pub pitch_wheel: i32,
    pub temperament: &'a Temperament,
    pub output_rate: f64,
    pub order: u64,
}

pub struct Voice {
    region: Region,
    buffer: Option<BufferHandle>,
    sample_rate: f64,
    temperament: Temperament,
    output_rate: f64,

    channel: u8,
    key: i32,
    velocity: u8,
    order: u64,
    key_down: bool,
    sustained: bool,
    active: bool,

    envelope: Envelope,
    position: f64,
    ratio: f64,
    gain_left: f32,
    gain_right: f32,
    sample_end: u64,
    looping: bool,
    loop_start: u64,
    loop_end: u64,
    num_loops: u32,
}

impl Default for Voice {
    fn default() -> Self {
        Voice {
            region: Region::default(),
            buffer: None,
            sample_rate: 44100.0,
            temperament: Temperament::twelve_tone(),
            output_rate: 44100.0,
            channel: 0,
            key: -1,
            velocity: 0,
            order: 0,
            key_down: false,
            sustained: false,
            active: false,
            envelope: Envelope::new(true),
            position: 0.0,
            ratio: 1.0,
            gain_left: 0.0,
            gain_right: 0.0,
            sample_end: 0,
            looping: false,
            loop_start: 0,
            loop_end: 0,
            num_loops: 0,
        }
    }
}

impl Voice {
    /// Starts a note. Regions that cannot sound (no decoded sample, or a
    /// negative end) leave the voice idle and return false.
    pub fn start_note(&mut self, note: NoteStart<'_>) -> bool {
        self.kill();
        let region = note.region;
        let buffer = match note.sample.buffer() {
            Some(buffer) if region.sample.is_some() && !region.negative_end => buffer,
            _ => return false,
        };

        self.region = region.clone();
        self.buffer = Some(buffer);
        self.sample_rate = note.sample.sample_rate();
        self.temperament = note.temperament.clone();
        self.output_rate = note.output_rate;
        self.channel = note.channel;
        self.key = note.key;
        self.velocity = note.velocity;
        self.order = note.order;
        self.key_down = true;
        self.sustained = false;

        // Gain.
        let velocity = note.velocity.max(1) as f32;
        let velocity_db = -20.0 * ((127.0 * 127.0) / (velocity * velocity)).log10();
        let db = GLOBAL_GAIN_DB + region.volume + velocity_db * region.amp_veltrack / 100.0;
        let gain = 10f32.powf(db / 20.0);
        let pan = (region.pan.clamp(-100.0, 100.0) + 100.0) / 200.0;
        self.gain_left = gain * (1.0 - pan).sqrt();
        self.gain_right = gain * pan.sqrt();

        self.calculate_pitch_ratio(note.pitch_wheel);

        self.position = region.offset as f64;
        self.sample_end = note.frames;
        if region.end > 0 && region.end + 1 < note.frames {
            self.sample_end = region.end + 1;
        }

        // Only the sample's own loop turns the default mode into a loop.
        let loop_mode = match region.loop_mode {
            LoopMode::SampleLoop if note.sample.has_loop() => LoopMode::LoopContinuous,
            LoopMode::SampleLoop => LoopMode::NoLoop,
            mode => mode,
        };
        self.region.loop_mode = loop_mode;
        self.looping = matches!(loop_mode, LoopMode::LoopContinuous | LoopMode::LoopSustain);
        (self.loop_start, self.loop_end) = if !self.looping {
            (0, 0)
        } else if region.has_loop() {
            (region.loop_start, region.loop_end)
        } else {
            (note.sample.loop_start(), note.sample.loop_end())
        };
        self.num_loops = 0;

        self.envelope.start_note(
            &region.ampeg,
            &region.ampeg_veltrack,
            note.velocity as f32 / 127.0,
            note.output_rate as f32,
        );
        self.active = true;
        true
    }

    /// Releases the note. Without a tail the voice stops at once.
    pub fn stop_note(&mut self, allow_tail: bool) {
        if !allow_tail {
            self.kill();
            return;
        }
        self.key_down = false;
        if self.region.loop_mode == LoopMode::OneShot {
            return;
        }
        self.envelope.note_off();
        if self.region.loop_mode == LoopMode::LoopSustain {
            // Keep playing through the loop end into the tail.
            self.loop_end = self.loop_start;
        }
    }

    /// Silenced by another region's choke group.
    pub fn stop_note_for_group(&mut self) {
        match self.region.off_mode {
            OffMode::Fast => self.envelope.fast_release(),
            OffMode::Normal => self.envelope.note_off(),
        }
    }

    /// Fades out quickly, e.g. when the same note is struck again.
    pub fn stop_note_quick(&mut self) {
        self.envelope.fast_release();
    }

    pub fn pitch_wheel_moved(&mut self, value: i32) {
        if self.active {
            self.calculate_pitch_ratio(value);
        }
    }

    fn calculate_pitch_ratio(&mut self, pitch_wheel: i32) {
        let region = &self.region;
        let mut semitones = region.transpose as f64 + region.tune as f64 / 100.0;
        // -1 to 1, exactly 0 at the centre.
        let offset = (pitch_wheel.clamp(0, 16383) - PITCH_WHEEL_CENTER) as f64;
        let wheel = if offset > 0.0 { offset / 8191.0 } else { offset / 8192.0 };
        if wheel > 0.0 {
            semitones += wheel * region.bend_up as f64 / 100.0;
        } else {
            semitones += wheel * region.bend_down as f64 / -100.0;
        }

        let temperament = &self.temperament;
        let keycenter = temperament.middle_c() as f64
            + (region.pitch_keycenter - 60) as f64 * temperament.period_size() as f64 / 12.0;
        let note = self.key as f64 + temperament.semitones_to_keys(semitones);
        let adjusted = keycenter + (note - keycenter) * region.pitch_keytrack as f64 / 100.0;

        let target = temperament.note_in_hertz(adjusted) * self.sample_rate;
        let natural = 440.0 * 2f64.powf((region.pitch_keycenter - 69) as f64 / 12.0);
        self.ratio = target / (natural * self.output_rate);
    }

    /// Adds this voice's output to the buffers.
    pub fn render(&mut self, buffer: &PcmBuffer, left: &mut [f32], right: &mut [f32]) {
        if !self.active {
            return;
        }
        let source_left = buffer.channel(0);
        let source_right = if buffer.num_channels() > 1 {
            buffer.channel(1)
        } else {
            source_left
        };

        for (out_left, out_right) in left.iter_mut().zip(right.iter_mut()) {
            let looping = self.is_looping();
            let frame = self.position as usize;
            let alpha = (self.position - frame as f64) as f32;
            let mut next = frame + 1;
            if looping && next as u64 > self.loop_end {
                next = self.loop_start as usize;
            }

            let level = self.envelope.level();
            *out_left += interpolate(source_left, frame, next, alpha) * self.gain_left * level;
            *out_right += interpolate(source_right, frame, next, alpha) * self.gain_right * level;

            self.position += self.ratio;
            if looping && self.position > self.loop_end as f64 {
                self.position = self.loop_start as f64;
                self.num_loops += 1;
            }

            self.envelope.next();
            if self.envelope.is_done() || self.position >= self.sample_end as f64 {
                self.kill();
                break;
            }
        }
    }

    fn is_looping(&self) -> bool {
        self.looping && self.loop_start < self.loop_end
    }

    pub fn kill(&mut self) {
        self.active = false;
        self.key = -1;
        self.key_down = false;
        self.sustained = false;
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn buffer(&self) -> Option<BufferHandle> {
        self.buffer
    }

    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    pub fn is_key_down(&self) -> bool {
        self.key_down
    }

    pub fn set_key_down(&mut self, key_down: bool) {
        self.key_down = key_down;
    }

    pub fn is_sustained(&self) -> bool {
        self.sustained
    }

    pub fn set_sustained(&mut self, sustained: bool) {
        self.sustained = sustained;
    }

    pub fn is_releasing(&self) -> bool {
        self.envelope.is_releasing()
    }

    pub fn is_one_shot(&self) -> bool {
        self.region.loop_mode == LoopMode::OneShot
    }

    pub fn pitch_ratio(&self) -> f64 {
        self.ratio
    }

    pub fn num_loops(&self) -> u32 {
        self.num_loops
    }
}

impl PooledVoice for Voice {
    fn is_active(&self) -> bool {
        self.active
    }

    fn channel(&self) -> u8 {
        self.channel
    }

    fn key(&self) -> i32 {
        self.key
    }

    fn order(&self) -> u64 {
        self.order
    }

    fn kill(&mut self) {
        Voice::kill(self);
    }
}

fn interpolate(data: &[f32], frame: usize, next: usize, alpha: f32) -> f32 {
    let current = data.get(frame).copied().unwrap_or(0.0);
    let next = data.get(next).copied().unwrap_or(0.0);
    current + alpha * (next - current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::SampleStore;
    use crate::soundbank::EnvelopeParameters;

    struct Fixture {
        store: SampleStore,
        temperament: Temperament,
    }

    impl Fixture {
        fn new(data: Vec<f32>, rate: u32) -> Fixture {
            let mut store = SampleStore::new();
            store.set_shared_buffer(PcmBuffer::mono(data));
            store.sample_for_rate(rate);
            Fixture {
                store,
                temperament: Temperament::twelve_tone(),
            }
        }

        fn region(&mut self, rate: u32) -> Region {
            Region {
                sample: Some(self.store.sample_for_rate(rate)),
                ..Region::default()
            }
        }

        fn start(&self, voice: &mut Voice, region: &Region, key: i32, velocity: u8) -> bool {
            let handle = region.sample.unwrap();
            let sample = self.store.sample(handle).unwrap();
            let frames = self.store.sample_buffer(handle).unwrap().num_frames() as u64;
            voice.start_note(NoteStart {
                region,
                sample,
                frames,
                channel: 1,
                key,
                velocity,
                pitch_wheel: PITCH_WHEEL_CENTER,
                temperament: &self.temperament,
                output_rate: 44100.0,
                order: 1,
            })
        }

        fn render(&self, voice: &mut Voice, frames: usize) -> (Vec<f32>, Vec<f32>) {
            let mut left = vec![0.0; frames];
            let mut right = vec![0.0; frames];
            let buffer = self.store.buffer(voice.buffer().unwrap()).unwrap();
            voice.render(buffer, &mut left, &mut right);
            (left, right)
        }
    }

    #[test]
    fn test_pitch_ratio() {
        let mut fixture = Fixture::new(vec![0.0; 100], 44100);
        let mut region = fixture.region(44100);
        region.pitch_keycenter = 69;
        let mut voice = Voice::default();

        assert!(fixture.start(&mut voice, &region, 69, 100));
        assert!((voice.pitch_ratio() - 1.0).abs() < 1e-9);

        fixture.start(&mut voice, &region, 81, 100);
        assert!((voice.pitch_ratio() - 2.0).abs() < 1e-9);

        region.pitch_keytrack = 0;
        fixture.start(&mut voice, &region, 81, 100);
        assert!((voice.pitch_ratio() - 1.0).abs() < 1e-9);

        region.pitch_keytrack = 100;
        region.transpose = -12;
        fixture.start(&mut voice, &region, 69, 100);
        assert!((voice.pitch_ratio() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_sample_rate_in_pitch_ratio() {
        let mut fixture = Fixture::new(vec![0.0; 100], 22050);
        let region = fixture.region(22050);
        let mut voice = Voice::default();
        fixture.start(&mut voice, &region, 60, 100);
        assert!((voice.pitch_ratio() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_pitch_wheel() {
        let mut fixture = Fixture::new(vec![0.0; 100], 44100);
        let region = fixture.region(44100);
        let mut voice = Voice::default();
        fixture.start(&mut voice, &region, 60, 100);

        voice.pitch_wheel_moved(16383);
        assert!((voice.pitch_ratio() - 2f64.powf(2.0 / 12.0)).abs() < 1e-9);
        voice.pitch_wheel_moved(0);
        assert!((voice.pitch_ratio() - 2f64.powf(-2.0 / 12.0)).abs() < 1e-9);
    }

    #[test]
    fn test_gain_and_pan() {
        let mut fixture = Fixture::new(vec![1.0; 100], 44100);
        let mut region = fixture.region(44100);
        region.pan = -100.0;
        let mut voice = Voice::default();
        fixture.start(&mut voice, &region, 60, 127);
        let (left, right) = fixture.render(&mut voice, 4);
        let expected = 10f32.powf(-1.0 / 20.0);
        assert!((left[0] - expected).abs() < 1e-5, "{}", left[0]);
        assert_eq!(right[0], 0.0);

        region.pan = 0.0;
        region.amp_veltrack = 100.0;
        fixture.start(&mut voice, &region, 60, 64);
        let (left, right) = fixture.render(&mut voice, 4);
        let velocity_gain = 64.0 * 64.0 / (127.0 * 127.0);
        let expected = 10f32.powf(-1.0 / 20.0) * velocity_gain * 0.5f32.sqrt();
        assert!((left[0] - expected).abs() < 1e-5);
        assert!((left[0] - right[0]).abs() < 1e-6);
    }

    #[test]
    fn test_linear_interpolation() {
        let mut fixture = Fixture::new(vec![0.0, 1.0, 0.0, 0.0, 0.0, 0.0], 22050);
        let mut region = fixture.region(22050);
        region.pan = -100.0;
        let mut voice = Voice::default();
        fixture.start(&mut voice, &region, 60, 127);
        let (left, _) = fixture.render(&mut voice, 3);
        let gain = 10f32.powf(-1.0 / 20.0);
        assert_eq!(left[0], 0.0);
        assert!((left[1] - 0.5 * gain).abs() < 1e-5);
        assert!((left[2] - gain).abs() < 1e-5);
    }

    #[test]
    fn test_voice_ends_at_sample_end() {
        let mut fixture = Fixture::new(vec![0.5; 10], 44100);
        let mut region = fixture.region(44100);
        region.end = 4;
        let mut voice = Voice::default();
        fixture.start(&mut voice, &region, 60, 127);
        let (left, _) = fixture.render(&mut voice, 10);
        assert!(!voice.is_active());
        assert!(left[4] != 0.0);
        assert_eq!(left[5], 0.0);
    }

    #[test]
    fn test_loop_wraps() {
        let mut fixture = Fixture::new(vec![0.5; 10], 44100);
        let mut region = fixture.region(44100);
        region.loop_mode = LoopMode::LoopContinuous;
        region.loop_start = 2;
        region.loop_end = 6;
        let mut voice = Voice::default();
        fixture.start(&mut voice, &region, 60, 127);
        fixture.render(&mut voice, 100);
        assert!(voice.is_active());
        assert!(voice.num_loops() > 10);
    }

    #[test]
    fn test_region_loop_points_alone_do_not_loop() {
        let mut fixture = Fixture::new(vec![0.5; 1000], 44100);
        let mut region = fixture.region(44100);
        assert_eq!(region.loop_mode, LoopMode::SampleLoop);
        region.loop_start = 100;
        region.loop_end = 200;
        let mut voice = Voice::default();
        fixture.start(&mut voice, &region, 60, 127);
        assert!(!voice.is_looping());

        let (left, _) = fixture.render(&mut voice, 44100);
        assert!(!voice.is_active());
        assert_eq!(voice.num_loops(), 0);
        assert!(left[999] != 0.0);
        assert_eq!(left[1000], 0.0);

        region.loop_mode = LoopMode::LoopContinuous;
        fixture.start(&mut voice, &region, 60, 127);
        fixture.render(&mut voice, 44100);
        assert!(voice.is_active());
        assert!(voice.num_loops() > 0);
    }

    #[test]
    fn test_loop_sustain_plays_tail_after_release() {
        let mut fixture = Fixture::new(vec![0.5; 10], 44100);
        let mut region = fixture.region(44100);
        region.loop_mode = LoopMode::LoopSustain;
        region.loop_start = 2;
        region.loop_end = 6;
        region.ampeg.release = 1.0;
        let mut voice = Voice::default();
        fixture.start(&mut voice, &region, 60, 127);
        fixture.render(&mut voice, 20);
        assert!(voice.is_active());

        voice.stop_note(true);
        assert!(!voice.is_key_down());
        fixture.render(&mut voice, 20);
        assert!(!voice.is_active());
    }

    #[test]
    fn test_stop_without_tail_kills() {
        let mut fixture = Fixture::new(vec![0.5; 1000], 44100);
        let region = fixture.region(44100);
        let mut voice = Voice::default();
        fixture.start(&mut voice, &region, 60, 127);
        voice.stop_note(false);
        assert!(!voice.is_active());
        assert_eq!(voice.key(), -1);
    }

    #[test]
    fn test_one_shot_ignores_note_off() {
        let mut fixture = Fixture::new(vec![0.5; 1000], 44100);
        let mut region = fixture.region(44100);
        region.loop_mode = LoopMode::OneShot;
        let mut voice = Voice::default();
        fixture.start(&mut voice, &region, 60, 127);
        voice.stop_note(true);
        assert!(!voice.is_releasing());
        assert!(voice.is_one_shot());
    }

    #[test]
    fn test_group_stop_uses_off_mode() {
        let mut fixture = Fixture::new(vec![0.5; 44100], 44100);
        let mut region = fixture.region(44100);
        region.ampeg = EnvelopeParameters {
            release: 2.0,
            ..EnvelopeParameters::amplitude()
        };
        let mut voice = Voice::default();
        fixture.start(&mut voice, &region, 60, 127);
        voice.stop_note_for_group();
        // Fast off fades within 10ms.
        fixture.render(&mut voice, 450);
        assert!(!voice.is_active());

        region.off_mode = OffMode::Normal;
        fixture.start(&mut voice, &region, 60, 127);
        voice.stop_note_for_group();
        fixture.render(&mut voice, 450);
        assert!(voice.is_active());
        assert!(voice.is_releasing());
    }

    #[test]
    fn test_unplayable_regions_stay_idle() {
        let mut fixture = Fixture::new(vec![0.5; 10], 44100);
        let mut region = fixture.region(44100);
        region.negative_end = true;
        let mut voice = Voice::default();
        assert!(!fixture.start(&mut voice, &region, 60, 127));
        assert!(!voice.is_active());

        let mut store = SampleStore::new();
        let handle = store.add_file_sample(std::path::Path::new("/nowhere.wav"), "nowhere.wav");
        let region = Region {
            sample: Some(handle),
            ..Region::default()
        };
        let started = voice.start_note(NoteStart {
            region: &region,
            sample: store.sample(handle).unwrap(),
            frames: 0,
            channel: 1,
            key: 60,
            velocity: 100,
            pitch_wheel: PITCH_WHEEL_CENTER,
            temperament: &Temperament::twelve_tone(),
            output_rate: 44100.0,
            order: 1,
        });
        assert!(!started);
    }
}

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

//! Decoding of sample files and embedded compressed streams with symphonia.

use std::{fs::File, io::Cursor, path::Path};

use symphonia::core::audio::{AudioBuffer, AudioBufferRef};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample as SymphoniaSample;
use symphonia::default::{get_codecs, get_probe};

use super::store::PcmBuffer;

#[derive(Debug, thiserror::Error)]
pub enum SampleDecodeError {
    #[error("Audio file error: {0}")]
    Audio(#[from] SymphoniaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No audio track found")]
    NoTrack,

    #[error("Sample rate not specified")]
    NoSampleRate,

    #[error("No audio decoded")]
    Empty,
}

/// Decoded PCM, one plane per channel.
#[derive(Debug)]
pub struct DecodedAudio {
    pub buffer: PcmBuffer,
    pub sample_rate: u32,
}

/// Decodes a whole audio file (WAV, FLAC, Ogg Vorbis and the other formats
/// symphonia knows about).
pub fn decode_file(path: &Path) -> Result<DecodedAudio, SampleDecodeError> {
    let file = File::open(path)?;
    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }
    decode_source(Box::new(file), hint)
}

/// Decodes a stream embedded in a compressed soundbank. Ogg Vorbis is tried
/// first, then FLAC.
pub fn decode_compressed(bytes: &[u8]) -> Result<DecodedAudio, SampleDecodeError> {
    let mut last_error = SampleDecodeError::Empty;
    for extension in ["ogg", "flac"] {
        let mut hint = Hint::new();
        hint.with_extension(extension);
        match decode_source(Box::new(Cursor::new(bytes.to_vec())), hint) {
            Ok(decoded) => return Ok(decoded),
            Err(e) => last_error = e,
        }
    }
    Err(last_error)
}

fn decode_source(
    source: Box<dyn MediaSource>,
    hint: Hint,
) -> Result<DecodedAudio, SampleDecodeError> {
    let mss = MediaSourceStream::new(source, Default::default());
    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();
    let probed = get_probe().format(&hint, mss, &fmt_opts, &meta_opts)?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(SampleDecodeError::NoTrack)?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or(SampleDecodeError::NoSampleRate)?;

    let decoder_opts: DecoderOptions = Default::default();
    let mut decoder = get_codecs().make(&track.codec_params, &decoder_opts)?;

    let mut planes: Vec<Vec<f32>> = Vec::new();
    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            // Some demuxers report the end of the stream as a decode error.
            Err(SymphoniaError::DecodeError(_)) => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }
        match decoder.decode(&packet) {
            Ok(decoded) => append_planes(decoded, &mut planes),
            // A corrupt packet is skipped rather than ending the stream.
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        }
    }

    if planes.is_empty() || planes[0].is_empty() {
        return Err(SampleDecodeError::Empty);
    }

    Ok(DecodedAudio {
        buffer: PcmBuffer::from_planes(planes),
        sample_rate,
    })
}

fn append_planes(decoded: AudioBufferRef, planes: &mut Vec<Vec<f32>>) {
    match decoded {
        AudioBufferRef::F32(buf) => append(&buf, planes, |s| s),
        AudioBufferRef::F64(buf) => append(&buf, planes, |s| s as f32),
        AudioBufferRef::S8(buf) => append(&buf, planes, |s| s as f32 / (1i64 << 7) as f32),
        AudioBufferRef::S16(buf) => append(&buf, planes, |s| s as f32 / (1i64 << 15) as f32),
        AudioBufferRef::S24(buf) => append(&buf, planes, |s| {
            s.inner() as f32 / (1i64 << 23) as f32
        }),
        AudioBufferRef::S32(buf) => append(&buf, planes, |s| s as f32 / (1i64 << 31) as f32),
        AudioBufferRef::U8(buf) => append(&buf, planes, |s| (s as f32 / u8::MAX as f32) * 2.0 - 1.0),
        AudioBufferRef::U16(buf) => {
            append(&buf, planes, |s| (s as f32 / u16::MAX as f32) * 2.0 - 1.0)
        }
        AudioBufferRef::U24(buf) => append(&buf, planes, |s| {
            (s.inner() as f32 / ((1u32 << 24) - 1) as f32) * 2.0 - 1.0
        }),
        AudioBufferRef::U32(buf) => {
            append(&buf, planes, |s| (s as f32 / u32::MAX as f32) * 2.0 - 1.0)
        }
    }
}

fn append<T, F>(buf: &AudioBuffer<T>, planes: &mut Vec<Vec<f32>>, convert: F)
where
    T: SymphoniaSample,
    F: Fn(T) -> f32,
{
    let channels = buf.spec().channels.count();
    if planes.len() < channels {
        let frames = planes.first().map(Vec::len).unwrap_or(0);
        planes.resize(channels, vec![0.0; frames]);
    }
    for (channel, plane) in buf.planes().planes().iter().enumerate().take(channels) {
        planes[channel].extend(plane.iter().map(|s| convert(*s)));
    }
}

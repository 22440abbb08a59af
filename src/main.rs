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

use std::error::Error;
use std::path::{Path, PathBuf};

use clap::{crate_version, Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{info, warn};

use sfsynth::audio::{self, Renderer};
use sfsynth::config::Player;
use sfsynth::instrument::{Instrument, TimedEvent};
use sfsynth::midi;
use sfsynth::synth::{SynthEngine, DEFAULT_VOICES};

/// Frames rendered per block by the `render` command.
const RENDER_BLOCK_FRAMES: usize = 512;

/// Block size assumed when the audio config leaves it to the device.
const DEFAULT_BLOCK_FRAMES: usize = 512;

/// Raw MIDI messages buffered between the input thread and the audio callback.
const MIDI_QUEUE_SIZE: usize = 1024;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A sample-playback synthesizer for SF2, SF3 and SFZ soundbanks."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the programs in a soundbank along with any load diagnostics.
    Programs {
        /// The path to the SF2, SF3 or SFZ file.
        path: String,
    },
    /// Renders a single held note to a stereo WAV file.
    Render {
        /// The path to the SF2, SF3 or SFZ file.
        path: String,
        /// The WAV file to write.
        output: String,
        /// The program to play.
        #[arg(short, long, default_value_t = 0)]
        program: usize,
        /// The MIDI note number.
        #[arg(short, long, default_value_t = 60)]
        note: u8,
        /// The note-on velocity.
        #[arg(short, long, default_value_t = 100)]
        velocity: u8,
        /// Seconds the note is held.
        #[arg(short, long, default_value_t = 1.0)]
        duration: f64,
        /// Seconds rendered after the note-off.
        #[arg(short, long, default_value_t = 1.0)]
        tail: f64,
        /// The output sample rate.
        #[arg(short, long, default_value_t = 44100)]
        sample_rate: u32,
    },
    /// Plays an instrument live from a MIDI input.
    Play {
        /// The path to the player config.
        player_path: String,
    },
    /// Lists the available audio output devices.
    Devices {},
    /// Lists the available MIDI input devices.
    MidiDevices {},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Programs { path } => {
            let engine = SynthEngine::new(DEFAULT_VOICES);
            let count = engine.load(Path::new(&path));

            if count == 0 {
                println!("No programs found in {}.", path);
            } else {
                println!("Programs (count: {}):", count);
                for (index, name) in engine.program_names().iter().enumerate() {
                    println!("{:>4}: {}", index, name);
                }
            }

            let errors = engine.errors();
            if !errors.is_empty() {
                println!("\nErrors (count: {}):", errors.len());
                for error in errors.iter() {
                    println!("- {}", error);
                }
            }
            let warnings = engine.warnings();
            if !warnings.is_empty() {
                println!("\nWarnings (count: {}):", warnings.len());
                for warning in warnings.iter() {
                    println!("- {}", warning);
                }
            }
        }
        Commands::Render {
            path,
            output,
            program,
            note,
            velocity,
            duration,
            tail,
            sample_rate,
        } => {
            render(
                Path::new(&path),
                Path::new(&output),
                program,
                note,
                velocity,
                (duration, tail),
                sample_rate,
            )?;
        }
        Commands::Play { player_path } => {
            play(&PathBuf::from(&player_path)).await?;
        }
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices.iter() {
                println!("- {}", device);
            }
        }
        Commands::MidiDevices {} => {
            let devices = midi::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices.iter() {
                println!("- {}", device);
            }
        }
    }

    Ok(())
}

/// Renders one note held for `times.0` seconds followed by `times.1` seconds
/// of release.
fn render(
    path: &Path,
    output: &Path,
    program: usize,
    note: u8,
    velocity: u8,
    times: (f64, f64),
    sample_rate: u32,
) -> Result<(), Box<dyn Error>> {
    let engine = SynthEngine::new(DEFAULT_VOICES);
    if engine.load(path) == 0 {
        for error in engine.errors() {
            warn!(error, "Soundbank error");
        }
        return Err(format!("no programs found in {}", path.display()).into());
    }
    engine.set_output_rate(sample_rate as f64);
    let program = engine.set_current_program(program);

    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(output, spec)?;

    let held_frames = (times.0.max(0.0) * sample_rate as f64).round() as usize;
    let tail_frames = (times.1.max(0.0) * sample_rate as f64).round() as usize;
    let mut left = vec![0.0f32; RENDER_BLOCK_FRAMES];
    let mut right = vec![0.0f32; RENDER_BLOCK_FRAMES];

    engine.note_on(1, note, velocity);
    for (frames, release_after) in [(held_frames, true), (tail_frames, false)] {
        let mut remaining = frames;
        while remaining > 0 {
            let block = remaining.min(RENDER_BLOCK_FRAMES);
            left[..block].fill(0.0);
            right[..block].fill(0.0);
            engine.render(&mut left[..block], &mut right[..block]);
            for (l, r) in left[..block].iter().zip(right[..block].iter()) {
                writer.write_sample(*l)?;
                writer.write_sample(*r)?;
            }
            remaining -= block;
        }
        if release_after {
            engine.note_off(1, note, 0);
        }
    }
    writer.finalize()?;

    info!(
        output = ?output,
        program,
        note,
        frames = held_frames + tail_frames,
        "Rendered note"
    );
    Ok(())
}

/// Runs the configured instrument against the audio and MIDI devices until
/// interrupted.
async fn play(player_path: &Path) -> Result<(), Box<dyn Error>> {
    let player = Player::deserialize(player_path)?;
    let base_dir = player_path.parent().unwrap_or(Path::new("."));

    let mut instrument = player.instrument().create(player.max_voices());
    if let Some(tuning) = player.tuning() {
        instrument.set_temperament(tuning.temperament()?);
    }
    let parameters = player.engine_relative_to(base_dir);
    instrument.set_state_information(&serde_json::to_vec(&parameters)?)?;

    let audio_config = player.audio();
    let block_frames = audio_config
        .buffer_size()
        .map(|frames| frames as usize)
        .unwrap_or(DEFAULT_BLOCK_FRAMES);
    instrument.prepare_to_play(audio_config.sample_rate() as f64, block_frames);

    let (sender, receiver) = mpsc::channel::<Vec<u8>>(MIDI_QUEUE_SIZE);
    let midi_device = match player.midi_device() {
        Some(name) => {
            let device = midi::get_device(name)?;
            device.watch_events(sender)?;
            Some(device)
        }
        None => {
            warn!("No MIDI device configured, nothing will trigger notes.");
            None
        }
    };

    let audio_device = audio::get_device(audio_config)?;
    info!(
        audio = audio_device.name(),
        midi = midi_device.as_ref().map(|device| device.name()),
        instrument = player.instrument().identifier(),
        "Starting player"
    );
    let playback = audio_device.play(live_renderer(instrument, receiver))?;

    tokio::signal::ctrl_c().await?;
    info!("Stopping player");

    if let Some(device) = midi_device {
        device.stop_watch_events();
    }
    playback.stop();
    Ok(())
}

/// Drains pending MIDI messages at the start of every block and hands them to
/// the instrument.
fn live_renderer(
    mut instrument: Box<dyn Instrument>,
    mut receiver: mpsc::Receiver<Vec<u8>>,
) -> Renderer {
    let mut events: Vec<TimedEvent> = Vec::with_capacity(MIDI_QUEUE_SIZE);
    Box::new(move |left: &mut [f32], right: &mut [f32]| {
        events.clear();
        while let Ok(raw) = receiver.try_recv() {
            events.push(TimedEvent { offset: 0, data: raw });
        }
        instrument.process_block(left, right, &events);
    })
}

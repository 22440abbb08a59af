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

use std::{error::Error, fmt, sync::atomic::Ordering, sync::mpsc, thread, time::Duration};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info, span, Level};

use super::thread_priority::{
    callback_thread_priority, configure_audio_thread_priority, rt_audio_enabled,
};
use super::{interleave, Device as AudioDevice, Playback, Renderer};
use crate::config;

/// A small wrapper around a cpal::Device.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of output channels.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
    /// The requested output sample rate.
    sample_rate: u32,
    /// The requested buffer size in frames, if any.
    buffer_size: Option<u32>,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

/// Builds the stream callback for one output sample type.
fn create_callback<T>(
    mut renderer: Renderer,
    channels: usize,
) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static
where
    T: cpal::SizedSample + cpal::FromSample<f32> + Send + 'static,
{
    let priority = callback_thread_priority();
    let rt_audio = rt_audio_enabled();
    let mut priority_set = false;
    let mut left: Vec<f32> = Vec::new();
    let mut right: Vec<f32> = Vec::new();

    move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        configure_audio_thread_priority(priority, rt_audio, &mut priority_set);

        let frames = data.len() / channels.max(1);
        if left.len() < frames {
            left.resize(frames, 0.0);
            right.resize(frames, 0.0);
        }
        let (left, right) = (&mut left[..frames], &mut right[..frames]);
        left.fill(0.0);
        right.fill(0.0);
        renderer(left, right);
        interleave(left, right, data, channels, |v| T::from_sample(v));
    }
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn AudioDevice>>, Box<dyn Error>> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn AudioDevice> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal devices.
    fn list_cpal_devices() -> Result<Vec<Device>, Box<dyn Error>> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let output_configs = match device.supported_output_configs() {
                    Ok(output_configs) => output_configs,
                    Err(_) => continue,
                };
                let max_channels = output_configs
                    .map(|output_config| output_config.channels())
                    .max()
                    .unwrap_or(0);

                if max_channels > 0 {
                    devices.push(Device {
                        name: device.name()?,
                        max_channels,
                        host_id,
                        device,
                        sample_rate: config::Audio::default().sample_rate(),
                        buffer_size: None,
                    })
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets the given cpal device. The name "default" selects the default
    /// output device of the default host.
    pub fn get(config: &config::Audio) -> Result<Device, Box<dyn Error>> {
        let name = config.device();
        let device = if name == "default" {
            Device::default_device()?
        } else {
            Device::list_cpal_devices()?
                .into_iter()
                .find(|device| device.name.trim() == name)
        };

        match device {
            Some(mut device) => {
                device.sample_rate = config.sample_rate();
                device.buffer_size = config.buffer_size();
                Ok(device)
            }
            None => Err(format!("no device found with name {}", name).into()),
        }
    }

    fn default_device() -> Result<Option<Device>, Box<dyn Error>> {
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let host = cpal::default_host();
        let device = match host.default_output_device() {
            Some(device) => device,
            None => return Ok(None),
        };
        let max_channels = device
            .supported_output_configs()?
            .map(|output_config| output_config.channels())
            .max()
            .unwrap_or(0);
        Ok(Some(Device {
            name: device.name()?,
            max_channels,
            host_id: host.id(),
            device,
            sample_rate: config::Audio::default().sample_rate(),
            buffer_size: None,
        }))
    }

    fn build_stream(
        device: &cpal::Device,
        stream_config: &cpal::StreamConfig,
        sample_format: cpal::SampleFormat,
        renderer: Renderer,
    ) -> Result<cpal::Stream, Box<dyn Error>> {
        let channels = stream_config.channels as usize;
        let stream = match sample_format {
            cpal::SampleFormat::F32 => device.build_output_stream(
                stream_config,
                create_callback::<f32>(renderer, channels),
                |err| error!("CPAL output stream error: {}", err),
                None,
            )?,
            cpal::SampleFormat::I16 => device.build_output_stream(
                stream_config,
                create_callback::<i16>(renderer, channels),
                |err| error!("CPAL output stream error: {}", err),
                None,
            )?,
            cpal::SampleFormat::I32 => device.build_output_stream(
                stream_config,
                create_callback::<i32>(renderer, channels),
                |err| error!("CPAL output stream error: {}", err),
                None,
            )?,
            other => return Err(format!("unsupported sample format {}", other).into()),
        };
        Ok(stream)
    }
}

impl AudioDevice for Device {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn play(&self, renderer: Renderer) -> Result<Playback, Box<dyn Error>> {
        let span = span!(Level::INFO, "play (cpal)");
        let _enter = span.enter();

        let sample_format = self.device.default_output_config()?.sample_format();
        let stream_config = cpal::StreamConfig {
            channels: self.max_channels.min(2),
            sample_rate: self.sample_rate,
            buffer_size: match self.buffer_size {
                Some(frames) => cpal::BufferSize::Fixed(frames),
                None => cpal::BufferSize::Default,
            },
        };
        info!(
            device = self.name,
            channels = stream_config.channels,
            sample_rate = self.sample_rate,
            format = sample_format.to_string(),
            "Opening output stream."
        );

        // The stream lives on its own thread so the handle can move freely.
        let device = self.device.clone();
        let (started_tx, started_rx) = mpsc::channel::<Result<(), String>>();
        let playback = Playback::spawn(move |stop| {
            let stream =
                match Device::build_stream(&device, &stream_config, sample_format, renderer) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = started_tx.send(Err(format!("failed to create stream: {}", e)));
                        return;
                    }
                };
            if let Err(e) = stream.play() {
                let _ = started_tx.send(Err(format!("failed to start stream: {}", e)));
                return;
            }
            let _ = started_tx.send(Ok(()));

            while !stop.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(100));
            }
            drop(stream);
        });

        match started_rx.recv() {
            Ok(Ok(())) => {
                info!("CPAL output stream started successfully");
                Ok(playback)
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err("audio output thread exited before starting".into()),
        }
    }
}

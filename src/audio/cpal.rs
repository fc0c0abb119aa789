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
use std::{error::Error, fmt, sync::Arc, thread};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info, span, Level};

use super::mixer::Mixer;
use super::{DecodedBuffer, GainId, Output, SourceId};
use crate::playsync::CancelHandle;

/// A cpal output device. Owns the shared mixer and the thread that keeps the
/// output stream alive.
pub struct Device {
    name: String,
    mixer: Arc<Mixer>,
    cancel_handle: CancelHandle,
    output_thread: Option<thread::JoinHandle<()>>,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}, Rate={})",
            self.name,
            self.mixer.num_channels(),
            self.mixer.sample_rate()
        )
    }
}

/// Builds a callback that renders the mixer straight into the device buffer.
fn create_callback<T>(
    mixer: Arc<Mixer>,
    num_channels: usize,
) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();
    move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        if scratch.len() < data.len() {
            scratch.resize(data.len(), 0.0);
        }
        let frames = data.len() / num_channels;
        mixer.process_into_output(&mut scratch[..data.len()], frames);
        for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
            *dst = T::from_sample(src);
        }
    }
}

impl Device {
    /// Lists the names of the available output devices.
    pub fn list() -> Result<Vec<String>, Box<dyn Error>> {
        let host = cpal::default_host();
        let mut names = Vec::new();
        for device in host.output_devices()? {
            names.push(device.name()?);
        }
        Ok(names)
    }

    fn find(name: &str) -> Result<cpal::Device, Box<dyn Error>> {
        let host = cpal::default_host();
        if name == "default" {
            return host
                .default_output_device()
                .ok_or_else(|| "no default output device".into());
        }

        for device in host.output_devices()? {
            if device.name()? == name {
                return Ok(device);
            }
        }
        Err(format!("no output device found with name {}", name).into())
    }

    /// Opens the named device and starts rendering the mixer through it.
    pub fn open(name: &str, sample_rate: u32, num_channels: u16) -> Result<Device, Box<dyn Error>> {
        let device = Device::find(name)?;
        let sample_format = device.default_output_config()?.sample_format();
        let mixer = Arc::new(Mixer::new(num_channels, sample_rate));
        let cancel_handle = CancelHandle::new();

        let stream_config = cpal::StreamConfig {
            channels: num_channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        // The stream is not Send on every platform, so it is created and kept
        // on its own thread until the device is dropped.
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);
        let output_thread = {
            let mixer = mixer.clone();
            let cancel_handle = cancel_handle.clone();
            let device_name = name.to_string();
            thread::spawn(move || {
                let span = span!(Level::INFO, "output stream", device = device_name);
                let _enter = span.enter();

                let channels = num_channels as usize;
                let on_error = |err| error!("cpal output stream error: {}", err);
                let stream = match sample_format {
                    cpal::SampleFormat::F32 => device.build_output_stream(
                        &stream_config,
                        create_callback::<f32>(mixer, channels),
                        on_error,
                        None,
                    ),
                    cpal::SampleFormat::I16 => device.build_output_stream(
                        &stream_config,
                        create_callback::<i16>(mixer, channels),
                        on_error,
                        None,
                    ),
                    cpal::SampleFormat::I32 => device.build_output_stream(
                        &stream_config,
                        create_callback::<i32>(mixer, channels),
                        on_error,
                        None,
                    ),
                    other => {
                        let _ = ready_tx.send(Err(format!("unsupported sample format {:?}", other)));
                        return;
                    }
                };

                let stream = match stream.map_err(|e| e.to_string()).and_then(|stream| {
                    stream.play().map_err(|e| e.to_string())?;
                    Ok(stream)
                }) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                info!("Output stream started");
                let _ = ready_tx.send(Ok(()));
                cancel_handle.wait();
                drop(stream);
                info!("Output stream stopped");
            })
        };

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(format!("unable to start output stream: {}", e).into()),
            Err(e) => return Err(format!("output thread exited early: {}", e).into()),
        }

        Ok(Device {
            name: name.to_string(),
            mixer,
            cancel_handle,
            output_thread: Some(output_thread),
        })
    }

    /// The mixer rendering into this device.
    pub fn mixer(&self) -> Arc<Mixer> {
        self.mixer.clone()
    }
}

impl Output for Device {
    fn create_gain(&self, value: f32) -> GainId {
        self.mixer.create_gain(value)
    }

    fn set_gain(&self, gain: GainId, value: f32) {
        self.mixer.set_gain(gain, value)
    }

    fn release_gains(&self, gains: &[GainId]) {
        self.mixer.release_gains(gains)
    }

    fn start(&self, buffer: Arc<DecodedBuffer>, gain: GainId) -> SourceId {
        self.mixer.start(buffer, gain)
    }

    fn stop(&self, source: SourceId) {
        self.mixer.stop(source)
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.cancel_handle.cancel();
        if let Some(thread) = self.output_thread.take() {
            let _ = thread.join();
        }
    }
}

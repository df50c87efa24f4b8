//! Hardware output using cpal.
//!
//! `cpal::Stream` is not `Send`, so each stream lives on its own thread and
//! is driven over a command channel.

use std::thread::{self, JoinHandle};

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    BufferSize, Device, FromSample, Host, HostId, SampleFormat, SampleRate, SizedSample, Stream,
    StreamConfig,
};
use crossbeam_channel::{bounded, Sender};
use sizzle_core::{Error, Result};
use tracing::{debug, error, info, warn};

use super::{OutputBackend, OutputStream, StreamRequest};
use crate::render::Renderer;
use crate::subsystem::{Subsystem, SubsystemGuard};

/// Interleaved samples rendered per pass for non-float devices.
const SCRATCH_SAMPLES: usize = 4096;

/// Output through the process-wide cpal host.
pub struct CpalBackend {
    subsystem: SubsystemGuard<'static>,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self {
            subsystem: Subsystem::global().acquire(),
        }
    }

    fn host_id(&self) -> Result<HostId> {
        self.subsystem
            .host_id()
            .ok_or_else(|| Error::Backend("Audio subsystem is not initialized".to_string()))
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputBackend for CpalBackend {
    fn name(&self) -> &str {
        "cpal"
    }

    fn open(&self, request: &StreamRequest, renderer: Renderer) -> Result<Box<dyn OutputStream>> {
        let host_id = self.host_id()?;
        let request = request.clone();

        let (command_tx, command_rx) = bounded::<StreamCommand>(4);
        let (ready_tx, ready_rx) = bounded::<Result<String>>(1);

        let thread = thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || {
                let stream = match build_stream(host_id, &request, renderer) {
                    Ok((stream, device_name)) => {
                        let _ = ready_tx.send(Ok(device_name));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                // Runs until `Close` or the handle is dropped.
                for command in &command_rx {
                    match command {
                        StreamCommand::Start(reply) => {
                            let result = stream.play().map_err(|e| {
                                Error::Backend(format!("Failed to start stream: {e}"))
                            });
                            let _ = reply.send(result);
                        }
                        StreamCommand::Stop(reply) => {
                            let result = stream.pause().map_err(|e| {
                                Error::Backend(format!("Failed to stop stream: {e}"))
                            });
                            let _ = reply.send(result);
                        }
                        StreamCommand::Close => break,
                    }
                }

                drop(stream);
                debug!("Output stream closed");
            })
            .map_err(|e| Error::Backend(format!("Failed to spawn output thread: {e}")))?;

        let ready = ready_rx
            .recv()
            .map_err(|_| Error::Backend("Output thread exited during setup".to_string()))
            .and_then(|result| result);

        match ready {
            Ok(device_name) => {
                info!("Using audio output device: {device_name}");
                Ok(Box::new(CpalStream {
                    commands: command_tx,
                    thread: Some(thread),
                    device_name,
                }))
            }
            Err(e) => {
                let _ = thread.join();
                Err(e)
            }
        }
    }
}

enum StreamCommand {
    Start(Sender<Result<()>>),
    Stop(Sender<Result<()>>),
    Close,
}

/// Handle to a stream living on its output thread.
struct CpalStream {
    commands: Sender<StreamCommand>,
    thread: Option<JoinHandle<()>>,
    device_name: String,
}

impl CpalStream {
    fn request(&self, command: fn(Sender<Result<()>>) -> StreamCommand) -> Result<()> {
        let (reply_tx, reply_rx) = bounded(1);
        self.commands
            .send(command(reply_tx))
            .map_err(|_| Error::Backend("Output thread is gone".to_string()))?;
        reply_rx
            .recv()
            .map_err(|_| Error::Backend("Output thread did not reply".to_string()))?
    }
}

impl OutputStream for CpalStream {
    fn start(&mut self) -> Result<()> {
        self.request(StreamCommand::Start)
    }

    fn stop(&mut self) -> Result<()> {
        self.request(StreamCommand::Stop)
    }

    fn device_name(&self) -> &str {
        &self.device_name
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        let _ = self.commands.send(StreamCommand::Close);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Output thread panicked");
            }
        }
    }
}

fn build_stream(
    host_id: HostId,
    request: &StreamRequest,
    renderer: Renderer,
) -> Result<(Stream, String)> {
    let host = cpal::host_from_id(host_id)
        .map_err(|e| Error::Backend(format!("Audio host unavailable: {e}")))?;
    let device = select_device(&host, request.device.as_deref())?;
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

    let supported_config = device
        .default_output_config()
        .map_err(|e| Error::Backend(format!("Failed to get output config: {e}")))?;
    debug!("Supported output config: {:?}", supported_config);

    let sample_format = supported_config.sample_format();
    let config = StreamConfig {
        channels: request.channels,
        sample_rate: SampleRate(request.sample_rate),
        buffer_size: request
            .buffer_frames
            .map_or(BufferSize::Default, BufferSize::Fixed),
    };
    debug!(
        "Output config: {}Hz, {} channels, {:?}",
        request.sample_rate, request.channels, sample_format
    );

    let stream = match sample_format {
        SampleFormat::F32 => build_float_stream(&device, &config, renderer)?,
        SampleFormat::I16 => build_converted_stream::<i16>(&device, &config, renderer)?,
        SampleFormat::U16 => build_converted_stream::<u16>(&device, &config, renderer)?,
        _ => {
            return Err(Error::Backend(format!(
                "Unsupported sample format: {sample_format:?}"
            )));
        }
    };

    Ok((stream, device_name))
}

/// Look up `name` among the host's outputs, falling back to the default.
fn select_device(host: &Host, name: Option<&str>) -> Result<Device> {
    if let Some(name) = name {
        let found = host
            .output_devices()
            .map_err(|e| Error::Backend(format!("Failed to list devices: {e}")))?
            .find(|d| d.name().is_ok_and(|n| n == name));
        if let Some(device) = found {
            return Ok(device);
        }
        warn!("Output device '{name}' not found, using default");
    }

    host.default_output_device()
        .ok_or_else(|| Error::Backend("No output device found".to_string()))
}

fn stream_error_handler(renderer: &Renderer) -> impl FnMut(cpal::StreamError) + Send + 'static {
    let reporter = renderer.error_reporter();
    move |err| {
        error!("Audio stream error: {err}");
        reporter.report(err.to_string());
    }
}

fn build_float_stream(device: &Device, config: &StreamConfig, renderer: Renderer) -> Result<Stream> {
    let on_error = stream_error_handler(&renderer);
    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| renderer.render(data),
            on_error,
            None,
        )
        .map_err(|e| Error::Backend(format!("Failed to build stream: {e}")))
}

/// Render to a preallocated float scratch buffer and convert in place.
fn build_converted_stream<T>(
    device: &Device,
    config: &StreamConfig,
    renderer: Renderer,
) -> Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = usize::from(config.channels.max(1));
    // Whole frames per pass so a frame never straddles two renders.
    let chunk = (SCRATCH_SAMPLES / channels).max(1) * channels;
    let mut scratch = vec![0.0f32; chunk];
    let on_error = stream_error_handler(&renderer);

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                for out in data.chunks_mut(chunk) {
                    let rendered = &mut scratch[..out.len()];
                    renderer.render(rendered);
                    for (sample, &value) in out.iter_mut().zip(rendered.iter()) {
                        *sample = T::from_sample(value);
                    }
                }
            },
            on_error,
            None,
        )
        .map_err(|e| Error::Backend(format!("Failed to build stream: {e}")))
}

/// List available output devices.
pub fn list_output_devices() -> Result<Vec<String>> {
    let subsystem = Subsystem::global().acquire();
    let host = host_for(&subsystem)?;

    let devices: Vec<String> = host
        .output_devices()
        .map_err(|e| Error::Backend(format!("Failed to list devices: {e}")))?
        .filter_map(|d| d.name().ok())
        .collect();

    Ok(devices)
}

/// Get the default output device name.
pub fn default_device_name() -> Option<String> {
    let subsystem = Subsystem::global().acquire();
    let host = host_for(&subsystem).ok()?;
    host.default_output_device().and_then(|d| d.name().ok())
}

fn host_for(subsystem: &SubsystemGuard<'_>) -> Result<Host> {
    let id = subsystem
        .host_id()
        .ok_or_else(|| Error::Backend("Audio subsystem is not initialized".to_string()))?;
    cpal::host_from_id(id).map_err(|e| Error::Backend(format!("Audio host unavailable: {e}")))
}

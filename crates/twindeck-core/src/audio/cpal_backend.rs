//! CPAL output stream
//!
//! ```text
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │  Control Thread  │───push()───────────►│  Command Queues     │
//! │  (Player handles)│                     │  (lock-free SPSC)   │
//! └──────────────────┘                     └──────────┬──────────┘
//!         ▲                                           │ pop()
//!         │ Relaxed atomics                           ▼
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │  PlayerAtomics   │◄────────────────────│  CPAL Audio Thread  │
//! │   (lock-free)    │   once per block    │  (owns the MixBus)  │
//! └──────────────────┘                     └─────────────────────┘
//! ```
//!
//! The renderer is moved into the stream callback, so the audio thread owns
//! it outright and no mutex sits on the hot path.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize as CpalBufferSize, SampleFormat, Stream, StreamConfig};

use super::config::{AudioConfig, BufferSize, DEFAULT_BUFFER_SIZE, DEFAULT_SAMPLE_RATE, MAX_BUFFER_SIZE};
use super::device::{default_output_device, find_device_by_id};
use super::error::{AudioError, AudioResult};
use super::render::render_interleaved;
use crate::engine::AudioRenderer;
use crate::types::StereoBuffer;

/// Keeps the output stream alive; drop it to stop audio
pub struct AudioHandle {
    _stream: Stream,
    device_name: String,
    sample_rate: u32,
    buffer_size: u32,
}

impl AudioHandle {
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Negotiated buffer size in frames
    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    /// One-way output latency in milliseconds
    pub fn latency_ms(&self) -> f32 {
        (self.buffer_size as f32 / self.sample_rate as f32) * 1000.0
    }
}

/// Open the configured output and start pulling audio from a renderer
///
/// `make_renderer` receives the negotiated output rate, so players can be
/// created for the rate the device actually runs at.
pub fn start_audio_system<R, F>(config: &AudioConfig, make_renderer: F) -> AudioResult<AudioHandle>
where
    R: AudioRenderer + 'static,
    F: FnOnce(u32) -> R,
{
    let device = match &config.device {
        Some(id) => find_device_by_id(id)?,
        None => default_output_device()?,
    };
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using audio device: {}", device_name);

    let (supported, buffer_size) = get_output_config(&device, config)?;
    let sample_rate = supported.sample_rate().0;
    let stream_config = StreamConfig {
        channels: supported.channels(),
        sample_rate: supported.sample_rate(),
        buffer_size: match config.buffer_size {
            BufferSize::Default => CpalBufferSize::Default,
            BufferSize::Fixed(_) => CpalBufferSize::Fixed(buffer_size),
        },
    };

    log::info!(
        "Audio config: {} channels, {}Hz, {} frames (~{:.1}ms latency)",
        stream_config.channels,
        sample_rate,
        buffer_size,
        (buffer_size as f32 / sample_rate as f32) * 1000.0
    );

    let renderer = make_renderer(sample_rate);
    let stream = build_output_stream(&device, &stream_config, renderer)?;
    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

    log::info!("Audio stream started");

    Ok(AudioHandle {
        _stream: stream,
        device_name,
        sample_rate,
        buffer_size,
    })
}

/// Pick an f32 stereo config at the requested rate, falling back as needed
///
/// Returns (SupportedStreamConfig, buffer_size_in_frames)
fn get_output_config(
    device: &cpal::Device,
    config: &AudioConfig,
) -> AudioResult<(cpal::SupportedStreamConfig, u32)> {
    let supported_configs: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    let target_rate = config.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE);
    let in_range = |c: &&cpal::SupportedStreamConfigRange| {
        target_rate >= c.min_sample_rate().0 && target_rate <= c.max_sample_rate().0
    };

    let best = supported_configs
        .iter()
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .filter(|c| c.channels() >= 2)
        .find(in_range)
        .or_else(|| {
            supported_configs
                .iter()
                .filter(|c| c.sample_format() == SampleFormat::F32)
                .find(in_range)
        })
        .or_else(|| {
            supported_configs
                .iter()
                .find(|c| c.sample_format() == SampleFormat::F32)
        })
        .ok_or_else(|| {
            AudioError::UnsupportedFormat("device offers no f32 output configuration".to_string())
        })?;

    let sample_rate = if in_range(&best) {
        cpal::SampleRate(target_rate)
    } else {
        let fallback = best.max_sample_rate();
        log::warn!(
            "Audio device doesn't support {}Hz, falling back to {}Hz",
            target_rate,
            fallback.0
        );
        fallback
    };

    let buffer_size = match config.buffer_size {
        BufferSize::Default => DEFAULT_BUFFER_SIZE,
        BufferSize::Fixed(frames) => frames.clamp(64, MAX_BUFFER_SIZE as u32),
    };

    Ok((best.clone().with_sample_rate(sample_rate), buffer_size))
}

fn build_output_stream<R: AudioRenderer + 'static>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut renderer: R,
) -> AudioResult<Stream> {
    let channels = config.channels as usize;
    let mut block = StereoBuffer::silence(MAX_BUFFER_SIZE);

    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                render_interleaved(&mut renderer, &mut block, data, channels);
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))
}

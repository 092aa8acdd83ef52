//! Output stream configuration

use serde::{Deserialize, Serialize};

/// Largest block the engine pre-allocates for
///
/// Callbacks asking for more frames are rendered in chunks of this size.
pub const MAX_BUFFER_SIZE: usize = 8192;

/// Buffer size used when none is requested (frames)
/// 512 frames @ 48kHz = ~10.7ms
pub const DEFAULT_BUFFER_SIZE: u32 = 512;

/// Output rate used by offline rendering and preferred for devices
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Preferred buffer size for the output stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferSize {
    /// Whatever the host picks
    #[default]
    Default,
    /// Request a fixed number of frames (the host may still adjust it)
    Fixed(u32),
}

impl BufferSize {
    /// Buffer size in frames, or None for the host default
    pub fn as_frames(&self) -> Option<u32> {
        match self {
            BufferSize::Default => None,
            BufferSize::Fixed(frames) => Some(*frames),
        }
    }

    /// Latency of one buffer in milliseconds
    pub fn latency_ms(&self, sample_rate: u32) -> Option<f32> {
        self.as_frames()
            .map(|frames| (frames as f32 / sample_rate as f32) * 1000.0)
    }
}

/// Output device identifier
///
/// The host name disambiguates devices on systems with several audio hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceId {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl DeviceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: None,
        }
    }

    pub fn with_host(name: &str, host: &str) -> Self {
        Self {
            name: name.to_string(),
            host: Some(host.to_string()),
        }
    }

    pub fn display_label(&self) -> String {
        match &self.host {
            Some(host) => format!("[{}] {}", host, self.name),
            None => self.name.clone(),
        }
    }
}

/// Configuration for the single stereo output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output device (None = system default)
    pub device: Option<DeviceId>,
    pub buffer_size: BufferSize,
    /// Preferred output rate (None = device default)
    pub sample_rate: Option<u32>,
}

impl AudioConfig {
    pub fn with_device(mut self, device: DeviceId) -> Self {
        self.device = Some(device);
        self
    }

    pub fn with_buffer_frames(mut self, frames: u32) -> Self {
        self.buffer_size = BufferSize::Fixed(frames);
        self
    }

    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = Some(rate);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_size_latency() {
        assert_eq!(BufferSize::Default.latency_ms(48000), None);
        let ms = BufferSize::Fixed(480).latency_ms(48000).unwrap();
        assert!((ms - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_builder() {
        let config = AudioConfig::default()
            .with_device(DeviceId::with_host("pulse", "Alsa"))
            .with_buffer_frames(256)
            .with_sample_rate(44100);
        assert_eq!(config.buffer_size.as_frames(), Some(256));
        assert_eq!(config.sample_rate, Some(44100));
        assert_eq!(config.device.unwrap().display_label(), "[Alsa] pulse");
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: AudioConfig = serde_yaml::from_str("sample_rate: 44100\n").unwrap();
        assert_eq!(config.sample_rate, Some(44100));
        assert_eq!(config.buffer_size, BufferSize::Default);
        assert!(config.device.is_none());
    }
}

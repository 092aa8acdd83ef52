//! Engine-wide settings stored in `config.yaml`

use serde::{Deserialize, Serialize};

use crate::audio::AudioConfig;
use crate::engine::{InterpolationMethod, PlayerSettings, COMMAND_QUEUE_CAPACITY, DEFAULT_LOOP_EPSILON_SECS};
use crate::waveform::DEFAULT_ENVELOPE_POINTS;

/// Player volume a fresh install starts with
pub const DEFAULT_PLAYER_GAIN: f32 = 0.7;

/// Top-level configuration
///
/// Every field has a default, so a partial file only overrides what it names:
///
/// ```yaml
/// audio:
///   buffer_size: !fixed 256
/// interpolation: linear
/// loop_epsilon_secs: 0.02
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub audio: AudioConfig,
    /// Points per waveform envelope
    pub waveform_points: usize,
    /// How close to the end a simple loop wraps, in seconds
    pub loop_epsilon_secs: f64,
    pub interpolation: InterpolationMethod,
    /// Initial gain of each player
    pub default_gain: f32,
    pub command_queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            waveform_points: DEFAULT_ENVELOPE_POINTS,
            loop_epsilon_secs: DEFAULT_LOOP_EPSILON_SECS,
            interpolation: InterpolationMethod::default(),
            default_gain: DEFAULT_PLAYER_GAIN,
            command_queue_capacity: COMMAND_QUEUE_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Per-player settings derived from this config
    pub fn player_settings(&self) -> PlayerSettings {
        PlayerSettings {
            interpolation: self.interpolation,
            loop_epsilon_secs: self.loop_epsilon_secs,
            gain: self.default_gain,
            command_queue_capacity: self.command_queue_capacity.max(1),
            waveform_points: self.waveform_points.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::BufferSize;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.waveform_points, 1000);
        assert_eq!(config.loop_epsilon_secs, 0.05);
        assert_eq!(config.interpolation, InterpolationMethod::Cubic);
        assert_eq!(config.player_settings().gain, 0.7);
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = "interpolation: linear\naudio:\n  buffer_size: !fixed 256\n";
        let config: EngineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.interpolation, InterpolationMethod::Linear);
        assert_eq!(config.audio.buffer_size, BufferSize::Fixed(256));
        assert_eq!(config.waveform_points, 1000);
    }

    #[test]
    fn test_player_settings_never_zero_sized() {
        let config = EngineConfig {
            waveform_points: 0,
            command_queue_capacity: 0,
            ..Default::default()
        };
        let settings = config.player_settings();
        assert_eq!(settings.waveform_points, 1);
        assert_eq!(settings.command_queue_capacity, 1);
    }
}

//! Configuration for twindeck-player
//!
//! The engine config is stored as YAML in the user's config directory
//! (default: ~/.config/twindeck/config.yaml). Command-line flags override
//! whatever the file says for this run only.

use twindeck_core::audio::{BufferSize, DeviceId};
use twindeck_core::config::{default_config_path, load_config, EngineConfig};

use crate::cli::Args;

/// Load the config file named on the command line, or the default one
pub fn load(args: &Args) -> EngineConfig {
    let path = args.config.clone().unwrap_or_else(default_config_path);
    let mut config: EngineConfig = load_config(&path);
    apply_overrides(&mut config, args);
    config
}

/// Apply command-line flags on top of the file config
pub fn apply_overrides(config: &mut EngineConfig, args: &Args) {
    if let Some(name) = &args.device {
        config.audio.device = Some(DeviceId::new(name.clone()));
    }
    if let Some(frames) = args.buffer_size {
        config.audio.buffer_size = BufferSize::Fixed(frames);
    }
    if let Some(rate) = args.sample_rate {
        config.audio.sample_rate = Some(rate);
    }
    if let Some(method) = args.interpolation {
        config.interpolation = method.into();
    }
    if let Some(gain) = args.gain {
        config.default_gain = gain.clamp(0.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use twindeck_core::config::save_config;
    use twindeck_core::engine::InterpolationMethod;

    #[test]
    fn test_flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let file_config = EngineConfig {
            loop_epsilon_secs: 0.02,
            interpolation: InterpolationMethod::Cubic,
            ..Default::default()
        };
        save_config(&file_config, &path).unwrap();

        let args = Args::try_parse_from([
            "twindeck-player",
            "a.wav",
            "--config",
            path.to_str().unwrap(),
            "--interpolation",
            "linear",
            "--buffer-size",
            "128",
            "--device",
            "hw:1,0",
        ])
        .unwrap();
        let config = load(&args);

        assert_eq!(config.loop_epsilon_secs, 0.02);
        assert_eq!(config.interpolation, InterpolationMethod::Linear);
        assert_eq!(config.audio.buffer_size, BufferSize::Fixed(128));
        assert_eq!(config.audio.device, Some(DeviceId::new("hw:1,0")));
    }

    #[test]
    fn test_no_flags_keeps_defaults() {
        let args = Args::try_parse_from(["twindeck-player", "a.wav"]).unwrap();
        let mut config = EngineConfig::default();
        apply_overrides(&mut config, &args);
        assert_eq!(config, EngineConfig::default());
    }
}

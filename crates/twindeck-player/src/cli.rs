//! Command-line arguments and interactive commands

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use twindeck_core::engine::InterpolationMethod;
use twindeck_core::PlayerSlot;

/// Play one or two audio files with variable speed, looping and crossfade
#[derive(Parser, Debug)]
#[command(name = "twindeck-player")]
#[command(version)]
pub struct Args {
    /// Audio files to load into player 1 and player 2
    #[arg(required_unless_present = "list_devices", num_args = 1..=2)]
    pub files: Vec<PathBuf>,

    /// Crossfader position, 0.0 = player 1 only, 1.0 = player 2 only
    #[arg(short = 'x', long)]
    pub crossfade: Option<f32>,

    /// Link player gains to the crossfader
    #[arg(long)]
    pub linked: bool,

    /// Playback speed ratio for every player (0.25 - 4.0)
    #[arg(short, long)]
    pub speed: Option<f64>,

    /// Player gain for every player (0.0 - 1.0)
    #[arg(short, long)]
    pub gain: Option<f32>,

    /// Loop each file from start to end
    #[arg(short = 'l', long = "loop")]
    pub loop_simple: bool,

    /// Loop between two times in seconds on player 1
    #[arg(long, num_args = 2, value_names = ["A", "B"], conflicts_with = "loop_simple")]
    pub ab: Option<Vec<f64>>,

    /// Stop after this many seconds (required with --render unless a file length is known)
    #[arg(short, long)]
    pub duration: Option<f64>,

    /// Render to a WAV file instead of the sound card
    #[arg(short, long, value_name = "WAV")]
    pub render: Option<PathBuf>,

    /// Output device name, as shown by --list-devices
    #[arg(long)]
    pub device: Option<String>,

    /// Output buffer size in frames
    #[arg(long)]
    pub buffer_size: Option<u32>,

    /// Output sample rate in Hz
    #[arg(long)]
    pub sample_rate: Option<u32>,

    #[arg(long, value_enum)]
    pub interpolation: Option<Interpolation>,

    /// Config file (default: ~/.config/twindeck/config.yaml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Interpolation {
    Linear,
    Cubic,
}

impl From<Interpolation> for InterpolationMethod {
    fn from(value: Interpolation) -> Self {
        match value {
            Interpolation::Linear => InterpolationMethod::Linear,
            Interpolation::Cubic => InterpolationMethod::Cubic,
        }
    }
}

/// A line typed while playing
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play(PlayerSlot),
    Stop(PlayerSlot),
    /// Toggle play/stop
    Toggle(PlayerSlot),
    Seek(PlayerSlot, f64),
    /// Relative jump in seconds
    Skip(PlayerSlot, f64),
    Start(PlayerSlot),
    End(PlayerSlot),
    /// Toggle mute, restoring the previous gain
    Mute(PlayerSlot),
    Speed(PlayerSlot, f64),
    Gain(PlayerSlot, f32),
    Loop(PlayerSlot, bool),
    MarkA(PlayerSlot),
    MarkB(PlayerSlot),
    ClearLoop(PlayerSlot),
    Load(PlayerSlot, PathBuf),
    Crossfade(f32),
    Link(bool),
    Help,
    Quit,
}

/// Jump used by `fwd` and `back` without an argument
pub const SKIP_SECONDS: f64 = 10.0;

pub const HELP: &str = "\
commands (append 2 to target player 2, e.g. `play 2`):
  <enter>            toggle play/stop
  play | stop        start or stop
  seek <secs>        jump to a time
  fwd | back [secs]  jump 10s (or secs) forward or back
  start | end        jump to the start or the end
  mute               mute or unmute
  speed <ratio>      playback speed, 0.25 - 4.0
  gain <0..1>        player gain
  loop on|off        whole-file loop
  a | b              mark loop point A / B at the playhead
  clear              clear the loop
  load <file>        load a file
  xfade <0..1>       crossfader position
  link on|off        link gains to the crossfader
  help | quit";

/// Parse an interactive command line
pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut words: Vec<&str> = line.split_whitespace().collect();

    // A trailing 1 or 2 selects the player, except where the number is the value
    let takes_value = matches!(
        words.first().copied(),
        Some("seek" | "speed" | "gain" | "xfade" | "load")
    );
    let slot = match words.last().copied() {
        Some("2") if words.len() > 1 + takes_value as usize => {
            words.pop();
            PlayerSlot::Two
        }
        Some("1") if words.len() > 1 + takes_value as usize => {
            words.pop();
            PlayerSlot::One
        }
        _ => PlayerSlot::One,
    };

    let arg = words.get(1).copied();
    let number = |name: &str| -> Result<f64, String> {
        let raw = arg.ok_or_else(|| format!("`{}` needs a value", name))?;
        raw.parse::<f64>()
            .map_err(|_| format!("`{}` is not a number", raw))
    };
    let skip = |name: &str, sign: f64| -> Result<f64, String> {
        match arg {
            None => Ok(sign * SKIP_SECONDS),
            Some(_) => number(name).map(|secs| sign * secs.abs()),
        }
    };
    let switch = |name: &str| -> Result<bool, String> {
        match arg {
            None | Some("on") => Ok(true),
            Some("off") => Ok(false),
            Some(other) => Err(format!("`{}` expects on or off, got `{}`", name, other)),
        }
    };

    match words.first().copied() {
        None | Some("p") => Ok(Command::Toggle(slot)),
        Some("play") => Ok(Command::Play(slot)),
        Some("stop") => Ok(Command::Stop(slot)),
        Some("seek") => Ok(Command::Seek(slot, number("seek")?)),
        Some("fwd" | "f") => Ok(Command::Skip(slot, skip("fwd", 1.0)?)),
        Some("back" | "r") => Ok(Command::Skip(slot, skip("back", -1.0)?)),
        Some("start" | "home") => Ok(Command::Start(slot)),
        Some("end") => Ok(Command::End(slot)),
        Some("mute" | "m") => Ok(Command::Mute(slot)),
        Some("speed") => Ok(Command::Speed(slot, number("speed")?)),
        Some("gain") => Ok(Command::Gain(slot, number("gain")? as f32)),
        Some("loop") => Ok(Command::Loop(slot, switch("loop")?)),
        Some("a") => Ok(Command::MarkA(slot)),
        Some("b") => Ok(Command::MarkB(slot)),
        Some("clear") => Ok(Command::ClearLoop(slot)),
        Some("load") => arg
            .map(|p| Command::Load(slot, PathBuf::from(p)))
            .ok_or_else(|| "`load` needs a file".to_string()),
        Some("xfade") => Ok(Command::Crossfade(number("xfade")? as f32)),
        Some("link") => Ok(Command::Link(switch("link")?)),
        Some("help" | "h" | "?") => Ok(Command::Help),
        Some("quit" | "q" | "exit") => Ok(Command::Quit),
        Some(other) => Err(format!("unknown command `{}` (try `help`)", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_args() {
        let args = Args::try_parse_from([
            "twindeck-player",
            "a.wav",
            "b.flac",
            "--crossfade",
            "0.25",
            "--ab",
            "1.0",
            "3.5",
            "--render",
            "out.wav",
        ])
        .unwrap();
        assert_eq!(args.files.len(), 2);
        assert_eq!(args.crossfade, Some(0.25));
        assert_eq!(args.ab, Some(vec![1.0, 3.5]));
        assert_eq!(args.render, Some(PathBuf::from("out.wav")));

        assert!(Args::try_parse_from(["twindeck-player", "a", "b", "c"]).is_err());
        assert!(Args::try_parse_from(["twindeck-player"]).is_err());
        assert!(Args::try_parse_from(["twindeck-player", "--list-devices"]).is_ok());
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command(""), Ok(Command::Toggle(PlayerSlot::One)));
        assert_eq!(parse_command("play 2"), Ok(Command::Play(PlayerSlot::Two)));
        assert_eq!(parse_command("seek 12.5"), Ok(Command::Seek(PlayerSlot::One, 12.5)));
        assert_eq!(parse_command("seek 2"), Ok(Command::Seek(PlayerSlot::One, 2.0)));
        assert_eq!(parse_command("seek 30 2"), Ok(Command::Seek(PlayerSlot::Two, 30.0)));
        assert_eq!(parse_command("speed 1.5 1"), Ok(Command::Speed(PlayerSlot::One, 1.5)));
        assert_eq!(parse_command("loop off 2"), Ok(Command::Loop(PlayerSlot::Two, false)));
        assert_eq!(parse_command("loop"), Ok(Command::Loop(PlayerSlot::One, true)));
        assert_eq!(parse_command("b 2"), Ok(Command::MarkB(PlayerSlot::Two)));
        assert_eq!(parse_command("xfade 1"), Ok(Command::Crossfade(1.0)));
        assert_eq!(parse_command("link on"), Ok(Command::Link(true)));
        assert_eq!(
            parse_command("load track.mp3 2"),
            Ok(Command::Load(PlayerSlot::Two, PathBuf::from("track.mp3")))
        );
        assert_eq!(parse_command("q"), Ok(Command::Quit));
        assert_eq!(parse_command("fwd"), Ok(Command::Skip(PlayerSlot::One, 10.0)));
        assert_eq!(parse_command("back 2"), Ok(Command::Skip(PlayerSlot::Two, -10.0)));
        assert_eq!(parse_command("back 30 1"), Ok(Command::Skip(PlayerSlot::One, -30.0)));
        assert_eq!(parse_command("end 2"), Ok(Command::End(PlayerSlot::Two)));
        assert_eq!(parse_command("start"), Ok(Command::Start(PlayerSlot::One)));
        assert_eq!(parse_command("mute 2"), Ok(Command::Mute(PlayerSlot::Two)));
        assert!(parse_command("fwd soon").is_err());

        assert!(parse_command("seek").is_err());
        assert!(parse_command("speed fast").is_err());
        assert!(parse_command("loop maybe").is_err());
        assert!(parse_command("dance").is_err());
    }
}

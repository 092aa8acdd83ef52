//! One or two players, seen from the terminal
//!
//! A single file plays through a bare `PlayerEngine`; two files go through
//! the mix bus. Either way the audio side is a `Box<dyn AudioRenderer>`, so
//! the output callback does not care which it got.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use twindeck_core::control::{create_mixer, create_player, MixerControl, Player};
use twindeck_core::engine::{AudioRenderer, LoopMode, PlayerSettings};
use twindeck_core::source::DecoderRegistry;
use twindeck_core::{format_time, PlayerSlot};

use crate::cli::{Command, HELP};

pub enum Session {
    Single(Player),
    Dual(MixerControl),
}

impl Session {
    /// Create the control side and the renderer for `players` players
    pub fn create(
        players: usize,
        output_rate: u32,
        settings: &PlayerSettings,
        registry: Arc<DecoderRegistry>,
    ) -> (Self, Box<dyn AudioRenderer>) {
        if players >= 2 {
            let (mixer, bus) = create_mixer(output_rate, settings, registry);
            (Session::Dual(mixer), Box::new(bus))
        } else {
            let (player, engine) = create_player(output_rate, settings, registry);
            (Session::Single(player), Box::new(engine))
        }
    }

    pub fn player(&self, slot: PlayerSlot) -> Option<&Player> {
        match (self, slot) {
            (Session::Single(player), PlayerSlot::One) => Some(player),
            (Session::Single(_), PlayerSlot::Two) => None,
            (Session::Dual(mixer), slot) => Some(mixer.player(slot)),
        }
    }

    pub fn player_mut(&mut self, slot: PlayerSlot) -> Option<&mut Player> {
        match (self, slot) {
            (Session::Single(player), PlayerSlot::One) => Some(player),
            (Session::Single(_), PlayerSlot::Two) => None,
            (Session::Dual(mixer), slot) => Some(mixer.player_mut(slot)),
        }
    }

    fn require(&mut self, slot: PlayerSlot) -> Result<&mut Player> {
        match self.player_mut(slot) {
            Some(player) => Ok(player),
            None => bail!("player {} is not in use", slot.display_number()),
        }
    }

    fn mixer(&self) -> Result<&MixerControl> {
        match self {
            Session::Dual(mixer) => Ok(mixer),
            Session::Single(_) => bail!("the mixer needs two files"),
        }
    }

    pub fn players(&self) -> impl Iterator<Item = (PlayerSlot, &Player)> {
        PlayerSlot::ALL
            .into_iter()
            .filter_map(move |slot| self.player(slot).map(|p| (slot, p)))
    }

    /// Load a file into a player, returning its length in seconds
    pub fn load(&mut self, slot: PlayerSlot, path: &Path) -> Result<f64> {
        self.require(slot)?
            .load_source(path)
            .with_context(|| format!("Failed to load {}", path.display()))
    }

    /// True once nothing is playing and every queued load has landed
    pub fn is_idle(&self) -> bool {
        self.players()
            .all(|(_, p)| !p.is_playing() && !p.is_load_pending())
    }

    /// Apply one interactive command; returns false on quit
    pub fn apply(&mut self, command: Command) -> Result<bool> {
        match command {
            Command::Play(slot) => self.require(slot)?.play()?,
            Command::Stop(slot) => self.require(slot)?.stop()?,
            Command::Toggle(slot) => {
                let player = self.require(slot)?;
                if player.is_playing() {
                    player.stop()?;
                } else {
                    player.play()?;
                }
            }
            Command::Seek(slot, seconds) => self.require(slot)?.seek(seconds)?,
            Command::Skip(slot, seconds) => self.require(slot)?.skip(seconds)?,
            Command::Start(slot) => self.require(slot)?.seek(0.0)?,
            Command::End(slot) => self.require(slot)?.seek_fraction(1.0)?,
            Command::Mute(slot) => {
                self.require(slot)?.toggle_mute();
            }
            Command::Speed(slot, ratio) => self.require(slot)?.set_speed(ratio),
            Command::Gain(slot, gain) => self.require(slot)?.set_gain(gain),
            Command::Loop(slot, enabled) => self.require(slot)?.set_loop_simple(enabled)?,
            Command::MarkA(slot) => self.require(slot)?.set_loop_point_a()?,
            Command::MarkB(slot) => self.require(slot)?.set_loop_point_b()?,
            Command::ClearLoop(slot) => self.require(slot)?.clear_loop()?,
            Command::Load(slot, path) => {
                let length = self.load(slot, &path)?;
                println!("player {}: {} ({})", slot.display_number(), path.display(), format_time(length));
            }
            Command::Crossfade(value) => self.mixer()?.set_crossfade(value),
            Command::Link(linked) => self.mixer()?.set_linked(linked),
            Command::Help => println!("{}", HELP),
            Command::Quit => return Ok(false),
        }
        Ok(true)
    }

    /// Log underruns every player has reported since the last call
    pub fn report_underruns(&mut self) {
        for slot in PlayerSlot::ALL {
            if let Some(player) = self.player_mut(slot) {
                player.report_underruns();
            }
        }
    }

    /// `1 ▶ 01:02 / 03:45 [A-B 00:10-00:20] | 2 ■ 00:00 / 02:10 | x 0.50`
    pub fn status_line(&self) -> String {
        let mut parts: Vec<String> = self
            .players()
            .map(|(slot, player)| format!("{} {}", slot.display_number(), player_status(player)))
            .collect();
        if let Session::Dual(mixer) = self {
            let link = if mixer.is_linked() { " linked" } else { "" };
            parts.push(format!("x {:.2}{}", mixer.crossfade(), link));
        }
        parts.join(" | ")
    }
}

fn player_status(player: &Player) -> String {
    let snapshot = player.snapshot();
    let icon = if snapshot.playing { '▶' } else { '■' };
    let mut status = format!(
        "{} {} / {}",
        icon,
        format_time(snapshot.position),
        format_time(snapshot.length)
    );

    if player.is_muted() {
        status.push_str(" [mute]");
    }

    let speed = player.speed();
    if (speed - 1.0).abs() > 1e-3 {
        status.push_str(&format!(" x{:.2}", speed));
    }

    match snapshot.loop_mode {
        LoopMode::None => {}
        LoopMode::Simple => status.push_str(" [loop]"),
        LoopMode::AB => {
            let (start, end) = snapshot.loop_bounds;
            status.push_str(&format!(" [A-B {}-{}]", format_time(start), format_time(end)));
        }
    }
    if snapshot.loop_mode != LoopMode::AB {
        if let (Some(a), None) = snapshot.loop_marks {
            status.push_str(&format!(" [A {}]", format_time(a)));
        }
    }
    status
}

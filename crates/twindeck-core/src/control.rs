//! Control-thread handles for players and the mixer
//!
//! A [`Player`] is the non-real-time half of a [`PlayerEngine`]: decoding
//! happens here, discrete requests are queued to the audio thread, scalar
//! parameters are written straight into atomics, and every query reads the
//! state the audio thread last published. Nothing here ever blocks on the
//! audio thread.

use std::path::Path;
use std::sync::Arc;

use basedrop::Shared;
use thiserror::Error;

use crate::engine::{
    command_channel, gc_handle, requested_step, InterpolationMethod, LoopMode, MixBus, MixParams,
    PlayerAtomics, PlayerCommand, PlayerEngine, PlayerParams, PlayerSettings, PlayerSnapshot,
    MAX_STEP,
};
use crate::source::{DecoderRegistry, LoadError};
use crate::types::PlayerSlot;
use crate::waveform::{EnvelopeState, WaveformWorker};

#[derive(Error, Debug)]
pub enum ControlError {
    /// The audio thread has not drained earlier commands yet
    #[error("Command queue is full, request dropped")]
    QueueFull,

    #[error(transparent)]
    Load(#[from] LoadError),
}

pub type ControlResult<T> = Result<T, ControlError>;

/// Create a player pair: the handle for the caller, the engine for the audio thread
pub fn create_player(
    output_rate: u32,
    settings: &PlayerSettings,
    registry: Arc<DecoderRegistry>,
) -> (Player, PlayerEngine) {
    let (producer, consumer) = command_channel(settings.command_queue_capacity);
    let engine = PlayerEngine::new(output_rate, settings, consumer);

    let player = Player {
        commands: producer,
        params: engine.params(),
        atomics: engine.atomics(),
        registry,
        waveform: WaveformWorker::spawn(settings.waveform_points),
        output_rate,
        source_rate: 0,
        requested_generation: 0,
        reported_underrun: 0,
        muted_gain: None,
    };
    (player, engine)
}

/// Control surface of one player
pub struct Player {
    commands: rtrb::Producer<PlayerCommand>,
    params: Arc<PlayerParams>,
    atomics: Arc<PlayerAtomics>,
    registry: Arc<DecoderRegistry>,
    waveform: WaveformWorker,
    output_rate: u32,
    /// Rate of the last source queued, 0 when none
    source_rate: u32,
    /// Generation of the last load queued; the audio side catches up to it
    requested_generation: u64,
    reported_underrun: u64,
    /// Gain to restore on unmute
    muted_gain: Option<f32>,
}

impl Player {
    fn send(&mut self, command: PlayerCommand) -> ControlResult<()> {
        self.commands.push(command).map_err(|rtrb::PushError::Full(command)| {
            log::warn!("Command queue full, dropping {:?}", command);
            ControlError::QueueFull
        })
    }

    /// Decode `path` and queue it for playback, returning its length in seconds
    ///
    /// On failure nothing changes: the previous source keeps its position,
    /// play state and loop region. On success the new source starts
    /// stopped at 0 once the audio thread picks it up, and its envelope
    /// is computed in the background.
    pub fn load_source(&mut self, path: impl AsRef<Path>) -> ControlResult<f64> {
        let path = path.as_ref();
        let source = self.registry.open(path).map_err(|e| {
            log::warn!("Failed to load {}: {}", path.display(), e);
            e
        })?;

        log::info!(
            "Loaded {} ({} Hz, {} ch, {:.1}s)",
            path.display(),
            source.sample_rate(),
            source.channels(),
            source.duration_secs()
        );

        let duration = source.duration_secs();
        let source_rate = source.sample_rate();
        let generation = self.requested_generation + 1;
        let source = Shared::new(&gc_handle(), source);
        self.send(PlayerCommand::Load {
            source: source.clone(),
            generation,
        })?;
        self.requested_generation = generation;
        self.source_rate = source_rate;
        self.waveform.request(source);
        self.warn_if_step_capped(self.speed());
        Ok(duration)
    }

    /// The resampler cannot read more than `MAX_STEP` source frames per
    /// output frame; past that, playback runs slower than asked
    fn warn_if_step_capped(&self, ratio: f64) -> bool {
        let step = requested_step(ratio, self.source_rate, self.output_rate);
        if step > MAX_STEP {
            log::warn!(
                "Speed {:.2} on a {} Hz source at {} Hz output needs {:.1} frames per output frame; capped at {}",
                ratio,
                self.source_rate,
                self.output_rate,
                step,
                MAX_STEP
            );
            return true;
        }
        false
    }

    /// Release the current source
    pub fn unload(&mut self) -> ControlResult<()> {
        self.send(PlayerCommand::Unload)?;
        self.source_rate = 0;
        self.waveform.clear();
        Ok(())
    }

    pub fn play(&mut self) -> ControlResult<()> {
        self.send(PlayerCommand::Play)
    }

    pub fn stop(&mut self) -> ControlResult<()> {
        self.send(PlayerCommand::Stop)
    }

    /// Seek to `seconds`, clamped to [0, length]
    pub fn seek(&mut self, seconds: f64) -> ControlResult<()> {
        self.send(PlayerCommand::Seek { seconds })
    }

    /// Seek to a fraction of the length, as from a click on the waveform
    pub fn seek_fraction(&mut self, fraction: f64) -> ControlResult<()> {
        self.send(PlayerCommand::SeekFraction { fraction })
    }

    /// Jump by `seconds` (negative goes back) from wherever the audio
    /// thread's playhead is when the command lands, clamped to [0, length]
    pub fn skip(&mut self, seconds: f64) -> ControlResult<()> {
        self.send(PlayerCommand::Skip { seconds })
    }

    /// Player gain in [0, 1], effective from the next block
    ///
    /// Setting a gain while muted ends the mute.
    pub fn set_gain(&mut self, gain: f32) {
        self.muted_gain = None;
        self.params.set_gain(gain);
    }

    pub fn gain(&self) -> f32 {
        self.params.gain()
    }

    /// Silence the player, remembering its gain
    pub fn mute(&mut self) {
        if self.muted_gain.is_none() {
            self.muted_gain = Some(self.params.gain());
            self.params.set_gain(0.0);
        }
    }

    /// Restore the gain saved by [`mute`](Self::mute)
    pub fn unmute(&mut self) {
        if let Some(gain) = self.muted_gain.take() {
            self.params.set_gain(gain);
        }
    }

    /// Flip the mute state, returning true when now muted
    pub fn toggle_mute(&mut self) -> bool {
        if self.is_muted() {
            self.unmute();
        } else {
            self.mute();
        }
        self.is_muted()
    }

    pub fn is_muted(&self) -> bool {
        self.muted_gain.is_some()
    }

    /// Playback speed ratio, clamped to [0.25, 4.0]
    pub fn set_speed(&self, ratio: f64) {
        self.params.set_speed(ratio);
        self.warn_if_step_capped(ratio);
    }

    pub fn speed(&self) -> f64 {
        self.params.speed()
    }

    pub fn set_loop_simple(&mut self, enabled: bool) -> ControlResult<()> {
        self.send(PlayerCommand::SetLoopSimple { enabled })
    }

    /// Mark the current playhead as loop start
    pub fn set_loop_point_a(&mut self) -> ControlResult<()> {
        self.send(PlayerCommand::MarkLoopA)
    }

    /// Mark the current playhead as loop end, activating A-B looping when valid
    pub fn set_loop_point_b(&mut self) -> ControlResult<()> {
        self.send(PlayerCommand::MarkLoopB)
    }

    /// Set an A-B loop directly; invalid regions are ignored by the engine
    pub fn set_loop_region(&mut self, start: f64, end: f64) -> ControlResult<()> {
        self.send(PlayerCommand::SetLoopRegion { start, end })
    }

    pub fn clear_loop(&mut self) -> ControlResult<()> {
        self.send(PlayerCommand::ClearLoop)
    }

    pub fn set_interpolation(&mut self, method: InterpolationMethod) -> ControlResult<()> {
        self.send(PlayerCommand::SetInterpolation { method })
    }

    pub fn position(&self) -> f64 {
        self.atomics.position()
    }

    pub fn length(&self) -> f64 {
        self.atomics.length()
    }

    pub fn is_playing(&self) -> bool {
        self.atomics.is_playing()
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.atomics.loop_mode()
    }

    /// Active loop bounds in seconds
    pub fn loop_bounds(&self) -> (f64, f64) {
        self.atomics.loop_bounds()
    }

    pub fn loop_marks(&self) -> (Option<f64>, Option<f64>) {
        self.atomics.loop_marks()
    }

    pub fn waveform_envelope(&self) -> EnvelopeState {
        self.waveform.state()
    }

    pub fn waveform(&self) -> &WaveformWorker {
        &self.waveform
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        self.atomics.snapshot()
    }

    /// True while a queued load has not reached the audio thread yet
    pub fn is_load_pending(&self) -> bool {
        self.atomics.generation() != self.requested_generation
    }

    /// Frames of silence substituted for audio while playing
    pub fn underrun_frames(&self) -> u64 {
        self.atomics.silence_frames()
    }

    /// Log any underrun frames since the last call and return how many
    pub fn report_underruns(&mut self) -> u64 {
        let total = self.underrun_frames();
        let new = total.saturating_sub(self.reported_underrun);
        if new > 0 {
            log::debug!("{} frames of silence substituted (total {})", new, total);
        }
        self.reported_underrun = total;
        new
    }
}

/// Create both players and the bus that mixes them
pub fn create_mixer(
    output_rate: u32,
    settings: &PlayerSettings,
    registry: Arc<DecoderRegistry>,
) -> (MixerControl, MixBus) {
    let (first, first_engine) = create_player(output_rate, settings, Arc::clone(&registry));
    let (second, second_engine) = create_player(output_rate, settings, registry);
    let bus = MixBus::new(first_engine, second_engine);
    let control = MixerControl {
        players: [first, second],
        params: bus.params(),
    };
    (control, bus)
}

/// Control surface of the two-player mix
pub struct MixerControl {
    players: [Player; 2],
    params: Arc<MixParams>,
}

impl MixerControl {
    pub fn player(&self, slot: PlayerSlot) -> &Player {
        &self.players[slot.index()]
    }

    pub fn player_mut(&mut self, slot: PlayerSlot) -> &mut Player {
        &mut self.players[slot.index()]
    }

    pub fn set_mixer_gain(&self, slot: PlayerSlot, gain: f32) {
        self.params.set_gain(slot, gain);
    }

    pub fn mixer_gain(&self, slot: PlayerSlot) -> f32 {
        self.params.gain(slot)
    }

    /// 0.0 is player one only, 1.0 player two only
    pub fn set_crossfade(&self, value: f32) {
        self.params.set_crossfade(value);
    }

    pub fn crossfade(&self) -> f32 {
        self.params.crossfade()
    }

    pub fn set_linked(&self, linked: bool) {
        self.params.set_linked(linked);
    }

    pub fn is_linked(&self) -> bool {
        self.params.is_linked()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StereoBuffer;

    fn player_with_queue(capacity: usize) -> (Player, PlayerEngine) {
        let settings = PlayerSettings {
            command_queue_capacity: capacity,
            waveform_points: 16,
            ..Default::default()
        };
        create_player(48000, &settings, Arc::new(DecoderRegistry::with_defaults()))
    }

    #[test]
    fn test_queue_overflow_is_reported() {
        let (mut player, mut engine) = player_with_queue(2);
        player.play().unwrap();
        player.stop().unwrap();
        assert!(matches!(player.play(), Err(ControlError::QueueFull)));

        let mut out = StereoBuffer::silence(64);
        engine.process(&mut out);
        assert!(player.play().is_ok());
    }

    #[test]
    fn test_missing_file_keeps_state() {
        let (mut player, mut engine) = player_with_queue(8);
        let result = player.load_source("/nonexistent/twindeck/track.wav");
        assert!(matches!(result, Err(ControlError::Load(LoadError::NotFound(_)))));
        assert!(!player.is_load_pending());
        assert_eq!(player.waveform_envelope(), EnvelopeState::Empty);

        let mut out = StereoBuffer::silence(64);
        engine.process(&mut out);
        assert_eq!(player.length(), 0.0);
    }

    #[test]
    fn test_scalar_params_bypass_queue() {
        let (mut player, engine) = player_with_queue(1);
        player.set_gain(0.3);
        player.set_speed(10.0);
        assert!((engine.params().gain() - 0.3).abs() < 1e-6);
        assert_eq!(player.speed(), 4.0);
    }

    #[test]
    fn test_mute_restores_previous_gain() {
        let (mut player, engine) = player_with_queue(4);
        player.set_gain(0.6);
        player.mute();
        player.mute();
        assert!(player.is_muted());
        assert_eq!(engine.params().gain(), 0.0);

        player.unmute();
        assert!(!player.is_muted());
        assert!((engine.params().gain() - 0.6).abs() < 1e-6);

        assert!(player.toggle_mute());
        player.set_gain(0.2);
        assert!(!player.is_muted());
        player.unmute();
        assert!((player.gain() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_capped_step_is_detected() {
        let (mut player, _engine) = player_with_queue(4);
        player.output_rate = 44100;
        assert!(!player.warn_if_step_capped(4.0));
        player.source_rate = 192000;
        assert!(!player.warn_if_step_capped(1.0));
        assert!(player.warn_if_step_capped(4.0));
    }

    #[test]
    fn test_underruns_are_reported_once() {
        let (mut player, mut engine) = player_with_queue(8);
        let source = crate::source::AudioSource::from_interleaved(vec![0.1; 1000], 1, 48000).unwrap();
        player
            .commands
            .push(PlayerCommand::Load {
                source: Shared::new(&gc_handle(), source),
                generation: 1,
            })
            .unwrap();
        player.play().unwrap();

        // 1000 frames of audio run out inside the first 1024-frame block
        let mut out = StereoBuffer::silence(1024);
        engine.process(&mut out);
        let first = player.report_underruns();
        assert!(first > 0);
        assert_eq!(player.report_underruns(), 0);

        // Playing again from the end is all silence
        player.play().unwrap();
        engine.process(&mut out);
        let total = player.underrun_frames();
        assert!(total >= first + 1000);
        assert_eq!(player.report_underruns(), total - first);
        assert_eq!(player.report_underruns(), 0);
    }

    #[test]
    fn test_mixer_control_writes_bus_params() {
        let registry = Arc::new(DecoderRegistry::with_defaults());
        let (mixer, bus) = create_mixer(48000, &PlayerSettings::default(), registry);
        mixer.set_mixer_gain(PlayerSlot::Two, 0.4);
        mixer.set_crossfade(0.75);
        assert!((bus.params().gain(PlayerSlot::Two) - 0.4).abs() < 1e-6);
        assert_eq!(bus.params().crossfade(), 0.75);

        mixer.set_linked(true);
        assert!(mixer.is_linked());
        assert!((mixer.mixer_gain(PlayerSlot::One) - 0.25).abs() < 1e-6);
    }
}

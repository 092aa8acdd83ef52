//! Audio-thread side of one player: transport, resampling, looping and gain
//!
//! `PlayerEngine` is owned exclusively by the audio callback. The control
//! thread talks to it through a command queue and [`PlayerParams`], and reads
//! its state back through [`PlayerAtomics`].

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use super::command::{PlayerCommand, COMMAND_QUEUE_CAPACITY};
use super::looping::{LoopAction, LoopController, LoopMode, DEFAULT_LOOP_EPSILON_SECS};
use super::params::PlayerParams;
use super::resampler::{InterpolationMethod, Resampler};
use super::transport::Transport;
use super::AudioRenderer;
use crate::types::StereoBuffer;

/// Marks not set are published as this value
const NO_MARK: u64 = u64::MAX;

/// Tunables for one player
#[derive(Debug, Clone)]
pub struct PlayerSettings {
    pub interpolation: InterpolationMethod,
    pub loop_epsilon_secs: f64,
    /// Initial player gain in [0, 1]
    pub gain: f32,
    pub command_queue_capacity: usize,
    /// Envelope resolution computed after each load
    pub waveform_points: usize,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            interpolation: InterpolationMethod::default(),
            loop_epsilon_secs: DEFAULT_LOOP_EPSILON_SECS,
            gain: 1.0,
            command_queue_capacity: COMMAND_QUEUE_CAPACITY,
            waveform_points: crate::waveform::DEFAULT_ENVELOPE_POINTS,
        }
    }
}

/// Lock-free snapshot of player state, written by the audio thread
///
/// All operations use `Ordering::Relaxed`: readers only need eventual
/// visibility, and a snapshot may mix values from two adjacent blocks.
pub struct PlayerAtomics {
    /// Audible playhead in source frames
    pub position: AtomicU64,
    pub length: AtomicU64,
    pub sample_rate: AtomicU32,
    /// 0 = Stopped, 1 = Playing
    pub state: AtomicU8,
    pub loop_mode: AtomicU8,
    pub loop_start: AtomicU64,
    pub loop_end: AtomicU64,
    pub mark_a: AtomicU64,
    pub mark_b: AtomicU64,
    /// Generation of the source currently loaded (0 = none yet)
    pub generation: AtomicU64,
    /// Silent frames substituted while playing
    pub silence_frames: AtomicU64,
}

impl PlayerAtomics {
    pub fn new() -> Self {
        Self {
            position: AtomicU64::new(0),
            length: AtomicU64::new(0),
            sample_rate: AtomicU32::new(0),
            state: AtomicU8::new(0),
            loop_mode: AtomicU8::new(LoopMode::None as u8),
            loop_start: AtomicU64::new(0),
            loop_end: AtomicU64::new(0),
            mark_a: AtomicU64::new(NO_MARK),
            mark_b: AtomicU64::new(NO_MARK),
            generation: AtomicU64::new(0),
            silence_frames: AtomicU64::new(0),
        }
    }

    fn secs(&self, frames: u64) -> f64 {
        match self.sample_rate.load(Ordering::Relaxed) {
            0 => 0.0,
            rate => frames as f64 / rate as f64,
        }
    }

    fn mark_secs(&self, mark: &AtomicU64) -> Option<f64> {
        match mark.load(Ordering::Relaxed) {
            NO_MARK => None,
            frames => Some(self.secs(frames)),
        }
    }

    /// Playhead in seconds
    #[inline]
    pub fn position(&self) -> f64 {
        self.secs(self.position.load(Ordering::Relaxed))
    }

    /// Source length in seconds
    #[inline]
    pub fn length(&self) -> f64 {
        self.secs(self.length.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.state.load(Ordering::Relaxed) == 1
    }

    #[inline]
    pub fn loop_mode(&self) -> LoopMode {
        LoopMode::from_u8(self.loop_mode.load(Ordering::Relaxed))
    }

    /// Active loop bounds in seconds (the whole file unless A-B)
    pub fn loop_bounds(&self) -> (f64, f64) {
        (
            self.secs(self.loop_start.load(Ordering::Relaxed)),
            self.secs(self.loop_end.load(Ordering::Relaxed)),
        )
    }

    /// Loop marks in seconds, `None` where not set
    pub fn loop_marks(&self) -> (Option<f64>, Option<f64>) {
        (self.mark_secs(&self.mark_a), self.mark_secs(&self.mark_b))
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn silence_frames(&self) -> u64 {
        self.silence_frames.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            position: self.position(),
            length: self.length(),
            playing: self.is_playing(),
            loop_mode: self.loop_mode(),
            loop_bounds: self.loop_bounds(),
            loop_marks: self.loop_marks(),
            generation: self.generation(),
        }
    }
}

impl Default for PlayerAtomics {
    fn default() -> Self {
        Self::new()
    }
}

/// Plain copy of the published state, for display
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub position: f64,
    pub length: f64,
    pub playing: bool,
    pub loop_mode: LoopMode,
    pub loop_bounds: (f64, f64),
    pub loop_marks: (Option<f64>, Option<f64>),
    pub generation: u64,
}

/// One player as seen from the audio thread
pub struct PlayerEngine {
    transport: Transport,
    resampler: Resampler,
    looping: LoopController,
    params: Arc<PlayerParams>,
    atomics: Arc<PlayerAtomics>,
    commands: rtrb::Consumer<PlayerCommand>,
    output_rate: u32,
    generation: u64,
}

impl PlayerEngine {
    pub fn new(
        output_rate: u32,
        settings: &PlayerSettings,
        commands: rtrb::Consumer<PlayerCommand>,
    ) -> Self {
        Self {
            transport: Transport::new(),
            resampler: Resampler::new(settings.interpolation),
            looping: LoopController::new(settings.loop_epsilon_secs),
            params: Arc::new(PlayerParams::new(settings.gain)),
            atomics: Arc::new(PlayerAtomics::new()),
            commands,
            output_rate,
            generation: 0,
        }
    }

    /// Parameter cells for the control thread
    pub fn params(&self) -> Arc<PlayerParams> {
        Arc::clone(&self.params)
    }

    /// Published state for the control thread
    pub fn atomics(&self) -> Arc<PlayerAtomics> {
        Arc::clone(&self.atomics)
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Apply every queued command
    pub fn process_commands(&mut self) {
        while let Ok(command) = self.commands.pop() {
            self.apply(command);
        }
    }

    fn apply(&mut self, command: PlayerCommand) {
        match command {
            PlayerCommand::Load { source, generation } => {
                self.resampler
                    .set_rate_correction(source.sample_rate(), self.output_rate);
                self.resampler.reset();
                self.looping.on_load(source.frames(), source.sample_rate());
                // The old handle is released on the GC thread
                drop(self.transport.load_source(source));
                self.generation = generation;
            }
            PlayerCommand::Unload => {
                drop(self.transport.unload());
                self.resampler.reset();
                self.looping.on_load(0, 0);
            }
            PlayerCommand::Play => self.transport.play(),
            PlayerCommand::Stop => self.transport.stop(),
            PlayerCommand::Seek { seconds } => {
                if let Some(frame) = self.transport.source().map(|s| s.secs_to_frames(seconds)) {
                    self.seek_frames(frame);
                }
            }
            PlayerCommand::SeekFraction { fraction } => {
                if fraction.is_finite() {
                    let length = self.transport.length_frames();
                    let frame = (fraction.clamp(0.0, 1.0) * length as f64).round() as usize;
                    self.seek_frames(frame);
                }
            }
            PlayerCommand::Skip { seconds } => {
                if let Some(rate) = self.transport.source().map(|s| s.sample_rate()) {
                    if seconds.is_finite() {
                        let length = self.transport.length_frames() as f64;
                        let target = (self.playhead() + seconds * rate as f64).clamp(0.0, length);
                        self.seek_frames(target.round() as usize);
                    }
                }
            }
            PlayerCommand::SetLoopSimple { enabled } => {
                self.looping.set_simple(enabled);
            }
            PlayerCommand::MarkLoopA => {
                if self.transport.has_source() {
                    self.looping.mark_a(self.playhead_frame());
                }
            }
            PlayerCommand::MarkLoopB => {
                if self.transport.has_source() {
                    self.looping.mark_b(self.playhead_frame());
                }
            }
            PlayerCommand::SetLoopRegion { start, end } => {
                self.looping.set_region_secs(start, end);
            }
            PlayerCommand::ClearLoop => self.looping.clear(),
            PlayerCommand::SetInterpolation { method } => self.resampler.set_method(method),
        }
    }

    /// Audible playhead in source frames
    ///
    /// The transport cursor runs ahead of what has been heard by the
    /// resampler's lookahead.
    pub fn playhead(&self) -> f64 {
        let length = self.transport.length_frames() as f64;
        (self.transport.position_frames() as f64 - self.resampler.lookahead()).clamp(0.0, length)
    }

    fn playhead_frame(&self) -> usize {
        self.playhead().round() as usize
    }

    /// Move the playhead; seeking to where it already is does nothing
    fn seek_frames(&mut self, frame: usize) {
        let target = frame.min(self.transport.length_frames());
        if target == self.playhead_frame() {
            return;
        }
        self.transport.seek_frames(target);
        self.resampler.reset();
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Render one block
    ///
    /// Commands are applied first, then parameters are read once, audio is
    /// produced, the loop check runs, and the snapshot is published.
    pub fn process(&mut self, out: &mut StereoBuffer) {
        self.process_commands();

        self.resampler.set_ratio(self.params.speed());
        let gain = self.params.gain();
        let was_playing = self.transport.is_playing();

        self.resampler.process(&mut self.transport, out.as_mut_slice());

        let ended = self.transport.ended_this_block();
        if let LoopAction::Wrap { to, resume } =
            self.looping.check(self.playhead(), was_playing, ended)
        {
            self.transport.seek_frames(to);
            self.resampler.reset();
            if resume {
                self.transport.resume_after_end();
            }
        }

        if gain != 1.0 {
            out.scale(gain);
        }

        self.sync_atomics();
    }

    fn sync_atomics(&self) {
        let atomics = &self.atomics;
        let rate = self.transport.source().map(|s| s.sample_rate()).unwrap_or(0);
        let (loop_start, loop_end) = self.looping.bounds();
        let (mark_a, mark_b) = self.looping.marks();

        atomics.sample_rate.store(rate, Ordering::Relaxed);
        atomics
            .position
            .store(self.playhead_frame() as u64, Ordering::Relaxed);
        atomics
            .length
            .store(self.transport.length_frames() as u64, Ordering::Relaxed);
        atomics
            .state
            .store(self.transport.is_playing() as u8, Ordering::Relaxed);
        atomics
            .loop_mode
            .store(self.looping.mode() as u8, Ordering::Relaxed);
        atomics.loop_start.store(loop_start as u64, Ordering::Relaxed);
        atomics.loop_end.store(loop_end as u64, Ordering::Relaxed);
        atomics
            .mark_a
            .store(mark_a.map_or(NO_MARK, |m| m as u64), Ordering::Relaxed);
        atomics
            .mark_b
            .store(mark_b.map_or(NO_MARK, |m| m as u64), Ordering::Relaxed);
        atomics.generation.store(self.generation, Ordering::Relaxed);
        atomics
            .silence_frames
            .store(self.transport.silence_filled_frames(), Ordering::Relaxed);
    }
}

impl AudioRenderer for PlayerEngine {
    fn render(&mut self, out: &mut StereoBuffer) {
        self.process(out);
    }
}

//! Play/stop state and read cursor over one decoded source
//!
//! The transport is audio-thread state. It knows nothing about speed: the
//! [`Resampler`](super::Resampler) pulls as many frames as it needs at
//! whatever rate it runs.

use basedrop::Shared;

use crate::source::AudioSource;
use crate::types::{PlayState, StereoSample};

/// Cursor and state over an optional source
#[derive(Default)]
pub struct Transport {
    source: Option<Shared<AudioSource>>,
    state: PlayState,
    /// Next frame to be read
    position: usize,
    /// Set when the last `produce_block` ran into the end of the source
    ended_this_block: bool,
    /// Silent frames substituted while playing, since creation
    silence_filled: u64,
}

impl Transport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current source
    ///
    /// Position returns to 0 and the transport stops. The previous source is
    /// handed back so the caller decides where it is dropped.
    pub fn load_source(&mut self, source: Shared<AudioSource>) -> Option<Shared<AudioSource>> {
        self.state = PlayState::Stopped;
        self.position = 0;
        self.ended_this_block = false;
        self.source.replace(source)
    }

    /// Remove the current source, leaving the transport empty and stopped
    pub fn unload(&mut self) -> Option<Shared<AudioSource>> {
        self.state = PlayState::Stopped;
        self.position = 0;
        self.ended_this_block = false;
        self.source.take()
    }

    #[inline]
    pub fn source(&self) -> Option<&AudioSource> {
        self.source.as_deref()
    }

    #[inline]
    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    /// Start playing from the current position (no-op without a source)
    pub fn play(&mut self) {
        if self.source.is_some() {
            self.state = PlayState::Playing;
        }
    }

    /// Stop without moving the position
    pub fn stop(&mut self) {
        self.state = PlayState::Stopped;
    }

    #[inline]
    pub fn state(&self) -> PlayState {
        self.state
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.state == PlayState::Playing
    }

    /// Move the read cursor, clamped to [0, length]
    ///
    /// Returns false when the cursor was already there.
    pub fn seek_frames(&mut self, frame: usize) -> bool {
        let target = frame.min(self.length_frames());
        if target == self.position {
            return false;
        }
        self.position = target;
        true
    }

    /// Seek in seconds; negative and non-finite targets go to 0
    pub fn seek(&mut self, seconds: f64) -> bool {
        match self.source() {
            Some(source) => {
                let frame = source.secs_to_frames(seconds);
                self.seek_frames(frame)
            }
            None => false,
        }
    }

    /// Read cursor in frames
    #[inline]
    pub fn position_frames(&self) -> usize {
        self.position
    }

    /// Read cursor in seconds
    pub fn position(&self) -> f64 {
        self.source()
            .map(|s| s.frames_to_secs(self.position))
            .unwrap_or(0.0)
    }

    #[inline]
    pub fn length_frames(&self) -> usize {
        self.source().map(AudioSource::frames).unwrap_or(0)
    }

    pub fn length(&self) -> f64 {
        self.source().map(AudioSource::duration_secs).unwrap_or(0.0)
    }

    /// Whether the last produced block hit the end of the source and stopped
    #[inline]
    pub fn ended_this_block(&self) -> bool {
        self.ended_this_block
    }

    /// Frames of silence handed out in place of audio while playing
    #[inline]
    pub fn silence_filled_frames(&self) -> u64 {
        self.silence_filled
    }

    /// Put the transport back into Playing after an end-of-source stop
    pub(crate) fn resume_after_end(&mut self) {
        if self.ended_this_block {
            self.state = PlayState::Playing;
            self.ended_this_block = false;
        }
    }

    /// Clear the per-block end flag; called once before a block is pulled
    pub fn begin_block(&mut self) {
        self.ended_this_block = false;
    }

    /// Fill `out` with the next frames and advance
    ///
    /// Stopped or empty transports produce silence and stay put. Frames past
    /// the end are zero-filled; reaching the end stops the transport. Returns
    /// the number of real frames read.
    pub fn produce_block(&mut self, out: &mut [StereoSample]) -> usize {
        let source = match (&self.source, self.state) {
            (Some(source), PlayState::Playing) => source,
            _ => {
                out.fill(StereoSample::silence());
                return 0;
            }
        };

        let read = source.read_frames(self.position, out);
        self.position += read;
        self.silence_filled += (out.len() - read) as u64;

        if self.position >= source.frames() {
            self.state = PlayState::Stopped;
            self.ended_this_block = true;
        }

        read
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::gc::gc_handle;

    fn ramp_source(frames: usize, sample_rate: u32) -> Shared<AudioSource> {
        let samples = (0..frames).flat_map(|i| [i as f32, -(i as f32)]).collect();
        let source = AudioSource::from_interleaved(samples, 2, sample_rate).unwrap();
        Shared::new(&gc_handle(), source)
    }

    #[test]
    fn test_empty_transport_is_silent() {
        let mut transport = Transport::new();
        transport.play();
        assert!(!transport.is_playing());

        let mut out = [StereoSample::mono(1.0); 8];
        assert_eq!(transport.produce_block(&mut out), 0);
        assert!(out.iter().all(|s| *s == StereoSample::silence()));
        assert_eq!(transport.position(), 0.0);
        assert_eq!(transport.length(), 0.0);
    }

    #[test]
    fn test_stopped_transport_does_not_advance() {
        let mut transport = Transport::new();
        transport.load_source(ramp_source(100, 100));

        let mut out = [StereoSample::mono(1.0); 10];
        transport.produce_block(&mut out);
        assert_eq!(transport.position_frames(), 0);
        assert!(out.iter().all(|s| *s == StereoSample::silence()));
    }

    #[test]
    fn test_playing_reads_and_advances() {
        let mut transport = Transport::new();
        transport.load_source(ramp_source(100, 100));
        transport.play();

        let mut out = [StereoSample::silence(); 10];
        assert_eq!(transport.produce_block(&mut out), 10);
        assert_eq!(out[3], StereoSample::new(3.0, -3.0));
        assert_eq!(transport.position_frames(), 10);
        assert!((transport.position() - 0.1).abs() < 1e-12);

        // Stop keeps position, play resumes from it
        transport.stop();
        transport.produce_block(&mut out);
        assert_eq!(transport.position_frames(), 10);
        transport.play();
        transport.produce_block(&mut out);
        assert_eq!(out[0], StereoSample::new(10.0, -10.0));
    }

    #[test]
    fn test_end_of_source_zero_fills_and_stops() {
        let mut transport = Transport::new();
        transport.load_source(ramp_source(15, 100));
        transport.play();

        let mut out = [StereoSample::mono(7.0); 10];
        transport.begin_block();
        transport.produce_block(&mut out);
        assert!(!transport.ended_this_block());

        assert_eq!(transport.produce_block(&mut out), 5);
        assert_eq!(out[4], StereoSample::new(14.0, -14.0));
        assert!(out[5..].iter().all(|s| *s == StereoSample::silence()));
        assert!(transport.ended_this_block());
        assert!(!transport.is_playing());
        assert_eq!(transport.position_frames(), 15);
        assert_eq!(transport.silence_filled_frames(), 5);

        // The flag holds until the next block starts
        transport.produce_block(&mut out);
        assert!(transport.ended_this_block());

        transport.resume_after_end();
        assert!(transport.is_playing());
        transport.begin_block();
        assert!(!transport.ended_this_block());
    }

    #[test]
    fn test_seek_clamps_and_reports_movement() {
        let mut transport = Transport::new();
        transport.load_source(ramp_source(100, 100));

        assert!(transport.seek(0.5));
        assert_eq!(transport.position_frames(), 50);
        assert!(!transport.seek(0.5));

        transport.seek(10.0);
        assert_eq!(transport.position_frames(), 100);
        transport.seek(-1.0);
        assert_eq!(transport.position_frames(), 0);
        assert!(!transport.seek(f64::NAN));
    }

    #[test]
    fn test_load_resets_state() {
        let mut transport = Transport::new();
        assert!(transport.load_source(ramp_source(100, 100)).is_none());
        transport.play();
        transport.seek(0.3);

        let previous = transport.load_source(ramp_source(50, 100));
        assert_eq!(previous.map(|s| s.frames()), Some(100));
        assert_eq!(transport.position_frames(), 0);
        assert!(!transport.is_playing());
        assert_eq!(transport.length_frames(), 50);
    }
}

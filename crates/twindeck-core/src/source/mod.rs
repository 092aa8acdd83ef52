//! Decoded audio sources
//!
//! An [`AudioSource`] is a fully decoded file held in memory as interleaved
//! `f32` frames. Sources are produced by a [`SourceDecoder`] (usually through a
//! [`DecoderRegistry`]) on the control thread, then handed to the audio thread
//! wrapped in a `basedrop::Shared` so the audio thread never frees them.

mod decoder;

pub use decoder::{DecoderRegistry, SourceDecoder, SymphoniaDecoder};

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::types::{Sample, StereoSample};

/// Errors raised while opening or decoding a source
///
/// A failed load never touches the engine: whatever was playing keeps playing.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("No audio track found in {0}")]
    NoAudioTrack(PathBuf),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid stream parameters: {0}")]
    InvalidFormat(String),

    #[error("File contains no audio frames: {0}")]
    Empty(PathBuf),
}

/// Result type for source loading
pub type LoadResult<T> = Result<T, LoadError>;

/// A decoded, in-memory audio source
#[derive(Debug, Clone)]
pub struct AudioSource {
    path: Option<PathBuf>,
    sample_rate: u32,
    channels: u16,
    frames: usize,
    samples: Vec<Sample>,
}

impl AudioSource {
    /// Build a source from interleaved samples
    ///
    /// Trailing samples that do not form a whole frame are dropped.
    pub fn from_interleaved(
        mut samples: Vec<Sample>,
        channels: u16,
        sample_rate: u32,
    ) -> LoadResult<Self> {
        if channels == 0 {
            return Err(LoadError::InvalidFormat("channel count is 0".to_string()));
        }
        if sample_rate == 0 {
            return Err(LoadError::InvalidFormat("sample rate is 0".to_string()));
        }

        let frames = samples.len() / channels as usize;
        samples.truncate(frames * channels as usize);

        Ok(Self {
            path: None,
            sample_rate,
            channels,
            frames,
            samples,
        })
    }

    /// Attach the file path this source was decoded from
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Total length in frames
    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Total length in seconds
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }

    /// Convert seconds to a frame index, clamped to [0, frames]
    #[inline]
    pub fn secs_to_frames(&self, seconds: f64) -> usize {
        if !seconds.is_finite() || seconds <= 0.0 {
            return 0;
        }
        ((seconds * self.sample_rate as f64).round() as usize).min(self.frames)
    }

    #[inline]
    pub fn frames_to_secs(&self, frames: usize) -> f64 {
        frames as f64 / self.sample_rate as f64
    }

    /// Random-access read of one frame as stereo
    ///
    /// Mono is duplicated to both sides, sources with more than two channels
    /// contribute their first two. Reads past the end return silence.
    #[inline]
    pub fn frame(&self, index: usize) -> StereoSample {
        if index >= self.frames {
            return StereoSample::silence();
        }
        let base = index * self.channels as usize;
        if self.channels == 1 {
            StereoSample::mono(self.samples[base])
        } else {
            StereoSample::new(self.samples[base], self.samples[base + 1])
        }
    }

    /// Copy frames starting at `start` into `out`, returning how many were real
    ///
    /// Slots past the end of the source are zero-filled.
    pub fn read_frames(&self, start: usize, out: &mut [StereoSample]) -> usize {
        let available = self.frames.saturating_sub(start).min(out.len());
        for (i, slot) in out.iter_mut().enumerate().take(available) {
            *slot = self.frame(start + i);
        }
        for slot in out.iter_mut().skip(available) {
            *slot = StereoSample::silence();
        }
        available
    }

    /// Interleaved samples of one channel window, used by envelope extraction
    pub(crate) fn interleaved(&self) -> &[Sample] {
        &self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_interleaved_drops_partial_frame() {
        let source = AudioSource::from_interleaved(vec![0.1, 0.2, 0.3, 0.4, 0.5], 2, 48000).unwrap();
        assert_eq!(source.frames(), 2);
        assert_eq!(source.frame(1), StereoSample::new(0.3, 0.4));
    }

    #[test]
    fn test_rejects_zero_channels_or_rate() {
        assert!(matches!(
            AudioSource::from_interleaved(vec![0.0; 4], 0, 48000),
            Err(LoadError::InvalidFormat(_))
        ));
        assert!(matches!(
            AudioSource::from_interleaved(vec![0.0; 4], 2, 0),
            Err(LoadError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_mono_is_duplicated() {
        let source = AudioSource::from_interleaved(vec![0.25, -0.5], 1, 44100).unwrap();
        assert_eq!(source.frame(0), StereoSample::mono(0.25));
        assert_eq!(source.frame(1), StereoSample::mono(-0.5));
    }

    #[test]
    fn test_multichannel_uses_first_pair() {
        let source = AudioSource::from_interleaved(vec![1.0, 2.0, 3.0, 4.0], 4, 48000).unwrap();
        assert_eq!(source.frames(), 1);
        assert_eq!(source.frame(0), StereoSample::new(1.0, 2.0));
    }

    #[test]
    fn test_read_past_end_is_silent() {
        let source = AudioSource::from_interleaved(vec![0.5; 6], 2, 48000).unwrap();
        let mut out = [StereoSample::mono(9.0); 5];
        let real = source.read_frames(1, &mut out);
        assert_eq!(real, 2);
        assert_eq!(out[1], StereoSample::mono(0.5));
        assert_eq!(out[2], StereoSample::silence());
        assert_eq!(out[4], StereoSample::silence());
        assert_eq!(source.frame(100), StereoSample::silence());
    }

    #[test]
    fn test_time_conversion_clamps() {
        let source = AudioSource::from_interleaved(vec![0.0; 2 * 48000], 2, 48000).unwrap();
        assert_eq!(source.duration_secs(), 1.0);
        assert_eq!(source.secs_to_frames(0.5), 24000);
        assert_eq!(source.secs_to_frames(-1.0), 0);
        assert_eq!(source.secs_to_frames(5.0), 48000);
        assert_eq!(source.secs_to_frames(f64::NAN), 0);
    }
}

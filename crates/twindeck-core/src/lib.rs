//! Twindeck Core - real-time two-player audio engine
//!
//! Decoded sources are played through a variable-speed resampler with
//! simple and A-B looping, mixed by a gain/crossfade bus, and rendered into
//! a CPAL output stream or a WAV file. Control happens from any non-real-time
//! thread through [`control::Player`] and [`control::MixerControl`].

pub mod audio;
pub mod config;
pub mod control;
pub mod engine;
pub mod source;
pub mod types;
pub mod waveform;

pub use types::*;

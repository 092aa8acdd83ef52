//! Audio output for twindeck
//!
//! The engine never talks to a device directly. Anything implementing
//! [`AudioRenderer`](crate::engine::AudioRenderer) can be driven either by a
//! CPAL output stream or offline into a WAV file:
//!
//! ```ignore
//! use twindeck_core::audio::{start_audio_system, AudioConfig};
//!
//! let handle = start_audio_system(&AudioConfig::default(), |rate| {
//!     let (mixer, bus) = create_mixer(rate, &settings, registry.clone());
//!     controls.send(mixer).ok();
//!     bus
//! })?;
//! ```

mod config;
mod cpal_backend;
mod device;
mod error;
mod offline;
mod render;

pub use config::{AudioConfig, BufferSize, DeviceId, DEFAULT_BUFFER_SIZE, DEFAULT_SAMPLE_RATE, MAX_BUFFER_SIZE};
pub use cpal_backend::{start_audio_system, AudioHandle};
pub use device::{list_output_devices, OutputDevice};
pub use error::{AudioError, AudioResult};
pub use offline::render_to_wav;
pub use render::render_interleaved;

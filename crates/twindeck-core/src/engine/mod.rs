//! Audio engine - players, resampling, looping and the mix bus
//!
//! Everything in here except the control-side handles runs on the audio
//! thread and must not allocate, lock or block:
//! - Transport: play/stop state and read cursor over a decoded source
//! - Resampler: variable-speed interpolation between transport and output
//! - LoopController: simple and A-B loop policy
//! - PlayerEngine: one player, fed by a command queue
//! - MixBus: gain and crossfade over two players

mod command;
mod gc;
mod looping;
mod mixbus;
mod params;
mod player;
mod resampler;
mod transport;

pub use command::*;
pub use gc::*;
pub use looping::*;
pub use mixbus::*;
pub use params::*;
pub use player::*;
pub use resampler::*;
pub use transport::*;

use crate::types::StereoBuffer;

/// Something that fills stereo blocks on the audio thread
///
/// Implementors must be real-time safe for the duration of `render`.
pub trait AudioRenderer: Send {
    /// Overwrite `out` with the next `out.len()` frames
    fn render(&mut self, out: &mut StereoBuffer);
}

impl<R: AudioRenderer + ?Sized> AudioRenderer for Box<R> {
    fn render(&mut self, out: &mut StereoBuffer) {
        (**self).render(out);
    }
}

//! Discrete requests from the control thread to one player's audio side
//!
//! Scalar parameters (gain, speed, mixer gains, crossfade) travel through
//! atomics instead; everything here changes state that must be applied
//! exactly once, at a block boundary. The queue is an `rtrb` SPSC ring
//! buffer, so neither side ever blocks.

use basedrop::Shared;

use super::resampler::InterpolationMethod;
use crate::source::AudioSource;

/// Default number of commands the queue holds before `push` fails
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

/// Commands applied by a [`PlayerEngine`](super::PlayerEngine) at the start
/// of its next block
pub enum PlayerCommand {
    /// Swap in a decoded source; the previous one is released on the GC thread
    Load {
        source: Shared<AudioSource>,
        generation: u64,
    },
    /// Drop the current source and return to the empty state
    Unload,

    Play,
    Stop,
    /// Seek to a time in seconds (clamped to the source length)
    Seek { seconds: f64 },
    /// Seek to a fraction of the source length (0.0 = start, 1.0 = end)
    SeekFraction { fraction: f64 },
    /// Move the playhead by a signed number of seconds (clamped to the source)
    Skip { seconds: f64 },

    /// Enable or disable whole-file looping
    SetLoopSimple { enabled: bool },
    /// Capture the current playhead as loop point A
    MarkLoopA,
    /// Capture the current playhead as loop point B
    MarkLoopB,
    /// Set both A-B loop points explicitly (seconds)
    SetLoopRegion { start: f64, end: f64 },
    ClearLoop,

    SetInterpolation { method: InterpolationMethod },
}

impl std::fmt::Debug for PlayerCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerCommand::Load { source, generation } => f
                .debug_struct("Load")
                .field("frames", &source.frames())
                .field("generation", generation)
                .finish(),
            PlayerCommand::Unload => write!(f, "Unload"),
            PlayerCommand::Play => write!(f, "Play"),
            PlayerCommand::Stop => write!(f, "Stop"),
            PlayerCommand::Seek { seconds } => write!(f, "Seek({:.3}s)", seconds),
            PlayerCommand::SeekFraction { fraction } => write!(f, "SeekFraction({:.3})", fraction),
            PlayerCommand::Skip { seconds } => write!(f, "Skip({:+.3}s)", seconds),
            PlayerCommand::SetLoopSimple { enabled } => write!(f, "SetLoopSimple({})", enabled),
            PlayerCommand::MarkLoopA => write!(f, "MarkLoopA"),
            PlayerCommand::MarkLoopB => write!(f, "MarkLoopB"),
            PlayerCommand::SetLoopRegion { start, end } => {
                write!(f, "SetLoopRegion({:.3}s..{:.3}s)", start, end)
            }
            PlayerCommand::ClearLoop => write!(f, "ClearLoop"),
            PlayerCommand::SetInterpolation { method } => write!(f, "SetInterpolation({:?})", method),
        }
    }
}

/// Create a bounded command channel
///
/// The producer belongs to the control thread, the consumer to the audio
/// thread.
pub fn command_channel(
    capacity: usize,
) -> (rtrb::Producer<PlayerCommand>, rtrb::Consumer<PlayerCommand>) {
    rtrb::RingBuffer::new(capacity.max(1))
}

//! Block rendering into interleaved device buffers

use crate::engine::AudioRenderer;
use crate::types::StereoBuffer;

use super::config::MAX_BUFFER_SIZE;

/// Fill an interleaved `out` buffer with `channels` channels from `renderer`
///
/// Requests larger than the scratch block are rendered in several chunks.
/// Mono outputs receive `(l + r) / 2`; channels past the second are zeroed.
/// `block` must have capacity for at least one frame, normally
/// [`MAX_BUFFER_SIZE`].
pub fn render_interleaved<R: AudioRenderer + ?Sized>(
    renderer: &mut R,
    block: &mut StereoBuffer,
    out: &mut [f32],
    channels: usize,
) {
    if channels == 0 {
        return;
    }
    let chunk_frames = block.capacity().min(MAX_BUFFER_SIZE).max(1);

    for chunk in out.chunks_mut(chunk_frames * channels) {
        let frames = chunk.len() / channels;
        block.set_len_from_capacity(frames);
        renderer.render(block);

        for (frame, sample) in chunk.chunks_exact_mut(channels).zip(block.iter()) {
            if channels == 1 {
                frame[0] = sample.downmix();
                continue;
            }
            frame[0] = sample.left;
            frame[1] = sample.right;
            for ch in frame.iter_mut().skip(2) {
                *ch = 0.0;
            }
        }
        // Trailing partial frame, if the host handed us one
        let whole = frames * channels;
        chunk[whole..].fill(0.0);
    }
}

//! Faster-than-real-time rendering to a WAV file
//!
//! Drives any [`AudioRenderer`] with fixed-size blocks on the calling thread,
//! exactly as the output callback would, and writes 32-bit float stereo.

use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

use super::error::{AudioError, AudioResult};
use crate::engine::AudioRenderer;
use crate::types::StereoBuffer;

/// Render `frames` stereo frames at `sample_rate` into `path`
///
/// `before_block` runs ahead of every block with the number of frames
/// rendered so far; callers use it to issue timed commands.
pub fn render_to_wav<R, F>(
    renderer: &mut R,
    path: &Path,
    sample_rate: u32,
    frames: usize,
    block_size: usize,
    mut before_block: F,
) -> AudioResult<()>
where
    R: AudioRenderer + ?Sized,
    F: FnMut(usize),
{
    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let wrap = |source: hound::Error| AudioError::Render {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = WavWriter::create(path, spec).map_err(wrap)?;
    let block_size = block_size.clamp(1, super::MAX_BUFFER_SIZE);
    let mut block = StereoBuffer::silence(block_size);

    let mut done = 0;
    while done < frames {
        let n = block_size.min(frames - done);
        before_block(done);
        block.set_len_from_capacity(n);
        renderer.render(&mut block);
        for sample in block.iter() {
            writer.write_sample(sample.left).map_err(wrap)?;
            writer.write_sample(sample.right).map_err(wrap)?;
        }
        done += n;
    }

    writer.finalize().map_err(wrap)?;
    log::info!("Rendered {} frames to {}", frames, path.display());
    Ok(())
}

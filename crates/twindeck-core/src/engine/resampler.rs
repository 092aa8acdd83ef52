//! Variable-speed playback by naive resampling
//!
//! Produces `n` output frames from roughly `ratio * n` frames pulled from the
//! [`Transport`]. There is no pitch correction: 2.0 plays twice as fast and an
//! octave up.
//!
//! The stage keeps a small window of already pulled frames (`work`) with a
//! fractional read position into it. Interpolation needs one frame behind and
//! two frames ahead of the read position, so a block pulls just enough new
//! frames to cover its last output frame and then slides the window down,
//! keeping the tail as history for the next block.

use serde::{Deserialize, Serialize};

use super::transport::Transport;
use crate::types::StereoSample;

pub const MIN_SPEED_RATIO: f64 = 0.25;
pub const MAX_SPEED_RATIO: f64 = 4.0;

/// Upper bound for speed times sample-rate correction
pub const MAX_STEP: f64 = 16.0;

/// Output frames rendered per inner pass; bounds the work window
const CHUNK_FRAMES: usize = 1024;

/// Frames kept around the read position for 4-point interpolation
const INTERP_MARGIN: usize = 4;

/// Interpolation method for variable-speed playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMethod {
    /// 2-point linear
    Linear,
    /// 4-point Catmull-Rom
    #[default]
    Cubic,
}

/// Clamp a requested speed ratio into the supported range
///
/// Non-finite requests fall back to normal speed.
#[inline]
pub fn clamp_speed(ratio: f64) -> f64 {
    if ratio.is_finite() {
        ratio.clamp(MIN_SPEED_RATIO, MAX_SPEED_RATIO)
    } else {
        1.0
    }
}

/// Source frames per output frame for a speed ratio and a pair of rates
///
/// Rates of 0 count as equal. The result is not capped at [`MAX_STEP`].
pub fn requested_step(ratio: f64, source_rate: u32, output_rate: u32) -> f64 {
    let correction = if source_rate == 0 || output_rate == 0 {
        1.0
    } else {
        source_rate as f64 / output_rate as f64
    };
    clamp_speed(ratio) * correction
}

#[inline]
fn lerp_sample(s0: StereoSample, s1: StereoSample, t: f32) -> StereoSample {
    StereoSample {
        left: s0.left + (s1.left - s0.left) * t,
        right: s0.right + (s1.right - s0.right) * t,
    }
}

/// Catmull-Rom spline through s1..s2 (tension 0.5)
#[inline]
fn cubic_interpolate(
    s0: StereoSample,
    s1: StereoSample,
    s2: StereoSample,
    s3: StereoSample,
    t: f32,
) -> StereoSample {
    let t2 = t * t;
    let t3 = t2 * t;

    let c0 = -0.5 * t3 + t2 - 0.5 * t;
    let c1 = 1.5 * t3 - 2.5 * t2 + 1.0;
    let c2 = -1.5 * t3 + 2.0 * t2 + 0.5 * t;
    let c3 = 0.5 * t3 - 0.5 * t2;

    StereoSample {
        left: s0.left * c0 + s1.left * c1 + s2.left * c2 + s3.left * c3,
        right: s0.right * c0 + s1.right * c1 + s2.right * c2 + s3.right * c3,
    }
}

/// Resampling stage for one player
pub struct Resampler {
    method: InterpolationMethod,
    /// Ratio requested for the next block
    next_ratio: f64,
    /// Ratio latched at the start of the current block
    ratio: f64,
    /// source_rate / output_rate of the loaded source
    rate_correction: f64,
    /// Pre-allocated window of pulled frames; only `work[..work_len]` is live
    work: Vec<StereoSample>,
    work_len: usize,
    /// Fractional index into `work`, always >= 1.0
    read_pos: f64,
}

impl Resampler {
    pub fn new(method: InterpolationMethod) -> Self {
        let capacity = (CHUNK_FRAMES as f64 * MAX_STEP).ceil() as usize + 2 * INTERP_MARGIN;
        let mut resampler = Self {
            method,
            next_ratio: 1.0,
            ratio: 1.0,
            rate_correction: 1.0,
            work: vec![StereoSample::silence(); capacity],
            work_len: 0,
            read_pos: 0.0,
        };
        resampler.reset();
        resampler
    }

    /// Drop interpolation history (after a load or a seek that moved)
    pub fn reset(&mut self) {
        self.work[0] = StereoSample::silence();
        self.work_len = 1;
        self.read_pos = 1.0;
    }

    /// Request a speed ratio for the next block (clamped)
    pub fn set_ratio(&mut self, ratio: f64) {
        self.next_ratio = clamp_speed(ratio);
    }

    /// Ratio in effect for the current block
    #[inline]
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    pub fn set_method(&mut self, method: InterpolationMethod) {
        self.method = method;
    }

    #[inline]
    pub fn method(&self) -> InterpolationMethod {
        self.method
    }

    /// Account for a source whose rate differs from the output rate
    pub fn set_rate_correction(&mut self, source_rate: u32, output_rate: u32) {
        self.rate_correction = requested_step(1.0, source_rate, output_rate);
    }

    /// Source frames consumed per output frame for the current block
    #[inline]
    pub fn step(&self) -> f64 {
        (self.ratio * self.rate_correction).min(MAX_STEP)
    }

    /// Frames pulled from the transport but not yet played
    ///
    /// The audible playhead is the transport cursor minus this. Above a step
    /// of 2 the read position can run past the pulled window, making this
    /// negative until the next block pulls the skipped frames.
    #[inline]
    pub fn lookahead(&self) -> f64 {
        self.work_len as f64 - self.read_pos
    }

    /// Fill `out` from the transport at the latched ratio
    ///
    /// A stopped transport yields silence and the stage keeps its history,
    /// so stop/play does not click.
    pub fn process(&mut self, transport: &mut Transport, out: &mut [StereoSample]) {
        self.ratio = self.next_ratio;
        transport.begin_block();

        if !transport.is_playing() {
            out.fill(StereoSample::silence());
            return;
        }

        let step = self.step();
        for chunk in out.chunks_mut(CHUNK_FRAMES) {
            self.process_chunk(transport, chunk, step);
        }
    }

    fn process_chunk(&mut self, transport: &mut Transport, out: &mut [StereoSample], step: f64) {
        let n = out.len();
        if n == 0 {
            return;
        }

        // Highest index the last output frame touches is floor(t_last) + 2
        let t_last = self.read_pos + (n - 1) as f64 * step;
        let needed = t_last.floor() as usize + 3;
        if needed > self.work_len {
            let end = needed.min(self.work.len());
            transport.produce_block(&mut self.work[self.work_len..end]);
            self.work_len = end;
        }

        for (i, slot) in out.iter_mut().enumerate() {
            let t = self.read_pos + i as f64 * step;
            let idx = t.floor() as usize;
            let frac = (t - idx as f64) as f32;
            *slot = match self.method {
                InterpolationMethod::Linear => lerp_sample(self.at(idx), self.at(idx + 1), frac),
                InterpolationMethod::Cubic => cubic_interpolate(
                    self.at(idx - 1),
                    self.at(idx),
                    self.at(idx + 1),
                    self.at(idx + 2),
                    frac,
                ),
            };
        }

        // Slide the window so the frame before the read position sits at 0
        let next_pos = self.read_pos + n as f64 * step;
        let drop = (next_pos.floor() as usize).saturating_sub(1).min(self.work_len);
        self.work.copy_within(drop..self.work_len, 0);
        self.work_len -= drop;
        self.read_pos = next_pos - drop as f64;
    }

    #[inline]
    fn at(&self, index: usize) -> StereoSample {
        if index < self.work_len {
            self.work[index]
        } else {
            StereoSample::silence()
        }
    }
}

impl Default for Resampler {
    fn default() -> Self {
        Self::new(InterpolationMethod::default())
    }
}

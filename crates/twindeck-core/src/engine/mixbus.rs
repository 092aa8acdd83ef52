//! Two-player mix bus
//!
//! Each player renders its own block; the bus only weights and sums them.
//! Gains are read once per block from [`MixParams`] and no clipping is applied.

use std::sync::Arc;

use super::params::MixParams;
use super::player::PlayerEngine;
use super::AudioRenderer;
use crate::audio::MAX_BUFFER_SIZE;
use crate::types::{PlayerSlot, StereoBuffer};

pub struct MixBus {
    players: [PlayerEngine; 2],
    params: Arc<MixParams>,
    /// Pre-allocated block for the second player
    scratch: StereoBuffer,
}

impl MixBus {
    pub fn new(first: PlayerEngine, second: PlayerEngine) -> Self {
        Self {
            players: [first, second],
            params: Arc::new(MixParams::new()),
            scratch: StereoBuffer::silence(MAX_BUFFER_SIZE),
        }
    }

    /// Mixer parameter cells for the control thread
    pub fn params(&self) -> Arc<MixParams> {
        Arc::clone(&self.params)
    }

    pub fn player(&self, slot: PlayerSlot) -> &PlayerEngine {
        &self.players[slot.index()]
    }

    pub fn player_mut(&mut self, slot: PlayerSlot) -> &mut PlayerEngine {
        &mut self.players[slot.index()]
    }

    /// Render both players and mix them into `out`
    ///
    /// `out.len()` must not exceed [`MAX_BUFFER_SIZE`].
    pub fn process(&mut self, out: &mut StereoBuffer) {
        let (eff1, eff2) = self.params.effective_gains();

        self.scratch.set_len_from_capacity(out.len());
        let [first, second] = &mut self.players;
        first.process(out);
        second.process(&mut self.scratch);

        for (dst, src) in out.as_mut_slice().iter_mut().zip(self.scratch.iter()) {
            *dst = *dst * eff1 + *src * eff2;
        }
    }
}

impl AudioRenderer for MixBus {
    fn render(&mut self, out: &mut StereoBuffer) {
        self.process(out);
    }
}

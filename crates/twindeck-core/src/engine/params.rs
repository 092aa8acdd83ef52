//! Scalar parameters written by the control thread, read once per block

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use super::resampler::clamp_speed;
use crate::types::PlayerSlot;

/// `f32` stored as bits in an `AtomicU32`
#[derive(Debug)]
pub struct AtomicF32 {
    storage: AtomicU32,
}

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self {
            storage: AtomicU32::new(value.to_bits()),
        }
    }

    #[inline]
    pub fn load(&self, ordering: Ordering) -> f32 {
        f32::from_bits(self.storage.load(ordering))
    }

    #[inline]
    pub fn store(&self, value: f32, ordering: Ordering) {
        self.storage.store(value.to_bits(), ordering);
    }
}

/// Clamp to [0, 1]; NaN becomes 0
#[inline]
pub fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Per-player gain and speed
#[derive(Debug)]
pub struct PlayerParams {
    gain: AtomicF32,
    speed: AtomicF32,
}

impl PlayerParams {
    pub fn new(gain: f32) -> Self {
        Self {
            gain: AtomicF32::new(clamp_unit(gain)),
            speed: AtomicF32::new(1.0),
        }
    }

    pub fn set_gain(&self, gain: f32) {
        self.gain.store(clamp_unit(gain), Ordering::Relaxed);
    }

    #[inline]
    pub fn gain(&self) -> f32 {
        self.gain.load(Ordering::Relaxed)
    }

    pub fn set_speed(&self, ratio: f64) {
        self.speed.store(clamp_speed(ratio) as f32, Ordering::Relaxed);
    }

    #[inline]
    pub fn speed(&self) -> f64 {
        self.speed.load(Ordering::Relaxed) as f64
    }
}

impl Default for PlayerParams {
    fn default() -> Self {
        Self::new(1.0)
    }
}

/// Mixer gains and crossfade for the two-player bus
///
/// With `linked` set, moving the crossfade rewrites both player gains to
/// `1 - c` and `c`, so the gain sliders follow the crossfader.
#[derive(Debug)]
pub struct MixParams {
    gains: [AtomicF32; 2],
    crossfade: AtomicF32,
    linked: AtomicBool,
}

/// Crossfader starts centred
pub const DEFAULT_CROSSFADE: f32 = 0.5;

impl MixParams {
    pub fn new() -> Self {
        Self {
            gains: [AtomicF32::new(1.0), AtomicF32::new(1.0)],
            crossfade: AtomicF32::new(DEFAULT_CROSSFADE),
            linked: AtomicBool::new(false),
        }
    }

    pub fn set_gain(&self, slot: PlayerSlot, gain: f32) {
        self.gains[slot.index()].store(clamp_unit(gain), Ordering::Relaxed);
    }

    #[inline]
    pub fn gain(&self, slot: PlayerSlot) -> f32 {
        self.gains[slot.index()].load(Ordering::Relaxed)
    }

    pub fn set_crossfade(&self, value: f32) {
        let c = clamp_unit(value);
        if self.is_linked() {
            self.apply_linked_gains(c);
        }
        self.crossfade.store(c, Ordering::Relaxed);
    }

    #[inline]
    pub fn crossfade(&self) -> f32 {
        self.crossfade.load(Ordering::Relaxed)
    }

    /// Turning linking on snaps the gains to the current crossfade
    pub fn set_linked(&self, linked: bool) {
        self.linked.store(linked, Ordering::Relaxed);
        if linked {
            self.apply_linked_gains(self.crossfade());
        }
    }

    #[inline]
    pub fn is_linked(&self) -> bool {
        self.linked.load(Ordering::Relaxed)
    }

    /// Gains applied to each player for one block
    ///
    /// `eff1 = gain1 * (1 - c)`, `eff2 = gain2 * c`
    pub fn effective_gains(&self) -> (f32, f32) {
        let c = self.crossfade();
        (
            self.gain(PlayerSlot::One) * (1.0 - c),
            self.gain(PlayerSlot::Two) * c,
        )
    }

    fn apply_linked_gains(&self, c: f32) {
        self.gains[0].store(1.0 - c, Ordering::Relaxed);
        self.gains[1].store(c, Ordering::Relaxed);
    }
}

impl Default for MixParams {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_f32_round_trip() {
        let value = AtomicF32::new(0.25);
        assert_eq!(value.load(Ordering::Relaxed), 0.25);
        value.store(-3.5, Ordering::Relaxed);
        assert_eq!(value.load(Ordering::Relaxed), -3.5);
    }

    #[test]
    fn test_player_params_clamp() {
        let params = PlayerParams::new(0.7);
        assert!((params.gain() - 0.7).abs() < 1e-6);

        params.set_gain(1.5);
        assert_eq!(params.gain(), 1.0);
        params.set_gain(f32::NAN);
        assert_eq!(params.gain(), 0.0);

        params.set_speed(0.0);
        assert_eq!(params.speed(), 0.25);
        params.set_speed(9.0);
        assert_eq!(params.speed(), 4.0);
        params.set_speed(1.25);
        assert_eq!(params.speed(), 1.25);
    }

    #[test]
    fn test_unlinked_crossfade_leaves_gains() {
        let mix = MixParams::new();
        mix.set_gain(PlayerSlot::One, 0.8);
        mix.set_crossfade(0.25);
        assert_eq!(mix.gain(PlayerSlot::One), 0.8);
        assert_eq!(mix.gain(PlayerSlot::Two), 1.0);

        let (e1, e2) = mix.effective_gains();
        assert!((e1 - 0.6).abs() < 1e-6);
        assert!((e2 - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_linked_crossfade_drives_gains() {
        let mix = MixParams::new();
        mix.set_linked(true);
        mix.set_crossfade(0.5);
        assert_eq!(mix.gain(PlayerSlot::One), 0.5);
        assert_eq!(mix.gain(PlayerSlot::Two), 0.5);

        mix.set_crossfade(0.2);
        assert!((mix.gain(PlayerSlot::One) - 0.8).abs() < 1e-6);
        assert!((mix.gain(PlayerSlot::Two) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_linking_snaps_gains() {
        let mix = MixParams::new();
        mix.set_crossfade(0.9);
        assert_eq!(mix.gain(PlayerSlot::One), 1.0);

        mix.set_linked(true);
        assert!((mix.gain(PlayerSlot::One) - 0.1).abs() < 1e-6);
        assert!((mix.gain(PlayerSlot::Two) - 0.9).abs() < 1e-6);

        // Unlinking keeps the last derived values
        mix.set_linked(false);
        mix.set_crossfade(0.0);
        assert!((mix.gain(PlayerSlot::Two) - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_crossfade_extremes() {
        let mix = MixParams::new();
        mix.set_crossfade(0.0);
        assert_eq!(mix.effective_gains(), (1.0, 0.0));
        mix.set_crossfade(1.0);
        assert_eq!(mix.effective_gains(), (0.0, 1.0));
        mix.set_crossfade(-4.0);
        assert_eq!(mix.crossfade(), 0.0);
    }
}

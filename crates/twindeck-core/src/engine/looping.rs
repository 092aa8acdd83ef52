//! Loop state machine for one player
//!
//! ```text
//!            set_simple(true)            both marks set, B > A
//!   None ───────────────────► Simple ───────────────────────► AB
//!    ▲  ◄───────────────────            (also from None)       │
//!    │     set_simple(false)                                   │
//!    └─────────────────────────── clear() ─────────────────────┘
//! ```
//!
//! The controller only decides; the [`PlayerEngine`](super::PlayerEngine)
//! runs [`LoopController::check`] once per block after the transport has
//! advanced and applies the returned [`LoopAction`]. A wrap re-seeks and
//! leaves Playing alone, except when the transport stopped itself at the end
//! of the source during that same block, in which case playback resumes.
//!
//! All positions are source frames.

/// Default distance before the end at which a whole-file loop wraps
pub const DEFAULT_LOOP_EPSILON_SECS: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum LoopMode {
    #[default]
    None = 0,
    /// Whole file, wrapping shortly before the end
    Simple = 1,
    /// Bounded region between marks A and B
    AB = 2,
}

impl LoopMode {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => LoopMode::Simple,
            2 => LoopMode::AB,
            _ => LoopMode::None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LoopMode::None => "off",
            LoopMode::Simple => "loop",
            LoopMode::AB => "A-B",
        }
    }
}

/// What the engine should do after a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    Continue,
    /// Seek to `to`; put the transport back into Playing if `resume`
    Wrap { to: usize, resume: bool },
}

#[derive(Debug, Clone)]
pub struct LoopController {
    mode: LoopMode,
    point_a: Option<usize>,
    point_b: Option<usize>,
    length: usize,
    sample_rate: u32,
    epsilon_secs: f64,
}

impl LoopController {
    pub fn new(epsilon_secs: f64) -> Self {
        let epsilon_secs = if epsilon_secs.is_finite() && epsilon_secs >= 0.0 {
            epsilon_secs
        } else {
            DEFAULT_LOOP_EPSILON_SECS
        };
        Self {
            mode: LoopMode::None,
            point_a: None,
            point_b: None,
            length: 0,
            sample_rate: 0,
            epsilon_secs,
        }
    }

    /// A new source was loaded: bounds become the whole file
    ///
    /// The whole-file toggle survives a load, an A-B region does not.
    pub fn on_load(&mut self, length: usize, sample_rate: u32) {
        self.length = length;
        self.sample_rate = sample_rate;
        self.point_a = None;
        self.point_b = None;
        if self.mode == LoopMode::AB {
            self.mode = LoopMode::None;
        }
    }

    #[inline]
    pub fn mode(&self) -> LoopMode {
        self.mode
    }

    /// Active loop bounds; the whole file unless an A-B loop is set
    pub fn bounds(&self) -> (usize, usize) {
        match (self.mode, self.point_a, self.point_b) {
            (LoopMode::AB, Some(a), Some(b)) => (a, b),
            _ => (0, self.length),
        }
    }

    /// Marks set so far, including a lone A or B waiting for its partner
    pub fn marks(&self) -> (Option<usize>, Option<usize>) {
        (self.point_a, self.point_b)
    }

    /// Toggle the whole-file loop
    ///
    /// Returns false when the request was ignored (enabling while an A-B
    /// loop is active, disabling while not in whole-file mode).
    pub fn set_simple(&mut self, enabled: bool) -> bool {
        match (enabled, self.mode) {
            (true, LoopMode::None) => {
                self.mode = LoopMode::Simple;
                true
            }
            (true, LoopMode::Simple) => true,
            (false, LoopMode::Simple) => {
                self.mode = LoopMode::None;
                true
            }
            (false, LoopMode::None) => true,
            (_, LoopMode::AB) => false,
        }
    }

    /// Set mark A; rejected if it would not lie before an existing B
    pub fn mark_a(&mut self, frame: usize) -> bool {
        let frame = frame.min(self.length);
        if matches!(self.point_b, Some(b) if frame >= b) {
            return false;
        }
        self.point_a = Some(frame);
        self.enter_ab_if_complete();
        true
    }

    /// Set mark B; rejected if it would not lie after an existing A
    pub fn mark_b(&mut self, frame: usize) -> bool {
        let frame = frame.min(self.length);
        if frame == 0 || matches!(self.point_a, Some(a) if frame <= a) {
            return false;
        }
        self.point_b = Some(frame);
        self.enter_ab_if_complete();
        true
    }

    /// Set both marks at once from seconds
    ///
    /// Rejected as a whole when either value is non-finite, `start < 0`, or
    /// `end <= start` after clamping to the source length.
    pub fn set_region_secs(&mut self, start: f64, end: f64) -> bool {
        if !start.is_finite() || !end.is_finite() || start < 0.0 || end <= start {
            return false;
        }
        let a = self.secs_to_frames(start);
        let b = self.secs_to_frames(end);
        if b <= a {
            return false;
        }
        self.point_a = Some(a);
        self.point_b = Some(b);
        self.mode = LoopMode::AB;
        true
    }

    /// Back to no loop, forgetting any marks
    pub fn clear(&mut self) {
        self.mode = LoopMode::None;
        self.point_a = None;
        self.point_b = None;
    }

    /// Decide what happens after a block
    ///
    /// `position` is the playhead after the block, `was_playing` the state at
    /// block start, `ended` whether the transport stopped at the end of the
    /// source during the block.
    pub fn check(&self, position: f64, was_playing: bool, ended: bool) -> LoopAction {
        if !was_playing {
            return LoopAction::Continue;
        }

        match (self.mode, self.point_a, self.point_b) {
            (LoopMode::AB, Some(a), Some(b)) => {
                if ended || position >= b as f64 {
                    LoopAction::Wrap { to: a, resume: ended }
                } else {
                    LoopAction::Continue
                }
            }
            (LoopMode::Simple, _, _) => {
                let end = self.length.saturating_sub(self.epsilon_frames());
                if ended || (end > 0 && position >= end as f64) {
                    LoopAction::Wrap { to: 0, resume: ended }
                } else {
                    LoopAction::Continue
                }
            }
            _ => LoopAction::Continue,
        }
    }

    fn enter_ab_if_complete(&mut self) {
        if self.point_a.is_some() && self.point_b.is_some() {
            self.mode = LoopMode::AB;
        }
    }

    fn epsilon_frames(&self) -> usize {
        (self.epsilon_secs * self.sample_rate as f64).round() as usize
    }

    fn secs_to_frames(&self, seconds: f64) -> usize {
        ((seconds * self.sample_rate as f64).round() as usize).min(self.length)
    }
}

impl Default for LoopController {
    fn default() -> Self {
        Self::new(DEFAULT_LOOP_EPSILON_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded(length: usize, rate: u32) -> LoopController {
        let mut ctl = LoopController::default();
        ctl.on_load(length, rate);
        ctl
    }

    #[test]
    fn test_simple_toggle() {
        let mut ctl = loaded(1000, 100);
        assert!(ctl.set_simple(true));
        assert_eq!(ctl.mode(), LoopMode::Simple);
        assert_eq!(ctl.bounds(), (0, 1000));
        assert!(ctl.set_simple(false));
        assert_eq!(ctl.mode(), LoopMode::None);
    }

    #[test]
    fn test_marks_enter_ab_in_either_order() {
        let mut ctl = loaded(1000, 100);
        assert!(ctl.mark_b(600));
        assert_eq!(ctl.mode(), LoopMode::None);
        assert!(ctl.mark_a(200));
        assert_eq!(ctl.mode(), LoopMode::AB);
        assert_eq!(ctl.bounds(), (200, 600));

        let mut ctl = loaded(1000, 100);
        ctl.set_simple(true);
        ctl.mark_a(100);
        assert_eq!(ctl.mode(), LoopMode::Simple);
        ctl.mark_b(300);
        assert_eq!(ctl.mode(), LoopMode::AB);
    }

    #[test]
    fn test_invalid_marks_are_rejected() {
        let mut ctl = loaded(1000, 100);
        ctl.set_simple(true);
        ctl.mark_a(500);

        assert!(!ctl.mark_b(500));
        assert!(!ctl.mark_b(100));
        assert_eq!(ctl.mode(), LoopMode::Simple);
        assert_eq!(ctl.marks(), (Some(500), None));

        assert!(!ctl.mark_b(0));

        ctl.mark_b(800);
        assert_eq!(ctl.mode(), LoopMode::AB);
        // Moving A past B is refused and the region stays intact
        assert!(!ctl.mark_a(900));
        assert_eq!(ctl.bounds(), (500, 800));
    }

    #[test]
    fn test_region_validation() {
        let mut ctl = loaded(1000, 100);
        assert!(!ctl.set_region_secs(3.0, 1.0));
        assert!(!ctl.set_region_secs(-1.0, 2.0));
        assert!(!ctl.set_region_secs(2.0, 2.0));
        assert!(!ctl.set_region_secs(f64::NAN, 2.0));
        assert_eq!(ctl.mode(), LoopMode::None);

        assert!(ctl.set_region_secs(1.0, 3.0));
        assert_eq!(ctl.bounds(), (100, 300));

        // Both clamp to the length: no room for a region
        assert!(!ctl.set_region_secs(20.0, 30.0));
        assert_eq!(ctl.bounds(), (100, 300));
    }

    #[test]
    fn test_simple_request_ignored_during_ab() {
        let mut ctl = loaded(1000, 100);
        ctl.set_region_secs(1.0, 2.0);
        assert!(!ctl.set_simple(true));
        assert!(!ctl.set_simple(false));
        assert_eq!(ctl.mode(), LoopMode::AB);

        ctl.clear();
        assert_eq!(ctl.mode(), LoopMode::None);
        assert_eq!(ctl.marks(), (None, None));
    }

    #[test]
    fn test_load_resets_region_but_keeps_simple() {
        let mut ctl = loaded(1000, 100);
        ctl.set_region_secs(1.0, 2.0);
        ctl.on_load(500, 100);
        assert_eq!(ctl.mode(), LoopMode::None);
        assert_eq!(ctl.bounds(), (0, 500));

        ctl.set_simple(true);
        ctl.on_load(800, 100);
        assert_eq!(ctl.mode(), LoopMode::Simple);
        assert_eq!(ctl.bounds(), (0, 800));
    }

    #[test]
    fn test_check_ab() {
        let mut ctl = loaded(1000, 100);
        ctl.set_region_secs(1.0, 3.0);

        assert_eq!(ctl.check(250.0, true, false), LoopAction::Continue);
        assert_eq!(ctl.check(300.0, true, false), LoopAction::Wrap { to: 100, resume: false });
        // Not playing at block start: nothing to do
        assert_eq!(ctl.check(300.0, false, false), LoopAction::Continue);
    }

    #[test]
    fn test_check_simple_uses_epsilon() {
        let mut ctl = loaded(500, 100);
        ctl.set_simple(true);

        // epsilon = 0.05s = 5 frames
        assert_eq!(ctl.check(494.0, true, false), LoopAction::Continue);
        assert_eq!(ctl.check(495.0, true, false), LoopAction::Wrap { to: 0, resume: false });
        assert_eq!(ctl.check(480.0, true, true), LoopAction::Wrap { to: 0, resume: true });
    }

    #[test]
    fn test_no_loop_never_wraps() {
        let ctl = loaded(500, 100);
        assert_eq!(ctl.check(500.0, true, true), LoopAction::Continue);
    }

    #[test]
    fn test_bad_epsilon_falls_back() {
        let mut ctl = LoopController::new(f64::NAN);
        ctl.on_load(48000, 48000);
        ctl.set_simple(true);
        assert_eq!(ctl.check(45000.0, true, false), LoopAction::Continue);
        assert_eq!(ctl.check(45600.0, true, false), LoopAction::Wrap { to: 0, resume: false });
    }
}

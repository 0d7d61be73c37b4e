//! # Wand Button Input
//!
//! Raw button state arrives as a bitmask in every telemetry frame. This
//! module turns consecutive masks into edge events (`just_pressed`,
//! `just_released`) via XOR and accumulates per-button hold durations.
//!
//! Edge events are one-update transitions, not the held state: for any bit
//! `just_pressed` and `just_released` can never both be true in the same
//! update.

/// Button bit assignments of the wand controller.
///
/// The layout mirrors the tracking daemon's report format; the gaps are
/// bits the hardware reserves.
pub mod buttons {
    /// Green triangle.
    pub const TRIANGLE: u32 = 1 << 4;
    /// Red circle.
    pub const CIRCLE: u32 = 1 << 5;
    /// Blue cross.
    pub const CROSS: u32 = 1 << 6;
    /// Pink square.
    pub const SQUARE: u32 = 1 << 7;
    /// Select button, left side.
    pub const SELECT: u32 = 1 << 8;
    /// Start button, right side.
    pub const START: u32 = 1 << 11;
    /// System button, front center.
    pub const SYSTEM: u32 = 1 << 16;
    /// Move button, big front button.
    pub const MOVE: u32 = 1 << 19;
    /// Trigger, on the back.
    pub const TRIGGER: u32 = 1 << 20;

    /// Every tracked bit, in report order. Hold timers are kept per entry.
    pub const ALL: [u32; 9] = [
        TRIANGLE, CIRCLE, CROSS, SQUARE, SELECT, START, SYSTEM, MOVE, TRIGGER,
    ];
}

/// Edge-detected button state for one controller.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ButtonState {
    /// Current button bitmask.
    pub buttons: u32,
    /// XOR of the previous and current masks, as of the last update.
    pub changed: u32,
    /// Accumulated hold time in seconds, indexed like [`buttons::ALL`].
    time_pressed: [f32; buttons::ALL.len()],
}

impl ButtonState {
    /// All buttons up, no history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one telemetry frame's mask.
    ///
    /// `dt` is the time since this controller's previous frame; hold
    /// timers accumulate it for held bits and reset for released ones.
    pub fn update(&mut self, mask: u32, dt: f32) {
        self.changed = self.buttons ^ mask;
        self.buttons = mask;
        for (slot, bit) in buttons::ALL.iter().enumerate() {
            if mask & bit != 0 {
                self.time_pressed[slot] += dt;
            } else {
                self.time_pressed[slot] = 0.0;
            }
        }
    }

    /// True the single update in which `bit` went down.
    #[inline]
    #[must_use]
    pub fn just_pressed(&self, bit: u32) -> bool {
        self.buttons & self.changed & bit != 0
    }

    /// True the single update in which `bit` came up.
    #[inline]
    #[must_use]
    pub fn just_released(&self, bit: u32) -> bool {
        !self.buttons & self.changed & bit != 0
    }

    /// True while `bit` is down.
    #[inline]
    #[must_use]
    pub fn held(&self, bit: u32) -> bool {
        self.buttons & bit != 0
    }

    /// Seconds `bit` has been held, 0.0 if up or untracked.
    #[must_use]
    pub fn time_pressed(&self, bit: u32) -> f32 {
        buttons::ALL
            .iter()
            .position(|b| *b == bit)
            .map_or(0.0, |slot| self.time_pressed[slot])
    }
}

#[cfg(test)]
mod tests {
    use super::buttons::{CROSS, SELECT, SQUARE, TRIGGER};
    use super::*;

    #[test]
    fn test_edge_detection() {
        let mut state = ButtonState::new();
        state.update(SQUARE, 0.02);
        assert!(state.just_pressed(SQUARE));
        assert!(!state.just_released(SQUARE));
        assert!(!state.just_pressed(CROSS));

        // Held: no longer an edge.
        state.update(SQUARE, 0.02);
        assert!(!state.just_pressed(SQUARE));
        assert!(state.held(SQUARE));

        state.update(0, 0.02);
        assert!(state.just_released(SQUARE));
        assert!(!state.just_pressed(SQUARE));
    }

    #[test]
    fn test_edge_exclusivity() {
        let mut state = ButtonState::new();
        for mask in [0, SELECT, SELECT | TRIGGER, TRIGGER, 0, SELECT] {
            state.update(mask, 0.02);
            for bit in buttons::ALL {
                assert!(
                    !(state.just_pressed(bit) && state.just_released(bit)),
                    "bit {bit:#x} pressed and released in one update"
                );
            }
        }
    }

    #[test]
    fn test_hold_accumulation() {
        let mut state = ButtonState::new();
        let deltas = [0.02, 0.03, 0.05, 0.01];
        for dt in deltas {
            state.update(SELECT, dt);
        }
        let total: f32 = deltas.iter().sum();
        assert!((state.time_pressed(SELECT) - total).abs() < 1e-6);

        state.update(0, 0.02);
        assert_eq!(state.time_pressed(SELECT), 0.0);
    }

    #[test]
    fn test_hold_timers_are_per_bit() {
        let mut state = ButtonState::new();
        state.update(SELECT | TRIGGER, 0.5);
        state.update(SELECT, 0.5);
        assert!((state.time_pressed(SELECT) - 1.0).abs() < 1e-6);
        assert_eq!(state.time_pressed(TRIGGER), 0.0);
    }

    #[test]
    fn test_untracked_bit_reads_zero() {
        let mut state = ButtonState::new();
        state.update(1 << 2, 1.0);
        assert_eq!(state.time_pressed(1 << 2), 0.0);
    }
}

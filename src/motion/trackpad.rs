//! Trackpad-driven cursor motion.
//!
//! The trackpad reports absolute positions, so motion comes from the
//! difference between consecutive samples. Lifting the finger (position
//! `(0, 0)`) drops the baseline; the next touch only re-seeds it.

use crate::config::{
    TRACKPAD_ACCELERATION, TRACKPAD_CENTER, TRACKPAD_DRAG_DIVISOR, TRACKPAD_DRAG_RADIUS,
    TRACKPAD_IN_MAX, TRACKPAD_VELOCITY,
};
use crate::daydream::sample::DecodedSample;

use super::{clamp_i8, signed_square};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TrackpadFilter {
    pub last_x: u8,
    pub last_y: u8,
    pub initialized: bool,
}

impl TrackpadFilter {
    pub const fn new() -> Self {
        Self {
            last_x: 0,
            last_y: 0,
            initialized: false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Cursor delta for `sample`.
    pub fn step(&mut self, sample: &DecodedSample) -> (i8, i8) {
        if sample.trackpad_lifted() {
            self.initialized = false;
            return (0, 0);
        }

        if !self.initialized {
            self.initialized = true;
            self.last_x = sample.trackpad_x;
            self.last_y = sample.trackpad_y;
            return (0, 0);
        }

        let delta_x = i32::from(sample.trackpad_x) - i32::from(self.last_x);
        let delta_y = i32::from(sample.trackpad_y) - i32::from(self.last_y);
        self.last_x = sample.trackpad_x;
        self.last_y = sample.trackpad_y;

        let off_x = i32::from(sample.trackpad_x) - TRACKPAD_CENTER;
        let off_y = i32::from(sample.trackpad_y) - TRACKPAD_CENTER;
        if sample.buttons.trackpad_click && at_least_radius(off_x, off_y, TRACKPAD_DRAG_RADIUS) {
            return (
                clamp_i8(off_x / TRACKPAD_DRAG_DIVISOR),
                clamp_i8(off_y / TRACKPAD_DRAG_DIVISOR),
            );
        }

        let divisor = sample.duration * TRACKPAD_IN_MAX;
        (
            clamp_i8(velocity(delta_x) / divisor),
            clamp_i8(velocity(delta_y) / divisor),
        )
    }
}

fn velocity(delta: i32) -> i32 {
    delta * TRACKPAD_VELOCITY + signed_square(delta) * TRACKPAD_ACCELERATION
}

/// `round(hypot(x, y)) >= radius`, in integers.
///
/// `round(d) >= r` holds exactly when `d >= r - 0.5`, i.e.
/// `4 * (x² + y²) >= (2r - 1)²`.
fn at_least_radius(x: i32, y: i32, radius: i32) -> bool {
    let d2 = x * x + y * y;
    let lim = 2 * radius - 1;
    4 * d2 >= lim * lim
}

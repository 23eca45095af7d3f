//! Gyro-driven cursor motion (used while home is held).

use crate::config::{
    ACCEL_IN_MAX, ACCEL_MIX_VELOCITY, GYRO_ACCELERATION, GYRO_IN_MAX, GYRO_VELOCITY,
};
use crate::daydream::sample::DecodedSample;

use super::clamp_i8;

/// Reference point for angular-rate deltas.
///
/// After a reset the baseline is the origin, not the controller's first
/// reading, and it never follows the readings afterwards. The first
/// sample after a reset only arms the filter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GyroFilter {
    pub baseline_x: i32,
    pub baseline_y: i32,
    pub initialized: bool,
}

impl GyroFilter {
    pub const fn new() -> Self {
        Self {
            baseline_x: 0,
            baseline_y: 0,
            initialized: false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn step(&mut self, sample: &DecodedSample) -> (i8, i8) {
        if !self.initialized {
            self.initialized = true;
            self.baseline_x = 0;
            self.baseline_y = 0;
            return (0, 0);
        }

        // Device yaw (z) drives the cursor X axis, pitch (x) drives Y.
        let delta_x = i64::from(sample.gyro.z - self.baseline_x);
        let delta_y = i64::from(sample.gyro.x - self.baseline_y);

        let mix_x = i64::from(sample.accel.x * ACCEL_MIX_VELOCITY / ACCEL_IN_MAX);
        let mix_y = i64::from(sample.accel.z * ACCEL_MIX_VELOCITY / ACCEL_IN_MAX);

        let divisor = i64::from(sample.duration) * i64::from(GYRO_IN_MAX);
        (
            clamp_wide((mix_x - velocity(delta_x)) / divisor),
            clamp_wide((mix_y - velocity(delta_y)) / divisor),
        )
    }
}

fn velocity(delta: i64) -> i64 {
    delta * i64::from(GYRO_VELOCITY) + delta * delta.abs() * i64::from(GYRO_ACCELERATION)
}

fn clamp_wide(v: i64) -> i8 {
    clamp_i8(v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32)
}

//! Sample → mouse report translation.
//!
//! Holds every piece of session-scoped motion state: the five button
//! runs, the trackpad baseline and the gyro baseline. [`Translator::reset`]
//! returns all of it to power-on values.

pub mod buttons;
pub mod gyro;
pub mod trackpad;

use crate::config::{SCROLL_FULL_MS, SCROLL_MAX_VELOCITY, SCROLL_RAMP_MS, SCROLL_TAP_MS};
use crate::daydream::sample::DecodedSample;
use crate::hid::mouse::{MouseReport, BUTTON_LEFT, BUTTON_RIGHT};

use buttons::{Button, ButtonBank};
use gyro::GyroFilter;
use trackpad::TrackpadFilter;

/// Which sensor is steering the cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MovementSource {
    Trackpad,
    Gyro,
}

/// One translated sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Translation {
    pub report: MouseReport,
    /// Set when this sample switched the movement source.
    pub source_changed: Option<MovementSource>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Translator {
    buttons: ButtonBank,
    trackpad: TrackpadFilter,
    gyro: GyroFilter,
    source: Option<MovementSource>,
}

impl Translator {
    pub const fn new() -> Self {
        Self {
            buttons: ButtonBank::new(),
            trackpad: TrackpadFilter::new(),
            gyro: GyroFilter::new(),
            source: None,
        }
    }

    pub fn translate(&mut self, sample: &DecodedSample) -> Translation {
        self.buttons.update(&sample.buttons, sample.duration);

        let source = if self.buttons.is_pressed(Button::Home) {
            MovementSource::Gyro
        } else {
            MovementSource::Trackpad
        };
        let source_changed = (self.source != Some(source)).then_some(source);
        self.source = Some(source);

        let (x, y) = match source {
            MovementSource::Trackpad => self.trackpad.step(sample),
            MovementSource::Gyro => self.gyro.step(sample),
        };

        let mut buttons = 0;
        if sample.buttons.trackpad_click {
            buttons |= BUTTON_LEFT;
        }
        if sample.buttons.app {
            buttons |= BUTTON_RIGHT;
        }

        Translation {
            report: MouseReport {
                buttons,
                x,
                y,
                wheel: self.wheel(),
            },
            source_changed,
        }
    }

    fn wheel(&self) -> i8 {
        let down = self.buttons.get(Button::VolumeDown);
        let up = self.buttons.get(Button::VolumeUp);
        match (down.pressed, up.pressed) {
            (true, false) => -scroll_velocity(down.duration),
            (false, true) => scroll_velocity(up.duration),
            _ => 0,
        }
    }

    /// Forget all session state.
    pub fn reset(&mut self) {
        self.buttons.reset();
        self.trackpad.reset();
        self.gyro.reset();
        self.source = None;
    }

    pub fn buttons(&self) -> &ButtonBank {
        &self.buttons
    }

    pub fn trackpad(&self) -> &TrackpadFilter {
        &self.trackpad
    }

    pub fn gyro(&self) -> &GyroFilter {
        &self.gyro
    }

    pub fn source(&self) -> Option<MovementSource> {
        self.source
    }
}

/// Wheel notches per report for a volume button held `held_ms`.
pub fn scroll_velocity(held_ms: i32) -> i8 {
    if held_ms <= SCROLL_TAP_MS {
        1
    } else if held_ms >= SCROLL_FULL_MS {
        SCROLL_MAX_VELOCITY
    } else if held_ms >= SCROLL_RAMP_MS {
        ((held_ms - 500) / 200) as i8
    } else {
        0
    }
}

pub(crate) fn clamp_i8(v: i32) -> i8 {
    v.clamp(i32::from(i8::MIN), i32::from(i8::MAX)) as i8
}

/// `v²` carrying the sign of `v`.
pub(crate) fn signed_square(v: i32) -> i32 {
    v * v.abs()
}

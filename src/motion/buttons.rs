//! Per-button press / release run tracking.

use crate::daydream::sample::ButtonFlags;

/// Logical controller buttons, in bank order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Button {
    TrackpadClick = 0,
    Home = 1,
    App = 2,
    VolumeDown = 3,
    VolumeUp = 4,
}

pub const BUTTON_COUNT: usize = 5;

/// State of one button and how long (device ms) it has been in it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonState {
    pub pressed: bool,
    pub duration: i32,
}

impl ButtonState {
    /// Extend the current run, or start a new one when the state flips.
    pub fn update(&mut self, pressed: bool, duration: i32) {
        if pressed == self.pressed {
            self.duration += duration;
        } else {
            self.pressed = pressed;
            self.duration = duration;
        }
    }
}

/// The five button runs of one session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ButtonBank {
    states: [ButtonState; BUTTON_COUNT],
}

impl ButtonBank {
    pub const fn new() -> Self {
        Self {
            states: [ButtonState {
                pressed: false,
                duration: 0,
            }; BUTTON_COUNT],
        }
    }

    pub fn update(&mut self, flags: &ButtonFlags, duration: i32) {
        self.states[Button::TrackpadClick as usize].update(flags.trackpad_click, duration);
        self.states[Button::Home as usize].update(flags.home, duration);
        self.states[Button::App as usize].update(flags.app, duration);
        self.states[Button::VolumeDown as usize].update(flags.vol_down, duration);
        self.states[Button::VolumeUp as usize].update(flags.vol_up, duration);
    }

    pub fn get(&self, button: Button) -> ButtonState {
        self.states[button as usize]
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        self.get(button).pressed
    }

    pub fn states(&self) -> &[ButtonState; BUTTON_COUNT] {
        &self.states
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

//! Status indicators (link, USB, gyro).
//!
//! The pipeline and the link state machine only *request* patterns; a
//! separate task per indicator owns the output pin and the blink timing.
//! Requests go through a [`Signal`] per indicator, so the latest command
//! wins and senders never wait.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;

/// Logical indicator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Led {
    LinkStatus = 0,
    UsbReady = 1,
    GyroActive = 2,
}

pub const LED_COUNT: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LedCommand {
    On,
    Off,
    Flash { on_ms: u32, off_ms: u32 },
}

impl LedCommand {
    pub const fn flash((on_ms, off_ms): (u32, u32)) -> Self {
        LedCommand::Flash { on_ms, off_ms }
    }
}

/// Fire-and-forget indicator control.
pub trait Indicators {
    fn set(&self, led: Led, command: LedCommand);

    fn on(&self, led: Led) {
        self.set(led, LedCommand::On);
    }

    fn off(&self, led: Led) {
        self.set(led, LedCommand::Off);
    }

    fn flash(&self, led: Led, on_ms: u32, off_ms: u32) {
        self.set(led, LedCommand::Flash { on_ms, off_ms });
    }
}

/// One latest-value mailbox per indicator.
pub struct IndicatorBank<M: RawMutex> {
    slots: [Signal<M, LedCommand>; LED_COUNT],
}

impl<M: RawMutex> IndicatorBank<M> {
    pub const fn new() -> Self {
        Self {
            slots: [Signal::new(), Signal::new(), Signal::new()],
        }
    }

    pub fn signal(&self, led: Led) -> &Signal<M, LedCommand> {
        &self.slots[led as usize]
    }
}

impl<M: RawMutex> Default for IndicatorBank<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex> Indicators for IndicatorBank<M> {
    fn set(&self, led: Led, command: LedCommand) {
        self.signal(led).signal(command);
    }
}

/// Periodic toggler for one indicator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Blinker {
    command: LedCommand,
    lit: bool,
}

impl Blinker {
    pub const fn new() -> Self {
        Self {
            command: LedCommand::Off,
            lit: false,
        }
    }

    /// Adopt `command`, cancelling any blink in progress.
    ///
    /// Returns the level to drive now and, while flashing, how long to
    /// hold it before calling [`Blinker::toggle`].
    pub fn apply(&mut self, command: LedCommand) -> (bool, Option<u32>) {
        self.command = command;
        match command {
            LedCommand::On => {
                self.lit = true;
                (true, None)
            }
            LedCommand::Off => {
                self.lit = false;
                (false, None)
            }
            LedCommand::Flash { on_ms, .. } => {
                self.lit = true;
                (true, Some(on_ms))
            }
        }
    }

    /// Advance a flash to its next phase. Steady commands stay put.
    pub fn toggle(&mut self) -> (bool, Option<u32>) {
        match self.command {
            LedCommand::Flash { on_ms, off_ms } => {
                self.lit = !self.lit;
                let hold = if self.lit { on_ms } else { off_ms };
                (self.lit, Some(hold))
            }
            _ => (self.lit, None),
        }
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }
}

impl Default for Blinker {
    fn default() -> Self {
        Self::new()
    }
}

//! Status LED driver.
//!
//! Each LED gets its own task that waits on its [`IndicatorBank`] slot and
//! runs the blink timing with a [`Blinker`]. LEDs are wired active-low.

use defmt::trace;
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::Timer;
use embedded_hal::digital::OutputPin;

use crate::indicator::{Blinker, IndicatorBank, Led};

/// One active-low LED pin.
pub struct LedDriver<P: OutputPin> {
    pin: P,
}

impl<P: OutputPin> LedDriver<P> {
    pub fn new(pin: P) -> Self {
        Self { pin }
    }

    pub fn drive(&mut self, lit: bool) {
        // GPIO writes on the nRF are infallible.
        let _ = if lit {
            self.pin.set_low()
        } else {
            self.pin.set_high()
        };
    }
}

/// Drive `led` from its indicator slot forever.
pub async fn led_task<M: RawMutex, P: OutputPin>(
    led: Led,
    mut driver: LedDriver<P>,
    bank: &IndicatorBank<M>,
) -> ! {
    let slot = bank.signal(led);
    let mut blinker = Blinker::new();
    driver.drive(false);

    let mut hold: Option<u32> = None;
    loop {
        let (lit, next) = match hold {
            Some(ms) => match select(slot.wait(), Timer::after_millis(ms.into())).await {
                Either::First(command) => blinker.apply(command),
                Either::Second(()) => blinker.toggle(),
            },
            None => blinker.apply(slot.wait().await),
        };
        trace!("{} lit={}", led, lit);
        driver.drive(lit);
        hold = next;
    }
}

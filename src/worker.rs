//! Embassy glue for the decode worker.

use core::future::Future;

use defmt::{debug, trace, warn};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::Timer;

use crate::indicator::Indicators;
use crate::pipeline::{Clock, Pipeline, StepOutcome, Worker};

/// [`Clock`] backed by the Embassy time driver.
pub struct EmbassyClock;

impl Clock for EmbassyClock {
    fn after_millis(&self, ms: u64) -> impl Future<Output = ()> {
        Timer::after_millis(ms)
    }
}

/// Decode task: raw packet queue → assembler → translator → report queue.
pub async fn decode_task<M: RawMutex, I: Indicators>(pipeline: &Pipeline<M>, indicators: &I) -> ! {
    let mut worker = Worker::new(indicators);
    let clock = EmbassyClock;

    loop {
        match worker.step(pipeline, &clock).await {
            StepOutcome::Idle | StepOutcome::Seeded => {}
            StepOutcome::Stalled => warn!("no controller data for a while"),
            StepOutcome::Discarded => debug!("packet or report from an ended session discarded"),
            StepOutcome::Forwarded { report, gap } => {
                if let Some(gap) = gap {
                    warn!("sequence gap: expected {}, got {}", gap.expected, gap.got);
                }
                trace!("report queued: {}", report);
            }
            StepOutcome::Dropped { report, gap } => {
                if let Some(gap) = gap {
                    warn!("sequence gap: expected {}, got {}", gap.expected, gap.got);
                }
                warn!("report queue full - dropping {}", report);
            }
        }
    }
}

//! Notification → decode/translate → HID report pipeline.
//!
//! ```text
//!  SoftDevice dispatch ──ingest──▶ [packets; 8] ──Worker::step──▶ [reports; 8] ──forward_report──▶ USB
//! ```
//!
//! Both queues are bounded and every producer has a bounded wait, so
//! under overload packets and reports are dropped rather than delayed.
//! Disconnects reach the worker through [`Pipeline::end_session`], which
//! purges both queues, bumps the session generation and arms a reset the
//! worker applies before it touches the next packet.

use core::future::Future;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;

use crate::config::{PACKET_WAIT_MS, RAW_QUEUE_DEPTH, REPORT_PUSH_WAIT_MS, REPORT_QUEUE_DEPTH};
use crate::daydream::sample::{SampleAssembler, SequenceGap};
use crate::daydream::{self, RawPacket};
use crate::error::Error;
use crate::hid::mouse::{MouseReport, MOUSE_REPORT_SIZE};
use crate::indicator::{Indicators, Led};
use crate::motion::{MovementSource, Translator};

/// Source of timeouts.
pub trait Clock {
    fn after_millis(&self, ms: u64) -> impl Future<Output = ()>;
}

/// USB side of the pipeline.
pub trait HidTransport {
    fn write(&mut self, report: &[u8; MOUSE_REPORT_SIZE]) -> impl Future<Output = Result<(), Error>>;

    /// Resolve once the host can take another report.
    fn wait_ready(&mut self) -> impl Future<Output = ()>;
}

/// Queues and session flags shared by the three contexts.
pub struct Pipeline<M: RawMutex> {
    packets: Channel<M, RawPacket, RAW_QUEUE_DEPTH>,
    reports: Channel<M, MouseReport, REPORT_QUEUE_DEPTH>,
    streaming: AtomicBool,
    generation: AtomicU32,
    reset: Signal<M, ()>,
}

impl<M: RawMutex> Pipeline<M> {
    pub const fn new() -> Self {
        Self {
            packets: Channel::new(),
            reports: Channel::new(),
            streaming: AtomicBool::new(false),
            generation: AtomicU32::new(0),
            reset: Signal::new(),
        }
    }

    /// Validate a notification payload and queue it without waiting.
    pub fn ingest(&self, payload: Option<&[u8]>) -> Result<(), Error> {
        let packet = daydream::validate(payload)?;
        self.offer(packet)
    }

    pub fn offer(&self, packet: RawPacket) -> Result<(), Error> {
        self.packets.try_send(packet).map_err(|_| Error::QueueFull)
    }

    pub fn begin_streaming(&self) {
        self.streaming.store(true, Ordering::Release);
    }

    /// Session is gone: drop everything in flight and reset motion state.
    pub fn end_session(&self) {
        self.streaming.store(false, Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.packets.clear();
        self.reports.clear();
        self.reset.signal(());
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Acquire)
    }

    /// Bumped by every [`end_session`](Self::end_session).
    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn purge_packets(&self) {
        self.packets.clear();
    }

    pub fn pending_packets(&self) -> usize {
        self.packets.len()
    }

    pub fn pending_reports(&self) -> usize {
        self.reports.len()
    }

    /// Next packet, or `None` once `timeout` fires.
    pub async fn next_packet(&self, timeout: impl Future<Output = ()>) -> Option<RawPacket> {
        match select(self.packets.receive(), timeout).await {
            Either::First(packet) => Some(packet),
            Either::Second(()) => None,
        }
    }

    /// Queue `report`, giving up once `timeout` fires.
    pub async fn publish(
        &self,
        report: MouseReport,
        timeout: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        match select(self.reports.send(report), timeout).await {
            Either::First(()) => Ok(()),
            Either::Second(()) => Err(Error::QueueFull),
        }
    }

    pub async fn next_report(&self) -> MouseReport {
        self.reports.receive().await
    }

    fn take_reset(&self) -> bool {
        self.reset.try_take().is_some()
    }
}

impl<M: RawMutex> Default for Pipeline<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// What one [`Worker::step`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StepOutcome {
    /// No packet and no session; the raw queue was purged.
    Idle,
    /// No packet although the session is streaming.
    Stalled,
    /// A packet or report belonged to a session that has ended.
    Discarded,
    /// First packet of the session; it only seeds the assembler.
    Seeded,
    Forwarded {
        report: MouseReport,
        gap: Option<SequenceGap>,
    },
    /// The report queue stayed full; this report is lost.
    Dropped {
        report: MouseReport,
        gap: Option<SequenceGap>,
    },
}

/// Decode / translate context. Owns all session-scoped motion state.
pub struct Worker<'a, I: Indicators> {
    assembler: SampleAssembler,
    translator: Translator,
    indicators: &'a I,
}

impl<'a, I: Indicators> Worker<'a, I> {
    pub fn new(indicators: &'a I) -> Self {
        Self {
            assembler: SampleAssembler::new(),
            translator: Translator::new(),
            indicators,
        }
    }

    pub fn reset(&mut self) {
        self.assembler.reset();
        self.translator.reset();
    }

    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    pub fn assembler(&self) -> &SampleAssembler {
        &self.assembler
    }

    pub async fn step<M: RawMutex, C: Clock>(
        &mut self,
        pipeline: &Pipeline<M>,
        clock: &C,
    ) -> StepOutcome {
        let packet = pipeline
            .next_packet(clock.after_millis(PACKET_WAIT_MS))
            .await;

        if pipeline.take_reset() {
            self.reset();
        }

        let streaming = pipeline.is_streaming();
        let packet = match packet {
            Some(packet) if streaming => packet,
            Some(_) => {
                pipeline.purge_packets();
                return StepOutcome::Discarded;
            }
            None if streaming => return StepOutcome::Stalled,
            None => {
                pipeline.purge_packets();
                return StepOutcome::Idle;
            }
        };

        let assembled = self.assembler.push(&packet);
        let Some(sample) = assembled.sample else {
            return StepOutcome::Seeded;
        };

        let translation = self.translator.translate(&sample);
        match translation.source_changed {
            Some(MovementSource::Gyro) => self.indicators.on(Led::GyroActive),
            Some(MovementSource::Trackpad) => self.indicators.off(Led::GyroActive),
            None => {}
        }

        let report = translation.report;
        let gap = assembled.gap;
        let generation = pipeline.generation();
        match pipeline
            .publish(report, clock.after_millis(REPORT_PUSH_WAIT_MS))
            .await
        {
            // Sent into a queue purged by a disconnect; nothing else is in it.
            Ok(()) if pipeline.generation() != generation => {
                pipeline.reports.clear();
                StepOutcome::Discarded
            }
            Ok(()) => StepOutcome::Forwarded { report, gap },
            Err(_) => StepOutcome::Dropped { report, gap },
        }
    }
}

/// HID consumer: take one report, write it, then wait for the endpoint.
pub async fn forward_report<M: RawMutex, T: HidTransport>(
    pipeline: &Pipeline<M>,
    transport: &mut T,
) -> Result<MouseReport, Error> {
    let report = pipeline.next_report().await;
    transport.write(&report.to_bytes()).await?;
    transport.wait_ready().await;
    Ok(report)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::daydream::bits::pack_unsigned;
    use crate::daydream::sample::layout;
    use crate::daydream::PACKET_LEN;
    use crate::indicator::tests::RecordingIndicators;
    use crate::indicator::LedCommand;
    use core::cell::RefCell;
    use embassy_futures::join::join;
    use embassy_futures::{block_on, yield_now};
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    /// Every timeout fires immediately; requested waits are recorded.
    #[derive(Default)]
    pub struct ImmediateClock {
        pub requested: RefCell<Vec<u64>>,
    }

    impl Clock for ImmediateClock {
        fn after_millis(&self, ms: u64) -> impl Future<Output = ()> {
            self.requested.borrow_mut().push(ms);
            core::future::ready(())
        }
    }

    /// No timeout ever fires.
    struct NeverClock;

    impl Clock for NeverClock {
        fn after_millis(&self, _ms: u64) -> impl Future<Output = ()> {
            core::future::pending()
        }
    }

    pub fn packet(sqn: u8, timestamp: u16, trackpad: (u8, u8), status: u8) -> RawPacket {
        let mut buf = [0u8; PACKET_LEN];
        pack_unsigned(&mut buf, layout::SQN, sqn.into());
        pack_unsigned(&mut buf, layout::TIMESTAMP, timestamp.into());
        pack_unsigned(&mut buf, layout::TRACKPAD_X, trackpad.0.into());
        pack_unsigned(&mut buf, layout::TRACKPAD_Y, trackpad.1.into());
        pack_unsigned(&mut buf, layout::BUTTONS, status.into());
        buf
    }

    fn streaming_pipeline() -> Pipeline<NoopRawMutex> {
        let p = Pipeline::new();
        p.begin_streaming();
        p
    }

    #[test]
    fn ingest_validates_before_queueing() {
        let p: Pipeline<NoopRawMutex> = Pipeline::new();
        assert_eq!(
            p.ingest(Some(&[0u8; 19][..])),
            Err(Error::Ingress(crate::error::IngressError::BadLength(19)))
        );
        assert_eq!(
            p.ingest(None),
            Err(Error::Ingress(crate::error::IngressError::Empty))
        );
        assert_eq!(p.pending_packets(), 0);

        assert_eq!(p.ingest(Some(&[0u8; 20][..])), Ok(()));
        assert_eq!(p.pending_packets(), 1);
    }

    #[test]
    fn full_raw_queue_drops_without_blocking() {
        let p: Pipeline<NoopRawMutex> = Pipeline::new();
        for i in 0..RAW_QUEUE_DEPTH {
            assert_eq!(p.offer(packet(i as u8, 0, (0, 0), 0)), Ok(()));
        }
        assert_eq!(p.offer(packet(9, 0, (0, 0), 0)), Err(Error::QueueFull));
        assert_eq!(p.pending_packets(), RAW_QUEUE_DEPTH);
    }

    #[test]
    fn idle_without_session_purges_backlog() {
        let p: Pipeline<NoopRawMutex> = Pipeline::new();
        let leds = RecordingIndicators::default();
        let clock = ImmediateClock::default();
        let mut w = Worker::new(&leds);

        assert_eq!(block_on(w.step(&p, &clock)), StepOutcome::Idle);

        p.offer(packet(0, 0, (0, 0), 0)).unwrap();
        p.offer(packet(1, 1, (0, 0), 0)).unwrap();
        assert_eq!(block_on(w.step(&p, &clock)), StepOutcome::Discarded);
        assert_eq!(p.pending_packets(), 0);
        assert!(!w.assembler().is_seeded());
    }

    #[test]
    fn stalled_while_streaming_keeps_state() {
        let p = streaming_pipeline();
        let leds = RecordingIndicators::default();
        let clock = ImmediateClock::default();
        let mut w = Worker::new(&leds);

        p.offer(packet(0, 0, (0, 0), 0)).unwrap();
        assert_eq!(block_on(w.step(&p, &clock)), StepOutcome::Seeded);
        assert_eq!(block_on(w.step(&p, &clock)), StepOutcome::Stalled);
        assert!(w.assembler().is_seeded());
        assert_eq!(*clock.requested.borrow(), vec![PACKET_WAIT_MS, PACKET_WAIT_MS]);
    }

    #[test]
    fn first_packet_seeds_then_reports_flow() {
        let p = streaming_pipeline();
        let leds = RecordingIndicators::default();
        let clock = ImmediateClock::default();
        let mut w = Worker::new(&leds);

        p.offer(packet(0, 100, (0, 0), 0)).unwrap();
        p.offer(packet(1, 110, (0, 0), layout::TRACKPAD_CLICK)).unwrap();

        assert_eq!(block_on(w.step(&p, &clock)), StepOutcome::Seeded);
        assert_eq!(p.pending_reports(), 0);

        let expected = MouseReport {
            buttons: 0b01,
            ..MouseReport::empty()
        };
        assert_eq!(
            block_on(w.step(&p, &clock)),
            StepOutcome::Forwarded {
                report: expected,
                gap: None
            }
        );
        assert_eq!(block_on(p.next_report()), expected);
        assert_eq!(
            *clock.requested.borrow(),
            vec![PACKET_WAIT_MS, PACKET_WAIT_MS, REPORT_PUSH_WAIT_MS]
        );
    }

    #[test]
    fn sequence_gap_surfaces_in_outcome() {
        let p = streaming_pipeline();
        let leds = RecordingIndicators::default();
        let clock = ImmediateClock::default();
        let mut w = Worker::new(&leds);

        for (i, sqn) in [5u8, 6, 8].into_iter().enumerate() {
            p.offer(packet(sqn, 10 * i as u16, (0, 0), 0)).unwrap();
        }
        let outcomes: Vec<StepOutcome> = (0..3).map(|_| block_on(w.step(&p, &clock))).collect();

        let gaps: Vec<SequenceGap> = outcomes
            .iter()
            .filter_map(|o| match o {
                StepOutcome::Forwarded { gap, .. } => *gap,
                _ => None,
            })
            .collect();
        assert_eq!(gaps, vec![SequenceGap { expected: 7, got: 8 }]);
        assert_eq!(p.pending_reports(), 2);
    }

    #[test]
    fn full_report_queue_drops_and_keeps_going() {
        let p = streaming_pipeline();
        let leds = RecordingIndicators::default();
        let clock = ImmediateClock::default();
        let mut w = Worker::new(&leds);

        p.offer(packet(0, 0, (0, 0), 0)).unwrap();
        block_on(w.step(&p, &clock));

        let mut sqn = 1u8;
        for _ in 0..REPORT_QUEUE_DEPTH {
            p.offer(packet(sqn, sqn.into(), (0, 0), 0)).unwrap();
            sqn += 1;
            assert!(matches!(
                block_on(w.step(&p, &clock)),
                StepOutcome::Forwarded { .. }
            ));
        }

        p.offer(packet(sqn, sqn.into(), (0, 0), 0)).unwrap();
        sqn += 1;
        assert!(matches!(
            block_on(w.step(&p, &clock)),
            StepOutcome::Dropped { gap: None, .. }
        ));

        // Consumer catches up; the next sample goes through.
        block_on(p.next_report());
        p.offer(packet(sqn, sqn.into(), (0, 0), 0)).unwrap();
        assert!(matches!(
            block_on(w.step(&p, &clock)),
            StepOutcome::Forwarded { gap: None, .. }
        ));
    }

    #[test]
    fn end_session_resets_before_next_sample() {
        let p = streaming_pipeline();
        let leds = RecordingIndicators::default();
        let clock = ImmediateClock::default();
        let mut w = Worker::new(&leds);

        let pressed = layout::VOL_UP | layout::HOME;
        p.offer(packet(0, 0, (50, 60), pressed)).unwrap();
        p.offer(packet(1, 20, (55, 60), pressed)).unwrap();
        p.offer(packet(2, 40, (60, 60), 0)).unwrap();
        for _ in 0..3 {
            block_on(w.step(&p, &clock));
        }
        assert!(w.translator().trackpad().initialized);
        assert!(w.translator().gyro().initialized);

        // Disconnect with work still queued.
        p.offer(packet(3, 60, (65, 60), 0)).unwrap();
        p.end_session();
        assert_eq!(p.pending_packets(), 0);
        assert_eq!(p.pending_reports(), 0);

        // Reconnect: the first new packet only seeds, on fresh state.
        p.begin_streaming();
        p.offer(packet(17, 300, (200, 200), 0)).unwrap();
        assert_eq!(block_on(w.step(&p, &clock)), StepOutcome::Seeded);

        let t = w.translator();
        for state in t.buttons().states() {
            assert_eq!((state.pressed, state.duration), (false, 0));
        }
        assert_eq!(*t.trackpad(), crate::motion::trackpad::TrackpadFilter::new());
        assert_eq!(*t.gyro(), crate::motion::gyro::GyroFilter::new());
        assert_eq!(t.source(), None);
    }

    #[test]
    fn report_blocked_across_disconnect_is_discarded() {
        let p = streaming_pipeline();
        let leds = RecordingIndicators::default();
        let mut w = Worker::new(&leds);

        p.offer(packet(0, 0, (0, 0), 0)).unwrap();
        assert_eq!(block_on(w.step(&p, &NeverClock)), StepOutcome::Seeded);

        for _ in 0..REPORT_QUEUE_DEPTH {
            block_on(p.publish(MouseReport::empty(), core::future::ready(()))).unwrap();
        }
        p.offer(packet(1, 10, (0, 0), layout::APP)).unwrap();

        // The worker parks on the full report queue, then the link drops.
        let (outcome, ()) = block_on(join(w.step(&p, &NeverClock), async {
            yield_now().await;
            p.end_session();
        }));

        assert_eq!(outcome, StepOutcome::Discarded);
        assert_eq!(p.pending_reports(), 0);
        assert_eq!(p.generation(), 1);
    }

    #[test]
    fn packet_taken_before_disconnect_is_discarded() {
        let p = streaming_pipeline();
        let leds = RecordingIndicators::default();
        let clock = ImmediateClock::default();
        let mut w = Worker::new(&leds);

        p.offer(packet(0, 0, (0, 0), 0)).unwrap();
        block_on(w.step(&p, &clock));
        p.end_session();
        // A late notification from the old link.
        p.offer(packet(1, 5, (0, 0), 0)).unwrap();
        assert_eq!(block_on(w.step(&p, &clock)), StepOutcome::Discarded);
        assert!(!w.assembler().is_seeded());
    }

    #[test]
    fn reports_keep_sample_order() {
        let p = streaming_pipeline();
        let leds = RecordingIndicators::default();
        let clock = ImmediateClock::default();
        let mut w = Worker::new(&leds);

        p.offer(packet(0, 0, (0, 0), 0)).unwrap();
        block_on(w.step(&p, &clock));

        let statuses = [layout::TRACKPAD_CLICK, layout::APP, 0, layout::APP | layout::TRACKPAD_CLICK];
        for (i, status) in statuses.iter().enumerate() {
            p.offer(packet(i as u8 + 1, i as u16 + 1, (0, 0), *status)).unwrap();
            block_on(w.step(&p, &clock));
        }
        let buttons: Vec<u8> = (0..statuses.len())
            .map(|_| block_on(p.next_report()).buttons)
            .collect();
        assert_eq!(buttons, vec![0b01, 0b10, 0b00, 0b11]);
    }

    #[test]
    fn gyro_indicator_follows_source_changes() {
        let p = streaming_pipeline();
        let leds = RecordingIndicators::default();
        let clock = ImmediateClock::default();
        let mut w = Worker::new(&leds);

        let statuses = [0, 0, layout::HOME, layout::HOME, 0];
        for (i, status) in statuses.iter().enumerate() {
            p.offer(packet(i as u8, i as u16, (0, 0), *status)).unwrap();
            block_on(w.step(&p, &clock));
        }
        assert_eq!(
            *leds.log.borrow(),
            vec![
                (Led::GyroActive, LedCommand::Off),
                (Led::GyroActive, LedCommand::On),
                (Led::GyroActive, LedCommand::Off),
            ]
        );
    }

    struct MockTransport {
        calls: Vec<&'static str>,
        written: Vec<[u8; MOUSE_REPORT_SIZE]>,
        fail: bool,
    }

    impl HidTransport for MockTransport {
        fn write(
            &mut self,
            report: &[u8; MOUSE_REPORT_SIZE],
        ) -> impl Future<Output = Result<(), Error>> {
            self.calls.push("write");
            self.written.push(*report);
            core::future::ready(if self.fail { Err(Error::Usb) } else { Ok(()) })
        }

        fn wait_ready(&mut self) -> impl Future<Output = ()> {
            self.calls.push("ready");
            core::future::ready(())
        }
    }

    #[test]
    fn consumer_writes_then_waits_for_endpoint() {
        let p: Pipeline<NoopRawMutex> = Pipeline::new();
        let mut usb = MockTransport {
            calls: Vec::new(),
            written: Vec::new(),
            fail: false,
        };
        let report = MouseReport {
            buttons: 1,
            x: -3,
            y: 4,
            wheel: -1,
        };
        block_on(p.publish(report, core::future::ready(()))).unwrap();

        assert_eq!(block_on(forward_report(&p, &mut usb)), Ok(report));
        assert_eq!(usb.written, vec![[1, 0xFD, 4, 0xFF]]);
        assert_eq!(usb.calls, vec!["write", "ready"]);
    }

    #[test]
    fn failed_write_skips_ready_wait() {
        let p: Pipeline<NoopRawMutex> = Pipeline::new();
        let mut usb = MockTransport {
            calls: Vec::new(),
            written: Vec::new(),
            fail: true,
        };
        block_on(p.publish(MouseReport::empty(), core::future::ready(()))).unwrap();

        assert_eq!(block_on(forward_report(&p, &mut usb)), Err(Error::Usb));
        assert_eq!(usb.calls, vec!["write"]);
    }
}

//! Integration tests for daydream2usb host-testable logic.
//!
//! Raw controller notifications go in, USB mouse report bytes come out.

use core::cell::RefCell;
use core::future::{ready, Future};

use daydream2usb::ble::discovery::Session;
use daydream2usb::ble::{
    AdvKind, Attribute, LinkAction, LinkEvent, PeerAddress, SubscribeOutcome,
};
use daydream2usb::config::CONTROLLER_NAME;
use daydream2usb::daydream::bits::pack_unsigned;
use daydream2usb::daydream::sample::layout;
use daydream2usb::daydream::PACKET_LEN;
use daydream2usb::error::IngressError;
use daydream2usb::hid::mouse::MOUSE_REPORT_SIZE;
use daydream2usb::indicator::{Indicators, Led, LedCommand};
use daydream2usb::pipeline::{forward_report, Clock, HidTransport, Pipeline, StepOutcome, Worker};
use daydream2usb::Error;
use embassy_futures::block_on;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;

struct NoWait;

impl Clock for NoWait {
    fn after_millis(&self, _ms: u64) -> impl Future<Output = ()> {
        ready(())
    }
}

#[derive(Default)]
struct Host {
    received: Vec<[u8; MOUSE_REPORT_SIZE]>,
}

impl HidTransport for Host {
    fn write(&mut self, report: &[u8; MOUSE_REPORT_SIZE]) -> impl Future<Output = Result<(), Error>> {
        self.received.push(*report);
        ready(Ok(()))
    }

    fn wait_ready(&mut self) -> impl Future<Output = ()> {
        ready(())
    }
}

#[derive(Default)]
struct Leds {
    log: RefCell<Vec<(Led, LedCommand)>>,
}

impl Indicators for Leds {
    fn set(&self, led: Led, command: LedCommand) {
        self.log.borrow_mut().push((led, command));
    }
}

fn notification(sqn: u8, timestamp: u16, trackpad: (u8, u8), status: u8) -> [u8; PACKET_LEN] {
    let mut buf = [0u8; PACKET_LEN];
    pack_unsigned(&mut buf, layout::SQN, sqn.into());
    pack_unsigned(&mut buf, layout::TIMESTAMP, timestamp.into());
    pack_unsigned(&mut buf, layout::TRACKPAD_X, trackpad.0.into());
    pack_unsigned(&mut buf, layout::TRACKPAD_Y, trackpad.1.into());
    pack_unsigned(&mut buf, layout::BUTTONS, status.into());
    buf
}

/// Walk a session from scan to streaming, applying pipeline actions.
fn start_streaming(pipeline: &Pipeline<NoopRawMutex>) -> Session {
    let mut adv = vec![0x02, 0x01, 0x06, CONTROLLER_NAME.len() as u8 + 1, 0x09];
    adv.extend_from_slice(CONTROLLER_NAME.as_bytes());

    let mut session = Session::new();
    let mut actions: Vec<LinkAction> = session.start().to_vec();
    let events = [
        LinkEvent::Advertisement {
            peer: PeerAddress {
                kind: 0,
                bytes: [1, 2, 3, 4, 5, 6],
            },
            kind: AdvKind::ConnectableUndirected,
            data: &adv,
        },
        LinkEvent::Connected,
        LinkEvent::MtuUpdated { att_mtu: 65 },
        LinkEvent::Discovered(Some(Attribute::Service { handle: 0x10 })),
        LinkEvent::Discovered(Some(Attribute::Characteristic {
            handle: 0x11,
            value_handle: 0x12,
        })),
        LinkEvent::Discovered(Some(Attribute::Descriptor { handle: 0x13 })),
        LinkEvent::Subscribed(SubscribeOutcome::Subscribed),
    ];
    for event in events {
        actions.extend(session.handle(event));
    }

    for action in &actions {
        match action {
            LinkAction::StreamingStarted => pipeline.begin_streaming(),
            LinkAction::SessionEnded => pipeline.end_session(),
            _ => {}
        }
    }
    assert!(session.is_streaming());
    session
}

/// Push notifications through decode and USB, returning the host's view.
fn run(
    pipeline: &Pipeline<NoopRawMutex>,
    leds: &Leds,
    notifications: &[[u8; PACKET_LEN]],
) -> Vec<[u8; MOUSE_REPORT_SIZE]> {
    let mut worker = Worker::new(leds);
    let mut host = Host::default();

    for n in notifications {
        pipeline.ingest(Some(&n[..])).unwrap();
        if let StepOutcome::Forwarded { .. } = block_on(worker.step(pipeline, &NoWait)) {
            block_on(forward_report(pipeline, &mut host)).unwrap();
        }
    }
    host.received
}

#[test]
fn trackpad_swipe_reaches_host() {
    let pipeline = Pipeline::new();
    let leds = Leds::default();
    start_streaming(&pipeline);

    let received = run(
        &pipeline,
        &leds,
        &[
            notification(0, 10, (100, 100), 0),
            notification(1, 20, (100, 100), 0),
            notification(2, 30, (110, 95), 0),
        ],
    );

    // First notification only seeds timing, second seeds the trackpad.
    assert_eq!(received, vec![[0, 0, 0, 0], [0, 15, 0xFA, 0]]);
}

#[test]
fn click_and_app_map_to_left_and_right() {
    let pipeline = Pipeline::new();
    let leds = Leds::default();
    start_streaming(&pipeline);

    let status = layout::TRACKPAD_CLICK | layout::APP;
    let received = run(
        &pipeline,
        &leds,
        &[
            notification(0, 0, (100, 100), status),
            notification(1, 15, (100, 100), status),
        ],
    );
    assert_eq!(received, vec![[0x03, 0, 0, 0]]);
}

#[test]
fn volume_down_tap_scrolls_one_notch_down() {
    let pipeline = Pipeline::new();
    let leds = Leds::default();
    start_streaming(&pipeline);

    let received = run(
        &pipeline,
        &leds,
        &[
            notification(0, 0, (0, 0), layout::VOL_DOWN),
            notification(1, 10, (0, 0), layout::VOL_DOWN),
        ],
    );
    assert_eq!(received, vec![[0, 0, 0, 0xFF]]);
}

#[test]
fn home_switches_to_gyro_and_lights_indicator() {
    let pipeline = Pipeline::new();
    let leds = Leds::default();
    start_streaming(&pipeline);

    let received = run(
        &pipeline,
        &leds,
        &[
            notification(0, 0, (0, 0), 0),
            notification(1, 10, (0, 0), 0),
            notification(2, 20, (0, 0), layout::HOME),
            notification(3, 30, (0, 0), 0),
        ],
    );

    assert_eq!(received.len(), 3);
    assert_eq!(
        *leds.log.borrow(),
        vec![
            (Led::GyroActive, LedCommand::Off),
            (Led::GyroActive, LedCommand::On),
            (Led::GyroActive, LedCommand::Off),
        ]
    );
}

#[test]
fn malformed_notifications_never_queue() {
    let pipeline: Pipeline<NoopRawMutex> = Pipeline::new();
    start_streaming(&pipeline);

    assert_eq!(
        pipeline.ingest(Some(&[0u8; 19][..])),
        Err(Error::Ingress(IngressError::BadLength(19)))
    );
    assert_eq!(
        pipeline.ingest(Some(&[0u8; 0][..])),
        Err(Error::Ingress(IngressError::Empty))
    );
    assert_eq!(pipeline.pending_packets(), 0);
}

#[test]
fn disconnect_purges_and_next_session_starts_clean() {
    let pipeline = Pipeline::new();
    let leds = Leds::default();
    let mut session = start_streaming(&pipeline);

    pipeline.ingest(Some(&notification(0, 0, (50, 50), 0)[..])).unwrap();
    pipeline.ingest(Some(&notification(1, 10, (60, 50), 0)[..])).unwrap();

    for action in session.handle(LinkEvent::Disconnected { reason: None }) {
        match action {
            LinkAction::StreamingStarted => pipeline.begin_streaming(),
            LinkAction::SessionEnded => pipeline.end_session(),
            _ => {}
        }
    }
    assert!(!pipeline.is_streaming());
    assert_eq!(pipeline.pending_packets(), 0);

    start_streaming(&pipeline);
    let received = run(
        &pipeline,
        &leds,
        &[
            notification(7, 100, (100, 100), 0),
            notification(8, 110, (100, 100), 0),
        ],
    );
    assert_eq!(received, vec![[0, 0, 0, 0]]);
}

//! USB HID mouse device.
//!
//! Initialises the Embassy USB stack on the nRF52840 hardware USB
//! peripheral and exposes one HID mouse endpoint.

use crate::config;
use crate::hid::mouse::{MOUSE_REPORT_DESCRIPTOR, MOUSE_REPORT_SIZE};
use crate::pipeline::{forward_report, HidTransport, Pipeline};
use crate::Error;
use core::future::Future;
use defmt::{info, trace, warn};
use embassy_nrf::usb::vbus_detect::HardwareVbusDetect;
use embassy_nrf::usb::Driver;
use embassy_nrf::{self, bind_interrupts, peripherals};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_usb::class::hid::{Config as HidConfig, HidWriter, State};
use embassy_usb::{Builder, Config, UsbDevice};
use static_cell::StaticCell;

bind_interrupts!(struct Irqs {
    USBD => embassy_nrf::usb::InterruptHandler<peripherals::USBD>;
    CLOCK_POWER => embassy_nrf::usb::vbus_detect::InterruptHandler;
});

pub type UsbDriver = Driver<'static, peripherals::USBD, HardwareVbusDetect>;

static MOUSE_STATE: StaticCell<State> = StaticCell::new();
static USB_CONFIG_DESC: StaticCell<[u8; 256]> = StaticCell::new();
static USB_BOS_DESC: StaticCell<[u8; 256]> = StaticCell::new();
static USB_MSOS_DESC: StaticCell<[u8; 256]> = StaticCell::new();
static USB_CTRL_BUF: StaticCell<[u8; 64]> = StaticCell::new();

/// The mouse endpoint, as the pipeline's report sink.
pub struct UsbMouse {
    writer: HidWriter<'static, UsbDriver, 8>,
}

impl HidTransport for UsbMouse {
    fn write(
        &mut self,
        report: &[u8; MOUSE_REPORT_SIZE],
    ) -> impl Future<Output = Result<(), Error>> {
        async move { self.writer.write(report).await.map_err(|_| Error::Usb) }
    }

    fn wait_ready(&mut self) -> impl Future<Output = ()> {
        self.writer.ready()
    }
}

/// Build result containing the USB device runner and the mouse endpoint.
pub struct UsbHidDevice {
    pub device: UsbDevice<'static, UsbDriver>,
    pub mouse: UsbMouse,
}

/// Initialise the USB stack and create the HID mouse.
///
/// Must be called exactly once.  All static buffers are consumed here.
pub fn init(usbd: peripherals::USBD) -> UsbHidDevice {
    let driver = Driver::new(usbd, Irqs, HardwareVbusDetect::new(Irqs));

    let mut usb_config = Config::new(config::USB_VID, config::USB_PID);
    usb_config.manufacturer = Some(config::USB_MANUFACTURER);
    usb_config.product = Some(config::USB_PRODUCT);
    usb_config.serial_number = Some(config::USB_SERIAL_NUMBER);
    usb_config.max_power = config::USB_MAX_POWER_MA;
    usb_config.max_packet_size_0 = 64;

    let config_desc = USB_CONFIG_DESC.init([0u8; 256]);
    let bos_desc = USB_BOS_DESC.init([0u8; 256]);
    let msos_desc = USB_MSOS_DESC.init([0u8; 256]);
    let ctrl_buf = USB_CTRL_BUF.init([0u8; 64]);

    let mut builder = Builder::new(
        driver,
        usb_config,
        config_desc,
        bos_desc,
        msos_desc,
        ctrl_buf,
    );

    let mouse_state = MOUSE_STATE.init(State::new());
    let mouse_config = HidConfig {
        report_descriptor: MOUSE_REPORT_DESCRIPTOR,
        request_handler: None,
        poll_ms: config::USB_HID_POLL_MS,
        max_packet_size: 8,
    };
    let writer = HidWriter::new(&mut builder, mouse_state, mouse_config);

    let device = builder.build();

    info!("USB HID mouse initialised");

    UsbHidDevice {
        device,
        mouse: UsbMouse { writer },
    }
}

/// Run the USB device stack - must be spawned as a dedicated Embassy task.
///
/// This handles USB enumeration, suspend/resume, and endpoint servicing.
pub async fn run_usb_device(mut device: UsbDevice<'static, UsbDriver>) -> ! {
    info!("USB device task started");
    device.run().await
}

/// Report forwarding loop: report queue → USB endpoint, one at a time.
pub async fn hid_writer_task<M: RawMutex>(mut mouse: UsbMouse, pipeline: &Pipeline<M>) -> ! {
    info!("HID writer task started - waiting for reports");

    loop {
        match forward_report(pipeline, &mut mouse).await {
            Ok(report) => trace!("report sent: {}", report),
            Err(_) => warn!("USB mouse write failed"),
        }
    }
}

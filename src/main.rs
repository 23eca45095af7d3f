//! daydream2usb firmware entry point (nRF52840 + S140 SoftDevice).
//!
//! Tasks:
//! - `softdevice_task`: SoftDevice event pump
//! - `ble`: scan / connect / discover / subscribe / stream
//! - `decode`: raw packets → mouse reports
//! - `usb` + `hid_writer`: USB stack and report forwarding
//! - `led` (x3): status indicators

#![no_std]
#![no_main]

use core::mem;

use daydream2usb::ble::link;
use daydream2usb::config;
use daydream2usb::indicator::{IndicatorBank, Indicators, Led};
use daydream2usb::leds::{self, LedDriver};
use daydream2usb::pipeline::Pipeline;
use daydream2usb::usb::hid_device::{self, UsbDriver, UsbMouse};
use daydream2usb::worker;
use defmt::info;
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_nrf::gpio::{Level, Output, OutputDrive};
use embassy_nrf::interrupt::{self, InterruptExt, Priority};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_usb::UsbDevice;
use nrf_softdevice::{raw, Softdevice};
use panic_probe as _;

static PIPELINE: Pipeline<CriticalSectionRawMutex> = Pipeline::new();
static INDICATORS: IndicatorBank<CriticalSectionRawMutex> = IndicatorBank::new();

const GAP_DEVICE_NAME: &[u8] = b"daydream2usb";

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("daydream2usb starting");

    // The SoftDevice reserves priorities 0, 1 and 4.
    let mut nrf_config = embassy_nrf::config::Config::default();
    nrf_config.gpiote_interrupt_priority = Priority::P2;
    nrf_config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(nrf_config);
    interrupt::USBD.set_priority(Priority::P2);
    interrupt::CLOCK_POWER.set_priority(Priority::P2);

    // LEDs are active-low: start dark.
    let link_led = Output::new(p.P0_13, Level::High, OutputDrive::Standard);
    let usb_led = Output::new(p.P0_14, Level::High, OutputDrive::Standard);
    let gyro_led = Output::new(p.P0_15, Level::High, OutputDrive::Standard);
    spawner.must_spawn(led_task(Led::LinkStatus, LedDriver::new(link_led)));
    spawner.must_spawn(led_task(Led::UsbReady, LedDriver::new(usb_led)));
    spawner.must_spawn(led_task(Led::GyroActive, LedDriver::new(gyro_led)));
    INDICATORS.on(Led::LinkStatus);

    let sd_config = nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t {
            att_mtu: config::BLE_ATT_MTU,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 0,
            periph_role_count: 0,
            central_role_count: 1,
            central_sec_count: 1,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: GAP_DEVICE_NAME.as_ptr() as _,
            current_len: GAP_DEVICE_NAME.len() as u16,
            max_len: GAP_DEVICE_NAME.len() as u16,
            write_perm: unsafe { mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        ..Default::default()
    };
    let sd = Softdevice::enable(&sd_config);
    spawner.must_spawn(softdevice_task(sd));

    let usb = hid_device::init(p.USBD);
    spawner.must_spawn(usb_task(usb.device));
    spawner.must_spawn(hid_writer_task(usb.mouse));
    INDICATORS.on(Led::UsbReady);

    spawner.must_spawn(decode_task());
    spawner.must_spawn(ble_task(sd));

    info!("daydream2usb initialised, looking for a controller");
}

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

#[embassy_executor::task]
async fn ble_task(sd: &'static Softdevice) -> ! {
    link::ble_task(sd, &PIPELINE, &INDICATORS).await
}

#[embassy_executor::task]
async fn decode_task() -> ! {
    worker::decode_task(&PIPELINE, &INDICATORS).await
}

#[embassy_executor::task]
async fn usb_task(device: UsbDevice<'static, UsbDriver>) -> ! {
    hid_device::run_usb_device(device).await
}

#[embassy_executor::task]
async fn hid_writer_task(mouse: UsbMouse) -> ! {
    hid_device::hid_writer_task(mouse, &PIPELINE).await
}

#[embassy_executor::task(pool_size = 3)]
async fn led_task(led: Led, driver: LedDriver<Output<'static>>) -> ! {
    leds::led_task(led, driver, &INDICATORS).await
}

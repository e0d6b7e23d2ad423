//! Recliner - Actuator Board Firmware
//!
//! Drives the two motors of a reclining chair for an RP2040-based actuator
//! board. Targets arrive over a framed serial link from the input board; the
//! control loop ramps duty, limits current and sequences the reversing relays.
//! Losing the link stops both motors.

#![no_std]
#![no_main]

use core::cell::RefCell;

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::adc::{Adc, Channel, Config as AdcConfig};
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::peripherals::UART0;
use embassy_rp::pwm::{Config as PwmConfig, Pwm};
use embassy_rp::uart::{BufferedInterruptHandler, Config as UartConfig, Uart};
use embassy_sync::blocking_mutex::Mutex;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use recliner_core::control::Coordinator;
use recliner_core::traits::{Clock, MotorIo};
use recliner_drivers::motor::{RelayBridge, RelayBridgeConfig};
use recliner_drivers::sensor::CurrentSense;

use crate::board::{AdcChannel, EmbassyClock, SharedAdc, CURRENT_SAMPLES, PWM_TOP};
use crate::channels::Shared;
use crate::config::{load_calibration, load_control_config, SettingsStore};

mod board;
mod channels;
mod config;
mod tasks;

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
});

// Static cells for UART buffers (must live forever)
static TX_BUF: StaticCell<[u8; 256]> = StaticCell::new();
static RX_BUF: StaticCell<[u8; 256]> = StaticCell::new();

static ADC: StaticCell<SharedAdc> = StaticCell::new();
static SHARED: StaticCell<Shared> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Recliner firmware starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    // Settings from flash, or defaults
    let mut store = SettingsStore::new(p.FLASH, p.DMA_CH0);
    let config = load_control_config(&mut store).await;
    let calibration = load_calibration(&mut store).await;
    let shared: &'static Shared = SHARED.init(Shared::new(config.ramp.reversal));
    info!("Configuration loaded");

    // Link UART (115200 8N1 default)
    let tx_buf = TX_BUF.init([0u8; 256]);
    let rx_buf = RX_BUF.init([0u8; 256]);

    let uart = Uart::new_blocking(p.UART0, p.PIN_0, p.PIN_1, UartConfig::default());
    let uart = uart.into_buffered(Irqs, tx_buf, rx_buf);
    let (tx, rx) = uart.split();

    info!("UART initialized for input board link");

    // Motor PWM: both motors on slice 1, starting at 0% duty
    let mut pwm_config = PwmConfig::default();
    pwm_config.top = PWM_TOP;
    let pwm = Pwm::new_output_ab(p.PWM_SLICE1, p.PIN_2, p.PIN_3, pwm_config);
    let (left_pwm, right_pwm) = pwm.split();
    let left_pwm = unwrap!(left_pwm);
    let right_pwm = unwrap!(right_pwm);

    let relay_config = RelayBridgeConfig::default();
    let left_bridge = RelayBridge::new(
        left_pwm,
        Output::new(p.PIN_6, Level::Low),
        Output::new(p.PIN_7, Level::Low),
        relay_config,
    );
    let right_bridge = RelayBridge::new(
        right_pwm,
        Output::new(p.PIN_8, Level::Low),
        Output::new(p.PIN_9, Level::Low),
        relay_config,
    );

    info!("PWM and relays initialized");

    // Current sense: one ADC shared by both channels
    let adc: &'static SharedAdc = ADC.init(Mutex::new(RefCell::new(Adc::new_blocking(
        p.ADC,
        AdcConfig::default(),
    ))));
    let left_current = CurrentSense::new(
        AdcChannel::new(adc, Channel::new_pin(p.PIN_26, Pull::None)),
        CURRENT_SAMPLES,
    );
    let right_current = CurrentSense::new(
        AdcChannel::new(adc, Channel::new_pin(p.PIN_27, Pull::None)),
        CURRENT_SAMPLES,
    );

    info!("ADC initialized");

    let coordinator = Coordinator::new(
        &config,
        &calibration,
        MotorIo::new(left_bridge, left_current, &shared.pulse_left),
        MotorIo::new(right_bridge, right_current, &shared.pulse_right),
        EmbassyClock.now_ms(),
    );

    // Speed sensors are open-collector
    let left_pulse = Input::new(p.PIN_10, Pull::Up);
    let right_pulse = Input::new(p.PIN_11, Pull::Up);

    // Spawn tasks
    unwrap!(spawner.spawn(tasks::control_task(coordinator, config, shared)));
    unwrap!(spawner.spawn(tasks::link_rx_task(rx, config.link, shared)));
    unwrap!(spawner.spawn(tasks::link_tx_task(tx, config.link, shared)));
    unwrap!(spawner.spawn(tasks::pulse_task(left_pulse, &shared.pulse_left, "left")));
    unwrap!(spawner.spawn(tasks::pulse_task(right_pulse, &shared.pulse_right, "right")));
    unwrap!(spawner.spawn(tasks::activity_task(config.activity, shared)));

    info!("All tasks spawned, firmware running");

    // Main task has nothing else to do - all work happens in spawned tasks
    loop {
        embassy_time::Timer::after_secs(60).await;
        trace!("Main loop heartbeat");
    }
}

//! Actuator board glue
//!
//! Pin map and the small adapters that connect embassy-rp peripherals to the
//! capability traits of the control core.
//!
//! | Function            | Pin            |
//! |---------------------|----------------|
//! | Link UART TX / RX   | GPIO0 / GPIO1  |
//! | Left / right PWM    | GPIO2 / GPIO3 (PWM slice 1 A/B) |
//! | Left relays A / B   | GPIO6 / GPIO7  |
//! | Right relays A / B  | GPIO8 / GPIO9  |
//! | Left / right pulse  | GPIO10 / GPIO11 |
//! | Left / right current| GPIO26 / GPIO27 (ADC0 / ADC1) |

use core::cell::RefCell;

use embassy_rp::adc::{Adc, Blocking, Channel};
use embassy_rp::gpio::Output;
use embassy_rp::pwm::PwmOutput;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::Instant;

use recliner_core::sensor::PulseLatch;
use recliner_core::traits::{Clock, MotorIo};
use recliner_drivers::motor::RelayBridge;
use recliner_drivers::sensor::{AdcReader, CurrentSense};

/// Conversions averaged per current reading
pub const CURRENT_SAMPLES: u8 = 4;

/// PWM counter top; 125MHz / 6250 = 20kHz, above audible range
pub const PWM_TOP: u16 = 6_249;

/// One motor channel as wired on this board
pub type BoardMotor = MotorIo<BoardBridge, CurrentSense<AdcChannel>, &'static PulseLatch>;

/// PWM channel plus reversing relay pair
pub type BoardBridge = RelayBridge<PwmOutput<'static>, Output<'static>, Output<'static>>;

/// The single ADC, shared by both current-sense channels
pub type SharedAdc = Mutex<CriticalSectionRawMutex, RefCell<Adc<'static, Blocking>>>;

/// Milliseconds since boot from the embassy time driver
#[derive(Clone, Copy, Default)]
pub struct EmbassyClock;

impl Clock for EmbassyClock {
    fn now_ms(&self) -> u32 {
        // Truncation gives the wrapping millisecond counter the core expects
        Instant::now().as_millis() as u32
    }
}

/// One ADC input read through the shared converter
pub struct AdcChannel {
    adc: &'static SharedAdc,
    channel: Channel<'static>,
}

impl AdcChannel {
    pub fn new(adc: &'static SharedAdc, channel: Channel<'static>) -> Self {
        Self { adc, channel }
    }
}

impl AdcReader for AdcChannel {
    fn read(&mut self) -> Result<u16, ()> {
        let channel = &mut self.channel;
        self.adc
            .lock(|adc| adc.borrow_mut().blocking_read(channel))
            .map_err(|_| ())
    }
}

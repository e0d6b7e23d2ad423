//! PWM + reversing relay motor driver
//!
//! This driver provides:
//! - PWM duty output scaled to the timer's resolution
//! - Direction via two relays (A energized = forward, B = reverse, both =
//!   brake, neither = open)
//! - Relay switching only with the PWM at zero
//!
//! # Usage
//!
//! ```ignore
//! let bridge = RelayBridge::new(pwm, relay_a, relay_b, RelayBridgeConfig::default());
//! let motor = MotorIo::new(bridge, current_sense, &PULSE_LEFT);
//! ```
//!
//! # Safety
//!
//! Relay contacts must never switch under load. The coordinator already
//! zeroes the PWM before it touches the relays; this driver forces the PWM to
//! zero again if a caller gets that wrong.

use embedded_hal::digital::{OutputPin, PinState};
use embedded_hal::pwm::SetDutyCycle;
use recliner_core::traits::{DirectionRelays, PwmOutput, RelayState, DUTY_FULL_X100};

/// Relay bridge configuration
#[derive(Debug, Clone, Copy)]
pub struct RelayBridgeConfig {
    /// Relay coil driven by a high pin (true) or low pin (false)
    pub active_high: bool,
}

impl Default for RelayBridgeConfig {
    fn default() -> Self {
        Self { active_high: true }
    }
}

/// One motor behind a PWM channel and two relays
pub struct RelayBridge<P, A, B> {
    pwm: P,
    relay_a: A,
    relay_b: B,
    config: RelayBridgeConfig,
    relays: RelayState,
    duty_x100: u16,
    /// Failed pin or PWM writes
    faults: u32,
}

impl<P: SetDutyCycle, A: OutputPin, B: OutputPin> RelayBridge<P, A, B> {
    /// Create a new driver with the PWM at zero and both relays released
    pub fn new(pwm: P, relay_a: A, relay_b: B, config: RelayBridgeConfig) -> Self {
        let mut bridge = Self {
            pwm,
            relay_a,
            relay_b,
            config,
            relays: RelayState::Open,
            duty_x100: 0,
            faults: 0,
        };
        bridge.set_pwm_duty(0);
        bridge.drive_relays(RelayState::Open);
        bridge
    }

    /// Last relay state written
    pub fn relays(&self) -> RelayState {
        self.relays
    }

    /// Last duty written (percent × 100)
    pub fn duty_x100(&self) -> u16 {
        self.duty_x100
    }

    /// Number of failed writes since construction
    pub fn faults(&self) -> u32 {
        self.faults
    }

    fn drive_relays(&mut self, state: RelayState) {
        let (a, b) = match state {
            RelayState::Open => (false, false),
            RelayState::Forward => (true, false),
            RelayState::Reverse => (false, true),
            RelayState::Brake => (true, true),
        };

        let level = |energized: bool| PinState::from(energized == self.config.active_high);
        let a = self.relay_a.set_state(level(a)).is_ok();
        let b = self.relay_b.set_state(level(b)).is_ok();
        if !(a && b) {
            self.faults = self.faults.wrapping_add(1);
        }
        self.relays = state;
    }
}

impl<P: SetDutyCycle, A, B> PwmOutput for RelayBridge<P, A, B> {
    fn set_pwm_duty(&mut self, duty_x100: u16) {
        let duty_x100 = duty_x100.min(DUTY_FULL_X100);
        let max = self.pwm.max_duty_cycle() as u32;
        let raw = (max * duty_x100 as u32 / DUTY_FULL_X100 as u32) as u16;

        if self.pwm.set_duty_cycle(raw).is_err() {
            self.faults = self.faults.wrapping_add(1);
        }
        self.duty_x100 = duty_x100;
    }
}

impl<P: SetDutyCycle, A: OutputPin, B: OutputPin> DirectionRelays for RelayBridge<P, A, B> {
    fn set_direction_relays(&mut self, state: RelayState) {
        if state == self.relays {
            return;
        }
        if self.duty_x100 != 0 {
            self.set_pwm_duty(0);
        }
        self.drive_relays(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType as PinErrorType;
    use embedded_hal::pwm::ErrorType as PwmErrorType;

    /// Mock GPIO pin for testing
    struct MockPin {
        high: bool,
    }

    impl MockPin {
        fn new() -> Self {
            Self { high: false }
        }
    }

    impl PinErrorType for MockPin {
        type Error = Infallible;
    }

    impl OutputPin for MockPin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.high = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.high = true;
            Ok(())
        }
    }

    /// Mock PWM channel with a 0..=1000 range
    struct MockPwm {
        duty: u16,
    }

    impl PwmErrorType for MockPwm {
        type Error = Infallible;
    }

    impl SetDutyCycle for MockPwm {
        fn max_duty_cycle(&self) -> u16 {
            1000
        }

        fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Infallible> {
            self.duty = duty;
            Ok(())
        }
    }

    fn bridge(active_high: bool) -> RelayBridge<MockPwm, MockPin, MockPin> {
        RelayBridge::new(
            MockPwm { duty: 77 },
            MockPin::new(),
            MockPin::new(),
            RelayBridgeConfig { active_high },
        )
    }

    #[test]
    fn test_starts_open_at_zero() {
        let bridge = bridge(true);
        assert_eq!(bridge.pwm.duty, 0);
        assert_eq!(bridge.relays(), RelayState::Open);
        assert!(!bridge.relay_a.high);
        assert!(!bridge.relay_b.high);
    }

    #[test]
    fn test_duty_scaling() {
        let mut bridge = bridge(true);
        bridge.set_pwm_duty(5000);
        assert_eq!(bridge.pwm.duty, 500);

        bridge.set_pwm_duty(12_000);
        assert_eq!(bridge.pwm.duty, 1000);
        assert_eq!(bridge.duty_x100(), DUTY_FULL_X100);
    }

    #[test]
    fn test_relay_patterns() {
        let mut bridge = bridge(true);

        bridge.set_direction_relays(RelayState::Forward);
        assert!(bridge.relay_a.high && !bridge.relay_b.high);

        bridge.set_direction_relays(RelayState::Reverse);
        assert!(!bridge.relay_a.high && bridge.relay_b.high);

        bridge.set_direction_relays(RelayState::Brake);
        assert!(bridge.relay_a.high && bridge.relay_b.high);
    }

    #[test]
    fn test_active_low_relays() {
        let mut bridge = bridge(false);
        // Released coils sit high
        assert!(bridge.relay_a.high && bridge.relay_b.high);

        bridge.set_direction_relays(RelayState::Forward);
        assert!(!bridge.relay_a.high && bridge.relay_b.high);
    }

    #[test]
    fn test_switch_forces_zero_pwm() {
        let mut bridge = bridge(true);
        bridge.set_direction_relays(RelayState::Forward);
        bridge.set_pwm_duty(3000);

        bridge.set_direction_relays(RelayState::Reverse);
        assert_eq!(bridge.pwm.duty, 0);
        assert_eq!(bridge.relays(), RelayState::Reverse);
    }

    #[test]
    fn test_same_state_keeps_pwm() {
        let mut bridge = bridge(true);
        bridge.set_direction_relays(RelayState::Forward);
        bridge.set_pwm_duty(3000);

        bridge.set_direction_relays(RelayState::Forward);
        assert_eq!(bridge.pwm.duty, 300);
    }
}

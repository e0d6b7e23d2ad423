//! Per-motor duty ramp with relay-safe reversal
//!
//! Each tick moves the applied duty toward the target by at most
//! `elapsed / fade * 100` percent. Increasing duty uses the accel fade,
//! decreasing duty the decel fade.
//!
//! Direction changes never happen at nonzero duty. A drive state whose target
//! is anything other than "same direction" first winds down to zero, then
//! rests (Idle, or Brake if braking was requested) and starts the
//! relay-settle hold. The opposite direction is engaged from rest only once
//! that hold has elapsed.
//!
//! ```ignore
//! let mut ramp = RampController::new(config, now_ms);
//! ramp.set_target(MotorCommand::new(MotorState::Forward, 80))?;
//!
//! // Every control period:
//! let duty_x100 = ramp.tick(now_ms);
//! pwm.set_pwm_duty(duty_x100);
//! ```

use recliner_protocol::{MotorCommand, MotorState};

use crate::config::{RampConfig, ReversalPolicy, MIN_FADE_MS};
use crate::traits::{deadline_reached, DUTY_FULL_X100};

/// Rejected `set_target` request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InvalidTarget {
    /// Duty above 100%
    DutyOutOfRange(u8),
    /// Opposite direction requested while the motor is still turning
    DirectReversal,
}

/// Which fade a [`RampController::set_fade`] call changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FadeKind {
    Accel,
    Decel,
}

/// New fade value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FadeSetting {
    /// Jump to the goal on the next tick
    Disabled,
    /// Time for a full 0..100% swing
    Duration(u32),
}

impl FadeSetting {
    fn as_ms(self) -> u32 {
        match self {
            FadeSetting::Disabled => MIN_FADE_MS,
            FadeSetting::Duration(ms) => ms.max(MIN_FADE_MS),
        }
    }
}

/// Snapshot of one motor's ramp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotorRampState {
    /// Applied relay/drive state
    pub state: MotorState,
    /// Applied duty (percent × 100)
    pub duty_now_x100: u16,
    /// Requested state and duty, max-duty override already applied
    pub target: MotorCommand,
    pub fade_accel_ms: u32,
    pub fade_decel_ms: u32,
    pub last_tick_ms: u32,
    /// Opposite direction may not engage before this time; cleared by the
    /// first tick at or past it
    pub reversal_hold_until: Option<u32>,
}

/// One candidate step, offered to a clamp before it is committed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RampStep {
    /// State the motor will be in after this tick
    pub state: MotorState,
    /// Duty before this tick (percent × 100)
    pub prev_x100: u16,
    /// Unclamped duty for this tick (percent × 100)
    pub candidate_x100: u16,
    /// Largest decrease the decel fade allows this tick (percent × 100)
    pub decel_step_x100: u16,
}

/// Ramp controller for one motor
#[derive(Debug, Clone)]
pub struct RampController {
    ramp: MotorRampState,
    relay_settle_ms: u32,
    max_duty: u8,
    reversal: ReversalPolicy,
    /// Direction of the last drive, for the reversal hold
    last_drive: Option<MotorState>,
}

impl RampController {
    /// Create an idle controller
    pub fn new(config: RampConfig, now_ms: u32) -> Self {
        Self {
            ramp: MotorRampState {
                state: MotorState::Idle,
                duty_now_x100: 0,
                target: MotorCommand::idle(),
                fade_accel_ms: config.fade_accel_ms.max(MIN_FADE_MS),
                fade_decel_ms: config.fade_decel_ms.max(MIN_FADE_MS),
                last_tick_ms: now_ms,
                reversal_hold_until: None,
            },
            relay_settle_ms: config.relay_settle_ms,
            max_duty: config.max_duty.min(100),
            reversal: config.reversal,
            last_drive: None,
        }
    }

    /// Full ramp state
    pub fn ramp_state(&self) -> &MotorRampState {
        &self.ramp
    }

    /// Applied state and duty, duty rounded to whole percent
    pub fn status(&self) -> MotorCommand {
        MotorCommand::new(self.ramp.state, duty_percent(self.ramp.duty_now_x100))
    }

    /// Applied duty in hundredths of a percent
    pub fn duty_x100(&self) -> u16 {
        self.ramp.duty_now_x100
    }

    /// Current target
    pub fn target(&self) -> MotorCommand {
        self.ramp.target
    }

    /// Replace the target (last write wins)
    ///
    /// Never moves duty; the next tick does. Idle and Brake targets carry no
    /// duty and are stored as 0.
    pub fn set_target(&mut self, command: MotorCommand) -> Result<(), InvalidTarget> {
        self.check_target(command)?;

        let duty = if command.state.is_drive() {
            command.duty.min(self.max_duty)
        } else {
            0
        };
        self.ramp.target = MotorCommand::new(command.state, duty);
        Ok(())
    }

    /// Validate `command` without storing it
    pub fn check_target(&self, command: MotorCommand) -> Result<(), InvalidTarget> {
        if command.duty > 100 {
            warn!("ramp: rejected target duty {}", command.duty);
            return Err(InvalidTarget::DutyOutOfRange(command.duty));
        }

        if self.reversal == ReversalPolicy::Reject
            && self.ramp.duty_now_x100 > 0
            && command.state.opposes(self.ramp.state)
        {
            warn!("ramp: rejected direct reversal");
            return Err(InvalidTarget::DirectReversal);
        }
        Ok(())
    }

    /// Change one of the fades; takes effect on the next tick
    pub fn set_fade(&mut self, kind: FadeKind, setting: FadeSetting) {
        let ms = setting.as_ms();
        match kind {
            FadeKind::Accel => self.ramp.fade_accel_ms = ms,
            FadeKind::Decel => self.ramp.fade_decel_ms = ms,
        }
    }

    /// Change the max-duty override; lowers the current target if needed
    pub fn set_max_duty(&mut self, max_duty: u8) {
        self.max_duty = max_duty.min(100);
        self.ramp.target.duty = self.ramp.target.duty.min(self.max_duty);
    }

    /// Drop to Idle at zero duty right now and start the relay hold
    pub fn emergency_stop(&mut self, now_ms: u32) {
        if self.ramp.state.is_drive() {
            self.enter_rest(MotorState::Idle, now_ms);
        } else {
            self.ramp.state = MotorState::Idle;
        }
        self.ramp.duty_now_x100 = 0;
        self.ramp.target = MotorCommand::idle();
        self.ramp.last_tick_ms = now_ms;
    }

    /// Advance the ramp without any external clamp
    pub fn tick(&mut self, now_ms: u32) -> u16 {
        self.tick_with(now_ms, |step| step.candidate_x100)
    }

    /// Advance the ramp, letting `clamp` lower the candidate duty
    ///
    /// The committed duty is `min(clamp(step), candidate)`, so a clamp can
    /// only slow the motor down.
    pub fn tick_with(&mut self, now_ms: u32, clamp: impl FnOnce(&RampStep) -> u16) -> u16 {
        let elapsed = now_ms.wrapping_sub(self.ramp.last_tick_ms);
        self.ramp.last_tick_ms = now_ms;

        // Rest starts no earlier than the previous tick, so a gap of at least
        // the settle time also ends the hold when the clock has wrapped
        if let Some(until) = self.ramp.reversal_hold_until {
            if deadline_reached(now_ms, until) || elapsed >= self.relay_settle_ms {
                self.ramp.reversal_hold_until = None;
                self.last_drive = None;
            }
        }

        let (state, goal_x100) = self.plan();
        let prev_x100 = self.ramp.duty_now_x100;

        let accel_step = step_x100(elapsed, self.ramp.fade_accel_ms);
        let decel_step = step_x100(elapsed, self.ramp.fade_decel_ms);
        let candidate_x100 = if goal_x100 > prev_x100 {
            prev_x100.saturating_add(accel_step).min(goal_x100)
        } else {
            prev_x100.saturating_sub(decel_step).max(goal_x100)
        };

        let step = RampStep {
            state,
            prev_x100,
            candidate_x100,
            decel_step_x100: decel_step,
        };
        let duty = clamp(&step).min(candidate_x100);

        if state != self.ramp.state {
            debug!("ramp: state -> {}", state);
        }
        self.ramp.state = state;
        self.ramp.duty_now_x100 = duty;

        // Wound down for a change of direction or a stop
        let target = self.ramp.target.state;
        if state.is_drive() && duty == 0 && goal_x100 == 0 && target != state {
            let rest = if target == MotorState::Brake {
                MotorState::Brake
            } else {
                MotorState::Idle
            };
            self.enter_rest(rest, now_ms);
        }

        self.ramp.duty_now_x100
    }

    /// State to apply this tick and the duty to move toward
    fn plan(&self) -> (MotorState, u16) {
        let current = self.ramp.state;
        let target = self.ramp.target;
        let target_x100 = target.duty as u16 * 100;

        if current.is_drive() {
            if target.state == current {
                (current, target_x100)
            } else {
                (current, 0)
            }
        } else if target.state.is_drive() {
            let held = match (self.last_drive, self.ramp.reversal_hold_until) {
                (Some(last), Some(_)) => last.opposes(target.state),
                _ => false,
            };
            if held {
                (current, 0)
            } else {
                (target.state, target_x100)
            }
        } else {
            (target.state, 0)
        }
    }

    fn enter_rest(&mut self, rest: MotorState, now_ms: u32) {
        self.last_drive = Some(self.ramp.state);
        self.ramp.state = rest;
        self.ramp.reversal_hold_until = Some(now_ms.wrapping_add(self.relay_settle_ms));
        debug!("ramp: resting in {}, hold {} ms", rest, self.relay_settle_ms);
    }
}

/// Largest duty change for `elapsed` ms on a `fade_ms` full swing
fn step_x100(elapsed_ms: u32, fade_ms: u32) -> u16 {
    let step = elapsed_ms as u64 * DUTY_FULL_X100 as u64 / fade_ms.max(MIN_FADE_MS) as u64;
    step.min(DUTY_FULL_X100 as u64) as u16
}

/// Round hundredths of a percent to whole percent
pub fn duty_percent(duty_x100: u16) -> u8 {
    ((duty_x100.min(DUTY_FULL_X100) + 50) / 100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn config() -> RampConfig {
        RampConfig {
            fade_accel_ms: 2000,
            fade_decel_ms: 1000,
            relay_settle_ms: 200,
            max_duty: 100,
            reversal: ReversalPolicy::Defer,
        }
    }

    fn forward(duty: u8) -> MotorCommand {
        MotorCommand::new(MotorState::Forward, duty)
    }

    fn reverse(duty: u8) -> MotorCommand {
        MotorCommand::new(MotorState::Reverse, duty)
    }

    #[test]
    fn test_accelerates_at_fade_rate() {
        let mut ramp = RampController::new(config(), 0);
        ramp.set_target(forward(80)).unwrap();

        ramp.tick(100);
        assert_eq!(ramp.status(), forward(5));

        for i in 2..=16 {
            ramp.tick(i * 100);
        }
        assert_eq!(ramp.status(), forward(80));

        // Holds at target
        ramp.tick(1700);
        ramp.tick(1800);
        assert_eq!(ramp.status(), forward(80));
    }

    #[test]
    fn test_set_target_does_not_move_duty() {
        let mut ramp = RampController::new(config(), 0);
        ramp.set_target(forward(50)).unwrap();
        assert_eq!(ramp.duty_x100(), 0);
        assert_eq!(ramp.status().state, MotorState::Idle);
    }

    #[test]
    fn test_reversal_winds_down_and_holds() {
        let mut ramp = RampController::new(config(), 0);
        ramp.set_target(forward(60)).unwrap();
        let mut now = 0;
        while ramp.duty_x100() < 6000 {
            now += 100;
            ramp.tick(now);
        }

        ramp.set_target(reverse(60)).unwrap();
        assert_eq!(ramp.status(), forward(60));

        // Decel at 10% per 100 ms
        now += 100;
        ramp.tick(now);
        assert_eq!(ramp.status(), forward(50));

        while ramp.status().state == MotorState::Forward {
            now += 100;
            ramp.tick(now);
        }
        assert_eq!(ramp.status(), MotorCommand::new(MotorState::Idle, 0));
        let rest_at = now;

        // Still resting inside the settle window
        now += 100;
        ramp.tick(now);
        assert_eq!(ramp.status(), MotorCommand::new(MotorState::Idle, 0));

        now = rest_at + 200;
        ramp.tick(now);
        assert_eq!(ramp.status(), reverse(5));
    }

    #[test]
    fn test_reject_policy() {
        let mut ramp = RampController::new(
            RampConfig {
                reversal: ReversalPolicy::Reject,
                ..config()
            },
            0,
        );
        ramp.set_target(forward(40)).unwrap();
        ramp.tick(100);

        assert_eq!(
            ramp.set_target(reverse(40)),
            Err(InvalidTarget::DirectReversal)
        );
        assert_eq!(ramp.target(), forward(40));

        // Stopping first is fine
        ramp.set_target(MotorCommand::idle()).unwrap();
    }

    #[test]
    fn test_duty_out_of_range() {
        let mut ramp = RampController::new(config(), 0);
        ramp.set_target(forward(30)).unwrap();
        assert_eq!(
            ramp.set_target(forward(101)),
            Err(InvalidTarget::DutyOutOfRange(101))
        );
        assert_eq!(ramp.target(), forward(30));
    }

    #[test]
    fn test_max_duty_override() {
        let mut ramp = RampController::new(
            RampConfig {
                max_duty: 70,
                ..config()
            },
            0,
        );
        ramp.set_target(forward(90)).unwrap();
        assert_eq!(ramp.target(), forward(70));

        ramp.set_max_duty(50);
        assert_eq!(ramp.target(), forward(50));
    }

    #[test]
    fn test_same_direction_reengage_is_immediate() {
        let mut ramp = RampController::new(config(), 0);
        ramp.set_target(forward(10)).unwrap();
        ramp.tick(200);
        ramp.set_target(MotorCommand::idle()).unwrap();
        ramp.tick(300);
        assert_eq!(ramp.status().state, MotorState::Idle);

        ramp.set_target(forward(10)).unwrap();
        ramp.tick(310);
        assert_eq!(ramp.status().state, MotorState::Forward);
    }

    #[test]
    fn test_brake_rests_in_brake() {
        let mut ramp = RampController::new(config(), 0);
        ramp.set_target(forward(10)).unwrap();
        ramp.tick(200);
        ramp.set_target(MotorCommand::new(MotorState::Brake, 0)).unwrap();
        ramp.tick(300);
        assert_eq!(ramp.status(), MotorCommand::new(MotorState::Brake, 0));
    }

    #[test]
    fn test_fade_disabled_jumps() {
        let mut ramp = RampController::new(config(), 0);
        ramp.set_fade(FadeKind::Accel, FadeSetting::Disabled);
        ramp.set_target(forward(75)).unwrap();
        ramp.tick(20);
        assert_eq!(ramp.status(), forward(75));

        ramp.set_fade(FadeKind::Decel, FadeSetting::Duration(0));
        assert_eq!(ramp.ramp_state().fade_decel_ms, MIN_FADE_MS);
    }

    #[test]
    fn test_emergency_stop() {
        let mut ramp = RampController::new(config(), 0);
        ramp.set_target(reverse(50)).unwrap();
        ramp.tick(500);
        ramp.emergency_stop(510);

        assert_eq!(ramp.status(), MotorCommand::idle());
        assert_eq!(ramp.target(), MotorCommand::idle());
        assert_eq!(ramp.ramp_state().reversal_hold_until, Some(710));

        // Forward is held off until the relays settle
        ramp.set_target(forward(50)).unwrap();
        ramp.tick(600);
        assert_eq!(ramp.status().state, MotorState::Idle);
        ramp.tick(710);
        assert_eq!(ramp.status().state, MotorState::Forward);
    }

    #[test]
    fn test_clamp_only_lowers() {
        let mut ramp = RampController::new(config(), 0);
        ramp.set_target(forward(50)).unwrap();
        let duty = ramp.tick_with(100, |_| DUTY_FULL_X100);
        assert_eq!(duty, 500);

        let duty = ramp.tick_with(200, |step| step.prev_x100);
        assert_eq!(duty, 500);
    }

    #[test]
    fn test_reverse_after_long_rest() {
        let mut ramp = RampController::new(config(), 0);
        ramp.set_target(forward(10)).unwrap();
        ramp.tick(100);
        ramp.tick(200);
        ramp.set_target(MotorCommand::idle()).unwrap();
        ramp.tick(300);
        assert_eq!(ramp.status(), MotorCommand::new(MotorState::Idle, 0));
        assert_eq!(ramp.ramp_state().reversal_hold_until, Some(500));

        // Long enough for the old hold to look current again as a signed delta
        let mut now = 300u32.wrapping_add(200).wrapping_add(1 << 31).wrapping_add(1000);
        assert!(!deadline_reached(now, 500));

        ramp.set_target(reverse(50)).unwrap();
        for _ in 0..100 {
            now = now.wrapping_add(20);
            ramp.tick(now);
        }
        assert_eq!(ramp.status().state, MotorState::Reverse);
        assert_eq!(ramp.ramp_state().reversal_hold_until, None);
    }

    #[test]
    fn test_tick_across_clock_wrap() {
        let start = u32::MAX - 50;
        let mut ramp = RampController::new(config(), start);
        ramp.set_target(forward(50)).unwrap();
        ramp.tick(start.wrapping_add(100));
        assert_eq!(ramp.duty_x100(), 500);
    }

    fn command() -> impl Strategy<Value = MotorCommand> {
        (0u8..4, 0u8..=100).prop_map(|(state, duty)| {
            MotorCommand::new(MotorState::from_byte(state).unwrap(), duty)
        })
    }

    proptest! {
        #[test]
        fn prop_duty_rate_bounded(
            steps in proptest::collection::vec((command(), 1u32..300), 1..60)
        ) {
            let cfg = config();
            let mut ramp = RampController::new(cfg, 0);
            let mut now = 0u32;

            for (cmd, elapsed) in steps {
                ramp.set_target(cmd).unwrap();
                let prev = ramp.duty_x100();
                now += elapsed;
                let duty = ramp.tick(now);

                prop_assert!(duty <= DUTY_FULL_X100);
                if duty > prev {
                    prop_assert!(duty - prev <= step_x100(elapsed, cfg.fade_accel_ms));
                } else {
                    prop_assert!(prev - duty <= step_x100(elapsed, cfg.fade_decel_ms));
                }
            }
        }

        #[test]
        fn prop_no_direct_reversal(
            steps in proptest::collection::vec((command(), 1u32..300), 1..80)
        ) {
            let cfg = config();
            let mut ramp = RampController::new(cfg, 0);
            let mut now = 0u32;
            let mut prev = ramp.status().state;
            let mut rest_since: Option<u32> = None;
            let mut last_drive: Option<MotorState> = None;

            for (cmd, elapsed) in steps {
                ramp.set_target(cmd).unwrap();
                now += elapsed;
                let prev_duty = ramp.duty_x100();
                ramp.tick(now);
                let state = ramp.status().state;

                prop_assert!(!prev.opposes(state));
                if prev.is_drive() && !state.is_drive() {
                    prop_assert_eq!(ramp.duty_x100(), 0);
                    rest_since = Some(now);
                    last_drive = Some(prev);
                }
                if !prev.is_drive() && state.is_drive() {
                    prop_assert_eq!(prev_duty, 0);
                    if let (Some(last), Some(since)) = (last_drive, rest_since) {
                        if last.opposes(state) {
                            prop_assert!(now - since >= cfg.relay_settle_ms);
                        }
                    }
                }
                prev = state;
            }
        }
    }
}

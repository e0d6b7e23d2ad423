//! Mode state machine interface and inactivity detection
//!
//! The mode/timeout state machine itself lives with the input logic. The core
//! only asks it for the current target pair and offers a slow periodic check
//! that tells it when the chair has been sitting still for too long.

use recliner_protocol::{MotorCommand, MotorCommandPair};

use crate::config::ActivityConfig;

/// Something that knows what both motors should be doing right now
pub trait ModeTargets {
    fn target_for_now(&mut self, now_ms: u32) -> MotorCommandPair;
}

/// Result of one activity check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Activity {
    /// Duty moved since the previous check
    Active,
    /// No movement, still inside the timeout
    Quiet,
    /// No movement for longer than the timeout; the mode machine should go
    /// back to Idle
    Expired,
}

/// Slow periodic inactivity check
#[derive(Debug, Clone)]
pub struct ActivityMonitor {
    config: ActivityConfig,
    last_status: Option<MotorCommandPair>,
    last_active_ms: u32,
    expired: bool,
}

impl ActivityMonitor {
    pub fn new(config: ActivityConfig, now_ms: u32) -> Self {
        Self {
            config,
            last_status: None,
            last_active_ms: now_ms,
            expired: false,
        }
    }

    /// Compare `status` with the previous check
    pub fn check(&mut self, now_ms: u32, status: MotorCommandPair) -> Activity {
        let moved = match self.last_status {
            Some(prev) => {
                self.moved(prev.left, status.left) || self.moved(prev.right, status.right)
            }
            None => true,
        };
        self.last_status = Some(status);

        if moved {
            self.last_active_ms = now_ms;
            self.expired = false;
            return Activity::Active;
        }

        if now_ms.wrapping_sub(self.last_active_ms) > self.config.timeout_ms {
            if !self.expired {
                info!("activity: idle for {} ms", self.config.timeout_ms);
                self.expired = true;
            }
            Activity::Expired
        } else {
            Activity::Quiet
        }
    }

    /// Treat `now_ms` as activity, e.g. on user input
    pub fn reset(&mut self, now_ms: u32) {
        self.last_active_ms = now_ms;
        self.expired = false;
    }

    /// Interval the caller should run [`check`](Self::check) at
    pub fn check_period_ms(&self) -> u32 {
        self.config.check_period_ms
    }

    fn moved(&self, prev: MotorCommand, now: MotorCommand) -> bool {
        let delta_x100 = (prev.duty as i32 - now.duty as i32).unsigned_abs() * 100;
        prev.state != now.state || delta_x100 >= self.config.tolerance_x100 as u32
    }
}

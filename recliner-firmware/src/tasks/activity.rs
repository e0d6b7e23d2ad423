//! Slow inactivity check
//!
//! Watches the applied status at the activity check period. Going back to
//! Idle is the input board's decision; this side only logs it so a stuck
//! target shows up in the trace.

use defmt::*;
use embassy_time::{Duration, Ticker};

use recliner_core::config::ActivityConfig;
use recliner_core::control::{Activity, ActivityMonitor};
use recliner_core::traits::Clock;

use crate::board::EmbassyClock;
use crate::channels::Shared;

#[embassy_executor::task]
pub async fn activity_task(config: ActivityConfig, shared: &'static Shared) {
    let clock = EmbassyClock;
    let mut monitor = ActivityMonitor::new(config, clock.now_ms());
    let mut ticker = Ticker::every(Duration::from_millis(monitor.check_period_ms() as u64));
    let mut last = Activity::Active;

    loop {
        ticker.next().await;

        let status = shared.bus.status();
        let activity = monitor.check(clock.now_ms(), status);
        let driving = status.left.duty > 0 || status.right.duty > 0;
        if activity == Activity::Expired && last != Activity::Expired && driving {
            warn!("Motors held at {:?} with no movement", status);
        }
        last = activity;
    }
}

//! Fast control loop
//!
//! Ticks the coordinator at the configured control period: polls the link
//! command source, advances both ramps through the current governor and
//! writes the hardware. Publishes the applied status for the link and the
//! activity check.

use defmt::*;
use embassy_time::{Duration, Ticker};

use recliner_core::config::ControlConfig;
use recliner_core::control::{Coordinator, RemoteSource};
use recliner_core::traits::Clock;

use crate::board::{BoardMotor, EmbassyClock};
use crate::channels::Shared;

/// Control loop task
///
/// Owns the coordinator; ramp state is only ever touched from here.
#[embassy_executor::task]
pub async fn control_task(
    mut coordinator: Coordinator<BoardMotor>,
    config: ControlConfig,
    shared: &'static Shared,
) {
    info!("Control task started, period {}ms", config.control_period_ms);

    let clock = EmbassyClock;
    let mut source = RemoteSource::new(&shared.bus, &shared.link, config.link.liveness_timeout_ms);
    let mut ticker = Ticker::every(Duration::from_millis(config.control_period_ms as u64));

    let mut last_status = coordinator.status();
    shared.bus.publish(last_status);

    loop {
        ticker.next().await;

        let now_ms = clock.now_ms();
        let status = coordinator.tick(now_ms, &mut source);

        shared.bus.publish(status);
        if status != last_status {
            trace!("Status: {:?}", status);
            last_status = status;
            shared.status_changed.signal(());
        }
        shared.report.signal(coordinator.report());
    }
}

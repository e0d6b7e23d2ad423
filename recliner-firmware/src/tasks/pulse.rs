//! Speed pulse edge timing
//!
//! Times rising edges of a motor's speed sensor and publishes the period to
//! its pulse latch. A sensor that stays quiet for longer than
//! [`PULSE_TIMEOUT_MS`] is reported as period 0 (stopped).

use defmt::*;
use embassy_rp::gpio::Input;
use embassy_time::{with_timeout, Duration, Instant};

use recliner_core::sensor::PulseLatch;

/// Longest gap between edges still counted as turning
pub const PULSE_TIMEOUT_MS: u64 = 250;

/// Pulse timing task, one per motor
#[embassy_executor::task(pool_size = 2)]
pub async fn pulse_task(mut input: Input<'static>, latch: &'static PulseLatch, name: &'static str) {
    info!("Pulse task started ({})", name);

    let mut last_edge: Option<Instant> = None;

    loop {
        match with_timeout(
            Duration::from_millis(PULSE_TIMEOUT_MS),
            input.wait_for_rising_edge(),
        )
        .await
        {
            Ok(()) => {
                let now = Instant::now();
                if let Some(prev) = last_edge {
                    let period_us = (now - prev).as_micros().min(u32::MAX as u64) as u32;
                    latch.publish(period_us);
                }
                last_edge = Some(now);
            }
            Err(_) => {
                if last_edge.take().is_some() {
                    trace!("{} motor: pulses stopped", name);
                    latch.publish(0);
                }
            }
        }
    }
}

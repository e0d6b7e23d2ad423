//! Link UART transmit task
//!
//! Reports the applied motor status to the input board whenever it changes,
//! plus a status heartbeat and a telemetry burst at a slower cadence.

use defmt::*;
use embassy_futures::select::{select, Either};
use embassy_rp::uart::BufferedUartTx;
use embassy_time::{Delay, Duration, Ticker};

use recliner_core::config::LinkConfig;
use recliner_core::link::TransportTx;
use recliner_core::traits::Clock;
use recliner_protocol::Message;

use crate::board::EmbassyClock;
use crate::channels::Shared;

/// Status heartbeat and telemetry cadence
const REPORT_INTERVAL_MS: u64 = 500;

type LinkTx = TransportTx<BufferedUartTx, EmbassyClock, Delay>;

/// Link TX task - sends status and telemetry to the input board
#[embassy_executor::task]
pub async fn link_tx_task(tx: BufferedUartTx, config: LinkConfig, shared: &'static Shared) {
    info!("Link TX task started");

    let mut transport: LinkTx = TransportTx::new(tx, EmbassyClock, Delay, &config);
    let mut ticker = Ticker::every(Duration::from_millis(REPORT_INTERVAL_MS));

    loop {
        let heartbeat = match select(shared.status_changed.wait(), ticker.next()).await {
            Either::First(()) => false,
            Either::Second(()) => true,
        };

        send(&mut transport, &Message::Status(shared.bus.status())).await;
        if heartbeat {
            send_telemetry(&mut transport, shared).await;
        }
    }
}

/// Send the latest per-motor report as telemetry records
async fn send_telemetry(transport: &mut LinkTx, shared: &Shared) {
    let Some(report) = shared.report.try_take() else {
        return;
    };

    for record in report.telemetry(EmbassyClock.now_ms()) {
        send(transport, &Message::Telemetry(record)).await;
    }
}

async fn send(transport: &mut LinkTx, message: &Message) {
    if let Err(e) = transport.send(message).await {
        warn!("Failed to send message: {:?}", e);
    }
}

//! Link UART receive task
//!
//! Decodes frames from the input board. Every valid message refreshes the
//! link monitor; commands go to the control bus.

use defmt::*;
use embassy_rp::uart::BufferedUartRx;
use embassy_time::Delay;

use recliner_core::config::LinkConfig;
use recliner_core::link::TransportRx;
use recliner_protocol::Message;

use crate::board::EmbassyClock;
use crate::channels::{Bus, Shared};

/// Link RX task - receives and dispatches messages from the input board
#[embassy_executor::task]
pub async fn link_rx_task(rx: BufferedUartRx, config: LinkConfig, shared: &'static Shared) {
    info!("Link RX task started");

    let mut transport = TransportRx::new(rx, EmbassyClock, Delay, &shared.link, &config);

    loop {
        match transport.poll(|message| handle_message(&shared.bus, message)).await {
            Ok(0) => {}
            Ok(n) => trace!("RX: {} bytes", n),
            Err(e) => {
                let stats = transport.stats();
                warn!("UART read error: {:?} ({} so far)", e, stats.io_errors);
            }
        }
    }
}

/// Handle one decoded message
fn handle_message(bus: &Bus, message: Message) {
    match message {
        Message::Command(pair) => {
            debug!("Command: {:?}", pair);
            if let Err(e) = bus.set_target(pair) {
                warn!("Command rejected: {:?}", e);
            }
        }
        Message::Status(_) => {
            // Only the actuator board reports status
            trace!("Ignoring status from input board");
        }
        Message::Telemetry(record) => {
            trace!("Telemetry id {} from input board", record.id);
        }
    }
}

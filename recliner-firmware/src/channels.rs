//! Inter-task shared state
//!
//! Everything the tasks share lives in one [`Shared`], built once at boot
//! and handed to each task as a `&'static` reference. The control core types
//! do their own synchronization.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

use recliner_core::config::ReversalPolicy;
use recliner_core::control::{ControlBus, CoordinatorReport};
use recliner_core::safety::LinkMonitor;
use recliner_core::sensor::PulseLatch;

pub type Bus = ControlBus<CriticalSectionRawMutex>;

pub struct Shared {
    /// Target register and status snapshot between the link and the
    /// control loop
    pub bus: Bus,
    /// Timestamp of the last valid frame from the input board
    pub link: LinkMonitor,
    /// Speed pulse periods from the edge-timing tasks
    pub pulse_left: PulseLatch,
    pub pulse_right: PulseLatch,
    /// Latest per-motor report, for the telemetry sender
    pub report: Signal<CriticalSectionRawMutex, CoordinatorReport>,
    /// Raised by the control loop whenever the applied status changes
    pub status_changed: Signal<CriticalSectionRawMutex, ()>,
}

impl Shared {
    pub const fn new(reversal: ReversalPolicy) -> Self {
        Self {
            bus: ControlBus::new(reversal),
            link: LinkMonitor::new(),
            pulse_left: PulseLatch::new(),
            pulse_right: PulseLatch::new(),
            report: Signal::new(),
            status_changed: Signal::new(),
        }
    }
}

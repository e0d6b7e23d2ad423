//! Command sources
//!
//! The coordinator does not care where targets come from. Once per tick it
//! polls a [`CommandSource`], which either leaves the target alone, replaces
//! it, or demands a failsafe stop.
//!
//! - [`ControlBus`]: target register written by any task, plus the status
//!   snapshot the control loop publishes back
//! - [`RemoteSource`]: a bus fed by decoded frames, gated by link liveness
//! - [`ModeSource`]: targets chosen by the local mode state machine
//!
//! The actuator firmware polls only [`RemoteSource`]. [`ModeSource`] is polled
//! by the input board's mode logic, which owns its timer.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use recliner_protocol::{MotorCommand, MotorCommandPair};

use super::activity::ModeTargets;
use crate::config::ReversalPolicy;
use crate::motion::InvalidTarget;
use crate::safety::LinkMonitor;

/// What the control loop should do this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SourceCommand {
    /// Keep the current target
    Keep,
    /// Replace the target
    Target(MotorCommandPair),
    /// Stop both motors now
    Failsafe,
}

/// Upstream provider of motor targets
pub trait CommandSource {
    fn poll(&mut self, now_ms: u32) -> SourceCommand;
}

impl<S: CommandSource + ?Sized> CommandSource for &mut S {
    fn poll(&mut self, now_ms: u32) -> SourceCommand {
        (**self).poll(now_ms)
    }
}

/// Shared target register and status snapshot
///
/// Producers call [`set_target`](Self::set_target) from any task; the control
/// loop calls [`take`](Self::take) and [`publish`](Self::publish). Every
/// access is a short critical section copying the whole pair, so readers never
/// see half of an update.
pub struct ControlBus<M: RawMutex> {
    pending: Mutex<M, Cell<Option<MotorCommandPair>>>,
    status: Mutex<M, Cell<MotorCommandPair>>,
    reversal: Mutex<M, Cell<ReversalPolicy>>,
}

impl<M: RawMutex> ControlBus<M> {
    pub const fn new(reversal: ReversalPolicy) -> Self {
        Self {
            pending: Mutex::new(Cell::new(None)),
            status: Mutex::new(Cell::new(MotorCommandPair::idle())),
            reversal: Mutex::new(Cell::new(reversal)),
        }
    }

    /// Switch the reversal policy, e.g. after loading stored settings
    pub fn set_reversal(&self, reversal: ReversalPolicy) {
        self.reversal.lock(|cell| cell.set(reversal));
    }

    /// Replace the pending target (last write wins)
    pub fn set_target(&self, pair: MotorCommandPair) -> Result<(), InvalidTarget> {
        let status = self.status();
        self.check(pair.left, status.left)?;
        self.check(pair.right, status.right)?;

        self.pending.lock(|pending| pending.set(Some(pair)));
        Ok(())
    }

    fn check(&self, command: MotorCommand, applied: MotorCommand) -> Result<(), InvalidTarget> {
        if command.duty > 100 {
            warn!("bus: rejected target duty {}", command.duty);
            return Err(InvalidTarget::DutyOutOfRange(command.duty));
        }
        if self.reversal.lock(|cell| cell.get()) == ReversalPolicy::Reject
            && applied.duty > 0
            && command.state.opposes(applied.state)
        {
            warn!("bus: rejected direct reversal");
            return Err(InvalidTarget::DirectReversal);
        }
        Ok(())
    }

    /// Remove and return the pending target
    pub fn take(&self) -> Option<MotorCommandPair> {
        self.pending.lock(|pending| pending.take())
    }

    /// Drop any pending target
    pub fn clear(&self) {
        self.pending.lock(|pending| pending.set(None));
    }

    /// Store the applied state/duty of both motors
    pub fn publish(&self, status: MotorCommandPair) {
        self.status.lock(|cell| cell.set(status));
    }

    /// Last published status
    pub fn status(&self) -> MotorCommandPair {
        self.status.lock(|cell| cell.get())
    }
}

impl<M: RawMutex> CommandSource for &ControlBus<M> {
    fn poll(&mut self, _now_ms: u32) -> SourceCommand {
        match self.take() {
            Some(pair) => SourceCommand::Target(pair),
            None => SourceCommand::Keep,
        }
    }
}

/// Targets decoded from the serial link
///
/// Forwards the bus while the link is alive. Once no valid frame has arrived
/// for longer than the liveness timeout it demands a failsafe every tick and
/// discards whatever target was pending.
pub struct RemoteSource<'a, M: RawMutex> {
    bus: &'a ControlBus<M>,
    link: &'a LinkMonitor,
    timeout_ms: u32,
    lost: bool,
}

impl<'a, M: RawMutex> RemoteSource<'a, M> {
    pub fn new(bus: &'a ControlBus<M>, link: &'a LinkMonitor, timeout_ms: u32) -> Self {
        Self {
            bus,
            link,
            timeout_ms,
            lost: false,
        }
    }

    /// Whether the last poll saw the link as lost
    pub fn is_lost(&self) -> bool {
        self.lost
    }
}

impl<M: RawMutex> CommandSource for RemoteSource<'_, M> {
    fn poll(&mut self, now_ms: u32) -> SourceCommand {
        if self.link.expired(now_ms, self.timeout_ms) {
            if !self.lost {
                warn!("link: no valid frame for {} ms, failsafe", self.timeout_ms);
                self.lost = true;
            }
            self.bus.clear();
            return SourceCommand::Failsafe;
        }

        if self.lost {
            info!("link: restored");
            self.lost = false;
        }
        let mut bus = self.bus;
        bus.poll(now_ms)
    }
}

/// Targets from the local mode state machine
///
/// Only changes are forwarded, so an unchanged mode does not re-issue the
/// same target every tick.
pub struct ModeSource<T> {
    targets: T,
    last: Option<MotorCommandPair>,
}

impl<T: ModeTargets> ModeSource<T> {
    pub fn new(targets: T) -> Self {
        Self {
            targets,
            last: None,
        }
    }

    pub fn targets(&self) -> &T {
        &self.targets
    }

    pub fn targets_mut(&mut self) -> &mut T {
        &mut self.targets
    }
}

impl<T: ModeTargets> CommandSource for ModeSource<T> {
    fn poll(&mut self, now_ms: u32) -> SourceCommand {
        let pair = self.targets.target_for_now(now_ms);
        if self.last == Some(pair) {
            return SourceCommand::Keep;
        }
        self.last = Some(pair);
        SourceCommand::Target(pair)
    }
}

//! Timed sequence replay
//!
//! A fixed list of steps played back on its own timer, independent of the
//! live target register. Each call to [`SequencePlayer::advance`] returns a
//! new target pair only when the sequence moves to another step; the caller
//! forwards it to the control bus.
//!
//! The actuator firmware never runs a player itself: the input board's mode
//! logic owns the timer that calls `advance`.

use heapless::Vec;
use recliner_protocol::MotorCommandPair;

use crate::traits::deadline_reached;

/// One step of a sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SequenceStep {
    /// Drive both motors for `hold_ms`
    Drive {
        command: MotorCommandPair,
        hold_ms: u32,
    },
    /// Both motors idle for `ms`
    Pause { ms: u32 },
}

impl SequenceStep {
    fn command(&self) -> MotorCommandPair {
        match self {
            SequenceStep::Drive { command, .. } => *command,
            SequenceStep::Pause { .. } => MotorCommandPair::idle(),
        }
    }

    fn duration_ms(&self) -> u32 {
        match self {
            SequenceStep::Drive { hold_ms, .. } => *hold_ms,
            SequenceStep::Pause { ms } => *ms,
        }
    }
}

/// Sequence of at most `N` steps
#[derive(Debug, Clone)]
pub struct SequencePlayer<const N: usize> {
    steps: Vec<SequenceStep, N>,
    cursor: usize,
    step_started_ms: u32,
    running: bool,
}

impl<const N: usize> Default for SequencePlayer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> SequencePlayer<N> {
    pub const fn new() -> Self {
        Self {
            steps: Vec::new(),
            cursor: 0,
            step_started_ms: 0,
            running: false,
        }
    }

    /// Append a step; hands it back if the list is full
    pub fn push(&mut self, step: SequenceStep) -> Result<(), SequenceStep> {
        self.steps.push(step)
    }

    /// Remove all steps and stop
    pub fn clear(&mut self) {
        self.steps.clear();
        self.running = false;
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Start from the first step, returning its target
    pub fn start(&mut self, now_ms: u32) -> Option<MotorCommandPair> {
        let first = self.steps.first()?;
        self.cursor = 0;
        self.step_started_ms = now_ms;
        self.running = true;
        debug!("sequence: start, {} steps", self.steps.len());
        Some(first.command())
    }

    /// Stop playback; returns the idle pair if it was running
    pub fn stop(&mut self) -> Option<MotorCommandPair> {
        if !self.running {
            return None;
        }
        self.running = false;
        Some(MotorCommandPair::idle())
    }

    /// Move past every step whose time is up
    ///
    /// Returns the new target when the step changed, and the idle pair once
    /// the last step finishes.
    pub fn advance(&mut self, now_ms: u32) -> Option<MotorCommandPair> {
        if !self.running {
            return None;
        }

        let mut changed = false;
        while let Some(step) = self.steps.get(self.cursor) {
            let end = self.step_started_ms.wrapping_add(step.duration_ms());
            if !deadline_reached(now_ms, end) {
                break;
            }
            self.step_started_ms = end;
            self.cursor += 1;
            changed = true;
        }

        match self.steps.get(self.cursor) {
            Some(step) if changed => Some(step.command()),
            Some(_) => None,
            None => {
                debug!("sequence: finished");
                self.running = false;
                Some(MotorCommandPair::idle())
            }
        }
    }
}

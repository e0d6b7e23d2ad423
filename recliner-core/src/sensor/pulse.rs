//! Speed pulse latch
//!
//! An interrupt handler or edge-timing task publishes the latest pulse period
//! with [`PulseLatch::publish`]; the control loop reads it through
//! [`SpeedPulse`]. Publishing is a pair of atomic stores, safe from any
//! context.

use portable_atomic::{AtomicBool, AtomicU32, Ordering};

use crate::traits::SpeedPulse;

/// Single-slot latch holding the most recent pulse period
pub struct PulseLatch {
    period_us: AtomicU32,
    fresh: AtomicBool,
}

impl Default for PulseLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl PulseLatch {
    pub const fn new() -> Self {
        Self {
            period_us: AtomicU32::new(0),
            fresh: AtomicBool::new(false),
        }
    }

    /// Store a new pulse period, replacing any unread one
    pub fn publish(&self, period_us: u32) {
        self.period_us.store(period_us, Ordering::Release);
        self.fresh.store(true, Ordering::Release);
    }

    /// Take the period if one arrived since the last take
    pub fn take(&self) -> Option<u32> {
        if self.fresh.swap(false, Ordering::AcqRel) {
            Some(self.period_us.load(Ordering::Acquire))
        } else {
            None
        }
    }

    /// Last published period, read or not
    pub fn peek(&self) -> u32 {
        self.period_us.load(Ordering::Acquire)
    }
}

impl SpeedPulse for &PulseLatch {
    fn read_speed_pulse(&mut self) -> Option<u32> {
        self.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_take_once() {
        let latch = PulseLatch::new();
        assert_eq!(latch.take(), None);

        latch.publish(1250);
        assert_eq!(latch.take(), Some(1250));
        assert_eq!(latch.take(), None);
        assert_eq!(latch.peek(), 1250);
    }

    #[test]
    fn test_latest_wins() {
        let latch = PulseLatch::new();
        latch.publish(1000);
        latch.publish(900);
        let mut reader = &latch;
        assert_eq!(reader.read_speed_pulse(), Some(900));
    }

    #[test]
    fn test_concurrent_producer() {
        let latch = Arc::new(PulseLatch::new());
        let producer = {
            let latch = latch.clone();
            thread::spawn(move || {
                for period in 1..=1000u32 {
                    latch.publish(period);
                }
            })
        };

        let mut last = 0;
        while !producer.is_finished() {
            if let Some(period) = latch.take() {
                assert!(period >= last);
                last = period;
            }
        }
        producer.join().unwrap();
        assert_eq!(latch.peek(), 1000);
    }
}

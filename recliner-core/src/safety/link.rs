//! Serial link liveness
//!
//! The receive task stamps every valid frame; the control loop asks whether
//! the link has gone quiet for longer than the liveness timeout. Both sides
//! only touch atomics, so the monitor can live in a `static`.
//!
//! Expiry is latched until the next valid frame, so a silent link stays lost
//! however long the millisecond clock runs on.

use portable_atomic::{AtomicBool, AtomicU32, Ordering};

/// Link health as seen by the control loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkHealth {
    /// A valid frame arrived within the timeout
    Alive,
    /// No valid frame within the timeout, or none since boot
    Lost,
}

/// Shared "last valid frame" timestamp
pub struct LinkMonitor {
    last_frame_ms: AtomicU32,
    seen: AtomicBool,
    frames: AtomicU32,
    expired: AtomicBool,
    /// Frame count the latched expiry applies to
    expired_at: AtomicU32,
}

impl Default for LinkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkMonitor {
    /// Create a monitor that has not seen any frame
    pub const fn new() -> Self {
        Self {
            last_frame_ms: AtomicU32::new(0),
            seen: AtomicBool::new(false),
            frames: AtomicU32::new(0),
            expired: AtomicBool::new(false),
            expired_at: AtomicU32::new(0),
        }
    }

    /// Record a valid frame
    pub fn frame_received(&self, now_ms: u32) {
        self.last_frame_ms.store(now_ms, Ordering::Release);
        self.seen.store(true, Ordering::Release);
        self.frames.fetch_add(1, Ordering::Release);
        self.expired.store(false, Ordering::Release);
    }

    /// Timestamp of the last valid frame
    pub fn last_frame_ms(&self) -> Option<u32> {
        if self.seen.load(Ordering::Acquire) {
            Some(self.last_frame_ms.load(Ordering::Acquire))
        } else {
            None
        }
    }

    /// Valid frames since boot
    pub fn frames(&self) -> u32 {
        self.frames.load(Ordering::Relaxed)
    }

    /// `true` once more than `timeout_ms` passed without a valid frame
    ///
    /// Stays `true` until [`frame_received`](Self::frame_received) is called
    /// again.
    pub fn expired(&self, now_ms: u32, timeout_ms: u32) -> bool {
        let frames = self.frames.load(Ordering::Acquire);
        if self.expired.load(Ordering::Acquire)
            && self.expired_at.load(Ordering::Acquire) == frames
        {
            return true;
        }

        let expired = match self.last_frame_ms() {
            Some(last) => now_ms.wrapping_sub(last) > timeout_ms,
            None => true,
        };
        if expired {
            // A frame counted after the load above invalidates the latch
            self.expired_at.store(frames, Ordering::Release);
            self.expired.store(true, Ordering::Release);
        }
        expired
    }

    pub fn health(&self, now_ms: u32, timeout_ms: u32) -> LinkHealth {
        if self.expired(now_ms, timeout_ms) {
            LinkHealth::Lost
        } else {
            LinkHealth::Alive
        }
    }
}

//! Monotonic time source

/// Millisecond uptime clock
///
/// Wraps after ~49 days; consumers compare timestamps with wrapping
/// arithmetic.
pub trait Clock {
    /// Milliseconds since boot
    fn now_ms(&self) -> u32;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u32 {
        (**self).now_ms()
    }
}

/// `true` once `now` has reached or passed `deadline`
#[inline]
pub fn deadline_reached(now: u32, deadline: u32) -> bool {
    (now.wrapping_sub(deadline) as i32) >= 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_reached() {
        assert!(deadline_reached(100, 100));
        assert!(deadline_reached(101, 100));
        assert!(!deadline_reached(99, 100));
    }

    #[test]
    fn test_deadline_across_wrap() {
        let deadline = 10u32;
        let before = u32::MAX - 5;
        assert!(!deadline_reached(before, deadline));
        assert!(deadline_reached(12, deadline));
    }
}

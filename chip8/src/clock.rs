//! Fixed cadence clock.
use std::time::Duration;

use crate::constants::*;

/// Software clock that converts elapsed time into whole cycles.
///
/// It is designed to work with the yielding cooperative pattern
/// of the scheduler. Time is fed in as it elapses, and the clock
/// reports how many cycles became due. The fraction of a cycle that
/// hasn't completed yet is carried over to the next call, so the
/// clock never drifts, no matter how the elapsed time is sliced.
///
/// Time is accumulated in units of `nanoseconds × frequency` to
/// keep frequencies that don't divide a second evenly, like 60Hz, exact.
#[derive(Debug, Clone)]
pub(crate) struct Clock {
    frequency: u64,
    phase: u128,
}

impl Clock {
    /// Creates a new clock at the start of a cycle.
    ///
    /// Frequency must not be zero.
    pub(crate) fn new(frequency: u64) -> Self {
        debug_assert!(frequency > 0, "clock frequency must be non-zero");
        Self {
            frequency,
            phase: 0,
        }
    }

    pub(crate) fn frequency(&self) -> u64 {
        self.frequency
    }

    /// Set the clock state back to zero.
    pub(crate) fn reset(&mut self) {
        self.phase = 0;
    }

    /// Time left until the next cycle is due.
    pub(crate) fn until_next(&self) -> Duration {
        let remaining = NANOS_IN_SECOND as u128 - self.phase;
        // Round up so advancing by this amount always completes the cycle.
        let nanos = (remaining + self.frequency as u128 - 1) / self.frequency as u128;
        Duration::from_nanos(nanos as u64)
    }

    /// Feed elapsed time into the clock, returning the number of cycles that completed.
    pub(crate) fn advance(&mut self, elapsed: Duration) -> u64 {
        self.phase += elapsed.as_nanos() * self.frequency as u128;
        let cycles = self.phase / NANOS_IN_SECOND as u128;
        self.phase %= NANOS_IN_SECOND as u128;
        cycles as u64
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_carries_remainder() {
        let mut clock = Clock::new(DELAY_FREQUENCY);

        // One 60th of a second doesn't fit in whole nanoseconds,
        // so slicing time finely must still add up.
        let mut ticks = 0;
        for _ in 0..1000 {
            ticks += clock.advance(Duration::from_millis(1));
        }
        assert_eq!(ticks, 60);

        ticks += clock.advance(Duration::from_secs(9));
        assert_eq!(ticks, 600);
    }

    #[test]
    fn test_until_next() {
        let mut clock = Clock::new(500);
        assert_eq!(clock.until_next(), Duration::from_millis(2));

        assert_eq!(clock.advance(Duration::from_micros(500)), 0);
        assert_eq!(clock.until_next(), Duration::from_micros(1500));

        let next = clock.until_next();
        assert_eq!(clock.advance(next), 1);
        assert_eq!(clock.until_next(), Duration::from_millis(2));

        // Rounded up, so the cycle is always complete.
        let mut clock = Clock::new(DELAY_FREQUENCY);
        let next = clock.until_next();
        assert_eq!(next, Duration::from_nanos(16_666_667));
        assert_eq!(clock.advance(next), 1);

        clock.reset();
        assert_eq!(clock.until_next(), Duration::from_nanos(16_666_667));
    }
}

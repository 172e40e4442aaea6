//! Time abstractions
//!
//! Simulated time is counted in machine clock ticks. The clock only moves
//! when the virtual machine executes or the kernel charges time explicitly.

use core::ops::{Add, AddAssign, Sub};
use serde::{Deserialize, Serialize};

/// A point on the machine clock
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Instant {
    ticks: u64,
}

impl Instant {
    /// The moment the machine was started
    pub const ZERO: Instant = Instant { ticks: 0 };

    /// Creates an instant from a tick count
    pub const fn from_ticks(ticks: u64) -> Self {
        Self { ticks }
    }

    /// Returns ticks since the machine started
    pub const fn as_ticks(&self) -> u64 {
        self.ticks
    }

    /// Returns the duration since another instant, zero if `earlier` is later
    pub fn duration_since(&self, earlier: Instant) -> Duration {
        Duration::from_ticks(self.ticks.saturating_sub(earlier.ticks))
    }
}

impl Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, duration: Duration) -> Self::Output {
        Instant::from_ticks(self.ticks + duration.as_ticks())
    }
}

impl AddAssign<Duration> for Instant {
    fn add_assign(&mut self, duration: Duration) {
        self.ticks += duration.as_ticks();
    }
}

impl Sub<Duration> for Instant {
    type Output = Instant;

    fn sub(self, duration: Duration) -> Self::Output {
        Instant::from_ticks(self.ticks.saturating_sub(duration.as_ticks()))
    }
}

/// A span of machine clock ticks
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Duration {
    ticks: u64,
}

impl Duration {
    pub const ZERO: Duration = Duration { ticks: 0 };

    /// Creates a duration from a tick count
    pub const fn from_ticks(ticks: u64) -> Self {
        Self { ticks }
    }

    /// Returns the duration in ticks
    pub const fn as_ticks(&self) -> u64 {
        self.ticks
    }

    pub const fn is_zero(&self) -> bool {
        self.ticks == 0
    }
}

impl Add for Duration {
    type Output = Duration;

    fn add(self, other: Duration) -> Self::Output {
        Duration::from_ticks(self.ticks + other.ticks)
    }
}

impl AddAssign for Duration {
    fn add_assign(&mut self, other: Duration) {
        self.ticks += other.ticks;
    }
}

impl Sub for Duration {
    type Output = Duration;

    fn sub(self, other: Duration) -> Self::Output {
        Duration::from_ticks(self.ticks.saturating_sub(other.ticks))
    }
}

impl core::iter::Sum for Duration {
    fn sum<I: Iterator<Item = Duration>>(iter: I) -> Self {
        iter.fold(Duration::ZERO, |acc, d| acc + d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_arithmetic() {
        let d1 = Duration::from_ticks(50);
        let d2 = Duration::from_ticks(30);

        assert_eq!(d1 + d2, Duration::from_ticks(80));
        assert_eq!(d1 - d2, Duration::from_ticks(20));
        assert_eq!(d2 - d1, Duration::ZERO);
    }

    #[test]
    fn test_duration_sum() {
        let total: Duration = [1, 2, 3].into_iter().map(Duration::from_ticks).sum();
        assert_eq!(total, Duration::from_ticks(6));
    }

    #[test]
    fn test_instant_ordering() {
        let i1 = Instant::from_ticks(10);
        let i2 = Instant::from_ticks(20);
        assert!(i2 > i1);
        assert_eq!(Instant::ZERO, Instant::default());
    }

    #[test]
    fn test_instant_duration_since() {
        let i1 = Instant::from_ticks(10);
        let i2 = Instant::from_ticks(25);
        assert_eq!(i2.duration_since(i1), Duration::from_ticks(15));
        assert_eq!(i1.duration_since(i2), Duration::ZERO);
    }

    #[test]
    fn test_instant_arithmetic() {
        let mut i = Instant::from_ticks(100);
        let d = Duration::from_ticks(27);

        assert_eq!(i + d, Instant::from_ticks(127));
        assert_eq!(i - d, Instant::from_ticks(73));
        i += d;
        assert_eq!(i.as_ticks(), 127);
    }
}

//! Media time with microsecond resolution.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

const MICROS_PER_SEC: f64 = 1_000_000.0;

/// A non-negative point or span on a media timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaTime(u64);

impl MediaTime {
    pub const ZERO: MediaTime = MediaTime(0);

    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self(millis * 1_000)
    }

    /// Convert seconds, rounding to the nearest microsecond.
    /// Returns `None` for negative, NaN, infinite, or unrepresentable input.
    pub fn from_secs_f64(secs: f64) -> Option<Self> {
        if !secs.is_finite() || secs < 0.0 {
            return None;
        }
        let micros = (secs * MICROS_PER_SEC).round();
        // u64::MAX as f64 rounds up to 2^64, which is already out of range.
        if micros >= u64::MAX as f64 {
            return None;
        }
        Some(Self(micros as u64))
    }

    pub const fn as_micros(self) -> u64 {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / MICROS_PER_SEC
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn saturating_sub(self, other: MediaTime) -> MediaTime {
        Self(self.0.saturating_sub(other.0))
    }

    pub fn saturating_add(self, other: MediaTime) -> MediaTime {
        Self(self.0.saturating_add(other.0))
    }

    /// `self + other`, or `None` if the sum does not fit.
    pub fn checked_add(self, other: MediaTime) -> Option<MediaTime> {
        self.0.checked_add(other.0).map(Self)
    }
}

impl Add for MediaTime {
    type Output = MediaTime;

    fn add(self, rhs: MediaTime) -> MediaTime {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for MediaTime {
    fn add_assign(&mut self, rhs: MediaTime) {
        self.0 += rhs.0;
    }
}

/// Saturates at the largest representable time.
impl Sum for MediaTime {
    fn sum<I: Iterator<Item = MediaTime>>(iter: I) -> Self {
        iter.fold(MediaTime::ZERO, MediaTime::saturating_add)
    }
}

impl fmt::Display for MediaTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.as_secs_f64())
    }
}

/// A half-open span `[start, start + duration)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: MediaTime,
    pub duration: MediaTime,
}

impl TimeRange {
    pub fn new(start: MediaTime, duration: MediaTime) -> Self {
        Self { start, duration }
    }

    /// Range covering `[0, duration)`.
    pub fn from_zero(duration: MediaTime) -> Self {
        Self::new(MediaTime::ZERO, duration)
    }

    pub fn end(&self) -> MediaTime {
        self.start + self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_secs_rounds_to_micros() {
        assert_eq!(
            MediaTime::from_secs_f64(1.5),
            Some(MediaTime::from_micros(1_500_000))
        );
        assert_eq!(
            MediaTime::from_secs_f64(0.000_000_6),
            Some(MediaTime::from_micros(1))
        );
        assert_eq!(MediaTime::from_secs_f64(-0.1), None);
        assert_eq!(MediaTime::from_secs_f64(f64::NAN), None);
    }

    #[test]
    fn test_out_of_range_seconds_are_rejected() {
        assert_eq!(MediaTime::from_secs_f64(1e15), None);
        assert_eq!(MediaTime::from_secs_f64(2e13), None);
        assert!(MediaTime::from_secs_f64(1e12).is_some());
    }

    #[test]
    fn test_checked_and_saturating_add() {
        let near_max = MediaTime::from_micros(u64::MAX - 10);
        assert_eq!(near_max.checked_add(MediaTime::from_micros(11)), None);
        assert_eq!(
            near_max.checked_add(MediaTime::from_micros(10)),
            Some(MediaTime::from_micros(u64::MAX))
        );
        let total: MediaTime = [near_max, near_max].into_iter().sum();
        assert_eq!(total, MediaTime::from_micros(u64::MAX));
    }

    #[test]
    fn test_sum_and_display() {
        let total: MediaTime = [MediaTime::from_millis(5_000), MediaTime::from_millis(3_250)]
            .into_iter()
            .sum();
        assert_eq!(total, MediaTime::from_millis(8_250));
        assert_eq!(total.to_string(), "8.250s");
    }

    #[test]
    fn test_range_end() {
        let range = TimeRange::new(MediaTime::from_millis(500), MediaTime::from_millis(250));
        assert_eq!(range.end(), MediaTime::from_millis(750));
    }
}

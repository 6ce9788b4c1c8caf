//! Pivot timestamp codec.
//!
//! Pivot readings carry time as a pair: whole seconds since the Unix epoch
//! and a fraction of the current second expressed in 2^24 ticks. This module
//! converts between that pair and millisecond epoch timestamps.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Number of fraction ticks in one second (2^24).
pub const FRACTION_TICKS_PER_SECOND: i64 = 1 << 24;

/// A timestamp in pivot representation.
///
/// # Examples
///
/// ```
/// use systemsp::PivotTimestamp;
///
/// let ts = PivotTimestamp::from_millis(1_700_000_000_500);
/// assert_eq!(ts.second_since_epoch, 1_700_000_000);
/// assert_eq!(ts.to_millis(), 1_700_000_000_500);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PivotTimestamp {
    /// Whole seconds since 1970-01-01 00:00:00 UTC.
    pub second_since_epoch: i64,

    /// Fraction of the current second, in 1/2^24 s ticks.
    pub fraction_of_second: i64,
}

impl PivotTimestamp {
    /// Builds a pivot timestamp from its two components.
    #[must_use]
    pub const fn new(second_since_epoch: i64, fraction_of_second: i64) -> Self {
        Self {
            second_since_epoch,
            fraction_of_second,
        }
    }

    /// Converts a millisecond epoch timestamp.
    ///
    /// The fraction is computed in integer arithmetic as
    /// `ms * 16777 + ms * 216 / 1000`, which is `ms * 2^24 / 1000` without
    /// floating point and without overflowing for any millisecond remainder.
    #[must_use]
    pub const fn from_millis(timestamp_ms: i64) -> Self {
        let remainder = timestamp_ms % 1000;
        let fraction = remainder * 16_777 + (remainder * 216) / 1000;
        Self {
            second_since_epoch: timestamp_ms / 1000,
            fraction_of_second: fraction,
        }
    }

    /// Converts back to a millisecond epoch timestamp.
    ///
    /// The fraction is rounded to the nearest millisecond, which makes
    /// `from_millis` followed by `to_millis` lossless.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn to_millis(&self) -> i64 {
        let ms_part = ((self.fraction_of_second * 1000) as f64 / FRACTION_TICKS_PER_SECOND as f64).round() as i64;
        self.second_since_epoch * 1000 + ms_part
    }

    /// The current wall-clock time in pivot representation.
    #[must_use]
    pub fn now() -> Self {
        Self::from_millis(now_millis())
    }
}

impl From<i64> for PivotTimestamp {
    fn from(timestamp_ms: i64) -> Self {
        Self::from_millis(timestamp_ms)
    }
}

impl std::fmt::Display for PivotTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}+{}/2^24", self.second_since_epoch, self.fraction_of_second)
    }
}

/// Current wall-clock time as milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_millis_splits_seconds() {
        let ts = PivotTimestamp::from_millis(12_345);
        assert_eq!(ts.second_since_epoch, 12);
        assert_eq!(ts.fraction_of_second, 345 * 16_777 + (345 * 216) / 1000);
    }

    #[test]
    fn test_whole_second_has_zero_fraction() {
        let ts = PivotTimestamp::from_millis(5_000);
        assert_eq!(ts, PivotTimestamp::new(5, 0));
        assert_eq!(ts.to_millis(), 5_000);
    }

    #[test]
    fn test_fraction_stays_below_one_second() {
        let ts = PivotTimestamp::from_millis(999);
        assert!(ts.fraction_of_second < FRACTION_TICKS_PER_SECOND);
        assert_eq!(ts.to_millis(), 999);
    }

    #[test]
    fn test_round_trip_over_three_seconds() {
        let base = now_millis();
        for i in 0..=3000 {
            let ms = base + i;
            assert_eq!(PivotTimestamp::from_millis(ms).to_millis(), ms, "round trip failed for {ms}");
        }
    }

    #[test]
    fn test_now_tracks_wall_clock() {
        let before = now_millis() / 1000;
        let ts = PivotTimestamp::now();
        let after = now_millis() / 1000;
        assert!(ts.second_since_epoch >= before);
        assert!(ts.second_since_epoch <= after);
    }

    #[test]
    fn test_serializes_with_pivot_field_names() {
        let json = serde_json::to_value(PivotTimestamp::new(10, 20)).unwrap();
        assert_eq!(json["SecondSinceEpoch"], 10);
        assert_eq!(json["FractionOfSecond"], 20);
    }
}

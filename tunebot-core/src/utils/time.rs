// tunebot-core/src/utils/time.rs

use chrono::{DateTime, Utc};

use crate::Error;

/// Converts a `DateTime<Utc>` into microseconds since the Unix epoch.
pub fn to_epoch_micros(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_micros()
}

/// Converts microseconds since the Unix epoch back into a `DateTime<Utc>`.
pub fn from_epoch_micros(us: i64) -> Result<DateTime<Utc>, Error> {
    DateTime::<Utc>::from_timestamp_micros(us)
        .ok_or_else(|| Error::Parse(format!("Invalid microsecond timestamp: {us}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn micros_round_trip_keeps_precision() {
        let dt = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()
            + chrono::Duration::microseconds(123_456);
        let us = to_epoch_micros(dt);
        assert_eq!(from_epoch_micros(us).unwrap(), dt);
    }
}

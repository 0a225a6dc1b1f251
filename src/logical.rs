//! Conversions between physical ints/longs and host dates and timestamps.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

use crate::error::LogicalTypeError;
use crate::host::HostValue;

const MILLIS_PER_SECOND: i64 = 1_000;
const MICROS_PER_SECOND: i64 = 1_000_000;

/// Converts logical-type values to and from their wire representation.
///
/// Dates count whole days from `epoch` (1970-01-01 unless configured).
/// Timestamps are always relative to the Unix epoch, in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicalTypeCodec {
    epoch: NaiveDate,
}

impl Default for LogicalTypeCodec {
    fn default() -> Self {
        // NaiveDate's default is 1970-01-01
        Self::new(NaiveDate::default())
    }
}

impl LogicalTypeCodec {
    /// Create a codec counting dates from `epoch`.
    pub fn new(epoch: NaiveDate) -> Self {
        Self { epoch }
    }

    /// The date that day 0 maps to.
    pub fn epoch(&self) -> NaiveDate {
        self.epoch
    }

    /// Convert a host value to a day offset for the `date` logical type.
    ///
    /// Numbers are taken as day offsets already and truncated toward zero.
    /// Timestamps use their UTC calendar date.
    pub fn date_to_days(&self, value: &HostValue) -> Result<i32, LogicalTypeError> {
        const NAME: &str = "date";
        match value {
            HostValue::Int(days) => {
                i32::try_from(*days).map_err(|_| out_of_range(NAME, days))
            }
            HostValue::Float(days) => float_to_i64(*days)
                .and_then(|d| i32::try_from(d).ok())
                .ok_or_else(|| out_of_range(NAME, days)),
            HostValue::Date(date) => self.days_since_epoch(*date),
            HostValue::Timestamp(ts) => self.days_since_epoch(ts.date_naive()),
            other => Err(unsupported(NAME, other)),
        }
    }

    /// Convert a day offset to a calendar date.
    pub fn days_to_date(&self, days: i32) -> Result<NaiveDate, LogicalTypeError> {
        self.epoch
            .checked_add_signed(Duration::days(days.into()))
            .ok_or_else(|| out_of_range("date", days))
    }

    /// Convert a host value to milliseconds since the Unix epoch.
    pub fn timestamp_to_millis(&self, value: &HostValue) -> Result<i64, LogicalTypeError> {
        to_wire_timestamp(value, "timestamp-millis", MILLIS_PER_SECOND, |ts| {
            i64::from(ts.timestamp_subsec_millis())
        })
    }

    /// Convert a host value to microseconds since the Unix epoch.
    pub fn timestamp_to_micros(&self, value: &HostValue) -> Result<i64, LogicalTypeError> {
        to_wire_timestamp(value, "timestamp-micros", MICROS_PER_SECOND, |ts| {
            i64::from(ts.timestamp_subsec_micros())
        })
    }

    /// Convert milliseconds since the Unix epoch to a UTC timestamp.
    pub fn millis_to_timestamp(&self, millis: i64) -> Result<DateTime<Utc>, LogicalTypeError> {
        from_wire_timestamp(millis, "timestamp-millis", MILLIS_PER_SECOND)
    }

    /// Convert microseconds since the Unix epoch to a UTC timestamp.
    pub fn micros_to_timestamp(&self, micros: i64) -> Result<DateTime<Utc>, LogicalTypeError> {
        from_wire_timestamp(micros, "timestamp-micros", MICROS_PER_SECOND)
    }

    fn days_since_epoch(&self, date: NaiveDate) -> Result<i32, LogicalTypeError> {
        let days = date.signed_duration_since(self.epoch).num_days();
        i32::try_from(days).map_err(|_| out_of_range("date", date))
    }
}

fn to_wire_timestamp<F>(
    value: &HostValue,
    name: &'static str,
    units_per_second: i64,
    subsec: F,
) -> Result<i64, LogicalTypeError>
where
    F: Fn(&DateTime<Utc>) -> i64,
{
    let from_datetime = |ts: &DateTime<Utc>| {
        ts.timestamp()
            .checked_mul(units_per_second)
            .and_then(|units| units.checked_add(subsec(ts)))
            .ok_or_else(|| out_of_range(name, ts))
    };

    match value {
        HostValue::Int(units) => Ok(*units),
        HostValue::Float(units) => float_to_i64(*units).ok_or_else(|| out_of_range(name, units)),
        HostValue::Timestamp(ts) => from_datetime(ts),
        HostValue::Date(date) => from_datetime(&date.and_time(NaiveTime::MIN).and_utc()),
        other => Err(unsupported(name, other)),
    }
}

fn from_wire_timestamp(
    units: i64,
    name: &'static str,
    units_per_second: i64,
) -> Result<DateTime<Utc>, LogicalTypeError> {
    let seconds = units.div_euclid(units_per_second);
    let remainder = units.rem_euclid(units_per_second);
    let nanos = remainder * (1_000_000_000 / units_per_second);

    u32::try_from(nanos)
        .ok()
        .and_then(|nanos| DateTime::from_timestamp(seconds, nanos))
        .ok_or_else(|| out_of_range(name, units))
}

fn float_to_i64(value: f64) -> Option<i64> {
    let truncated = value.trunc();
    if truncated.is_finite() && truncated >= i64::MIN as f64 && truncated < i64::MAX as f64 {
        Some(truncated as i64)
    } else {
        None
    }
}

fn out_of_range(logical_type: &'static str, value: impl ToString) -> LogicalTypeError {
    LogicalTypeError::OutOfRange {
        logical_type,
        value: value.to_string(),
    }
}

fn unsupported(logical_type: &'static str, value: &HostValue) -> LogicalTypeError {
    LogicalTypeError::Unsupported {
        logical_type,
        value: value.type_name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_default_epoch() {
        assert_eq!(LogicalTypeCodec::default().epoch(), ymd(1970, 1, 1));
    }

    #[test]
    fn test_date_round_trip() {
        let codec = LogicalTypeCodec::default();
        let date = ymd(2024, 1, 1);
        assert_eq!(codec.date_to_days(&HostValue::Date(date)).unwrap(), 19723);
        assert_eq!(codec.days_to_date(19723).unwrap(), date);
    }

    #[test]
    fn test_pre_epoch_date() {
        let codec = LogicalTypeCodec::default();
        assert_eq!(codec.date_to_days(&HostValue::Date(ymd(1969, 12, 31))).unwrap(), -1);
        assert_eq!(codec.days_to_date(-1).unwrap(), ymd(1969, 12, 31));
    }

    #[test]
    fn test_numeric_date_is_truncated() {
        let codec = LogicalTypeCodec::default();
        assert_eq!(codec.date_to_days(&HostValue::Float(12.9)).unwrap(), 12);
        assert_eq!(codec.date_to_days(&HostValue::Float(-3.7)).unwrap(), -3);
        assert_eq!(codec.date_to_days(&HostValue::Int(5)).unwrap(), 5);
    }

    #[test]
    fn test_date_out_of_range() {
        let codec = LogicalTypeCodec::default();
        assert!(matches!(
            codec.date_to_days(&HostValue::Int(i64::from(i32::MAX) + 1)),
            Err(LogicalTypeError::OutOfRange { .. })
        ));
        assert!(codec.date_to_days(&HostValue::Float(f64::NAN)).is_err());
        assert!(codec.days_to_date(i32::MAX).is_err());
    }

    #[test]
    fn test_custom_epoch() {
        let codec = LogicalTypeCodec::new(ymd(2000, 1, 1));
        assert_eq!(codec.date_to_days(&HostValue::Date(ymd(2000, 1, 11))).unwrap(), 10);
    }

    #[test]
    fn test_timestamp_millis_truncates_micros() {
        let codec = LogicalTypeCodec::default();
        let ts = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        assert_eq!(
            codec.timestamp_to_millis(&HostValue::Timestamp(ts)).unwrap(),
            1_700_000_000_123
        );
        assert_eq!(
            codec.timestamp_to_micros(&HostValue::Timestamp(ts)).unwrap(),
            1_700_000_000_123_456
        );
    }

    #[test]
    fn test_negative_timestamps() {
        let codec = LogicalTypeCodec::default();
        let ts = codec.millis_to_timestamp(-1).unwrap();
        assert_eq!(ts.timestamp(), -1);
        assert_eq!(ts.timestamp_subsec_millis(), 999);
        assert_eq!(codec.timestamp_to_millis(&HostValue::Timestamp(ts)).unwrap(), -1);

        let ts = codec.micros_to_timestamp(-1_500_000).unwrap();
        assert_eq!(codec.timestamp_to_micros(&HostValue::Timestamp(ts)).unwrap(), -1_500_000);
    }

    #[test]
    fn test_numeric_timestamps_pass_through() {
        let codec = LogicalTypeCodec::default();
        assert_eq!(codec.timestamp_to_millis(&HostValue::Int(42)).unwrap(), 42);
        assert_eq!(codec.timestamp_to_micros(&HostValue::Float(42.9)).unwrap(), 42);
    }

    #[test]
    fn test_date_as_timestamp_is_midnight_utc() {
        let codec = LogicalTypeCodec::default();
        assert_eq!(
            codec.timestamp_to_millis(&HostValue::Date(ymd(1970, 1, 2))).unwrap(),
            86_400_000
        );
    }

    #[test]
    fn test_timestamp_out_of_range() {
        let codec = LogicalTypeCodec::default();
        let far = Utc.with_ymd_and_hms(262_000, 1, 1, 0, 0, 0).unwrap();
        assert!(codec.timestamp_to_micros(&HostValue::Timestamp(far)).is_err());
        assert!(codec.millis_to_timestamp(i64::MAX).is_err());
    }

    #[test]
    fn test_unsupported_value() {
        let codec = LogicalTypeCodec::default();
        assert!(matches!(
            codec.date_to_days(&HostValue::from("2024-01-01")),
            Err(LogicalTypeError::Unsupported { .. })
        ));
    }
}

//! Wire representations of calendar and civil-time values.
//!
//! TIME and DATETIME travel as packed 64-bit integers: the civil fields are
//! bit-packed above a 20-bit microsecond field.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};

// Days from 0001-01-01 (CE day 1) to 1970-01-01.
const UNIX_EPOCH_FROM_CE: i32 = 719_163;

const MICRO_LENGTH: u32 = 20;
const SECOND_SHIFT: u32 = 0;
const MINUTE_SHIFT: u32 = 6;
const HOUR_SHIFT: u32 = 12;
const DAY_SHIFT: u32 = 17;
const MONTH_SHIFT: u32 = 22;
const YEAR_SHIFT: u32 = 26;

const MICRO_MASK: i64 = (1 << MICRO_LENGTH) - 1;
const SIX_BITS: i64 = 0x3F;
const FIVE_BITS: i64 = 0x1F;
const FOUR_BITS: i64 = 0x0F;
const YEAR_BITS: i64 = 0x3FFF;

/// Days since 1970-01-01.
pub fn date_to_wire(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_FROM_CE
}

/// Microseconds since the Unix epoch.
pub fn timestamp_to_wire(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_micros()
}

pub fn time_to_wire(time: NaiveTime) -> i64 {
    (pack_time(time) << MICRO_LENGTH) | micros(time)
}

pub fn datetime_to_wire(datetime: NaiveDateTime) -> i64 {
    let date = datetime.date();
    let time = datetime.time();
    let packed = (i64::from(date.year()) << YEAR_SHIFT)
        | (i64::from(date.month()) << MONTH_SHIFT)
        | (i64::from(date.day()) << DAY_SHIFT)
        | pack_time(time);
    (packed << MICRO_LENGTH) | micros(time)
}

pub fn time_from_wire(packed: i64) -> Option<NaiveTime> {
    let micros = (packed & MICRO_MASK) as u32;
    let fields = packed >> MICRO_LENGTH;
    NaiveTime::from_hms_micro_opt(
        ((fields >> HOUR_SHIFT) & FIVE_BITS) as u32,
        ((fields >> MINUTE_SHIFT) & SIX_BITS) as u32,
        ((fields >> SECOND_SHIFT) & SIX_BITS) as u32,
        micros,
    )
}

pub fn datetime_from_wire(packed: i64) -> Option<NaiveDateTime> {
    let fields = packed >> MICRO_LENGTH;
    let date = NaiveDate::from_ymd_opt(
        ((fields >> YEAR_SHIFT) & YEAR_BITS) as i32,
        ((fields >> MONTH_SHIFT) & FOUR_BITS) as u32,
        ((fields >> DAY_SHIFT) & FIVE_BITS) as u32,
    )?;
    let time = time_from_wire(packed & ((1 << (MICRO_LENGTH + DAY_SHIFT)) - 1))?;
    Some(date.and_time(time))
}

fn pack_time(time: NaiveTime) -> i64 {
    (i64::from(time.hour()) << HOUR_SHIFT)
        | (i64::from(time.minute()) << MINUTE_SHIFT)
        | (i64::from(time.second()) << SECOND_SHIFT)
}

fn micros(time: NaiveTime) -> i64 {
    // Leap-second nanos are folded into the last microsecond.
    i64::from(time.nanosecond().min(999_999_999) / 1_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_to_wire() {
        assert_eq!(date_to_wire(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()), 0);
        assert_eq!(date_to_wire(NaiveDate::from_ymd_opt(2023, 1, 12).unwrap()), 19_369);
        assert_eq!(date_to_wire(NaiveDate::from_ymd_opt(1969, 12, 31).unwrap()), -1);
    }

    #[test]
    fn test_timestamp_to_wire() {
        let instant = DateTime::from_timestamp(1_673_510_400, 123_456_000).unwrap();
        assert_eq!(timestamp_to_wire(instant), 1_673_510_400_123_456);
    }

    #[test]
    fn test_time_packing() {
        let time = NaiveTime::from_hms_micro_opt(12, 34, 56, 789_000).unwrap();
        let expected = (12i64 << 32) | (34 << 26) | (56 << 20) | 789_000;
        assert_eq!(time_to_wire(time), expected);
        assert_eq!(time_from_wire(expected), Some(time));
    }

    #[test]
    fn test_datetime_packing() {
        let datetime = NaiveDate::from_ymd_opt(2023, 1, 12)
            .unwrap()
            .and_hms_micro_opt(8, 30, 15, 42)
            .unwrap();
        let fields = (2023i64 << 26) | (1 << 22) | (12 << 17) | (8 << 12) | (30 << 6) | 15;
        assert_eq!(datetime_to_wire(datetime), (fields << 20) | 42);
        assert_eq!(datetime_from_wire(datetime_to_wire(datetime)), Some(datetime));
    }
}

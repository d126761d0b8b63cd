use crate::codec::error::ParseError;
use chrono::{
    DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Timelike,
    Utc,
};
use chrono_tz::Tz;
use lazy_static::lazy_static;
use std::{collections::HashMap, str::FromStr};

lazy_static! {
    // Short zone names seen in exported files, as fixed UTC offsets in seconds.
    static ref ZONE_ABBREVIATIONS: HashMap<&'static str, i32> = HashMap::from([
        ("UTC", 0),
        ("GMT", 0),
        ("WET", 0),
        ("WEST", 3600),
        ("CET", 3600),
        ("CEST", 2 * 3600),
        ("EET", 2 * 3600),
        ("EEST", 3 * 3600),
        ("EST", -5 * 3600),
        ("EDT", -4 * 3600),
        ("CST", -6 * 3600),
        ("CDT", -5 * 3600),
        ("MST", -7 * 3600),
        ("MDT", -6 * 3600),
        ("PST", -8 * 3600),
        ("PDT", -7 * 3600),
    ]);
}

/// Parses a calendar date. A trailing time part is accepted and validated
/// but does not contribute to the result.
pub fn parse_date(text: &str) -> Result<NaiveDate, ParseError> {
    let parsed = scan(text, "DATE", Mode::Date)?;
    Ok(parsed.date)
}

/// Parses a civil datetime, truncated to whole seconds.
pub fn parse_datetime(text: &str) -> Result<NaiveDateTime, ParseError> {
    let parsed = scan(text, "DATETIME", Mode::DateTime)?;
    let time = parsed.time.unwrap_or(NaiveTime::MIN);
    let time = time
        .with_nanosecond(0)
        .ok_or_else(|| ParseError::invalid("DATETIME", text, "invalid time of day"))?;
    Ok(parsed.date.and_time(time))
}

/// Parses an instant. Without an explicit zone the text is read as UTC.
/// Precision beyond microseconds is dropped.
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, ParseError> {
    let parsed = scan(text, "TIMESTAMP", Mode::Timestamp)?;
    let local = parsed.date.and_time(parsed.time.unwrap_or(NaiveTime::MIN));

    let instant = match parsed.zone {
        None => Utc.from_utc_datetime(&local),
        Some(Zone::Fixed(offset)) => offset
            .from_local_datetime(&local)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| ParseError::invalid("TIMESTAMP", text, "invalid local time"))?,
        Some(Zone::Named(tz)) => tz
            .from_local_datetime(&local)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| {
                ParseError::invalid("TIMESTAMP", text, "local time does not exist in zone")
            })?,
    };

    let micros = instant.nanosecond() / 1_000 * 1_000;
    instant
        .with_nanosecond(micros)
        .ok_or_else(|| ParseError::invalid("TIMESTAMP", text, "invalid time of day"))
}

/// Parses a time of day, `HH:mm[:ss][.fffffffff]`.
pub fn parse_time(text: &str) -> Result<NaiveTime, ParseError> {
    let mut cursor = Cursor::new(text, "TIME");
    let time = cursor.time()?;
    cursor.finish()?;
    Ok(time)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Date,
    DateTime,
    Timestamp,
}

enum Zone {
    Fixed(FixedOffset),
    Named(Tz),
}

struct Parsed {
    date: NaiveDate,
    time: Option<NaiveTime>,
    zone: Option<Zone>,
}

fn scan(text: &str, expected: &'static str, mode: Mode) -> Result<Parsed, ParseError> {
    let mut cursor = Cursor::new(text, expected);
    let date = cursor.date()?;

    cursor.eat(b'T');
    cursor.eat(b' ');

    let time = match (mode, cursor.peek()) {
        (Mode::Date, None) => None,
        (_, Some(b)) if b.is_ascii_digit() => Some(cursor.time()?),
        _ => return Err(cursor.error("missing time of day")),
    };

    let zone = if mode == Mode::Timestamp {
        cursor.zone()?
    } else {
        None
    };

    cursor.finish()?;
    Ok(Parsed { date, time, zone })
}

struct Cursor<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    expected: &'static str,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str, expected: &'static str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
            expected,
        }
    }

    fn error(&self, reason: &str) -> ParseError {
        ParseError::invalid(
            self.expected,
            self.text,
            format!("{reason} at offset {}", self.pos),
        )
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), ParseError> {
        if self.eat(byte) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", byte as char)))
        }
    }

    /// Reads between `min` and `max` ASCII digits.
    fn number(&mut self, min: usize, max: usize) -> Result<(u32, usize), ParseError> {
        let start = self.pos;
        let mut value = 0u32;
        while self.pos - start < max {
            match self.peek() {
                Some(b) if b.is_ascii_digit() => {
                    value = value * 10 + u32::from(b - b'0');
                    self.pos += 1;
                }
                _ => break,
            }
        }

        let count = self.pos - start;
        if count < min {
            return Err(self.error("expected digits"));
        }
        Ok((value, count))
    }

    fn date(&mut self) -> Result<NaiveDate, ParseError> {
        let (year, _) = self.number(4, 4)?;
        self.separator();
        let (month, _) = self.number(1, 2)?;
        self.separator();
        let (day, _) = self.number(1, 2)?;

        NaiveDate::from_ymd_opt(year as i32, month, day)
            .ok_or_else(|| self.error("invalid calendar date"))
    }

    // `/` and `-` are both optional and may appear together.
    fn separator(&mut self) {
        self.eat(b'/');
        self.eat(b'-');
    }

    fn time(&mut self) -> Result<NaiveTime, ParseError> {
        let (hour, _) = self.number(2, 2)?;
        self.expect(b':')?;
        let (minute, _) = self.number(2, 2)?;

        let mut second = 0;
        let mut nanos = 0;
        if self.eat(b':') {
            second = self.number(2, 2)?.0;
            if self.eat(b'.') {
                let (fraction, digits) = self.number(1, 9)?;
                nanos = fraction * 10u32.pow(9 - digits as u32);
            }
        }

        NaiveTime::from_hms_nano_opt(hour, minute, second, nanos)
            .ok_or_else(|| self.error("invalid time of day"))
    }

    /// `[ ][+HH[:MM]|+HHMM][zone name][Z]`. When more than one designator is
    /// present the first one wins; the others must still be well formed.
    fn zone(&mut self) -> Result<Option<Zone>, ParseError> {
        self.eat(b' ');

        let mut zone = None;
        if let Some(sign @ (b'+' | b'-')) = self.peek() {
            self.pos += 1;
            zone = Some(Zone::Fixed(self.offset(sign)?));
        }

        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphabetic() || b == b'/' || b == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }

        let text = self.text;
        let name = &text[start..self.pos];
        let name = name.strip_suffix('Z').filter(|n| !n.is_empty()).unwrap_or(name);
        if !name.is_empty() {
            let named = self.named_zone(name)?;
            zone = zone.or(Some(named));
        }
        Ok(zone)
    }

    fn offset(&mut self, sign: u8) -> Result<FixedOffset, ParseError> {
        let (hours, _) = self.number(2, 2)?;
        self.eat(b':');
        let minutes = match self.peek() {
            Some(b) if b.is_ascii_digit() => self.number(2, 2)?.0,
            _ => 0,
        };

        let seconds = (hours * 3600 + minutes * 60) as i32;
        let seconds = if sign == b'-' { -seconds } else { seconds };
        FixedOffset::east_opt(seconds).ok_or_else(|| self.error("offset out of range"))
    }

    fn named_zone(&self, name: &str) -> Result<Zone, ParseError> {
        if name == "Z" {
            return Ok(Zone::Fixed(Utc.fix()));
        }
        if let Some(seconds) = ZONE_ABBREVIATIONS.get(name.to_ascii_uppercase().as_str()) {
            return FixedOffset::east_opt(*seconds)
                .map(Zone::Fixed)
                .ok_or_else(|| self.error("offset out of range"));
        }
        Tz::from_str(name)
            .map(Zone::Named)
            .map_err(|_| self.error(&format!("unknown time zone '{name}'")))
    }

    fn finish(&self) -> Result<(), ParseError> {
        if self.pos == self.bytes.len() {
            Ok(())
        } else {
            Err(self.error("unexpected trailing text"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_date_separators() {
        let expected = date(2023, 1, 12);
        assert_eq!(parse_date("2023-01-12").unwrap(), expected);
        assert_eq!(parse_date("2023/01/12").unwrap(), expected);
        assert_eq!(parse_date("20230112").unwrap(), expected);
    }

    #[test]
    fn test_date_with_trailing_time() {
        assert_eq!(parse_date("2023-01-12T10:15").unwrap(), date(2023, 1, 12));
        assert_eq!(parse_date("2023/01/12 10:15:30.5").unwrap(), date(2023, 1, 12));
        assert!(parse_date("2023-01-12T25:00").is_err());
    }

    #[test]
    fn test_date_rejects_invalid() {
        assert!(parse_date("2023-02-30").is_err());
        assert!(parse_date("23-01-12").is_err());
        assert!(parse_date("2023-01-12x").is_err());
        assert!(parse_date("").is_err());
    }

    #[test]
    fn test_datetime_truncates_to_seconds() {
        let parsed = parse_datetime("2022-06-28T14:30:00.123456789").unwrap();
        assert_eq!(
            parsed,
            date(2022, 6, 28).and_hms_opt(14, 30, 0).unwrap()
        );
        assert_eq!(
            parse_datetime("2022/06/28 14:30").unwrap(),
            date(2022, 6, 28).and_hms_opt(14, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_datetime_requires_time() {
        assert!(parse_datetime("2022-06-28").is_err());
        assert!(parse_datetime("2022-06-28T14:30Z").is_err());
    }

    #[test]
    fn test_timestamp_defaults_to_utc() {
        let ts = parse_timestamp("2023-01-12 08:00:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2023-01-12T08:00:00+00:00");
        assert_eq!(parse_timestamp("2023-01-12T08:00:00Z").unwrap(), ts);
    }

    #[test]
    fn test_timestamp_offsets() {
        let expected = parse_timestamp("2023-01-12 06:00:00").unwrap();
        assert_eq!(parse_timestamp("2023-01-12 08:00:00 +02:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2023-01-12 08:00:00+0200").unwrap(), expected);
        assert_eq!(parse_timestamp("2023-01-12 08:00:00+02").unwrap(), expected);
        assert_eq!(
            parse_timestamp("2023-01-12 01:00:00-05:00").unwrap(),
            expected
        );
    }

    #[test]
    fn test_timestamp_zone_names() {
        let expected = parse_timestamp("2023-01-12 07:00:00").unwrap();
        assert_eq!(parse_timestamp("2023-01-12 08:00:00 CET").unwrap(), expected);
        assert_eq!(
            parse_timestamp("2023-01-12 08:00:00 Europe/Berlin").unwrap(),
            expected
        );
        assert!(parse_timestamp("2023-01-12 08:00:00 Mars/Olympus").is_err());
    }

    #[test]
    fn test_timestamp_keeps_micros() {
        let ts = parse_timestamp("2023-01-12T08:00:00.123456789").unwrap();
        assert_eq!(ts.nanosecond(), 123_456_000);
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(
            parse_time("14:30:05.25").unwrap(),
            NaiveTime::from_hms_milli_opt(14, 30, 5, 250).unwrap()
        );
        assert_eq!(
            parse_time("07:05").unwrap(),
            NaiveTime::from_hms_opt(7, 5, 0).unwrap()
        );
        assert!(parse_time("7:05").is_err());
        assert!(parse_time("24:00").is_err());
    }
}

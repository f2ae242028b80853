//! Temporal primitives
//!
//! FHIR dates may be partial (`2015`, `2015-02`) and date-times carry an
//! optional timezone. [`FhirDate`] keeps the original lexical form next to
//! the parsed calendar value so a decoded instance serializes back exactly
//! as it was read.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::{Error, Result};

/// How much of a date/dateTime was given
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DatePrecision {
    Year,
    Month,
    Day,
    Minute,
    Second,
    Fraction,
}

/// A FHIR `date`, `dateTime` or `instant`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FhirDate {
    original: String,
    date: NaiveDate,
    time: Option<NaiveTime>,
    offset: Option<FixedOffset>,
    precision: DatePrecision,
}

fn date_regex() -> &'static Regex {
    static DATE_RE: OnceLock<Regex> = OnceLock::new();
    DATE_RE.get_or_init(|| {
        Regex::new(
            r"^(?P<year>\d{4})(?:-(?P<month>\d{2})(?:-(?P<day>\d{2})(?:T(?P<hour>\d{2}):(?P<minute>\d{2})(?::(?P<second>\d{2})(?:\.(?P<fraction>\d+))?)?(?P<tz>Z|[+-]\d{2}:\d{2})?)?)?)?$",
        )
        .expect("date regex must compile")
    })
}

fn time_regex() -> &'static Regex {
    static TIME_RE: OnceLock<Regex> = OnceLock::new();
    TIME_RE.get_or_init(|| {
        Regex::new(r"^(?:[01]\d|2[0-3]):[0-5]\d:[0-5]\d(?:\.\d+)?$")
            .expect("time regex must compile")
    })
}

fn invalid(value: &str, what: &str) -> Error {
    Error::invalid_value(what, format!("'{value}' is not a valid FHIR {what}"))
}

fn parse_offset(tz: &str) -> Option<FixedOffset> {
    if tz == "Z" {
        return FixedOffset::east_opt(0);
    }
    let sign = if tz.starts_with('-') { -1 } else { 1 };
    let (hours, minutes) = tz[1..].split_once(':')?;
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 14 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Fractional seconds as nanoseconds, truncated to 9 digits
fn fraction_nanos(fraction: &str) -> u32 {
    let digits: String = fraction.chars().take(9).collect();
    let padded = format!("{digits:0<9}");
    padded.parse().unwrap_or(0)
}

impl FhirDate {
    pub fn parse(value: &str) -> Result<Self> {
        let caps = date_regex()
            .captures(value)
            .ok_or_else(|| invalid(value, "dateTime"))?;
        let number = |name: &str| -> Option<u32> {
            caps.name(name).and_then(|m| m.as_str().parse().ok())
        };

        let year: i32 = caps["year"].parse().map_err(|_| invalid(value, "dateTime"))?;
        let month = number("month");
        let day = number("day");
        let date = NaiveDate::from_ymd_opt(year, month.unwrap_or(1), day.unwrap_or(1))
            .ok_or_else(|| invalid(value, "dateTime"))?;

        let mut precision = match (month, day) {
            (None, _) => DatePrecision::Year,
            (Some(_), None) => DatePrecision::Month,
            (Some(_), Some(_)) => DatePrecision::Day,
        };

        let time = match (number("hour"), number("minute")) {
            (Some(hour), Some(minute)) => {
                let second = number("second");
                let nanos = caps
                    .name("fraction")
                    .map(|m| fraction_nanos(m.as_str()))
                    .unwrap_or(0);
                precision = if caps.name("fraction").is_some() {
                    DatePrecision::Fraction
                } else if second.is_some() {
                    DatePrecision::Second
                } else {
                    DatePrecision::Minute
                };
                Some(
                    NaiveTime::from_hms_nano_opt(hour, minute, second.unwrap_or(0), nanos)
                        .ok_or_else(|| invalid(value, "dateTime"))?,
                )
            }
            _ => None,
        };

        let offset = match caps.name("tz") {
            Some(tz) => Some(parse_offset(tz.as_str()).ok_or_else(|| invalid(value, "dateTime"))?),
            None => None,
        };

        Ok(Self {
            original: value.to_string(),
            date,
            time,
            offset,
            precision,
        })
    }

    /// The lexical form this value was parsed from
    pub fn as_str(&self) -> &str {
        &self.original
    }

    pub fn precision(&self) -> DatePrecision {
        self.precision
    }

    /// Calendar date, with missing month/day filled in as 1
    pub fn to_naive_date(&self) -> NaiveDate {
        self.date
    }

    pub fn time(&self) -> Option<NaiveTime> {
        self.time
    }

    pub fn offset(&self) -> Option<FixedOffset> {
        self.offset
    }

    /// Absolute point in time; only available when both time and zone are known
    pub fn to_datetime(&self) -> Option<DateTime<FixedOffset>> {
        let time = self.time?;
        let offset = self.offset?;
        offset
            .from_local_datetime(&self.date.and_time(time))
            .single()
    }
}

impl FromStr for FhirDate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for FhirDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl Serialize for FhirDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.original)
    }
}

impl<'de> Deserialize<'de> for FhirDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// A FHIR `time` (`hh:mm:ss` with optional fraction)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FhirTime {
    original: String,
    time: NaiveTime,
}

impl FhirTime {
    pub fn parse(value: &str) -> Result<Self> {
        if !time_regex().is_match(value) {
            return Err(invalid(value, "time"));
        }
        let time = NaiveTime::parse_from_str(value, "%H:%M:%S%.f")
            .map_err(|_| invalid(value, "time"))?;
        Ok(Self {
            original: value.to_string(),
            time,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.original
    }

    pub fn to_naive_time(&self) -> NaiveTime {
        self.time
    }
}

impl FromStr for FhirTime {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for FhirTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl Serialize for FhirTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.original)
    }
}

impl<'de> Deserialize<'de> for FhirTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_dates() {
        let year = FhirDate::parse("1960").unwrap();
        assert_eq!(year.precision(), DatePrecision::Year);
        assert_eq!(year.to_naive_date(), NaiveDate::from_ymd_opt(1960, 1, 1).unwrap());

        let month = FhirDate::parse("1960-06").unwrap();
        assert_eq!(month.precision(), DatePrecision::Month);

        let day = FhirDate::parse("1960-06-12").unwrap();
        assert_eq!(day.precision(), DatePrecision::Day);
        assert_eq!(day.as_str(), "1960-06-12");
        assert!(day.to_datetime().is_none());
    }

    #[test]
    fn test_date_time_with_zone() {
        let dt = FhirDate::parse("2013-04-02T10:30:10+01:00").unwrap();
        assert_eq!(dt.precision(), DatePrecision::Second);
        assert_eq!(dt.offset(), FixedOffset::east_opt(3600));

        let absolute = dt.to_datetime().unwrap();
        assert_eq!(absolute.to_rfc3339(), "2013-04-02T10:30:10+01:00");

        let instant = FhirDate::parse("2015-02-07T13:28:17.239Z").unwrap();
        assert_eq!(instant.precision(), DatePrecision::Fraction);
        assert_eq!(instant.time().unwrap().format("%H:%M:%S%.3f").to_string(), "13:28:17.239");
        assert_eq!(instant.to_string(), "2015-02-07T13:28:17.239Z");

        let minutes = FhirDate::parse("2015-02-07T13:28").unwrap();
        assert_eq!(minutes.precision(), DatePrecision::Minute);
        assert!(minutes.to_datetime().is_none());
    }

    #[test]
    fn test_invalid_dates() {
        for raw in ["", "60", "1960-13", "1960-02-30", "2015-02-07T25:00:00Z", "2015-02-07T10:00+15:00", "yesterday"] {
            assert!(FhirDate::parse(raw).is_err(), "{raw} should be rejected");
        }
        assert!(matches!(
            FhirDate::parse("1960-02-30"),
            Err(Error::InvalidFieldValue { .. })
        ));
    }

    #[test]
    fn test_time() {
        let time = FhirTime::parse("09:30:00").unwrap();
        assert_eq!(time.to_naive_time(), NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(time.as_str(), "09:30:00");

        assert!(FhirTime::parse("09:30:00.125").is_ok());
        assert!(FhirTime::parse("24:00:00").is_err());
        assert!(FhirTime::parse("9:30").is_err());
    }

    #[test]
    fn test_serde_keeps_lexical_form() {
        let date: FhirDate = serde_json::from_value(serde_json::json!("2012-05")).unwrap();
        assert_eq!(serde_json::to_value(&date).unwrap(), serde_json::json!("2012-05"));
        assert!(serde_json::from_value::<FhirDate>(serde_json::json!("2012-5")).is_err());
    }
}

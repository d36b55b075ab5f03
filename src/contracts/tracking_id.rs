use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::contracts::error::ParseError;

/// Minimum width of the counter segment. Larger values widen, never truncate.
pub const COUNTER_WIDTH: usize = 4;

/// Longest accepted brand code.
pub const MAX_PREFIX_LEN: usize = 8;

/// Calendar date used as the per-day sequence key, rendered `YYYYMMDD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(NaiveDate);

impl DateKey {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Resolves the calendar date of `instant` as seen from `offset`.
    pub fn from_instant(instant: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self(instant.with_timezone(&offset).date_naive())
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}{:02}{:02}",
            self.0.year(),
            self.0.month(),
            self.0.day()
        )
    }
}

impl FromStr for DateKey {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseError::InvalidDate(s.to_string()));
        }
        // All-digit input, so the slices are on char boundaries and parse cleanly.
        let year: i32 = s[0..4].parse().map_err(|_| ParseError::InvalidDate(s.into()))?;
        let month: u32 = s[4..6].parse().map_err(|_| ParseError::InvalidDate(s.into()))?;
        let day: u32 = s[6..8].parse().map_err(|_| ParseError::InvalidDate(s.into()))?;
        NaiveDate::from_ymd_opt(year, month, day)
            .map(Self)
            .ok_or_else(|| ParseError::InvalidDate(s.to_string()))
    }
}

impl Serialize for DateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DateKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Brand code at the front of every tracking identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Prefix(String);

impl Prefix {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Prefix {
    fn default() -> Self {
        Self("SK".into())
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Prefix {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = !s.is_empty()
            && s.len() <= MAX_PREFIX_LEN
            && s
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(ParseError::InvalidPrefix(s.to_string()))
        }
    }
}

/// Customer-facing order reference: `PREFIX-YYYYMMDD-NNNN`.
///
/// The rendered form is a compatibility contract. Existing orders, emails and
/// printed receipts carry it, so `Display` must stay bit-exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackingId {
    prefix: Prefix,
    date: DateKey,
    counter: u64,
}

impl TrackingId {
    /// Builds an identifier from an issued counter. Counters start at 1.
    pub fn new(prefix: Prefix, date: DateKey, counter: u64) -> Self {
        debug_assert!(counter >= 1, "counters start at 1");
        Self {
            prefix,
            date,
            counter,
        }
    }

    pub fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    pub fn date(&self) -> DateKey {
        self.date
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }
}

impl fmt::Display for TrackingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{:0width$}",
            self.prefix,
            self.date,
            self.counter,
            width = COUNTER_WIDTH
        )
    }
}

impl FromStr for TrackingId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('-');
        let (Some(prefix), Some(date), Some(counter), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(ParseError::InvalidFormat(s.to_string()));
        };

        let prefix: Prefix = prefix.parse()?;
        let date: DateKey = date.parse()?;

        if counter.len() < COUNTER_WIDTH || !counter.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseError::InvalidCounter(counter.to_string()));
        }
        let value: u64 = counter
            .parse()
            .map_err(|_| ParseError::InvalidCounter(counter.to_string()))?;
        // Reject zero and over-padded forms like "00042", which would render differently.
        if value == 0 || format!("{:0width$}", value, width = COUNTER_WIDTH) != counter {
            return Err(ParseError::InvalidCounter(counter.to_string()));
        }

        Ok(Self {
            prefix,
            date,
            counter: value,
        })
    }
}

impl Serialize for TrackingId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TrackingId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Snapshot of one day's counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySequence {
    pub date: DateKey,
    pub counter: u64,
    /// Time of the last increment. Only durable stores track it.
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(s: &str) -> DateKey {
        s.parse().unwrap()
    }

    #[test]
    fn formats_with_four_digit_padding() {
        let id = TrackingId::new(Prefix::default(), date("20251031"), 1);
        assert_eq!(id.to_string(), "SK-20251031-0001");
    }

    #[test]
    fn wide_counters_are_not_truncated() {
        let id = TrackingId::new(Prefix::default(), date("20251031"), 10_000);
        assert_eq!(id.to_string(), "SK-20251031-10000");

        let id = TrackingId::new(Prefix::default(), date("20251031"), 123_456);
        assert_eq!(id.to_string(), "SK-20251031-123456");
    }

    #[test]
    fn parses_rendered_form() {
        let id: TrackingId = "SK-20251031-0042".parse().unwrap();
        assert_eq!(id.prefix().as_str(), "SK");
        assert_eq!(id.date(), date("20251031"));
        assert_eq!(id.counter(), 42);

        let wide: TrackingId = "SK-20251031-10000".parse().unwrap();
        assert_eq!(wide.counter(), 10_000);
    }

    #[test]
    fn rejects_malformed_ids() {
        for bad in [
            "",
            "SK",
            "SK-20251031",
            "SK-20251031-001",
            "SK-20251031-0000",
            "SK-20251031-00042",
            "SK-20251031-+001",
            "SK-20251331-0001",
            "SK-2025103-00001",
            "sk-20251031-0001",
            "SK-20251031-0001-1",
            "TRK-ABC123XYZ",
        ] {
            assert!(bad.parse::<TrackingId>().is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn date_key_rejects_impossible_dates() {
        assert!("20250229".parse::<DateKey>().is_err());
        assert!("20240229".parse::<DateKey>().is_ok());
        assert!("2025-10-31".parse::<DateKey>().is_err());
        assert!("２０２５１０３１".parse::<DateKey>().is_err());
    }

    #[test]
    fn date_key_follows_offset() {
        let instant = Utc.with_ymd_and_hms(2025, 10, 31, 23, 30, 0).unwrap();
        let utc = FixedOffset::east_opt(0).unwrap();
        let lagos = FixedOffset::east_opt(3600).unwrap();
        let honolulu = FixedOffset::west_opt(10 * 3600).unwrap();

        assert_eq!(DateKey::from_instant(instant, utc).to_string(), "20251031");
        assert_eq!(DateKey::from_instant(instant, lagos).to_string(), "20251101");
        assert_eq!(DateKey::from_instant(instant, honolulu).to_string(), "20251031");
    }

    #[test]
    fn prefix_validation() {
        assert!("SK".parse::<Prefix>().is_ok());
        assert!("ORD2".parse::<Prefix>().is_ok());
        assert!("".parse::<Prefix>().is_err());
        assert!("S-K".parse::<Prefix>().is_err());
        assert!("sk".parse::<Prefix>().is_err());
        assert!("ABCDEFGHI".parse::<Prefix>().is_err());
    }

    #[test]
    fn serializes_as_string() {
        let id = TrackingId::new(Prefix::default(), date("20251031"), 7);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"SK-20251031-0007\"");

        let back: TrackingId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}

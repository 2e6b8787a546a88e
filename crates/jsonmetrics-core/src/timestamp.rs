//! Timestamp formats for extracted record timestamps.

use std::fmt;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::error::TimestampError;

/// How the text selected by a timestamp path is turned into an instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimestampFormat {
    /// `2024-05-01T12:00:00Z`
    Rfc3339,
    /// `Wed, 01 May 2024 12:00:00 +0000`
    Rfc2822,
    /// Seconds since the epoch, fractions allowed.
    UnixSeconds,
    /// Milliseconds since the epoch.
    UnixMillis,
    /// A strftime pattern. Read as UTC unless the pattern carries an offset.
    Pattern(String),
}

impl TimestampFormat {
    /// Parse a format name (`rfc3339`, `rfc2822`, `unix`, `unix_ms`) or a
    /// strftime pattern such as `%Y-%m-%d %H:%M:%S`.
    pub fn parse(spec: &str) -> Result<Self, TimestampError> {
        match spec.trim() {
            "rfc3339" | "RFC3339" => Ok(Self::Rfc3339),
            "rfc2822" | "RFC2822" => Ok(Self::Rfc2822),
            "unix" => Ok(Self::UnixSeconds),
            "unix_ms" => Ok(Self::UnixMillis),
            pattern => {
                let malformed = StrftimeItems::new(pattern).any(|item| item == Item::Error);
                if pattern.is_empty() || !pattern.contains('%') || malformed {
                    Err(TimestampError::InvalidFormat(spec.to_string()))
                } else {
                    Ok(Self::Pattern(pattern.to_string()))
                }
            }
        }
    }

    /// Parse extracted text into a UTC instant.
    pub fn parse_timestamp(&self, raw: &str) -> Result<DateTime<Utc>, TimestampError> {
        let raw = raw.trim();
        match self {
            Self::Rfc3339 => DateTime::parse_from_rfc3339(raw)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| self.error(raw, e)),
            Self::Rfc2822 => DateTime::parse_from_rfc2822(raw)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| self.error(raw, e)),
            Self::UnixSeconds => {
                let secs: f64 = raw.parse().map_err(|e| self.error(raw, e))?;
                if !secs.is_finite() {
                    return Err(self.error(raw, "not a finite number"));
                }
                DateTime::from_timestamp_millis((secs * 1000.0).round() as i64)
                    .ok_or_else(|| self.error(raw, "out of range"))
            }
            Self::UnixMillis => {
                let millis: i64 = raw.parse().map_err(|e| self.error(raw, e))?;
                DateTime::from_timestamp_millis(millis)
                    .ok_or_else(|| self.error(raw, "out of range"))
            }
            Self::Pattern(pattern) => DateTime::parse_from_str(raw, pattern)
                .map(|t| t.with_timezone(&Utc))
                .or_else(|_| NaiveDateTime::parse_from_str(raw, pattern).map(|t| t.and_utc()))
                .or_else(|_| {
                    NaiveDate::parse_from_str(raw, pattern)
                        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
                })
                .map_err(|e| self.error(raw, e)),
        }
    }

    fn error(&self, raw: &str, reason: impl fmt::Display) -> TimestampError {
        TimestampError::Parse {
            raw: raw.to_string(),
            format: self.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for TimestampFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rfc3339 => f.write_str("rfc3339"),
            Self::Rfc2822 => f.write_str("rfc2822"),
            Self::UnixSeconds => f.write_str("unix"),
            Self::UnixMillis => f.write_str("unix_ms"),
            Self::Pattern(pattern) => write!(f, "{pattern:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn named_formats() {
        assert_eq!(TimestampFormat::parse("rfc3339").unwrap(), TimestampFormat::Rfc3339);
        assert_eq!(TimestampFormat::parse("RFC2822").unwrap(), TimestampFormat::Rfc2822);
        assert_eq!(TimestampFormat::parse("unix").unwrap(), TimestampFormat::UnixSeconds);
        assert_eq!(TimestampFormat::parse("unix_ms").unwrap(), TimestampFormat::UnixMillis);
    }

    #[test]
    fn rejects_patterns_without_specifiers() {
        assert!(TimestampFormat::parse("").is_err());
        assert!(TimestampFormat::parse("2006-01-02").is_err());
        assert!(TimestampFormat::parse("%Y-%m-%d %Q").is_err());
    }

    #[test]
    fn rfc3339_with_offset() {
        let ts = TimestampFormat::Rfc3339
            .parse_timestamp("2024-05-01T14:00:00+02:00")
            .unwrap();
        assert_eq!(ts, utc(2024, 5, 1, 12, 0, 0));
    }

    #[test]
    fn rfc2822() {
        let ts = TimestampFormat::Rfc2822
            .parse_timestamp("Wed, 01 May 2024 12:00:00 +0000")
            .unwrap();
        assert_eq!(ts, utc(2024, 5, 1, 12, 0, 0));
    }

    #[test]
    fn unix_seconds_and_millis() {
        let secs = TimestampFormat::UnixSeconds.parse_timestamp("1714564800.25").unwrap();
        assert_eq!(secs.timestamp_millis(), 1_714_564_800_250);
        let millis = TimestampFormat::UnixMillis.parse_timestamp("1714564800250").unwrap();
        assert_eq!(millis, secs);
    }

    #[test]
    fn pattern_without_zone_is_utc() {
        let format = TimestampFormat::parse("%Y-%m-%d %H:%M:%S").unwrap();
        let ts = format.parse_timestamp("2024-05-01 12:00:00").unwrap();
        assert_eq!(ts, utc(2024, 5, 1, 12, 0, 0));
    }

    #[test]
    fn pattern_with_zone() {
        let format = TimestampFormat::parse("%Y-%m-%d %H:%M:%S %z").unwrap();
        let ts = format.parse_timestamp("2024-05-01 13:00:00 +0100").unwrap();
        assert_eq!(ts, utc(2024, 5, 1, 12, 0, 0));
    }

    #[test]
    fn date_only_pattern() {
        let format = TimestampFormat::parse("%Y-%m-%d").unwrap();
        assert_eq!(format.parse_timestamp("2024-05-01").unwrap(), utc(2024, 5, 1, 0, 0, 0));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = TimestampFormat::Rfc3339.parse_timestamp("yesterday").unwrap_err();
        assert!(matches!(err, TimestampError::Parse { .. }));
        assert!(TimestampFormat::UnixSeconds.parse_timestamp("NaN").is_err());
    }
}

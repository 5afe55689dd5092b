//! Timestamp resolution for positioning sentences.
//!
//! Each sentence resolves its timestamp from, in priority order:
//! an explicit absolute timestamp, a duration added to the previously
//! resolved timestamp, or the current wall clock. The resolved value is
//! remembered for the next sentence.

use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Months, NaiveDate, NaiveDateTime, TimeDelta, Utc};

use crate::error::PayloadError;

/// Carries the last resolved sentence timestamp across entries.
#[derive(Debug, Clone, Default)]
pub struct SentenceClock {
    last: Option<DateTime<FixedOffset>>,
}

impl SentenceClock {
    /// A clock with nothing resolved yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently resolved timestamp.
    pub fn last(&self) -> Option<DateTime<FixedOffset>> {
        self.last
    }

    /// Resolve the timestamp for the next sentence and remember it.
    ///
    /// A duration without a previous timestamp falls back to `now`; this is
    /// never an error.
    pub fn resolve(
        &mut self,
        explicit: Option<DateTime<FixedOffset>>,
        offset: Option<&IsoDuration>,
        now: DateTime<Utc>,
    ) -> Result<DateTime<FixedOffset>, PayloadError> {
        let resolved = match (explicit, offset, self.last) {
            (Some(at), _, _) => at,
            (None, Some(offset), Some(previous)) => offset.after(previous)?,
            _ => now.fixed_offset(),
        };
        self.last = Some(resolved);
        Ok(resolved)
    }
}

/// Parse an absolute timestamp.
///
/// Accepts RFC 3339 (`2024-01-01T10:00:00Z`, `...+02:00`), naive ISO
/// date-times with `T` or a space separator (taken as UTC), and bare dates
/// (midnight UTC).
pub fn parse_timestamp(text: &str) -> Result<DateTime<FixedOffset>, PayloadError> {
    let text = text.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Ok(at);
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(naive.and_utc().fixed_offset());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
        .ok_or_else(|| PayloadError::InvalidTimestamp(text.to_string()))
}

/// A relative duration: calendar months plus an exact span.
///
/// Parsed from ISO 8601 (`PT5S`, `P1DT2H30M`, `P2W`, `P1Y2M`) or from a
/// plain number of seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct IsoDuration {
    months: u32,
    span: TimeDelta,
}

impl IsoDuration {
    /// A duration of whole and fractional seconds.
    pub fn from_secs_f64(seconds: f64) -> Result<Self, PayloadError> {
        span_from_secs(seconds)
            .map(|span| Self { months: 0, span })
            .ok_or_else(|| PayloadError::InvalidDuration(seconds.to_string()))
    }

    /// Apply this duration after `start`.
    pub fn after(
        &self,
        start: DateTime<FixedOffset>,
    ) -> Result<DateTime<FixedOffset>, PayloadError> {
        start
            .checked_add_months(Months::new(self.months))
            .and_then(|at| at.checked_add_signed(self.span))
            .ok_or_else(|| PayloadError::InvalidDuration(format!("{self:?} after {start}")))
    }
}

impl FromStr for IsoDuration {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let invalid = || PayloadError::InvalidDuration(text.to_string());

        if let Ok(seconds) = text.parse::<f64>() {
            return Self::from_secs_f64(seconds);
        }

        let body = text.strip_prefix('P').ok_or_else(invalid)?;
        if body.is_empty() {
            return Err(invalid());
        }

        let mut months: u64 = 0;
        let mut seconds = 0.0_f64;
        let mut in_time = false;
        let mut number = String::new();
        let mut saw_component = false;

        for c in body.chars() {
            match c {
                'T' if !in_time && number.is_empty() => in_time = true,
                '0'..='9' | '.' | ',' => number.push(if c == ',' { '.' } else { c }),
                unit => {
                    let value: f64 = number.parse().map_err(|_| invalid())?;
                    number.clear();
                    saw_component = true;
                    match (in_time, unit) {
                        (false, 'Y') => months += whole(value).ok_or_else(invalid)? * 12,
                        (false, 'M') => months += whole(value).ok_or_else(invalid)?,
                        (false, 'W') => seconds += value * 7.0 * 86_400.0,
                        (false, 'D') => seconds += value * 86_400.0,
                        (true, 'H') => seconds += value * 3_600.0,
                        (true, 'M') => seconds += value * 60.0,
                        (true, 'S') => seconds += value,
                        _ => return Err(invalid()),
                    }
                }
            }
        }
        if !number.is_empty() || !saw_component {
            return Err(invalid());
        }

        let months = u32::try_from(months).map_err(|_| invalid())?;
        let span = span_from_secs(seconds).ok_or_else(invalid)?;
        Ok(Self { months, span })
    }
}

fn whole(value: f64) -> Option<u64> {
    (value.fract() == 0.0 && value >= 0.0 && value <= u32::MAX as f64).then_some(value as u64)
}

fn span_from_secs(seconds: f64) -> Option<TimeDelta> {
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.trunc();
    let nanos = ((seconds - whole) * 1e9).round();
    TimeDelta::try_seconds(whole as i64)?.checked_add(&TimeDelta::nanoseconds(nanos as i64))
}

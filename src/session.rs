//! Pre-market session window in exchange-local time

use crate::error::{Result, ScreenerError};
use crate::types::Timestamp;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Daily pre-market window, e.g. 04:00-09:29 US/Eastern
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PremarketWindow {
    start: NaiveTime,
    end: NaiveTime,
    tz: Tz,
}

impl PremarketWindow {
    pub fn new(start: NaiveTime, end: NaiveTime, tz: Tz) -> Result<Self> {
        if start >= end {
            return Err(ScreenerError::ConfigError(format!(
                "premarket window start {} must be before end {}",
                start, end
            )));
        }
        Ok(Self { start, end, tz })
    }

    /// Parse `HH:MM` bounds and an IANA time zone name
    pub fn parse(start: &str, end: &str, timezone: &str) -> Result<Self> {
        let tz: Tz = timezone
            .parse()
            .map_err(|e| ScreenerError::ConfigError(format!("Unknown timezone '{}': {}", timezone, e)))?;
        Self::new(parse_hhmm(start)?, parse_hhmm(end)?, tz)
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Exchange-local calendar date of `as_of`
    pub fn session_date(&self, as_of: Timestamp) -> NaiveDate {
        as_of.with_timezone(&self.tz).date_naive()
    }

    /// UTC bounds of the window on the session date of `as_of`.
    /// When `as_of` falls inside the window, the end is clamped to `as_of`.
    pub fn bounds(&self, as_of: Timestamp) -> Result<(Timestamp, Timestamp)> {
        let date = self.session_date(as_of);
        let start = self.localize(date, self.start)?;
        let mut end = self.localize(date, self.end)?;
        if start <= as_of && as_of <= end {
            end = as_of;
        }
        Ok((start, end))
    }

    /// Whether `ts` lies inside the (clamped) window for `as_of`
    pub fn contains(&self, ts: Timestamp, as_of: Timestamp) -> Result<bool> {
        let (start, end) = self.bounds(as_of)?;
        Ok(start <= ts && ts <= end)
    }

    fn localize(&self, date: NaiveDate, time: NaiveTime) -> Result<DateTime<Utc>> {
        self.tz
            .from_local_datetime(&date.and_time(time))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| {
                ScreenerError::ParseError(format!(
                    "{} {} does not exist in {}",
                    date, time, self.tz
                ))
            })
    }
}

impl Default for PremarketWindow {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(4, 0, 0).unwrap_or_default(),
            end: NaiveTime::from_hms_opt(9, 29, 0).unwrap_or_default(),
            tz: chrono_tz::US::Eastern,
        }
    }
}

fn parse_hhmm(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|e| {
        ScreenerError::ConfigError(format!(
            "Invalid time format '{}'. Expected HH:MM ({})",
            value, e
        ))
    })
}

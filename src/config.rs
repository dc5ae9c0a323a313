//! Scoring configuration
//!
//! The watch stamps onsets in epoch seconds; turning them into an hour of day
//! needs a clock policy. The policy is always explicit so that scores are
//! reproducible across hosts.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FeskError;

/// How epoch seconds are mapped onto a wall clock
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OnsetClock {
    /// Interpret timestamps in UTC
    #[default]
    Utc,
    /// Interpret timestamps in the host's local zone
    Local,
    /// Interpret timestamps at a fixed UTC offset
    Fixed(FixedOffset),
}

impl OnsetClock {
    /// Wall-clock date and time for an epoch timestamp
    pub fn wall_clock(&self, epoch_secs: u32) -> NaiveDateTime {
        let utc = utc_from_epoch(epoch_secs);
        match self {
            OnsetClock::Utc => utc.naive_utc(),
            OnsetClock::Local => utc.with_timezone(&Local).naive_local(),
            OnsetClock::Fixed(offset) => utc.with_timezone(offset).naive_local(),
        }
    }

    /// Hour of day in [0, 24) as `hour + minute / 60`, seconds ignored
    pub fn hour_of_day(&self, epoch_secs: u32) -> f64 {
        let t = self.wall_clock(epoch_secs);
        f64::from(t.hour()) + f64::from(t.minute()) / 60.0
    }
}

/// Convert watch epoch seconds to a UTC timestamp
pub fn utc_from_epoch(epoch_secs: u32) -> DateTime<Utc> {
    // every u32 second count is inside chrono's supported range
    DateTime::<Utc>::from_timestamp(i64::from(epoch_secs), 0).unwrap_or_default()
}

impl FromStr for OnsetClock {
    type Err = FeskError;

    /// Accepts `utc`, `local`, `z`, or an offset such as `+02:00`, `-0530`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "utc" | "z" => return Ok(OnsetClock::Utc),
            "local" => return Ok(OnsetClock::Local),
            _ => {}
        }
        parse_offset(trimmed)
            .map(OnsetClock::Fixed)
            .ok_or_else(|| FeskError::InvalidClock(s.to_string()))
    }
}

fn parse_offset(s: &str) -> Option<FixedOffset> {
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

impl fmt::Display for OnsetClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OnsetClock::Utc => f.write_str("utc"),
            OnsetClock::Local => f.write_str("local"),
            OnsetClock::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}

impl TryFrom<String> for OnsetClock {
    type Error = FeskError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OnsetClock> for String {
    fn from(clock: OnsetClock) -> Self {
        clock.to_string()
    }
}

/// Scoring configuration, loadable from a JSON file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoringConfig {
    /// Clock used for hour-of-day and export formatting
    #[serde(default)]
    pub clock: OnsetClock,
}

impl ScoringConfig {
    pub fn with_clock(clock: OnsetClock) -> Self {
        Self { clock }
    }

    pub fn validate(&self) -> Result<(), FeskError> {
        if let OnsetClock::Fixed(offset) = self.clock {
            // offsets beyond +/-14h do not exist on any civil clock
            if offset.local_minus_utc().abs() > 14 * 3600 {
                return Err(FeskError::InvalidConfig(format!(
                    "clock offset {offset} is outside +/-14:00"
                )));
            }
        }
        Ok(())
    }

    /// Parse and validate a JSON config
    pub fn from_json(json: &str) -> Result<Self, FeskError> {
        let config: ScoringConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, FeskError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

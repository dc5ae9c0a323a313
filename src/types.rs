//! Core types for the FESK sleep pipeline
//!
//! This module defines the data that flows through each stage: raw nights as
//! decoded from a frame, nights enriched with derived metrics, and the
//! 7-night circadian score.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of nights carried by one frame
pub const NIGHTS_PER_FRAME: usize = 7;

/// Encoded width of one night record in bytes
pub const NIGHT_BYTES: usize = 16;

/// Encoded width of one frame in bytes
pub const FRAME_BYTES: usize = NIGHTS_PER_FRAME * NIGHT_BYTES;

/// One night of sleep as transmitted by the watch.
///
/// Position within the frame is the device-assigned slot, not calendar order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Night {
    /// Sleep onset (epoch seconds)
    pub onset: u32,
    /// Sleep offset (epoch seconds)
    pub offset: u32,
    /// Total sleep duration (minutes)
    pub duration: u16,
    /// Sleep efficiency (percent, not range-checked)
    pub efficiency: u8,
    /// Wake after sleep onset (minutes)
    pub waso: u16,
    /// Number of awakenings
    pub awakenings: u8,
    /// Raw light exposure (0-255)
    pub light: u8,
    /// Validity flag, 0 means the slot holds no data
    pub valid: u8,
}

impl Night {
    pub fn is_valid(&self) -> bool {
        self.valid != 0
    }

    /// A night contributes to scoring only when flagged valid and carrying an onset
    pub fn has_data(&self) -> bool {
        self.is_valid() && self.onset > 0
    }

    /// Duration in hours
    pub fn hours(&self) -> f64 {
        f64::from(self.duration) / 60.0
    }
}

/// Metrics derived from a night that has data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NightMetrics {
    pub onset_time: DateTime<Utc>,
    pub offset_time: DateTime<Utc>,
    /// Duration in hours, rounded to one decimal
    pub duration_hours: f64,
    /// Per-night quality score (0-100)
    pub quality: u8,
}

/// A decoded night, either empty or enriched with derived metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NightRecord {
    Scored {
        #[serde(flatten)]
        night: Night,
        #[serde(flatten)]
        metrics: NightMetrics,
    },
    NoData(Night),
}

impl NightRecord {
    pub fn night(&self) -> &Night {
        match self {
            NightRecord::Scored { night, .. } => night,
            NightRecord::NoData(night) => night,
        }
    }

    pub fn metrics(&self) -> Option<&NightMetrics> {
        match self {
            NightRecord::Scored { metrics, .. } => Some(metrics),
            NightRecord::NoData(_) => None,
        }
    }

    /// Quality score, 0 for nights without data
    pub fn quality(&self) -> u8 {
        self.metrics().map_or(0, |m| m.quality)
    }
}

/// Aggregate 7-night circadian score and its components
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CircadianScore {
    /// Overall score (0-100)
    pub cs: u8,
    /// Sleep regularity index (0-100, unrounded)
    pub sri: f64,
    /// Duration component (0-100)
    pub duration: u8,
    /// Mean efficiency (0-100)
    pub efficiency: u8,
    /// Share of the 7-night window holding data (0-100)
    pub compliance: u8,
    /// Light exposure component (0-100)
    pub light: u8,
}

impl CircadianScore {
    /// The degenerate record returned when there is not enough data
    pub fn zero() -> Self {
        Self::default()
    }
}

/// A fully decoded and scored frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredFrame {
    pub nights: [NightRecord; NIGHTS_PER_FRAME],
    pub circadian_score: CircadianScore,
}

impl ScoredFrame {
    /// Nights that carry derived metrics, in slot order
    pub fn scored_nights(&self) -> impl Iterator<Item = (&Night, &NightMetrics)> {
        self.nights.iter().filter_map(|record| match record {
            NightRecord::Scored { night, metrics } => Some((night, metrics)),
            NightRecord::NoData(_) => None,
        })
    }

    /// The raw nights, in slot order
    pub fn raw_nights(&self) -> [Night; NIGHTS_PER_FRAME] {
        self.nights.clone().map(|record| *record.night())
    }
}

//! Per-night quality scoring
//!
//! Quality is a weighted blend of four sub-scores:
//! - 40% efficiency
//! - 30% duration (7-9h optimal)
//! - 20% awakenings (fewer is better)
//! - 10% WASO (lower is better)

use crate::config::utc_from_epoch;
use crate::types::{Night, NightMetrics, NightRecord};

const WEIGHT_EFFICIENCY: f64 = 0.40;
const WEIGHT_DURATION: f64 = 0.30;
const WEIGHT_AWAKENINGS: f64 = 0.20;
const WEIGHT_WASO: f64 = 0.10;

/// Plateau scores for the sleep duration bands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationBands {
    /// Score for [7, 9] hours
    pub optimal: u8,
    /// Score for [6, 7) or (9, 10] hours
    pub near: u8,
    /// Score for anything else
    pub outside: u8,
}

/// Bands used by the per-night quality score
pub const NIGHT_DURATION_BANDS: DurationBands = DurationBands {
    optimal: 100,
    near: 80,
    outside: 60,
};

impl DurationBands {
    pub fn score(&self, hours: f64) -> u8 {
        if (7.0..=9.0).contains(&hours) {
            self.optimal
        } else if (6.0..7.0).contains(&hours) || (hours > 9.0 && hours <= 10.0) {
            self.near
        } else {
            self.outside
        }
    }
}

/// Quality score (0-100) for a single night.
///
/// Invalid nights score 0. Efficiency is capped at 100 since the decoder does
/// not range-check it. The weighted sum is rounded half away from zero.
pub fn quality(night: &Night) -> u8 {
    if !night.is_valid() {
        return 0;
    }

    let efficiency = f64::from(night.efficiency.min(100));
    let duration = f64::from(NIGHT_DURATION_BANDS.score(night.hours()));
    let awakenings = (100.0 - f64::from(night.awakenings) * 15.0).max(0.0);
    let waso = (100.0 - f64::from(night.waso) / 2.0).max(0.0);

    let score = efficiency * WEIGHT_EFFICIENCY
        + duration * WEIGHT_DURATION
        + awakenings * WEIGHT_AWAKENINGS
        + waso * WEIGHT_WASO;

    score.round().clamp(0.0, 100.0) as u8
}

/// Attach derived metrics to a night that has data
pub fn enrich(night: Night) -> NightRecord {
    if !night.has_data() {
        return NightRecord::NoData(night);
    }

    let metrics = NightMetrics {
        onset_time: utc_from_epoch(night.onset),
        offset_time: utc_from_epoch(night.offset),
        duration_hours: (night.hours() * 10.0).round() / 10.0,
        quality: quality(&night),
    };
    NightRecord::Scored { night, metrics }
}

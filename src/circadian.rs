//! Circadian score aggregation
//!
//! Combines the nights of one frame into a 0-100 score from five components:
//! - Sleep Regularity Index (onset timing variance): 25%
//! - Sleep duration: 25%
//! - Sleep efficiency: 25%
//! - Compliance (nights with data out of 7): 15%
//! - Light exposure: 10%

use crate::config::OnsetClock;
use crate::quality::DurationBands;
use crate::types::{CircadianScore, Night, NIGHTS_PER_FRAME};

/// Minimum number of nights with data before a score is computed
pub const MIN_SCORED_NIGHTS: usize = 3;

const WEIGHT_SRI: f64 = 0.25;
const WEIGHT_DURATION: f64 = 0.25;
const WEIGHT_EFFICIENCY: f64 = 0.25;
const WEIGHT_COMPLIANCE: f64 = 0.15;
const WEIGHT_LIGHT: f64 = 0.10;

/// Duration bands for the 7-night average
pub const WINDOW_DURATION_BANDS: DurationBands = DurationBands {
    optimal: 100,
    near: 85,
    outside: 60,
};

/// Compute the circadian score of a frame.
///
/// Only nights flagged valid with a non-zero onset take part. With fewer than
/// [`MIN_SCORED_NIGHTS`] of them the zero record is returned.
pub fn circadian_score(nights: &[Night], clock: OnsetClock) -> CircadianScore {
    let scored: Vec<&Night> = nights.iter().filter(|n| n.has_data()).collect();
    if scored.len() < MIN_SCORED_NIGHTS {
        tracing::debug!(nights = scored.len(), "not enough nights for a circadian score");
        return CircadianScore::zero();
    }

    let sri = sleep_regularity(&scored, clock);

    let mean_hours = mean(scored.iter().map(|n| f64::from(n.duration))) / 60.0;
    let duration = WINDOW_DURATION_BANDS.score(mean_hours);

    // raw bytes may exceed 100; only the mean is capped
    let efficiency = mean(scored.iter().map(|n| f64::from(n.efficiency)))
        .round()
        .min(100.0) as u8;

    let compliance = (scored.len() as f64 / NIGHTS_PER_FRAME as f64 * 100.0).round() as u8;

    let light = (mean(scored.iter().map(|n| f64::from(n.light))) / 2.55).round() as u8;

    let cs = (sri * WEIGHT_SRI
        + f64::from(duration) * WEIGHT_DURATION
        + f64::from(efficiency) * WEIGHT_EFFICIENCY
        + f64::from(compliance) * WEIGHT_COMPLIANCE
        + f64::from(light) * WEIGHT_LIGHT)
        .round() as u8;

    tracing::debug!(cs, sri, nights = scored.len(), "computed circadian score");

    CircadianScore {
        cs,
        sri,
        duration,
        efficiency,
        compliance,
        light,
    }
}

/// Regularity of sleep onset: `clamp(100 - 10 * variance, 0, 100)` over the
/// onset hour of day.
///
/// Hours are compared linearly, so 23:50 and 00:10 count as almost a day apart.
fn sleep_regularity(nights: &[&Night], clock: OnsetClock) -> f64 {
    let hours: Vec<f64> = nights.iter().map(|n| clock.hour_of_day(n.onset)).collect();
    let mean_hour = mean(hours.iter().copied());
    let variance = mean(hours.iter().map(|h| (h - mean_hour).powi(2)));
    (100.0 - variance * 10.0).clamp(0.0, 100.0)
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use pretty_assertions::assert_eq;

    /// 2024-01-15T00:00:00Z
    const DAY0: u32 = 1_705_276_800;
    const DAY: u32 = 86_400;

    fn night_at(day: u32, hour: f64, duration: u16, efficiency: u8, light: u8) -> Night {
        let onset = DAY0 + day * DAY + (hour * 3600.0) as u32;
        Night {
            onset,
            offset: onset + u32::from(duration) * 60,
            duration,
            efficiency,
            waso: 15,
            awakenings: 1,
            light,
            valid: 1,
        }
    }

    fn regular_week() -> [Night; NIGHTS_PER_FRAME] {
        [
            night_at(0, 23.0, 480, 90, 255),
            night_at(1, 23.0, 480, 90, 255),
            night_at(2, 23.0, 480, 90, 255),
            night_at(3, 23.0, 480, 90, 255),
            night_at(4, 23.0, 480, 90, 255),
            night_at(5, 23.0, 480, 90, 255),
            night_at(6, 23.0, 480, 90, 255),
        ]
    }

    #[test]
    fn test_perfectly_regular_week() {
        let score = circadian_score(&regular_week(), OnsetClock::Utc);
        assert_eq!(
            score,
            CircadianScore {
                // 25 + 25 + 22.5 + 15 + 10 = 97.5
                cs: 98,
                sri: 100.0,
                duration: 100,
                efficiency: 90,
                compliance: 100,
                light: 100,
            }
        );
    }

    #[test]
    fn test_fewer_than_three_nights_is_zero() {
        let mut nights = regular_week();
        for night in nights.iter_mut().skip(2) {
            night.valid = 0;
        }
        assert_eq!(circadian_score(&nights, OnsetClock::Utc), CircadianScore::zero());

        nights[1].valid = 0;
        assert_eq!(circadian_score(&nights, OnsetClock::Utc), CircadianScore::zero());

        nights[0].valid = 0;
        assert_eq!(circadian_score(&nights, OnsetClock::Utc), CircadianScore::zero());
    }

    #[test]
    fn test_zero_onset_excluded() {
        let mut nights = regular_week();
        for night in nights.iter_mut().skip(3) {
            night.valid = 0;
        }
        nights[2].onset = 0;
        assert_eq!(circadian_score(&nights, OnsetClock::Utc), CircadianScore::zero());
    }

    #[test]
    fn test_compliance_counts_against_seven() {
        let mut nights = regular_week();
        nights[5].valid = 0;
        nights[6].valid = 0;
        let score = circadian_score(&nights, OnsetClock::Utc);
        assert_eq!(score.compliance, 71);

        nights[4].valid = 0;
        nights[3].valid = 0;
        let score = circadian_score(&nights, OnsetClock::Utc);
        assert_eq!(score.compliance, 43);
    }

    #[test]
    fn test_sri_population_variance() {
        // onsets at 22:00, 23:00, 00:00 -> hours 22, 23, 0
        let nights = [
            night_at(0, 22.0, 480, 90, 0),
            night_at(1, 23.0, 480, 90, 0),
            night_at(3, 0.0, 480, 90, 0),
        ];
        let score = circadian_score(&nights, OnsetClock::Utc);
        // mean 15, variance (49 + 64 + 225) / 3 = 112.67 -> clamped to 0
        assert_eq!(score.sri, 0.0);

        let nights = [
            night_at(0, 22.5, 480, 90, 0),
            night_at(1, 23.0, 480, 90, 0),
            night_at(2, 23.5, 480, 90, 0),
        ];
        let score = circadian_score(&nights, OnsetClock::Utc);
        // mean 23, variance (0.25 + 0 + 0.25) / 3 = 1/6
        assert!((score.sri - (100.0 - 10.0 / 6.0)).abs() < 1e-9);
    }

    #[test]
    fn test_sri_depends_on_clock() {
        // 23:30, 23:50, 00:10 UTC straddle midnight; at +01:00 they do not
        let nights = [
            night_at(0, 23.5, 480, 90, 0),
            night_at(1, 23.0 + 50.0 / 60.0, 480, 90, 0),
            night_at(3, 10.0 / 60.0, 480, 90, 0),
        ];
        let utc = circadian_score(&nights, OnsetClock::Utc);
        assert_eq!(utc.sri, 0.0);

        let plus_one = OnsetClock::Fixed(FixedOffset::east_opt(3600).unwrap());
        let shifted = circadian_score(&nights, plus_one);
        assert!(shifted.sri > 99.0);
    }

    #[test]
    fn test_duration_bands_use_mean() {
        let nights = [
            night_at(0, 23.0, 360, 80, 0),
            night_at(1, 23.0, 400, 80, 0),
            night_at(2, 23.0, 410, 80, 0),
        ];
        // mean 390 min = 6.5h
        assert_eq!(circadian_score(&nights, OnsetClock::Utc).duration, 85);

        let nights = [
            night_at(0, 23.0, 300, 80, 0),
            night_at(1, 23.0, 300, 80, 0),
            night_at(2, 23.0, 300, 80, 0),
        ];
        assert_eq!(circadian_score(&nights, OnsetClock::Utc).duration, 60);

        let nights = [
            night_at(0, 23.0, 570, 80, 0),
            night_at(1, 23.0, 570, 80, 0),
            night_at(2, 23.0, 570, 80, 0),
        ];
        assert_eq!(circadian_score(&nights, OnsetClock::Utc).duration, 85);
    }

    #[test]
    fn test_efficiency_and_light_means() {
        let nights = [
            night_at(0, 23.0, 480, 80, 0),
            night_at(1, 23.0, 480, 85, 0),
            night_at(2, 23.0, 480, 86, 0),
        ];
        let score = circadian_score(&nights, OnsetClock::Utc);
        // 251 / 3 = 83.67
        assert_eq!(score.efficiency, 84);
        assert_eq!(score.light, 0);

        let nights = [
            night_at(0, 23.0, 480, 80, 128),
            night_at(1, 23.0, 480, 80, 128),
            night_at(2, 23.0, 480, 80, 128),
        ];
        // 128 / 2.55 = 50.2
        assert_eq!(circadian_score(&nights, OnsetClock::Utc).light, 50);
    }

    #[test]
    fn test_out_of_range_efficiency_caps_the_mean() {
        let nights = [
            night_at(0, 23.0, 480, 200, 0),
            night_at(1, 23.0, 480, 0, 0),
            night_at(2, 23.0, 480, 0, 0),
        ];
        // 200 / 3 = 66.67
        assert_eq!(circadian_score(&nights, OnsetClock::Utc).efficiency, 67);

        let nights = [
            night_at(0, 23.0, 480, 255, 0),
            night_at(1, 23.0, 480, 150, 0),
            night_at(2, 23.0, 480, 90, 0),
        ];
        assert_eq!(circadian_score(&nights, OnsetClock::Utc).efficiency, 100);
    }

    #[test]
    fn test_all_invalid_frame() {
        let nights = [Night::default(); NIGHTS_PER_FRAME];
        assert_eq!(circadian_score(&nights, OnsetClock::Utc), CircadianScore::zero());
    }
}

//! CSV and JSON export
//!
//! Renders a scored frame to the text formats the companion app offers for
//! download. Delivery of the rendered text is left to the caller.

use std::fmt::Write as _;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::OnsetClock;
use crate::error::FeskError;
use crate::types::{CircadianScore, NightRecord, ScoredFrame};

/// Version tag written into JSON exports
pub const EXPORT_VERSION: &str = "1.0";

/// CSV header row
pub const CSV_HEADER: &str =
    "Date,Onset,Offset,Duration(h),Efficiency(%),WASO(min),Awakenings,Light,Quality";

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Json => "application/json",
        }
    }

    /// Default download name, e.g. `sleep-data-2024-01-21.csv`
    pub fn file_name(&self, date: NaiveDate) -> String {
        format!("sleep-data-{}.{}", date.format("%Y-%m-%d"), self.extension())
    }
}

/// JSON export document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub version: String,
    pub export_time: DateTime<Utc>,
    pub nights: Vec<NightRecord>,
    pub circadian_score: CircadianScore,
}

/// Render a scored frame in the requested format
pub fn render(
    frame: &ScoredFrame,
    format: ExportFormat,
    clock: OnsetClock,
    export_time: DateTime<Utc>,
) -> Result<String, FeskError> {
    match format {
        ExportFormat::Csv => Ok(render_csv(&frame.nights, &frame.circadian_score, clock)),
        ExportFormat::Json => render_json(&frame.nights, &frame.circadian_score, export_time),
    }
}

/// One row per night with data, then a blank line and the six score rows.
///
/// Dates and times are shown on the given clock.
pub fn render_csv(nights: &[NightRecord], score: &CircadianScore, clock: OnsetClock) -> String {
    let mut csv = String::with_capacity(1024);
    csv.push_str(CSV_HEADER);
    csv.push('\n');

    for record in nights {
        let NightRecord::Scored { night, metrics } = record else {
            continue;
        };
        let onset = clock.wall_clock(night.onset);
        let offset = clock.wall_clock(night.offset);
        // writing to a String cannot fail
        let _ = writeln!(
            csv,
            "{},{},{},{:.1},{},{},{},{},{}",
            onset.format("%Y-%m-%d"),
            onset.format("%H:%M"),
            offset.format("%H:%M"),
            metrics.duration_hours,
            night.efficiency,
            night.waso,
            night.awakenings,
            night.light,
            metrics.quality,
        );
    }

    let _ = write!(
        csv,
        "\nCircadian Score,{}\nSRI,{}\nDuration,{}\nEfficiency,{}\nCompliance,{}\nLight,{}\n",
        score.cs, score.sri, score.duration, score.efficiency, score.compliance, score.light,
    );
    csv
}

/// Pretty-printed `{version, exportTime, nights, circadianScore}`
pub fn render_json(
    nights: &[NightRecord],
    score: &CircadianScore,
    export_time: DateTime<Utc>,
) -> Result<String, FeskError> {
    let document = ExportDocument {
        version: EXPORT_VERSION.to_string(),
        export_time,
        nights: nights.to_vec(),
        circadian_score: score.clone(),
    };
    serde_json::to_string_pretty(&document).map_err(FeskError::JsonError)
}

//! Pipeline orchestration
//!
//! This module provides the public API for FESK sleep decoding.
//! It orchestrates the full pipeline from a hex frame to scored, stored output.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::circadian::circadian_score;
use crate::config::ScoringConfig;
use crate::error::FeskError;
use crate::export::{self, ExportFormat};
use crate::frame;
use crate::quality::enrich;
use crate::store::{SleepStore, StoredRecord};
use crate::types::ScoredFrame;

/// Decode a hex frame and score it.
///
/// Pipeline stages:
/// 1. frame::decode - Strip separators, validate length, parse 7 nights
/// 2. enrich - Attach derived metrics and quality to nights with data
/// 3. circadian_score - Aggregate the 7-night score
///
/// # Example
/// ```ignore
/// let scored = decode_and_score(&hex, &ScoringConfig::default())?;
/// println!("cs = {}", scored.circadian_score.cs);
/// ```
pub fn decode_and_score(raw: &str, config: &ScoringConfig) -> Result<ScoredFrame, FeskError> {
    let nights = frame::decode(raw)?;
    let circadian_score = circadian_score(&nights, config.clock);
    Ok(ScoredFrame {
        nights: nights.map(enrich),
        circadian_score,
    })
}

/// Decode, score and render a frame in one call
pub fn frame_to_export(
    raw: &str,
    format: ExportFormat,
    config: &ScoringConfig,
) -> Result<String, FeskError> {
    let scored = decode_and_score(raw, config)?;
    export::render(&scored, format, config.clock, Utc::now())
}

/// Stateful processor that keeps every accepted frame in a store.
pub struct FrameProcessor {
    config: ScoringConfig,
    store: SleepStore,
}

impl Default for FrameProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameProcessor {
    /// Create a new processor with default settings
    pub fn new() -> Self {
        Self::with_config(ScoringConfig::default())
    }

    pub fn with_config(config: ScoringConfig) -> Self {
        Self {
            config,
            store: SleepStore::new(),
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn store(&self) -> &SleepStore {
        &self.store
    }

    /// Decode, score and store a frame captured now
    pub fn process(&mut self, raw: &str) -> Result<&StoredRecord, FeskError> {
        self.process_at(raw, Utc::now())
    }

    /// Decode, score and store a frame under an explicit capture time
    pub fn process_at(
        &mut self,
        raw: &str,
        captured_at: DateTime<Utc>,
    ) -> Result<&StoredRecord, FeskError> {
        let scored = decode_and_score(raw, &self.config)?;
        self.store.insert_at(captured_at, scored)
    }

    /// Render a stored record
    pub fn export(&self, timestamp: i64, format: ExportFormat) -> Result<String, FeskError> {
        let record = self
            .store
            .get(timestamp)
            .ok_or(FeskError::RecordNotFound(timestamp))?;
        export::render(&record.frame(), format, self.config.clock, Utc::now())
    }

    /// Load store state from JSON
    pub fn load_store(&mut self, json: &str) -> Result<(), FeskError> {
        self.store = SleepStore::from_json(json)?;
        Ok(())
    }

    /// Save store state to JSON
    pub fn save_store(&self) -> Result<String, FeskError> {
        self.store.to_json()
    }

    pub fn load_store_file(&mut self, path: &Path) -> Result<(), FeskError> {
        self.store = SleepStore::load(path)?;
        Ok(())
    }

    pub fn save_store_file(&self, path: &Path) -> Result<(), FeskError> {
        self.store.save(path)
    }
}

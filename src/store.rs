//! Record storage
//!
//! Keeps decoded frames keyed by their capture timestamp (epoch milliseconds)
//! and persists them as a JSON document.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FeskError;
use crate::types::{CircadianScore, NightRecord, ScoredFrame, NIGHTS_PER_FRAME};

/// One captured frame as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    pub id: Uuid,
    /// Capture time in epoch milliseconds, the record key
    pub timestamp: i64,
    pub received_at: DateTime<Utc>,
    pub nights: [NightRecord; NIGHTS_PER_FRAME],
    pub circadian_score: CircadianScore,
}

impl StoredRecord {
    pub fn frame(&self) -> ScoredFrame {
        ScoredFrame {
            nights: self.nights.clone(),
            circadian_score: self.circadian_score.clone(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct StoreFile {
    records: Vec<StoredRecord>,
}

/// In-memory store of captured frames
#[derive(Debug, Clone, Default)]
pub struct SleepStore {
    records: BTreeMap<i64, StoredRecord>,
}

impl SleepStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a frame keyed by the current time
    pub fn insert(&mut self, frame: ScoredFrame) -> Result<&StoredRecord, FeskError> {
        self.insert_at(Utc::now(), frame)
    }

    /// Store a frame under an explicit capture time
    pub fn insert_at(
        &mut self,
        captured_at: DateTime<Utc>,
        frame: ScoredFrame,
    ) -> Result<&StoredRecord, FeskError> {
        let timestamp = captured_at.timestamp_millis();
        if self.records.contains_key(&timestamp) {
            return Err(FeskError::DuplicateRecord(timestamp));
        }

        let record = StoredRecord {
            id: Uuid::new_v4(),
            timestamp,
            received_at: captured_at,
            nights: frame.nights,
            circadian_score: frame.circadian_score,
        };
        tracing::debug!(timestamp, id = %record.id, "stored frame");
        Ok(self.records.entry(timestamp).or_insert(record))
    }

    pub fn get(&self, timestamp: i64) -> Option<&StoredRecord> {
        self.records.get(&timestamp)
    }

    pub fn latest(&self) -> Option<&StoredRecord> {
        self.records.values().next_back()
    }

    /// All records, oldest first
    pub fn all(&self) -> impl Iterator<Item = &StoredRecord> {
        self.records.values()
    }

    pub fn remove(&mut self, timestamp: i64) -> Result<StoredRecord, FeskError> {
        self.records
            .remove(&timestamp)
            .ok_or(FeskError::RecordNotFound(timestamp))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Load store from JSON
    pub fn from_json(json: &str) -> Result<Self, FeskError> {
        let file: StoreFile = serde_json::from_str(json)?;
        let mut store = Self::new();
        for record in file.records {
            if store.records.contains_key(&record.timestamp) {
                return Err(FeskError::DuplicateRecord(record.timestamp));
            }
            store.records.insert(record.timestamp, record);
        }
        Ok(store)
    }

    /// Serialize store to JSON
    pub fn to_json(&self) -> Result<String, FeskError> {
        let file = StoreFile {
            records: self.records.values().cloned().collect(),
        };
        serde_json::to_string_pretty(&file).map_err(FeskError::JsonError)
    }

    /// Load from a file; a missing file is an empty store
    pub fn load(path: &Path) -> Result<Self, FeskError> {
        match fs::read_to_string(path) {
            Ok(json) => Self::from_json(&json),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), FeskError> {
        fs::write(path, self.to_json()?)?;
        tracing::info!(path = %path.display(), records = self.len(), "saved sleep store");
        Ok(())
    }
}

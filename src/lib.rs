//! FESK Sleep - decoder and circadian scoring engine for sleep telemetry frames
//!
//! The watch sends 7 nights of sleep summaries as one 112-byte frame encoded as
//! hex. This crate turns that frame into scored nights through a deterministic
//! pipeline: hex decoding → night parsing → per-night quality → 7-night
//! circadian score, with optional CSV/JSON export and a timestamp-keyed store.

pub mod circadian;
pub mod config;
pub mod error;
pub mod export;
pub mod frame;
pub mod pipeline;
pub mod quality;
pub mod store;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use circadian::circadian_score;
pub use config::{OnsetClock, ScoringConfig};
pub use error::FeskError;
pub use export::ExportFormat;
pub use frame::decode;
pub use pipeline::{decode_and_score, FrameProcessor};
pub use quality::{enrich, quality};
pub use store::{SleepStore, StoredRecord};
pub use types::{CircadianScore, Night, NightMetrics, NightRecord, ScoredFrame};

/// Library version embedded in exports and CLI output
pub const FESK_VERSION: &str = env!("CARGO_PKG_VERSION");

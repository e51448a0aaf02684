//! User feedback on answers, persisted as a flat JSON document.
//!
//! The file maps a response id to a [`FeedbackRecord`]:
//!
//! ```json
//! {
//!     "7f1c…": {
//!         "rating": 4,
//!         "feedback": "good sources",
//!         "timestamp": "2026-10-15T09:12:44.118+02:00",
//!         "retrieval_params": { "num_docs": 5, "similarity_threshold": 0.75 }
//!     }
//! }
//! ```
//!
//! A missing or corrupt file reads as an empty map. Write failures are
//! returned to the caller, which reports them without ending the session.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::types::RetrievalParams;
use crate::{MimirError, Result};

/// One piece of feedback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// Rating from 1 (poor) to 5 (excellent).
    pub rating: u8,
    /// Free-form comment, possibly empty.
    #[serde(default)]
    pub feedback: String,
    pub timestamp: DateTime<Local>,
    /// Retrieval parameters in effect when the rated answer was produced.
    /// `None` for plain-mode answers.
    pub retrieval_params: Option<RetrievalParams>,
}

impl FeedbackRecord {
    /// Create a record stamped with the current local time.
    ///
    /// Fails with [`MimirError::InvalidInput`] for ratings outside 1..=5.
    pub fn new(
        rating: u8,
        feedback: impl Into<String>,
        retrieval_params: Option<RetrievalParams>,
    ) -> Result<Self> {
        if !(1..=5).contains(&rating) {
            return Err(MimirError::InvalidInput(format!(
                "rating must be between 1 and 5, got {rating}"
            )));
        }
        Ok(Self {
            rating,
            feedback: feedback.into(),
            timestamp: Local::now(),
            retrieval_params,
        })
    }
}

/// All feedback, keyed by response id.
pub type FeedbackData = BTreeMap<String, FeedbackRecord>;

/// File-backed feedback store.
#[derive(Debug, Clone)]
pub struct FeedbackStore {
    path: PathBuf,
}

impl FeedbackStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all feedback.
    ///
    /// Returns an empty map on a missing or corrupt file (logs a warning on
    /// corrupt).
    pub fn load(&self) -> FeedbackData {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return FeedbackData::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read feedback file");
                return FeedbackData::new();
            }
        };
        match serde_json::from_str(&content) {
            Ok(data) => data,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "corrupt feedback file, starting empty");
                FeedbackData::new()
            }
        }
    }

    /// Replace the stored feedback (atomic write via tmp + rename).
    pub fn save(&self, data: &FeedbackData) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let json = to_json_4_spaces(data)?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Add or replace the feedback for one response.
    pub fn record(&self, response_id: &str, record: FeedbackRecord) -> Result<()> {
        let mut data = self.load();
        data.insert(response_id.to_string(), record);
        self.save(&data)?;
        info!(response_id, path = %self.path.display(), "feedback saved");
        Ok(())
    }
}

fn to_json_4_spaces<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut ser)?;
    Ok(out)
}

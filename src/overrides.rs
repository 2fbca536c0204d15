//! Measured audio lengths that replace chart-derived song lengths.
//!
//! The table is JSON keyed by simfile path relative to the scan root:
//!
//! ```json
//! { "sm/Mix/Song.sm": { "lengthSeconds": 123.456, "audioPath": "sm/Mix/song.ogg" } }
//! ```

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::radar::MetricsOptions;

#[derive(Debug, Error)]
pub enum OverridesError {
    #[error("failed to read audio length table: {0}")]
    Io(#[from] io::Error),
    #[error("invalid audio length table: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioLength {
    pub length_seconds: f64,
    #[serde(default)]
    pub audio_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioLengths {
    entries: HashMap<String, AudioLength>,
}

impl AudioLengths {
    pub fn from_json(json: &str) -> Result<Self, OverridesError> {
        let entries: HashMap<String, AudioLength> = serde_json::from_str(json)?;
        Ok(Self { entries })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, OverridesError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Positive measured length for a simfile, if any. Backslashes in the
    /// key are treated as `/`.
    pub fn get(&self, rel_path: &str) -> Option<f64> {
        let key = rel_path.replace('\\', "/");
        self.entries
            .get(&key)
            .map(|entry| entry.length_seconds)
            .filter(|&len| len.is_finite() && len > 0.0)
    }

    pub fn options_for(&self, rel_path: &str) -> MetricsOptions {
        MetricsOptions {
            audio_length_override: self.get(rel_path),
        }
    }
}

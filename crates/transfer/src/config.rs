//! Engine configuration.
//!
//! Loaded from JSON; every field is optional and falls back to its default.

use serde::{Deserialize, Serialize};

use crate::DEFAULT_CHUNK_SIZE;

/// What to do when the whole-file checksum disagrees at completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumPolicy {
    /// Fail the session with `ChecksumMismatch`.
    #[default]
    Strict,
    /// Log the mismatch and complete anyway.
    Lenient,
}

/// Tuning and policy for a transfer session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransferConfig {
    /// Maximum payload bytes written per pump. 0 selects the default.
    pub chunk_size: usize,
    pub checksum_policy: ChecksumPolicy,
    /// Receiver offers to resume from a shorter local file.
    pub allow_resume: bool,
    /// Receiver skips files it already holds with matching size and checksum.
    pub skip_existing: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            checksum_policy: ChecksumPolicy::Strict,
            allow_resume: true,
            skip_existing: true,
        }
    }
}

impl TransferConfig {
    /// Parses a JSON document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Self>(json).map(Self::normalized)
    }

    /// Replaces out-of-range values with defaults.
    pub fn normalized(mut self) -> Self {
        if self.chunk_size == 0 {
            self.chunk_size = DEFAULT_CHUNK_SIZE;
        }
        self
    }
}

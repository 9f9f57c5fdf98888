//! Artifacts produced by workflow steps.
//!
//! An artifact is a document persisted by the artifact writer. It is
//! created once and never mutated or deleted afterwards.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A persisted output document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Logical prefix of the file name (e.g. "prd", "ticket")
    pub logical_name: String,

    /// Subject the document is about, as supplied by the caller
    pub subject: String,

    /// Where the document was written
    pub path: PathBuf,

    /// SHA-256 of the content, hex encoded
    pub sha256: String,

    /// Size in bytes
    pub size_bytes: u64,

    /// When the artifact was created
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    /// Create an artifact record for content written to `path`
    pub fn new(logical_name: String, subject: String, path: PathBuf, content: &str) -> Self {
        Self {
            logical_name,
            subject,
            path,
            sha256: content_digest(content),
            size_bytes: content.len() as u64,
            created_at: Utc::now(),
        }
    }

    /// Check that `content` is what was originally written
    pub fn matches(&self, content: &str) -> bool {
        self.size_bytes == content.len() as u64 && self.sha256 == content_digest(content)
    }
}

/// Hex-encoded SHA-256 digest of document content
pub fn content_digest(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

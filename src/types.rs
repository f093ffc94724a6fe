//! Result types returned to callers of the upload pipeline.
//!
//! These are serialized as-is by the CLI (`--json`) and are meant to be
//! forwarded by whatever HTTP layer wraps the library. Field names follow the
//! response shape that upload clients already consume: `store`, `process`,
//! `key`, `url`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Coarse classification of everything that can go wrong with an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Invalid configuration; the job never started.
    Config,
    /// The pipeline was handed no bytes.
    NoInput,
    /// The image engine rejected the input or failed to encode a variant.
    Transform,
    /// A write sink failed to open, write or commit.
    Storage,
    /// Reading or hashing the input failed.
    FatalIo,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::Config => "config",
            ErrorKind::NoInput => "no input",
            ErrorKind::Transform => "transform",
            ErrorKind::Storage => "storage",
            ErrorKind::FatalIo => "io",
        })
    }
}

/// Why a single variant failed. Owned and cloneable so it can live inside a
/// [`VariantResult`] and travel through progress events.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind} error: {message}")]
pub struct VariantError {
    pub kind: ErrorKind,
    pub message: String,
}

impl VariantError {
    pub fn transform(message: impl fmt::Display) -> Self {
        Self {
            kind: ErrorKind::Transform,
            message: message.to_string(),
        }
    }

    pub fn storage(message: impl fmt::Display) -> Self {
        Self {
            kind: ErrorKind::Storage,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantStatus {
    Succeeded,
    Failed,
}

/// Outcome of one variant of one upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantResult {
    /// Identifier of the backing store (may be empty).
    pub store: String,
    /// Variant name.
    pub process: String,
    /// Storage key, deterministic for (content, variant, path rule).
    pub key: String,
    /// Public URL: store URL prefix + key.
    pub url: String,
    pub status: VariantStatus,
    /// Output dimensions, when the variant was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<(u32, u32)>,
    /// Encoded bytes handed to the sink.
    #[serde(default)]
    pub bytes: u64,
    /// Present iff `status` is `failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<VariantError>,
}

impl VariantResult {
    pub fn is_success(&self) -> bool {
        self.status == VariantStatus::Succeeded
    }
}

/// Everything the entry point hands back for one upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadOutcome {
    /// Original filename as supplied by the caller.
    pub filename: String,
    /// Content hash; `None` when nothing was uploaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// One entry per configured variant, in configured order.
    pub files: Vec<VariantResult>,
}

impl UploadOutcome {
    /// Outcome for a request that carried no file.
    pub fn noop(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            hash: None,
            files: Vec::new(),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.hash.is_none()
    }

    pub fn failures(&self) -> impl Iterator<Item = &VariantResult> {
        self.files.iter().filter(|f| !f.is_success())
    }

    pub fn file(&self, variant: &str) -> Option<&VariantResult> {
        self.files.iter().find(|f| f.process == variant)
    }
}

//! Error taxonomy
//!
//! Precondition failures abort an operation. Merge conflicts are normally
//! returned as data next to the merged snapshot; they only become an
//! [`Error::Conflicts`] when a caller asks for a clean merge.

use std::path::PathBuf;

use thiserror::Error;

use crate::merge::MergeConflict;
use crate::snapshot::SourceKind;

/// Result type for djtag operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Empty path, or a change that would alter a track's file extension
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    /// Two tracks in one snapshot share a path
    #[error("duplicate track path {0:?}")]
    DuplicatePath(PathBuf),

    /// Inputs expressed in different source schemas
    #[error("schema mismatch: expected {expected}, found {found}")]
    SchemaMismatch {
        expected: SourceKind,
        found: SourceKind,
    },

    /// Merge produced conflicts and the caller asked for a clean result
    #[error("{} unresolved merge conflict(s)", .0.len())]
    Conflicts(Vec<MergeConflict>),

    /// Source not known to the sync context
    #[error("unknown source: {0}")]
    UnknownSource(SourceKind),

    /// Configuration loading or validation error
    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid_path(path: impl Into<PathBuf>, reason: &str) -> Self {
        Error::InvalidPath {
            path: path.into(),
            reason: String::from(reason),
        }
    }
}

//! djtag — Tag Sync for DJ Libraries
//!
//! Don't copy files, diff the tags.
//!
//! Keeps the tag metadata of several music-library sources in step:
//! - Minimal per-track tag diff between two snapshots of one source
//! - Rule-driven translation of changes between source schemas
//!   (ID3 genres ⇄ Swinsian playlists)
//! - N-way merge of change-sets onto a baseline with conflict detection
//! - Content-addressed snapshot history with per-source sync markers
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | TOML sync configuration (sources, rules, conflict policy) |
//! | [`diff`] | Minimal snapshot diff engine and change-set types |
//! | [`error`] | Error taxonomy and `Result` alias |
//! | [`history`] | Content-addressed snapshot store and per-source commit log |
//! | [`merge`] | N-way change-set merge with conflict detection |
//! | [`report`] | Plain-text rendering of change-sets and sync reports |
//! | [`snapshot`] | Source kinds and library snapshots |
//! | [`sync`] | Sync cycle orchestration |
//! | [`track`] | Track paths and normalized tag maps |
//! | [`translate`] | Cross-source translation rules |
//!
//! # Quick Start
//!
//! ```
//! use djtag::{diff, merge, translate, RuleTable, Snapshot, SourceKind, Track};
//!
//! let track = |tag: &str, values: Vec<&str>| {
//!     Track::new("/music/a.mp3", [(tag, values)]).unwrap()
//! };
//!
//! // ID3 library gains a genre
//! let old = Snapshot::new(SourceKind::ID3, "/music", [track("genre", vec!["House"])]).unwrap();
//! let new = Snapshot::new(SourceKind::ID3, "/music", [track("genre", vec!["House", "Alternative"])]).unwrap();
//! let changes = diff(&old, &new).unwrap();
//!
//! // The same change, expressed as a Swinsian playlist
//! let swinsian = translate(&changes, &SourceKind::SWINSIAN, &RuleTable::builtin());
//! let base = Snapshot::new(SourceKind::SWINSIAN, "/music", [track("playlist", vec!["House"])]).unwrap();
//! let outcome = merge(&base, &[swinsian]).unwrap();
//!
//! assert!(outcome.is_clean());
//! assert_eq!(
//!     outcome.snapshot.get("/music/a.mp3").unwrap().values("playlist"),
//!     ["House", "Alternative"]
//! );
//! ```

pub mod config;
pub mod diff;
pub mod error;
pub mod history;
pub mod merge;
pub mod report;
pub mod snapshot;
pub mod sync;
pub mod track;
pub mod translate;

pub use config::{SourceConfig, SyncConfig};
pub use diff::{diff, diff_tags, ChangeKind, ChangeSet, TagChange, TrackChange, TrackDiff};
pub use error::{Error, Result};
pub use history::{Commit, CommitId, History, SnapshotId, SnapshotStore};
pub use merge::{merge, merge_resolved, ConflictKind, MergeConflict, MergeOutcome, Resolution};
pub use snapshot::{Snapshot, SourceKind};
pub use sync::{SourceOutcome, SyncContext, SyncReport};
pub use track::{clean_values, is_music_file, TagMap, Track, TrackPath};
pub use translate::{translate, ChangeFilter, Rule, RuleTable, Scope};

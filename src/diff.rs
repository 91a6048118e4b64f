//! Library diff engine
//!
//! Computes the minimal change-set that turns one snapshot into another
//! snapshot of the same source. Tags are compared as value sets, so a
//! replaced value shows up as a `Removed` entry plus an `Added` entry.
//!
//! Output order is fixed: by path, then tag name, then `Removed` before
//! `Added`, then value. Two diffs of equal inputs are identical.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::snapshot::{Snapshot, SourceKind};
use crate::track::{Track, TrackPath};

/// Direction of a single tag value change.
///
/// Variant order is significant: `Removed` sorts before `Added`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Removed,
    Added,
}

/// One value added to or removed from one tag
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TagChange {
    pub tag: String,
    pub kind: ChangeKind,
    pub value: String,
}

impl TagChange {
    pub fn added(tag: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            kind: ChangeKind::Added,
            value: value.into(),
        }
    }

    pub fn removed(tag: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            kind: ChangeKind::Removed,
            value: value.into(),
        }
    }
}

/// What happened to a track as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackChange {
    /// Present on both sides, tags differ
    Modified,
    /// Only in the new snapshot; `tags` holds its full tag set as `Added` entries
    Added,
    /// Only in the old snapshot
    Removed,
}

/// All changes for one path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackDiff {
    pub path: TrackPath,
    pub change: TrackChange,
    pub tags: Vec<TagChange>,
}

/// Structured difference between two snapshots of one schema.
///
/// `schema` is the source schema the entries are expressed in; `origin` is
/// the source whose edits they describe. The two differ only after
/// translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    schema: SourceKind,
    origin: SourceKind,
    tracks: Vec<TrackDiff>,
}

impl ChangeSet {
    /// Change-set with no entries
    pub fn empty(schema: SourceKind) -> Self {
        Self {
            origin: schema.clone(),
            schema,
            tracks: Vec::new(),
        }
    }

    /// Canonicalize: tracks sorted by path, tag entries sorted and
    /// deduplicated, modified tracks without entries dropped.
    pub(crate) fn from_tracks(
        schema: SourceKind,
        origin: SourceKind,
        mut tracks: Vec<TrackDiff>,
    ) -> Self {
        for track in &mut tracks {
            track.tags.sort();
            track.tags.dedup();
        }
        tracks.retain(|t| t.change != TrackChange::Modified || !t.tags.is_empty());
        tracks.sort_by(|a, b| a.path.cmp(&b.path));
        Self {
            schema,
            origin,
            tracks,
        }
    }

    pub fn schema(&self) -> &SourceKind {
        &self.schema
    }

    pub fn origin(&self) -> &SourceKind {
        &self.origin
    }

    /// Per-track diffs in path order
    pub fn tracks(&self) -> &[TrackDiff] {
        &self.tracks
    }

    pub fn get(&self, path: &TrackPath) -> Option<&TrackDiff> {
        self.tracks
            .binary_search_by(|t| t.path.cmp(path))
            .ok()
            .map(|i| &self.tracks[i])
    }

    /// Every tag entry with its path, in canonical order
    pub fn entries(&self) -> impl Iterator<Item = (&TrackPath, &TagChange)> {
        self.tracks
            .iter()
            .flat_map(|t| t.tags.iter().map(move |c| (&t.path, c)))
    }

    /// Number of touched tracks
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Paths added as whole tracks
    pub fn added_tracks(&self) -> impl Iterator<Item = &TrackPath> {
        self.paths_with(TrackChange::Added)
    }

    /// Paths removed as whole tracks
    pub fn removed_tracks(&self) -> impl Iterator<Item = &TrackPath> {
        self.paths_with(TrackChange::Removed)
    }

    fn paths_with(&self, change: TrackChange) -> impl Iterator<Item = &TrackPath> {
        self.tracks
            .iter()
            .filter(move |t| t.change == change)
            .map(|t| &t.path)
    }
}

/// Compute the change-set that transforms `old` into `new`.
///
/// Fails with `SchemaMismatch` if the snapshots come from different sources.
///
/// 1. Paths only in `old` -> `TrackChange::Removed`
/// 2. Paths only in `new` -> `TrackChange::Added` with the full tag set
/// 3. Paths in both -> per-tag symmetric difference of value sets
pub fn diff(old: &Snapshot, new: &Snapshot) -> Result<ChangeSet> {
    if old.source() != new.source() {
        return Err(Error::SchemaMismatch {
            expected: old.source().clone(),
            found: new.source().clone(),
        });
    }

    let paths: BTreeSet<&TrackPath> = old.paths().chain(new.paths()).collect();
    let mut tracks = Vec::new();

    for path in paths {
        let entry = match (old.get(path), new.get(path)) {
            (Some(_), None) => TrackDiff {
                path: path.clone(),
                change: TrackChange::Removed,
                tags: Vec::new(),
            },
            (None, Some(added)) => TrackDiff {
                path: path.clone(),
                change: TrackChange::Added,
                tags: tag_bundle(added),
            },
            (Some(before), Some(after)) => {
                let tags = diff_tags(before, after);
                if tags.is_empty() {
                    continue;
                }
                TrackDiff {
                    path: path.clone(),
                    change: TrackChange::Modified,
                    tags,
                }
            }
            (None, None) => continue,
        };
        tracks.push(entry);
    }

    Ok(ChangeSet::from_tracks(
        old.source().clone(),
        old.source().clone(),
        tracks,
    ))
}

/// Per-tag value-set differences between two versions of a track
pub fn diff_tags(old: &Track, new: &Track) -> Vec<TagChange> {
    let names: BTreeSet<&String> = old.tags().keys().chain(new.tags().keys()).collect();
    let mut changes = Vec::new();

    for name in names {
        let before = old.value_set(name);
        let after = new.value_set(name);
        for value in before.difference(&after) {
            changes.push(TagChange::removed(name.as_str(), *value));
        }
        for value in after.difference(&before) {
            changes.push(TagChange::added(name.as_str(), *value));
        }
    }

    changes.sort();
    changes
}

fn tag_bundle(track: &Track) -> Vec<TagChange> {
    track
        .tags()
        .iter()
        .flat_map(|(name, values)| {
            values
                .iter()
                .map(move |v| TagChange::added(name.as_str(), v.as_str()))
        })
        .collect()
}

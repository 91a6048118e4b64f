//! Snapshot history
//!
//! Content-addressed snapshot store plus a per-source commit log. Each
//! source has a head (its latest captured state) and a synced marker (the
//! state at the end of its last completed sync cycle). Commits are
//! immutable; heads and markers are movable pointers.
//!
//! This is orchestration support: the diff/translate/merge core never
//! touches it.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use sha2::{Digest, Sha256};
use tracing::info;

use crate::diff::{diff, ChangeSet};
use crate::error::{Error, Result};
use crate::snapshot::{Snapshot, SourceKind};

/// Content hash of a snapshot (SHA-256)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnapshotId([u8; 32]);

impl SnapshotId {
    /// Hash of the snapshot's structural content.
    ///
    /// Every field is length-prefixed. Tag values are hashed in sorted
    /// order, so structurally equal snapshots share an id.
    pub fn of(snapshot: &Snapshot) -> Self {
        let mut hasher = Sha256::new();
        write_field(&mut hasher, snapshot.source().as_str().as_bytes());
        write_len(&mut hasher, snapshot.len());
        for track in snapshot.tracks() {
            write_field(
                &mut hasher,
                track.path().as_path().as_os_str().as_encoded_bytes(),
            );
            write_len(&mut hasher, track.tags().len());
            for name in track.tags().keys() {
                write_field(&mut hasher, name.as_bytes());
                let values = track.value_set(name);
                write_len(&mut hasher, values.len());
                for value in values {
                    write_field(&mut hasher, value.as_bytes());
                }
            }
        }
        Self(hasher.finalize().into())
    }

    /// First 8 hex digits
    pub fn short(&self) -> String {
        self.to_string()[..8].to_string()
    }
}

fn write_len(hasher: &mut Sha256, len: usize) {
    hasher.update((len as u64).to_le_bytes());
}

fn write_field(hasher: &mut Sha256, bytes: &[u8]) {
    write_len(hasher, bytes.len());
    hasher.update(bytes);
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Content-addressed snapshot store (O(1) lookup via HashMap)
#[derive(Debug, Default)]
pub struct SnapshotStore {
    snapshots: HashMap<SnapshotId, Snapshot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a snapshot, returns its content hash. Equal content is stored once.
    pub fn store(&mut self, snapshot: Snapshot) -> SnapshotId {
        let id = SnapshotId::of(&snapshot);
        self.snapshots.entry(id).or_insert(snapshot);
        id
    }

    pub fn get(&self, id: &SnapshotId) -> Option<&Snapshot> {
        self.snapshots.get(id)
    }

    pub fn contains(&self, id: &SnapshotId) -> bool {
        self.snapshots.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

/// Sequential commit number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommitId(u64);

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A commit in one source's history
#[derive(Debug, Clone)]
pub struct Commit {
    pub id: CommitId,
    pub parent: Option<CommitId>,
    pub source: SourceKind,
    pub message: String,
    pub snapshot: SnapshotId,
    /// Changes relative to the parent (everything added for a root commit)
    pub changes: ChangeSet,
}

/// Commit log for every source
#[derive(Debug, Default)]
pub struct History {
    store: SnapshotStore,
    commits: BTreeMap<CommitId, Commit>,
    heads: BTreeMap<SourceKind, CommitId>,
    synced: BTreeMap<SourceKind, CommitId>,
    next_id: u64,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `snapshot` as the new head of its source.
    ///
    /// Returns `None` without recording anything if it equals the current head.
    pub fn commit(&mut self, snapshot: Snapshot, message: &str) -> Result<Option<CommitId>> {
        let source = snapshot.source().clone();
        let parent = self.heads.get(&source).copied();

        let changes = match self.head_snapshot(&source) {
            Some(previous) if *previous == snapshot => {
                info!(%source, "no changes detected, commit not saved");
                return Ok(None);
            }
            Some(previous) => diff(previous, &snapshot)?,
            None => diff(&Snapshot::empty(source.clone(), snapshot.root()), &snapshot)?,
        };

        let snapshot_id = self.store.store(snapshot);
        let id = CommitId(self.next_id);
        self.next_id += 1;
        info!(
            %source,
            commit = %id,
            snapshot = %snapshot_id.short(),
            tracks = changes.len(),
            "commit recorded"
        );

        self.commits.insert(
            id,
            Commit {
                id,
                parent,
                source: source.clone(),
                message: String::from(message),
                snapshot: snapshot_id,
                changes,
            },
        );
        self.heads.insert(source, id);
        Ok(Some(id))
    }

    pub fn head(&self, source: &SourceKind) -> Option<&Commit> {
        self.heads.get(source).and_then(|id| self.commits.get(id))
    }

    pub fn head_snapshot(&self, source: &SourceKind) -> Option<&Snapshot> {
        self.head(source).and_then(|c| self.store.get(&c.snapshot))
    }

    /// Commit at the end of the source's last completed sync
    pub fn synced(&self, source: &SourceKind) -> Option<&Commit> {
        self.synced.get(source).and_then(|id| self.commits.get(id))
    }

    pub fn synced_snapshot(&self, source: &SourceKind) -> Option<&Snapshot> {
        self.synced(source).and_then(|c| self.store.get(&c.snapshot))
    }

    /// Move the source's synced marker to `id`, which must be one of its commits
    pub fn mark_synced(&mut self, source: &SourceKind, id: CommitId) -> Result<()> {
        match self.commits.get(&id) {
            Some(commit) if &commit.source == source => {
                self.synced.insert(source.clone(), id);
                Ok(())
            }
            _ => Err(Error::UnknownSource(source.clone())),
        }
    }

    pub fn get_commit(&self, id: CommitId) -> Option<&Commit> {
        self.commits.get(&id)
    }

    pub fn snapshot(&self, id: &SnapshotId) -> Option<&Snapshot> {
        self.store.get(id)
    }

    /// Sources with at least one commit
    pub fn sources(&self) -> impl Iterator<Item = &SourceKind> {
        self.heads.keys()
    }

    /// Commits of one source, newest first
    pub fn log(&self, source: &SourceKind) -> Vec<&Commit> {
        let mut out = Vec::new();
        let mut cursor = self.heads.get(source).copied();
        while let Some(id) = cursor {
            let Some(commit) = self.commits.get(&id) else {
                break;
            };
            out.push(commit);
            cursor = commit.parent;
        }
        out
    }

    /// Total commit count
    pub fn commit_count(&self) -> usize {
        self.commits.len()
    }

    /// Distinct stored snapshots
    pub fn snapshot_count(&self) -> usize {
        self.store.len()
    }
}

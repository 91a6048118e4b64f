//! Three-way merge of change-sets onto a baseline snapshot
//!
//! Every input change-set is relative to the same baseline. Changes are
//! folded per `(path, tag, value)`: additions union in, removals take
//! away, and the order of inputs does not matter. The same value being
//! added by one input and removed by another is a conflict; it is reported
//! and the baseline state of that one value is kept. A track added or
//! edited by one input and removed by another is also reported, and the
//! track is kept with the edits applied.
//!
//! Conflicts never abort a merge. The caller gets the best-effort snapshot
//! plus the conflict list and decides what to do, optionally re-running
//! with explicit [`Resolution`]s.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::diff::{ChangeKind, ChangeSet, TrackChange};
use crate::error::{Error, Result};
use crate::snapshot::{Snapshot, SourceKind};
use crate::track::{TagMap, Track, TrackPath};

/// What a conflict is about
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConflictKind {
    /// One value added by some inputs and removed by others
    TagValue { tag: String, value: String },
    /// Track added by some inputs and removed by others
    Track,
}

/// Merge conflict
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeConflict {
    pub path: TrackPath,
    pub kind: ConflictKind,
    /// Origins of the inputs that added (for a track conflict: added or edited)
    pub added_by: Vec<SourceKind>,
    /// Origins of the inputs that removed
    pub removed_by: Vec<SourceKind>,
}

impl fmt::Display for MergeConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |sources: &[SourceKind]| {
            sources
                .iter()
                .map(SourceKind::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        };
        match &self.kind {
            ConflictKind::TagValue { tag, value } => write!(
                f,
                "{}: {tag}={value} added by [{}], removed by [{}]",
                self.path,
                join(&self.added_by),
                join(&self.removed_by)
            ),
            ConflictKind::Track => write!(
                f,
                "{}: track added or edited by [{}], removed by [{}] (kept)",
                self.path,
                join(&self.added_by),
                join(&self.removed_by)
            ),
        }
    }
}

/// Explicit decision for one conflicting tag value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub path: TrackPath,
    pub tag: String,
    pub value: String,
    /// `true` keeps the value, `false` drops it
    pub keep: bool,
}

/// Merge result
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Merged snapshot
    pub snapshot: Snapshot,
    /// Conflicts that need manual resolution
    pub conflicts: Vec<MergeConflict>,
}

impl MergeOutcome {
    /// True if merge is clean (no conflicts)
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// The merged snapshot, or `Error::Conflicts` if there were any
    pub fn into_clean(self) -> Result<Snapshot> {
        if self.conflicts.is_empty() {
            Ok(self.snapshot)
        } else {
            Err(Error::Conflicts(self.conflicts))
        }
    }
}

/// Votes on one tag value, as input indices
#[derive(Debug, Default)]
struct Votes {
    added_by: Vec<usize>,
    removed_by: Vec<usize>,
}

impl Votes {
    fn vote(&mut self, kind: ChangeKind, input: usize) {
        let list = match kind {
            ChangeKind::Added => &mut self.added_by,
            ChangeKind::Removed => &mut self.removed_by,
        };
        if !list.contains(&input) {
            list.push(input);
        }
    }

    /// Some input adds while a different input removes
    fn is_conflict(&self) -> bool {
        self.added_by
            .iter()
            .any(|a| self.removed_by.iter().any(|r| r != a))
    }
}

/// Everything the inputs say about one path
#[derive(Debug, Default)]
struct PathPlan<'a> {
    track: Votes,
    /// tag -> value -> votes
    values: BTreeMap<&'a str, BTreeMap<&'a str, Votes>>,
    /// Added values in first-seen order
    added_order: Vec<(&'a str, &'a str)>,
    /// Inputs carrying tag edits for an existing track
    modified_by: Vec<usize>,
}

/// Merge `changesets` onto `baseline` with no explicit resolutions
pub fn merge(baseline: &Snapshot, changesets: &[ChangeSet]) -> Result<MergeOutcome> {
    merge_resolved(baseline, changesets, &[])
}

/// Merge `changesets` onto `baseline`.
///
/// Fails with `SchemaMismatch` if a change-set is not expressed in the
/// baseline's schema. Tag edits for a path the baseline lacks are skipped;
/// a path with another extension is another track.
pub fn merge_resolved(
    baseline: &Snapshot,
    changesets: &[ChangeSet],
    resolutions: &[Resolution],
) -> Result<MergeOutcome> {
    for cs in changesets {
        if cs.schema() != baseline.source() {
            return Err(Error::SchemaMismatch {
                expected: baseline.source().clone(),
                found: cs.schema().clone(),
            });
        }
    }

    let plans = collect(changesets);
    let mut tracks = baseline.track_map().clone();
    let mut conflicts = Vec::new();
    let origins = |inputs: &[usize]| {
        let mut out: Vec<SourceKind> = Vec::new();
        for &i in inputs {
            let origin = changesets[i].origin();
            if !out.contains(origin) {
                out.push(origin.clone());
            }
        }
        out
    };

    for (path, plan) in plans {
        let existing = baseline.get(path);

        if existing.is_none() && plan.track.added_by.is_empty() {
            if !plan.modified_by.is_empty() {
                warn!(%path, "tag changes for a track missing from the baseline skipped");
            }
            continue;
        }

        let kept_by: Vec<usize> = plan
            .track
            .added_by
            .iter()
            .chain(&plan.modified_by)
            .copied()
            .collect();
        let removed_by = &plan.track.removed_by;
        if kept_by.iter().any(|k| removed_by.iter().any(|r| r != k)) {
            let conflict = MergeConflict {
                path: path.clone(),
                kind: ConflictKind::Track,
                added_by: origins(&kept_by),
                removed_by: origins(removed_by),
            };
            warn!(%conflict, "merge conflict");
            conflicts.push(conflict);
        } else if plan.track.added_by.is_empty() && !removed_by.is_empty() {
            tracks.remove(path);
            continue;
        }

        let base_tags = existing.map(Track::tags).cloned().unwrap_or_default();
        let mut keep = |tag: &str, value: &str, in_base: bool| -> bool {
            let Some(votes) = plan.values.get(tag).and_then(|vs| vs.get(value)) else {
                return in_base;
            };
            if votes.is_conflict() {
                if let Some(resolution) = resolutions
                    .iter()
                    .find(|r| &r.path == path && r.tag == tag && r.value == value)
                {
                    return resolution.keep;
                }
                let conflict = MergeConflict {
                    path: path.clone(),
                    kind: ConflictKind::TagValue {
                        tag: String::from(tag),
                        value: String::from(value),
                    },
                    added_by: origins(&votes.added_by),
                    removed_by: origins(&votes.removed_by),
                };
                warn!(%conflict, "merge conflict");
                conflicts.push(conflict);
                return in_base;
            }
            match (votes.added_by.is_empty(), votes.removed_by.is_empty()) {
                (false, true) => true,
                (true, false) => false,
                // one input both adding and removing: leave as it was
                _ => in_base,
            }
        };

        let mut merged = TagMap::new();
        for (tag, values) in &base_tags {
            let kept: Vec<String> = values
                .iter()
                .filter(|v| keep(tag, v, true))
                .cloned()
                .collect();
            merged.insert(tag.clone(), kept);
        }
        for &(tag, value) in &plan.added_order {
            let in_base = base_tags
                .get(tag)
                .map(|vs| vs.iter().any(|v| v == value))
                .unwrap_or(false);
            if !in_base && keep(tag, value, false) {
                merged
                    .entry(String::from(tag))
                    .or_default()
                    .push(String::from(value));
            }
        }

        tracks.insert(path.clone(), Track::from_parts(path.clone(), merged));
    }

    conflicts.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(MergeOutcome {
        snapshot: Snapshot::from_map(
            baseline.source().clone(),
            baseline.root().to_path_buf(),
            tracks,
        ),
        conflicts,
    })
}

/// Group every input entry by path and tag value
fn collect(changesets: &[ChangeSet]) -> BTreeMap<&TrackPath, PathPlan<'_>> {
    let mut plans: BTreeMap<&TrackPath, PathPlan<'_>> = BTreeMap::new();
    for (input, cs) in changesets.iter().enumerate() {
        for track in cs.tracks() {
            let plan = plans.entry(&track.path).or_default();
            match track.change {
                TrackChange::Added => plan.track.vote(ChangeKind::Added, input),
                TrackChange::Removed => plan.track.vote(ChangeKind::Removed, input),
                TrackChange::Modified => {
                    if !plan.modified_by.contains(&input) {
                        plan.modified_by.push(input);
                    }
                }
            }
            for change in &track.tags {
                let key = (change.tag.as_str(), change.value.as_str());
                if change.kind == ChangeKind::Added && !plan.added_order.contains(&key) {
                    plan.added_order.push(key);
                }
                plan.values
                    .entry(key.0)
                    .or_default()
                    .entry(key.1)
                    .or_default()
                    .vote(change.kind, input);
            }
        }
    }
    plans
}

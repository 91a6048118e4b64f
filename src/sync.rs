//! Sync cycle orchestration
//!
//! Ties the history, the rule table and the merge engine together. Callers
//! fetch snapshots from each library, [`record`](SyncContext::record) them,
//! then run [`sync`](SyncContext::sync) and push each source's change-set
//! back to its library.
//!
//! One cycle, per target source `t`:
//!
//! 1. `local_s = diff(synced_s, head_s)` for every source `s`
//! 2. `merge(synced_t, [local_t, translate(local_s, t) for s != t])`
//! 3. push `diff(head_t, merged_t)` to the library
//!
//! A source with no synced marker uses its head as the baseline, so the
//! first cycle only establishes baselines.

use std::collections::BTreeSet;

use tracing::{info, warn};

use crate::config::SyncConfig;
use crate::diff::{diff, ChangeSet};
use crate::error::{Error, Result};
use crate::history::History;
use crate::merge::{merge, MergeConflict};
use crate::snapshot::{Snapshot, SourceKind};
use crate::translate::{translate, RuleTable};

/// Result of a sync cycle for one source
#[derive(Debug, Clone)]
pub struct SourceOutcome {
    pub source: SourceKind,
    /// New state of the library after the cycle
    pub snapshot: Snapshot,
    /// Changes the library needs to reach `snapshot` from its head
    pub push: ChangeSet,
    pub conflicts: Vec<MergeConflict>,
}

/// Result of a whole sync cycle, ordered by source
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub outcomes: Vec<SourceOutcome>,
}

impl SyncReport {
    pub fn get(&self, source: &SourceKind) -> Option<&SourceOutcome> {
        self.outcomes.iter().find(|o| &o.source == source)
    }

    pub fn conflicts(&self) -> impl Iterator<Item = &MergeConflict> {
        self.outcomes.iter().flat_map(|o| o.conflicts.iter())
    }

    pub fn is_clean(&self) -> bool {
        self.conflicts().next().is_none()
    }

    /// True if no library needs to be written
    pub fn is_noop(&self) -> bool {
        self.outcomes.iter().all(|o| o.push.is_empty())
    }
}

/// Sync state across cycles
#[derive(Debug)]
pub struct SyncContext {
    history: History,
    rules: RuleTable,
    sources: BTreeSet<SourceKind>,
    halt_on_conflict: bool,
}

impl SyncContext {
    pub fn new(config: &SyncConfig) -> Self {
        Self::from_parts(
            config.sources.keys().cloned(),
            config.rule_table(),
            config.halt_on_conflict,
        )
    }

    pub fn from_parts(
        sources: impl IntoIterator<Item = SourceKind>,
        rules: RuleTable,
        halt_on_conflict: bool,
    ) -> Self {
        Self {
            history: History::new(),
            rules,
            sources: sources.into_iter().collect(),
            halt_on_conflict,
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Commit a freshly fetched snapshot as its source's head.
    ///
    /// Returns `false` if nothing changed since the previous fetch.
    pub fn record(&mut self, snapshot: Snapshot) -> Result<bool> {
        if !self.sources.contains(snapshot.source()) {
            return Err(Error::UnknownSource(snapshot.source().clone()));
        }
        Ok(self.history.commit(snapshot, "fetch")?.is_some())
    }

    /// Run one sync cycle over every source with a head.
    ///
    /// With `halt_on_conflict` set, any conflict aborts the cycle with
    /// `Error::Conflicts` and leaves the history untouched.
    pub fn sync(&mut self) -> Result<SyncReport> {
        let mut locals: Vec<(SourceKind, &Snapshot, ChangeSet)> = Vec::new();
        for source in &self.sources {
            let Some(head) = self.history.head_snapshot(source) else {
                warn!(%source, "no snapshot recorded, skipping source");
                continue;
            };
            let baseline = self.history.synced_snapshot(source).unwrap_or(head);
            locals.push((source.clone(), baseline, diff(baseline, head)?));
        }

        let mut report = SyncReport::default();
        for (target, baseline, local) in &locals {
            let mut inputs = vec![local.clone()];
            for (source, _, changes) in &locals {
                if source != target {
                    inputs.push(translate(changes, target, &self.rules));
                }
            }

            let outcome = merge(baseline, &inputs)?;

            let head = self.history.head_snapshot(target).unwrap_or(*baseline);
            let push = diff(head, &outcome.snapshot)?;
            info!(
                source = %target,
                tracks = push.len(),
                conflicts = outcome.conflicts.len(),
                "source merged"
            );
            report.outcomes.push(SourceOutcome {
                source: target.clone(),
                snapshot: outcome.snapshot,
                push,
                conflicts: outcome.conflicts,
            });
        }

        if self.halt_on_conflict && !report.is_clean() {
            let conflicts: Vec<MergeConflict> = report.conflicts().cloned().collect();
            warn!(count = conflicts.len(), "sync halted on conflicts");
            return Err(Error::Conflicts(conflicts));
        }

        for outcome in &report.outcomes {
            self.history.commit(outcome.snapshot.clone(), "sync")?;
            if let Some(head) = self.history.head(&outcome.source) {
                let id = head.id;
                self.history.mark_synced(&outcome.source, id)?;
            }
        }
        info!(sources = report.outcomes.len(), "sync complete");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::TrackChange;
    use crate::track::Track;

    fn context(halt: bool) -> SyncContext {
        let config = SyncConfig {
            halt_on_conflict: halt,
            ..SyncConfig::default()
        }
        .with_source(SourceKind::ID3, "/music")
        .with_source(SourceKind::SWINSIAN, "/music");
        SyncContext::new(&config)
    }

    fn id3(genres: &[&str]) -> Snapshot {
        Snapshot::new(
            SourceKind::ID3,
            "/music",
            [Track::new("/music/a.mp3", [("genre", genres.to_vec())]).unwrap()],
        )
        .unwrap()
    }

    fn swinsian(playlists: &[&str]) -> Snapshot {
        Snapshot::new(
            SourceKind::SWINSIAN,
            "/music",
            [Track::new("/music/a.mp3", [("playlist", playlists.to_vec())]).unwrap()],
        )
        .unwrap()
    }

    fn baseline(halt: bool) -> SyncContext {
        let mut ctx = context(halt);
        ctx.record(id3(&["House"])).unwrap();
        ctx.record(swinsian(&["House"])).unwrap();
        ctx.sync().unwrap();
        ctx
    }

    /// First cycle with libraries that disagree on the genre
    fn diverged(halt: bool) -> SyncContext {
        let mut ctx = context(halt);
        ctx.record(id3(&["House"])).unwrap();
        ctx.record(swinsian(&["Techno"])).unwrap();
        ctx.sync().unwrap();
        ctx
    }

    // ── Recording ──────────────────────────────────────────────────────

    #[test]
    fn test_record_unknown_source() {
        let mut ctx = context(false);
        let snap = Snapshot::empty(SourceKind::new("rekordbox"), "/music");
        assert!(matches!(ctx.record(snap), Err(Error::UnknownSource(_))));
    }

    #[test]
    fn test_record_unchanged_is_noop() {
        let mut ctx = context(false);
        assert!(ctx.record(id3(&["House"])).unwrap());
        assert!(!ctx.record(id3(&["House"])).unwrap());
    }

    // ── Cycles ─────────────────────────────────────────────────────────

    #[test]
    fn test_first_sync_establishes_baselines() {
        let mut ctx = context(false);
        ctx.record(id3(&["House"])).unwrap();
        ctx.record(swinsian(&["Techno"])).unwrap();
        let report = ctx.sync().unwrap();
        assert!(report.is_clean());
        assert!(report.is_noop());
        assert!(ctx.history().synced(&SourceKind::ID3).is_some());
    }

    #[test]
    fn test_sync_skips_sources_without_head() {
        let mut ctx = context(false);
        ctx.record(id3(&["House"])).unwrap();
        let report = ctx.sync().unwrap();
        assert_eq!(report.outcomes.len(), 1);
        assert!(report.get(&SourceKind::SWINSIAN).is_none());
    }

    #[test]
    fn test_genre_propagates_as_playlist() {
        let mut ctx = baseline(false);
        ctx.record(id3(&["House", "Disco"])).unwrap();
        let report = ctx.sync().unwrap();

        let out = report.get(&SourceKind::SWINSIAN).unwrap();
        assert_eq!(out.snapshot, swinsian(&["House", "Disco"]));
        assert_eq!(out.push.tracks()[0].change, TrackChange::Modified);
        assert!(report.get(&SourceKind::ID3).unwrap().push.is_empty());
        assert_eq!(
            ctx.history().synced_snapshot(&SourceKind::SWINSIAN),
            Some(&swinsian(&["House", "Disco"]))
        );
    }

    #[test]
    fn test_second_cycle_is_quiet() {
        let mut ctx = baseline(false);
        ctx.record(id3(&["House", "Disco"])).unwrap();
        ctx.sync().unwrap();
        let report = ctx.sync().unwrap();
        assert!(report.is_noop());
    }

    #[test]
    fn test_edit_of_same_name_other_extension_skipped() {
        let library = |flac: &[&str]| {
            Snapshot::new(
                SourceKind::ID3,
                "/music",
                [
                    Track::new("/music/x/song.mp3", [("genre", vec!["House"])]).unwrap(),
                    Track::new("/music/x/song.flac", [("genre", flac.to_vec())]).unwrap(),
                ],
            )
            .unwrap()
        };
        let tracker = Snapshot::new(
            SourceKind::SWINSIAN,
            "/music",
            [Track::new("/music/x/song.mp3", [("playlist", vec!["House"])]).unwrap()],
        )
        .unwrap();

        let mut ctx = context(false);
        ctx.record(library(&["House"])).unwrap();
        ctx.record(tracker.clone()).unwrap();
        ctx.sync().unwrap();

        ctx.record(library(&["House", "Jazz"])).unwrap();
        let report = ctx.sync().unwrap();
        assert!(report.is_clean());
        assert!(report.is_noop());
        assert_eq!(report.get(&SourceKind::SWINSIAN).unwrap().snapshot, tracker);
        assert!(ctx.sync().is_ok());
    }

    #[test]
    fn test_diverged_baselines_conflict() {
        let mut ctx = diverged(false);
        ctx.record(id3(&[])).unwrap();
        ctx.record(swinsian(&["Techno", "House"])).unwrap();
        let report = ctx.sync().unwrap();

        assert!(!report.is_clean());
        assert_eq!(report.conflicts().count(), 2);
        // both sides keep their own baseline state for House
        assert_eq!(report.get(&SourceKind::ID3).unwrap().snapshot, id3(&["House"]));
        assert_eq!(
            report.get(&SourceKind::SWINSIAN).unwrap().snapshot,
            swinsian(&["Techno"])
        );
    }

    #[test]
    fn test_halt_on_conflict_leaves_history() {
        let mut ctx = diverged(true);
        ctx.record(id3(&[])).unwrap();
        ctx.record(swinsian(&["Techno", "House"])).unwrap();
        let before = ctx.history().commit_count();

        match ctx.sync() {
            Err(Error::Conflicts(conflicts)) => assert_eq!(conflicts.len(), 2),
            other => panic!("expected conflicts, got {other:?}"),
        }
        assert_eq!(ctx.history().commit_count(), before);
        assert_eq!(
            ctx.history().synced_snapshot(&SourceKind::ID3),
            Some(&id3(&["House"]))
        );
    }
}

//! Plain-text rendering of change-sets and sync reports

use std::fmt;

use crate::diff::{ChangeKind, ChangeSet, TrackChange, TrackDiff};
use crate::sync::SyncReport;

impl fmt::Display for TrackDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "♫ {}", self.path)?;
        match self.change {
            TrackChange::Added => write!(f, " [new]")?,
            TrackChange::Removed => write!(f, " [removed]")?,
            TrackChange::Modified => {}
        }
        if self.tags.is_empty() {
            return Ok(());
        }
        write!(f, " //")?;
        for change in &self.tags {
            let sign = match change.kind {
                ChangeKind::Added => '+',
                ChangeKind::Removed => '-',
            };
            write!(f, " {sign}{}={}", change.tag, change.value)?;
        }
        Ok(())
    }
}

/// ```text
/// Library changes (2)
///   ♫ /music/a.mp3 // -genre=House +genre=Techno
///   ♫ /music/b.mp3 [new] // +genre=Disco
/// ```
impl fmt::Display for ChangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "No changes detected");
        }
        write!(f, "Library changes ({})", self.len())?;
        for track in self.tracks() {
            write!(f, "\n  {track}")?;
        }
        Ok(())
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, outcome) in self.outcomes.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "[{}] {}", outcome.source, outcome.push)?;
            for conflict in &outcome.conflicts {
                write!(f, "\n  ! {conflict}")?;
            }
        }
        Ok(())
    }
}

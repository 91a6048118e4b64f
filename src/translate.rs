//! Cross-schema translation
//!
//! Rewrites a change-set expressed in one source's schema into another
//! source's schema by interpreting a declarative [`RuleTable`]. Entries no
//! rule maps are dropped, never reported as errors: a field one source
//! tracks and another does not simply does not propagate.
//!
//! Translation is a propagation rule, not an inverse: A -> B -> A need
//! not give back the original change-set.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::diff::{ChangeKind, ChangeSet, TagChange, TrackChange, TrackDiff};
use crate::error::{Error, Result};
use crate::snapshot::SourceKind;
use crate::track::TrackPath;

/// Genre tag of tag-oriented sources
pub const GENRE_TAG: &str = "genre";
/// Playlist membership of playlist-oriented sources
pub const PLAYLIST_TAG: &str = "playlist";

/// Which change kinds a tag rule carries over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeFilter {
    #[default]
    Both,
    Added,
    Removed,
}

impl ChangeFilter {
    fn accepts(self, kind: ChangeKind) -> bool {
        matches!(
            (self, kind),
            (ChangeFilter::Both, _)
                | (ChangeFilter::Added, ChangeKind::Added)
                | (ChangeFilter::Removed, ChangeKind::Removed)
        )
    }
}

/// Where a new track must live for its addition to propagate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Only if the path is under the target source's watched root
    #[default]
    WatchedRoot,
    /// Unconditionally
    Always,
}

/// One directional translation rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rule {
    /// `from_tag` value changes in `from` become `to_tag` value changes in `to`
    MapTag {
        from: SourceKind,
        to: SourceKind,
        from_tag: String,
        to_tag: String,
        #[serde(default)]
        on: ChangeFilter,
    },
    /// Track additions in `from` create a track entry in `to`
    TrackAdded {
        from: SourceKind,
        to: SourceKind,
        #[serde(default)]
        scope: Scope,
    },
    /// Track removals in `from` remove the track entry in `to`
    TrackRemoved { from: SourceKind, to: SourceKind },
}

impl Rule {
    /// Tag mapping in both directions for both change kinds
    pub fn tag_pair(a: &SourceKind, a_tag: &str, b: &SourceKind, b_tag: &str) -> [Rule; 2] {
        [
            Rule::MapTag {
                from: a.clone(),
                to: b.clone(),
                from_tag: String::from(a_tag),
                to_tag: String::from(b_tag),
                on: ChangeFilter::Both,
            },
            Rule::MapTag {
                from: b.clone(),
                to: a.clone(),
                from_tag: String::from(b_tag),
                to_tag: String::from(a_tag),
                on: ChangeFilter::Both,
            },
        ]
    }

    pub fn from(&self) -> &SourceKind {
        match self {
            Rule::MapTag { from, .. }
            | Rule::TrackAdded { from, .. }
            | Rule::TrackRemoved { from, .. } => from,
        }
    }

    pub fn to(&self) -> &SourceKind {
        match self {
            Rule::MapTag { to, .. } | Rule::TrackAdded { to, .. } | Rule::TrackRemoved { to, .. } => {
                to
            }
        }
    }
}

/// Rule set plus each source's watched root
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTable {
    #[serde(default)]
    rules: Vec<Rule>,
    #[serde(default)]
    watched: BTreeMap<SourceKind, PathBuf>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// ID3 ⇄ Swinsian rules: genre tags are playlist memberships, and new
    /// files propagate when they sit under the other side's watched root.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        for rule in Rule::tag_pair(&SourceKind::ID3, GENRE_TAG, &SourceKind::SWINSIAN, PLAYLIST_TAG) {
            table = table.with_rule(rule);
        }
        table
            .with_rule(Rule::TrackAdded {
                from: SourceKind::ID3,
                to: SourceKind::SWINSIAN,
                scope: Scope::WatchedRoot,
            })
            .with_rule(Rule::TrackAdded {
                from: SourceKind::SWINSIAN,
                to: SourceKind::ID3,
                scope: Scope::WatchedRoot,
            })
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_watched_root(mut self, source: SourceKind, root: impl Into<PathBuf>) -> Self {
        self.watched.insert(source, root.into());
        self
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn watched_root(&self, source: &SourceKind) -> Option<&Path> {
        self.watched.get(source).map(PathBuf::as_path)
    }

    /// Rules translating `from` into `to`, in table order
    pub fn rules_between<'a>(
        &'a self,
        from: &'a SourceKind,
        to: &'a SourceKind,
    ) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules
            .iter()
            .filter(move |r| r.from() == from && r.to() == to)
    }

    /// Reject rules that can never fire or would map onto nothing
    pub fn validate(&self) -> Result<()> {
        for rule in &self.rules {
            if rule.from() == rule.to() {
                return Err(Error::Config(format!(
                    "rule maps source '{}' onto itself",
                    rule.from()
                )));
            }
            if let Rule::MapTag {
                from_tag, to_tag, ..
            } = rule
            {
                if from_tag.is_empty() || to_tag.is_empty() {
                    return Err(Error::Config(format!(
                        "empty tag name in rule {} -> {}",
                        rule.from(),
                        rule.to()
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Translate `changes` (in its own schema) into the `to` schema.
///
/// Never fails. Unmapped tag entries, track additions outside the target's
/// scope and track removals without a rule are dropped with a debug note.
/// Translating into the change-set's own schema returns it unchanged.
pub fn translate(changes: &ChangeSet, to: &SourceKind, rules: &RuleTable) -> ChangeSet {
    let from = changes.schema();
    if from == to {
        return changes.clone();
    }

    let applicable: Vec<&Rule> = rules.rules_between(from, to).collect();
    let mut tracks = Vec::new();

    for track in changes.tracks() {
        let translated = match track.change {
            TrackChange::Modified => {
                let tags = map_tags(&track.path, &track.tags, &applicable);
                if tags.is_empty() {
                    continue;
                }
                tags
            }
            TrackChange::Added => {
                if !propagates_addition(&track.path, to, &applicable, rules) {
                    debug!(path = %track.path, %from, %to, "track addition not propagated");
                    continue;
                }
                map_tags(&track.path, &track.tags, &applicable)
            }
            TrackChange::Removed => {
                if !applicable.iter().any(|r| matches!(r, Rule::TrackRemoved { .. })) {
                    debug!(path = %track.path, %from, %to, "track removal not propagated");
                    continue;
                }
                Vec::new()
            }
        };
        tracks.push(TrackDiff {
            path: track.path.clone(),
            change: track.change,
            tags: translated,
        });
    }

    ChangeSet::from_tracks(to.clone(), changes.origin().clone(), tracks)
}

fn map_tags(path: &TrackPath, changes: &[TagChange], rules: &[&Rule]) -> Vec<TagChange> {
    let mut mapped = Vec::new();
    for change in changes {
        let before = mapped.len();
        for rule in rules {
            if let Rule::MapTag {
                from_tag,
                to_tag,
                on,
                ..
            } = rule
            {
                if from_tag == &change.tag && on.accepts(change.kind) {
                    mapped.push(TagChange {
                        tag: to_tag.clone(),
                        kind: change.kind,
                        value: change.value.clone(),
                    });
                }
            }
        }
        if mapped.len() == before {
            debug!(%path, tag = %change.tag, value = %change.value, "unmapped tag change dropped");
        }
    }
    mapped
}

fn propagates_addition(
    path: &TrackPath,
    to: &SourceKind,
    rules: &[&Rule],
    table: &RuleTable,
) -> bool {
    rules.iter().any(|rule| match rule {
        Rule::TrackAdded {
            scope: Scope::Always,
            ..
        } => true,
        Rule::TrackAdded {
            scope: Scope::WatchedRoot,
            ..
        } => table
            .watched_root(to)
            .map(|root| path.is_under(root))
            .unwrap_or(false),
        _ => false,
    })
}

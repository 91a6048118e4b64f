//! Track and tag model
//!
//! A track is a file path plus a multi-valued tag mapping. Tag values are
//! kept in insertion order but compared as sets: reordering the values of a
//! tag is not a change. A tag with no values is the same as an absent tag,
//! so empty tags are dropped at construction.

use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Tag name → ordered values
pub type TagMap = BTreeMap<String, Vec<String>>;

/// File extensions recognised as music files (lowercase, no dot)
pub const MUSIC_EXTENSIONS: [&str; 6] = ["mp3", "flac", "wav", "m4a", "ogg", "aac"];

/// Track identity: a non-empty file path, extension included
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "PathBuf", into = "PathBuf")]
pub struct TrackPath(PathBuf);

impl TrackPath {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(Error::invalid_path(path, "empty path"));
        }
        Ok(Self(path))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// File extension, if any
    pub fn extension(&self) -> Option<&str> {
        self.0.extension().and_then(|e| e.to_str())
    }

    /// True if this path lies inside `root`
    pub fn is_under(&self, root: &Path) -> bool {
        self.0.starts_with(root)
    }

    /// True if `other` is the same file name with a different extension
    pub fn same_identity_stem(&self, other: &TrackPath) -> bool {
        self != other && self.0.with_extension("") == other.0.with_extension("")
    }

    fn extension_matches(&self, other: &TrackPath) -> bool {
        match (self.extension(), other.extension()) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl TryFrom<PathBuf> for TrackPath {
    type Error = Error;

    fn try_from(path: PathBuf) -> Result<Self> {
        Self::new(path)
    }
}

impl Borrow<Path> for TrackPath {
    fn borrow(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for TrackPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl From<TrackPath> for PathBuf {
    fn from(path: TrackPath) -> Self {
        path.0
    }
}

impl std::fmt::Display for TrackPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// True if the path carries one of [`MUSIC_EXTENSIONS`]
pub fn is_music_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            MUSIC_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Split comma-joined values, trim, drop empties, dedupe and sort.
///
/// Tag readers hand back genre lists like `["Rock, Alternative", "Rock"]`;
/// this turns them into `["Alternative", "Rock"]`.
///
/// ```
/// use djtag::clean_values;
///
/// let raw = vec!["Rock, Alternative".to_string(), " Rock ".to_string()];
/// assert_eq!(clean_values(&raw), ["Alternative", "Rock"]);
/// ```
pub fn clean_values(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// A track: path identity plus normalized tags
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "TrackRecord")]
pub struct Track {
    path: TrackPath,
    tags: TagMap,
}

#[derive(Deserialize)]
struct TrackRecord {
    path: TrackPath,
    #[serde(default)]
    tags: TagMap,
}

impl From<TrackRecord> for Track {
    fn from(record: TrackRecord) -> Self {
        Track::from_parts(record.path, record.tags)
    }
}

impl Track {
    /// Build a track from a path and `(tag, values)` pairs.
    ///
    /// Repeated tag names are concatenated.
    pub fn new<P, I, K, V>(path: P, tags: I) -> Result<Self>
    where
        P: Into<PathBuf>,
        I: IntoIterator<Item = (K, Vec<V>)>,
        K: Into<String>,
        V: Into<String>,
    {
        let path = TrackPath::new(path)?;
        let mut map = TagMap::new();
        for (name, values) in tags {
            map.entry(name.into())
                .or_default()
                .extend(values.into_iter().map(Into::into));
        }
        Ok(Self::from_parts(path, map))
    }

    /// Track with no tags
    pub fn untagged(path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::from_parts(TrackPath::new(path)?, TagMap::new()))
    }

    pub(crate) fn from_parts(path: TrackPath, tags: TagMap) -> Self {
        let tags = tags
            .into_iter()
            .filter_map(|(name, values)| {
                let mut seen = BTreeSet::new();
                let values: Vec<String> = values
                    .into_iter()
                    .filter(|v| seen.insert(v.clone()))
                    .collect();
                (!values.is_empty()).then_some((name, values))
            })
            .collect();
        Self { path, tags }
    }

    pub fn path(&self) -> &TrackPath {
        &self.path
    }

    pub fn tags(&self) -> &TagMap {
        &self.tags
    }

    /// Values of a tag; empty if the tag is absent
    pub fn values(&self, name: &str) -> &[String] {
        self.tags.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Values of a tag as a set
    pub fn value_set(&self, name: &str) -> BTreeSet<&str> {
        self.values(name).iter().map(String::as_str).collect()
    }

    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.contains_key(name)
    }

    /// Order-insensitive comparison of every tag's value set
    pub fn same_tags(&self, other: &Track) -> bool {
        self.tags.len() == other.tags.len()
            && self
                .tags
                .keys()
                .all(|name| self.value_set(name) == other.value_set(name))
    }

    /// Same tags under another path. The extension is part of identity
    /// and may not change.
    pub fn relocate(&self, new_path: impl Into<PathBuf>) -> Result<Track> {
        let new_path = TrackPath::new(new_path)?;
        if !self.path.extension_matches(&new_path) {
            return Err(Error::invalid_path(
                new_path.0,
                "file extension differs from existing track identity",
            ));
        }
        Ok(Track {
            path: new_path,
            tags: self.tags.clone(),
        })
    }

    /// Copy with one tag's values run through [`clean_values`].
    ///
    /// Adapters reading raw ID3 frames use this before building a snapshot:
    ///
    /// ```
    /// use djtag::{Snapshot, SourceKind, Track};
    ///
    /// let raw = Track::new("/music/a.mp3", [("genre", vec!["House, Disco"])]).unwrap();
    /// let snapshot =
    ///     Snapshot::new(SourceKind::ID3, "/music", [raw.with_cleaned("genre")]).unwrap();
    /// assert_eq!(
    ///     snapshot.get("/music/a.mp3").unwrap().values("genre"),
    ///     ["Disco", "House"]
    /// );
    /// ```
    pub fn with_cleaned(&self, name: &str) -> Track {
        let mut tags = self.tags.clone();
        if let Some(values) = tags.get_mut(name) {
            *values = clean_values(values);
        }
        Track::from_parts(self.path.clone(), tags)
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.same_tags(other)
    }
}

impl Eq for Track {}

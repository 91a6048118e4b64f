//! Library snapshots
//!
//! An immutable capture of one source's tracks at one point in time.
//! Tracks are keyed by path and always iterate in path order, so anything
//! derived from a snapshot (diffs, hashes, reports) is reproducible.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::track::{is_music_file, Track, TrackPath};

/// Schema label of the source that produced a snapshot or change-set
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceKind(Cow<'static, str>);

impl SourceKind {
    /// Tag-oriented source: tags live in the audio files
    pub const ID3: SourceKind = SourceKind(Cow::Borrowed("id3"));
    /// Playlist-oriented source: genres are playlist memberships
    pub const SWINSIAN: SourceKind = SourceKind(Cow::Borrowed("swinsian"));

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One source's full track state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "SnapshotRecord", try_from = "SnapshotRecord")]
pub struct Snapshot {
    source: SourceKind,
    root: PathBuf,
    tracks: BTreeMap<TrackPath, Track>,
}

/// Serialized form: tracks as a path-ordered list
#[derive(Serialize, Deserialize)]
struct SnapshotRecord {
    source: SourceKind,
    root: PathBuf,
    #[serde(default)]
    tracks: Vec<Track>,
}

impl From<Snapshot> for SnapshotRecord {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            source: snapshot.source,
            root: snapshot.root,
            tracks: snapshot.tracks.into_values().collect(),
        }
    }
}

impl TryFrom<SnapshotRecord> for Snapshot {
    type Error = Error;

    fn try_from(record: SnapshotRecord) -> Result<Self> {
        Snapshot::new(record.source, record.root, record.tracks)
    }
}

impl Snapshot {
    /// Build a snapshot; fails with `DuplicatePath` if two tracks share a path
    pub fn new(
        source: SourceKind,
        root: impl Into<PathBuf>,
        tracks: impl IntoIterator<Item = Track>,
    ) -> Result<Self> {
        let mut map = BTreeMap::new();
        for track in tracks {
            let path = track.path().clone();
            if map.insert(path.clone(), track).is_some() {
                return Err(Error::DuplicatePath(path.into()));
            }
        }
        Ok(Self::from_map(source, root.into(), map))
    }

    /// Snapshot with no tracks
    pub fn empty(source: SourceKind, root: impl Into<PathBuf>) -> Self {
        Self::from_map(source, root.into(), BTreeMap::new())
    }

    pub(crate) fn from_map(
        source: SourceKind,
        root: PathBuf,
        tracks: BTreeMap<TrackPath, Track>,
    ) -> Self {
        Self {
            source,
            root,
            tracks,
        }
    }

    pub(crate) fn track_map(&self) -> &BTreeMap<TrackPath, Track> {
        &self.tracks
    }

    pub fn source(&self) -> &SourceKind {
        &self.source
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Look up a track; `None` if the path is not in this snapshot
    pub fn get(&self, path: impl AsRef<Path>) -> Option<&Track> {
        self.tracks.get(path.as_ref())
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.tracks.contains_key(path.as_ref())
    }

    /// Tracks in path order
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    /// Paths in order
    pub fn paths(&self) -> impl Iterator<Item = &TrackPath> {
        self.tracks.keys()
    }

    /// Tracks whose extension marks them as music files.
    ///
    /// ```
    /// use djtag::{Snapshot, SourceKind, Track};
    ///
    /// let snapshot = Snapshot::new(
    ///     SourceKind::ID3,
    ///     "/music",
    ///     [
    ///         Track::untagged("/music/a.mp3").unwrap(),
    ///         Track::untagged("/music/cover.jpg").unwrap(),
    ///     ],
    /// )
    /// .unwrap();
    /// let music: Vec<String> = snapshot.music_tracks().map(|t| t.path().to_string()).collect();
    /// assert_eq!(music, ["/music/a.mp3"]);
    /// ```
    pub fn music_tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks
            .values()
            .filter(|t| is_music_file(t.path().as_path()))
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// New snapshot with `track` inserted or replaced
    pub fn with_track(&self, track: Track) -> Snapshot {
        let mut tracks = self.tracks.clone();
        tracks.insert(track.path().clone(), track);
        Self::from_map(self.source.clone(), self.root.clone(), tracks)
    }

    /// JSON form used for persisting snapshots
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Snapshot> {
        Ok(serde_json::from_str(json)?)
    }

    /// New snapshot without the track at `path`
    pub fn without_track(&self, path: impl AsRef<Path>) -> Snapshot {
        let mut tracks = self.tracks.clone();
        tracks.remove(path.as_ref());
        Self::from_map(self.source.clone(), self.root.clone(), tracks)
    }
}

/// Structural equality: identical path sets, tag-set-equal tracks
impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.tracks == other.tracks
    }
}

impl Eq for Snapshot {}

//! End-to-end sync scenarios across the ID3 and Swinsian sources

use djtag::{
    diff, merge, translate, ChangeKind, ConflictKind, Error, RuleTable, Snapshot, SourceKind,
    SyncConfig, SyncContext, TagChange, Track, TrackChange,
};

const SONG: &str = "/music/Artist 1 - Song 1.mp3";

fn id3(tracks: Vec<Track>) -> Snapshot {
    Snapshot::new(SourceKind::ID3, "/music", tracks).unwrap()
}

fn swinsian(tracks: Vec<Track>) -> Snapshot {
    Snapshot::new(SourceKind::SWINSIAN, "/music", tracks).unwrap()
}

fn tagged(path: &str, tag: &str, values: &[&str]) -> Track {
    Track::new(path, [(tag, values.to_vec())]).unwrap()
}

// ── Pipeline ───────────────────────────────────────────────────────────

#[test]
fn test_genre_added_becomes_playlist_membership() {
    let old = id3(vec![tagged(SONG, "genre", &["Rock"])]);
    let new = id3(vec![tagged(SONG, "genre", &["Rock", "Alternative"])]);

    let changes = diff(&old, &new).unwrap();
    assert_eq!(changes.tracks()[0].tags, vec![TagChange::added("genre", "Alternative")]);

    let translated = translate(&changes, &SourceKind::SWINSIAN, &RuleTable::builtin());
    assert_eq!(translated.schema(), &SourceKind::SWINSIAN);
    assert_eq!(translated.origin(), &SourceKind::ID3);
    assert_eq!(
        translated.tracks()[0].tags,
        vec![TagChange::added("playlist", "Alternative")]
    );

    let base = swinsian(vec![tagged(SONG, "playlist", &["Rock"])]);
    let outcome = merge(&base, &[translated]).unwrap();
    assert!(outcome.is_clean());
    assert_eq!(
        outcome.snapshot.get(SONG).unwrap().values("playlist"),
        ["Rock", "Alternative"]
    );
}

#[test]
fn test_track_outside_watched_root_not_propagated() {
    let rules = RuleTable::builtin().with_watched_root(SourceKind::SWINSIAN, "/music/dj");
    let old = id3(vec![]);
    let new = id3(vec![tagged("/music/other/x.mp3", "genre", &["Dub"])]);
    let changes = diff(&old, &new).unwrap();
    assert_eq!(changes.added_tracks().count(), 1);

    let translated = translate(&changes, &SourceKind::SWINSIAN, &rules);
    assert!(translated.is_empty());
}

#[test]
fn test_track_inside_watched_root_propagated() {
    let rules = RuleTable::builtin().with_watched_root(SourceKind::SWINSIAN, "/music/dj");
    let changes = diff(
        &id3(vec![]),
        &id3(vec![tagged("/music/dj/x.mp3", "genre", &["Dub"])]),
    )
    .unwrap();

    let translated = translate(&changes, &SourceKind::SWINSIAN, &rules);
    assert_eq!(translated.tracks()[0].change, TrackChange::Added);

    let outcome = merge(&swinsian(vec![]), &[translated]).unwrap();
    assert_eq!(
        outcome.snapshot.get("/music/dj/x.mp3").unwrap().values("playlist"),
        ["Dub"]
    );
}

// ── Properties ─────────────────────────────────────────────────────────

#[test]
fn test_diff_of_identical_snapshots_is_empty() {
    let snap = id3(vec![
        tagged(SONG, "genre", &["Rock", "Alternative"]),
        Track::untagged("/music/b.flac").unwrap(),
    ]);
    assert!(diff(&snap, &snap).unwrap().is_empty());
}

#[test]
fn test_noop_merge_returns_baseline() {
    let base = id3(vec![tagged(SONG, "genre", &["Rock"])]);
    let empty = djtag::ChangeSet::empty(SourceKind::ID3);
    let outcome = merge(&base, &[empty.clone(), empty]).unwrap();
    assert_eq!(outcome.snapshot, base);
    assert!(outcome.conflicts.is_empty());
}

#[test]
fn test_disjoint_tags_merge_in_any_order() {
    let base = id3(vec![tagged(SONG, "genre", &["Rock"])]);
    let genre = diff(&base, &id3(vec![tagged(SONG, "genre", &["Rock", "Indie"])])).unwrap();
    let mood = diff(
        &base,
        &id3(vec![Track::new(SONG, [("genre", vec!["Rock"]), ("mood", vec!["Dark"])]).unwrap()]),
    )
    .unwrap();

    let a = merge(&base, &[genre.clone(), mood.clone()]).unwrap();
    let b = merge(&base, &[mood, genre]).unwrap();
    assert_eq!(a.snapshot, b.snapshot);
    let track = a.snapshot.get(SONG).unwrap();
    assert_eq!(track.values("genre"), ["Rock", "Indie"]);
    assert_eq!(track.values("mood"), ["Dark"]);
}

#[test]
fn test_identical_adds_do_not_conflict() {
    let base = id3(vec![tagged(SONG, "genre", &["Rock"])]);
    let add = diff(&base, &id3(vec![tagged(SONG, "genre", &["Rock", "Alternative"])])).unwrap();
    let outcome = merge(&base, &[add.clone(), add]).unwrap();
    assert!(outcome.is_clean());
    assert_eq!(
        outcome.snapshot.get(SONG).unwrap().values("genre"),
        ["Rock", "Alternative"]
    );
}

#[test]
fn test_add_remove_race_is_one_conflict() {
    let with_jazz = id3(vec![tagged(SONG, "genre", &["Rock", "Jazz"])]);
    let without_jazz = id3(vec![tagged(SONG, "genre", &["Rock"])]);
    let adds = diff(&without_jazz, &with_jazz).unwrap();
    let removes = diff(&with_jazz, &without_jazz).unwrap();

    let outcome = merge(&without_jazz, &[adds, removes]).unwrap();
    assert_eq!(outcome.conflicts.len(), 1);
    assert_eq!(
        outcome.conflicts[0].kind,
        ConflictKind::TagValue {
            tag: "genre".into(),
            value: "Jazz".into()
        }
    );
    assert_eq!(outcome.conflicts[0].path.to_string(), SONG);
}

#[test]
fn test_extension_change_rejected() {
    let track = tagged("/music/song.mp3", "genre", &["Rock"]);
    assert!(matches!(
        track.relocate("/music/song.m4a"),
        Err(Error::InvalidPath { .. })
    ));
}

// ── Sync cycles ────────────────────────────────────────────────────────

const CONFIG: &str = r#"
[sources.id3]
root = "/music"

[sources.swinsian]
root = "/music"
"#;

#[test]
fn test_sync_cycle_both_directions() {
    let config = SyncConfig::from_toml_str(CONFIG).unwrap();
    let mut ctx = SyncContext::new(&config);
    ctx.record(id3(vec![tagged(SONG, "genre", &["Rock"])])).unwrap();
    ctx.record(swinsian(vec![tagged(SONG, "playlist", &["Rock"])])).unwrap();
    assert!(ctx.sync().unwrap().is_noop());

    // id3 gains a genre, swinsian gains a new track in its root
    ctx.record(id3(vec![tagged(SONG, "genre", &["Rock", "Alternative"])])).unwrap();
    ctx.record(swinsian(vec![
        tagged(SONG, "playlist", &["Rock"]),
        tagged("/music/New - Track.flac", "playlist", &["Ambient"]),
    ]))
    .unwrap();
    let report = ctx.sync().unwrap();
    assert!(report.is_clean());

    let to_swinsian = &report.get(&SourceKind::SWINSIAN).unwrap().push;
    assert_eq!(to_swinsian.len(), 1);
    assert!(to_swinsian
        .entries()
        .all(|(_, c)| c.kind == ChangeKind::Added && c.value == "Alternative"));

    let to_id3 = &report.get(&SourceKind::ID3).unwrap();
    assert_eq!(to_id3.push.added_tracks().count(), 1);
    assert_eq!(
        to_id3.snapshot.get("/music/New - Track.flac").unwrap().values("genre"),
        ["Ambient"]
    );

    assert!(ctx.sync().unwrap().is_noop());
}

//! Integration tests for queue/session persistence on disk

use std::path::PathBuf;
use tempfile::TempDir;
use zenamp_common::session::{PlaylistFile, SessionPaths, SessionState, M3U_HEADER};

#[test]
fn test_session_pair_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let paths = SessionPaths::in_dir(temp_dir.path());

    let playlist = PlaylistFile::new(vec![
        PathBuf::from("/music/one.flac"),
        PathBuf::from("/music/two.mp3"),
        PathBuf::from("/music/three.ogg"),
    ]);
    let state = SessionState {
        index: Some(1),
        offset_seconds: 42.5,
    };

    paths.save(&playlist, &state).unwrap();

    let text = std::fs::read_to_string(&paths.playlist).unwrap();
    assert!(text.starts_with(M3U_HEADER));
    assert_eq!(text.lines().count(), 4);

    let sidecar = std::fs::read_to_string(&paths.state).unwrap();
    assert_eq!(sidecar.lines().collect::<Vec<_>>(), vec!["1", "42.5"]);

    let (loaded_playlist, loaded_state) = paths.load().unwrap();
    assert_eq!(loaded_playlist, playlist);
    assert_eq!(loaded_state, state);
}

#[test]
fn test_missing_sidecar_restores_from_start() {
    let temp_dir = TempDir::new().unwrap();
    let paths = SessionPaths::in_dir(temp_dir.path());

    PlaylistFile::new(vec![PathBuf::from("/music/one.flac")])
        .save(&paths.playlist)
        .unwrap();

    let (_, state) = paths.load().unwrap();
    assert_eq!(state.index, Some(0));
    assert_eq!(state.offset_seconds, 0.0);
}

#[test]
fn test_missing_playlist_is_not_found() {
    let temp_dir = TempDir::new().unwrap();
    let paths = SessionPaths::in_dir(temp_dir.path());
    assert!(paths.load().is_err());
}

#[test]
fn test_relative_entries_resolve_against_playlist_dir() {
    let temp_dir = TempDir::new().unwrap();
    let list = temp_dir.path().join("mix.m3u");
    std::fs::write(&list, "#EXTM3U\nsub/track.wav\n").unwrap();

    let playlist = PlaylistFile::load(&list).unwrap();
    assert_eq!(playlist.entries, vec![temp_dir.path().join("sub/track.wav")]);
}

#[test]
fn test_save_leaves_no_temp_file() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("queue.m3u");

    PlaylistFile::default().save(&target).unwrap();

    assert!(target.exists());
    assert!(!temp_dir.path().join("queue.m3u.tmp").exists());
}

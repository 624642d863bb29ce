//! Desktop bootstrap: playback state survives a restart through the file store.

#![cfg(feature = "desktop-shims")]

use core_playback::{PlaybackState, Track};
use core_runtime::config::CoreConfig;
use core_service::bootstrap_desktop;

#[test]
fn test_snapshot_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("local_storage.json");

    {
        let core = bootstrap_desktop(CoreConfig::default(), &path).unwrap();
        core.playback_store()
            .save(&PlaybackState::new("7", 3).track(Track::Two).current_time(88.0));
    }

    let core = bootstrap_desktop(CoreConfig::default(), &path).unwrap();
    let store = core.playback_store();
    assert!(store.has_history());

    let snapshot = store.get().unwrap();
    assert_eq!(snapshot.song_index, 3);
    assert_eq!(snapshot.track, Track::Two);
    assert_eq!(snapshot.current_time, 88.0);

    store.clear();
    assert!(!store.has_history());
}

//! Restoration of a saved snapshot after reload.
//!
//! ```text
//! Idle ──playlists loaded──▶ Validate ──no match──▶ Idle
//!                               │
//!                               ▼
//!                           Restoring ──detail──▶ Applying ──can play──▶ Ready
//! ```
//!
//! While the machine is between Validate and Applying the player must not
//! save on change, or the restore would overwrite the snapshot it is reading.

use core_runtime::config::{AutoResumePolicy, DeviceClass};

use crate::models::{PlaylistDetail, PlaylistId, PlaylistSummary, Track};
use crate::snapshot::PlaybackSnapshot;

const MOBILE_USER_AGENT_TOKENS: [&str; 8] = [
    "android",
    "webos",
    "iphone",
    "ipad",
    "ipod",
    "blackberry",
    "iemobile",
    "opera mini",
];

/// Widest viewport still treated as a phone when touch is available.
pub const MOBILE_MAX_VIEWPORT_WIDTH: u32 = 768;

/// Classify the host device for the auto-resume policy.
pub fn detect_device(user_agent: &str, has_touch: bool, viewport_width: u32) -> DeviceClass {
    let agent = user_agent.to_ascii_lowercase();
    let mobile_agent = MOBILE_USER_AGENT_TOKENS
        .iter()
        .any(|token| agent.contains(token));

    if mobile_agent || (has_touch && viewport_width <= MOBILE_MAX_VIEWPORT_WIDTH) {
        DeviceClass::Mobile
    } else {
        DeviceClass::Desktop
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestorePhase {
    Idle,
    Validate,
    Restoring,
    Applying,
    Ready,
}

/// Position held while the playlist detail loads.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRestore {
    pub playlist_id: PlaylistId,
    pub song_index: usize,
    pub track: Track,
    pub current_time: f64,
    pub auto_play: bool,
}

/// Apply immediately when restoration starts: set the volume and load the
/// playlist detail.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoreStart {
    pub playlist_id: PlaylistId,
    pub volume: f64,
}

/// Song and track to select once the detail has arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreSelection {
    pub song_index: usize,
    pub track: Track,
}

/// What to do once the audio output can play.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResumeCommand {
    /// Seek target; `None` when the saved position was the start.
    pub seek_to: Option<f64>,
    pub play: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyAttempted,
    NoSnapshot,
    NoPlaylists,
    UnknownPlaylist(PlaylistId),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::AlreadyAttempted => f.write_str("restoration already attempted"),
            SkipReason::NoSnapshot => f.write_str("no saved playback state"),
            SkipReason::NoPlaylists => f.write_str("no playlists loaded"),
            SkipReason::UnknownPlaylist(id) => write!(f, "playlist {} no longer exists", id),
        }
    }
}

/// Drives one restoration attempt per page load.
#[derive(Debug)]
pub struct RestorationMachine {
    phase: RestorePhase,
    attempted: bool,
    auto_play: bool,
    pending: Option<PendingRestore>,
    resume: Option<ResumeCommand>,
}

impl RestorationMachine {
    /// `auto_play` decides whether a restored session starts playing.
    pub fn new(auto_play: bool) -> Self {
        Self {
            phase: RestorePhase::Idle,
            attempted: false,
            auto_play,
            pending: None,
            resume: None,
        }
    }

    pub fn from_policy(policy: AutoResumePolicy, device: DeviceClass) -> Self {
        Self::new(policy.should_auto_play(device))
    }

    pub fn phase(&self) -> RestorePhase {
        self.phase
    }

    /// Save-on-change must be suppressed while this is `true`.
    pub fn is_restoring(&self) -> bool {
        matches!(
            self.phase,
            RestorePhase::Validate | RestorePhase::Restoring | RestorePhase::Applying
        )
    }

    pub fn pending(&self) -> Option<&PendingRestore> {
        self.pending.as_ref()
    }

    /// Validate a snapshot against the loaded playlists. Only the first call
    /// per machine can start a restoration.
    pub fn begin(
        &mut self,
        snapshot: Option<PlaybackSnapshot>,
        playlists: &[PlaylistSummary],
    ) -> Result<RestoreStart, SkipReason> {
        if self.attempted {
            return Err(SkipReason::AlreadyAttempted);
        }
        if playlists.is_empty() {
            return Err(SkipReason::NoPlaylists);
        }
        self.attempted = true;
        self.phase = RestorePhase::Validate;

        let snapshot = match snapshot {
            Some(snapshot) => snapshot,
            None => {
                self.phase = RestorePhase::Idle;
                return Err(SkipReason::NoSnapshot);
            }
        };

        if !playlists.iter().any(|p| p.id == snapshot.playlist_id) {
            self.phase = RestorePhase::Idle;
            return Err(SkipReason::UnknownPlaylist(snapshot.playlist_id));
        }

        self.phase = RestorePhase::Restoring;
        let start = RestoreStart {
            playlist_id: snapshot.playlist_id.clone(),
            volume: snapshot.clamped_volume(),
        };
        self.pending = Some(PendingRestore {
            playlist_id: snapshot.playlist_id,
            song_index: snapshot.song_index,
            track: snapshot.track,
            current_time: snapshot.current_time,
            auto_play: self.auto_play,
        });
        Ok(start)
    }

    /// Apply the pending position to freshly loaded playlist detail.
    ///
    /// Returns `None` when nothing is pending for this playlist. An empty
    /// playlist or a detail for another playlist abandons the restoration.
    pub fn apply(&mut self, detail: &PlaylistDetail) -> Option<RestoreSelection> {
        if self.phase != RestorePhase::Restoring {
            return None;
        }
        let pending = self.pending.take()?;
        if pending.playlist_id != detail.id || detail.is_empty() {
            self.abandon();
            return None;
        }

        let selection = RestoreSelection {
            song_index: pending.song_index.min(detail.len() - 1),
            track: pending.track,
        };
        self.resume = Some(ResumeCommand {
            seek_to: (pending.current_time > 0.0).then_some(pending.current_time),
            play: pending.auto_play,
        });
        self.phase = RestorePhase::Applying;
        Some(selection)
    }

    /// The audio output is ready: seek and maybe play, then finish.
    pub fn can_play(&mut self) -> Option<ResumeCommand> {
        if self.phase != RestorePhase::Applying {
            return None;
        }
        self.phase = RestorePhase::Ready;
        self.resume.take()
    }

    /// Give up on a restoration in progress, e.g. when the user picks
    /// another playlist first.
    pub fn abandon(&mut self) {
        self.pending = None;
        self.resume = None;
        if self.is_restoring() {
            self.phase = RestorePhase::Ready;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Song;

    fn snapshot(playlist: &str, song_index: usize, current_time: f64) -> PlaybackSnapshot {
        PlaybackSnapshot {
            playlist_id: PlaylistId::from(playlist),
            song_index,
            track: Track::Two,
            current_time,
            volume: 0.4,
            saved_at: 0,
        }
    }

    fn playlists() -> Vec<PlaylistSummary> {
        vec![
            PlaylistSummary { id: PlaylistId::from(3), name: "Drafts".into() },
            PlaylistSummary { id: PlaylistId::from(7), name: "Finals".into() },
        ]
    }

    fn detail(id: u64, songs: usize) -> PlaylistDetail {
        PlaylistDetail {
            id: PlaylistId::from(id),
            name: String::new(),
            songs: vec![Song::default(); songs],
        }
    }

    #[test]
    fn test_full_restoration() {
        let mut machine = RestorationMachine::new(true);
        let start = machine.begin(Some(snapshot("7", 2, 41.5)), &playlists()).unwrap();

        assert_eq!(start, RestoreStart { playlist_id: PlaylistId::from(7), volume: 0.4 });
        assert_eq!(machine.phase(), RestorePhase::Restoring);
        assert!(machine.is_restoring());

        let selection = machine.apply(&detail(7, 5)).unwrap();
        assert_eq!(selection, RestoreSelection { song_index: 2, track: Track::Two });
        assert_eq!(machine.phase(), RestorePhase::Applying);

        let resume = machine.can_play().unwrap();
        assert_eq!(resume, ResumeCommand { seek_to: Some(41.5), play: true });
        assert_eq!(machine.phase(), RestorePhase::Ready);
        assert!(!machine.is_restoring());
    }

    #[test]
    fn test_song_index_is_clamped() {
        let mut machine = RestorationMachine::new(false);
        machine.begin(Some(snapshot("7", 99, 0.0)), &playlists()).unwrap();

        let selection = machine.apply(&detail(7, 5)).unwrap();
        assert_eq!(selection.song_index, 4);
    }

    #[test]
    fn test_no_seek_from_start_and_no_autoplay() {
        let mut machine =
            RestorationMachine::from_policy(AutoResumePolicy::DesktopOnly, DeviceClass::Mobile);
        machine.begin(Some(snapshot("7", 0, 0.0)), &playlists()).unwrap();
        machine.apply(&detail(7, 1)).unwrap();

        assert_eq!(
            machine.can_play().unwrap(),
            ResumeCommand { seek_to: None, play: false }
        );
    }

    #[test]
    fn test_unknown_playlist_skips() {
        let mut machine = RestorationMachine::new(true);
        let err = machine.begin(Some(snapshot("99", 0, 0.0)), &playlists()).unwrap_err();

        assert_eq!(err, SkipReason::UnknownPlaylist(PlaylistId::from(99)));
        assert_eq!(machine.phase(), RestorePhase::Idle);
        assert!(!machine.is_restoring());
    }

    #[test]
    fn test_only_first_attempt_counts() {
        let mut machine = RestorationMachine::new(true);
        assert_eq!(machine.begin(None, &playlists()), Err(SkipReason::NoSnapshot));
        assert_eq!(
            machine.begin(Some(snapshot("7", 0, 0.0)), &playlists()),
            Err(SkipReason::AlreadyAttempted)
        );
    }

    #[test]
    fn test_waits_for_playlists() {
        let mut machine = RestorationMachine::new(true);
        assert_eq!(
            machine.begin(Some(snapshot("7", 0, 0.0)), &[]),
            Err(SkipReason::NoPlaylists)
        );
        assert!(machine.begin(Some(snapshot("7", 0, 0.0)), &playlists()).is_ok());
    }

    #[test]
    fn test_empty_playlist_abandons() {
        let mut machine = RestorationMachine::new(true);
        machine.begin(Some(snapshot("7", 1, 3.0)), &playlists()).unwrap();

        assert!(machine.apply(&detail(7, 0)).is_none());
        assert_eq!(machine.phase(), RestorePhase::Ready);
        assert!(machine.can_play().is_none());
    }

    #[test]
    fn test_detect_device() {
        let iphone = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)";
        let desktop = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36";

        assert_eq!(detect_device(iphone, true, 390), DeviceClass::Mobile);
        assert_eq!(detect_device(desktop, false, 1920), DeviceClass::Desktop);
        assert_eq!(detect_device(desktop, true, 700), DeviceClass::Mobile);
        assert_eq!(detect_device(desktop, true, 1280), DeviceClass::Desktop);
    }
}

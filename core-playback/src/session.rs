//! Player session: selection, transport and persistence wiring.
//!
//! The session holds what the player page shows (playlist, song, track,
//! position, volume) and turns user actions and audio-element signals into
//! state changes. Selection changes are saved debounced, the position is
//! saved periodically while playing, and [`PlayerSession::teardown`] (or
//! drop) writes a final snapshot synchronously.
//!
//! Methods that schedule saves must be called inside a tokio runtime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use core_runtime::config::{DeviceClass, PlaybackConfig};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::{PlaybackError, Result};
use crate::models::{PlaylistDetail, PlaylistId, PlaylistSummary, Track};
use crate::persistence::SaveScheduler;
use crate::restore::{RestorationMachine, RestorePhase, ResumeCommand};
use crate::snapshot::PlaybackState;
use crate::store::PlaybackStateStore;

struct SessionState {
    playlists: Vec<PlaylistSummary>,
    selected: Option<PlaylistId>,
    detail: Option<PlaylistDetail>,
    song_index: usize,
    track: Track,
    playing: bool,
    current_time: f64,
    volume: f64,
    restoration: RestorationMachine,
}

impl SessionState {
    fn playback_state(&self) -> Option<PlaybackState> {
        let playlist = self.selected.clone()?;
        Some(
            PlaybackState::new(playlist, self.song_index)
                .track(self.track)
                .current_time(self.current_time)
                .volume(self.volume),
        )
    }

    /// State to persist, unless a restoration is in flight: until it
    /// completes, the stored snapshot is the one being restored.
    fn save_on_change(&self) -> Option<PlaybackState> {
        if self.restoration.is_restoring() {
            return None;
        }
        self.playback_state()
    }

    fn song_count(&self) -> usize {
        self.detail.as_ref().map_or(0, PlaylistDetail::len)
    }
}

pub struct PlayerSession {
    state: Arc<Mutex<SessionState>>,
    saver: SaveScheduler,
    events: Option<EventBus>,
    torn_down: AtomicBool,
}

impl PlayerSession {
    pub fn new(store: Arc<PlaybackStateStore>, config: &PlaybackConfig, device: DeviceClass) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState {
                playlists: Vec::new(),
                selected: None,
                detail: None,
                song_index: 0,
                track: Track::One,
                playing: false,
                current_time: 0.0,
                volume: 1.0,
                restoration: RestorationMachine::from_policy(config.auto_resume, device),
            })),
            saver: SaveScheduler::new(store, config),
            events: None,
            torn_down: AtomicBool::new(false),
        }
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// The playlist list arrived. Returns the playlist whose detail should
    /// be fetched when a saved session is being restored.
    pub fn playlists_loaded(&self, playlists: Vec<PlaylistSummary>) -> Option<PlaylistId> {
        let snapshot = self.saver.store().get();
        let mut state = self.state.lock();
        state.playlists = playlists;

        let outcome = {
            let SessionState { restoration, playlists, .. } = &mut *state;
            restoration.begin(snapshot, playlists)
        };
        match outcome {
            Ok(start) => {
                state.volume = start.volume;
                state.selected = Some(start.playlist_id.clone());
                drop(state);
                info!(playlist_id = %start.playlist_id, "Restoring playback state");
                self.emit(PlaybackEvent::RestorationStarted {
                    playlist_id: start.playlist_id.to_string(),
                });
                Some(start.playlist_id)
            }
            Err(reason) => {
                drop(state);
                debug!(reason = %reason, "Playback restoration skipped");
                self.emit(PlaybackEvent::RestorationSkipped {
                    reason: reason.to_string(),
                });
                None
            }
        }
    }

    /// The user picked a playlist. Returns the id whose detail to fetch.
    pub fn select_playlist(&self, id: impl Into<PlaylistId>) -> PlaylistId {
        let id = id.into();
        let mut state = self.state.lock();
        if state.restoration.is_restoring() {
            state.restoration.abandon();
        }
        state.selected = Some(id.clone());
        state.detail = None;
        let save = state.save_on_change();
        drop(state);

        self.request_save(save);
        id
    }

    /// Playlist detail arrived. Applies a pending restoration, otherwise
    /// starts from the first song, paused. Detail for a playlist that is no
    /// longer selected is ignored.
    pub fn playlist_loaded(&self, detail: PlaylistDetail) {
        let mut state = self.state.lock();
        if state.selected.as_ref() != Some(&detail.id) {
            debug!(playlist_id = %detail.id, "Ignoring stale playlist detail");
            return;
        }

        let restoring = state.restoration.phase() == RestorePhase::Restoring;
        match state.restoration.apply(&detail) {
            Some(selection) => {
                state.song_index = selection.song_index;
                state.track = selection.track;
            }
            None if restoring => {
                // Restoration abandoned; fall through to a fresh start.
                state.song_index = 0;
                state.track = Track::One;
            }
            None => {
                state.song_index = 0;
                state.track = Track::One;
                state.playing = false;
            }
        }
        state.current_time = 0.0;
        state.detail = Some(detail);
        let save = state.save_on_change();
        let playing = state.playing;
        drop(state);

        self.request_save(save);
        self.sync_periodic(playing);
    }

    /// The audio output can play. Completes a restoration: returns the seek
    /// and play command to apply.
    pub fn can_play(&self) -> Option<ResumeCommand> {
        let mut state = self.state.lock();
        let command = state.restoration.can_play()?;
        if let Some(seconds) = command.seek_to {
            state.current_time = seconds;
        }
        if command.play {
            state.playing = true;
        }
        let playlist_id = state.selected.clone();
        let song_index = state.song_index;
        let playing = state.playing;
        drop(state);

        if let Some(playlist_id) = playlist_id {
            info!(playlist_id = %playlist_id, song_index, auto_play = command.play, "Playback restored");
            self.emit(PlaybackEvent::RestorationCompleted {
                playlist_id: playlist_id.to_string(),
                song_index,
                auto_play: command.play,
            });
        }
        self.sync_periodic(playing);
        Some(command)
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    /// Jump to a song, on track 1, and play.
    pub fn select_song(&self, index: usize) -> Result<()> {
        let mut state = self.state.lock();
        let len = state.song_count();
        if state.detail.is_none() {
            return Err(PlaybackError::NoPlaylistLoaded);
        }
        if index >= len {
            return Err(PlaybackError::SongOutOfRange { index, len });
        }
        state.song_index = index;
        state.track = Track::One;
        state.current_time = 0.0;
        state.playing = true;
        let save = state.save_on_change();
        drop(state);

        self.request_save(save);
        self.sync_periodic(true);
        Ok(())
    }

    /// Advance one song. Returns `false` at the end of the playlist.
    pub fn next(&self) -> bool {
        self.step(|index, len| (index + 1 < len).then_some(index + 1))
    }

    /// Go back one song. Returns `false` at the start of the playlist.
    pub fn previous(&self) -> bool {
        self.step(|index, _| index.checked_sub(1))
    }

    /// Switch rendition. Only tracks with a playable URL can be selected.
    pub fn toggle_track(&self, track: Track) -> bool {
        let mut state = self.state.lock();
        let available = state
            .detail
            .as_ref()
            .and_then(|d| d.song(state.song_index))
            .is_some_and(|song| song.has_track(track));
        if !available || state.track == track {
            return available;
        }
        state.track = track;
        let save = state.save_on_change();
        drop(state);

        self.request_save(save);
        true
    }

    /// The current song finished: auto-advance, or stop after the last one.
    pub fn song_ended(&self) -> bool {
        if self.next() {
            return true;
        }
        self.set_playing(false);
        false
    }

    /// Play or pause. A change saves the position, debounced.
    pub fn set_playing(&self, playing: bool) {
        let mut state = self.state.lock();
        let changed = state.playing != playing;
        state.playing = playing;
        let save = if changed { state.save_on_change() } else { None };
        drop(state);

        self.request_save(save);
        self.sync_periodic(playing);
    }

    /// Position reported by the audio output.
    pub fn time_update(&self, seconds: f64) {
        if seconds.is_finite() && seconds >= 0.0 {
            self.state.lock().current_time = seconds;
        }
    }

    pub fn set_volume(&self, volume: f64) {
        if volume.is_finite() {
            self.state.lock().volume = volume.clamp(0.0, 1.0);
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// URL to load into the audio output for the current song and track.
    pub fn audio_url(&self) -> Option<String> {
        let state = self.state.lock();
        state
            .detail
            .as_ref()?
            .song(state.song_index)?
            .audio_url(state.track)
            .map(str::to_string)
    }

    pub fn selected_playlist(&self) -> Option<PlaylistId> {
        self.state.lock().selected.clone()
    }

    pub fn song_index(&self) -> usize {
        self.state.lock().song_index
    }

    pub fn track(&self) -> Track {
        self.state.lock().track
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    pub fn current_time(&self) -> f64 {
        self.state.lock().current_time
    }

    pub fn volume(&self) -> f64 {
        self.state.lock().volume
    }

    pub fn restore_phase(&self) -> RestorePhase {
        self.state.lock().restoration.phase()
    }

    pub fn playback_state(&self) -> Option<PlaybackState> {
        self.state.lock().playback_state()
    }

    pub fn has_pending_save(&self) -> bool {
        self.saver.has_pending()
    }

    /// Write the current state synchronously and stop the timers. Also runs
    /// on drop; only the first call writes. Nothing is written while a
    /// restoration is in flight.
    pub fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.saver.stop_periodic();
        let state = self.state.lock().save_on_change();
        match state {
            Some(state) => {
                self.saver.flush(&state);
            }
            None => self.saver.cancel_pending(),
        }
    }

    fn step(&self, target: impl FnOnce(usize, usize) -> Option<usize>) -> bool {
        let mut state = self.state.lock();
        let len = state.song_count();
        let Some(index) = target(state.song_index, len) else {
            return false;
        };
        state.song_index = index;
        state.track = Track::One;
        state.current_time = 0.0;
        let save = state.save_on_change();
        drop(state);

        self.request_save(save);
        true
    }

    fn request_save(&self, state: Option<PlaybackState>) {
        if let Some(state) = state {
            self.saver.schedule(state);
        }
    }

    fn sync_periodic(&self, playing: bool) {
        if !playing {
            self.saver.stop_periodic();
            return;
        }
        if self.saver.is_periodic_running() {
            return;
        }
        let state = Arc::clone(&self.state);
        self.saver.start_periodic(Arc::new(move || {
            let state = state.lock();
            if state.playing {
                state.save_on_change()
            } else {
                None
            }
        }));
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(bus) = &self.events {
            let _ = bus.emit(CoreEvent::Playback(event));
        }
    }
}

impl Drop for PlayerSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

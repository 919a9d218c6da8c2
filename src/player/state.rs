//! Playback state machine
//!
//! Single source of truth for what is currently audible and queued:
//! current track, queue, transport flags, position, volume, shuffle/repeat,
//! and the favorite flag for the current track. Mutations forward to the
//! attached transport and fan out as `StateChange` notifications.
//!
//! ## Architecture
//! ```text
//! UI / Voice Executor --[operations]--> PlaybackState --[Transport]--> backend
//! Subscribers        <--[StateChange]-- PlaybackState
//! ```

use std::fmt;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use parking_lot::RwLock;
use tracing::warn;

use crate::api::{Track, UserDataStore};
use crate::features::RepeatMode;

use super::queue::{self, QueueNavigator};
use super::transport::Transport;

// ============ State Change Events ============

/// Notifications emitted after each state mutation
///
/// Subscribers (player bar, voice feedback, demo console) receive these
/// through the channel returned by `PlaybackState::subscribe`.
#[derive(Debug, Clone)]
pub enum StateChange {
    /// A track started playing from position zero
    TrackStarted { track: Track },
    /// Playback paused, position retained
    Paused,
    /// Playback resumed
    Resumed,
    /// Playback stopped and current track cleared
    Stopped,
    /// Queue replaced wholesale
    QueueReplaced { len: usize },
    /// Track appended to the queue
    TrackEnqueued { track: Track },
    /// Track removed from the queue by id
    TrackRemoved { id: String },
    /// Position moved by an explicit seek
    Seeked { position_ms: u64 },
    /// Volume changed
    VolumeChanged { volume: u8 },
    /// Shuffle flag changed
    ShuffleChanged { on: bool },
    /// Repeat mode changed
    RepeatChanged { mode: RepeatMode },
    /// Favorite flag changed for a track (optimistic flip or rollback)
    FavoriteChanged { track_id: String, favorite: bool },
}

// ============ Shared State ============

/// Inner state protected by RwLock
#[derive(Debug, Clone)]
struct PlaybackStateInner {
    /// Currently audible track, if any
    current: Option<Track>,
    /// Ordered queue defining next/previous traversal
    queue: Vec<Track>,
    /// Whether the transport is playing
    playing: bool,
    /// Playback position in milliseconds
    position_ms: u64,
    /// Duration of the current track in milliseconds
    duration_ms: u64,
    /// Volume 0..=100
    volume: u8,
    /// Shuffle flag, forwarded to the transport only
    shuffle: bool,
    /// Repeat mode
    repeat: RepeatMode,
    /// Favorite flag for the current track
    favorite: bool,
}

impl PlaybackStateInner {
    fn new(volume: u8) -> Self {
        Self {
            current: None,
            queue: Vec::new(),
            playing: false,
            position_ms: 0,
            duration_ms: 0,
            volume,
            shuffle: false,
            repeat: RepeatMode::Off,
            favorite: false,
        }
    }
}

/// Cloneable snapshot of the playback state for readers
#[derive(Debug, Clone)]
pub struct PlaybackSnapshot {
    pub current: Option<Track>,
    pub queue_len: usize,
    pub playing: bool,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub volume: u8,
    pub shuffle: bool,
    pub repeat: RepeatMode,
    pub favorite: bool,
}

/// Playback state machine shared across the console and voice layers
///
/// All mutations run on the application event loop; the lock exists for
/// cheap snapshot reads, not for concurrent writers.
#[derive(Clone)]
pub struct PlaybackState {
    inner: Arc<RwLock<PlaybackStateInner>>,
    transport: Arc<dyn Transport>,
    subscribers: Arc<RwLock<Vec<StateChangeSender>>>,
}

impl fmt::Debug for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("PlaybackState")
            .field("current", &inner.current.as_ref().map(|t| &t.title))
            .field("playing", &inner.playing)
            .field("queue_len", &inner.queue.len())
            .field("volume", &inner.volume)
            .finish()
    }
}

impl PlaybackState {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let volume = transport.default_volume();
        Self {
            inner: Arc::new(RwLock::new(PlaybackStateInner::new(volume))),
            transport,
            subscribers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register an observer; the receiver gets every subsequent change
    pub fn subscribe(&self) -> StateChangeReceiver {
        let (tx, rx) = state_change_channel();
        self.subscribers.write().push(tx);
        rx
    }

    fn notify(&self, change: StateChange) {
        // Dropped receivers are pruned on the way through
        self.subscribers
            .write()
            .retain(|tx| tx.send(change.clone()).is_ok());
    }

    // ---- Read methods ----

    pub fn snapshot(&self) -> PlaybackSnapshot {
        let inner = self.inner.read();
        PlaybackSnapshot {
            current: inner.current.clone(),
            queue_len: inner.queue.len(),
            playing: inner.playing,
            position_ms: inner.position_ms,
            duration_ms: inner.duration_ms,
            volume: inner.volume,
            shuffle: inner.shuffle,
            repeat: inner.repeat,
            favorite: inner.favorite,
        }
    }

    pub fn current_track(&self) -> Option<Track> {
        self.inner.read().current.clone()
    }

    pub fn is_playing(&self) -> bool {
        self.inner.read().playing
    }

    pub fn position_ms(&self) -> u64 {
        self.inner.read().position_ms
    }

    pub fn duration_ms(&self) -> u64 {
        self.inner.read().duration_ms
    }

    pub fn volume(&self) -> u8 {
        self.inner.read().volume
    }

    #[allow(dead_code)]
    pub fn shuffle(&self) -> bool {
        self.inner.read().shuffle
    }

    pub fn repeat(&self) -> RepeatMode {
        self.inner.read().repeat
    }

    pub fn favorite(&self) -> bool {
        self.inner.read().favorite
    }

    pub fn queue(&self) -> Vec<Track> {
        self.inner.read().queue.clone()
    }

    #[allow(dead_code)]
    pub fn queue_len(&self) -> usize {
        self.inner.read().queue.len()
    }

    // ---- Transport operations ----

    /// Start playing a track: current set, position reset, transport started.
    /// The local state updates first; a transport failure is logged, never
    /// surfaced (the state machine stays authoritative).
    pub async fn play_track(&self, track: Track) {
        let (queue, index) = {
            let inner = self.inner.read();
            match queue::position_of(&inner.queue, &track.id) {
                Some(idx) => (inner.queue.clone(), idx),
                None => (vec![track.clone()], 0),
            }
        };
        {
            let mut inner = self.inner.write();
            inner.current = Some(track.clone());
            inner.position_ms = 0;
            inner.duration_ms = track.duration_ms;
            inner.playing = true;
            inner.favorite = false;
        }
        if let Err(e) = self.transport.play(&queue, index).await {
            warn!("transport play failed: {}", e);
        }
        self.notify(StateChange::TrackStarted { track });
    }

    /// Replace the queue wholesale. Current track and playing flag are
    /// untouched.
    pub fn set_queue(&self, tracks: Vec<Track>) {
        let len = tracks.len();
        self.inner.write().queue = tracks;
        self.notify(StateChange::QueueReplaced { len });
    }

    /// Append a track to the queue
    pub async fn enqueue(&self, track: Track) {
        self.inner.write().queue.push(track.clone());
        if let Err(e) = self.transport.enqueue(&track).await {
            warn!("transport enqueue failed: {}", e);
        }
        self.notify(StateChange::TrackEnqueued { track });
    }

    /// Remove a track from the queue by id. The current track keeps
    /// playing even when removed; traversal just stops finding it.
    pub fn remove_from_queue(&self, id: &str) {
        let removed = {
            let mut inner = self.inner.write();
            let before = inner.queue.len();
            inner.queue.retain(|t| t.id != id);
            inner.queue.len() != before
        };
        if removed {
            self.notify(StateChange::TrackRemoved { id: id.to_string() });
        }
    }

    #[allow(dead_code)]
    pub async fn toggle_play(&self) {
        if self.inner.read().current.is_none() {
            return;
        }
        if self.is_playing() {
            self.pause().await;
        } else {
            self.resume().await;
        }
    }

    pub async fn pause(&self) {
        {
            let mut inner = self.inner.write();
            if inner.current.is_none() || !inner.playing {
                return;
            }
            inner.playing = false;
        }
        if let Err(e) = self.transport.pause().await {
            warn!("transport pause failed: {}", e);
        }
        self.notify(StateChange::Paused);
    }

    pub async fn resume(&self) {
        {
            let mut inner = self.inner.write();
            if inner.current.is_none() || inner.playing {
                return;
            }
            inner.playing = true;
        }
        if let Err(e) = self.transport.resume().await {
            warn!("transport resume failed: {}", e);
        }
        self.notify(StateChange::Resumed);
    }

    /// Stop playback and clear the current track
    pub async fn stop(&self) {
        {
            let mut inner = self.inner.write();
            inner.current = None;
            inner.playing = false;
            inner.position_ms = 0;
            inner.duration_ms = 0;
            inner.favorite = false;
        }
        if let Err(e) = self.transport.pause().await {
            warn!("transport stop failed: {}", e);
        }
        self.notify(StateChange::Stopped);
    }

    /// Skip to the next track with wraparound. No-op when nothing is
    /// playing, the queue is empty, or the current track left the queue.
    pub async fn next(&self) {
        if let Some(track) = self.neighbor_track(Direction::Forward) {
            self.play_track(track).await;
        }
    }

    /// Skip to the previous track with wraparound
    pub async fn previous(&self) {
        if let Some(track) = self.neighbor_track(Direction::Backward) {
            self.play_track(track).await;
        }
    }

    /// Transport-completion path: the current track finished on its own.
    /// Repeat-one replays it; otherwise this advances like `next`.
    pub async fn track_ended(&self) {
        let target = {
            let inner = self.inner.read();
            let current = match &inner.current {
                Some(t) => t,
                None => return,
            };
            match queue::position_of(&inner.queue, &current.id) {
                Some(idx) => QueueNavigator::new(inner.queue.len(), Some(idx))
                    .ended_index(inner.repeat)
                    .and_then(|i| inner.queue.get(i).cloned()),
                None => None,
            }
        };
        if let Some(track) = target {
            self.play_track(track).await;
        }
    }

    fn neighbor_track(&self, direction: Direction) -> Option<Track> {
        let inner = self.inner.read();
        let current = inner.current.as_ref()?;
        let idx = queue::position_of(&inner.queue, &current.id)?;
        let nav = QueueNavigator::new(inner.queue.len(), Some(idx));
        let target = match direction {
            Direction::Forward => nav.next_index(),
            Direction::Backward => nav.prev_index(),
        };
        target.and_then(|i| inner.queue.get(i).cloned())
    }

    /// Seek within the current track; the position clamps to
    /// [0, duration]. No-op when nothing is playing.
    pub async fn seek(&self, position_ms: i64) {
        let clamped = {
            let mut inner = self.inner.write();
            if inner.current.is_none() {
                return;
            }
            let clamped = position_ms.clamp(0, inner.duration_ms as i64) as u64;
            inner.position_ms = clamped;
            clamped
        };
        if let Err(e) = self.transport.seek(clamped).await {
            warn!("transport seek failed: {}", e);
        }
        self.notify(StateChange::Seeked {
            position_ms: clamped,
        });
    }

    /// Set volume, clamped to 0..=100
    pub async fn set_volume(&self, volume: i32) {
        let clamped = volume.clamp(0, 100) as u8;
        self.inner.write().volume = clamped;
        if let Err(e) = self.transport.set_volume(clamped).await {
            warn!("transport volume failed: {}", e);
        }
        self.notify(StateChange::VolumeChanged { volume: clamped });
    }

    /// Shuffle is a transport-forwarded flag; local next/previous stay
    /// ordered so the next-then-previous round trip always holds.
    pub async fn set_shuffle(&self, on: bool) {
        self.inner.write().shuffle = on;
        if let Err(e) = self.transport.set_shuffle(on).await {
            warn!("transport shuffle failed: {}", e);
        }
        self.notify(StateChange::ShuffleChanged { on });
    }

    pub async fn set_repeat(&self, mode: RepeatMode) {
        self.inner.write().repeat = mode;
        if let Err(e) = self.transport.set_repeat(mode).await {
            warn!("transport repeat failed: {}", e);
        }
        self.notify(StateChange::RepeatChanged { mode });
    }

    /// Advance repeat mode off -> all -> one -> off
    #[allow(dead_code)]
    pub async fn cycle_repeat(&self) {
        let mode = self.repeat().next();
        self.set_repeat(mode).await;
    }

    /// Two-phase favorite update: flip the local flag, then persist.
    /// On a store failure the flip is rolled back and the error returned.
    pub async fn set_favorite(
        &self,
        store: &dyn UserDataStore,
        user_id: &str,
        liked: bool,
    ) -> Result<bool> {
        let track_id = {
            let mut inner = self.inner.write();
            let track = inner
                .current
                .as_ref()
                .ok_or_else(|| anyhow!("nothing is playing"))?;
            let id = track.id.clone();
            inner.favorite = liked;
            id
        };
        self.notify(StateChange::FavoriteChanged {
            track_id: track_id.clone(),
            favorite: liked,
        });

        match store.set_favorite(user_id, &track_id, liked).await {
            Ok(()) => Ok(liked),
            Err(e) => {
                {
                    let mut inner = self.inner.write();
                    // Only roll back if the same track is still current
                    if inner.current.as_ref().map(|t| t.id.as_str())
                        == Some(track_id.as_str())
                    {
                        inner.favorite = !liked;
                    }
                }
                self.notify(StateChange::FavoriteChanged {
                    track_id,
                    favorite: !liked,
                });
                warn!("favorite update failed, rolled back: {}", e);
                Err(e)
            }
        }
    }

    #[allow(dead_code)]
    pub async fn toggle_favorite(
        &self,
        store: &dyn UserDataStore,
        user_id: &str,
    ) -> Result<bool> {
        let liked = !self.favorite();
        self.set_favorite(store, user_id, liked).await
    }

    /// Advance the position clock while playing. Returns true when this
    /// tick reached the end of the track (caller then runs `track_ended`).
    pub fn tick_position(&self, elapsed_ms: u64) -> bool {
        let mut inner = self.inner.write();
        if !inner.playing || inner.current.is_none() {
            return false;
        }
        let new_pos = (inner.position_ms + elapsed_ms).min(inner.duration_ms);
        inner.position_ms = new_pos;
        inner.duration_ms > 0 && new_pos >= inner.duration_ms
    }
}

enum Direction {
    Forward,
    Backward,
}

// ============ Channel Types ============

/// Sender half for state change notifications
pub type StateChangeSender = tokio::sync::mpsc::UnboundedSender<StateChange>;

/// Receiver half held by each subscriber
pub type StateChangeReceiver = tokio::sync::mpsc::UnboundedReceiver<StateChange>;

/// Create a new state change channel
pub fn state_change_channel() -> (StateChangeSender, StateChangeReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::InMemoryUserStore;
    use async_trait::async_trait;

    fn track(id: &str, duration_ms: u64) -> Track {
        Track {
            id: id.to_string(),
            title: id.to_uppercase(),
            artists: vec!["Artist".to_string()],
            album: "Album".to_string(),
            artwork_url: String::new(),
            duration_ms,
            preview_url: None,
            uri: Some(format!("catalog:track:{}", id)),
        }
    }

    /// Transport double that records every forwarded call
    #[derive(Default)]
    struct RecordingTransport {
        calls: parking_lot::Mutex<Vec<String>>,
    }

    impl RecordingTransport {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn play(&self, queue: &[Track], index: usize) -> Result<()> {
            self.calls
                .lock()
                .push(format!("play:{}@{}", queue[index].id, index));
            Ok(())
        }
        async fn pause(&self) -> Result<()> {
            self.calls.lock().push("pause".to_string());
            Ok(())
        }
        async fn resume(&self) -> Result<()> {
            self.calls.lock().push("resume".to_string());
            Ok(())
        }
        async fn seek(&self, position_ms: u64) -> Result<()> {
            self.calls.lock().push(format!("seek:{}", position_ms));
            Ok(())
        }
        async fn set_volume(&self, volume: u8) -> Result<()> {
            self.calls.lock().push(format!("volume:{}", volume));
            Ok(())
        }
        async fn set_shuffle(&self, on: bool) -> Result<()> {
            self.calls.lock().push(format!("shuffle:{}", on));
            Ok(())
        }
        async fn set_repeat(&self, mode: RepeatMode) -> Result<()> {
            self.calls.lock().push(format!("repeat:{:?}", mode));
            Ok(())
        }
        async fn enqueue(&self, track: &Track) -> Result<()> {
            self.calls.lock().push(format!("enqueue:{}", track.id));
            Ok(())
        }
    }

    /// Transport double where every call fails
    struct FailingTransport;

    #[async_trait]
    impl Transport for FailingTransport {
        async fn play(&self, _queue: &[Track], _index: usize) -> Result<()> {
            Err(anyhow!("backend down"))
        }
        async fn pause(&self) -> Result<()> {
            Err(anyhow!("backend down"))
        }
        async fn resume(&self) -> Result<()> {
            Err(anyhow!("backend down"))
        }
        async fn seek(&self, _position_ms: u64) -> Result<()> {
            Err(anyhow!("backend down"))
        }
        async fn set_volume(&self, _volume: u8) -> Result<()> {
            Err(anyhow!("backend down"))
        }
        async fn set_shuffle(&self, _on: bool) -> Result<()> {
            Err(anyhow!("backend down"))
        }
        async fn set_repeat(&self, _mode: RepeatMode) -> Result<()> {
            Err(anyhow!("backend down"))
        }
        async fn enqueue(&self, _track: &Track) -> Result<()> {
            Err(anyhow!("backend down"))
        }
    }

    fn state_with_recorder() -> (PlaybackState, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        (PlaybackState::new(transport.clone()), transport)
    }

    fn drain(rx: &mut StateChangeReceiver) -> Vec<StateChange> {
        let mut events = Vec::new();
        while let Ok(change) = rx.try_recv() {
            events.push(change);
        }
        events
    }

    mod property_state_invariant {
        use super::*;

        #[tokio::test]
        async fn fresh_state_is_cleared() {
            let (state, _) = state_with_recorder();
            let snap = state.snapshot();
            assert!(snap.current.is_none());
            assert!(!snap.playing, "no current track means not playing");
            assert_eq!(snap.position_ms, 0, "no current track means position 0");
        }

        #[tokio::test]
        async fn play_track_sets_all_three() {
            let (state, _) = state_with_recorder();
            state.play_track(track("a", 1000)).await;
            let snap = state.snapshot();
            assert!(snap.current.is_some());
            assert!(snap.playing);
            assert_eq!(snap.duration_ms, 1000);
        }

        #[tokio::test]
        async fn stop_restores_cleared_state() {
            let (state, _) = state_with_recorder();
            state.play_track(track("a", 1000)).await;
            state.seek(500).await;
            state.stop().await;
            let snap = state.snapshot();
            assert!(snap.current.is_none());
            assert!(!snap.playing);
            assert_eq!(snap.position_ms, 0);
            assert!(!snap.favorite);
        }
    }

    mod property_null_track_no_ops {
        use super::*;

        #[tokio::test]
        async fn transport_ops_without_track_do_nothing() {
            let (state, transport) = state_with_recorder();
            state.pause().await;
            state.resume().await;
            state.toggle_play().await;
            state.seek(100).await;
            state.next().await;
            state.previous().await;
            state.track_ended().await;
            assert!(
                transport.calls().is_empty(),
                "nothing playing is a normal state, not an error: no calls expected"
            );
            assert!(state.snapshot().current.is_none());
        }

        #[tokio::test]
        async fn volume_works_without_track() {
            // Volume is global, not per-track
            let (state, transport) = state_with_recorder();
            state.set_volume(40).await;
            assert_eq!(state.volume(), 40);
            assert_eq!(transport.calls(), vec!["volume:40"]);
        }
    }

    mod property_traversal {
        use super::*;

        async fn abc_state_at(current: &str) -> (PlaybackState, Arc<RecordingTransport>) {
            let (state, transport) = state_with_recorder();
            let queue = vec![track("a", 100), track("b", 100), track("c", 100)];
            state.set_queue(queue.clone());
            let start = queue.iter().find(|t| t.id == current).unwrap().clone();
            state.play_track(start).await;
            (state, transport)
        }

        #[tokio::test]
        async fn next_advances_and_wraps() {
            let (state, _) = abc_state_at("b").await;
            state.next().await;
            assert_eq!(state.current_track().unwrap().id, "c");
            state.next().await;
            assert_eq!(
                state.current_track().unwrap().id,
                "a",
                "next from last wraps to first"
            );
        }

        #[tokio::test]
        async fn prev_wraps_backward() {
            let (state, _) = abc_state_at("a").await;
            state.previous().await;
            assert_eq!(state.current_track().unwrap().id, "c");
        }

        #[tokio::test]
        async fn next_then_prev_round_trips() {
            for start in ["a", "b", "c"] {
                let (state, _) = abc_state_at(start).await;
                state.next().await;
                state.previous().await;
                assert_eq!(
                    state.current_track().unwrap().id,
                    start,
                    "round trip must return to the starting track"
                );
            }
        }

        #[tokio::test]
        async fn single_element_queue_is_idempotent() {
            let (state, _) = state_with_recorder();
            state.set_queue(vec![track("only", 100)]);
            state.play_track(track("only", 100)).await;
            state.next().await;
            assert_eq!(state.current_track().unwrap().id, "only");
            state.previous().await;
            assert_eq!(state.current_track().unwrap().id, "only");
        }

        #[tokio::test]
        async fn current_outside_queue_is_no_op() {
            let (state, _) = state_with_recorder();
            state.set_queue(vec![track("a", 100), track("b", 100)]);
            state.play_track(track("elsewhere", 100)).await;
            state.next().await;
            assert_eq!(
                state.current_track().unwrap().id,
                "elsewhere",
                "traversal requires the current track to be in the queue"
            );
        }

        #[tokio::test]
        async fn removing_current_makes_traversal_no_op() {
            let (state, _) = abc_state_at("b").await;
            state.remove_from_queue("b");
            assert_eq!(state.queue_len(), 2);
            state.next().await;
            assert_eq!(state.current_track().unwrap().id, "b", "still playing b");
        }
    }

    mod property_clamping {
        use super::*;

        #[tokio::test]
        async fn volume_clamps_both_ends() {
            let (state, _) = state_with_recorder();
            state.set_volume(150).await;
            assert_eq!(state.volume(), 100);
            state.set_volume(-5).await;
            assert_eq!(state.volume(), 0);
        }

        #[tokio::test]
        async fn seek_clamps_to_duration() {
            let (state, _) = state_with_recorder();
            state.play_track(track("a", 3000)).await;
            state.seek(-10).await;
            assert_eq!(state.position_ms(), 0);
            state.seek(3000 + 1000).await;
            assert_eq!(state.position_ms(), 3000);
            state.seek(1500).await;
            assert_eq!(state.position_ms(), 1500);
        }
    }

    mod property_repeat {
        use super::*;

        #[tokio::test]
        async fn repeat_one_replays_on_ended() {
            let (state, transport) = state_with_recorder();
            state.set_queue(vec![track("a", 100), track("b", 100)]);
            state.play_track(track("a", 100)).await;
            state.set_repeat(RepeatMode::One).await;
            state.track_ended().await;
            assert_eq!(state.current_track().unwrap().id, "a");
            let plays: Vec<_> = transport
                .calls()
                .into_iter()
                .filter(|c| c.starts_with("play:"))
                .collect();
            assert_eq!(plays.len(), 2, "replay goes back through the transport");
        }

        #[tokio::test]
        async fn manual_skip_overrides_repeat_one() {
            let (state, _) = state_with_recorder();
            state.set_queue(vec![track("a", 100), track("b", 100)]);
            state.play_track(track("a", 100)).await;
            state.set_repeat(RepeatMode::One).await;
            state.next().await;
            assert_eq!(
                state.current_track().unwrap().id,
                "b",
                "explicit skips advance even in repeat-one"
            );
        }

        #[tokio::test]
        async fn cycle_advances_off_all_one() {
            let (state, _) = state_with_recorder();
            assert_eq!(state.repeat(), RepeatMode::Off);
            state.cycle_repeat().await;
            assert_eq!(state.repeat(), RepeatMode::All);
            state.cycle_repeat().await;
            assert_eq!(state.repeat(), RepeatMode::One);
            state.cycle_repeat().await;
            assert_eq!(state.repeat(), RepeatMode::Off);
        }
    }

    mod property_two_phase_favorite {
        use super::*;

        #[tokio::test]
        async fn favorite_persists_on_success() {
            let (state, _) = state_with_recorder();
            let store = InMemoryUserStore::new();
            state.play_track(track("t1", 100)).await;
            let liked = state.set_favorite(&store, "user", true).await.unwrap();
            assert!(liked);
            assert!(state.favorite());
            assert!(store.is_favorite("user", "t1"), "store holds the like");
        }

        #[tokio::test]
        async fn favorite_rolls_back_on_store_failure() {
            let (state, _) = state_with_recorder();
            let store = InMemoryUserStore::new();
            state.play_track(track("t1", 100)).await;
            let mut rx = state.subscribe();
            store.set_fail_writes(true);
            let result = state.set_favorite(&store, "user", true).await;
            assert!(result.is_err());
            assert!(!state.favorite(), "optimistic flip rolled back");

            let events = drain(&mut rx);
            let flips: Vec<bool> = events
                .iter()
                .filter_map(|e| match e {
                    StateChange::FavoriteChanged { favorite, .. } => Some(*favorite),
                    _ => None,
                })
                .collect();
            assert_eq!(
                flips,
                vec![true, false],
                "subscribers see the flip and the rollback"
            );
        }

        #[tokio::test]
        async fn favorite_without_track_errors() {
            let (state, _) = state_with_recorder();
            let store = InMemoryUserStore::new();
            assert!(state.set_favorite(&store, "user", true).await.is_err());
        }

        #[tokio::test]
        async fn new_track_resets_favorite_flag() {
            let (state, _) = state_with_recorder();
            let store = InMemoryUserStore::new();
            state.play_track(track("t1", 100)).await;
            state.set_favorite(&store, "user", true).await.unwrap();
            state.play_track(track("t2", 100)).await;
            assert!(!state.favorite(), "favorite is per current track");
        }

        #[tokio::test]
        async fn toggle_flips_both_ways() {
            let (state, _) = state_with_recorder();
            let store = InMemoryUserStore::new();
            state.play_track(track("t1", 100)).await;
            assert!(state.toggle_favorite(&store, "user").await.unwrap());
            assert!(store.is_favorite("user", "t1"));
            assert!(!state.toggle_favorite(&store, "user").await.unwrap());
            assert!(!store.is_favorite("user", "t1"));
        }
    }

    mod property_queue_mutation {
        use super::*;

        #[tokio::test]
        async fn set_queue_leaves_current_and_playing() {
            let (state, _) = state_with_recorder();
            state.play_track(track("a", 100)).await;
            state.set_queue(vec![track("x", 100), track("y", 100)]);
            let snap = state.snapshot();
            assert_eq!(snap.current.unwrap().id, "a");
            assert!(snap.playing);
            assert_eq!(snap.queue_len, 2);
        }

        #[tokio::test]
        async fn enqueue_appends_and_forwards() {
            let (state, transport) = state_with_recorder();
            state.set_queue(vec![track("a", 100)]);
            state.enqueue(track("b", 100)).await;
            assert_eq!(state.queue_len(), 2);
            assert!(transport.calls().contains(&"enqueue:b".to_string()));
        }
    }

    mod property_notifications {
        use super::*;

        #[tokio::test]
        async fn subscribers_see_mutations_in_order() {
            let (state, _) = state_with_recorder();
            let mut rx = state.subscribe();
            state.play_track(track("a", 100)).await;
            state.pause().await;
            state.resume().await;
            state.set_volume(30).await;

            let events = drain(&mut rx);
            assert!(matches!(events[0], StateChange::TrackStarted { .. }));
            assert!(matches!(events[1], StateChange::Paused));
            assert!(matches!(events[2], StateChange::Resumed));
            assert!(matches!(events[3], StateChange::VolumeChanged { volume: 30 }));
        }

        #[tokio::test]
        async fn no_notification_for_no_ops() {
            let (state, _) = state_with_recorder();
            let mut rx = state.subscribe();
            state.pause().await;
            state.next().await;
            assert!(drain(&mut rx).is_empty(), "silent no-ops stay silent");
        }
    }

    mod property_transport_failures {
        use super::*;

        #[tokio::test]
        async fn failed_backend_never_blocks_state() {
            let state = PlaybackState::new(Arc::new(FailingTransport));
            state.play_track(track("a", 100)).await;
            assert!(state.is_playing(), "state stays authoritative");
            state.pause().await;
            assert!(!state.is_playing());
            state.set_volume(10).await;
            assert_eq!(state.volume(), 10);
        }
    }

    mod property_position_clock {
        use super::*;

        #[tokio::test]
        async fn tick_advances_and_signals_end() {
            let (state, _) = state_with_recorder();
            state.play_track(track("a", 1000)).await;
            assert!(!state.tick_position(400));
            assert_eq!(state.position_ms(), 400);
            assert!(state.tick_position(900), "reaching the end signals it");
            assert_eq!(state.position_ms(), 1000, "position clamps at duration");
        }

        #[tokio::test]
        async fn tick_ignores_paused_state() {
            let (state, _) = state_with_recorder();
            state.play_track(track("a", 1000)).await;
            state.pause().await;
            assert!(!state.tick_position(500));
            assert_eq!(state.position_ms(), 0, "clock frozen while paused");
        }
    }
}

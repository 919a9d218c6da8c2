//! Intent execution
//!
//! One case per intent tag. Each case performs its side effect against the
//! player or a collaborator and produces a user-facing message. Failures of
//! any kind become a failure-flagged result with a targeted message; this
//! layer never returns an error and never panics on input.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::api::{CatalogSearch, SEARCH_LIMIT, Track, UserDataStore};
use crate::features::RepeatMode;
use crate::player::PlaybackState;

use super::intent::{Intent, IntentKind};

/// Outcome of executing one intent
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub success: bool,
    pub message: String,
    /// Track relevant to the outcome, e.g. the one that started playing
    pub payload: Option<Track>,
}

impl ExecutionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            payload: None,
        }
    }

    pub fn ok_with(message: impl Into<String>, track: Track) -> Self {
        Self {
            success: true,
            message: message.into(),
            payload: Some(track),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            payload: None,
        }
    }
}

/// Executes classified intents against the player and the collaborators.
/// Holds no state between calls.
pub struct IntentExecutor {
    player: PlaybackState,
    catalog: Arc<dyn CatalogSearch>,
    store: Arc<dyn UserDataStore>,
    user_id: String,
}

impl IntentExecutor {
    pub fn new(
        player: PlaybackState,
        catalog: Arc<dyn CatalogSearch>,
        store: Arc<dyn UserDataStore>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            player,
            catalog,
            store,
            user_id: user_id.into(),
        }
    }

    pub async fn execute(&self, intent: &Intent) -> ExecutionResult {
        debug!("executing intent {}", intent.kind);
        match intent.kind {
            IntentKind::PlaySong => self.play_song(intent.slot("song")).await,
            IntentKind::Pause => {
                self.player.pause().await;
                ExecutionResult::ok("Paused")
            }
            IntentKind::Resume => {
                self.player.resume().await;
                ExecutionResult::ok("Resuming playback")
            }
            IntentKind::SkipNext => {
                self.player.next().await;
                ExecutionResult::ok("Skipping to the next track")
            }
            IntentKind::SkipPrev => {
                self.player.previous().await;
                ExecutionResult::ok("Going back to the previous track")
            }
            IntentKind::AddToPlaylist => {
                self.add_to_playlist(intent.slot("song"), intent.slot("playlist"))
                    .await
            }
            IntentKind::CreatePlaylist => self.create_playlist(intent.slot("name")).await,
            IntentKind::Search => self.search(intent.slot("query")).await,
            IntentKind::GetCurrent => self.get_current(),
            IntentKind::LikeSong => self.set_favorite(true).await,
            IntentKind::UnlikeSong => self.set_favorite(false).await,
            IntentKind::ShuffleOn => {
                self.player.set_shuffle(true).await;
                ExecutionResult::ok("Shuffle on")
            }
            IntentKind::ShuffleOff => {
                self.player.set_shuffle(false).await;
                ExecutionResult::ok("Shuffle off")
            }
            IntentKind::RepeatOne => {
                self.player.set_repeat(RepeatMode::One).await;
                ExecutionResult::ok("Repeating the current track")
            }
            IntentKind::RepeatAll => {
                self.player.set_repeat(RepeatMode::All).await;
                ExecutionResult::ok("Repeating all tracks")
            }
            IntentKind::Unknown => {
                ExecutionResult::fail("Sorry, I didn't understand that command")
            }
        }
    }

    /// Search the catalog, queue the result set and start the best match
    async fn play_song(&self, song: &str) -> ExecutionResult {
        if song.is_empty() {
            return ExecutionResult::fail("Please tell me which song to play");
        }
        let results = match self.catalog.search_tracks(song, SEARCH_LIMIT).await {
            Ok(results) => results,
            Err(e) => {
                warn!("catalog search failed: {}", e);
                return ExecutionResult::fail("Search failed, please try again");
            }
        };
        let Some(track) = results.first().cloned() else {
            return ExecutionResult::fail(format!("Could not find song \"{}\"", song));
        };
        // The result set becomes the queue; "next" walks the remaining matches
        self.player.set_queue(results);
        self.player.play_track(track.clone()).await;
        let message = format!("Now playing {} by {}", track.title, track.artist_line());
        ExecutionResult::ok_with(message, track)
    }

    /// Find the song, find or create the playlist, then link them.
    /// Each step fails with its own message and short-circuits the rest.
    async fn add_to_playlist(&self, song: &str, playlist: &str) -> ExecutionResult {
        if song.is_empty() {
            return ExecutionResult::fail("Please tell me which song to add");
        }
        if playlist.is_empty() {
            return ExecutionResult::fail("Please tell me which playlist to use");
        }

        let stored = match self.store.find_song_by_title(song).await {
            Ok(Some(stored)) => stored,
            Ok(None) => {
                return ExecutionResult::fail(format!("Could not find song \"{}\"", song));
            }
            Err(e) => {
                warn!("song lookup failed: {}", e);
                return ExecutionResult::fail("Song lookup failed, please try again");
            }
        };

        let target = match self
            .store
            .find_playlist_by_name(&self.user_id, playlist)
            .await
        {
            Ok(Some(existing)) => existing,
            Ok(None) => {
                // No match: create a new private playlist under the spoken name
                match self.store.create_playlist(&self.user_id, playlist, false).await {
                    Ok(created) => created,
                    Err(e) => {
                        warn!("playlist creation failed: {}", e);
                        return ExecutionResult::fail("Could not create the playlist");
                    }
                }
            }
            Err(e) => {
                warn!("playlist lookup failed: {}", e);
                return ExecutionResult::fail("Playlist lookup failed, please try again");
            }
        };

        if let Err(e) = self.store.add_song_to_playlist(&target.id, &stored.id).await {
            warn!("adding song to playlist failed: {}", e);
            return ExecutionResult::fail("Could not add the song to the playlist");
        }
        ExecutionResult::ok(format!("Added \"{}\" to \"{}\"", stored.title, target.name))
    }

    async fn create_playlist(&self, name: &str) -> ExecutionResult {
        let name = if name.is_empty() { "New Playlist" } else { name };
        match self.store.create_playlist(&self.user_id, name, false).await {
            Ok(created) => {
                ExecutionResult::ok(format!("Created new playlist \"{}\"", created.name))
            }
            Err(e) => {
                warn!("playlist creation failed: {}", e);
                ExecutionResult::fail("Could not create the playlist")
            }
        }
    }

    async fn search(&self, query: &str) -> ExecutionResult {
        if query.is_empty() {
            return ExecutionResult::fail("What should I search for?");
        }
        match self.catalog.search_tracks(query, SEARCH_LIMIT).await {
            Ok(results) if results.is_empty() => {
                ExecutionResult::fail(format!("No results found for \"{}\"", query))
            }
            Ok(results) => ExecutionResult::ok(format!(
                "Found {} results for \"{}\"",
                results.len(),
                query
            )),
            Err(e) => {
                warn!("catalog search failed: {}", e);
                ExecutionResult::fail("Search failed, please try again")
            }
        }
    }

    fn get_current(&self) -> ExecutionResult {
        match self.player.current_track() {
            Some(track) => {
                let message =
                    format!("Currently playing {} by {}", track.title, track.artist_line());
                ExecutionResult::ok_with(message, track)
            }
            // An idle player is a valid answer to "what's playing", not a failure
            None => ExecutionResult::ok("Nothing is playing right now"),
        }
    }

    async fn set_favorite(&self, liked: bool) -> ExecutionResult {
        let track = match self.player.current_track() {
            Some(track) => track,
            None => return ExecutionResult::fail("Nothing is playing right now"),
        };
        match self
            .player
            .set_favorite(self.store.as_ref(), &self.user_id, liked)
            .await
        {
            Ok(_) if liked => {
                ExecutionResult::ok(format!("Added {} to your Liked Songs", track.title))
            }
            Ok(_) => {
                ExecutionResult::ok(format!("Removed {} from your Liked Songs", track.title))
            }
            Err(e) => {
                warn!("favorite update failed: {}", e);
                ExecutionResult::fail("Could not update your Liked Songs")
            }
        }
    }
}

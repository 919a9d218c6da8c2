//! User data store collaborator
//!
//! Persists profiles, playlists, and likes. The trait is the seam the
//! intent executor works against; `InMemoryUserStore` backs tests and
//! offline/demo runs.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A song row in the user's library
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StoredSong {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_ms: u64,
    pub cover_url: String,
    pub audio_url: String,
}

/// A playlist row owned by a user
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StoredPlaylist {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub is_public: bool,
}

/// User profile row
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub avatar_url: String,
}

/// Store operations the voice executor and favorite toggle depend on
#[async_trait]
pub trait UserDataStore: Send + Sync {
    /// Case-insensitive partial match on song title; first hit wins
    async fn find_song_by_title(&self, pattern: &str) -> Result<Option<StoredSong>>;

    /// Case-insensitive partial match on the user's playlist names
    async fn find_playlist_by_name(
        &self,
        user_id: &str,
        pattern: &str,
    ) -> Result<Option<StoredPlaylist>>;

    async fn create_playlist(
        &self,
        user_id: &str,
        name: &str,
        is_public: bool,
    ) -> Result<StoredPlaylist>;

    async fn add_song_to_playlist(&self, playlist_id: &str, song_id: &str) -> Result<()>;

    /// Record or clear a liked track for the user
    async fn set_favorite(&self, user_id: &str, track_id: &str, liked: bool) -> Result<()>;

    async fn upsert_profile(&self, profile: Profile) -> Result<()>;
}

#[derive(Debug, Default)]
struct StoreInner {
    songs: Vec<StoredSong>,
    playlists: Vec<StoredPlaylist>,
    /// (playlist_id, song_id, position)
    playlist_songs: Vec<(String, String, u64)>,
    favorites: HashSet<(String, String)>,
    profiles: Vec<Profile>,
}

/// In-memory user data store
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserStore {
    inner: Arc<RwLock<StoreInner>>,
    next_id: Arc<AtomicU64>,
    /// When set, every call fails; exercises collaborator-failure paths
    fail_writes: Arc<RwLock<bool>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the library with songs
    #[allow(dead_code)]
    pub fn with_songs(songs: Vec<StoredSong>) -> Self {
        let store = Self::new();
        store.inner.write().songs = songs;
        store
    }

    pub fn add_song(&self, song: StoredSong) {
        self.inner.write().songs.push(song);
    }

    /// Make subsequent calls fail (collaborator-outage simulation)
    #[allow(dead_code)]
    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.write() = fail;
    }

    #[allow(dead_code)]
    pub fn is_favorite(&self, user_id: &str, track_id: &str) -> bool {
        self.inner
            .read()
            .favorites
            .contains(&(user_id.to_string(), track_id.to_string()))
    }

    #[allow(dead_code)]
    pub fn playlist_len(&self, playlist_id: &str) -> usize {
        self.inner
            .read()
            .playlist_songs
            .iter()
            .filter(|(pid, _, _)| pid == playlist_id)
            .count()
    }

    fn check_available(&self) -> Result<()> {
        if *self.fail_writes.read() {
            return Err(anyhow!("user data store unavailable"));
        }
        Ok(())
    }

    fn fresh_id(&self, prefix: &str) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", prefix, n)
    }
}

#[async_trait]
impl UserDataStore for InMemoryUserStore {
    async fn find_song_by_title(&self, pattern: &str) -> Result<Option<StoredSong>> {
        self.check_available()?;
        let needle = pattern.to_lowercase();
        let inner = self.inner.read();
        Ok(inner
            .songs
            .iter()
            .find(|s| s.title.to_lowercase().contains(&needle))
            .cloned())
    }

    async fn find_playlist_by_name(
        &self,
        user_id: &str,
        pattern: &str,
    ) -> Result<Option<StoredPlaylist>> {
        self.check_available()?;
        let needle = pattern.to_lowercase();
        let inner = self.inner.read();
        Ok(inner
            .playlists
            .iter()
            .find(|p| p.user_id == user_id && p.name.to_lowercase().contains(&needle))
            .cloned())
    }

    async fn create_playlist(
        &self,
        user_id: &str,
        name: &str,
        is_public: bool,
    ) -> Result<StoredPlaylist> {
        self.check_available()?;
        let playlist = StoredPlaylist {
            id: self.fresh_id("pl"),
            user_id: user_id.to_string(),
            name: name.to_string(),
            is_public,
        };
        self.inner.write().playlists.push(playlist.clone());
        Ok(playlist)
    }

    async fn add_song_to_playlist(&self, playlist_id: &str, song_id: &str) -> Result<()> {
        self.check_available()?;
        let mut inner = self.inner.write();
        let position = inner
            .playlist_songs
            .iter()
            .filter(|(pid, _, _)| pid == playlist_id)
            .count() as u64;
        inner
            .playlist_songs
            .push((playlist_id.to_string(), song_id.to_string(), position));
        Ok(())
    }

    async fn set_favorite(&self, user_id: &str, track_id: &str, liked: bool) -> Result<()> {
        self.check_available()?;
        let key = (user_id.to_string(), track_id.to_string());
        let mut inner = self.inner.write();
        if liked {
            inner.favorites.insert(key);
        } else {
            inner.favorites.remove(&key);
        }
        Ok(())
    }

    async fn upsert_profile(&self, profile: Profile) -> Result<()> {
        self.check_available()?;
        let mut inner = self.inner.write();
        match inner.profiles.iter_mut().find(|p| p.id == profile.id) {
            Some(existing) => *existing = profile,
            None => inner.profiles.push(profile),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_song(id: &str, title: &str) -> StoredSong {
        StoredSong {
            id: id.to_string(),
            title: title.to_string(),
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            duration_ms: 200_000,
            cover_url: String::new(),
            audio_url: String::new(),
        }
    }

    #[tokio::test]
    async fn test_find_song_partial_case_insensitive() {
        let store = InMemoryUserStore::with_songs(vec![
            sample_song("s1", "Shape of You"),
            sample_song("s2", "Perfect"),
        ]);
        let found = store.find_song_by_title("shape").await.unwrap();
        assert_eq!(found.unwrap().id, "s1");
        let found = store.find_song_by_title("PERF").await.unwrap();
        assert_eq!(found.unwrap().id, "s2");
        let missing = store.find_song_by_title("nonexistent-xyz").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_playlist_match_scoped_to_user() {
        let store = InMemoryUserStore::new();
        store
            .create_playlist("alice", "Road Trip", false)
            .await
            .unwrap();
        let hit = store.find_playlist_by_name("alice", "road").await.unwrap();
        assert!(hit.is_some(), "owner sees a partial name match");
        let miss = store.find_playlist_by_name("bob", "road").await.unwrap();
        assert!(miss.is_none(), "other users' playlists never match");
    }

    #[tokio::test]
    async fn test_add_song_positions_append() {
        let store = InMemoryUserStore::new();
        let playlist = store.create_playlist("u", "Mix", false).await.unwrap();
        store.add_song_to_playlist(&playlist.id, "s1").await.unwrap();
        store.add_song_to_playlist(&playlist.id, "s2").await.unwrap();
        assert_eq!(store.playlist_len(&playlist.id), 2);
    }

    #[tokio::test]
    async fn test_favorites_toggle() {
        let store = InMemoryUserStore::new();
        store.set_favorite("u", "t1", true).await.unwrap();
        assert!(store.is_favorite("u", "t1"));
        store.set_favorite("u", "t1", false).await.unwrap();
        assert!(!store.is_favorite("u", "t1"));
    }

    #[tokio::test]
    async fn test_failure_mode() {
        let store = InMemoryUserStore::new();
        store.set_fail_writes(true);
        let err = store.find_song_by_title("x").await;
        assert!(err.is_err(), "outage mode fails every call");
    }

    #[tokio::test]
    async fn test_upsert_profile_replaces() {
        let store = InMemoryUserStore::new();
        store
            .upsert_profile(Profile {
                id: "u".to_string(),
                username: "old".to_string(),
                avatar_url: String::new(),
            })
            .await
            .unwrap();
        store
            .upsert_profile(Profile {
                id: "u".to_string(),
                username: "new".to_string(),
                avatar_url: String::new(),
            })
            .await
            .unwrap();
        let inner = store.inner.read();
        assert_eq!(inner.profiles.len(), 1, "same id overwrites, not duplicates");
        assert_eq!(inner.profiles[0].username, "new");
    }
}

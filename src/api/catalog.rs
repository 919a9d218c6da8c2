//! Media catalog API client
//!
//! Core HTTP client for the music catalog: client-credentials auth,
//! search/browse endpoints, and the remote playback transport proxy.

pub mod model;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use reqwest::{Client, StatusCode, header};
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub use model::*;

pub static API_BASE: &str = "https://api.spotify.com/v1";
pub static TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

const TIMEOUT: u64 = 30;

/// Refresh the bearer token this long before it actually expires
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

/// Search result cap shared with the voice executor
pub const SEARCH_LIMIT: u16 = 10;

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Catalog API client with cached client-credentials token
#[derive(Clone)]
pub struct CatalogClient {
    client: Client,
    client_id: String,
    client_secret: String,
    api_base: String,
    token_url: String,
    token: Arc<RwLock<Option<CachedToken>>>,
}

impl fmt::Debug for CatalogClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogClient")
            .field("client", &"<HttpClient>")
            .field("client_id", &self.client_id)
            .field("api_base", &self.api_base)
            .finish()
    }
}

enum Method {
    Get,
    Post,
    Put,
}

impl CatalogClient {
    #[allow(dead_code)]
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self::with_base_urls(client_id, client_secret, API_BASE, TOKEN_URL)
    }

    /// Construct against alternate endpoints (tests, self-hosted proxies)
    pub fn with_base_urls(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        api_base: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT))
            .build()
            .expect("failed to build http client");
        Self {
            client,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            api_base: api_base.into(),
            token_url: token_url.into(),
            token: Arc::new(RwLock::new(None)),
        }
    }

    /// Get a valid bearer token, refreshing through the client-credentials
    /// flow when the cached one is missing or about to expire.
    async fn access_token(&self) -> Result<String> {
        if let Some(token) = self.token.read().as_ref() {
            if token.is_fresh(Utc::now()) {
                return Ok(token.value.clone());
            }
        }
        self.refresh_token().await
    }

    async fn refresh_token(&self) -> Result<String> {
        debug!("refreshing catalog access token");
        let basic = general_purpose::STANDARD
            .encode(format!("{}:{}", self.client_id, self.client_secret));
        let response = self
            .client
            .post(&self.token_url)
            .header(header::AUTHORIZATION, format!("Basic {}", basic))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await
            .map_err(|e| anyhow!("Token request failed: {}", e))?;
        if !response.status().is_success() {
            return Err(anyhow!("Token request failed: {}", response.status()));
        }
        let text = response
            .text()
            .await
            .map_err(|e| anyhow!("Failed to read token response: {}", e))?;
        let info = to_token_info(text)?;
        let expires_at =
            Utc::now() + chrono::Duration::seconds(info.expires_in - TOKEN_EXPIRY_MARGIN_SECS);
        *self.token.write() = Some(CachedToken {
            value: info.access_token.clone(),
            expires_at,
        });
        Ok(info.access_token)
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<String> {
        let token = self.access_token().await?;
        let url = format!("{}{}", self.api_base, path);
        debug!("catalog request: {}", path);

        let mut builder = match method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
        };
        builder = builder
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::ACCEPT, "application/json");
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| anyhow!("Request failed: {}", e))?;
        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(String::new());
        }
        if !status.is_success() {
            warn!("catalog request {} returned {}", path, status);
            return Err(anyhow!("Catalog request failed: {} ({})", path, status));
        }
        response
            .text()
            .await
            .map_err(|e| anyhow!("Failed to read response: {}", e))
    }

    // ============ Search & Browse ============

    pub async fn search_tracks(&self, query: &str, limit: u16) -> Result<Vec<Track>> {
        let limit = limit.to_string();
        let result = self
            .request(
                Method::Get,
                "/search",
                &[("q", query), ("type", "track"), ("limit", &limit)],
                None,
            )
            .await?;
        to_track_list(result, Parse::Search)
    }

    pub async fn album(&self, id: &str) -> Result<Album> {
        let path = format!("/albums/{}", id);
        let result = self.request(Method::Get, &path, &[], None).await?;
        to_album(result)
    }

    pub async fn playlist_detail(&self, id: &str) -> Result<PlaylistDetail> {
        let path = format!("/playlists/{}", id);
        let result = self.request(Method::Get, &path, &[], None).await?;
        to_playlist_detail(result)
    }

    pub async fn user_playlists(&self) -> Result<Vec<PlaylistSummary>> {
        let result = self
            .request(Method::Get, "/me/playlists", &[("limit", "50")], None)
            .await?;
        to_playlist_list(result)
    }

    pub async fn featured_playlists(&self) -> Result<Vec<PlaylistSummary>> {
        let result = self
            .request(Method::Get, "/browse/featured-playlists", &[], None)
            .await?;
        to_playlist_list(result)
    }

    pub async fn new_releases(&self) -> Result<Vec<AlbumSummary>> {
        let result = self
            .request(
                Method::Get,
                "/browse/new-releases",
                &[("limit", "20")],
                None,
            )
            .await?;
        to_new_releases(result)
    }

    pub async fn recommendations(&self, seed_ids: &[String]) -> Result<Vec<Track>> {
        let seeds = seed_ids.join(",");
        let result = self
            .request(
                Method::Get,
                "/recommendations",
                &[("seed_tracks", &seeds), ("limit", "20")],
                None,
            )
            .await?;
        to_track_list(result, Parse::Recommend)
    }

    pub async fn recently_played(&self) -> Result<Vec<Track>> {
        let result = self
            .request(
                Method::Get,
                "/me/player/recently-played",
                &[("limit", "20")],
                None,
            )
            .await?;
        to_track_list(result, Parse::Recent)
    }

    // ============ Playback Transport Proxy ============

    pub async fn play_tracks(
        &self,
        device_id: &str,
        uris: &[String],
        offset: usize,
    ) -> Result<()> {
        let body = json!({
            "uris": uris,
            "offset": { "position": offset },
        });
        self.request(
            Method::Put,
            "/me/player/play",
            &[("device_id", device_id)],
            Some(body),
        )
        .await?;
        Ok(())
    }

    pub async fn pause_playback(&self, device_id: &str) -> Result<()> {
        self.request(
            Method::Put,
            "/me/player/pause",
            &[("device_id", device_id)],
            None,
        )
        .await?;
        Ok(())
    }

    pub async fn resume_playback(&self, device_id: &str) -> Result<()> {
        self.request(
            Method::Put,
            "/me/player/play",
            &[("device_id", device_id)],
            None,
        )
        .await?;
        Ok(())
    }

    pub async fn seek_playback(&self, device_id: &str, position_ms: u64) -> Result<()> {
        let position = position_ms.to_string();
        self.request(
            Method::Put,
            "/me/player/seek",
            &[("position_ms", position.as_str()), ("device_id", device_id)],
            None,
        )
        .await?;
        Ok(())
    }

    pub async fn set_playback_volume(&self, device_id: &str, percent: u8) -> Result<()> {
        let percent = percent.to_string();
        self.request(
            Method::Put,
            "/me/player/volume",
            &[
                ("volume_percent", percent.as_str()),
                ("device_id", device_id),
            ],
            None,
        )
        .await?;
        Ok(())
    }

    pub async fn set_shuffle(&self, device_id: &str, state: bool) -> Result<()> {
        let state = state.to_string();
        self.request(
            Method::Put,
            "/me/player/shuffle",
            &[("state", state.as_str()), ("device_id", device_id)],
            None,
        )
        .await?;
        Ok(())
    }

    /// Repeat state uses the provider's wire values: "off", "context", "track"
    pub async fn set_repeat(&self, device_id: &str, state: &str) -> Result<()> {
        self.request(
            Method::Put,
            "/me/player/repeat",
            &[("state", state), ("device_id", device_id)],
            None,
        )
        .await?;
        Ok(())
    }

    pub async fn enqueue(&self, device_id: &str, uri: &str) -> Result<()> {
        self.request(
            Method::Post,
            "/me/player/queue",
            &[("uri", uri), ("device_id", device_id)],
            None,
        )
        .await?;
        Ok(())
    }
}

/// Track search seam consumed by the voice executor; lets tests run
/// against an in-memory catalog instead of the network
#[async_trait]
pub trait CatalogSearch: Send + Sync {
    async fn search_tracks(&self, query: &str, limit: u16) -> Result<Vec<Track>>;
}

#[async_trait]
impl CatalogSearch for CatalogClient {
    async fn search_tracks(&self, query: &str, limit: u16) -> Result<Vec<Track>> {
        CatalogClient::search_tracks(self, query, limit).await
    }
}

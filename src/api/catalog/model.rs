//! Catalog API model types
//!
//! Data structures parsed from catalog API responses.

use anyhow::{Context, Ok, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;

trait DeVal<'a>: Sized {
    fn dval(v: &'a Value) -> Result<Self>;
}

impl<'a> DeVal<'a> for bool {
    fn dval(v: &Value) -> Result<Self> {
        Ok(Self::deserialize(v)?)
    }
}

impl<'a> DeVal<'a> for i64 {
    fn dval(v: &Value) -> Result<Self> {
        Ok(Self::deserialize(v)?)
    }
}

impl<'a> DeVal<'a> for u64 {
    fn dval(v: &Value) -> Result<Self> {
        Ok(Self::deserialize(v)?)
    }
}

impl<'a> DeVal<'a> for u32 {
    fn dval(v: &Value) -> Result<Self> {
        Ok(Self::deserialize(v)?)
    }
}

impl<'a> DeVal<'a> for String {
    fn dval(v: &Value) -> Result<Self> {
        Ok(Self::deserialize(v)?)
    }
}

impl<'a> DeVal<'a> for &'a Vec<Value> {
    fn dval(v: &'a Value) -> Result<Self> {
        match v {
            Value::Array(v) => Ok(v),
            _ => Err(anyhow!("json not a array")),
        }
    }
}

impl<'a> DeVal<'a> for &'a Value {
    fn dval(v: &'a Value) -> Result<Self> {
        Ok(v)
    }
}

fn get_val_chain<'a, T>(v: &'a Value, names: &[&str]) -> Result<T>
where
    T: DeVal<'a>,
{
    let v = names.iter().fold(std::result::Result::Ok(v), |v, n| {
        v?.get(n)
            .ok_or_else(|| anyhow!("key '{}' not found, in chain {:?}", n, names))
    })?;
    Ok(T::dval(v)?)
}

macro_rules! get_val {
    (@as $t:ty, $v:expr, $($n:expr),+) => {
        get_val_chain::<$t>($v, &[$($n),+]).context(format!("at {}:{}", file!(), line!()))
    };
    ($v:expr, $($n:expr),+) => {
        get_val_chain($v, &[$($n),+]).context(format!("at {}:{}", file!(), line!()))
    };
}

/// A single playable track from the catalog
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    /// Artist names in credit order
    pub artists: Vec<String>,
    pub album: String,
    pub artwork_url: String,
    pub duration_ms: u64,
    /// Short preview clip, when the catalog provides one
    pub preview_url: Option<String>,
    /// Provider URI used by the remote transport proxy
    pub uri: Option<String>,
}

impl Track {
    /// Artist credit as a single display line
    pub fn artist_line(&self) -> String {
        if self.artists.is_empty() {
            "Unknown Artist".to_string()
        } else {
            self.artists.join(", ")
        }
    }
}

/// Album with its track listing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Album {
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
    pub artwork_url: String,
    pub tracks: Vec<Track>,
}

/// Album summary without tracks (new releases listing)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlbumSummary {
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
    pub artwork_url: String,
}

/// Playlist summary without tracks
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaylistSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub artwork_url: String,
    pub track_count: u64,
}

/// Playlist with its track listing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaylistDetail {
    pub id: String,
    pub name: String,
    pub description: String,
    pub artwork_url: String,
    pub tracks: Vec<Track>,
}

/// Bearer token returned by the client-credentials flow
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenInfo {
    pub access_token: String,
    pub expires_in: i64,
}

/// Source shape selector shared by the track-list parsers
pub enum Parse {
    /// Search response: tracks nested under "tracks"."items"
    Search,
    /// Recommendations: bare "tracks" array
    Recommend,
    /// Recently played: "items" array of { "track": ... } wrappers
    Recent,
}

fn artist_names(v: &Value) -> Vec<String> {
    let list = vec![];
    let array: &Vec<Value> = get_val!(v, "artists").unwrap_or(&list);
    array
        .iter()
        .filter_map(|a| get_val!(@as String, a, "name").ok())
        .collect()
}

fn first_image_url(v: &Value) -> String {
    get_val!(@as &Vec<Value>, v, "images")
        .ok()
        .and_then(|imgs| imgs.first())
        .and_then(|img| get_val!(@as String, img, "url").ok())
        .unwrap_or_default()
}

fn opt_string(v: &Value, name: &str) -> Option<String> {
    match get_val!(@as String, v, name) {
        std::result::Result::Ok(s) if !s.is_empty() => Some(s),
        _ => None,
    }
}

fn parse_track(v: &Value) -> Result<Track> {
    let unk = "Unknown Album".to_string();
    Ok(Track {
        id: get_val!(v, "id")?,
        title: get_val!(v, "name")?,
        artists: artist_names(v),
        album: get_val!(v, "album", "name").unwrap_or_else(|_| unk.clone()),
        artwork_url: get_val!(@as &Value, v, "album")
            .map(first_image_url)
            .unwrap_or_default(),
        duration_ms: get_val!(v, "duration_ms").unwrap_or_default(),
        preview_url: opt_string(v, "preview_url"),
        uri: opt_string(v, "uri"),
    })
}

pub fn to_track_list(json: String, parse: Parse) -> Result<Vec<Track>> {
    let value = &serde_json::from_str::<Value>(&json)?;
    let mut vec: Vec<Track> = Vec::new();
    match parse {
        Parse::Search => {
            let array: &Vec<Value> = get_val!(value, "tracks", "items")?;
            for v in array.iter() {
                vec.push(parse_track(v)?);
            }
        }
        Parse::Recommend => {
            let array: &Vec<Value> = get_val!(value, "tracks")?;
            for v in array.iter() {
                vec.push(parse_track(v)?);
            }
        }
        Parse::Recent => {
            let array: &Vec<Value> = get_val!(value, "items")?;
            for v in array.iter() {
                let track: &Value = get_val!(v, "track")?;
                vec.push(parse_track(track)?);
            }
        }
    }
    Ok(vec)
}

pub fn to_album(json: String) -> Result<Album> {
    let value = &serde_json::from_str::<Value>(&json)?;
    let album_name: String = get_val!(value, "name")?;
    let artwork = first_image_url(value);
    let artists = artist_names(value);

    // Album track objects omit the album field; fill it from the enclosing album
    let mut tracks: Vec<Track> = Vec::new();
    let array: &Vec<Value> = get_val!(value, "tracks", "items")?;
    for v in array.iter() {
        let mut track = parse_track(v)?;
        if track.album == "Unknown Album" {
            track.album = album_name.clone();
        }
        if track.artwork_url.is_empty() {
            track.artwork_url = artwork.clone();
        }
        tracks.push(track);
    }

    Ok(Album {
        id: get_val!(value, "id")?,
        name: album_name,
        artists,
        artwork_url: artwork,
        tracks,
    })
}

pub fn to_playlist_detail(json: String) -> Result<PlaylistDetail> {
    let value = &serde_json::from_str::<Value>(&json)?;
    let mut tracks: Vec<Track> = Vec::new();
    let array: &Vec<Value> = get_val!(value, "tracks", "items")?;
    for v in array.iter() {
        // Local or removed entries come through as null track objects
        let track: &Value = get_val!(v, "track")?;
        if track.is_null() {
            continue;
        }
        tracks.push(parse_track(track)?);
    }

    Ok(PlaylistDetail {
        id: get_val!(value, "id")?,
        name: get_val!(value, "name")?,
        description: get_val!(value, "description").unwrap_or_default(),
        artwork_url: first_image_url(value),
        tracks,
    })
}

fn parse_playlist_summary(v: &Value) -> Result<PlaylistSummary> {
    Ok(PlaylistSummary {
        id: get_val!(v, "id")?,
        name: get_val!(v, "name")?,
        description: get_val!(v, "description").unwrap_or_default(),
        artwork_url: first_image_url(v),
        track_count: get_val!(v, "tracks", "total").unwrap_or_default(),
    })
}

pub fn to_playlist_list(json: String) -> Result<Vec<PlaylistSummary>> {
    let value = &serde_json::from_str::<Value>(&json)?;
    // Featured playlists nest one level deeper than the user's own
    let array: &Vec<Value> = match get_val!(@as &Vec<Value>, value, "items") {
        std::result::Result::Ok(array) => array,
        _ => get_val!(value, "playlists", "items")?,
    };
    let mut vec: Vec<PlaylistSummary> = Vec::new();
    for v in array.iter() {
        vec.push(parse_playlist_summary(v)?);
    }
    Ok(vec)
}

pub fn to_new_releases(json: String) -> Result<Vec<AlbumSummary>> {
    let value = &serde_json::from_str::<Value>(&json)?;
    let array: &Vec<Value> = get_val!(value, "albums", "items")?;
    let mut vec: Vec<AlbumSummary> = Vec::new();
    for v in array.iter() {
        vec.push(AlbumSummary {
            id: get_val!(v, "id")?,
            name: get_val!(v, "name")?,
            artists: artist_names(v),
            artwork_url: first_image_url(v),
        });
    }
    Ok(vec)
}

pub fn to_token_info(json: String) -> Result<TokenInfo> {
    let value = &serde_json::from_str::<Value>(&json)?;
    Ok(TokenInfo {
        access_token: get_val!(value, "access_token")?,
        expires_in: get_val!(value, "expires_in")?,
    })
}

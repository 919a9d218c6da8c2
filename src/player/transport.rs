//! Playback transport seam
//!
//! The state machine drives one of two transports: a local in-process
//! transport (demo/offline, no real audio I/O in this core) or a remote
//! proxy that forwards every operation to the catalog's player endpoints
//! for a connected device.

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::api::{CatalogClient, Track};
use crate::features::RepeatMode;

/// Default volume for the local transport
pub const LOCAL_DEFAULT_VOLUME: u8 = 70;
/// Default volume for the remote device proxy
pub const REMOTE_DEFAULT_VOLUME: u8 = 100;

/// Operations the playback state machine forwards to its audio backend
#[async_trait]
pub trait Transport: Send + Sync {
    /// Begin playback of `queue[index]`. The full queue is provided so
    /// remote backends can hand the device its own playback context.
    async fn play(&self, queue: &[Track], index: usize) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn resume(&self) -> Result<()>;

    async fn seek(&self, position_ms: u64) -> Result<()>;

    /// Volume in 0..=100
    async fn set_volume(&self, volume: u8) -> Result<()>;

    async fn set_shuffle(&self, on: bool) -> Result<()>;

    async fn set_repeat(&self, mode: RepeatMode) -> Result<()>;

    /// Append a track to the backend's play queue
    async fn enqueue(&self, track: &Track) -> Result<()>;

    /// Starting volume when this transport is attached
    fn default_volume(&self) -> u8 {
        LOCAL_DEFAULT_VOLUME
    }
}

/// In-process transport. Carries no audio pipeline of its own; the state
/// machine is the source of truth and this backend only acknowledges.
#[derive(Debug, Default, Clone)]
pub struct LocalTransport;

impl LocalTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn play(&self, queue: &[Track], index: usize) -> Result<()> {
        if let Some(track) = queue.get(index) {
            debug!("local transport: play '{}'", track.title);
        }
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        debug!("local transport: pause");
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        debug!("local transport: resume");
        Ok(())
    }

    async fn seek(&self, position_ms: u64) -> Result<()> {
        debug!("local transport: seek to {}ms", position_ms);
        Ok(())
    }

    async fn set_volume(&self, volume: u8) -> Result<()> {
        debug!("local transport: volume {}", volume);
        Ok(())
    }

    async fn set_shuffle(&self, on: bool) -> Result<()> {
        debug!("local transport: shuffle {}", on);
        Ok(())
    }

    async fn set_repeat(&self, mode: RepeatMode) -> Result<()> {
        debug!("local transport: repeat {:?}", mode);
        Ok(())
    }

    async fn enqueue(&self, track: &Track) -> Result<()> {
        debug!("local transport: enqueue '{}'", track.title);
        Ok(())
    }
}

/// Remote device proxy over the catalog player endpoints
#[derive(Debug, Clone)]
pub struct RemoteTransport {
    catalog: CatalogClient,
    device_id: String,
}

impl RemoteTransport {
    pub fn new(catalog: CatalogClient, device_id: impl Into<String>) -> Self {
        Self {
            catalog,
            device_id: device_id.into(),
        }
    }
}

/// Offset of `queue[index]` within the uri-bearing subset of the queue.
/// Tracks without a provider uri are not sent to the device, so the start
/// offset must count only uri-bearing tracks before the index.
fn device_offset(queue: &[Track], index: usize) -> usize {
    queue
        .get(..index)
        .map(|before| before.iter().filter(|t| t.uri.is_some()).count())
        .unwrap_or(0)
}

#[async_trait]
impl Transport for RemoteTransport {
    async fn play(&self, queue: &[Track], index: usize) -> Result<()> {
        // The device gets every queued uri plus the start offset, so its
        // own next/previous stay aligned with ours.
        let uris: Vec<String> = queue.iter().filter_map(|t| t.uri.clone()).collect();
        let offset = device_offset(queue, index);
        self.catalog.play_tracks(&self.device_id, &uris, offset).await
    }

    async fn pause(&self) -> Result<()> {
        self.catalog.pause_playback(&self.device_id).await
    }

    async fn resume(&self) -> Result<()> {
        self.catalog.resume_playback(&self.device_id).await
    }

    async fn seek(&self, position_ms: u64) -> Result<()> {
        self.catalog.seek_playback(&self.device_id, position_ms).await
    }

    async fn set_volume(&self, volume: u8) -> Result<()> {
        self.catalog
            .set_playback_volume(&self.device_id, volume)
            .await
    }

    async fn set_shuffle(&self, on: bool) -> Result<()> {
        self.catalog.set_shuffle(&self.device_id, on).await
    }

    async fn set_repeat(&self, mode: RepeatMode) -> Result<()> {
        self.catalog
            .set_repeat(&self.device_id, mode.as_wire_state())
            .await
    }

    async fn enqueue(&self, track: &Track) -> Result<()> {
        match &track.uri {
            Some(uri) => self.catalog.enqueue(&self.device_id, uri).await,
            None => Ok(()),
        }
    }

    fn default_volume(&self) -> u8 {
        REMOTE_DEFAULT_VOLUME
    }
}

//! Media catalog API module
//!
//! Provides the catalog client (client-credentials auth, search/browse,
//! remote transport proxy) and the user data store seam.

pub mod catalog;
pub mod userdata;

pub use catalog::{CatalogClient, CatalogSearch, SEARCH_LIMIT};
pub use catalog::model::{Album, AlbumSummary, PlaylistDetail, PlaylistSummary, Track};
pub use userdata::{InMemoryUserStore, Profile, StoredPlaylist, StoredSong, UserDataStore};

//! Media server collaborator contract
//!
//! The collection engine only ever talks to the server through this trait.
//! [PlexClient](super::plex::PlexClient) is the HTTP implementation; tests use
//! an in-memory one.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::collections::{CollectionId, Item, ItemId, MediaKind, RemoteCollection};

/// Server-side identifier of a library section
pub type LibraryId = String;

/// A library section on the media server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Library {
    pub id: LibraryId,
    pub title: String,
    /// Raw section type (`movie`, `show`, `artist`, `photo`)
    pub section_type: String,
}

impl Library {
    /// Media kind for collection purposes; `None` for music/photo libraries
    pub fn kind(&self) -> Option<MediaKind> {
        MediaKind::from_server_type(&self.section_type)
    }
}

/// Snapshot of server identity, logged at the start of every run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerStatus {
    pub server_name: String,
    pub version: String,
    pub platform: String,
    pub platform_version: String,
    pub libraries: usize,
    /// RFC 3339
    pub updated_at: String,
}

/// Operations the maintenance agent needs from the media server
#[async_trait]
pub trait MediaServer: Send + Sync {
    /// Identity and version information
    async fn server_status(&self) -> Result<ServerStatus>;

    async fn list_libraries(&self) -> Result<Vec<Library>>;

    /// Every item in a movie or show library
    async fn list_items(&self, library: &Library) -> Result<Vec<Item>>;

    /// Collections in a library with their current members
    async fn list_collections(&self, library_id: &str) -> Result<Vec<RemoteCollection>>;

    /// Create a collection in `library` holding `items`; returns its id
    async fn create_collection(
        &self,
        library: &Library,
        name: &str,
        items: &[ItemId],
    ) -> Result<CollectionId>;

    async fn add_items_to_collection(&self, collection_id: &str, items: &[ItemId]) -> Result<()>;

    async fn remove_items_from_collection(
        &self,
        collection_id: &str,
        items: &[ItemId],
    ) -> Result<()>;

    /// Ask the server to rescan a library's folders
    async fn scan_library(&self, library_id: &str) -> Result<()>;
}

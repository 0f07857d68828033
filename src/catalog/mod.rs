//! Async client for the remote catalog. `Catalog` is the seam the rest of
//! the crate programs against; `SupabaseCatalog` is the one production
//! implementation, grounded on a PostgREST-style schema.

pub mod model;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use thiserror::Error;

pub use model::{Channel, Track};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Request(String),
    #[error("catalog returned unexpected data: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for CatalogError {
    fn from(e: reqwest::Error) -> Self {
        CatalogError::Request(e.to_string())
    }
}

/// The out-of-scope collaborator spec.md names: async channel/track reads
/// against whatever backs the remote catalog.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn list_channels(&self) -> Result<Vec<Channel>, CatalogError>;
    async fn get_channel(&self, slug: &str) -> Result<Option<Channel>, CatalogError>;
    async fn list_tracks(&self, channel_slug: &str) -> Result<Vec<Track>, CatalogError>;

    /// Base URL used to resolve storage-relative `image` fields (§4.3's
    /// `image.url` content rule). Trailing slash is stripped by callers.
    fn storage_base_url(&self) -> &str;
}

pub struct SupabaseCatalog {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SupabaseCatalog {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }
}

#[async_trait]
impl Catalog for SupabaseCatalog {
    async fn list_channels(&self) -> Result<Vec<Channel>, CatalogError> {
        let url = self.rest_url("channels?select=*");
        debug!("catalog: GET {url}");
        let resp = self.request(&url).send().await?.error_for_status()?;
        let channels = resp
            .json::<Vec<Channel>>()
            .await
            .map_err(|e| CatalogError::Decode(e.to_string()))?;
        Ok(channels)
    }

    async fn get_channel(&self, slug: &str) -> Result<Option<Channel>, CatalogError> {
        let url = self.rest_url(&format!("channels?select=*&slug=eq.{slug}"));
        debug!("catalog: GET {url}");
        let resp = self.request(&url).send().await?.error_for_status()?;
        let mut channels = resp
            .json::<Vec<Channel>>()
            .await
            .map_err(|e| CatalogError::Decode(e.to_string()))?;
        Ok(if channels.is_empty() {
            None
        } else {
            Some(channels.remove(0))
        })
    }

    async fn list_tracks(&self, channel_slug: &str) -> Result<Vec<Track>, CatalogError> {
        let Some(channel) = self.get_channel(channel_slug).await? else {
            return Ok(Vec::new());
        };
        let url = self.rest_url(&format!(
            "tracks?select=*&channel_id=eq.{}&order=created_at.desc",
            channel.slug
        ));
        debug!("catalog: GET {url}");
        let resp = self.request(&url).send().await?.error_for_status()?;
        let tracks = resp
            .json::<Vec<Track>>()
            .await
            .map_err(|e| CatalogError::Decode(e.to_string()))?;
        Ok(tracks)
    }

    fn storage_base_url(&self) -> &str {
        &self.base_url
    }
}

/// In-memory `Catalog` used by unit and integration tests; never touches
/// the network. Tracks are stored in catalog order (newest-first), matching
/// what the real API returns.
pub struct MemoryCatalog {
    channels: Vec<Channel>,
    tracks: std::collections::HashMap<String, Vec<Track>>,
    storage_base: String,
}

impl MemoryCatalog {
    pub fn new(storage_base: impl Into<String>) -> Self {
        Self {
            channels: Vec::new(),
            tracks: std::collections::HashMap::new(),
            storage_base: storage_base.into(),
        }
    }

    pub fn with_channel(mut self, channel: Channel, tracks: Vec<Track>) -> Self {
        self.tracks.insert(channel.slug.clone(), tracks);
        self.channels.push(channel);
        self
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn list_channels(&self) -> Result<Vec<Channel>, CatalogError> {
        Ok(self.channels.clone())
    }

    async fn get_channel(&self, slug: &str) -> Result<Option<Channel>, CatalogError> {
        Ok(self.channels.iter().find(|c| c.slug == slug).cloned())
    }

    async fn list_tracks(&self, channel_slug: &str) -> Result<Vec<Track>, CatalogError> {
        Ok(self.tracks.get(channel_slug).cloned().unwrap_or_default())
    }

    fn storage_base_url(&self) -> &str {
        &self.storage_base
    }
}

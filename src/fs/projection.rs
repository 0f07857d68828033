//! The pure, `fuser`-independent core (§4.0 / §9): routing, attributes,
//! listings, content, and the control-file write, expressed as plain async
//! functions over a `Catalog` trait object. The FUSE adapter is the only
//! caller, and the only place this crate talks to the kernel.

use std::sync::Arc;

use log::info;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::download::DownloadQueue;
use crate::fs::attr::{self, Stat};
use crate::fs::content;
use crate::fs::error::FsError;
use crate::fs::listing;
use crate::fs::router::{self, VNode};

pub struct Projection {
    catalog: Arc<dyn Catalog>,
    config: Arc<Config>,
    queue: DownloadQueue,
}

impl Projection {
    pub fn new(catalog: Arc<dyn Catalog>, config: Arc<Config>, queue: DownloadQueue) -> Self {
        Self { catalog, config, queue }
    }

    pub async fn getattr(&self, path: &str) -> Result<Stat, FsError> {
        let node = router::classify(path).ok_or(FsError::NotFound)?;
        attr::stat_for(self.catalog.as_ref(), &node).await
    }

    pub async fn readdir(&self, path: &str) -> Result<Vec<String>, FsError> {
        let node = router::classify(path).ok_or(FsError::NotFound)?;
        listing::list(self.catalog.as_ref(), &self.config, &node).await
    }

    pub async fn read(&self, path: &str) -> Result<Vec<u8>, FsError> {
        let node = router::classify(path).ok_or(FsError::NotFound)?;
        self.content_for(&node).await
    }

    /// Write semantics: only `VNode::Control` is writable. Its UTF-8
    /// content, trimmed, is a channel slug to enqueue; every other path
    /// rejects with `EROFS` (enforced by the caller checking `getattr`'s
    /// mode bits, and here as a second, authoritative gate).
    pub async fn write_control(&self, data: &[u8]) -> Result<(), FsError> {
        let slug = std::str::from_utf8(data)
            .map_err(|e| FsError::Io(e.to_string()))?
            .trim();
        if slug.is_empty() {
            return Ok(());
        }
        info!("control write: enqueueing {slug}");
        self.queue.enqueue(slug.to_string()).await;
        Ok(())
    }

    async fn content_for(&self, node: &VNode) -> Result<Vec<u8>, FsError> {
        match node {
            VNode::RootHelp => Ok(content::help_txt()),
            VNode::ChannelAbout { slug } => {
                let channel = self.catalog.get_channel(slug).await?.ok_or(FsError::NotFound)?;
                let tracks = self.catalog.list_tracks(slug).await?;
                Ok(content::about_txt(&channel, &tracks))
            }
            VNode::ChannelImageUrl { slug } => {
                let channel = self.catalog.get_channel(slug).await?.ok_or(FsError::NotFound)?;
                Ok(content::image_url(&channel, self.catalog.storage_base_url()))
            }
            VNode::ChannelM3u { slug } => {
                let tracks = self.catalog.list_tracks(slug).await?;
                Ok(content::tracks_m3u(&tracks))
            }
            VNode::TracksJson { slug } => {
                let mut tracks = self.catalog.list_tracks(slug).await?;
                tracks.reverse();
                Ok(content::tracks_json(&tracks))
            }
            VNode::TrackText { slug, stem } => {
                let mut tracks = self.catalog.list_tracks(slug).await?;
                tracks.reverse();
                let track = crate::fs::slug::resolve(&tracks, stem, |t| t.title.as_deref())
                    .ok_or(FsError::NotFound)?;
                Ok(content::track_text(track))
            }
            VNode::TagTrackText { slug, tag, stem } => {
                let tracks = self.catalog.list_tracks(slug).await?;
                let mut tagged: Vec<_> = tracks
                    .into_iter()
                    .filter(|t| crate::fs::slug::tag_set_contains(&t.tag_set_for_tree(), tag))
                    .collect();
                tagged.reverse();
                let track = crate::fs::slug::resolve(&tagged, stem, |t| t.title.as_deref())
                    .ok_or(FsError::NotFound)?;
                Ok(content::track_text(track))
            }
            VNode::Control => Ok(Vec::new()),
            _ => Err(FsError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Channel, MemoryCatalog, Track};

    fn test_config() -> Arc<Config> {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("R4_CONFIG_FILE", dir.path().join("settings.json"));
        std::env::set_var("R4_CACHE_DIR", dir.path().join("cache"));
        std::env::set_var("R4_STATE_DIR", dir.path().join("state"));
        let config = Config::load().unwrap();
        std::mem::forget(dir);
        Arc::new(config)
    }

    fn fixture() -> Projection {
        let channel = Channel {
            slug: "deepweb".into(),
            name: Some("Deep Web".into()),
            description: None,
            image: None,
            url: None,
            created_at: None,
            updated_at: None,
        };
        let tracks = vec![Track {
            id: Some("abc".into()),
            title: Some("Hello World".into()),
            url: "https://youtu.be/abcdefghijk".into(),
            description: None,
            discogs_url: None,
            created_at: None,
            updated_at: None,
            tags: None,
        }];
        let catalog: Arc<dyn Catalog> = Arc::new(MemoryCatalog::new("https://proj.supabase.co").with_channel(channel, tracks));
        Projection::new(catalog, test_config(), DownloadQueue::new())
    }

    #[tokio::test]
    async fn stat_size_matches_read_len_for_every_synthetic_file() {
        let projection = fixture();
        for path in [
            "/HELP.txt",
            "/channels/deepweb/ABOUT.txt",
            "/channels/deepweb/image.url",
            "/channels/deepweb/tracks.m3u",
            "/channels/deepweb/tracks/tracks.json",
            "/channels/deepweb/tracks/hello-world.txt",
        ] {
            let stat = projection.getattr(path).await.unwrap();
            let bytes = projection.read(path).await.unwrap();
            assert_eq!(stat.size as usize, bytes.len(), "mismatch for {path}");
        }
    }

    #[tokio::test]
    async fn unclassified_path_is_not_found() {
        let projection = fixture();
        assert!(matches!(projection.getattr("/nope").await, Err(FsError::NotFound)));
    }

    #[tokio::test]
    async fn control_write_enqueues_exactly_once_on_rewrite() {
        let projection = fixture();
        projection.write_control(b"deepweb\n").await.unwrap();
        projection.write_control(b"deepweb\n").await.unwrap();
        assert_eq!(projection.queue.len().await, 1);
    }
}

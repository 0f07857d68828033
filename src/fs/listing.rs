//! Enumerates directory entries for each node kind (§4.2). Every listing is
//! prefixed with `.` and `..` by the caller (the FUSE adapter); this module
//! returns only the kind-specific entries.

use crate::catalog::{Catalog, Track};
use crate::config::Config;
use crate::fs::content::track_filename;
use crate::fs::error::FsError;
use crate::fs::router::VNode;
use crate::fs::slug;

fn reversed(mut tracks: Vec<Track>) -> Vec<Track> {
    tracks.reverse();
    tracks
}

pub async fn list(catalog: &dyn Catalog, config: &Config, node: &VNode) -> Result<Vec<String>, FsError> {
    match node {
        VNode::Root => Ok(vec![
            "HELP.txt".into(),
            "channels".into(),
            "favorites".into(),
            "downloads".into(),
        ]),
        VNode::ChannelsDir => {
            let channels = catalog.list_channels().await?;
            Ok(channels.into_iter().map(|c| c.slug).collect())
        }
        VNode::ChannelDir { slug } => {
            if catalog.get_channel(slug).await?.is_none() {
                return Err(FsError::NotFound);
            }
            Ok(vec![
                "ABOUT.txt".into(),
                "image.url".into(),
                "tracks.m3u".into(),
                "tracks".into(),
                "tags".into(),
            ])
        }
        VNode::TracksDir { slug } => {
            let tracks = reversed(catalog.list_tracks(slug).await?);
            let mut entries = vec!["tracks.json".to_string()];
            entries.extend(tracks.iter().map(track_filename));
            Ok(entries)
        }
        VNode::TagsDir { slug } => {
            let tracks = catalog.list_tracks(slug).await?;
            let mut tags = std::collections::BTreeSet::new();
            for t in &tracks {
                tags.extend(slug::sanitized_tags(&t.tag_set_for_tree()));
            }
            Ok(tags.into_iter().collect())
        }
        VNode::TagDir { slug, tag } => {
            let tracks = catalog.list_tracks(slug).await?;
            let tagged: Vec<Track> = tracks
                .into_iter()
                .filter(|t| slug::tag_set_contains(&t.tag_set_for_tree(), tag))
                .collect();
            let tagged = reversed(tagged);
            Ok(tagged.iter().map(track_filename).collect())
        }
        VNode::FavoritesDir => config.read_favorites().map_err(|e| FsError::Io(e.to_string())),
        VNode::DownloadsDir => config.read_downloads().map_err(|e| FsError::Io(e.to_string())),
        // Aliases of `/channels/{slug}` (§3's node table): rewrite to the
        // channel directory's listing rather than erroring, mirroring how
        // `router::classify_alias` rewrites deeper alias paths.
        VNode::FavoriteAliasRoot { slug } | VNode::DownloadAliasRoot { slug } => {
            Box::pin(list(catalog, config, &VNode::ChannelDir { slug: slug.clone() })).await
        }
        _ => Err(FsError::NotFound),
    }
}

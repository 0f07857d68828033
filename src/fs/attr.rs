//! Computes a POSIX stat tuple for each classified node (§4.1).

use std::time::{SystemTime, UNIX_EPOCH};

use crate::catalog::{Catalog, Channel, Track};
use crate::fs::content;
use crate::fs::error::FsError;
use crate::fs::router::VNode;
use crate::fs::slug;
use crate::time::{earliest, latest, SafeDate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Dir,
    File,
}

#[derive(Debug, Clone, Copy)]
pub struct Stat {
    pub kind: NodeKind,
    pub perm: u32,
    pub size: u64,
    pub mtime: f64,
    pub atime: f64,
    pub ctime: f64,
}

const DIR_PERM: u32 = 0o755;
const FILE_PERM: u32 = 0o444;

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

fn bare_dir(now: f64) -> Stat {
    Stat {
        kind: NodeKind::Dir,
        perm: DIR_PERM,
        size: 0,
        mtime: now,
        atime: now,
        ctime: now,
    }
}

fn dir_with_dates(created: SafeDate, updated: SafeDate) -> Stat {
    let now = now_secs();
    Stat {
        kind: NodeKind::Dir,
        perm: DIR_PERM,
        size: 0,
        mtime: updated.valid().map(crate::time::epoch_seconds).unwrap_or(now),
        ctime: updated.valid().map(crate::time::epoch_seconds).unwrap_or(now),
        atime: created.valid().map(crate::time::epoch_seconds).unwrap_or(now),
    }
}

fn synthetic_file(bytes: &[u8], owner_created: SafeDate, owner_updated: SafeDate) -> Stat {
    let now = now_secs();
    Stat {
        kind: NodeKind::File,
        perm: FILE_PERM,
        size: bytes.len() as u64,
        mtime: owner_created.valid().map(crate::time::epoch_seconds).unwrap_or(now),
        ctime: owner_updated.valid().map(crate::time::epoch_seconds).unwrap_or(now),
        atime: owner_updated.valid().map(crate::time::epoch_seconds).unwrap_or(now),
    }
}

/// Track text files invert mtime/ctime relative to synthetic files
/// (`mtime = created_at`, `ctime = updated_at`, `atime = updated_at`) so
/// that `ls -lt` sorts channels chronologically — see §4.1.
fn track_file(bytes: &[u8], track: &Track) -> Stat {
    let now = now_secs();
    let created = track.created().valid().map(crate::time::epoch_seconds);
    let updated = track.updated().valid().map(crate::time::epoch_seconds);
    Stat {
        kind: NodeKind::File,
        perm: FILE_PERM,
        size: bytes.len() as u64,
        mtime: created.unwrap_or(now),
        ctime: updated.unwrap_or(now),
        atime: updated.unwrap_or(now),
    }
}

async fn channel_or_not_found(catalog: &dyn Catalog, slug: &str) -> Result<Channel, FsError> {
    catalog.get_channel(slug).await?.ok_or(FsError::NotFound)
}

fn find_track<'a>(tracks: &'a [Track], stem: &str) -> Option<&'a Track> {
    slug::resolve(tracks, stem, |t| t.title.as_deref())
}

/// Tracks in display (reversed) order: position 0 is the oldest.
fn reversed(mut tracks: Vec<Track>) -> Vec<Track> {
    tracks.reverse();
    tracks
}

fn tracks_with_tag<'a>(tracks: &'a [Track], tag: &str) -> Vec<&'a Track> {
    tracks
        .iter()
        .filter(|t| slug::tag_set_contains(&t.tag_set_for_tree(), tag))
        .collect()
}

pub async fn stat_for(catalog: &dyn Catalog, node: &VNode) -> Result<Stat, FsError> {
    let now = now_secs();
    match node {
        VNode::Root | VNode::ChannelsDir | VNode::FavoritesDir | VNode::DownloadsDir => {
            Ok(bare_dir(now))
        }
        VNode::FavoriteAliasRoot { .. } | VNode::DownloadAliasRoot { .. } => Ok(bare_dir(now)),
        VNode::RootHelp => {
            let bytes = content::help_txt();
            Ok(Stat {
                kind: NodeKind::File,
                perm: FILE_PERM,
                size: bytes.len() as u64,
                mtime: now,
                atime: now,
                ctime: now,
            })
        }
        VNode::ChannelDir { slug } => {
            let channel = channel_or_not_found(catalog, slug).await?;
            Ok(dir_with_dates(channel.created(), channel.updated()))
        }
        VNode::ChannelAbout { slug } => {
            let channel = channel_or_not_found(catalog, slug).await?;
            let tracks = catalog.list_tracks(slug).await?;
            let bytes = content::about_txt(&channel, &tracks);
            Ok(synthetic_file(&bytes, channel.created(), channel.updated()))
        }
        VNode::ChannelImageUrl { slug } => {
            let channel = channel_or_not_found(catalog, slug).await?;
            let bytes = content::image_url(&channel, catalog.storage_base_url());
            Ok(synthetic_file(&bytes, channel.created(), channel.updated()))
        }
        VNode::ChannelM3u { slug } => {
            let channel = channel_or_not_found(catalog, slug).await?;
            let tracks = catalog.list_tracks(slug).await?;
            let bytes = content::tracks_m3u(&tracks);
            Ok(synthetic_file(&bytes, channel.created(), channel.updated()))
        }
        VNode::TracksDir { slug } => {
            channel_or_not_found(catalog, slug).await?;
            let tracks = catalog.list_tracks(slug).await?;
            let created = earliest(tracks.iter().map(Track::created));
            let updated = latest(tracks.iter().map(Track::updated));
            Ok(dir_with_dates(created, updated))
        }
        VNode::TracksJson { slug } => {
            let channel = channel_or_not_found(catalog, slug).await?;
            let tracks = reversed(catalog.list_tracks(slug).await?);
            let bytes = content::tracks_json(&tracks);
            Ok(synthetic_file(&bytes, channel.created(), channel.updated()))
        }
        VNode::TrackText { slug, stem } => {
            let tracks = reversed(catalog.list_tracks(slug).await?);
            let track = find_track(&tracks, stem).ok_or(FsError::NotFound)?;
            let bytes = content::track_text(track);
            Ok(track_file(&bytes, track))
        }
        VNode::TagsDir { slug } => {
            channel_or_not_found(catalog, slug).await?;
            let tracks = catalog.list_tracks(slug).await?;
            let created = earliest(tracks.iter().map(Track::created));
            let updated = latest(tracks.iter().map(Track::updated));
            Ok(dir_with_dates(created, updated))
        }
        VNode::TagDir { slug, tag } => {
            channel_or_not_found(catalog, slug).await?;
            let tracks = catalog.list_tracks(slug).await?;
            let tagged = tracks_with_tag(&tracks, tag);
            let created = earliest(tagged.iter().map(|t| t.created()));
            let updated = latest(tagged.iter().map(|t| t.updated()));
            Ok(dir_with_dates(created, updated))
        }
        VNode::TagTrackText { slug, tag, stem } => {
            let tracks = catalog.list_tracks(slug).await?;
            let tagged = tracks_with_tag(&tracks, tag);
            let mut display: Vec<Track> = tagged.into_iter().cloned().collect();
            display.reverse();
            let track = find_track(&display, stem).ok_or(FsError::NotFound)?;
            let bytes = content::track_text(track);
            Ok(track_file(&bytes, track))
        }
        VNode::Control => Ok(Stat {
            kind: NodeKind::File,
            perm: 0o222,
            size: 0,
            mtime: now,
            atime: now,
            ctime: now,
        }),
    }
}

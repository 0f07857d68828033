//! Per-track post-processing: ID3 tag write, timestamp stamping, and
//! tag-directory symlinking (§4.10). Each step is independently non-fatal —
//! a failure is logged and the track still counts as downloaded.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use filetime::FileTime;
use id3::frame::{Content, ExtendedText};
use id3::{Frame, Tag, TagLike, Version};
use log::warn;

use crate::catalog::Track;
use crate::fs::slug::sanitize;
use crate::time::SafeDate;

/// `artist - title` heuristic from §4.10: first segment before the
/// separator is the artist, the remainder the title; absent separator means
/// the whole string is the title and the artist is "Unknown Artist".
fn parse_artist_title(title: &str) -> (String, String) {
    match title.split_once(" - ") {
        Some((artist, rest)) if !artist.trim().is_empty() => (artist.trim().to_string(), rest.trim().to_string()),
        _ => ("Unknown Artist".to_string(), title.to_string()),
    }
}

pub fn write_id3_tags(path: &Path, track: &Track, index: usize) {
    let (artist, title) = parse_artist_title(track.title_or_untitled());

    let mut tag = Tag::read_from_path(path).unwrap_or_default();
    tag.set_title(title);
    tag.set_artist(artist);
    if let Some(desc) = track.description.as_deref().filter(|d| !d.is_empty()) {
        tag.add_frame(id3::frame::Comment {
            lang: "eng".to_string(),
            description: String::new(),
            text: desc.to_string(),
        });
    }
    tag.set_track((index + 1) as u32);

    if let SafeDate::Valid(created) = track.created() {
        tag.set_year(created.format("%Y").to_string().parse().unwrap_or(0));
    }

    if let Some(discogs) = track.discogs_url.as_deref().filter(|d| !d.is_empty()) {
        tag.add_frame(Frame::with_content(
            "TXXX",
            Content::ExtendedText(ExtendedText {
                description: "DISCOGS_URL".to_string(),
                value: discogs.to_string(),
            }),
        ));
    }
    tag.add_frame(Frame::with_content(
        "TXXX",
        Content::ExtendedText(ExtendedText {
            description: "SOURCE_URL".to_string(),
            value: track.url.clone(),
        }),
    ));

    if let Err(e) = tag.write_to_path(path, Version::Id3v24) {
        warn!("id3 write failed for {}: {e}", path.display());
    }
}

/// `mtime = created_at`, `atime = updated_at` (§4.10), both falling back to
/// wall clock. Missing-file races with the downloader are tolerated.
pub fn stamp_times(path: &Path, track: &Track) {
    let now = SystemTime::now();
    let mtime = track
        .created()
        .valid()
        .map(|dt| UNIX_EPOCH + Duration::from_secs(dt.timestamp().max(0) as u64))
        .unwrap_or(now);
    let atime = track
        .updated()
        .valid()
        .map(|dt| UNIX_EPOCH + Duration::from_secs(dt.timestamp().max(0) as u64))
        .unwrap_or(now);

    if let Err(e) = filetime::set_file_times(path, FileTime::from_system_time(atime), FileTime::from_system_time(mtime)) {
        warn!("setting timestamps on {} failed: {e}", path.display());
    }
}

/// Links `{download_root}/{slug}/tracks/{filename}` into every tag directory
/// the track belongs to (or `untagged` if its derived set is empty).
/// Pre-existing links of the same name are replaced.
pub fn link_into_tag_dirs(download_root: &Path, slug: &str, track: &Track, filename: &str) {
    let channel_dir = download_root.join(slug);
    for tag in track.tag_set_for_tree() {
        let tag_dir = channel_dir.join("tags").join(sanitize(&tag));
        if let Err(e) = std::fs::create_dir_all(&tag_dir) {
            warn!("creating tag dir {} failed: {e}", tag_dir.display());
            continue;
        }
        let link_path = tag_dir.join(filename);
        let target: PathBuf = ["..", "..", "tracks", filename].iter().collect();

        if link_path.symlink_metadata().is_ok() {
            if let Err(e) = std::fs::remove_file(&link_path) {
                warn!("removing stale tag symlink {} failed: {e}", link_path.display());
                continue;
            }
        }

        #[cfg(unix)]
        if let Err(e) = std::os::unix::fs::symlink(&target, &link_path) {
            warn!("linking {} -> {} failed: {e}", link_path.display(), target.display());
        }
    }
}

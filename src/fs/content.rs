//! Byte-producing functions for every synthetic file. Each function's
//! output is also the basis for that node's `stat.size` (§4.1), so size and
//! read content can never drift apart — one function produces both.

use crate::catalog::{Channel, Track};
use crate::fs::slug;
use crate::time::{format_localized, SafeDate};

pub const HELP_TEXT: &str = "\
r4fs — a read-only view of a radio4000-style music catalog.

Layout:
  /channels/{slug}/              one directory per channel
  /channels/{slug}/ABOUT.txt      channel description and stats
  /channels/{slug}/image.url      channel artwork URL
  /channels/{slug}/tracks.m3u     playlist of every track, catalog order
  /channels/{slug}/tracks/        one {title}.txt file per track
  /channels/{slug}/tags/          tracks grouped by derived tag
  /favorites/{slug}/...           alias into /channels/{slug}/...
  /downloads/{slug}/...           alias into /channels/{slug}/...

Downloading:
  Write a channel slug to /control to queue a background download of its
  tracks via the configured downloader. Downloaded audio, ID3 tags, and
  tag-directory symlinks are written under the configured download root,
  never under this mount.
";

pub fn help_txt() -> Vec<u8> {
    HELP_TEXT.as_bytes().to_vec()
}

pub fn about_txt(channel: &Channel, tracks: &[Track]) -> Vec<u8> {
    let name = channel.display_name();
    let rule = "=".repeat(name.chars().count());
    let description = channel
        .description
        .as_deref()
        .filter(|d| !d.is_empty())
        .unwrap_or("No description provided.");

    let created = match channel.created() {
        SafeDate::Valid(dt) => format_localized(dt),
        SafeDate::Absent => "unknown".to_string(),
    };

    let mut blocks: Vec<String> = vec![
        format!("{name}\n{rule}"),
        description.to_string(),
        format!("Stats:\n  Tracks: {}\n  Created: {created}", tracks.len()),
    ];

    if let Some(url) = channel.url.as_deref().filter(|u| !u.is_empty()) {
        blocks.push(format!("Website: {url}"));
    }

    blocks.push(
        "Quick access:\n  \
         tracks/        track text files\n  \
         tags/          tracks grouped by tag\n  \
         tracks.m3u     playlist of all tracks\n  \
         image.url      channel artwork URL"
            .to_string(),
    );

    let mut out = blocks.join("\n\n");
    out.push('\n');
    out.into_bytes()
}

pub fn image_url(channel: &Channel, storage_base_url: &str) -> Vec<u8> {
    match channel.image.as_deref().filter(|i| !i.is_empty()) {
        None => Vec::new(),
        Some(image) if image.starts_with("http") => format!("{image}\n").into_bytes(),
        Some(image) => {
            let base = storage_base_url.trim_end_matches('/');
            format!("{base}/storage/v1/object/public/channels/{image}\n").into_bytes()
        }
    }
}

/// Catalog order (not reversed) — the as-delivered, newest-first order.
pub fn tracks_m3u(tracks: &[Track]) -> Vec<u8> {
    let mut out = String::from("#EXTM3U\n");
    for t in tracks {
        out.push_str(&format!("#EXTINF:-1,{}\n", t.title_or_untitled()));
        out.push_str(&t.url);
        out.push('\n');
    }
    out.into_bytes()
}

/// `tracks` must already be in reversed (display) order.
pub fn tracks_json(tracks: &[Track]) -> Vec<u8> {
    serde_json::to_vec_pretty(tracks).expect("Track serializes without error")
}

pub fn track_text(track: &Track) -> Vec<u8> {
    let mut blocks: Vec<String> = vec![format!(
        "Title: {}\nURL: {}",
        track.title_or_untitled(),
        track.url
    )];

    if let Some(desc) = track.description.as_deref().filter(|d| !d.is_empty()) {
        blocks.push(format!("Description:\n{desc}"));
    }

    if let Some(discogs) = track.discogs_url.as_deref().filter(|d| !d.is_empty()) {
        blocks.push(format!("Discogs: {discogs}"));
    }

    let mut date_lines = Vec::new();
    if let SafeDate::Valid(created) = track.created() {
        date_lines.push(format!("Added: {}", format_localized(created)));
    }
    if let SafeDate::Valid(updated) = track.updated() {
        date_lines.push(format!("Updated: {}", format_localized(updated)));
    }
    if !date_lines.is_empty() {
        blocks.push(date_lines.join("\n"));
    }

    let tags = track.derived_tags();
    if !tags.is_empty() {
        let rendered = tags.iter().map(|t| format!("#{t}")).collect::<Vec<_>>().join(" ");
        blocks.push(format!("Tags: {rendered}"));
    }

    let mut out = blocks.join("\n\n");
    out.push('\n');
    out.into_bytes()
}

/// The filename a track resolves to under `/tracks` or a tag directory.
pub fn track_filename(track: &Track) -> String {
    format!("{}.txt", slug::track_stem(track.title.as_deref()))
}

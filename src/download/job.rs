//! Per-channel download job: fetch tracks, diff against what's already on
//! disk, spawn the downloader for what's missing, post-process each
//! success, and emit the channel playlist (§4.7).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info, warn};

use crate::catalog::{Catalog, Track};
use crate::config::{Config, Downloader};
use crate::download::ids::youtube_id;
use crate::download::postprocess;
use crate::download::queue::JobRunner;
use crate::download::supervisor::{ProcessSupervisor, SupervisorError};
use crate::fs::slug::sanitize;

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "opus", "m4a", "webm"];

#[derive(Debug, Default)]
struct JobCounts {
    downloaded: usize,
    skipped: usize,
    failed: usize,
}

pub struct DownloadJobRunner {
    catalog: Arc<dyn Catalog>,
    config: Arc<Config>,
    supervisor: Arc<ProcessSupervisor>,
}

impl DownloadJobRunner {
    pub fn new(catalog: Arc<dyn Catalog>, config: Arc<Config>, supervisor: Arc<ProcessSupervisor>) -> Self {
        Self { catalog, config, supervisor }
    }

    async fn run_job(&self, slug: &str) {
        let tracks = match self.catalog.list_tracks(slug).await {
            Ok(t) => t,
            Err(e) => {
                error!("download job {slug}: fetching tracks failed: {e}");
                return;
            }
        };
        if tracks.is_empty() {
            info!("download job {slug}: no tracks, nothing to do");
            return;
        }

        let channel_dir = self.config.download_root().join(slug);
        let tracks_dir = channel_dir.join("tracks");
        if let Err(e) = std::fs::create_dir_all(&tracks_dir) {
            error!("download job {slug}: creating {} failed: {e}", tracks_dir.display());
            return;
        }

        let existing = list_dir_names(&tracks_dir);
        let mut counts = JobCounts::default();

        for (index, track) in tracks.iter().enumerate() {
            let stem = sanitize(track.title_or_untitled());
            if is_present(&existing, &stem, track) {
                counts.skipped += 1;
                continue;
            }

            match self.download_one(&tracks_dir, &stem, track, index).await {
                Outcome::Downloaded => counts.downloaded += 1,
                Outcome::Skipped => counts.skipped += 1,
                Outcome::Failed(msg) => {
                    warn!("download job {slug}: track '{}' failed: {msg}", track.title_or_untitled());
                    counts.failed += 1;
                }
                Outcome::DownloaderMissing => {
                    error!("download job {slug}: downloader not installed, aborting job");
                    break;
                }
                Outcome::Cancelled => {
                    // §7: quiet by design, resolves with no file; the queue
                    // was already cleared by the caller that triggered this.
                    debug!("download job {slug}: cancelled mid-download");
                    return;
                }
            }
        }

        info!(
            "download job {slug} finished: {} downloaded, {} skipped, {} failed",
            counts.downloaded, counts.skipped, counts.failed
        );

        emit_playlist(&channel_dir, &tracks);
    }

    async fn download_one(&self, tracks_dir: &Path, stem: &str, track: &Track, index: usize) -> Outcome {
        let id_suffix = track.id.clone().or_else(|| youtube_id(&track.url)).unwrap_or_default();
        let output_template = tracks_dir.join(format!("{stem} [{id_suffix}].%(ext)s"));

        let settings = &self.config.settings;
        let mut args = vec![
            "--format".to_string(),
            settings.ytdlp.format.clone(),
            "--no-playlist".to_string(),
            "--newline".to_string(),
            "--output".to_string(),
            output_template.to_string_lossy().into_owned(),
        ];
        if settings.ytdlp.extract_audio {
            args.push("--extract-audio".to_string());
            args.push("--audio-format".to_string());
            args.push(settings.ytdlp.audio_format.clone());
            args.push("--audio-quality".to_string());
            args.push(settings.ytdlp.audio_quality.clone());
        }
        if let Some(cookies) = &settings.ytdlp.cookies_file {
            args.push("--cookies".to_string());
            args.push(cookies.clone());
        } else if let Some(browser) = &settings.ytdlp.cookies_from_browser {
            args.push("--cookies-from-browser".to_string());
            args.push(browser.clone());
        }
        if settings.ytdlp.embed_thumbnail {
            args.push("--embed-thumbnail".to_string());
        }
        if settings.ytdlp.write_thumbnail {
            args.push("--write-thumbnail".to_string());
        }
        args.push(track.url.clone());

        let binary = match settings.downloader {
            Downloader::YtDlp => "yt-dlp",
            Downloader::YoutubeDl => "youtube-dl",
        };

        let outcome = match self.supervisor.run(binary, &args).await {
            Ok(o) => o,
            Err(SupervisorError::SpawnFailed(msg)) => {
                error!("downloader spawn failed: {msg}");
                return Outcome::DownloaderMissing;
            }
        };

        if let Some(path) = &outcome.already_downloaded {
            let final_path = PathBuf::from(path);
            self.postprocess(&final_path, track, index).await;
            return Outcome::Skipped;
        }

        if outcome.cancelled {
            return Outcome::Cancelled;
        }

        if !outcome.success {
            let message = [outcome.stderr_tail.as_str(), outcome.stdout_tail.as_str()]
                .into_iter()
                .map(str::trim)
                .find(|s| !s.is_empty())
                .unwrap_or("downloader exited with a non-zero status")
                .to_string();
            return Outcome::Failed(message);
        }

        let resolved = match outcome.destination.map(PathBuf::from) {
            Some(p) if p.exists() => Some(p),
            _ => find_latest_matching(tracks_dir, stem),
        };

        let resolved = match resolved {
            Some(p) if p.exists() => Some(p),
            Some(p) => {
                tokio::time::sleep(Duration::from_millis(200)).await;
                p.exists().then_some(p)
            }
            None => None,
        };

        match resolved {
            Some(path) => {
                self.postprocess(&path, track, index).await;
                Outcome::Downloaded
            }
            None => Outcome::Failed("downloaded file not found on disk".to_string()),
        }
    }

    async fn postprocess(&self, path: &Path, track: &Track, index: usize) {
        postprocess::write_id3_tags(path, track, index);
        postprocess::stamp_times(path, track);
        if self.config.settings.features.organize_by_tags {
            if let Some(filename) = path.file_name().and_then(|f| f.to_str()) {
                let slug = path
                    .parent()
                    .and_then(Path::parent)
                    .and_then(|p| p.file_name())
                    .and_then(|f| f.to_str())
                    .unwrap_or_default();
                postprocess::link_into_tag_dirs(&self.config.download_root(), slug, track, filename);
            }
        }
    }
}

enum Outcome {
    Downloaded,
    Skipped,
    Failed(String),
    DownloaderMissing,
    Cancelled,
}

fn list_dir_names(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter_map(|e| e.file_name().into_string().ok())
                .collect()
        })
        .unwrap_or_default()
}

fn is_present(existing: &[String], stem: &str, track: &Track) -> bool {
    let id_bracket = track.id.as_deref().map(|id| format!("[{id}]"));
    let yt_bracket = youtube_id(&track.url).map(|id| format!("[{id}]"));

    existing.iter().any(|name| {
        name.starts_with(stem)
            || id_bracket.as_deref().is_some_and(|b| name.contains(b))
            || yt_bracket.as_deref().is_some_and(|b| name.contains(b))
    })
}

fn find_latest_matching(dir: &Path, stem: &str) -> Option<PathBuf> {
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(stem))
        .max_by_key(|e| e.metadata().and_then(|m| m.modified()).ok())
        .map(|e| e.path())
}

fn is_audio_file(name: &str) -> bool {
    AUDIO_EXTENSIONS.iter().any(|ext| name.ends_with(&format!(".{ext}")))
}

/// §4.7 step 5: original (unreversed, newest-first) catalog order, the
/// first on-disk filename whose name contains `sanitize(title)`.
fn emit_playlist(channel_dir: &Path, tracks: &[Track]) {
    let tracks_dir = channel_dir.join("tracks");
    let existing = list_dir_names(&tracks_dir);

    let mut out = String::new();
    for track in tracks {
        let stem = sanitize(track.title_or_untitled());
        let Some(filename) = existing.iter().find(|n| is_audio_file(n) && n.contains(&stem)) else {
            continue;
        };
        out.push_str(&format!("#EXTINF:-1,{}\ntracks/{filename}\n", track.title_or_untitled()));
    }

    if let Err(e) = std::fs::write(channel_dir.join("playlist.m3u"), out) {
        warn!("writing playlist for {} failed: {e}", channel_dir.display());
    }
}

#[async_trait]
impl JobRunner for DownloadJobRunner {
    async fn run(&self, slug: &str) {
        self.run_job(slug).await;
    }
}

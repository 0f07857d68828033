//! Settings, favorites/downloads lists, and directory resolution.
//!
//! Mirrors the teacher's `settings.rs` nested-defaulted-struct pattern, but
//! persists to a plain JSON file rather than SQLite — there is no local
//! database in this crate, only the remote catalog and the download root.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use log::{info, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Downloader {
    YtDlp,
    YoutubeDl,
}

impl Default for Downloader {
    fn default() -> Self {
        Downloader::YtDlp
    }
}

impl Downloader {
    pub fn binary_name(&self) -> &'static str {
        match self {
            Downloader::YtDlp => "yt-dlp",
            Downloader::YoutubeDl => "youtube-dl",
        }
    }
}

fn default_format() -> String {
    "bestaudio/best".to_string()
}
fn default_audio_format() -> String {
    "mp3".to_string()
}
fn default_audio_quality() -> String {
    "0".to_string()
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YtDlpOptions {
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_true")]
    pub extract_audio: bool,
    #[serde(default = "default_audio_format")]
    pub audio_format: String,
    #[serde(default = "default_audio_quality")]
    pub audio_quality: String,
    /// Parsed for settings-file round-tripping; the §6 subprocess contract
    /// has no `--add-metadata` flag (the `id3` post-processing step writes
    /// tags directly, so this toggle has nothing to drive in `job.rs`).
    #[serde(default = "default_true")]
    pub add_metadata: bool,
    #[serde(default)]
    pub embed_thumbnail: bool,
    #[serde(default)]
    pub write_thumbnail: bool,
    #[serde(default)]
    pub cookies_file: Option<String>,
    #[serde(default)]
    pub cookies_from_browser: Option<String>,
}

impl Default for YtDlpOptions {
    fn default() -> Self {
        Self {
            format: default_format(),
            extract_audio: true,
            audio_format: default_audio_format(),
            audio_quality: default_audio_quality(),
            add_metadata: true,
            embed_thumbnail: false,
            write_thumbnail: false,
            cookies_file: None,
            cookies_from_browser: None,
        }
    }
}

fn default_mount_point() -> String {
    default_dir_under_home("mnt/radio4000")
}

fn default_download_dir() -> String {
    default_dir_under_home("radio4000-downloads")
}

fn default_dir_under_home(rel: &str) -> String {
    directories::UserDirs::new()
        .map(|u| u.home_dir().join(rel))
        .unwrap_or_else(|| PathBuf::from(rel))
        .to_string_lossy()
        .into_owned()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsOptions {
    #[serde(default = "default_mount_point")]
    pub mount_point: String,
    #[serde(default = "default_download_dir")]
    pub download_dir: String,
}

impl Default for PathsOptions {
    fn default() -> Self {
        Self {
            mount_point: default_mount_point(),
            download_dir: default_download_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureOptions {
    #[serde(default)]
    pub organize_by_tags: bool,
    /// Gates the optional `rsync` sync feature from §6, which mirrors the
    /// download root to an external target and has no projected-filesystem
    /// path of its own; not wired to a command in this crate.
    #[serde(default)]
    pub rsync_enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MountOptions {
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub downloader: Downloader,
    #[serde(default)]
    pub ytdlp: YtDlpOptions,
    #[serde(default)]
    pub paths: PathsOptions,
    #[serde(default)]
    pub features: FeatureOptions,
    #[serde(default)]
    pub mount: MountOptions,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            downloader: Downloader::default(),
            ytdlp: YtDlpOptions::default(),
            paths: PathsOptions::default(),
            features: FeatureOptions::default(),
            mount: MountOptions::default(),
        }
    }
}

/// Owns the settings file, the favorites/downloads lists, and directory
/// resolution (config/cache/state dirs, env overrides).
pub struct Config {
    pub settings: Settings,
    pub config_file: PathBuf,
    pub config_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub state_dir: PathBuf,
    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,
}

impl Config {
    /// Load settings from disk (writing defaults if absent), honoring the
    /// env-var > settings.json > built-in-default precedence from §6.
    pub fn load() -> Result<Self> {
        let dirs = ProjectDirs::from("com", "r4fs", "r4fs")
            .context("could not determine a home directory for config/cache/state dirs")?;

        let config_dir = env_path("R4_CONFIG_FILE")
            .map(|f| f.parent().map(Path::to_path_buf).unwrap_or_else(|| dirs.config_dir().to_path_buf()))
            .unwrap_or_else(|| dirs.config_dir().to_path_buf());
        let cache_dir = env_path("R4_CACHE_DIR").unwrap_or_else(|| dirs.cache_dir().to_path_buf());
        let state_dir = env_path("R4_STATE_DIR")
            .unwrap_or_else(|| dirs.state_dir().unwrap_or_else(|| dirs.data_dir().to_path_buf()));
        let config_file = env_path("R4_CONFIG_FILE").unwrap_or_else(|| config_dir.join("settings.json"));

        std::fs::create_dir_all(&config_dir)
            .with_context(|| format!("creating config dir {}", config_dir.display()))?;
        std::fs::create_dir_all(&cache_dir)
            .with_context(|| format!("creating cache dir {}", cache_dir.display()))?;
        std::fs::create_dir_all(&state_dir)
            .with_context(|| format!("creating state dir {}", state_dir.display()))?;

        let mut settings = read_or_init_settings(&config_file)?;

        if let Some(mp) = env_string("R4_MOUNT_POINT") {
            settings.paths.mount_point = mp;
        }
        if let Some(dd) = env_string("R4_DOWNLOAD_DIR") {
            settings.paths.download_dir = dd;
        }

        let supabase_url = env_string("SUPABASE_URL").or_else(|| env_string("VITE_SUPABASE_URL"));
        let supabase_key = env_string("SUPABASE_KEY").or_else(|| env_string("VITE_SUPABASE_KEY"));

        Ok(Self {
            settings,
            config_file,
            config_dir,
            cache_dir,
            state_dir,
            supabase_url,
            supabase_key,
        })
    }

    pub fn mount_point(&self) -> PathBuf {
        PathBuf::from(&self.settings.paths.mount_point)
    }

    pub fn download_root(&self) -> PathBuf {
        PathBuf::from(&self.settings.paths.download_dir)
    }

    /// Invariant from §5: the mount point and download root must not
    /// overlap. Validated at startup.
    pub fn validate_disjoint_roots(&self) -> Result<()> {
        let mount = self.mount_point();
        let root = self.download_root();
        if mount == root || mount.starts_with(&root) || root.starts_with(&mount) {
            anyhow::bail!(
                "mount point {} and download root {} must not overlap",
                mount.display(),
                root.display()
            );
        }
        Ok(())
    }

    fn list_path(&self, name: &str) -> PathBuf {
        self.config_dir.join(name)
    }

    pub fn read_favorites(&self) -> Result<Vec<String>> {
        read_or_init_list(&self.list_path("favorites.txt"))
    }

    pub fn read_downloads(&self) -> Result<Vec<String>> {
        read_or_init_list(&self.list_path("downloads.txt"))
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env_string(key).map(PathBuf::from)
}

fn read_or_init_settings(path: &Path) -> Result<Settings> {
    match std::fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw)
            .with_context(|| format!("parsing settings file {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("settings file {} absent, writing defaults", path.display());
            let settings = Settings::default();
            write_settings(path, &settings)?;
            Ok(settings)
        }
        Err(e) => Err(e).with_context(|| format!("reading settings file {}", path.display())),
    }
}

fn write_settings(path: &Path, settings: &Settings) -> Result<()> {
    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, json).with_context(|| format!("writing settings file {}", path.display()))
}

fn read_or_init_list(path: &Path) -> Result<Vec<String>> {
    match std::fs::read_to_string(path) {
        Ok(raw) => Ok(raw
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("list file {} absent, creating empty", path.display());
            std::fs::write(path, "")?;
            Ok(Vec::new())
        }
        Err(e) => Err(e).with_context(|| format!("reading list file {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_list_file_is_created_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("favorites.txt");
        let list = read_or_init_list(&path).unwrap();
        assert!(list.is_empty());
        assert!(path.exists());
    }

    #[test]
    fn blank_lines_in_list_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("downloads.txt");
        std::fs::write(&path, "slug-one\n\n  \nslug-two\n").unwrap();
        let list = read_or_init_list(&path).unwrap();
        assert_eq!(list, vec!["slug-one".to_string(), "slug-two".to_string()]);
    }

    #[test]
    fn missing_settings_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = read_or_init_settings(&path).unwrap();
        assert_eq!(settings.downloader, Downloader::YtDlp);
        assert!(path.exists());
    }

    #[test]
    fn unknown_keys_in_settings_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"downloader":"yt-dlp","bogus_field":123}"#).unwrap();
        let settings = read_or_init_settings(&path).unwrap();
        assert_eq!(settings.downloader, Downloader::YtDlp);
    }
}

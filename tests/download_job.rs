//! End-to-end coverage of the download job against a fake `yt-dlp` shell
//! script and an in-memory catalog: fresh downloads, resuming around
//! already-present files, the "already downloaded" marker, a failing
//! track that doesn't abort its siblings, a missing downloader that does,
//! mid-download cancellation, and tracks carrying unparseable dates.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use r4fs::catalog::{Catalog, Channel, MemoryCatalog, Track};
use r4fs::config::{Config, Settings};
use r4fs::download::queue::JobRunner;
use r4fs::download::{DownloadJobRunner, ProcessSupervisor};

// `yt-dlp` resolution goes through $PATH, which is process-global; these
// tests run serialized against a single fake binary directory per test.
static PATH_LOCK: Mutex<()> = Mutex::new(());

fn test_config(download_root: &Path) -> Config {
    let mut settings = Settings::default();
    settings.paths.download_dir = download_root.to_string_lossy().into_owned();
    Config {
        settings,
        config_file: download_root.join("settings.json"),
        config_dir: download_root.to_path_buf(),
        cache_dir: download_root.to_path_buf(),
        state_dir: download_root.to_path_buf(),
        supabase_url: None,
        supabase_key: None,
    }
}

fn channel(slug: &str) -> Channel {
    Channel {
        slug: slug.to_string(),
        name: Some(slug.to_string()),
        description: None,
        image: None,
        url: None,
        created_at: None,
        updated_at: None,
    }
}

fn track(id: &str, title: &str, url: &str) -> Track {
    Track {
        id: Some(id.to_string()),
        title: Some(title.to_string()),
        url: url.to_string(),
        description: None,
        discogs_url: None,
        created_at: None,
        updated_at: None,
        tags: None,
    }
}

/// A fake `yt-dlp`: reads the `--output` template and the track URL (last
/// arg), and branches on markers embedded in the URL so one script can
/// stand in for every scenario below. Always materializes the target file
/// so post-processing has something to tag and stamp.
const FAKE_YTDLP: &str = r#"#!/bin/sh
prev=""
out=""
for arg in "$@"; do
  if [ "$prev" = "--output" ]; then out="$arg"; fi
  prev="$arg"
done
url="$prev"

case "$url" in
  *FAILTRACK*)
    echo "ERROR: Unsupported URL: $url" 1>&2
    exit 1
    ;;
esac

dest=$(printf '%s' "$out" | sed 's/%(ext)s/mp3/')
mkdir -p "$(dirname "$dest")"
printf 'fake-audio-data' > "$dest"

case "$url" in
  *ALREADYTRACK*)
    echo "[download] $dest has already been downloaded"
    ;;
  *)
    echo "[download] Destination: $dest"
    ;;
esac
exit 0
"#;

const SLOW_YTDLP: &str = r#"#!/bin/sh
prev=""
out=""
for arg in "$@"; do
  if [ "$prev" = "--output" ]; then out="$arg"; fi
  prev="$arg"
done
sleep 2
dest=$(printf '%s' "$out" | sed 's/%(ext)s/mp3/')
mkdir -p "$(dirname "$dest")"
printf 'fake-audio-data' > "$dest"
echo "[download] Destination: $dest"
exit 0
"#;

fn write_fake_binary(bin_dir: &Path, script: &str) {
    std::fs::create_dir_all(bin_dir).unwrap();
    let path = bin_dir.join("yt-dlp");
    std::fs::write(&path, script).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
    }
}

async fn run_with_path(bin_dir: Option<&Path>, body: impl std::future::Future<Output = ()>) {
    let _guard = PATH_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let old_path = std::env::var("PATH").unwrap_or_default();
    let new_path = match bin_dir {
        Some(dir) => format!("{}:{old_path}", dir.display()),
        None => "/nonexistent-bin-dir-for-r4fs-tests".to_string(),
    };
    std::env::set_var("PATH", new_path);
    body.await;
    std::env::set_var("PATH", old_path);
}

fn tracks_dir_entries(download_root: &Path, slug: &str) -> Vec<String> {
    std::fs::read_dir(download_root.join(slug).join("tracks"))
        .map(|it| it.filter_map(|e| e.ok()).filter_map(|e| e.file_name().into_string().ok()).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn fresh_channel_downloads_every_track_and_writes_playlist() {
    let tmp = tempfile::tempdir().unwrap();
    let bin_dir = tmp.path().join("bin");
    write_fake_binary(&bin_dir, FAKE_YTDLP);

    let download_root = tmp.path().join("downloads");
    let config = Arc::new(test_config(&download_root));
    let catalog: Arc<dyn Catalog> = Arc::new(MemoryCatalog::new("https://storage.example").with_channel(
        channel("deepweb"),
        vec![
            track("aaa", "First Track", "https://youtu.be/aaaaaaaaaaa"),
            track("bbb", "Second Track", "https://youtu.be/bbbbbbbbbbb"),
            track("ccc", "Third Track", "https://youtu.be/ccccccccccc"),
        ],
    ));
    let supervisor = Arc::new(ProcessSupervisor::new());
    let runner = DownloadJobRunner::new(catalog, config, supervisor);

    run_with_path(Some(&bin_dir), async {
        runner.run("deepweb").await;
    })
    .await;

    let entries = tracks_dir_entries(&download_root, "deepweb");
    assert_eq!(entries.iter().filter(|n| n.ends_with(".mp3")).count(), 3);

    let playlist = std::fs::read_to_string(download_root.join("deepweb").join("playlist.m3u")).unwrap();
    assert!(playlist.contains("First Track"));
    assert!(playlist.contains("Second Track"));
    assert!(playlist.contains("Third Track"));
}

#[tokio::test]
async fn resume_skips_tracks_already_present_on_disk() {
    let tmp = tempfile::tempdir().unwrap();
    let bin_dir = tmp.path().join("bin");
    write_fake_binary(&bin_dir, FAKE_YTDLP);

    let download_root = tmp.path().join("downloads");
    let tracks_dir = download_root.join("deepweb").join("tracks");
    std::fs::create_dir_all(&tracks_dir).unwrap();
    std::fs::write(tracks_dir.join("first-track [aaa].mp3"), b"already there").unwrap();
    std::fs::write(tracks_dir.join("second-track [bbb].mp3"), b"already there").unwrap();

    let config = Arc::new(test_config(&download_root));
    let catalog: Arc<dyn Catalog> = Arc::new(MemoryCatalog::new("https://storage.example").with_channel(
        channel("deepweb"),
        vec![
            track("aaa", "First Track", "https://youtu.be/aaaaaaaaaaa"),
            track("bbb", "Second Track", "https://youtu.be/bbbbbbbbbbb"),
            track("ccc", "Third Track", "https://youtu.be/ccccccccccc"),
        ],
    ));
    let supervisor = Arc::new(ProcessSupervisor::new());
    let runner = DownloadJobRunner::new(catalog, config, supervisor);

    run_with_path(Some(&bin_dir), async {
        runner.run("deepweb").await;
    })
    .await;

    let entries = tracks_dir_entries(&download_root, "deepweb");
    assert_eq!(entries.iter().filter(|n| n.ends_with(".mp3")).count(), 3);
    assert_eq!(
        std::fs::read(tracks_dir.join("first-track [aaa].mp3")).unwrap(),
        b"already there",
        "pre-existing file must not be re-downloaded"
    );
}

#[tokio::test]
async fn already_downloaded_marker_counts_as_skip_but_still_postprocesses() {
    let tmp = tempfile::tempdir().unwrap();
    let bin_dir = tmp.path().join("bin");
    write_fake_binary(&bin_dir, FAKE_YTDLP);

    let download_root = tmp.path().join("downloads");
    let config = Arc::new(test_config(&download_root));
    let catalog: Arc<dyn Catalog> = Arc::new(MemoryCatalog::new("https://storage.example").with_channel(
        channel("deepweb"),
        vec![track("zzz", "Already Track", "https://youtu.be/ALREADYTRACK1")],
    ));
    let supervisor = Arc::new(ProcessSupervisor::new());
    let runner = DownloadJobRunner::new(catalog, config, supervisor);

    run_with_path(Some(&bin_dir), async {
        runner.run("deepweb").await;
    })
    .await;

    let entries = tracks_dir_entries(&download_root, "deepweb");
    assert_eq!(entries.iter().filter(|n| n.ends_with(".mp3")).count(), 1);
}

#[tokio::test]
async fn a_failing_track_does_not_abort_its_siblings() {
    let tmp = tempfile::tempdir().unwrap();
    let bin_dir = tmp.path().join("bin");
    write_fake_binary(&bin_dir, FAKE_YTDLP);

    let download_root = tmp.path().join("downloads");
    let config = Arc::new(test_config(&download_root));
    let catalog: Arc<dyn Catalog> = Arc::new(MemoryCatalog::new("https://storage.example").with_channel(
        channel("deepweb"),
        vec![
            track("aaa", "Good Track One", "https://youtu.be/aaaaaaaaaaa"),
            track("bbb", "Bad Track", "https://youtu.be/FAILTRACK0001"),
            track("ccc", "Good Track Two", "https://youtu.be/ccccccccccc"),
        ],
    ));
    let supervisor = Arc::new(ProcessSupervisor::new());
    let runner = DownloadJobRunner::new(catalog, config, supervisor);

    run_with_path(Some(&bin_dir), async {
        runner.run("deepweb").await;
    })
    .await;

    let entries = tracks_dir_entries(&download_root, "deepweb");
    assert!(entries.iter().any(|n| n.starts_with("good-track-one")));
    assert!(entries.iter().any(|n| n.starts_with("good-track-two")));
    assert!(!entries.iter().any(|n| n.starts_with("bad-track")));
}

#[tokio::test]
async fn missing_downloader_aborts_the_rest_of_the_job() {
    let tmp = tempfile::tempdir().unwrap();
    let download_root = tmp.path().join("downloads");
    let config = Arc::new(test_config(&download_root));
    let catalog: Arc<dyn Catalog> = Arc::new(MemoryCatalog::new("https://storage.example").with_channel(
        channel("deepweb"),
        vec![
            track("aaa", "First Track", "https://youtu.be/aaaaaaaaaaa"),
            track("bbb", "Second Track", "https://youtu.be/bbbbbbbbbbb"),
        ],
    ));
    let supervisor = Arc::new(ProcessSupervisor::new());
    let runner = DownloadJobRunner::new(catalog, config, supervisor);

    run_with_path(None, async {
        runner.run("deepweb").await;
    })
    .await;

    let entries = tracks_dir_entries(&download_root, "deepweb");
    assert!(entries.iter().all(|n| !n.ends_with(".mp3")), "no track should complete once the downloader can't spawn");
}

#[tokio::test]
async fn cancelling_mid_download_leaves_no_finished_file() {
    let tmp = tempfile::tempdir().unwrap();
    let bin_dir = tmp.path().join("bin");
    write_fake_binary(&bin_dir, SLOW_YTDLP);

    let download_root = tmp.path().join("downloads");
    let config = Arc::new(test_config(&download_root));
    let catalog: Arc<dyn Catalog> = Arc::new(MemoryCatalog::new("https://storage.example").with_channel(
        channel("deepweb"),
        vec![track("sss", "Slow Track", "https://youtu.be/sssssssssss")],
    ));
    let supervisor = Arc::new(ProcessSupervisor::new());
    let runner = Arc::new(DownloadJobRunner::new(catalog, config, supervisor.clone()));

    run_with_path(Some(&bin_dir), async {
        let runner = runner.clone();
        let handle = tokio::spawn(async move { runner.run("deepweb").await });

        tokio::time::sleep(Duration::from_millis(200)).await;
        supervisor.cancel().await;

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("job should finish shortly after cancellation")
            .unwrap();
    })
    .await;

    let entries = tracks_dir_entries(&download_root, "deepweb");
    assert!(entries.iter().all(|n| !n.ends_with(".mp3")), "a killed download must not leave a finished file behind");
}

#[tokio::test]
async fn unparseable_dates_do_not_prevent_download_or_stamping() {
    let tmp = tempfile::tempdir().unwrap();
    let bin_dir = tmp.path().join("bin");
    write_fake_binary(&bin_dir, FAKE_YTDLP);

    let download_root = tmp.path().join("downloads");
    let config = Arc::new(test_config(&download_root));
    let mut weird_track = track("ddd", "Undated Track", "https://youtu.be/ddddddddddd");
    weird_track.created_at = Some("not-a-real-date".to_string());
    weird_track.updated_at = Some("".to_string());

    let catalog: Arc<dyn Catalog> =
        Arc::new(MemoryCatalog::new("https://storage.example").with_channel(channel("deepweb"), vec![weird_track]));
    let supervisor = Arc::new(ProcessSupervisor::new());
    let runner = DownloadJobRunner::new(catalog, config, supervisor);

    run_with_path(Some(&bin_dir), async {
        runner.run("deepweb").await;
    })
    .await;

    let entries = tracks_dir_entries(&download_root, "deepweb");
    assert_eq!(entries.iter().filter(|n| n.ends_with(".mp3")).count(), 1, "a malformed date must not abort the track");
}

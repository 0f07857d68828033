use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use r4fs::app::App;
use r4fs::catalog::{self, SupabaseCatalog};
use r4fs::config::Config;
use r4fs::fs::fuse_adapter::FuseAdapter;
use r4fs::fs::Projection;

#[derive(Parser)]
#[command(name = "r4fs", version, about = "Read-only FUSE projection of a radio4000-style music catalog")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize config, connect the catalog, and mount the filesystem.
    Mount {
        /// Force debug-level logging regardless of `RUST_LOG`.
        #[arg(long)]
        debug: bool,
        /// Stay attached to the terminal (default for this implementation;
        /// real daemonizing is left to a process supervisor).
        #[arg(long)]
        foreground: bool,
    },
    /// Gracefully stop downloads and unmount.
    Unmount,
    /// Report mount state, mount point, and download root.
    Status,
}

fn main() {
    let cli = Cli::parse();

    let result = match &cli.command {
        Command::Mount { debug, foreground } => run_mount(*debug, *foreground),
        Command::Unmount => run_unmount(),
        Command::Status => run_status(),
    };

    if let Err(e) = result {
        eprintln!("r4fs: {e:#}");
        std::process::exit(1);
    }
}

fn init_logging(force_debug: bool) {
    let mut builder = env_logger::Builder::from_default_env();
    if force_debug {
        builder.filter_module("r4fs", log::LevelFilter::Debug);
    }
    builder.init();
}

fn run_mount(debug: bool, _foreground: bool) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    let (config, catalog, app) = runtime.block_on(async {
        let mut config = Config::load().context("loading config")?;
        config.settings.mount.debug = config.settings.mount.debug || debug;
        let config = Arc::new(config);

        let (Some(url), Some(key)) = (config.supabase_url.clone(), config.supabase_key.clone()) else {
            bail!("SUPABASE_URL and SUPABASE_KEY must be set (or their VITE_ aliases)");
        };
        let catalog: Arc<dyn catalog::Catalog> = Arc::new(SupabaseCatalog::new(url, key));

        let app = App::new(config.clone(), catalog.clone()).context("initializing app")?;
        app.enqueue_configured_downloads().await.context("enqueueing downloads.txt")?;

        Ok::<_, anyhow::Error>((config, catalog, app))
    })?;

    init_logging(config.settings.mount.debug || debug);

    let mount_point = config.mount_point();
    std::fs::create_dir_all(&mount_point).with_context(|| format!("creating mount point {}", mount_point.display()))?;

    let queue = app.queue.clone();
    let projection = Projection::new(catalog, config.clone(), queue.clone());

    let (uid, gid) = (nix::unistd::Uid::current().as_raw(), nix::unistd::Gid::current().as_raw());
    let adapter = FuseAdapter::new(projection, runtime.handle().clone(), uid, gid, queue, app.supervisor.clone());

    let app = Arc::new(app);
    {
        let app = app.clone();
        runtime.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("received interrupt, shutting down");
                app.shutdown().await;
                unmount_best_effort(&app.config.mount_point());
            }
        });
    }

    info!("mounting at {}", mount_point.display());
    let options = vec![
        fuser::MountOption::RO,
        fuser::MountOption::FSName("r4fs".to_string()),
    ];
    fuser::mount2(adapter, &mount_point, &options).context("mounting filesystem")?;

    Ok(())
}

fn run_unmount() -> Result<()> {
    let config = Config::load().context("loading config")?;
    unmount_best_effort(&config.mount_point());
    Ok(())
}

fn unmount_best_effort(mount_point: &PathBuf) {
    #[cfg(target_os = "linux")]
    let result = std::process::Command::new("fusermount").arg("-u").arg(mount_point).status();
    #[cfg(not(target_os = "linux"))]
    let result = std::process::Command::new("umount").arg(mount_point).status();

    match result {
        Ok(status) if status.success() => info!("unmounted {}", mount_point.display()),
        Ok(status) => log::warn!("unmount exited with {status}"),
        Err(e) => log::warn!("unmount command failed: {e}"),
    }
}

fn run_status() -> Result<()> {
    let config = Config::load().context("loading config")?;
    let mount_point = config.mount_point();
    let mounted = is_mounted(&mount_point);

    println!("mounted: {mounted}");
    println!("mount point: {}", mount_point.display());
    println!("download root: {}", config.download_root().display());

    Ok(())
}

fn is_mounted(mount_point: &PathBuf) -> bool {
    let Ok(mounts) = std::fs::read_to_string("/proc/mounts") else {
        return false;
    };
    let target = mount_point.to_string_lossy();
    mounts.lines().any(|line| line.split_whitespace().nth(1) == Some(target.as_ref()))
}

//! ytmusic - playback queue and offline downloads for a YT Music backend

#![allow(dead_code)]

mod config;
mod core;
mod db;
mod models;
mod remote;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config::{Paths, UserConfig};
use crate::core::{DeleteOutcome, DownloadManager, PlayerSession};
use crate::db::{run_migrations, DbEngine, DownloadTable};
use crate::models::{DownloadState, Track};
use crate::remote::YtMusicClient;

/// ytmusic - offline downloads and queue tools
#[derive(Parser, Debug)]
#[command(name = "ytmusic")]
#[command(version)]
#[command(about = "Playback queue and offline downloads for a YT Music backend")]
struct Args {
    /// Enable debug mode
    #[arg(long, global = true)]
    debug: bool,

    /// Path to config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download a track for offline playback
    Download {
        /// Video id of the track
        id: String,
        /// Title to store (fetched from the backend when omitted)
        #[arg(long)]
        title: Option<String>,
        /// Artist to store (fetched from the backend when omitted)
        #[arg(long)]
        artist: Option<String>,
    },
    /// Remove a downloaded track
    Delete { id: String },
    /// List downloaded tracks, newest first
    List,
    /// Print the file of a downloaded track
    Path { id: String },
    /// Show download count and disk usage
    Stats,
    /// Start a radio from a track and print what would play
    Radio {
        id: String,
        /// How many tracks to play, the seed included
        #[arg(long, default_value_t = 10)]
        count: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // initialize logging; RUST_LOG still wins for individual targets
    let log_level = if args.debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("{},sqlx=warn", log_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    let paths = Paths::new(args.config)?;
    info!("Config directory: {:?}", paths.config_dir());

    let config = UserConfig::load(&paths)?;
    let client = Arc::new(YtMusicClient::new(
        &config.api_base_url,
        &config.download_quality,
        config.connect_timeout(),
    )?);

    match args.command {
        Command::Radio { id, count } => radio(client, &config, &id, count).await,
        Command::Download { id, title, artist } => {
            let manager = open_manager(&paths, &config, Arc::clone(&client)).await?;
            download(&manager, &client, id, title, artist).await
        }
        Command::Delete { id } => {
            let manager = open_manager(&paths, &config, client).await?;
            match manager.delete(&id).await? {
                DeleteOutcome::Removed => println!("Removed {}", id),
                DeleteOutcome::NotDownloaded => println!("{} is not downloaded", id),
                DeleteOutcome::RecordRemovedFileKept => {
                    println!("Removed {} from the library; its file could not be deleted", id)
                }
            }
            Ok(())
        }
        Command::List => {
            let manager = open_manager(&paths, &config, client).await?;
            for record in manager.all_downloads().await? {
                let when = chrono::DateTime::from_timestamp_millis(record.downloaded_at)
                    .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                println!(
                    "{}\t{} - {}\t{}\t{}",
                    record.track_id,
                    record.artist,
                    record.title,
                    format_size(record.file_size),
                    when
                );
            }
            Ok(())
        }
        Command::Path { id } => {
            let manager = open_manager(&paths, &config, client).await?;
            match manager.file_path(&id).await? {
                Some(path) => println!("{}", path.display()),
                None => anyhow::bail!("{} is not downloaded", id),
            }
            Ok(())
        }
        Command::Stats => {
            let manager = open_manager(&paths, &config, client).await?;
            let stats = manager.stats().await?;
            println!("{} tracks, {}", stats.count, format_size(stats.total_size));
            Ok(())
        }
    }
}

async fn open_manager(
    paths: &Paths,
    config: &UserConfig,
    client: Arc<YtMusicClient>,
) -> Result<DownloadManager> {
    let engine = DbEngine::open(&paths.app_db_path()).await?;
    run_migrations(&engine).await?;

    Ok(DownloadManager::new(
        client,
        Arc::new(DownloadTable::new(engine)),
        paths.downloads_dir(),
        config.download_settings(),
    ))
}

async fn download(
    manager: &DownloadManager,
    client: &YtMusicClient,
    id: String,
    title: Option<String>,
    artist: Option<String>,
) -> Result<()> {
    let track = match (title, artist) {
        (Some(title), Some(artist)) => Track::new(id, title, artist),
        (title, artist) => {
            let mut track = client
                .metadata(&id)
                .await
                .with_context(|| format!("Failed to fetch metadata for {}", id))?;
            if let Some(title) = title {
                track.title = title;
            }
            if let Some(artist) = artist {
                track.artist = artist;
            }
            track
        }
    };

    let (bar, progress) = spawn_progress_bar(manager);
    let result = manager.download(&track).await;
    progress.abort();

    match &result {
        Ok(_) => bar.finish(),
        Err(e) => bar.abandon_with_message(e.to_string()),
    }

    let record = result?;
    println!("{}\t{}", record.track_id, record.file_path);
    Ok(())
}

async fn radio(client: Arc<YtMusicClient>, config: &UserConfig, id: &str, count: usize) -> Result<()> {
    let seed = client.metadata(id).await?;
    let mut session = PlayerSession::new().with_related(client, config.related_limit);

    for track in radio_tracks(&mut session, seed, count).await {
        println!("{}\t{} - {}", track.id, track.artist, track.title);
    }

    Ok(())
}

/// Play `seed` and then advance until `count` tracks have played or nothing follows
async fn radio_tracks(session: &mut PlayerSession, seed: Track, count: usize) -> Vec<Track> {
    let mut played = Vec::with_capacity(count);
    let mut current = session.play_track(seed);

    while let Some(track) = current {
        if played.len() == count {
            break;
        }
        played.push(track);
        if played.len() == count {
            break;
        }
        current = session.next().await;
    }

    played
}

/// Render the published download state as a progress bar until aborted.
/// The caller settles the bar once the download returns.
fn spawn_progress_bar(manager: &DownloadManager) -> (ProgressBar, tokio::task::JoinHandle<()>) {
    let mut rx = manager.subscribe();
    let bar = ProgressBar::new(1000);
    if let Ok(style) = ProgressStyle::default_bar().template("{msg} [{bar:40}] {percent}%") {
        bar.set_style(style);
    }

    let handle = bar.clone();
    let task = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let state = rx.borrow_and_update().clone();
            match state {
                DownloadState::Downloading { track_id, progress } => {
                    bar.set_message(track_id);
                    bar.set_position((progress * 1000.0) as u64);
                }
                DownloadState::Completed { .. } => bar.finish(),
                DownloadState::Error { message, .. } => bar.abandon_with_message(message),
                DownloadState::Idle => {}
            }
        }
    });

    (handle, task)
}

fn format_size(bytes: i64) -> String {
    const MB: f64 = 1024.0 * 1024.0;
    if bytes as f64 >= MB {
        format!("{:.1} MB", bytes as f64 / MB)
    } else {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    }
}

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::cargo)]
#![warn(clippy::perf)]
#![warn(clippy::complexity)]
#![warn(clippy::style)]
#![allow(clippy::multiple_crate_versions)]

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
    time::Duration,
};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use livelist::{
    cache::StreamCache,
    channels::{ChannelRecord, read_channel_list},
    extractor::{ExtractorMode, StreamExtractor as _, select_extractor},
    orchestrator::{DEFAULT_PLACEHOLDER_URL, Orchestrator, OrchestratorConfig, Origin},
    playlist::{self, DEFAULT_EPG_URL},
    resolver::BoundedResolver,
    util::spawn_ct_watcher,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Builds a live-TV M3U playlist by resolving channel pages into direct stream URLs
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Channel list file to build the playlist from
    #[arg(default_value = "youtube_channel_info.txt")]
    channels: PathBuf,

    /// Write the playlist to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Stream cache snapshot location
    #[arg(long, default_value = "assets/stream_cache.json")]
    cache_file: PathBuf,

    /// Seconds a cached stream URL stays usable as a fallback
    #[arg(long, default_value_t = 30 * 60)]
    cache_ttl: i64,

    /// Hard per-channel resolution deadline in seconds
    #[arg(long, default_value_t = 6)]
    timeout: u64,

    /// Timeout for a single URL-variant attempt in seconds
    #[arg(long, default_value_t = 4)]
    attempt_timeout: u64,

    /// Extraction backend
    #[arg(long, value_enum, default_value_t = ExtractorMode::Auto)]
    extractor: ExtractorMode,

    /// Stream URL emitted when a channel cannot be resolved at all
    #[arg(long, default_value = DEFAULT_PLACEHOLDER_URL)]
    placeholder: String,

    /// EPG index URL referenced from the playlist header
    #[arg(long, default_value = DEFAULT_EPG_URL)]
    epg_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Diagnostics go to stderr; stdout carries only the playlist
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let ct = CancellationToken::new();
    spawn_ct_watcher(ct.clone());

    let records = read_channel_list(&args.channels).await?;
    info!(
        "Loaded {} channel records from {}",
        records.len(),
        args.channels.display()
    );

    let mut cache = StreamCache::load(&args.cache_file).await;
    if !cache.is_empty() {
        info!("Loaded {} cached stream URLs", cache.len());
    }

    let cookies = std::env::var("YT_COOKIES")
        .ok()
        .filter(|c| !c.trim().is_empty());
    if cookies.is_some() {
        debug!("Using cookie jar contents from YT_COOKIES");
    }

    let extractor = select_extractor(args.extractor, cookies, args.attempt_timeout).await;
    info!("Resolving streams via the {} backend", extractor.name());

    let resolver = BoundedResolver::new(
        extractor,
        Duration::from_secs(args.timeout),
        Duration::from_secs(args.attempt_timeout),
    );
    let orchestrator = Orchestrator::new(
        resolver,
        OrchestratorConfig {
            cache_ttl_secs: args.cache_ttl,
            placeholder_url: args.placeholder,
        },
    );

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path).with_context(|| {
            format!("Creating playlist output file {}", path.display())
        })?)),
        None => Box::new(std::io::stdout().lock()),
    };

    playlist::write_header(&mut out, &args.epg_url, Utc::now())?;

    let (mut fresh, mut cached, mut placeholders) = (0_u32, 0_u32, 0_u32);

    for record in records {
        if ct.is_cancelled() {
            warn!("Interrupted, skipping the remaining channels");
            break;
        }

        match record {
            ChannelRecord::Info(info) => playlist::write_channel_info(&mut out, &info)?,
            ChannelRecord::Url(channel_url) => {
                let resolution = orchestrator
                    .resolve_channel(&mut cache, &channel_url, Utc::now().timestamp())
                    .await;

                match resolution.origin {
                    Origin::Fresh => fresh += 1,
                    Origin::StaleCache => cached += 1,
                    Origin::Placeholder => placeholders += 1,
                }

                playlist::write_stream_url(&mut out, &resolution.url)?;
            }
        }
    }

    playlist::write_static_tail(&mut out)?;
    out.flush().context("Flushing playlist output")?;

    info!("Playlist complete: {fresh} fresh, {cached} from cache, {placeholders} placeholders");

    Ok(())
}

//! mgd-rec - command-line front end
//!
//! `recommend` catalogues an audio file and prints its nearest catalog
//! neighbours as JSON; `stats` prints the catalog size.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use mgd_common::config::{database_path, load_config, resolve_root_folder};
use mgd_common::logging::init_tracing;
use mgd_rec::audio::ContainerFormat;
use mgd_rec::{
    PipelineConfig, RecommendRequest, RecommendationPipeline, SqliteCatalog, TrackMetadata,
};

/// Command-line arguments for mgd-rec
#[derive(Parser, Debug)]
#[command(name = "mgd-rec")]
#[command(about = "Content-based music recommendation")]
#[command(version)]
struct Args {
    /// Root folder holding the catalog database
    #[arg(short, long, env = "MGD_ROOT")]
    root_folder: Option<String>,

    /// Configuration file
    #[arg(short, long, env = "MGD_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Catalogue an audio file and print similar tracks as JSON
    Recommend {
        /// Audio file (WAV, FLAC, MP3, Ogg/Vorbis, M4A, AAC)
        file: PathBuf,

        /// Title stored with a newly catalogued track
        #[arg(long)]
        title: Option<String>,

        /// Artist stored with a newly catalogued track
        #[arg(long)]
        artist: Option<String>,

        /// Number of recommendations
        #[arg(short, long)]
        k: Option<usize>,
    },

    /// Print the number of catalogued tracks
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config.logging).context("Failed to initialise logging")?;

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &config);
    let db_path = database_path(&root_folder);
    info!("Database: {}", db_path.display());

    let catalog = SqliteCatalog::open(&db_path)
        .await
        .context("Failed to open catalog")?;

    let outcome = match args.command {
        Command::Recommend {
            file,
            title,
            artist,
            k,
        } => recommend(&catalog, &config.recommend, file, title, artist, k).await,
        Command::Stats => catalog
            .count()
            .await
            .map(|count| println!("{}", count))
            .context("Failed to count catalog entries"),
    };

    catalog.close().await;
    outcome
}

async fn recommend(
    catalog: &SqliteCatalog,
    settings: &mgd_common::config::RecommendSettings,
    file: PathBuf,
    title: Option<String>,
    artist: Option<String>,
    k: Option<usize>,
) -> Result<()> {
    let audio = tokio::fs::read(&file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let defaults = TrackMetadata::default();
    let metadata = TrackMetadata::new(
        title.unwrap_or(defaults.title),
        artist.unwrap_or(defaults.artist),
    );

    let mut request = RecommendRequest::new(audio).with_metadata(metadata);
    if let Some(k) = k {
        request = request.with_k(k);
    }
    if let Some(format) = file
        .extension()
        .and_then(|e| e.to_str())
        .and_then(ContainerFormat::from_extension)
    {
        request = request.with_declared_format(format);
    }

    let pipeline = RecommendationPipeline::new(Arc::new(catalog.clone()))
        .with_config(PipelineConfig::from(settings));

    let recommendations = pipeline
        .recommend(request)
        .await
        .with_context(|| format!("Recommendation failed for {}", file.display()))?;

    println!("{}", serde_json::to_string_pretty(&recommendations)?);
    Ok(())
}

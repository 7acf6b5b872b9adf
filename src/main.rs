mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use cli::{Cli, Command};
use peakprint::audio::decode::decode_audio;
use peakprint::config::{self, FingerprintConfig};
use peakprint::{AnchoredFingerprint, FingerprintDatabase};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    let config = resolve_config(cli.config.as_deref());

    match cli.command {
        Command::Index { files, id } => {
            if id.is_some() && files.len() > 1 {
                anyhow::bail!("--id can only be used when indexing a single file");
            }
            let mut db = open_database(&cli.db, config)?;
            index_files(&mut db, &files, id)?;
            db.save(&cli.db)
                .with_context(|| format!("Failed to save database: {}", cli.db.display()))?;
        }
        Command::Recognize { file, top, json } => {
            let db = open_database(&cli.db, config)?;
            recognize_file(&db, &file, top, json)?;
        }
        Command::Remove { track_id } => {
            let mut db = open_database(&cli.db, config)?;
            if !db.remove_track(&track_id) {
                anyhow::bail!("Track '{}' is not in the database", track_id);
            }
            db.save(&cli.db)
                .with_context(|| format!("Failed to save database: {}", cli.db.display()))?;
        }
        Command::Stats => {
            let db = open_database(&cli.db, config)?;
            let stats = db.stats();
            println!("Tracks:       {}", stats.tracks);
            println!("Fingerprints: {}", stats.fingerprints);
            println!("Entries:      {}", stats.entries);
            if let Some(rate) = db.sample_rate() {
                println!("Sample rate:  {}Hz", rate);
            }
            for id in db.track_ids() {
                println!("  {}", id);
            }
        }
    }

    Ok(())
}

/// Explicit --config path, or auto-detect peakprint.toml / user config.
fn resolve_config(explicit: Option<&Path>) -> FingerprintConfig {
    let config_path = explicit.map(Path::to_path_buf).or_else(|| {
        let local = PathBuf::from("peakprint.toml");
        if local.exists() {
            return Some(local);
        }
        if let Some(home) = dirs::home_dir() {
            let xdg = home.join(".config").join("peakprint").join("config.toml");
            if xdg.exists() {
                return Some(xdg);
            }
        }
        if let Some(config_dir) = dirs::config_dir() {
            let platform = config_dir.join("peakprint").join("config.toml");
            if platform.exists() {
                return Some(platform);
            }
        }
        None
    });

    match config_path {
        Some(path) => match config::load_config(&path) {
            Some(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            None => {
                log::warn!("Failed to load config from {}, using defaults", path.display());
                FingerprintConfig::default()
            }
        },
        None => FingerprintConfig::default(),
    }
}

fn open_database(path: &Path, config: FingerprintConfig) -> Result<FingerprintDatabase> {
    if !path.exists() {
        log::info!("Creating new database at {}", path.display());
        return FingerprintDatabase::new(config).context("Invalid fingerprint config");
    }

    let db = FingerprintDatabase::load(path)
        .with_context(|| format!("Failed to load database: {}", path.display()))?;
    if db.config() != &config {
        log::warn!("Config differs from the one {} was built with; using the stored config", path.display());
    }
    Ok(db)
}

fn index_files(db: &mut FingerprintDatabase, files: &[PathBuf], id: Option<String>) -> Result<()> {
    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} tracks ({eta} remaining)")?
            .progress_chars("=>-"),
    );

    // Decoding and analysis are independent per file; merging is sequential.
    let analysed: Vec<Result<(String, u32, Vec<AnchoredFingerprint>)>> = files
        .par_iter()
        .map(|path| {
            let track_id = match &id {
                Some(id) => id.clone(),
                None => track_id_for(path)?,
            };
            let signal = decode_audio(path)?;
            let prints = db
                .fingerprint(signal.samples(), signal.sample_rate())
                .with_context(|| format!("Failed to fingerprint {}", path.display()))?;
            pb.inc(1);
            Ok((track_id, signal.sample_rate(), prints))
        })
        .collect();

    pb.finish_with_message("Analysis complete");

    for result in analysed {
        let (track_id, sample_rate, prints) = result?;
        if db.contains_track(&track_id) {
            log::warn!("Track '{}' is already indexed; its entries will be duplicated", track_id);
        }
        db.insert_fingerprints(&track_id, sample_rate, &prints)?;
    }

    let stats = db.stats();
    log::info!(
        "Database now holds {} tracks, {} fingerprints, {} entries",
        stats.tracks,
        stats.fingerprints,
        stats.entries
    );
    Ok(())
}

fn track_id_for(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .with_context(|| format!("Cannot derive a track id from {}", path.display()))
}

fn recognize_file(db: &FingerprintDatabase, file: &Path, top: Option<usize>, json: bool) -> Result<()> {
    let signal = decode_audio(file)?;
    log::info!("Recognizing {} ({:.1}s)", file.display(), signal.duration());

    let mut results = db
        .rank(signal.samples(), signal.sample_rate())
        .with_context(|| format!("Failed to recognize {}", file.display()))?;
    results.truncate(top.unwrap_or(1));

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No match");
        return Ok(());
    }
    for hit in &results {
        match hit.offset_seconds(db.config(), signal.sample_rate()) {
            Some(offset) => println!("{:<30} score={:<6} offset={:.2}s", hit.track_id, hit.score, offset),
            None => println!("{:<30} score={}", hit.track_id, hit.score),
        }
    }
    Ok(())
}

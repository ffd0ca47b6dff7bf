use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;

use paceline::deezer::DeezerClient;
use paceline::store::{TrackFactStore, VerificationStore};
use paceline::{catalog, clean, crowd, danceability, runnability, verify};

#[derive(Parser)]
#[command(name = "paceline", version, about = "Running-playlist catalog curator")]
struct Cli {
    /// Path to the catalog JSON file
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify catalog BPM and duration against the Deezer API
    Verify {
        /// Report output path (defaults to the data dir)
        #[arg(long)]
        report: Option<PathBuf>,

        /// Also write a catalog copy with authoritative values applied to mismatches
        #[arg(long, value_name = "PATH")]
        write_corrected: Option<PathBuf>,
    },

    /// Trim the catalog down to externally verified facts
    Clean {
        /// Write the clean catalog here instead of rewriting in place
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Show outcome counts without writing the catalog
        #[arg(long)]
        dry_run: bool,
    },

    /// Assign heuristic danceability scores to unscored entries
    Danceability {
        /// Show what would be assigned without writing the catalog
        #[arg(long)]
        dry_run: bool,
    },

    /// Score all entries for running-playlist suitability
    Runnability {
        /// Crowd-signal file (array of {artistName, title, source_count})
        #[arg(long)]
        crowd: Option<PathBuf>,

        /// Show the score distribution without writing the catalog
        #[arg(long)]
        dry_run: bool,
    },

    /// Show catalog statistics
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = paceline::config::AppConfig::load();

    // Resolve catalog path: CLI > config
    let catalog_path = match cli.catalog.or(config.catalog_path.clone()) {
        Some(path) => path,
        None => anyhow::bail!(
            "No catalog file. Pass --catalog or set catalog_path in config."
        ),
    };
    log::info!("Catalog: {}", catalog_path.display());

    match cli.command {
        Commands::Verify {
            report,
            write_corrected,
        } => {
            let songs = catalog::load(&catalog_path).context("Failed to load catalog")?;
            println!("Loaded {} curated songs", songs.len());

            let mut store =
                VerificationStore::open(&config.verification_path(), config.deezer.save_interval)
                    .context("Failed to open verification store")?;
            println!("Resuming with {} already verified", store.len());

            let client = DeezerClient::new(config.deezer.search_limit);
            let summary = verify::verify_catalog(
                &songs,
                &mut store,
                &client,
                &config.deezer,
                &config.verify,
            )
            .context("Verification failed")?;

            println!();
            println!("Verification complete:");
            println!("  Total songs:     {}", summary.total);
            println!("  Verified OK:     {}", summary.verified_ok);
            println!("  BPM mismatch:    {}", summary.mismatches.len());
            println!("  Deezer BPM=0:    {}", summary.no_data.len());
            println!("  Not found:       {}", summary.not_found.len());

            let report_path = report.unwrap_or_else(|| config.report_path());
            verify::write_report(&report_path, &summary, &config.verify)
                .context("Failed to write report")?;
            println!("Report written to: {}", report_path.display());

            if let Some(path) = write_corrected {
                let corrections = verify::write_corrected(&path, &songs, &store, &config.verify)
                    .context("Failed to write corrected catalog")?;
                println!(
                    "Corrected catalog written to: {} ({} BPM corrections)",
                    path.display(),
                    corrections
                );
            }
        }

        Commands::Clean { output, dry_run } => {
            if dry_run {
                println!("DRY RUN — the catalog will not be rewritten");
            }
            let songs = catalog::load(&catalog_path).context("Failed to load catalog")?;
            println!("Loaded {} curated songs", songs.len());

            let verification =
                VerificationStore::open(&config.verification_path(), config.deezer.save_interval)
                    .context("Failed to open verification store")?;
            let mut facts =
                TrackFactStore::open(&config.track_fact_path(), config.deezer.save_interval)
                    .context("Failed to open track-fact store")?;
            println!("Track cache: {} entries", facts.len());

            let client = DeezerClient::new(config.deezer.search_limit);
            let fetch = clean::fetch_track_facts(
                &songs,
                &verification,
                &mut facts,
                &client,
                &config.deezer,
            )
            .context("Track-fact fetch failed")?;
            if fetch.needed > 0 {
                println!(
                    "Fetched {} tracks for release dates ({} failed)",
                    fetch.fetched, fetch.failed
                );
            }

            let outcome = clean::clean_catalog(&songs, &verification, &facts);
            let s = &outcome.summary;
            println!();
            println!("Cleanup complete:");
            println!("  Original songs:      {}", s.original);
            println!("  Clean songs:         {}", s.kept);
            println!("  Removed (not found):  {}", s.removed_not_found);
            println!("  BPM from Deezer:      {}", s.bpm_from_source);
            println!("  BPM dropped:          {}", s.bpm_dropped);
            println!("  Duration from Deezer: {}", s.duration_from_source);
            println!("  Decade from Deezer:   {}", s.decade_from_source);
            println!("  Decade kept original: {}", s.decade_kept_original);

            if dry_run {
                println!("(dry run — re-run without --dry-run to write changes)");
            } else {
                let out = output.unwrap_or(catalog_path);
                catalog::save(&out, &outcome.songs).context("Failed to write catalog")?;
                println!("Clean catalog written to: {}", out.display());
            }
        }

        Commands::Danceability { dry_run } => {
            let mut songs = catalog::load(&catalog_path).context("Failed to load catalog")?;
            println!("Loaded {} songs", songs.len());

            let summary = danceability::estimate_danceability(&mut songs, &config.scoring);
            println!("Already had danceability: {}", summary.already_scored);
            println!("Enriched: {}", summary.enriched);

            if summary.enriched > 0 {
                println!();
                println!("Danceability by genre (mean / min / max):");
                for (genre, mean, min, max, count) in summary.genre_spread() {
                    println!("  {genre:<15} {mean:5.1}  ({min}-{max})  [{count} songs]");
                }
            }

            if dry_run {
                println!("(dry run — re-run without --dry-run to write changes)");
            } else {
                catalog::save(&catalog_path, &songs).context("Failed to write catalog")?;
                println!("Written enriched data to {}", catalog_path.display());
            }
        }

        Commands::Runnability {
            crowd: crowd_file,
            dry_run,
        } => {
            let crowd_path = match crowd_file.or(config.crowd_path.clone()) {
                Some(path) => path,
                None => anyhow::bail!(
                    "No crowd-signal file. Pass --crowd or set crowd_path in config."
                ),
            };
            let crowd_map = crowd::load_crowd_map(&crowd_path)
                .context("Failed to load crowd signal")?;
            println!("Loaded {} unique crowd identities", crowd_map.len());

            let mut songs = catalog::load(&catalog_path).context("Failed to load catalog")?;
            println!("Loaded {} songs", songs.len());

            let summary =
                runnability::estimate_runnability(&mut songs, &crowd_map, &config.scoring);
            println!();
            println!("Results:");
            println!("  Total songs:       {}", summary.total);
            println!("  Crowd matched:     {}", summary.crowd_matched);
            println!("  Feature-only:      {}", summary.feature_only);
            println!("  Avg runnability:   {:.1}", summary.mean());
            println!("  Min runnability:   {}", summary.min());
            println!("  Max runnability:   {}", summary.max());

            println!();
            println!("Distribution:");
            for (i, count) in summary.histogram().iter().enumerate() {
                let lo = i * 10;
                let hi = if i < 9 { lo + 9 } else { 100 };
                let bar = "#".repeat(count / 10);
                println!("  {lo:3}-{hi:3}: {count:5} {bar}");
            }

            if dry_run {
                println!("(dry run — re-run without --dry-run to write changes)");
            } else {
                catalog::save(&catalog_path, &songs).context("Failed to write catalog")?;
                println!("Written scores to {}", catalog_path.display());
            }
        }

        Commands::Stats => {
            let songs = catalog::load(&catalog_path).context("Failed to load catalog")?;

            let with_bpm = songs.iter().filter(|s| s.bpm.is_some()).count();
            let with_duration = songs.iter().filter(|s| s.duration_seconds.is_some()).count();
            let with_decade = songs.iter().filter(|s| s.decade.is_some()).count();
            let dance_scores: Vec<i64> = songs.iter().filter_map(|s| s.danceability).collect();
            let run_scores: Vec<i64> = songs.iter().filter_map(|s| s.runnability).collect();

            println!("Catalog Statistics");
            println!("==================");
            println!("Total songs:       {}", songs.len());
            println!("With BPM:          {with_bpm}");
            println!("With duration:     {with_duration}");
            println!("With decade:       {with_decade}");
            println!("With danceability: {}", dance_scores.len());
            println!("With runnability:  {}", run_scores.len());

            if !dance_scores.is_empty() {
                let mean = dance_scores.iter().sum::<i64>() as f64 / dance_scores.len() as f64;
                println!("Mean danceability: {mean:.1}");
            }
            if !run_scores.is_empty() {
                let mean = run_scores.iter().sum::<i64>() as f64 / run_scores.len() as f64;
                println!("Mean runnability:  {mean:.1}");
            }

            let mut genres: BTreeMap<&str, usize> = BTreeMap::new();
            for song in &songs {
                let genre = if song.genre.is_empty() {
                    "unknown"
                } else {
                    song.genre.as_str()
                };
                *genres.entry(genre).or_insert(0) += 1;
            }
            if !genres.is_empty() {
                println!();
                println!("Genres:");
                for (genre, count) in &genres {
                    println!("  {genre:<15} {count}");
                }
            }
        }
    }

    Ok(())
}

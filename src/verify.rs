use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use crate::catalog::{self, Song};
use crate::config::{DeezerConfig, VerifyConfig};
use crate::deezer::{MetadataSource, pick_candidate};
use crate::store::{VerificationRecord, VerificationStore};

/// Post-verification bucket for one entry. Reporting state only; the
/// durable verdict is the [`VerificationRecord`].
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Verified,
    Mismatch { bpm_diff: i64, dur_diff: i64 },
    NoData,
    NotFound,
}

/// A BPM mismatch for the report.
#[derive(Debug, Clone)]
pub struct Mismatch {
    pub artist: String,
    pub title: String,
    pub curated_bpm: i64,
    pub curated_duration: Option<i64>,
    pub deezer_artist: String,
    pub deezer_title: String,
    pub deezer_bpm: i64,
    pub deezer_duration: i64,
    pub bpm_diff: i64,
    pub dur_diff: i64,
}

/// An entry the source knows but has no BPM data for.
#[derive(Debug, Clone)]
pub struct NoDataEntry {
    pub artist: String,
    pub title: String,
    pub curated_bpm: Option<i64>,
}

/// Result of a verification run.
pub struct VerifySummary {
    pub total: usize,
    pub verified_ok: usize,
    pub mismatches: Vec<Mismatch>,
    pub no_data: Vec<NoDataEntry>,
    pub not_found: Vec<(String, String)>,
    pub new_lookups: usize,
    pub already_verified: usize,
}

/// Resolve every catalog entry against the metadata source and persist a
/// durable verdict per identity. Entries already in the store are skipped
/// without an external call, so an interrupted run resumes where it left
/// off. One failed lookup never aborts the rest of the catalog.
pub fn verify_catalog(
    songs: &[Song],
    store: &mut VerificationStore,
    source: &dyn MetadataSource,
    deezer_cfg: &DeezerConfig,
    verify_cfg: &VerifyConfig,
) -> Result<VerifySummary> {
    let mut summary = VerifySummary {
        total: songs.len(),
        verified_ok: 0,
        mismatches: Vec::new(),
        no_data: Vec::new(),
        not_found: Vec::new(),
        new_lookups: 0,
        already_verified: store.len(),
    };

    log::info!(
        "Verifying {} songs ({} already resolved)",
        songs.len(),
        store.len()
    );

    let pb = ProgressBar::new(songs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} songs ({eta} remaining) {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );

    let delay = Duration::from_millis(deezer_cfg.rate_limit_ms);

    for song in songs {
        let key = song.key();
        pb.set_message(format!("{} - {}", song.artist_name, song.title));

        let record = match store.get(&key) {
            Some(record) => record.clone(),
            None => {
                let record = lookup(source, song, delay);
                summary.new_lookups += 1;
                store
                    .insert(key, record.clone())
                    .context("Failed to checkpoint verification record")?;
                record
            }
        };

        match classify(song, &record, verify_cfg) {
            Classification::Verified => summary.verified_ok += 1,
            Classification::NotFound => summary
                .not_found
                .push((song.artist_name.clone(), song.title.clone())),
            Classification::NoData => summary.no_data.push(NoDataEntry {
                artist: song.artist_name.clone(),
                title: song.title.clone(),
                curated_bpm: song.bpm,
            }),
            Classification::Mismatch { bpm_diff, dur_diff } => {
                let VerificationRecord::Ok {
                    deezer_title,
                    deezer_artist,
                    deezer_bpm,
                    deezer_duration,
                    ..
                } = &record
                else {
                    unreachable!("mismatch classification implies an ok record");
                };
                summary.mismatches.push(Mismatch {
                    artist: song.artist_name.clone(),
                    title: song.title.clone(),
                    curated_bpm: song.bpm.unwrap_or(0),
                    curated_duration: song.duration_seconds,
                    deezer_artist: deezer_artist.clone(),
                    deezer_title: deezer_title.clone(),
                    deezer_bpm: deezer_bpm.round() as i64,
                    deezer_duration: *deezer_duration,
                    bpm_diff,
                    dur_diff,
                });
            }
        }

        pb.inc(1);
    }

    store.flush().context("Failed to flush verification store")?;
    pb.finish_with_message("done");

    // Severity order for the report
    summary
        .mismatches
        .sort_by(|a, b| b.bpm_diff.cmp(&a.bpm_diff));

    Ok(summary)
}

/// Resolve one entry: search, pick a candidate, fetch full track detail.
/// Any transport or parse failure counts as not-found for this entry.
fn lookup(source: &dyn MetadataSource, song: &Song, delay: Duration) -> VerificationRecord {
    let hits = match source.search(&song.artist_name, &song.title) {
        Ok(hits) => hits,
        Err(e) => {
            log::warn!(
                "Search failed for {} - {}: {e:#}",
                song.artist_name,
                song.title
            );
            thread::sleep(delay);
            return VerificationRecord::NotFound;
        }
    };
    thread::sleep(delay);

    let Some(hit) = pick_candidate(&hits, &song.artist_name) else {
        return VerificationRecord::NotFound;
    };

    let track = source.track(hit.id);
    thread::sleep(delay);

    match track {
        Ok(Some(track)) => VerificationRecord::Ok {
            deezer_id: track.id,
            deezer_title: track.title.clone(),
            deezer_artist: track.artist_name().to_string(),
            deezer_bpm: track.bpm,
            deezer_duration: track.duration,
        },
        Ok(None) => VerificationRecord::NotFound,
        Err(e) => {
            log::warn!(
                "Track fetch failed for {} - {}: {e:#}",
                song.artist_name,
                song.title
            );
            VerificationRecord::NotFound
        }
    }
}

/// Compare the catalog entry against its verdict. An entry with no curated
/// BPM has nothing to compare and counts as verified; the authoritative
/// value flows in at clean time.
pub fn classify(song: &Song, record: &VerificationRecord, cfg: &VerifyConfig) -> Classification {
    let VerificationRecord::Ok {
        deezer_bpm,
        deezer_duration,
        ..
    } = record
    else {
        return Classification::NotFound;
    };

    if *deezer_bpm == 0.0 {
        return Classification::NoData;
    }

    let Some(bpm) = song.bpm else {
        return Classification::Verified;
    };

    let bpm_diff = (bpm - deezer_bpm.round() as i64).abs();
    let dur_diff = match song.duration_seconds {
        Some(dur) if *deezer_duration > 0 => (dur - deezer_duration).abs(),
        _ => 0,
    };

    if bpm_diff > cfg.bpm_tolerance {
        Classification::Mismatch { bpm_diff, dur_diff }
    } else {
        Classification::Verified
    }
}

/// Write the human-readable verification report: bucket counts, then
/// mismatches sorted by severity, then the not-found and no-data listings.
pub fn write_report(path: &Path, summary: &VerifySummary, cfg: &VerifyConfig) -> Result<()> {
    let mut out = String::new();

    out.push_str("BPM Verification Report\n");
    out.push_str("=======================\n");
    out.push_str(&format!(
        "Generated:       {}\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    out.push_str(&format!("Total songs:     {}\n", summary.total));
    out.push_str(&format!(
        "Verified OK:     {} (within +/-{} BPM)\n",
        summary.verified_ok, cfg.bpm_tolerance
    ));
    out.push_str(&format!("BPM mismatch:    {}\n", summary.mismatches.len()));
    out.push_str(&format!(
        "Deezer BPM=0:    {} (no BPM data on Deezer)\n",
        summary.no_data.len()
    ));
    out.push_str(&format!(
        "Not found:       {} (not found on Deezer)\n\n",
        summary.not_found.len()
    ));

    out.push_str("--- BPM MISMATCHES (sorted by severity) ---\n\n");
    for m in &summary.mismatches {
        out.push_str(&format!("{} - {}\n", m.artist, m.title));
        out.push_str(&format!(
            "  Curated BPM: {:>5}  |  Deezer BPM: {:>5}  |  Diff: {:>3}\n",
            m.curated_bpm, m.deezer_bpm, m.bpm_diff
        ));
        if m.dur_diff > cfg.duration_tolerance {
            out.push_str(&format!(
                "  Curated dur: {:>5}s |  Deezer dur: {:>5}s  |  Diff: {:>3}s\n",
                m.curated_duration.unwrap_or(0),
                m.deezer_duration,
                m.dur_diff
            ));
        }
        out.push_str(&format!(
            "  Deezer match: {} - {}\n\n",
            m.deezer_artist, m.deezer_title
        ));
    }

    if !summary.not_found.is_empty() {
        out.push_str(&format!(
            "\n--- NOT FOUND ON DEEZER ({}) ---\n\n",
            summary.not_found.len()
        ));
        for (artist, title) in &summary.not_found {
            out.push_str(&format!("  {artist} - {title}\n"));
        }
    }

    if !summary.no_data.is_empty() {
        out.push_str(&format!(
            "\n--- DEEZER BPM=0 ({}) ---\n\n",
            summary.no_data.len()
        ));
        for e in &summary.no_data {
            match e.curated_bpm {
                Some(bpm) => {
                    out.push_str(&format!("  {} - {} (curated BPM: {bpm})\n", e.artist, e.title))
                }
                None => out.push_str(&format!("  {} - {}\n", e.artist, e.title)),
            }
        }
    }

    std::fs::write(path, out)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    Ok(())
}

/// Write a copy of the catalog with authoritative values applied to
/// mismatched entries: the rounded Deezer BPM, and the Deezer duration when
/// the curated one is absent or off by more than the tolerance.
/// Returns the number of BPM corrections made.
pub fn write_corrected(
    path: &Path,
    songs: &[Song],
    store: &VerificationStore,
    cfg: &VerifyConfig,
) -> Result<usize> {
    let mut corrected = songs.to_vec();
    let mut corrections = 0;

    for song in corrected.iter_mut() {
        let Some(record) = store.get(&song.key()) else {
            continue;
        };
        if !matches!(
            classify(song, record, cfg),
            Classification::Mismatch { .. }
        ) {
            continue;
        }
        let VerificationRecord::Ok {
            deezer_bpm,
            deezer_duration,
            ..
        } = record
        else {
            continue;
        };

        if *deezer_bpm > 0.0 {
            song.bpm = Some(deezer_bpm.round() as i64);
            corrections += 1;
        }
        if *deezer_duration > 0 {
            let off = song
                .duration_seconds
                .is_none_or(|d| (d - deezer_duration).abs() > cfg.duration_tolerance);
            if off {
                song.duration_seconds = Some(*deezer_duration);
            }
        }
    }

    catalog::save(path, &corrected)
        .with_context(|| format!("Failed to write corrected catalog to {}", path.display()))?;
    Ok(corrections)
}

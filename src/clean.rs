use std::collections::HashSet;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use crate::catalog::Song;
use crate::config::DeezerConfig;
use crate::deezer::MetadataSource;
use crate::store::{TrackFact, TrackFactStore, VerificationRecord, VerificationStore};

/// Result of the track-fact fetch phase.
pub struct FetchSummary {
    pub needed: usize,
    pub fetched: usize,
    pub failed: usize,
}

/// Result of the merge phase.
pub struct CleanSummary {
    pub original: usize,
    pub kept: usize,
    pub removed_not_found: usize,
    pub bpm_from_source: usize,
    pub bpm_dropped: usize,
    pub duration_from_source: usize,
    pub decade_from_source: usize,
    pub decade_kept_original: usize,
}

pub struct CleanOutcome {
    pub songs: Vec<Song>,
    pub summary: CleanSummary,
}

/// Lazily populate the track-fact store for every verified identity whose
/// Deezer id has no cached detail yet. Failed fetches are skipped (and
/// retried on the next run), never fatal.
pub fn fetch_track_facts(
    songs: &[Song],
    verification: &VerificationStore,
    facts: &mut TrackFactStore,
    source: &dyn MetadataSource,
    deezer_cfg: &DeezerConfig,
) -> Result<FetchSummary> {
    let mut need_fetch: Vec<i64> = Vec::new();
    let mut seen: HashSet<i64> = HashSet::new();

    for song in songs {
        let Some(VerificationRecord::Ok { deezer_id, .. }) = verification.get(&song.key()) else {
            continue;
        };
        if !facts.contains_key(&deezer_id.to_string()) && seen.insert(*deezer_id) {
            need_fetch.push(*deezer_id);
        }
    }

    let mut summary = FetchSummary {
        needed: need_fetch.len(),
        fetched: 0,
        failed: 0,
    };

    if need_fetch.is_empty() {
        log::info!("Track-fact cache is complete, nothing to fetch");
        return Ok(summary);
    }

    log::info!("Fetching {} tracks for release dates", need_fetch.len());

    let pb = ProgressBar::new(need_fetch.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} tracks ({eta} remaining)")
            .unwrap()
            .progress_chars("=>-"),
    );

    let delay = Duration::from_millis(deezer_cfg.rate_limit_ms);

    for id in need_fetch {
        match source.track(id) {
            Ok(Some(track)) => {
                facts
                    .insert(
                        id.to_string(),
                        TrackFact {
                            release_date: track.release_date.clone(),
                            bpm: track.bpm,
                            duration: track.duration,
                        },
                    )
                    .context("Failed to checkpoint track fact")?;
                summary.fetched += 1;
            }
            Ok(None) => {
                log::debug!("Track {id} no longer resolves");
                summary.failed += 1;
            }
            Err(e) => {
                log::warn!("Track fetch failed for {id}: {e:#}");
                summary.failed += 1;
            }
        }
        thread::sleep(delay);
        pb.inc(1);
    }

    facts.flush().context("Failed to flush track-fact store")?;
    pb.finish_with_message("done");

    Ok(summary)
}

/// Produce the trimmed catalog: only entries with an `ok` verdict survive,
/// and every surviving field traces to an external source except genre
/// (carried through unverified) and the duration/decade fallbacks.
/// Deterministic: reads only the two caches, no side effects.
pub fn clean_catalog(
    songs: &[Song],
    verification: &VerificationStore,
    facts: &TrackFactStore,
) -> CleanOutcome {
    let mut summary = CleanSummary {
        original: songs.len(),
        kept: 0,
        removed_not_found: 0,
        bpm_from_source: 0,
        bpm_dropped: 0,
        duration_from_source: 0,
        decade_from_source: 0,
        decade_kept_original: 0,
    };
    let mut clean: Vec<Song> = Vec::with_capacity(songs.len());

    for song in songs {
        let Some(VerificationRecord::Ok {
            deezer_id,
            deezer_bpm,
            deezer_duration,
            ..
        }) = verification.get(&song.key())
        else {
            summary.removed_not_found += 1;
            continue;
        };

        // BPM: authoritative value only, never the unverified original
        let bpm = if *deezer_bpm > 0.0 {
            summary.bpm_from_source += 1;
            Some(deezer_bpm.round() as i64)
        } else {
            summary.bpm_dropped += 1;
            None
        };

        let duration = if *deezer_duration > 0 {
            summary.duration_from_source += 1;
            Some(*deezer_duration)
        } else {
            song.duration_seconds
        };

        let fact = facts.get(&deezer_id.to_string());
        let decade = match derive_decade(fact.and_then(|f| f.release_date.as_deref())) {
            Some(decade) => {
                summary.decade_from_source += 1;
                Some(decade)
            }
            None => {
                if song.decade.is_some() {
                    summary.decade_kept_original += 1;
                }
                song.decade.clone()
            }
        };

        clean.push(Song {
            title: song.title.clone(),
            artist_name: song.artist_name.clone(),
            genre: song.genre.clone(),
            bpm,
            duration_seconds: duration,
            decade,
            danceability: None,
            runnability: None,
        });
    }

    summary.kept = clean.len();
    CleanOutcome {
        songs: clean,
        summary,
    }
}

/// Derive a coarse decade tag from an ISO release date:
/// `"2005-11-21"` → `"2000s"`. Any parse failure yields `None`.
pub fn derive_decade(release_date: Option<&str>) -> Option<String> {
    let year: i64 = release_date?.get(..4)?.parse().ok()?;
    Some(format!("{}s", (year / 10) * 10))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JsonStore;
    use std::path::PathBuf;

    fn song(artist: &str, title: &str) -> Song {
        Song {
            title: title.to_string(),
            artist_name: artist.to_string(),
            genre: "rock".to_string(),
            bpm: Some(128),
            duration_seconds: Some(200),
            decade: None,
            danceability: Some(60),
            runnability: Some(70),
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("paceline-clean-{}-{}.json", name, std::process::id()))
    }

    fn stores(name: &str) -> (VerificationStore, TrackFactStore) {
        let vpath = temp_path(&format!("{name}-v"));
        let fpath = temp_path(&format!("{name}-f"));
        let _ = std::fs::remove_file(&vpath);
        let _ = std::fs::remove_file(&fpath);
        (
            JsonStore::open(&vpath, 1000).unwrap(),
            JsonStore::open(&fpath, 1000).unwrap(),
        )
    }

    fn ok_record(id: i64, bpm: f64, duration: i64) -> VerificationRecord {
        VerificationRecord::Ok {
            deezer_id: id,
            deezer_title: "X".into(),
            deezer_artist: "Queen".into(),
            deezer_bpm: bpm,
            deezer_duration: duration,
        }
    }

    #[test]
    fn test_derive_decade() {
        assert_eq!(derive_decade(Some("2005-11-21")).as_deref(), Some("2000s"));
        assert_eq!(derive_decade(Some("1999-01-01")).as_deref(), Some("1990s"));
        assert_eq!(derive_decade(Some("1981-06-01")).as_deref(), Some("1980s"));
        assert_eq!(derive_decade(Some("??")), None);
        assert_eq!(derive_decade(Some("20a5-01-01")), None);
        assert_eq!(derive_decade(Some("")), None);
        assert_eq!(derive_decade(None), None);
    }

    #[test]
    fn test_unverified_entries_dropped() {
        let songs = vec![song("Queen", "X"), song("Nowhere Band", "Lost")];
        let (mut verification, facts) = stores("drop");
        verification
            .insert("queen|x".into(), ok_record(7, 122.0, 205))
            .unwrap();
        verification
            .insert("nowhere band|lost".into(), VerificationRecord::NotFound)
            .unwrap();

        let outcome = clean_catalog(&songs, &verification, &facts);
        assert_eq!(outcome.songs.len(), 1);
        assert_eq!(outcome.summary.removed_not_found, 1);
        assert_eq!(outcome.songs[0].title, "X");
    }

    #[test]
    fn test_bpm_never_falls_back_to_original() {
        // Catalog says 128, source has no data: the field must be absent
        let songs = vec![song("Queen", "X")];
        let (mut verification, facts) = stores("bpm");
        verification
            .insert("queen|x".into(), ok_record(7, 0.0, 205))
            .unwrap();

        let outcome = clean_catalog(&songs, &verification, &facts);
        assert_eq!(outcome.songs[0].bpm, None);
        assert_eq!(outcome.summary.bpm_dropped, 1);

        let json = serde_json::to_string(&outcome.songs[0]).unwrap();
        assert!(!json.contains("bpm"));
    }

    #[test]
    fn test_bpm_rounded_from_source() {
        let songs = vec![song("Queen", "X")];
        let (mut verification, facts) = stores("round");
        verification
            .insert("queen|x".into(), ok_record(7, 121.6, 205))
            .unwrap();

        let outcome = clean_catalog(&songs, &verification, &facts);
        assert_eq!(outcome.songs[0].bpm, Some(122));
    }

    #[test]
    fn test_duration_falls_back_to_original() {
        let songs = vec![song("Queen", "X")];
        let (mut verification, facts) = stores("dur");
        verification
            .insert("queen|x".into(), ok_record(7, 122.0, 0))
            .unwrap();

        let outcome = clean_catalog(&songs, &verification, &facts);
        assert_eq!(outcome.songs[0].duration_seconds, Some(200));
        assert_eq!(outcome.summary.duration_from_source, 0);
    }

    #[test]
    fn test_decade_from_fact_with_fallback() {
        let mut with_decade = song("Queen", "X");
        with_decade.decade = Some("1970s".to_string());
        let songs = vec![with_decade, song("Abba", "Y")];

        let (mut verification, mut facts) = stores("decade");
        verification
            .insert("queen|x".into(), ok_record(7, 122.0, 205))
            .unwrap();
        verification
            .insert("abba|y".into(), ok_record(8, 100.0, 180))
            .unwrap();
        // Queen's fact has a malformed date; Abba's is good
        facts
            .insert(
                "7".into(),
                TrackFact {
                    release_date: Some("??".into()),
                    bpm: 122.0,
                    duration: 205,
                },
            )
            .unwrap();
        facts
            .insert(
                "8".into(),
                TrackFact {
                    release_date: Some("1976-08-16".into()),
                    bpm: 100.0,
                    duration: 180,
                },
            )
            .unwrap();

        let outcome = clean_catalog(&songs, &verification, &facts);
        assert_eq!(outcome.songs[0].decade.as_deref(), Some("1970s"));
        assert_eq!(outcome.songs[1].decade.as_deref(), Some("1970s"));
        assert_eq!(outcome.summary.decade_from_source, 1);
        assert_eq!(outcome.summary.decade_kept_original, 1);
    }

    #[test]
    fn test_scores_stripped() {
        let songs = vec![song("Queen", "X")];
        let (mut verification, facts) = stores("strip");
        verification
            .insert("queen|x".into(), ok_record(7, 122.0, 205))
            .unwrap();

        let outcome = clean_catalog(&songs, &verification, &facts);
        assert_eq!(outcome.songs[0].danceability, None);
        assert_eq!(outcome.songs[0].runnability, None);
    }

    #[test]
    fn test_fetch_fills_only_missing_facts() {
        use crate::deezer::{ArtistRef, SearchHit, Track};
        use std::cell::Cell;

        struct OneTrack {
            calls: Cell<usize>,
        }
        impl MetadataSource for OneTrack {
            fn search(&self, _artist: &str, _title: &str) -> Result<Vec<SearchHit>> {
                unreachable!("fetch phase never searches")
            }
            fn track(&self, id: i64) -> Result<Option<Track>> {
                self.calls.set(self.calls.get() + 1);
                Ok(Some(Track {
                    id,
                    title: "X".into(),
                    artist: Some(ArtistRef {
                        name: "Queen".into(),
                    }),
                    bpm: 122.0,
                    duration: 205,
                    release_date: Some("1981-06-01".into()),
                }))
            }
        }

        let songs = vec![song("Queen", "X"), song("Abba", "Y")];
        let (mut verification, mut facts) = stores("fetch");
        verification
            .insert("queen|x".into(), ok_record(7, 122.0, 205))
            .unwrap();
        verification
            .insert("abba|y".into(), ok_record(8, 100.0, 180))
            .unwrap();
        // 7 is already cached; only 8 needs a call
        facts
            .insert(
                "7".into(),
                TrackFact {
                    release_date: Some("1981-06-01".into()),
                    bpm: 122.0,
                    duration: 205,
                },
            )
            .unwrap();

        let source = OneTrack {
            calls: Cell::new(0),
        };
        let cfg = DeezerConfig {
            rate_limit_ms: 0,
            save_interval: 1000,
            search_limit: 3,
        };
        let summary =
            fetch_track_facts(&songs, &verification, &mut facts, &source, &cfg).unwrap();

        assert_eq!(summary.needed, 1);
        assert_eq!(summary.fetched, 1);
        assert_eq!(source.calls.get(), 1);
        assert!(facts.contains_key("8"));
    }
}

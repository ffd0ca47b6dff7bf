use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::catalog::Song;
use crate::config::ScoringConfig;

/// Result of a danceability run.
pub struct DanceabilitySummary {
    pub already_scored: usize,
    pub enriched: usize,
    /// Newly assigned scores per genre, for the spread printout.
    pub by_genre: BTreeMap<String, Vec<i64>>,
}

impl DanceabilitySummary {
    /// Per-genre (mean, min, max, count) of newly assigned scores.
    pub fn genre_spread(&self) -> Vec<(&str, f64, i64, i64, usize)> {
        self.by_genre
            .iter()
            .map(|(genre, scores)| {
                let sum: i64 = scores.iter().sum();
                let mean = sum as f64 / scores.len() as f64;
                let min = *scores.iter().min().unwrap_or(&0);
                let max = *scores.iter().max().unwrap_or(&0);
                (genre.as_str(), mean, min, max, scores.len())
            })
            .collect()
    }
}

/// Assign a danceability score to every entry that lacks one. Entries that
/// already carry a score are left untouched, so re-runs are no-ops.
pub fn estimate_danceability(songs: &mut [Song], scoring: &ScoringConfig) -> DanceabilitySummary {
    let mut summary = DanceabilitySummary {
        already_scored: 0,
        enriched: 0,
        by_genre: BTreeMap::new(),
    };

    for song in songs.iter_mut() {
        if song.danceability.is_some() {
            summary.already_scored += 1;
            continue;
        }

        let score = compute_danceability(song, scoring);
        song.danceability = Some(score);
        summary.enriched += 1;

        let genre = if song.genre.is_empty() {
            "unknown".to_string()
        } else {
            song.genre.clone()
        };
        summary.by_genre.entry(genre).or_default().push(score);
    }

    summary
}

/// Heuristic danceability (0-100): genre baseline, tempo proximity to the
/// 120-130 sweet spot, and a small deterministic per-song spread.
pub fn compute_danceability(song: &Song, scoring: &ScoringConfig) -> i64 {
    let baseline = scoring
        .genre_baseline
        .get(&song.genre)
        .copied()
        .unwrap_or(scoring.default_baseline);
    let modifier = tempo_modifier(song.bpm);
    let variance = identity_variance(&song.key());
    (baseline + modifier + variance).clamp(0, 100)
}

fn tempo_modifier(bpm: Option<i64>) -> i64 {
    match bpm {
        None => 0,
        Some(b) if (115..=135).contains(&b) => 5,
        Some(b) if (95..=145).contains(&b) => 2,
        Some(b) if (80..=160).contains(&b) => 0,
        Some(_) => -5,
    }
}

/// Deterministic per-song variance in [-4, +4] from a stable hash of the
/// identity key, so the same entry always gets the same spread.
fn identity_variance(key: &str) -> i64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() % 9) as i64 - 4
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(genre: &str, bpm: Option<i64>) -> Song {
        Song {
            title: "X".to_string(),
            artist_name: "Queen".to_string(),
            genre: genre.to_string(),
            bpm,
            duration_seconds: None,
            decade: None,
            danceability: None,
            runnability: None,
        }
    }

    #[test]
    fn test_tempo_modifier_brackets() {
        assert_eq!(tempo_modifier(Some(115)), 5);
        assert_eq!(tempo_modifier(Some(135)), 5);
        assert_eq!(tempo_modifier(Some(95)), 2);
        assert_eq!(tempo_modifier(Some(145)), 2);
        assert_eq!(tempo_modifier(Some(80)), 0);
        assert_eq!(tempo_modifier(Some(160)), 0);
        assert_eq!(tempo_modifier(Some(70)), -5);
        assert_eq!(tempo_modifier(Some(200)), -5);
        assert_eq!(tempo_modifier(None), 0);
    }

    #[test]
    fn test_score_bounded_for_all_inputs() {
        let scoring = ScoringConfig::default();
        let genres = ["metal", "house", "polka", ""];
        let bpms = [None, Some(0), Some(60), Some(125), Some(250)];
        for genre in genres {
            for bpm in bpms {
                let score = compute_danceability(&song(genre, bpm), &scoring);
                assert!((0..=100).contains(&score), "{genre}/{bpm:?} -> {score}");
            }
        }
    }

    #[test]
    fn test_variance_range_and_determinism() {
        for i in 0..200 {
            let key = format!("artist{i}|title{i}");
            let v = identity_variance(&key);
            assert!((-4..=4).contains(&v), "{key} -> {v}");
            assert_eq!(v, identity_variance(&key));
        }
    }

    #[test]
    fn test_rock_sweet_spot_score() {
        let scoring = ScoringConfig::default();
        let s = song("rock", Some(122));
        let score = compute_danceability(&s, &scoring);
        // baseline 48 + modifier 5 + variance in [-4, 4]
        assert!((49..=57).contains(&score), "got {score}");
    }

    #[test]
    fn test_unknown_genre_uses_default_baseline() {
        let scoring = ScoringConfig::default();
        let s = song("zydeco", None);
        let score = compute_danceability(&s, &scoring);
        // baseline 55 + modifier 0 + variance in [-4, 4]
        assert!((51..=59).contains(&score), "got {score}");
    }

    #[test]
    fn test_existing_scores_untouched() {
        let scoring = ScoringConfig::default();
        let mut songs = vec![song("rock", Some(120)), song("pop", Some(100))];
        songs[0].danceability = Some(99);

        let summary = estimate_danceability(&mut songs, &scoring);
        assert_eq!(summary.already_scored, 1);
        assert_eq!(summary.enriched, 1);
        assert_eq!(songs[0].danceability, Some(99));
        assert!(songs[1].danceability.is_some());
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let scoring = ScoringConfig::default();
        let mut songs = vec![song("rock", Some(120))];

        estimate_danceability(&mut songs, &scoring);
        let first = songs[0].danceability;
        let summary = estimate_danceability(&mut songs, &scoring);

        assert_eq!(songs[0].danceability, first);
        assert_eq!(summary.enriched, 0);
        assert_eq!(summary.already_scored, 1);
    }

    #[test]
    fn test_genre_spread() {
        let scoring = ScoringConfig::default();
        let mut songs = vec![song("rock", Some(120)), song("", None)];
        let summary = estimate_danceability(&mut songs, &scoring);
        let spread = summary.genre_spread();
        assert_eq!(spread.len(), 2);
        assert!(summary.by_genre.contains_key("rock"));
        assert!(summary.by_genre.contains_key("unknown"));
    }
}

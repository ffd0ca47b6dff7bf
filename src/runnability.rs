use std::collections::HashMap;

use crate::catalog::Song;
use crate::config::ScoringConfig;

/// Result of a runnability run.
pub struct RunnabilitySummary {
    pub total: usize,
    pub crowd_matched: usize,
    pub feature_only: usize,
    pub scores: Vec<i64>,
}

impl RunnabilitySummary {
    pub fn mean(&self) -> f64 {
        if self.scores.is_empty() {
            return 0.0;
        }
        self.scores.iter().sum::<i64>() as f64 / self.scores.len() as f64
    }

    pub fn min(&self) -> i64 {
        self.scores.iter().copied().min().unwrap_or(0)
    }

    pub fn max(&self) -> i64 {
        self.scores.iter().copied().max().unwrap_or(0)
    }

    /// Ten-bucket score distribution (0-9, 10-19, …, 90-100).
    pub fn histogram(&self) -> [usize; 10] {
        let mut buckets = [0usize; 10];
        for &score in &self.scores {
            let bucket = ((score / 10) as usize).min(9);
            buckets[bucket] += 1;
        }
        buckets
    }
}

/// Score every entry for running-playlist suitability. Crowd popularity
/// dominates when present (up to 60 of 100 points); without crowd evidence
/// the score is feature-only and caps at 40. Unlike danceability, re-runs
/// always overwrite so the score tracks the current crowd snapshot.
pub fn estimate_runnability(
    songs: &mut [Song],
    crowd: &HashMap<String, u64>,
    scoring: &ScoringConfig,
) -> RunnabilitySummary {
    let mut summary = RunnabilitySummary {
        total: songs.len(),
        crowd_matched: 0,
        feature_only: 0,
        scores: Vec::with_capacity(songs.len()),
    };

    for song in songs.iter_mut() {
        let source_count = crowd.get(&song.key()).copied();
        match source_count {
            Some(_) => summary.crowd_matched += 1,
            None => summary.feature_only += 1,
        }

        let score = combine_score(source_count, feature_score(song, scoring));
        song.runnability = Some(score);
        summary.scores.push(score);
    }

    summary
}

/// Feature-based score (0-40) from genre, danceability, and tempo.
pub fn feature_score(song: &Song, scoring: &ScoringConfig) -> f64 {
    let genre = scoring
        .genre_bonus
        .get(&song.genre)
        .copied()
        .unwrap_or(scoring.default_bonus) as f64;
    (genre + danceability_bonus(song.danceability) + tempo_bonus(song.bpm)).min(40.0)
}

fn combine_score(source_count: Option<u64>, feature: f64) -> i64 {
    let raw = match source_count {
        Some(count) => (count as f64 / 15.0).min(1.0) * 60.0 + feature,
        None => feature,
    };
    (raw.round() as i64).clamp(0, 100)
}

fn danceability_bonus(danceability: Option<i64>) -> f64 {
    match danceability {
        Some(d) => (d as f64 / 100.0).min(1.0) * 12.0,
        None => 6.0,
    }
}

/// Tempo bonus (0-8) centered on the prime running zones.
fn tempo_bonus(bpm: Option<i64>) -> f64 {
    match bpm {
        None => 4.0,
        Some(b) if (120..=149).contains(&b) => 8.0,
        Some(b) if (150..=179).contains(&b) => 7.0,
        Some(b) if (90..=119).contains(&b) => 5.0,
        Some(b) if (80..=89).contains(&b) => 4.0,
        Some(_) => 2.0,
    }
}

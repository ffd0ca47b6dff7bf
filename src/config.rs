use std::collections::HashMap;
use std::path::PathBuf;

use directories::ProjectDirs;
use serde::Deserialize;

/// Application configuration loaded from TOML config file.
/// All fields have sensible defaults — the config file is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Catalog file path (overridden by `--catalog`).
    pub catalog_path: Option<PathBuf>,
    /// Crowd-signal file path. No default location: the source lives
    /// outside the repository and callers must point at a concrete copy.
    pub crowd_path: Option<PathBuf>,
    /// Verification report path (defaults to the data dir).
    pub report_path: Option<PathBuf>,
    /// Directory for checkpoint/cache stores (overrides XDG default).
    pub data_dir: Option<PathBuf>,
    /// Deezer API settings.
    pub deezer: DeezerConfig,
    /// Verification tolerances.
    pub verify: VerifyConfig,
    /// Scoring tables for the danceability and runnability estimators.
    pub scoring: ScoringConfig,
}

/// Deezer API configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DeezerConfig {
    /// Delay between API requests in milliseconds.
    pub rate_limit_ms: u64,
    /// Checkpoint flush cadence: write stores every N new records.
    pub save_interval: usize,
    /// Search candidates to consider per lookup.
    pub search_limit: usize,
}

impl Default for DeezerConfig {
    fn default() -> Self {
        Self {
            rate_limit_ms: 350,
            save_interval: 50,
            search_limit: 3,
        }
    }
}

/// Verification mismatch tolerances.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    /// BPM difference beyond which an entry is flagged as a mismatch.
    pub bpm_tolerance: i64,
    /// Duration difference (seconds) flagged in the report. Reporting
    /// severity only, never grounds for exclusion.
    pub duration_tolerance: i64,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            bpm_tolerance: 3,
            duration_tolerance: 15,
        }
    }
}

/// Genre scoring tables. Configuration data, not code: swap or tune
/// without touching the estimators.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Genre → danceability baseline (0-100).
    pub genre_baseline: HashMap<String, i64>,
    /// Baseline for genres not in the table.
    pub default_baseline: i64,
    /// Genre → runnability bonus (0-20).
    pub genre_bonus: HashMap<String, i64>,
    /// Bonus for genres not in the table.
    pub default_bonus: i64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let genre_baseline = [
            ("electronic", 70),
            ("edm", 72),
            ("house", 74),
            ("drumAndBass", 62),
            ("pop", 68),
            ("dance", 75),
            ("kPop", 70),
            ("hipHop", 73),
            ("rock", 48),
            ("punk", 42),
            ("latin", 72),
            ("funk", 70),
            ("rnb", 62),
            ("metal", 35),
            ("indie", 52),
        ]
        .into_iter()
        .map(|(g, v)| (g.to_string(), v))
        .collect();

        let genre_bonus = [
            ("electronic", 20),
            ("edm", 20),
            ("house", 20),
            ("drumAndBass", 20),
            ("pop", 16),
            ("dance", 16),
            ("kPop", 16),
            ("hipHop", 16),
            ("rock", 13),
            ("punk", 13),
            ("latin", 13),
            ("funk", 13),
            ("indie", 10),
            ("rnb", 10),
            ("metal", 10),
        ]
        .into_iter()
        .map(|(g, v)| (g.to_string(), v))
        .collect();

        Self {
            genre_baseline,
            default_baseline: 55,
            genre_bonus,
            default_bonus: 8,
        }
    }
}

impl AppConfig {
    /// Load config from `~/.config/paceline/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        let config_path = Self::config_path();
        match config_path {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<AppConfig>(&contents) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", path.display());
                        config
                    }
                    Err(e) => {
                        log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                        Self::default()
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Directory holding the checkpoint/cache stores.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    /// Verification store path (identity → verdict).
    pub fn verification_path(&self) -> PathBuf {
        self.data_dir().join("verification.json")
    }

    /// Track-fact store path (Deezer id → cached track detail).
    pub fn track_fact_path(&self) -> PathBuf {
        self.data_dir().join("deezer_tracks.json")
    }

    /// Verification report path.
    pub fn report_path(&self) -> PathBuf {
        self.report_path
            .clone()
            .unwrap_or_else(|| self.data_dir().join("bpm_report.txt"))
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Resolve the default data directory using XDG paths.
pub fn default_data_dir() -> PathBuf {
    if let Some(dirs) = ProjectDirs::from("", "", crate::APP_NAME) {
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir).ok();
        data_dir.to_path_buf()
    } else {
        // Fallback: current directory
        PathBuf::from(".")
    }
}

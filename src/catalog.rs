use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Entry {index} has an empty {field}; fix the catalog before running a pass")]
    EmptyIdentity { index: usize, field: &'static str },
    #[error("Entries {first} and {second} collide on identity '{key}'")]
    DuplicateIdentity {
        key: String,
        first: usize,
        second: usize,
    },
}

pub type Result<T> = std::result::Result<T, CatalogError>;

/// A catalog song entry. Optional fields are sparse: absent in the JSON
/// when unset, never serialized as null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub title: String,
    #[serde(rename = "artistName")]
    pub artist_name: String,
    /// Free-text genre tag. Unverified; there is no external source for it.
    #[serde(default)]
    pub genre: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bpm: Option<i64>,
    #[serde(rename = "durationSeconds", skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decade: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub danceability: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runnability: Option<i64>,
}

impl Song {
    /// Identity key correlating this entry across catalog, verification,
    /// and crowd datasets.
    pub fn key(&self) -> String {
        normalize_key(&self.artist_name, &self.title)
    }
}

/// Canonical identity key: lowercased, trimmed `artist|title`.
///
/// Every component that reads or writes keyed records must build keys
/// through this function; a divergent copy causes silent missing-key bugs.
pub fn normalize_key(artist: &str, title: &str) -> String {
    format!(
        "{}|{}",
        artist.trim().to_lowercase(),
        title.trim().to_lowercase()
    )
}

/// Load and validate the catalog. Empty identity fields and identity
/// collisions are hard errors: they indicate upstream data corruption,
/// not an external-source gap.
pub fn load(path: &Path) -> Result<Vec<Song>> {
    let contents = std::fs::read_to_string(path)?;
    let songs: Vec<Song> = serde_json::from_str(&contents)?;
    validate(&songs)?;
    Ok(songs)
}

/// Rewrite the catalog in full. Entry order is preserved from the input.
pub fn save(path: &Path, songs: &[Song]) -> Result<()> {
    let mut json = serde_json::to_string_pretty(songs)?;
    json.push('\n');
    crate::store::write_atomic(path, json.as_bytes())?;
    Ok(())
}

fn validate(songs: &[Song]) -> Result<()> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    for (index, song) in songs.iter().enumerate() {
        if song.artist_name.trim().is_empty() {
            return Err(CatalogError::EmptyIdentity {
                index,
                field: "artistName",
            });
        }
        if song.title.trim().is_empty() {
            return Err(CatalogError::EmptyIdentity {
                index,
                field: "title",
            });
        }
        let key = song.key();
        if let Some(&first) = seen.get(&key) {
            return Err(CatalogError::DuplicateIdentity {
                key,
                first,
                second: index,
            });
        }
        seen.insert(key, index);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(artist: &str, title: &str) -> Song {
        Song {
            title: title.to_string(),
            artist_name: artist.to_string(),
            genre: "rock".to_string(),
            bpm: None,
            duration_seconds: None,
            decade: None,
            danceability: None,
            runnability: None,
        }
    }

    #[test]
    fn test_normalize_key_case_and_whitespace() {
        assert_eq!(normalize_key("Queen", "X"), "queen|x");
        assert_eq!(normalize_key("QUEEN", " X "), "queen|x");
        assert_eq!(normalize_key("  queen ", "x"), "queen|x");
        assert_ne!(normalize_key("Queen", "X"), normalize_key("Queen", "Y"));
    }

    #[test]
    fn test_sparse_serialization() {
        let s = song("Queen", "X");
        let json = serde_json::to_string(&s).unwrap();
        assert!(!json.contains("bpm"));
        assert!(!json.contains("null"));

        let with_bpm = Song {
            bpm: Some(128),
            ..song("Queen", "X")
        };
        let json = serde_json::to_string(&with_bpm).unwrap();
        assert!(json.contains("\"bpm\":128"));
    }

    #[test]
    fn test_deserialize_field_names() {
        let json = r#"{"title": "X", "artistName": "Queen", "genre": "rock",
                       "bpm": 120, "durationSeconds": 200, "energyLevel": 9}"#;
        let s: Song = serde_json::from_str(json).unwrap();
        assert_eq!(s.artist_name, "Queen");
        assert_eq!(s.bpm, Some(120));
        assert_eq!(s.duration_seconds, Some(200));
        assert_eq!(s.decade, None);
    }

    #[test]
    fn test_validate_empty_artist() {
        let songs = vec![song("  ", "X")];
        assert!(matches!(
            validate(&songs),
            Err(CatalogError::EmptyIdentity { index: 0, field: "artistName" })
        ));
    }

    #[test]
    fn test_validate_duplicate_identity() {
        let songs = vec![song("Queen", "X"), song("queen", " x ")];
        match validate(&songs) {
            Err(CatalogError::DuplicateIdentity { key, first, second }) => {
                assert_eq!(key, "queen|x");
                assert_eq!(first, 0);
                assert_eq!(second, 1);
            }
            other => panic!("expected duplicate error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_distinct_ok() {
        let songs = vec![song("Queen", "X"), song("Queen", "Y")];
        assert!(validate(&songs).is_ok());
    }
}

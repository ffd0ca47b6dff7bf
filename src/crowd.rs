use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::catalog::normalize_key;

/// One record from the crowd-signal source: a song and the number of
/// independent source playlists it appeared in.
#[derive(Debug, Deserialize)]
pub struct CrowdRecord {
    #[serde(rename = "artistName")]
    pub artist_name: String,
    pub title: String,
    #[serde(default)]
    pub source_count: u64,
}

/// Load the crowd-signal file and fold it into identity → source_count.
pub fn load_crowd_map(path: &Path) -> Result<HashMap<String, u64>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read crowd signal file {}", path.display()))?;
    let records: Vec<CrowdRecord> = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse crowd signal file {}", path.display()))?;
    Ok(merge_records(&records))
}

/// When an identity appears more than once, keep the maximum observed
/// source_count; the merge is order-independent.
pub fn merge_records(records: &[CrowdRecord]) -> HashMap<String, u64> {
    let mut map: HashMap<String, u64> = HashMap::new();
    for record in records {
        let key = normalize_key(&record.artist_name, &record.title);
        let count = map.entry(key).or_insert(0);
        if record.source_count > *count {
            *count = record.source_count;
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(artist: &str, title: &str, source_count: u64) -> CrowdRecord {
        CrowdRecord {
            artist_name: artist.to_string(),
            title: title.to_string(),
            source_count,
        }
    }

    #[test]
    fn test_merge_keeps_maximum() {
        let forward = vec![record("Queen", "X", 3), record("Queen", "X", 9)];
        let reverse = vec![record("Queen", "X", 9), record("Queen", "X", 3)];

        assert_eq!(merge_records(&forward).get("queen|x"), Some(&9));
        assert_eq!(merge_records(&reverse).get("queen|x"), Some(&9));
    }

    #[test]
    fn test_merge_normalizes_identity() {
        let records = vec![record("QUEEN", " X ", 2), record("queen", "x", 5)];
        let map = merge_records(&records);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("queen|x"), Some(&5));
    }

    #[test]
    fn test_crowd_record_deserialize() {
        let json = r#"{"artistName": "Eminem", "title": "Lose Yourself", "source_count": 14}"#;
        let r: CrowdRecord = serde_json::from_str(json).unwrap();
        assert_eq!(r.artist_name, "Eminem");
        assert_eq!(r.source_count, 14);
    }
}

use anyhow::{Context, Result};
use serde::Deserialize;

const DEEZER_BASE: &str = "https://api.deezer.com";

/// Deezer search response (partial — we only need `data`).
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<SearchHit>,
}

/// A single candidate from the search endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    pub id: i64,
    pub artist: Option<ArtistRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistRef {
    #[serde(default)]
    pub name: String,
}

/// Full track detail from the track endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Track {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    pub artist: Option<ArtistRef>,
    /// 0.0 means Deezer has no BPM data for this track.
    #[serde(default)]
    pub bpm: f64,
    #[serde(default)]
    pub duration: i64,
    pub release_date: Option<String>,
}

impl Track {
    pub fn artist_name(&self) -> &str {
        self.artist.as_ref().map(|a| a.name.as_str()).unwrap_or("")
    }
}

/// External metadata lookup.
///
/// `search` returns the source's candidates in order; `track` returns full
/// detail, or `None` when the source answers with an error payload. Transport
/// and parse failures surface as `Err`; callers treat a failed lookup as
/// not-found and keep going.
pub trait MetadataSource {
    fn search(&self, artist: &str, title: &str) -> Result<Vec<SearchHit>>;
    fn track(&self, id: i64) -> Result<Option<Track>>;
}

/// Deezer API client.
pub struct DeezerClient {
    search_limit: usize,
}

impl DeezerClient {
    pub fn new(search_limit: usize) -> Self {
        Self { search_limit }
    }
}

impl MetadataSource for DeezerClient {
    fn search(&self, artist: &str, title: &str) -> Result<Vec<SearchHit>> {
        let query = encode_query(&format!("{artist} {title}"));
        let url = format!("{DEEZER_BASE}/search?q={query}&limit={}", self.search_limit);
        log::debug!("Fetching {url}");

        let resp: SearchResponse = ureq::get(&url)
            .call()
            .with_context(|| format!("HTTP request failed for '{artist} - {title}'"))?
            .body_mut()
            .read_json()
            .with_context(|| format!("Failed to parse JSON for '{artist} - {title}'"))?;

        Ok(resp.data)
    }

    fn track(&self, id: i64) -> Result<Option<Track>> {
        let url = format!("{DEEZER_BASE}/track/{id}");
        log::debug!("Fetching {url}");

        let value: serde_json::Value = ureq::get(&url)
            .call()
            .with_context(|| format!("HTTP request failed for track {id}"))?
            .body_mut()
            .read_json()
            .with_context(|| format!("Failed to parse JSON for track {id}"))?;

        parse_track(value)
    }
}

/// Deezer reports lookup errors as a 200 response with an `error` object.
fn parse_track(value: serde_json::Value) -> Result<Option<Track>> {
    if value.get("error").is_some() {
        return Ok(None);
    }
    let track: Track = serde_json::from_value(value).context("Unexpected track payload")?;
    Ok(Some(track))
}

/// Pick the candidate whose artist is a case-insensitive substring match
/// (in either direction) of the catalog artist; fall back to the first
/// result. Best-effort policy: multiple tracks can share artist+title and
/// this resolver makes no stronger guarantee.
pub fn pick_candidate<'a>(hits: &'a [SearchHit], artist: &str) -> Option<&'a SearchHit> {
    let artist_lower = artist.trim().to_lowercase();
    hits.iter()
        .find(|hit| {
            let hit_artist = hit
                .artist
                .as_ref()
                .map(|a| a.name.trim().to_lowercase())
                .unwrap_or_default();
            hit_artist.contains(&artist_lower) || artist_lower.contains(&hit_artist)
        })
        .or_else(|| hits.first())
}

/// Percent-encode a search query for the Deezer URL.
fn encode_query(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    for b in query.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

//! Rekordbox XML (`DJ_PLAYLISTS`) collection parsing.

use roxmltree::{Document, Node};
use thiserror::Error;

use super::ImportError;
use crate::db::models::NewTrack;

const DEFAULT_TITLE: &str = "Untitled";

/// Upper bound (inclusive) of each Rating bucket and the energy it maps to.
/// Rekordbox stores stars as 0/51/102/153/204/255.
const RATING_BUCKETS: [(u32, i32); 5] = [(51, 2), (102, 4), (153, 6), (204, 8), (255, 10)];

/// A single TRACK element that could not be turned into a catalog row.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackParseError {
    #[error("Track #{index}: missing TrackID")]
    MissingTrackId { index: usize },
    #[error("Track {track_id}: invalid {field} '{value}'")]
    InvalidNumber {
        track_id: String,
        field: &'static str,
        value: String,
    },
}

/// Parse a Rekordbox XML export into per-track results.
///
/// Document-level problems (malformed XML, no COLLECTION) fail the whole
/// parse. Problems with individual TRACK elements are returned in place so
/// the caller can import the rest.
pub fn parse_collection(
    xml: &str,
    source: &str,
) -> Result<Vec<Result<NewTrack, TrackParseError>>, ImportError> {
    let doc = Document::parse(xml)?;

    let collection = doc
        .descendants()
        .find(|n| n.has_tag_name("COLLECTION"))
        .ok_or(ImportError::MissingCollection)?;

    let tracks = collection
        .children()
        .filter(|n| n.has_tag_name("TRACK"))
        .enumerate()
        .map(|(i, node)| parse_track(node, i + 1, source))
        .collect();

    Ok(tracks)
}

fn parse_track(node: Node, index: usize, source: &str) -> Result<NewTrack, TrackParseError> {
    let track_id = attr(node, "TrackID")
        .ok_or(TrackParseError::MissingTrackId { index })?
        .to_string();

    let invalid = |field: &'static str, value: &str| TrackParseError::InvalidNumber {
        track_id: track_id.clone(),
        field,
        value: value.to_string(),
    };

    let bpm = match attr(node, "AverageBpm").or_else(|| attr(node, "Tempo")) {
        Some(raw) => Some(parse_bpm(raw).ok_or_else(|| invalid("AverageBpm", raw))?),
        None => None,
    };

    let duration_seconds = match attr(node, "TotalTime") {
        Some(raw) => Some(raw.parse::<i64>().map_err(|_| invalid("TotalTime", raw))?),
        None => None,
    };

    let energy = match attr(node, "Rating") {
        Some(raw) => rating_to_energy(raw.parse::<u32>().map_err(|_| invalid("Rating", raw))?),
        None => None,
    };

    Ok(NewTrack {
        external_id: track_id.clone(),
        source: source.to_string(),
        title: text_attr(node, "Name").unwrap_or(DEFAULT_TITLE).to_string(),
        artist: text_attr(node, "Artist").map(String::from),
        genre: text_attr(node, "Genre").map(String::from),
        bpm,
        key: attr(node, "Tonality").map(String::from),
        energy,
        duration_seconds,
        file_path: text_attr(node, "Location").and_then(decode_location),
    })
}

/// Trimmed attribute value, with blank values treated as absent.
/// Used for ids, keys and numbers.
fn attr<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attribute(name).map(str::trim).filter(|v| !v.is_empty())
}

/// Attribute value exactly as written; only all-blank values are absent.
fn text_attr<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attribute(name).filter(|v| !v.trim().is_empty())
}

/// Parse a BPM string, rounded to two decimals.
pub fn parse_bpm(raw: &str) -> Option<f64> {
    let bpm: f64 = raw.trim().parse().ok()?;
    if !bpm.is_finite() {
        return None;
    }
    Some((bpm * 100.0).round() / 100.0)
}

/// Map the 0–255 Rekordbox Rating to a 1–10 energy level.
/// Unrated (0) has no energy; bucket boundaries belong to the lower bucket.
pub fn rating_to_energy(rating: u32) -> Option<i32> {
    if rating == 0 {
        return None;
    }
    RATING_BUCKETS
        .iter()
        .find(|(upper, _)| rating <= *upper)
        .map(|(_, energy)| *energy)
        .or(Some(10))
}

/// Turn a `file://localhost/...` Location URI into a filesystem path.
pub fn decode_location(raw: &str) -> Option<String> {
    let decoded = urlencoding::decode_binary(raw.as_bytes());
    let decoded = String::from_utf8_lossy(&decoded);

    let path = decoded
        .strip_prefix("file://localhost")
        .or_else(|| decoded.strip_prefix("file://"))
        .unwrap_or(&*decoded);

    if path.is_empty() {
        None
    } else {
        Some(path.to_string())
    }
}

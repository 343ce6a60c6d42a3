use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::DEFAULT_TRACK_DURATION_SECONDS;

/// Data for inserting or updating a track (import phase).
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrack {
    pub external_id: String,
    pub source: String,
    pub title: String,
    pub artist: Option<String>,
    pub genre: Option<String>,
    pub bpm: Option<f64>,
    pub key: Option<String>,
    pub energy: Option<i32>,
    pub duration_seconds: Option<i64>,
    pub file_path: Option<String>,
}

/// A track row read from the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: i64,
    pub external_id: String,
    pub source: String,
    pub title: String,
    pub artist: Option<String>,
    pub genre: Option<String>,
    pub bpm: Option<f64>,
    pub key: Option<String>,
    pub energy: Option<i32>,
    pub duration_seconds: Option<i64>,
    pub file_path: Option<String>,
}

impl Track {
    /// Duration used for set accounting; tracks without one count as the default.
    pub fn effective_duration(&self) -> i64 {
        self.duration_seconds.unwrap_or(DEFAULT_TRACK_DURATION_SECONDS)
    }
}

/// Lifecycle of a library import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown upload status '{other}'")),
        }
    }
}

/// One import attempt of an external library file.
#[derive(Debug, Clone)]
pub struct LibraryUpload {
    pub id: i64,
    pub status: UploadStatus,
    pub source: String,
    pub file_path: Option<String>,
    pub total_tracks_imported: i64,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A generated set ready to be persisted together with its ordered tracks.
#[derive(Debug, Clone)]
pub struct NewPlaylist {
    pub name: String,
    pub duration_seconds: i64,
    pub bpm_min: f64,
    pub bpm_max: f64,
    pub energy_curve: String,
    pub prompt: Option<String>,
    pub generated_at: DateTime<Utc>,
    /// Track ids in play order; positions are assigned 1..=len on insert.
    pub track_ids: Vec<i64>,
}

/// A playlist row read from the database.
#[derive(Debug, Clone)]
pub struct Playlist {
    pub id: i64,
    pub name: String,
    pub duration_seconds: i64,
    pub bpm_min: f64,
    pub bpm_max: f64,
    pub energy_curve: String,
    pub total_tracks: i64,
    pub status: String,
    pub prompt: Option<String>,
    pub generated_at: String,
}

/// A track at its position within a playlist.
#[derive(Debug, Clone)]
pub struct PlaylistEntry {
    pub position: i64,
    pub track: Track,
}

/// Catalog statistics.
#[derive(Debug)]
pub struct LibraryStats {
    pub total_tracks: i64,
    pub tracks_with_bpm: i64,
    pub tracks_with_key: i64,
    pub total_duration_hours: f64,
    pub playlists: i64,
    pub sources: Vec<(String, i64)>,
    pub genres: Vec<(String, i64)>,
}

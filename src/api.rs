//! JSON bodies and the operations behind each CLI command.
//!
//! Every command returns a serializable body on success or an [`ApiError`]
//! carrying an HTTP-style status code.

use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::db::models::{LibraryStats, LibraryUpload, Playlist, PlaylistEntry};
use crate::db::{Database, DbError};
use crate::generator::curve::CurveRegistry;
use crate::generator::{self, GenerationError, SetRequest};
use crate::importer::{self, ImportError};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unprocessable(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Unprocessable(_) => 422,
            Self::Internal(_) => 500,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.to_string(),
            status: self.status(),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<GenerationError> for ApiError {
    fn from(e: GenerationError) -> Self {
        match e {
            GenerationError::Db(db) => db.into(),
            other => Self::Unprocessable(other.to_string()),
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(e: ImportError) -> Self {
        match e {
            ImportError::UploadNotFound(id) => Self::NotFound(format!("Upload {id} not found")),
            ImportError::Db(db) => db.into(),
            other => Self::Unprocessable(other.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub status: u16,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub id: i64,
    pub status: String,
    pub source: String,
    pub total_tracks_imported: i64,
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl UploadResponse {
    /// Body returned when an upload is created or processed.
    pub fn summary(u: &LibraryUpload) -> Self {
        Self {
            id: u.id,
            status: u.status.to_string(),
            source: u.source.clone(),
            total_tracks_imported: u.total_tracks_imported,
            error_message: u.error_message.clone(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Body returned when an upload is looked up, including its timestamps.
    pub fn detail(u: &LibraryUpload) -> Self {
        Self {
            created_at: Some(u.created_at.clone()),
            updated_at: Some(u.updated_at.clone()),
            ..Self::summary(u)
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TrackEntry {
    pub position: i64,
    pub id: i64,
    pub title: String,
    pub artist: Option<String>,
    pub bpm: Option<f64>,
    pub key: Option<String>,
    pub genre: Option<String>,
    pub energy: Option<i32>,
    pub duration_seconds: Option<i64>,
    pub file_path: Option<String>,
}

impl From<&PlaylistEntry> for TrackEntry {
    fn from(e: &PlaylistEntry) -> Self {
        let t = &e.track;
        Self {
            position: e.position,
            id: t.id,
            title: t.title.clone(),
            artist: t.artist.clone(),
            bpm: t.bpm,
            key: t.key.clone(),
            genre: t.genre.clone(),
            energy: t.energy,
            duration_seconds: t.duration_seconds,
            file_path: t.file_path.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PlaylistSummary {
    pub id: i64,
    pub name: String,
    pub duration_seconds: i64,
    pub duration_human: String,
    pub bpm_min: f64,
    pub bpm_max: f64,
    pub energy_curve: String,
    pub total_tracks: i64,
    pub status: String,
    pub prompt: Option<String>,
    pub generated_at: String,
}

impl From<&Playlist> for PlaylistSummary {
    fn from(p: &Playlist) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            duration_seconds: p.duration_seconds,
            duration_human: duration_human(p.duration_seconds),
            bpm_min: p.bpm_min,
            bpm_max: p.bpm_max,
            energy_curve: p.energy_curve.clone(),
            total_tracks: p.total_tracks,
            status: p.status.clone(),
            prompt: p.prompt.clone(),
            generated_at: p.generated_at.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PlaylistDetail {
    #[serde(flatten)]
    pub summary: PlaylistSummary,
    pub tracks: Vec<TrackEntry>,
}

impl PlaylistDetail {
    pub fn new(playlist: &Playlist, entries: &[PlaylistEntry]) -> Self {
        Self {
            summary: playlist.into(),
            tracks: entries.iter().map(TrackEntry::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PlaylistBody {
    pub playlist: PlaylistDetail,
    /// Requested curve name that was unknown; the set used `linear_up` instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unknown_energy_curve: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PlaylistsBody {
    pub playlists: Vec<PlaylistSummary>,
}

#[derive(Debug, Serialize)]
pub struct StatsBody {
    pub total_tracks: i64,
    pub tracks_with_bpm: i64,
    pub tracks_with_key: i64,
    pub total_duration_hours: f64,
    pub playlists: i64,
    pub sources: Vec<CountEntry>,
    pub genres: Vec<CountEntry>,
}

#[derive(Debug, Serialize)]
pub struct CountEntry {
    pub name: String,
    pub count: i64,
}

impl From<LibraryStats> for StatsBody {
    fn from(s: LibraryStats) -> Self {
        let entries = |v: Vec<(String, i64)>| -> Vec<CountEntry> {
            v.into_iter()
                .map(|(name, count)| CountEntry { name, count })
                .collect()
        };
        Self {
            total_tracks: s.total_tracks,
            tracks_with_bpm: s.tracks_with_bpm,
            tracks_with_key: s.tracks_with_key,
            total_duration_hours: s.total_duration_hours,
            playlists: s.playlists,
            sources: entries(s.sources),
            genres: entries(s.genres),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CurveBody {
    pub name: String,
    pub start: f64,
    pub finish: f64,
    pub shape: String,
}

/// `"1h 5m"` for an hour or more, otherwise `"45m"`.
pub fn duration_human(seconds: i64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Register a library file. Unless `queue` is set it is imported right away.
pub fn create_upload(
    db: &Database,
    file: &Path,
    source: &str,
    queue: bool,
) -> Result<UploadResponse, ApiError> {
    let upload = importer::create_upload(db, Some(file), source)?;
    if queue {
        return Ok(UploadResponse::summary(&upload));
    }
    let result = importer::import_upload(db, upload.id)?;
    Ok(UploadResponse::summary(&result.upload))
}

pub fn process_uploads(db: &Database) -> Result<Vec<UploadResponse>, ApiError> {
    let results = importer::process_pending(db)?;
    Ok(results
        .iter()
        .map(|r| UploadResponse::summary(&r.upload))
        .collect())
}

pub fn show_upload(db: &Database, id: i64) -> Result<UploadResponse, ApiError> {
    let upload = db
        .get_upload(id)?
        .ok_or_else(|| ApiError::NotFound(format!("Upload {id} not found")))?;
    Ok(UploadResponse::detail(&upload))
}

pub fn generate(
    db: &Database,
    curves: &CurveRegistry,
    request: &SetRequest,
) -> Result<PlaylistBody, ApiError> {
    let set = generator::generate_set(db, curves, request)?;
    Ok(PlaylistBody {
        playlist: PlaylistDetail::new(&set.playlist, &set.entries),
        unknown_energy_curve: set.unknown_curve,
    })
}

pub fn list_playlists(db: &Database) -> Result<PlaylistsBody, ApiError> {
    let playlists = db.list_playlists()?;
    Ok(PlaylistsBody {
        playlists: playlists.iter().map(PlaylistSummary::from).collect(),
    })
}

pub fn show_playlist(db: &Database, id: i64) -> Result<PlaylistBody, ApiError> {
    let playlist = find_playlist(db, id)?;
    let entries = db.playlist_entries(id)?;
    Ok(PlaylistBody {
        playlist: PlaylistDetail::new(&playlist, &entries),
        unknown_energy_curve: None,
    })
}

pub fn stats(db: &Database) -> Result<StatsBody, ApiError> {
    Ok(db.stats()?.into())
}

pub fn curves(registry: &CurveRegistry) -> Vec<CurveBody> {
    registry
        .curves()
        .iter()
        .map(|c| CurveBody {
            name: c.name.clone(),
            start: c.start,
            finish: c.finish,
            shape: c.shape.to_string(),
        })
        .collect()
}

pub(crate) fn find_playlist(db: &Database, id: i64) -> Result<Playlist, ApiError> {
    db.get_playlist(id)?
        .ok_or_else(|| ApiError::NotFound(format!("Playlist {id} not found")))
}

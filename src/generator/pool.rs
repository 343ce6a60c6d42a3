use crate::db::models::Track;
use crate::db::{Database, DbError};

/// Filters that define the candidate pool for one generation request.
#[derive(Debug, Clone)]
pub struct PoolCriteria {
    pub bpm_min: f64,
    pub bpm_max: f64,
    /// Genre names to keep (case-insensitive). Empty keeps every genre.
    pub genres: Vec<String>,
}

/// Load every catalog track that matches `criteria`, ordered by id.
pub fn build_pool(db: &Database, criteria: &PoolCriteria) -> Result<Vec<Track>, DbError> {
    let tracks = db.tracks_in_bpm_range(criteria.bpm_min, criteria.bpm_max)?;
    let pool = filter_by_genre(tracks, &criteria.genres);

    log::debug!(
        "Pool for {}-{} BPM ({} genre filters): {} tracks",
        criteria.bpm_min,
        criteria.bpm_max,
        criteria.genres.len(),
        pool.len()
    );
    Ok(pool)
}

/// Keep tracks whose genre matches one of `genres`, ignoring case.
/// Blank entries are ignored; no usable entries means no filtering.
pub fn filter_by_genre(tracks: Vec<Track>, genres: &[String]) -> Vec<Track> {
    let wanted: Vec<String> = genres
        .iter()
        .map(|g| g.trim().to_lowercase())
        .filter(|g| !g.is_empty())
        .collect();

    if wanted.is_empty() {
        return tracks;
    }

    tracks
        .into_iter()
        .filter(|t| {
            t.genre
                .as_deref()
                .map(|g| wanted.contains(&g.trim().to_lowercase()))
                .unwrap_or(false)
        })
        .collect()
}

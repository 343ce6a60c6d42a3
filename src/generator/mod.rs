//! Set generation: build a candidate pool, pick an opening track, then
//! greedily extend the set by the best-scoring next track until the target
//! duration is reached or the pool runs dry.

pub mod curve;
pub mod pool;
pub mod scoring;

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::Utc;
use thiserror::Error;

use crate::db::models::{NewPlaylist, Playlist, PlaylistEntry, Track};
use crate::db::{Database, DbError};
use curve::{CurveRegistry, EnergyCurve, FALLBACK_CURVE};
use pool::PoolCriteria;

/// Energy assumed for an opening-track candidate without one.
const DEFAULT_OPENING_ENERGY: i32 = 5;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("No tracks found matching criteria. Try widening the BPM range or removing genre filters.")]
    NoTracks,
    #[error("Could not generate a set: no track in the pool has a BPM to start from.")]
    NoStartingTrack,
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Database error: {0}")]
    Db(#[from] DbError),
}

/// Parameters for one generated set.
#[derive(Debug, Clone)]
pub struct SetRequest {
    pub name: Option<String>,
    pub duration_minutes: u32,
    pub bpm_min: f64,
    pub bpm_max: f64,
    pub genres: Vec<String>,
    pub energy_curve: Option<String>,
    pub prompt: Option<String>,
}

impl SetRequest {
    pub fn target_seconds(&self) -> i64 {
        i64::from(self.duration_minutes) * 60
    }

    fn validate(&self) -> Result<(), GenerationError> {
        if self.duration_minutes == 0 {
            return Err(GenerationError::InvalidRequest(
                "duration_minutes must be greater than zero".to_string(),
            ));
        }
        if !self.bpm_min.is_finite() || !self.bpm_max.is_finite() {
            return Err(GenerationError::InvalidRequest(
                "bpm_min and bpm_max must be numbers".to_string(),
            ));
        }
        if self.bpm_min > self.bpm_max {
            return Err(GenerationError::InvalidRequest(format!(
                "bpm_min ({}) must not exceed bpm_max ({})",
                self.bpm_min, self.bpm_max
            )));
        }
        Ok(())
    }
}

/// A persisted set with its tracks in play order.
#[derive(Debug, Clone)]
pub struct GeneratedSet {
    pub playlist: Playlist,
    pub entries: Vec<PlaylistEntry>,
    /// Set when the requested curve was unknown and the fallback was used.
    pub unknown_curve: Option<String>,
}

/// Run the full pipeline for `request` and persist the result as a playlist.
pub fn generate_set(
    db: &Database,
    curves: &CurveRegistry,
    request: &SetRequest,
) -> Result<GeneratedSet, GenerationError> {
    request.validate()?;

    let criteria = PoolCriteria {
        bpm_min: request.bpm_min,
        bpm_max: request.bpm_max,
        genres: request.genres.clone(),
    };
    let pool = pool::build_pool(db, &criteria)?;
    if pool.is_empty() {
        return Err(GenerationError::NoTracks);
    }

    let resolved = curves.resolve(request.energy_curve.as_deref().unwrap_or(FALLBACK_CURVE));
    let selected = sequence(&pool, request.bpm_min, request.target_seconds(), resolved.curve)?;

    let duration_seconds: i64 = selected.iter().map(|t| t.effective_duration()).sum();
    let generated_at = Utc::now();
    let name = request
        .name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| format!("Generated Set {}", generated_at.format("%Y-%m-%d %H:%M")));

    let playlist_id = db.insert_playlist(&NewPlaylist {
        name,
        duration_seconds,
        bpm_min: request.bpm_min,
        bpm_max: request.bpm_max,
        energy_curve: resolved.curve.name.clone(),
        prompt: request.prompt.clone(),
        generated_at,
        track_ids: selected.iter().map(|t| t.id).collect(),
    })?;

    log::info!(
        "Generated playlist {} with {} tracks ({}s of {}s target, curve {})",
        playlist_id,
        selected.len(),
        duration_seconds,
        request.target_seconds(),
        resolved.curve.name
    );

    let playlist = db
        .get_playlist(playlist_id)?
        .ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))?;
    let entries = db.playlist_entries(playlist_id)?;

    Ok(GeneratedSet {
        playlist,
        entries,
        unknown_curve: resolved.unknown_name,
    })
}

/// Order tracks from `pool` into a set of roughly `target_seconds`.
///
/// The opening track is the one whose BPM is closest to `bpm_min`, with the
/// lowest energy breaking ties. Each following track is the best-scoring
/// unused candidate against the previous one. Stops once the accumulated
/// duration reaches the target or every pool track is used, so the result
/// can be shorter than requested.
pub fn sequence<'a>(
    pool: &'a [Track],
    bpm_min: f64,
    target_seconds: i64,
    curve: &EnergyCurve,
) -> Result<Vec<&'a Track>, GenerationError> {
    if pool.is_empty() {
        return Err(GenerationError::NoTracks);
    }

    let first = select_opening_track(pool, bpm_min).ok_or(GenerationError::NoStartingTrack)?;

    let mut selected = vec![first];
    let mut used: HashSet<i64> = HashSet::from([first.id]);
    let mut accumulated = first.effective_duration();

    while accumulated < target_seconds && used.len() < pool.len() {
        let progress = accumulated as f64 / target_seconds as f64;
        let desired_energy = curve.desired_energy(progress);

        let current = selected[selected.len() - 1];
        let candidates = pool.iter().filter(|t| !used.contains(&t.id));

        let Some((next, score)) =
            scoring::best_candidate(current, candidates, desired_energy, current.artist.as_deref())
        else {
            break;
        };

        log::debug!(
            "#{} {} (score {:.1}, desired energy {:.2}, progress {:.2})",
            selected.len() + 1,
            next.title,
            score,
            desired_energy,
            progress
        );

        used.insert(next.id);
        accumulated += next.effective_duration();
        selected.push(next);
    }

    Ok(selected)
}

/// Track with a BPM closest to `bpm_min`; ties go to the lowest energy, then pool order.
fn select_opening_track(pool: &[Track], bpm_min: f64) -> Option<&Track> {
    pool.iter()
        .filter_map(|t| t.bpm.map(|bpm| (t, (bpm - bpm_min).abs())))
        .min_by(|(a, a_dist), (b, b_dist)| {
            a_dist
                .partial_cmp(b_dist)
                .unwrap_or(Ordering::Equal)
                .then_with(|| {
                    a.energy
                        .unwrap_or(DEFAULT_OPENING_ENERGY)
                        .cmp(&b.energy.unwrap_or(DEFAULT_OPENING_ENERGY))
                })
        })
        .map(|(t, _)| t)
}

use super::models::{
    LibraryStats, LibraryUpload, NewPlaylist, NewTrack, Playlist, PlaylistEntry, Track,
    UploadStatus,
};
use super::{Database, Result};
use chrono::SecondsFormat;
use rusqlite::{params, Connection, OptionalExtension, Row};

const TRACK_COLUMNS: &str = "id, external_id, source, title, artist, genre, bpm, key, energy,
                             duration_seconds, file_path";

const UPLOAD_COLUMNS: &str = "id, status, source, file_path, total_tracks_imported,
                              error_message, created_at, updated_at";

const PLAYLIST_COLUMNS: &str = "id, name, duration_seconds, bpm_min, bpm_max, energy_curve,
                                total_tracks, status, prompt, generated_at";

fn track_from_row(row: &Row) -> rusqlite::Result<Track> {
    Ok(Track {
        id: row.get(0)?,
        external_id: row.get(1)?,
        source: row.get(2)?,
        title: row.get(3)?,
        artist: row.get(4)?,
        genre: row.get(5)?,
        bpm: row.get(6)?,
        key: row.get(7)?,
        energy: row.get(8)?,
        duration_seconds: row.get(9)?,
        file_path: row.get(10)?,
    })
}

fn upload_from_row(row: &Row) -> rusqlite::Result<LibraryUpload> {
    let status: String = row.get(1)?;
    let status = status.parse::<UploadStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, e.into())
    })?;

    Ok(LibraryUpload {
        id: row.get(0)?,
        status,
        source: row.get(2)?,
        file_path: row.get(3)?,
        total_tracks_imported: row.get(4)?,
        error_message: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn playlist_from_row(row: &Row) -> rusqlite::Result<Playlist> {
    Ok(Playlist {
        id: row.get(0)?,
        name: row.get(1)?,
        duration_seconds: row.get(2)?,
        bpm_min: row.get(3)?,
        bpm_max: row.get(4)?,
        energy_curve: row.get(5)?,
        total_tracks: row.get(6)?,
        status: row.get(7)?,
        prompt: row.get(8)?,
        generated_at: row.get(9)?,
    })
}

impl Database {
    /// Insert or update a track keyed by `(external_id, source)`. Returns the track id.
    pub fn upsert_track(&self, t: &NewTrack) -> Result<i64> {
        Self::upsert_track_row(&self.conn, t)
    }

    /// Upsert on an explicit connection (used inside the import transaction).
    pub(crate) fn upsert_track_row(conn: &Connection, t: &NewTrack) -> Result<i64> {
        conn.execute(
            "INSERT INTO tracks (
                external_id, source, title, artist, genre,
                bpm, key, energy, duration_seconds, file_path,
                updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9, ?10,
                datetime('now')
            )
            ON CONFLICT(external_id, source) DO UPDATE SET
                title = excluded.title,
                artist = excluded.artist,
                genre = excluded.genre,
                bpm = excluded.bpm,
                key = excluded.key,
                energy = excluded.energy,
                duration_seconds = excluded.duration_seconds,
                file_path = excluded.file_path,
                updated_at = datetime('now')
            ",
            params![
                t.external_id, t.source, t.title, t.artist, t.genre,
                t.bpm, t.key, t.energy, t.duration_seconds, t.file_path,
            ],
        )?;

        let id: i64 = conn.query_row(
            "SELECT id FROM tracks WHERE external_id = ?1 AND source = ?2",
            params![t.external_id, t.source],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn get_track(&self, id: i64) -> Result<Option<Track>> {
        let track = self
            .conn
            .query_row(
                &format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE id = ?1"),
                params![id],
                track_from_row,
            )
            .optional()?;
        Ok(track)
    }

    /// Tracks with a known BPM inside `[bpm_min, bpm_max]`, ordered by id.
    /// Tracks without a BPM never match.
    pub fn tracks_in_bpm_range(&self, bpm_min: f64, bpm_max: f64) -> Result<Vec<Track>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TRACK_COLUMNS} FROM tracks
             WHERE bpm IS NOT NULL AND bpm BETWEEN ?1 AND ?2
             ORDER BY id"
        ))?;

        let tracks = stmt
            .query_map(params![bpm_min, bpm_max], track_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(tracks)
    }

    pub fn count_tracks(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Create a new upload in `pending` state. Returns its id.
    pub fn create_upload(&self, source: &str, file_path: Option<&str>) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO library_uploads (status, source, file_path) VALUES (?1, ?2, ?3)",
            params![UploadStatus::Pending.as_str(), source, file_path],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_upload(&self, id: i64) -> Result<Option<LibraryUpload>> {
        let upload = self
            .conn
            .query_row(
                &format!("SELECT {UPLOAD_COLUMNS} FROM library_uploads WHERE id = ?1"),
                params![id],
                upload_from_row,
            )
            .optional()?;
        Ok(upload)
    }

    pub fn set_upload_status(&self, id: i64, status: UploadStatus) -> Result<()> {
        self.conn.execute(
            "UPDATE library_uploads SET status = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![status.as_str(), id],
        )?;
        Ok(())
    }

    /// Record the terminal state of an import.
    pub fn finish_upload(
        &self,
        id: i64,
        status: UploadStatus,
        total_tracks_imported: i64,
        error_message: Option<&str>,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE library_uploads
             SET status = ?1, total_tracks_imported = ?2, error_message = ?3,
                 updated_at = datetime('now')
             WHERE id = ?4",
            params![status.as_str(), total_tracks_imported, error_message, id],
        )?;
        Ok(())
    }

    /// Ids of uploads still waiting to be processed, oldest first.
    pub fn pending_upload_ids(&self) -> Result<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM library_uploads WHERE status = ?1 ORDER BY id")?;
        let ids = stmt
            .query_map(params![UploadStatus::Pending.as_str()], |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    /// Persist a playlist and all of its track rows in a single transaction.
    /// Positions are 1-based in the order of `p.track_ids`.
    pub fn insert_playlist(&self, p: &NewPlaylist) -> Result<i64> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO playlists (
                name, duration_seconds, bpm_min, bpm_max, energy_curve,
                total_tracks, status, prompt, generated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'generated', ?7, ?8)",
            params![
                p.name,
                p.duration_seconds,
                p.bpm_min,
                p.bpm_max,
                p.energy_curve,
                p.track_ids.len() as i64,
                p.prompt,
                p.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            ],
        )?;
        let playlist_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO playlist_tracks (playlist_id, track_id, position)
                 VALUES (?1, ?2, ?3)",
            )?;
            for (i, track_id) in p.track_ids.iter().enumerate() {
                stmt.execute(params![playlist_id, track_id, i as i64 + 1])?;
            }
        }

        tx.commit()?;
        Ok(playlist_id)
    }

    pub fn get_playlist(&self, id: i64) -> Result<Option<Playlist>> {
        let playlist = self
            .conn
            .query_row(
                &format!("SELECT {PLAYLIST_COLUMNS} FROM playlists WHERE id = ?1"),
                params![id],
                playlist_from_row,
            )
            .optional()?;
        Ok(playlist)
    }

    /// All playlists, newest first.
    pub fn list_playlists(&self) -> Result<Vec<Playlist>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PLAYLIST_COLUMNS} FROM playlists ORDER BY generated_at DESC, id DESC"
        ))?;
        let playlists = stmt
            .query_map([], playlist_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(playlists)
    }

    /// Tracks of a playlist in position order.
    pub fn playlist_entries(&self, playlist_id: i64) -> Result<Vec<PlaylistEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT pt.position,
                    t.id, t.external_id, t.source, t.title, t.artist, t.genre, t.bpm, t.key,
                    t.energy, t.duration_seconds, t.file_path
             FROM playlist_tracks pt
             JOIN tracks t ON t.id = pt.track_id
             WHERE pt.playlist_id = ?1
             ORDER BY pt.position",
        )?;

        let entries = stmt
            .query_map(params![playlist_id], |row| {
                Ok(PlaylistEntry {
                    position: row.get(0)?,
                    track: Track {
                        id: row.get(1)?,
                        external_id: row.get(2)?,
                        source: row.get(3)?,
                        title: row.get(4)?,
                        artist: row.get(5)?,
                        genre: row.get(6)?,
                        bpm: row.get(7)?,
                        key: row.get(8)?,
                        energy: row.get(9)?,
                        duration_seconds: row.get(10)?,
                        file_path: row.get(11)?,
                    },
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// Get catalog statistics.
    pub fn stats(&self) -> Result<LibraryStats> {
        let (total_tracks, tracks_with_bpm, tracks_with_key, total_duration_hours): (i64, i64, i64, f64) =
            self.conn.query_row(
                "SELECT COUNT(*),
                        COUNT(bpm),
                        COUNT(key),
                        COALESCE(SUM(duration_seconds), 0) / 3600.0
                 FROM tracks",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;

        let playlists: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM playlists", [], |row| row.get(0))?;

        let mut source_stmt = self.conn.prepare(
            "SELECT source, COUNT(*) FROM tracks GROUP BY source ORDER BY COUNT(*) DESC",
        )?;
        let sources: Vec<(String, i64)> = source_stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut genre_stmt = self.conn.prepare(
            "SELECT COALESCE(genre, 'Unknown'), COUNT(*)
             FROM tracks
             GROUP BY COALESCE(genre, 'Unknown')
             ORDER BY COUNT(*) DESC
             LIMIT 20",
        )?;
        let genres: Vec<(String, i64)> = genre_stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(LibraryStats {
            total_tracks,
            tracks_with_bpm,
            tracks_with_key,
            total_duration_hours,
            playlists,
            sources,
            genres,
        })
    }
}

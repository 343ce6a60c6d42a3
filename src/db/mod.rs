pub mod models;
pub mod queries;

use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration failed: {0}")]
    Migration(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Current schema version, stored in `PRAGMA user_version`.
const SCHEMA_VERSION: i32 = 2;

pub struct Database {
    pub conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        // WAL mode for better concurrent read performance
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "synchronous", "NORMAL")?;
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        self.migrate()?;
        Ok(())
    }

    fn migrate(&self) -> Result<()> {
        let version: i32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);

        if version > SCHEMA_VERSION {
            return Err(DbError::Migration(format!(
                "database schema v{version} is newer than this build (v{SCHEMA_VERSION})"
            )));
        }

        if version < 1 {
            self.migrate_v1()?;
        }
        if version < 2 {
            self.migrate_v2()?;
        }

        self.conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        Ok(())
    }

    /// V1: track catalog + library uploads
    fn migrate_v1(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS tracks (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,

                -- Natural key: re-import of the same (external_id, source) updates in place
                external_id         TEXT NOT NULL,
                source              TEXT NOT NULL,

                title               TEXT NOT NULL,
                artist              TEXT,
                genre               TEXT,
                bpm                 REAL,
                key                 TEXT,     -- Camelot notation, e.g. '8A'
                energy              INTEGER,  -- 1-10
                duration_seconds    INTEGER,
                file_path           TEXT,

                created_at          TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at          TEXT NOT NULL DEFAULT (datetime('now')),

                UNIQUE(external_id, source)
            );

            CREATE INDEX IF NOT EXISTS idx_tracks_bpm ON tracks(bpm);
            CREATE INDEX IF NOT EXISTS idx_tracks_genre ON tracks(genre);

            CREATE TABLE IF NOT EXISTS library_uploads (
                id                      INTEGER PRIMARY KEY AUTOINCREMENT,
                status                  TEXT NOT NULL DEFAULT 'pending',
                source                  TEXT NOT NULL DEFAULT 'rekordbox',
                file_path               TEXT,
                total_tracks_imported   INTEGER NOT NULL DEFAULT 0,
                error_message           TEXT,
                created_at              TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at              TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_uploads_status ON library_uploads(status);
            ",
        )?;
        Ok(())
    }

    /// V2: generated playlists and their ordered track rows
    fn migrate_v2(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS playlists (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                name                TEXT NOT NULL,
                duration_seconds    INTEGER NOT NULL,
                bpm_min             REAL NOT NULL,
                bpm_max             REAL NOT NULL,
                energy_curve        TEXT NOT NULL,
                total_tracks        INTEGER NOT NULL,
                status              TEXT NOT NULL DEFAULT 'generated',
                prompt              TEXT,
                generated_at        TEXT NOT NULL,
                created_at          TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS playlist_tracks (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                playlist_id     INTEGER NOT NULL REFERENCES playlists(id) ON DELETE CASCADE,
                track_id        INTEGER NOT NULL REFERENCES tracks(id),
                position        INTEGER NOT NULL,
                UNIQUE(playlist_id, position)
            );
            CREATE INDEX IF NOT EXISTS idx_playlist_tracks_playlist ON playlist_tracks(playlist_id);
            ",
        )?;
        Ok(())
    }
}

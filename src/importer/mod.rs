pub mod rekordbox;

use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;

use crate::db::models::{LibraryUpload, UploadStatus};
use crate::db::{Database, DbError};

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("Invalid Rekordbox XML: no COLLECTION element")]
    MissingCollection,
    #[error("No file attached")]
    NoFile,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Upload {0} not found")]
    UploadNotFound(i64),
    #[error("Database error: {0}")]
    Db(#[from] DbError),
}

/// Outcome of processing one upload. `upload` is the row as stored afterwards.
#[derive(Debug, Clone)]
pub struct ImportResult {
    pub upload: LibraryUpload,
    pub imported: usize,
    pub errors: Vec<String>,
}

impl ImportResult {
    pub fn status(&self) -> UploadStatus {
        self.upload.status
    }
}

/// Tracks written and per-track failures for one XML document.
#[derive(Debug, Default)]
pub struct ImportOutcome {
    pub imported: usize,
    pub errors: Vec<String>,
}

/// Register a library file for import. The upload starts out `pending`.
pub fn create_upload(
    db: &Database,
    file: Option<&Path>,
    source: &str,
) -> Result<LibraryUpload, ImportError> {
    let file_path = file.map(|p| p.to_string_lossy().to_string());
    let id = db.create_upload(source, file_path.as_deref())?;
    log::info!("Created upload {id} ({source})");
    load_upload(db, id)
}

/// Run the import for a single upload and record the result on it.
///
/// A bad document marks the upload `failed` and still returns `Ok`. If the
/// result cannot be recorded as `completed`, the upload is marked `failed`
/// instead so it never stays `processing`. Only a missing upload or a
/// database that rejects every update surfaces as `Err`.
pub fn import_upload(db: &Database, upload_id: i64) -> Result<ImportResult, ImportError> {
    let upload = load_upload(db, upload_id)?;
    db.set_upload_status(upload_id, UploadStatus::Processing)?;

    let (imported, errors) = match run_import(db, &upload) {
        Ok(outcome) => {
            let error_message = if outcome.errors.is_empty() {
                None
            } else {
                Some(outcome.errors.join("; "))
            };
            match db.finish_upload(
                upload_id,
                UploadStatus::Completed,
                outcome.imported as i64,
                error_message.as_deref(),
            ) {
                Ok(()) => {
                    log::info!(
                        "Upload {upload_id}: imported {} tracks, {} errors",
                        outcome.imported,
                        outcome.errors.len()
                    );
                    (outcome.imported, outcome.errors)
                }
                Err(e) => {
                    let message = format!("Could not record import result: {e}");
                    record_failure(db, upload_id, &message)?;
                    (0, vec![message])
                }
            }
        }
        Err(e) => {
            let message = e.to_string();
            record_failure(db, upload_id, &message)?;
            (0, vec![message])
        }
    };

    Ok(ImportResult {
        upload: load_upload(db, upload_id)?,
        imported,
        errors,
    })
}

/// Import every pending upload, oldest first.
/// An upload that cannot be processed is logged and skipped; the rest still run.
pub fn process_pending(db: &Database) -> Result<Vec<ImportResult>, ImportError> {
    let ids = db.pending_upload_ids()?;
    if ids.is_empty() {
        log::info!("No pending uploads");
    }

    let mut results = Vec::with_capacity(ids.len());
    for id in ids {
        match import_upload(db, id) {
            Ok(result) => results.push(result),
            Err(e) => log::error!("Error processing upload {id}: {e}"),
        }
    }
    Ok(results)
}

fn record_failure(db: &Database, id: i64, message: &str) -> Result<(), ImportError> {
    log::error!("Upload {id} failed: {message}");
    db.finish_upload(id, UploadStatus::Failed, 0, Some(message))?;
    Ok(())
}

fn load_upload(db: &Database, id: i64) -> Result<LibraryUpload, ImportError> {
    db.get_upload(id)?.ok_or(ImportError::UploadNotFound(id))
}

fn run_import(db: &Database, upload: &LibraryUpload) -> Result<ImportOutcome, ImportError> {
    let path = upload.file_path.as_deref().ok_or(ImportError::NoFile)?;
    let xml = std::fs::read_to_string(path)?;
    import_xml(db, &xml, &upload.source)
}

/// Parse a Rekordbox document and upsert its tracks under `source`.
///
/// Tracks that fail to parse or store are skipped and reported as
/// `"Track <id>: <message>"`; the rest are committed together.
pub fn import_xml(db: &Database, xml: &str, source: &str) -> Result<ImportOutcome, ImportError> {
    let parsed = rekordbox::parse_collection(xml, source)?;

    let pb = ProgressBar::new(parsed.len() as u64);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}) ({eta}) {msg}",
    ) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message("Importing...");

    let mut outcome = ImportOutcome::default();

    let tx = db.conn.unchecked_transaction().map_err(DbError::from)?;

    for result in parsed {
        match result {
            Ok(track) => match Database::upsert_track_row(&tx, &track) {
                Ok(_) => outcome.imported += 1,
                Err(e) => {
                    log::warn!("Error storing track {}: {}", track.external_id, e);
                    outcome
                        .errors
                        .push(format!("Track {}: {}", track.external_id, e));
                }
            },
            Err(e) => {
                log::warn!("Skipping track: {e}");
                outcome.errors.push(e.to_string());
            }
        }
        pb.inc(1);
    }

    tx.commit().map_err(DbError::from)?;

    pb.finish_with_message(format!(
        "Done: {} imported, {} errors",
        outcome.imported,
        outcome.errors.len()
    ));

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const LIBRARY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<DJ_PLAYLISTS Version="1.0.0">
  <COLLECTION Entries="3">
    <TRACK TrackID="1" Name="Strings of Life" Artist="Rhythim Is Rhythim" Genre="Techno"
           AverageBpm="125.00" Tonality="8A" Rating="204" TotalTime="380"
           Location="file://localhost/Music/track1.mp3"/>
    <TRACK TrackID="2" Name="Windowlicker" Artist="Aphex Twin" Genre="IDM"
           AverageBpm="127.00" Tonality="9A" Rating="102" TotalTime="366"/>
    <TRACK TrackID="3" Name="Xtal" Artist="Aphex Twin" AverageBpm="128.50"/>
  </COLLECTION>
</DJ_PLAYLISTS>"#;

    /// Write `contents` to a file unique to this test and return its path.
    fn fixture(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "setforge-import-{}-{name}.xml",
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn upload_and_import(db: &Database, name: &str, contents: &str) -> ImportResult {
        let path = fixture(name, contents);
        let upload = create_upload(db, Some(&path), "rekordbox").unwrap();
        let result = import_upload(db, upload.id).unwrap();
        let _ = std::fs::remove_file(&path);
        result
    }

    #[test]
    fn test_import_completes() {
        let db = Database::open_in_memory().unwrap();
        let result = upload_and_import(&db, "complete", LIBRARY);

        assert_eq!(result.status(), UploadStatus::Completed);
        assert_eq!(result.imported, 3);
        assert!(result.errors.is_empty());
        assert_eq!(result.upload.total_tracks_imported, 3);
        assert_eq!(result.upload.error_message, None);
        assert_eq!(db.count_tracks().unwrap(), 3);

        let first = db.tracks_in_bpm_range(0.0, 200.0).unwrap().remove(0);
        assert_eq!(first.title, "Strings of Life");
        assert_eq!(first.energy, Some(8));
        assert_eq!(first.file_path.as_deref(), Some("/Music/track1.mp3"));
    }

    #[test]
    fn test_reimport_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        upload_and_import(&db, "idem-a", LIBRARY);
        let before = db.tracks_in_bpm_range(0.0, 200.0).unwrap();

        let again = upload_and_import(&db, "idem-b", LIBRARY);
        assert_eq!(again.imported, 3);
        let after = db.tracks_in_bpm_range(0.0, 200.0).unwrap();

        assert_eq!(db.count_tracks().unwrap(), 3);
        let ids = |ts: &[crate::db::models::Track]| ts.iter().map(|t| t.id).collect::<Vec<_>>();
        assert_eq!(ids(&before), ids(&after));
    }

    #[test]
    fn test_reimport_overwrites_fields() {
        let db = Database::open_in_memory().unwrap();
        upload_and_import(&db, "overwrite-a", LIBRARY);

        let edited = LIBRARY.replace("Strings of Life", "Strings of Life (Remaster)");
        upload_and_import(&db, "overwrite-b", &edited);

        let tracks = db.tracks_in_bpm_range(0.0, 200.0).unwrap();
        assert_eq!(tracks.len(), 3);
        assert_eq!(tracks[0].title, "Strings of Life (Remaster)");
    }

    #[test]
    fn test_partial_errors_still_complete() {
        let db = Database::open_in_memory().unwrap();
        let xml = r#"<DJ_PLAYLISTS><COLLECTION>
            <TRACK TrackID="1" Name="Good" AverageBpm="124"/>
            <TRACK TrackID="2" Name="Bad BPM" AverageBpm="fast"/>
            <TRACK TrackID="3" Name="Bad Rating" Rating="five stars"/>
        </COLLECTION></DJ_PLAYLISTS>"#;

        let result = upload_and_import(&db, "partial", xml);
        assert_eq!(result.status(), UploadStatus::Completed);
        assert_eq!(result.imported, 1);
        assert_eq!(result.errors.len(), 2);
        assert_eq!(
            result.upload.error_message.as_deref(),
            Some("Track 2: invalid AverageBpm 'fast'; Track 3: invalid Rating 'five stars'")
        );
        assert_eq!(result.upload.total_tracks_imported, 1);
    }

    #[test]
    fn test_missing_collection_fails_upload() {
        let db = Database::open_in_memory().unwrap();
        let result = upload_and_import(&db, "nocollection", "<DJ_PLAYLISTS><PLAYLISTS/></DJ_PLAYLISTS>");

        assert_eq!(result.status(), UploadStatus::Failed);
        assert_eq!(result.imported, 0);
        assert_eq!(
            result.upload.error_message.as_deref(),
            Some("Invalid Rekordbox XML: no COLLECTION element")
        );
        assert_eq!(db.count_tracks().unwrap(), 0);
    }

    #[test]
    fn test_malformed_xml_fails_upload() {
        let db = Database::open_in_memory().unwrap();
        let result = upload_and_import(&db, "malformed", "<DJ_PLAYLISTS><COLLECTION>");
        assert_eq!(result.status(), UploadStatus::Failed);
        assert!(result
            .upload
            .error_message
            .as_deref()
            .unwrap()
            .starts_with("XML parse error"));
    }

    #[test]
    fn test_upload_without_file_fails() {
        let db = Database::open_in_memory().unwrap();
        let upload = create_upload(&db, None, "rekordbox").unwrap();
        assert_eq!(upload.status, UploadStatus::Pending);

        let result = import_upload(&db, upload.id).unwrap();
        assert_eq!(result.status(), UploadStatus::Failed);
        assert_eq!(result.upload.error_message.as_deref(), Some("No file attached"));
    }

    #[test]
    fn test_unreadable_file_fails() {
        let db = Database::open_in_memory().unwrap();
        let missing = std::env::temp_dir().join("setforge-import-does-not-exist.xml");
        let upload = create_upload(&db, Some(&missing), "rekordbox").unwrap();

        let result = import_upload(&db, upload.id).unwrap();
        assert_eq!(result.status(), UploadStatus::Failed);
        assert!(result.upload.error_message.unwrap().starts_with("IO error"));
    }

    #[test]
    fn test_unknown_upload() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            import_upload(&db, 42),
            Err(ImportError::UploadNotFound(42))
        ));
    }

    #[test]
    fn test_queued_uploads_wait_for_processing() {
        let db = Database::open_in_memory().unwrap();
        let path = fixture("queued", LIBRARY);
        let first = create_upload(&db, Some(&path), "rekordbox").unwrap();
        let second = create_upload(&db, None, "rekordbox").unwrap();

        assert_eq!(db.count_tracks().unwrap(), 0);
        assert_eq!(db.pending_upload_ids().unwrap(), vec![first.id, second.id]);

        let results = process_pending(&db).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].upload.id, first.id);
        assert_eq!(results[0].status(), UploadStatus::Completed);
        assert_eq!(results[1].status(), UploadStatus::Failed);
        assert!(db.pending_upload_ids().unwrap().is_empty());
        assert_eq!(db.count_tracks().unwrap(), 3);
    }

    #[test]
    fn test_unrecorded_completion_marks_upload_failed() {
        let db = Database::open_in_memory().unwrap();
        db.conn
            .execute_batch(
                "CREATE TRIGGER reject_completed BEFORE UPDATE OF status ON library_uploads
                 WHEN NEW.status = 'completed'
                 BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
            )
            .unwrap();

        let result = upload_and_import(&db, "unrecorded", LIBRARY);
        assert_eq!(result.status(), UploadStatus::Failed);
        assert_eq!(result.imported, 0);
        assert!(result.upload.error_message.unwrap().contains("disk full"));
    }

    #[test]
    fn test_process_pending_continues_after_broken_upload() {
        let db = Database::open_in_memory().unwrap();
        let path = fixture("continues", LIBRARY);
        let stuck = create_upload(&db, Some(&path), "rekordbox").unwrap();
        let next = create_upload(&db, Some(&path), "rekordbox").unwrap();
        db.conn
            .execute_batch(&format!(
                "CREATE TRIGGER freeze_upload BEFORE UPDATE ON library_uploads
                 WHEN OLD.id = {}
                 BEGIN SELECT RAISE(ABORT, 'locked'); END;",
                stuck.id
            ))
            .unwrap();

        let results = process_pending(&db).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].upload.id, next.id);
        assert_eq!(results[0].status(), UploadStatus::Completed);
        assert_eq!(db.count_tracks().unwrap(), 3);
    }

    #[test]
    fn test_source_is_taken_from_upload() {
        let db = Database::open_in_memory().unwrap();
        let path = fixture("source", LIBRARY);
        let upload = create_upload(&db, Some(&path), "traktor").unwrap();
        import_upload(&db, upload.id).unwrap();
        let _ = std::fs::remove_file(&path);

        let tracks = db.tracks_in_bpm_range(0.0, 200.0).unwrap();
        assert!(tracks.iter().all(|t| t.source == "traktor"));
    }
}

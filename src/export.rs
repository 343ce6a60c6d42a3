use crate::api::{self, ApiError};
use crate::db::models::PlaylistEntry;
use crate::db::Database;

const UNKNOWN_ARTIST: &str = "Unknown Artist";
const UNKNOWN_TITLE: &str = "Unknown Track";
const UNKNOWN_PATH: &str = "unknown.mp3";

/// Render playlist entries as an extended M3U document.
/// Lines are joined with `\n` and there is no trailing newline.
pub fn to_m3u(entries: &[PlaylistEntry]) -> String {
    let mut lines = Vec::with_capacity(entries.len() * 2 + 1);
    lines.push("#EXTM3U".to_string());

    for entry in entries {
        let t = &entry.track;
        let artist = t.artist.as_deref().filter(|a| !a.is_empty()).unwrap_or(UNKNOWN_ARTIST);
        let title = Some(t.title.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(UNKNOWN_TITLE);
        let path = t.file_path.as_deref().filter(|p| !p.is_empty()).unwrap_or(UNKNOWN_PATH);

        lines.push(format!("#EXTINF:{},{} - {}", t.effective_duration(), artist, title));
        lines.push(path.to_string());
    }

    lines.join("\n")
}

/// Load a stored playlist and render it as M3U.
pub fn export_playlist(db: &Database, playlist_id: i64) -> Result<String, ApiError> {
    let playlist = api::find_playlist(db, playlist_id)?;
    let entries = db.playlist_entries(playlist.id)?;
    log::info!("Exporting playlist {} ({} tracks)", playlist.id, entries.len());
    Ok(to_m3u(&entries))
}

/// Attachment file name for a playlist: unsafe characters become `_`.
pub fn m3u_filename(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == ' ');

    if cleaned.is_empty() {
        "playlist.m3u".to_string()
    } else {
        format!("{cleaned}.m3u")
    }
}

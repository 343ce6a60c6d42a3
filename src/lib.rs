pub mod api;
pub mod config;
pub mod db;
pub mod export;
pub mod generator;
pub mod importer;

/// Duration assumed for any track whose length is unknown, in seconds.
/// Used by set accounting, the sequencer loop and M3U export alike.
pub const DEFAULT_TRACK_DURATION_SECONDS: i64 = 300;

/// Source label for tracks imported from Rekordbox XML.
pub const DEFAULT_SOURCE: &str = "rekordbox";

/// Application name for XDG paths
pub const APP_NAME: &str = "setforge";

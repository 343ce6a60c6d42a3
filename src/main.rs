use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use setforge::api::{self, ApiError};
use setforge::generator::curve::CurveRegistry;
use setforge::generator::SetRequest;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "setforge", version, about = "DJ set builder for Rekordbox libraries")]
struct Cli {
    /// Path to the SQLite database
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a Rekordbox XML library export
    Import {
        /// Path to the exported XML file
        file: PathBuf,

        /// Source label stored on each track (defaults to config default_source)
        #[arg(long)]
        source: Option<String>,

        /// Only register the upload; run `process-uploads` later to import it
        #[arg(long)]
        queue: bool,
    },

    /// Import every queued upload
    ProcessUploads,

    /// Show the status of an upload
    Upload {
        id: i64,
    },

    /// Generate a DJ set from the library
    Generate {
        /// Target set length in minutes (defaults to config)
        #[arg(short, long)]
        duration_minutes: Option<u32>,

        /// Lowest BPM to include
        #[arg(long)]
        bpm_min: f64,

        /// Highest BPM to include
        #[arg(long)]
        bpm_max: f64,

        /// Only use tracks of this genre (repeatable)
        #[arg(short, long = "genre")]
        genres: Vec<String>,

        /// Energy curve name (see `curves`)
        #[arg(short, long)]
        energy_curve: Option<String>,

        /// Playlist name (defaults to "Generated Set <date>")
        #[arg(short, long)]
        name: Option<String>,

        /// Free-form note stored with the playlist
        #[arg(long)]
        prompt: Option<String>,
    },

    /// List generated playlists
    Playlists,

    /// Show a playlist with its tracks
    Playlist {
        id: i64,
    },

    /// Export a playlist as M3U
    ExportM3u {
        id: i64,

        /// Write to this file or directory instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show library statistics
    Stats,

    /// List available energy curves
    Curves,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = setforge::config::AppConfig::load();
    let curves = CurveRegistry::new(&config.curves);

    // Resolve database path: CLI > config > XDG default
    let db_path = cli
        .db_path
        .clone()
        .or(config.db_path.clone())
        .unwrap_or_else(setforge::config::default_db_path);
    log::info!("Database: {}", db_path.display());

    let db = setforge::db::Database::open(&db_path).context("Failed to open database")?;

    if let Err(err) = run(cli.command, &db, &curves, &config) {
        if let Some(api_err) = err.downcast_ref::<ApiError>() {
            eprintln!("{}", serde_json::to_string_pretty(&api_err.body())?);
            std::process::exit(1);
        }
        return Err(err);
    }
    Ok(())
}

fn run(
    command: Commands,
    db: &setforge::db::Database,
    curves: &CurveRegistry,
    config: &setforge::config::AppConfig,
) -> Result<()> {
    match command {
        Commands::Import { file, source, queue } => {
            let source = source.unwrap_or_else(|| config.default_source.clone());
            let upload = api::create_upload(db, &file, &source, queue)?;
            print_json(&upload)?;
        }

        Commands::ProcessUploads => {
            let uploads = api::process_uploads(db)?;
            print_json(&uploads)?;
        }

        Commands::Upload { id } => {
            print_json(&api::show_upload(db, id)?)?;
        }

        Commands::Generate {
            duration_minutes,
            bpm_min,
            bpm_max,
            genres,
            energy_curve,
            name,
            prompt,
        } => {
            let request = SetRequest {
                name,
                duration_minutes: duration_minutes
                    .unwrap_or(config.generation.default_duration_minutes),
                bpm_min,
                bpm_max,
                genres,
                energy_curve: energy_curve
                    .or_else(|| Some(config.generation.default_energy_curve.clone())),
                prompt,
            };
            print_json(&api::generate(db, curves, &request)?)?;
        }

        Commands::Playlists => {
            print_json(&api::list_playlists(db)?)?;
        }

        Commands::Playlist { id } => {
            print_json(&api::show_playlist(db, id)?)?;
        }

        Commands::ExportM3u { id, output } => {
            let m3u = setforge::export::export_playlist(db, id)?;
            match output {
                Some(path) => {
                    let path = if path.is_dir() {
                        let playlist = api::show_playlist(db, id)?;
                        path.join(setforge::export::m3u_filename(&playlist.playlist.summary.name))
                    } else {
                        path
                    };
                    std::fs::write(&path, &m3u)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Wrote {}", path.display());
                }
                None => println!("{m3u}"),
            }
        }

        Commands::Stats => {
            print_json(&api::stats(db)?)?;
        }

        Commands::Curves => {
            print_json(&api::curves(curves))?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use spindb::cli::{handle_backup_command, BackupCommands};
use spindb::config::{paths::SpinPaths, settings::Settings};

#[derive(Parser)]
#[command(
    name = "spindb",
    version,
    about = "Dated database backups with grandfather-father-son rotation",
    long_about = "spindb dumps a database once per day into an object store and \
                  rotates old dumps away under a daily/weekly/monthly/yearly \
                  retention policy. Today's backup is always written before \
                  anything is deleted."
)]
struct Cli {
    /// Settings file (defaults to spindb.json in the config directory)
    #[arg(short, long, global = true, env = "SPINDB_CONFIG")]
    config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Backup(BackupCommands),

    /// Show current configuration and paths
    Config {
        /// Write a settings file with the defaults if none exists
        #[arg(long)]
        init: bool,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Logs go to stderr so command output stays clean
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env("SPINDB_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Initialize paths and settings
    let paths = SpinPaths::new()?;
    let settings_file = cli.config.clone().unwrap_or_else(|| paths.settings_file());
    let file_settings = Settings::load_or_default(&settings_file)?;
    let mut settings = file_settings.clone();
    settings.apply_process_env()?;

    let command = match cli.command {
        Some(command) => command,
        None => {
            println!("spindb - database backups with GFS rotation");
            println!();
            println!("Run 'spindb --help' for usage information.");
            println!("Run 'spindb run' to back up and rotate.");
            return Ok(ExitCode::SUCCESS);
        }
    };

    match command {
        Commands::Backup(cmd) => {
            let config = settings.validate(&paths)?;
            match handle_backup_command(&settings, &config, cmd) {
                Ok(true) => {}
                Ok(false) => return Ok(ExitCode::FAILURE),
                Err(e) => {
                    if let Some(phase) = e.phase() {
                        error!(phase, "run aborted before any backup was deleted");
                    }
                    return Err(e.into());
                }
            }
        }
        Commands::Config { init } => {
            if init {
                if settings_file.exists() {
                    println!("Settings file already exists: {}", settings_file.display());
                } else {
                    paths.ensure_directories()?;
                    // Environment overrides stay out of the file
                    file_settings.save(&settings_file)?;
                    println!("Wrote default settings to {}", settings_file.display());
                }
                println!();
            }

            println!("spindb Configuration");
            println!("====================");
            println!("Config directory: {}", paths.base_dir().display());
            println!("Settings file:    {}", settings_file.display());
            println!();
            println!("Settings:");
            println!("  Path template: {}", settings.path);
            println!("  Base URL:      {}", settings.base_url);
            println!("  Base path:     {}", settings.base_path);
            println!("  Date format:   {}", settings.date_format);
            println!("  Time format:   {}", settings.time_format);
            println!("  Archive:       {}", settings.archive);
            println!(
                "  Bucket:        {}",
                settings.storage.bucket.as_deref().unwrap_or("(not set)")
            );
            match &settings.database.kind {
                Some(kind) => println!("  Database:      {} {}", kind, settings.database.connection.name),
                None if settings.database.dump_command.is_some() => {
                    println!("  Database:      custom dump command")
                }
                None => println!("  Database:      (not set)"),
            }
            println!();

            match settings.validate(&paths) {
                Ok(config) => {
                    println!("Store:     {}", config.bucket_dir.display());
                    println!("Key:       {}", config.layout.template().as_str());
                    println!("Retention: {}", config.policy.describe());
                }
                Err(e) if e.is_config() => println!("Invalid: {}", e),
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

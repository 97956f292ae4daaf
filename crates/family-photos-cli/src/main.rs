mod commands;
mod logging;
mod progress;

use std::io::{self, Write};
use std::path::Path;
use std::process;

use anyhow::{bail, Context, Result};
use chrono::{TimeZone, Utc};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands, OwnerAction};
use dotenv::dotenv;
use family_photos_core::storage::{Database, OwnerDirectory, RecordStore};
use family_photos_core::{AppConfig, FileStore, SyncEngine, TimestampResolver};
use progress::CliReporter;
use std::sync::Arc;
use tracing::{error, info, warn};

fn main() {
    dotenv().ok();

    // Logging depends on the configuration.
    let config = match family_photos_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{} loading configuration: {}", "Error".red(), err);
            process::exit(1);
        }
    };

    let _guard = match logging::init_logger(&config.logging) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!(
                "{} creating log file in {}: {}",
                "Error".red(),
                config.logging.directory,
                err
            );
            process::exit(1);
        }
    };

    let args = Cli::parse();

    let result = match args.command {
        Some(Commands::Sync) => run_sync(&config),
        Some(Commands::Owners { action }) => run_owners(&config, action),
        Some(Commands::Resolve { path }) => run_resolve(&config, &path),
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:#?}", config);
            Ok(())
        }
        Some(Commands::TruncateDb) => run_truncate(&config),
        None => {
            let _ = Cli::command().print_long_help();
            Ok(())
        }
    };

    if let Err(err) = result {
        error!("Error: {:#}", err);
        process::exit(1);
    }
}

fn open_database(config: &AppConfig) -> Result<Database> {
    Database::open(&config.database_path)
        .with_context(|| format!("opening catalog {}", config.database_path))
}

fn run_sync(config: &AppConfig) -> Result<()> {
    let engine = SyncEngine::new(config.clone());
    let reporter = CliReporter::new();
    let result = engine.run(&reporter)?;

    println!();
    for report in &result.reports {
        info!(
            "{}: {} files, {} added, {} removed, scan {}, reconcile {}",
            report.login.bold(),
            report.scanned,
            format!("{}", report.inserted).green(),
            format!("{}", report.deleted).red(),
            format!("{:.2}s", report.scan_duration.as_secs_f64()).green(),
            format!("{:.2}s", report.reconcile_duration.as_secs_f64()).green(),
        );
        if let Some(err) = &report.insert_error {
            warn!("{}: some new files were not cataloged: {}", report.login, err);
        }
        if let Some(err) = &report.delete_error {
            warn!("{}: stale records were kept: {}", report.login, err);
        }
    }
    for (login, err) in &result.failed_owners {
        error!("{}: {}", login.bold(), err);
    }

    info!(
        "{} files, {} added, {} removed, {} without a known creation time, in {}",
        format!("{}", result.total_scanned()).cyan(),
        format!("{}", result.total_inserted()).green(),
        format!("{}", result.total_deleted()).red(),
        format!("{}", result.total_fallbacks()).yellow(),
        format!("{:.2}s", result.duration.as_secs_f64()).green(),
    );

    if !result.is_clean() {
        bail!("sync finished with errors");
    }
    Ok(())
}

fn run_owners(config: &AppConfig, action: OwnerAction) -> Result<()> {
    let db = open_database(config)?;
    match action {
        OwnerAction::Add {
            login,
            display_name,
        } => {
            let display_name = display_name.unwrap_or_else(|| login.clone());
            let owner = db.add_owner(&login, &display_name)?;
            let folder = FileStore::open(&config.storage_root)?.ensure_dir(&owner.login)?;
            println!(
                "Added {} ({}) with folder {}",
                owner.login.green(),
                owner.id,
                folder.display()
            );
        }
        OwnerAction::List => {
            for owner in db.owners()? {
                let records = db.records_for_owner(owner.id)?.len();
                println!(
                    "{:>4}  {:<20} {:<30} {} records",
                    owner.id,
                    owner.login.bold(),
                    owner.display_name,
                    records
                );
            }
        }
        OwnerAction::Remove { login } => {
            if !prompt_confirm(
                &format!("Remove {} and all of their records?", login),
                Some(false),
            )? {
                return Ok(());
            }
            if db.remove_owner(&login)? {
                println!("Removed {}", login);
            } else {
                bail!("no owner with login {}", login);
            }
        }
    }
    Ok(())
}

fn run_resolve(config: &AppConfig, path: &Path) -> Result<()> {
    if !path.is_file() {
        bail!("{} is not a file", path.display());
    }

    let mut resolver = TimestampResolver::new(&config.scan);
    if config.scan.catalog_lookup && Path::new(&config.database_path).exists() {
        let db: Arc<dyn RecordStore> = Arc::new(open_database(config)?);
        resolver = resolver.with_catalog(db);
    }

    let resolved = resolver.resolve(path);
    let when = Utc
        .timestamp_millis_opt(resolved.millis)
        .single()
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "out of range".to_string());
    println!(
        "{}: {} ({} ms) from {}",
        path.display(),
        when.green(),
        resolved.millis,
        format!("{:?}", resolved.source).cyan()
    );
    Ok(())
}

fn run_truncate(config: &AppConfig) -> Result<()> {
    if !prompt_confirm(
        "Are you SURE you want to COMPLETELY DELETE the catalog?",
        Some(false),
    )? {
        return Ok(());
    }
    open_database(config)?.truncate_all()?;
    println!("All tables truncated");
    Ok(())
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        io::stdin().read_line(&mut input)?;

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}

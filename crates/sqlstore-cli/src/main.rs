//! # sqlstore-cli
//!
//! Opens the store described by the layered settings and runs one
//! maintenance or demo command against it.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlstore::SqlStore;
use sqlstore::handlers::register_all;
use sqlstore::handlers::star::{DashboardStarred, GetUserStarsQuery, StarDashboardCommand};
use sqlstore_bus::{EventBus, HandlerRegistry};
use sqlstore_settings::StoreSettings;
use tracing::info;

/// Transactional `SQLite` store.
#[derive(Parser, Debug)]
#[command(name = "sqlstore", about = "Transactional SQLite store")]
struct Cli {
    /// Settings file (default: `~/.sqlstore/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Database path (overrides settings).
    #[arg(long)]
    db_path: Option<String>,

    /// Log level (overrides settings).
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ping the database.
    Health,
    /// Create the database and any missing tables.
    Init,
    /// Print the resolved settings as JSON.
    Settings,
    /// Star a dashboard for a user.
    Star {
        /// Starring user.
        #[arg(long)]
        user: i64,
        /// Dashboard to star.
        #[arg(long)]
        dashboard: i64,
    },
    /// List the dashboards a user starred.
    Stars {
        /// User to list.
        #[arg(long)]
        user: i64,
    },
}

fn load(cli: &Cli) -> Result<(StoreSettings, PathBuf)> {
    let path = cli
        .settings
        .clone()
        .unwrap_or_else(sqlstore_settings::settings_path);
    let mut settings = sqlstore_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;

    if let Some(ref db_path) = cli.db_path {
        settings.database.path.clone_from(db_path);
    }
    if let Some(ref level) = cli.log_level {
        settings.logging.level.clone_from(level);
    }

    let base_dir = path.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    Ok((settings, base_dir))
}

fn open(settings: &StoreSettings, base_dir: &Path, bus: Arc<EventBus>) -> Result<SqlStore> {
    SqlStore::open(settings, base_dir, bus).with_context(|| {
        format!(
            "Failed to open database at {}",
            settings.database.resolve_path(base_dir).display()
        )
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let (settings, base_dir) = load(&cli)?;
    sqlstore::logging::init_subscriber(&settings.logging.level);

    if matches!(cli.command, Command::Settings) {
        println!("{}", serde_json::to_string_pretty(&settings)?);
        return Ok(());
    }

    let bus = Arc::new(EventBus::new());
    bus.add_listener(|e: &DashboardStarred| {
        info!(user_id = e.user_id, dashboard_id = e.dashboard_id, "dashboard starred");
        Ok(())
    });
    let store = Arc::new(open(&settings, &base_dir, bus)?);

    match cli.command {
        Command::Health => {
            store.health_check().context("Health check failed")?;
            println!("ok");
        }
        Command::Init => {
            println!(
                "database ready at {}",
                settings.database.resolve_path(&base_dir).display()
            );
        }
        Command::Star { user, dashboard } => {
            let mut registry = HandlerRegistry::new();
            register_all(&mut registry, store);
            registry.dispatch(&mut StarDashboardCommand {
                user_id: user,
                dashboard_id: dashboard,
            })?;
            println!("starred dashboard {dashboard} for user {user}");
        }
        Command::Stars { user } => {
            let mut registry = HandlerRegistry::new();
            register_all(&mut registry, store);
            let mut query = GetUserStarsQuery {
                user_id: user,
                ..Default::default()
            };
            registry.dispatch(&mut query)?;
            for id in &query.result {
                println!("{id}");
            }
        }
        Command::Settings => {}
    }
    Ok(())
}

//! Binary entry point for guildsync.
//!
//! Every command prints JSON to stdout; logs go to stderr or the configured
//! log file.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr/print_stdout in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
#![allow(clippy::multiple_crate_versions)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use guildsync::models::{CapabilitySet, GuildConfig, GuildId};
use guildsync::observability::{self, LoggingConfig};
use guildsync::security::Operation;
use guildsync::services::GuildService;
use guildsync::storage::{RestrictionStore, SqliteGuildStore};
use guildsync::GuildSyncConfig;
use secrecy::SecretString;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Guildsync - reconcile platform guilds with local registrations.
#[derive(Parser)]
#[command(name = "guildsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "GUILDSYNC_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Decode a platform permission string.
    Decode {
        /// Decimal permission bitfield.
        permissions: String,
    },

    /// Check whether an operation on events is allowed.
    Check {
        /// Operation: create, update, delete, or read.
        operation: String,

        /// Decimal permission bitfield of the member.
        #[arg(short, long)]
        permissions: String,

        /// Treat the guild as restricted.
        #[arg(long)]
        restricted: bool,
    },

    /// List a user's joined and invitable guilds.
    Guilds {
        /// User identifier used for cache and membership scoping.
        #[arg(short, long)]
        user: String,

        /// Platform OAuth access token.
        #[arg(long, env = "GUILDSYNC_PLATFORM_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Bypass the cache and include per-guild authorization.
        #[arg(long)]
        refresh: bool,
    },

    /// Register a guild and link a user to it.
    Register {
        /// Platform guild ID.
        guild_id: String,

        /// Display name.
        #[arg(short, long)]
        name: String,

        /// User to link as a member.
        #[arg(short, long)]
        user: String,

        /// Avatar URL.
        #[arg(long)]
        avatar_url: Option<String>,

        /// Locale.
        #[arg(long, default_value = "en-US")]
        locale: String,
    },

    /// Restrict event writes in a guild to managers.
    Restrict {
        /// Platform guild ID.
        guild_id: String,

        /// Lift the restriction instead.
        #[arg(long)]
        off: bool,
    },
}

/// Main entry point.
#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let (config, skipped) = match load_config(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Failed to load configuration: {e:#}");
            return ExitCode::FAILURE;
        },
    };

    let logging = LoggingConfig::from_settings(&config.logging, cli.verbose);
    if let Err(e) = observability::init_logging(&logging) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }
    if let Some(e) = skipped {
        tracing::warn!(error = %e, "Ignoring unreadable default config file");
    }

    match run_command(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Loads configuration: an explicit file, else the default location, then
/// environment overrides.
///
/// An unreadable default file falls back to defaults; its error is handed
/// back so it can be logged once logging is up.
fn load_config(path: Option<&Path>) -> Result<(GuildSyncConfig, Option<guildsync::Error>)> {
    let (config, skipped) = match path {
        Some(path) => (
            GuildSyncConfig::load_from_file(path)
                .with_context(|| format!("reading {}", path.display()))?,
            None,
        ),
        None => match GuildSyncConfig::load_default() {
            Ok(config) => (config, None),
            Err(e) => (GuildSyncConfig::default(), Some(e)),
        },
    };
    Ok((config.with_env_overrides()?, skipped))
}

/// Runs the selected command.
async fn run_command(command: Commands, config: &GuildSyncConfig) -> Result<()> {
    match command {
        Commands::Decode { permissions } => print_json(&CapabilitySet::decode(&permissions)),
        Commands::Check {
            operation,
            permissions,
            restricted,
        } => cmd_check(&operation, &permissions, restricted),
        Commands::Guilds {
            user,
            token,
            refresh,
        } => cmd_guilds(config, &user, token, refresh).await,
        Commands::Register {
            guild_id,
            name,
            user,
            avatar_url,
            locale,
        } => {
            cmd_register(
                config,
                &GuildId::new(guild_id),
                &name,
                &user,
                avatar_url.as_deref(),
                &locale,
            )
            .await
        },
        Commands::Restrict { guild_id, off } => {
            cmd_restrict(config, &GuildId::new(guild_id), !off).await
        },
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open_store(config: &GuildSyncConfig) -> Result<SqliteGuildStore> {
    let path = config
        .storage
        .database_path
        .clone()
        .or_else(SqliteGuildStore::default_path)
        .context("no database path configured and no data directory found")?;
    Ok(SqliteGuildStore::new(path)?)
}

/// Check command.
fn cmd_check(operation: &str, permissions: &str, restricted: bool) -> Result<()> {
    let operation: Operation = operation.parse()?;
    let config = GuildConfig {
        guild_id: GuildId::new("cli"),
        restricted,
    };
    let check = GuildService::check_event_permission(
        operation,
        &config,
        &CapabilitySet::decode(permissions),
    );
    print_json(&check)
}

/// Guilds command.
async fn cmd_guilds(
    config: &GuildSyncConfig,
    user: &str,
    token: Option<String>,
    refresh: bool,
) -> Result<()> {
    let service = GuildService::try_from_config(config)?;
    let token = token
        .filter(|t| !t.trim().is_empty())
        .map(SecretString::from);

    let error = if refresh {
        let refreshed = service.refresh_guilds(user, token.as_ref()).await;
        print_json(&refreshed)?;
        refreshed.listing.error
    } else {
        let listing = service.fetch_guilds(user, token.as_ref()).await;
        print_json(&listing)?;
        listing.error
    };

    match error {
        Some(e) => anyhow::bail!("{}", e.user_message()),
        None => Ok(()),
    }
}

/// Register command.
async fn cmd_register(
    config: &GuildSyncConfig,
    guild_id: &GuildId,
    name: &str,
    user: &str,
    avatar_url: Option<&str>,
    locale: &str,
) -> Result<()> {
    let store = open_store(config)?;
    let guild = store
        .register_guild(guild_id, name, avatar_url, locale)
        .await?;
    store.add_member(guild_id, user).await?;
    print_json(&guild)
}

/// Restrict command.
async fn cmd_restrict(config: &GuildSyncConfig, guild_id: &GuildId, restricted: bool) -> Result<()> {
    let store = open_store(config)?;
    store.set_restricted(guild_id, restricted).await?;
    let config = store
        .guild_config(guild_id)
        .await?
        .unwrap_or_else(|| GuildConfig::unrestricted(guild_id.clone()));
    print_json(&config)
}

//! applock shell - terminal host for the idle-lock guard

mod config;
mod shell;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use applock_core::{
    CredentialStore, FileCredentialStore, FileKeyValueStore, GuardBackends, LockGuard,
    MemoryKeyValueStore, PrincipalId, SessionLockConfig, SystemClock,
};

use crate::config::ShellConfig;
use crate::shell::{format_duration, Shell};

/// applock - PIN gate for an authenticated session
#[derive(Parser)]
#[command(name = "applock-shell")]
#[command(about = "Idle-lock PIN guard hosted in a terminal")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the data directory from the config
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Principal id of the signed-in account
    #[arg(long)]
    principal: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive session behind the PIN gate
    Run,

    /// Show whether a PIN is set up and the configured idle budget
    Status,

    /// Set the idle budget in minutes (minimum 1)
    SetTimeout {
        minutes: u64,
    },

    /// Remember the principal and data directory in the config file
    Login,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "applock_shell=info,applock_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => Some(path.clone()),
        None => ShellConfig::config_file_path(),
    };
    let mut config = match &config_path {
        Some(path) => ShellConfig::load_from(path),
        None => ShellConfig::default(),
    };
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(principal) = cli.principal {
        config.principal = Some(principal);
    }

    match cli.command {
        Commands::Login => {
            let path = config_path.context("Could not determine config directory")?;
            if config.principal.is_none() {
                error!("Pass --principal to sign in");
                return Ok(());
            }
            config.save_to(&path)?;
            info!("Saved config to {:?}", path);
        }

        Commands::Status => {
            let credentials = FileCredentialStore::new(config.credentials_path());
            let local = FileKeyValueStore::open(config.local_state_path())
                .context("Failed to open local state")?;
            let persisted =
                SessionLockConfig::load(&local, config.guard_config().default_lock_after);

            match config.principal.as_deref() {
                Some(id) => {
                    let principal = PrincipalId::from(id);
                    let has_pin = credentials
                        .get(&principal)
                        .await
                        .context("Failed to read credential store")?
                        .is_some();
                    println!("Principal:   {}", principal);
                    println!("PIN set up:  {}", if has_pin { "yes" } else { "no" });
                }
                None => println!("Principal:   (not signed in)"),
            }
            println!("Idle budget: {}", format_duration(persisted.lock_after()));
        }

        Commands::SetTimeout { minutes } => {
            let guard = build_guard(&config)?;
            guard.update_lock_after_minutes(minutes);
            println!("Idle budget: {}", format_duration(guard.lock_after()));
        }

        Commands::Run => {
            let guard = Arc::new(build_guard(&config)?);
            if let Err(e) = guard.mount().await {
                error!("Cannot start: {}", e);
                return Err(e.into());
            }
            Shell::new(guard).run().await?;
        }
    }

    Ok(())
}

/// Guard over file-backed stores; session scope lives only as long as the process
fn build_guard(config: &ShellConfig) -> anyhow::Result<LockGuard> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create {:?}", config.data_dir))?;

    let local = FileKeyValueStore::open(config.local_state_path())
        .context("Failed to open local state")?;

    let backends = GuardBackends {
        credentials: Arc::new(FileCredentialStore::new(config.credentials_path())),
        local: Arc::new(local),
        session: Arc::new(MemoryKeyValueStore::new()),
        clock: Arc::new(SystemClock),
    };

    let principal = config.principal.as_deref().map(PrincipalId::from);
    Ok(LockGuard::new(principal, backends, config.guard_config()))
}

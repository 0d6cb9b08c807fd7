pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "asset-admin")]
#[command(about = "Maintenance commands for the building asset backend")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Create default permissions, menus, roles and the admin user")]
    Seed,

    #[command(about = "Build every hierarchy and report data-integrity problems")]
    CheckTree {
        #[arg(long, help = "Only check one kind: organization, menu or permission")]
        kind: Option<String>,
    },

    #[command(about = "Print an argon2 hash for a password")]
    HashPassword {
        #[arg(help = "Plain-text password")]
        password: String,
    },

    #[command(about = "Delete operation and login logs older than N days")]
    PurgeLogs {
        #[arg(long, help = "Retention in days; defaults to AUDIT_RETENTION_DAYS")]
        days: Option<u32>,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Seed => commands::seed::handle(load_config()?, output_format).await,
        Commands::CheckTree { kind } => commands::check::handle(load_config()?, kind.as_deref(), output_format).await,
        Commands::HashPassword { password } => commands::password::handle(&password, output_format),
        Commands::PurgeLogs { days } => commands::logs::handle(load_config()?, days, output_format).await,
    }
}

/// Same environment-driven configuration the server uses
fn load_config() -> anyhow::Result<AppConfig> {
    let config = AppConfig::from_env();
    config.validate()?;
    Ok(config)
}

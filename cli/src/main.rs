use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use std::env;

mod commands;
mod utils;

use commands::{config, grants, health, permissions, protocols};
use utils::project_root;

/// brokerctl - Operator CLI for the remote-access broker
#[derive(Parser)]
#[command(name = "brokerctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check broker state and storage health
    Health {
        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List the persisted protocol catalog
    Protocols {
        /// Only show protocols that can be launched
        #[arg(short, long)]
        available: bool,

        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Resource grant management commands
    Grants {
        #[command(subcommand)]
        action: GrantsAction,
    },

    /// Permission and role inspection commands
    Permissions {
        #[command(subcommand)]
        action: PermissionsAction,
    },

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum GrantsAction {
    /// List stored grants
    List {
        /// Restrict to one resource, as "type:id" (e.g. "connection:c1")
        #[arg(short, long)]
        resource: Option<String>,

        /// Include grants whose expiry has passed
        #[arg(long)]
        include_expired: bool,

        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Delete every expired grant
    Purge,
}

#[derive(Subcommand)]
enum PermissionsAction {
    /// List the core permissions and what each one implies
    List {
        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List stored roles
    Roles {
        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    List {
        /// Output format (json, yaml, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Read a specific configuration value
    Get {
        /// Configuration path (e.g., "sessions.grace_period_secs")
        section: String,

        /// Output format (json, yaml, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    // An explicit configuration file makes the working directory irrelevant
    if env::var_os(broker::config::CONFIG_PATH_VAR).is_none() {
        let project_root = match project_root::find_project_root() {
            Ok(root) => root,
            Err(e) => {
                eprintln!("{} {}", "Error:".red().bold(), e);
                eprintln!(
                    "{}",
                    "brokerctl must be run inside a broker deployment directory".yellow()
                );
                std::process::exit(1);
            }
        };
        env::set_current_dir(&project_root)?;
    }

    match cli.command {
        Commands::Health { format } => {
            health::execute(format).await?;
        }
        Commands::Protocols { available, format } => {
            protocols::list(available, format).await?;
        }
        Commands::Grants { action } => match action {
            GrantsAction::List {
                resource,
                include_expired,
                format,
            } => {
                grants::list(resource, include_expired, format).await?;
            }
            GrantsAction::Purge => {
                grants::purge().await?;
            }
        },
        Commands::Permissions { action } => match action {
            PermissionsAction::List { format } => {
                permissions::list(format)?;
            }
            PermissionsAction::Roles { format } => {
                permissions::roles(format).await?;
            }
        },
        Commands::Config { action } => match action {
            ConfigAction::List { format } => {
                config::list(format)?;
            }
            ConfigAction::Get { section, format } => {
                config::get(section, format)?;
            }
        },
    }

    Ok(())
}

//! filedeck
//!
//! Web file manager server and its admin commands.

use std::io::BufRead;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use server::auth::Credential;
use server::config::{default_config_path, Config};
use tracing_subscriber::EnvFilter;

/// filedeck - web file manager for one directory tree.
#[derive(Parser, Debug)]
#[command(name = "filedeck")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the HTTP server
    Serve,

    /// Set the root directory in the config file
    SetRoot {
        /// Directory to serve
        path: PathBuf,
    },

    /// Set the admin password in the config file
    SetPassword {
        /// New password (read from stdin when omitted)
        #[arg(long)]
        password: Option<String>,

        /// Admin user name (keeps the configured one when omitted)
        #[arg(long)]
        username: Option<String>,
    },

    /// Check that a directory is usable as the root
    CheckRoot {
        /// Directory to probe
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    let mut config = Config::load(&config_path)?;
    config.apply_env_overrides();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.to_lowercase()))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::debug!("Using config file: {:?}", config_path);

    // Validate configuration
    config.validate()?;

    match cli.command {
        Commands::Serve => {
            tracing::info!("filedeck starting...");
            server::serve(config, Some(config_path)).await?;
        }
        Commands::SetRoot { path } => {
            let path = std::path::absolute(&path)
                .with_context(|| format!("Invalid path: {}", path.display()))?;
            let access = engine::check_access(&path);
            if !access.is_ok() {
                bail!("{}: {}", path.display(), access.message());
            }

            config.files.root_path = path.clone();
            config.save(&config_path)?;
            println!("Root directory set to {}", path.display());
        }
        Commands::SetPassword { password, username } => {
            let password = match password {
                Some(password) => password,
                None => read_password_from_stdin()?,
            };
            let username = username.unwrap_or_else(|| config.auth.username.clone());

            let credential = Credential::new(&username, &password)?;
            config.auth.username = credential.username;
            config.auth.password_salt = credential.salt;
            config.auth.password_hash = credential.hash;
            config.save(&config_path)?;
            println!("Password updated for {}", config.auth.username);
        }
        Commands::CheckRoot { path } => {
            let access = engine::check_access(&path);
            println!("{}: {}", path.display(), access.message());
            if !access.is_ok() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// Read one line from stdin, without the trailing newline.
fn read_password_from_stdin() -> anyhow::Result<String> {
    eprintln!("New password:");
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

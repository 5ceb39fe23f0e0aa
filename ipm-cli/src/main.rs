//! ipm - install and manage verified hardware IP blocks
//!
//! Main entry point: argument parsing, logging setup and command dispatch

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use ipm_core::catalog::{Category, Technology};
use ipm_core::config::{ConfigOverrides, IpmConfig};

mod catalog_cli;

/// Log levels
#[derive(Debug, Clone, PartialEq, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "ipm",
    about = "Install and manage verified hardware IP blocks",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Set log level
    #[clap(long, default_value = "warn", global = true)]
    log_level: LogLevel,

    /// Directory holding Installed_IPs.json and config.yaml (default: ~/.ipm)
    #[clap(long, env = "IPM_HOME", global = true)]
    ipm_home: Option<PathBuf>,

    /// Override the catalog URL (https:// or file://)
    #[clap(long, global = true)]
    catalog_url: Option<String>,
}

#[derive(Parser, Debug)]
enum Command {
    /// List IPs available in the catalog
    Ls {
        /// Only show IPs in this category (digital, comm, analog, dataconv)
        #[clap(long)]
        category: Option<Category>,

        /// Only show IPs for this technology (sky130, gf180mcu)
        #[clap(long)]
        technology: Option<Technology>,

        /// Output results as JSON
        #[clap(long)]
        json: bool,
    },

    /// List installed IPs
    Lls {
        /// Only show IPs in this category
        #[clap(long)]
        category: Option<Category>,

        /// Only show IPs for this technology
        #[clap(long)]
        technology: Option<Technology>,

        /// Output results as JSON
        #[clap(long)]
        json: bool,
    },

    /// Show every release of an IP
    Info {
        /// IP name
        #[clap(long)]
        ip: String,

        /// Restrict to one technology
        #[clap(long)]
        technology: Option<Technology>,

        /// Output as JSON
        #[clap(long)]
        json: bool,
    },

    /// Install an IP from the catalog
    Install {
        /// IP name
        ip: String,

        /// Exact release to install (default: latest)
        #[clap(long)]
        version: Option<String>,

        #[clap(long)]
        technology: Option<Technology>,

        /// Directory to install under (default: configured IP root)
        #[clap(long)]
        ip_root: Option<PathBuf>,

        /// Reinstall even if the same version is already installed
        #[clap(long)]
        overwrite: bool,
    },

    /// Remove an installed IP
    Uninstall {
        /// IP name
        ip: String,

        #[clap(long)]
        technology: Option<Technology>,

        #[clap(long)]
        ip_root: Option<PathBuf>,
    },

    /// Check installed IPs for newer releases
    Check {
        /// Only check this IP (default: all installed IPs)
        #[clap(long)]
        ip: Option<String>,

        #[clap(long)]
        technology: Option<Technology>,
    },

    /// Install newer releases of installed IPs
    Update {
        /// IP to update
        #[clap(long, conflicts_with = "all", required_unless_present = "all")]
        ip: Option<String>,

        /// Update every installed IP
        #[clap(long)]
        all: bool,

        #[clap(long)]
        technology: Option<Technology>,
    },

    /// Print the configured IP installation root
    Output,

    /// Install every IP pinned in a manifest (Installed_IPs.json format)
    InstallFromManifest {
        /// Manifest file
        #[clap(long)]
        man_file: PathBuf,

        #[clap(long)]
        ip_root: Option<PathBuf>,

        /// Reinstall IPs already present at the pinned version
        #[clap(long)]
        overwrite: bool,
    },
}

/// Initialize tracing with the --log-level flag
///
/// `RUST_LOG` directives are added on top of the flag.
fn initialize_tracing(log_level: &LogLevel) {
    let mut filter = EnvFilter::new(log_level.to_filter_directive());

    if let Ok(env_directives) = std::env::var(EnvFilter::DEFAULT_ENV) {
        for directive in env_directives.split(',').filter(|d| !d.is_empty()) {
            if let Ok(parsed) = directive.parse() {
                filter = filter.add_directive(parsed);
            }
        }
    }

    // Logs go to stderr so tables and JSON on stdout stay clean
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_tracing(&cli.log_level);

    let ip_root_override = match &cli.command {
        Command::Install { ip_root, .. }
        | Command::Uninstall { ip_root, .. }
        | Command::InstallFromManifest { ip_root, .. } => ip_root.clone(),
        _ => None,
    };

    let config = IpmConfig::load(ConfigOverrides {
        ipm_home: cli.ipm_home,
        catalog_url: cli.catalog_url,
        ip_root: ip_root_override,
    })
    .context("Failed to load ipm configuration")?;
    tracing::debug!(?config, "Resolved configuration");

    let technology = |t: Option<Technology>| t.unwrap_or(config.default_technology);

    match cli.command {
        Command::Ls {
            category,
            technology,
            json,
        } => catalog_cli::execute_ls(&config, category, technology, json).await,
        Command::Lls {
            category,
            technology,
            json,
        } => catalog_cli::execute_lls(&config, category, technology, json).await,
        Command::Info {
            ip,
            technology,
            json,
        } => catalog_cli::execute_info(&config, &ip, technology, json).await,
        Command::Install {
            ip,
            version,
            technology: tech,
            overwrite,
            ..
        } => {
            catalog_cli::execute_install(&config, &ip, version, technology(tech), overwrite).await
        }
        Command::Uninstall {
            ip,
            technology: tech,
            ..
        } => catalog_cli::execute_uninstall(&config, &ip, technology(tech)).await,
        Command::Check { ip, technology: tech } => {
            catalog_cli::execute_check(&config, ip.as_deref(), technology(tech), false).await
        }
        Command::Update {
            ip,
            technology: tech,
            ..
        } => catalog_cli::execute_check(&config, ip.as_deref(), technology(tech), true).await,
        Command::Output => {
            println!("{}", config.ip_root.display());
            Ok(())
        }
        Command::InstallFromManifest {
            man_file,
            overwrite,
            ..
        } => catalog_cli::execute_install_from_manifest(&config, &man_file, overwrite).await,
    }
}

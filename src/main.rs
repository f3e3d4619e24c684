use anyhow::Result;
use clap::Parser;
use log::info;
use std::path::PathBuf;

use snipiter::config::{DEFAULT_CONFIG_DIR, Settings};
use snipiter::jamf::JamfClient;
use snipiter::snipeit::SnipeClient;
use snipiter::sync::Reconciler;

/// snipiter - Jamf Pro to Snipe-IT reconciliation
///
/// Mirrors computer records from a Jamf Pro instance into Snipe-IT and
/// keeps user-to-asset checkout state in line with the source of truth.
///
/// Expects jamfpro.json, snipeit.json and snipiter.json in the
/// configuration directory.
#[derive(Parser, Debug)]
#[command(author, version = env!("SNIPITER_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding the configuration files (also via SNIPITER_CONFIG_DIR)
    #[arg(
        long = "config-dir",
        short = 'c',
        env = "SNIPITER_CONFIG_DIR",
        value_name = "PATH",
        default_value = DEFAULT_CONFIG_DIR,
        global = true
    )]
    pub config_dir: PathBuf,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Reconcile all computers from Jamf Pro into Snipe-IT
    Sync(SyncArgs),
}

#[derive(clap::Args, Debug)]
pub struct SyncArgs {
    /// Log the changes that would be made without issuing any of them
    #[arg(long)]
    pub dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Sync(args) => {
            let settings = Settings::load(&cli.config_dir)?;
            let jamf = JamfClient::new(&settings.jamf)?;
            let snipe = SnipeClient::new(&settings.snipe)?;

            let reconciler = Reconciler::new(&jamf, &snipe, &settings.sync, args.dry_run);
            let report = reconciler.sync_computers().await?;
            info!("Sync finished: {}", report);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_sync_parsing() {
        let cli = Cli::try_parse_from(["snipiter", "sync"]).unwrap();
        match cli.command {
            Commands::Sync(args) => assert!(!args.dry_run),
        }
        assert_eq!(cli.config_dir, PathBuf::from(DEFAULT_CONFIG_DIR));
    }

    #[test]
    fn test_cli_dry_run_parsing() {
        let cli = Cli::try_parse_from(["snipiter", "sync", "--dry-run"]).unwrap();
        match cli.command {
            Commands::Sync(args) => assert!(args.dry_run),
        }
    }

    #[test]
    fn test_cli_global_config_dir_parsing() {
        let cli = Cli::try_parse_from(["snipiter", "--config-dir", "/tmp/conf", "sync"]).unwrap();
        assert_eq!(cli.config_dir, PathBuf::from("/tmp/conf"));
    }

    #[test]
    fn test_cli_no_subcommand_fails() {
        let result = Cli::try_parse_from(["snipiter"]);
        assert!(result.is_err());
    }
}

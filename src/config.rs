//! Configuration files for the two inventory systems and the sync run.
//!
//! Three JSON files live in one directory: `jamfpro.json`, `snipeit.json`
//! and `snipiter.json`. A missing file or required key halts the process
//! before any API call is made.

use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use std::path::Path;

use crate::http::retry::DEFAULT_ATTEMPTS;

/// Directory searched for configuration files unless overridden.
pub const DEFAULT_CONFIG_DIR: &str = "/etc/snipiter";

fn default_attempts() -> u32 {
    DEFAULT_ATTEMPTS
}

fn default_true() -> bool {
    true
}

/// Connection settings for the Jamf Pro instance (`jamfpro.json`).
#[derive(Debug, Clone, Deserialize)]
pub struct JamfConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_attempts")]
    pub attempts: u32,
}

/// Connection settings for the Snipe-IT instance (`snipeit.json`).
#[derive(Debug, Clone, Deserialize)]
pub struct SnipeConfig {
    pub url: String,
    pub token: String,
    #[serde(default = "default_attempts")]
    pub attempts: u32,
}

/// Behavior switches and required Snipe-IT ids for the sync run
/// (`snipiter.json`).
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_true")]
    pub create_snipeit_users: bool,
    #[serde(default = "default_true")]
    pub checkout_rename: bool,
    pub category_id: u64,
    pub manufacturer_id: u64,
    pub status_id: u64,
}

/// All three configuration files, loaded and validated.
#[derive(Debug, Clone)]
pub struct Settings {
    pub jamf: JamfConfig,
    pub snipe: SnipeConfig,
    pub sync: SyncConfig,
}

impl Settings {
    pub fn load(dir: &Path) -> Result<Self> {
        let jamf: JamfConfig = load_file(dir, "jamfpro.json")?;
        ensure!(
            !jamf.url.is_empty(),
            "Configuration file 'jamfpro.json' is missing 'url'"
        );
        ensure!(
            !jamf.username.is_empty(),
            "Configuration file 'jamfpro.json' is missing 'username'"
        );
        ensure!(
            !jamf.password.is_empty(),
            "Configuration file 'jamfpro.json' is missing 'password'"
        );
        ensure!(jamf.attempts >= 1, "'attempts' must be at least 1");

        let snipe: SnipeConfig = load_file(dir, "snipeit.json")?;
        ensure!(
            !snipe.url.is_empty(),
            "Configuration file 'snipeit.json' is missing 'url'"
        );
        ensure!(
            !snipe.token.is_empty(),
            "Configuration file 'snipeit.json' is missing 'token'"
        );
        ensure!(snipe.attempts >= 1, "'attempts' must be at least 1");

        let sync: SyncConfig = load_file(dir, "snipiter.json")?;

        Ok(Self { jamf, snipe, sync })
    }
}

fn load_file<T: serde::de::DeserializeOwned>(dir: &Path, name: &str) -> Result<T> {
    let path = dir.join(name);
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("Configuration file '{}' is missing", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Error reading '{}' configuration file", path.display()))
}

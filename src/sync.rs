//! Reconciliation driver: mirrors computer/user assignments from the
//! device-management source of truth into the asset registry, one record
//! at a time.

use anyhow::Result;
use log::{debug, error, info, warn};
use rand::{Rng, distr::Alphanumeric};
use serde_json::{Value, json};

use crate::config::SyncConfig;
use crate::jamf::InventorySource;
use crate::jamf::types::{Computer, Location};
use crate::snipeit::{Asset, AssetRegistry, User};

/// What the reconciler did with one computer record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    CheckedOut,
    Reassigned,
    Unchanged,
    Skipped,
}

/// Tally of one reconciliation run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub checked_out: usize,
    pub reassigned: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SyncReport {
    fn record(&mut self, action: SyncAction) {
        match action {
            SyncAction::CheckedOut => self.checked_out += 1,
            SyncAction::Reassigned => self.reassigned += 1,
            SyncAction::Unchanged => self.unchanged += 1,
            SyncAction::Skipped => self.skipped += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.checked_out + self.reassigned + self.unchanged + self.skipped + self.failed
    }
}

impl std::fmt::Display for SyncReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} checked out, {} reassigned, {} unchanged, {} skipped, {} failed",
            self.checked_out, self.reassigned, self.unchanged, self.skipped, self.failed
        )
    }
}

/// Walks the source inventory and reconciles each record into the registry.
pub struct Reconciler<'a, S: InventorySource, R: AssetRegistry> {
    source: &'a S,
    registry: &'a R,
    config: &'a SyncConfig,
    dry_run: bool,
}

impl<'a, S: InventorySource, R: AssetRegistry> Reconciler<'a, S, R> {
    pub fn new(source: &'a S, registry: &'a R, config: &'a SyncConfig, dry_run: bool) -> Self {
        Self {
            source,
            registry,
            config,
            dry_run,
        }
    }

    /// Reconciles every computer in the source of truth. A failure on one
    /// record is logged and the loop continues; only an unreachable source
    /// aborts the run.
    #[tracing::instrument(skip(self))]
    pub async fn sync_computers(&self) -> Result<SyncReport> {
        let computers = self.source.get_all_computers().await?;
        if computers.is_empty() {
            warn!("No computers found within the Jamf Pro instance");
            return Ok(SyncReport::default());
        }

        let mut report = SyncReport::default();
        for item in computers {
            match self.sync_computer(item.id).await {
                Ok(action) => report.record(action),
                Err(e) => {
                    error!("Failed to reconcile computer {}: {:#}", item.id, e);
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    async fn sync_computer(&self, jid: u64) -> Result<SyncAction> {
        let Some(computer) = self.source.find_computer(jid).await? else {
            error!("Jamf computer record not found even though it should be there ({jid})");
            return Ok(SyncAction::Skipped);
        };

        let Some(model_id) = self.verify_model(&computer).await? else {
            warn!("Unable to obtain a Snipe-IT model identifier ({jid})");
            return Ok(SyncAction::Skipped);
        };
        debug!("Found Snipe-IT model id: {model_id} ({jid})");

        let Some(asset) = self.verify_asset(&computer, model_id).await? else {
            warn!("Unable to obtain a Snipe-IT computer asset ({jid})");
            return Ok(SyncAction::Skipped);
        };
        debug!("Found Snipe-IT asset id: {} ({jid})", asset.id);

        let Some(username) = computer.username() else {
            info!("Jamf Pro computer record does not have a user assigned ({jid})");
            return Ok(SyncAction::Skipped);
        };

        let Some(user) = self.verify_user(&computer).await? else {
            warn!("Unable to obtain a Snipe-IT user id ({jid})");
            return Ok(SyncAction::Skipped);
        };

        let nicename = self.checkout_name(&computer, &user);

        match &asset.assigned_to {
            None => {
                info!("Checking out to user {username} ({jid})");
                if !self.dry_run {
                    self.registry.checkout(asset.id, user.id, nicename).await?;
                }
                Ok(SyncAction::CheckedOut)
            }
            Some(assigned) if assigned.username.as_deref() == Some(username) => {
                debug!(
                    "Snipe-IT asset {} already has user {username} assigned ({jid})",
                    asset.id
                );
                Ok(SyncAction::Unchanged)
            }
            Some(_) => {
                info!("Changing the assigned user within Snipe-IT to {username} ({jid})");
                if !self.dry_run {
                    self.registry.checkin(asset.id).await?;
                    self.registry.checkout(asset.id, user.id, nicename).await?;
                }
                Ok(SyncAction::Reassigned)
            }
        }
    }

    /// Ensures a model exists for the computer's hardware, creating it with
    /// the configured category and manufacturer when absent.
    async fn verify_model(&self, computer: &Computer) -> Result<Option<u64>> {
        let Some(model_identifier) = computer.model_identifier() else {
            return Ok(None);
        };

        if let Some(model) = self.registry.find_model(model_identifier).await? {
            return Ok(Some(model.id));
        }

        info!("Creating Snipe-IT model '{model_identifier}'");
        if self.dry_run {
            return Ok(None);
        }

        let payload = json!({
            "model_number": model_identifier,
            "name": computer.model_name().unwrap_or(model_identifier),
            "category_id": self.config.category_id,
            "manufacturer_id": self.config.manufacturer_id,
        });
        Ok(Some(self.registry.create_model(payload).await?))
    }

    /// Ensures an asset exists for the computer's serial number. A created
    /// asset gets its serial patched in afterwards and starts unassigned.
    async fn verify_asset(&self, computer: &Computer, model_id: u64) -> Result<Option<Asset>> {
        let Some(serial) = computer.serial_number() else {
            return Ok(None);
        };

        if let Some(asset) = self.registry.find_asset(serial).await? {
            return Ok(Some(asset));
        }

        info!("Creating Snipe-IT asset for serial '{serial}'");
        if self.dry_run {
            return Ok(None);
        }

        let payload = json!({
            "status_id": self.config.status_id,
            "model_id": model_id,
            "name": serial,
        });
        let asset_id = self.registry.create_asset(payload).await?;
        self.registry
            .patch_asset(asset_id, json!({"serial": serial}))
            .await?;

        Ok(Some(Asset {
            id: asset_id,
            name: Some(serial.to_string()),
            serial: Some(serial.to_string()),
            assigned_to: None,
        }))
    }

    /// Ensures a user exists for the computer's assignee; creation is
    /// gated by the `create_snipeit_users` switch.
    async fn verify_user(&self, computer: &Computer) -> Result<Option<User>> {
        let Some(username) = computer.username() else {
            return Ok(None);
        };

        if let Some(user) = self.registry.find_user(username).await? {
            return Ok(Some(user));
        }

        if !self.config.create_snipeit_users {
            return Ok(None);
        }

        info!("Creating Snipe-IT user '{username}'");
        if self.dry_run {
            return Ok(None);
        }

        let user = self
            .registry
            .create_user(user_payload(&computer.location, username))
            .await?;
        Ok(Some(user))
    }

    /// New asset name applied at checkout when renaming is enabled.
    fn checkout_name(&self, computer: &Computer, user: &User) -> Option<String> {
        if !self.config.checkout_rename {
            return None;
        }
        let owner = user.name.as_deref().unwrap_or(&user.username);
        let model = computer.model_identifier().unwrap_or("Mac");
        Some(format!("{owner} {model}"))
    }
}

/// Creation payload for a deactivated registry user mirroring the device's
/// location record. The account gets a random throwaway password since it
/// is never meant to log in.
fn user_payload(location: &Location, username: &str) -> Value {
    let mut payload = json!({
        "activated": false,
        "username": username,
    });

    match location.realname() {
        Some(fullname) => {
            let mut tokens = fullname.split_whitespace();
            if let Some(first) = tokens.next() {
                payload["first_name"] = json!(first);
            }
            let rest: Vec<&str> = tokens.collect();
            if !rest.is_empty() {
                payload["last_name"] = json!(rest.join(" "));
            }
        }
        None => payload["first_name"] = json!(username),
    }

    let password: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    payload["password"] = json!(password);
    payload["password_confirmation"] = json!(password);

    if let Some(email) = location.email_address() {
        payload["email"] = json!(email);
    }
    if let Some(phone) = location.phone_number() {
        payload["phone"] = json!(phone);
    }
    if let Some(position) = location.position() {
        payload["jobtitle"] = json!(position);
    }

    payload
}

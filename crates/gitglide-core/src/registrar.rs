//! # Webhook Registrar
//!
//! Turns a user's "enable/disable auto-fix for project P" command into a
//! remote webhook registration plus a persisted [`IntegrationConfig`] row.
//!
//! Enable registers a fresh webhook every time and overwrites the stored
//! webhook id and secret; a previously registered webhook is left orphaned
//! on the platform. When the new webhook cannot be recorded locally it is
//! deleted again before the error is returned. Disable deletes the remote
//! webhook best-effort and always clears the local record.
//!
//! [`IntegrationConfig`]: crate::integration_config::IntegrationConfig

use crate::credential_vault::{CredentialVault, Provider, SecretToken};
use crate::integration_config::{AutofixSettings, IntegrationConfigStore};
use crate::upstream::{CreateWebhookRequest, DeploymentPlatform, WebhookDeletion};
use crate::{CapabilityKey, ProjectId, RemediationError, UserId};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use url::Url;

/// Default path of the inbound webhook route
pub const DEFAULT_RECEIVER_PATH: &str = "/api/webhooks/vercel";

/// Event types tracked by default
pub const DEFAULT_TRACKED_EVENTS: [&str; 2] = ["deployment.error", "deployment.canceled"];

/// Registrar settings derived from service configuration
#[derive(Debug, Clone)]
pub struct RegistrarSettings {
    /// Public base URL of this service; required to enable auto-fix
    pub public_base_url: Option<String>,
    pub receiver_path: String,
    /// Event types the registered webhook subscribes to
    pub tracked_events: Vec<String>,
}

impl Default for RegistrarSettings {
    fn default() -> Self {
        Self {
            public_base_url: None,
            receiver_path: DEFAULT_RECEIVER_PATH.to_string(),
            tracked_events: DEFAULT_TRACKED_EVENTS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl RegistrarSettings {
    /// Absolute URL the platform should deliver events to
    pub fn receiver_url(&self) -> Result<String, RemediationError> {
        let base = self
            .public_base_url
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .ok_or_else(|| RemediationError::Configuration {
                message: "public base URL is not configured".to_string(),
            })?;

        let parsed = Url::parse(base).map_err(|e| RemediationError::Configuration {
            message: format!("public base URL '{}' is invalid: {}", base, e),
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(RemediationError::Configuration {
                message: format!("public base URL '{}' must use http or https", base),
            });
        }

        Ok(format!(
            "{}/{}",
            base.trim_end_matches('/'),
            self.receiver_path.trim_start_matches('/')
        ))
    }
}

/// Result of a toggle command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ToggleResult {
    Enabled {
        #[serde(rename = "webhookId")]
        webhook_id: String,
    },
    Disabled,
}

/// Registers and removes project-scoped failure webhooks
pub struct WebhookRegistrar {
    vault: Arc<dyn CredentialVault>,
    configs: Arc<dyn IntegrationConfigStore>,
    platform: Arc<dyn DeploymentPlatform>,
    settings: RegistrarSettings,
}

impl WebhookRegistrar {
    pub fn new(
        vault: Arc<dyn CredentialVault>,
        configs: Arc<dyn IntegrationConfigStore>,
        platform: Arc<dyn DeploymentPlatform>,
        settings: RegistrarSettings,
    ) -> Self {
        Self {
            vault,
            configs,
            platform,
            settings,
        }
    }

    /// Enable or disable auto-fix for one of the user's projects
    ///
    /// # Errors
    ///
    /// - [`RemediationError::CredentialMissing`] when the user has no platform token
    /// - [`RemediationError::Configuration`] on enable without a public base URL
    /// - [`RemediationError::Upstream`] when webhook registration fails; no
    ///   local state is written in that case
    /// - [`RemediationError::Storage`] when the config row cannot be written;
    ///   the newly registered webhook is deleted again first
    #[instrument(skip(self), fields(user_id = %user_id, project_id = %project_id))]
    pub async fn set_project_autofix(
        &self,
        user_id: &UserId,
        project_id: &ProjectId,
        enabled: bool,
    ) -> Result<ToggleResult, RemediationError> {
        let token = self
            .vault
            .get_token(user_id, Provider::Vercel)
            .await?
            .ok_or(RemediationError::CredentialMissing {
                provider: Provider::Vercel,
            })?;

        let key = CapabilityKey::for_vercel_project(project_id);
        if enabled {
            self.enable(user_id, project_id, &key, &token).await
        } else {
            self.disable(user_id, &key, &token).await
        }
    }

    async fn enable(
        &self,
        user_id: &UserId,
        project_id: &ProjectId,
        key: &CapabilityKey,
        token: &SecretToken,
    ) -> Result<ToggleResult, RemediationError> {
        let request = CreateWebhookRequest {
            events: self.settings.tracked_events.clone(),
            project_ids: vec![project_id.to_string()],
            url: self.settings.receiver_url()?,
        };

        let created = self.platform.create_webhook(token, &request).await?;
        let settings = AutofixSettings {
            webhook_id: created.id,
            secret: created.secret,
        };

        if let Err(e) = self
            .configs
            .upsert(user_id, key, true, settings.to_value())
            .await
        {
            self.roll_back_registration(token, &settings.webhook_id).await;
            return Err(e.into());
        }

        info!(webhook_id = %settings.webhook_id, "Auto-fix enabled");
        Ok(ToggleResult::Enabled {
            webhook_id: settings.webhook_id,
        })
    }

    /// Delete a webhook registered by an enable whose local write failed
    async fn roll_back_registration(&self, token: &SecretToken, webhook_id: &str) {
        match self.platform.delete_webhook(token, webhook_id).await {
            Ok(_) => info!(webhook_id, "Rolled back webhook registration"),
            Err(e) => error!(
                webhook_id,
                error = %e,
                "Failed to roll back webhook registration; remote webhook is orphaned"
            ),
        }
    }

    async fn disable(
        &self,
        user_id: &UserId,
        key: &CapabilityKey,
        token: &SecretToken,
    ) -> Result<ToggleResult, RemediationError> {
        let Some(existing) = self.configs.get(user_id, key).await? else {
            info!("Auto-fix already disabled; no integration record");
            return Ok(ToggleResult::Disabled);
        };

        let webhook_id = existing
            .config
            .get("webhookId")
            .and_then(|v| v.as_str())
            .filter(|id| !id.is_empty());

        if let Some(webhook_id) = webhook_id {
            match self.platform.delete_webhook(token, webhook_id).await {
                Ok(WebhookDeletion::Deleted) => info!(webhook_id, "Remote webhook deleted"),
                Ok(WebhookDeletion::AlreadyGone) => {
                    info!(webhook_id, "Remote webhook was already deleted")
                }
                Err(e) => warn!(
                    webhook_id,
                    error = %e,
                    "Failed to delete remote webhook; clearing local record anyway"
                ),
            }
        }

        self.configs
            .update(user_id, key, false, serde_json::json!({}))
            .await?;

        info!("Auto-fix disabled");
        Ok(ToggleResult::Disabled)
    }
}

#[cfg(test)]
#[path = "registrar_tests.rs"]
mod tests;

//! # Credential Vault
//!
//! Per-user provider credentials (the Vercel token and the Jules API key).
//!
//! The vault is an external collaborator: the pipeline only ever asks it for
//! a user's token and never persists tokens itself. Tokens are held in
//! [`SecretToken`], which redacts itself in `Debug` output and zeroes its
//! buffer on drop.

use crate::{ErrorCategory, UserId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

/// Mask appended after the visible prefix of a masked key
const KEY_MASK: &str = "••••••••••••";

// ============================================================================
// Provider
// ============================================================================

/// Upstream provider a credential belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Jules coding-agent service (API key)
    Jules,
    /// Vercel deployment platform (access token)
    Vercel,
}

impl Provider {
    /// All known providers
    pub const ALL: [Provider; 2] = [Provider::Jules, Provider::Vercel];

    /// Stable lowercase name used in routes and storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jules => "jules",
            Self::Vercel => "vercel",
        }
    }

    /// Human-readable name of the credential, used in error messages
    pub fn credential_label(&self) -> &'static str {
        match self {
            Self::Jules => "Jules API key",
            Self::Vercel => "Vercel token",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Provider {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "jules" => Ok(Self::Jules),
            "vercel" => Ok(Self::Vercel),
            other => Err(VaultError::UnknownProvider {
                provider: other.to_string(),
            }),
        }
    }
}

// ============================================================================
// Secret Token
// ============================================================================

/// Provider credential held in zeroizing memory
#[derive(Clone)]
pub struct SecretToken {
    inner: Zeroizing<String>,
}

impl SecretToken {
    /// Wrap a credential value
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            inner: Zeroizing::new(value.into()),
        }
    }

    /// Get the raw credential (only for immediate use in request headers)
    pub fn expose_secret(&self) -> &str {
        &self.inner
    }

    /// Check if the credential is empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Masked rendering safe for display: the first four characters
    /// followed by a fixed mask, or a bare mask for very short keys
    pub fn masked(&self) -> String {
        if self.inner.chars().count() <= 4 {
            return "****".to_string();
        }
        let prefix: String = self.inner.chars().take(4).collect();
        format!("{}{}", prefix, KEY_MASK)
    }
}

impl fmt::Debug for SecretToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretToken")
            .field("length", &self.inner.len())
            .field("value", &"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// Vault Interface
// ============================================================================

/// Errors raised by credential vault implementations
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("Unknown credential provider: {provider}")]
    UnknownProvider { provider: String },

    #[error("Credential must not be empty")]
    EmptyCredential,

    #[error("Vault unavailable: {message}")]
    Unavailable { message: String },
}

impl VaultError {
    /// Check if error is transient
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Get error category for monitoring
    pub fn error_category(&self) -> ErrorCategory {
        if self.is_transient() {
            ErrorCategory::Transient
        } else {
            ErrorCategory::Permanent
        }
    }
}

/// Store of per-user provider credentials
#[async_trait]
pub trait CredentialVault: Send + Sync {
    /// Fetch the user's credential for a provider, if one is stored
    async fn get_token(
        &self,
        user_id: &UserId,
        provider: Provider,
    ) -> Result<Option<SecretToken>, VaultError>;

    /// Store or replace the user's credential for a provider
    async fn set_token(
        &self,
        user_id: &UserId,
        provider: Provider,
        token: SecretToken,
    ) -> Result<(), VaultError>;

    /// Remove the user's credential for a provider (no-op if absent)
    async fn clear_token(&self, user_id: &UserId, provider: Provider) -> Result<(), VaultError>;
}

#[cfg(test)]
#[path = "credential_vault_tests.rs"]
mod tests;

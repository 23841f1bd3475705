//! # In-Memory Credential Vault
//!
//! Process-local [`CredentialVault`] for development and tests. Tokens live
//! only for the lifetime of the process.

use crate::credential_vault::{CredentialVault, Provider, SecretToken, VaultError};
use crate::UserId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Thread-safe in-memory credential vault
#[derive(Clone, Default)]
pub struct InMemoryCredentialVault {
    tokens: Arc<RwLock<HashMap<(UserId, Provider), SecretToken>>>,
}

impl InMemoryCredentialVault {
    /// Create an empty vault
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a vault pre-populated with one user's credentials
    pub async fn with_tokens(
        user_id: &UserId,
        tokens: impl IntoIterator<Item = (Provider, &str)>,
    ) -> Self {
        let vault = Self::new();
        {
            let mut map = vault.tokens.write().await;
            for (provider, token) in tokens {
                map.insert((user_id.clone(), provider), SecretToken::new(token));
            }
        }
        vault
    }
}

#[async_trait]
impl CredentialVault for InMemoryCredentialVault {
    async fn get_token(
        &self,
        user_id: &UserId,
        provider: Provider,
    ) -> Result<Option<SecretToken>, VaultError> {
        let tokens = self.tokens.read().await;
        Ok(tokens.get(&(user_id.clone(), provider)).cloned())
    }

    async fn set_token(
        &self,
        user_id: &UserId,
        provider: Provider,
        token: SecretToken,
    ) -> Result<(), VaultError> {
        if token.is_empty() {
            return Err(VaultError::EmptyCredential);
        }
        let mut tokens = self.tokens.write().await;
        tokens.insert((user_id.clone(), provider), token);
        Ok(())
    }

    async fn clear_token(&self, user_id: &UserId, provider: Provider) -> Result<(), VaultError> {
        let mut tokens = self.tokens.write().await;
        tokens.remove(&(user_id.clone(), provider));
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_vault_tests.rs"]
mod tests;

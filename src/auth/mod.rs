//! Token-based authentication
//!
//! Demo-grade auth: one username/password pair resolved from the
//! environment, exchanged at `/login` for an opaque bearer token held in an
//! in-memory map. No persistence and no eviction.

use crate::config::ServiceConfig;
use crate::error::{ServiceError, ServiceResult};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

/// Generate an opaque bearer token for a user
pub fn create_token(username: &str) -> String {
    format!("token-{}-{}", Uuid::new_v4(), username)
}

/// In-memory token-to-username mapping
#[derive(Debug, Default)]
pub struct TokenStore {
    tokens: RwLock<HashMap<String, String>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue and remember a token for a user
    pub async fn issue(&self, username: &str) -> String {
        let token = create_token(username);
        let mut tokens = self.tokens.write().await;
        tokens.insert(token.clone(), username.to_string());
        token
    }

    /// Resolve a token to its username
    pub async fn verify(&self, token: &str) -> Option<String> {
        let tokens = self.tokens.read().await;
        tokens.get(token).cloned()
    }

    /// Number of active tokens
    pub async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tokens.read().await.is_empty()
    }
}

/// Validate submitted credentials against the env-resolved pair
pub fn check_credentials(
    config: &ServiceConfig,
    username: &str,
    password: &str,
) -> ServiceResult<()> {
    let (expected_username, expected_password) = config.get_credentials().map_err(|e| {
        warn!(error = %e, "Login attempted without configured credentials");
        ServiceError::CredentialsNotConfigured
    })?;

    if username != expected_username || password != expected_password {
        info!(username = %username, "Rejected login attempt");
        return Err(ServiceError::unauthorized("Invalid username or password"));
    }

    Ok(())
}

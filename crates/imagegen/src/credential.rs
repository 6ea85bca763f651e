//! API key credential.
//!
//! The key is read from an environment variable. `acquire_credential`
//! re-reads the variable, so a user can fix a revoked key (e.g. by
//! editing `.env` and re-exporting) and resume without restarting.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::CredentialError;
use crate::generator::CredentialProvider;

/// Default environment variable holding the API key.
pub const API_KEY_ENV: &str = "ATELIER_API_KEY";

#[derive(Debug, Default)]
struct KeyState {
    key: Option<String>,
    valid: bool,
}

/// API key with a cached validity flag.
#[derive(Debug)]
pub struct ApiKeyCredential {
    env_var: Option<String>,
    state: RwLock<KeyState>,
}

impl ApiKeyCredential {
    /// Credential backed by `env_var`, loaded eagerly if present.
    pub fn from_env(env_var: impl Into<String>) -> Self {
        let env_var = env_var.into();
        let key = read_var(&env_var);
        Self {
            state: RwLock::new(KeyState {
                valid: key.is_some(),
                key,
            }),
            env_var: Some(env_var),
        }
    }

    /// Credential with a fixed key. Once invalidated it cannot be
    /// re-acquired.
    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            env_var: None,
            state: RwLock::new(KeyState {
                key: Some(key.into()),
                valid: true,
            }),
        }
    }

    /// The key, if one is held and still considered valid.
    pub async fn current_key(&self) -> Option<String> {
        let state = self.state.read().await;
        if state.valid {
            state.key.clone()
        } else {
            None
        }
    }
}

fn read_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl CredentialProvider for ApiKeyCredential {
    async fn has_valid_credential(&self) -> bool {
        let state = self.state.read().await;
        state.valid && state.key.is_some()
    }

    async fn acquire_credential(&self) -> Result<(), CredentialError> {
        let Some(env_var) = &self.env_var else {
            return Err(CredentialError::NotConfigured("<fixed key>".to_string()));
        };
        let key = read_var(env_var).ok_or_else(|| CredentialError::NotConfigured(env_var.clone()))?;

        let mut state = self.state.write().await;
        state.key = Some(key);
        state.valid = true;
        tracing::info!(env_var = %env_var, "API key acquired");
        Ok(())
    }

    async fn invalidate(&self) {
        self.state.write().await.valid = false;
        tracing::warn!("API key invalidated");
    }
}

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use customers_core::domain::access::{AuthToken, Privilege};
use customers_core::repository::{PrivilegeError, PrivilegeRepository, RepositoryError};

pub type PrivilegeGrants = HashMap<AuthToken, HashSet<Privilege>>;

/// Token-to-privilege table loaded once from YAML. Each lookup waits `latency`
/// first to stand in for a remote authority.
pub struct StaticPrivilegeRepository {
    grants: PrivilegeGrants,
    latency: Duration,
}

impl StaticPrivilegeRepository {
    pub fn new(grants: PrivilegeGrants) -> Self {
        Self { grants, latency: Duration::ZERO }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Parses a mapping of `token: [PRIVILEGE, ...]`.
    pub fn from_yaml_str(raw: &str) -> Result<Self, RepositoryError> {
        let grants: PrivilegeGrants = serde_yaml::from_str(raw)
            .map_err(|error| RepositoryError::Decode(format!("privilege mapping: {error}")))?;
        Ok(Self::new(grants))
    }

    pub async fn load(path: &Path) -> Result<Self, RepositoryError> {
        let raw = tokio::fs::read_to_string(path).await?;
        Self::from_yaml_str(&raw).map_err(|error| match error {
            RepositoryError::Decode(message) => {
                RepositoryError::Decode(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    pub fn token_count(&self) -> usize {
        self.grants.len()
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }
}

#[async_trait]
impl PrivilegeRepository for StaticPrivilegeRepository {
    async fn privileges(&self, token: &AuthToken) -> Result<HashSet<Privilege>, PrivilegeError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        self.grants.get(token).cloned().ok_or(PrivilegeError::UnknownToken)
    }
}

/// Memoizes successful lookups of another privilege source.
///
/// Failures are never cached, so a token that becomes valid later is picked up.
pub struct CachedPrivilegeRepository {
    inner: Arc<dyn PrivilegeRepository>,
    cache: RwLock<PrivilegeGrants>,
}

impl CachedPrivilegeRepository {
    pub fn new(inner: Arc<dyn PrivilegeRepository>) -> Self {
        Self { inner, cache: RwLock::new(HashMap::new()) }
    }

    pub async fn cached_tokens(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn invalidate(&self, token: &AuthToken) -> bool {
        self.cache.write().await.remove(token).is_some()
    }
}

#[async_trait]
impl PrivilegeRepository for CachedPrivilegeRepository {
    async fn privileges(&self, token: &AuthToken) -> Result<HashSet<Privilege>, PrivilegeError> {
        if let Some(hit) = self.cache.read().await.get(token) {
            debug!(event_name = "privileges.cache.hit", "privilege lookup served from cache");
            return Ok(hit.clone());
        }

        let granted = self.inner.privileges(token).await?;
        self.cache.write().await.insert(token.clone(), granted.clone());
        debug!(event_name = "privileges.cache.miss", "privilege lookup cached");
        Ok(granted)
    }
}

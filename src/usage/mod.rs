use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::config::{Config, UsageBackend};
use crate::PipelineError;

/// Per-user generation counter
///
/// `try_consume` is the only mutation: +1 when the user is still under `limit`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsageStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<u32>;

    /// Increment if `used < limit`; returns whether the increment happened
    async fn try_consume(&self, user_id: &str, limit: u32) -> Result<bool>;

    /// Contact address for generation logs, when the store knows it
    async fn user_email(&self, user_id: &str) -> Option<String>;
}

/// Process-local counters
#[derive(Default)]
pub struct MemoryUsageStore {
    counts: Mutex<HashMap<String, u32>>,
}

impl MemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, u32>>> {
        self.counts
            .lock()
            .map_err(|_| anyhow::anyhow!("usage counter lock poisoned"))
    }
}

#[async_trait]
impl UsageStore for MemoryUsageStore {
    async fn get(&self, user_id: &str) -> Result<u32> {
        Ok(self.lock()?.get(user_id).copied().unwrap_or(0))
    }

    async fn try_consume(&self, user_id: &str, limit: u32) -> Result<bool> {
        let mut counts = self.lock()?;
        let used = counts.entry(user_id.to_string()).or_insert(0);
        if *used >= limit {
            return Ok(false);
        }
        *used += 1;
        Ok(true)
    }

    async fn user_email(&self, _user_id: &str) -> Option<String> {
        None
    }
}

#[derive(Debug, Deserialize)]
struct ClerkUser {
    #[serde(default)]
    public_metadata: serde_json::Value,
    #[serde(default)]
    email_addresses: Vec<ClerkEmail>,
}

#[derive(Debug, Deserialize)]
struct ClerkEmail {
    email_address: String,
}

impl ClerkUser {
    fn generation_count(&self) -> u32 {
        self.public_metadata
            .get("generationCount")
            .and_then(|v| v.as_u64())
            .map(|n| n.min(u32::MAX as u64) as u32)
            .unwrap_or(0)
    }
}

/// Counter kept in the identity provider's public user metadata
///
/// The provider has no conditional write, so read-check-write is serialised per
/// user inside this process.
pub struct ClerkUsageStore {
    client: Client,
    api_url: String,
    secret_key: String,
    user_locks: tokio::sync::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ClerkUsageStore {
    pub fn new(client: Client, api_url: String, secret_key: String) -> Self {
        Self {
            client,
            api_url,
            secret_key,
            user_locks: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    fn user_url(&self, user_id: &str) -> String {
        format!(
            "{}/users/{}",
            self.api_url.trim_end_matches('/'),
            urlencoding::encode(user_id)
        )
    }

    async fn fetch_user(&self, user_id: &str) -> Result<ClerkUser> {
        let user = self
            .client
            .get(self.user_url(user_id))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .context("Failed to reach identity provider")?
            .error_for_status()
            .context("Identity provider rejected user lookup")?
            .json()
            .await
            .context("Failed to parse user record")?;

        Ok(user)
    }

    async fn user_lock(&self, user_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.user_locks.lock().await;
        locks.entry(user_id.to_string()).or_default().clone()
    }

    /// Drop the user's lock once no other request holds a handle to it
    async fn release_lock(&self, user_id: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.user_locks.lock().await;
        drop(lock);
        if locks.get(user_id).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(user_id);
        }
    }

    async fn consume_locked(&self, user_id: &str, limit: u32) -> Result<bool> {
        let used = self.fetch_user(user_id).await?.generation_count();
        if used >= limit {
            return Ok(false);
        }

        // The metadata endpoint deep-merges, so other public keys survive
        self.client
            .patch(format!("{}/metadata", self.user_url(user_id)))
            .bearer_auth(&self.secret_key)
            .json(&json!({ "public_metadata": { "generationCount": used + 1 } }))
            .send()
            .await
            .context("Failed to reach identity provider")?
            .error_for_status()
            .context("Identity provider rejected metadata update")?;

        tracing::debug!(user_id = %user_id, used = used + 1, "Usage counter incremented");
        Ok(true)
    }
}

#[async_trait]
impl UsageStore for ClerkUsageStore {
    async fn get(&self, user_id: &str) -> Result<u32> {
        Ok(self.fetch_user(user_id).await?.generation_count())
    }

    async fn try_consume(&self, user_id: &str, limit: u32) -> Result<bool> {
        let lock = self.user_lock(user_id).await;
        let outcome = {
            let _guard = lock.lock().await;
            self.consume_locked(user_id, limit).await
        };

        self.release_lock(user_id, lock).await;
        outcome
    }

    async fn user_email(&self, user_id: &str) -> Option<String> {
        match self.fetch_user(user_id).await {
            Ok(user) => user.email_addresses.into_iter().next().map(|e| e.email_address),
            Err(e) => {
                tracing::debug!(user_id = %user_id, error = %e, "Could not fetch user email");
                None
            }
        }
    }
}

/// Quota snapshot for one user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStatus {
    pub allowed: bool,
    pub remaining: u32,
    pub used: u32,
    pub limit: u32,
}

impl UsageStatus {
    pub fn new(used: u32, limit: u32) -> Self {
        Self {
            allowed: used < limit,
            remaining: limit.saturating_sub(used),
            used,
            limit,
        }
    }
}

/// Gates generations behind a fixed per-user limit
#[derive(Clone)]
pub struct UsageGate {
    store: Arc<dyn UsageStore>,
    limit: u32,
}

impl UsageGate {
    pub fn new(store: Arc<dyn UsageStore>, limit: u32) -> Self {
        Self { store, limit }
    }

    pub fn from_config(config: &Config, client: Client) -> Result<Self> {
        let store: Arc<dyn UsageStore> = match config.usage.backend {
            UsageBackend::Memory => Arc::new(MemoryUsageStore::new()),
            UsageBackend::Clerk => {
                let secret = config
                    .usage
                    .clerk_secret_key
                    .clone()
                    .context("CLERK_SECRET_KEY is required for the clerk usage backend")?;
                Arc::new(ClerkUsageStore::new(client, config.usage.clerk_api_url.clone(), secret))
            }
        };

        Ok(Self::new(store, config.usage.limit))
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub async fn status(&self, user_id: &str) -> Result<UsageStatus, PipelineError> {
        let used = self
            .store
            .get(user_id)
            .await
            .map_err(|e| PipelineError::UsageUnavailable(e.to_string()))?;

        Ok(UsageStatus::new(used, self.limit))
    }

    /// Fails with `UsageExceeded` when the user has no generations left
    pub async fn check(&self, user_id: &str) -> Result<UsageStatus, PipelineError> {
        let status = self.status(user_id).await?;
        if !status.allowed {
            return Err(PipelineError::UsageExceeded { limit: self.limit });
        }
        Ok(status)
    }

    /// Count one successful generation
    pub async fn record(&self, user_id: &str) -> Result<bool, PipelineError> {
        self.store
            .try_consume(user_id, self.limit)
            .await
            .map_err(|e| PipelineError::UsageUnavailable(e.to_string()))
    }

    pub async fn user_email(&self, user_id: &str) -> Option<String> {
        self.store.user_email(user_id).await
    }
}

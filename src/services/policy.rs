//! Policy store: cached reads of the active loan policy, versioned writes

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    error::{AppError, AppResult},
    models::{
        audit::{AuditEntry, ACTION_LOAN_POLICY_UPDATED, ENTITY_POLICY},
        policy::{LoanPolicy, UpdatePolicyRequest},
    },
    repository::{advisory_lock, Repository, LOCK_POLICY},
};

/// Where the active policy is read from on a cache miss
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PolicySource: Send + Sync {
    async fn fetch_active(&self) -> AppResult<Option<LoanPolicy>>;
}

#[derive(Default)]
struct CacheState {
    entry: Option<(Instant, LoanPolicy)>,
    /// Bumped by every invalidation; a fetch started under an older
    /// generation must not be cached
    generation: u64,
}

/// Active-policy cache with a TTL and explicit invalidation
#[derive(Clone)]
pub struct PolicyStore {
    source: Arc<dyn PolicySource>,
    cache: Arc<RwLock<CacheState>>,
    ttl: Duration,
}

impl PolicyStore {
    pub fn new(source: Arc<dyn PolicySource>, ttl: Duration) -> Self {
        Self {
            source,
            cache: Arc::new(RwLock::new(CacheState::default())),
            ttl,
        }
    }

    /// The active policy, or the built-in default when no row is active.
    /// Read failures propagate; a stale or default policy is never substituted.
    pub async fn get_active_policy(&self) -> AppResult<LoanPolicy> {
        let generation = {
            let state = self.cache.read().await;
            if let Some((loaded_at, policy)) = state.entry.as_ref() {
                if loaded_at.elapsed() < self.ttl {
                    return Ok(policy.clone());
                }
            }
            state.generation
        };

        let policy = match self.source.fetch_active().await? {
            Some(policy) => policy,
            None => {
                tracing::warn!("No active loan policy, using defaults");
                LoanPolicy::default()
            }
        };

        let mut state = self.cache.write().await;
        if state.generation == generation {
            state.entry = Some((Instant::now(), policy.clone()));
        }
        Ok(policy)
    }

    /// Drop the cached policy so the next read goes to storage. Fetches
    /// already in flight return their value but no longer fill the cache.
    pub async fn invalidate(&self) {
        let mut state = self.cache.write().await;
        state.entry = None;
        state.generation += 1;
    }
}

#[derive(Clone)]
pub struct PolicyService {
    repository: Repository,
    store: PolicyStore,
}

impl PolicyService {
    pub fn new(repository: Repository, store: PolicyStore) -> Self {
        Self { repository, store }
    }

    pub async fn get_active_policy(&self) -> AppResult<LoanPolicy> {
        self.store.get_active_policy().await
    }

    /// Replace the active policy with a new version and audit the change.
    /// The cache is invalidated only after the new row has committed.
    pub async fn update_policy(
        &self,
        admin_id: i32,
        request: &UpdatePolicyRequest,
    ) -> AppResult<LoanPolicy> {
        let mut tx = self.repository.pool.begin().await?;
        advisory_lock(&mut tx, LOCK_POLICY, 0).await?;

        let current = self
            .repository
            .policies
            .lock_active(&mut tx)
            .await?
            .unwrap_or_default();
        let values = request.apply_to(&current)?;

        self.repository.policies.deactivate_all(&mut tx).await?;
        let policy = self.repository.policies.insert_active(&mut tx, &values).await?;

        let entry = AuditEntry {
            admin_id,
            action_type: ACTION_LOAN_POLICY_UPDATED,
            entity_type: ENTITY_POLICY,
            entity_id: policy.id,
            old_values: Some(to_json(&current.values())?),
            new_values: Some(to_json(&values)?),
            description: values.describe(),
        };
        self.repository.audit.record(&mut tx, &entry).await?;

        tx.commit().await?;
        self.store.invalidate().await;

        tracing::info!(
            admin_id,
            policy_id = ?policy.id,
            "Loan policy updated: {}",
            values.describe()
        );
        Ok(policy)
    }

    pub async fn history(&self) -> AppResult<Vec<LoanPolicy>> {
        self.repository.policies.history().await
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> AppResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| AppError::Internal(e.to_string()))
}

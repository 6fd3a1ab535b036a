//! Business logic services

pub mod circulation;
pub mod policy;
pub mod stats;

use std::{sync::Arc, time::Duration};

use crate::{config::CirculationConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub circulation: circulation::CirculationService,
    pub policy: policy::PolicyService,
    pub stats: stats::StatsService,
    /// Kept for readiness checks
    pub repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: CirculationConfig) -> Self {
        let store = policy::PolicyStore::new(
            Arc::new(repository.policies.clone()),
            Duration::from_secs(config.policy_cache_ttl_secs),
        );

        Self {
            circulation: circulation::CirculationService::new(
                repository.clone(),
                store.clone(),
                config,
            ),
            policy: policy::PolicyService::new(repository.clone(), store),
            stats: stats::StatsService::new(repository.clone()),
            repository,
        }
    }
}

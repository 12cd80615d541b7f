// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::config::Config;
use crate::storage::{EncryptedStorage, StoragePaths, StorageResult, TokenRegistry};
use crate::workflow::{AccessWorkflow, WorkflowSettings};

#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<AccessWorkflow>,
}

impl AppState {
    pub fn new(workflow: AccessWorkflow) -> Self {
        Self {
            workflow: Arc::new(workflow),
        }
    }

    /// Initialize storage, load the registry and wire up the workflow.
    pub fn from_config(config: &Config) -> StorageResult<Self> {
        let mut storage = EncryptedStorage::new(StoragePaths::new(&config.data_dir));
        storage.initialize()?;

        let registry = Arc::new(TokenRegistry::open(storage.clone())?);
        let purged = registry.purge_expired(chrono::Utc::now())?;
        if purged > 0 {
            tracing::info!(purged, "Removed expired tokens from registry");
        }

        let settings = WorkflowSettings {
            token_ttl: config.token_ttl,
            access_base_url: config.frontend_url.clone(),
        };
        Ok(Self::new(AccessWorkflow::new(storage, registry, settings)))
    }
}

#[cfg(test)]
impl AppState {
    /// State rooted in a fresh temp directory. Keep the guard alive.
    pub fn for_tests() -> (tempfile::TempDir, Self) {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config::from_lookup(|var| match var {
            crate::config::DATA_DIR_ENV => Some(dir.path().display().to_string()),
            crate::config::FRONTEND_URL_ENV => Some("https://drop.example.com".to_string()),
            _ => None,
        })
        .expect("test config");
        let state = Self::from_config(&config).expect("test state");
        (dir, state)
    }
}

// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end dispatch testing.
//!
//! `TestHarness` assembles SQLite storage in a temp directory, a
//! [`FlakyStore`] over it and a [`Dispatcher`] over the flaky store. Faults
//! are off until a test switches them on.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use leadline_config::MatchingConfig;
use leadline_config::model::StorageConfig;
use leadline_core::{
    Assignment, AssignmentRepository, EventRepository, Lead, LeadEvent, LeadRepository,
    LeadlineError, NewLead, Provider,
};
use leadline_dispatch::Dispatcher;
use leadline_storage::SqliteStorage;
use serde_json::Value;

use crate::flaky_store::FlakyStore;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    providers: Vec<Provider>,
    matching: Option<Value>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            providers: Vec::new(),
            matching: None,
        }
    }

    /// Seed the provider directory.
    pub fn with_providers(mut self, providers: Vec<Provider>) -> Self {
        self.providers = providers;
        self
    }

    /// Apply a matching configuration patch before the test starts.
    pub fn with_matching(mut self, patch: Value) -> Self {
        self.matching = Some(patch);
        self
    }

    pub async fn build(self) -> Result<TestHarness, LeadlineError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| LeadlineError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");

        let storage = SqliteStorage::open(StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            ..StorageConfig::default()
        })
        .await?;
        let storage = Arc::new(storage);
        for provider in &self.providers {
            storage.upsert_provider(provider).await?;
        }

        let store = Arc::new(FlakyStore::new(Arc::clone(&storage)));
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&store), "leads"));

        let harness = TestHarness {
            storage,
            store,
            dispatcher,
            _temp_dir: temp_dir,
        };
        if let Some(patch) = self.matching {
            harness.set_matching(patch).await?;
        }
        Ok(harness)
    }
}

/// A complete dispatch environment over a temp database.
pub struct TestHarness {
    /// SQLite storage (temp DB, cleaned up on drop).
    pub storage: Arc<SqliteStorage>,
    /// Fault-injecting wrapper the dispatcher writes through.
    pub store: Arc<FlakyStore>,
    pub dispatcher: Arc<Dispatcher>,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub async fn add_provider(&self, provider: &Provider) -> Result<(), LeadlineError> {
        self.storage.upsert_provider(provider).await
    }

    /// Persist a pending lead created at `at`, without dispatching it.
    pub async fn insert_lead(
        &self,
        new_lead: NewLead,
        at: DateTime<Utc>,
    ) -> Result<Lead, LeadlineError> {
        let lead = new_lead.into_lead("leads", at);
        self.storage.insert_lead(&lead).await?;
        Ok(lead)
    }

    /// Apply a matching configuration patch as the `test` actor.
    pub async fn set_matching(&self, patch: Value) -> Result<MatchingConfig, LeadlineError> {
        self.dispatcher
            .config_store()
            .update_config(&patch, "test", Utc::now())
            .await
    }

    pub async fn lead(&self, id: &str) -> Result<Lead, LeadlineError> {
        self.storage
            .get_lead(id)
            .await?
            .ok_or_else(|| LeadlineError::not_found("lead", id))
    }

    pub async fn assignments(&self, lead_id: &str) -> Result<Vec<Assignment>, LeadlineError> {
        self.storage.list_assignments_for_lead(lead_id).await
    }

    pub async fn timeline(&self, lead_id: &str) -> Result<Vec<LeadEvent>, LeadlineError> {
        self.storage.list_events(lead_id).await
    }
}

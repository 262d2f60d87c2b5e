// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the storage and repository traits.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use leadline_config::model::StorageConfig;
use leadline_core::types::{
    ConfigAuditEntry, ConfigUpdate, QueueStats, ReassignOutcome, ReassignRequest,
    ReservationOutcome, ReservationRequest, StoredConfig,
};
use leadline_core::{
    Assignment, AssignmentRepository, AssignmentStatus, ConfigRepository, EventContext,
    EventRepository, EventType, Lead, LeadEvent, LeadRepository, LeadStatus, LeadlineError,
    Provider, ProviderDirectory, ProviderLoad, StorageAdapter,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed storage.
///
/// Wraps a [`Database`] handle and delegates every repository method to the
/// typed query modules. The database is opened on the first call to
/// [`StorageAdapter::initialize`].
#[derive(Debug)]
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage; nothing is opened yet.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Create and initialize in one step.
    pub async fn open(config: StorageConfig) -> Result<Self, LeadlineError> {
        let storage = Self::new(config);
        storage.initialize().await?;
        Ok(storage)
    }

    fn db(&self) -> Result<&Database, LeadlineError> {
        self.db.get().ok_or_else(|| LeadlineError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    /// The underlying database, for maintenance commands and tests.
    pub fn database(&self) -> Result<&Database, LeadlineError> {
        self.db()
    }

    /// Insert or update a provider in the directory.
    pub async fn upsert_provider(&self, provider: &Provider) -> Result<(), LeadlineError> {
        queries::providers::upsert_provider(self.db()?, provider).await
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn initialize(&self) -> Result<(), LeadlineError> {
        let db = Database::open_with(&self.config).await?;
        self.db.set(db).map_err(|_| LeadlineError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn health_check(&self) -> Result<(), LeadlineError> {
        self.db()?
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn close(&self) -> Result<(), LeadlineError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl ConfigRepository for SqliteStorage {
    async fn load_config(&self) -> Result<Option<StoredConfig>, LeadlineError> {
        queries::config::load_config(self.db()?).await
    }

    async fn save_config(&self, update: ConfigUpdate) -> Result<bool, LeadlineError> {
        queries::config::save_config(self.db()?, update).await
    }

    async fn config_history(&self, limit: u32) -> Result<Vec<ConfigAuditEntry>, LeadlineError> {
        queries::config::config_history(self.db()?, limit).await
    }
}

#[async_trait]
impl LeadRepository for SqliteStorage {
    async fn insert_lead(&self, lead: &Lead) -> Result<(), LeadlineError> {
        queries::leads::insert_lead(self.db()?, lead).await
    }

    async fn get_lead(&self, id: &str) -> Result<Option<Lead>, LeadlineError> {
        queries::leads::get_lead(self.db()?, id).await
    }

    async fn transition_lead(
        &self,
        id: &str,
        from: &[LeadStatus],
        to: LeadStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, LeadlineError> {
        queries::leads::transition_lead(self.db()?, id, from, to, at).await
    }

    async fn list_leads_created_before(
        &self,
        statuses: &[LeadStatus],
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Lead>, LeadlineError> {
        queries::leads::list_leads_created_before(self.db()?, statuses, created_before).await
    }
}

#[async_trait]
impl ProviderDirectory for SqliteStorage {
    async fn list_active_providers(&self) -> Result<Vec<Provider>, LeadlineError> {
        queries::providers::list_active_providers(self.db()?).await
    }

    async fn get_provider(&self, id: &str) -> Result<Option<Provider>, LeadlineError> {
        queries::providers::get_provider(self.db()?, id).await
    }
}

#[async_trait]
impl AssignmentRepository for SqliteStorage {
    async fn provider_loads(
        &self,
        provider_ids: &[String],
        now: DateTime<Utc>,
    ) -> Result<HashMap<String, ProviderLoad>, LeadlineError> {
        queries::assignments::provider_loads(self.db()?, provider_ids, now).await
    }

    async fn reserve_assignment(
        &self,
        request: ReservationRequest,
    ) -> Result<ReservationOutcome, LeadlineError> {
        queries::assignments::reserve_assignment(self.db()?, request).await
    }

    async fn get_assignment(&self, id: &str) -> Result<Option<Assignment>, LeadlineError> {
        queries::assignments::get_assignment(self.db()?, id).await
    }

    async fn find_assignment(
        &self,
        lead_id: &str,
        provider_id: &str,
    ) -> Result<Option<Assignment>, LeadlineError> {
        queries::assignments::find_assignment(self.db()?, lead_id, provider_id).await
    }

    async fn list_assignments_for_lead(
        &self,
        lead_id: &str,
    ) -> Result<Vec<Assignment>, LeadlineError> {
        queries::assignments::list_assignments_for_lead(self.db()?, lead_id).await
    }

    async fn reassign_assignment(
        &self,
        request: ReassignRequest,
    ) -> Result<ReassignOutcome, LeadlineError> {
        queries::assignments::reassign_assignment(self.db()?, request).await
    }

    async fn transition_assignment(
        &self,
        id: &str,
        from: &[AssignmentStatus],
        to: AssignmentStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, LeadlineError> {
        queries::assignments::transition_assignment(self.db()?, id, from, to, at).await
    }

    async fn queue_stats(&self) -> Result<QueueStats, LeadlineError> {
        queries::assignments::queue_stats(self.db()?).await
    }

    async fn list_stale_pending(
        &self,
        assigned_before: DateTime<Utc>,
    ) -> Result<Vec<Assignment>, LeadlineError> {
        queries::assignments::list_stale_pending(self.db()?, assigned_before).await
    }
}

#[async_trait]
impl EventRepository for SqliteStorage {
    async fn append_event(
        &self,
        lead_id: &str,
        event_type: EventType,
        context: &EventContext,
        at: DateTime<Utc>,
    ) -> Result<LeadEvent, LeadlineError> {
        queries::events::append_event(self.db()?, lead_id, event_type, context, at).await
    }

    async fn list_events(&self, lead_id: &str) -> Result<Vec<LeadEvent>, LeadlineError> {
        queries::events::list_events(self.db()?, lead_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            ..StorageConfig::default()
        }
    }

    #[tokio::test]
    async fn uninitialized_storage_reports_error() {
        let dir = tempdir().unwrap();
        let storage = SqliteStorage::new(make_config(
            dir.path().join("test.db").to_str().unwrap(),
        ));
        assert_eq!(storage.name(), "sqlite");
        let err = storage.get_lead("x").await.unwrap_err();
        assert!(err.to_string().contains("not initialized"));
    }

    #[tokio::test]
    async fn open_initializes_and_health_checks() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("init_test.db");
        let storage = SqliteStorage::open(make_config(db_path.to_str().unwrap()))
            .await
            .unwrap();
        assert!(db_path.exists(), "database file should be created");
        storage.health_check().await.unwrap();
        assert!(storage.initialize().await.is_err());
        assert!(storage.list_active_providers().await.unwrap().is_empty());
        storage.close().await.unwrap();
    }
}

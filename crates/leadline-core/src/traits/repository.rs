// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Repository traits for the persisted dispatch entities.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::LeadlineError;
use crate::types::{
    Assignment, AssignmentStatus, ConfigAuditEntry, ConfigUpdate, EventContext, EventType, Lead,
    LeadEvent, LeadStatus, Provider, ProviderLoad, QueueStats, ReassignOutcome, ReassignRequest,
    ReservationOutcome, ReservationRequest, StoredConfig,
};

/// The singleton matching configuration row and its audit trail.
#[async_trait]
pub trait ConfigRepository: Send + Sync {
    /// Load the raw configuration row, if one has ever been written.
    async fn load_config(&self) -> Result<Option<StoredConfig>, LeadlineError>;

    /// Insert or replace the configuration row and append an audit entry,
    /// in one transaction.
    ///
    /// Returns `false` and writes nothing when the stored payload no longer
    /// equals `update.expected_payload`.
    async fn save_config(&self, update: ConfigUpdate) -> Result<bool, LeadlineError>;

    /// Most recent audit entries first.
    async fn config_history(&self, limit: u32) -> Result<Vec<ConfigAuditEntry>, LeadlineError>;
}

#[async_trait]
pub trait LeadRepository: Send + Sync {
    async fn insert_lead(&self, lead: &Lead) -> Result<(), LeadlineError>;

    async fn get_lead(&self, id: &str) -> Result<Option<Lead>, LeadlineError>;

    /// Move a lead to `to` only if its current status is one of `from`.
    ///
    /// Returns whether a row changed.
    async fn transition_lead(
        &self,
        id: &str,
        from: &[LeadStatus],
        to: LeadStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, LeadlineError>;

    /// Leads in one of `statuses` created strictly before `created_before`.
    async fn list_leads_created_before(
        &self,
        statuses: &[LeadStatus],
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Lead>, LeadlineError>;
}

/// Read-only view of the provider directory.
#[async_trait]
pub trait ProviderDirectory: Send + Sync {
    /// All providers flagged active.
    async fn list_active_providers(&self) -> Result<Vec<Provider>, LeadlineError>;

    async fn get_provider(&self, id: &str) -> Result<Option<Provider>, LeadlineError>;
}

#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    /// Cooldown and quota counters for the given providers as of `now`.
    ///
    /// Providers without any assignment are absent from the map.
    async fn provider_loads(
        &self,
        provider_ids: &[String],
        now: DateTime<Utc>,
    ) -> Result<HashMap<String, ProviderLoad>, LeadlineError>;

    /// Check cooldown, quotas and duplicates for one provider and insert the
    /// assignment, atomically.
    async fn reserve_assignment(
        &self,
        request: ReservationRequest,
    ) -> Result<ReservationOutcome, LeadlineError>;

    async fn get_assignment(&self, id: &str) -> Result<Option<Assignment>, LeadlineError>;

    async fn find_assignment(
        &self,
        lead_id: &str,
        provider_id: &str,
    ) -> Result<Option<Assignment>, LeadlineError>;

    /// Assignments of a lead ordered by `assigned_at`, then position.
    async fn list_assignments_for_lead(
        &self,
        lead_id: &str,
    ) -> Result<Vec<Assignment>, LeadlineError>;

    /// Swap the provider on an existing assignment, atomically with the
    /// cooldown, quota and duplicate checks for the new provider.
    async fn reassign_assignment(
        &self,
        request: ReassignRequest,
    ) -> Result<ReassignOutcome, LeadlineError>;

    /// Move an assignment to `to` only if its status is one of `from`.
    ///
    /// Moving to `viewed` stamps `viewed_at`. Returns whether a row changed.
    async fn transition_assignment(
        &self,
        id: &str,
        from: &[AssignmentStatus],
        to: AssignmentStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, LeadlineError>;

    async fn queue_stats(&self) -> Result<QueueStats, LeadlineError>;

    /// Pending assignments assigned strictly before `assigned_before`, on
    /// leads that are not closed.
    async fn list_stale_pending(
        &self,
        assigned_before: DateTime<Utc>,
    ) -> Result<Vec<Assignment>, LeadlineError>;
}

/// Append-only lifecycle event store.
#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn append_event(
        &self,
        lead_id: &str,
        event_type: EventType,
        context: &EventContext,
        at: DateTime<Utc>,
    ) -> Result<LeadEvent, LeadlineError>;

    /// Events of a lead ordered by `created_at`, then insertion order.
    async fn list_events(&self, lead_id: &str) -> Result<Vec<LeadEvent>, LeadlineError>;
}

/// Everything the dispatch orchestrator needs from storage.
pub trait DispatchStore:
    ConfigRepository + LeadRepository + ProviderDirectory + AssignmentRepository + EventRepository
{
}

impl<T> DispatchStore for T where
    T: ConfigRepository
        + LeadRepository
        + ProviderDirectory
        + AssignmentRepository
        + EventRepository
{
}

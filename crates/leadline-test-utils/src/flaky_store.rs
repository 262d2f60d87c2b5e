// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fault-injecting store.
//!
//! `FlakyStore` wraps a [`SqliteStorage`] and delegates every repository
//! call to it, except for the operations a test has switched to failing.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leadline_core::types::{
    ConfigAuditEntry, ConfigUpdate, QueueStats, ReassignOutcome, ReassignRequest,
    ReservationOutcome, ReservationRequest, StoredConfig,
};
use leadline_core::{
    Assignment, AssignmentRepository, AssignmentStatus, ConfigRepository, EventContext,
    EventRepository, EventType, Lead, LeadEvent, LeadRepository, LeadStatus, LeadlineError,
    Provider, ProviderDirectory, ProviderLoad,
};
use leadline_storage::SqliteStorage;

fn injected(operation: &str) -> LeadlineError {
    LeadlineError::Storage {
        source: format!("injected failure in {operation}").into(),
    }
}

/// A store whose writes can be made to fail mid-test.
pub struct FlakyStore {
    inner: Arc<SqliteStorage>,
    /// Reservations still allowed to succeed; `usize::MAX` means no limit.
    reserve_budget: AtomicUsize,
    fail_events: AtomicBool,
    fail_config_load: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: Arc<SqliteStorage>) -> Self {
        Self {
            inner,
            reserve_budget: AtomicUsize::new(usize::MAX),
            fail_events: AtomicBool::new(false),
            fail_config_load: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &Arc<SqliteStorage> {
        &self.inner
    }

    /// Let the next `n` reservations through, then fail every later one.
    pub fn fail_reservations_after(&self, n: usize) {
        self.reserve_budget.store(n, Ordering::SeqCst);
    }

    pub fn fail_events(&self, fail: bool) {
        self.fail_events.store(fail, Ordering::SeqCst);
    }

    pub fn fail_config_load(&self, fail: bool) {
        self.fail_config_load.store(fail, Ordering::SeqCst);
    }

    /// Clear every injected fault.
    pub fn heal(&self) {
        self.fail_reservations_after(usize::MAX);
        self.fail_events(false);
        self.fail_config_load(false);
    }

    fn take_reservation(&self) -> bool {
        self.reserve_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                usize::MAX => Some(usize::MAX),
                0 => None,
                n => Some(n - 1),
            })
            .is_ok()
    }
}

#[async_trait]
impl ConfigRepository for FlakyStore {
    async fn load_config(&self) -> Result<Option<StoredConfig>, LeadlineError> {
        if self.fail_config_load.load(Ordering::SeqCst) {
            return Err(injected("load_config"));
        }
        self.inner.load_config().await
    }

    async fn save_config(&self, update: ConfigUpdate) -> Result<bool, LeadlineError> {
        self.inner.save_config(update).await
    }

    async fn config_history(&self, limit: u32) -> Result<Vec<ConfigAuditEntry>, LeadlineError> {
        self.inner.config_history(limit).await
    }
}

#[async_trait]
impl LeadRepository for FlakyStore {
    async fn insert_lead(&self, lead: &Lead) -> Result<(), LeadlineError> {
        self.inner.insert_lead(lead).await
    }

    async fn get_lead(&self, id: &str) -> Result<Option<Lead>, LeadlineError> {
        self.inner.get_lead(id).await
    }

    async fn transition_lead(
        &self,
        id: &str,
        from: &[LeadStatus],
        to: LeadStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, LeadlineError> {
        self.inner.transition_lead(id, from, to, at).await
    }

    async fn list_leads_created_before(
        &self,
        statuses: &[LeadStatus],
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Lead>, LeadlineError> {
        self.inner
            .list_leads_created_before(statuses, created_before)
            .await
    }
}

#[async_trait]
impl ProviderDirectory for FlakyStore {
    async fn list_active_providers(&self) -> Result<Vec<Provider>, LeadlineError> {
        self.inner.list_active_providers().await
    }

    async fn get_provider(&self, id: &str) -> Result<Option<Provider>, LeadlineError> {
        self.inner.get_provider(id).await
    }
}

#[async_trait]
impl AssignmentRepository for FlakyStore {
    async fn provider_loads(
        &self,
        provider_ids: &[String],
        now: DateTime<Utc>,
    ) -> Result<HashMap<String, ProviderLoad>, LeadlineError> {
        self.inner.provider_loads(provider_ids, now).await
    }

    async fn reserve_assignment(
        &self,
        request: ReservationRequest,
    ) -> Result<ReservationOutcome, LeadlineError> {
        if !self.take_reservation() {
            return Err(injected("reserve_assignment"));
        }
        self.inner.reserve_assignment(request).await
    }

    async fn get_assignment(&self, id: &str) -> Result<Option<Assignment>, LeadlineError> {
        self.inner.get_assignment(id).await
    }

    async fn find_assignment(
        &self,
        lead_id: &str,
        provider_id: &str,
    ) -> Result<Option<Assignment>, LeadlineError> {
        self.inner.find_assignment(lead_id, provider_id).await
    }

    async fn list_assignments_for_lead(
        &self,
        lead_id: &str,
    ) -> Result<Vec<Assignment>, LeadlineError> {
        self.inner.list_assignments_for_lead(lead_id).await
    }

    async fn reassign_assignment(
        &self,
        request: ReassignRequest,
    ) -> Result<ReassignOutcome, LeadlineError> {
        self.inner.reassign_assignment(request).await
    }

    async fn transition_assignment(
        &self,
        id: &str,
        from: &[AssignmentStatus],
        to: AssignmentStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, LeadlineError> {
        self.inner.transition_assignment(id, from, to, at).await
    }

    async fn queue_stats(&self) -> Result<QueueStats, LeadlineError> {
        self.inner.queue_stats().await
    }

    async fn list_stale_pending(
        &self,
        assigned_before: DateTime<Utc>,
    ) -> Result<Vec<Assignment>, LeadlineError> {
        self.inner.list_stale_pending(assigned_before).await
    }
}

#[async_trait]
impl EventRepository for FlakyStore {
    async fn append_event(
        &self,
        lead_id: &str,
        event_type: EventType,
        context: &EventContext,
        at: DateTime<Utc>,
    ) -> Result<LeadEvent, LeadlineError> {
        if self.fail_events.load(Ordering::SeqCst) {
            return Err(injected("append_event"));
        }
        self.inner.append_event(lead_id, event_type, context, at).await
    }

    async fn list_events(&self, lead_id: &str) -> Result<Vec<LeadEvent>, LeadlineError> {
        self.inner.list_events(lead_id).await
    }
}

// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The dispatch pipeline: config, filter, rank, write, log.
//!
//! `dispatch` never returns an error. Every failure is logged and reduces
//! the result to the providers that were actually assigned, possibly none.
//! `replay` and `reassign` are administrator operations and do report
//! errors.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use leadline_audit::EventLogger;
use leadline_core::types::{ReassignOutcome, ReassignRequest};
use leadline_core::{
    Assignment, DispatchHints, DispatchStore, EventContext, EventType, FieldError, Lead,
    LeadStatus, LeadlineError, NewLead, SkipReason,
};
use leadline_matching::{find_candidates, strategy_for};
use serde_json::json;
use strum::Display;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config_store::ConfigStore;
use crate::recording;
use crate::writer::AssignmentWriter;

/// What started a dispatch, recorded in the `dispatched` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum DispatchTrigger {
    Intake,
    Manual,
    Replay,
}

/// A persisted lead and its in-flight dispatch.
///
/// Dropping `dispatch` detaches the task; awaiting it yields the assigned
/// provider ids.
#[derive(Debug)]
pub struct Intake {
    pub lead: Lead,
    pub dispatch: JoinHandle<Vec<String>>,
}

pub struct Dispatcher {
    pub(crate) store: Arc<dyn DispatchStore>,
    pub(crate) config: ConfigStore,
    pub(crate) events: EventLogger,
    pub(crate) writer: AssignmentWriter,
    source_table: String,
}

impl Dispatcher {
    /// Build a dispatcher over one storage backend.
    ///
    /// `source_table` tags leads created through [`Dispatcher::intake`]
    /// when the submission does not name one.
    pub fn new<S>(store: Arc<S>, source_table: impl Into<String>) -> Self
    where
        S: DispatchStore + 'static,
    {
        Self {
            config: ConfigStore::new(store.clone()),
            events: EventLogger::new(store.clone()),
            writer: AssignmentWriter::new(store.clone()),
            store,
            source_table: source_table.into(),
        }
    }

    pub fn config_store(&self) -> &ConfigStore {
        &self.config
    }

    pub fn events(&self) -> &EventLogger {
        &self.events
    }

    /// Dispatch a lead now. Returns the assigned provider ids in position
    /// order, or an empty list.
    pub async fn dispatch(&self, lead_id: &str, hints: &DispatchHints) -> Vec<String> {
        self.dispatch_at(lead_id, hints, DispatchTrigger::Manual, Utc::now())
            .await
    }

    /// Record a dispatch that assigned nobody, with the reason.
    async fn log_unassigned(
        &self,
        lead_id: &str,
        dispatch_id: Option<&str>,
        strategy: &str,
        trigger: DispatchTrigger,
        reason: &str,
        now: DateTime<Utc>,
    ) {
        self.events
            .log_event(
                lead_id,
                EventType::Dispatched,
                EventContext::system().with_metadata(json!({
                    "dispatch_id": dispatch_id,
                    "strategy": strategy,
                    "trigger": trigger.to_string(),
                    "provider_ids": [],
                    "reason": reason,
                })),
                now,
            )
            .await;
    }

    /// Dispatch with an explicit trigger and clock.
    pub async fn dispatch_at(
        &self,
        lead_id: &str,
        hints: &DispatchHints,
        trigger: DispatchTrigger,
        now: DateTime<Utc>,
    ) -> Vec<String> {
        let config = self.config.get_config().await.config;

        let mut lead = match self.store.get_lead(lead_id).await {
            Ok(Some(lead)) => lead,
            Ok(None) => {
                warn!(lead_id, "dispatch requested for unknown lead");
                recording::record_dispatch("unknown_lead");
                return Vec::new();
            }
            Err(e) => {
                error!(lead_id, error = %e, "failed to load lead for dispatch");
                recording::record_dispatch("error");
                return Vec::new();
            }
        };
        if lead.status.is_closed() {
            warn!(lead_id, status = %lead.status, "dispatch requested for closed lead");
            recording::record_dispatch("closed");
            return Vec::new();
        }
        hints.apply(&mut lead);

        let providers = match self.store.list_active_providers().await {
            Ok(providers) => providers,
            Err(e) => {
                error!(lead_id, error = %e, "failed to load provider directory");
                recording::record_dispatch("error");
                return Vec::new();
            }
        };
        let provider_ids: Vec<String> = providers.iter().map(|p| p.id.clone()).collect();
        let loads = match self.store.provider_loads(&provider_ids, now).await {
            Ok(loads) => loads,
            Err(e) => {
                error!(lead_id, error = %e, "failed to load provider assignment counts");
                recording::record_dispatch("error");
                return Vec::new();
            }
        };

        let strategy = strategy_for(config.matching_strategy);
        let candidates = find_candidates(&lead, &config, &providers, &loads, now);
        recording::record_dispatch_candidates(candidates.len());
        if candidates.is_empty() {
            info!(lead_id, "no eligible providers");
            recording::record_dispatch("no_candidates");
            self.log_unassigned(lead_id, None, strategy.name(), trigger, "no_candidates", now)
                .await;
            return Vec::new();
        }

        let ranked = strategy.rank(candidates, &lead, &config);
        let dispatch_id = uuid::Uuid::new_v4().to_string();
        let outcome = self
            .writer
            .write_assignments(&lead, &ranked, &config, &dispatch_id, now)
            .await;

        let provider_ids = outcome.provider_ids();
        if provider_ids.is_empty() {
            info!(lead_id, skipped = outcome.skipped.len(), "no assignment written");
            let reason = if outcome.failure.is_some() {
                "error"
            } else {
                "none_written"
            };
            recording::record_dispatch(reason);
            self.log_unassigned(lead_id, Some(&dispatch_id), strategy.name(), trigger, reason, now)
                .await;
            return Vec::new();
        }

        // A fresh batch reopens a lead whose earlier providers all declined.
        if let Err(e) = self
            .store
            .transition_lead(
                lead_id,
                &[LeadStatus::Pending, LeadStatus::Declined],
                LeadStatus::Dispatched,
                now,
            )
            .await
        {
            error!(lead_id, error = %e, "failed to mark lead dispatched");
        }

        self.events
            .log_event(
                lead_id,
                EventType::Dispatched,
                EventContext::system().with_metadata(json!({
                    "dispatch_id": dispatch_id,
                    "strategy": strategy.name(),
                    "trigger": trigger.to_string(),
                    "provider_ids": provider_ids,
                })),
                now,
            )
            .await;

        info!(
            lead_id,
            %dispatch_id,
            strategy = strategy.name(),
            assigned = provider_ids.len(),
            "lead dispatched"
        );
        recording::record_dispatch(if outcome.failure.is_some() {
            "partial"
        } else {
            "dispatched"
        });
        provider_ids
    }

    /// Run a dispatch on a detached task.
    pub fn spawn_dispatch(
        self: &Arc<Self>,
        lead_id: String,
        hints: DispatchHints,
        trigger: DispatchTrigger,
    ) -> JoinHandle<Vec<String>> {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            dispatcher
                .dispatch_at(&lead_id, &hints, trigger, Utc::now())
                .await
        })
    }

    /// Persist a new lead, log its creation and start its dispatch without
    /// waiting for it.
    pub async fn intake(self: &Arc<Self>, new_lead: NewLead) -> Result<Intake, LeadlineError> {
        if new_lead.service_name.trim().is_empty() {
            return Err(LeadlineError::Validation {
                errors: vec![FieldError::new("service_name", "must not be empty")],
            });
        }
        let now = Utc::now();
        let lead = new_lead.into_lead(&self.source_table, now);
        self.store.insert_lead(&lead).await?;
        self.events
            .log_event(
                &lead.id,
                EventType::Created,
                EventContext::system().with_metadata(json!({
                    "source_table": lead.source_table,
                    "urgency": lead.urgency_tier.to_string(),
                })),
                now,
            )
            .await;
        info!(lead_id = %lead.id, service = %lead.service_name, "lead received");

        let dispatch = self.spawn_dispatch(
            lead.id.clone(),
            DispatchHints::default(),
            DispatchTrigger::Intake,
        );
        Ok(Intake { lead, dispatch })
    }

    /// Dispatch the lead of an existing assignment again.
    ///
    /// Earlier assignments are left untouched; providers already on the
    /// lead are skipped by the writer.
    pub async fn replay(&self, assignment_id: &str) -> Result<Vec<String>, LeadlineError> {
        let assignment = self
            .store
            .get_assignment(assignment_id)
            .await?
            .ok_or_else(|| LeadlineError::not_found("assignment", assignment_id))?;
        info!(assignment_id, lead_id = %assignment.lead_id, "replaying dispatch");
        Ok(self
            .dispatch_at(
                &assignment.lead_id,
                &DispatchHints::default(),
                DispatchTrigger::Replay,
                Utc::now(),
            )
            .await)
    }

    /// Move an assignment to another provider without re-scoring.
    pub async fn reassign(
        &self,
        assignment_id: &str,
        new_provider_id: &str,
        actor_id: &str,
    ) -> Result<Assignment, LeadlineError> {
        self.reassign_at(assignment_id, new_provider_id, actor_id, Utc::now())
            .await
    }

    pub async fn reassign_at(
        &self,
        assignment_id: &str,
        new_provider_id: &str,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Assignment, LeadlineError> {
        let assignment = self
            .store
            .get_assignment(assignment_id)
            .await?
            .ok_or_else(|| LeadlineError::not_found("assignment", assignment_id))?;
        let provider = self
            .store
            .get_provider(new_provider_id)
            .await?
            .ok_or_else(|| LeadlineError::not_found("provider", new_provider_id))?;
        if !provider.is_active {
            return Err(LeadlineError::Ineligible {
                provider_id: provider.id,
                reason: "provider is inactive".into(),
            });
        }
        if let Some(lead) = self.store.get_lead(&assignment.lead_id).await?
            && lead.status.is_closed()
        {
            return Err(LeadlineError::InvalidTransition {
                entity: "lead",
                from: lead.status.to_string(),
                action: "reassign",
            });
        }

        let config = self.config.get_config().await.config;
        let outcome = self
            .store
            .reassign_assignment(ReassignRequest {
                assignment_id: assignment_id.to_string(),
                new_provider_id: new_provider_id.to_string(),
                policy: config.quota_policy(),
                at: now,
            })
            .await?;

        match outcome {
            ReassignOutcome::Missing => Err(LeadlineError::not_found("assignment", assignment_id)),
            ReassignOutcome::Rejected(SkipReason::AlreadyAssigned) => {
                Err(LeadlineError::Conflict(format!(
                    "provider {new_provider_id} already holds an assignment on lead {}",
                    assignment.lead_id
                )))
            }
            ReassignOutcome::Rejected(reason) => Err(LeadlineError::Ineligible {
                provider_id: new_provider_id.to_string(),
                reason: reason.to_string(),
            }),
            ReassignOutcome::Reassigned {
                previous_provider_id,
                assignment,
            } => {
                self.events
                    .log_event(
                        &assignment.lead_id,
                        EventType::Reassigned,
                        EventContext::actor(actor_id)
                            .with_provider(new_provider_id)
                            .with_metadata(json!({
                                "assignment_id": assignment.id,
                                "previous_provider_id": previous_provider_id,
                                "new_provider_id": new_provider_id,
                            })),
                        now,
                    )
                    .await;
                info!(
                    assignment_id,
                    %previous_provider_id,
                    new_provider_id,
                    "assignment reassigned"
                );
                Ok(assignment)
            }
        }
    }
}

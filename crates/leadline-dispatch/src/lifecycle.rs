// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lead lifecycle after dispatch: provider actions, client decisions and
//! the expiry and auto-reassign sweeps.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use leadline_core::types::{QueueStats, ReassignOutcome, ReassignRequest};
use leadline_core::{
    Assignment, AssignmentStatus, EventContext, EventType, FieldError, Lead, LeadStatus,
    LeadlineError,
};
use leadline_matching::{find_candidates, rank};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::orchestrator::Dispatcher;

/// Longest accepted decline reason, in characters.
const MAX_DECLINE_REASON: usize = 500;

/// Longest accepted quote validity, in days.
const MAX_QUOTE_VALIDITY_DAYS: u32 = 365;

/// An action a provider takes on an assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ProviderAction {
    View,
    Quote {
        amount: f64,
        #[serde(default)]
        valid_days: Option<u32>,
    },
    Decline {
        #[serde(default)]
        reason: Option<String>,
    },
}

impl ProviderAction {
    fn name(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Quote { .. } => "quote",
            Self::Decline { .. } => "decline",
        }
    }

    fn validate(&self) -> Result<(), LeadlineError> {
        let mut errors = Vec::new();
        match self {
            Self::View => {}
            Self::Quote { amount, valid_days } => {
                if !amount.is_finite() || *amount <= 0.0 {
                    errors.push(FieldError::new("amount", "must be a positive number"));
                }
                if let Some(days) = valid_days
                    && !(1..=MAX_QUOTE_VALIDITY_DAYS).contains(days)
                {
                    errors.push(FieldError::new(
                        "valid_days",
                        format!("must be between 1 and {MAX_QUOTE_VALIDITY_DAYS}"),
                    ));
                }
            }
            Self::Decline { reason } => {
                if let Some(reason) = reason
                    && reason.chars().count() > MAX_DECLINE_REASON
                {
                    errors.push(FieldError::new(
                        "reason",
                        format!("must be at most {MAX_DECLINE_REASON} characters"),
                    ));
                }
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(LeadlineError::Validation { errors })
        }
    }
}

/// A client's answer to a quoted lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientDecision {
    Accept,
    Refuse,
}

impl Dispatcher {
    async fn open_lead(&self, lead_id: &str, action: &'static str) -> Result<Lead, LeadlineError> {
        let lead = self
            .store
            .get_lead(lead_id)
            .await?
            .ok_or_else(|| LeadlineError::not_found("lead", lead_id))?;
        if lead.status.is_closed() {
            return Err(LeadlineError::InvalidTransition {
                entity: "lead",
                from: lead.status.to_string(),
                action,
            });
        }
        Ok(lead)
    }

    async fn assignment_of(
        &self,
        lead_id: &str,
        provider_id: &str,
    ) -> Result<Assignment, LeadlineError> {
        self.store
            .find_assignment(lead_id, provider_id)
            .await?
            .ok_or_else(|| LeadlineError::not_found("assignment", format!("{lead_id}/{provider_id}")))
    }

    async fn reload_assignment(&self, id: &str) -> Result<Assignment, LeadlineError> {
        self.store
            .get_assignment(id)
            .await?
            .ok_or_else(|| LeadlineError::not_found("assignment", id))
    }

    /// Apply a provider action to the provider's assignment on a lead.
    ///
    /// `view` only ever moves `pending` to `viewed`; viewing a quoted or
    /// declined assignment is logged without changing it.
    pub async fn provider_action(
        &self,
        lead_id: &str,
        provider_id: &str,
        action: ProviderAction,
        now: DateTime<Utc>,
    ) -> Result<Assignment, LeadlineError> {
        action.validate()?;
        self.open_lead(lead_id, action.name()).await?;
        let assignment = self.assignment_of(lead_id, provider_id).await?;
        let context = EventContext::actor(provider_id).with_provider(provider_id);

        let (event_type, metadata) = match &action {
            ProviderAction::View => {
                self.store
                    .transition_assignment(
                        &assignment.id,
                        &[AssignmentStatus::Pending],
                        AssignmentStatus::Viewed,
                        now,
                    )
                    .await?;
                self.store
                    .transition_lead(lead_id, &[LeadStatus::Dispatched], LeadStatus::Viewed, now)
                    .await?;
                (EventType::Viewed, json!({ "assignment_id": assignment.id }))
            }
            ProviderAction::Quote { amount, valid_days } => {
                self.move_assignment(&assignment, AssignmentStatus::Quoted, "quote", now)
                    .await?;
                self.store
                    .transition_lead(
                        lead_id,
                        &[LeadStatus::Dispatched, LeadStatus::Viewed, LeadStatus::Declined],
                        LeadStatus::Quoted,
                        now,
                    )
                    .await?;
                let validity = match valid_days {
                    Some(days) => Duration::days(i64::from(*days)),
                    None => {
                        let hours = self.config.get_config().await.config.quote_expiry_hours;
                        Duration::hours(i64::from(hours))
                    }
                };
                (
                    EventType::Quoted,
                    json!({
                        "assignment_id": assignment.id,
                        "amount": amount,
                        "valid_until": (now + validity).to_rfc3339(),
                    }),
                )
            }
            ProviderAction::Decline { reason } => {
                self.move_assignment(&assignment, AssignmentStatus::Declined, "decline", now)
                    .await?;
                let all_declined = self
                    .store
                    .list_assignments_for_lead(lead_id)
                    .await?
                    .iter()
                    .all(|a| a.status == AssignmentStatus::Declined);
                if all_declined {
                    self.store
                        .transition_lead(
                            lead_id,
                            &[LeadStatus::Dispatched, LeadStatus::Viewed],
                            LeadStatus::Declined,
                            now,
                        )
                        .await?;
                }
                (
                    EventType::Declined,
                    json!({ "assignment_id": assignment.id, "reason": reason }),
                )
            }
        };

        self.events
            .log_event(lead_id, event_type, context.with_metadata(metadata), now)
            .await;
        info!(lead_id, provider_id, action = action.name(), "provider action applied");
        self.reload_assignment(&assignment.id).await
    }

    async fn move_assignment(
        &self,
        assignment: &Assignment,
        to: AssignmentStatus,
        action: &'static str,
        now: DateTime<Utc>,
    ) -> Result<(), LeadlineError> {
        let moved = self
            .store
            .transition_assignment(
                &assignment.id,
                &[AssignmentStatus::Pending, AssignmentStatus::Viewed],
                to,
                now,
            )
            .await?;
        if moved {
            Ok(())
        } else {
            let current = self.reload_assignment(&assignment.id).await?;
            Err(LeadlineError::InvalidTransition {
                entity: "assignment",
                from: current.status.to_string(),
                action,
            })
        }
    }

    /// Record a client's answer to a provider's quote.
    ///
    /// Both answers require the provider's assignment to be quoted.
    /// Accepting closes the lead; refusing only logs the decision.
    pub async fn client_decision(
        &self,
        lead_id: &str,
        provider_id: &str,
        decision: ClientDecision,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Lead, LeadlineError> {
        let action = match decision {
            ClientDecision::Accept => "accept",
            ClientDecision::Refuse => "refuse",
        };
        self.open_lead(lead_id, action).await?;
        let assignment = self.assignment_of(lead_id, provider_id).await?;
        if assignment.status != AssignmentStatus::Quoted {
            return Err(LeadlineError::InvalidTransition {
                entity: "assignment",
                from: assignment.status.to_string(),
                action,
            });
        }

        let event_type = match decision {
            ClientDecision::Accept => {
                let moved = self
                    .store
                    .transition_lead(
                        lead_id,
                        &[
                            LeadStatus::Dispatched,
                            LeadStatus::Viewed,
                            LeadStatus::Quoted,
                            LeadStatus::Declined,
                        ],
                        LeadStatus::Accepted,
                        now,
                    )
                    .await?;
                if !moved {
                    let lead = self.open_lead(lead_id, action).await?;
                    return Err(LeadlineError::InvalidTransition {
                        entity: "lead",
                        from: lead.status.to_string(),
                        action,
                    });
                }
                EventType::Accepted
            }
            ClientDecision::Refuse => EventType::Refused,
        };

        self.events
            .log_event(
                lead_id,
                event_type,
                EventContext::actor(actor_id)
                    .with_provider(provider_id)
                    .with_metadata(json!({ "assignment_id": assignment.id })),
                now,
            )
            .await;
        info!(lead_id, provider_id, decision = action, "client decision recorded");
        self.store
            .get_lead(lead_id)
            .await?
            .ok_or_else(|| LeadlineError::not_found("lead", lead_id))
    }

    /// Mark an accepted lead as completed.
    pub async fn complete(
        &self,
        lead_id: &str,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Lead, LeadlineError> {
        let lead = self
            .store
            .get_lead(lead_id)
            .await?
            .ok_or_else(|| LeadlineError::not_found("lead", lead_id))?;
        let moved = self
            .store
            .transition_lead(lead_id, &[LeadStatus::Accepted], LeadStatus::Completed, now)
            .await?;
        if !moved {
            return Err(LeadlineError::InvalidTransition {
                entity: "lead",
                from: lead.status.to_string(),
                action: "complete",
            });
        }
        self.events
            .log_event(lead_id, EventType::Completed, EventContext::actor(actor_id), now)
            .await;
        info!(lead_id, "lead completed");
        Ok(Lead {
            status: LeadStatus::Completed,
            updated_at: now,
            ..lead
        })
    }

    /// Expire leads that never progressed past dispatch within
    /// `lead_expiry_hours`. Returns the expired lead ids.
    pub async fn expire_stale_leads(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, LeadlineError> {
        let config = self.config.get_config().await.config;
        let cutoff = now - Duration::hours(i64::from(config.lead_expiry_hours));
        let open = [
            LeadStatus::Pending,
            LeadStatus::Dispatched,
            LeadStatus::Declined,
        ];
        let stale = self.store.list_leads_created_before(&open, cutoff).await?;

        let mut expired = Vec::new();
        for lead in stale {
            if !self
                .store
                .transition_lead(&lead.id, &open, LeadStatus::Expired, now)
                .await?
            {
                continue;
            }
            self.events
                .log_event(
                    &lead.id,
                    EventType::Expired,
                    EventContext::system().with_metadata(json!({
                        "previous_status": lead.status.to_string(),
                        "expiry_hours": config.lead_expiry_hours,
                    })),
                    now,
                )
                .await;
            expired.push(lead.id);
        }
        info!(count = expired.len(), "expiry sweep finished");
        Ok(expired)
    }

    /// Hand assignments left pending for `auto_reassign_hours` to the best
    /// eligible provider not yet on the lead.
    pub async fn auto_reassign_stale(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Assignment>, LeadlineError> {
        let config = self.config.get_config().await.config;
        let cutoff = now - Duration::hours(i64::from(config.auto_reassign_hours));
        let stale = self.store.list_stale_pending(cutoff).await?;
        if stale.is_empty() {
            return Ok(Vec::new());
        }
        let providers = self.store.list_active_providers().await?;
        let provider_ids: Vec<String> = providers.iter().map(|p| p.id.clone()).collect();

        let mut moved = Vec::new();
        for assignment in stale {
            let Some(lead) = self.store.get_lead(&assignment.lead_id).await? else {
                continue;
            };
            let taken: HashSet<String> = self
                .store
                .list_assignments_for_lead(&lead.id)
                .await?
                .into_iter()
                .map(|a| a.provider_id)
                .collect();
            let available: Vec<_> = providers
                .iter()
                .filter(|p| !taken.contains(&p.id))
                .cloned()
                .collect();
            let loads = self.store.provider_loads(&provider_ids, now).await?;
            let ranked = rank(
                find_candidates(&lead, &config, &available, &loads, now),
                &lead,
                &config,
            );

            let mut replaced = false;
            for candidate in ranked {
                let outcome = self
                    .store
                    .reassign_assignment(ReassignRequest {
                        assignment_id: assignment.id.clone(),
                        new_provider_id: candidate.provider.id.clone(),
                        policy: config.quota_policy(),
                        at: now,
                    })
                    .await?;
                match outcome {
                    ReassignOutcome::Reassigned {
                        previous_provider_id,
                        assignment: updated,
                    } => {
                        self.events
                            .log_event(
                                &lead.id,
                                EventType::Reassigned,
                                EventContext::system()
                                    .with_provider(updated.provider_id.clone())
                                    .with_metadata(json!({
                                        "assignment_id": updated.id,
                                        "previous_provider_id": previous_provider_id,
                                        "new_provider_id": updated.provider_id,
                                        "reason": "auto",
                                    })),
                                now,
                            )
                            .await;
                        moved.push(updated);
                        replaced = true;
                        break;
                    }
                    ReassignOutcome::Rejected(_) => continue,
                    ReassignOutcome::Missing => break,
                }
            }
            if !replaced {
                warn!(
                    assignment_id = %assignment.id,
                    lead_id = %lead.id,
                    "no replacement provider for stale assignment"
                );
            }
        }
        info!(count = moved.len(), "auto-reassign sweep finished");
        Ok(moved)
    }

    /// Assignment counts by status.
    pub async fn queue_stats(&self) -> Result<QueueStats, LeadlineError> {
        self.store.queue_stats().await
    }
}

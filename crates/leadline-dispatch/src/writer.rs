// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assignment writer.
//!
//! Walks the ranked candidates best-first and reserves one provider at a
//! time. Each reservation re-checks duplicates, cooldown and quotas inside
//! its own storage transaction, so a candidate that was eligible when the
//! directory was read can still be skipped here.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use leadline_config::MatchingConfig;
use leadline_core::types::{ReservationOutcome, ReservationRequest};
use leadline_core::{Assignment, AssignmentRepository, Lead, LeadlineError, SkipReason};
use leadline_matching::RankedCandidate;
use tracing::{debug, error};

use crate::recording;

/// What a write pass committed.
#[derive(Debug, Default)]
pub struct WriteOutcome {
    /// Committed assignments in position order.
    pub written: Vec<Assignment>,
    /// Candidates passed over, with the reason.
    pub skipped: Vec<(String, SkipReason)>,
    /// The storage error that stopped the walk, if any.
    pub failure: Option<LeadlineError>,
}

impl WriteOutcome {
    pub fn provider_ids(&self) -> Vec<String> {
        self.written.iter().map(|a| a.provider_id.clone()).collect()
    }
}

#[derive(Clone)]
pub struct AssignmentWriter {
    assignments: Arc<dyn AssignmentRepository>,
}

impl AssignmentWriter {
    pub fn new(assignments: Arc<dyn AssignmentRepository>) -> Self {
        Self { assignments }
    }

    /// Reserve up to `max_artisans_per_lead` assignments for `lead` under
    /// one `dispatch_id`.
    ///
    /// A storage error stops the walk; rows committed before it are kept
    /// and reported.
    pub async fn write_assignments(
        &self,
        lead: &Lead,
        ranked: &[RankedCandidate],
        config: &MatchingConfig,
        dispatch_id: &str,
        now: DateTime<Utc>,
    ) -> WriteOutcome {
        let limit = config.max_artisans_per_lead;
        let policy = config.quota_policy();
        let mut outcome = WriteOutcome::default();

        for candidate in ranked {
            if outcome.written.len() >= limit as usize {
                break;
            }
            let request = ReservationRequest {
                lead_id: lead.id.clone(),
                provider_id: candidate.provider.id.clone(),
                dispatch_id: dispatch_id.to_string(),
                score: candidate.score,
                distance_km: candidate.distance_km,
                source_table: lead.source_table.clone(),
                policy,
                batch_limit: limit,
                at: now,
            };

            match self.assignments.reserve_assignment(request).await {
                Ok(ReservationOutcome::Reserved(assignment)) => {
                    debug!(
                        lead_id = %lead.id,
                        provider_id = %assignment.provider_id,
                        position = assignment.position,
                        "assignment reserved"
                    );
                    outcome.written.push(assignment);
                }
                Ok(ReservationOutcome::Skipped(reason)) => {
                    debug!(
                        lead_id = %lead.id,
                        provider_id = %candidate.provider.id,
                        %reason,
                        "candidate skipped"
                    );
                    recording::record_candidate_skipped(reason);
                    outcome
                        .skipped
                        .push((candidate.provider.id.clone(), reason));
                    if reason == SkipReason::BatchFull {
                        break;
                    }
                }
                Err(e) => {
                    error!(
                        lead_id = %lead.id,
                        provider_id = %candidate.provider.id,
                        written = outcome.written.len(),
                        error = %e,
                        "assignment write failed"
                    );
                    outcome.failure = Some(e);
                    break;
                }
            }
        }

        recording::record_assignments_written(outcome.written.len());
        outcome
    }
}

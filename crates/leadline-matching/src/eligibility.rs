// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Eligibility filter: which active providers may receive a lead.
//!
//! Every rule must pass. Cooldown and quota are evaluated here against a
//! snapshot of assignment counters; the assignment writer re-checks them
//! inside its reservation transaction.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use leadline_config::MatchingConfig;
use leadline_core::{Lead, Provider, ProviderLoad, SkipReason, Urgency};
use tracing::debug;

use crate::geo::{department_from_postal_code, haversine_km};
use crate::specialty::{SpecialtyQuery, normalize, specialty_matches};

/// A provider that passed every eligibility rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub provider: Provider,
    /// Distance to the lead, when both sides have coordinates.
    pub distance_km: Option<f64>,
    /// Most recent assignment of the provider, used by round robin.
    pub last_assigned_at: Option<DateTime<Utc>>,
}

/// The first rule a provider failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    Inactive,
    Specialty,
    Department,
    OutOfArea,
    Rating,
    Unverified,
    Cooldown,
    DailyQuota,
    MonthlyQuota,
    Dormant,
    Unclaimed,
}

impl Exclusion {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Specialty => "specialty",
            Self::Department => "department",
            Self::OutOfArea => "out_of_area",
            Self::Rating => "rating",
            Self::Unverified => "unverified",
            Self::Cooldown => "cooldown",
            Self::DailyQuota => "daily_quota",
            Self::MonthlyQuota => "monthly_quota",
            Self::Dormant => "dormant",
            Self::Unclaimed => "unclaimed",
        }
    }
}

impl std::fmt::Display for Exclusion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn provider_department(provider: &Provider) -> Option<String> {
    provider
        .department
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|d| d.to_ascii_uppercase())
        .or_else(|| provider.postal_code.as_deref().and_then(department_from_postal_code))
}

fn same_city(a: Option<&str>, b: Option<&str>) -> bool {
    match (a.map(normalize), b.map(normalize)) {
        (Some(a), Some(b)) => !a.is_empty() && a == b,
        _ => false,
    }
}

/// Geographic rule. Returns the distance when it could be computed.
fn check_area(
    lead: &Lead,
    config: &MatchingConfig,
    provider: &Provider,
) -> Result<Option<f64>, Exclusion> {
    let lead_department = lead
        .postal_code
        .as_deref()
        .and_then(department_from_postal_code);
    let provider_department = provider_department(provider);

    if config.require_same_department
        && let Some(lead_department) = &lead_department
        && provider_department.as_ref() != Some(lead_department)
    {
        return Err(Exclusion::Department);
    }

    if let (Some(from), Some(to)) = (lead.coordinates(), provider.coordinates()) {
        let distance = haversine_km(from, to);
        let radius = provider
            .service_radius_km
            .filter(|r| *r > 0.0)
            .unwrap_or(f64::from(config.geo_radius_km));
        return if distance <= radius {
            Ok(Some(distance))
        } else {
            Err(Exclusion::OutOfArea)
        };
    }

    let same_department = matches!(
        (&lead_department, &provider_department),
        (Some(a), Some(b)) if a == b
    );
    if same_city(lead.city.as_deref(), provider.city.as_deref()) || same_department {
        Ok(None)
    } else {
        Err(Exclusion::OutOfArea)
    }
}

/// Apply every per-provider rule to one provider.
///
/// The claimed-profile preference depends on the whole candidate set and is
/// applied by [`find_candidates`] only.
pub fn evaluate_provider(
    lead: &Lead,
    config: &MatchingConfig,
    provider: &Provider,
    load: Option<&ProviderLoad>,
    now: DateTime<Utc>,
) -> Result<Candidate, Exclusion> {
    if !provider.is_active {
        return Err(Exclusion::Inactive);
    }

    if config.require_specialty_match {
        let query = SpecialtyQuery {
            service_name: &lead.service_name,
            lead_category: lead.category.as_deref(),
            specialty: &provider.specialty,
            provider_category: provider.category.as_deref(),
        };
        if !specialty_matches(config.specialty_match_mode, query) {
            return Err(Exclusion::Specialty);
        }
    }

    let distance_km = check_area(lead, config, provider)?;

    // Providers without reviews have no meaningful average yet.
    if config.min_rating > 0.0
        && provider.review_count > 0
        && provider.rating_average < config.min_rating
    {
        return Err(Exclusion::Rating);
    }

    if config.require_verified_urgent && lead.urgency() == Urgency::Urgent && !provider.is_verified
    {
        return Err(Exclusion::Unverified);
    }

    let load = load.cloned().unwrap_or_default();
    if let Some(reason) = config.quota_policy().check(&load, now) {
        return Err(match reason {
            SkipReason::Cooldown => Exclusion::Cooldown,
            SkipReason::MonthlyQuota => Exclusion::MonthlyQuota,
            _ => Exclusion::DailyQuota,
        });
    }

    if config.exclude_inactive_days > 0 {
        let last_seen = provider.last_active_at.unwrap_or(provider.created_at);
        let limit = chrono::Duration::days(i64::from(config.exclude_inactive_days));
        if now.signed_duration_since(last_seen) > limit {
            return Err(Exclusion::Dormant);
        }
    }

    Ok(Candidate {
        provider: provider.clone(),
        distance_km,
        last_assigned_at: load.last_assigned_at,
    })
}

/// Filter `providers` down to the ones eligible for `lead` at `now`.
///
/// `loads` holds assignment counters keyed by provider id; providers missing
/// from it have never been assigned. The result keeps the input order.
pub fn find_candidates(
    lead: &Lead,
    config: &MatchingConfig,
    providers: &[Provider],
    loads: &HashMap<String, ProviderLoad>,
    now: DateTime<Utc>,
) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = providers
        .iter()
        .filter_map(|provider| {
            match evaluate_provider(lead, config, provider, loads.get(&provider.id), now) {
                Ok(candidate) => Some(candidate),
                Err(reason) => {
                    debug!(
                        lead_id = %lead.id,
                        provider_id = %provider.id,
                        %reason,
                        "provider excluded"
                    );
                    None
                }
            }
        })
        .collect();

    if config.prefer_claimed && candidates.iter().any(|c| c.provider.is_claimed) {
        candidates.retain(|c| {
            if !c.provider.is_claimed {
                debug!(
                    lead_id = %lead.id,
                    provider_id = %c.provider.id,
                    reason = %Exclusion::Unclaimed,
                    "provider excluded"
                );
            }
            c.provider.is_claimed
        });
    }

    debug!(lead_id = %lead.id, count = candidates.len(), "eligible candidates");
    candidates
}

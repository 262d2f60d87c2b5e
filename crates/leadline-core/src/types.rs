// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common domain types shared across the Leadline workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Normalized two-level urgency used by eligibility rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Normal,
    Urgent,
}

/// Four-level urgency tier used for score multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UrgencyTier {
    Low,
    Medium,
    High,
    Emergency,
}

impl UrgencyTier {
    /// Map a raw intake value onto a tier.
    ///
    /// Intake forms send `flexible`, `normal` or `urgent`; older forms also
    /// send the tier names directly or `tres_urgent`. Anything else is
    /// treated as a regular request.
    pub fn from_intake(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "flexible" | "low" => Self::Low,
            "urgent" | "high" => Self::High,
            "emergency" | "tres_urgent" | "très_urgent" => Self::Emergency,
            _ => Self::Medium,
        }
    }

    /// Collapse the tier onto the two-level urgency.
    pub fn urgency(self) -> Urgency {
        match self {
            Self::Low | Self::Medium => Urgency::Normal,
            Self::High | Self::Emergency => Urgency::Urgent,
        }
    }
}

/// Lead lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    Pending,
    Dispatched,
    Viewed,
    Quoted,
    Declined,
    Accepted,
    Completed,
    Expired,
}

impl LeadStatus {
    /// Closed leads are never dispatched, expired or reassigned again.
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Accepted | Self::Completed | Self::Expired)
    }
}

/// Assignment status as driven by provider actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Pending,
    Viewed,
    Quoted,
    Declined,
}

/// Lifecycle event kinds recorded in the lead timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Created,
    Dispatched,
    Viewed,
    Quoted,
    Declined,
    Accepted,
    Refused,
    Completed,
    Expired,
    Reassigned,
}

/// A client's service request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    /// Requested service, as typed or picked by the client.
    pub service_name: String,
    /// Parent category when the intake form provides one.
    pub category: Option<String>,
    pub description: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub urgency_tier: UrgencyTier,
    pub status: LeadStatus,
    /// Intake path that created the lead.
    pub source_table: String,
    pub client_name: Option<String>,
    pub client_email: Option<String>,
    pub client_phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    pub fn urgency(&self) -> Urgency {
        self.urgency_tier.urgency()
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }
}

/// Input accepted from the intake path before a lead is persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewLead {
    pub service_name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Raw urgency value from the form (`flexible`, `normal`, `urgent`, ...).
    #[serde(default)]
    pub urgency: Option<String>,
    #[serde(default)]
    pub source_table: Option<String>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub client_email: Option<String>,
    #[serde(default)]
    pub client_phone: Option<String>,
}

impl NewLead {
    /// Build a pending lead with a fresh identifier.
    pub fn into_lead(self, default_source: &str, now: DateTime<Utc>) -> Lead {
        Lead {
            id: uuid::Uuid::new_v4().to_string(),
            service_name: self.service_name,
            category: self.category,
            description: self.description,
            postal_code: self.postal_code,
            city: self.city,
            latitude: self.latitude,
            longitude: self.longitude,
            urgency_tier: self
                .urgency
                .as_deref()
                .map(UrgencyTier::from_intake)
                .unwrap_or(UrgencyTier::Medium),
            status: LeadStatus::Pending,
            source_table: self
                .source_table
                .unwrap_or_else(|| default_source.to_string()),
            client_name: self.client_name,
            client_email: self.client_email,
            client_phone: self.client_phone,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Overrides supplied by the caller of `dispatch`, since the lead row may be
/// incomplete at call time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchHints {
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub urgency: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl DispatchHints {
    /// Overlay the hints on a lead. Present hint values win.
    pub fn apply(&self, lead: &mut Lead) {
        if let Some(service) = self.service_name.as_ref().filter(|s| !s.trim().is_empty()) {
            lead.service_name = service.clone();
        }
        if let Some(category) = &self.category {
            lead.category = Some(category.clone());
        }
        if let Some(city) = &self.city {
            lead.city = Some(city.clone());
        }
        if let Some(postal_code) = &self.postal_code {
            lead.postal_code = Some(postal_code.clone());
        }
        if let Some(urgency) = &self.urgency {
            lead.urgency_tier = UrgencyTier::from_intake(urgency);
        }
        if let (Some(lat), Some(lon)) = (self.latitude, self.longitude) {
            lead.latitude = Some(lat);
            lead.longitude = Some(lon);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.service_name.is_none()
            && self.category.is_none()
            && self.city.is_none()
            && self.postal_code.is_none()
            && self.urgency.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
    }
}

/// A provider (artisan) record as exposed by the provider directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    pub name: String,
    pub specialty: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Overrides the configured radius for this provider when set.
    #[serde(default)]
    pub service_radius_km: Option<f64>,
    pub is_active: bool,
    pub is_verified: bool,
    #[serde(default)]
    pub is_claimed: bool,
    /// Average review rating, 0 to 5.
    pub rating_average: f64,
    pub review_count: u32,
    /// Profile completeness signal, 0 to 100.
    pub data_quality: f64,
    #[serde(default)]
    pub last_active_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Provider {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }
}

/// A (lead, provider) pairing created by dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: String,
    pub lead_id: String,
    pub provider_id: String,
    /// Identifier of the dispatch batch that created the row.
    pub dispatch_id: String,
    pub status: AssignmentStatus,
    pub assigned_at: DateTime<Utc>,
    pub viewed_at: Option<DateTime<Utc>>,
    pub score: f64,
    pub distance_km: Option<f64>,
    /// 1-based rank within the batch.
    pub position: u32,
    pub source_table: String,
    pub updated_at: DateTime<Utc>,
}

/// An immutable lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadEvent {
    pub id: String,
    /// Insertion order, used to break `created_at` ties.
    pub seq: i64,
    pub lead_id: String,
    pub event_type: EventType,
    pub metadata: serde_json::Value,
    pub actor_id: Option<String>,
    pub provider_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Optional attributes attached to a logged event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventContext {
    pub actor_id: Option<String>,
    pub provider_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl EventContext {
    /// A system-triggered event with no actor.
    pub fn system() -> Self {
        Self::default()
    }

    pub fn actor(actor_id: impl Into<String>) -> Self {
        Self {
            actor_id: Some(actor_id.into()),
            ..Self::default()
        }
    }

    pub fn with_provider(mut self, provider_id: impl Into<String>) -> Self {
        self.provider_id = Some(provider_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Assignment counters for one provider, relative to a reference instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderLoad {
    pub last_assigned_at: Option<DateTime<Utc>>,
    /// Assignments since 00:00 UTC of the reference day.
    pub assigned_today: u32,
    /// Assignments since the first day of the reference month (UTC).
    pub assigned_this_month: u32,
}

/// Cooldown and quota limits applied when reserving an assignment.
///
/// A zero quota means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaPolicy {
    pub cooldown_minutes: u32,
    pub daily_quota: u32,
    pub monthly_quota: u32,
}

impl QuotaPolicy {
    /// Returns the first limit the given load violates at `now`, if any.
    pub fn check(&self, load: &ProviderLoad, now: DateTime<Utc>) -> Option<SkipReason> {
        if self.cooldown_minutes > 0
            && let Some(last) = load.last_assigned_at
            && now.signed_duration_since(last)
                < chrono::Duration::minutes(i64::from(self.cooldown_minutes))
        {
            return Some(SkipReason::Cooldown);
        }
        if self.daily_quota > 0 && load.assigned_today >= self.daily_quota {
            return Some(SkipReason::DailyQuota);
        }
        if self.monthly_quota > 0 && load.assigned_this_month >= self.monthly_quota {
            return Some(SkipReason::MonthlyQuota);
        }
        None
    }
}

/// Why a provider could not be reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    AlreadyAssigned,
    Cooldown,
    DailyQuota,
    MonthlyQuota,
    BatchFull,
}

/// A request to atomically check limits and insert one assignment.
#[derive(Debug, Clone)]
pub struct ReservationRequest {
    pub lead_id: String,
    pub provider_id: String,
    pub dispatch_id: String,
    pub score: f64,
    pub distance_km: Option<f64>,
    pub source_table: String,
    pub policy: QuotaPolicy,
    /// Maximum number of rows the batch may hold.
    pub batch_limit: u32,
    pub at: DateTime<Utc>,
}

/// Result of a reservation attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ReservationOutcome {
    Reserved(Assignment),
    Skipped(SkipReason),
}

/// A request to move an assignment to another provider.
#[derive(Debug, Clone)]
pub struct ReassignRequest {
    pub assignment_id: String,
    pub new_provider_id: String,
    pub policy: QuotaPolicy,
    pub at: DateTime<Utc>,
}

/// Result of a reassignment attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ReassignOutcome {
    Reassigned {
        previous_provider_id: String,
        assignment: Assignment,
    },
    Rejected(SkipReason),
    Missing,
}

/// Assignment counts by status, for the admin console.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: u64,
    pub viewed: u64,
    pub quoted: u64,
    pub declined: u64,
    pub total: u64,
}

/// The persisted matching configuration row, as raw JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredConfig {
    pub payload: String,
    pub updated_by: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// A write of the matching configuration row plus its audit entry.
#[derive(Debug, Clone)]
pub struct ConfigUpdate {
    /// Full merged configuration, serialized as JSON.
    pub payload: String,
    /// The patch as submitted, serialized as JSON.
    pub patch: String,
    pub changed_fields: Vec<String>,
    pub actor_id: String,
    pub at: DateTime<Utc>,
    /// Stored payload the merge started from, `None` when no row existed.
    pub expected_payload: Option<String>,
}

/// One entry of the configuration audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigAuditEntry {
    pub id: i64,
    pub actor_id: String,
    pub changed_fields: Vec<String>,
    pub patch: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn intake_urgency_normalizes_to_two_levels() {
        assert_eq!(UrgencyTier::from_intake("flexible").urgency(), Urgency::Normal);
        assert_eq!(UrgencyTier::from_intake("normal").urgency(), Urgency::Normal);
        assert_eq!(UrgencyTier::from_intake("URGENT").urgency(), Urgency::Urgent);
        assert_eq!(UrgencyTier::from_intake("emergency"), UrgencyTier::Emergency);
        assert_eq!(UrgencyTier::from_intake("whenever"), UrgencyTier::Medium);
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [
            LeadStatus::Pending,
            LeadStatus::Dispatched,
            LeadStatus::Accepted,
            LeadStatus::Expired,
        ] {
            assert_eq!(LeadStatus::from_str(&status.to_string()).unwrap(), status);
        }
        assert_eq!(EventType::Reassigned.to_string(), "reassigned");
        assert_eq!(SkipReason::DailyQuota.to_string(), "daily_quota");
    }

    #[test]
    fn closed_statuses() {
        assert!(LeadStatus::Accepted.is_closed());
        assert!(LeadStatus::Completed.is_closed());
        assert!(LeadStatus::Expired.is_closed());
        assert!(!LeadStatus::Declined.is_closed());
        assert!(!LeadStatus::Pending.is_closed());
    }

    #[test]
    fn hints_override_lead_fields() {
        let now = ts("2026-03-01T10:00:00Z");
        let mut lead = NewLead {
            service_name: "plomberie".into(),
            city: Some("Lyon".into()),
            ..NewLead::default()
        }
        .into_lead("leads", now);

        let hints = DispatchHints {
            service_name: Some("electricite".into()),
            urgency: Some("urgent".into()),
            latitude: Some(45.76),
            longitude: Some(4.84),
            ..DispatchHints::default()
        };
        hints.apply(&mut lead);

        assert_eq!(lead.service_name, "electricite");
        assert_eq!(lead.city.as_deref(), Some("Lyon"));
        assert_eq!(lead.urgency(), Urgency::Urgent);
        assert_eq!(lead.coordinates(), Some((45.76, 4.84)));
        assert!(!hints.is_empty());
        assert!(DispatchHints::default().is_empty());
    }

    #[test]
    fn half_coordinate_hint_is_ignored() {
        let now = ts("2026-03-01T10:00:00Z");
        let mut lead = NewLead {
            service_name: "peinture".into(),
            ..NewLead::default()
        }
        .into_lead("leads", now);
        DispatchHints {
            latitude: Some(48.85),
            ..DispatchHints::default()
        }
        .apply(&mut lead);
        assert_eq!(lead.coordinates(), None);
    }

    #[test]
    fn cooldown_boundary_is_inclusive_of_elapsed_time() {
        let policy = QuotaPolicy {
            cooldown_minutes: 60,
            daily_quota: 0,
            monthly_quota: 0,
        };
        let load = ProviderLoad {
            last_assigned_at: Some(ts("2026-03-01T10:00:00Z")),
            assigned_today: 1,
            assigned_this_month: 1,
        };
        assert_eq!(
            policy.check(&load, ts("2026-03-01T10:30:00Z")),
            Some(SkipReason::Cooldown)
        );
        assert_eq!(policy.check(&load, ts("2026-03-01T11:00:00Z")), None);
        assert_eq!(policy.check(&load, ts("2026-03-01T11:01:00Z")), None);
    }

    #[test]
    fn zero_quota_means_unlimited() {
        let policy = QuotaPolicy {
            cooldown_minutes: 0,
            daily_quota: 0,
            monthly_quota: 0,
        };
        let load = ProviderLoad {
            last_assigned_at: None,
            assigned_today: 500,
            assigned_this_month: 9000,
        };
        assert_eq!(policy.check(&load, Utc::now()), None);
    }

    #[test]
    fn quota_limits_are_exclusive() {
        let policy = QuotaPolicy {
            cooldown_minutes: 0,
            daily_quota: 2,
            monthly_quota: 10,
        };
        let mut load = ProviderLoad {
            last_assigned_at: None,
            assigned_today: 1,
            assigned_this_month: 9,
        };
        assert_eq!(policy.check(&load, Utc::now()), None);
        load.assigned_today = 2;
        assert_eq!(policy.check(&load, Utc::now()), Some(SkipReason::DailyQuota));
        load.assigned_today = 0;
        load.assigned_this_month = 10;
        assert_eq!(
            policy.check(&load, Utc::now()),
            Some(SkipReason::MonthlyQuota)
        );
    }
}

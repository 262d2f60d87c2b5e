// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tunable matching parameters and their validation rules.
//!
//! [`MatchingConfig`] is the singleton row the dispatch engine reads before
//! every dispatch. Admin updates arrive as partial JSON objects and go
//! through [`MatchingConfig::apply_patch`], which rejects unknown fields,
//! checks every present field against [`FIELDS`] and reports all failures
//! together.

use leadline_core::{FieldError, QuotaPolicy, UrgencyTier};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use crate::diagnostic::suggest_key;

/// Ranking strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MatchingStrategy {
    Scored,
    RoundRobin,
    Geographic,
    /// A stored value this build does not recognize. Ranked as `scored`.
    #[serde(other)]
    Unknown,
}

/// How a lead's service is compared with a provider's specialty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SpecialtyMatchMode {
    Exact,
    Fuzzy,
    Category,
}

/// The matching configuration singleton.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchingConfig {
    pub matching_strategy: MatchingStrategy,
    pub max_artisans_per_lead: u32,
    pub geo_radius_km: u32,
    pub weight_rating: u32,
    pub weight_reviews: u32,
    pub weight_verified: u32,
    pub weight_proximity: u32,
    pub weight_data_quality: u32,
    /// Minimum minutes between two assignments to the same provider.
    pub cooldown_minutes: u32,
    /// Per-provider cap since 00:00 UTC. Zero disables the cap.
    pub daily_lead_quota: u32,
    /// Per-provider cap since the first of the month (UTC). Zero disables the cap.
    pub monthly_lead_quota: u32,
    /// Providers idle for longer are skipped. Zero disables the rule.
    pub exclude_inactive_days: u32,
    pub min_rating: f64,
    pub require_verified_urgent: bool,
    pub specialty_match_mode: SpecialtyMatchMode,
    pub require_specialty_match: bool,
    pub require_same_department: bool,
    pub urgency_low_multiplier: f64,
    pub urgency_medium_multiplier: f64,
    pub urgency_high_multiplier: f64,
    pub urgency_emergency_multiplier: f64,
    pub prefer_claimed: bool,
    pub lead_expiry_hours: u32,
    pub quote_expiry_hours: u32,
    pub auto_reassign_hours: u32,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            matching_strategy: MatchingStrategy::Scored,
            max_artisans_per_lead: 3,
            geo_radius_km: 50,
            weight_rating: 30,
            weight_reviews: 15,
            weight_verified: 20,
            weight_proximity: 25,
            weight_data_quality: 10,
            cooldown_minutes: 30,
            daily_lead_quota: 0,
            monthly_lead_quota: 0,
            exclude_inactive_days: 90,
            min_rating: 0.0,
            require_verified_urgent: false,
            specialty_match_mode: SpecialtyMatchMode::Category,
            require_specialty_match: true,
            require_same_department: false,
            urgency_low_multiplier: 1.0,
            urgency_medium_multiplier: 1.0,
            urgency_high_multiplier: 1.5,
            urgency_emergency_multiplier: 2.0,
            prefer_claimed: true,
            lead_expiry_hours: 48,
            quote_expiry_hours: 72,
            auto_reassign_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum FieldKind {
    Integer { min: i64, max: i64 },
    Number { min: f64, max: f64, min_exclusive: bool },
    Boolean,
    Choice(&'static [&'static str]),
}

/// An updatable field and its accepted values.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    kind: FieldKind,
}

const fn int(name: &'static str, min: i64, max: i64) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Integer { min, max },
    }
}

const fn multiplier(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Number {
            min: 0.0,
            max: 10.0,
            min_exclusive: true,
        },
    }
}

const fn flag(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Boolean,
    }
}

/// Every field of [`MatchingConfig`] with its bounds.
pub const FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "matching_strategy",
        kind: FieldKind::Choice(&["scored", "round_robin", "geographic"]),
    },
    int("max_artisans_per_lead", 1, 20),
    int("geo_radius_km", 1, 500),
    int("weight_rating", 0, 100),
    int("weight_reviews", 0, 100),
    int("weight_verified", 0, 100),
    int("weight_proximity", 0, 100),
    int("weight_data_quality", 0, 100),
    int("cooldown_minutes", 0, 1440),
    int("daily_lead_quota", 0, 1000),
    int("monthly_lead_quota", 0, 10_000),
    int("exclude_inactive_days", 0, 365),
    FieldSpec {
        name: "min_rating",
        kind: FieldKind::Number {
            min: 0.0,
            max: 5.0,
            min_exclusive: false,
        },
    },
    flag("require_verified_urgent"),
    FieldSpec {
        name: "specialty_match_mode",
        kind: FieldKind::Choice(&["exact", "fuzzy", "category"]),
    },
    flag("require_specialty_match"),
    flag("require_same_department"),
    multiplier("urgency_low_multiplier"),
    multiplier("urgency_medium_multiplier"),
    multiplier("urgency_high_multiplier"),
    multiplier("urgency_emergency_multiplier"),
    flag("prefer_claimed"),
    int("lead_expiry_hours", 1, 720),
    int("quote_expiry_hours", 1, 720),
    int("auto_reassign_hours", 1, 720),
];

/// Names of all updatable fields, in declaration order.
pub fn field_names() -> Vec<&'static str> {
    FIELDS.iter().map(|f| f.name).collect()
}

impl FieldSpec {
    fn check(&self, value: &Value) -> Result<(), String> {
        match self.kind {
            FieldKind::Integer { min, max } => match value.as_i64() {
                Some(n) if (min..=max).contains(&n) => Ok(()),
                _ => Err(format!("must be an integer between {min} and {max}")),
            },
            FieldKind::Number {
                min,
                max,
                min_exclusive,
            } => {
                let in_range = value.as_f64().is_some_and(|n| {
                    n.is_finite() && n <= max && if min_exclusive { n > min } else { n >= min }
                });
                match (in_range, min_exclusive) {
                    (true, _) => Ok(()),
                    (false, true) => Err(format!(
                        "must be a number greater than {min} and at most {max}"
                    )),
                    (false, false) => Err(format!("must be a number between {min} and {max}")),
                }
            }
            FieldKind::Boolean => {
                if value.is_boolean() {
                    Ok(())
                } else {
                    Err("must be true or false".to_string())
                }
            }
            FieldKind::Choice(choices) => match value.as_str() {
                Some(s) if choices.contains(&s) => Ok(()),
                _ => Err(format!("must be one of: {}", choices.join(", "))),
            },
        }
    }
}

/// A validated, merged configuration ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchOutcome {
    pub config: MatchingConfig,
    /// Fields present in the patch, sorted.
    pub changed_fields: Vec<String>,
}

impl MatchingConfig {
    /// Merge a partial update into this configuration.
    ///
    /// The patch must be a non-empty JSON object. Unknown keys and invalid
    /// values are all reported; on any error nothing is merged.
    pub fn apply_patch(&self, patch: &Value) -> Result<PatchOutcome, Vec<FieldError>> {
        let Some(entries) = patch.as_object() else {
            return Err(vec![FieldError::new("patch", "must be a JSON object")]);
        };
        if entries.is_empty() {
            return Err(vec![FieldError::new("patch", "contains no fields")]);
        }

        let names = field_names();
        let mut errors = Vec::new();
        for (key, value) in entries {
            match FIELDS.iter().find(|f| f.name == key) {
                Some(spec) => {
                    if let Err(message) = spec.check(value) {
                        errors.push(FieldError::new(key.as_str(), message));
                    }
                }
                None => {
                    let message = match suggest_key(key, &names) {
                        Some(s) => format!("unknown field, did you mean `{s}`?"),
                        None => "unknown field".to_string(),
                    };
                    errors.push(FieldError::new(key.as_str(), message));
                }
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        let mut merged = serde_json::to_value(self)
            .map_err(|e| vec![FieldError::new("patch", e.to_string())])?;
        if let Some(target) = merged.as_object_mut() {
            for (key, value) in entries {
                target.insert(key.clone(), value.clone());
            }
        }
        let config: MatchingConfig = serde_json::from_value(merged)
            .map_err(|e| vec![FieldError::new("patch", e.to_string())])?;

        let errors = config.validate();
        if !errors.is_empty() {
            return Err(errors);
        }

        let mut changed_fields: Vec<String> = entries.keys().cloned().collect();
        changed_fields.sort();
        Ok(PatchOutcome {
            config,
            changed_fields,
        })
    }

    /// Range-check every field. Enumerations are already typed and are not
    /// re-checked here, so an unrecognized stored strategy passes.
    pub fn validate(&self) -> Vec<FieldError> {
        let Ok(Value::Object(values)) = serde_json::to_value(self) else {
            return vec![FieldError::new("config", "cannot be represented as JSON")];
        };
        FIELDS
            .iter()
            .filter(|spec| !matches!(spec.kind, FieldKind::Choice(_)))
            .filter_map(|spec| {
                let value = values.get(spec.name).unwrap_or(&Value::Null);
                spec.check(value)
                    .err()
                    .map(|message| FieldError::new(spec.name, message))
            })
            .collect()
    }

    /// Parse and validate a stored configuration payload.
    pub fn from_stored(payload: &str) -> Result<Self, String> {
        let config: MatchingConfig =
            serde_json::from_str(payload).map_err(|e| format!("unparsable row: {e}"))?;
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "))
        }
    }

    pub fn quota_policy(&self) -> QuotaPolicy {
        QuotaPolicy {
            cooldown_minutes: self.cooldown_minutes,
            daily_quota: self.daily_lead_quota,
            monthly_quota: self.monthly_lead_quota,
        }
    }

    /// Score multiplier for a lead's urgency tier.
    pub fn urgency_multiplier(&self, tier: UrgencyTier) -> f64 {
        match tier {
            UrgencyTier::Low => self.urgency_low_multiplier,
            UrgencyTier::Medium => self.urgency_medium_multiplier,
            UrgencyTier::High => self.urgency_high_multiplier,
            UrgencyTier::Emergency => self.urgency_emergency_multiplier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_pass_validation() {
        assert!(MatchingConfig::default().validate().is_empty());
    }

    #[test]
    fn every_field_has_a_spec() {
        let value = serde_json::to_value(MatchingConfig::default()).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys.len(), FIELDS.len());
        for key in keys {
            assert!(field_names().contains(&key), "{key} has no field spec");
        }
    }

    #[test]
    fn patch_merges_only_given_fields() {
        let base = MatchingConfig::default();
        let outcome = base
            .apply_patch(&json!({
                "max_artisans_per_lead": 5,
                "matching_strategy": "geographic",
                "urgency_high_multiplier": 3.5
            }))
            .unwrap();

        assert_eq!(outcome.config.max_artisans_per_lead, 5);
        assert_eq!(outcome.config.matching_strategy, MatchingStrategy::Geographic);
        assert_eq!(outcome.config.urgency_high_multiplier, 3.5);
        assert_eq!(outcome.config.geo_radius_km, base.geo_radius_km);
        assert_eq!(
            outcome.changed_fields,
            vec![
                "matching_strategy",
                "max_artisans_per_lead",
                "urgency_high_multiplier"
            ]
        );
    }

    #[test]
    fn patch_reports_all_failures_together() {
        let errors = MatchingConfig::default()
            .apply_patch(&json!({
                "weight_rating": 101,
                "urgency_low_multiplier": 0,
                "max_artisans_per_lead": 2.5,
                "matching_strategy": "random",
                "prefer_claimed": "yes",
                "cooldown_minute": 10
            }))
            .unwrap_err();

        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(errors.len(), 6, "{errors:?}");
        assert!(fields.contains(&"weight_rating"));
        assert!(fields.contains(&"urgency_low_multiplier"));
        assert!(fields.contains(&"max_artisans_per_lead"));
        assert!(fields.contains(&"matching_strategy"));
        assert!(fields.contains(&"prefer_claimed"));

        let unknown = errors.iter().find(|e| e.field == "cooldown_minute").unwrap();
        assert!(unknown.message.contains("did you mean `cooldown_minutes`"));
    }

    #[test]
    fn multiplier_upper_bound_is_inclusive() {
        let base = MatchingConfig::default();
        assert!(base.apply_patch(&json!({"urgency_emergency_multiplier": 10})).is_ok());
        assert!(base.apply_patch(&json!({"urgency_emergency_multiplier": 10.01})).is_err());
    }

    #[test]
    fn non_object_and_empty_patches_rejected() {
        let base = MatchingConfig::default();
        assert_eq!(base.apply_patch(&json!([1, 2])).unwrap_err()[0].field, "patch");
        assert_eq!(base.apply_patch(&json!({})).unwrap_err()[0].field, "patch");
    }

    #[test]
    fn stored_unknown_strategy_is_kept_for_fallback() {
        let mut value = serde_json::to_value(MatchingConfig::default()).unwrap();
        value["matching_strategy"] = json!("weighted_lottery");
        let config = MatchingConfig::from_stored(&value.to_string()).unwrap();
        assert_eq!(config.matching_strategy, MatchingStrategy::Unknown);
    }

    #[test]
    fn stored_row_with_missing_fields_uses_defaults() {
        let config = MatchingConfig::from_stored(r#"{"max_artisans_per_lead": 7}"#).unwrap();
        assert_eq!(config.max_artisans_per_lead, 7);
        assert_eq!(config.weight_rating, 30);
    }

    #[test]
    fn stored_row_out_of_range_is_rejected() {
        let err = MatchingConfig::from_stored(r#"{"geo_radius_km": 0}"#).unwrap_err();
        assert!(err.contains("geo_radius_km"));
        assert!(MatchingConfig::from_stored("not json").is_err());
    }

    #[test]
    fn multipliers_follow_tiers() {
        let config = MatchingConfig::default();
        assert_eq!(config.urgency_multiplier(UrgencyTier::Medium), 1.0);
        assert_eq!(config.urgency_multiplier(UrgencyTier::Emergency), 2.0);
        assert_eq!(config.quota_policy().cooldown_minutes, 30);
    }
}

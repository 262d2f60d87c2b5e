// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Candidate ranking strategies.
//!
//! Every strategy is deterministic: equal inputs give equal output, and
//! remaining ties are broken by provider id ascending.

use std::cmp::Ordering;

use leadline_config::{MatchingConfig, MatchingStrategy};
use leadline_core::{Lead, Provider};
use tracing::warn;

use crate::eligibility::Candidate;

/// A candidate with its final score.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub provider: Provider,
    pub score: f64,
    pub distance_km: Option<f64>,
}

/// Orders eligible candidates for one lead.
pub trait RankingStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Best candidate first.
    fn rank(
        &self,
        candidates: Vec<Candidate>,
        lead: &Lead,
        config: &MatchingConfig,
    ) -> Vec<RankedCandidate>;
}

fn effective_radius(provider: &Provider, config: &MatchingConfig) -> f64 {
    provider
        .service_radius_km
        .filter(|r| *r > 0.0)
        .unwrap_or(f64::from(config.geo_radius_km))
}

/// `1 - d / radius`, clamped to `[0, 1]`; zero when the distance is unknown.
pub fn proximity_component(distance_km: Option<f64>, radius_km: f64) -> f64 {
    match distance_km {
        Some(d) if radius_km > 0.0 => 1.0 - (d / radius_km).clamp(0.0, 1.0),
        _ => 0.0,
    }
}

/// Review volume on a log scale, saturating at 100 reviews.
pub fn reviews_component(review_count: u32) -> f64 {
    ((1.0 + f64::from(review_count)).ln() / 101f64.ln()).min(1.0)
}

fn by_provider_id(a: &RankedCandidate, b: &RankedCandidate) -> Ordering {
    a.provider.id.cmp(&b.provider.id)
}

/// Weighted sum of normalized provider signals, times the urgency multiplier.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoredStrategy;

impl ScoredStrategy {
    pub fn score(candidate: &Candidate, lead: &Lead, config: &MatchingConfig) -> f64 {
        let p = &candidate.provider;
        let weighted = [
            (config.weight_rating, (p.rating_average / 5.0).clamp(0.0, 1.0)),
            (config.weight_reviews, reviews_component(p.review_count)),
            (config.weight_verified, if p.is_verified { 1.0 } else { 0.0 }),
            (
                config.weight_proximity,
                proximity_component(candidate.distance_km, effective_radius(p, config)),
            ),
            (config.weight_data_quality, (p.data_quality / 100.0).clamp(0.0, 1.0)),
        ];

        let total_weight: u32 = weighted.iter().map(|(w, _)| w).sum();
        if total_weight == 0 {
            return 0.0;
        }
        let sum: f64 = weighted.iter().map(|(w, s)| f64::from(*w) * s).sum();
        sum / f64::from(total_weight) * config.urgency_multiplier(lead.urgency_tier)
    }
}

impl RankingStrategy for ScoredStrategy {
    fn name(&self) -> &'static str {
        "scored"
    }

    fn rank(
        &self,
        candidates: Vec<Candidate>,
        lead: &Lead,
        config: &MatchingConfig,
    ) -> Vec<RankedCandidate> {
        let mut ranked: Vec<RankedCandidate> = candidates
            .into_iter()
            .map(|c| RankedCandidate {
                score: Self::score(&c, lead, config),
                distance_km: c.distance_km,
                provider: c.provider,
            })
            .collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| by_provider_id(a, b)));
        ranked
    }
}

/// Least recently assigned first; never-assigned providers lead.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundRobinStrategy;

impl RankingStrategy for RoundRobinStrategy {
    fn name(&self) -> &'static str {
        "round_robin"
    }

    fn rank(
        &self,
        mut candidates: Vec<Candidate>,
        _lead: &Lead,
        _config: &MatchingConfig,
    ) -> Vec<RankedCandidate> {
        // `None < Some(_)`, so never-assigned providers sort first.
        candidates.sort_by(|a, b| {
            a.last_assigned_at
                .cmp(&b.last_assigned_at)
                .then_with(|| a.provider.id.cmp(&b.provider.id))
        });
        candidates
            .into_iter()
            .map(|c| RankedCandidate {
                provider: c.provider,
                score: 0.0,
                distance_km: c.distance_km,
            })
            .collect()
    }
}

/// Nearest first; unknown distances last, then rating.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeographicStrategy;

impl RankingStrategy for GeographicStrategy {
    fn name(&self) -> &'static str {
        "geographic"
    }

    fn rank(
        &self,
        candidates: Vec<Candidate>,
        _lead: &Lead,
        config: &MatchingConfig,
    ) -> Vec<RankedCandidate> {
        let mut ranked: Vec<RankedCandidate> = candidates
            .into_iter()
            .map(|c| RankedCandidate {
                score: proximity_component(c.distance_km, effective_radius(&c.provider, config)),
                distance_km: c.distance_km,
                provider: c.provider,
            })
            .collect();
        ranked.sort_by(|a, b| {
            let by_distance = match (a.distance_km, b.distance_km) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            by_distance
                .then_with(|| {
                    b.provider
                        .rating_average
                        .total_cmp(&a.provider.rating_average)
                })
                .then_with(|| by_provider_id(a, b))
        });
        ranked
    }
}

/// The strategy implementation for a configured strategy value.
///
/// Unrecognized values come from hand-edited or newer rows and fall back to
/// the weighted score.
pub fn strategy_for(strategy: MatchingStrategy) -> Box<dyn RankingStrategy> {
    match strategy {
        MatchingStrategy::Scored => Box::new(ScoredStrategy),
        MatchingStrategy::RoundRobin => Box::new(RoundRobinStrategy),
        MatchingStrategy::Geographic => Box::new(GeographicStrategy),
        MatchingStrategy::Unknown => {
            warn!("unknown matching strategy in configuration, using scored");
            Box::new(ScoredStrategy)
        }
    }
}

/// Rank candidates with the strategy selected by `config`.
pub fn rank(candidates: Vec<Candidate>, lead: &Lead, config: &MatchingConfig) -> Vec<RankedCandidate> {
    strategy_for(config.matching_strategy).rank(candidates, lead, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use leadline_core::{LeadStatus, UrgencyTier};
    use proptest::prelude::*;
    use tracing_test::traced_test;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn lead(tier: UrgencyTier) -> Lead {
        Lead {
            id: "lead-1".into(),
            service_name: "plomberie".into(),
            category: None,
            description: None,
            postal_code: None,
            city: None,
            latitude: None,
            longitude: None,
            urgency_tier: tier,
            status: LeadStatus::Pending,
            source_table: "leads".into(),
            client_name: None,
            client_email: None,
            client_phone: None,
            created_at: ts("2026-03-01T00:00:00Z"),
            updated_at: ts("2026-03-01T00:00:00Z"),
        }
    }

    fn candidate(id: &str, rating: f64, reviews: u32, distance: Option<f64>) -> Candidate {
        Candidate {
            provider: Provider {
                id: id.into(),
                name: id.into(),
                specialty: "plombier".into(),
                category: None,
                city: None,
                postal_code: None,
                department: None,
                latitude: None,
                longitude: None,
                service_radius_km: None,
                is_active: true,
                is_verified: false,
                is_claimed: false,
                rating_average: rating,
                review_count: reviews,
                data_quality: 50.0,
                last_active_at: None,
                created_at: ts("2025-01-01T00:00:00Z"),
            },
            distance_km: distance,
            last_assigned_at: None,
        }
    }

    fn ids(ranked: &[RankedCandidate]) -> Vec<&str> {
        ranked.iter().map(|r| r.provider.id.as_str()).collect()
    }

    #[test]
    fn scored_formula_matches_hand_computation() {
        let config = MatchingConfig::default();
        let mut c = candidate("p-1", 4.0, 100, Some(10.0));
        c.provider.is_verified = true;
        // rating .8, reviews 1.0, verified 1.0, proximity .8, quality .5
        let expected = (30.0 * 0.8 + 15.0 + 20.0 + 25.0 * 0.8 + 10.0 * 0.5) / 100.0;
        let score = ScoredStrategy::score(&c, &lead(UrgencyTier::Medium), &config);
        assert!((score - expected).abs() < 1e-9, "got {score}");

        let urgent = ScoredStrategy::score(&c, &lead(UrgencyTier::High), &config);
        assert!((urgent - expected * 1.5).abs() < 1e-9);
    }

    #[test]
    fn zero_weights_score_zero() {
        let config = MatchingConfig {
            weight_rating: 0,
            weight_reviews: 0,
            weight_verified: 0,
            weight_proximity: 0,
            weight_data_quality: 0,
            ..MatchingConfig::default()
        };
        let c = candidate("p-1", 5.0, 50, Some(1.0));
        assert_eq!(ScoredStrategy::score(&c, &lead(UrgencyTier::Emergency), &config), 0.0);
    }

    #[test]
    fn reviews_and_proximity_components() {
        assert_eq!(reviews_component(0), 0.0);
        assert!((reviews_component(100) - 1.0).abs() < 1e-12);
        assert_eq!(reviews_component(5000), 1.0);
        assert_eq!(proximity_component(None, 50.0), 0.0);
        assert_eq!(proximity_component(Some(80.0), 50.0), 0.0);
        assert!((proximity_component(Some(25.0), 50.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn scored_ties_break_by_id() {
        let config = MatchingConfig::default();
        let ranked = ScoredStrategy.rank(
            vec![
                candidate("p-b", 4.0, 10, None),
                candidate("p-a", 4.0, 10, None),
                candidate("p-c", 4.9, 10, None),
            ],
            &lead(UrgencyTier::Medium),
            &config,
        );
        assert_eq!(ids(&ranked), vec!["p-c", "p-a", "p-b"]);
    }

    #[test]
    fn round_robin_prefers_never_assigned_then_oldest() {
        let mut recent = candidate("p-1", 5.0, 10, None);
        recent.last_assigned_at = Some(ts("2026-03-01T10:00:00Z"));
        let mut older = candidate("p-2", 1.0, 0, None);
        older.last_assigned_at = Some(ts("2026-02-01T10:00:00Z"));
        let never = candidate("p-3", 3.0, 1, None);

        let ranked = RoundRobinStrategy.rank(
            vec![recent, older, never],
            &lead(UrgencyTier::Medium),
            &MatchingConfig::default(),
        );
        assert_eq!(ids(&ranked), vec!["p-3", "p-2", "p-1"]);
        assert!(ranked.iter().all(|r| r.score == 0.0));
    }

    #[test]
    fn geographic_sorts_by_distance_with_unknown_last() {
        let ranked = GeographicStrategy.rank(
            vec![
                candidate("p-1", 4.0, 10, None),
                candidate("p-2", 4.0, 10, Some(12.0)),
                candidate("p-3", 3.0, 10, Some(2.0)),
                candidate("p-4", 4.5, 10, Some(12.0)),
            ],
            &lead(UrgencyTier::Medium),
            &MatchingConfig::default(),
        );
        assert_eq!(ids(&ranked), vec!["p-3", "p-4", "p-2", "p-1"]);
        assert!((ranked[0].score - (1.0 - 2.0 / 50.0)).abs() < 1e-12);
        assert_eq!(ranked[3].score, 0.0);
    }

    #[test]
    #[traced_test]
    fn unknown_strategy_falls_back_to_scored() {
        let strategy = strategy_for(MatchingStrategy::Unknown);
        assert_eq!(strategy.name(), "scored");
        assert!(logs_contain("unknown matching strategy"));
    }

    fn arb_candidate() -> impl Strategy<Value = Candidate> {
        (
            "[a-z]{1,6}",
            0.0f64..=5.0,
            0u32..500,
            proptest::option::of(0.0f64..200.0),
        )
            .prop_map(|(id, rating, reviews, distance)| candidate(&id, rating, reviews, distance))
    }

    proptest! {
        #[test]
        fn ranking_ignores_input_order(
            mut candidates in proptest::collection::vec(arb_candidate(), 0..12),
            strategy in prop_oneof![
                Just(MatchingStrategy::Scored),
                Just(MatchingStrategy::RoundRobin),
                Just(MatchingStrategy::Geographic),
            ],
        ) {
            candidates.sort_by(|a, b| a.provider.id.cmp(&b.provider.id));
            candidates.dedup_by(|a, b| a.provider.id == b.provider.id);
            let config = MatchingConfig { matching_strategy: strategy, ..MatchingConfig::default() };
            let lead = lead(UrgencyTier::Emergency);

            let forward = rank(candidates.clone(), &lead, &config);
            candidates.reverse();
            let backward = rank(candidates, &lead, &config);
            prop_assert_eq!(ids(&forward), ids(&backward));

            for r in &forward {
                prop_assert!(r.score >= 0.0);
                prop_assert!(r.score <= config.urgency_emergency_multiplier + 1e-9);
            }
        }
    }
}

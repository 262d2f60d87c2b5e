// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider matching for the Leadline dispatch engine.
//!
//! Pure functions over in-memory data: [`eligibility`] decides which
//! providers may receive a lead, [`scoring`] orders them. Nothing here
//! touches storage; callers load providers and their assignment counters
//! first.

pub mod eligibility;
pub mod geo;
pub mod scoring;
pub mod specialty;

pub use eligibility::{Candidate, Exclusion, evaluate_provider, find_candidates};
pub use scoring::{
    GeographicStrategy, RankedCandidate, RankingStrategy, RoundRobinStrategy, ScoredStrategy,
    rank, strategy_for,
};

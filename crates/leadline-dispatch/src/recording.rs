// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics facade; without an installed recorder every call is a
//! no-op.

use leadline_core::SkipReason;
use metrics::{describe_counter, describe_histogram};

/// Register all Leadline metric descriptions.
pub fn register_metrics() {
    describe_counter!(
        "leadline_dispatch_total",
        "Dispatch attempts by outcome"
    );
    describe_counter!(
        "leadline_assignments_written_total",
        "Assignments committed by the assignment writer"
    );
    describe_counter!(
        "leadline_candidates_skipped_total",
        "Ranked candidates skipped at reservation time, by reason"
    );
    describe_counter!(
        leadline_audit::logger::EVENT_LOG_FAILURES,
        "Lead events that could not be appended"
    );
    describe_histogram!(
        "leadline_dispatch_candidates",
        "Eligible candidates per dispatch"
    );
}

/// Record the outcome of one dispatch attempt.
pub fn record_dispatch(outcome: &'static str) {
    metrics::counter!("leadline_dispatch_total", "outcome" => outcome).increment(1);
}

pub fn record_assignments_written(count: usize) {
    metrics::counter!("leadline_assignments_written_total").increment(count as u64);
}

pub fn record_candidate_skipped(reason: SkipReason) {
    metrics::counter!("leadline_candidates_skipped_total", "reason" => reason.to_string())
        .increment(1);
}

pub fn record_dispatch_candidates(count: usize) {
    metrics::histogram!("leadline_dispatch_candidates").record(count as f64);
}

// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Advisory check of a timeline against the expected lifecycle:
//!
//! ```text
//! created -> dispatched -> {viewed, declined}* -> quoted -> {accepted, refused} -> completed
//! ```
//!
//! `expired` and `reassigned` may follow any non-terminal state. Nothing
//! enforces this order at write time; the check only flags surprises.

use leadline_core::{EventType, LeadEvent};

/// An event that does not fit the expected lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleAnomaly {
    pub seq: i64,
    pub event_type: EventType,
    pub reason: &'static str,
}

#[derive(Default)]
struct Progress {
    created: bool,
    dispatched: bool,
    quoted: bool,
    accepted: bool,
    closed: bool,
}

impl Progress {
    fn check(&self, event_type: EventType, is_first: bool) -> Option<&'static str> {
        match event_type {
            EventType::Created if !is_first => Some("created is not the first event"),
            EventType::Created => None,
            _ if self.closed => Some("event after the lead was closed"),
            EventType::Expired | EventType::Reassigned if self.accepted => {
                Some("event after the lead was closed")
            }
            EventType::Dispatched | EventType::Expired | EventType::Reassigned => None,
            _ if !self.created && !self.dispatched => Some("event before dispatch"),
            EventType::Viewed | EventType::Declined | EventType::Quoted if !self.dispatched => {
                Some("provider action before dispatch")
            }
            EventType::Accepted | EventType::Refused if !self.quoted => {
                Some("client decision without a quote")
            }
            EventType::Completed if !self.accepted => Some("completed without acceptance"),
            _ => None,
        }
    }

    fn advance(&mut self, event: &LeadEvent) {
        match event.event_type {
            EventType::Created => self.created = true,
            EventType::Dispatched if assigned_someone(event) => self.dispatched = true,
            EventType::Quoted => self.quoted = true,
            EventType::Accepted => self.accepted = true,
            EventType::Completed | EventType::Expired => self.closed = true,
            _ => {}
        }
    }
}

/// A `dispatched` event with an empty `provider_ids` records an attempt
/// that assigned nobody.
fn assigned_someone(event: &LeadEvent) -> bool {
    event.metadata["provider_ids"]
        .as_array()
        .is_none_or(|ids| !ids.is_empty())
}

/// Flag events of an ordered timeline that break the expected lifecycle.
pub fn check_timeline(events: &[LeadEvent]) -> Vec<LifecycleAnomaly> {
    let mut progress = Progress::default();
    let mut anomalies = Vec::new();
    for (i, event) in events.iter().enumerate() {
        if let Some(reason) = progress.check(event.event_type, i == 0) {
            anomalies.push(LifecycleAnomaly {
                seq: event.seq,
                event_type: event.event_type,
                reason,
            });
        }
        progress.advance(event);
    }
    anomalies
}

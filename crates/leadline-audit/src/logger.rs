// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Best-effort event appends and timeline reads.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use leadline_core::{EventContext, EventRepository, EventType, LeadEvent, LeadlineError};
use tracing::{debug, warn};

/// Counter incremented whenever an event could not be appended.
pub const EVENT_LOG_FAILURES: &str = "leadline_event_log_failures_total";

/// Appends lifecycle events without ever failing the caller.
#[derive(Clone)]
pub struct EventLogger {
    events: Arc<dyn EventRepository>,
}

impl EventLogger {
    pub fn new(events: Arc<dyn EventRepository>) -> Self {
        Self { events }
    }

    /// Append one event. Returns the stored event, or `None` when the
    /// append failed; the failure is logged and counted.
    pub async fn log_event(
        &self,
        lead_id: &str,
        event_type: EventType,
        context: EventContext,
        at: DateTime<Utc>,
    ) -> Option<LeadEvent> {
        match self
            .events
            .append_event(lead_id, event_type, &context, at)
            .await
        {
            Ok(event) => {
                debug!(lead_id, event_type = %event_type, seq = event.seq, "event logged");
                Some(event)
            }
            Err(e) => {
                warn!(lead_id, event_type = %event_type, error = %e, "failed to log lead event");
                metrics::counter!(EVENT_LOG_FAILURES, "event_type" => event_type.to_string())
                    .increment(1);
                None
            }
        }
    }

    /// All events of a lead, oldest first.
    pub async fn timeline(&self, lead_id: &str) -> Result<Vec<LeadEvent>, LeadlineError> {
        self.events.list_events(lead_id).await
    }
}

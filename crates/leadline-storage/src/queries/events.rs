// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only lead event log. Triggers reject updates and deletes.

use chrono::{DateTime, Utc};
use leadline_core::{EventContext, EventType, LeadEvent, LeadlineError};
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::rows::{enum_col, format_ts, json_col, ts_col};

pub async fn append_event(
    db: &Database,
    lead_id: &str,
    event_type: EventType,
    context: &EventContext,
    at: DateTime<Utc>,
) -> Result<LeadEvent, LeadlineError> {
    let mut event = LeadEvent {
        id: uuid::Uuid::new_v4().to_string(),
        seq: 0,
        lead_id: lead_id.to_string(),
        event_type,
        metadata: context
            .metadata
            .clone()
            .unwrap_or_else(|| serde_json::json!({})),
        actor_id: context.actor_id.clone(),
        provider_id: context.provider_id.clone(),
        created_at: at,
    };
    let metadata = event.metadata.to_string();
    let row = event.clone();
    let seq = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO lead_events (id, lead_id, event_type, metadata, actor_id,
                    provider_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    row.id,
                    row.lead_id,
                    row.event_type.to_string(),
                    metadata,
                    row.actor_id,
                    row.provider_id,
                    format_ts(row.created_at),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)?;
    event.seq = seq;
    Ok(event)
}

pub async fn list_events(db: &Database, lead_id: &str) -> Result<Vec<LeadEvent>, LeadlineError> {
    let lead_id = lead_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, seq, lead_id, event_type, metadata, actor_id, provider_id, created_at
                 FROM lead_events WHERE lead_id = ?1
                 ORDER BY created_at ASC, seq ASC",
            )?;
            let rows = stmt.query_map(params![lead_id], |row| {
                Ok(LeadEvent {
                    id: row.get(0)?,
                    seq: row.get(1)?,
                    lead_id: row.get(2)?,
                    event_type: enum_col(row, 3)?,
                    metadata: json_col(row, 4)?,
                    actor_id: row.get(5)?,
                    provider_id: row.get(6)?,
                    created_at: ts_col(row, 7)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

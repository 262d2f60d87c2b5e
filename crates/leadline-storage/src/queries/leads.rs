// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lead persistence. Leads are never deleted; only their status moves.

use chrono::{DateTime, Utc};
use leadline_core::{Lead, LeadStatus, LeadlineError};
use rusqlite::{Row, params, params_from_iter};

use crate::database::{Database, map_tr_err};
use crate::rows::{enum_col, format_ts, placeholders, ts_col};

const LEAD_COLUMNS: &str = "id, service_name, category, description, postal_code, city,
    latitude, longitude, urgency_tier, status, source_table, client_name, client_email,
    client_phone, created_at, updated_at";

fn lead_from_row(row: &Row<'_>) -> rusqlite::Result<Lead> {
    Ok(Lead {
        id: row.get(0)?,
        service_name: row.get(1)?,
        category: row.get(2)?,
        description: row.get(3)?,
        postal_code: row.get(4)?,
        city: row.get(5)?,
        latitude: row.get(6)?,
        longitude: row.get(7)?,
        urgency_tier: enum_col(row, 8)?,
        status: enum_col(row, 9)?,
        source_table: row.get(10)?,
        client_name: row.get(11)?,
        client_email: row.get(12)?,
        client_phone: row.get(13)?,
        created_at: ts_col(row, 14)?,
        updated_at: ts_col(row, 15)?,
    })
}

pub async fn insert_lead(db: &Database, lead: &Lead) -> Result<(), LeadlineError> {
    let lead = lead.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO leads (id, service_name, category, description, postal_code, city,
                    latitude, longitude, urgency, urgency_tier, status, source_table,
                    client_name, client_email, client_phone, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                params![
                    lead.id,
                    lead.service_name,
                    lead.category,
                    lead.description,
                    lead.postal_code,
                    lead.city,
                    lead.latitude,
                    lead.longitude,
                    lead.urgency().to_string(),
                    lead.urgency_tier.to_string(),
                    lead.status.to_string(),
                    lead.source_table,
                    lead.client_name,
                    lead.client_email,
                    lead.client_phone,
                    format_ts(lead.created_at),
                    format_ts(lead.updated_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_lead(db: &Database, id: &str) -> Result<Option<Lead>, LeadlineError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?1");
            match conn.query_row(&sql, params![id], lead_from_row) {
                Ok(lead) => Ok(Some(lead)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Conditional status update. Returns whether the lead was in one of `from`.
pub async fn transition_lead(
    db: &Database,
    id: &str,
    from: &[LeadStatus],
    to: LeadStatus,
    at: DateTime<Utc>,
) -> Result<bool, LeadlineError> {
    let mut values = vec![to.to_string(), format_ts(at), id.to_string()];
    values.extend(from.iter().map(ToString::to_string));
    let sql = format!(
        "UPDATE leads SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status IN ({})",
        placeholders(4, from.len())
    );
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(&sql, params_from_iter(values.iter()))?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_leads_created_before(
    db: &Database,
    statuses: &[LeadStatus],
    created_before: DateTime<Utc>,
) -> Result<Vec<Lead>, LeadlineError> {
    let mut values = vec![format_ts(created_before)];
    values.extend(statuses.iter().map(ToString::to_string));
    let sql = format!(
        "SELECT {LEAD_COLUMNS} FROM leads
         WHERE created_at < ?1 AND status IN ({})
         ORDER BY created_at ASC, id ASC",
        placeholders(2, statuses.len())
    );
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values.iter()), lead_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assignment persistence and the atomic check-and-reserve.
//!
//! Quota and cooldown checks read the provider's assignment history and
//! insert the new row inside one `BEGIN IMMEDIATE` transaction. SQLite takes
//! the reserved lock at `BEGIN`, so two dispatches (in this process or
//! another) cannot both pass the check for the same provider.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use leadline_core::types::{
    QueueStats, ReassignOutcome, ReassignRequest, ReservationOutcome, ReservationRequest,
};
use leadline_core::{Assignment, AssignmentStatus, LeadlineError, ProviderLoad, SkipReason};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params, params_from_iter};

use crate::database::{Database, map_tr_err};
use crate::rows::{day_start, enum_col, format_ts, month_start, opt_ts_col, placeholders, ts_col};

const ASSIGNMENT_COLUMNS: &str = "id, lead_id, provider_id, dispatch_id, status, assigned_at,
    viewed_at, score, distance_km, position, source_table, updated_at";

fn assignment_from_row(row: &Row<'_>) -> rusqlite::Result<Assignment> {
    Ok(Assignment {
        id: row.get(0)?,
        lead_id: row.get(1)?,
        provider_id: row.get(2)?,
        dispatch_id: row.get(3)?,
        status: enum_col(row, 4)?,
        assigned_at: ts_col(row, 5)?,
        viewed_at: opt_ts_col(row, 6)?,
        score: row.get(7)?,
        distance_km: row.get(8)?,
        position: row.get(9)?,
        source_table: row.get(10)?,
        updated_at: ts_col(row, 11)?,
    })
}

fn select_assignment(conn: &Connection, id: &str) -> rusqlite::Result<Option<Assignment>> {
    let sql = format!("SELECT {ASSIGNMENT_COLUMNS} FROM lead_assignments WHERE id = ?1");
    conn.query_row(&sql, params![id], assignment_from_row)
        .optional()
}

fn provider_on_lead(conn: &Connection, lead_id: &str, provider_id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM lead_assignments WHERE lead_id = ?1 AND provider_id = ?2)",
        params![lead_id, provider_id],
        |row| row.get(0),
    )
}

/// Cooldown and quota counters for one provider relative to `now`.
fn load_for(conn: &Connection, provider_id: &str, now: DateTime<Utc>) -> rusqlite::Result<ProviderLoad> {
    let day = format_ts(day_start(now));
    let month = format_ts(month_start(now));
    conn.query_row(
        "SELECT MAX(assigned_at),
                COALESCE(SUM(CASE WHEN assigned_at >= ?2 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN assigned_at >= ?3 THEN 1 ELSE 0 END), 0)
         FROM lead_assignments WHERE provider_id = ?1",
        params![provider_id, day, month],
        |row| {
            Ok(ProviderLoad {
                last_assigned_at: opt_ts_col(row, 0)?,
                assigned_today: row.get(1)?,
                assigned_this_month: row.get(2)?,
            })
        },
    )
}

/// Counters for every provider in `provider_ids` that has assignments.
///
/// Only rows of the requested providers are aggregated.
pub async fn provider_loads(
    db: &Database,
    provider_ids: &[String],
    now: DateTime<Utc>,
) -> Result<HashMap<String, ProviderLoad>, LeadlineError> {
    if provider_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let sql = format!(
        "SELECT provider_id, MAX(assigned_at),
                SUM(CASE WHEN assigned_at >= ?1 THEN 1 ELSE 0 END),
                SUM(CASE WHEN assigned_at >= ?2 THEN 1 ELSE 0 END)
         FROM lead_assignments WHERE provider_id IN ({})
         GROUP BY provider_id",
        placeholders(3, provider_ids.len())
    );
    let mut values = vec![format_ts(day_start(now)), format_ts(month_start(now))];
    values.extend(provider_ids.iter().cloned());
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    ProviderLoad {
                        last_assigned_at: opt_ts_col(row, 1)?,
                        assigned_today: row.get(2)?,
                        assigned_this_month: row.get(3)?,
                    },
                ))
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Check duplicate, cooldown, quotas and batch size for one provider, then
/// insert the assignment at the next free position of its batch.
pub async fn reserve_assignment(
    db: &Database,
    request: ReservationRequest,
) -> Result<ReservationOutcome, LeadlineError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            if provider_on_lead(&tx, &request.lead_id, &request.provider_id)? {
                return Ok(ReservationOutcome::Skipped(SkipReason::AlreadyAssigned));
            }

            let load = load_for(&tx, &request.provider_id, request.at)?;
            if let Some(reason) = request.policy.check(&load, request.at) {
                return Ok(ReservationOutcome::Skipped(reason));
            }

            let taken: u32 = tx.query_row(
                "SELECT COUNT(*) FROM lead_assignments WHERE lead_id = ?1 AND dispatch_id = ?2",
                params![request.lead_id, request.dispatch_id],
                |row| row.get(0),
            )?;
            if taken >= request.batch_limit {
                return Ok(ReservationOutcome::Skipped(SkipReason::BatchFull));
            }

            let assignment = Assignment {
                id: uuid::Uuid::new_v4().to_string(),
                lead_id: request.lead_id,
                provider_id: request.provider_id,
                dispatch_id: request.dispatch_id,
                status: AssignmentStatus::Pending,
                assigned_at: request.at,
                viewed_at: None,
                score: request.score,
                distance_km: request.distance_km,
                position: taken + 1,
                source_table: request.source_table,
                updated_at: request.at,
            };
            tx.execute(
                "INSERT INTO lead_assignments (id, lead_id, provider_id, dispatch_id, status,
                    assigned_at, viewed_at, score, distance_km, position, source_table, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, ?8, ?9, ?10, ?11)",
                params![
                    assignment.id,
                    assignment.lead_id,
                    assignment.provider_id,
                    assignment.dispatch_id,
                    assignment.status.to_string(),
                    format_ts(assignment.assigned_at),
                    assignment.score,
                    assignment.distance_km,
                    assignment.position,
                    assignment.source_table,
                    format_ts(assignment.updated_at),
                ],
            )?;
            tx.commit()?;
            Ok(ReservationOutcome::Reserved(assignment))
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_assignment(db: &Database, id: &str) -> Result<Option<Assignment>, LeadlineError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| select_assignment(conn, &id))
        .await
        .map_err(map_tr_err)
}

pub async fn find_assignment(
    db: &Database,
    lead_id: &str,
    provider_id: &str,
) -> Result<Option<Assignment>, LeadlineError> {
    let lead_id = lead_id.to_string();
    let provider_id = provider_id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {ASSIGNMENT_COLUMNS} FROM lead_assignments
                 WHERE lead_id = ?1 AND provider_id = ?2"
            );
            conn.query_row(&sql, params![lead_id, provider_id], assignment_from_row)
                .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_assignments_for_lead(
    db: &Database,
    lead_id: &str,
) -> Result<Vec<Assignment>, LeadlineError> {
    let lead_id = lead_id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {ASSIGNMENT_COLUMNS} FROM lead_assignments
                 WHERE lead_id = ?1 ORDER BY assigned_at ASC, dispatch_id ASC, position ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![lead_id], assignment_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Move an assignment to another provider, keeping its slot.
pub async fn reassign_assignment(
    db: &Database,
    request: ReassignRequest,
) -> Result<ReassignOutcome, LeadlineError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let Some(current) = select_assignment(&tx, &request.assignment_id)? else {
                return Ok(ReassignOutcome::Missing);
            };
            if provider_on_lead(&tx, &current.lead_id, &request.new_provider_id)? {
                return Ok(ReassignOutcome::Rejected(SkipReason::AlreadyAssigned));
            }

            let load = load_for(&tx, &request.new_provider_id, request.at)?;
            if let Some(reason) = request.policy.check(&load, request.at) {
                return Ok(ReassignOutcome::Rejected(reason));
            }

            let at = format_ts(request.at);
            tx.execute(
                "UPDATE lead_assignments
                 SET provider_id = ?1, status = 'pending', viewed_at = NULL,
                     assigned_at = ?2, updated_at = ?2
                 WHERE id = ?3",
                params![request.new_provider_id, at, request.assignment_id],
            )?;
            tx.commit()?;

            let previous_provider_id = current.provider_id.clone();
            Ok(ReassignOutcome::Reassigned {
                previous_provider_id,
                assignment: Assignment {
                    provider_id: request.new_provider_id,
                    status: AssignmentStatus::Pending,
                    viewed_at: None,
                    assigned_at: request.at,
                    updated_at: request.at,
                    ..current
                },
            })
        })
        .await
        .map_err(map_tr_err)
}

/// Conditional status update; stamps `viewed_at` on the first view.
pub async fn transition_assignment(
    db: &Database,
    id: &str,
    from: &[AssignmentStatus],
    to: AssignmentStatus,
    at: DateTime<Utc>,
) -> Result<bool, LeadlineError> {
    let mut values = vec![to.to_string(), format_ts(at), id.to_string()];
    values.extend(from.iter().map(ToString::to_string));
    let viewed_clause = if to == AssignmentStatus::Viewed {
        ", viewed_at = COALESCE(viewed_at, ?2)"
    } else {
        ""
    };
    let sql = format!(
        "UPDATE lead_assignments SET status = ?1, updated_at = ?2{viewed_clause}
         WHERE id = ?3 AND status IN ({})",
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

pub async fn queue_stats(db: &Database) -> Result<QueueStats, LeadlineError> {
    db.connection()
        .call(|conn| {
            let mut stmt =
                conn.prepare("SELECT status, COUNT(*) FROM lead_assignments GROUP BY status")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?))
            })?;
            let mut stats = QueueStats::default();
            for row in rows {
                let (status, count) = row?;
                match status.as_str() {
                    "pending" => stats.pending = count,
                    "viewed" => stats.viewed = count,
                    "quoted" => stats.quoted = count,
                    "declined" => stats.declined = count,
                    _ => {}
                }
                stats.total += count;
            }
            Ok(stats)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_stale_pending(
    db: &Database,
    assigned_before: DateTime<Utc>,
) -> Result<Vec<Assignment>, LeadlineError> {
    let before = format_ts(assigned_before);
    db.connection()
        .call(move |conn| {
            let columns = ASSIGNMENT_COLUMNS
                .split(',')
                .map(|c| format!("a.{}", c.trim()))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "SELECT {columns} FROM lead_assignments a
                 JOIN leads l ON l.id = a.lead_id
                 WHERE a.status = 'pending' AND a.assigned_at < ?1
                   AND l.status NOT IN ('accepted', 'completed', 'expired')
                 ORDER BY a.assigned_at ASC, a.id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![before], assignment_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Matching configuration singleton and its audit trail.

use leadline_core::LeadlineError;
use leadline_core::types::{ConfigAuditEntry, ConfigUpdate, StoredConfig};
use rusqlite::{OptionalExtension, TransactionBehavior, params};

use crate::database::{Database, map_tr_err};
use crate::rows::{format_ts, json_col, ts_col};

pub async fn load_config(db: &Database) -> Result<Option<StoredConfig>, LeadlineError> {
    db.connection()
        .call(|conn| {
            conn.query_row(
                "SELECT payload, updated_by, updated_at FROM matching_config WHERE id = 1",
                [],
                |row| {
                    Ok(StoredConfig {
                        payload: row.get(0)?,
                        updated_by: row.get(1)?,
                        updated_at: ts_col(row, 2)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Replace the singleton row and record the audit entry in one transaction.
///
/// The current payload is compared with `update.expected_payload` under the
/// write lock; on a mismatch nothing is written and `false` is returned.
pub async fn save_config(db: &Database, update: ConfigUpdate) -> Result<bool, LeadlineError> {
    let changed = serde_json::to_string(&update.changed_fields).map_err(|e| {
        LeadlineError::Internal(format!("failed to encode changed fields: {e}"))
    })?;
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let current: Option<String> = tx
                .query_row("SELECT payload FROM matching_config WHERE id = 1", [], |row| {
                    row.get(0)
                })
                .optional()?;
            if current != update.expected_payload {
                return Ok(false);
            }
            let at = format_ts(update.at);
            tx.execute(
                "INSERT INTO matching_config (id, payload, updated_by, updated_at)
                 VALUES (1, ?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET
                    payload = excluded.payload,
                    updated_by = excluded.updated_by,
                    updated_at = excluded.updated_at",
                params![update.payload, update.actor_id, at],
            )?;
            tx.execute(
                "INSERT INTO matching_config_audit (actor_id, changed_fields, patch, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![update.actor_id, changed, update.patch, at],
            )?;
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn config_history(
    db: &Database,
    limit: u32,
) -> Result<Vec<ConfigAuditEntry>, LeadlineError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, actor_id, changed_fields, patch, created_at
                 FROM matching_config_audit ORDER BY id DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                let fields = json_col(row, 2)?;
                Ok(ConfigAuditEntry {
                    id: row.get(0)?,
                    actor_id: row.get(1)?,
                    changed_fields: fields
                        .as_array()
                        .map(|items| {
                            items
                                .iter()
                                .filter_map(|v| v.as_str().map(str::to_string))
                                .collect()
                        })
                        .unwrap_or_default(),
                    patch: json_col(row, 3)?,
                    created_at: ts_col(row, 4)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use serde_json::json;
    use tempfile::tempdir;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[tokio::test]
    async fn save_replaces_row_and_appends_audit() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db").to_str().unwrap())
            .await
            .unwrap();
        assert!(load_config(&db).await.unwrap().is_none());

        assert!(
            save_config(
                &db,
                ConfigUpdate {
                    payload: r#"{"max_artisans_per_lead":4}"#.into(),
                    patch: r#"{"max_artisans_per_lead":4}"#.into(),
                    changed_fields: vec!["max_artisans_per_lead".into()],
                    actor_id: "admin-1".into(),
                    at: ts("2026-03-01T10:00:00Z"),
                    expected_payload: None,
                },
            )
            .await
            .unwrap()
        );
        assert!(
            save_config(
                &db,
                ConfigUpdate {
                    payload: r#"{"max_artisans_per_lead":2}"#.into(),
                    patch: r#"{"max_artisans_per_lead":2,"cooldown_minutes":10}"#.into(),
                    changed_fields: vec![
                        "cooldown_minutes".into(),
                        "max_artisans_per_lead".into()
                    ],
                    actor_id: "admin-2".into(),
                    at: ts("2026-03-02T10:00:00Z"),
                    expected_payload: Some(r#"{"max_artisans_per_lead":4}"#.into()),
                },
            )
            .await
            .unwrap()
        );

        let stored = load_config(&db).await.unwrap().unwrap();
        assert_eq!(stored.payload, r#"{"max_artisans_per_lead":2}"#);
        assert_eq!(stored.updated_by.as_deref(), Some("admin-2"));
        assert_eq!(stored.updated_at, ts("2026-03-02T10:00:00Z"));

        let history = config_history(&db, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].actor_id, "admin-2");
        assert_eq!(
            history[0].changed_fields,
            vec!["cooldown_minutes", "max_artisans_per_lead"]
        );
        assert_eq!(history[0].patch["cooldown_minutes"], json!(10));
        assert_eq!(config_history(&db, 1).await.unwrap().len(), 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn stale_expected_payload_writes_nothing() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db").to_str().unwrap())
            .await
            .unwrap();
        let update = |payload: &str, expected: Option<&str>| ConfigUpdate {
            payload: payload.into(),
            patch: payload.into(),
            changed_fields: vec!["geo_radius_km".into()],
            actor_id: "admin-1".into(),
            at: ts("2026-03-01T10:00:00Z"),
            expected_payload: expected.map(str::to_string),
        };

        assert!(save_config(&db, update(r#"{"geo_radius_km":30}"#, None)).await.unwrap());
        // Both writers started from the empty table; the second one lost.
        assert!(!save_config(&db, update(r#"{"geo_radius_km":90}"#, None)).await.unwrap());
        assert!(
            !save_config(&db, update(r#"{"geo_radius_km":90}"#, Some("{}")))
                .await
                .unwrap()
        );

        let stored = load_config(&db).await.unwrap().unwrap();
        assert_eq!(stored.payload, r#"{"geo_radius_km":30}"#);
        assert_eq!(config_history(&db, 10).await.unwrap().len(), 1);
        db.close().await.unwrap();
    }
}

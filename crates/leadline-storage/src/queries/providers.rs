// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider directory reads, plus the upsert used by imports and fixtures.

use leadline_core::{LeadlineError, Provider};
use rusqlite::{Row, params};

use crate::database::{Database, map_tr_err};
use crate::rows::{format_ts, opt_ts_col, ts_col};

const PROVIDER_COLUMNS: &str = "id, name, specialty, category, city, postal_code, department,
    latitude, longitude, service_radius_km, is_active, is_verified, is_claimed,
    rating_average, review_count, data_quality, last_active_at, created_at";

fn provider_from_row(row: &Row<'_>) -> rusqlite::Result<Provider> {
    Ok(Provider {
        id: row.get(0)?,
        name: row.get(1)?,
        specialty: row.get(2)?,
        category: row.get(3)?,
        city: row.get(4)?,
        postal_code: row.get(5)?,
        department: row.get(6)?,
        latitude: row.get(7)?,
        longitude: row.get(8)?,
        service_radius_km: row.get(9)?,
        is_active: row.get(10)?,
        is_verified: row.get(11)?,
        is_claimed: row.get(12)?,
        rating_average: row.get(13)?,
        review_count: row.get(14)?,
        data_quality: row.get(15)?,
        last_active_at: opt_ts_col(row, 16)?,
        created_at: ts_col(row, 17)?,
    })
}

pub async fn list_active_providers(db: &Database) -> Result<Vec<Provider>, LeadlineError> {
    db.connection()
        .call(|conn| {
            let sql = format!(
                "SELECT {PROVIDER_COLUMNS} FROM providers WHERE is_active = 1 ORDER BY id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], provider_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_provider(db: &Database, id: &str) -> Result<Option<Provider>, LeadlineError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!("SELECT {PROVIDER_COLUMNS} FROM providers WHERE id = ?1");
            match conn.query_row(&sql, params![id], provider_from_row) {
                Ok(provider) => Ok(Some(provider)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a provider or replace every column of an existing one.
pub async fn upsert_provider(db: &Database, provider: &Provider) -> Result<(), LeadlineError> {
    let p = provider.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO providers (id, name, specialty, category, city, postal_code,
                    department, latitude, longitude, service_radius_km, is_active, is_verified,
                    is_claimed, rating_average, review_count, data_quality, last_active_at,
                    created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    specialty = excluded.specialty,
                    category = excluded.category,
                    city = excluded.city,
                    postal_code = excluded.postal_code,
                    department = excluded.department,
                    latitude = excluded.latitude,
                    longitude = excluded.longitude,
                    service_radius_km = excluded.service_radius_km,
                    is_active = excluded.is_active,
                    is_verified = excluded.is_verified,
                    is_claimed = excluded.is_claimed,
                    rating_average = excluded.rating_average,
                    review_count = excluded.review_count,
                    data_quality = excluded.data_quality,
                    last_active_at = excluded.last_active_at",
                params![
                    p.id,
                    p.name,
                    p.specialty,
                    p.category,
                    p.city,
                    p.postal_code,
                    p.department,
                    p.latitude,
                    p.longitude,
                    p.service_radius_km,
                    p.is_active,
                    p.is_verified,
                    p.is_claimed,
                    p.rating_average,
                    p.review_count,
                    p.data_quality,
                    p.last_active_at.map(format_ts),
                    format_ts(p.created_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

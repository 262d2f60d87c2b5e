// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `leadline import-providers`: load the provider directory from CSV.
//!
//! Expected header (optional columns may be left empty):
//!
//! ```text
//! id,name,specialty,category,city,postal_code,department,latitude,longitude,
//! service_radius_km,is_active,is_verified,is_claimed,rating_average,
//! review_count,data_quality,last_active_at,created_at
//! ```
//!
//! Rows are upserted by id. A missing `department` is derived from the
//! postal code.

use std::path::Path;

use chrono::{DateTime, Utc};
use leadline_core::{LeadlineError, Provider};
use leadline_matching::geo::department_from_postal_code;
use serde::Deserialize;
use tracing::info;

use crate::Context;

#[derive(Debug, Deserialize)]
struct ProviderRow {
    id: String,
    name: String,
    specialty: String,
    category: Option<String>,
    city: Option<String>,
    postal_code: Option<String>,
    department: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    service_radius_km: Option<f64>,
    #[serde(default = "yes")]
    is_active: bool,
    #[serde(default)]
    is_verified: bool,
    #[serde(default)]
    is_claimed: bool,
    #[serde(default)]
    rating_average: f64,
    #[serde(default)]
    review_count: u32,
    #[serde(default)]
    data_quality: f64,
    last_active_at: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
}

fn yes() -> bool {
    true
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl ProviderRow {
    fn into_provider(self, now: DateTime<Utc>) -> Result<Provider, LeadlineError> {
        if self.id.trim().is_empty() {
            return Err(LeadlineError::invalid_field("id", "must not be empty"));
        }
        if !(0.0..=5.0).contains(&self.rating_average) {
            return Err(LeadlineError::invalid_field(
                "rating_average",
                format!("must be between 0 and 5 for provider {}", self.id),
            ));
        }
        let postal_code = non_empty(self.postal_code);
        let department = non_empty(self.department)
            .or_else(|| postal_code.as_deref().and_then(department_from_postal_code));
        Ok(Provider {
            id: self.id,
            name: self.name,
            specialty: self.specialty,
            category: non_empty(self.category),
            city: non_empty(self.city),
            postal_code,
            department,
            latitude: self.latitude,
            longitude: self.longitude,
            service_radius_km: self.service_radius_km,
            is_active: self.is_active,
            is_verified: self.is_verified,
            is_claimed: self.is_claimed,
            rating_average: self.rating_average,
            review_count: self.review_count,
            data_quality: self.data_quality.clamp(0.0, 100.0),
            last_active_at: self.last_active_at,
            created_at: self.created_at.unwrap_or(now),
        })
    }
}

/// Parse every row before writing any, so a bad file changes nothing.
fn read_providers<R: std::io::Read>(
    reader: R,
    now: DateTime<Utc>,
) -> Result<Vec<Provider>, LeadlineError> {
    let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut providers = Vec::new();
    for (i, row) in csv.deserialize::<ProviderRow>().enumerate() {
        let row = row.map_err(|e| {
            LeadlineError::invalid_field("csv", format!("row {}: {e}", i + 1))
        })?;
        providers.push(row.into_provider(now)?);
    }
    Ok(providers)
}

pub async fn run_import(ctx: &Context, file: &Path) -> Result<(), LeadlineError> {
    let handle = std::fs::File::open(file).map_err(|e| {
        LeadlineError::Internal(format!("failed to open {}: {e}", file.display()))
    })?;
    let providers = read_providers(handle, Utc::now())?;
    for provider in &providers {
        ctx.storage.upsert_provider(provider).await?;
    }
    info!(count = providers.len(), file = %file.display(), "providers imported");
    if ctx.out.json {
        let ids: Vec<&str> = providers.iter().map(|p| p.id.as_str()).collect();
        let text = serde_json::to_string_pretty(&ids)
            .map_err(|e| LeadlineError::Internal(format!("failed to encode output: {e}")))?;
        println!("{text}");
    } else {
        println!("{} provider(s) imported", providers.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "id,name,specialty,category,city,postal_code,department,latitude,longitude,service_radius_km,is_active,is_verified,is_claimed,rating_average,review_count,data_quality,last_active_at,created_at";

    #[test]
    fn rows_with_empty_optionals_parse() {
        let csv = format!(
            "{HEADER}\n\
             p-1,Plomberie Dupont,Plombier,,Lyon,69003,,45.76,4.84,,true,true,false,4.6,23,85,2026-09-01T08:00:00Z,\n\
             p-2,Corse Elec,Électricien,electricite,Ajaccio,20000,,,,30,true,false,true,0,0,40,,2024-01-01T00:00:00Z\n"
        );
        let now = Utc::now();
        let providers = read_providers(csv.as_bytes(), now).unwrap();
        assert_eq!(providers.len(), 2);

        let p1 = &providers[0];
        assert_eq!(p1.department.as_deref(), Some("69"));
        assert_eq!(p1.category, None);
        assert_eq!(p1.created_at, now);
        assert!(p1.last_active_at.is_some());

        let p2 = &providers[1];
        assert_eq!(p2.department.as_deref(), Some("2A"));
        assert_eq!(p2.service_radius_km, Some(30.0));
        assert_eq!(p2.latitude, None);
        assert!(p2.is_claimed);
    }

    #[test]
    fn bad_rating_rejects_the_file() {
        let csv = format!(
            "{HEADER}\np-1,X,Plombier,,,,,,,,true,true,true,7.5,1,50,,\n"
        );
        let err = read_providers(csv.as_bytes(), Utc::now()).unwrap_err();
        assert!(err.to_string().contains("rating_average"));
    }

    #[test]
    fn malformed_row_reports_its_number() {
        let csv = format!("{HEADER}\np-1,X,Plombier,,,,,abc,,,true,true,true,4,1,50,,\n");
        let err = read_providers(csv.as_bytes(), Utc::now()).unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }
}

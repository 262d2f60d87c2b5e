// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider and lead builders.
//!
//! Defaults describe a verified plumber in central Lyon and a plumbing
//! request from the same arrondissement, so a fresh fixture pair always
//! matches. Tests override fields with struct update syntax.

use chrono::{DateTime, Duration, Utc};
use leadline_core::{NewLead, Provider};

/// Coordinates of Lyon 3e.
pub const LYON: (f64, f64) = (45.7597, 4.8422);

/// Coordinates of Villeurbanne, about 4 km from [`LYON`].
pub const VILLEURBANNE: (f64, f64) = (45.7719, 4.8902);

/// Coordinates of Marseille, about 280 km from [`LYON`].
pub const MARSEILLE: (f64, f64) = (43.2965, 5.3698);

pub fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|e| panic!("bad fixture timestamp {s}: {e}"))
}

/// An active, verified plumber located at [`LYON`].
pub fn provider(id: &str) -> Provider {
    let now = Utc::now();
    Provider {
        id: id.to_string(),
        name: format!("Artisan {id}"),
        specialty: "Plombier".to_string(),
        category: Some("plomberie".to_string()),
        city: Some("Lyon".to_string()),
        postal_code: Some("69003".to_string()),
        department: Some("69".to_string()),
        latitude: Some(LYON.0),
        longitude: Some(LYON.1),
        service_radius_km: None,
        is_active: true,
        is_verified: true,
        is_claimed: true,
        rating_average: 4.5,
        review_count: 12,
        data_quality: 80.0,
        last_active_at: Some(now - Duration::days(1)),
        created_at: now - Duration::days(365),
    }
}

/// [`provider`] moved to the given coordinates.
pub fn provider_at(id: &str, (lat, lon): (f64, f64)) -> Provider {
    Provider {
        latitude: Some(lat),
        longitude: Some(lon),
        ..provider(id)
    }
}

/// A plumbing request located at [`LYON`].
pub fn lead() -> NewLead {
    NewLead {
        service_name: "Plomberie".to_string(),
        description: Some("Fuite sous l'évier".to_string()),
        postal_code: Some("69003".to_string()),
        city: Some("Lyon".to_string()),
        latitude: Some(LYON.0),
        longitude: Some(LYON.1),
        urgency: Some("normal".to_string()),
        client_name: Some("Camille Martin".to_string()),
        client_email: Some("camille@example.com".to_string()),
        ..NewLead::default()
    }
}

/// [`lead`] with another requested service.
pub fn lead_for(service: &str) -> NewLead {
    NewLead {
        service_name: service.to_string(),
        ..lead()
    }
}

// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Great-circle distance and French department lookup.

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance in kilometres between two `(latitude, longitude)`
/// pairs given in degrees.
pub fn haversine_km(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lon1) = (from.0.to_radians(), from.1.to_radians());
    let (lat2, lon2) = (to.0.to_radians(), to.1.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
}

/// Department code of a five-digit French postal code.
///
/// Overseas departments (97x, 98x) use three digits; Corsica splits 20xxx
/// into 2A (below 20200) and 2B.
pub fn department_from_postal_code(postal_code: &str) -> Option<String> {
    let code: String = postal_code.chars().filter(|c| !c.is_whitespace()).collect();
    if code.len() != 5 || !code.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let department = match &code[..2] {
        "97" | "98" => code[..3].to_string(),
        "20" => {
            let numeric: u32 = code.parse().ok()?;
            if numeric < 20200 { "2A" } else { "2B" }.to_string()
        }
        prefix => prefix.to_string(),
    };
    Some(department)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paris_to_lyon() {
        let paris = (48.8566, 2.3522);
        let lyon = (45.7640, 4.8357);
        let d = haversine_km(paris, lyon);
        assert!((d - 392.0).abs() < 3.0, "got {d}");
        assert_eq!(haversine_km(paris, paris), 0.0);
    }

    #[test]
    fn departments() {
        assert_eq!(department_from_postal_code("69003").as_deref(), Some("69"));
        assert_eq!(department_from_postal_code("75 011").as_deref(), Some("75"));
        assert_eq!(department_from_postal_code("20090").as_deref(), Some("2A"));
        assert_eq!(department_from_postal_code("20200").as_deref(), Some("2B"));
        assert_eq!(department_from_postal_code("97411").as_deref(), Some("974"));
        assert_eq!(department_from_postal_code("6900"), None);
        assert_eq!(department_from_postal_code("ABCDE"), None);
    }
}

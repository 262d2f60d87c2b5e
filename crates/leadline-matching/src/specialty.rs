// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Specialty matching between a requested service and a provider trade.
//!
//! Three modes are supported:
//!
//! - **exact**: normalized strings are equal;
//! - **fuzzy**: one contains the other, or their token sets overlap enough
//!   (soft Jaccard, tokens compared with Jaro-Winkler);
//! - **category**: both sides resolve to the same parent category, falling
//!   back to fuzzy when either side cannot be resolved.

use leadline_config::SpecialtyMatchMode;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Minimum soft Jaccard overlap for a fuzzy match.
const FUZZY_JACCARD_THRESHOLD: f64 = 0.5;

/// Minimum Jaro-Winkler similarity for two tokens to count as the same word.
const TOKEN_SIMILARITY_THRESHOLD: f64 = 0.9;

const STOP_WORDS: &[&str] = &[
    "a", "au", "aux", "d", "de", "des", "du", "en", "et", "l", "la", "le", "les", "pour", "sur",
    "un", "une",
];

/// Built-in service taxonomy: keyword stems and the category they map to.
///
/// Checked in order; the first stem found in the normalized text wins.
const TAXONOMY: &[(&str, &str)] = &[
    ("plomb", "plomberie"),
    ("sanitaire", "plomberie"),
    ("fuite", "plomberie"),
    ("electri", "electricite"),
    ("chauffag", "chauffage"),
    ("chaudiere", "chauffage"),
    ("climatis", "chauffage"),
    ("pompe a chaleur", "chauffage"),
    ("serrur", "serrurerie"),
    ("menuis", "menuiserie"),
    ("ebenist", "menuiserie"),
    ("peint", "peinture"),
    ("platr", "peinture"),
    ("macon", "maconnerie"),
    ("couv", "toiture"),
    ("toit", "toiture"),
    ("zingu", "toiture"),
    ("carrel", "carrelage"),
    ("vitr", "vitrerie"),
    ("paysag", "jardinage"),
    ("jardin", "jardinage"),
    ("elagu", "jardinage"),
    ("demenag", "demenagement"),
    ("nettoy", "nettoyage"),
];

/// Lowercase, fold accents, replace punctuation with spaces and collapse
/// whitespace.
pub fn normalize(text: &str) -> String {
    let folded: String = text
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    folded
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn tokens(text: &str) -> Vec<String> {
    normalize(text)
        .split(' ')
        .filter(|t| !t.is_empty() && !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Parent category of a service or trade name, from the built-in taxonomy.
pub fn category_of(text: &str) -> Option<&'static str> {
    let normalized = normalize(text);
    if normalized.is_empty() {
        return None;
    }
    TAXONOMY
        .iter()
        .find(|(stem, _)| normalized.contains(stem))
        .map(|(_, category)| *category)
}

fn resolve_category(explicit: Option<&str>, name: &str) -> Option<String> {
    match explicit.map(str::trim).filter(|c| !c.is_empty()) {
        Some(category) => Some(
            category_of(category)
                .map(str::to_string)
                .unwrap_or_else(|| normalize(category)),
        ),
        None => category_of(name).map(str::to_string),
    }
}

pub fn exact_match(requested: &str, specialty: &str) -> bool {
    let requested = normalize(requested);
    !requested.is_empty() && requested == normalize(specialty)
}

/// Soft Jaccard similarity of the two token sets.
///
/// Each token of the smaller set is paired with at most one unused token of
/// the other set whose Jaro-Winkler similarity reaches the threshold.
pub fn soft_jaccard(a: &str, b: &str) -> f64 {
    let (left, right) = (tokens(a), tokens(b));
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let (small, large) = if left.len() <= right.len() {
        (&left, &right)
    } else {
        (&right, &left)
    };

    let mut used = vec![false; large.len()];
    let mut shared = 0usize;
    for token in small {
        let best = large
            .iter()
            .enumerate()
            .filter(|(i, _)| !used[*i])
            .map(|(i, other)| (i, strsim::jaro_winkler(token, other)))
            .filter(|(_, sim)| *sim >= TOKEN_SIMILARITY_THRESHOLD)
            .max_by(|x, y| x.1.total_cmp(&y.1));
        if let Some((i, _)) = best {
            used[i] = true;
            shared += 1;
        }
    }

    shared as f64 / (left.len() + right.len() - shared) as f64
}

pub fn fuzzy_match(requested: &str, specialty: &str) -> bool {
    let (a, b) = (normalize(requested), normalize(specialty));
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(&b) || b.contains(&a) || soft_jaccard(&a, &b) >= FUZZY_JACCARD_THRESHOLD
}

/// Inputs of a specialty comparison: the lead's service (and optional
/// category) against the provider's specialty (and optional category).
#[derive(Debug, Clone, Copy)]
pub struct SpecialtyQuery<'a> {
    pub service_name: &'a str,
    pub lead_category: Option<&'a str>,
    pub specialty: &'a str,
    pub provider_category: Option<&'a str>,
}

pub fn specialty_matches(mode: SpecialtyMatchMode, query: SpecialtyQuery<'_>) -> bool {
    match mode {
        SpecialtyMatchMode::Exact => exact_match(query.service_name, query.specialty),
        SpecialtyMatchMode::Fuzzy => fuzzy_match(query.service_name, query.specialty),
        SpecialtyMatchMode::Category => {
            let lead = resolve_category(query.lead_category, query.service_name);
            let provider = resolve_category(query.provider_category, query.specialty);
            match (lead, provider) {
                (Some(lead), Some(provider)) => lead == provider,
                _ => fuzzy_match(query.service_name, query.specialty),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query<'a>(service: &'a str, specialty: &'a str) -> SpecialtyQuery<'a> {
        SpecialtyQuery {
            service_name: service,
            lead_category: None,
            specialty,
            provider_category: None,
        }
    }

    #[test]
    fn normalization_folds_accents_and_spacing() {
        assert_eq!(normalize("  Électricité   Générale "), "electricite generale");
        assert_eq!(normalize("Maçon-Carreleur"), "macon carreleur");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn exact_mode_ignores_case_and_accents() {
        assert!(exact_match("Électricien", "electricien"));
        assert!(!exact_match("électricien", "électricien bâtiment"));
        assert!(!exact_match("", ""));
    }

    #[test]
    fn fuzzy_mode_accepts_containment_and_token_overlap() {
        assert!(fuzzy_match("plombier", "Plombier chauffagiste"));
        assert!(fuzzy_match("réparation de chaudière", "chaudiere reparation"));
        assert!(fuzzy_match("peintre en batiment", "peintres batiment"));
        assert!(!fuzzy_match("serrurier", "jardinier"));
        assert!(!fuzzy_match("", "jardinier"));
    }

    #[test]
    fn soft_jaccard_drops_stop_words() {
        let score = soft_jaccard("pose de carrelage", "carrelage pose");
        assert!((score - 1.0).abs() < 1e-9, "got {score}");
        assert_eq!(soft_jaccard("le", "la"), 0.0);
    }

    #[test]
    fn taxonomy_lookup() {
        assert_eq!(category_of("Plombier chauffagiste"), Some("plomberie"));
        assert_eq!(category_of("fuite d'eau"), Some("plomberie"));
        assert_eq!(category_of("Électricien"), Some("electricite"));
        assert_eq!(category_of("couvreur zingueur"), Some("toiture"));
        assert_eq!(category_of("astrologue"), None);
    }

    #[test]
    fn category_mode_matches_related_trades() {
        let mode = SpecialtyMatchMode::Category;
        assert!(specialty_matches(mode, query("fuite sous évier", "Plombier")));
        assert!(!specialty_matches(mode, query("fuite sous évier", "Électricien")));
    }

    #[test]
    fn category_mode_prefers_explicit_categories() {
        let q = SpecialtyQuery {
            service_name: "petits travaux",
            lead_category: Some("Plomberie"),
            specialty: "multiservice",
            provider_category: Some("plomberie"),
        };
        assert!(specialty_matches(SpecialtyMatchMode::Category, q));
    }

    #[test]
    fn category_mode_falls_back_to_fuzzy_when_unresolved() {
        let mode = SpecialtyMatchMode::Category;
        assert!(specialty_matches(mode, query("home staging", "Home staging décoration")));
        assert!(!specialty_matches(mode, query("home staging", "astrologue")));
    }
}

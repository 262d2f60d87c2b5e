// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for service configuration values.

use crate::diagnostic::ConfigError;
use crate::model::LeadlineConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        key: key.to_string(),
        message: message.into(),
    }
}

/// Validate a deserialized configuration, collecting every failure.
pub fn validate_config(config: &LeadlineConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    check_service(config, &mut errors);
    check_storage(config, &mut errors);
    check_dispatch(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_service(config: &LeadlineConfig, errors: &mut Vec<ConfigError>) {
    if config.service.name.trim().is_empty() {
        errors.push(invalid("service.name", "must not be empty"));
    }
    let level = config.service.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(invalid(
            "service.log_level",
            format!(
                "`{}` is not one of {}",
                config.service.log_level,
                LOG_LEVELS.join(", ")
            ),
        ));
    }
}

fn check_storage(config: &LeadlineConfig, errors: &mut Vec<ConfigError>) {
    if config.storage.database_path.trim().is_empty() {
        errors.push(invalid("storage.database_path", "must not be empty"));
    }
    if !(1..=60_000).contains(&config.storage.busy_timeout_ms) {
        errors.push(invalid(
            "storage.busy_timeout_ms",
            format!(
                "must be between 1 and 60000, got {}",
                config.storage.busy_timeout_ms
            ),
        ));
    }
}

/// `source_table` ends up in stored rows and log fields, so it stays a
/// plain identifier.
fn check_dispatch(config: &LeadlineConfig, errors: &mut Vec<ConfigError>) {
    let source = config.dispatch.source_table.trim();
    if source.is_empty() {
        errors.push(invalid("dispatch.source_table", "must not be empty"));
    } else if !source
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        errors.push(invalid(
            "dispatch.source_table",
            format!("`{source}` may only contain letters, digits, `_` and `-`"),
        ));
    }
    if config.dispatch.admin_actor.trim().is_empty() {
        errors.push(invalid("dispatch.admin_actor", "must not be empty"));
    }
}

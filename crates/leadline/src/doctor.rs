// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `leadline doctor` command implementation.
//!
//! Runs diagnostic checks against the Leadline environment: configuration,
//! database reachability, schema migrations and the stored matching
//! configuration. `--deep` adds an SQLite integrity check.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use leadline_config::model::{LeadlineConfig, StorageConfig};
use leadline_core::StorageAdapter;
use leadline_dispatch::{ConfigSource, ConfigStore};
use leadline_storage::{Database, SqliteStorage};

/// Outcome of one doctor check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// One line of the doctor report.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, message: impl Into<String>, start: Instant) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            duration: start.elapsed(),
        }
    }
}

/// Run the `leadline doctor` command and print a report.
pub async fn run_doctor(
    config: &LeadlineConfig,
    config_path: Option<&Path>,
    deep: bool,
    use_color: bool,
) {
    let mut results = vec![check_config(config_path)];
    let start = Instant::now();
    let storage = match open_existing(&config.storage).await {
        Ok(storage) => {
            results.push(CheckResult::new(
                "Database",
                CheckStatus::Pass,
                "connected, migrations applied",
                start,
            ));
            Some(storage)
        }
        Err(result) => {
            results.push(result);
            None
        }
    };

    if let Some(storage) = &storage {
        results.push(check_matching_config(Arc::clone(storage)).await);
        if deep {
            results.push(check_db_integrity(storage).await);
        }
        if let Err(e) = storage.close().await {
            tracing::warn!(error = %e, "failed to close storage cleanly");
        }
    }

    print_report(&results, deep, use_color);
}

fn print_report(results: &[CheckResult], deep: bool, use_color: bool) {
    println!();
    println!("  leadline doctor");
    println!("  {}", "-".repeat(50));

    let mut issues = 0;
    for result in results {
        let duration_ms = result.duration.as_millis();
        let line = if use_color {
            use colored::Colorize;
            let (symbol, message) = match result.status {
                CheckStatus::Pass => ("✓".green(), result.message.normal()),
                CheckStatus::Warn => ("!".yellow(), result.message.yellow()),
                CheckStatus::Fail => ("✗".red(), result.message.red()),
            };
            format!(
                "    {symbol} {:<20} {message} ({duration_ms}ms)",
                result.name
            )
        } else {
            let tag = match result.status {
                CheckStatus::Pass => "[OK]  ",
                CheckStatus::Warn => "[WARN]",
                CheckStatus::Fail => "[FAIL]",
            };
            format!(
                "    {tag} {:<20} {} ({duration_ms}ms)",
                result.name, result.message
            )
        };
        if result.status != CheckStatus::Pass {
            issues += 1;
        }
        println!("{line}");
    }

    println!();
    if issues > 0 {
        let issue_word = if issues == 1 { "issue" } else { "issues" };
        println!("  {issues} {issue_word} found.");
        if !deep {
            println!("  Run with --deep to include the database integrity check.");
        }
    } else {
        println!("  All checks passed.");
    }
    println!();
}

/// The service configuration parses and validates.
fn check_config(config_path: Option<&Path>) -> CheckResult {
    let start = Instant::now();
    let loaded = match config_path {
        Some(path) => leadline_config::load_and_validate_path(path),
        None => leadline_config::load_and_validate(),
    };
    match loaded {
        Ok(_) => CheckResult::new("Configuration", CheckStatus::Pass, "valid", start),
        Err(errors) => CheckResult::new(
            "Configuration",
            CheckStatus::Fail,
            format!("{} error(s)", errors.len()),
            start,
        ),
    }
}

/// Open the configured database if the file exists.
///
/// A missing file is only a warning: it is created on first use.
async fn open_existing(config: &StorageConfig) -> Result<Arc<SqliteStorage>, CheckResult> {
    let start = Instant::now();
    if !Path::new(&config.database_path).exists() {
        return Err(CheckResult::new(
            "Database",
            CheckStatus::Warn,
            format!(
                "not found: {} (will be created on first run)",
                config.database_path
            ),
            start,
        ));
    }
    let storage = SqliteStorage::open(config.clone()).await.map_err(|e| {
        CheckResult::new("Database", CheckStatus::Fail, format!("open failed: {e}"), start)
    })?;
    storage.health_check().await.map_err(|e| {
        CheckResult::new("Database", CheckStatus::Fail, format!("query failed: {e}"), start)
    })?;
    Ok(Arc::new(storage))
}

/// Check that the stored matching configuration is usable.
async fn check_matching_config(storage: Arc<SqliteStorage>) -> CheckResult {
    let start = Instant::now();
    let loaded = ConfigStore::new(storage).get_config().await;
    match loaded.source {
        ConfigSource::Stored => CheckResult::new(
            "Matching config",
            CheckStatus::Pass,
            format!("stored ({:?})", loaded.config.matching_strategy),
            start,
        ),
        ConfigSource::Defaults => CheckResult::new(
            "Matching config",
            CheckStatus::Warn,
            "no valid stored row, dispatch uses defaults",
            start,
        ),
    }
}

/// `--deep`: run `PRAGMA integrity_check` on the dispatch database.
async fn check_db_integrity(storage: &SqliteStorage) -> CheckResult {
    let start = Instant::now();
    let db: &Database = match storage.database() {
        Ok(db) => db,
        Err(e) => {
            return CheckResult::new("DB integrity", CheckStatus::Fail, e.to_string(), start);
        }
    };
    let result = db
        .connection()
        .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
            let mut stmt = conn.prepare("PRAGMA integrity_check")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect()
        })
        .await;

    match result {
        Ok(rows) if rows.len() == 1 && rows[0] == "ok" => {
            CheckResult::new("DB integrity", CheckStatus::Pass, "ok", start)
        }
        Ok(rows) => CheckResult::new(
            "DB integrity",
            CheckStatus::Fail,
            format!("{} issue(s) found", rows.len()),
            start,
        ),
        Err(e) => CheckResult::new(
            "DB integrity",
            CheckStatus::Fail,
            format!("check failed: {e}"),
            start,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_storage_config(dir: &tempfile::TempDir) -> StorageConfig {
        StorageConfig {
            database_path: dir.path().join("doctor.db").to_string_lossy().into_owned(),
            ..StorageConfig::default()
        }
    }

    #[test]
    fn check_status_equality() {
        assert_eq!(CheckStatus::Pass, CheckStatus::Pass);
        assert_ne!(CheckStatus::Pass, CheckStatus::Fail);
    }

    #[test]
    #[serial_test::serial]
    fn check_config_fails_on_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leadline.toml");
        std::fs::write(&path, "[storage]\nwal_mod = true\n").unwrap();
        let result = check_config(Some(&path));
        assert_eq!(result.status, CheckStatus::Fail);
        assert_eq!(result.name, "Configuration");
    }

    #[tokio::test]
    async fn missing_database_warns() {
        let dir = tempfile::tempdir().unwrap();
        let result = open_existing(&temp_storage_config(&dir)).await.unwrap_err();
        assert_eq!(result.status, CheckStatus::Warn);
        assert!(result.message.contains("not found"));
    }

    #[tokio::test]
    async fn existing_database_passes_all_checks() {
        let dir = tempfile::tempdir().unwrap();
        let config = temp_storage_config(&dir);
        let created = SqliteStorage::open(config.clone()).await.unwrap();
        created.close().await.unwrap();
        drop(created);

        let storage = open_existing(&config).await.unwrap();
        let matching = check_matching_config(Arc::clone(&storage)).await;
        assert_eq!(matching.status, CheckStatus::Warn);
        let integrity = check_db_integrity(&storage).await;
        assert_eq!(integrity.status, CheckStatus::Pass, "{}", integrity.message);
    }
}

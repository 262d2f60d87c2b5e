// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Service configuration for the `leadline` binary.
//!
//! Every section denies unknown fields so a misspelled key fails startup
//! with a suggestion instead of being silently ignored.

use serde::{Deserialize, Serialize};

/// Top-level service configuration. Every section may be omitted.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LeadlineConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// SQLite database location and pragmas.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Dispatch entry point settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Instance name, reported in logs.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Default tracing level for the `leadline` target, overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "leadline".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// SQLite file holding leads, providers, assignments and events.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Open the database in WAL mode.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// How long a writer waits on another process's lock before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("leadline").join("leadline.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("leadline.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

/// Dispatch entry point configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// `source_table` recorded on leads that arrive without one.
    #[serde(default = "default_source_table")]
    pub source_table: String,

    /// Actor recorded for admin operations issued from the CLI.
    #[serde(default = "default_admin_actor")]
    pub admin_actor: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            source_table: default_source_table(),
            admin_actor: default_admin_actor(),
        }
    }
}

fn default_source_table() -> String {
    "leads".to_string()
}

fn default_admin_actor() -> String {
    "cli-admin".to_string()
}

// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for the Leadline dispatch engine.
//!
//! Provides WAL-mode SQLite with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and typed query modules for
//! leads, providers, assignments, lifecycle events and the matching
//! configuration. [`SqliteStorage`] implements every repository trait
//! from `leadline-core`.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;
pub mod rows;

pub use adapter::SqliteStorage;
pub use database::Database;

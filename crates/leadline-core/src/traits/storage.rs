// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for persistence backends (SQLite, etc.).

use async_trait::async_trait;

use crate::error::LeadlineError;

/// Lifecycle of a storage backend.
#[async_trait]
pub trait StorageAdapter: Send + Sync + 'static {
    /// Returns the human-readable name of this backend.
    fn name(&self) -> &str;

    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), LeadlineError>;

    /// Runs a trivial query to confirm the backend is reachable.
    async fn health_check(&self) -> Result<(), LeadlineError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), LeadlineError>;
}

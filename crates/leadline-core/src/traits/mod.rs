// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence seams for the dispatch engine.
//!
//! The dispatch core talks to storage only through these traits, all using
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod repository;
pub mod storage;

pub use repository::{
    AssignmentRepository, ConfigRepository, DispatchStore, EventRepository, LeadRepository,
    ProviderDirectory,
};
pub use storage::StorageAdapter;

// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Leadline dispatch engine.
//!
//! This crate provides the domain types, repository traits and error type
//! used throughout the Leadline workspace. Storage backends implement the
//! traits defined here; the matching and dispatch crates consume them.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{FieldError, LeadlineError};
pub use types::{
    Assignment, AssignmentStatus, DispatchHints, EventContext, EventType, Lead, LeadEvent,
    LeadStatus, NewLead, Provider, ProviderLoad, QuotaPolicy, SkipReason, Urgency, UrgencyTier,
};

pub use traits::{
    AssignmentRepository, ConfigRepository, DispatchStore, EventRepository, LeadRepository,
    ProviderDirectory, StorageAdapter,
};

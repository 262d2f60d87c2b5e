// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lead lifecycle event log.
//!
//! [`EventLogger`] appends events on behalf of the dispatch and lifecycle
//! code. Logging is best-effort: a failed append is reported through
//! `tracing` and a counter, never returned to the caller, so a broken event
//! store cannot undo a dispatch that already committed.
//!
//! [`lifecycle`] checks a timeline against the expected event order.

pub mod lifecycle;
pub mod logger;

pub use lifecycle::{LifecycleAnomaly, check_timeline};
pub use logger::EventLogger;

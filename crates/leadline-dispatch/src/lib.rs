// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dispatch orchestration for the Leadline engine.
//!
//! [`Dispatcher`] turns "a lead exists" into a bounded batch of provider
//! assignments: it loads the matching configuration, filters and ranks the
//! provider directory, reserves assignments one provider at a time and logs
//! the outcome. It also drives the rest of the lead lifecycle (provider
//! actions, client decisions, expiry and auto-reassignment sweeps).

pub mod config_store;
pub mod lifecycle;
pub mod orchestrator;
pub mod recording;
pub mod writer;

pub use config_store::{ConfigSource, ConfigStore, LoadedConfig};
pub use lifecycle::{ClientDecision, ProviderAction};
pub use orchestrator::{DispatchTrigger, Dispatcher, Intake};
pub use writer::{AssignmentWriter, WriteOutcome};

// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Leadline integration tests.
//!
//! Provides a temp-database harness, fixture builders and a fault-injecting
//! store for deterministic tests without external services.
//!
//! # Components
//!
//! - [`TestHarness`] - SQLite storage in a temp directory plus a dispatcher
//! - [`FlakyStore`] - Store wrapper that fails chosen operations on demand
//! - [`fixtures`] - Provider and lead builders with sensible defaults

pub mod fixtures;
pub mod flaky_store;
pub mod harness;

pub use flaky_store::FlakyStore;
pub use harness::TestHarness;

// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-entity query functions over a [`Database`](crate::Database).

pub mod assignments;
pub mod config;
pub mod events;
pub mod leads;
pub mod providers;

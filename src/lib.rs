// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! shotsort: AI screenshot renamer & organizer
//!
//! Watches a folder for new macOS screenshots, asks a vision model for a
//! category and a short name, then moves each file into a category folder
//! without ever overwriting an existing file.

pub mod classifier;
pub mod config;
pub mod error;
pub mod matcher;
pub mod pipeline;
pub mod queue;
pub mod relocator;
pub mod watcher;

pub use config::{AppConfig, Settings};
pub use error::{Result, ShotsortError};

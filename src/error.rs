// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for shotsort

use thiserror::Error;

/// Result type alias for shotsort operations
pub type Result<T> = std::result::Result<T, ShotsortError>;

/// shotsort error types
#[derive(Error, Debug)]
pub enum ShotsortError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Selected provider {0} is not supported")]
    UnsupportedProvider(String),

    #[error("{0} is not provided")]
    MissingCredential(String),

    #[error("Relocation error: {0}")]
    Relocation(String),

    #[error("Queue error: {0}")]
    Queue(String),
}

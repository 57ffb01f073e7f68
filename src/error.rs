// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 Aviary Contributors

//! Error types for Aviary

use thiserror::Error;

/// Result type alias for Aviary operations
pub type Result<T> = std::result::Result<T, AviaryError>;

/// Aviary error types
#[derive(Error, Debug)]
pub enum AviaryError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Oracle error: {0}")]
    Oracle(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

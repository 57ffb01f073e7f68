// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 Aviary Contributors

//! Aviary: AI-powered bird photo classifier and organizer
//!
//! Classifies a folder of photographs by bird species using the Gemini
//! vision API, stages each photo under a filename that encodes its
//! species, then distributes staged photos into per-species folders
//! with model-generated field notes.

pub mod classifier;
pub mod config;
pub mod context;
pub mod error;
pub mod gemini;
pub mod naming;
pub mod pipeline;
pub mod species;
pub mod worker;

pub use config::AppConfig;
pub use error::{AviaryError, Result};

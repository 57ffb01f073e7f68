// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 Aviary Contributors

//! Rolling species context carried across classification calls
//!
//! The model has no memory between calls, so every prompt restates the
//! species seen so far. The context records one label per processed
//! image, forward-only, and is owned by a single pass at a time.

use crate::naming::SENTINEL_LABEL;

/// Labels assigned so far in one classification pass.
#[derive(Debug, Clone)]
pub struct SpeciesContext {
    /// Every assigned label in processing order, seeded with the
    /// sentinel so the most recent label is always defined.
    history: Vec<String>,
    /// Distinct real species in first-seen order. The sentinel is
    /// never a member.
    seen: Vec<String>,
}

impl SpeciesContext {
    pub fn new() -> Self {
        Self {
            history: vec![SENTINEL_LABEL.to_string()],
            seen: Vec::new(),
        }
    }

    /// Record the outcome of one classified image. `None` stands for
    /// an unidentified result and is recorded as the sentinel.
    pub fn record(&mut self, label: Option<&str>) {
        let entry = label.unwrap_or(SENTINEL_LABEL);

        if entry != SENTINEL_LABEL && !self.seen.iter().any(|s| s == entry) {
            self.seen.push(entry.to_string());
        }

        self.history.push(entry.to_string());
    }

    /// Most recently assigned label; the sentinel before any image
    /// has been classified.
    pub fn last(&self) -> &str {
        self.history
            .last()
            .map(String::as_str)
            .unwrap_or(SENTINEL_LABEL)
    }

    /// Distinct species identified so far, in first-seen order.
    pub fn seen(&self) -> &[String] {
        &self.seen
    }

    /// Full label history including sentinel outcomes and the seed.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Number of images recorded so far (the seed entry excluded).
    pub fn images_recorded(&self) -> usize {
        self.history.len() - 1
    }
}

impl Default for SpeciesContext {
    fn default() -> Self {
        Self::new()
    }
}

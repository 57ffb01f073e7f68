// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 Aviary Contributors

//! Write-once per-species knowledge cache
//!
//! Each species folder carries one `info.txt` with model-generated
//! field notes. Creation is existence-checked, so a species costs at
//! most one generation call and interrupted runs resume for free.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::gemini::VisionModel;
use crate::Result;

/// Name of the per-species metadata file.
pub const INFO_FILE_NAME: &str = "info.txt";

/// Species folders and info files under one output root.
pub struct SpeciesCache {
    root: PathBuf,
}

impl SpeciesCache {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Directory holding one species' photos and info file.
    pub fn species_dir(&self, label: &str) -> PathBuf {
        self.root.join(label)
    }

    /// Create the species directory if it does not exist yet.
    pub fn ensure_species_dir(&self, label: &str) -> Result<PathBuf> {
        let dir = self.species_dir(label);
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
            info!("Created species folder: {}", label);
        }
        Ok(dir)
    }

    /// Whether an info file already exists for this species.
    pub fn has_info(&self, label: &str) -> bool {
        self.species_dir(label).join(INFO_FILE_NAME).exists()
    }

    /// Generate and write the info file for a species unless one is
    /// already on disk. Returns true when a new file was written.
    ///
    /// Generation and write failures are logged and swallowed: the
    /// folder keeps its photos and a later run retries, since the
    /// check is existence-based.
    pub async fn ensure_info(&self, label: &str, model: &dyn VisionModel) -> bool {
        if self.has_info(label) {
            return false;
        }

        info!("Fetching species info for {}", label);

        let text = match model.generate_text(&build_info_prompt(label)).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to fetch species info for {}: {}", label, e);
                return false;
            }
        };

        let path = self.species_dir(label).join(INFO_FILE_NAME);
        match std::fs::write(&path, format!("Name: {}\n\n{}", label, text)) {
            Ok(()) => {
                info!("Created info file for {}", label);
                true
            }
            Err(e) => {
                warn!("Failed to write info file for {}: {}", label, e);
                false
            }
        }
    }
}

/// Prompt requesting structured field notes for one species.
fn build_info_prompt(label: &str) -> String {
    format!(
        "For the bird species '{}', provide the following information in this exact format:\n\
         Scientific name: [Scientific name]\n\
         Description: [100 words about the bird's appearance, habitat, behavior, and characteristics]\n\
         Fact 1: [280 character-length interesting fact about the bird]\n\
         Fact 2: [280 character-length interesting fact about the bird]\n\
         Fact 3: [280 character-length interesting fact about the bird]\n\
         Fact 4: [280 character-length interesting fact about the bird]\n\
         Fact 5: [280 character-length interesting fact about the bird]\n\
         Fact 6: [280 character-length interesting fact about the bird]\n\
         Fact 7: [280 character-length interesting fact about the bird]\n\
         Fact 8: [280 character-length interesting fact about the bird]\n\
         Fact 9: [280 character-length interesting fact about the bird]\n\
         Fact 10: [280 character-length interesting fact about the bird]\n\n\
         Be specific and accurate. The description should be exactly 100 words.\n\
         The fact should be engaging and informative, under 280 characters.",
        label
    )
}

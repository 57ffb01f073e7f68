// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 Aviary Contributors

//! Configuration management for Aviary

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// AI engine configuration
    #[serde(default)]
    pub engine: EngineConfig,

    /// Free-text hint about where the photos were likely taken,
    /// interpolated into classification prompts. Empty disables it.
    #[serde(default = "default_location_hint")]
    pub location_hint: String,

    /// Path of the saved credential file
    #[serde(default = "default_credentials_path")]
    pub credentials_path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EngineConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

// Default value functions
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}
fn default_timeout() -> u64 {
    120
}
fn default_location_hint() -> String {
    "India".to_string()
}
fn default_credentials_path() -> String {
    "credentials.json".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            location_hint: default_location_hint(),
            credentials_path: default_credentials_path(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| crate::AviaryError::Config(format!("Failed to parse config: {}", e)))?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Location hint to feed into prompts, if one is configured.
    pub fn location_hint(&self) -> Option<&str> {
        if self.location_hint.is_empty() {
            None
        } else {
            Some(&self.location_hint)
        }
    }
}

/// Persisted API credential
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Credentials {
    #[serde(default)]
    pub api_key: String,
}

impl Credentials {
    /// Load saved credentials. A missing or corrupt file yields an
    /// empty key, never an error.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(credentials) => credentials,
                Err(e) => {
                    tracing::warn!("Ignoring corrupt credentials file {:?}: {}", path, e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Rewrite the credential file in full.
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

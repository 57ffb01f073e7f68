// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 Aviary Contributors

//! Gemini API client for vision and text generation

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::EngineConfig;
use crate::{AviaryError, Result};

/// A vision-capable model the pipelines can call.
///
/// The live implementation is [`GeminiClient`]; tests substitute
/// scripted models so no pass ever needs the network.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Send a prompt plus one inline image and return the reply text.
    async fn describe_image(&self, prompt: &str, image: &[u8], mime_type: &str) -> Result<String>;

    /// Send a text-only prompt and return the reply text.
    async fn generate_text(&self, prompt: &str) -> Result<String>;
}

/// Gemini REST API client
pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

impl Part {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            inline_data: None,
        }
    }

    fn inline_image(mime_type: &str, data: String) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: mime_type.to_string(),
                data,
            }),
        }
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ReplyPart>,
}

#[derive(Deserialize)]
struct ReplyPart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    name: String,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(config: &EngineConfig, api_key: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: normalize_base_url(&config.base_url),
            model: config.model.clone(),
            api_key: api_key.to_string(),
        }
    }

    /// List models available to this API key
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/models?key={}", self.base_url, self.api_key);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(AviaryError::Oracle(format!(
                "Gemini returned status {}",
                response.status()
            )));
        }

        let listing: ModelsResponse = response.json().await?;
        Ok(listing.models.into_iter().map(|m| m.name).collect())
    }

    /// One generateContent call; a single attempt, no retries.
    async fn generate(&self, parts: Vec<Part>) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let request = GenerateRequest {
            contents: vec![Content { parts }],
        };

        debug!("Sending request to Gemini: model={}", self.model);

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(AviaryError::Oracle(format!(
                "Gemini returned status {}",
                response.status()
            )));
        }

        let reply: GenerateResponse = response.json().await?;
        extract_reply_text(reply)
    }
}

#[async_trait]
impl VisionModel for GeminiClient {
    async fn describe_image(&self, prompt: &str, image: &[u8], mime_type: &str) -> Result<String> {
        let encoded = general_purpose::STANDARD.encode(image);
        self.generate(vec![
            Part::text(prompt),
            Part::inline_image(mime_type, encoded),
        ])
        .await
    }

    async fn generate_text(&self, prompt: &str) -> Result<String> {
        self.generate(vec![Part::text(prompt)]).await
    }
}

/// Trim trailing slashes so path joining stays predictable.
fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Match a listed model name (e.g. "models/gemini-2.0-flash-001")
/// against the configured one.
pub fn model_matches(listed: &str, model: &str) -> bool {
    listed.trim_start_matches("models/").starts_with(model)
}

/// Pull the reply text out of the first candidate.
fn extract_reply_text(reply: GenerateResponse) -> Result<String> {
    reply
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content.parts.into_iter().next())
        .map(|p| p.text)
        .ok_or_else(|| AviaryError::Oracle("Empty model reply".to_string()))
}

// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 Aviary Contributors

//! Context-carrying bird classifier
//!
//! Drives one photo through the vision model. Every prompt restates
//! the species seen so far, because the model itself remembers nothing
//! between calls; the reply is parsed leniently and any failure
//! degrades to an unidentified result instead of aborting the batch.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::context::SpeciesContext;
use crate::gemini::VisionModel;
use crate::naming::{mime_type, sanitize_label};
use crate::Result;

/// Outcome of classifying one photo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identification {
    pub contains_bird: bool,
    /// `None` when no bird was found or the name was unusable.
    pub label: Option<String>,
    /// Advisory only: marks the staged filename, never skips the file.
    pub blurred: bool,
}

/// Classifier binding a vision model to a rolling species context.
pub struct Classifier {
    model: Arc<dyn VisionModel>,
    location_hint: Option<String>,
}

impl Classifier {
    pub fn new(model: Arc<dyn VisionModel>, location_hint: Option<String>) -> Self {
        Self {
            model,
            location_hint,
        }
    }

    pub fn model(&self) -> &dyn VisionModel {
        self.model.as_ref()
    }

    pub fn location_hint(&self) -> Option<&str> {
        self.location_hint.as_deref()
    }

    /// Classify one photo and record the outcome in the context.
    ///
    /// Never fails: read errors, transport errors, and unparseable
    /// replies all degrade to an unidentified result, logged, and the
    /// sentinel still enters the context so history stays one entry
    /// per image.
    pub async fn identify(&self, path: &Path, context: &mut SpeciesContext) -> Identification {
        let prompt = build_identify_prompt(context, self.location_hint.as_deref());

        let identification = match self.call_model(path, &prompt).await {
            Ok(reply) => {
                debug!("Model reply for {:?}: {}", path, reply);
                parse_reply(&reply)
            }
            Err(e) => {
                warn!("Classification failed for {:?}: {}", path, e);
                Identification::default()
            }
        };

        context.record(identification.label.as_deref());
        identification
    }

    async fn call_model(&self, path: &Path, prompt: &str) -> Result<String> {
        let image = std::fs::read(path)?;
        self.model
            .describe_image(prompt, &image, mime_type(path))
            .await
    }
}

/// Build the identification prompt for one photo.
pub fn build_identify_prompt(context: &SpeciesContext, location_hint: Option<&str>) -> String {
    let mut prompt = String::from(
        "Analyze this image and tell me:\n\
         1. Does this image contain a bird? (Yes/No)\n\
         2. If yes, what is the name of the bird? (If you can identify it)\n\
         3. Is the image too blurred or out of focus? (Yes/No)\n\
         Please respond in this exact format:\n\
         Contains bird: [Yes/No]\n\
         Bird name: [Name or N/A]\n\
         Is blurred: [Yes/No]\n\n\
         Be exact in the name of the bird. Qualify the exact species. \
         Be specific. Don't use scientific names.\n",
    );

    if let Some(hint) = location_hint {
        prompt.push_str(&format!(
            "The bird is most likely to be shot in {}, \
             but might also have been shot in other countries.\n",
            hint
        ));
    }

    let seen = if context.seen().is_empty() {
        "none yet".to_string()
    } else {
        context.seen().join(", ")
    };
    prompt.push_str(&format!(
        "Species identified so far in this batch: {}.\n",
        seen
    ));
    prompt.push_str(&format!(
        "The previous photo was identified as: {}.\n",
        context.last()
    ));
    prompt.push_str(
        "If this bird matches a species already identified, \
         reuse that exact spelling instead of inventing a new variant.",
    );

    prompt
}

/// Parse a free-text model reply into an [`Identification`].
///
/// Line-oriented and tolerant: fixed prefixes are matched on trimmed
/// lines, missing lines fall back to defaults, and the label is
/// dropped unless the reply affirms a bird is present.
pub fn parse_reply(reply: &str) -> Identification {
    let mut contains_bird = false;
    let mut label: Option<String> = None;
    let mut name_seen = false;
    let mut blurred = false;

    for line in reply.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix("Contains bird:") {
            contains_bird = affirmative(value);
        } else if let Some(value) = line.strip_prefix("Bird name:") {
            // First name line wins, as in the reply template.
            if !name_seen {
                label = sanitize_label(value);
                name_seen = true;
            }
        } else if let Some(value) = line.strip_prefix("Is blurred:") {
            blurred = affirmative(value);
        }
    }

    if !contains_bird {
        label = None;
    }

    Identification {
        contains_bird,
        label,
        blurred,
    }
}

fn affirmative(value: &str) -> bool {
    value.to_lowercase().contains("yes")
}

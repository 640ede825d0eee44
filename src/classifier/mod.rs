// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Screenshot classification with a vision model
//!
//! The classifier never fails: any problem talking to the model, or any
//! answer it cannot use, degrades to keeping the original name with no
//! category.

pub mod openai;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{Categories, Detail, Settings};
use crate::{Result, ShotsortError};

pub use openai::OpenAiClient;

/// What the model suggests for a screenshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// One of the configured categories, if the model picked one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// New filename without extension
    pub filename: String,
}

impl ClassificationResult {
    /// Keep the original name, no category
    pub fn fallback(original: &str) -> Self {
        Self {
            category: None,
            filename: original.to_string(),
        }
    }
}

/// A single vision request
#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub prompt: String,
    /// `data:` URI holding the encoded image
    pub image_url: String,
    pub detail: Detail,
    pub max_tokens: u32,
}

/// The part of a model response the classifier looks at
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub finish_reason: Option<String>,
    pub content: Option<String>,
}

/// Transport to a vision-capable model
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Model name, for logging
    fn model(&self) -> &str;

    /// Provider name, for logging
    fn provider(&self) -> &str;

    /// Submit one request and wait for the answer
    async fn complete(&self, request: &VisionRequest) -> Result<Completion>;
}

/// Classifies screenshots with a fixed prompt
pub struct Classifier {
    model: Arc<dyn VisionModel>,
    prompt: String,
    detail: Detail,
    max_tokens: u32,
}

impl Classifier {
    pub fn new(
        model: Arc<dyn VisionModel>,
        categories: &Categories,
        detail: Detail,
        max_tokens: u32,
    ) -> Self {
        Self {
            model,
            prompt: build_prompt(categories),
            detail,
            max_tokens,
        }
    }

    pub fn from_settings(model: Arc<dyn VisionModel>, settings: &Settings) -> Self {
        Self::new(
            model,
            &settings.categories,
            settings.detail,
            settings.provider_config.max_tokens,
        )
    }

    /// The instructional prompt sent with every image
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Ask the model for a category and filename
    pub async fn classify(&self, path: &Path) -> ClassificationResult {
        let original = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        match self.try_classify(path, &original).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Classification failed for {:?}: {}", path, e);
                ClassificationResult::fallback(&original)
            }
        }
    }

    async fn try_classify(&self, path: &Path, original: &str) -> Result<ClassificationResult> {
        let data = tokio::fs::read(path).await?;
        let image_url = format!(
            "data:{};base64,{}",
            mime_type(path),
            general_purpose::STANDARD.encode(&data)
        );

        info!(
            "Asking {} ({}) to rename {}",
            self.model.model(),
            self.model.provider(),
            original
        );

        let request = VisionRequest {
            prompt: self.prompt.clone(),
            image_url,
            detail: self.detail,
            max_tokens: self.max_tokens,
        };
        let completion = self.model.complete(&request).await?;

        let reason = completion.finish_reason.as_deref().unwrap_or("unknown");
        if reason != "stop" {
            warn!("Model stopped generating: {}", reason);
            return Ok(ClassificationResult::fallback(original));
        }

        let content = match completion.content.as_deref().map(str::trim) {
            Some(c) if !c.is_empty() => c,
            _ => {
                warn!("Model returned no content for {}", original);
                return Ok(ClassificationResult::fallback(original));
            }
        };
        debug!("Model response: {}", content);

        let mut result: ClassificationResult = serde_json::from_str(strip_code_fence(content))
            .map_err(|e| ShotsortError::Provider(format!("Malformed model response: {}", e)))?;

        result.filename = clean_filename(&result.filename);
        if result.filename.is_empty() {
            result.filename = original.to_string();
        }
        result.category = result
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        Ok(result)
    }
}

/// Build the instructional prompt from the category descriptions
pub fn build_prompt(categories: &Categories) -> String {
    let rules = categories
        .iter()
        .map(|(name, description)| format!("If {}, set it to \"{}\"", description, name))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Suggest a short and concise file name in 1-3 words.\n\
         If you can identify the software or website being used, \
         add that as part of the new name.\n\
         For example, terminal, youtube, photoshop, etc.\n\
         Do not include file extension such as .png, .jpg or .txt. Use dash to connect words.\n\
         Identify the image's category from the following rule:\n\
         {}\n\
         Return as structured json in the format {{ category, filename }} and nothing else.",
        rules
    )
}

fn mime_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}

/// Some models wrap JSON in a markdown fence even in JSON mode
fn strip_code_fence(content: &str) -> &str {
    let Some(inner) = content.strip_prefix("```") else {
        return content;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Make a model-suggested name safe to use as a filename
pub fn clean_filename(raw: &str) -> String {
    let mut clean = raw.trim().trim_matches('"').trim_matches('\'').trim().to_string();

    for ext in [".png", ".jpg", ".jpeg", ".txt"] {
        if clean.to_ascii_lowercase().ends_with(ext) {
            clean.truncate(clean.len() - ext.len());
            break;
        }
    }

    let clean: String = clean
        .chars()
        .filter(|c| !c.is_control() && *c != '/' && *c != '\\')
        .collect();

    clean
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .trim_matches(|c| c == '.' || c == '-')
        .to_string()
}

// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for shotsort

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

use crate::watcher::StabilityWindow;
use crate::{Result, ShotsortError};

/// Environment variable holding the OpenAI credential
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";

/// Category name -> natural-language description
pub type Categories = BTreeMap<String, String>;

/// Configuration file contents, merged over built-in defaults
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AppConfig {
    /// Categories offered to the model, each with its own output folder
    pub categories: Categories,

    /// Local Ollama server (OpenAI-compatible endpoint)
    pub ollama: ProviderConfig,

    /// OpenAI API
    pub openai: ProviderConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(rename = "baseURL")]
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Supported API providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Ollama,
}

/// Image resolution used for inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Detail {
    #[default]
    Low,
    High,
    Auto,
}

fn default_timeout() -> u64 {
    120
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Ollama => "ollama",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ShotsortError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "ollama" => Ok(Provider::Ollama),
            other => Err(ShotsortError::UnsupportedProvider(other.to_string())),
        }
    }
}

impl Detail {
    pub fn as_str(&self) -> &'static str {
        match self {
            Detail::Low => "low",
            Detail::High => "high",
            Detail::Auto => "auto",
        }
    }
}

impl fmt::Display for Detail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let categories = [
            ("code", "the majority of the text is computer code"),
            ("reference", "the image is a photograph"),
            ("web", "the image shows a webpage"),
            ("other", "the image doesn't belong to other categories"),
        ]
        .into_iter()
        .map(|(name, description)| (name.to_string(), description.to_string()))
        .collect();

        Self {
            categories,
            ollama: ProviderConfig {
                base_url: "http://localhost:11434/v1/".to_string(),
                model: "llava".to_string(),
                max_tokens: 30,
                timeout_secs: default_timeout(),
            },
            openai: ProviderConfig {
                base_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-4o-mini".to_string(),
                max_tokens: 30,
                timeout_secs: default_timeout(),
            },
        }
    }
}

impl AppConfig {
    /// Load the user configuration from a JSON file, falling back to defaults
    ///
    /// The file has the shape `{ "default": { ... } }`. Top-level keys under
    /// `default` replace the built-in values wholesale.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            info!("User configuration file not found at {:?}. Using default configuration.", path);
            return Self::default();
        }

        match Self::try_load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Error loading user configuration: {}", e);
                Self::default()
            }
        }
    }

    fn try_load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        Self::default().merged_with(&user)
    }

    /// Shallow-merge the `default` object of a user config over `self`
    pub fn merged_with(&self, user: &Value) -> Result<Self> {
        let overrides = match user.get("default") {
            None | Some(Value::Null) => return Ok(self.clone()),
            Some(Value::Object(map)) => map,
            Some(_) => {
                return Err(ShotsortError::Config(
                    "\"default\" must be a JSON object".to_string(),
                ))
            }
        };

        let mut base = serde_json::to_value(self)?;
        if let Value::Object(base_map) = &mut base {
            for (key, value) in overrides {
                base_map.insert(key.clone(), value.clone());
            }
        }

        serde_json::from_value(base)
            .map_err(|e| ShotsortError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Settings for the selected provider
    pub fn provider(&self, provider: Provider) -> &ProviderConfig {
        match provider {
            Provider::OpenAi => &self.openai,
            Provider::Ollama => &self.ollama,
        }
    }
}

/// Options supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub provider: String,
    pub detail: Detail,
    pub out_dir: Option<PathBuf>,
    pub watch_dir: Option<PathBuf>,
    pub retroactive: bool,
    pub watch: bool,
}

/// Runtime settings, resolved once at startup and shared read-only
#[derive(Debug, Clone)]
pub struct Settings {
    pub provider: Provider,
    pub provider_config: ProviderConfig,
    pub api_key: String,
    pub detail: Detail,
    pub categories: Categories,
    pub watch_dir: PathBuf,
    pub out_dir: PathBuf,
    pub retroactive: bool,
    pub watch: bool,
    pub stability: StabilityWindow,
}

impl Settings {
    /// Validate the run options against the loaded config
    ///
    /// `env` looks up environment variables so credentials can be injected.
    pub fn resolve<F>(config: AppConfig, options: RunOptions, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if !options.watch && !options.retroactive {
            return Err(ShotsortError::Config(
                "Missing options. Add --watch and/or --retroactive".to_string(),
            ));
        }

        let provider: Provider = options.provider.parse()?;

        let api_key = match provider {
            Provider::OpenAi => env(OPENAI_API_KEY)
                .filter(|key| !key.is_empty())
                .ok_or_else(|| ShotsortError::MissingCredential(OPENAI_API_KEY.to_string()))?,
            Provider::Ollama => "ollama".to_string(),
        };

        let watch_dir = match options.watch_dir {
            Some(dir) => dir,
            None => dirs::home_dir()
                .map(|home| home.join("Desktop"))
                .ok_or_else(|| {
                    ShotsortError::Config("Cannot determine home directory".to_string())
                })?,
        };

        let out_dir = options
            .out_dir
            .unwrap_or_else(|| watch_dir.join("Screenshots"));

        Ok(Self {
            provider,
            provider_config: config.provider(provider).clone(),
            api_key,
            detail: options.detail,
            categories: config.categories,
            watch_dir,
            out_dir,
            retroactive: options.retroactive,
            watch: options.watch,
            stability: StabilityWindow::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(provider: &str) -> RunOptions {
        RunOptions {
            provider: provider.to_string(),
            watch_dir: Some(PathBuf::from("/tmp/desk")),
            retroactive: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_shallow_merge_replaces_whole_keys() {
        let user = json!({
            "default": {
                "categories": { "memes": "the image is a meme" },
                "ollama": {
                    "baseURL": "http://box:11434/v1",
                    "model": "llava:13b",
                    "maxTokens": 50
                }
            }
        });

        let merged = AppConfig::default().merged_with(&user).unwrap();

        assert_eq!(merged.categories.len(), 1);
        assert_eq!(merged.categories["memes"], "the image is a meme");
        assert_eq!(merged.ollama.model, "llava:13b");
        assert_eq!(merged.ollama.max_tokens, 50);
        assert_eq!(merged.ollama.timeout_secs, 120);
        assert_eq!(merged.openai, AppConfig::default().openai);
    }

    #[test]
    fn test_merge_without_default_key_keeps_defaults() {
        let merged = AppConfig::default().merged_with(&json!({ "other": 1 })).unwrap();
        assert_eq!(merged, AppConfig::default());
    }

    #[test]
    fn test_merge_rejects_non_object_default() {
        assert!(AppConfig::default().merged_with(&json!({ "default": [1, 2] })).is_err());
    }

    #[test]
    fn test_load_missing_and_malformed_files_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(AppConfig::load(&dir.path().join("nope.json")), AppConfig::default());

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{ not json").unwrap();
        assert_eq!(AppConfig::load(&bad), AppConfig::default());
    }

    #[test]
    fn test_provider_parsing_is_case_insensitive() {
        assert_eq!("OpenAI".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert_eq!("ollama".parse::<Provider>().unwrap(), Provider::Ollama);
        assert!(matches!(
            "gemini".parse::<Provider>(),
            Err(ShotsortError::UnsupportedProvider(p)) if p == "gemini"
        ));
    }

    #[test]
    fn test_resolve_requires_a_mode() {
        let mut opts = options("ollama");
        opts.retroactive = false;
        assert!(matches!(
            Settings::resolve(AppConfig::default(), opts, |_| None),
            Err(ShotsortError::Config(_))
        ));
    }

    #[test]
    fn test_resolve_openai_requires_key() {
        let err = Settings::resolve(AppConfig::default(), options("openai"), |_| None).unwrap_err();
        assert!(matches!(err, ShotsortError::MissingCredential(_)));

        let settings = Settings::resolve(AppConfig::default(), options("openai"), |name| {
            (name == OPENAI_API_KEY).then(|| "sk-test".to_string())
        })
        .unwrap();
        assert_eq!(settings.api_key, "sk-test");
        assert_eq!(settings.provider_config.model, "gpt-4o-mini");
    }

    #[test]
    fn test_resolve_defaults_out_dir_under_watch_dir() {
        let settings =
            Settings::resolve(AppConfig::default(), options("ollama"), |_| None).unwrap();
        assert_eq!(settings.out_dir, PathBuf::from("/tmp/desk/Screenshots"));
        assert_eq!(settings.api_key, "ollama");
        assert_eq!(settings.detail, Detail::Low);
    }
}

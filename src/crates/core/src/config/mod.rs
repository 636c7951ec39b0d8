//! Assistant settings and templates.
//!
//! Persistence is delegated entirely to the host; the core only defines the
//! shape, the defaults and snapshot semantics (a running request keeps the
//! settings it started with; updates apply from the next call).

use quill_ai_adapters::ClientConfig;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// A named, reusable instruction presented as a one-click action. The icon
/// is cosmetic metadata for the host's menus; no core logic branches on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub name: String,
    pub instruction: String,
    #[serde(default)]
    pub icon: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    /// Zero means "unbounded"; the field is then omitted from request bodies.
    pub max_output_tokens: u32,
    pub system_prompt: String,
    pub templates: Vec<Template>,
}

pub fn default_templates() -> Vec<Template> {
    vec![
        Template {
            id: "improve".to_string(),
            name: "Improve".to_string(),
            instruction: "Improve the following text, making it clearer, more accurate and more fluent:".to_string(),
            icon: "edit".to_string(),
            enabled: true,
        },
        Template {
            id: "shorten".to_string(),
            name: "Shorten".to_string(),
            instruction: "Shorten the following text while keeping its main information and points:".to_string(),
            icon: "minimize".to_string(),
            enabled: true,
        },
        Template {
            id: "expand".to_string(),
            name: "Expand".to_string(),
            instruction: "Expand the following text with more detail, examples and explanation, keeping the author's voice:".to_string(),
            icon: "expand".to_string(),
            enabled: true,
        },
        Template {
            id: "translate".to_string(),
            name: "Translate".to_string(),
            instruction: "Translate the following text into English, preserving meaning and tone:".to_string(),
            icon: "globe".to_string(),
            enabled: true,
        },
        Template {
            id: "summarize".to_string(),
            name: "Summarize".to_string(),
            instruction: "Summarize the main content and key points of the following text:".to_string(),
            icon: "list".to_string(),
            enabled: true,
        },
    ]
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.7,
            max_output_tokens: 2000,
            system_prompt: "You are a professional writing assistant. Today is {{date}}. \
                            Help the user improve and edit text; be concise, accurate and useful."
                .to_string(),
            templates: default_templates(),
        }
    }
}

impl AssistantSettings {
    pub fn template(&self, id: &str) -> Option<&Template> {
        self.templates.iter().find(|template| template.id == id)
    }

    pub fn enabled_templates(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter().filter(|template| template.enabled)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.base_url.clone(), self.api_key.clone())
    }
}

/// Holds the live settings for the running assistant. Reads hand out a
/// snapshot clone so in-flight requests never observe a live swap.
pub struct ConfigManager {
    settings: RwLock<AssistantSettings>,
}

impl ConfigManager {
    pub fn new(settings: AssistantSettings) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }

    pub fn snapshot(&self) -> AssistantSettings {
        self.settings
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replace the settings wholesale. Takes effect on the next call.
    pub fn update(&self, settings: AssistantSettings) {
        *self
            .settings
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = settings;
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new(AssistantSettings::default())
    }
}

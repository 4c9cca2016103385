use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{
    DEFAULT_ANALYSIS_PROMPT, DEFAULT_MAIN_KEY, DEFAULT_MAX_TOKENS, DEFAULT_MODIFIER_KEY_1,
    DEFAULT_MODIFIER_KEY_2, DEFAULT_OLLAMA_MODEL, DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL,
    DEFAULT_TEMPERATURE, REDACTED_SECRET,
};

/// Main settings aggregate, mirrored 1:1 by `appsettings*.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Settings {
    /// Global hotkey, owned by the desktop shell
    #[serde(default)]
    pub hot_key_settings: HotKeySettings,

    /// Provider selection and generation options
    #[serde(default)]
    pub general_settings: GeneralSettings,
}

impl Settings {
    /// Fill in the built-in analysis prompt when none is configured
    pub fn apply_default_prompt(&mut self) {
        if self.general_settings.prompt.trim().is_empty() {
            self.general_settings.prompt = DEFAULT_ANALYSIS_PROMPT.to_string();
        }
    }

    /// Copy safe to log: the API key is masked
    pub fn redacted(&self) -> Settings {
        let mut copy = self.clone();
        if copy.general_settings.open_ai_settings.api_key.is_some() {
            copy.general_settings.open_ai_settings.api_key = Some(REDACTED_SECRET.to_string());
        }
        copy
    }
}

/// Which backend answers analysis requests
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AiSource {
    #[default]
    OpenAiApi,
    Ollama,
    /// Anything else found on disk; rejected when a provider is selected
    Unsupported(String),
}

impl From<String> for AiSource {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "openaiapi" | "openai" => AiSource::OpenAiApi,
            "ollama" => AiSource::Ollama,
            _ => AiSource::Unsupported(value),
        }
    }
}

impl From<AiSource> for String {
    fn from(source: AiSource) -> Self {
        match source {
            AiSource::OpenAiApi => "OpenAiApi".to_string(),
            AiSource::Ollama => "Ollama".to_string(),
            AiSource::Unsupported(name) => name,
        }
    }
}

impl fmt::Display for AiSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from(self.clone()))
    }
}

/// General options shared by every provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct GeneralSettings {
    pub ai_source: AiSource,
    /// Analysis prompt placed in front of the captured log text
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub open_ai_settings: OpenAiSettings,
    pub ollama_settings: OllamaSettings,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            ai_source: AiSource::default(),
            prompt: String::new(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            open_ai_settings: OpenAiSettings::default(),
            ollama_settings: OllamaSettings::default(),
        }
    }
}

/// OpenAI-style provider configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct OpenAiSettings {
    pub current_model: Option<String>,
    /// Secret field; `ENC:`-prefixed ciphertext when persisted in production
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            current_model: Some(DEFAULT_OPENAI_MODEL.to_string()),
            api_key: None,
            base_url: Some(DEFAULT_OPENAI_BASE_URL.to_string()),
        }
    }
}

/// Ollama-style provider configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct OllamaSettings {
    pub current_model: Option<String>,
    pub host: Option<String>,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            current_model: Some(DEFAULT_OLLAMA_MODEL.to_string()),
            host: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct HotKeySettings {
    pub modifier_key1: Option<String>,
    pub modifier_key2: Option<String>,
    pub main_key: Option<String>,
}

impl Default for HotKeySettings {
    fn default() -> Self {
        Self {
            modifier_key1: Some(DEFAULT_MODIFIER_KEY_1.to_string()),
            modifier_key2: Some(DEFAULT_MODIFIER_KEY_2.to_string()),
            main_key: Some(DEFAULT_MAIN_KEY.to_string()),
        }
    }
}

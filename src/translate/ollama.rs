use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

use super::Translator;
use crate::config::TranslateConfig;
use crate::error::{DualsubError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationResponse {
    pub response: String,
    pub done: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationResult {
    pub text: String,
}

/// Translator backed by Ollama's `/api/generate` endpoint
pub struct OllamaTranslator {
    client: Client,
    config: TranslateConfig,
    cache: Mutex<HashMap<(String, String), String>>,
}

impl OllamaTranslator {
    pub fn new(config: TranslateConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            config,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Perform the actual translation using Ollama with JSON format
    async fn request_translation(&self, text: &str, target_language: &str) -> Result<String> {
        let request = TranslationRequest {
            model: self.config.model.clone(),
            prompt: build_translation_prompt(text, target_language),
            stream: false,
            format: "json".to_string(),
        };

        let url = format!("{}/api/generate", self.config.endpoint.trim_end_matches('/'));
        debug!("Sending translation request to: {}", url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| DualsubError::Translation(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(DualsubError::Translation(format!(
                "Ollama API error {}: {}",
                status, error_text
            )));
        }

        let translation_response: TranslationResponse = response
            .json()
            .await
            .map_err(|e| DualsubError::Translation(format!("Failed to parse response: {}", e)))?;

        let raw_response = translation_response.response.trim();
        debug!("Raw Ollama response: {}", raw_response);

        extract_translation(raw_response)
    }

    fn cached(&self, key: &(String, String)) -> Option<String> {
        self.cache.lock().ok().and_then(|cache| cache.get(key).cloned())
    }

    fn remember(&self, key: (String, String), translation: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, translation.to_string());
        }
    }
}

#[async_trait]
impl Translator for OllamaTranslator {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String> {
        let key = (text.to_string(), target_language.to_string());
        if let Some(hit) = self.cached(&key) {
            debug!("Translation cache hit for '{}'", text);
            return Ok(hit);
        }

        let translation = self.request_translation(text, target_language).await?;
        self.remember(key, &translation);
        Ok(translation)
    }
}

/// Pull the translation out of a raw model response.
///
/// The JSON form `{"text": ...}` is preferred; anything else goes through
/// line-based cleanup. An empty result is an error.
pub fn extract_translation(raw_response: &str) -> Result<String> {
    if raw_response.is_empty() {
        return Err(DualsubError::Translation("Empty translation received".to_string()));
    }

    let translation = match serde_json::from_str::<TranslationResult>(raw_response) {
        Ok(result) => result.text.trim().to_string(),
        Err(_) => clean_translation_response(raw_response),
    };

    if translation.is_empty() {
        return Err(DualsubError::Translation("Empty translation received".to_string()));
    }
    Ok(translation)
}

/// Build translation prompt, using JSON format
fn build_translation_prompt(text: &str, target_language: &str) -> String {
    let language_name = language_code_to_name(target_language);

    format!(
        "You are a professional subtitle translator.\n\
         \n\
         CRITICAL: You must translate the text to {} ONLY. \
         Do not translate to any other language.\n\
         The target language is: {} (language code: {})\n\
         \n\
         Return ONLY the translation in JSON format as {{\"text\":\"your {} translation here\"}}.\n\
         Keep it to a single line. \
         Do not include any explanations, alternatives, or text in other languages.\n\
         \n\
         Text to translate: \"{}\"\n",
        language_name, language_name, target_language, language_name, text
    )
}

/// Convert language code to full language name for clearer prompts
pub fn language_code_to_name(code: &str) -> String {
    let name = match code.to_lowercase().as_str() {
        "en" => "English",
        "zh" | "cn" => "Chinese",
        "ja" => "Japanese",
        "ko" => "Korean",
        "fr" => "French",
        "de" => "German",
        "es" => "Spanish",
        "ru" => "Russian",
        "it" => "Italian",
        "pt" => "Portuguese",
        "pl" => "Polish",
        "nl" => "Dutch",
        "tr" => "Turkish",
        "ar" => "Arabic",
        "hi" => "Hindi",
        "th" => "Thai",
        "vi" => "Vietnamese",
        "sv" => "Swedish",
        "da" => "Danish",
        "no" => "Norwegian",
        "fi" => "Finnish",
        "he" => "Hebrew",
        "hu" => "Hungarian",
        "cs" => "Czech",
        "uk" => "Ukrainian",
        "id" => "Indonesian",
        _ => return code.to_string(), // Fallback to the code itself if not found
    };
    name.to_string()
}

/// Clean up translation response to extract just the translation
fn clean_translation_response(response: &str) -> String {
    let lines: Vec<&str> = response.lines().collect();

    for &line in &lines {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        if trimmed.starts_with("Here are")
            || trimmed.starts_with("Here is")
            || trimmed.starts_with("Option")
            || trimmed.starts_with("**Option")
            || trimmed.starts_with("Translation:")
            || trimmed.starts_with("- ")
            || trimmed.starts_with("* ")
        {
            continue;
        }

        if trimmed.starts_with("**") && trimmed.ends_with("**") {
            continue;
        }

        return trimmed.trim_matches('"').to_string();
    }

    String::new()
}

/// Check if Ollama is available and the model is loaded
pub async fn check_ollama_availability(endpoint: &str, model: &str) -> Result<()> {
    let client = Client::new();
    let url = format!("{}/api/show", endpoint.trim_end_matches('/'));

    let response = client
        .post(&url)
        .json(&json!({ "name": model }))
        .send()
        .await
        .map_err(|e| DualsubError::Translation(format!("Failed to connect to Ollama: {}", e)))?;

    if response.status().is_success() {
        info!("Ollama model '{}' is available", model);
        Ok(())
    } else {
        Err(DualsubError::Translation(format!(
            "Ollama model '{}' not found. Please pull the model first: ollama pull {}",
            model, model
        )))
    }
}

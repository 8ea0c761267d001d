// Translation architecture
//
// A Translator turns one line of text into the target language. The driver
// below walks a cue list through it, retrying failed cues and stacking each
// translation under its original line.

pub mod ollama;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use ollama::{check_ollama_availability, language_code_to_name, OllamaTranslator};
use crate::config::TranslateConfig;
use crate::error::{DualsubError, Result};
use crate::progress::{EventSink, ProgressTracker, Stage};
use crate::subtitle::{compose_bilingual, Cue};

/// Main trait for translation operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate a single line of text to `target_language`
    async fn translate(&self, text: &str, target_language: &str) -> Result<String>;
}

/// Factory for creating translator instances
pub struct TranslatorFactory;

impl TranslatorFactory {
    pub fn create_translator(config: TranslateConfig) -> Result<Box<dyn Translator>> {
        Ok(Box::new(OllamaTranslator::new(config)?))
    }
}

/// Translate every cue and return the bilingual cue list.
///
/// Each cue gets `max_retries` extra attempts. A cue that still fails aborts
/// the whole list so no partial bilingual file is ever written.
pub async fn translate_cues(
    translator: &dyn Translator,
    cues: &[Cue],
    target_language: &str,
    max_retries: u32,
    events: &EventSink,
    cancel: &CancellationToken,
) -> Result<Vec<Cue>> {
    info!("Translating {} cues to {}", cues.len(), target_language);

    let total = cues.len();
    let mut tracker = ProgressTracker::new(Stage::Translate, total as f64);
    let mut bilingual = Vec::with_capacity(total);

    for (idx, cue) in cues.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(DualsubError::Cancelled(format!(
                "translation stopped at cue {}",
                cue.index
            )));
        }

        info!("┌─ Translating cue {}/{} ───────────────────────", idx + 1, total);
        info!("│ Source: {}", cue.text);

        let translation =
            translate_with_retry(translator, cue, target_language, max_retries).await?;

        info!("│ Result: {}", translation);
        info!("└─────────────────────────────────────────────");

        bilingual.push(compose_bilingual(cue, &translation));
        tracker.report((idx + 1) as f64, events);
    }

    Ok(bilingual)
}

async fn translate_with_retry(
    translator: &dyn Translator,
    cue: &Cue,
    target_language: &str,
    max_retries: u32,
) -> Result<String> {
    let attempts = max_retries + 1;
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match translator.translate(&cue.text, target_language).await {
            Ok(text) if !text.trim().is_empty() => return Ok(text),
            Ok(_) => last_error = "empty translation".to_string(),
            Err(e) => last_error = e.to_string(),
        }
        warn!(
            "│ Attempt {}/{} for cue {} failed: {}",
            attempt, attempts, cue.index, last_error
        );
    }

    Err(DualsubError::Translation(format!(
        "cue {} failed after {} attempt(s): {}",
        cue.index, attempts, last_error
    )))
}

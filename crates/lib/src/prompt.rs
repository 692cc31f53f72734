//! Prompt construction for the text-generation call.

use chrono::NaiveDate;

use crate::config::{self, Config, QUESTION_PLACEHOLDER};
use crate::conversation::StoredConversation;
use crate::inference::{
    InferenceError, TextGeneration, TextGenerationOutput, TextGenerationParameters,
    TextGenerationRequest,
};

/// Separator token closing the system/context section.
pub const PROMPT_SEPARATOR: &str = "<|im_sep|>";

/// Builds single-turn text-generation requests from a model prefix template.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    model_prefix: String,
    max_new_tokens: u32,
    system_prompt: Option<String>,
}

impl PromptBuilder {
    pub fn new(model_prefix: impl Into<String>, max_new_tokens: u32) -> Self {
        Self {
            model_prefix: model_prefix.into(),
            max_new_tokens,
            system_prompt: None,
        }
    }

    /// Builder from config, applying env overrides (HF_MODEL_PREFIX, HF_MAX_NEW_TOKENS).
    pub fn from_config(config: &Config) -> Self {
        let mut builder = Self::new(
            config::resolve_model_prefix(config),
            config::resolve_max_new_tokens(config),
        );
        builder.system_prompt = config
            .inference
            .system_prompt
            .clone()
            .filter(|s| !s.trim().is_empty());
        builder
    }

    /// Prepend `system_prompt` (wrapped with the current date) to every request.
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn max_new_tokens(&self) -> u32 {
        self.max_new_tokens
    }

    /// Request for `question`: the first `${question}` in the model prefix is replaced literally.
    ///
    /// `_conversation` is accepted for the call shape but not used; prompts are single-turn.
    pub fn build_inference_request(
        &self,
        question: &str,
        _conversation: &StoredConversation,
    ) -> TextGenerationRequest {
        let template = self.model_prefix.replacen(QUESTION_PLACEHOLDER, question, 1);
        let inputs = match self.system_prompt {
            Some(ref system) => format!("{}{}", wrap_prompt(system), template),
            None => template,
        };
        TextGenerationRequest {
            inputs,
            parameters: TextGenerationParameters {
                return_full_text: false,
                max_new_tokens: self.max_new_tokens,
            },
        }
    }

    /// Build the request for `question` and run it. The endpoint output is returned unmodified; errors propagate.
    pub async fn send_chat_message<G: TextGeneration + ?Sized>(
        &self,
        generator: &G,
        question: &str,
        conversation: &StoredConversation,
    ) -> Result<TextGenerationOutput, InferenceError> {
        let request = self.build_inference_request(question, conversation);
        generator.text_generation(&request).await
    }
}

/// Append the current local date and the separator to `wrapped`:
/// `"{wrapped}\nCurrent date: October 18, 2026<|im_sep|>\n\n"`.
pub fn wrap_prompt(wrapped: &str) -> String {
    wrap_prompt_on(wrapped, chrono::Local::now().date_naive())
}

/// [`wrap_prompt`] with an explicit date.
pub fn wrap_prompt_on(wrapped: &str, date: NaiveDate) -> String {
    format!(
        "{}\nCurrent date: {}{}\n\n",
        wrapped,
        format_prompt_date(date),
        PROMPT_SEPARATOR
    )
}

/// "Month Day, Year", e.g. "March 5, 2024".
pub fn format_prompt_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

//! Text-generation inference: request/response types, the [`TextGeneration`] capability and the
//! Hugging Face endpoint client.

mod hf;

pub use hf::HfInferenceClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("inference request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("inference api error: {0}")]
    Api(String),
    #[error("inference endpoint returned no generations")]
    EmptyResponse,
    #[error("inference endpoint not configured")]
    NotConfigured,
}

/// Body of a text-generation call: `{ "inputs", "parameters": { "return_full_text", "max_new_tokens" } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextGenerationRequest {
    pub inputs: String,
    pub parameters: TextGenerationParameters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextGenerationParameters {
    /// When false the endpoint returns only the continuation, not the prompt.
    pub return_full_text: bool,
    pub max_new_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextGenerationOutput {
    pub generated_text: String,
}

/// A text-generation backend.
#[async_trait]
pub trait TextGeneration: Send + Sync {
    async fn text_generation(
        &self,
        request: &TextGenerationRequest,
    ) -> Result<TextGenerationOutput, InferenceError>;
}

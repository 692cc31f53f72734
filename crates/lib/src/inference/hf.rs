//! Hugging Face Inference Endpoint (text-generation-inference) client.
//! The endpoint URL is the full model URL; requests are POSTed to it as JSON.

use super::{InferenceError, TextGeneration, TextGenerationOutput, TextGenerationRequest};
use async_trait::async_trait;
use serde::Deserialize;

/// Client for a hosted text-generation endpoint.
#[derive(Clone)]
pub struct HfInferenceClient {
    endpoint_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

/// Endpoints answer either with a list of generations or a single object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GenerationResponse {
    Many(Vec<TextGenerationOutput>),
    One(TextGenerationOutput),
}

impl HfInferenceClient {
    pub fn new(endpoint_url: impl Into<String>, token: Option<String>) -> Self {
        let endpoint_url = endpoint_url.into().trim_end_matches('/').to_string();
        Self {
            endpoint_url,
            token: token.filter(|t| !t.trim().is_empty()),
            client: reqwest::Client::new(),
        }
    }

    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }

    /// POST the request to the endpoint and return the first generation.
    pub async fn generate(
        &self,
        request: &TextGenerationRequest,
    ) -> Result<TextGenerationOutput, InferenceError> {
        if self.endpoint_url.is_empty() {
            return Err(InferenceError::NotConfigured);
        }
        let mut req = self.client.post(&self.endpoint_url).json(request);
        if let Some(ref token) = self.token {
            req = req.bearer_auth(token);
        }
        log::debug!(
            "inference: POST {} (max_new_tokens={})",
            self.endpoint_url,
            request.parameters.max_new_tokens
        );
        let res = req.send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(InferenceError::Api(format!("{} {}", status, body)));
        }
        match res.json::<GenerationResponse>().await? {
            GenerationResponse::One(output) => Ok(output),
            GenerationResponse::Many(outputs) => {
                outputs.into_iter().next().ok_or(InferenceError::EmptyResponse)
            }
        }
    }
}

#[async_trait]
impl TextGeneration for HfInferenceClient {
    async fn text_generation(
        &self,
        request: &TextGenerationRequest,
    ) -> Result<TextGenerationOutput, InferenceError> {
        self.generate(request).await
    }
}

//! Generation provider implementations.
//!
//! Implements [`docent_core::generation::Generator`] for:
//! - **[`DisabledGenerator`]**: always fails.
//! - **[`OpenAIGenerator`]**: calls an OpenAI-compatible `/completions`
//!   endpoint, requesting `n` candidates with token log-probabilities. A
//!   candidate's likelihood is the sum of its token log-probabilities.
//!
//! Retries follow the same policy as the embedding providers.

use anyhow::{bail, Result};
use async_trait::async_trait;
use docent_core::generation::{Generation, GenerationParams, Generator};
use std::sync::Arc;
use std::time::Duration;

use crate::config::GenerationConfig;

/// A generator that refuses every request.
pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<Vec<Generation>> {
        bail!("Generation provider is disabled")
    }
}

/// Generator backed by an OpenAI-compatible completions API.
pub struct OpenAIGenerator {
    model: String,
    endpoint: String,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required for OpenAI provider"))?;
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow::anyhow!("{} environment variable not set", config.api_key_env))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            endpoint: format!("{}/completions", config.base_url.trim_end_matches('/')),
            api_key,
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<Vec<Generation>> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
            "n": params.num_generations,
            "logprobs": 1,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_completion_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        tracing::warn!(%status, attempt, "generation request throttled or failed");
                        last_err = Some(anyhow::anyhow!(
                            "generation API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("generation API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Generation failed after retries")))
    }
}

/// Parse `choices[]` into candidates, in `index` order.
fn parse_completion_response(json: &serde_json::Value) -> Result<Vec<Generation>> {
    let choices = json
        .get("choices")
        .and_then(|c| c.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid completion response: missing choices array"))?;

    let mut indexed = Vec::with_capacity(choices.len());
    for (position, choice) in choices.iter().enumerate() {
        let text = choice
            .get("text")
            .and_then(|t| t.as_str())
            .ok_or_else(|| anyhow::anyhow!("Invalid completion response: missing text"))?;

        // The first token's logprob may be null; it contributes nothing.
        let likelihood = choice
            .get("logprobs")
            .and_then(|l| l.get("token_logprobs"))
            .and_then(|t| t.as_array())
            .map(|logprobs| logprobs.iter().filter_map(|v| v.as_f64()).sum())
            .unwrap_or(0.0);

        let index = choice
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        indexed.push((
            index,
            Generation {
                text: text.to_string(),
                likelihood,
            },
        ));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, g)| g).collect())
}

/// Create the [`Generator`] named by `config.provider`.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        "openai" => Ok(Arc::new(OpenAIGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

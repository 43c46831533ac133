use async_trait::async_trait;
use serde_json::{json, Value};

use super::error::LlmError;
use super::llama_service::{LlamaService, ModelRuntimeConfig};
use super::provider::{EmbeddingProvider, InferenceEngine};

const COMPLETION_SEED: u64 = 42;

/// Embeddings from a `llama-server --embedding` process.
pub struct LlamaEmbedder {
    service: LlamaService,
    config: ModelRuntimeConfig,
    model_id: String,
    batch_size: usize,
    dimension: usize,
}

impl LlamaEmbedder {
    /// Start the embedding server and probe it once to learn the dimension.
    pub async fn load(
        service: LlamaService,
        config: ModelRuntimeConfig,
        model_id: impl Into<String>,
        batch_size: usize,
    ) -> Result<Self, LlmError> {
        let mut embedder = Self {
            service,
            config,
            model_id: model_id.into(),
            batch_size: batch_size.max(1),
            dimension: 0,
        };

        let probe = embedder.embed_batch(&["probe".to_string()]).await?;
        embedder.dimension = match probe.first() {
            Some(vector) if !vector.is_empty() => vector.len(),
            _ => {
                return Err(LlmError::InvalidResponse(
                    "probe embedding was empty".to_string(),
                ))
            }
        };
        tracing::info!(
            "Embedding model '{}' loaded (dimension {})",
            embedder.model_id,
            embedder.dimension
        );
        Ok(embedder)
    }

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let body = json!({
            "model": self.model_id,
            "input": inputs,
        });
        let payload = self
            .service
            .post_json(&self.config, "/v1/embeddings", &body)
            .await?;
        let embeddings = parse_embedding_response(&payload)?;
        if embeddings.len() != inputs.len() {
            return Err(LlmError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                embeddings.len()
            )));
        }
        if self.dimension > 0 {
            if let Some(bad) = embeddings.iter().find(|v| v.len() != self.dimension) {
                return Err(LlmError::InvalidResponse(format!(
                    "expected {}-dimensional embeddings, got {}",
                    self.dimension,
                    bad.len()
                )));
            }
        }
        Ok(embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for LlamaEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let mut results = Vec::with_capacity(inputs.len());
        for batch in inputs.chunks(self.batch_size) {
            results.extend(self.embed_batch(batch).await?);
        }
        Ok(results)
    }
}

/// Greedy completion from a `llama-server` process.
pub struct LlamaEngine {
    service: LlamaService,
    config: ModelRuntimeConfig,
    temperature: f64,
    max_tokens: usize,
}

impl LlamaEngine {
    /// Start the completion server and wait until it reports healthy.
    pub async fn load(
        service: LlamaService,
        config: ModelRuntimeConfig,
        temperature: f64,
        max_tokens: usize,
    ) -> Result<Self, LlmError> {
        service.ensure_running(&config).await?;
        tracing::info!("Language model loaded from {}", config.model_path.display());
        Ok(Self {
            service,
            config,
            temperature,
            max_tokens,
        })
    }
}

#[async_trait]
impl InferenceEngine for LlamaEngine {
    fn name(&self) -> &str {
        "llama_cpp"
    }

    fn context_window(&self) -> usize {
        self.config.n_ctx as usize
    }

    fn max_output_tokens(&self) -> usize {
        self.max_tokens
    }

    async fn count_tokens(&self, text: &str) -> Result<usize, LlmError> {
        let payload = self
            .service
            .post_json(&self.config, "/tokenize", &tokenize_request(text))
            .await?;
        parse_token_count(&payload)
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let body = json!({
            "prompt": prompt,
            "stream": false,
            "n_predict": self.max_tokens,
            "temperature": self.temperature,
            "top_k": 1,
            "seed": COMPLETION_SEED,
        });
        let payload = self
            .service
            .post_json(&self.config, "/completion", &body)
            .await?;
        parse_completion_response(&payload)
    }
}

/// `/completion` prepends BOS, so count it here too.
fn tokenize_request(text: &str) -> Value {
    json!({ "content": text, "add_special": true })
}

fn parse_token_count(payload: &Value) -> Result<usize, LlmError> {
    payload
        .get("tokens")
        .and_then(|v| v.as_array())
        .map(|tokens| tokens.len())
        .ok_or_else(|| LlmError::InvalidResponse("tokenize response missing tokens".to_string()))
}

fn parse_completion_response(payload: &Value) -> Result<String, LlmError> {
    payload
        .get("content")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| LlmError::InvalidResponse("completion response missing content".to_string()))
}

fn parse_embedding_response(payload: &Value) -> Result<Vec<Vec<f32>>, LlmError> {
    let Some(data) = payload.get("data").and_then(|v| v.as_array()) else {
        return Err(LlmError::InvalidResponse(
            "embedding response missing data array".to_string(),
        ));
    };

    let mut indexed_embeddings = Vec::with_capacity(data.len());
    for (fallback_idx, item) in data.iter().enumerate() {
        let Some(values) = item.get("embedding").and_then(|v| v.as_array()) else {
            return Err(LlmError::InvalidResponse(
                "embedding response item missing embedding array".to_string(),
            ));
        };

        let mut embedding = Vec::with_capacity(values.len());
        for value in values {
            let Some(float_value) = value.as_f64() else {
                return Err(LlmError::InvalidResponse(
                    "embedding contains non-numeric value".to_string(),
                ));
            };
            embedding.push(float_value as f32);
        }

        let index = item
            .get("index")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or(fallback_idx);
        indexed_embeddings.push((index, embedding));
    }

    indexed_embeddings.sort_by_key(|(idx, _)| *idx);
    Ok(indexed_embeddings
        .into_iter()
        .map(|(_, embedding)| embedding)
        .collect())
}

//! Unified OpenAI-compatible provider.
//!
//! A single struct that speaks both `/embeddings` and `/chat/completions` for
//! every OpenAI-compatible API. Providers are distinguished only by endpoint
//! URL, auth style, and API key. Every request is bounded by the client
//! timeout taken from config.

use async_trait::async_trait;
use debtwise_core::error::{DebtWiseError, Result};
use debtwise_core::traits::{Embedder, GenerateParams, Provider};
use debtwise_core::types::{Message, ProviderResponse, Usage, check_embedding};
use serde_json::{Value, json};
use std::time::Duration;

use crate::provider_registry::{AuthStyle, CHAT_PATH, EMBEDDINGS_PATH, ProviderConfig};

/// A unified provider that works with any OpenAI-compatible API.
pub struct OpenAiCompatibleProvider {
    /// Provider name (e.g., "openai", "groq", "ollama").
    name: String,
    /// API key for authentication.
    api_key: String,
    /// Base URL for the API (e.g., "https://api.openai.com/v1").
    base_url: String,
    /// Path for chat completions (e.g., "/chat/completions").
    chat_path: String,
    /// Path for embeddings, if the provider exposes one.
    embeddings_path: Option<String>,
    /// Authentication style.
    auth_style: AuthStyle,
    /// Model used for `embed` calls.
    embedding_model: String,
    /// Expected embedding length; other lengths are rejected.
    dimensions: Option<usize>,
    timeout_secs: u64,
    /// HTTP client.
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    /// Create from a known provider config.
    ///
    /// Resolution order:
    /// - API key: `api_key` argument > registry env vars > empty
    /// - Base URL: `endpoint` argument > env override > registry default
    pub fn from_registry(
        registry: &ProviderConfig,
        endpoint: &str,
        api_key: &str,
        timeout_secs: u64,
    ) -> Result<Self> {
        let api_key = if !api_key.is_empty() {
            api_key.to_string()
        } else {
            registry
                .env_keys
                .iter()
                .find_map(|key| std::env::var(key).ok())
                .unwrap_or_default()
        };

        let base_url = if !endpoint.is_empty() {
            endpoint.trim_end_matches('/').to_string()
        } else {
            registry
                .base_url_env
                .and_then(|env_key| {
                    let val = std::env::var(env_key).ok()?;
                    // OLLAMA_HOST / LMSTUDIO_HOST usually omit the /v1 suffix
                    if val.ends_with("/v1") {
                        Some(val)
                    } else {
                        Some(format!("{}/v1", val.trim_end_matches('/')))
                    }
                })
                .unwrap_or_else(|| registry.base_url.to_string())
        };

        Ok(Self {
            name: registry.name.to_string(),
            api_key,
            base_url,
            chat_path: registry.chat_path().to_string(),
            embeddings_path: registry.embeddings_path().map(String::from),
            auth_style: registry.auth_style,
            embedding_model: String::new(),
            dimensions: None,
            timeout_secs,
            client: build_client(timeout_secs)?,
        })
    }

    /// Create for a custom endpoint (e.g., "custom:https://my-server.com/v1").
    pub fn custom(endpoint: &str, api_key: &str, timeout_secs: u64) -> Result<Self> {
        let base_url = endpoint
            .strip_prefix("custom:")
            .unwrap_or(endpoint)
            .trim_end_matches('/')
            .to_string();
        if base_url.is_empty() {
            return Err(DebtWiseError::Config("custom provider needs a URL".into()));
        }

        let api_key = if !api_key.is_empty() {
            api_key.to_string()
        } else {
            std::env::var("CUSTOM_API_KEY").unwrap_or_default()
        };

        let auth_style = if api_key.is_empty() {
            AuthStyle::None
        } else {
            AuthStyle::Bearer
        };

        Ok(Self {
            name: "custom".to_string(),
            api_key,
            base_url,
            chat_path: CHAT_PATH.to_string(),
            embeddings_path: Some(EMBEDDINGS_PATH.to_string()),
            auth_style,
            embedding_model: String::new(),
            dimensions: None,
            timeout_secs,
            client: build_client(timeout_secs)?,
        })
    }

    /// Set the model (and optionally the expected length) used by `embed`.
    pub fn with_embedding_model(
        mut self,
        model: impl Into<String>,
        dimensions: Option<usize>,
    ) -> Self {
        self.embedding_model = model.into();
        self.dimensions = dimensions;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the auth header for the request.
    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth_style {
            AuthStyle::Bearer if !self.api_key.is_empty() => {
                req.header("Authorization", format!("Bearer {}", self.api_key))
            }
            _ => req,
        }
    }

    fn require_key(&self) -> Result<()> {
        if self.auth_style != AuthStyle::None && self.api_key.is_empty() {
            return Err(DebtWiseError::ApiKeyMissing(self.name.clone()));
        }
        Ok(())
    }

    fn send_error(&self, operation: &str, url: &str, e: reqwest::Error) -> DebtWiseError {
        if e.is_timeout() {
            DebtWiseError::Timeout {
                operation: format!("{} {operation}", self.name),
                secs: self.timeout_secs,
            }
        } else {
            DebtWiseError::Http(format!("{} connection failed ({}): {}", self.name, url, e))
        }
    }

    /// POST `input` to the embeddings endpoint and return the raw JSON.
    async fn request_embeddings(&self, input: Value) -> Result<Value> {
        let path = self.embeddings_path.as_deref().ok_or_else(|| {
            DebtWiseError::embedding(format!("{} has no embeddings endpoint", self.name))
        })?;
        self.require_key()?;
        if self.embedding_model.is_empty() {
            return Err(DebtWiseError::Config(format!(
                "{}: embedding model not configured",
                self.name
            )));
        }

        let url = format!("{}{}", self.base_url, path);
        let body = json!({ "model": self.embedding_model, "input": input });
        let req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        let resp = self.apply_auth(req).send().await.map_err(|e| {
            match self.send_error("embed", &url, e) {
                DebtWiseError::Http(msg) => DebtWiseError::Embedding(msg),
                other => other,
            }
        })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(DebtWiseError::embedding(format!(
                "{} embeddings API error {}: {}",
                self.name, status, text
            )));
        }

        resp.json()
            .await
            .map_err(|e| DebtWiseError::embedding(format!("{}: invalid JSON: {e}", self.name)))
    }
}

fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| DebtWiseError::Http(format!("failed to build HTTP client: {e}")))
}

/// Turn one JSON array of numbers into a checked vector.
fn parse_vector(raw: &Value, expected: Option<usize>) -> Result<Vec<f32>> {
    let arr = raw
        .as_array()
        .ok_or_else(|| DebtWiseError::embedding("embedding is not an array"))?;
    let vector = arr
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| DebtWiseError::embedding(format!("non-numeric value at index {i}")))
        })
        .collect::<Result<Vec<f32>>>()?;
    check_embedding(&vector)?;
    if let Some(expected) = expected {
        if vector.len() != expected {
            return Err(DebtWiseError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
    }
    Ok(vector)
}

/// Parse an embeddings response into vectors ordered by input position.
///
/// Accepts the OpenAI shape (`data[].embedding` with `index`) and Ollama's
/// native `embeddings` array. OpenAI indices must be a permutation of
/// `0..n`, so no input can receive another input's vector.
pub fn parse_embeddings_response(json: &Value, expected: Option<usize>) -> Result<Vec<Vec<f32>>> {
    if let Some(data) = json["data"].as_array() {
        let mut indexed = data
            .iter()
            .enumerate()
            .map(|(pos, item)| {
                let index = item["index"].as_u64().map(|i| i as usize).unwrap_or(pos);
                parse_vector(&item["embedding"], expected).map(|v| (index, v))
            })
            .collect::<Result<Vec<_>>>()?;
        let mut seen = vec![false; indexed.len()];
        for (index, _) in &indexed {
            match seen.get_mut(*index) {
                Some(slot) if !*slot => *slot = true,
                _ => {
                    return Err(DebtWiseError::embedding(format!(
                        "embedding index {index} is out of range or repeated"
                    )));
                }
            }
        }
        indexed.sort_by_key(|(index, _)| *index);
        return Ok(indexed.into_iter().map(|(_, v)| v).collect());
    }
    if let Some(embeddings) = json["embeddings"].as_array() {
        return embeddings.iter().map(|e| parse_vector(e, expected)).collect();
    }
    Err(DebtWiseError::embedding("response has no `data` or `embeddings` field"))
}

/// Parse a chat completion response in the standard OpenAI format.
pub fn parse_chat_response(json: &Value) -> Result<ProviderResponse> {
    let choice = json["choices"]
        .get(0)
        .ok_or_else(|| DebtWiseError::Provider("No choices in response".into()))?;

    let content = choice["message"]["content"].as_str().map(String::from);

    let usage = json["usage"].as_object().map(|u| Usage {
        prompt_tokens: u.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
        completion_tokens: u
            .get("completion_tokens")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32,
        total_tokens: u.get("total_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
    });

    Ok(ProviderResponse {
        content,
        finish_reason: choice["finish_reason"].as_str().map(String::from),
        usage,
    })
}

#[async_trait]
impl Embedder for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let json = self.request_embeddings(json!(text)).await?;
        let mut vectors = parse_embeddings_response(&json, self.dimensions)?;
        if vectors.len() != 1 {
            return Err(DebtWiseError::embedding(format!(
                "expected 1 embedding, got {}",
                vectors.len()
            )));
        }
        tracing::debug!("{} embedded {} chars", self.name, text.len());
        Ok(vectors.remove(0))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let json = self.request_embeddings(json!(texts)).await?;
        let vectors = parse_embeddings_response(&json, self.dimensions)?;
        if vectors.len() != texts.len() {
            return Err(DebtWiseError::embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }
}

#[async_trait]
impl Provider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(
        &self,
        messages: &[Message],
        params: &GenerateParams,
    ) -> Result<ProviderResponse> {
        self.require_key()?;

        let body = json!({
            "model": params.model,
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
            "messages": messages,
        });

        let url = format!("{}{}", self.base_url, self.chat_path);
        let req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        let resp = self
            .apply_auth(req)
            .send()
            .await
            .map_err(|e| self.send_error("chat", &url, e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(DebtWiseError::Provider(format!(
                "{} API error {}: {}",
                self.name, status, text
            )));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| DebtWiseError::Http(e.to_string()))?;
        parse_chat_response(&json)
    }

    async fn health_check(&self) -> Result<bool> {
        if self.auth_style != AuthStyle::None {
            // For cloud providers, just check if API key is set
            return Ok(!self.api_key.is_empty());
        }

        let url = format!("{}/models", self.base_url);
        let resp = self.client.get(&url).send().await;
        Ok(resp.is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider_registry::get_provider_config;

    #[test]
    fn test_parse_openai_embeddings_reorders_by_index() {
        let json = json!({
            "data": [
                {"index": 1, "embedding": [0.0, 1.0]},
                {"index": 0, "embedding": [1.0, 0.0]}
            ]
        });
        let vectors = parse_embeddings_response(&json, Some(2)).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_embedding_indices_must_cover_every_input() {
        let repeated = json!({
            "data": [
                {"index": 0, "embedding": [1.0, 0.0]},
                {"index": 0, "embedding": [0.0, 1.0]}
            ]
        });
        assert!(parse_embeddings_response(&repeated, None).unwrap_err().is_embedding_error());

        let out_of_range = json!({
            "data": [
                {"index": 0, "embedding": [1.0, 0.0]},
                {"index": 5, "embedding": [0.0, 1.0]}
            ]
        });
        assert!(parse_embeddings_response(&out_of_range, None).unwrap_err().is_embedding_error());
    }

    #[test]
    fn test_parse_ollama_embeddings() {
        let json = json!({"embeddings": [[0.5, 0.25, 0.125]]});
        let vectors = parse_embeddings_response(&json, None).unwrap();
        assert_eq!(vectors, vec![vec![0.5, 0.25, 0.125]]);
    }

    #[test]
    fn test_malformed_embeddings_are_embedding_errors() {
        let wrong_len = json!({"data": [{"embedding": [1.0, 2.0, 3.0]}]});
        let err = parse_embeddings_response(&wrong_len, Some(2)).unwrap_err();
        assert!(matches!(err, DebtWiseError::DimensionMismatch { expected: 2, actual: 3 }));

        let non_numeric = json!({"data": [{"embedding": [1.0, "x"]}]});
        assert!(parse_embeddings_response(&non_numeric, None).unwrap_err().is_embedding_error());

        let empty = json!({"data": [{"embedding": []}]});
        assert!(parse_embeddings_response(&empty, None).unwrap_err().is_embedding_error());

        let missing = json!({"object": "list"});
        assert!(parse_embeddings_response(&missing, None).unwrap_err().is_embedding_error());
    }

    #[test]
    fn test_parse_chat_response() {
        let json = json!({
            "choices": [{
                "message": {"content": "Pay the 18% card first."},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 6, "total_tokens": 16}
        });
        let resp = parse_chat_response(&json).unwrap();
        assert_eq!(resp.content.as_deref(), Some("Pay the 18% card first."));
        assert_eq!(resp.finish_reason.as_deref(), Some("stop"));
        assert_eq!(resp.usage.unwrap().total_tokens, 16);

        assert!(parse_chat_response(&json!({"choices": []})).is_err());
    }

    #[test]
    fn test_custom_endpoint() {
        let p =
            OpenAiCompatibleProvider::custom("custom:http://localhost:9000/v1/", "k", 5).unwrap();
        assert_eq!(p.base_url(), "http://localhost:9000/v1");
        assert_eq!(Provider::name(&p), "custom");
        assert!(OpenAiCompatibleProvider::custom("custom:", "", 5).is_err());
    }

    #[tokio::test]
    async fn test_health_check() {
        let groq = get_provider_config("groq").unwrap();
        let keyed = OpenAiCompatibleProvider::from_registry(groq, "", "key", 5).unwrap();
        assert!(keyed.health_check().await.unwrap());

        // Local servers are checked over HTTP; nothing listens on the discard port.
        let ollama = get_provider_config("ollama").unwrap();
        let down = OpenAiCompatibleProvider::from_registry(ollama, "http://127.0.0.1:9/v1", "", 2)
            .unwrap();
        assert!(!down.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn test_embed_without_endpoint_fails_as_embedding_error() {
        let groq = get_provider_config("groq").unwrap();
        let p = OpenAiCompatibleProvider::from_registry(groq, "", "key", 5)
            .unwrap()
            .with_embedding_model("any", None);
        let err = p.embed("hello").await.unwrap_err();
        assert!(err.is_embedding_error());
    }

    #[tokio::test]
    async fn test_unreachable_embedding_server() {
        let ollama = get_provider_config("ollama").unwrap();
        // Port 9 (discard) on localhost is essentially never an HTTP server.
        let p = OpenAiCompatibleProvider::from_registry(ollama, "http://127.0.0.1:9/v1", "", 2)
            .unwrap()
            .with_embedding_model("nomic-embed-text", None);
        let err = p.embed("hello").await.unwrap_err();
        assert!(err.is_embedding_error() || matches!(err, DebtWiseError::Timeout { .. }));
    }
}

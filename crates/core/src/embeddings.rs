use crate::traits::EmbeddingFunction;
use crate::SearchError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const API_KEY_VARIABLE: &str = "OPENAI_API_KEY";

const DEFAULT_HASHING_DIMENSIONS: usize = 128;

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    encoding_format: &'static str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

/// Client for the OpenAI `/embeddings` endpoint.
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: Url,
    api_key: String,
    model: String,
}

impl OpenAiEmbedder {
    /// Fails before any request is made when no API key is configured.
    pub fn new(config: &OpenAiConfig) -> Result<Self, SearchError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| SearchError::MissingCredential(API_KEY_VARIABLE.to_string()))?
            .to_string();

        let base = format!("{}/", config.base_url.trim_end_matches('/'));
        let endpoint = Url::parse(&base)?.join("embeddings")?;
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            endpoint,
            api_key,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl EmbeddingFunction for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(model = %self.model, inputs = texts.len(), "requesting embeddings");
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
                encoding_format: "float",
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::BackendResponse {
                backend: "openai".to_string(),
                details: format!("{status}: {}", body.trim()),
            });
        }

        let mut parsed: EmbeddingResponse = response.json().await?;
        if parsed.data.len() != texts.len() {
            return Err(SearchError::BackendResponse {
                backend: "openai".to_string(),
                details: format!(
                    "expected {} embeddings, received {}",
                    texts.len(),
                    parsed.data.len()
                ),
            });
        }

        parsed.data.sort_by_key(|item| item.index);
        Ok(parsed.data.into_iter().map(|item| item.embedding).collect())
    }
}

/// Deterministic character-trigram embedder that needs no network.
#[derive(Debug, Clone, Copy)]
pub struct HashingEmbedder {
    pub dimensions: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_HASHING_DIMENSIONS,
        }
    }
}

impl HashingEmbedder {
    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        for window in chars.windows(3) {
            let mut hash = 1469598103934665603u64;
            for ch in window {
                let mut buffer = [0u8; 4];
                for byte in ch.encode_utf8(&mut buffer).bytes() {
                    hash ^= byte as u64;
                    hash = hash.wrapping_mul(1099511628211);
                }
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl EmbeddingFunction for HashingEmbedder {
    fn model_name(&self) -> &str {
        "hashing-trigram"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> OpenAiConfig {
        OpenAiConfig {
            api_key: Some("sk-test".to_string()),
            base_url: format!("{}/v1", server.uri()),
            ..OpenAiConfig::default()
        }
    }

    #[test]
    fn hashing_embedder_is_deterministic() {
        let embedder = HashingEmbedder::default();
        let first = embedder.embed_one("Настройка пользователей");
        let second = embedder.embed_one("Настройка пользователей");
        assert_eq!(first, second);
        assert_eq!(first.len(), DEFAULT_HASHING_DIMENSIONS);
    }

    #[test]
    fn hashing_embedder_outputs_expected_length() {
        let embedder = HashingEmbedder { dimensions: 32 };
        assert_eq!(embedder.embed_one("abc").len(), 32);
        assert_eq!(embedder.embed_one("").len(), 32);
    }

    #[test]
    fn missing_key_fails_before_any_request() {
        for api_key in [None, Some("   ".to_string())] {
            let config = OpenAiConfig {
                api_key,
                ..OpenAiConfig::default()
            };
            assert!(matches!(
                OpenAiEmbedder::new(&config),
                Err(SearchError::MissingCredential(ref name)) if name == API_KEY_VARIABLE
            ));
        }
    }

    #[tokio::test]
    async fn embeddings_are_returned_in_input_order() -> Result<(), SearchError> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": DEFAULT_EMBEDDING_MODEL,
                "input": ["first", "second"],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "data": [
                    {"object": "embedding", "index": 1, "embedding": [0.0, 1.0]},
                    {"object": "embedding", "index": 0, "embedding": [1.0, 0.0]},
                ],
                "model": DEFAULT_EMBEDDING_MODEL,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder::new(&config_for(&server))?;
        let vectors = embedder
            .embed(&["first".to_string(), "second".to_string()])
            .await?;

        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        Ok(())
    }

    #[tokio::test]
    async fn error_status_surfaces_response_body() -> Result<(), SearchError> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder::new(&config_for(&server))?;
        let error = embedder.embed(&["text".to_string()]).await.unwrap_err();

        match error {
            SearchError::BackendResponse { backend, details } => {
                assert_eq!(backend, "openai");
                assert!(details.contains("429"));
                assert!(details.contains("rate limited"));
            }
            other => panic!("unexpected error: {other}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn empty_batch_skips_the_network() -> Result<(), SearchError> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder::new(&config_for(&server))?;
        assert!(embedder.embed(&[]).await?.is_empty());
        Ok(())
    }
}

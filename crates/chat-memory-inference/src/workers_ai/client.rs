//! Workers AI REST client.
//!
//! The API token is held in a [`SecretString`] and only exposed when the
//! `Authorization` header is built.

use std::time::Duration;

use async_trait::async_trait;
use chat_memory_core::{InferenceError, InferenceProvider, InferenceRequest};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use super::protocol::{RunEnvelope, RunRequest};

/// Default text-generation model.
pub const DEFAULT_MODEL: &str = "@cf/meta/llama-3.1-8b-instruct";

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://api.cloudflare.com/client/v4";

/// Longest error body echoed back in an error message.
const MAX_ERROR_BODY: usize = 512;

/// Connection settings for [`WorkersAiProvider`].
#[derive(Debug)]
pub struct WorkersAiConfig {
    pub account_id: String,
    pub api_token: SecretString,
    pub model: String,
    pub base_url: String,
}

impl WorkersAiConfig {
    /// Settings for the default model and API root.
    #[must_use]
    pub fn new(account_id: impl Into<String>, api_token: SecretString) -> Self {
        Self {
            account_id: account_id.into(),
            api_token,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the API root (useful for testing or proxies).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/accounts/{}/ai/run/{}",
            self.base_url.trim_end_matches('/'),
            self.account_id,
            self.model
        )
    }
}

/// Workers AI text-generation provider.
pub struct WorkersAiProvider {
    client: reqwest::Client,
    config: WorkersAiConfig,
}

impl WorkersAiProvider {
    /// Create a provider.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: WorkersAiConfig) -> Result<Self, InferenceError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| InferenceError::Http(e.to_string()))?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl InferenceProvider for WorkersAiProvider {
    fn name(&self) -> &str {
        "workers-ai"
    }

    async fn generate(&self, request: &InferenceRequest) -> Result<String, InferenceError> {
        debug!(
            model = %self.config.model,
            messages = request.messages.len(),
            max_tokens = request.max_tokens,
            "sending generation request"
        );

        let response = self
            .client
            .post(self.config.endpoint())
            .bearer_auth(self.config.api_token.expose_secret())
            .json(&RunRequest {
                messages: &request.messages,
                max_tokens: request.max_tokens,
            })
            .send()
            .await
            .map_err(|e| InferenceError::Http(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| InferenceError::Http(e.to_string()))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<RunEnvelope>(&body)
                .ok()
                .map(|envelope| envelope.error_summary())
                .filter(|summary| !summary.is_empty())
                .unwrap_or_else(|| body.chars().take(MAX_ERROR_BODY).collect());
            return Err(InferenceError::Http(format!("{status}: {detail}")));
        }

        let envelope: RunEnvelope = serde_json::from_str(&body)
            .map_err(|e| InferenceError::MalformedResponse(e.to_string()))?;
        envelope.into_reply()
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        Json, Router,
        extract::Path,
        http::{HeaderMap, StatusCode},
        response::IntoResponse,
        routing::post,
    };
    use chat_memory_core::{Message, PromptContext};
    use serde_json::{Value, json};

    use super::*;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://{addr}")
    }

    async fn run_handler(
        Path((account, model)): Path<(String, String)>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> impl IntoResponse {
        if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer token-1") {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"success": false, "errors": [{"code": 10000, "message": "Authentication error"}]})),
            );
        }
        let count = body["messages"].as_array().map_or(0, Vec::len);
        let reply = format!("{account}/{model}: {count} messages, max {}", body["max_tokens"]);
        (
            StatusCode::OK,
            Json(json!({"success": true, "result": {"response": reply}, "errors": []})),
        )
    }

    fn provider(base_url: &str, token: &str) -> WorkersAiProvider {
        let config = WorkersAiConfig::new("acct", SecretString::from(token.to_string()))
            .with_base_url(base_url);
        WorkersAiProvider::new(config).unwrap()
    }

    fn request() -> InferenceRequest {
        PromptContext::default()
            .with_history(vec![Message::user("Hello")])
            .into_request(300)
    }

    #[tokio::test]
    async fn test_generate_posts_to_model_endpoint() {
        let base = serve(Router::new().route(
            "/accounts/{account}/ai/run/{*model}",
            post(run_handler),
        ))
        .await;

        let reply = provider(&base, "token-1").generate(&request()).await.unwrap();
        assert_eq!(
            reply,
            "acct/@cf/meta/llama-3.1-8b-instruct: 2 messages, max 300"
        );
    }

    #[tokio::test]
    async fn test_http_error_includes_api_message() {
        let base = serve(Router::new().route(
            "/accounts/{account}/ai/run/{*model}",
            post(run_handler),
        ))
        .await;

        let err = provider(&base, "wrong").generate(&request()).await.unwrap_err();
        assert!(
            matches!(err, InferenceError::Http(ref m) if m.contains("401") && m.contains("Authentication error")),
            "{err}"
        );
    }

    #[tokio::test]
    async fn test_non_json_success_body_is_malformed() {
        let base = serve(Router::new().route(
            "/accounts/{account}/ai/run/{*model}",
            post(|| async { "<html>gateway</html>" }),
        ))
        .await;

        let err = provider(&base, "token-1").generate(&request()).await.unwrap_err();
        assert!(matches!(err, InferenceError::MalformedResponse(_)));
    }

    #[test]
    fn test_endpoint_and_redacted_debug() {
        let config = WorkersAiConfig::new("acct", SecretString::from("s3cret".to_string()))
            .with_model("@cf/test/model")
            .with_base_url("http://localhost:9/");
        assert_eq!(
            config.endpoint(),
            "http://localhost:9/accounts/acct/ai/run/@cf/test/model"
        );
        assert!(!format!("{config:?}").contains("s3cret"));
    }
}

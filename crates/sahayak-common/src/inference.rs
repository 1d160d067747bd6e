use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::StatusCode;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::InferenceConfig;

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid response JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("inference service returned error: status={status} message={message}")]
    Upstream { status: StatusCode, message: String },

    #[error("inference service returned non-JSON error: status={status} body={body}")]
    UpstreamBody { status: StatusCode, body: String },

    #[error("inference response carried no content")]
    MissingContent,
}

/// One structured-generation request: a prompt plus the exact JSON schema
/// the service must satisfy in its reply.
#[derive(Debug, Clone)]
pub struct StructuredRequest {
    pub model: String,
    pub prompt: String,
    pub schema_name: &'static str,
    pub schema: serde_json::Value,
}

impl StructuredRequest {
    pub fn new<T: JsonSchema>(
        model: impl Into<String>,
        prompt: impl Into<String>,
        schema_name: &'static str,
    ) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            schema_name,
            schema: schema_of::<T>(),
        }
    }
}

/// JSON schema for `T`, in the shape the service's `response_format` expects.
pub fn schema_of<T: JsonSchema>() -> serde_json::Value {
    schemars::schema_for!(T).to_value()
}

/// Deserialize a structured response into its typed form.
pub fn parse_structured<T: for<'de> Deserialize<'de>>(
    value: serde_json::Value,
) -> Result<T, InferenceError> {
    Ok(serde_json::from_value(value)?)
}

/// The seam between callers and the remote inference service. Production
/// code uses [`InferenceClient`]; tests substitute mocks, and a caching
/// decorator can wrap any backend without changing the contract.
pub trait InferenceBackend: Send + Sync {
    fn generate_json(
        &self,
        request: StructuredRequest,
    ) -> impl Future<Output = Result<serde_json::Value, InferenceError>> + Send;
}

/// Base64-encoded audio returned by the speech-synthesis utility.
#[derive(Debug, Clone, Deserialize)]
pub struct SpeechAudio {
    /// Base64-encoded audio bytes, as produced by the service.
    pub audio: String,
    pub mime_type: Option<String>,
}

#[derive(Clone)]
pub struct InferenceClient {
    config: InferenceConfig,
    http: reqwest::Client,
}

impl InferenceClient {
    pub fn new(config: InferenceConfig) -> Result<Self, InferenceError> {
        let http = reqwest::Client::builder()
            .user_agent("sahayak/inference")
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Speech synthesis: plain request/response, audio comes back base64
    /// encoded inside the JSON body.
    pub async fn synthesize_speech(&self, text: &str) -> Result<SpeechAudio, InferenceError> {
        let url = format!("{}/audio/speech", self.config.base_url);
        let body = SpeechRequest {
            model: self.config.speech_model.clone(),
            input: text.to_string(),
        };
        self.with_retry(|| async {
            let resp = self
                .http
                .post(&url)
                .timeout(self.config.default_timeout)
                .json(&body)
                .send()
                .await?;
            self.parse_response(resp).await
        })
        .await
    }

    async fn parse_response<T: for<'de> Deserialize<'de>>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, InferenceError> {
        if resp.status().is_success() {
            return Ok(resp.json::<T>().await?);
        }
        Err(self.upstream_error(resp).await)
    }

    async fn upstream_error(&self, resp: reqwest::Response) -> InferenceError {
        let status = resp.status();
        let body = match resp.bytes().await {
            Ok(mut b) => {
                if b.len() > self.config.max_error_body_bytes {
                    b.truncate(self.config.max_error_body_bytes);
                }
                String::from_utf8_lossy(&b).to_string()
            }
            Err(e) => {
                warn!(error = %e, "failed to read inference error body");
                "<failed to read error body>".to_string()
            }
        };
        if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&body) {
            let message = envelope
                .error
                .message
                .unwrap_or_else(|| "unknown upstream error".to_string());
            return InferenceError::Upstream { status, message };
        }
        InferenceError::UpstreamBody { status, body }
    }

    async fn with_retry<T, Fut, F>(&self, mut f: F) -> Result<T, InferenceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, InferenceError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match f().await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    if attempt > self.config.max_retries || !should_retry(&e) {
                        return Err(e);
                    }
                    let delay = backoff_delay(
                        self.config.initial_backoff,
                        self.config.max_backoff,
                        attempt - 1,
                    );
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "inference request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl InferenceBackend for InferenceClient {
    async fn generate_json(
        &self,
        request: StructuredRequest,
    ) -> Result<serde_json::Value, InferenceError> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let body = ChatCompletionRequest {
            model: request.model.clone(),
            messages: vec![Message {
                role: "user",
                content: request.prompt.clone(),
            }],
            response_format: ResponseFormat {
                kind: "json_schema",
                json_schema: SchemaEnvelope {
                    name: request.schema_name,
                    strict: true,
                    schema: request.schema.clone(),
                },
            },
        };

        let response: ChatCompletionResponse = self
            .with_retry(|| async {
                let resp = self
                    .http
                    .post(&url)
                    .timeout(self.config.default_timeout)
                    .json(&body)
                    .send()
                    .await?;
                self.parse_response(resp).await
            })
            .await?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .ok_or(InferenceError::MissingContent)?;
        Ok(serde_json::from_str(content)?)
    }
}

fn should_retry(err: &InferenceError) -> bool {
    match err {
        InferenceError::Request(e) => e.is_timeout() || e.is_connect() || e.is_request(),
        InferenceError::Upstream { status, .. } | InferenceError::UpstreamBody { status, .. } => {
            *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
        }
        InferenceError::InvalidJson(_) | InferenceError::MissingContent => false,
    }
}

fn backoff_delay(initial: Duration, max: Duration, exponent: u32) -> Duration {
    let mult = 1u128.checked_shl(exponent).unwrap_or(u128::MAX);
    let base_ms = initial.as_millis().saturating_mul(mult);
    let capped_ms = std::cmp::min(base_ms, max.as_millis()) as u64;
    let jitter_cap = std::cmp::max(1, capped_ms / 4);
    Duration::from_millis(capped_ms.saturating_add(pseudo_jitter_ms(jitter_cap)))
}

fn pseudo_jitter_ms(max_inclusive: u64) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0));
    (now.subsec_nanos() as u64) % (max_inclusive + 1)
}

#[derive(Debug, Serialize)]
struct SpeechRequest {
    model: String,
    input: String,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: SchemaEnvelope,
}

#[derive(Debug, Serialize)]
struct SchemaEnvelope {
    name: &'static str,
    strict: bool,
    schema: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorObject,
}

#[derive(Debug, Deserialize)]
struct ErrorObject {
    message: Option<String>,
}

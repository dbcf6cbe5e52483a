use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::sleep;

use crate::{
    retry::{
        budget_allows, is_retryable_http_error, new_request_id, parse_retry_after_ms,
        retry_delay_ms, should_retry_status,
    },
    ChatRequest, ChatResponse, ChatUsage, LlmClient, Message, MessageRole, TollgateAiError,
};

pub const DEFAULT_COHERE_API_BASE: &str = "https://api.cohere.ai/v1";

#[derive(Debug, Clone)]
/// Public struct `CohereConfig` used across Tollgate components.
pub struct CohereConfig {
    pub api_base: String,
    pub api_key: String,
    pub request_timeout_ms: u64,
    pub max_retries: usize,
    pub retry_budget_ms: u64,
}

impl CohereConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_COHERE_API_BASE.to_string(),
            api_key: api_key.into(),
            request_timeout_ms: 30_000,
            max_retries: 2,
            retry_budget_ms: 0,
        }
    }
}

#[derive(Debug, Clone)]
/// Cohere `/chat` client. The last user message becomes `message`, earlier
/// turns are sent as `chat_history`, and system text becomes the `preamble`.
pub struct CohereClient {
    client: reqwest::Client,
    config: CohereConfig,
}

impl CohereClient {
    pub fn new(config: CohereConfig) -> Result<Self, TollgateAiError> {
        if config.api_key.trim().is_empty() {
            return Err(TollgateAiError::MissingApiKey);
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let bearer = format!("Bearer {}", config.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&bearer).map_err(|e| {
                TollgateAiError::InvalidResponse(format!("invalid API key header: {e}"))
            })?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_millis(
                config.request_timeout_ms.max(1),
            ))
            .build()?;

        Ok(Self { client, config })
    }

    fn chat_url(&self) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        if base.ends_with("/chat") {
            return base.to_string();
        }
        format!("{base}/chat")
    }
}

#[async_trait]
impl LlmClient for CohereClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, TollgateAiError> {
        let body = build_chat_body(&request)?;
        let url = self.chat_url();
        let started = std::time::Instant::now();
        let max_retries = self.config.max_retries;

        for attempt in 0..=max_retries {
            let request_id = new_request_id();
            let response = self
                .client
                .post(&url)
                .header("x-tollgate-request-id", request_id.as_str())
                .header("x-tollgate-retry-attempt", attempt.to_string())
                .json(&body)
                .send()
                .await;

            let retry_after_ms = match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let raw = response.text().await?;
                        tracing::debug!(
                            request_id = %request_id,
                            attempt,
                            bytes = raw.len(),
                            "cohere chat completed"
                        );
                        return parse_chat_response(&raw);
                    }
                    let retry_after_ms = parse_retry_after_ms(response.headers());
                    let raw = response.text().await.unwrap_or_default();
                    if attempt >= max_retries || !should_retry_status(status.as_u16()) {
                        return Err(TollgateAiError::HttpStatus {
                            status: status.as_u16(),
                            body: raw,
                        });
                    }
                    retry_after_ms
                }
                Err(error) => {
                    if attempt >= max_retries || !is_retryable_http_error(&error) {
                        return Err(TollgateAiError::Http(error));
                    }
                    None
                }
            };

            let delay_ms = retry_delay_ms(attempt, retry_after_ms);
            let elapsed_ms = started.elapsed().as_millis() as u64;
            if !budget_allows(elapsed_ms, delay_ms, self.config.retry_budget_ms) {
                return Err(TollgateAiError::InvalidResponse(format!(
                    "retry budget of {}ms exhausted after {} attempts",
                    self.config.retry_budget_ms,
                    attempt + 1
                )));
            }
            tracing::debug!(attempt, delay_ms, "retrying cohere chat request");
            sleep(std::time::Duration::from_millis(delay_ms)).await;
        }

        Err(TollgateAiError::InvalidResponse(
            "request retries exhausted".to_string(),
        ))
    }
}

fn build_chat_body(request: &ChatRequest) -> Result<Value, TollgateAiError> {
    let conversation = request
        .messages
        .iter()
        .filter(|message| message.role != MessageRole::System)
        .collect::<Vec<_>>();
    let Some((last, history)) = conversation.split_last() else {
        return Err(TollgateAiError::InvalidResponse(
            "chat request has no user message".to_string(),
        ));
    };

    let mut body = json!({
        "model": request.model,
        "message": last.text,
    });
    if !history.is_empty() {
        body["chat_history"] = Value::Array(
            history
                .iter()
                .map(|message| {
                    let role = match message.role {
                        MessageRole::Assistant => "CHATBOT",
                        _ => "USER",
                    };
                    json!({ "role": role, "message": message.text })
                })
                .collect(),
        );
    }
    if let Some(preamble) = request.system_text() {
        body["preamble"] = json!(preamble);
    }
    if let Some(temperature) = request.temperature {
        body["temperature"] = json!(temperature);
    }
    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }
    Ok(body)
}

#[derive(Debug, Deserialize)]
struct CohereChatResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    meta: Option<CohereMeta>,
}

#[derive(Debug, Deserialize)]
struct CohereMeta {
    #[serde(default)]
    billed_units: Option<CohereBilledUnits>,
}

#[derive(Debug, Deserialize)]
struct CohereBilledUnits {
    #[serde(default)]
    input_tokens: f64,
    #[serde(default)]
    output_tokens: f64,
}

fn parse_chat_response(raw: &str) -> Result<ChatResponse, TollgateAiError> {
    let parsed: CohereChatResponse = serde_json::from_str(raw)?;
    let text = parsed.text.ok_or_else(|| {
        TollgateAiError::InvalidResponse("cohere response did not include text".to_string())
    })?;
    let usage = parsed
        .meta
        .and_then(|meta| meta.billed_units)
        .map(|units| {
            let input_tokens = units.input_tokens.max(0.0) as u64;
            let output_tokens = units.output_tokens.max(0.0) as u64;
            ChatUsage {
                input_tokens,
                output_tokens,
                total_tokens: input_tokens + output_tokens,
            }
        })
        .unwrap_or_default();
    Ok(ChatResponse {
        message: Message::assistant(text.trim()),
        finish_reason: parsed.finish_reason,
        usage,
    })
}

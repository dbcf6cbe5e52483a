use std::sync::Arc;

use serde_json::{json, Value};

use crate::{ChatRequest, LlmClient, Message, TollgateAiError};

pub const DEFAULT_NARRATION_MODEL: &str = "command-r-08-2024";
pub const DEFAULT_NARRATION_TEMPERATURE: f32 = 0.2;

/// Explanation and remediation text attached to a check result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrationPair {
    pub explanation: String,
    pub suggested_fix: String,
}

impl NarrationPair {
    pub fn new(explanation: impl Into<String>, suggested_fix: impl Into<String>) -> Self {
        Self {
            explanation: explanation.into(),
            suggested_fix: suggested_fix.into(),
        }
    }
}

/// Wraps an optional [`LlmClient`] and extracts structured JSON from its
/// replies.
///
/// A narrator built with [`Narrator::disabled`] fails every request with
/// [`TollgateAiError::MissingApiKey`], which callers treat like any other
/// narration failure.
#[derive(Clone)]
pub struct Narrator {
    client: Option<Arc<dyn LlmClient>>,
    model: String,
    temperature: f32,
}

impl std::fmt::Debug for Narrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Narrator")
            .field("enabled", &self.client.is_some())
            .field("model", &self.model)
            .finish()
    }
}

impl Narrator {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client: Some(client),
            model: model.into(),
            temperature: DEFAULT_NARRATION_TEMPERATURE,
        }
    }

    pub fn disabled() -> Self {
        Self {
            client: None,
            model: DEFAULT_NARRATION_MODEL.to_string(),
            temperature: DEFAULT_NARRATION_TEMPERATURE,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Sends `prompt` and returns the JSON object found in the reply, or
    /// `{"raw_text": <reply>}` when the reply carries no parseable object.
    pub async fn generate_structured(&self, prompt: &str) -> Result<Value, TollgateAiError> {
        let Some(client) = self.client.as_ref() else {
            return Err(TollgateAiError::MissingApiKey);
        };
        let response = client
            .complete(ChatRequest {
                model: self.model.clone(),
                messages: vec![Message::user(prompt)],
                max_tokens: None,
                temperature: Some(self.temperature),
            })
            .await?;
        let text = response.message.text.trim().to_string();
        Ok(extract_json_object(&text).unwrap_or_else(|| json!({ "raw_text": text })))
    }

    /// Asks for an `explanation`/`suggested_fix` pair. Each field missing from
    /// the reply, and the whole pair on failure, comes from `fallback`.
    pub async fn narrate_pair(&self, prompt: &str, fallback: NarrationPair) -> NarrationPair {
        match self.generate_structured(prompt).await {
            Ok(value) => {
                let field = |name: &str| {
                    value
                        .get(name)
                        .and_then(Value::as_str)
                        .map(str::trim)
                        .filter(|text| !text.is_empty())
                        .map(str::to_string)
                };
                NarrationPair {
                    explanation: field("explanation").unwrap_or(fallback.explanation),
                    suggested_fix: field("suggested_fix").unwrap_or(fallback.suggested_fix),
                }
            }
            Err(error) => {
                tracing::warn!(error = %error, "narration failed; using fallback text");
                fallback
            }
        }
    }
}

/// Finds a JSON object in free-form model output.
///
/// Fenced ```` ```json ```` blocks win, then any fenced block, then the span
/// from the first `{` to the last `}`.
///
/// # Examples
///
/// ```
/// use tollgate_ai::extract_json_object;
///
/// let value = extract_json_object("Sure!\n```json\n{\"severity\": \"HIGH\"}\n```").unwrap();
/// assert_eq!(value["severity"], "HIGH");
/// assert!(extract_json_object("no structure here").is_none());
/// ```
pub fn extract_json_object(text: &str) -> Option<Value> {
    let mut candidate = text.trim();
    if let Some((_, rest)) = candidate.split_once("```json") {
        candidate = rest.split("```").next().unwrap_or(rest).trim();
    } else if let Some((_, rest)) = candidate.split_once("```") {
        candidate = rest.split("```").next().unwrap_or(rest).trim();
    }
    if let (Some(start), Some(end)) = (candidate.find('{'), candidate.rfind('}')) {
        if start < end {
            candidate = &candidate[start..=end];
        }
    }
    serde_json::from_str::<Value>(candidate)
        .ok()
        .filter(Value::is_object)
}

#[cfg(test)]
mod tests {
    use super::{extract_json_object, NarrationPair, Narrator};
    use crate::{ChatRequest, ChatResponse, ChatUsage, LlmClient, Message, TollgateAiError};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    struct ScriptedClient {
        reply: Result<String, u16>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, TollgateAiError> {
            if let Ok(mut prompts) = self.prompts.lock() {
                prompts.extend(request.messages.iter().map(|m| m.text.clone()));
            }
            match &self.reply {
                Ok(text) => Ok(ChatResponse {
                    message: Message::assistant(text.clone()),
                    finish_reason: Some("COMPLETE".to_string()),
                    usage: ChatUsage::default(),
                }),
                Err(status) => Err(TollgateAiError::HttpStatus {
                    status: *status,
                    body: "boom".to_string(),
                }),
            }
        }
    }

    fn narrator(reply: Result<&str, u16>) -> Narrator {
        Narrator::new(
            Arc::new(ScriptedClient {
                reply: reply.map(str::to_string),
                prompts: Mutex::new(Vec::new()),
            }),
            "test-model",
        )
    }

    #[test]
    fn unit_extract_json_object_handles_fences_and_braces() {
        assert_eq!(
            extract_json_object("```json\n{\"a\": 1}\n```"),
            Some(json!({"a": 1}))
        );
        assert_eq!(
            extract_json_object("```\n{\"b\": 2}\n```"),
            Some(json!({"b": 2}))
        );
        assert_eq!(
            extract_json_object("Result: {\"c\": {\"d\": 3}} done"),
            Some(json!({"c": {"d": 3}}))
        );
        assert_eq!(extract_json_object("[1, 2]"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }

    #[tokio::test]
    async fn functional_generate_structured_wraps_unstructured_reply() {
        let value = narrator(Ok("The build looks fine."))
            .generate_structured("explain")
            .await
            .expect("value");
        assert_eq!(value, json!({"raw_text": "The build looks fine."}));
    }

    #[tokio::test]
    async fn functional_narrate_pair_fills_missing_fields_from_fallback() {
        let pair = narrator(Ok(r#"{"explanation": "Drift in db.host"}"#))
            .narrate_pair("prompt", NarrationPair::new("fallback", "fallback fix"))
            .await;
        assert_eq!(pair, NarrationPair::new("Drift in db.host", "fallback fix"));
    }

    #[tokio::test]
    async fn regression_narrate_pair_uses_fallback_on_failure_or_disabled() {
        let fallback = NarrationPair::new("raw findings", "review manually");
        let failed = narrator(Err(503))
            .narrate_pair("prompt", fallback.clone())
            .await;
        assert_eq!(failed, fallback);

        let disabled = Narrator::disabled()
            .narrate_pair("prompt", fallback.clone())
            .await;
        assert_eq!(disabled, fallback);
        assert!(!Narrator::disabled().is_enabled());
    }
}

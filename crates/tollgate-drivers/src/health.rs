use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tollgate_contract::HealthStatus;

use crate::{DriverError, HealthProbe, HealthProber};

const UP_TOKENS: [&str; 4] = ["PASS", "UP", "OK", "HEALTHY"];

/// HTTP GET health prober.
///
/// A JSON body with a string `status` field decides the outcome
/// (`PASS`, `UP`, `OK`, or `HEALTHY` mean up). Without one, any 2xx status is
/// up.
#[derive(Debug, Clone)]
pub struct HttpHealthProber {
    http: reqwest::Client,
}

impl HttpHealthProber {
    pub fn new(timeout: Duration) -> Result<Self, DriverError> {
        let http = reqwest::Client::builder()
            .timeout(timeout.max(Duration::from_millis(1)))
            .user_agent("tollgate-readiness")
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl HealthProber for HttpHealthProber {
    async fn probe(&self, url: &str) -> Result<HealthProbe, DriverError> {
        let parsed = url::Url::parse(url.trim()).map_err(|error| DriverError::InvalidUrl {
            url: url.to_string(),
            reason: error.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DriverError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        let started = Instant::now();
        let response = match self.http.get(parsed).send().await {
            Ok(response) => response,
            Err(error) => {
                tracing::debug!(url, error = %error, "health probe transport failure");
                return Ok(HealthProbe {
                    status: HealthStatus::Down,
                    latency_ms: 0,
                    http_code: 0,
                    error: Some(error.to_string()),
                });
            }
        };
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        Ok(HealthProbe {
            status: classify_health(status.is_success(), &body),
            latency_ms,
            http_code: status.as_u16(),
            error: None,
        })
    }
}

/// Health verdict for a response body, falling back to the HTTP outcome.
pub fn classify_health(http_success: bool, body: &str) -> HealthStatus {
    let reported = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("status")
                .and_then(Value::as_str)
                .map(|status| status.trim().to_ascii_uppercase())
        });
    let is_up = match reported {
        Some(status) => UP_TOKENS.contains(&status.as_str()),
        None => http_success,
    };
    if is_up {
        HealthStatus::Up
    } else {
        HealthStatus::Down
    }
}

#[cfg(test)]
mod tests {
    use super::classify_health;
    use tollgate_contract::HealthStatus;

    #[test]
    fn unit_classify_health_prefers_body_status() {
        assert_eq!(classify_health(true, r#"{"status":"pass"}"#), HealthStatus::Up);
        assert_eq!(classify_health(true, r#"{"status":"Healthy"}"#), HealthStatus::Up);
        assert_eq!(classify_health(true, r#"{"status":"DEGRADED"}"#), HealthStatus::Down);
        assert_eq!(classify_health(false, r#"{"status":"UP"}"#), HealthStatus::Up);
    }

    #[test]
    fn unit_classify_health_falls_back_to_http_outcome() {
        assert_eq!(classify_health(true, "ok"), HealthStatus::Up);
        assert_eq!(classify_health(true, "[1,2]"), HealthStatus::Up);
        assert_eq!(classify_health(false, ""), HealthStatus::Down);
        assert_eq!(classify_health(true, r#"{"status": 1}"#), HealthStatus::Up);
    }
}

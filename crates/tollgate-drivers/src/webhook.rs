use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tollgate_contract::ReadinessStatus;

use crate::transport::truncate_for_error;
use crate::{DeploymentAlert, DeploymentNotifier, DriverError, NotificationOutcome};

/// Posts Slack block-kit readiness alerts to an incoming webhook.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    http: reqwest::Client,
    webhook_url: Option<String>,
}

impl WebhookNotifier {
    pub fn new(webhook_url: Option<String>, timeout: Duration) -> Result<Self, DriverError> {
        let http = reqwest::Client::builder()
            .timeout(timeout.max(Duration::from_millis(1)))
            .build()?;
        let webhook_url = webhook_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());
        Ok(Self { http, webhook_url })
    }

    pub fn is_configured(&self) -> bool {
        self.webhook_url.is_some()
    }
}

#[async_trait]
impl DeploymentNotifier for WebhookNotifier {
    async fn send_deployment_alert(
        &self,
        alert: &DeploymentAlert,
    ) -> Result<NotificationOutcome, DriverError> {
        let Some(url) = self.webhook_url.as_deref() else {
            tracing::debug!("no webhook configured; skipping readiness alert");
            return Ok(NotificationOutcome::Skipped);
        };
        let response = self
            .http
            .post(url)
            .json(&build_alert_payload(alert))
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            tracing::info!(score = alert.score, status = %alert.status, "readiness alert sent");
            return Ok(NotificationOutcome::Sent);
        }
        let body = response.text().await.unwrap_or_default();
        Err(DriverError::HttpStatus {
            operation: "webhook alert".to_string(),
            status: status.as_u16(),
            body: truncate_for_error(&body, 400),
        })
    }
}

/// Block-kit payload; CAUTION verdicts carry Approve/Abort buttons.
pub fn build_alert_payload(alert: &DeploymentAlert) -> Value {
    let recommendations = if alert.penalties.is_empty() {
        "None".to_string()
    } else {
        alert.penalties.join(", ")
    };
    let mut blocks = vec![
        json!({
            "type": "header",
            "text": {"type": "plain_text", "text": "Deployment Readiness Alert"}
        }),
        json!({
            "type": "section",
            "fields": [
                {"type": "mrkdwn", "text": format!("*Score:*\n{}/100", alert.score)},
                {"type": "mrkdwn", "text": format!("*Status:*\n{}", alert.status)}
            ]
        }),
        json!({
            "type": "section",
            "text": {"type": "mrkdwn", "text": format!("*Summary:*\n{}", alert.summary)}
        }),
        json!({
            "type": "section",
            "text": {"type": "mrkdwn", "text": format!("*Recommendations:* {recommendations}")}
        }),
    ];
    if alert.status == ReadinessStatus::Caution {
        blocks.push(json!({
            "type": "actions",
            "elements": [
                {
                    "type": "button",
                    "text": {"type": "plain_text", "text": "Approve"},
                    "style": "primary",
                    "value": "approve"
                },
                {
                    "type": "button",
                    "text": {"type": "plain_text", "text": "Abort"},
                    "style": "danger",
                    "value": "abort"
                }
            ]
        }));
    }
    json!({ "blocks": blocks })
}

#[cfg(test)]
mod tests {
    use super::{build_alert_payload, WebhookNotifier};
    use crate::{DeploymentAlert, DeploymentNotifier, NotificationOutcome};
    use std::time::Duration;
    use tollgate_contract::ReadinessStatus;

    fn alert(status: ReadinessStatus) -> DeploymentAlert {
        DeploymentAlert {
            score: 60,
            status,
            summary: "Dependency resolution failed".to_string(),
            penalties: vec![
                "Build log severity MEDIUM: -20".to_string(),
                "Config drift detected: -15".to_string(),
            ],
        }
    }

    #[test]
    fn unit_caution_alert_includes_action_buttons() {
        let payload = build_alert_payload(&alert(ReadinessStatus::Caution));
        let blocks = payload["blocks"].as_array().expect("blocks");
        assert_eq!(blocks.len(), 5);
        assert_eq!(blocks[4]["elements"][0]["value"], "approve");
        assert_eq!(blocks[4]["elements"][1]["style"], "danger");
        assert_eq!(
            blocks[3]["text"]["text"],
            "*Recommendations:* Build log severity MEDIUM: -20, Config drift detected: -15"
        );
    }

    #[test]
    fn unit_non_caution_alert_has_no_actions() {
        let payload = build_alert_payload(&alert(ReadinessStatus::NotSafe));
        assert_eq!(payload["blocks"].as_array().expect("blocks").len(), 4);
        assert_eq!(payload["blocks"][1]["fields"][1]["text"], "*Status:*\nNOT_SAFE");
    }

    #[tokio::test]
    async fn functional_missing_webhook_skips_delivery() {
        let notifier = WebhookNotifier::new(Some("  ".to_string()), Duration::from_secs(1))
            .expect("notifier");
        assert!(!notifier.is_configured());
        let outcome = notifier
            .send_deployment_alert(&alert(ReadinessStatus::Safe))
            .await
            .expect("outcome");
        assert_eq!(outcome, NotificationOutcome::Skipped);
    }
}

use std::sync::Arc;

use tollgate_ai::{NarrationPair, Narrator};
use tollgate_contract::{CheckErrorCode, CheckResult, HealthResult, HealthStatus};
use tollgate_drivers::HealthProber;

use super::narrated_failure;
use crate::registry::HealthCheckArgs;

/// Probes one service endpoint and narrates the outcome.
#[derive(Clone)]
pub struct HealthCheck {
    prober: Arc<dyn HealthProber>,
    narrator: Narrator,
}

impl std::fmt::Debug for HealthCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthCheck").finish_non_exhaustive()
    }
}

impl HealthCheck {
    pub fn new(prober: Arc<dyn HealthProber>, narrator: Narrator) -> Self {
        Self { prober, narrator }
    }

    pub async fn execute(&self, args: HealthCheckArgs) -> CheckResult {
        let HealthCheckArgs {
            service_name,
            health_url,
        } = args;
        let probe = match self.prober.probe(&health_url).await {
            Ok(probe) => probe,
            Err(error) => {
                let message = error.to_string();
                let prompt = format!(
                    "The health auditor encountered an error checking {service_name}.\n\
                     Error: {message}\nTarget URL: {health_url}\n\
                     Explain why this check failed and how to resolve it. Return JSON with 'explanation' and 'suggested_fix'."
                );
                return narrated_failure(
                    &self.narrator,
                    CheckErrorCode::HealthCheckError,
                    message.clone(),
                    &prompt,
                    NarrationPair::new(
                        format!("System error: {message}"),
                        "Verify the health endpoint URL.",
                    ),
                )
                .await;
            }
        };
        tracing::debug!(
            service = %service_name,
            status = probe.status.as_str(),
            http_code = probe.http_code,
            latency_ms = probe.latency_ms,
            "health probe finished"
        );

        let mut prompt = format!(
            "Analyze this health check result for '{service_name}'.\n\
             Endpoint: {health_url}\nStatus: {}\nHTTP Response: {}\nLatency: {}ms\n",
            probe.status.as_str(),
            probe.http_code,
            probe.latency_ms
        );
        if let Some(error) = probe.error.as_deref() {
            prompt.push_str(&format!("Transport error: {error}\n"));
        }
        prompt.push_str(
            "\nReturn JSON with 'explanation' (a summary of the service health) and \
             'suggested_fix' (recovery steps if the service is degraded or down).",
        );
        let fallback = match probe.status {
            HealthStatus::Up => NarrationPair::new(
                format!("{service_name} status: UP"),
                "No action required.",
            ),
            HealthStatus::Down => NarrationPair::new(
                match probe.error.as_deref() {
                    Some(error) => format!("{service_name} status: DOWN ({error})"),
                    None => format!("{service_name} status: DOWN"),
                },
                "Review results manually.",
            ),
        };
        let narration = self.narrator.narrate_pair(&prompt, fallback).await;

        let result = HealthResult {
            service_name,
            health_url,
            status: probe.status,
            latency_ms: probe.latency_ms,
            http_code: probe.http_code,
            explanation: narration.explanation,
            suggested_fix: narration.suggested_fix,
        };
        match serde_json::to_value(&result) {
            Ok(data) => CheckResult::ok(data),
            Err(error) => CheckResult::failure(CheckErrorCode::HealthCheckError, error.to_string()),
        }
    }
}

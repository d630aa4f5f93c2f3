//! HTTP client for the remote profanity check, behind a circuit breaker.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::application::moderation::{ContentGate, GateError};

use super::circuit::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use super::error::InfraError;

const SOURCE: &str = "shardpress::infra::profanity";

#[derive(Serialize)]
struct CheckRequest<'a> {
    text: &'a str,
}

/// `POST {base_url}/check` with `{"text": ...}`, answered by `{"isClean": bool}`.
pub struct ProfanityClient {
    client: reqwest::Client,
    check_url: String,
    breaker: CircuitBreaker,
}

impl ProfanityClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        breaker: CircuitBreakerConfig,
    ) -> Result<Self, InfraError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::configuration(format!("profanity client: {err}")))?;

        Ok(Self {
            client,
            check_url: format!("{}/check", base_url.trim_end_matches('/')),
            breaker: CircuitBreaker::new(breaker),
        })
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    async fn call(&self, text: &str) -> Result<bool, GateError> {
        let response = self
            .client
            .post(&self.check_url)
            .json(&CheckRequest { text })
            .send()
            .await
            .map_err(|err| GateError::Unavailable(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GateError::Unavailable(format!(
                "profanity service answered {status}"
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|err| GateError::Unavailable(err.to_string()))?;
        Ok(parse_is_clean(&body))
    }
}

#[async_trait]
impl ContentGate for ProfanityClient {
    async fn is_clean(&self, text: &str) -> Result<bool, GateError> {
        if !self.breaker.is_allowed() {
            debug!(target = SOURCE, "circuit open; skipping profanity check");
            return Err(GateError::CircuitOpen);
        }

        match self.call(text).await {
            Ok(clean) => {
                self.breaker.record_success();
                Ok(clean)
            }
            Err(err) => {
                self.breaker.record_failure();
                warn!(
                    target = SOURCE,
                    error = %err,
                    circuit = ?self.breaker.state(),
                    "profanity check failed"
                );
                Err(err)
            }
        }
    }
}

/// Reads `isClean` with case-insensitive key matching. A missing or non-boolean flag is
/// treated as not clean.
fn parse_is_clean(body: &Value) -> bool {
    body.as_object()
        .and_then(|fields| {
            fields
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case("isclean"))
                .and_then(|(_, value)| value.as_bool())
        })
        .unwrap_or(false)
}

//! Identity service transport
//!
//! The ticket, login and status endpoints all answer with the same
//! `{success, payload, message}` envelope. Requests are retried on
//! connection-level failures with a constant backoff bounded by total
//! elapsed time.

use std::sync::Arc;
use std::time::Duration;

use backoff::{future::retry, ExponentialBackoff};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::RateLimitConfig;
use crate::error::{AuthStage, Error, Result};
use crate::net::HttpPool;

/// Response envelope shared by the identity endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    pub payload: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    /// Payload of a successful response, or an auth error naming the stage
    pub fn into_payload(self, stage: AuthStage) -> Result<T> {
        match (self.success, self.payload) {
            (true, Some(payload)) => Ok(payload),
            (_, _) => Err(Error::Auth {
                stage,
                message: self
                    .message
                    .unwrap_or_else(|| "remote did not report success".to_string()),
            }),
        }
    }
}

/// Client for `{identity_base_url}/...` endpoints
pub struct IdentityClient {
    http: Arc<HttpPool>,
    base_url: String,
    retry_interval: Duration,
    retry_max_elapsed: Duration,
}

impl IdentityClient {
    pub fn new(http: Arc<HttpPool>, base_url: &str, retry: &RateLimitConfig) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry_interval: Duration::from_millis(retry.transport_retry_delay_ms),
            retry_max_elapsed: Duration::from_millis(retry.transport_max_elapsed_ms),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// POST a JSON body and decode the envelope
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<ApiEnvelope<T>>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let url = url.as_str();
        self.with_retry(url, || async move {
            let route = self.http.next();
            let response = route
                .client
                .post(url)
                .json(body)
                .send()
                .await
                .map_err(|e| self.http.map_err(e))?;
            decode_envelope(response, self.http.timeout_ms()).await
        })
        .await
    }

    /// GET with the session token header and decode the envelope
    pub async fn get_authed<T>(&self, path: &str, token: &str) -> Result<ApiEnvelope<T>>
    where
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let url = url.as_str();
        self.with_retry(url, || async move {
            let route = self.http.next();
            let response = route
                .client
                .get(url)
                .header("x-auth-token", token)
                .send()
                .await
                .map_err(|e| self.http.map_err(e))?;
            decode_envelope(response, self.http.timeout_ms()).await
        })
        .await
    }

    async fn with_retry<T, F, Fut>(&self, url: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        // constant interval: no growth, no jitter
        let backoff = ExponentialBackoff {
            current_interval: self.retry_interval,
            initial_interval: self.retry_interval,
            max_interval: self.retry_interval,
            multiplier: 1.0,
            randomization_factor: 0.0,
            max_elapsed_time: Some(self.retry_max_elapsed),
            ..Default::default()
        };

        retry(backoff, || {
            let attempt = op();
            async move {
                match attempt.await {
                    Ok(value) => Ok(value),
                    Err(e) if is_transient(&e) => {
                        warn!("[{}] {} failed, retrying: {}", e.category(), url, e);
                        Err(backoff::Error::transient(e))
                    }
                    Err(e) => Err(backoff::Error::permanent(e)),
                }
            }
        })
        .await
    }
}

fn is_transient(e: &Error) -> bool {
    e.is_retryable() || matches!(e, Error::UnexpectedStatus { status, .. } if *status >= 500)
}

/// Decode the response body into an envelope
async fn decode_envelope<T: DeserializeOwned>(
    response: reqwest::Response,
    timeout_ms: u64,
) -> Result<ApiEnvelope<T>> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| Error::from_reqwest(e, timeout_ms))?;

    if status.is_success() {
        return serde_json::from_str(&body).map_err(|e| {
            Error::Serialization(format!("Failed to parse identity response: {}", e))
        });
    }

    // a 4xx carrying {success: false, message} is a definitive answer, not a transport failure
    if status.is_client_error() {
        if let Ok(envelope) = serde_json::from_str::<ApiEnvelope<T>>(&body) {
            return Ok(envelope);
        }
    }

    Err(Error::UnexpectedStatus {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_payload() {
        let ok: ApiEnvelope<String> =
            serde_json::from_str(r#"{"success": true, "payload": "msg"}"#).unwrap();
        assert_eq!(ok.into_payload(AuthStage::NoSession).unwrap(), "msg");

        let rejected: ApiEnvelope<String> =
            serde_json::from_str(r#"{"success": false, "message": "bad nonce"}"#).unwrap();
        let err = rejected.into_payload(AuthStage::NoSession).unwrap_err();
        assert_eq!(err.to_string(), "Auth rejected at no-session: bad nonce");

        let missing: ApiEnvelope<String> = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(missing.into_payload(AuthStage::Signed).is_err());
    }

    #[test]
    fn test_transient_classification() {
        assert!(is_transient(&Error::Transport("reset".to_string())));
        assert!(is_transient(&Error::Timeout(60000)));
        assert!(is_transient(&Error::UnexpectedStatus {
            status: 502,
            body: String::new()
        }));
        assert!(!is_transient(&Error::UnexpectedStatus {
            status: 404,
            body: String::new()
        }));
        assert!(!is_transient(&Error::Serialization("x".to_string())));
    }
}

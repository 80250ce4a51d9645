//! Usage reporting
//!
//! Every answered question is reported to the usage tracker. Rate limited
//! reports are retried with exponential backoff up to `max_retries` times;
//! any other failure gives up immediately.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::net::{HttpPool, RateLimitDetector, RateLimiter};
use crate::wallet::Account;

use super::agent::NO_ANSWER;
use super::stats::StatsFetcher;

/// Body of a usage report
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UsageReport {
    pub wallet_address: String,
    pub agent_id: String,
    pub request_text: String,
    pub response_text: String,
    pub request_metadata: HashMap<String, String>,
}

impl UsageReport {
    pub fn new(wallet_address: &str, agent_id: &str, question: &str, answer: &str) -> Self {
        let answer = answer.trim();
        Self {
            wallet_address: wallet_address.to_lowercase(),
            agent_id: agent_id.to_string(),
            request_text: question.to_string(),
            response_text: if answer.is_empty() {
                NO_ANSWER.to_string()
            } else {
                answer.to_string()
            },
            request_metadata: HashMap::new(),
        }
    }
}

pub struct UsageReporter {
    http: Arc<HttpPool>,
    limiter: Arc<RateLimiter>,
    detector: RateLimitDetector,
    usage_url: String,
    max_retries: u32,
    stats: Option<Arc<StatsFetcher>>,
}

impl UsageReporter {
    pub fn new(
        http: Arc<HttpPool>,
        limiter: Arc<RateLimiter>,
        detector: RateLimitDetector,
        usage_url: &str,
        max_retries: u32,
    ) -> Self {
        Self {
            http,
            limiter,
            detector,
            usage_url: usage_url.to_string(),
            max_retries,
            stats: None,
        }
    }

    /// Refresh and log stats after each successful report
    pub fn with_stats(mut self, stats: Arc<StatsFetcher>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Report one question/answer pair
    ///
    /// Returns whether the tracker accepted the report. A failed stats
    /// refresh afterwards does not change the result.
    pub async fn report(
        &self,
        account: &Account,
        agent_id: &str,
        question: &str,
        answer: &str,
    ) -> bool {
        let report = UsageReport::new(account.address(), agent_id, question, answer);
        let short = account.wallet().short_address();

        let mut retry = 0;
        loop {
            match self.send(&report).await {
                Ok(()) => break,
                Err(e) if e.is_rate_limited() && retry < self.max_retries => {
                    let delay = self.limiter.backoff_delay(retry);
                    warn!(
                        category = e.category(),
                        "[{}] Usage report for {} throttled, retry {}/{} in {:?}",
                        e.category(),
                        short,
                        retry + 1,
                        self.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(e) => {
                    warn!(
                        category = e.category(),
                        "[{}] Usage report for {} failed: {}",
                        e.category(),
                        short,
                        e
                    );
                    return false;
                }
            }
        }

        info!("Usage reported for {} on {}", short, agent_id);

        if let Some(stats) = &self.stats {
            stats.log_stats(account).await;
        }
        true
    }

    async fn send(&self, report: &UsageReport) -> Result<()> {
        self.limiter.throttle().await;

        let route = self.http.next();
        debug!("Reporting usage via {}", route.via());

        let response = route
            .client
            .post(&self.usage_url)
            .json(report)
            .send()
            .await
            .map_err(|e| self.http.map_err(e))?;

        let status = response.status();
        if status == reqwest::StatusCode::OK {
            return Ok(());
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::from_reqwest(e, self.http.timeout_ms()))?;
        Err(self.detector.classify(status.as_u16(), body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::auth::tests::{test_account, test_identity};
    use crate::api::auth::SessionAuthenticator;
    use crate::config::{AuthConfig, HttpConfig};
    use crate::net::ProxyPool;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn reporter(server: &MockServer) -> UsageReporter {
        let http = Arc::new(
            HttpPool::new(&HttpConfig::default(), Arc::new(ProxyPool::new(Vec::new()))).unwrap(),
        );
        let limiter = Arc::new(RateLimiter::new(
            60_000,
            Duration::from_millis(1),
            Duration::from_millis(4),
        ));
        let detector = RateLimitDetector::new(&["rate limit exceeded".to_string()]).unwrap();
        UsageReporter::new(
            http,
            limiter,
            detector,
            &format!("{}/api/report_usage", server.uri()),
            5,
        )
    }

    #[test]
    fn test_report_body() {
        let report = UsageReport::new("0xABCdef", "deployment_x", "q?", "  ");
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(
            value,
            json!({
                "wallet_address": "0xabcdef",
                "agent_id": "deployment_x",
                "request_text": "q?",
                "response_text": "no answer",
                "request_metadata": {}
            })
        );
    }

    #[tokio::test]
    async fn test_success_on_200() {
        let server = MockServer::start().await;
        let account = test_account();
        Mock::given(method("POST"))
            .and(path("/api/report_usage"))
            .and(body_json(json!({
                "wallet_address": account.address(),
                "agent_id": "agent_1",
                "request_text": "q",
                "response_text": "a",
                "request_metadata": {}
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        assert!(reporter(&server).report(&account, "agent_1", "q", "a").await);
    }

    #[tokio::test]
    async fn test_rate_limit_retries_are_bounded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/report_usage"))
            .respond_with(ResponseTemplate::new(429).set_body_string("Rate limit exceeded"))
            .expect(6)
            .mount(&server)
            .await;

        let ok = reporter(&server)
            .report(&test_account(), "agent_1", "q", "a")
            .await;
        assert!(!ok);
    }

    #[tokio::test]
    async fn test_rate_limit_message_without_429_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/report_usage"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string("Rate Limit Exceeded, try later"),
            )
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/report_usage"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        assert!(reporter(&server).report(&test_account(), "a", "q", "x").await);
    }

    #[tokio::test]
    async fn test_other_failure_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/report_usage"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        assert!(!reporter(&server).report(&test_account(), "a", "q", "x").await);
    }

    #[tokio::test]
    async fn test_non_200_success_status_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/report_usage"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        assert!(!reporter(&server).report(&test_account(), "a", "q", "x").await);
    }

    #[tokio::test]
    async fn test_failed_stats_refresh_keeps_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/report_usage"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/auth/get-auth-ticket"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let identity = test_identity(&server);
        let auth = Arc::new(SessionAuthenticator::new(
            identity.clone(),
            AuthConfig::default(),
        ));
        let stats = Arc::new(StatsFetcher::new(identity, auth));
        let reporter = reporter(&server).with_stats(stats);

        assert!(reporter.report(&test_account(), "a", "q", "x").await);
    }
}

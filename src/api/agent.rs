//! Question agents
//!
//! Each agent is a streaming chat endpoint addressed by its deployment id.

use std::sync::Arc;

use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, info, trace};

use crate::error::{Error, Result};
use crate::net::{HttpPool, RateLimitDetector, RateLimiter};
use crate::stream::AnswerAccumulator;

/// Answer text used when an agent streams nothing back
pub const NO_ANSWER: &str = "no answer";

/// Resolve an agent's endpoint from the url template
///
/// The id is lowercased and its first underscore becomes a hyphen, which is
/// how deployment ids map onto host names.
pub fn endpoint_url(template: &str, agent_id: &str) -> String {
    let host = agent_id.to_lowercase().replacen('_', "-", 1);
    template.replace("{agent}", &host)
}

#[derive(Serialize)]
struct AskRequest<'a> {
    message: &'a str,
    stream: bool,
}

pub struct QuestionAgentClient {
    http: Arc<HttpPool>,
    limiter: Arc<RateLimiter>,
    detector: RateLimitDetector,
    url_template: String,
}

impl QuestionAgentClient {
    pub fn new(
        http: Arc<HttpPool>,
        limiter: Arc<RateLimiter>,
        detector: RateLimitDetector,
        url_template: &str,
    ) -> Self {
        Self {
            http,
            limiter,
            detector,
            url_template: url_template.to_string(),
        }
    }

    pub fn url_for(&self, agent_id: &str) -> String {
        endpoint_url(&self.url_template, agent_id)
    }

    /// Ask an agent a question and collect the streamed answer
    ///
    /// Never returns an empty string; an empty stream yields [`NO_ANSWER`].
    pub async fn ask(&self, agent_id: &str, question: &str) -> Result<String> {
        self.limiter.throttle().await;

        let timeout = self.http.timeout();
        match tokio::time::timeout(timeout, self.stream_answer(agent_id, question)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(self.http.timeout_ms())),
        }
    }

    async fn stream_answer(&self, agent_id: &str, question: &str) -> Result<String> {
        let url = self.url_for(agent_id);
        let route = self.http.next();
        debug!("Asking {} via {}", url, route.via());

        let response = route
            .client
            .post(&url)
            .header("Accept", "text/event-stream")
            .json(&AskRequest {
                message: question,
                stream: true,
            })
            .send()
            .await
            .map_err(|e| self.http.map_err(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.detector.classify(status.as_u16(), body));
        }

        let mut answer = AnswerAccumulator::new();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| self.http.map_err(e))?;
            if let Some(delta) = answer.push(&chunk) {
                trace!("[{}] +{:?}", agent_id, delta);
            }
            if answer.is_done() {
                break;
            }
        }

        let text = answer.finish();
        let text = text.trim();
        if text.is_empty() {
            info!("Agent {} returned an empty answer", agent_id);
            return Ok(NO_ANSWER.to_string());
        }
        Ok(text.to_string())
    }
}

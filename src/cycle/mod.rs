//! The wallet × agent loop
//!
//! ```text
//! cycle n:
//!   wallet 1: agent A -> ask -> report -> pause
//!             agent B -> ask -> report -> pause
//!   wallet 2: ...
//! ```
//!
//! The orchestrator talks to the services through the traits below so the
//! loop can run against in-memory fakes.

pub mod orchestrator;

use async_trait::async_trait;

use crate::api::{QuestionAgentClient, UsageReporter};
use crate::error::Result;
use crate::wallet::Account;

pub use orchestrator::{format_duration, CycleOrchestrator, CycleSummary};

/// Something that answers questions for an agent id
#[async_trait]
pub trait AnswerSource: Send + Sync {
    async fn ask(&self, agent_id: &str, question: &str) -> Result<String>;
}

/// Something that records answered questions
#[async_trait]
pub trait UsageSink: Send + Sync {
    async fn report(
        &self,
        account: &Account,
        agent_id: &str,
        question: &str,
        answer: &str,
    ) -> bool;
}

#[async_trait]
impl AnswerSource for QuestionAgentClient {
    async fn ask(&self, agent_id: &str, question: &str) -> Result<String> {
        QuestionAgentClient::ask(self, agent_id, question).await
    }
}

#[async_trait]
impl UsageSink for UsageReporter {
    async fn report(
        &self,
        account: &Account,
        agent_id: &str,
        question: &str,
        answer: &str,
    ) -> bool {
        UsageReporter::report(self, account, agent_id, question, answer).await
    }
}

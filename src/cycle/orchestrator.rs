use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::AgentDescriptor;
use crate::questions::QuestionSource;
use crate::wallet::Account;

use super::{AnswerSource, UsageSink};

/// Outcome counts for one pass over every wallet and agent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub cycle: u64,
    pub steps: usize,
    pub reported: usize,
    pub failed: usize,
}

pub struct CycleOrchestrator {
    accounts: Vec<Account>,
    agents: Vec<AgentDescriptor>,
    answers: Arc<dyn AnswerSource>,
    usage: Arc<dyn UsageSink>,
    questions: Arc<dyn QuestionSource>,
    step_delay: Duration,
    cancel: CancellationToken,
    started: Instant,
}

impl CycleOrchestrator {
    pub fn new(
        accounts: Vec<Account>,
        agents: Vec<AgentDescriptor>,
        answers: Arc<dyn AnswerSource>,
        usage: Arc<dyn UsageSink>,
        questions: Arc<dyn QuestionSource>,
        step_delay: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            accounts,
            agents,
            answers,
            usage,
            questions,
            step_delay,
            cancel,
            started: Instant::now(),
        }
    }

    fn running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Run cycles until cancelled; returns the number of cycles started
    pub async fn run(&self) -> u64 {
        if self.accounts.is_empty() || self.agents.is_empty() {
            warn!("Nothing to do: {} wallets, {} agents", self.accounts.len(), self.agents.len());
            return 0;
        }

        let mut cycle = 1;
        while self.running() {
            info!("Starting cycle {}", cycle);
            let summary = self.run_cycle(cycle).await;
            info!(
                "Cycle {} finished: {} steps, {} reported, {} failed",
                summary.cycle, summary.steps, summary.reported, summary.failed
            );
            cycle += 1;
        }

        info!(
            "Stopped after {} cycles (uptime {})",
            cycle - 1,
            format_duration(self.started.elapsed())
        );
        cycle - 1
    }

    /// One pass over every wallet and agent, in listed order
    pub async fn run_cycle(&self, cycle: u64) -> CycleSummary {
        let mut summary = CycleSummary {
            cycle,
            ..Default::default()
        };

        for account in &self.accounts {
            if !self.running() {
                break;
            }
            info!("Processing wallet {}", account.address());
            info!(
                "Cycle {} | uptime {}",
                cycle,
                format_duration(self.started.elapsed())
            );

            for agent in &self.agents {
                if !self.running() {
                    break;
                }

                summary.steps += 1;
                if self.step(account, agent).await {
                    summary.reported += 1;
                } else {
                    summary.failed += 1;
                }

                if self.running() {
                    self.pause().await;
                }
            }
        }

        summary
    }

    /// Ask one agent and report the answer; failures stay inside the step
    async fn step(&self, account: &Account, agent: &AgentDescriptor) -> bool {
        info!("Using agent {} ({})", agent.name, agent.id);

        let question = self.questions.next_question().await;
        info!("Question: {}", question);

        let answer = match self.answers.ask(&agent.id, &question).await {
            Ok(answer) => answer,
            Err(e) => {
                error!(
                    category = e.category(),
                    "[{}] {} failed for {}: {}",
                    e.category(),
                    agent.name,
                    account.wallet().short_address(),
                    e
                );
                return false;
            }
        };
        info!("Answer: {}", answer);

        let reported = self
            .usage
            .report(account, &agent.id, &question, &answer)
            .await;
        if reported {
            info!("Usage report accepted");
        } else {
            error!("Usage report failed");
        }
        reported
    }

    async fn pause(&self) {
        debug!("Waiting {:?} before the next step", self.step_delay);
        tokio::select! {
            _ = tokio::time::sleep(self.step_delay) => {}
            _ = self.cancel.cancelled() => {
                debug!("Pause cut short by stop signal");
            }
        }
    }
}

/// `1h 2m 3s`, dropping zero hour/minute parts
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total / 60) % 60;
    let seconds = total % 60;

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    if seconds > 0 || parts.is_empty() {
        parts.push(format!("{}s", seconds));
    }
    parts.join(" ")
}

//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub endpoints: EndpointConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default = "default_agents")]
    pub agents: Vec<AgentDescriptor>,
    #[serde(default)]
    pub questions: QuestionConfig,
    #[serde(default)]
    pub files: FilesConfig,
}

/// Request pacing and retry limits
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    /// Pause after each (wallet, agent) step
    #[serde(default = "default_interval_between_cycles_ms")]
    pub interval_between_cycles_ms: u64,
    /// Constant wait between transport retries of identity calls
    #[serde(default = "default_transport_retry_delay_ms")]
    pub transport_retry_delay_ms: u64,
    /// Give up on an identity call after this much retrying
    #[serde(default = "default_transport_max_elapsed_ms")]
    pub transport_max_elapsed_ms: u64,
    /// Case-insensitive patterns that mark a failure body as rate limited
    #[serde(default = "default_rate_limit_patterns")]
    pub rate_limit_patterns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    /// Base for get-auth-ticket, eth login and get-status
    #[serde(default = "default_identity_base_url")]
    pub identity_base_url: String,
    #[serde(default = "default_usage_url")]
    pub usage_url: String,
    /// `{agent}` is replaced with the normalized agent id
    #[serde(default = "default_agent_url_template")]
    pub agent_url_template: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_blockchain_name")]
    pub blockchain_name: String,
    #[serde(default = "default_referral_id")]
    pub referral_id: String,
}

/// A remote question-answering agent
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AgentDescriptor {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionConfig {
    #[serde(default = "default_question_pool")]
    pub pool: Vec<String>,
    #[serde(default = "default_fallback_question")]
    pub fallback: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilesConfig {
    #[serde(default = "default_wallets_file")]
    pub wallets: String,
    #[serde(default = "default_proxies_file")]
    pub proxies: String,
}

impl RateLimitConfig {
    pub fn interval_between_cycles(&self) -> Duration {
        Duration::from_millis(self.interval_between_cycles_ms)
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            requests_per_minute: default_requests_per_minute(),
            interval_between_cycles_ms: default_interval_between_cycles_ms(),
            transport_retry_delay_ms: default_transport_retry_delay_ms(),
            transport_max_elapsed_ms: default_transport_max_elapsed_ms(),
            rate_limit_patterns: default_rate_limit_patterns(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            identity_base_url: default_identity_base_url(),
            usage_url: default_usage_url(),
            agent_url_template: default_agent_url_template(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            blockchain_name: default_blockchain_name(),
            referral_id: default_referral_id(),
        }
    }
}

impl Default for QuestionConfig {
    fn default() -> Self {
        Self {
            pool: default_question_pool(),
            fallback: default_fallback_question(),
        }
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            wallets: default_wallets_file(),
            proxies: default_proxies_file(),
        }
    }
}

fn default_max_retries() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    2000
}

fn default_max_delay_ms() -> u64 {
    10000
}

fn default_requests_per_minute() -> u32 {
    15
}

fn default_interval_between_cycles_ms() -> u64 {
    15000
}

fn default_transport_retry_delay_ms() -> u64 {
    12000
}

fn default_transport_max_elapsed_ms() -> u64 {
    60000
}

fn default_rate_limit_patterns() -> Vec<String> {
    vec!["rate limit exceeded".to_string()]
}

fn default_timeout_ms() -> u64 {
    60000
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string()
}

fn default_identity_base_url() -> String {
    "https://api-kiteai.bonusblock.io/api".to_string()
}

fn default_usage_url() -> String {
    "https://quests-usage-dev.prod.zettablock.com/api/report_usage".to_string()
}

fn default_agent_url_template() -> String {
    "https://{agent}.stag-vxzy.zettablock.com/main".to_string()
}

fn default_blockchain_name() -> String {
    "ethereum".to_string()
}

fn default_referral_id() -> String {
    "optionalReferral".to_string()
}

fn default_agents() -> Vec<AgentDescriptor> {
    [
        ("deployment_R89FtdnXa7jWWHyr97WQ9LKG", "Professor"),
        ("deployment_fseGykIvCLs3m9Nrpe9Zguy9", "Crypto Buddy"),
        ("deployment_zs6OE0EdBuQuit8KK0V10dJT", "Sherlock"),
    ]
    .into_iter()
    .map(|(id, name)| AgentDescriptor {
        id: id.to_string(),
        name: name.to_string(),
    })
    .collect()
}

fn default_question_pool() -> Vec<String> {
    [
        concat!(
            "How does proof of stake change the security assumptions ",
            "of a blockchain compared to proof of work?"
        ),
        "What trade-offs do rollups make between data availability and transaction cost?",
        "How could decentralized identity change the way users log in to web applications?",
        "What makes a stablecoin resilient during a market-wide liquidity crunch?",
        concat!(
            "How do zero-knowledge proofs let someone prove a fact ",
            "without revealing the data behind it?"
        ),
        "What are the biggest risks of bridging assets between two blockchains?",
        "How might AI agents pay each other for services using on-chain payments?",
        "Why do some DeFi protocols use time-weighted average prices instead of spot prices?",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_fallback_question() -> String {
    "What are the key advantages of blockchain technology?".to_string()
}

fn default_wallets_file() -> String {
    "wallets.json".to_string()
}

fn default_proxies_file() -> String {
    "proxies.txt".to_string()
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix KITE_)
            .add_source(
                config::Environment::with_prefix("KITE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.requests_per_minute == 0 {
            anyhow::bail!("requests_per_minute must be positive");
        }

        if self.rate_limit.base_delay_ms > self.rate_limit.max_delay_ms {
            anyhow::bail!(
                "base_delay_ms ({}) cannot exceed max_delay_ms ({})",
                self.rate_limit.base_delay_ms,
                self.rate_limit.max_delay_ms
            );
        }

        if self.http.timeout_ms == 0 {
            anyhow::bail!("http.timeout_ms must be positive");
        }

        if self.agents.is_empty() {
            anyhow::bail!("At least one agent must be configured");
        }

        for agent in &self.agents {
            if agent.id.trim().is_empty() {
                anyhow::bail!("Agent '{}' has an empty id", agent.name);
            }
        }

        if !self.endpoints.agent_url_template.contains("{agent}") {
            anyhow::bail!(
                "agent_url_template must contain {{agent}}: {}",
                self.endpoints.agent_url_template
            );
        }

        for pattern in &self.rate_limit.rate_limit_patterns {
            regex::Regex::new(pattern)
                .with_context(|| format!("Invalid rate_limit_pattern regex: {}", pattern))?;
        }

        if self.questions.fallback.trim().is_empty() {
            anyhow::bail!("questions.fallback cannot be empty");
        }

        Ok(())
    }

    /// Get masked configuration for display
    pub fn masked_display(&self) -> String {
        let agents: Vec<String> = self
            .agents
            .iter()
            .map(|a| format!("{} ({})", a.name, a.id))
            .collect();

        format!(
            r#"Configuration:
  Rate limit:
    requests_per_minute: {}
    max_retries: {}
    backoff: {}ms .. {}ms
    interval_between_cycles: {}ms
  HTTP:
    timeout: {}ms
  Endpoints:
    identity: {}
    usage: {}
    agent_template: {}
  Auth:
    blockchain: {}
    referral_id: {}
  Agents: {:?}
  Questions: {} in pool
  Files:
    wallets: {}
    proxies: {}
"#,
            self.rate_limit.requests_per_minute,
            self.rate_limit.max_retries,
            self.rate_limit.base_delay_ms,
            self.rate_limit.max_delay_ms,
            self.rate_limit.interval_between_cycles_ms,
            self.http.timeout_ms,
            mask_url(&self.endpoints.identity_base_url),
            mask_url(&self.endpoints.usage_url),
            self.endpoints.agent_url_template,
            self.auth.blockchain_name,
            if self.auth.referral_id.is_empty() {
                "(not set)"
            } else {
                "***"
            },
            agents,
            self.questions.pool.len(),
            self.files.wallets,
            self.files.proxies,
        )
    }
}

/// Mask URL for display (hide API keys in query params)
fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig::default(),
            http: HttpConfig::default(),
            endpoints: EndpointConfig::default(),
            auth: AuthConfig::default(),
            agents: default_agents(),
            questions: QuestionConfig::default(),
            files: FilesConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.rate_limit.max_retries, 5);
        assert_eq!(config.rate_limit.requests_per_minute, 15);
        assert_eq!(config.http.timeout_ms, 60000);
        assert_eq!(config.agents.len(), 3);
        assert_eq!(config.agents[2].name, "Sherlock");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[rate_limit]
requests_per_minute = 30

[[agents]]
id = "deployment_abc"
name = "Solo"
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.rate_limit.requests_per_minute, 30);
        assert_eq!(config.rate_limit.max_delay_ms, 10000);
        assert_eq!(config.agents.len(), 1);
        assert_eq!(config.agents[0].id, "deployment_abc");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.rate_limit.requests_per_minute = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.rate_limit.base_delay_ms = 20000;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.endpoints.agent_url_template = "https://example.com/main".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.rate_limit.rate_limit_patterns = vec!["(unclosed".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mask_url() {
        assert_eq!(
            mask_url("https://api.example.com?key=secret"),
            "https://api.example.com?***"
        );
        assert_eq!(
            mask_url("https://api.example.com"),
            "https://api.example.com"
        );
    }
}

//! Account statistics from the status endpoint

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::wallet::{shorten_address, Account};

use super::auth::{Session, SessionAuthenticator};
use super::identity::IdentityClient;

const STATUS_PATH: &str = "kite-ai/get-status";

/// Snapshot of an account's usage statistics
#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    pub wallet_address: String,
    pub xp: f64,
    pub rank: u64,
    pub daily_actions: u64,
    pub total_actions: u64,
    pub daily_actions_xp: f64,
    pub total_actions_xp: f64,
}

impl Stats {
    /// Zero-valued record used when stats cannot be fetched
    pub fn empty(wallet_address: &str) -> Self {
        Self {
            wallet_address: wallet_address.to_string(),
            xp: 0.0,
            rank: 0,
            daily_actions: 0,
            total_actions: 0,
            daily_actions_xp: 0.0,
            total_actions_xp: 0.0,
        }
    }

    /// Multi-line block for the log
    pub fn summary(&self) -> String {
        format!(
            r#"
========================= Stats =========================
Wallet:          {}
User XP:         {}
Rank:            {}
Actions today:   {}
Total actions:   {}
XP today:        {}
Total XP:        {}
========================================================="#,
            shorten_address(&self.wallet_address),
            self.xp,
            self.rank,
            self.daily_actions,
            self.total_actions,
            self.daily_actions_xp,
            self.total_actions_xp,
        )
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusPayload {
    user_xp: Option<f64>,
    rank: Option<u64>,
    daily_agent_action: Option<u64>,
    total_agent_actions: Option<u64>,
    daily_agent_actions_xp: Option<f64>,
    total_agent_actions_xp: Option<f64>,
}

impl StatusPayload {
    fn into_stats(self, wallet_address: &str) -> Stats {
        Stats {
            wallet_address: wallet_address.to_string(),
            xp: self.user_xp.unwrap_or_default(),
            rank: self.rank.unwrap_or_default(),
            daily_actions: self.daily_agent_action.unwrap_or_default(),
            total_actions: self.total_agent_actions.unwrap_or_default(),
            daily_actions_xp: self.daily_agent_actions_xp.unwrap_or_default(),
            total_actions_xp: self.total_agent_actions_xp.unwrap_or_default(),
        }
    }
}

/// Fetches stats with a session, logging in first when needed
pub struct StatsFetcher {
    identity: Arc<IdentityClient>,
    authenticator: Arc<SessionAuthenticator>,
}

impl StatsFetcher {
    pub fn new(identity: Arc<IdentityClient>, authenticator: Arc<SessionAuthenticator>) -> Self {
        Self {
            identity,
            authenticator,
        }
    }

    /// Fetch stats with an existing session
    ///
    /// `Ok(None)` means the service answered but declined; connection
    /// failures are errors.
    pub async fn fetch(&self, wallet_address: &str, session: &Session) -> Result<Option<Stats>> {
        let envelope = self
            .identity
            .get_authed::<StatusPayload>(STATUS_PATH, &session.token)
            .await?;

        match (envelope.success, envelope.payload) {
            (true, Some(payload)) => Ok(Some(payload.into_stats(wallet_address))),
            (true, None) => Ok(Some(Stats::empty(wallet_address))),
            (false, _) => {
                debug!(
                    "No stats for {}: {}",
                    shorten_address(wallet_address),
                    envelope.message.unwrap_or_default()
                );
                Ok(None)
            }
        }
    }

    /// Stats for the account, re-running the login handshake if the session expired
    pub async fn refresh(&self, account: &Account) -> Result<Option<Stats>> {
        let session = self.authenticator.session(account).await?;
        let stats = self.fetch(account.address(), &session).await?;
        if stats.is_none() {
            // a declined status call usually means the token was revoked
            self.authenticator.invalidate(account.address()).await;
        }
        Ok(stats)
    }

    /// Stats for the account, or a zero record if anything fails
    pub async fn stats_or_default(&self, account: &Account) -> Stats {
        match self.refresh(account).await {
            Ok(Some(stats)) => stats,
            Ok(None) => {
                warn!("Stats unavailable for {}", account.wallet().short_address());
                Stats::empty(account.address())
            }
            Err(e) => {
                warn!(
                    category = e.category(),
                    "[{}] Stats fetch failed for {}: {}",
                    e.category(),
                    account.wallet().short_address(),
                    e
                );
                Stats::empty(account.address())
            }
        }
    }

    /// Fetch and log stats; used after a successful usage report
    pub async fn log_stats(&self, account: &Account) -> Stats {
        let stats = self.stats_or_default(account).await;
        info!("{}", stats.summary());
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::auth::tests::{mount_login, test_account, test_identity};
    use crate::config::AuthConfig;
    use chrono::{Duration as ChronoDuration, Utc};
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(server: &MockServer) -> StatsFetcher {
        let identity = test_identity(server);
        let auth = Arc::new(SessionAuthenticator::new(
            identity.clone(),
            AuthConfig::default(),
        ));
        StatsFetcher::new(identity, auth)
    }

    #[test]
    fn test_empty_stats() {
        let stats = Stats::empty("0xabc");
        assert_eq!(stats.rank, 0);
        assert_eq!(stats.total_actions_xp, 0.0);
        assert!(stats.summary().contains("0xabc"));
    }

    #[test]
    fn test_partial_payload_defaults_to_zero() {
        let payload: StatusPayload =
            serde_json::from_str(r#"{"userXp": 120, "rank": null, "totalAgentActions": 7}"#)
                .unwrap();
        let stats = payload.into_stats("0xabc");
        assert_eq!(stats.xp, 120.0);
        assert_eq!(stats.rank, 0);
        assert_eq!(stats.total_actions, 7);
    }

    #[tokio::test]
    async fn test_refresh_logs_in_then_fetches() {
        let server = MockServer::start().await;
        mount_login(&server, Utc::now() + ChronoDuration::hours(1), 1).await;
        Mock::given(method("GET"))
            .and(path("/api/kite-ai/get-status"))
            .and(header("x-auth-token", "tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "payload": {
                    "userXp": 50,
                    "rank": 1234,
                    "dailyAgentAction": 3,
                    "totalAgentActions": 40,
                    "dailyAgentActionsXp": 30,
                    "totalAgentActionsXp": 400
                }
            })))
            .expect(2)
            .mount(&server)
            .await;

        let fetcher = fetcher(&server);
        let account = test_account();
        let stats = fetcher.refresh(&account).await.unwrap().unwrap();
        assert_eq!(stats.rank, 1234);
        assert_eq!(stats.daily_actions, 3);
        assert_eq!(stats.total_actions_xp, 400.0);
        assert_eq!(stats.wallet_address, account.address());

        // second refresh reuses the session
        fetcher.refresh(&account).await.unwrap();
    }

    #[tokio::test]
    async fn test_declined_status_is_none_and_falls_back() {
        let server = MockServer::start().await;
        mount_login(&server, Utc::now() + ChronoDuration::hours(1), 2).await;
        Mock::given(method("GET"))
            .and(path("/api/kite-ai/get-status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "message": "session invalid"
            })))
            .mount(&server)
            .await;

        let fetcher = fetcher(&server);
        let account = test_account();
        assert!(fetcher.refresh(&account).await.unwrap().is_none());

        let stats = fetcher.stats_or_default(&account).await;
        assert_eq!(stats, Stats::empty(account.address()));
    }

    #[tokio::test]
    async fn test_server_error_is_error_not_none() {
        let server = MockServer::start().await;
        mount_login(&server, Utc::now() + ChronoDuration::hours(1), 1).await;
        Mock::given(method("GET"))
            .and(path("/api/kite-ai/get-status"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let fetcher = fetcher(&server);
        let err = fetcher.refresh(&test_account()).await.unwrap_err();
        assert_eq!(err.category(), "transport");
    }
}

//! Signature-based login
//!
//! Handshake per wallet:
//!
//! ```text
//! NoSession -> TicketRequested -> Signed -> LoggedIn(token, expires_on)
//! ```
//!
//! A cached session is reused until `expires_on`; after that the whole
//! handshake runs again. There is no incremental refresh.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::AuthConfig;
use crate::error::{AuthStage, Error, Result};
use crate::wallet::Account;

use super::identity::IdentityClient;

const TICKET_PATH: &str = "auth/get-auth-ticket";
const LOGIN_PATH: &str = "auth/eth";

/// An authenticated session token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub expires_on: DateTime<Utc>,
}

impl Session {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_on
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}

/// Ticket issued by the identity service
#[derive(Debug, Clone)]
pub struct AuthTicket {
    pub nonce: String,
    pub message: String,
}

#[derive(Serialize)]
struct TicketRequest<'a> {
    nonce: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    blockchain_name: &'a str,
    signed_message: &'a str,
    nonce: &'a str,
    referral_id: &'a str,
}

#[derive(Deserialize)]
struct LoginPayload {
    session: SessionPayload,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionPayload {
    token: String,
    expires_on: Expiry,
}

/// The service has been seen to send both ISO timestamps and epoch millis
#[derive(Deserialize)]
#[serde(untagged)]
enum Expiry {
    Timestamp(DateTime<Utc>),
    Millis(i64),
}

impl Expiry {
    fn into_datetime(self) -> Result<DateTime<Utc>> {
        match self {
            Expiry::Timestamp(ts) => Ok(ts),
            Expiry::Millis(ms) => Utc.timestamp_millis_opt(ms).single().ok_or_else(|| {
                Error::Auth {
                    stage: AuthStage::Signed,
                    message: format!("invalid session expiry {}", ms),
                }
            }),
        }
    }
}

/// Nonce bound into the auth ticket
pub fn make_nonce() -> String {
    format!("timestamp_{}", Utc::now().timestamp_millis())
}

/// Runs the login handshake and caches sessions per wallet
pub struct SessionAuthenticator {
    identity: Arc<IdentityClient>,
    config: AuthConfig,
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionAuthenticator {
    pub fn new(identity: Arc<IdentityClient>, config: AuthConfig) -> Self {
        Self {
            identity,
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// A valid session for the account, logging in again if needed
    pub async fn session(&self, account: &Account) -> Result<Session> {
        if let Some(session) = self.cached(account.address()).await {
            if session.is_valid() {
                debug!("Reusing session for {}", account.wallet().short_address());
                return Ok(session);
            }
            info!(
                "Session for {} expired, logging in again",
                account.wallet().short_address()
            );
        }

        let session = self.authenticate(account).await?;
        self.sessions
            .lock()
            .await
            .insert(account.address().to_string(), session.clone());
        Ok(session)
    }

    /// Cached session for an address, valid or not
    pub async fn cached(&self, address: &str) -> Option<Session> {
        self.sessions.lock().await.get(address).cloned()
    }

    /// Forget the cached session so the next call logs in again
    pub async fn invalidate(&self, address: &str) {
        self.sessions.lock().await.remove(address);
    }

    /// Full handshake: ticket, sign, login
    pub async fn authenticate(&self, account: &Account) -> Result<Session> {
        let short = account.wallet().short_address();
        info!("Requesting auth ticket for {}", short);

        let ticket = self.request_ticket().await?;
        debug!("{} -> {}", short, AuthStage::TicketRequested);

        let signature = account.signer().sign_message(&ticket.message).await?;
        debug!("{} -> {}", short, AuthStage::Signed);

        let session = self.login(&signature, &ticket.nonce).await?;
        info!("Logged in {} (session until {})", short, session.expires_on);

        Ok(session)
    }

    /// NoSession -> TicketRequested
    pub async fn request_ticket(&self) -> Result<AuthTicket> {
        let nonce = make_nonce();
        let message: String = self
            .identity
            .post(TICKET_PATH, &TicketRequest { nonce: &nonce })
            .await?
            .into_payload(AuthStage::NoSession)?;

        Ok(AuthTicket { nonce, message })
    }

    /// Signed -> LoggedIn
    pub async fn login(&self, signature: &str, nonce: &str) -> Result<Session> {
        let request = LoginRequest {
            blockchain_name: &self.config.blockchain_name,
            signed_message: signature,
            nonce,
            referral_id: &self.config.referral_id,
        };

        let payload: LoginPayload = self
            .identity
            .post(LOGIN_PATH, &request)
            .await?
            .into_payload(AuthStage::Signed)?;

        Ok(Session {
            token: payload.session.token,
            expires_on: payload.session.expires_on.into_datetime()?,
        })
    }
}

//! Remote service clients
//!
//! ```text
//! identity ── auth (sessions) ── stats
//! agent (questions, streamed answers)
//! usage (reports, then stats refresh)
//! ```

pub mod agent;
pub mod auth;
pub mod identity;
pub mod stats;
pub mod usage;

pub use agent::{endpoint_url, QuestionAgentClient, NO_ANSWER};
pub use auth::{make_nonce, Session, SessionAuthenticator};
pub use identity::{ApiEnvelope, IdentityClient};
pub use stats::{Stats, StatsFetcher};
pub use usage::{UsageReport, UsageReporter};

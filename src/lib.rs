//! KiteAI Agent Bot Library
//!
//! Rotates wallets through remote question agents, reports each answer to
//! the usage tracker and logs account stats.

pub mod api;
pub mod cli;
pub mod config;
pub mod cycle;
pub mod error;
pub mod net;
pub mod questions;
pub mod stream;
pub mod wallet;

// Re-export commonly used types
pub use config::Config;
pub use cycle::{CycleOrchestrator, CycleSummary};
pub use error::{Error, Result};

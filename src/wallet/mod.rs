//! Wallet handling
//!
//! ```text
//! wallets.json → store::load_wallets → Wallet ─┬─> Account
//!                                  LocalSigner ─┘   (MessageSigner)
//! ```
//!
//! Wallets are loaded once at startup and never change while the bot runs.

pub mod account;
pub mod signer;
pub mod store;
pub mod types;

pub use account::Account;
pub use signer::{LocalSigner, MessageSigner};
pub use store::{load_wallets, parse_wallets};
pub use types::{shorten_address, Wallet, WalletEntry};

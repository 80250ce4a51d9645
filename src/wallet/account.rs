//! Wallet + signer pairing used by the request path

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::error::Result;

use super::signer::{LocalSigner, MessageSigner};
use super::types::Wallet;

/// A wallet paired with whatever signs for it
#[derive(Clone)]
pub struct Account {
    wallet: Wallet,
    signer: Arc<dyn MessageSigner>,
}

impl Account {
    pub fn new(wallet: Wallet, signer: Arc<dyn MessageSigner>) -> Self {
        Self { wallet, signer }
    }

    /// Pair a wallet with a local key signer
    ///
    /// A key that derives a different address than the one listed is
    /// logged but still used.
    pub fn from_wallet(wallet: Wallet) -> Result<Self> {
        let signer = LocalSigner::from_wallet(&wallet)?;
        if !signer.matches(&wallet) {
            warn!(
                "Private key for {} derives {}, check wallets.json",
                wallet.short_address(),
                signer.address()
            );
        }
        Ok(Self::new(wallet, Arc::new(signer)))
    }

    pub fn address(&self) -> &str {
        self.wallet.address()
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    pub fn signer(&self) -> &dyn MessageSigner {
        self.signer.as_ref()
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account").field("wallet", &self.wallet).finish()
    }
}

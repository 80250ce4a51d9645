//! Message signing for the login handshake
//!
//! The handshake only needs a personal-sign signature over the ticket
//! payload, so signing sits behind a small trait. `LocalSigner` does it
//! with an in-memory secp256k1 key.

use alloy::hex;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use async_trait::async_trait;

use crate::error::{Error, Result};

use super::types::Wallet;

#[async_trait]
pub trait MessageSigner: Send + Sync {
    /// Lowercase 0x address of the signing key
    fn address(&self) -> String;

    /// EIP-191 signature over `message`, as 0x-prefixed hex
    async fn sign_message(&self, message: &str) -> Result<String>;
}

/// Signs with a private key held in memory
pub struct LocalSigner {
    inner: PrivateKeySigner,
}

impl LocalSigner {
    pub fn from_private_key(private_key: &str) -> Result<Self> {
        let inner: PrivateKeySigner = private_key
            .trim()
            .parse()
            .map_err(|e| Error::Signing(format!("Invalid private key: {}", e)))?;
        Ok(Self { inner })
    }

    pub fn from_wallet(wallet: &Wallet) -> Result<Self> {
        Self::from_private_key(wallet.private_key())
    }

    /// Whether the key actually controls the wallet's listed address
    pub fn matches(&self, wallet: &Wallet) -> bool {
        self.address() == wallet.address()
    }
}

#[async_trait]
impl MessageSigner for LocalSigner {
    fn address(&self) -> String {
        self.inner.address().to_string().to_lowercase()
    }

    async fn sign_message(&self, message: &str) -> Result<String> {
        let signature = self
            .inner
            .sign_message_sync(message.as_bytes())
            .map_err(|e| Error::Signing(e.to_string()))?;
        Ok(hex::encode_prefixed(signature.as_bytes()))
    }
}

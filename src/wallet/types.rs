//! Wallet record types

use std::fmt;

use serde::Deserialize;

/// Entry in wallets.json
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletEntry {
    pub address: String,
    pub private_key: String,
}

/// A wallet the bot cycles through
///
/// Address is always lowercase. Immutable once loaded.
#[derive(Clone, PartialEq, Eq)]
pub struct Wallet {
    address: String,
    private_key: String,
}

impl Wallet {
    pub fn new(address: &str, private_key: &str) -> Self {
        Self {
            address: address.trim().to_lowercase(),
            private_key: private_key.trim().to_string(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn private_key(&self) -> &str {
        &self.private_key
    }

    /// `0x1234…abcd` form for log lines
    pub fn short_address(&self) -> String {
        shorten_address(&self.address)
    }
}

impl From<WalletEntry> for Wallet {
    fn from(entry: WalletEntry) -> Self {
        Wallet::new(&entry.address, &entry.private_key)
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .field("private_key", &"***")
            .finish()
    }
}

/// Shorten an address to its first 6 and last 4 characters
pub fn shorten_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() < 10 {
        return address.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}…{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_is_lowercased() {
        let wallet = Wallet::new("0xABCDef0000000000000000000000000000001234", "0x01");
        assert_eq!(wallet.address(), "0xabcdef0000000000000000000000000000001234");
        assert_eq!(wallet.short_address(), "0xabcd…1234");
    }

    #[test]
    fn test_debug_redacts_key() {
        let wallet = Wallet::new("0xabc", "super-secret");
        let printed = format!("{:?}", wallet);
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("0xabc"));
    }

    #[test]
    fn test_shorten_short_address() {
        assert_eq!(shorten_address("0x1234"), "0x1234");
    }
}

//! Wallet list loading
//!
//! Loads wallets.json: a JSON array of `{address, privateKey}` records.

use std::path::Path;

use tracing::{info, warn};

use crate::error::{Error, Result};

use super::types::{Wallet, WalletEntry};

/// Parse a wallet list from JSON text
pub fn parse_wallets(content: &str) -> Result<Vec<Wallet>> {
    let entries: Vec<WalletEntry> = serde_json::from_str(content)
        .map_err(|e| Error::Config(format!("Failed to parse wallet list: {}", e)))?;

    Ok(entries
        .into_iter()
        .filter(|e| !e.address.trim().is_empty() && !e.private_key.trim().is_empty())
        .map(Wallet::from)
        .collect())
}

/// Load wallets from disk
///
/// A missing file is an empty list; a malformed file is an error.
pub fn load_wallets(path: &Path) -> Result<Vec<Wallet>> {
    if !path.exists() {
        warn!("{} not found, no wallets loaded", path.display());
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;

    let wallets = parse_wallets(&content)?;
    if wallets.is_empty() {
        warn!("{} is empty, no wallets loaded", path.display());
    } else {
        info!("Loaded {} wallets from {}", wallets.len(), path.display());
    }

    Ok(wallets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let wallets = load_wallets(&dir.path().join("wallets.json")).unwrap();
        assert!(wallets.is_empty());
    }

    #[test]
    fn test_load_wallets() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wallets.json");
        std::fs::write(
            &path,
            r#"[
                {"address": "0xAAAA000000000000000000000000000000000001", "privateKey": "0x01"},
                {"address": "0xbbbb000000000000000000000000000000000002", "privateKey": "0x02"}
            ]"#,
        )
        .unwrap();

        let wallets = assert_ok!(load_wallets(&path));
        assert_eq!(wallets.len(), 2);
        assert_eq!(wallets[0].address(), "0xaaaa000000000000000000000000000000000001");
        assert_eq!(wallets[1].private_key(), "0x02");
    }

    #[test]
    fn test_incomplete_entries_are_dropped() {
        let wallets = parse_wallets(
            r#"[
                {"address": "", "privateKey": "0x01"},
                {"address": "0xabc", "privateKey": "0x02"}
            ]"#,
        )
        .unwrap();
        assert_eq!(wallets.len(), 1);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wallets.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_err!(load_wallets(&path));
    }
}

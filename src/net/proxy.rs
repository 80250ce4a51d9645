//! Proxy list parsing and round-robin rotation
//!
//! Accepts two line formats:
//! - URL: `scheme://[user:pass@]host:port`
//! - Colon-delimited: `scheme:host:port[:user:pass]`
//!
//! Blank lines and `#` comments are ignored. An empty pool is a normal
//! state; callers then connect directly.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{info, warn};

use crate::error::{Error, Result};

/// Schemes reqwest can route through
const SUPPORTED_SCHEMES: &[&str] = &["http", "https", "socks4", "socks4a", "socks5", "socks5h"];

/// Credentials for an authenticated proxy
#[derive(Clone, PartialEq, Eq)]
pub struct ProxyAuth {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for ProxyAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyAuth")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// A single outbound proxy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyDescriptor {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub auth: Option<ProxyAuth>,
}

impl ProxyDescriptor {
    /// Full proxy URL including credentials
    pub fn to_url(&self) -> String {
        match &self.auth {
            Some(auth) => format!(
                "{}://{}:{}@{}:{}",
                self.protocol, auth.username, auth.password, self.host, self.port
            ),
            None => format!("{}://{}:{}", self.protocol, self.host, self.port),
        }
    }

    pub fn is_socks(&self) -> bool {
        self.protocol.starts_with("socks")
    }

    /// Convert to a reqwest proxy routing all traffic
    pub fn to_reqwest(&self) -> Result<reqwest::Proxy> {
        reqwest::Proxy::all(self.to_url())
            .map_err(|e| Error::InvalidProxy(format!("{}: {}", self, e)))
    }
}

impl fmt::Display for ProxyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // never print credentials
        write!(f, "{}://{}:{}", self.protocol, self.host, self.port)
    }
}

/// Parse one line of a proxy list
///
/// Returns `Ok(None)` for blank and comment lines.
pub fn parse_proxy_line(line: &str) -> Result<Option<ProxyDescriptor>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let descriptor = if line.contains("://") {
        parse_url_form(line)?
    } else {
        parse_colon_form(line)?
    };

    if !SUPPORTED_SCHEMES.contains(&descriptor.protocol.as_str()) {
        return Err(Error::InvalidProxy(format!(
            "{}: unsupported scheme '{}'",
            descriptor, descriptor.protocol
        )));
    }

    Ok(Some(descriptor))
}

fn parse_url_form(line: &str) -> Result<ProxyDescriptor> {
    let url = url::Url::parse(line)
        .map_err(|e| Error::InvalidProxy(format!("{}: {}", line, e)))?;

    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| Error::InvalidProxy(format!("{}: missing host", line)))?
        .to_string();

    let port = url
        .port_or_known_default()
        .ok_or_else(|| Error::InvalidProxy(format!("{}: missing port", line)))?;

    let auth = if url.username().is_empty() {
        None
    } else {
        Some(ProxyAuth {
            username: url.username().to_string(),
            password: url.password().unwrap_or_default().to_string(),
        })
    };

    Ok(ProxyDescriptor {
        protocol: url.scheme().to_lowercase(),
        host,
        port,
        auth,
    })
}

fn parse_colon_form(line: &str) -> Result<ProxyDescriptor> {
    let parts: Vec<&str> = line.split(':').collect();
    if parts.len() < 3 {
        return Err(Error::InvalidProxy(format!(
            "{}: expected scheme:host:port[:user:pass]",
            line
        )));
    }

    let protocol = parts[0].replace("//", "").to_lowercase();
    let host = parts[1].trim_start_matches("//").to_string();
    if protocol.is_empty() || host.is_empty() {
        return Err(Error::InvalidProxy(format!("{}: missing scheme or host", line)));
    }

    let port: u16 = parts[2]
        .parse()
        .map_err(|_| Error::InvalidProxy(format!("{}: invalid port '{}'", line, parts[2])))?;

    // Credentials only count when both halves are present
    let auth = match (parts.get(3), parts.get(4)) {
        (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some(ProxyAuth {
            username: user.to_string(),
            password: pass.to_string(),
        }),
        _ => None,
    };

    Ok(ProxyDescriptor {
        protocol,
        host,
        port,
        auth,
    })
}

/// Parse a whole proxy list, skipping malformed lines
pub fn parse_proxy_list(content: &str) -> Vec<ProxyDescriptor> {
    content
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| match parse_proxy_line(line) {
            Ok(proxy) => proxy,
            Err(e) => {
                warn!("Skipping proxy on line {}: {}", idx + 1, e);
                None
            }
        })
        .collect()
}

/// Load proxies from a line-oriented file
///
/// A missing or unreadable file yields an empty list.
pub fn load_proxies(path: &Path) -> Vec<ProxyDescriptor> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let proxies = parse_proxy_list(&content);
            if proxies.is_empty() {
                info!("No proxies in {}, using direct connections", path.display());
            } else {
                info!("Loaded {} proxies from {}", proxies.len(), path.display());
            }
            proxies
        }
        Err(e) => {
            warn!(
                "Proxy list {} not readable ({}), using direct connections",
                path.display(),
                e
            );
            Vec::new()
        }
    }
}

/// Round-robin proxy rotation
#[derive(Debug, Default)]
pub struct ProxyPool {
    proxies: Vec<ProxyDescriptor>,
    index: AtomicUsize,
}

impl ProxyPool {
    pub fn new(proxies: Vec<ProxyDescriptor>) -> Self {
        Self {
            proxies,
            index: AtomicUsize::new(0),
        }
    }

    /// Next proxy in rotation, `None` when the pool is empty
    pub fn next(&self) -> Option<ProxyDescriptor> {
        self.next_index().map(|i| self.proxies[i].clone())
    }

    /// Position of the next proxy in rotation
    pub fn next_index(&self) -> Option<usize> {
        if self.proxies.is_empty() {
            return None;
        }
        let idx = self.index.fetch_add(1, Ordering::Relaxed) % self.proxies.len();
        Some(idx)
    }

    pub fn proxies(&self) -> &[ProxyDescriptor] {
        &self.proxies
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }
}

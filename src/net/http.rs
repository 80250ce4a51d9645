//! HTTP clients bound to the proxy rotation

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::config::HttpConfig;
use crate::error::{Error, Result};

use super::proxy::{ProxyDescriptor, ProxyPool};

/// One client per proxy plus a direct client
///
/// Clients are built once up front; `next()` walks the proxy rotation.
pub struct HttpPool {
    pool: Arc<ProxyPool>,
    direct: Client,
    proxied: Vec<Client>,
    timeout: Duration,
}

/// A client selected for a single request
#[derive(Clone)]
pub struct Route {
    pub client: Client,
    pub proxy: Option<ProxyDescriptor>,
}

impl Route {
    /// Human-readable description of where the request goes out from
    pub fn via(&self) -> String {
        match &self.proxy {
            Some(proxy) => format!("proxy {}:{}", proxy.host, proxy.port),
            None => "direct".to_string(),
        }
    }
}

impl HttpPool {
    pub fn new(config: &HttpConfig, pool: Arc<ProxyPool>) -> Result<Self> {
        let direct = build_client(config, None)?;
        let proxied = pool
            .proxies()
            .iter()
            .map(|p| build_client(config, Some(p)))
            .collect::<Result<Vec<_>>>()?;

        debug!("Built {} proxied HTTP clients", proxied.len());

        Ok(Self {
            pool,
            direct,
            proxied,
            timeout: config.timeout(),
        })
    }

    /// Client for the next proxy in rotation, or the direct client
    pub fn next(&self) -> Route {
        match self.pool.next_index() {
            Some(idx) => Route {
                client: self.proxied[idx].clone(),
                proxy: Some(self.pool.proxies()[idx].clone()),
            },
            None => self.direct(),
        }
    }

    pub fn direct(&self) -> Route {
        Route {
            client: self.direct.clone(),
            proxy: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    /// Map a reqwest failure using this pool's timeout bound
    pub fn map_err(&self, e: reqwest::Error) -> Error {
        Error::from_reqwest(e, self.timeout_ms())
    }
}

fn build_client(config: &HttpConfig, proxy: Option<&ProxyDescriptor>) -> Result<Client> {
    let mut builder = Client::builder()
        .timeout(config.timeout())
        .user_agent(config.user_agent.clone());

    if let Some(proxy) = proxy {
        builder = builder.proxy(proxy.to_reqwest()?);
    }

    builder
        .build()
        .map_err(|e| Error::Transport(format!("Failed to create HTTP client: {}", e)))
}

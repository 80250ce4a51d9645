//! Outbound networking: proxy rotation, pacing, HTTP clients

pub mod http;
pub mod proxy;
pub mod rate_limit;

pub use http::{HttpPool, Route};
pub use proxy::{load_proxies, parse_proxy_line, ProxyDescriptor, ProxyPool};
pub use rate_limit::{backoff_delay, RateLimitDetector, RateLimiter};

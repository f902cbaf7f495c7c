//! Client configuration
//!
//! One validated value type carries every tunable the engine honours. The
//! defaults model browser behaviour: six connections per host, a hundred
//! overall, thirty-second idle reaping.

use std::time::Duration;

use crate::profiles::Browser;

/// Configuration for a [`crate::client::Client`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Global cap on pooled connections.
    pub pool_max_total: usize,
    /// Per-authority cap on pooled connections.
    pub pool_max_per_host: usize,
    /// Idle connections older than this are reaped.
    pub pool_idle_timeout: Duration,
    /// DNS cache entry lifetime.
    pub dns_ttl: Duration,
    /// DNS cache entry cap; the oldest entry is evicted beyond this.
    pub dns_capacity: usize,
    /// Default per-request deadline when the request does not carry one.
    pub request_timeout: Duration,
    /// Browser profile used when the request does not select one.
    pub browser: Browser,
    /// Verify peer certificates by default.
    pub verify_ssl: bool,
    /// Socket send/receive buffer size.
    pub socket_buffer_size: usize,
    /// Initial capacity of the response header accumulation buffer.
    pub header_buffer_size: usize,
    /// Initial capacity of a per-stream HTTP/2 body buffer.
    pub h2_stream_buffer_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            pool_max_total: 100,
            pool_max_per_host: 6,
            pool_idle_timeout: Duration::from_secs(30),
            dns_ttl: Duration::from_secs(300),
            dns_capacity: 128,
            request_timeout: Duration::from_secs(30),
            browser: Browser::Chrome131,
            verify_ssl: true,
            socket_buffer_size: 64 * 1024,
            header_buffer_size: 256 * 1024,
            h2_stream_buffer_size: 16 * 1024,
        }
    }
}

impl ClientConfig {
    /// Validate field ranges before a client is built from this config.
    pub fn validate(&self) -> Result<(), String> {
        if self.pool_max_total == 0 {
            return Err("pool_max_total must be greater than zero".to_string());
        }
        if self.pool_max_per_host == 0 {
            return Err("pool_max_per_host must be greater than zero".to_string());
        }
        if self.pool_max_per_host > self.pool_max_total {
            return Err("pool_max_per_host must not exceed pool_max_total".to_string());
        }
        if self.request_timeout.as_secs() == 0 {
            return Err("request_timeout must be greater than zero".to_string());
        }
        if self.request_timeout.as_secs() > 3600 {
            return Err("request_timeout must not exceed 1 hour".to_string());
        }
        if self.dns_capacity == 0 {
            return Err("dns_capacity must be greater than zero".to_string());
        }
        if self.header_buffer_size < 1024 {
            return Err("header_buffer_size must be at least 1 KiB".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ClientConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_inverted_pool_caps() {
        let config = ClientConfig {
            pool_max_total: 4,
            pool_max_per_host: 6,
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let config = ClientConfig {
            request_timeout: Duration::from_secs(0),
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());
    }
}

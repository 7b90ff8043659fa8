//! Configuration validation.
//!
//! Serde handles syntax; this module checks values a running proxy depends
//! on. Every problem is reported, not just the first.

use std::net::SocketAddr;

use hyper::header::HeaderName;
use thiserror::Error;

use crate::config::schema::ProxyConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a socket address")]
    BindAddress(String),

    #[error("backend.address {0:?} is not host:port")]
    BackendAddress(String),

    #[error("backend.connect_timeout_ms must be greater than zero")]
    ConnectTimeout,

    #[error("stats.header {0:?} is not a valid header name")]
    StatsHeader(String),

    #[error("observability.log_level {0:?} is not one of trace, debug, info, warn, error")]
    LogLevel(String),

    #[error("observability.metrics_address {0:?} is not a socket address")]
    MetricsAddress(String),
}

/// Check a configuration, returning every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    if !is_host_port(&config.backend.address) {
        errors.push(ValidationError::BackendAddress(config.backend.address.clone()));
    }

    if config.backend.connect_timeout_ms == 0 {
        errors.push(ValidationError::ConnectTimeout);
    }

    if HeaderName::from_bytes(config.stats.header.as_bytes()).is_err() {
        errors.push(ValidationError::StatsHeader(config.stats.header.clone()));
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::LogLevel(config.observability.log_level.clone()));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// `host:port` with a non-empty host and a numeric port. Resolution is left to
/// dial time.
fn is_host_port(address: &str) -> bool {
    match address.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}

//! Extension configuration.
//!
//! Values come from command-line flags or `STEADYBIT_EXTENSION_*`
//! environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use relic_client::ClientConfig;

use crate::error::{ExtensionError, ExtensionResult};

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 8090;

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Command-line arguments of the extension binary.
#[derive(Debug, Clone, Parser)]
#[command(name = "relic-extension")]
#[command(about = "New Relic extension for the Steadybit chaos platform")]
#[command(version)]
pub struct ExtensionArgs {
    /// NerdGraph base URL, like `https://api.newrelic.com` or `https://api.eu.newrelic.com`
    #[arg(long, env = "STEADYBIT_EXTENSION_API_BASE_URL")]
    pub api_base_url: String,

    /// New Relic user API key
    #[arg(long, env = "STEADYBIT_EXTENSION_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Event ingest base URL, like `https://insights-collector.newrelic.com`
    #[arg(long, env = "STEADYBIT_EXTENSION_INSIGHTS_COLLECTOR_API_BASE_URL")]
    pub insights_collector_api_base_url: String,

    /// New Relic API key of type "INGEST - LICENSE"
    #[arg(
        long,
        env = "STEADYBIT_EXTENSION_INSIGHTS_COLLECTOR_API_KEY",
        hide_env_values = true
    )]
    pub insights_collector_api_key: String,

    /// HTTP port
    #[arg(long, env = "STEADYBIT_EXTENSION_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Timeout for requests to New Relic, in seconds
    #[arg(long, env = "STEADYBIT_EXTENSION_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Log output format
    #[arg(long, env = "STEADYBIT_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl ExtensionArgs {
    /// Validates the arguments and builds the runtime configuration.
    pub fn into_config(self) -> ExtensionResult<ExtensionConfig> {
        if self.request_timeout_secs == 0 {
            return Err(ExtensionError::InvalidConfig {
                reason: "request timeout must be at least one second".to_string(),
            });
        }
        let client = ClientConfig::new(
            &self.api_base_url,
            self.api_key,
            &self.insights_collector_api_base_url,
            self.insights_collector_api_key,
        )
        .map_err(|e| ExtensionError::InvalidConfig {
            reason: e.to_string(),
        })?
        .with_timeout(Duration::from_secs(self.request_timeout_secs));

        Ok(ExtensionConfig::new(client)
            .with_bind_addr(SocketAddr::from(([0, 0, 0, 0], self.port)))
            .with_log_format(self.log_format))
    }
}

/// Runtime configuration of the extension.
#[derive(Debug, Clone)]
pub struct ExtensionConfig {
    /// New Relic connection settings.
    pub client: ClientConfig,
    /// Address to bind the HTTP server to.
    pub bind_addr: SocketAddr,
    /// Log output format.
    pub log_format: LogFormat,
    /// How often discovered accounts are refreshed.
    pub account_refresh_interval: Duration,
    /// How often discovered workloads are refreshed.
    pub workload_refresh_interval: Duration,
    /// How long the account list used for event forwarding is cached.
    pub event_account_ttl: Duration,
}

impl ExtensionConfig {
    /// Creates a configuration with default server settings.
    #[must_use]
    pub fn new(client: ClientConfig) -> Self {
        Self {
            client,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            log_format: LogFormat::Text,
            account_refresh_interval: Duration::from_secs(30 * 60),
            workload_refresh_interval: Duration::from_secs(60),
            event_account_ttl: Duration::from_secs(30 * 60),
        }
    }

    /// Set the bind address.
    #[must_use]
    pub const fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the log format.
    #[must_use]
    pub const fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    /// Set the account and workload discovery refresh intervals.
    #[must_use]
    pub const fn with_refresh_intervals(mut self, accounts: Duration, workloads: Duration) -> Self {
        self.account_refresh_interval = accounts;
        self.workload_refresh_interval = workloads;
        self
    }

    /// Set how long the event forwarding account list is cached.
    #[must_use]
    pub const fn with_event_account_ttl(mut self, ttl: Duration) -> Self {
        self.event_account_ttl = ttl;
        self
    }
}

//! Client for the New Relic NerdGraph and event ingest APIs.
//!
//! [`NewRelicClient`] covers what the extension needs from New Relic:
//!
//! - account and workload discovery
//! - workload status and active incidents for the checks
//! - entity tags for incident filtering
//! - muting rules
//! - custom events for experiment and attack lifecycle
//!
//! It implements [`relic_checks::WorkloadStatusApi`] and
//! [`relic_checks::IncidentsApi`], so it can be handed straight to a check.
//!
//! ```rust,no_run
//! use relic_client::{ClientConfig, NewRelicClient};
//!
//! # async fn run() -> relic_client::Result<()> {
//! let config = ClientConfig::new(
//!     "https://api.newrelic.com",
//!     "NRAK-...",
//!     "https://insights-collector.newrelic.com",
//!     "ingest-key",
//! )?;
//! let client = NewRelicClient::new(config)?;
//! let accounts = client.get_account_ids().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod error;
mod graphql;
pub mod types;

pub use client::NewRelicClient;
pub use config::{ClientConfig, DEFAULT_TIMEOUT};
pub use error::{ClientError, Result};
pub use types::{EventIngest, EventType, Workload};

//! # relic-extension
//!
//! Steadybit extension exposing New Relic to chaos experiments.
//!
//! The extension is an HTTP server the platform agent talks to. It offers
//! check actions backed by `relic-checks`, a step that mutes alerts while an
//! experiment runs, target discovery of accounts and workloads, and forwarding
//! of experiment events to New Relic.
//!
//! ## Example
//!
//! ```rust,no_run
//! use relic_client::{ClientConfig, NewRelicClient};
//! use relic_extension::{ExtensionConfig, ExtensionServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client_config = ClientConfig::new(
//!         "https://api.newrelic.com",
//!         "NRAK-...",
//!         "https://insights-collector.newrelic.com",
//!         "ingest-key",
//!     )?;
//!     let client = NewRelicClient::new(client_config.clone())?;
//!     let server = ExtensionServer::new(client, ExtensionConfig::new(client_config));
//!     server.serve_with_shutdown(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     }).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## API Endpoints
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/` | GET | Index of actions, discoveries and event listeners |
//! | `/health/liveness` | GET | Liveness probe |
//! | `/health/readiness` | GET | Readiness probe |
//! | `/actions/{id}` | GET | Action descriptor |
//! | `/actions/{id}/{prepare,start,status,stop}` | POST | Step lifecycle |
//! | `/discovery/{type}` | GET | Discovery description |
//! | `/discovery/{type}/targets` | GET | Discovered targets |
//! | `/events/{name}` | POST | Experiment event listeners |

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod actions;
pub mod api;
pub mod config;
pub mod discovery;
pub mod error;
pub mod events;
pub mod handlers;
pub mod registry;
pub mod routes;
pub mod server;
pub mod state;

#[cfg(test)]
mod testing;

// Re-export main types
pub use actions::{ActionInstance, ActionKind};
pub use api::NewRelicApi;
pub use config::{ExtensionArgs, ExtensionConfig, LogFormat};
pub use discovery::{DiscoveryKind, Target, TargetCache};
pub use error::{ExtensionError, ExtensionResult};
pub use events::{EventForwarder, EventListener};
pub use routes::create_router;
pub use server::ExtensionServer;
pub use state::AppState;

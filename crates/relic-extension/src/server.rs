//! Extension server implementation.

use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

use crate::api::NewRelicApi;
use crate::config::ExtensionConfig;
use crate::discovery::{spawn_refresh, DiscoveryKind};
use crate::error::{ExtensionError, ExtensionResult};
use crate::routes::create_router;
use crate::state::AppState;

/// HTTP server exposing actions, discoveries and event listeners to the platform.
#[derive(Debug)]
pub struct ExtensionServer<C> {
    state: Arc<AppState<C>>,
}

impl<C: NewRelicApi> ExtensionServer<C> {
    /// Create a new server around a New Relic API.
    pub fn new(api: C, config: ExtensionConfig) -> Self {
        Self {
            state: Arc::new(AppState::new(api, config)),
        }
    }

    /// Get the shared state.
    #[must_use]
    pub fn state(&self) -> Arc<AppState<C>> {
        Arc::clone(&self.state)
    }

    /// Start the discovery refresh tasks.
    pub fn spawn_discovery(&self) -> Vec<JoinHandle<()>> {
        let config = self.state.config();
        DiscoveryKind::ALL
            .into_iter()
            .map(|kind| {
                let period = match kind {
                    DiscoveryKind::Account => config.account_refresh_interval,
                    DiscoveryKind::Workload => config.workload_refresh_interval,
                };
                spawn_refresh(
                    kind,
                    self.state.api_handle(),
                    Arc::clone(self.state.targets(kind)),
                    period,
                )
            })
            .collect()
    }

    /// Start the server with graceful shutdown support.
    ///
    /// Discovery starts before the listener is bound; the readiness probe
    /// succeeds once the listener is up. The server shuts down when
    /// `shutdown` completes.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the address fails.
    pub async fn serve_with_shutdown<F>(&self, shutdown: F) -> ExtensionResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.state.config().bind_addr;
        let refreshers = self.spawn_discovery();

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ExtensionError::BindFailed(addr, e))?;
        info!(addr = %addr, "Extension server listening");

        let router = create_router(self.state());
        self.state.set_ready();

        let served = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ExtensionError::Internal(e.to_string()));

        for refresher in refreshers {
            refresher.abort();
        }
        info!("Extension server shut down");
        served
    }
}

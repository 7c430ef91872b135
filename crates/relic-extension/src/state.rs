//! Shared state of the extension server.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::actions::{ActionInstance, ActionKind};
use crate::api::NewRelicApi;
use crate::config::ExtensionConfig;
use crate::discovery::{DiscoveryKind, TargetCache};
use crate::error::{ExtensionError, ExtensionResult};
use crate::events::EventForwarder;
use crate::registry::Registry;

/// A prepared step, locked for the duration of each call on it.
pub type SharedInstance = Arc<Mutex<ActionInstance>>;

/// Shared state behind every route.
#[derive(Debug)]
pub struct AppState<C> {
    api: Arc<C>,
    config: Arc<ExtensionConfig>,
    executions: Registry<Uuid, (ActionKind, SharedInstance)>,
    accounts: Arc<TargetCache>,
    workloads: Arc<TargetCache>,
    events: EventForwarder,
    ready: AtomicBool,
    start_time: Instant,
}

impl<C: NewRelicApi> AppState<C> {
    /// Creates the state around a New Relic API.
    pub fn new(api: C, config: ExtensionConfig) -> Self {
        Self {
            api: Arc::new(api),
            events: EventForwarder::new(config.event_account_ttl),
            config: Arc::new(config),
            executions: Registry::new(),
            accounts: Arc::new(TargetCache::new()),
            workloads: Arc::new(TargetCache::new()),
            ready: AtomicBool::new(false),
            start_time: Instant::now(),
        }
    }

    /// The New Relic API.
    #[must_use]
    pub fn api(&self) -> &C {
        &self.api
    }

    /// A shared handle to the New Relic API, for background tasks.
    #[must_use]
    pub fn api_handle(&self) -> Arc<C> {
        Arc::clone(&self.api)
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &ExtensionConfig {
        &self.config
    }

    /// The target cache of a discovery.
    #[must_use]
    pub fn targets(&self, kind: DiscoveryKind) -> &Arc<TargetCache> {
        match kind {
            DiscoveryKind::Account => &self.accounts,
            DiscoveryKind::Workload => &self.workloads,
        }
    }

    /// The event forwarder.
    #[must_use]
    pub const fn events(&self) -> &EventForwarder {
        &self.events
    }

    /// Registers a prepared step.
    pub fn register(&self, execution_id: Uuid, instance: ActionInstance) {
        let kind = instance.kind();
        self.executions
            .insert(execution_id, (kind, Arc::new(Mutex::new(instance))));
    }

    /// Looks up a prepared step and the action it belongs to.
    pub fn instance(&self, execution_id: Uuid) -> ExtensionResult<(ActionKind, SharedInstance)> {
        self.executions
            .get(&execution_id)
            .ok_or(ExtensionError::ExecutionNotFound(execution_id))
    }

    /// Drops a step. Returns whether it was registered.
    pub fn unregister(&self, execution_id: Uuid) -> bool {
        self.executions.remove(&execution_id).is_some()
    }

    /// Number of registered steps.
    #[must_use]
    pub fn execution_count(&self) -> usize {
        self.executions.len()
    }

    /// Whether startup wiring has finished.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Marks the extension as ready to serve the platform.
    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// Seconds since the state was created.
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

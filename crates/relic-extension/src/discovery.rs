//! Target discovery for New Relic accounts and workloads.
//!
//! Targets are refreshed in the background and served from memory. A failed
//! refresh leaves the previous targets in place.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use relic_checks::FetchError;
use relic_client::Workload;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::actions::incident::{ACCOUNT_TARGET_TYPE, ATTR_ACCOUNT_ID};
use crate::actions::workload::{
    ATTR_WORKLOAD_ACCOUNT, ATTR_WORKLOAD_GUID, ATTR_WORKLOAD_NAME, ATTR_WORKLOAD_PERMALINK,
    WORKLOAD_TARGET_TYPE,
};
use crate::api::NewRelicApi;
use crate::error::{ExtensionError, ExtensionResult};

/// Attribute holding the display label of every target.
pub const ATTR_LABEL: &str = "steadybit.label";

/// A discovered target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    /// Stable target id.
    pub id: String,
    /// Display label.
    pub label: String,
    /// Target type id.
    pub target_type: String,
    /// Target attributes.
    pub attributes: BTreeMap<String, Vec<String>>,
}

/// Body of `GET /discovery/{type}/targets`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveredTargets {
    /// The current targets.
    pub targets: Vec<Target>,
}

/// The discoveries this extension offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscoveryKind {
    /// New Relic accounts.
    Account,
    /// Workloads of all accounts.
    Workload,
}

impl DiscoveryKind {
    /// All discoveries.
    pub const ALL: [Self; 2] = [Self::Account, Self::Workload];

    /// The discovered target type.
    #[must_use]
    pub const fn target_type(self) -> &'static str {
        match self {
            Self::Account => ACCOUNT_TARGET_TYPE,
            Self::Workload => WORKLOAD_TARGET_TYPE,
        }
    }

    /// Looks up a discovery by target type.
    pub fn from_target_type(target_type: &str) -> ExtensionResult<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.target_type() == target_type)
            .ok_or_else(|| ExtensionError::UnknownDiscovery(target_type.to_string()))
    }

    const fn call_interval(self) -> &'static str {
        match self {
            Self::Account => "10m",
            Self::Workload => "1m",
        }
    }

    const fn labels(self) -> (&'static str, &'static str) {
        match self {
            Self::Account => ("New Relic Account", "New Relic Account"),
            Self::Workload => ("New Relic workload", "New Relic workloads"),
        }
    }

    const fn attribute(self) -> (&'static str, &'static str, &'static str) {
        match self {
            Self::Account => (ATTR_ACCOUNT_ID, "New Relic Account ID", "New Relic Account IDs"),
            Self::Workload => (
                ATTR_WORKLOAD_NAME,
                "New Relic workload name",
                "New Relic workload names",
            ),
        }
    }

    /// The discovery description, including target and attribute descriptions.
    #[must_use]
    pub fn description(self) -> Value {
        let target_type = self.target_type();
        let (one, other) = self.labels();
        let (attribute, attribute_one, attribute_other) = self.attribute();
        json!({
            "id": target_type,
            "restrictTo": "LEADER",
            "discover": {
                "method": "GET",
                "path": format!("/discovery/{target_type}/targets"),
                "callInterval": self.call_interval()
            },
            "target": {
                "id": target_type,
                "label": {"one": one, "other": other},
                "category": "monitoring",
                "version": env!("CARGO_PKG_VERSION"),
                "table": {
                    "columns": [{"attribute": ATTR_LABEL}],
                    "orderBy": [{"attribute": ATTR_LABEL, "direction": "ASC"}]
                }
            },
            "attributes": [{
                "attribute": attribute,
                "label": {"one": attribute_one, "other": attribute_other}
            }]
        })
    }
}

/// Builds the target for an account.
pub fn account_target(account_id: i64) -> Target {
    let id = account_id.to_string();
    Target {
        attributes: BTreeMap::from([
            (ATTR_LABEL.to_string(), vec![id.clone()]),
            (ATTR_ACCOUNT_ID.to_string(), vec![id.clone()]),
        ]),
        label: id.clone(),
        id,
        target_type: ACCOUNT_TARGET_TYPE.to_string(),
    }
}

/// Builds the target for a workload of an account.
pub fn workload_target(workload: &Workload, account_id: i64) -> Target {
    let account = account_id.to_string();
    let label = format!("{} ({account})", workload.name);
    Target {
        id: workload.guid.clone(),
        label: label.clone(),
        target_type: WORKLOAD_TARGET_TYPE.to_string(),
        attributes: BTreeMap::from([
            (ATTR_LABEL.to_string(), vec![label]),
            (ATTR_WORKLOAD_NAME.to_string(), vec![workload.name.clone()]),
            (ATTR_WORKLOAD_GUID.to_string(), vec![workload.guid.clone()]),
            (ATTR_WORKLOAD_PERMALINK.to_string(), vec![workload.permalink.clone()]),
            (ATTR_WORKLOAD_ACCOUNT.to_string(), vec![account]),
        ]),
    }
}

/// Lists all accounts as targets.
pub async fn discover_accounts<A: NewRelicApi>(api: &A) -> Result<Vec<Target>, FetchError> {
    let accounts = api.account_ids().await?;
    Ok(accounts.into_iter().map(account_target).collect())
}

/// Lists the workloads of all accounts as targets.
///
/// Fails only if the account list cannot be fetched. If the workloads of one
/// account cannot be fetched, the accounts after it are skipped and the
/// targets found so far are returned.
pub async fn discover_workloads<A: NewRelicApi>(api: &A) -> Result<Vec<Target>, FetchError> {
    let accounts = api.account_ids().await?;
    let mut targets = Vec::new();
    for account_id in accounts {
        match api.workloads(account_id).await {
            Ok(workloads) => {
                targets.extend(workloads.iter().map(|w| workload_target(w, account_id)));
            }
            Err(e) => {
                error!(account_id, error = %e, "Failed to get workloads from New Relic.");
                break;
            }
        }
    }
    Ok(targets)
}

/// The last discovered targets of one discovery.
#[derive(Debug, Default)]
pub struct TargetCache {
    targets: RwLock<Vec<Target>>,
}

impl TargetCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the current targets.
    pub fn targets(&self) -> Vec<Target> {
        self.targets.read().clone()
    }

    /// Replaces the current targets.
    pub fn replace(&self, targets: Vec<Target>) {
        *self.targets.write() = targets;
    }

    /// Runs one discovery and stores the result, keeping the old targets on failure.
    pub async fn refresh<A: NewRelicApi>(&self, kind: DiscoveryKind, api: &A) {
        let discovered = match kind {
            DiscoveryKind::Account => discover_accounts(api).await,
            DiscoveryKind::Workload => discover_workloads(api).await,
        };
        match discovered {
            Ok(targets) => {
                debug!(
                    target_type = kind.target_type(),
                    count = targets.len(),
                    "discovered targets"
                );
                self.replace(targets);
            }
            Err(e) => {
                error!(
                    target_type = kind.target_type(),
                    error = %e,
                    "Failed to get accounts from New Relic."
                );
            }
        }
    }
}

/// Spawns a task that refreshes `cache` now and then every `period`.
pub fn spawn_refresh<A: NewRelicApi>(
    kind: DiscoveryKind,
    api: Arc<A>,
    cache: Arc<TargetCache>,
    period: Duration,
) -> JoinHandle<()> {
    info!(target_type = kind.target_type(), period = ?period, "starting discovery refresh");
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            cache.refresh(kind, api.as_ref()).await;
        }
    })
}

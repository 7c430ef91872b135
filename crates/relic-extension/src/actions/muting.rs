//! Muting rule action.
//!
//! Start creates a muting rule for the target account that ends with the
//! step; stop deletes it again.

use chrono::{DateTime, Utc};
use relic_checks::CheckWindow;
use tracing::info;

use crate::actions::incident::account_id;
use crate::actions::params;
use crate::actions::types::{Message, PrepareRequest, StartResult, StopResult};
use crate::api::NewRelicApi;
use crate::error::{ExtensionError, ExtensionResult};

/// Action id of the muting rule action.
pub const CREATE_MUTING_RULE_ACTION_ID: &str = "com.steadybit.extension_newrelic.create_muting_rule";

const CREATE_FAILED: &str = "Failed to create muting rule in New Relic.";
const DELETE_FAILED: &str = "Failed to delete muting rule in New Relic.";

/// State of one muting rule step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutingRule {
    account_id: i64,
    end: DateTime<Utc>,
    experiment_key: String,
    execution_id: i64,
    execution_uri: String,
    rule_id: Option<String>,
}

impl MutingRule {
    /// Prepares the step. Nothing is created until start.
    pub fn prepare(request: &PrepareRequest, now: DateTime<Utc>) -> ExtensionResult<Self> {
        let duration = params::duration(&request.config)?;
        let end = CheckWindow::starting_at(now, duration)?.end();

        let context = request.execution_context.clone().unwrap_or_default();
        let missing = |field: &str| ExtensionError::BadRequest {
            title: format!("Execution context is missing {field}"),
            detail: None,
        };

        Ok(Self {
            account_id: account_id(request.target.as_ref())?,
            end,
            experiment_key: context.experiment_key.ok_or_else(|| missing("experimentKey"))?,
            execution_id: context.execution_id.ok_or_else(|| missing("executionId"))?,
            execution_uri: context.execution_uri.ok_or_else(|| missing("executionUri"))?,
            rule_id: None,
        })
    }

    /// Name of the muting rule in New Relic.
    #[must_use]
    pub fn rule_name(&self) -> String {
        format!("Steadybit {} ({})", self.experiment_key, self.execution_id)
    }

    /// Id of the created rule, once started.
    #[must_use]
    pub fn rule_id(&self) -> Option<&str> {
        self.rule_id.as_deref()
    }

    /// Creates the muting rule.
    pub async fn start<A: NewRelicApi>(&mut self, api: &A) -> ExtensionResult<StartResult> {
        let id = api
            .create_muting_rule(self.account_id, &self.rule_name(), &self.execution_uri, self.end)
            .await
            .map_err(|source| ExtensionError::Upstream {
                title: CREATE_FAILED,
                source,
            })?;

        info!(account_id = self.account_id, rule_id = %id, end = %self.end, "muting rule created");
        let message = Message::info(format!("Muting rule created. (id {id})"));
        self.rule_id = Some(id);
        Ok(StartResult {
            messages: Some(vec![message]),
            ..StartResult::default()
        })
    }

    /// Deletes the muting rule, if one was created.
    pub async fn stop<A: NewRelicApi>(&mut self, api: &A) -> ExtensionResult<StopResult> {
        let Some(id) = self.rule_id.as_deref() else {
            return Ok(StopResult::default());
        };

        api.delete_muting_rule(self.account_id, id)
            .await
            .map_err(|source| ExtensionError::Upstream {
                title: DELETE_FAILED,
                source,
            })?;

        info!(account_id = self.account_id, rule_id = %id, "muting rule deleted");
        let message = Message::info(format!("Muting rule deleted. (id {id})"));
        self.rule_id = None;
        Ok(StopResult {
            messages: Some(vec![message]),
        })
    }
}

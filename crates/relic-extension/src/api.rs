//! Everything the extension needs from New Relic, as one seam.

use std::future::Future;

use chrono::{DateTime, Utc};
use relic_checks::{FetchError, IncidentsApi, WorkloadStatusApi};
use relic_client::{EventIngest, NewRelicClient, Workload};

/// The New Relic operations used by actions, discovery and event forwarding.
///
/// Implemented by [`NewRelicClient`]; tests use in-memory fakes.
pub trait NewRelicApi: WorkloadStatusApi + IncidentsApi + 'static {
    /// Lists all visible account ids.
    fn account_ids(&self) -> impl Future<Output = Result<Vec<i64>, FetchError>> + Send;

    /// Lists the workloads of an account.
    fn workloads(
        &self,
        account_id: i64,
    ) -> impl Future<Output = Result<Vec<Workload>, FetchError>> + Send;

    /// Creates a muting rule and returns its id.
    fn create_muting_rule(
        &self,
        account_id: i64,
        name: &str,
        description: &str,
        end: DateTime<Utc>,
    ) -> impl Future<Output = Result<String, FetchError>> + Send;

    /// Deletes a muting rule.
    fn delete_muting_rule(
        &self,
        account_id: i64,
        rule_id: &str,
    ) -> impl Future<Output = Result<(), FetchError>> + Send;

    /// Posts a custom event to an account.
    fn post_event(
        &self,
        event: &EventIngest,
        account_id: i64,
    ) -> impl Future<Output = Result<(), FetchError>> + Send;
}

impl NewRelicApi for NewRelicClient {
    async fn account_ids(&self) -> Result<Vec<i64>, FetchError> {
        Ok(self.get_account_ids().await?)
    }

    async fn workloads(&self, account_id: i64) -> Result<Vec<Workload>, FetchError> {
        Ok(self.get_workloads(account_id).await?)
    }

    async fn create_muting_rule(
        &self,
        account_id: i64,
        name: &str,
        description: &str,
        end: DateTime<Utc>,
    ) -> Result<String, FetchError> {
        Ok(NewRelicClient::create_muting_rule(self, account_id, name, description, end).await?)
    }

    async fn delete_muting_rule(&self, account_id: i64, rule_id: &str) -> Result<(), FetchError> {
        Ok(NewRelicClient::delete_muting_rule(self, account_id, rule_id).await?)
    }

    async fn post_event(&self, event: &EventIngest, account_id: i64) -> Result<(), FetchError> {
        Ok(NewRelicClient::post_event(self, event, account_id).await?)
    }
}

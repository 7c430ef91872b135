//! Collaborator interfaces the checks consume.
//!
//! The checks never talk HTTP themselves. `relic-client` implements these
//! traits against New Relic; tests implement them with in-memory fakes.

use std::collections::HashMap;
use std::future::Future;

use crate::error::FetchError;
use crate::types::IncidentRecord;

/// Entity tags: tag key to all of its values.
pub type EntityTags = HashMap<String, Vec<String>>;

/// Source of workload status.
pub trait WorkloadStatusApi: Send + Sync {
    /// Fetches the current status label of a workload.
    ///
    /// `Ok(None)` means the provider answered without a status.
    fn workload_status(
        &self,
        workload_guid: &str,
        account_id: i64,
    ) -> impl Future<Output = Result<Option<String>, FetchError>> + Send;
}

/// Source of active incidents and entity tags.
pub trait IncidentsApi: Send + Sync {
    /// Fetches active incidents of an account, restricted to the given priorities.
    fn incidents(
        &self,
        priority_filter: &[String],
        account_id: i64,
    ) -> impl Future<Output = Result<Vec<IncidentRecord>, FetchError>> + Send;

    /// Fetches the tags of a single entity.
    fn entity_tags(
        &self,
        entity_guid: &str,
    ) -> impl Future<Output = Result<EntityTags, FetchError>> + Send;
}

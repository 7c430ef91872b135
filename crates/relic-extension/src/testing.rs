//! In-memory New Relic fake shared by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use relic_checks::{EntityTags, FetchError, IncidentRecord, IncidentsApi, WorkloadStatusApi};
use relic_client::{EventIngest, Workload};

use crate::api::NewRelicApi;

pub type CreatedRule = (i64, String, String, DateTime<Utc>);

#[derive(Debug, Default)]
struct Recorded {
    created: Vec<CreatedRule>,
    deleted: Vec<(i64, String)>,
    events: Vec<(EventIngest, i64)>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeApi {
    status: Option<String>,
    accounts: Vec<i64>,
    workloads: HashMap<i64, Vec<Workload>>,
    failing_workload_accounts: Vec<i64>,
    incidents: Vec<IncidentRecord>,
    tags: HashMap<String, EntityTags>,
    read_failure: Option<FetchError>,
    mutation_failure: Arc<Mutex<Option<FetchError>>>,
    recorded: Arc<Mutex<Recorded>>,
    account_lookups: Arc<AtomicUsize>,
}

impl FakeApi {
    pub fn with_workload_status(mut self, status: Option<&str>) -> Self {
        self.status = status.map(ToString::to_string);
        self
    }

    pub fn with_accounts(mut self, accounts: Vec<i64>) -> Self {
        self.accounts = accounts;
        self
    }

    pub fn with_workloads(mut self, account_id: i64, workloads: Vec<Workload>) -> Self {
        self.workloads.insert(account_id, workloads);
        self
    }

    pub fn failing_workloads_for(mut self, account_id: i64) -> Self {
        self.failing_workload_accounts.push(account_id);
        self
    }

    pub fn with_incidents(mut self, incidents: Vec<IncidentRecord>) -> Self {
        self.incidents = incidents;
        self
    }

    pub fn with_entity_tags(mut self, guid: &str, tags: EntityTags) -> Self {
        self.tags.insert(guid.to_string(), tags);
        self
    }

    pub fn failing_reads(mut self, err: FetchError) -> Self {
        self.read_failure = Some(err);
        self
    }

    pub fn failing_mutations(self, err: FetchError) -> Self {
        self.set_mutation_failure(Some(err));
        self
    }

    /// Shared by all clones.
    pub fn set_mutation_failure(&self, err: Option<FetchError>) {
        *self.mutation_failure.lock() = err;
    }

    pub fn created_rules(&self) -> Vec<CreatedRule> {
        self.recorded.lock().created.clone()
    }

    pub fn deleted_rules(&self) -> Vec<(i64, String)> {
        self.recorded.lock().deleted.clone()
    }

    pub fn posted_events(&self) -> Vec<(EventIngest, i64)> {
        self.recorded.lock().events.clone()
    }

    pub fn account_lookups(&self) -> usize {
        self.account_lookups.load(Ordering::SeqCst)
    }

    fn read<T>(&self, value: T) -> Result<T, FetchError> {
        self.read_failure.clone().map_or(Ok(value), Err)
    }

    fn mutate(&self) -> Result<(), FetchError> {
        self.mutation_failure.lock().clone().map_or(Ok(()), Err)
    }
}

impl WorkloadStatusApi for FakeApi {
    async fn workload_status(
        &self,
        _guid: &str,
        _account_id: i64,
    ) -> Result<Option<String>, FetchError> {
        self.read(self.status.clone())
    }
}

impl IncidentsApi for FakeApi {
    async fn incidents(
        &self,
        _priorities: &[String],
        _account_id: i64,
    ) -> Result<Vec<IncidentRecord>, FetchError> {
        self.read(self.incidents.clone())
    }

    async fn entity_tags(&self, guid: &str) -> Result<EntityTags, FetchError> {
        self.read(self.tags.get(guid).cloned().unwrap_or_default())
    }
}

impl NewRelicApi for FakeApi {
    async fn account_ids(&self) -> Result<Vec<i64>, FetchError> {
        self.account_lookups.fetch_add(1, Ordering::SeqCst);
        self.read(self.accounts.clone())
    }

    async fn workloads(&self, account_id: i64) -> Result<Vec<Workload>, FetchError> {
        if self.failing_workload_accounts.contains(&account_id) {
            return Err(FetchError::new(format!("account {account_id} unavailable")));
        }
        self.read(self.workloads.get(&account_id).cloned().unwrap_or_default())
    }

    async fn create_muting_rule(
        &self,
        account_id: i64,
        name: &str,
        description: &str,
        end: DateTime<Utc>,
    ) -> Result<String, FetchError> {
        self.mutate()?;
        self.recorded
            .lock()
            .created
            .push((account_id, name.to_string(), description.to_string(), end));
        Ok("248760".to_string())
    }

    async fn delete_muting_rule(&self, account_id: i64, rule_id: &str) -> Result<(), FetchError> {
        self.mutate()?;
        self.recorded.lock().deleted.push((account_id, rule_id.to_string()));
        Ok(())
    }

    async fn post_event(&self, event: &EventIngest, account_id: i64) -> Result<(), FetchError> {
        self.mutate()?;
        self.recorded.lock().events.push((event.clone(), account_id));
        Ok(())
    }
}

//! The New Relic client.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use relic_checks::{status, EntityTags, FetchError, IncidentRecord, IncidentsApi, WorkloadStatusApi};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::graphql::{
    self, AccountActor, AccountsActor, ActorData, EntitiesActor, GraphQlResponse, MutingRuleData,
};
use crate::types::{EventIngest, Workload};

const API_KEY_HEADER: &str = "API-Key";
const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// Async client for NerdGraph and the event ingest API.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct NewRelicClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl NewRelicClient {
    /// Creates a client from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Http` if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self { http, config })
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Lists the ids of all accounts the API key can see.
    pub async fn get_account_ids(&self) -> Result<Vec<i64>> {
        let response: GraphQlResponse<ActorData<AccountsActor>> =
            self.graphql("accounts", graphql::ACCOUNTS_QUERY.to_string()).await?;
        let accounts = response
            .data
            .and_then(|d| d.actor)
            .map(|a| a.accounts)
            .unwrap_or_default();
        Ok(accounts.into_iter().map(|a| a.id).collect())
    }

    /// Lists the workloads of an account.
    pub async fn get_workloads(&self, account_id: i64) -> Result<Vec<Workload>> {
        let response: GraphQlResponse<ActorData<AccountActor>> = self
            .graphql("workloads", graphql::workloads_query(account_id))
            .await?;
        Ok(response
            .data
            .and_then(|d| d.actor)
            .and_then(|a| a.account)
            .and_then(|a| a.workload)
            .map(|w| w.collections)
            .unwrap_or_default())
    }

    /// Fetches the status of one workload.
    ///
    /// NerdGraph regularly times out resolving the workload collection and
    /// answers with `collection: null`. Such a response yields `UNKNOWN`
    /// instead of an error.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::UnexpectedBody` when the response carries no
    /// workload at all.
    pub async fn get_workload_status(
        &self,
        workload_guid: &str,
        account_id: i64,
    ) -> Result<Option<String>> {
        let (response, body): (GraphQlResponse<ActorData<AccountActor>>, String) = self
            .graphql_with_body(
                "workload status",
                graphql::workload_status_query(workload_guid, account_id),
            )
            .await?;
        let errors = response.error_messages().join("; ");
        let Some(workload) = response
            .data
            .and_then(|d| d.actor)
            .and_then(|a| a.account)
            .and_then(|a| a.workload)
        else {
            error!(workload_guid, account_id, %errors, %body, "workload missing in response");
            return Err(ClientError::UnexpectedBody { body });
        };

        match workload.collection.and_then(|c| c.status) {
            Some(status) => Ok(Some(status.value)),
            None => {
                warn!(
                    workload_guid,
                    account_id,
                    %errors,
                    "workload status missing in response, returning UNKNOWN"
                );
                Ok(Some(status::UNKNOWN.to_string()))
            }
        }
    }

    /// Lists active incidents of an account with one of the given priorities.
    ///
    /// A response without incident data yields an empty list.
    pub async fn get_incidents(
        &self,
        priority_filter: &[String],
        account_id: i64,
    ) -> Result<Vec<IncidentRecord>> {
        let response: GraphQlResponse<ActorData<AccountActor>> = self
            .graphql(
                "incidents",
                graphql::incidents_query(priority_filter, account_id),
            )
            .await?;
        Ok(response
            .data
            .and_then(|d| d.actor)
            .and_then(|a| a.account)
            .and_then(|a| a.ai_issues)
            .and_then(|i| i.incidents)
            .map(|page| page.incidents)
            .unwrap_or_default())
    }

    /// Fetches the tags of one entity.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::UnexpectedBody` unless exactly one entity is returned.
    pub async fn get_entity_tags(&self, entity_guid: &str) -> Result<EntityTags> {
        let (response, body): (GraphQlResponse<ActorData<EntitiesActor>>, String) = self
            .graphql_with_body("entity tags", graphql::entity_tags_query(entity_guid))
            .await?;
        let mut entities = response
            .data
            .and_then(|d| d.actor)
            .map(|a| a.entities)
            .unwrap_or_default();

        if entities.len() != 1 {
            error!(
                entity_guid,
                entities = entities.len(),
                %body,
                "unexpected entity tags response"
            );
            return Err(ClientError::UnexpectedBody { body });
        }

        let entity = entities.remove(0);
        let mut tags = HashMap::with_capacity(entity.tags.len());
        for tag in entity.tags {
            tags.insert(tag.key, tag.values);
        }
        Ok(tags)
    }

    /// Creates a muting rule silencing all conditions of an account until `end`.
    ///
    /// Returns the id of the created rule.
    pub async fn create_muting_rule(
        &self,
        account_id: i64,
        name: &str,
        description: &str,
        end: DateTime<Utc>,
    ) -> Result<String> {
        let (response, body): (GraphQlResponse<MutingRuleData>, String) = self
            .graphql_with_body(
                "create muting rule",
                graphql::create_muting_rule_mutation(account_id, name, description, end),
            )
            .await?;
        match response.data.and_then(|d| d.created) {
            Some(rule) => Ok(rule.id),
            None => {
                error!(account_id, %body, "muting rule id missing in response");
                Err(ClientError::UnexpectedBody { body })
            }
        }
    }

    /// Deletes a muting rule.
    pub async fn delete_muting_rule(&self, account_id: i64, rule_id: &str) -> Result<()> {
        let url = self.config.graphql_url();
        let body = serde_json::to_vec(&serde_json::json!({
            "query": graphql::delete_muting_rule_mutation(account_id, rule_id)
        }))?;
        self.send("delete muting rule", &url, &self.config.api_key, body)
            .await?;
        Ok(())
    }

    /// Posts one custom event to the event ingest API of an account.
    pub async fn post_event(&self, event: &EventIngest, account_id: i64) -> Result<()> {
        let url = self.config.events_url(account_id);
        let body = serde_json::to_vec(std::slice::from_ref(event)).map_err(|e| {
            error!(error = %e, "failed to serialize event");
            ClientError::from(e)
        })?;
        self.send("post event", &url, &self.config.insights_api_key, body)
            .await?;
        Ok(())
    }

    async fn graphql<T>(&self, operation: &'static str, query: String) -> Result<GraphQlResponse<T>>
    where
        T: DeserializeOwned,
    {
        self.graphql_with_body(operation, query)
            .await
            .map(|(response, _)| response)
    }

    async fn graphql_with_body<T>(
        &self,
        operation: &'static str,
        query: String,
    ) -> Result<(GraphQlResponse<T>, String)>
    where
        T: DeserializeOwned,
    {
        let url = self.config.graphql_url();
        let request = serde_json::to_vec(&serde_json::json!({ "query": query }))?;
        let body = self
            .send(operation, &url, &self.config.api_key, request)
            .await?;
        if body.is_empty() {
            error!(operation, "empty response body");
            return Err(ClientError::EmptyBody);
        }

        let response: GraphQlResponse<T> = serde_json::from_str(&body).map_err(|e| {
            error!(operation, error = %e, %body, "failed to parse body");
            ClientError::from(e)
        })?;

        let errors = response.error_messages();
        if !errors.is_empty() {
            warn!(operation, ?errors, "API returned errors");
        }
        Ok((response, body))
    }

    /// Sends a POST request and returns the body of a 200 response.
    async fn send(
        &self,
        operation: &'static str,
        url: &str,
        api_key: &str,
        body: Vec<u8>,
    ) -> Result<String> {
        debug!(operation, url, len = body.len(), "requesting New Relic API");

        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, api_key)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                error!(operation, url, error = %e, "failed to execute request");
                ClientError::from(e)
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            error!(operation, error = %e, "failed to read body");
            ClientError::from(e)
        })?;

        if status != StatusCode::OK {
            error!(operation, code = status.as_u16(), body = %text, "unexpected response");
            return Err(ClientError::UnexpectedStatus {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }
}

impl WorkloadStatusApi for NewRelicClient {
    async fn workload_status(
        &self,
        workload_guid: &str,
        account_id: i64,
    ) -> std::result::Result<Option<String>, FetchError> {
        Ok(self.get_workload_status(workload_guid, account_id).await?)
    }
}

impl IncidentsApi for NewRelicClient {
    async fn incidents(
        &self,
        priority_filter: &[String],
        account_id: i64,
    ) -> std::result::Result<Vec<IncidentRecord>, FetchError> {
        Ok(self.get_incidents(priority_filter, account_id).await?)
    }

    async fn entity_tags(&self, entity_guid: &str) -> std::result::Result<EntityTags, FetchError> {
        Ok(self.get_entity_tags(entity_guid).await?)
    }
}

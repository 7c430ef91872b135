//! Entity tag filtering for incidents.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, error};

use crate::api::{EntityTags, IncidentsApi};
use crate::types::IncidentRecord;

/// Required entity tags: key to required value. All pairs must match.
pub type EntityTagFilter = BTreeMap<String, String>;

/// The first filter pair an entity's tags do not satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagMismatch<'a> {
    /// The entity has no tag with this key.
    MissingKey(&'a str),
    /// The entity has the key but not the required value.
    MissingValue {
        /// Tag key.
        key: &'a str,
        /// Required value.
        value: &'a str,
    },
}

impl fmt::Display for TagMismatch<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingKey(key) => write!(f, "missing tag '{key}'"),
            Self::MissingValue { key, value } => write!(f, "tag '{key}' lacks value '{value}'"),
        }
    }
}

/// Checks entity tags against a filter.
///
/// Returns `None` when every pair matches. An empty filter always matches.
pub fn tag_mismatch<'a>(tags: &EntityTags, filter: &'a EntityTagFilter) -> Option<TagMismatch<'a>> {
    filter.iter().find_map(|(key, value)| match tags.get(key) {
        None => Some(TagMismatch::MissingKey(key)),
        Some(values) if !values.iter().any(|v| v == value) => {
            Some(TagMismatch::MissingValue { key, value })
        }
        Some(_) => None,
    })
}

/// Keeps the incidents whose entity carries all required tags.
///
/// Tags are fetched per incident on every call. An incident whose tags cannot
/// be fetched is dropped.
pub async fn filter_incidents<A>(
    api: &A,
    incidents: Vec<IncidentRecord>,
    filter: &EntityTagFilter,
) -> Vec<IncidentRecord>
where
    A: IncidentsApi,
{
    if filter.is_empty() {
        return incidents;
    }

    let mut kept = Vec::with_capacity(incidents.len());
    for incident in incidents {
        let tags = match api.entity_tags(&incident.entity_ref).await {
            Ok(tags) => tags,
            Err(err) => {
                error!(
                    entity = %incident.entity_ref,
                    incident = %incident.id,
                    error = %err,
                    "failed to get entity tags, ignoring incident"
                );
                continue;
            }
        };

        match tag_mismatch(&tags, filter) {
            None => kept.push(incident),
            Some(mismatch) => debug!(
                entity = %incident.entity_ref,
                incident = %incident.id,
                %mismatch,
                "entity tags do not match, ignoring incident"
            ),
        }
    }
    kept
}

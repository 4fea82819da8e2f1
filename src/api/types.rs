//! Request and response types for the backend HTTP API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Estimation configuration for a step, also usable as a bar's
/// `default_step_config`. Omitted fields keep the backend defaults.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StepConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub one_off_technique: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterated: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterated_technique: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub one_off_percentile: Option<f64>,
}

impl StepConfig {
    pub fn one_off(technique: &str) -> Self {
        Self {
            one_off_technique: Some(technique.to_string()),
            ..Self::default()
        }
    }

    pub fn iterated(technique: &str) -> Self {
        Self {
            iterated: Some(true),
            iterated_technique: Some(technique.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateProgressBar {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling_max_count: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling_max_age_seconds: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_step_config: Option<StepConfig>,
}

impl CreateProgressBar {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            sampling_max_count: None,
            sampling_max_age_seconds: None,
            default_step_config: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateProgressBar {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling_max_count: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling_max_age_seconds: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_step_config: Option<StepConfig>,
}

/// One field condition in a search request.
#[derive(Debug, Clone, Serialize)]
pub struct FilterOn {
    pub operator: String,
    pub value: Value,
}

impl FilterOn {
    pub fn eq(value: impl Into<Value>) -> Self {
        Self {
            operator: "eq".to_string(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SortItem {
    pub key: String,
    pub dir: String,
}

/// Body for the `/search` endpoints. An empty query serializes to `{}` and
/// matches everything the caller can see.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchQuery {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub filters: BTreeMap<String, FilterOn>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortItem>,
}

impl SearchQuery {
    pub fn filter(mut self, field: &str, filter: FilterOn) -> Self {
        self.filters.insert(field.to_string(), filter);
        self
    }

    pub fn sort_by(mut self, key: &str, dir: &str) -> Self {
        self.sort.push(SortItem {
            key: key.to_string(),
            dir: dir.to_string(),
        });
        self
    }
}

/// Common `/search` response shape.
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub items: Vec<Value>,
    pub next_page_sort: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateTrace {
    pub pbar_name: String,
    pub uid: String,
    pub step_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u64>,

    pub now: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceStepUpdate {
    pub pbar_name: String,
    pub trace_uid: String,
    pub step_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub iteration: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u64>,

    pub done: bool,
    pub now: f64,
}

/// The user's usage in the current billing period.
#[derive(Debug, Deserialize)]
pub struct CurrentUsage {
    pub traces: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateExampleJob {
    pub duration: u64,
    pub stdev: u64,
}

/// Identity handed back when an example job is enqueued; enough to watch
/// its trace over the websocket.
#[derive(Debug, Deserialize)]
pub struct ExampleJobCreated {
    pub uid: String,
    pub sub: String,
    pub pbar_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ExampleJobStatus {
    pub status: String,
    #[serde(default)]
    pub data: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_search_query_serializes_to_empty_object() {
        let body = serde_json::to_value(SearchQuery::default()).unwrap();
        assert_eq!(body, json!({}));
    }

    #[test]
    fn search_query_matches_backend_contract() {
        let query = SearchQuery::default()
            .filter("name", FilterOn::eq("test"))
            .sort_by("name", "desc");
        let body = serde_json::to_value(query).unwrap();
        assert_eq!(
            body,
            json!({
                "filters": {"name": {"operator": "eq", "value": "test"}},
                "sort": [{"key": "name", "dir": "desc"}],
            })
        );
    }

    #[test]
    fn optional_trace_fields_are_omitted() {
        let body = serde_json::to_value(CreateTrace {
            pbar_name: "test".into(),
            uid: "u".into(),
            step_name: "step1".into(),
            iterations: None,
            now: 1.5,
        })
        .unwrap();
        assert_eq!(
            body,
            json!({"pbar_name": "test", "uid": "u", "step_name": "step1", "now": 1.5})
        );
    }
}

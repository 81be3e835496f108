//! Structured task payloads built from a selection, and their submission to
//! the ingestion task API.

use async_trait::async_trait;
use clap::ValueEnum;
use futures::future::join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashSet};
use tracing::{info, warn};

use crate::error::ExplorerError;
use crate::graph::{NodeKey, VisibleSubgraph};
use crate::source::FetchParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowType {
    Collect,
    #[value(name = "source_collect", alias = "source-collect")]
    SourceCollect,
}

impl std::fmt::Display for FlowType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowType::Collect => write!(f, "collect"),
            FlowType::SourceCollect => write!(f, "source_collect"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedNode {
    #[serde(rename = "type")]
    pub node_type: String,
    pub id: String,
    pub entry_id: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_focus: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectedEdge {
    pub source_entry_id: String,
    pub target_entry_id: String,
    pub relation: String,
    pub label: String,
}

/// Dashboard filter state that produced the current view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardParams {
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    pub entities: Vec<String>,
    pub limit: u32,
    pub hidden_types: Vec<String>,
}

impl DashboardParams {
    pub fn from_fetch(params: &FetchParams, hidden: &BTreeSet<String>) -> Self {
        Self {
            kind: params.kind.to_string(),
            start_date: params.start_date.clone(),
            end_date: params.end_date.clone(),
            entities: params.entities.clone(),
            limit: params.limit,
            hidden_types: hidden.iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPayload {
    pub selected_nodes: Vec<SelectedNode>,
    pub selected_edges: Vec<SelectedEdge>,
    pub dashboard: DashboardParams,
    pub llm_assist: bool,
    pub flow_type: FlowType,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSummary {
    pub accepted: u64,
    pub queued: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskBatch {
    pub batch_name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskResponse {
    pub summary: TaskSummary,
    pub batches: Vec<TaskBatch>,
}

/// Builds task payloads from a connected subgraph and a selection.
/// Read-only with respect to both.
#[derive(Debug, Clone)]
pub struct StructuredTaskBuilder {
    dashboard: DashboardParams,
    llm_assist: bool,
}

impl StructuredTaskBuilder {
    pub fn new(dashboard: DashboardParams, llm_assist: bool) -> Self {
        Self {
            dashboard,
            llm_assist,
        }
    }

    pub fn build(
        &self,
        subgraph: &VisibleSubgraph,
        selected: &BTreeSet<NodeKey>,
        flow_type: FlowType,
    ) -> TaskPayload {
        // BTreeSet iteration keeps nodes sorted by key
        let selected_nodes: Vec<SelectedNode> = selected
            .iter()
            .filter_map(|key| {
                let node = subgraph.node(key)?;
                Some(SelectedNode {
                    node_type: key.node_type.clone(),
                    id: key.id.clone(),
                    entry_id: key.to_string(),
                    label: node.label(),
                    topic_focus: node.topic_scope(),
                })
            })
            .collect();

        let mut seen: HashSet<SelectedEdge> = HashSet::new();
        let selected_edges: Vec<SelectedEdge> = subgraph
            .connected_edges
            .iter()
            .filter(|e| selected.contains(&e.from) && selected.contains(&e.to))
            .map(|e| SelectedEdge {
                source_entry_id: e.from.to_string(),
                target_entry_id: e.to.to_string(),
                relation: e.relation().to_string(),
                label: e.label().to_string(),
            })
            .filter(|e| seen.insert(e.clone()))
            .collect();

        TaskPayload {
            selected_nodes,
            selected_edges,
            dashboard: self.dashboard.clone(),
            llm_assist: self.llm_assist,
            flow_type,
        }
    }
}

#[async_trait]
pub trait TaskSubmitter: Send + Sync {
    async fn submit(&self, payload: &TaskPayload) -> Result<TaskResponse, ExplorerError>;
}

/// JSON client for the task API.
pub struct HttpTaskClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpTaskClient {
    pub fn new(endpoint: &str, api_key: Option<&str>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
            api_key: api_key.filter(|k| !k.is_empty()).map(String::from),
        }
    }
}

#[async_trait]
impl TaskSubmitter for HttpTaskClient {
    async fn submit(&self, payload: &TaskPayload) -> Result<TaskResponse, ExplorerError> {
        let mut request = self.client.post(&self.endpoint).json(payload);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ExplorerError::TaskApi { status, body });
        }
        Ok(response.json().await?)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FlowReport {
    pub flow_type: FlowType,
    pub summary: TaskSummary,
    pub batches: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SubmissionReport {
    pub flows: Vec<FlowReport>,
}

impl SubmissionReport {
    pub fn totals(&self) -> TaskSummary {
        self.flows.iter().fold(TaskSummary::default(), |mut acc, f| {
            acc.accepted += f.summary.accepted;
            acc.queued += f.summary.queued;
            acc.failed += f.summary.failed;
            acc
        })
    }

    pub fn has_errors(&self) -> bool {
        self.flows.iter().any(|f| f.error.is_some())
    }
}

/// Submit one payload per flow type concurrently. A failing flow is
/// recorded with every selected node counted as failed; the others proceed.
pub async fn submit_flows(
    submitter: &dyn TaskSubmitter,
    builder: &StructuredTaskBuilder,
    subgraph: &VisibleSubgraph,
    selected: &BTreeSet<NodeKey>,
    flows: &[FlowType],
) -> SubmissionReport {
    let mut unique: Vec<FlowType> = Vec::new();
    for flow in flows {
        if !unique.contains(flow) {
            unique.push(*flow);
        }
    }

    let payloads: Vec<TaskPayload> = unique
        .iter()
        .map(|&flow| builder.build(subgraph, selected, flow))
        .collect();

    let results = join_all(payloads.iter().map(|p| submitter.submit(p))).await;

    let flows = payloads
        .iter()
        .zip(results)
        .map(|(payload, result)| match result {
            Ok(response) => {
                info!(
                    flow = %payload.flow_type,
                    accepted = response.summary.accepted,
                    queued = response.summary.queued,
                    failed = response.summary.failed,
                    "task flow submitted"
                );
                FlowReport {
                    flow_type: payload.flow_type,
                    summary: response.summary,
                    batches: response.batches.into_iter().map(|b| b.batch_name).collect(),
                    error: None,
                }
            }
            Err(e) => {
                warn!(flow = %payload.flow_type, "task flow failed: {}", e);
                FlowReport {
                    flow_type: payload.flow_type,
                    summary: TaskSummary {
                        failed: payload.selected_nodes.len() as u64,
                        ..TaskSummary::default()
                    },
                    batches: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        })
        .collect();

    SubmissionReport { flows }
}

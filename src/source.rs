use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::error::ExplorerError;
use crate::graph::{GraphData, VariantKind};

pub const DEFAULT_LIMIT: u32 = 500;
pub const MAX_LIMIT: u32 = 5000;

/// Query parameters of one graph fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchParams {
    pub kind: VariantKind,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub entities: Vec<String>,
    pub limit: u32,
}

impl FetchParams {
    pub fn new(kind: VariantKind) -> Self {
        Self {
            kind,
            start_date: None,
            end_date: None,
            entities: Vec::new(),
            limit: DEFAULT_LIMIT,
        }
    }

    /// Parse a user-supplied limit, clamped to `[1, MAX_LIMIT]`.
    /// Anything that is not an integer falls back to the default.
    pub fn parse_limit(raw: &str) -> u32 {
        match raw.trim().parse::<i64>() {
            Ok(n) => n.clamp(1, MAX_LIMIT as i64) as u32,
            Err(_) => {
                warn!("Ignoring non-numeric limit '{}', using {}", raw, DEFAULT_LIMIT);
                DEFAULT_LIMIT
            }
        }
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("kind", self.kind.to_string())];
        if let Some(start) = &self.start_date {
            pairs.push(("start_date", start.clone()));
        }
        if let Some(end) = &self.end_date {
            pairs.push(("end_date", end.clone()));
        }
        for entity in &self.entities {
            pairs.push(("entity", entity.clone()));
        }
        pairs.push(("limit", self.limit.to_string()));
        pairs
    }
}

/// Provider of raw `{nodes, edges}` data.
#[async_trait]
pub trait GraphSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(&self, params: &FetchParams) -> Result<GraphData, ExplorerError>;
}

/// Reads a previously fetched graph from a JSON file.
///
/// The file is taken as already filtered; only `limit` is applied, as a cap
/// on the node count.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl GraphSource for FileSource {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn fetch(&self, params: &FetchParams) -> Result<GraphData, ExplorerError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let mut data: GraphData = serde_json::from_str(&content)?;
        if data.nodes.len() > params.limit as usize {
            debug!(
                total = data.nodes.len(),
                limit = params.limit,
                "truncating file graph to limit"
            );
            data.nodes.truncate(params.limit as usize);
        }
        Ok(data)
    }
}

/// Fetches `GET {base_url}/graph` with the fetch parameters as query string.
pub struct HttpSource {
    client: Client,
    base_url: String,
}

impl HttpSource {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/graph", self.base_url)
    }
}

#[async_trait]
impl GraphSource for HttpSource {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(&self, params: &FetchParams) -> Result<GraphData, ExplorerError> {
        let response = self
            .client
            .get(self.endpoint())
            .query(&params.query_pairs())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ExplorerError::Source {
                source_name: "http",
                message: format!("{}: {}", status, body),
            });
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

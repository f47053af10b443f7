//! API documentation MCP server implementation

use std::sync::Arc;

use anyhow::Result;
use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use apidoc_rag::{KbError, KnowledgeBase, KnowledgePaths, MatchType};

/// Parameters for apidoc_search tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchParams {
    /// Feature description or keywords (e.g., "expectation values of observables")
    #[schemars(description = "Feature description or keywords")]
    pub query: String,
    /// Maximum number of results to return (default: 5)
    #[schemars(description = "Maximum number of results (default: 5, max: 100)")]
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Minimum score (default: 0.3)
    #[schemars(description = "Minimum score a result must reach (default: 0.3)")]
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,
}

fn default_top_k() -> usize {
    5
}

fn default_min_similarity() -> f32 {
    0.3
}

/// Parameters for apidoc_get and apidoc_related tools
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ApiNameParams {
    /// Exact API name (e.g., "Estimator.run")
    #[schemars(description = "Exact API name")]
    pub api_name: String,
}

/// Parameters for apidoc_list_library tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct LibraryParams {
    /// Library tag (e.g., "qiskit", "cirq")
    #[schemars(description = "Library tag, e.g. qiskit or cirq")]
    pub library: String,
    /// Maximum number of results (default: 50)
    #[schemars(description = "Maximum results (default: 50)")]
    #[serde(default = "default_list_limit")]
    pub limit: usize,
}

fn default_list_limit() -> usize {
    50
}

/// Search result for JSON output
#[derive(Debug, Serialize)]
struct SearchResultJson {
    api_name: String,
    library: String,
    signature: String,
    description: String,
    example: String,
    common_pitfalls: String,
    score: f32,
    match_type: MatchType,
}

/// API documentation MCP service
#[derive(Clone)]
pub struct ApiDocService {
    kb: Arc<KnowledgeBase>,
    tool_router: ToolRouter<Self>,
}

impl ApiDocService {
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self {
            kb,
            tool_router: Self::tool_router(),
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let output = serde_json::to_string_pretty(value).map_err(|e| {
        McpError::internal_error(format!("JSON serialization failed: {}", e), None)
    })?;
    Ok(CallToolResult::success(vec![Content::text(output)]))
}

#[tool_router]
impl ApiDocService {
    /// Multi-strategy API search
    #[tool(description = "Search quantum-computing API documentation. Combines semantic similarity, keyword overlap and usage-context matching; returns ranked APIs with signature, description, example and pitfalls.")]
    async fn apidoc_search(
        &self,
        params: Parameters<SearchParams>,
    ) -> Result<CallToolResult, McpError> {
        // Clamp top_k: max 100 (DoS prevention)
        let top_k = params.0.top_k.min(100);

        let results = self
            .kb
            .search(&params.0.query, top_k, params.0.min_similarity)
            .map_err(|e| match e {
                KbError::InvalidArgument { .. } => McpError::invalid_params(e.to_string(), None),
                other => McpError::internal_error(format!("Search failed: {}", other), None),
            })?;

        let json_results: Vec<SearchResultJson> = results
            .into_iter()
            .map(|r| SearchResultJson {
                api_name: r.document.api_name.clone(),
                library: r.document.library.clone(),
                signature: r.document.signature.clone(),
                description: r.document.description.clone(),
                example: r.document.example.clone(),
                common_pitfalls: r.document.common_pitfalls.clone(),
                score: r.score,
                match_type: r.match_type,
            })
            .collect();

        to_json(&json_results)
    }

    /// Get one API document by exact name
    #[tool(description = "Get the full documentation entry of one API by its exact name.")]
    async fn apidoc_get(
        &self,
        params: Parameters<ApiNameParams>,
    ) -> Result<CallToolResult, McpError> {
        match self.kb.get_api_by_name(&params.0.api_name) {
            Some(doc) => to_json(doc),
            None => Ok(CallToolResult::success(vec![Content::text(format!(
                "API not found: {}",
                params.0.api_name
            ))])),
        }
    }

    /// List APIs of one library
    #[tool(description = "List API documentation entries of one library, in corpus order.")]
    async fn apidoc_list_library(
        &self,
        params: Parameters<LibraryParams>,
    ) -> Result<CallToolResult, McpError> {
        // Clamp limit: default 50, max 500 (DoS prevention)
        let limit = match params.0.limit {
            0 => default_list_limit(),
            n => n.min(500),
        };

        let docs: Vec<_> = self
            .kb
            .get_apis_by_library(&params.0.library)
            .into_iter()
            .take(limit)
            .collect();

        to_json(&docs)
    }

    /// Related APIs of one API
    #[tool(description = "Get the documented related APIs of one API. References missing from the knowledge base are omitted.")]
    async fn apidoc_related(
        &self,
        params: Parameters<ApiNameParams>,
    ) -> Result<CallToolResult, McpError> {
        let related = self.kb.get_related_apis(&params.0.api_name);
        to_json(&related)
    }

    /// Knowledge base statistics
    #[tool(description = "Get knowledge base statistics: API count per library, cache size and embedding model status.")]
    async fn apidoc_stats(&self) -> Result<CallToolResult, McpError> {
        to_json(&self.kb.statistics())
    }
}

#[tool_handler]
impl ServerHandler for ApiDocService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Quantum-computing API documentation server. Search by feature description, then fetch full entries and related APIs.".to_string()
            ),
            ..Default::default()
        }
    }
}

/// Run the MCP server
pub async fn run_mcp_server(paths: KnowledgePaths) -> Result<()> {
    use tokio::io::{stdin, stdout};

    let mut kb = KnowledgeBase::open(&paths);
    let report = kb.load();
    info!(
        documents = report.documents,
        embedded = report.embedded_new + report.embedded_cached,
        "Knowledge base ready"
    );

    let service = ApiDocService::new(Arc::new(kb));
    let transport = (stdin(), stdout());
    let server = service.serve(transport).await?;
    server.waiting().await?;

    Ok(())
}

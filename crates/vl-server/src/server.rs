use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::model::*;
use rmcp::ErrorData as McpError;
use rmcp::{tool_handler, ServerHandler};
use vl_contracts::{FocusArea, Settings, SourcedAnalysis, VisionError};
use vl_engine::AnalysisPipeline;

#[derive(Clone)]
pub struct VisionMcpServer {
    pub pipeline: Arc<AnalysisPipeline>,
    pub tool_router: ToolRouter<Self>,
    server_name: String,
    server_version: String,
}

impl VisionMcpServer {
    pub fn new(pipeline: Arc<AnalysisPipeline>, settings: &Settings) -> Self {
        Self {
            pipeline,
            tool_router: crate::tools::router(),
            server_name: settings.server_name.clone(),
            server_version: settings.server_version.clone(),
        }
    }

    /// Runs the blocking pipeline off the async executor. The outer error is
    /// only for a panicked or cancelled task.
    pub(crate) async fn run_pipeline(
        &self,
        input: Option<String>,
        focus: FocusArea,
    ) -> Result<Result<SourcedAnalysis, VisionError>, McpError> {
        let pipeline = Arc::clone(&self.pipeline);
        tokio::task::spawn_blocking(move || pipeline.run(input.as_deref(), focus))
            .await
            .map_err(|e| McpError::internal_error(format!("task join error: {e}"), None))
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for VisionMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Image analysis server. Call auto_analyze_image with a file path, an \
                 http(s) URL, or nothing to analyze the image on the clipboard."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: self.server_name.clone(),
                version: self.server_version.clone(),
                ..Implementation::from_build_env()
            },
            ..Default::default()
        }
    }
}

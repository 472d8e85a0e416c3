use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::{schemars, tool, tool_router, ErrorData as McpError};
use serde::{Deserialize, Serialize};
use vl_contracts::{FocusArea, SourcedAnalysis, VisionError};

use crate::server::VisionMcpServer;

/// Wire form of [`FocusArea`] for the tool schema. `vl-contracts` carries no
/// schemars dependency, so the `JsonSchema` derive lives here.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum FocusAreaParam {
    #[default]
    Code,
    Architecture,
    Error,
    Documentation,
}

impl From<FocusAreaParam> for FocusArea {
    fn from(param: FocusAreaParam) -> Self {
        match param {
            FocusAreaParam::Code => FocusArea::Code,
            FocusAreaParam::Architecture => FocusArea::Architecture,
            FocusAreaParam::Error => FocusArea::Error,
            FocusAreaParam::Documentation => FocusArea::Documentation,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AutoAnalyzeParams {
    /// Local image path or http(s) URL. Omit to use the clipboard image.
    #[serde(default)]
    pub image_path: Option<String>,
    /// What the analysis should concentrate on (default: code)
    #[serde(default)]
    pub focus_area: Option<FocusAreaParam>,
}

pub(crate) fn router() -> ToolRouter<VisionMcpServer> {
    VisionMcpServer::analysis_tools()
}

#[tool_router(router = analysis_tools)]
impl VisionMcpServer {
    /// Acquire an image and describe it with the vision model.
    #[tool(
        description = "Automatically fetch and analyze an image from a file path, an http(s) URL, or the clipboard when no path is given"
    )]
    async fn auto_analyze_image(
        &self,
        Parameters(params): Parameters<AutoAnalyzeParams>,
    ) -> Result<CallToolResult, McpError> {
        let focus = FocusArea::from(params.focus_area.unwrap_or_default());
        let outcome = self.run_pipeline(params.image_path, focus).await?;
        Ok(tool_result(outcome))
    }
}

/// Pipeline failures become error-flagged text results, not protocol errors.
pub(crate) fn tool_result(outcome: Result<SourcedAnalysis, VisionError>) -> CallToolResult {
    match outcome.map(|analysis| serde_json::to_string_pretty(&analysis)) {
        Ok(Ok(text)) => CallToolResult::success(vec![Content::text(text)]),
        Ok(Err(err)) => {
            log::error!("failed to serialize analysis: {err}");
            CallToolResult::error(vec![Content::text(format!(
                "Error: failed to serialize analysis: {err}"
            ))])
        }
        Err(err) => {
            log::error!("auto_analyze_image failed [{}]: {err}", err.kind());
            CallToolResult::error(vec![Content::text(format!("Error: {err}"))])
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rmcp::handler::server::wrapper::Parameters;
    use serde_json::{json, Value};
    use vl_contracts::{
        AnalysisResult, FocusArea, ImageMetadata, Provenance, Settings, SourcedAnalysis,
        VisionError,
    };
    use vl_engine::{
        AnalysisPipeline, ChatCompletionsClient, ClipboardCapture, HttpClient, RemoteFetcher,
        TempArtifacts,
    };

    use super::{tool_result, AutoAnalyzeParams, FocusAreaParam};
    use crate::server::VisionMcpServer;

    struct EmptyClipboard;

    impl ClipboardCapture for EmptyClipboard {
        fn name(&self) -> &str {
            "empty"
        }

        fn capture_png(&self, _dest: &std::path::Path) -> anyhow::Result<bool> {
            Ok(false)
        }
    }

    fn sample_analysis() -> SourcedAnalysis {
        SourcedAnalysis {
            result: AnalysisResult {
                description: None,
                kind: Some("code".to_string()),
                layout: None,
                issues: None,
                details: None,
                summary: "a rust function".to_string(),
                confidence: 0.9,
                metadata: ImageMetadata {
                    format: "png".to_string(),
                    width: 800,
                    height: 600,
                    file_size: "42.00 KB".to_string(),
                },
            },
            source: Provenance::Clipboard,
        }
    }

    fn result_json(result: &rmcp::model::CallToolResult) -> anyhow::Result<Value> {
        Ok(serde_json::to_value(result)?)
    }

    #[test]
    fn params_use_camel_case_and_are_optional() -> anyhow::Result<()> {
        let params: AutoAnalyzeParams =
            serde_json::from_value(json!({ "imagePath": "/tmp/a.png", "focusArea": "error" }))?;
        assert_eq!(params.image_path.as_deref(), Some("/tmp/a.png"));
        assert_eq!(params.focus_area, Some(FocusAreaParam::Error));

        let empty: AutoAnalyzeParams = serde_json::from_value(json!({}))?;
        assert!(empty.image_path.is_none());
        assert_eq!(FocusArea::from(empty.focus_area.unwrap_or_default()), FocusArea::Code);

        assert!(serde_json::from_value::<AutoAnalyzeParams>(json!({ "focusArea": "poetry" })).is_err());
        Ok(())
    }

    #[test]
    fn focus_params_map_one_to_one() {
        let pairs = [
            (FocusAreaParam::Code, FocusArea::Code),
            (FocusAreaParam::Architecture, FocusArea::Architecture),
            (FocusAreaParam::Error, FocusArea::Error),
            (FocusAreaParam::Documentation, FocusArea::Documentation),
        ];
        for (param, focus) in pairs {
            assert_eq!(FocusArea::from(param), focus);
            assert_eq!(serde_json::to_value(param).ok(), Some(json!(focus.as_str())));
        }
    }

    #[test]
    fn success_is_pretty_json_with_source() -> anyhow::Result<()> {
        let value = result_json(&tool_result(Ok(sample_analysis())))?;
        assert_ne!(value["isError"], json!(true));
        let text = value["content"][0]["text"].as_str().unwrap_or_default();
        assert!(text.contains('\n'), "pretty printed");
        let payload: Value = serde_json::from_str(text)?;
        assert_eq!(payload["source"], "clipboard");
        assert_eq!(payload["type"], "code");
        assert_eq!(payload["metadata"]["fileSize"], "42.00 KB");
        Ok(())
    }

    #[test]
    fn failures_are_flagged_error_text() -> anyhow::Result<()> {
        let value = result_json(&tool_result(Err(VisionError::download(Some(404), "gone"))))?;
        assert_eq!(value["isError"], json!(true));
        assert_eq!(
            value["content"][0]["text"],
            "Error: download failed (HTTP 404): gone"
        );
        Ok(())
    }

    #[test]
    fn tool_reports_empty_clipboard_as_error_result() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let settings = Settings {
            api_key: Some("k-test-live".to_string()),
            api_base: "http://127.0.0.1:9".to_string(),
            ..Settings::default()
        };
        let http = HttpClient::builder().no_proxy().build()?;
        let pipeline = Arc::new(AnalysisPipeline::new(
            TempArtifacts::new(temp.path()),
            Box::new(EmptyClipboard),
            RemoteFetcher::from_client(http.clone(), 1024),
            Box::new(ChatCompletionsClient::with_client(settings.clone(), http)),
        ));
        let server = VisionMcpServer::new(pipeline, &settings);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()?;
        let result = runtime
            .block_on(server.auto_analyze_image(Parameters(AutoAnalyzeParams::default())))
            .map_err(|err| anyhow::anyhow!("{err:?}"))?;
        drop(runtime);

        let value = result_json(&result)?;
        assert_eq!(value["isError"], json!(true));
        let text = value["content"][0]["text"].as_str().unwrap_or_default();
        assert!(text.starts_with("Error: no image available"), "{text}");
        Ok(())
    }
}

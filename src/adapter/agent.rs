//! Adapter producing the crate's async [`AgentTool`].

use std::sync::Arc;

use super::output::{MediaSupport, OutputPolicy, OutputReconciler};
use super::sanitize::{sanitize_function_name, HostLanguage};
use super::{AsyncToolCaller, ToolAdapter, ToolCaller};
use crate::error::BridgeError;
use crate::mcp::RemoteTool;
use crate::tools::{AgentTool, AgentToolParameters};

/// Wraps remote tools as [`AgentTool`]s returning JSON values.
///
/// Structured output is on by default; blocking forwarders run on tokio's
/// blocking pool so the tool stays async.
#[derive(Debug, Clone, Copy)]
pub struct AgentToolAdapter {
    policy: OutputPolicy,
    host: HostLanguage,
}

impl Default for AgentToolAdapter {
    fn default() -> Self {
        Self {
            policy: OutputPolicy::structured(),
            host: HostLanguage::Rust,
        }
    }
}

impl AgentToolAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output_policy(mut self, policy: OutputPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_host_language(mut self, host: HostLanguage) -> Self {
        self.host = host;
        self
    }

    fn build(&self, call: AsyncToolCaller, tool: &RemoteTool) -> Result<AgentTool, BridgeError> {
        let parameters = AgentToolParameters::from_remote(tool)?;
        let reconciler = Arc::new(OutputReconciler::new(tool, self.policy, MediaSupport::NONE));

        Ok(AgentTool::new(
            sanitize_function_name(&tool.name, self.host),
            tool.description_or_empty(),
            parameters,
            Arc::new(move |arguments| {
                let call = Arc::clone(&call);
                let reconciler = Arc::clone(&reconciler);
                Box::pin(async move {
                    let result = call(arguments).await?;
                    Ok(reconciler.reconcile(result)?.into_value())
                })
            }),
        ))
    }
}

impl ToolAdapter for AgentToolAdapter {
    type Tool = AgentTool;

    fn framework(&self) -> &'static str {
        "agent"
    }

    fn adapt(&self, call: ToolCaller, tool: &RemoteTool) -> Result<AgentTool, BridgeError> {
        self.build(offload_blocking(call, &tool.name), tool)
    }

    fn adapt_async(&self, call: AsyncToolCaller, tool: &RemoteTool) -> Result<AgentTool, BridgeError> {
        self.build(call, tool)
    }
}

/// Run a blocking forwarder on the blocking pool.
fn offload_blocking(call: ToolCaller, tool_name: &str) -> AsyncToolCaller {
    let tool_name = tool_name.to_string();
    Arc::new(move |arguments| {
        let call = Arc::clone(&call);
        let tool_name = tool_name.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || call(arguments))
                .await
                .map_err(|e| BridgeError::ToolExecution {
                    tool_name,
                    message: e.to_string(),
                })?
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::ToolResult;
    use crate::tools::{Tool, ToolArguments, ToolExecutionContext};
    use serde_json::json;

    fn weather_tool() -> RemoteTool {
        RemoteTool::new(
            "get-weather",
            json!({
                "type": "object",
                "properties": { "city": { "type": "string" } },
                "required": ["city"]
            }),
        )
        .with_description("Current weather")
        .with_output_schema(json!({ "type": "object" }))
    }

    #[tokio::test]
    async fn blocking_forwarder_produces_structured_json() {
        let call: ToolCaller = Arc::new(|arguments| {
            Ok(ToolResult::text("21C").with_structured(json!({
                "city": arguments["city"],
                "temp": 21
            })))
        });
        let tool = AgentToolAdapter::new().adapt(call, &weather_tool()).unwrap();

        assert_eq!(tool.name(), "get_weather");
        assert_eq!(tool.description(), "Current weather");
        assert_eq!(
            tool.parameters().schema["properties"]["city"]["description"],
            "see tool description"
        );

        let output = tool
            .execute(
                &ToolArguments::new(json!({ "city": "Oslo" })),
                &ToolExecutionContext::default(),
            )
            .await
            .unwrap();
        assert_eq!(output, json!({ "city": "Oslo", "temp": 21 }));
    }

    #[tokio::test]
    async fn raw_text_policy_returns_strings() {
        let call: AsyncToolCaller =
            Arc::new(|_| Box::pin(async { Ok(ToolResult::text("{\"temp\": 21}")) }));
        let tool = AgentToolAdapter::new()
            .with_output_policy(OutputPolicy::raw_text())
            .adapt_async(call, &weather_tool())
            .unwrap();

        let output = tool
            .execute(&ToolArguments::default(), &ToolExecutionContext::default())
            .await
            .unwrap();
        assert_eq!(output, json!("{\"temp\": 21}"));
    }

    #[tokio::test]
    async fn remote_errors_propagate_unchanged() {
        let call: ToolCaller = Arc::new(|_| {
            Err(BridgeError::ToolExecution {
                tool_name: "get-weather".into(),
                message: "city not found".into(),
            })
        });
        let tool = AgentToolAdapter::new().adapt(call, &weather_tool()).unwrap();

        let err = tool
            .execute(&ToolArguments::default(), &ToolExecutionContext::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BridgeError::ToolExecution { message, .. } if message == "city not found"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn execution_deadline_applies_to_remote_calls() {
        let call: AsyncToolCaller = Arc::new(|_| {
            Box::pin(async {
                tokio::time::sleep(std::time::Duration::from_secs(60)).await;
                Ok(ToolResult::text("late"))
            })
        });
        let tool = AgentToolAdapter::new().adapt_async(call, &weather_tool()).unwrap();
        let ctx = ToolExecutionContext::default().with_deadline(std::time::Duration::from_millis(500));

        let err = tool
            .execute(&ToolArguments::new(json!({ "city": "Oslo" })), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Timeout(500)));
    }

    #[test]
    fn malformed_input_schema_fails_adaptation() {
        let call: ToolCaller = Arc::new(|_| Ok(ToolResult::text("")));
        let tool = RemoteTool::new("bad", json!({ "properties": { "x": { "$ref": "#/$defs/Missing" } } }));
        assert!(matches!(
            AgentToolAdapter::new().adapt(call, &tool),
            Err(BridgeError::Schema(_))
        ));
    }
}

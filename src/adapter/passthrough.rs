//! Adapter that hands back the forwarding function itself.

use serde_json::Value;

use super::{AsyncToolCaller, ToolAdapter, ToolCaller};
use crate::error::BridgeError;
use crate::mcp::{RemoteTool, ToolResult};

/// Forwarding function plus the tool it is bound to.
#[derive(Clone)]
pub struct PassthroughTool {
    pub tool: RemoteTool,
    call: CallHandle,
}

#[derive(Clone)]
enum CallHandle {
    Blocking(ToolCaller),
    Async(AsyncToolCaller),
}

impl PassthroughTool {
    pub fn name(&self) -> &str {
        &self.tool.name
    }

    pub fn is_async(&self) -> bool {
        matches!(self.call, CallHandle::Async(_))
    }

    /// Blocking call; `NotSupported` on an async session.
    pub fn call(&self, arguments: Value) -> Result<ToolResult, BridgeError> {
        match &self.call {
            CallHandle::Blocking(call) => call(arguments),
            CallHandle::Async(_) => Err(BridgeError::NotSupported(format!(
                "tool '{}' is bound to an async session",
                self.tool.name
            ))),
        }
    }

    /// Async call; blocking forwarders run on the blocking thread pool.
    pub async fn call_async(&self, arguments: Value) -> Result<ToolResult, BridgeError> {
        match &self.call {
            CallHandle::Async(call) => call(arguments).await,
            CallHandle::Blocking(call) => {
                let call = call.clone();
                tokio::task::spawn_blocking(move || call(arguments))
                    .await
                    .map_err(|e| BridgeError::ToolExecution {
                        tool_name: self.tool.name.clone(),
                        message: e.to_string(),
                    })?
            }
        }
    }
}

impl std::fmt::Debug for PassthroughTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassthroughTool")
            .field("name", &self.tool.name)
            .field("async", &self.is_async())
            .finish()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughAdapter;

impl ToolAdapter for PassthroughAdapter {
    type Tool = PassthroughTool;

    fn framework(&self) -> &'static str {
        "passthrough"
    }

    fn adapt(&self, call: ToolCaller, tool: &RemoteTool) -> Result<PassthroughTool, BridgeError> {
        Ok(PassthroughTool {
            tool: tool.clone(),
            call: CallHandle::Blocking(call),
        })
    }

    fn adapt_async(
        &self,
        call: AsyncToolCaller,
        tool: &RemoteTool,
    ) -> Result<PassthroughTool, BridgeError> {
        Ok(PassthroughTool {
            tool: tool.clone(),
            call: CallHandle::Async(call),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn echo_caller() -> ToolCaller {
        Arc::new(|arguments| Ok(ToolResult::text(arguments.to_string())))
    }

    #[test]
    fn blocking_tool_forwards_arguments() {
        let tool = PassthroughAdapter
            .adapt(echo_caller(), &RemoteTool::new("echo", json!({})))
            .unwrap();
        let result = tool.call(json!({ "x": 1 })).unwrap();
        assert_eq!(result.content[0].as_text(), Some("{\"x\":1}"));
        assert!(!tool.is_async());
    }

    #[tokio::test]
    async fn async_tool_rejects_blocking_calls() {
        let caller: AsyncToolCaller =
            Arc::new(|arguments| Box::pin(async move { Ok(ToolResult::text(arguments.to_string())) }));
        let tool = PassthroughAdapter
            .adapt_async(caller, &RemoteTool::new("echo", json!({})))
            .unwrap();

        assert!(matches!(tool.call(json!({})), Err(BridgeError::NotSupported(_))));
        let result = tool.call_async(json!({ "y": 2 })).await.unwrap();
        assert_eq!(result.content[0].as_text(), Some("{\"y\":2}"));
    }

    #[tokio::test]
    async fn blocking_tool_is_callable_from_async_code() {
        let tool = PassthroughAdapter
            .adapt(echo_caller(), &RemoteTool::new("echo", json!({})))
            .unwrap();
        let result = tool.call_async(json!(null)).await.unwrap();
        assert_eq!(result.content[0].as_text(), Some("null"));
    }
}

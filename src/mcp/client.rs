//! MCP client session over an rmcp running service.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use rmcp::model::{CallToolRequestParams, CallToolResult, JsonObject, ProtocolVersion};
use rmcp::service::{ClientInitializeError, Peer, RoleClient, ServiceError};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::session::SessionOps;
use super::transport::{McpRunningService, McpTransport};
use super::types::{ContentItem, RemoteTool, ToolResult};
use crate::error::BridgeError;

/// One initialized session with an MCP server.
///
/// Requests go through a cloned [`Peer`], so concurrent calls do not contend
/// on a lock; the running service itself is only touched on close.
pub struct McpClient {
    peer: Peer<RoleClient>,
    service: Mutex<Option<McpRunningService>>,
    closed: AtomicBool,
}

impl McpClient {
    /// Run the initialize handshake, retrying once with the 2024-11-05
    /// protocol revision when the server rejects the latest one.
    pub async fn connect(transport: &mut dyn McpTransport) -> Result<Self, BridgeError> {
        let latest_client_info = rmcp::model::ClientInfo {
            protocol_version: ProtocolVersion::LATEST,
            ..Default::default()
        };

        let service = match transport.connect(latest_client_info).await {
            Ok(service) => service,
            Err(error) if should_retry_protocol_fallback(&error) => {
                debug!(%error, "retrying mcp initialize with legacy protocol version");
                let fallback_client_info = rmcp::model::ClientInfo {
                    protocol_version: ProtocolVersion::V_2024_11_05,
                    ..Default::default()
                };
                transport
                    .connect(fallback_client_info)
                    .await
                    .map_err(map_client_initialize_error)?
            }
            Err(error) => return Err(map_client_initialize_error(error)),
        };

        Ok(Self::from_running_service(service))
    }

    /// Wrap an already-initialized rmcp service.
    pub fn from_running_service(service: McpRunningService) -> Self {
        if let Some(info) = service.peer_info() {
            info!(server = %info.server_info.name, "mcp session initialized");
        }
        Self {
            peer: service.peer().clone(),
            service: Mutex::new(Some(service)),
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), BridgeError> {
        if self.is_closed() {
            return Err(BridgeError::Closed);
        }
        Ok(())
    }

    async fn list_tools_from_peer(&self) -> Result<Vec<rmcp::model::Tool>, ServiceError> {
        match self.peer.list_all_tools().await {
            Ok(tools) => Ok(tools),
            Err(ServiceError::UnexpectedResponse) => {
                self.peer.list_tools(None).await.map(|page| page.tools)
            }
            Err(error) => Err(error),
        }
    }
}

#[async_trait]
impl SessionOps for McpClient {
    async fn list_tools(&self) -> Result<Vec<RemoteTool>, BridgeError> {
        self.ensure_open()?;
        let tools = self
            .list_tools_from_peer()
            .await
            .map_err(|error| map_service_error("list_tools", error))?;
        Ok(tools.into_iter().map(map_remote_tool).collect())
    }

    async fn call_tool(&self, name: &str, arguments: serde_json::Value) -> Result<ToolResult, BridgeError> {
        self.ensure_open()?;
        let arguments = coerce_tool_arguments(arguments)?;
        let result = self
            .peer
            .call_tool(CallToolRequestParams {
                meta: None,
                name: name.to_owned().into(),
                arguments,
                task: None,
            })
            .await
            .map_err(|error| map_service_error("call_tool", error))?;
        map_call_result(name, result)
    }

    async fn close(&self) -> Result<(), BridgeError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let Some(service) = self.service.lock().await.take() else {
            return Ok(());
        };
        let reason = service
            .cancel()
            .await
            .map_err(|e| BridgeError::Session(format!("MCP service task failed: {e}")))?;
        debug!(?reason, "mcp session closed");
        Ok(())
    }
}

fn should_retry_protocol_fallback(error: &ClientInitializeError) -> bool {
    match error {
        ClientInitializeError::JsonRpcError(error) => {
            let message = error.message.to_ascii_lowercase();
            message.contains("protocol") && message.contains("version")
        }
        _ => false,
    }
}

fn map_remote_tool(tool: rmcp::model::Tool) -> RemoteTool {
    RemoteTool {
        name: tool.name.to_string(),
        description: tool.description.map(|d| d.to_string()),
        input_schema: serde_json::Value::Object((*tool.input_schema).clone()),
        output_schema: tool
            .output_schema
            .map(|schema| serde_json::Value::Object((*schema).clone())),
    }
}

fn coerce_tool_arguments(value: serde_json::Value) -> Result<Option<JsonObject>, BridgeError> {
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Object(map) => Ok(Some(map)),
        serde_json::Value::String(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            let parsed: serde_json::Value = serde_json::from_str(trimmed).map_err(|e| {
                BridgeError::InvalidArgument(format!("MCP tool arguments must be valid JSON: {e}"))
            })?;
            coerce_tool_arguments(parsed)
        }
        other => Err(BridgeError::InvalidArgument(format!(
            "MCP tool arguments must be a JSON object; got {other}"
        ))),
    }
}

fn map_content_item(item: &rmcp::model::Content) -> ContentItem {
    serde_json::to_value(item)
        .and_then(serde_json::from_value)
        .unwrap_or(ContentItem::Unknown)
}

fn map_call_result(name: &str, result: CallToolResult) -> Result<ToolResult, BridgeError> {
    let content: Vec<ContentItem> = result.content.iter().map(map_content_item).collect();

    if result.is_error.unwrap_or(false) {
        let message = result
            .structured_content
            .as_ref()
            .map(|v| v.to_string())
            .or_else(|| {
                let lines: Vec<&str> = content.iter().filter_map(ContentItem::as_text).collect();
                (!lines.is_empty()).then(|| lines.join("\n"))
            })
            .unwrap_or_else(|| "MCP tool returned an error result".into());

        return Err(BridgeError::ToolExecution {
            tool_name: name.to_string(),
            message,
        });
    }

    Ok(ToolResult {
        content,
        structured_content: result.structured_content,
    })
}

fn map_client_initialize_error(error: ClientInitializeError) -> BridgeError {
    match error {
        ClientInitializeError::ConnectionClosed(context) => {
            BridgeError::Session(format!("MCP initialize connection closed: {context}"))
        }
        ClientInitializeError::TransportError { error, context } => BridgeError::Session(format!(
            "MCP initialize transport error ({context}): {error}"
        )),
        ClientInitializeError::JsonRpcError(error) => BridgeError::Session(format!(
            "MCP initialize JSON-RPC error {}: {}",
            error.code.0, error.message
        )),
        ClientInitializeError::Cancelled => BridgeError::Session("MCP initialize cancelled".into()),
        other => BridgeError::Session(format!("MCP initialize error: {other}")),
    }
}

fn map_service_error(context: &str, error: ServiceError) -> BridgeError {
    match error {
        ServiceError::McpError(error) => BridgeError::Session(format!(
            "{context}: MCP error {}: {}",
            error.code.0, error.message
        )),
        ServiceError::TransportSend(error) => {
            BridgeError::Session(format!("{context}: MCP transport send failed: {error}"))
        }
        ServiceError::TransportClosed => BridgeError::Closed,
        ServiceError::UnexpectedResponse => {
            BridgeError::Session(format!("{context}: unexpected MCP response"))
        }
        ServiceError::Cancelled { reason } => {
            let suffix = reason
                .as_deref()
                .map(|r| format!(" ({r})"))
                .unwrap_or_default();
            BridgeError::Session(format!("{context}: MCP request cancelled{suffix}"))
        }
        ServiceError::Timeout { timeout } => BridgeError::Timeout(timeout.as_millis() as u64),
        other => BridgeError::Session(format!("{context}: MCP service error: {other}")),
    }
}

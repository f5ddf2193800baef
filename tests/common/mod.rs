//! Shared helpers: a scripted streamable-HTTP MCP server on wiremock.

#![allow(dead_code)]

use std::collections::HashSet;

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const MCP_PATH: &str = "/mcp";

fn input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": { "type": "string" }
        }
    })
}

/// Answers initialize, tools/list and tools/call the way a small server
/// would. Calls echo back `"<server>:<tool>"` plus a structured payload.
pub fn mock_mcp_handler(
    server_name: &'static str,
    tools: &'static [(&'static str, &'static str)],
) -> impl Fn(&Request) -> ResponseTemplate + Send + Sync {
    move |request: &Request| {
        let body: Value = request.body_json().unwrap_or_else(|_| json!({}));
        let method = body.get("method").and_then(Value::as_str).unwrap_or_default();
        let id = body.get("id").cloned().unwrap_or_else(|| json!(1));

        match method {
            "initialize" => ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "protocolVersion": "2025-03-26",
                    "capabilities": { "tools": { "listChanged": false } },
                    "serverInfo": { "name": server_name, "version": "0.1.0" }
                }
            })),
            "tools/list" => {
                let definitions: Vec<_> = tools
                    .iter()
                    .map(|(name, description)| {
                        json!({
                            "name": name,
                            "description": description,
                            "inputSchema": input_schema()
                        })
                    })
                    .collect();
                ResponseTemplate::new(200).set_body_json(json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "result": { "tools": definitions }
                }))
            }
            "tools/call" => {
                let params = body.get("params").cloned().unwrap_or_else(|| json!({}));
                let called = params.get("name").and_then(Value::as_str).unwrap_or_default();
                let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
                ResponseTemplate::new(200).set_body_json(json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "result": {
                        "content": [{ "type": "text", "text": format!("{server_name}:{called}") }],
                        "structuredContent": {
                            "server": server_name,
                            "tool": called,
                            "arguments": arguments
                        },
                        "isError": false
                    }
                }))
            }
            m if m.starts_with("notifications/") => ResponseTemplate::new(202),
            _ => ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {}
            })),
        }
    }
}

/// Start a wiremock server speaking streamable HTTP at [`MCP_PATH`].
pub async fn start_mcp_server(
    server_name: &'static str,
    tools: &'static [(&'static str, &'static str)],
) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MCP_PATH))
        .respond_with(mock_mcp_handler(server_name, tools))
        .mount(&server)
        .await;
    // No standalone event stream.
    Mock::given(method("GET"))
        .and(path(MCP_PATH))
        .respond_with(ResponseTemplate::new(405))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(MCP_PATH))
        .respond_with(ResponseTemplate::new(405))
        .mount(&server)
        .await;
    server
}

pub fn mcp_url(server: &MockServer) -> String {
    format!("{}{MCP_PATH}", server.uri())
}

/// JSON-RPC bodies posted to the server.
pub async fn posted_requests(server: &MockServer) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.method == wiremock::http::Method::POST)
        .collect()
}

pub fn request_methods(requests: &[Request]) -> HashSet<String> {
    requests
        .iter()
        .filter_map(|request| {
            request
                .body_json::<Value>()
                .ok()
                .and_then(|body| body.get("method").and_then(Value::as_str).map(str::to_string))
        })
        .collect()
}

pub fn request_headers_match(requests: &[Request], header: &str, expected: &str) -> bool {
    !requests.is_empty()
        && requests.iter().all(|request| {
            request
                .headers
                .get(header)
                .and_then(|value| value.to_str().ok())
                == Some(expected)
        })
}

mod common;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mcp_bridge::adapter::{AgentToolAdapter, PassthroughAdapter, TypedToolAdapter};
use mcp_bridge::auth::{AuthProvider, BearerAuthProvider, HeaderFnProvider};
use mcp_bridge::config::BridgeConfig;
use mcp_bridge::error::BridgeError;
use mcp_bridge::mcp::{
    AggregateOptions, BridgeState, HttpServer, McpToolset, ServerDescriptor, SessionBridge,
    StdioServer, TransportKind,
};
use mcp_bridge::tools::{Tool, ToolArguments, ToolExecutionContext};
use pretty_assertions::assert_eq;
use serde_json::json;

use common::{
    mcp_url, posted_requests, request_headers_match, request_methods, start_mcp_server,
};

fn http(name: &str, url: String) -> ServerDescriptor {
    HttpServer::builder()
        .name(name)
        .url(url)
        .transport(TransportKind::StreamableHttp)
        .build()
        .into()
}

fn broken_stdio() -> ServerDescriptor {
    StdioServer::builder()
        .name("broken")
        .command("sh")
        .args(vec!["-c".into(), "exit 1".into()])
        .build()
        .into()
}

#[tokio::test(flavor = "multi_thread")]
async fn sync_bridge_lists_and_calls_tools_over_http() {
    let server = start_mcp_server("alpha", &[("search", "Alpha search"), ("ping", "Alpha ping")]).await;
    let descriptor = http("alpha", mcp_url(&server));

    let (names, result) = tokio::task::spawn_blocking(move || {
        let mut bridge = SessionBridge::new(descriptor, BridgeConfig::default());
        bridge.start().expect("bridge should start");
        assert_eq!(bridge.state(), BridgeState::Ready);

        let names: Vec<String> = bridge
            .tools()
            .expect("tools are cached after start")
            .iter()
            .map(|tool| tool.name.clone())
            .collect();
        let result = bridge
            .call("search", json!({ "query": "rust" }))
            .expect("call should succeed");
        bridge.close();
        assert_eq!(bridge.state(), BridgeState::Closed);
        (names, result)
    })
    .await
    .expect("blocking task should not panic");

    assert_eq!(names, ["search", "ping"]);
    assert_eq!(result.content[0].as_text(), Some("alpha:search"));
    assert_eq!(
        result.structured_content,
        Some(json!({ "server": "alpha", "tool": "search", "arguments": { "query": "rust" } }))
    );

    let methods = request_methods(&posted_requests(&server).await);
    assert!(methods.contains("initialize"));
    assert!(methods.contains("tools/list"));
    assert!(methods.contains("tools/call"));
}

#[tokio::test(flavor = "multi_thread")]
async fn http_requests_carry_static_and_auth_headers() {
    let server = start_mcp_server("alpha", &[("search", "Alpha search")]).await;
    let mut headers = BTreeMap::new();
    headers.insert("x-mcp-scope".to_string(), "qa".to_string());
    let descriptor: ServerDescriptor = HttpServer::builder()
        .name("alpha")
        .url(mcp_url(&server))
        .transport(TransportKind::StreamableHttp)
        .headers(headers)
        .auth(Arc::new(BearerAuthProvider::new("secret-token")) as Arc<dyn AuthProvider>)
        .build()
        .into();

    let mut toolset =
        McpToolset::connect_async(vec![descriptor], &PassthroughAdapter, AggregateOptions::default())
            .await
            .expect("server should connect");
    toolset.tools()[0]
        .call_async(json!({}))
        .await
        .expect("call should succeed");
    toolset.close_async().await;

    let requests = posted_requests(&server).await;
    assert!(request_headers_match(&requests, "authorization", "Bearer secret-token"));
    assert!(request_headers_match(&requests, "x-mcp-scope", "qa"));
}

#[tokio::test(flavor = "multi_thread")]
async fn header_supplier_is_queried_for_every_request() {
    let server = start_mcp_server("alpha", &[("search", "Alpha search")]).await;
    let queried = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&queried);
    let provider = HeaderFnProvider::new(move || {
        let mut count = counter.lock().unwrap();
        *count += 1;
        [("x-api-key".to_string(), format!("token-{count}"))].into_iter().collect()
    });
    let descriptor: ServerDescriptor = HttpServer::builder()
        .url(mcp_url(&server))
        .transport(TransportKind::StreamableHttp)
        .auth(Arc::new(provider) as Arc<dyn AuthProvider>)
        .build()
        .into();

    let mut toolset =
        McpToolset::connect_async(vec![descriptor], &PassthroughAdapter, AggregateOptions::default())
            .await
            .expect("server should connect");
    for _ in 0..2 {
        toolset.tools()[0]
            .call_async(json!({}))
            .await
            .expect("call should succeed");
    }
    toolset.close_async().await;

    let received = server.received_requests().await.unwrap_or_default();
    let tokens: std::collections::HashSet<String> = received
        .iter()
        .filter_map(|request| request.headers.get("x-api-key"))
        .filter_map(|value| value.to_str().ok().map(str::to_string))
        .collect();

    assert!(received.len() >= 5, "initialize, initialized, list and two calls");
    assert_eq!(*queried.lock().unwrap(), received.len());
    assert_eq!(tokens.len(), received.len(), "every request carries a fresh token");
}

#[tokio::test(flavor = "multi_thread")]
async fn aggregator_collects_failures_and_routes_calls() {
    let alpha = start_mcp_server("alpha", &[("search", "Alpha search"), ("ping", "Alpha ping")]).await;
    let beta = start_mcp_server("beta", &[("search", "Beta search"), ("status", "Beta status")]).await;
    let descriptors = vec![
        http("alpha", mcp_url(&alpha)),
        broken_stdio(),
        http("beta", mcp_url(&beta)),
    ];
    let failures = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&failures);
    let options = AggregateOptions::new()
        .fail_fast(false)
        .on_connection_error(move |descriptor, _| sink.lock().unwrap().push(descriptor.label()))
        .with_bridge_config(BridgeConfig::default().with_handshake_timeout(Some(Duration::from_secs(10))));

    let (names, failed, beta_search) = tokio::task::spawn_blocking(move || {
        let mut toolset = McpToolset::connect(descriptors, &PassthroughAdapter, options)
            .expect("collect mode tolerates the broken server");
        let names: Vec<String> = toolset.tools().iter().map(|t| t.name().to_string()).collect();
        let failed: Vec<String> = toolset
            .failed_connections()
            .iter()
            .map(|f| f.descriptor.label())
            .collect();
        let beta_search = toolset.tools()[2]
            .call(json!({ "query": "status" }))
            .expect("beta search should succeed");
        toolset.close();
        (names, failed, beta_search)
    })
    .await
    .expect("blocking task should not panic");

    assert_eq!(names, ["search", "ping", "search", "status"]);
    assert_eq!(failed, ["broken"]);
    assert_eq!(*failures.lock().unwrap(), ["broken"]);
    assert_eq!(beta_search.structured_content.as_ref().map(|v| v["server"].clone()), Some(json!("beta")));
}

#[tokio::test(flavor = "multi_thread")]
async fn fail_fast_propagates_the_first_connection_error() {
    let alpha = start_mcp_server("alpha", &[("search", "Alpha search")]).await;
    let descriptors = vec![http("alpha", mcp_url(&alpha)), broken_stdio()];

    let err = tokio::task::spawn_blocking(move || {
        McpToolset::connect(descriptors, &PassthroughAdapter, AggregateOptions::default())
            .map(|_| ())
            .expect_err("the broken server aborts aggregation")
    })
    .await
    .expect("blocking task should not panic");

    assert!(matches!(err, BridgeError::Connection { server, .. } if server == "broken"));
}

#[tokio::test(flavor = "multi_thread")]
async fn agent_tools_return_structured_json_in_async_mode() {
    let server = start_mcp_server("alpha", &[("web-search", "Search the web")]).await;

    let mut toolset = McpToolset::connect_async(
        vec![http("alpha", mcp_url(&server))],
        &AgentToolAdapter::new(),
        AggregateOptions::default(),
    )
    .await
    .expect("server should connect");

    let tool = &toolset.tools()[0];
    assert_eq!(tool.name(), "web_search");
    // No output schema: structured mode falls back to the text item.
    let output = tool
        .execute(&ToolArguments::new(json!({ "query": "mcp" })), &ToolExecutionContext::default())
        .await
        .expect("tool should execute");
    assert_eq!(output, json!("alpha:web-search"));

    toolset.close_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn typed_tools_validate_before_calling() {
    let server = start_mcp_server("alpha", &[("search", "Alpha search")]).await;
    let descriptor = http("alpha", mcp_url(&server));

    let (ok, rejected) = tokio::task::spawn_blocking(move || {
        let mut toolset =
            McpToolset::connect(vec![descriptor], &TypedToolAdapter::new(), AggregateOptions::default())
                .expect("server should connect");
        let tool = &toolset.tools()[0];
        let ok = tool.run(json!({ "query": "rust" }));
        let rejected = tool.run(json!({ "query": 42 }));
        toolset.close();
        (ok, rejected)
    })
    .await
    .expect("blocking task should not panic");

    assert_eq!(ok.expect("valid call"), "alpha:search");
    assert!(matches!(rejected, Err(BridgeError::InvalidArgument(_))));
    let calls = posted_requests(&server)
        .await
        .iter()
        .filter(|r| r.body_json::<serde_json::Value>().map(|b| b["method"] == "tools/call").unwrap_or(false))
        .count();
    assert_eq!(calls, 1);
}

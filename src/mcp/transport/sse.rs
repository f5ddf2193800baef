use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::Url;
use rmcp::model::{ClientInfo, ClientJsonRpcMessage, ServerJsonRpcMessage};
use rmcp::service::{ClientInitializeError, RoleClient, ServiceExt};
use rmcp::transport::streamable_http_client::SseError;
use rmcp::transport::Transport as RmcpTransport;
use sse_stream::{Sse, SseStream};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{McpRunningService, McpTransport};
use crate::auth::{build_header_map, AuthProvider};
use crate::error::BridgeError;
use crate::mcp::descriptor::HttpServer;

/// Legacy HTTP+SSE transport.
///
/// The server pushes messages on a long-lived GET event stream and announces
/// a POST endpoint in its first `endpoint` event. Auth headers are queried
/// again for every POST.
#[derive(Debug, Clone)]
pub struct SseTransport {
    url: String,
    headers: BTreeMap<String, String>,
    auth: Option<Arc<dyn AuthProvider>>,
    client: reqwest::Client,
}

impl SseTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
            auth: None,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_server(server: &HttpServer) -> Self {
        Self {
            url: server.url.clone(),
            headers: server.headers.clone(),
            auth: server.auth.clone(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl McpTransport for SseTransport {
    async fn connect(
        &mut self,
        client_info: ClientInfo,
    ) -> Result<McpRunningService, ClientInitializeError> {
        let channel = SseChannel::open(
            self.client.clone(),
            &self.url,
            self.headers.clone(),
            self.auth.clone(),
        )
        .await
        .map_err(|error| {
            ClientInitializeError::transport::<SseChannel>(error, "open sse event stream")
        })?;
        client_info.into_dyn().serve(channel).await
    }
}

/// One open event stream plus the endpoint outbound messages are posted to.
pub(crate) struct SseChannel {
    client: reqwest::Client,
    endpoint: Url,
    headers: BTreeMap<String, String>,
    auth: Option<Arc<dyn AuthProvider>>,
    inbound: UnboundedReceiver<ServerJsonRpcMessage>,
    reader: JoinHandle<()>,
}

impl SseChannel {
    async fn open(
        client: reqwest::Client,
        url: &str,
        headers: BTreeMap<String, String>,
        auth: Option<Arc<dyn AuthProvider>>,
    ) -> Result<Self, BridgeError> {
        let base = Url::parse(url)
            .map_err(|e| BridgeError::Configuration(format!("invalid server url '{url}': {e}")))?;
        let response = client
            .get(base.clone())
            .headers(build_header_map(&headers, auth.as_deref())?)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::connection(
                url,
                format!("event stream request returned {status}"),
            ));
        }

        let mut events =
            SseEventStream::new(SseStream::from_bytes_stream(response.bytes_stream()).boxed());

        let endpoint = loop {
            match events.next_event().await {
                Some(Ok((event, data))) if event == "endpoint" => {
                    break resolve_endpoint(&base, &data)?;
                }
                Some(Ok((event, _))) => debug!(%event, "ignoring sse event before endpoint"),
                Some(Err(error)) => return Err(error),
                None => {
                    return Err(BridgeError::connection(
                        url,
                        "event stream ended before announcing an endpoint",
                    ))
                }
            }
        };
        debug!(%endpoint, "sse message endpoint announced");

        let (tx, inbound) = unbounded_channel();
        let reader = tokio::spawn(async move {
            while let Some(event) = events.next_event().await {
                match event {
                    Ok((event, data)) if event == "message" => {
                        match serde_json::from_str::<ServerJsonRpcMessage>(&data) {
                            Ok(message) => {
                                if tx.send(message).is_err() {
                                    break;
                                }
                            }
                            Err(error) => warn!(%error, "dropping malformed sse message"),
                        }
                    }
                    Ok(_) => {}
                    Err(error) => {
                        warn!(%error, "sse event stream failed");
                        break;
                    }
                }
            }
        });

        Ok(Self {
            client,
            endpoint,
            headers,
            auth,
            inbound,
            reader,
        })
    }
}

impl RmcpTransport<RoleClient> for SseChannel {
    type Error = BridgeError;

    fn send(
        &mut self,
        item: ClientJsonRpcMessage,
    ) -> impl std::future::Future<Output = Result<(), Self::Error>> + Send + 'static {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        let headers = self.headers.clone();
        let auth = self.auth.clone();
        async move {
            let header_map = build_header_map(&headers, auth.as_deref())?;
            let response = client
                .post(endpoint)
                .headers(header_map)
                .json(&item)
                .send()
                .await?;
            let status = response.status();
            if !status.is_success() {
                return Err(BridgeError::Session(format!(
                    "message endpoint returned {status}"
                )));
            }
            Ok(())
        }
    }

    async fn receive(&mut self) -> Option<ServerJsonRpcMessage> {
        self.inbound.recv().await
    }

    fn close(&mut self) -> impl std::future::Future<Output = Result<(), Self::Error>> + Send {
        self.reader.abort();
        self.inbound.close();
        std::future::ready(Ok(()))
    }
}

impl Drop for SseChannel {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

fn resolve_endpoint(base: &Url, data: &str) -> Result<Url, BridgeError> {
    base.join(data.trim()).map_err(|e| {
        BridgeError::connection(base.as_str(), format!("invalid endpoint '{data}': {e}"))
    })
}

struct SseEventStream {
    events: BoxStream<'static, Result<Sse, SseError>>,
}

impl SseEventStream {
    fn new(events: BoxStream<'static, Result<Sse, SseError>>) -> Self {
        Self { events }
    }

    /// Next event with data. Events without a name are `message` events.
    async fn next_event(&mut self) -> Option<Result<(String, String), BridgeError>> {
        loop {
            match self.events.next().await? {
                Ok(Sse { data: None, .. }) => continue,
                Ok(Sse { event, data: Some(data), .. }) => {
                    return Some(Ok((event.unwrap_or_else(|| "message".into()), data)))
                }
                Err(error) => {
                    return Some(Err(BridgeError::Session(format!("sse stream error: {error}"))))
                }
            }
        }
    }
}

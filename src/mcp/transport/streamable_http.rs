use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::header::{HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, WWW_AUTHENTICATE};
use reqwest::{RequestBuilder, StatusCode};
use rmcp::model::{ClientInfo, ClientJsonRpcMessage, ServerJsonRpcMessage};
use rmcp::service::{ClientInitializeError, ServiceExt};
use rmcp::transport::common::http_header::{
    EVENT_STREAM_MIME_TYPE, HEADER_LAST_EVENT_ID, HEADER_SESSION_ID, JSON_MIME_TYPE,
};
use rmcp::transport::streamable_http_client::{
    AuthRequiredError, SseError, StreamableHttpClient, StreamableHttpClientTransportConfig,
    StreamableHttpError, StreamableHttpPostResponse,
};
use rmcp::transport::StreamableHttpClientTransport;
use sse_stream::{Sse, SseStream};
use tracing::debug;

use super::{McpRunningService, McpTransport};
use crate::auth::{build_header_map, AuthProvider};
use crate::error::BridgeError;
use crate::mcp::descriptor::HttpServer;

type HttpError = StreamableHttpError<reqwest::Error>;

/// Streamable HTTP transport.
///
/// Static and auth headers are rebuilt for every outbound request, so a
/// rotating [`AuthProvider`] is seen by the server immediately.
#[derive(Debug, Clone)]
pub struct StreamableHttpTransport {
    url: String,
    client: HeaderedClient,
}

impl StreamableHttpTransport {
    pub fn new(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client: HeaderedClient {
                client,
                headers: BTreeMap::new(),
                auth: None,
            },
        }
    }

    pub fn from_server(server: &HttpServer) -> Result<Self, BridgeError> {
        // Surface malformed static headers before any connection attempt.
        build_header_map(&server.headers, None)?;
        Ok(Self {
            url: server.url.clone(),
            client: HeaderedClient {
                client: reqwest::Client::builder().build()?,
                headers: server.headers.clone(),
                auth: server.auth.clone(),
            },
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl McpTransport for StreamableHttpTransport {
    async fn connect(
        &mut self,
        client_info: ClientInfo,
    ) -> Result<McpRunningService, ClientInitializeError> {
        let transport = StreamableHttpClientTransport::with_client(
            self.client.clone(),
            StreamableHttpClientTransportConfig::with_uri(self.url.clone()),
        );
        client_info.into_dyn().serve(transport).await
    }
}

/// reqwest client that queries the auth supplier once per request.
#[derive(Debug, Clone)]
pub(crate) struct HeaderedClient {
    client: reqwest::Client,
    headers: BTreeMap<String, String>,
    auth: Option<Arc<dyn AuthProvider>>,
}

impl HeaderedClient {
    fn prepare(
        &self,
        request: RequestBuilder,
        bearer: Option<String>,
    ) -> Result<RequestBuilder, HttpError> {
        let headers = build_header_map(&self.headers, self.auth.as_deref()).map_err(|error| {
            StreamableHttpError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                error.to_string(),
            ))
        })?;
        let request = request.headers(headers);
        Ok(match bearer {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }
}

fn is_reserved(name: &HeaderName) -> bool {
    [
        ACCEPT.as_str(),
        HEADER_SESSION_ID,
        HEADER_LAST_EVENT_ID,
        "mcp-protocol-version",
    ]
    .iter()
    .any(|reserved| name.as_str().eq_ignore_ascii_case(reserved))
}

fn content_type_matches(value: Option<&HeaderValue>, mime: &str) -> bool {
    value.is_some_and(|ct| ct.as_bytes().starts_with(mime.as_bytes()))
}

impl StreamableHttpClient for HeaderedClient {
    type Error = reqwest::Error;

    async fn post_message(
        &self,
        uri: Arc<str>,
        message: ClientJsonRpcMessage,
        session_id: Option<Arc<str>>,
        auth_header: Option<String>,
        custom_headers: HashMap<HeaderName, HeaderValue>,
    ) -> Result<StreamableHttpPostResponse, HttpError> {
        let mut request = self.prepare(self.client.post(uri.as_ref()), auth_header)?;
        for (name, value) in custom_headers {
            if is_reserved(&name) {
                return Err(StreamableHttpError::ReservedHeaderConflict(name.to_string()));
            }
            request = request.header(name, value);
        }
        request = request.header(ACCEPT, format!("{EVENT_STREAM_MIME_TYPE}, {JSON_MIME_TYPE}"));
        if let Some(session_id) = session_id {
            request = request.header(HEADER_SESSION_ID, session_id.as_ref());
        }

        let response = request
            .json(&message)
            .send()
            .await
            .map_err(StreamableHttpError::Client)?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            if let Some(header) = response.headers().get(WWW_AUTHENTICATE) {
                let www_authenticate_header = header
                    .to_str()
                    .map_err(|_| {
                        StreamableHttpError::UnexpectedServerResponse(Cow::from(
                            "invalid www-authenticate header value",
                        ))
                    })?
                    .to_string();
                return Err(StreamableHttpError::AuthRequired(AuthRequiredError {
                    www_authenticate_header,
                }));
            }
        }
        if matches!(status, StatusCode::ACCEPTED | StatusCode::NO_CONTENT) {
            return Ok(StreamableHttpPostResponse::Accepted);
        }

        let session_id = response
            .headers()
            .get(HEADER_SESSION_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let content_type = response.headers().get(CONTENT_TYPE).cloned();
        if content_type_matches(content_type.as_ref(), EVENT_STREAM_MIME_TYPE) {
            let events = SseStream::from_bytes_stream(response.bytes_stream()).boxed();
            Ok(StreamableHttpPostResponse::Sse(events, session_id))
        } else if content_type_matches(content_type.as_ref(), JSON_MIME_TYPE) {
            let message: ServerJsonRpcMessage =
                response.json().await.map_err(StreamableHttpError::Client)?;
            Ok(StreamableHttpPostResponse::Json(message, session_id))
        } else {
            Err(StreamableHttpError::UnexpectedContentType(content_type.map(
                |ct| String::from_utf8_lossy(ct.as_bytes()).into_owned(),
            )))
        }
    }

    async fn delete_session(
        &self,
        uri: Arc<str>,
        session_id: Arc<str>,
        auth_header: Option<String>,
    ) -> Result<(), HttpError> {
        let response = self
            .prepare(self.client.delete(uri.as_ref()), auth_header)?
            .header(HEADER_SESSION_ID, session_id.as_ref())
            .send()
            .await
            .map_err(StreamableHttpError::Client)?;
        if response.status() == StatusCode::METHOD_NOT_ALLOWED {
            debug!("server does not support deleting sessions");
            return Ok(());
        }
        response
            .error_for_status()
            .map_err(StreamableHttpError::Client)?;
        Ok(())
    }

    async fn get_stream(
        &self,
        uri: Arc<str>,
        session_id: Arc<str>,
        last_event_id: Option<String>,
        auth_header: Option<String>,
    ) -> Result<BoxStream<'static, Result<Sse, SseError>>, HttpError> {
        let mut request = self
            .prepare(self.client.get(uri.as_ref()), auth_header)?
            .header(ACCEPT, format!("{EVENT_STREAM_MIME_TYPE}, {JSON_MIME_TYPE}"))
            .header(HEADER_SESSION_ID, session_id.as_ref());
        if let Some(last_event_id) = last_event_id {
            request = request.header(HEADER_LAST_EVENT_ID, last_event_id);
        }
        let response = request.send().await.map_err(StreamableHttpError::Client)?;
        if response.status() == StatusCode::METHOD_NOT_ALLOWED {
            return Err(StreamableHttpError::ServerDoesNotSupportSse);
        }
        let response = response
            .error_for_status()
            .map_err(StreamableHttpError::Client)?;
        let content_type = response.headers().get(CONTENT_TYPE);
        if !content_type_matches(content_type, EVENT_STREAM_MIME_TYPE)
            && !content_type_matches(content_type, JSON_MIME_TYPE)
        {
            return Err(StreamableHttpError::UnexpectedContentType(
                content_type.map(|ct| String::from_utf8_lossy(ct.as_bytes()).into_owned()),
            ));
        }
        Ok(SseStream::from_bytes_stream(response.bytes_stream()).boxed())
    }
}

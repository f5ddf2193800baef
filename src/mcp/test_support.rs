//! In-process sessions for bridge and aggregation tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;

use super::descriptor::ServerDescriptor;
use super::session::{Connector, SessionOps};
use super::types::{RemoteTool, ToolResult};
use crate::error::BridgeError;

pub(crate) fn tool(name: &str) -> RemoteTool {
    RemoteTool::new(
        name,
        json!({
            "type": "object",
            "properties": { "text": { "type": "string" } }
        }),
    )
    .with_description(format!("{name} tool"))
}

#[derive(Clone)]
pub(crate) enum MockBehavior {
    Ready(Vec<RemoteTool>),
    FailConnect(String),
    FailListTools(String),
    /// Connect never completes.
    Hang,
    /// Ready, but each call takes the given time.
    Slow(Duration, Vec<RemoteTool>),
    /// Connect waits for the notify before succeeding.
    Gated(Arc<Notify>, Vec<RemoteTool>),
    /// Connect succeeds after the given delay.
    Delayed(Duration, Vec<RemoteTool>),
    /// Connect fails after the given delay.
    FailAfter(Duration, String),
}

#[derive(Default)]
struct Stats {
    connects: AtomicUsize,
    closes: Mutex<HashMap<String, usize>>,
    calls: Mutex<Vec<(String, String, Value)>>,
}

#[derive(Clone, Default)]
pub(crate) struct MockConnector {
    behaviors: Arc<Mutex<HashMap<String, MockBehavior>>>,
    stats: Arc<Stats>,
}

impl MockConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with(self, label: &str, behavior: MockBehavior) -> Self {
        self.behaviors
            .lock()
            .unwrap()
            .insert(label.to_string(), behavior);
        self
    }

    pub(crate) fn connect_count(&self) -> usize {
        self.stats.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn close_count(&self, label: &str) -> usize {
        self.stats
            .closes
            .lock()
            .unwrap()
            .get(label)
            .copied()
            .unwrap_or(0)
    }

    /// `(server, tool, arguments)` for every call received.
    pub(crate) fn calls(&self) -> Vec<(String, String, Value)> {
        self.stats.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, descriptor: &ServerDescriptor) -> Result<Arc<dyn SessionOps>, BridgeError> {
        let label = descriptor.label();
        self.stats.connects.fetch_add(1, Ordering::SeqCst);
        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .get(&label)
            .cloned()
            .unwrap_or(MockBehavior::Ready(Vec::new()));

        let (tools, list_error, call_delay) = match behavior {
            MockBehavior::Ready(tools) => (tools, None, None),
            MockBehavior::FailConnect(message) => {
                return Err(BridgeError::connection(&label, message));
            }
            MockBehavior::FailListTools(message) => (Vec::new(), Some(message), None),
            MockBehavior::Hang => {
                std::future::pending::<()>().await;
                unreachable!("pending never resolves")
            }
            MockBehavior::Slow(delay, tools) => (tools, None, Some(delay)),
            MockBehavior::Gated(gate, tools) => {
                gate.notified().await;
                (tools, None, None)
            }
            MockBehavior::Delayed(delay, tools) => {
                tokio::time::sleep(delay).await;
                (tools, None, None)
            }
            MockBehavior::FailAfter(delay, message) => {
                tokio::time::sleep(delay).await;
                return Err(BridgeError::connection(&label, message));
            }
        };

        Ok(Arc::new(MockSession {
            label,
            tools,
            list_error,
            call_delay,
            stats: Arc::clone(&self.stats),
            closed: std::sync::atomic::AtomicBool::new(false),
        }))
    }
}

struct MockSession {
    label: String,
    tools: Vec<RemoteTool>,
    list_error: Option<String>,
    call_delay: Option<Duration>,
    stats: Arc<Stats>,
    closed: std::sync::atomic::AtomicBool,
}

#[async_trait]
impl SessionOps for MockSession {
    async fn list_tools(&self) -> Result<Vec<RemoteTool>, BridgeError> {
        match &self.list_error {
            Some(message) => Err(BridgeError::Session(message.clone())),
            None => Ok(self.tools.clone()),
        }
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult, BridgeError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BridgeError::Closed);
        }
        if let Some(delay) = self.call_delay {
            tokio::time::sleep(delay).await;
        }
        self.stats
            .calls
            .lock()
            .unwrap()
            .push((self.label.clone(), name.to_string(), arguments.clone()));
        Ok(ToolResult::text(format!("{}:{name}", self.label)).with_structured(json!({
            "server": self.label,
            "tool": name,
            "arguments": arguments,
        })))
    }

    async fn close(&self) -> Result<(), BridgeError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            *self
                .stats
                .closes
                .lock()
                .unwrap()
                .entry(self.label.clone())
                .or_default() += 1;
        }
        Ok(())
    }
}

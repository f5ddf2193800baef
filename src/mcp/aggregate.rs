//! Multi-server aggregation.
//!
//! [`McpToolset`] opens one [`SessionBridge`] per descriptor concurrently,
//! applies the fail-fast or collect-errors policy, and adapts the union of
//! every server's tools.

use std::sync::mpsc as std_mpsc;
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{info, warn};

use super::bridge::SessionBridge;
use super::descriptor::ServerDescriptor;
use super::session::{Connector, TransportConnector};
use super::types::RemoteTool;
use crate::adapter::ToolAdapter;
use crate::config::BridgeConfig;
use crate::error::BridgeError;

/// Observer called once per failed server when errors are collected.
pub type ConnectionErrorHook = Arc<dyn Fn(&ServerDescriptor, &BridgeError) + Send + Sync>;

#[derive(Clone)]
pub struct AggregateOptions {
    /// Abort on the first failure. Defaults to `true`.
    pub fail_fast: bool,
    pub on_connection_error: Option<ConnectionErrorHook>,
    pub bridge: BridgeConfig,
    pub connector: Arc<dyn Connector>,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            fail_fast: true,
            on_connection_error: None,
            bridge: BridgeConfig::default(),
            connector: Arc::new(TransportConnector),
        }
    }
}

impl AggregateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn on_connection_error(
        mut self,
        hook: impl Fn(&ServerDescriptor, &BridgeError) + Send + Sync + 'static,
    ) -> Self {
        self.on_connection_error = Some(Arc::new(hook));
        self
    }

    pub fn with_bridge_config(mut self, config: BridgeConfig) -> Self {
        self.bridge = config;
        self
    }

    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }
}

impl std::fmt::Debug for AggregateOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateOptions")
            .field("fail_fast", &self.fail_fast)
            .field("on_connection_error", &self.on_connection_error.is_some())
            .field("bridge", &self.bridge)
            .finish()
    }
}

/// A server that could not be connected.
#[derive(Debug)]
pub struct FailedConnection {
    pub descriptor: ServerDescriptor,
    pub error: BridgeError,
}

/// Result of opening one descriptor.
#[derive(Debug)]
pub enum ConnectionOutcome {
    Success {
        bridge: SessionBridge,
        tools: Vec<RemoteTool>,
    },
    Failure(FailedConnection),
}

#[derive(Clone, Copy)]
enum Forwarding {
    Blocking,
    Async,
}

/// Adapted tools from several servers plus the sessions backing them.
///
/// Dropping the toolset closes every session.
pub struct McpToolset<T> {
    bridges: Vec<SessionBridge>,
    tools: Vec<T>,
    failed: Vec<FailedConnection>,
}

impl<T: Send> McpToolset<T> {
    /// Connect to every descriptor on background session threads.
    ///
    /// Blocks until all handshakes finish, or until the first failure when
    /// `fail_fast` is set.
    pub fn connect<A>(
        descriptors: Vec<ServerDescriptor>,
        adapter: &A,
        options: AggregateOptions,
    ) -> Result<Self, BridgeError>
    where
        A: ToolAdapter<Tool = T> + ?Sized,
    {
        let mut bridges: Vec<SessionBridge> = descriptors
            .into_iter()
            .map(|descriptor| {
                SessionBridge::new(descriptor, options.bridge)
                    .with_connector(Arc::clone(&options.connector))
            })
            .collect();
        let mut results: Vec<Option<Result<(), BridgeError>>> =
            bridges.iter().map(|_| None).collect();

        let (ready_tx, ready_rx) = std_mpsc::channel();
        let mut pending = 0usize;
        for index in 0..bridges.len() {
            let ready_tx = ready_tx.clone();
            let launched = bridges[index].launch(Box::new(move |outcome| {
                let _ = ready_tx.send((index, outcome));
            }));
            match launched {
                Ok(()) => pending += 1,
                Err(error) if options.fail_fast => {
                    close_all(&mut bridges);
                    return Err(error);
                }
                Err(error) => results[index] = Some(Err(error)),
            }
        }
        drop(ready_tx);

        while pending > 0 {
            let Ok((index, outcome)) = ready_rx.recv() else {
                break;
            };
            pending -= 1;
            let result = bridges[index].complete_start(outcome);
            if let Err(error) = result {
                if options.fail_fast {
                    close_all(&mut bridges);
                    return Err(error);
                }
                results[index] = Some(Err(error));
            } else {
                results[index] = Some(Ok(()));
            }
        }

        let mut outcomes = Vec::with_capacity(bridges.len());
        for (mut bridge, result) in bridges.into_iter().zip(results) {
            let result = result.unwrap_or_else(|| {
                bridge.complete_start(Err(BridgeError::Session(
                    "session worker exited before signaling readiness".into(),
                )))
            });
            // Bridges not yet collected close when dropped.
            let result = match result {
                Err(error) if options.fail_fast => return Err(error),
                other => other,
            };
            outcomes.push(into_outcome(bridge, result));
        }

        let Assembled {
            mut toolset,
            mut rejected,
            fatal,
        } = Self::assemble(outcomes, adapter, &options, Forwarding::Blocking);
        close_all(&mut rejected);
        match fatal {
            Some(error) => {
                toolset.close();
                Err(error)
            }
            None => Ok(toolset),
        }
    }

    /// Connect to every descriptor on the current runtime.
    ///
    /// Tear the toolset down with [`Self::close_async`]; dropping it only
    /// schedules each close on the runtime.
    pub async fn connect_async<A>(
        descriptors: Vec<ServerDescriptor>,
        adapter: &A,
        options: AggregateOptions,
    ) -> Result<Self, BridgeError>
    where
        A: ToolAdapter<Tool = T> + ?Sized,
    {
        let count = descriptors.len();
        let mut pending: FuturesUnordered<_> = descriptors
            .into_iter()
            .enumerate()
            .map(|(index, descriptor)| {
                let mut bridge = SessionBridge::new(descriptor, options.bridge)
                    .with_connector(Arc::clone(&options.connector));
                async move {
                    let result = bridge.start_async().await;
                    (index, bridge, result)
                }
            })
            .collect();

        let mut slots: Vec<Option<ConnectionOutcome>> = (0..count).map(|_| None).collect();
        while let Some((index, bridge, result)) = pending.next().await {
            let result = match result {
                Err(error) if options.fail_fast => {
                    // Handshakes still in flight are cancelled by dropping them.
                    drop(pending);
                    for slot in slots.iter_mut() {
                        if let Some(ConnectionOutcome::Success { bridge, .. }) = slot {
                            bridge.close_async().await;
                        }
                    }
                    return Err(error);
                }
                other => other,
            };
            slots[index] = Some(into_outcome(bridge, result));
        }

        let outcomes = slots.into_iter().flatten().collect();
        let Assembled {
            mut toolset,
            mut rejected,
            fatal,
        } = Self::assemble(outcomes, adapter, &options, Forwarding::Async);
        futures::future::join_all(rejected.iter_mut().map(SessionBridge::close_async)).await;
        match fatal {
            Some(error) => {
                toolset.close_async().await;
                Err(error)
            }
            None => Ok(toolset),
        }
    }

    /// Adapt every connected server's tools.
    ///
    /// Under `fail_fast = false` a server whose tools cannot all be adapted is
    /// moved to `rejected` and reported like a failed connection. `NotSupported`
    /// means the adapter cannot serve this forwarding mode at all and is fatal
    /// regardless of the policy.
    fn assemble<A>(
        outcomes: Vec<ConnectionOutcome>,
        adapter: &A,
        options: &AggregateOptions,
        forwarding: Forwarding,
    ) -> Assembled<T>
    where
        A: ToolAdapter<Tool = T> + ?Sized,
    {
        let mut assembled = Assembled {
            toolset: McpToolset {
                bridges: Vec::new(),
                tools: Vec::new(),
                failed: Vec::new(),
            },
            rejected: Vec::new(),
            fatal: None,
        };
        let toolset = &mut assembled.toolset;

        for outcome in outcomes {
            if assembled.fatal.is_some() {
                // Keep the remaining sessions so the caller closes them.
                if let ConnectionOutcome::Success { bridge, .. } = outcome {
                    toolset.bridges.push(bridge);
                }
                continue;
            }
            let failed = match outcome {
                ConnectionOutcome::Success { bridge, tools } => {
                    match adapt_server(&bridge, &tools, adapter, forwarding) {
                        Ok(adapted) => {
                            toolset.tools.extend(adapted);
                            toolset.bridges.push(bridge);
                            continue;
                        }
                        Err(error)
                            if options.fail_fast
                                || matches!(error, BridgeError::NotSupported(_)) =>
                        {
                            toolset.bridges.push(bridge);
                            assembled.fatal = Some(error);
                            continue;
                        }
                        Err(error) => {
                            let failed = FailedConnection {
                                descriptor: bridge.descriptor().clone(),
                                error,
                            };
                            assembled.rejected.push(bridge);
                            failed
                        }
                    }
                }
                ConnectionOutcome::Failure(failed) => failed,
            };
            warn!(
                server = %failed.descriptor.label(),
                error = %failed.error,
                "skipping mcp server"
            );
            if let Some(hook) = &options.on_connection_error {
                hook(&failed.descriptor, &failed.error);
            }
            toolset.failed.push(failed);
        }

        if assembled.fatal.is_none() {
            info!(
                servers = toolset.bridges.len(),
                failed = toolset.failed.len(),
                tools = toolset.tools.len(),
                framework = adapter.framework(),
                "mcp toolset ready"
            );
        }
        assembled
    }
}

struct Assembled<T> {
    toolset: McpToolset<T>,
    /// Connected servers dropped from the toolset; still to be closed.
    rejected: Vec<SessionBridge>,
    fatal: Option<BridgeError>,
}

fn adapt_server<A>(
    bridge: &SessionBridge,
    tools: &[RemoteTool],
    adapter: &A,
    forwarding: Forwarding,
) -> Result<Vec<A::Tool>, BridgeError>
where
    A: ToolAdapter + ?Sized,
{
    tools
        .iter()
        .map(|tool| match forwarding {
            Forwarding::Blocking => adapter.adapt(bridge.caller(&tool.name)?, tool),
            Forwarding::Async => adapter.adapt_async(bridge.async_caller(&tool.name)?, tool),
        })
        .collect()
}

impl<T> McpToolset<T> {
    /// Adapted tools in descriptor order, then server order.
    pub fn tools(&self) -> &[T] {
        &self.tools
    }

    /// Move the adapted tools out; the sessions stay open until close.
    pub fn take_tools(&mut self) -> Vec<T> {
        std::mem::take(&mut self.tools)
    }

    /// Servers skipped under `fail_fast = false`, in descriptor order.
    pub fn failed_connections(&self) -> &[FailedConnection] {
        &self.failed
    }

    pub fn bridges(&self) -> &[SessionBridge] {
        &self.bridges
    }

    /// Close every session. Idempotent.
    pub fn close(&mut self) {
        close_all(&mut self.bridges);
    }

    pub async fn close_async(&mut self) {
        futures::future::join_all(self.bridges.iter_mut().map(|bridge| bridge.close_async())).await;
    }
}

impl<T> std::fmt::Debug for McpToolset<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpToolset")
            .field("bridges", &self.bridges)
            .field("tools", &self.tools.len())
            .field("failed", &self.failed)
            .finish()
    }
}

fn into_outcome(bridge: SessionBridge, result: Result<(), BridgeError>) -> ConnectionOutcome {
    let tools = result.and_then(|()| bridge.tools().map(<[_]>::to_vec));
    match tools {
        Ok(tools) => ConnectionOutcome::Success { bridge, tools },
        Err(error) => ConnectionOutcome::Failure(FailedConnection {
            descriptor: bridge.descriptor().clone(),
            error,
        }),
    }
}

fn close_all(bridges: &mut [SessionBridge]) {
    for bridge in bridges {
        bridge.close();
    }
}

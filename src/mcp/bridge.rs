//! Session lifecycle bridge.
//!
//! A [`SessionBridge`] owns exactly one MCP session. Started with
//! [`SessionBridge::start`], the session lives on a dedicated thread running
//! a current-thread tokio runtime and synchronous callers reach it through a
//! command queue. Started with [`SessionBridge::start_async`], the session is
//! driven directly by the caller's runtime.
//!
//! ```text
//! caller threads ── BridgeCommand::Call ──► worker thread (current-thread runtime)
//!        ▲                                        │ spawn per call
//!        └──────────── per-call reply ◄───────────┘ session.call_tool
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::descriptor::ServerDescriptor;
use super::session::{Connector, SessionOps, TransportConnector};
use super::types::{RemoteTool, ToolResult};
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::util::timeout::with_optional_timeout;

/// Blocking call-forwarding function bound to one tool on one session.
pub type ToolCaller = Arc<dyn Fn(Value) -> Result<ToolResult, BridgeError> + Send + Sync>;

/// Async call-forwarding function bound to one tool on one session.
pub type AsyncToolCaller =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<ToolResult, BridgeError>> + Send + Sync>;

/// Receives the handshake outcome exactly once, on the worker thread.
pub(crate) type ReadySignal = Box<dyn FnOnce(Result<Vec<RemoteTool>, BridgeError>) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Idle,
    Starting,
    Ready,
    Closing,
    Closed,
    Failed,
}

enum BridgeCommand {
    Call {
        name: String,
        arguments: Value,
        reply: std_mpsc::SyncSender<Result<ToolResult, BridgeError>>,
    },
}

struct Worker {
    commands: UnboundedSender<BridgeCommand>,
    cancel: CancellationToken,
    finished: Mutex<std_mpsc::Receiver<()>>,
    thread: thread::JoinHandle<()>,
}

impl Worker {
    /// Cancel the background task and wait (bounded) for the thread to exit.
    fn shutdown(self, timeout: Duration, label: &str) {
        self.cancel.cancel();
        let finished = self
            .finished
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match finished.recv_timeout(timeout) {
            Ok(()) | Err(std_mpsc::RecvTimeoutError::Disconnected) => {
                if self.thread.join().is_err() {
                    warn!(server = %label, "mcp session worker panicked");
                }
            }
            Err(std_mpsc::RecvTimeoutError::Timeout) => {
                warn!(
                    server = %label,
                    timeout_ms = timeout.as_millis() as u64,
                    "mcp session worker did not stop in time; detaching"
                );
            }
        }
    }
}

struct DirectLink {
    session: Arc<dyn SessionOps>,
    closed: Arc<AtomicBool>,
}

enum Link {
    Threaded(Worker),
    Direct(DirectLink),
}

/// Owner of one MCP session and its lifecycle.
pub struct SessionBridge {
    descriptor: ServerDescriptor,
    label: String,
    config: BridgeConfig,
    connector: Arc<dyn Connector>,
    state: BridgeState,
    tools: Vec<RemoteTool>,
    link: Option<Link>,
}

impl SessionBridge {
    pub fn new(descriptor: ServerDescriptor, config: BridgeConfig) -> Self {
        Self {
            label: descriptor.label(),
            descriptor,
            config,
            connector: Arc::new(TransportConnector),
            state: BridgeState::Idle,
            tools: Vec::new(),
            link: None,
        }
    }

    /// Replace how sessions are opened (tests, custom transports).
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn descriptor(&self) -> &ServerDescriptor {
        &self.descriptor
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Start the background session and block until the handshake finishes.
    pub fn start(&mut self) -> Result<(), BridgeError> {
        let (tx, rx) = std_mpsc::channel();
        self.launch(Box::new(move |outcome| {
            let _ = tx.send(outcome);
        }))?;
        let outcome = rx.recv().unwrap_or_else(|_| {
            Err(BridgeError::Session(
                "session worker exited before signaling readiness".into(),
            ))
        });
        self.complete_start(outcome)
    }

    /// Spawn the worker without waiting; the outcome is passed to `on_ready`
    /// and must be handed back through [`Self::complete_start`].
    pub(crate) fn launch(&mut self, on_ready: ReadySignal) -> Result<(), BridgeError> {
        self.begin_start()?;

        let (commands_tx, commands_rx) = unbounded_channel();
        let (finished_tx, finished_rx) = std_mpsc::channel();
        let cancel = CancellationToken::new();
        let worker = WorkerContext {
            connector: Arc::clone(&self.connector),
            descriptor: self.descriptor.clone(),
            label: self.label.clone(),
            handshake_timeout: self.config.handshake_timeout,
            call_timeout: self.config.call_timeout,
            cancel: cancel.clone(),
            commands: commands_rx,
        };

        let spawned = thread::Builder::new()
            .name("mcp-session".into())
            .spawn(move || {
                worker.run(on_ready);
                let _ = finished_tx.send(());
            });

        match spawned {
            Ok(thread) => {
                self.link = Some(Link::Threaded(Worker {
                    commands: commands_tx,
                    cancel,
                    finished: Mutex::new(finished_rx),
                    thread,
                }));
                Ok(())
            }
            Err(error) => {
                self.state = BridgeState::Failed;
                Err(BridgeError::Io(error).into_connection(&self.label))
            }
        }
    }

    pub(crate) fn complete_start(
        &mut self,
        outcome: Result<Vec<RemoteTool>, BridgeError>,
    ) -> Result<(), BridgeError> {
        match outcome {
            Ok(tools) => {
                info!(server = %self.label, tools = tools.len(), "mcp session ready");
                self.tools = tools;
                self.state = BridgeState::Ready;
                Ok(())
            }
            Err(error) => {
                warn!(server = %self.label, %error, "mcp session failed to start");
                self.release_link();
                self.state = BridgeState::Failed;
                Err(error.into_connection(&self.label))
            }
        }
    }

    /// Run the handshake on the caller's runtime.
    ///
    /// A bridge started this way must be shut down with [`Self::close_async`].
    /// [`Self::close`] and drop can only schedule the close on the current
    /// runtime, and do nothing when there is none.
    pub async fn start_async(&mut self) -> Result<(), BridgeError> {
        self.begin_start()?;
        match handshake(
            self.connector.as_ref(),
            &self.descriptor,
            self.config.handshake_timeout,
        )
        .await
        {
            Ok((session, tools)) => {
                info!(server = %self.label, tools = tools.len(), "mcp session ready");
                self.link = Some(Link::Direct(DirectLink {
                    session,
                    closed: Arc::new(AtomicBool::new(false)),
                }));
                self.tools = tools;
                self.state = BridgeState::Ready;
                Ok(())
            }
            Err(error) => {
                warn!(server = %self.label, %error, "mcp session failed to start");
                self.state = BridgeState::Failed;
                Err(error.into_connection(&self.label))
            }
        }
    }

    fn begin_start(&mut self) -> Result<(), BridgeError> {
        if self.state != BridgeState::Idle {
            return Err(BridgeError::Session(format!(
                "session for {} cannot start from state {:?}",
                self.label, self.state
            )));
        }
        self.state = BridgeState::Starting;
        Ok(())
    }

    fn ensure_ready(&self) -> Result<(), BridgeError> {
        match self.state {
            BridgeState::Ready => Ok(()),
            BridgeState::Closing | BridgeState::Closed => Err(BridgeError::Closed),
            other => Err(BridgeError::NotReady(format!(
                "session for {} is {other:?}",
                self.label
            ))),
        }
    }

    /// Tools listed during the handshake.
    pub fn tools(&self) -> Result<&[RemoteTool], BridgeError> {
        self.ensure_ready()?;
        Ok(&self.tools)
    }

    /// Call a tool, blocking the current thread until the result arrives.
    ///
    /// Must not be called from inside an async task; use
    /// `tokio::task::spawn_blocking` there.
    pub fn call(&self, name: &str, arguments: Value) -> Result<ToolResult, BridgeError> {
        self.ensure_ready()?;
        match &self.link {
            Some(Link::Threaded(worker)) => forward_blocking(&worker.commands, name, arguments),
            Some(Link::Direct(_)) => Err(BridgeError::NotSupported(
                "blocking calls need a session started with start()".into(),
            )),
            None => Err(BridgeError::Closed),
        }
    }

    /// Call a tool on a session started with [`Self::start_async`].
    pub async fn call_async(&self, name: &str, arguments: Value) -> Result<ToolResult, BridgeError> {
        self.ensure_ready()?;
        match &self.link {
            Some(Link::Direct(link)) => {
                forward_direct(
                    Arc::clone(&link.session),
                    Arc::clone(&link.closed),
                    name.to_string(),
                    arguments,
                    self.config.call_timeout,
                )
                .await
            }
            Some(Link::Threaded(_)) => Err(BridgeError::NotSupported(
                "async calls need a session started with start_async()".into(),
            )),
            None => Err(BridgeError::Closed),
        }
    }

    /// Blocking forwarder for one tool, valid until this bridge closes.
    pub fn caller(&self, tool_name: &str) -> Result<ToolCaller, BridgeError> {
        self.ensure_ready()?;
        match &self.link {
            Some(Link::Threaded(worker)) => {
                let commands = worker.commands.clone();
                let tool_name = tool_name.to_string();
                Ok(Arc::new(move |arguments| {
                    forward_blocking(&commands, &tool_name, arguments)
                }))
            }
            Some(Link::Direct(_)) => Err(BridgeError::NotSupported(
                "blocking forwarders need a session started with start()".into(),
            )),
            None => Err(BridgeError::Closed),
        }
    }

    /// Async forwarder for one tool, valid until this bridge closes.
    pub fn async_caller(&self, tool_name: &str) -> Result<AsyncToolCaller, BridgeError> {
        self.ensure_ready()?;
        match &self.link {
            Some(Link::Direct(link)) => {
                let session = Arc::clone(&link.session);
                let closed = Arc::clone(&link.closed);
                let tool_name = tool_name.to_string();
                let call_timeout = self.config.call_timeout;
                Ok(Arc::new(move |arguments| {
                    Box::pin(forward_direct(
                        Arc::clone(&session),
                        Arc::clone(&closed),
                        tool_name.clone(),
                        arguments,
                        call_timeout,
                    ))
                }))
            }
            Some(Link::Threaded(_)) => Err(BridgeError::NotSupported(
                "async forwarders need a session started with start_async()".into(),
            )),
            None => Err(BridgeError::Closed),
        }
    }

    /// Stop the session and release its channel. Idempotent.
    ///
    /// Waits at most the configured close timeout for the background worker.
    pub fn close(&mut self) {
        if self.state == BridgeState::Closed {
            return;
        }
        if self.link.is_some() {
            self.state = BridgeState::Closing;
            self.release_link();
        }
        self.state = BridgeState::Closed;
    }

    /// Async counterpart of [`Self::close`].
    pub async fn close_async(&mut self) {
        if self.state == BridgeState::Closed {
            return;
        }
        self.state = BridgeState::Closing;
        match self.link.take() {
            Some(Link::Direct(link)) => {
                link.closed.store(true, Ordering::SeqCst);
                if let Err(error) = link.session.close().await {
                    warn!(server = %self.label, %error, "error while closing mcp session");
                }
            }
            Some(Link::Threaded(worker)) => {
                let timeout = self.config.close_timeout;
                let label = self.label.clone();
                if let Err(error) =
                    tokio::task::spawn_blocking(move || worker.shutdown(timeout, &label)).await
                {
                    warn!(server = %self.label, %error, "failed to join mcp session worker");
                }
            }
            None => {}
        }
        self.state = BridgeState::Closed;
    }

    fn release_link(&mut self) {
        match self.link.take() {
            Some(Link::Threaded(worker)) => worker.shutdown(self.config.close_timeout, &self.label),
            Some(Link::Direct(link)) => {
                link.closed.store(true, Ordering::SeqCst);
                match tokio::runtime::Handle::try_current() {
                    Ok(handle) => {
                        warn!(
                            server = %self.label,
                            "async session closed without close_async; closing in the background"
                        );
                        let label = self.label.clone();
                        handle.spawn(async move {
                            if let Err(error) = link.session.close().await {
                                warn!(server = %label, %error, "error while closing mcp session");
                            }
                        });
                    }
                    Err(_) => warn!(
                        server = %self.label,
                        "async session dropped outside a runtime; channel stays open until every forwarder is dropped"
                    ),
                }
            }
            None => {}
        }
    }
}

impl Drop for SessionBridge {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SessionBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBridge")
            .field("server", &self.label)
            .field("state", &self.state)
            .field("tools", &self.tools.len())
            .finish()
    }
}

fn forward_blocking(
    commands: &UnboundedSender<BridgeCommand>,
    name: &str,
    arguments: Value,
) -> Result<ToolResult, BridgeError> {
    let (reply, response) = std_mpsc::sync_channel(1);
    commands
        .send(BridgeCommand::Call {
            name: name.to_string(),
            arguments,
            reply,
        })
        .map_err(|_| BridgeError::Closed)?;
    response.recv().map_err(|_| BridgeError::Closed)?
}

async fn forward_direct(
    session: Arc<dyn SessionOps>,
    closed: Arc<AtomicBool>,
    name: String,
    arguments: Value,
    call_timeout: Option<Duration>,
) -> Result<ToolResult, BridgeError> {
    if closed.load(Ordering::SeqCst) {
        return Err(BridgeError::Closed);
    }
    debug!(tool = %name, "forwarding mcp tool call");
    with_optional_timeout(call_timeout, session.call_tool(&name, arguments)).await
}

/// Connect and list tools under one timeout. A session that fails to list
/// is closed before the error is returned.
async fn handshake(
    connector: &dyn Connector,
    descriptor: &ServerDescriptor,
    timeout: Option<Duration>,
) -> Result<(Arc<dyn SessionOps>, Vec<RemoteTool>), BridgeError> {
    with_optional_timeout(timeout, async {
        let session = connector.connect(descriptor).await?;
        match session.list_tools().await {
            Ok(tools) => Ok((session, tools)),
            Err(error) => {
                if let Err(close_error) = session.close().await {
                    debug!(%close_error, "error closing session after failed tool listing");
                }
                Err(error)
            }
        }
    })
    .await
}

struct WorkerContext {
    connector: Arc<dyn Connector>,
    descriptor: ServerDescriptor,
    label: String,
    handshake_timeout: Option<Duration>,
    call_timeout: Option<Duration>,
    cancel: CancellationToken,
    commands: UnboundedReceiver<BridgeCommand>,
}

impl WorkerContext {
    fn run(self, on_ready: ReadySignal) {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(error) => {
                on_ready(Err(BridgeError::Io(error)));
                return;
            }
        };
        runtime.block_on(self.serve(on_ready));
        // In-flight calls are dropped with the runtime; their callers see `Closed`.
        drop(runtime);
    }

    async fn serve(self, on_ready: ReadySignal) {
        let WorkerContext {
            connector,
            descriptor,
            label,
            handshake_timeout,
            call_timeout,
            cancel,
            mut commands,
        } = self;

        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(BridgeError::Closed),
            outcome = handshake(connector.as_ref(), &descriptor, handshake_timeout) => outcome,
        };
        let session = match outcome {
            Ok((session, tools)) => {
                on_ready(Ok(tools));
                session
            }
            Err(error) => {
                on_ready(Err(error));
                return;
            }
        };

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                command = commands.recv() => match command {
                    Some(BridgeCommand::Call { name, arguments, reply }) => {
                        let session = Arc::clone(&session);
                        tokio::spawn(async move {
                            debug!(tool = %name, "forwarding mcp tool call");
                            let result =
                                with_optional_timeout(call_timeout, session.call_tool(&name, arguments)).await;
                            let _ = reply.send(result);
                        });
                    }
                    None => break,
                },
            }
        }

        if let Err(error) = session.close().await {
            warn!(server = %label, %error, "error while closing mcp session");
        }
        debug!(server = %label, "mcp session worker stopped");
    }
}

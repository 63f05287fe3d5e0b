//! Async JSON-RPC client for the bridge sidecar.
//!
//! Spawns the configured command, writes requests to its stdin and reads
//! responses and notifications from its stdout on a background task.
//! Responses are matched to requests by id; notifications are published on
//! the transport's event bus.

use crate::bridge::protocol::{
    InitializeParams, JsonRpcMessage, Notification, OpenChatParams, ScanChatListParams,
    ScreenshotResult, SearchChatParams, SendMessageParams, SetZoomParams,
};
use crate::config::TransportConfig;
use crate::error::{ProbeError, Result};
use crate::transport::{ScreenCapture, Transport, TransportEvents};
use crate::types::ConnectionEvent;
use async_trait::async_trait;
use base64::Engine;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcMessage>>>>;

/// How to start and talk to the sidecar.
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    /// Program followed by its arguments.
    pub command: Vec<String>,
    pub headless: bool,
    pub request_timeout: Duration,
}

impl BridgeOptions {
    pub fn from_config(config: &TransportConfig) -> Self {
        Self {
            command: config.bridge_command.clone(),
            headless: config.headless,
            request_timeout: config.request_timeout(),
        }
    }
}

/// Transport and screen capture backed by the sidecar process.
pub struct BridgeTransport {
    events: Arc<TransportEvents>,
    stdin: tokio::sync::Mutex<ChildStdin>,
    child: tokio::sync::Mutex<Child>,
    pending: Pending,
    closed: Arc<AtomicBool>,
    next_id: AtomicU64,
    options: BridgeOptions,
    reader: JoinHandle<()>,
}

impl BridgeTransport {
    /// Spawns the sidecar. Must be called inside a tokio runtime.
    pub fn spawn(options: BridgeOptions) -> Result<Self> {
        let (program, args) = options.command.split_first().ok_or_else(|| {
            ProbeError::ConfigError(
                "no bridge command configured (set transport.bridge_command or BRIDGE_COMMAND)"
                    .into(),
            )
        })?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ProbeError::Transport(format!("bridge command not found: {program}"))
                } else {
                    ProbeError::Transport(format!("failed to start bridge: {e}"))
                }
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ProbeError::Transport("bridge stdin not captured".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProbeError::Transport("bridge stdout not captured".into()))?;

        let events = Arc::new(TransportEvents::default());
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let reader = tokio::spawn(read_loop(
            stdout,
            Arc::clone(&events),
            Arc::clone(&pending),
            Arc::clone(&closed),
        ));

        info!(program = %program, "bridge started");
        Ok(Self {
            events,
            stdin: tokio::sync::Mutex::new(stdin),
            child: tokio::sync::Mutex::new(child),
            pending,
            closed,
            next_id: AtomicU64::new(1),
            options,
            reader,
        })
    }

    /// Asks the sidecar to bring up the messaging session.
    ///
    /// Readiness arrives later as a `ready` notification.
    pub async fn initialize(&self) -> Result<()> {
        let _: Value = self
            .request(
                "initialize",
                InitializeParams {
                    headless: self.options.headless,
                },
            )
            .await?;
        Ok(())
    }

    /// Stops the sidecar.
    pub async fn shutdown(&self) -> Result<()> {
        let mut child = self.child.lock().await;
        child.start_kill()?;
        let _ = child.wait().await;
        Ok(())
    }

    /// Sends a request and waits for its response, bounded by the request timeout.
    pub async fn request<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<R> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ProbeError::Transport("bridge process has exited".into()));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let params =
            serde_json::to_value(params).map_err(|e| ProbeError::Serialization(e.to_string()))?;
        let line = JsonRpcMessage::request(id, method, params).to_line()?;

        let (tx, rx) = oneshot::channel();
        self.pending_map().insert(id, tx);

        if let Err(e) = self.write_line(&line).await {
            self.pending_map().remove(&id);
            return Err(e);
        }
        debug!(id, method, "bridge request sent");

        let response = match tokio::time::timeout(self.options.request_timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                return Err(ProbeError::Transport(format!(
                    "bridge closed before answering {method}"
                )))
            }
            Err(_) => {
                self.pending_map().remove(&id);
                return Err(ProbeError::Transport(format!(
                    "{method} timed out after {}ms",
                    self.options.request_timeout.as_millis()
                )));
            }
        };

        if let Some(error) = response.error {
            return Err(ProbeError::Transport(format!(
                "{method} failed: {} (code {})",
                error.message, error.code
            )));
        }
        serde_json::from_value(response.result.unwrap_or(Value::Null))
            .map_err(|e| ProbeError::Serialization(format!("{method} result: {e}")))
    }

    async fn write_line(&self, line: &str) -> Result<()> {
        let mut stdin = self.stdin.lock().await;
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| ProbeError::Transport(format!("bridge write failed: {e}")))?;
        stdin
            .flush()
            .await
            .map_err(|e| ProbeError::Transport(format!("bridge write failed: {e}")))
    }

    fn pending_map(&self) -> std::sync::MutexGuard<'_, HashMap<u64, oneshot::Sender<JsonRpcMessage>>> {
        self.pending.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Drop for BridgeTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_loop(
    stdout: ChildStdout,
    events: Arc<TransportEvents>,
    pending: Pending,
    closed: Arc<AtomicBool>,
) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "bridge read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let message = match JsonRpcMessage::from_line(&line) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "ignoring malformed bridge line");
                continue;
            }
        };

        if message.is_response() {
            let waiter = message
                .id_u64()
                .and_then(|id| pending.lock().ok().and_then(|mut p| p.remove(&id)));
            match waiter {
                Some(tx) => {
                    let _ = tx.send(message);
                }
                None => debug!(id = ?message.id, "response for unknown request"),
            }
            continue;
        }

        if let Some(method) = message.method.as_deref() {
            match Notification::parse(method, message.params.clone()) {
                Ok(Some(Notification::Inbound(event))) => {
                    events.publish_inbound(event);
                }
                Ok(Some(Notification::Connection(event))) => {
                    events.publish_connection(event);
                }
                Ok(None) => debug!(method, "ignoring bridge notification"),
                Err(e) => warn!(error = %e, "bad bridge notification"),
            }
        }
    }

    closed.store(true, Ordering::SeqCst);
    if let Ok(mut pending) = pending.lock() {
        pending.clear();
    }
    events.publish_connection(ConnectionEvent::Disconnected(
        "bridge process exited".into(),
    ));
}

#[async_trait]
impl Transport for BridgeTransport {
    fn events(&self) -> &TransportEvents {
        &self.events
    }

    async fn send_message(&self, to: &str, text: &str) -> Result<()> {
        let _: Value = self
            .request("sendMessage", SendMessageParams { to, text })
            .await?;
        Ok(())
    }

    async fn activate_surface(&self, address: &str) -> Result<bool> {
        self.request("openChat", OpenChatParams { chat_id: address })
            .await
    }

    async fn search_surface(&self, query: &str) -> Result<bool> {
        self.request("searchChat", SearchChatParams { query }).await
    }

    async fn scan_surface_list(&self, hint: &str) -> Result<bool> {
        self.request("scanChatList", ScanChatListParams { hint })
            .await
    }

    async fn apply_zoom(&self, factor: f32) -> Result<()> {
        let _: Value = self.request("setZoom", SetZoomParams { factor }).await?;
        Ok(())
    }
}

#[async_trait]
impl ScreenCapture for BridgeTransport {
    async fn screenshot(&self) -> Result<Vec<u8>> {
        let result: ScreenshotResult = self.request("screenshot", serde_json::json!({})).await?;
        base64::engine::general_purpose::STANDARD
            .decode(result.png.trim())
            .map_err(|e| ProbeError::Image(format!("screenshot is not base64: {e}")))
    }
}

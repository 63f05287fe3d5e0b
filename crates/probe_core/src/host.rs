//! One-way event channel to the host shell.

use crate::types::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;

/// Direction of a relayed chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

/// A chat message relayed to the host for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageLog {
    pub direction: Direction,
    pub address: Address,
    pub body: String,
    pub at: DateTime<Utc>,
    /// Whether an inbound message came from a configured target.
    #[serde(default)]
    pub target: bool,
}

/// Tagged payloads accepted by the host shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "lowercase")]
pub enum HostEvent {
    Status(String),
    Error(String),
    Success(String),
    Message(MessageLog),
    Capture { label: String, file_path: PathBuf },
    Qr(String),
    Ready,
}

impl HostEvent {
    pub fn status(text: impl Into<String>) -> Self {
        Self::Status(text.into())
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::Error(text.into())
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::Success(text.into())
    }

    /// Serialized kind tag, e.g. `"status"`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Status(_) => "status",
            Self::Error(_) => "error",
            Self::Success(_) => "success",
            Self::Message(_) => "message",
            Self::Capture { .. } => "capture",
            Self::Qr(_) => "qr",
            Self::Ready => "ready",
        }
    }
}

/// Receives host events. Emission never fails and never blocks on the host.
pub trait HostSink: Send + Sync {
    fn emit(&self, event: HostEvent);
}

/// Drops every event.
pub struct NullSink;

impl HostSink for NullSink {
    fn emit(&self, _event: HostEvent) {}
}

/// Keeps every event in memory, in emission order.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<HostEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Events of one kind, e.g. `"error"`.
    pub fn of_kind(&self, kind: &str) -> Vec<HostEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.kind() == kind)
            .collect()
    }
}

impl HostSink for RecordingSink {
    fn emit(&self, event: HostEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

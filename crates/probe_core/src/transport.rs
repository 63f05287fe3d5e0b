//! Collaborator seams: messaging transport, screen capture, compositing.
//!
//! Inbound traffic fans out over a bounded broadcast bus. Each wait call takes
//! its own subscription and drops it when the wait ends, so no listener
//! outlives the wait that created it.

use crate::error::{ProbeError, Result};
use crate::types::{ConnectionEvent, InboundEvent};
use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::warn;

/// Default capacity of the inbound and connection channels.
pub const DEFAULT_BUS_CAPACITY: usize = 256;

/// Broadcast fanout for everything a transport observes.
pub struct TransportEvents {
    inbound: broadcast::Sender<InboundEvent>,
    connection: broadcast::Sender<ConnectionEvent>,
}

impl Default for TransportEvents {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

impl TransportEvents {
    /// Creates the bus with the given per-channel capacity.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (inbound, _) = broadcast::channel(capacity);
        let (connection, _) = broadcast::channel(capacity);
        Self {
            inbound,
            connection,
        }
    }

    /// Publishes an inbound message. Returns how many subscribers saw it.
    pub fn publish_inbound(&self, event: InboundEvent) -> usize {
        self.inbound.send(event).unwrap_or(0)
    }

    /// Publishes a connection lifecycle event.
    pub fn publish_connection(&self, event: ConnectionEvent) -> usize {
        self.connection.send(event).unwrap_or(0)
    }

    /// Subscribes to inbound messages published from now on.
    pub fn subscribe_inbound(&self) -> InboundSubscriber {
        InboundSubscriber {
            receiver: self.inbound.subscribe(),
        }
    }

    /// Subscribes to connection lifecycle events.
    pub fn subscribe_connection(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.connection.subscribe()
    }

    /// Number of live inbound subscriptions.
    pub fn inbound_subscribers(&self) -> usize {
        self.inbound.receiver_count()
    }
}

/// A single inbound subscription. Dropping it unsubscribes.
pub struct InboundSubscriber {
    receiver: broadcast::Receiver<InboundEvent>,
}

impl InboundSubscriber {
    /// Receives the next inbound event in arrival order.
    ///
    /// A lagging subscriber skips what it missed and keeps going; a closed
    /// bus is a transport error.
    pub async fn recv(&mut self) -> Result<InboundEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Ok(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "inbound subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(ProbeError::Transport("inbound event stream closed".into()))
                }
            }
        }
    }
}

/// The messaging transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Event bus this transport publishes into.
    fn events(&self) -> &TransportEvents;

    /// Sends `text` to `to`.
    async fn send_message(&self, to: &str, text: &str) -> Result<()>;

    /// Opens the conversation surface for `address` directly.
    async fn activate_surface(&self, _address: &str) -> Result<bool> {
        Ok(false)
    }

    /// Finds a conversation through the UI search box and selects it.
    async fn search_surface(&self, _query: &str) -> Result<bool> {
        Ok(false)
    }

    /// Scans the visible conversation list for `hint` and clicks it.
    async fn scan_surface_list(&self, _hint: &str) -> Result<bool> {
        Ok(false)
    }

    /// Applies a display zoom factor to the conversation surface.
    async fn apply_zoom(&self, _factor: f32) -> Result<()> {
        Ok(())
    }

    /// Subscribes to inbound messages.
    fn subscribe(&self) -> InboundSubscriber {
        self.events().subscribe_inbound()
    }
}

/// Screenshot of the active conversation surface, as PNG bytes.
#[async_trait]
pub trait ScreenCapture: Send + Sync {
    async fn screenshot(&self) -> Result<Vec<u8>>;
}

/// Overlays a timestamp band on an image.
pub trait Compositor: Send + Sync {
    fn overlay_timestamp_band(&self, image: &[u8], stamp: &str) -> Result<Vec<u8>>;
}

/// In-process transport: records sends and lets callers inject traffic.
///
/// Used by tests and dry runs; `fail_sends_to` makes sends to one address fail.
pub struct LoopbackTransport {
    events: TransportEvents,
    sent: Mutex<Vec<(String, String)>>,
    outbound: broadcast::Sender<(String, String)>,
    failing: Mutex<Option<String>>,
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        let (outbound, _) = broadcast::channel(DEFAULT_BUS_CAPACITY);
        Self {
            events: TransportEvents::default(),
            sent: Mutex::new(Vec::new()),
            outbound,
            failing: Mutex::new(None),
        }
    }
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observes successful sends as `(to, text)` pairs, from now on.
    pub fn watch_sends(&self) -> broadcast::Receiver<(String, String)> {
        self.outbound.subscribe()
    }

    /// Delivers an inbound event to current subscribers.
    pub fn inject(&self, event: InboundEvent) -> usize {
        self.events.publish_inbound(event)
    }

    /// Everything sent so far as `(to, text)` pairs.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Makes every send to `address` fail from now on.
    pub fn fail_sends_to(&self, address: &str) {
        if let Ok(mut failing) = self.failing.lock() {
            *failing = Some(address.to_string());
        }
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    fn events(&self) -> &TransportEvents {
        &self.events
    }

    async fn send_message(&self, to: &str, text: &str) -> Result<()> {
        let failing = self.failing.lock().ok().and_then(|f| f.clone());
        if failing.as_deref() == Some(to) {
            return Err(ProbeError::Transport(format!("send to {to} rejected")));
        }
        let pair = (to.to_string(), text.to_string());
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(pair.clone());
        }
        let _ = self.outbound.send(pair);
        Ok(())
    }
}

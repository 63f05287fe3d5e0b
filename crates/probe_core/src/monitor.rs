//! Background relays from the transport to the host shell.

use crate::alert::Alerter;
use crate::host::{Direction, HostEvent, HostSink, MessageLog};
use crate::recipients::RecipientRegistry;
use crate::transport::Transport;
use crate::types::ConnectionEvent;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Relays connection lifecycle events to the host and alerts on failures.
///
/// Ends when the transport's connection stream closes.
pub fn spawn_connection_monitor(
    transport: Arc<dyn Transport>,
    host: Arc<dyn HostSink>,
    alerter: Arc<Alerter>,
) -> JoinHandle<()> {
    let mut events = transport.events().subscribe_connection();
    tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "connection monitor lagged");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            match event {
                ConnectionEvent::Qr(code) => {
                    host.emit(HostEvent::Qr(code));
                    host.emit(HostEvent::status("Scan the pairing code to log in"));
                }
                ConnectionEvent::Ready => {
                    info!("transport ready");
                    host.emit(HostEvent::Ready);
                    host.emit(HostEvent::success("Client is ready"));
                }
                ConnectionEvent::AuthFailure(message) => {
                    warn!(%message, "authentication failure");
                    host.emit(HostEvent::error(format!("Authentication failure: {message}")));
                    alerter
                        .notify(&format!("Authentication failure: {message}"))
                        .await;
                }
                ConnectionEvent::Disconnected(reason) => {
                    warn!(%reason, "transport disconnected");
                    host.emit(HostEvent::error(format!("Client disconnected: {reason}")));
                    alerter
                        .notify(&format!("Client disconnected: {reason}"))
                        .await;
                }
            }
        }
    })
}

/// Relays every inbound message to the host, flagging target traffic.
pub fn spawn_inbound_log(
    transport: Arc<dyn Transport>,
    registry: Arc<RecipientRegistry>,
    host: Arc<dyn HostSink>,
) -> JoinHandle<()> {
    let mut inbound = transport.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = inbound.recv().await {
            host.emit(HostEvent::Message(MessageLog {
                direction: Direction::In,
                target: registry.is_target(&event.source_address),
                body: event.display_body(),
                address: event.source_address,
                at: event.received_at,
            }));
        }
    })
}

//! Operator alerts over the messaging transport.

use crate::error::ProbeError;
use crate::host::{HostEvent, HostSink};
use crate::transport::Transport;
use crate::types::Address;
use std::sync::Arc;
use tracing::{info, warn};

/// Sends alert text to the configured operator address.
///
/// Delivery is best-effort: a failed send is reported to the host and the
/// log, never to the caller.
pub struct Alerter {
    transport: Arc<dyn Transport>,
    address: Address,
    host: Arc<dyn HostSink>,
}

impl Alerter {
    pub fn new(transport: Arc<dyn Transport>, address: Address, host: Arc<dyn HostSink>) -> Self {
        Self {
            transport,
            address,
            host,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Sends `text` to the alert address. Returns whether it was delivered.
    pub async fn notify(&self, text: &str) -> bool {
        match self.transport.send_message(&self.address, text).await {
            Ok(()) => {
                info!(address = %self.address, "alert sent");
                true
            }
            Err(e) => {
                let err = ProbeError::AlertDelivery(e.to_string());
                warn!(address = %self.address, error = %err, "alert not delivered");
                self.host
                    .emit(HostEvent::error(format!("Could not send alert: {e}")));
                false
            }
        }
    }
}

//! Bounded waits for inbound messages.
//!
//! A run holds one inbound subscription for its whole life and lends it to
//! each wait in turn. Events that arrive while nothing is waiting stay
//! queued on that subscription and are checked by the next wait in arrival
//! order. Each wait races the subscription against one timer; the timer is
//! dropped with the `select!`.

use crate::error::{ProbeError, Result};
use crate::normalize::matches;
use crate::recipients::RecipientRegistry;
use crate::transport::{InboundSubscriber, Transport};
use crate::types::{AttachmentKind, InboundEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// One condition inside a compound wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Any of the candidates appears in a message body.
    Text { candidates: Vec<String> },
    /// A message carries media of `kind`.
    Media {
        kind: AttachmentKind,
        failure_message: Option<String>,
    },
}

/// Waits for inbound traffic from the configured target addresses.
#[derive(Clone)]
pub struct EventWaiter {
    transport: Arc<dyn Transport>,
    registry: Arc<RecipientRegistry>,
}

impl EventWaiter {
    pub fn new(transport: Arc<dyn Transport>, registry: Arc<RecipientRegistry>) -> Self {
        Self {
            transport,
            registry,
        }
    }

    /// Opens the subscription a run passes to every wait.
    ///
    /// Subscribe before sending anything that may be answered.
    pub fn subscribe(&self) -> InboundSubscriber {
        self.transport.subscribe()
    }

    /// Resolves with the first target message whose body contains any
    /// candidate (normalized). Fails with `Timeout` listing every candidate.
    pub async fn wait_for_text(
        &self,
        inbound: &mut InboundSubscriber,
        candidates: &[String],
        timeout: Duration,
    ) -> Result<InboundEvent> {
        let expected = format!("Timeout waiting for message: {}", candidates.join(" | "));
        self.wait_matching(inbound, timeout, expected, |event| {
            event
                .text_body()
                .is_some_and(|body| candidates.iter().any(|c| matches(body, c)))
        })
        .await
    }

    /// Resolves with the first target message carrying media of `kind`.
    pub async fn wait_for_media(
        &self,
        inbound: &mut InboundSubscriber,
        kind: &AttachmentKind,
        timeout: Duration,
        failure_message: Option<&str>,
    ) -> Result<InboundEvent> {
        let expected = failure_message
            .map(str::to_string)
            .unwrap_or_else(|| format!("Timeout waiting for media: {kind}"));
        self.wait_matching(inbound, timeout, expected, |event| event.carries(kind))
            .await
    }

    /// Awaits each condition in turn, each with the full `timeout`.
    ///
    /// Stops at the first failing condition and returns its error.
    pub async fn wait_for_any(
        &self,
        inbound: &mut InboundSubscriber,
        conditions: &[Condition],
        timeout: Duration,
    ) -> Result<Vec<InboundEvent>> {
        let mut matched = Vec::with_capacity(conditions.len());
        for condition in conditions {
            let event = match condition {
                Condition::Text { candidates } => {
                    self.wait_for_text(inbound, candidates, timeout).await?
                }
                Condition::Media {
                    kind,
                    failure_message,
                } => {
                    self.wait_for_media(inbound, kind, timeout, failure_message.as_deref())
                        .await?
                }
            };
            matched.push(event);
        }
        Ok(matched)
    }

    async fn wait_matching<F>(
        &self,
        inbound: &mut InboundSubscriber,
        timeout: Duration,
        expected: String,
        mut accept: F,
    ) -> Result<InboundEvent>
    where
        F: FnMut(&InboundEvent) -> bool + Send,
    {
        let registry = Arc::clone(&self.registry);

        let outcome = tokio::select! {
            matched = next_match(inbound, &registry, &mut accept) => matched,
            () = sleep(timeout) => Err(ProbeError::Timeout {
                expected,
                waited_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        };

        if let Ok(event) = &outcome {
            debug!(source = %event.source_address, "wait matched");
            registry.record_active(&event.source_address);
        }
        outcome
    }
}

async fn next_match<F>(
    subscription: &mut InboundSubscriber,
    registry: &RecipientRegistry,
    accept: &mut F,
) -> Result<InboundEvent>
where
    F: FnMut(&InboundEvent) -> bool,
{
    loop {
        let event = subscription.recv().await?;
        if registry.is_target(&event.source_address) && accept(&event) {
            return Ok(event);
        }
    }
}

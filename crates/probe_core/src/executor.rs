//! Scenario executor state machine.
//!
//! A run moves `Idle -> Running { step } -> Completed | Failed`. Steps run
//! strictly in order; the first failing step ends the run, raises exactly one
//! operator alert, and leaves the executor in `Failed`. A run that finishes
//! its steps without seeing both milestones fails as well.

use crate::alert::Alerter;
use crate::capture::CapturePipeline;
use crate::error::{ProbeError, Result};
use crate::host::{Direction, HostEvent, HostSink, MessageLog};
use crate::normalize::prompt_variants;
use crate::recipients::RecipientRegistry;
use crate::scenario::{OpeningStep, ScenarioDefinition, ScenarioStep, Step, Wait};
use crate::transport::{InboundSubscriber, Transport};
use crate::types::{AttachmentKind, CaptureRecord, InboundEvent, Milestone};
use crate::waiter::{Condition, EventWaiter};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::time::sleep;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Where the executor is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "lowercase")]
pub enum RunPhase {
    Idle,
    /// `step` is 1-based; 0 while the opening message goes out.
    Running { step: usize },
    Completed,
    Failed { reason: String },
}

/// Milestones observed during the current run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MilestoneFlags {
    opening: bool,
    terminal: bool,
}

impl MilestoneFlags {
    pub fn verify(&mut self, milestone: Milestone) {
        match milestone {
            Milestone::Opening => self.opening = true,
            Milestone::Terminal => self.terminal = true,
        }
    }

    pub fn is_verified(&self, milestone: Milestone) -> bool {
        match milestone {
            Milestone::Opening => self.opening,
            Milestone::Terminal => self.terminal,
        }
    }

    /// Fails with `MilestoneNotVerified` unless `milestone` was observed.
    pub fn require(&self, milestone: Milestone) -> Result<()> {
        if self.is_verified(milestone) {
            Ok(())
        } else {
            Err(ProbeError::MilestoneNotVerified(milestone))
        }
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub steps_completed: usize,
    pub captures: Vec<CaptureRecord>,
}

/// Per-run mutable state. Lives only as long as one `run` call.
#[derive(Default)]
struct RunProgress {
    steps_completed: usize,
    milestones: MilestoneFlags,
    captures: Vec<CaptureRecord>,
}

/// Executes scenario definitions against the transport.
pub struct ScenarioExecutor {
    transport: Arc<dyn Transport>,
    registry: Arc<RecipientRegistry>,
    waiter: EventWaiter,
    capture: Arc<CapturePipeline>,
    alerter: Arc<Alerter>,
    host: Arc<dyn HostSink>,
    phase: Mutex<RunPhase>,
}

impl ScenarioExecutor {
    pub fn new(
        transport: Arc<dyn Transport>,
        registry: Arc<RecipientRegistry>,
        capture: Arc<CapturePipeline>,
        alerter: Arc<Alerter>,
        host: Arc<dyn HostSink>,
    ) -> Self {
        Self {
            waiter: EventWaiter::new(Arc::clone(&transport), Arc::clone(&registry)),
            transport,
            registry,
            capture,
            alerter,
            host,
            phase: Mutex::new(RunPhase::Idle),
        }
    }

    /// Phase of the current or most recent run.
    pub fn phase(&self) -> RunPhase {
        self.phase
            .lock()
            .map(|p| p.clone())
            .unwrap_or(RunPhase::Idle)
    }

    fn set_phase(&self, phase: RunPhase) {
        if let Ok(mut current) = self.phase.lock() {
            *current = phase;
        }
    }

    /// Runs `scenario` once.
    ///
    /// Callers serialize runs; the executor itself does not guard against
    /// overlap.
    pub async fn run(&self, scenario: &ScenarioDefinition) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        self.set_phase(RunPhase::Running { step: 0 });
        info!(%run_id, steps = scenario.steps.len(), "scenario run started");
        self.host.emit(HostEvent::status("Running scenario..."));

        let mut progress = RunProgress::default();
        match self.drive(scenario, &mut progress).await {
            Ok(()) => {
                self.set_phase(RunPhase::Completed);
                info!(%run_id, captures = progress.captures.len(), "scenario run completed");
                self.host
                    .emit(HostEvent::success("Quote completed successfully."));
                Ok(RunReport {
                    run_id,
                    started_at,
                    finished_at: Utc::now(),
                    steps_completed: progress.steps_completed,
                    captures: progress.captures,
                })
            }
            Err(err) => {
                self.set_phase(RunPhase::Failed {
                    reason: err.to_string(),
                });
                error!(%run_id, step = err.failed_step(), error = %err, "scenario run failed");
                self.host
                    .emit(HostEvent::error(format!("Scenario error: {err}")));
                self.alerter.notify(&alert_text(&err)).await;
                Err(err)
            }
        }
    }

    async fn drive(&self, scenario: &ScenarioDefinition, progress: &mut RunProgress) -> Result<()> {
        scenario.validate()?;

        // Opened before the first send so no answer can slip past; replies
        // that arrive during the settle stay queued for the opening step.
        let mut inbound = self.waiter.subscribe();
        for address in self.registry.configured() {
            self.send_logged(address, &scenario.initial_message).await?;
        }
        sleep(scenario.initial_settle).await;

        for (index, step) in scenario.steps.iter().enumerate() {
            let number = index + 1;
            self.set_phase(RunPhase::Running { step: number });
            debug!(step = number, "executing step");

            let outcome = match step {
                ScenarioStep::Opening(opening) => {
                    self.run_opening(&mut inbound, opening, progress).await
                }
                ScenarioStep::Step(step) => {
                    self.run_step(&mut inbound, step, &scenario.terminal_attachment, progress)
                        .await
                }
            };
            outcome.map_err(|e| e.in_step(number))?;
            progress.steps_completed = number;
        }

        progress.milestones.require(Milestone::Opening)?;
        progress.milestones.require(Milestone::Terminal)?;
        Ok(())
    }

    async fn run_opening(
        &self,
        inbound: &mut InboundSubscriber,
        opening: &OpeningStep,
        progress: &mut RunProgress,
    ) -> Result<()> {
        self.waiter
            .wait_for_media(
                inbound,
                &opening.media.kind,
                opening.media.timeout,
                opening.media.failure_message.as_deref(),
            )
            .await?;
        progress.milestones.verify(Milestone::Opening);

        let prompt = self
            .waiter
            .wait_for_text(
                inbound,
                &prompt_variants(&opening.prompt),
                opening.prompt_timeout,
            )
            .await?;
        sleep(opening.settle).await;

        let record = self
            .capture
            .capture(Milestone::Opening, Some(&prompt.source_address))
            .await?;
        progress.captures.push(record);

        self.send_to_resolved(&opening.reply).await
    }

    async fn run_step(
        &self,
        inbound: &mut InboundSubscriber,
        step: &Step,
        terminal: &AttachmentKind,
        progress: &mut RunProgress,
    ) -> Result<()> {
        match &step.wait {
            Some(Wait::Text(wait)) => {
                self.waiter
                    .wait_for_text(inbound, &wait.candidates, wait.timeout)
                    .await?;
            }
            Some(Wait::Media(wait)) => {
                let event = self
                    .waiter
                    .wait_for_media(
                        inbound,
                        &wait.kind,
                        wait.timeout,
                        wait.failure_message.as_deref(),
                    )
                    .await?;
                if &wait.kind == terminal {
                    self.terminal_reached(&event, progress).await?;
                }
            }
            Some(Wait::Any {
                conditions,
                timeout,
            }) => {
                let events = self
                    .waiter
                    .wait_for_any(inbound, conditions, *timeout)
                    .await?;
                for (condition, event) in conditions.iter().zip(&events) {
                    if matches!(condition, Condition::Media { kind, .. } if kind == terminal) {
                        self.terminal_reached(event, progress).await?;
                    }
                }
            }
            None => {}
        }

        if let Some(text) = step.respond.as_deref().or(step.send.as_deref()) {
            self.send_to_resolved(text).await?;
        }
        if let Some(delay) = step.delay {
            sleep(delay).await;
        }
        Ok(())
    }

    async fn terminal_reached(&self, event: &InboundEvent, progress: &mut RunProgress) -> Result<()> {
        progress.milestones.verify(Milestone::Terminal);
        let record = self
            .capture
            .capture(Milestone::Terminal, Some(&event.source_address))
            .await?;
        progress.captures.push(record);
        Ok(())
    }

    async fn send_to_resolved(&self, text: &str) -> Result<()> {
        for address in self.registry.resolve() {
            self.send_logged(&address, text).await?;
        }
        Ok(())
    }

    async fn send_logged(&self, address: &str, text: &str) -> Result<()> {
        self.transport.send_message(address, text).await?;
        debug!(address, text, "sent");
        self.host.emit(HostEvent::Message(MessageLog {
            direction: Direction::Out,
            address: address.to_string(),
            body: text.to_string(),
            at: Utc::now(),
            target: self.registry.is_target(address),
        }));
        Ok(())
    }
}

/// Alert text for a failed run.
fn alert_text(err: &ProbeError) -> String {
    match err.failed_step() {
        Some(step) => format!("Error in step {step}: {}", err.root_cause()),
        None => format!("Scenario error: {err}"),
    }
}

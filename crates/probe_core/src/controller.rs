//! The long-lived owner of every component.
//!
//! The host shell builds one `Controller` at startup and drives it through
//! manual runs, the scheduler, and capture-root changes.

use crate::alert::Alerter;
use crate::capture::{CapturePipeline, CaptureSettings};
use crate::config::Config;
use crate::error::{ProbeError, Result};
use crate::executor::{RunPhase, RunReport, ScenarioExecutor};
use crate::host::{HostEvent, HostSink};
use crate::recipients::RecipientRegistry;
use crate::scenario::ScenarioDefinition;
use crate::scheduler::RunTrigger;
use crate::transport::{Compositor, ScreenCapture, Transport};
use crate::Clock;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub struct Controller {
    transport: Arc<dyn Transport>,
    registry: Arc<RecipientRegistry>,
    capture: Arc<CapturePipeline>,
    alerter: Arc<Alerter>,
    host: Arc<dyn HostSink>,
    executor: ScenarioExecutor,
    scenario: ScenarioDefinition,
    zoom: f32,
    initialized: AtomicBool,
    /// Serializes runs: manual runs try it, scheduled runs queue on it.
    run_gate: Mutex<()>,
}

impl Controller {
    /// Wires every component from `config` and the given collaborators.
    pub fn new(
        config: &Config,
        transport: Arc<dyn Transport>,
        screen: Arc<dyn ScreenCapture>,
        compositor: Arc<dyn Compositor>,
        host: Arc<dyn HostSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let registry = Arc::new(RecipientRegistry::new(
            config.transport.recipients.iter().cloned(),
        )?);
        let capture = Arc::new(CapturePipeline::new(
            Arc::clone(&transport),
            screen,
            compositor,
            Arc::clone(&registry),
            Arc::clone(&host),
            clock,
            CaptureSettings {
                root: config.capture.root.clone(),
                surface_hint: config.capture.surface_hint.clone(),
                colons_allowed: config.capture.colons_allowed(),
            },
        ));
        let alerter = Arc::new(Alerter::new(
            Arc::clone(&transport),
            config.transport.alert_address.clone(),
            Arc::clone(&host),
        ));
        let executor = ScenarioExecutor::new(
            Arc::clone(&transport),
            Arc::clone(&registry),
            Arc::clone(&capture),
            Arc::clone(&alerter),
            Arc::clone(&host),
        );

        Ok(Self {
            transport,
            registry,
            capture,
            alerter,
            host,
            executor,
            scenario: ScenarioDefinition::quote(&config.timing),
            zoom: config.capture.zoom,
            initialized: AtomicBool::new(false),
            run_gate: Mutex::new(()),
        })
    }

    /// Replaces the scenario this controller runs.
    pub fn with_scenario(mut self, scenario: ScenarioDefinition) -> Result<Self> {
        scenario.validate()?;
        self.scenario = scenario;
        Ok(self)
    }

    /// Marks the transport usable and applies the display zoom.
    ///
    /// A failed zoom is logged; it only affects how captures look.
    pub async fn initialize(&self) {
        if let Err(e) = self.transport.apply_zoom(self.zoom).await {
            warn!(zoom = self.zoom, error = %e, "could not apply display zoom");
        }
        self.initialized.store(true, Ordering::SeqCst);
        self.host.emit(HostEvent::status("Client initialized"));
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Manual run. Rejected with `RunInProgress` while another run holds the gate.
    pub async fn run_once(&self) -> Result<RunReport> {
        let Ok(_gate) = self.run_gate.try_lock() else {
            self.host
                .emit(HostEvent::error("A run is already in progress"));
            return Err(ProbeError::RunInProgress);
        };
        self.run_locked().await
    }

    /// Run that waits for any in-flight run to finish first.
    pub async fn run_queued(&self) -> Result<RunReport> {
        let _gate = self.run_gate.lock().await;
        self.run_locked().await
    }

    /// Resolves once no run holds the gate.
    pub async fn wait_idle(&self) {
        drop(self.run_gate.lock().await);
    }

    /// True while a run holds the gate.
    pub fn is_running(&self) -> bool {
        self.run_gate.try_lock().is_err()
    }

    async fn run_locked(&self) -> Result<RunReport> {
        if !self.is_initialized() {
            self.host.emit(HostEvent::error("Client not initialized"));
            return Err(ProbeError::NotInitialized);
        }
        self.executor.run(&self.scenario).await
    }

    /// Points future captures at `root`, creating it.
    pub fn set_capture_root(&self, root: PathBuf) -> Result<()> {
        self.capture.set_root(root.clone())?;
        info!(root = %root.display(), "capture root changed");
        self.host.emit(HostEvent::status(format!(
            "Capture directory: {}",
            root.display()
        )));
        Ok(())
    }

    pub fn capture_root(&self) -> PathBuf {
        self.capture.root()
    }

    pub fn phase(&self) -> RunPhase {
        self.executor.phase()
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn registry(&self) -> &Arc<RecipientRegistry> {
        &self.registry
    }

    pub fn alerter(&self) -> &Arc<Alerter> {
        &self.alerter
    }

    pub fn host(&self) -> &Arc<dyn HostSink> {
        &self.host
    }

    pub fn scenario(&self) -> &ScenarioDefinition {
        &self.scenario
    }
}

#[async_trait]
impl RunTrigger for Controller {
    async fn run_scheduled(&self) -> Result<RunReport> {
        self.run_queued().await
    }
}

use super::assertions::RunOutcome;
use super::rig::Rig;
use super::steps::ScenarioStep;
use anyhow::{anyhow, Context, Result};
use chrono::NaiveDateTime;
use probe_core::Config;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Executes scenario steps against a real controller.
pub struct ScenarioRunner {
    rig: Rig,
    last_run: Option<RunOutcome>,
    background: Option<JoinHandle<RunOutcome>>,
    remotes: Vec<JoinHandle<()>>,
    current_step: usize,
}

impl ScenarioRunner {
    pub async fn new(at: NaiveDateTime, tweak: impl FnOnce(&mut Config)) -> Result<Self> {
        Ok(Self {
            rig: Rig::with_config(at, tweak).await?,
            last_run: None,
            background: None,
            remotes: Vec::new(),
            current_step: 0,
        })
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn rig(&self) -> &Rig {
        &self.rig
    }

    pub async fn execute(&mut self, steps: Vec<ScenarioStep>) -> Result<()> {
        for (index, step) in steps.into_iter().enumerate() {
            self.current_step = index + 1;
            let label = format!("{step:?}");
            self.execute_step(step)
                .await
                .with_context(|| format!("step {} ({label})", index + 1))?;
        }
        Ok(())
    }

    async fn execute_step(&mut self, step: ScenarioStep) -> Result<()> {
        match step {
            ScenarioStep::Remote(party) => {
                self.remotes.push(party.spawn(Arc::clone(&self.rig.transport)));
            }
            ScenarioStep::FailSendsTo(address) => self.rig.transport.fail_sends_to(&address),
            ScenarioStep::Run => {
                self.last_run = Some(self.rig.controller.run_once().await);
            }
            ScenarioStep::RunInBackground => {
                let controller = Arc::clone(&self.rig.controller);
                self.background = Some(tokio::spawn(async move { controller.run_once().await }));
                // Let the run take the gate before the next step.
                while self.rig.transport.sent().is_empty() {
                    tokio::task::yield_now().await;
                }
            }
            ScenarioStep::JoinBackground => {
                let handle = self
                    .background
                    .take()
                    .ok_or_else(|| anyhow!("no background run"))?;
                self.last_run = Some(handle.await?);
            }
            ScenarioStep::Wait(duration) => tokio::time::sleep(duration).await,
            ScenarioStep::MoveCaptureRoot(dir) => {
                let root = self.rig.dir.path().join(dir);
                self.rig.controller.set_capture_root(root)?;
            }
            ScenarioStep::Assert(assertion) => {
                assertion.check(&self.rig, self.last_run.as_ref())?;
            }
        }
        Ok(())
    }
}

impl Drop for ScenarioRunner {
    fn drop(&mut self) {
        for remote in &self.remotes {
            remote.abort();
        }
        if let Some(background) = &self.background {
            background.abort();
        }
    }
}

use super::assertions::Assertion;
use super::clock::local;
use super::party::QuotingParty;
use super::runner::ScenarioRunner;
use super::steps::ScenarioStep;
use chrono::NaiveDateTime;
use probe_core::{Config, Milestone, RunPhase};
use std::time::Duration;

type ConfigTweak = Box<dyn FnOnce(&mut Config) + Send>;

/// Fluent DSL for building e2e scenarios.
pub struct Scenario {
    name: String,
    at: NaiveDateTime,
    tweaks: Vec<ConfigTweak>,
    steps: Vec<ScenarioStep>,
}

impl Scenario {
    /// A scenario starting Tuesday 2024-06-04 10:05 local time.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            at: local(2024, 6, 4, 10, 5),
            tweaks: Vec::new(),
            steps: Vec::new(),
        }
    }

    // ===== Setup =====

    /// Local wall-clock time the scenario starts at.
    pub fn at(mut self, at: NaiveDateTime) -> Self {
        self.at = at;
        self
    }

    pub fn configure(mut self, tweak: impl FnOnce(&mut Config) + Send + 'static) -> Self {
        self.tweaks.push(Box::new(tweak));
        self
    }

    pub fn recipients(self, recipients: &[&str]) -> Self {
        let recipients: Vec<String> = recipients.iter().map(|r| r.to_string()).collect();
        self.configure(move |c| c.transport.recipients = recipients)
    }

    pub fn colons_in_filenames(self, allowed: bool) -> Self {
        self.configure(move |c| c.capture.colon_in_filenames = Some(allowed))
    }

    // ===== Remote party and transport =====

    pub fn remote(mut self, party: QuotingParty) -> Self {
        self.steps.push(ScenarioStep::Remote(party));
        self
    }

    pub fn fail_sends_to(mut self, address: &str) -> Self {
        self.steps
            .push(ScenarioStep::FailSendsTo(address.to_string()));
        self
    }

    // ===== Runs =====

    pub fn run_once(mut self) -> Self {
        self.steps.push(ScenarioStep::Run);
        self
    }

    pub fn run_in_background(mut self) -> Self {
        self.steps.push(ScenarioStep::RunInBackground);
        self
    }

    pub fn join_background(mut self) -> Self {
        self.steps.push(ScenarioStep::JoinBackground);
        self
    }

    pub fn wait(mut self, duration: Duration) -> Self {
        self.steps.push(ScenarioStep::Wait(duration));
        self
    }

    pub fn move_capture_root(mut self, dir: &str) -> Self {
        self.steps
            .push(ScenarioStep::MoveCaptureRoot(dir.to_string()));
        self
    }

    // ===== Assertions =====

    pub fn assert(mut self, assertion: Assertion) -> Self {
        self.steps.push(ScenarioStep::Assert(assertion));
        self
    }

    pub fn assert_succeeded(self) -> Self {
        self.assert(Assertion::RunSucceeded)
    }

    pub fn assert_failed_at(self, step: usize) -> Self {
        self.assert(Assertion::RunFailedAtStep(step))
    }

    pub fn assert_failed_with(self, text: &str) -> Self {
        self.assert(Assertion::RunFailedWith(text.to_string()))
    }

    pub fn assert_phase(self, phase: RunPhase) -> Self {
        self.assert(Assertion::Phase(phase))
    }

    pub fn assert_capture(self, milestone: Milestone) -> Self {
        self.assert(Assertion::CaptureFiled(milestone))
    }

    pub fn assert_no_capture(self, milestone: Milestone) -> Self {
        self.assert(Assertion::NoCapture(milestone))
    }

    pub fn assert_sent(self, to: &str, text: &str) -> Self {
        self.assert(Assertion::Sent {
            to: to.to_string(),
            text: text.to_string(),
        })
    }

    pub fn assert_not_sent(self, text: &str) -> Self {
        self.assert(Assertion::NotSent(text.to_string()))
    }

    pub fn assert_alerts(self, count: usize) -> Self {
        self.assert(Assertion::AlertCount(count))
    }

    pub fn assert_alert_contains(self, text: &str) -> Self {
        self.assert(Assertion::AlertContains(text.to_string()))
    }

    pub fn assert_host(self, kind: &'static str, contains: &str) -> Self {
        self.assert(Assertion::HostEvent {
            kind,
            contains: contains.to_string(),
        })
    }

    // ===== Execution =====

    pub async fn run(self) -> ScenarioResult {
        let tweaks = self.tweaks;
        let runner = ScenarioRunner::new(self.at, move |config| {
            for tweak in tweaks {
                tweak(config);
            }
        })
        .await;
        let mut runner = match runner {
            Ok(r) => r,
            Err(e) => {
                return ScenarioResult {
                    name: self.name,
                    success: false,
                    steps_executed: 0,
                    failure_step: Some(0),
                    error: Some(format!("Failed to create runner: {e:#}")),
                }
            }
        };

        let total = self.steps.len();
        match runner.execute(self.steps).await {
            Ok(()) => ScenarioResult {
                name: self.name,
                success: true,
                steps_executed: total,
                failure_step: None,
                error: None,
            },
            Err(e) => {
                let failure_step = runner.current_step();
                ScenarioResult {
                    name: self.name,
                    success: false,
                    steps_executed: failure_step,
                    failure_step: Some(failure_step),
                    error: Some(format!("{e:#}")),
                }
            }
        }
    }
}

/// Result of running a scenario
#[derive(Debug)]
pub struct ScenarioResult {
    pub name: String,
    pub success: bool,
    pub steps_executed: usize,
    pub failure_step: Option<usize>,
    pub error: Option<String>,
}

impl ScenarioResult {
    /// Panics if the scenario failed.
    pub fn unwrap(self) {
        if !self.success {
            panic!(
                "Scenario '{}' failed at step {}: {}",
                self.name,
                self.failure_step.unwrap_or(0),
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }

    pub fn expect(self, msg: &str) {
        if !self.success {
            panic!(
                "{}: Scenario '{}' failed at step {}: {}",
                msg,
                self.name,
                self.failure_step.unwrap_or(0),
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }
}

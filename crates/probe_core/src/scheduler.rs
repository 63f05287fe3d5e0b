//! Half-hour scheduler.
//!
//! Fires at the next `:00` or `:30` local boundary, runs the scenario,
//! re-arms on success and halts on the first failure. At most one timer is
//! armed at a time, and stopping never cancels a run that already started.

use crate::error::Result;
use crate::executor::RunReport;
use crate::host::{HostEvent, HostSink};
use crate::Clock;
use async_trait::async_trait;
use chrono::{NaiveDateTime, Timelike};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info};

/// What the scheduler fires.
#[async_trait]
pub trait RunTrigger: Send + Sync {
    /// Runs the scenario, waiting behind any run already in progress.
    async fn run_scheduled(&self) -> Result<RunReport>;
}

/// The first `:00` or `:30` boundary strictly after `now`.
pub fn next_half_hour(now: NaiveDateTime) -> NaiveDateTime {
    let into_hour = chrono::Duration::minutes(i64::from(now.minute()))
        + chrono::Duration::seconds(i64::from(now.second()))
        + chrono::Duration::nanoseconds(i64::from(now.nanosecond()));
    let hour_start = now - into_hour;
    if now.minute() < 30 {
        hour_start + chrono::Duration::minutes(30)
    } else {
        hour_start + chrono::Duration::hours(1)
    }
}

#[derive(Default)]
struct ScheduleState {
    timer: Option<JoinHandle<()>>,
    next_fire_at: Option<NaiveDateTime>,
    /// Bumped whenever a timer is armed or the schedule stops.
    generation: u64,
    /// Generation whose run is in flight.
    firing: Option<u64>,
}

/// Drives a [`RunTrigger`] on half-hour boundaries.
pub struct Scheduler {
    trigger: Arc<dyn RunTrigger>,
    host: Arc<dyn HostSink>,
    clock: Arc<dyn Clock>,
    state: Mutex<ScheduleState>,
    halted: watch::Sender<bool>,
}

impl Scheduler {
    pub fn new(trigger: Arc<dyn RunTrigger>, host: Arc<dyn HostSink>, clock: Arc<dyn Clock>) -> Self {
        let (halted, _) = watch::channel(false);
        Self {
            trigger,
            host,
            clock,
            state: Mutex::new(ScheduleState::default()),
            halted,
        }
    }

    fn state(&self) -> MutexGuard<'_, ScheduleState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Arms the next half-hour timer. Returns `false` if one is already armed.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut state = self.state();
        if state.timer.is_some() {
            debug!("schedule already armed");
            return false;
        }
        self.halted.send_replace(false);
        self.arm(&mut state, "Scheduled for");
        true
    }

    /// Cancels the pending timer. A run already in flight finishes but does
    /// not re-arm. Returns `false` if nothing was scheduled.
    pub fn stop(&self) -> bool {
        let mut state = self.state();
        let Some(timer) = state.timer.take() else {
            return false;
        };
        if state.firing != Some(state.generation) {
            timer.abort();
        }
        state.next_fire_at = None;
        state.generation += 1;
        info!("schedule stopped");
        self.host.emit(HostEvent::status("Schedule stopped"));
        true
    }

    pub fn is_scheduled(&self) -> bool {
        self.state().timer.is_some()
    }

    /// When the armed timer fires, if any.
    pub fn next_fire_at(&self) -> Option<NaiveDateTime> {
        self.state().next_fire_at
    }

    /// Resolves once a failed run has halted the schedule.
    pub async fn wait_halted(&self) {
        let mut halted = self.halted.subscribe();
        let _ = halted.wait_for(|h| *h).await;
    }

    fn arm(self: &Arc<Self>, state: &mut ScheduleState, label: &str) {
        let now = self.clock.now_local();
        let next = next_half_hour(now);
        let delay = (next - now).to_std().unwrap_or_default();

        state.generation += 1;
        let generation = state.generation;
        state.next_fire_at = Some(next);

        info!(next_fire_at = %next, "run scheduled");
        self.host.emit(HostEvent::status(format!(
            "{label}: {}",
            next.format("%d/%m/%Y %H:%M:%S")
        )));

        let this = Arc::clone(self);
        state.timer = Some(tokio::spawn(async move {
            sleep(delay).await;
            this.fire(generation).await;
        }));
    }

    async fn fire(self: Arc<Self>, generation: u64) {
        {
            let mut state = self.state();
            if state.generation != generation || state.timer.is_none() {
                return;
            }
            state.firing = Some(generation);
        }

        let outcome = self.trigger.run_scheduled().await;

        let current = {
            let mut state = self.state();
            if state.firing == Some(generation) {
                state.firing = None;
            }
            state.generation == generation && state.timer.is_some()
        };

        match outcome {
            Ok(report) => {
                debug!(run_id = %report.run_id, "scheduled run finished");
                if current {
                    let mut state = self.state();
                    self.arm(&mut state, "Next run");
                }
            }
            Err(err) => {
                error!(error = %err, "scheduled run failed; halting schedule");
                self.host.emit(HostEvent::error(format!(
                    "Scheduler halted after failed run: {err}"
                )));
                if current {
                    self.stop();
                }
                self.halted.send_replace(true);
            }
        }
    }
}

use super::{load_config, Globals};
use crate::render;
use crate::session::Session;
use anyhow::{bail, Result};
use probe_core::{HostEvent, Scheduler, SystemClock};
use std::sync::Arc;
use tracing::warn;

pub async fn run(globals: &Globals) -> Result<()> {
    let config = load_config(globals)?;
    let host = render::sink(globals.json);
    let session = Session::start(&config, host.clone(), globals.json).await?;

    let scheduler = Arc::new(Scheduler::new(
        session.controller.clone(),
        host.clone(),
        Arc::new(SystemClock),
    ));
    scheduler.start();

    let halted = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            scheduler.stop();
            false
        }
        _ = scheduler.wait_halted() => true,
    };

    // Stopping the scheduler leaves a run already firing alone; the bridge
    // must outlive it or its sends and alert fail against a dead client.
    if session.controller.is_running() {
        host.emit(HostEvent::status(
            "Waiting for the current run to finish (Ctrl-C again to quit now)",
        ));
        tokio::select! {
            () = session.controller.wait_idle() => {}
            _ = tokio::signal::ctrl_c() => warn!("quitting with a run in flight"),
        }
    }
    session.shutdown().await;

    if halted {
        bail!("schedule halted after a failed run");
    }
    Ok(())
}

//! Bring-up shared by `run` and `watch`: lock, bridge, controller, relays.

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use probe_core::{
    spawn_connection_monitor, spawn_inbound_log, BridgeOptions, BridgeTransport, Config,
    ConnectionEvent, Controller, HostSink, InstanceLock, SystemClock, TimestampBand, Transport,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

pub struct Session {
    pub controller: Arc<Controller>,
    bridge: Arc<BridgeTransport>,
    relays: Vec<JoinHandle<()>>,
    _lock: InstanceLock,
}

impl Session {
    /// Locks the capture root, starts the bridge and waits until the client is ready.
    pub async fn start(config: &Config, host: Arc<dyn HostSink>, json: bool) -> Result<Self> {
        let lock = InstanceLock::acquire(&config.capture.root)
            .context("Failed to lock the capture directory")?;

        let compositor = TimestampBand::from_optional_font(config.capture.font_path.as_deref())
            .context("Failed to load the capture font")?;
        let bridge = Arc::new(
            BridgeTransport::spawn(BridgeOptions::from_config(&config.transport))
                .context("Failed to start the bridge")?,
        );
        let controller = Arc::new(Controller::new(
            config,
            bridge.clone(),
            bridge.clone(),
            Arc::new(compositor),
            host.clone(),
            Arc::new(SystemClock),
        )?);

        let mut connection = bridge.events().subscribe_connection();
        let relays = vec![
            spawn_connection_monitor(bridge.clone(), host.clone(), controller.alerter().clone()),
            spawn_inbound_log(bridge.clone(), controller.registry().clone(), host),
        ];

        bridge
            .initialize()
            .await
            .context("Bridge did not accept initialize")?;

        let spinner = (!json).then(|| {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.set_message("Waiting for the client to be ready...");
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        });
        let ready = wait_ready(&mut connection).await;
        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }
        ready?;

        controller.initialize().await;
        Ok(Self {
            controller,
            bridge,
            relays,
            _lock: lock,
        })
    }

    /// Stops the relays and the bridge.
    pub async fn shutdown(self) {
        for relay in &self.relays {
            relay.abort();
        }
        if let Err(e) = self.bridge.shutdown().await {
            tracing::warn!(error = %e, "bridge did not shut down cleanly");
        }
    }
}

async fn wait_ready(
    connection: &mut tokio::sync::broadcast::Receiver<ConnectionEvent>,
) -> Result<()> {
    loop {
        match connection.recv().await {
            Ok(ConnectionEvent::Ready) => return Ok(()),
            Ok(ConnectionEvent::AuthFailure(message)) => {
                bail!("Authentication failed: {message}")
            }
            Ok(ConnectionEvent::Disconnected(reason)) => {
                bail!("Client disconnected before it was ready: {reason}")
            }
            Ok(ConnectionEvent::Qr(_)) | Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => bail!("Bridge closed its event stream"),
        }
    }
}

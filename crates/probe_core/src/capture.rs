//! Milestone captures: focus the conversation, screenshot, stamp, file.
//!
//! Captures are filed as
//! `<root>/<Month>/<DD-MM-YYYY>/<Shift>/<basename>-<HH:MM>.png`.

use crate::error::{ProbeError, Result};
use crate::host::{HostEvent, HostSink};
use crate::recipients::RecipientRegistry;
use crate::transport::{Compositor, ScreenCapture, Transport};
use crate::types::{CaptureRecord, Milestone};
use crate::Clock;
use async_trait::async_trait;
use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Work shift a capture is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shift {
    Night,
    Morning,
    Afternoon,
}

impl Shift {
    /// Shift for a local wall-clock time.
    ///
    /// Weekends: Night 00-07, Morning 08-15, Afternoon 16-23.
    /// Weekdays: Night 00-08, Morning 09-17, Afternoon 18-23.
    pub fn for_time(at: NaiveDateTime) -> Self {
        let hour = at.hour();
        let (morning_from, afternoon_from) = match at.weekday() {
            Weekday::Sat | Weekday::Sun => (8, 16),
            _ => (9, 18),
        };
        if hour < morning_from {
            Self::Night
        } else if hour < afternoon_from {
            Self::Morning
        } else {
            Self::Afternoon
        }
    }
}

impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Night => f.write_str("Night"),
            Self::Morning => f.write_str("Morning"),
            Self::Afternoon => f.write_str("Afternoon"),
        }
    }
}

/// Whether filenames may contain `:`.
pub fn colons_allowed_by_default() -> bool {
    !cfg!(windows)
}

/// Where a capture of `milestone` taken at `at` is filed.
pub fn filing_path(
    root: &Path,
    at: NaiveDateTime,
    milestone: Milestone,
    colons_allowed: bool,
) -> PathBuf {
    let separator = if colons_allowed { ":" } else { "-" };
    let file_name = format!(
        "{}-{:02}{}{:02}.png",
        milestone.basename(),
        at.hour(),
        separator,
        at.minute()
    );
    root.join(at.format("%B").to_string())
        .join(at.format("%d-%m-%Y").to_string())
        .join(Shift::for_time(at).to_string())
        .join(file_name)
}

/// One way of bringing a conversation to the front.
#[async_trait]
pub trait SurfaceStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns `Ok(true)` when the conversation is now active.
    async fn try_activate(
        &self,
        transport: &dyn Transport,
        address: &str,
        hint: Option<&str>,
    ) -> Result<bool>;
}

/// Asks the transport to open the conversation directly.
pub struct DirectActivation;

#[async_trait]
impl SurfaceStrategy for DirectActivation {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn try_activate(
        &self,
        transport: &dyn Transport,
        address: &str,
        _hint: Option<&str>,
    ) -> Result<bool> {
        transport.activate_surface(address).await
    }
}

/// Types the display-name hint (or the address) into the search box.
pub struct SearchAndSelect;

#[async_trait]
impl SurfaceStrategy for SearchAndSelect {
    fn name(&self) -> &'static str {
        "search"
    }

    async fn try_activate(
        &self,
        transport: &dyn Transport,
        address: &str,
        hint: Option<&str>,
    ) -> Result<bool> {
        let query = hint.unwrap_or_else(|| crate::types::address_number(address));
        transport.search_surface(query).await
    }
}

/// Scans the visible conversation list for the display-name hint.
pub struct ListScan;

#[async_trait]
impl SurfaceStrategy for ListScan {
    fn name(&self) -> &'static str {
        "list-scan"
    }

    async fn try_activate(
        &self,
        transport: &dyn Transport,
        _address: &str,
        hint: Option<&str>,
    ) -> Result<bool> {
        match hint {
            Some(hint) => transport.scan_surface_list(hint).await,
            None => Ok(false),
        }
    }
}

/// Direct activation, then search, then list scan.
pub fn default_strategies() -> Vec<Box<dyn SurfaceStrategy>> {
    vec![
        Box::new(DirectActivation),
        Box::new(SearchAndSelect),
        Box::new(ListScan),
    ]
}

/// Settings for the capture pipeline.
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub root: PathBuf,
    pub surface_hint: Option<String>,
    pub colons_allowed: bool,
}

/// Screenshots the conversation at milestones and files the result.
pub struct CapturePipeline {
    transport: Arc<dyn Transport>,
    screen: Arc<dyn ScreenCapture>,
    compositor: Arc<dyn Compositor>,
    registry: Arc<RecipientRegistry>,
    host: Arc<dyn HostSink>,
    clock: Arc<dyn Clock>,
    strategies: Vec<Box<dyn SurfaceStrategy>>,
    settings: RwLock<CaptureSettings>,
}

impl CapturePipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transport: Arc<dyn Transport>,
        screen: Arc<dyn ScreenCapture>,
        compositor: Arc<dyn Compositor>,
        registry: Arc<RecipientRegistry>,
        host: Arc<dyn HostSink>,
        clock: Arc<dyn Clock>,
        settings: CaptureSettings,
    ) -> Self {
        Self {
            transport,
            screen,
            compositor,
            registry,
            host,
            clock,
            strategies: default_strategies(),
            settings: RwLock::new(settings),
        }
    }

    /// Replaces the surface-activation chain.
    pub fn with_strategies(mut self, strategies: Vec<Box<dyn SurfaceStrategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    /// Current capture root.
    pub fn root(&self) -> PathBuf {
        self.settings
            .read()
            .map(|s| s.root.clone())
            .unwrap_or_default()
    }

    /// Points future captures at a new root, creating it.
    pub fn set_root(&self, root: PathBuf) -> Result<()> {
        fs::create_dir_all(&root)?;
        if let Ok(mut settings) = self.settings.write() {
            settings.root = root;
        }
        Ok(())
    }

    fn settings(&self) -> CaptureSettings {
        self.settings
            .read()
            .map(|s| s.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Tries each strategy in order until one reports success.
    ///
    /// Never fails: strategy errors are logged and the next one is tried.
    pub async fn ensure_surface(&self, address: &str) -> bool {
        let hint = self.settings().surface_hint;
        for strategy in &self.strategies {
            match strategy
                .try_activate(self.transport.as_ref(), address, hint.as_deref())
                .await
            {
                Ok(true) => {
                    debug!(strategy = strategy.name(), address, "conversation surface active");
                    return true;
                }
                Ok(false) => {}
                Err(e) => {
                    debug!(strategy = strategy.name(), error = %e, "surface strategy failed");
                }
            }
        }
        debug!(address, "no strategy activated the conversation; capturing as-is");
        false
    }

    /// Captures the conversation for `milestone` and files it.
    ///
    /// Surface activation is best-effort. Screenshot, compositing, directory
    /// creation and the write are required and fail as `Capture` errors.
    pub async fn capture(
        &self,
        milestone: Milestone,
        preferred_address: Option<&str>,
    ) -> Result<CaptureRecord> {
        let address = preferred_address
            .map(str::to_string)
            .unwrap_or_else(|| self.registry.primary());
        self.ensure_surface(&address).await;

        let raw = self
            .screen
            .screenshot()
            .await
            .map_err(|e| ProbeError::Capture(format!("screenshot: {e}")))?;

        let now = self.clock.now_local();
        let stamp = now.format("%d/%m/%Y %H:%M:%S").to_string();
        let stamped = self
            .compositor
            .overlay_timestamp_band(&raw, &stamp)
            .map_err(|e| ProbeError::Capture(format!("timestamp overlay: {e}")))?;

        let settings = self.settings();
        let path = filing_path(&settings.root, now, milestone, settings.colons_allowed);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ProbeError::Capture(format!("create {}: {e}", parent.display()))
            })?;
        }
        fs::write(&path, &stamped)
            .map_err(|e| ProbeError::Capture(format!("write {}: {e}", path.display())))?;

        info!(path = %path.display(), %milestone, "capture saved");
        self.host.emit(HostEvent::Capture {
            label: milestone.basename().to_string(),
            file_path: path.clone(),
        });
        self.host
            .emit(HostEvent::success(format!("Capture saved to: {}", path.display())));

        Ok(CaptureRecord {
            label: milestone,
            file_path: path,
            captured_at: now,
        })
    }
}

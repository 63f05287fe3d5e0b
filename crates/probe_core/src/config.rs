//! Configuration for the probe: TOML file, then environment, then validation.

use crate::capture::colons_allowed_by_default;
use crate::error::{ProbeError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "quoteprobe.toml";

/// Complete probe configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Messaging transport and addressing.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Capture filing and surface handling.
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Wait bounds and pauses.
    #[serde(default)]
    pub timing: TimingConfig,
}

impl Config {
    /// Loads configuration from `path`, or from `quoteprobe.toml` in the
    /// working directory when present, or defaults.
    ///
    /// An explicit path that does not exist is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ProbeError::ConfigError(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                path.to_path_buf()
            }
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    return Ok(Config::default());
                }
                default
            }
        };

        let content = fs::read_to_string(&path)
            .map_err(|e| ProbeError::ConfigError(format!("failed to read config: {}", e)))?;
        Self::from_toml(&content)
    }

    /// Parses a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ProbeError::ConfigError(format!("failed to parse config: {}", e)))
    }

    /// Serializes the configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ProbeError::ConfigError(format!("failed to serialize config: {}", e)))
    }

    /// File, then process environment, then validation.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_with(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Overlays environment variables read through `lookup`.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(alert) = lookup("ALERT_CHAT_ID") {
            self.transport.alert_address = alert.trim().to_string();
        }
        if let Some(ids) = lookup("CHAT_IDS") {
            self.transport.recipients = split_list(&ids);
        }
        if let Some(dir) = lookup("CAPTURE_DIR") {
            self.capture.root = PathBuf::from(dir.trim());
        }
        if let Some(hint) = lookup("SURFACE_HINT") {
            let hint = hint.trim();
            self.capture.surface_hint = (!hint.is_empty()).then(|| hint.to_string());
        }
        if let Some(zoom) = lookup("DISPLAY_ZOOM") {
            self.capture.zoom = zoom.trim().parse().map_err(|_| {
                ProbeError::ConfigError(format!("DISPLAY_ZOOM is not a number: {zoom}"))
            })?;
        }
        if let Some(headless) = lookup("HEADLESS") {
            self.transport.headless = parse_flag(&headless);
        }
        if let Some(command) = lookup("BRIDGE_COMMAND") {
            self.transport.bridge_command =
                command.split_whitespace().map(str::to_string).collect();
        }
        Ok(())
    }

    /// Checks invariants the rest of the crate relies on.
    pub fn validate(&self) -> Result<()> {
        if self.transport.recipients.iter().all(|r| r.trim().is_empty()) {
            return Err(ProbeError::ConfigError(
                "at least one recipient address is required".into(),
            ));
        }
        if self.transport.alert_address.trim().is_empty() {
            return Err(ProbeError::ConfigError("alert address is empty".into()));
        }
        if !(self.capture.zoom > 0.0 && self.capture.zoom <= 5.0) {
            return Err(ProbeError::ConfigError(format!(
                "zoom must be in (0, 5], got {}",
                self.capture.zoom
            )));
        }
        Ok(())
    }
}

/// Comma-separated list, trimmed, empties dropped.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Messaging transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransportConfig {
    /// Where operator alerts go.
    pub alert_address: String,

    /// Conversations the scenario targets.
    pub recipients: Vec<String>,

    /// Sidecar argv; empty means the CLI cannot start a live transport.
    pub bridge_command: Vec<String>,

    /// Run the sidecar's browser without a window (default: false).
    pub headless: bool,

    /// Bound on a single bridge request in seconds (default: 30).
    pub request_timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            alert_address: "202284772376688@lid".into(),
            recipients: vec!["104977657778311@lid".into()],
            bridge_command: Vec::new(),
            headless: false,
            request_timeout_secs: 30,
        }
    }
}

impl TransportConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CaptureConfig {
    /// Root directory of the capture tree (default: `./captures`).
    pub root: PathBuf,

    /// Display name of the target conversation, used by search and list scan.
    pub surface_hint: Option<String>,

    /// Display zoom factor applied once the transport is ready (default: 1.0).
    pub zoom: f32,

    /// TTF/OTF used for the timestamp text. Unset means an installed
    /// sans-serif system font.
    pub font_path: Option<PathBuf>,

    /// Whether filenames may contain `:`; unset means "unless on Windows".
    pub colon_in_filenames: Option<bool>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("captures"),
            surface_hint: None,
            zoom: 1.0,
            font_path: None,
            colon_in_filenames: None,
        }
    }
}

impl CaptureConfig {
    pub fn colons_allowed(&self) -> bool {
        self.colon_in_filenames
            .unwrap_or_else(colons_allowed_by_default)
    }
}

/// Timeouts and pauses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimingConfig {
    /// Text waits (default: 65).
    pub text_timeout_secs: u64,
    /// Media waits (default: 65).
    pub media_timeout_secs: u64,
    /// The opening attachment wait (default: 120).
    pub opening_media_timeout_secs: u64,
    /// Compound waits, per condition (default: 120).
    pub compound_timeout_secs: u64,
    /// Pause after the opening broadcast (default: 3000).
    pub initial_settle_ms: u64,
    /// Pause before the opening capture (default: 500).
    pub capture_settle_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            text_timeout_secs: 65,
            media_timeout_secs: 65,
            opening_media_timeout_secs: 120,
            compound_timeout_secs: 120,
            initial_settle_ms: 3000,
            capture_settle_ms: 500,
        }
    }
}

impl TimingConfig {
    pub fn text_timeout(&self) -> Duration {
        Duration::from_secs(self.text_timeout_secs)
    }

    pub fn media_timeout(&self) -> Duration {
        Duration::from_secs(self.media_timeout_secs)
    }

    pub fn opening_media_timeout(&self) -> Duration {
        Duration::from_secs(self.opening_media_timeout_secs)
    }

    pub fn compound_timeout(&self) -> Duration {
        Duration::from_secs(self.compound_timeout_secs)
    }

    pub fn initial_settle(&self) -> Duration {
        Duration::from_millis(self.initial_settle_ms)
    }

    pub fn capture_settle(&self) -> Duration {
        Duration::from_millis(self.capture_settle_ms)
    }
}

//! Quote Probe Core Library
//!
//! Drives a scripted quoting conversation against a remote chat party and
//! proves it completed, providing:
//! - Accent- and markup-insensitive text matching
//! - Bounded waits for inbound text and media
//! - Milestone screenshots filed by month, date and work shift
//! - A step-by-step scenario executor with one alert per failed run
//! - A half-hour scheduler that halts on the first failure
//!
//! # Quick Start
//!
//! ```
//! use probe_core::normalize;
//!
//! assert_eq!(normalize("*¿Tenés* la   Patente?"), "¿tenes la patente?");
//! ```
//!
//! Filing paths are pure functions of the capture time:
//!
//! ```
//! use chrono::NaiveDate;
//! use probe_core::{filing_path, Milestone};
//! use std::path::Path;
//!
//! // A Tuesday, weekday morning shift.
//! let at = NaiveDate::from_ymd_opt(2024, 6, 4).unwrap().and_hms_opt(9, 30, 0).unwrap();
//! let path = filing_path(Path::new("captures"), at, Milestone::Terminal, true);
//! assert_eq!(path, Path::new("captures/June/04-06-2024/Morning/empezar-09:30.png"));
//! ```

mod alert;
mod bridge;
mod capture;
mod compositor;
mod config;
mod controller;
mod error;
mod executor;
mod host;
mod lock;
mod monitor;
mod normalize;
mod recipients;
mod scenario;
mod scheduler;
mod transport;
mod types;
mod waiter;

pub use alert::Alerter;
pub use bridge::{BridgeTransport, BridgeOptions};
pub use capture::{
    colons_allowed_by_default, default_strategies, filing_path, CapturePipeline,
    CaptureSettings, DirectActivation, ListScan, SearchAndSelect, Shift, SurfaceStrategy,
};
pub use compositor::{band_height, font_size, TimestampBand};
pub use config::{CaptureConfig, Config, TimingConfig, TransportConfig, DEFAULT_CONFIG_FILE};
pub use controller::Controller;
pub use error::{ProbeError, Result};
pub use executor::{MilestoneFlags, RunPhase, RunReport, ScenarioExecutor};
pub use host::{Direction, HostEvent, HostSink, MessageLog, NullSink, RecordingSink};
pub use lock::InstanceLock;
pub use monitor::{spawn_connection_monitor, spawn_inbound_log};
pub use normalize::{matches, normalize, prompt_variants, strip_accents};
pub use recipients::RecipientRegistry;
pub use scenario::{
    MediaWait, OpeningStep, ScenarioDefinition, ScenarioStep, Step, TextWait, Wait,
};
pub use scheduler::{next_half_hour, RunTrigger, Scheduler};
pub use transport::{
    Compositor, InboundSubscriber, LoopbackTransport, ScreenCapture, Transport, TransportEvents,
    DEFAULT_BUS_CAPACITY,
};
pub use types::*;
pub use waiter::{Condition, EventWaiter};

use chrono::NaiveDateTime;

/// Local wall-clock source.
///
/// Capture stamps, filing paths and the schedule all read local time through
/// this trait so tests can pin it.
pub trait Clock: Send + Sync {
    /// Current local date and time.
    fn now_local(&self) -> NaiveDateTime;
}

impl<F> Clock for F
where
    F: Fn() -> NaiveDateTime + Send + Sync,
{
    fn now_local(&self) -> NaiveDateTime {
        self()
    }
}

/// The machine's local clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_local(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

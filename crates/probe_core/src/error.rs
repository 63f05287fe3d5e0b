//! Error types for probe_core operations.

use crate::types::Milestone;
use thiserror::Error;

/// Core error type for scenario runs and their collaborators.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// A wait did not observe a matching inbound event within its bound.
    #[error("{expected} (no match after {waited_ms}ms)")]
    Timeout {
        /// What the wait was looking for, or the caller-supplied failure message.
        expected: String,
        /// How long the wait was armed.
        waited_ms: u64,
    },

    /// The messaging transport failed to send, subscribe or answer.
    #[error("transport error: {0}")]
    Transport(String),

    /// A run finished its steps without observing a required milestone.
    #[error("milestone not verified: {0}")]
    MilestoneNotVerified(Milestone),

    /// The capture pipeline failed at a required milestone.
    #[error("capture failed: {0}")]
    Capture(String),

    /// An operator alert could not be delivered.
    #[error("alert delivery failed: {0}")]
    AlertDelivery(String),

    /// A scenario step failed; wraps the underlying cause.
    #[error("step {step} failed: {source}")]
    StepFailed {
        /// 1-based step index.
        step: usize,
        /// What went wrong inside the step.
        #[source]
        source: Box<ProbeError>,
    },

    /// A manual run was requested while another run is in flight.
    #[error("a scenario run is already in progress")]
    RunInProgress,

    /// The transport has not been initialized yet.
    #[error("client not initialized")]
    NotInitialized,

    /// Configuration error (loading, parsing, invalid values).
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Another process holds the instance lock.
    #[error("another probe instance is running (PID: {pid})")]
    InstanceLocked {
        /// Process ID holding the lock
        pid: u32,
    },

    /// Image decoding, compositing or encoding failed.
    #[error("image error: {0}")]
    Image(String),

    /// Serialization error on the bridge protocol.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProbeError {
    /// Wraps an error with the 1-based index of the step that raised it.
    pub fn in_step(self, step: usize) -> Self {
        Self::StepFailed {
            step,
            source: Box::new(self),
        }
    }

    /// The 1-based step index if this error came out of a scenario step.
    pub fn failed_step(&self) -> Option<usize> {
        match self {
            Self::StepFailed { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// The innermost cause, unwrapping step context.
    pub fn root_cause(&self) -> &ProbeError {
        match self {
            Self::StepFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Whether this error must abort the run it occurred in.
    ///
    /// Alert delivery is best-effort; everything else is fatal.
    pub fn is_fatal_to_run(&self) -> bool {
        !matches!(self.root_cause(), Self::AlertDelivery(_))
    }

    /// Returns a user-friendly recovery suggestion for the error, if available.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self.root_cause() {
            Self::Timeout { .. } => Some(
                "The remote party did not answer in time. Check the quoting flow manually, then restart the schedule.",
            ),
            Self::MilestoneNotVerified(_) => {
                Some("The scenario definition skipped a milestone step. Review the step list.")
            }
            Self::NotInitialized => Some("Initialize the client before running the scenario."),
            Self::RunInProgress => Some("Wait for the current run to finish."),
            Self::InstanceLocked { .. } => Some(
                "Another quoteprobe process is using this capture root. Stop it, or remove .quoteprobe.lock if it is dead.",
            ),
            Self::ConfigError(_) => {
                Some("Check quoteprobe.toml and the CHAT_IDS / ALERT_CHAT_ID environment variables.")
            }
            Self::Transport(_) => Some("Check that the bridge process is running and paired."),
            _ => None,
        }
    }
}

/// Convenience Result type for probe_core operations.
pub type Result<T> = std::result::Result<T, ProbeError>;

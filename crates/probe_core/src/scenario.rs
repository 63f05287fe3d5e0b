//! Declarative scenario definitions.
//!
//! A scenario is an opening message plus an ordered list of steps. The
//! built-in quote scenario is the only one the probe runs in production;
//! tests build their own through the same types.

use crate::config::TimingConfig;
use crate::error::{ProbeError, Result};
use crate::types::AttachmentKind;
use crate::waiter::Condition;
use std::time::Duration;

/// Wait for a message containing any of the candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextWait {
    pub candidates: Vec<String>,
    pub timeout: Duration,
}

/// Wait for a message carrying media of `kind`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaWait {
    pub kind: AttachmentKind,
    pub timeout: Duration,
    pub failure_message: Option<String>,
}

/// The wait a step performs before acting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wait {
    Text(TextWait),
    Media(MediaWait),
    /// Every condition must match; they are awaited one after another, each
    /// with the full timeout.
    Any {
        conditions: Vec<Condition>,
        timeout: Duration,
    },
}

/// The opening milestone: the attachment that starts the flow, then the
/// first prompt, then a capture and the scripted reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpeningStep {
    pub media: MediaWait,
    /// Prompt as written; accent and bold variants are accepted too.
    pub prompt: String,
    pub prompt_timeout: Duration,
    /// Pause between the prompt arriving and the capture.
    pub settle: Duration,
    pub reply: String,
}

/// A generic step: optional wait, then optional reply or send, then optional pause.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Step {
    pub wait: Option<Wait>,
    pub respond: Option<String>,
    pub send: Option<String>,
    pub delay: Option<Duration>,
}

impl Step {
    pub fn wait_text(candidate: impl Into<String>, timeout: Duration) -> Self {
        Self {
            wait: Some(Wait::Text(TextWait {
                candidates: vec![candidate.into()],
                timeout,
            })),
            ..Self::default()
        }
    }

    pub fn wait_media(
        kind: AttachmentKind,
        timeout: Duration,
        failure_message: impl Into<String>,
    ) -> Self {
        Self {
            wait: Some(Wait::Media(MediaWait {
                kind,
                timeout,
                failure_message: Some(failure_message.into()),
            })),
            ..Self::default()
        }
    }

    pub fn wait_any(conditions: Vec<Condition>, timeout: Duration) -> Self {
        Self {
            wait: Some(Wait::Any {
                conditions,
                timeout,
            }),
            ..Self::default()
        }
    }

    pub fn pause(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn send(text: impl Into<String>) -> Self {
        Self {
            send: Some(text.into()),
            ..Self::default()
        }
    }

    /// Replies with `text` once the wait matched.
    pub fn respond(mut self, text: impl Into<String>) -> Self {
        self.respond = Some(text.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioStep {
    Opening(OpeningStep),
    Step(Step),
}

impl From<Step> for ScenarioStep {
    fn from(step: Step) -> Self {
        Self::Step(step)
    }
}

/// An immutable scenario: opening broadcast plus steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioDefinition {
    pub initial_message: String,
    /// Pause after the opening broadcast.
    pub initial_settle: Duration,
    /// Media kind whose arrival marks the end of the flow.
    pub terminal_attachment: AttachmentKind,
    pub steps: Vec<ScenarioStep>,
}

impl ScenarioDefinition {
    /// The car-insurance quote conversation.
    pub fn quote(timing: &TimingConfig) -> Self {
        let text = timing.text_timeout();
        let prompt = |p: &str, reply: &str| ScenarioStep::from(Step::wait_text(p, text).respond(reply));

        Self {
            initial_message: "cotizar auto".into(),
            initial_settle: timing.initial_settle(),
            terminal_attachment: AttachmentKind::Image,
            steps: vec![
                ScenarioStep::Opening(OpeningStep {
                    media: MediaWait {
                        kind: AttachmentKind::Sticker,
                        timeout: timing.opening_media_timeout(),
                        failure_message: Some("No opening sticker received".into()),
                    },
                    prompt: "¿Tenés la patente del auto?".into(),
                    prompt_timeout: text,
                    settle: timing.capture_settle(),
                    reply: "SI".into(),
                }),
                prompt("¿Cuál es la patente de tu vehículo?", "AA877WW"),
                prompt("¿Son correctos estos datos?", "NO"),
                prompt("Marca", "Ford"),
                prompt("Año", "2020"),
                prompt("Modelo", "KA"),
                prompt("¿Cuál de estas versiones de vehículo es el tuyo?", "1"),
                prompt("¿El vehículo cuenta con GNC?", "SI"),
                prompt("¿Cuál es el uso que le das a tu auto?", "SI"),
                prompt("¿Cuál es tu código postal?", "1405"),
                Step::wait_media(
                    AttachmentKind::Image,
                    timing.media_timeout(),
                    "No documentation received",
                )
                .into(),
                Step::pause(Duration::from_secs(5)).into(),
                Step::send("empezar").into(),
            ],
        }
    }

    /// Checks structural rules the executor relies on.
    pub fn validate(&self) -> Result<()> {
        if self.initial_message.trim().is_empty() {
            return Err(ProbeError::ConfigError("initial message is empty".into()));
        }
        for (index, step) in self.steps.iter().enumerate() {
            match step {
                ScenarioStep::Opening(opening) => {
                    if index != 0 {
                        return Err(ProbeError::ConfigError(format!(
                            "opening step must be first, found at step {}",
                            index + 1
                        )));
                    }
                    if crate::normalize::normalize(&opening.prompt).is_empty() {
                        return Err(ProbeError::ConfigError("opening prompt is empty".into()));
                    }
                }
                ScenarioStep::Step(step) => {
                    if step.respond.is_some() && step.send.is_some() {
                        return Err(ProbeError::ConfigError(format!(
                            "step {} both responds and sends",
                            index + 1
                        )));
                    }
                    if let Some(Wait::Text(wait)) = &step.wait {
                        let blank = wait.candidates.is_empty()
                            || wait
                                .candidates
                                .iter()
                                .any(|c| crate::normalize::normalize(c).is_empty());
                        if blank {
                            return Err(ProbeError::ConfigError(format!(
                                "step {} has a candidate that matches every message",
                                index + 1
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

use super::rig::{Rig, SCREEN_COLOR, SCREEN_HEIGHT, SCREEN_WIDTH};
use anyhow::{anyhow, bail, ensure, Context, Result};
use probe_core::{band_height, filing_path, HostEvent, Milestone, RunPhase, RunReport};
use std::path::Path;

/// Outcome of the last manual run.
pub type RunOutcome = probe_core::Result<RunReport>;

/// Declarative checks on the rig after a run.
pub enum Assertion {
    // Run outcome
    RunSucceeded,
    RunFailedAtStep(usize),
    RunFailedWith(String),
    RunRejectedAsBusy,
    StepsCompleted(usize),
    Phase(RunPhase),

    // Captures
    /// Filed where its timestamp says, with the band applied.
    CaptureFiled(Milestone),
    NoCapture(Milestone),
    CaptureCount(usize),
    CaptureUnder(String),

    // Outbound traffic
    Sent { to: String, text: String },
    NotSent(String),
    /// Replies (everything after the first message) went only here.
    RepliesOnlyTo(String),
    AlertCount(usize),
    AlertContains(String),

    // Host events
    HostEvent { kind: &'static str, contains: String },
    NoHostEvent { kind: &'static str, contains: String },

    Custom(Box<dyn Fn(&Rig) -> Result<()> + Send + Sync>),
}

impl std::fmt::Debug for Assertion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RunSucceeded => write!(f, "RunSucceeded"),
            Self::RunFailedAtStep(n) => write!(f, "RunFailedAtStep({n})"),
            Self::RunFailedWith(s) => write!(f, "RunFailedWith({s:?})"),
            Self::RunRejectedAsBusy => write!(f, "RunRejectedAsBusy"),
            Self::StepsCompleted(n) => write!(f, "StepsCompleted({n})"),
            Self::Phase(p) => write!(f, "Phase({p:?})"),
            Self::CaptureFiled(m) => write!(f, "CaptureFiled({m})"),
            Self::NoCapture(m) => write!(f, "NoCapture({m})"),
            Self::CaptureCount(n) => write!(f, "CaptureCount({n})"),
            Self::CaptureUnder(s) => write!(f, "CaptureUnder({s:?})"),
            Self::Sent { to, text } => write!(f, "Sent {{ to: {to:?}, text: {text:?} }}"),
            Self::NotSent(s) => write!(f, "NotSent({s:?})"),
            Self::RepliesOnlyTo(s) => write!(f, "RepliesOnlyTo({s:?})"),
            Self::AlertCount(n) => write!(f, "AlertCount({n})"),
            Self::AlertContains(s) => write!(f, "AlertContains({s:?})"),
            Self::HostEvent { kind, contains } => {
                write!(f, "HostEvent {{ kind: {kind:?}, contains: {contains:?} }}")
            }
            Self::NoHostEvent { kind, contains } => {
                write!(f, "NoHostEvent {{ kind: {kind:?}, contains: {contains:?} }}")
            }
            Self::Custom(_) => write!(f, "Custom(<fn>)"),
        }
    }
}

impl Assertion {
    pub fn check(&self, rig: &Rig, run: Option<&RunOutcome>) -> Result<()> {
        match self {
            Self::RunSucceeded => {
                let run = last_run(run)?;
                if let Err(e) = run {
                    bail!("run failed: {e}");
                }
            }
            Self::RunFailedAtStep(step) => {
                let err = failure(run)?;
                ensure!(
                    err.failed_step() == Some(*step),
                    "expected failure at step {step}, got: {err}"
                );
            }
            Self::RunFailedWith(text) => {
                let err = failure(run)?;
                ensure!(
                    err.to_string().contains(text.as_str()),
                    "expected failure containing {text:?}, got: {err}"
                );
            }
            Self::RunRejectedAsBusy => {
                let err = failure(run)?;
                ensure!(
                    matches!(err, probe_core::ProbeError::RunInProgress),
                    "expected RunInProgress, got: {err}"
                );
            }
            Self::StepsCompleted(n) => {
                let report = report(run)?;
                ensure!(
                    report.steps_completed == *n,
                    "expected {n} steps, report has {}",
                    report.steps_completed
                );
            }
            Self::Phase(expected) => {
                let phase = rig.controller.phase();
                ensure!(&phase == expected, "expected phase {expected:?}, got {phase:?}");
            }
            Self::CaptureFiled(milestone) => check_capture(rig, run, *milestone)?,
            Self::NoCapture(milestone) => {
                let found = captures_named(rig, *milestone);
                ensure!(found.is_empty(), "unexpected {milestone} capture: {found:?}");
            }
            Self::CaptureCount(n) => {
                let files = rig.captured_files();
                ensure!(files.len() == *n, "expected {n} captures, found {files:?}");
            }
            Self::CaptureUnder(dir) => {
                let root = rig.dir.path().join(dir);
                ensure!(
                    rig.captured_files().iter().all(|f| f.starts_with(&root)),
                    "captures outside {}",
                    root.display()
                );
            }
            Self::Sent { to, text } => {
                let sent = rig.sent_to(to);
                ensure!(
                    sent.iter().any(|s| s == text),
                    "{text:?} was not sent to {to}; sent {sent:?}"
                );
            }
            Self::NotSent(text) => {
                let hit = rig.transport.sent().into_iter().find(|(_, t)| t == text);
                ensure!(hit.is_none(), "{text:?} was sent: {hit:?}");
            }
            Self::RepliesOnlyTo(address) => {
                let alert = rig.config.transport.alert_address.as_str();
                let stray: Vec<_> = rig
                    .transport
                    .sent()
                    .into_iter()
                    .skip(rig.config.transport.recipients.len())
                    .filter(|(to, _)| to != address && to != alert)
                    .collect();
                ensure!(stray.is_empty(), "replies went elsewhere: {stray:?}");
            }
            Self::AlertCount(n) => {
                let alerts = rig.alerts();
                ensure!(alerts.len() == *n, "expected {n} alerts, got {alerts:?}");
            }
            Self::AlertContains(text) => {
                let alerts = rig.alerts();
                ensure!(
                    alerts.iter().any(|a| a.contains(text.as_str())),
                    "no alert contains {text:?}: {alerts:?}"
                );
            }
            Self::HostEvent { kind, contains } => {
                ensure!(
                    host_has(rig, kind, contains),
                    "no {kind} host event containing {contains:?}: {:?}",
                    rig.host.of_kind(kind)
                );
            }
            Self::NoHostEvent { kind, contains } => {
                ensure!(
                    !host_has(rig, kind, contains),
                    "unexpected {kind} host event containing {contains:?}"
                );
            }
            Self::Custom(check) => check(rig)?,
        }
        Ok(())
    }
}

fn last_run(run: Option<&RunOutcome>) -> Result<&RunOutcome> {
    run.ok_or_else(|| anyhow!("no run has finished yet"))
}

fn failure(run: Option<&RunOutcome>) -> Result<&probe_core::ProbeError> {
    match last_run(run)? {
        Ok(report) => bail!("run succeeded after {} steps", report.steps_completed),
        Err(e) => Ok(e),
    }
}

fn report(run: Option<&RunOutcome>) -> Result<&RunReport> {
    match last_run(run)? {
        Ok(report) => Ok(report),
        Err(e) => bail!("run failed: {e}"),
    }
}

fn host_has(rig: &Rig, kind: &str, contains: &str) -> bool {
    rig.host.of_kind(kind).iter().any(|event| {
        let text = match event {
            HostEvent::Status(s) | HostEvent::Error(s) | HostEvent::Success(s) => s.clone(),
            HostEvent::Message(log) => format!("{} {}", log.address, log.body),
            HostEvent::Capture { label, file_path } => {
                format!("{label} {}", file_path.display())
            }
            HostEvent::Qr(code) => code.clone(),
            HostEvent::Ready => String::new(),
        };
        text.contains(contains)
    })
}

fn captures_named(rig: &Rig, milestone: Milestone) -> Vec<std::path::PathBuf> {
    rig.captured_files()
        .into_iter()
        .filter(|f| {
            f.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(milestone.basename()))
        })
        .collect()
}

/// The report's record for `milestone` points at the filing path for its
/// timestamp, and the file on disk is the screenshot with a darkened band.
fn check_capture(rig: &Rig, run: Option<&RunOutcome>, milestone: Milestone) -> Result<()> {
    let report = report(run)?;
    let record = report
        .captures
        .iter()
        .find(|c| c.label == milestone)
        .ok_or_else(|| anyhow!("report has no {milestone} capture"))?;

    let expected = filing_path(
        &rig.capture_root(),
        record.captured_at,
        milestone,
        rig.config.capture.colons_allowed(),
    );
    ensure!(
        record.file_path == expected,
        "{milestone} filed at {}, expected {}",
        record.file_path.display(),
        expected.display()
    );
    check_band(&record.file_path)
}

fn check_band(path: &Path) -> Result<()> {
    let image = image::open(path)
        .with_context(|| format!("decode {}", path.display()))?
        .to_rgba8();
    ensure!(
        image.dimensions() == (SCREEN_WIDTH, SCREEN_HEIGHT),
        "capture resized to {:?}",
        image.dimensions()
    );
    let band = band_height(SCREEN_HEIGHT);
    let inside = image.get_pixel(0, band - 1);
    let below = image.get_pixel(0, band);
    ensure!(inside[0] < SCREEN_COLOR[0], "band not darkened: {inside:?}");
    ensure!(below.0 == SCREEN_COLOR, "pixel below band changed: {below:?}");
    Ok(())
}

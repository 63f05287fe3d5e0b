use super::{load_config, Globals};
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use probe_core::{filing_path, Clock, Milestone, Shift, SystemClock};

pub fn run(globals: &Globals, at: Option<&str>, terminal: bool) -> Result<()> {
    let config = load_config(globals)?;
    let at = match at {
        Some(raw) => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
            .with_context(|| format!("Invalid --at '{raw}', expected YYYY-MM-DDTHH:MM"))?,
        None => SystemClock.now_local(),
    };
    let milestone = if terminal {
        Milestone::Terminal
    } else {
        Milestone::Opening
    };
    let path = filing_path(
        &config.capture.root,
        at,
        milestone,
        config.capture.colons_allowed(),
    );
    let shift = Shift::for_time(at);

    if globals.json {
        let value = serde_json::json!({
            "path": path,
            "shift": shift.to_string(),
            "milestone": milestone.to_string(),
        });
        println!("{value}");
    } else {
        println!("{} ({shift})", path.display());
    }
    Ok(())
}

use super::{load_config, print_hint, Globals};
use crate::render;
use crate::session::Session;
use anyhow::Result;
use console::style;
use probe_core::ProbeError;

pub async fn run(globals: &Globals) -> Result<()> {
    let config = load_config(globals)?;
    let host = render::sink(globals.json);

    let session = match Session::start(&config, host, globals.json).await {
        Ok(session) => session,
        Err(e) => {
            if let Some(probe) = e.downcast_ref::<ProbeError>() {
                print_hint(probe);
            }
            return Err(e);
        }
    };

    let outcome = session.controller.run_once().await;
    session.shutdown().await;

    match outcome {
        Ok(report) => {
            if globals.json {
                println!("{}", serde_json::to_string(&report)?);
            } else {
                println!(
                    "{} Run {} finished: {} steps",
                    style("✓").green().bold(),
                    report.run_id,
                    report.steps_completed
                );
                for capture in &report.captures {
                    println!("  {} {}", capture.label, capture.file_path.display());
                }
            }
            Ok(())
        }
        Err(e) => {
            print_hint(&e);
            Err(e.into())
        }
    }
}

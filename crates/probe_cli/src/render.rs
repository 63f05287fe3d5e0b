//! Host event rendering: colored terminal lines or JSON lines.

use console::style;
use probe_core::{Direction, HostEvent, HostSink};
use qrcode::render::unicode;
use qrcode::QrCode;
use std::sync::Arc;

/// Picks the renderer for `--json`.
pub fn sink(json: bool) -> Arc<dyn HostSink> {
    if json {
        Arc::new(JsonLines)
    } else {
        Arc::new(Terminal)
    }
}

/// One JSON object per event on stdout.
pub struct JsonLines;

impl HostSink for JsonLines {
    fn emit(&self, event: HostEvent) {
        if let Ok(line) = serde_json::to_string(&event) {
            println!("{line}");
        }
    }
}

/// Human-readable lines on stdout.
pub struct Terminal;

impl HostSink for Terminal {
    fn emit(&self, event: HostEvent) {
        match event {
            HostEvent::Status(text) => println!("{} {}", style("•").cyan(), text),
            HostEvent::Error(text) => println!("{} {}", style("×").red(), style(text).red()),
            HostEvent::Success(text) => println!("{} {}", style("✓").green(), text),
            HostEvent::Message(log) => {
                let arrow = match log.direction {
                    Direction::In => "←",
                    Direction::Out => "→",
                };
                let time = log
                    .at
                    .with_timezone(&chrono::Local)
                    .format("%H:%M:%S")
                    .to_string();
                let line = format!("{time} {arrow} {}: {}", log.address, log.body);
                if log.target {
                    println!("{line}");
                } else {
                    println!("{}", style(line).dim());
                }
            }
            HostEvent::Capture { label, file_path } => println!(
                "{} {} {}",
                style("capture").magenta().bold(),
                label,
                file_path.display()
            ),
            HostEvent::Qr(code) => {
                println!("{}", style("Scan to pair:").bold());
                println!("{}", qr_block(&code));
            }
            HostEvent::Ready => {}
        }
    }
}

/// The pairing payload as a scannable block of half-height cells. Falls
/// back to the raw payload if it does not fit in a QR code.
fn qr_block(code: &str) -> String {
    match QrCode::new(code.as_bytes()) {
        Ok(qr) => qr
            .render::<unicode::Dense1x2>()
            .dark_color(unicode::Dense1x2::Light)
            .light_color(unicode::Dense1x2::Dark)
            .quiet_zone(true)
            .build(),
        Err(e) => {
            tracing::warn!(error = %e, "pairing code does not fit in a QR code");
            code.to_string()
        }
    }
}

use crate::harness::{Assertion, QuotingParty, Rig, Scenario, ALERT, TARGET};
use probe_core::Milestone;

#[tokio::test(start_paused = true)]
async fn test_missing_opening_sticker_fails_first_step() {
    Scenario::new("no_sticker")
        .remote(QuotingParty::full_quote(TARGET).without_sticker())
        .run_once()
        .assert_failed_at(1)
        .assert_failed_with("No opening sticker received")
        .assert_no_capture(Milestone::Opening)
        .assert(Assertion::CaptureCount(0))
        .assert_not_sent("SI")
        .assert_alerts(1)
        .assert_alert_contains("Error in step 1")
        .assert_host("error", "Scenario error")
        .run()
        .await
        .expect("missing sticker should fail the opening step");
}

#[tokio::test(start_paused = true)]
async fn test_silent_remote_times_out_mid_flow() {
    // Answers the opening, the plate and the data check, then stops.
    Scenario::new("goes_quiet")
        .remote(QuotingParty::full_quote(TARGET).goes_quiet_after(3))
        .run_once()
        .assert_failed_at(4)
        .assert_failed_with("no match after")
        .assert_no_capture(Milestone::Terminal)
        .assert(Assertion::CaptureCount(1))
        .assert_sent(TARGET, "NO")
        .assert_not_sent("Ford")
        .assert_alerts(1)
        .assert_alert_contains("Error in step 4")
        .run()
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_missing_documentation_never_sends_empezar() {
    Scenario::new("no_documentation")
        .remote(QuotingParty::full_quote(TARGET).without_documentation())
        .run_once()
        .assert_failed_at(11)
        .assert_failed_with("No documentation received")
        .assert_no_capture(Milestone::Terminal)
        .assert_not_sent("empezar")
        .assert_alert_contains("No documentation received")
        .run()
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_failed_alert_is_reported_to_host_only() {
    Scenario::new("alert_undeliverable")
        .fail_sends_to(ALERT)
        .remote(QuotingParty::full_quote(TARGET).goes_quiet_after(1))
        .run_once()
        .assert_failed_at(2)
        .assert_alerts(0)
        .assert_host("error", "Could not send alert")
        .run()
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_undeliverable_opening_message_fails_before_any_step() {
    Scenario::new("opening_undeliverable")
        .fail_sends_to(TARGET)
        .run_once()
        .assert_failed_with("rejected")
        .assert(Assertion::Custom(Box::new(|rig: &Rig| {
            anyhow::ensure!(rig.screen.shots() == 0, "screenshot taken");
            Ok(())
        })))
        .assert_alerts(1)
        .assert_alert_contains("Scenario error")
        .run()
        .await
        .unwrap();
}

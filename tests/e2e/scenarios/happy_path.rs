use crate::harness::{Assertion, QuotingParty, Rig, Scenario, TARGET};
use probe_core::{Milestone, RunPhase};

#[tokio::test(start_paused = true)]
async fn test_full_quote_files_both_captures() {
    Scenario::new("full_quote")
        .remote(QuotingParty::full_quote(TARGET))
        .run_once()
        .assert_succeeded()
        .assert(Assertion::StepsCompleted(13))
        .assert_capture(Milestone::Opening)
        .assert_capture(Milestone::Terminal)
        .assert(Assertion::CaptureCount(2))
        .assert_phase(RunPhase::Completed)
        .assert_alerts(0)
        .assert_host("success", "Quote completed successfully.")
        .assert_host("capture", "respuesta-tenes-patente")
        .assert_host("capture", "empezar")
        .run()
        .await
        .expect("full quote should pass");
}

#[tokio::test(start_paused = true)]
async fn test_instant_back_to_back_answers_are_not_lost() {
    Scenario::new("back_to_back_answers")
        .remote(QuotingParty::full_quote(TARGET).back_to_back())
        .run_once()
        .assert_succeeded()
        .assert(Assertion::StepsCompleted(13))
        .assert_capture(Milestone::Opening)
        .assert_capture(Milestone::Terminal)
        .assert_alerts(0)
        .run()
        .await
        .expect("answers sent with no gap should all be seen");
}

#[tokio::test(start_paused = true)]
async fn test_answers_follow_the_script_in_order() {
    Scenario::new("script_order")
        .remote(QuotingParty::full_quote(TARGET))
        .run_once()
        .assert_succeeded()
        .assert(Assertion::Custom(Box::new(|rig: &Rig| {
            let sent = rig.sent_to(TARGET);
            let expected = [
                "cotizar auto",
                "SI",
                "AA877WW",
                "NO",
                "Ford",
                "2020",
                "KA",
                "1",
                "SI",
                "SI",
                "1405",
                "empezar",
            ];
            anyhow::ensure!(sent == expected, "sent {sent:?}");
            Ok(())
        })))
        .run()
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_replies_go_to_the_address_that_answered() {
    let answering = "104977657778311@c.us";
    Scenario::new("answering_address")
        .remote(QuotingParty::full_quote(TARGET).answering_from(answering))
        .run_once()
        .assert_succeeded()
        .assert_sent(TARGET, "cotizar auto")
        .assert_sent(answering, "SI")
        .assert_sent(answering, "empezar")
        .assert(Assertion::RepliesOnlyTo(answering.to_string()))
        .run()
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_opening_goes_to_every_configured_recipient() {
    let second = "5491100000000@c.us";
    Scenario::new("two_recipients")
        .recipients(&[TARGET, second])
        .remote(QuotingParty::full_quote(TARGET))
        .run_once()
        .assert_succeeded()
        .assert_sent(TARGET, "cotizar auto")
        .assert_sent(second, "cotizar auto")
        // Only the recipient that answered gets the replies.
        .assert(Assertion::RepliesOnlyTo(TARGET.to_string()))
        .run()
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_back_to_back_runs_each_file_captures() {
    Scenario::new("back_to_back")
        .remote(QuotingParty::full_quote(TARGET))
        .run_once()
        .assert_succeeded()
        .wait(std::time::Duration::from_secs(120))
        .remote(QuotingParty::full_quote(TARGET))
        .run_once()
        .assert_succeeded()
        .assert(Assertion::CaptureCount(4))
        .run()
        .await
        .unwrap();
}

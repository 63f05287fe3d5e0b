use crate::harness::clock::local;
use crate::harness::{QuotingParty, Rig, TARGET};
use probe_core::{HostEvent, Scheduler};
use std::sync::Arc;
use std::time::Duration;

fn scheduler(rig: &Rig) -> Arc<Scheduler> {
    Arc::new(Scheduler::new(
        rig.controller.clone(),
        rig.host.clone(),
        rig.clock.as_clock(),
    ))
}

fn minutes(n: u64) -> Duration {
    Duration::from_secs(n * 60)
}

#[tokio::test(start_paused = true)]
async fn test_scheduled_run_fires_on_the_half_hour_and_rearms() {
    let rig = Rig::new(local(2024, 6, 4, 10, 5)).await.unwrap();
    let remote = QuotingParty::full_quote(TARGET).spawn(rig.transport.clone());
    let scheduler = scheduler(&rig);

    assert!(scheduler.start());
    assert_eq!(scheduler.next_fire_at(), Some(local(2024, 6, 4, 10, 30)));
    assert!(rig
        .host
        .events()
        .contains(&HostEvent::status("Scheduled for: 04/06/2024 10:30:00")));

    tokio::time::sleep(minutes(24)).await;
    assert!(rig.transport.sent().is_empty(), "fired early");

    tokio::time::sleep(minutes(2)).await;
    assert_eq!(rig.sent_to(TARGET).last().map(String::as_str), Some("empezar"));
    assert_eq!(scheduler.next_fire_at(), Some(local(2024, 6, 4, 11, 0)));
    assert!(rig
        .host
        .events()
        .contains(&HostEvent::status("Next run: 04/06/2024 11:00:00")));
    assert_eq!(rig.captured_files().len(), 2);

    assert!(scheduler.stop());
    assert!(!scheduler.is_scheduled());
    remote.abort();
}

#[tokio::test(start_paused = true)]
async fn test_failed_scheduled_run_halts_with_one_alert() {
    let rig = Rig::new(local(2024, 6, 4, 10, 5)).await.unwrap();
    let scheduler = scheduler(&rig);
    scheduler.start();

    // Nobody answers: the opening wait times out after the first fire.
    tokio::time::timeout(minutes(60), scheduler.wait_halted())
        .await
        .expect("schedule should halt");

    assert!(!scheduler.is_scheduled());
    assert_eq!(scheduler.next_fire_at(), None);
    assert_eq!(rig.alerts().len(), 1);
    assert!(rig.alerts()[0].starts_with("Error in step 1"));
    assert!(rig
        .host
        .of_kind("error")
        .iter()
        .any(|e| matches!(e, HostEvent::Error(s) if s.starts_with("Scheduler halted"))));

    // Nothing fires after the halt.
    let sends = rig.transport.sent().len();
    tokio::time::sleep(minutes(90)).await;
    assert_eq!(rig.transport.sent().len(), sends);
}

#[tokio::test(start_paused = true)]
async fn test_stop_before_boundary_prevents_the_run() {
    let rig = Rig::new(local(2024, 6, 4, 10, 5)).await.unwrap();
    let scheduler = scheduler(&rig);
    scheduler.start();

    tokio::time::sleep(minutes(10)).await;
    assert!(scheduler.stop());
    tokio::time::sleep(minutes(30)).await;

    assert!(rig.transport.sent().is_empty());
    assert!(rig
        .host
        .events()
        .contains(&HostEvent::status("Schedule stopped")));
}

#[tokio::test(start_paused = true)]
async fn test_manual_run_during_scheduled_run_is_rejected() {
    let rig = Rig::new(local(2024, 6, 4, 10, 29)).await.unwrap();
    let remote = QuotingParty::full_quote(TARGET).spawn(rig.transport.clone());
    let scheduler = scheduler(&rig);
    scheduler.start();

    tokio::time::sleep(Duration::from_secs(62)).await;
    assert!(!rig.transport.sent().is_empty(), "scheduled run should have started");
    let manual = rig.controller.run_once().await;
    assert!(matches!(manual, Err(probe_core::ProbeError::RunInProgress)));

    tokio::time::sleep(minutes(2)).await;
    assert_eq!(rig.sent_to(TARGET).last().map(String::as_str), Some("empezar"));
    scheduler.stop();
    remote.abort();
}

#[tokio::test(start_paused = true)]
async fn test_stop_mid_run_lets_the_run_finish_before_idle() {
    let rig = Rig::new(local(2024, 6, 4, 10, 29)).await.unwrap();
    let remote = QuotingParty::full_quote(TARGET).spawn(rig.transport.clone());
    let scheduler = scheduler(&rig);
    scheduler.start();

    tokio::time::sleep(Duration::from_secs(62)).await;
    assert!(rig.controller.is_running());
    assert!(scheduler.stop());

    rig.controller.wait_idle().await;

    assert_eq!(rig.sent_to(TARGET).last().map(String::as_str), Some("empezar"));
    assert!(rig.alerts().is_empty());
    assert_eq!(rig.captured_files().len(), 2);
    remote.abort();
}

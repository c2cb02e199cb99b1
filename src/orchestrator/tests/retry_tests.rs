//! Retry pass, isolation and run mode tests

use super::*;
use crate::config::RunMode;
use crate::orchestrator::JobSet;
use crate::runner::{FailureCause, RunOutcome};
use polars::prelude::*;
use std::time::Duration;

fn job_set(collectors: &[Arc<ScriptedCollector>]) -> JobSet {
    let mut jobs = JobSet::new();
    for collector in collectors {
        jobs.push(collector.clone() as Arc<dyn Collector>).unwrap();
    }
    jobs
}

#[tokio::test]
async fn test_retry_recovery_appends_exactly_once() {
    let (_temp_dir, store) = create_test_store();
    let flaky = Arc::new(ScriptedCollector::new("Ghana", Behavior::FailTimes(1)));
    let orchestrator = create_orchestrator(store.clone(), test_batch_config());

    let report = orchestrator.run(job_set(&[flaky.clone()])).await;

    assert_eq!(report.succeeded_locations(), vec!["Ghana"]);
    assert!(report.failed.is_empty());
    assert_eq!(report.succeeded[0].attempts, 2);
    assert_eq!(report.succeeded[0].outcome, RunOutcome::Appended);
    assert_eq!(report.recovered(), 1);
    assert_eq!(flaky.calls(), 2);
    assert_eq!(store.load("Ghana").unwrap().len(), 1);
}

#[tokio::test]
async fn test_failing_job_does_not_affect_others() {
    let (_temp_dir, store) = create_test_store();
    let broken = Arc::new(ScriptedCollector::new("Broken", Behavior::AlwaysFail));
    let healthy: Vec<Arc<ScriptedCollector>> = ["Ghana", "Kenya", "Nepal", "Peru"]
        .iter()
        .map(|location| Arc::new(ScriptedCollector::new(location, Behavior::Succeed)))
        .collect();

    let mut all = vec![broken.clone()];
    all.extend(healthy.iter().cloned());

    let orchestrator = create_orchestrator(store.clone(), test_batch_config());
    let report = orchestrator.run(job_set(&all)).await;

    assert_eq!(report.failed_locations(), vec!["Broken"]);
    assert_eq!(
        report.succeeded_locations(),
        vec!["Ghana", "Kenya", "Nepal", "Peru"]
    );
    assert_eq!(report.exit_code(), 2);
    assert_eq!(report.failed[0].attempts, 2);
    assert_eq!(broken.calls(), 2);

    for collector in &healthy {
        assert_eq!(collector.calls(), 1);
        let latest = store.latest(collector.location()).unwrap().unwrap();
        assert_eq!(latest.get(Metric::TotalVaccinations), Some(1000));
    }
    assert!(store.load("Broken").unwrap().is_empty());
}

#[tokio::test]
async fn test_every_job_failing_still_reports() {
    let (_temp_dir, store) = create_test_store();
    let collectors: Vec<Arc<ScriptedCollector>> = ["Ghana", "Kenya"]
        .iter()
        .map(|location| Arc::new(ScriptedCollector::new(location, Behavior::AlwaysFail)))
        .collect();

    let orchestrator = create_orchestrator(store, test_batch_config());
    let report = orchestrator.run(job_set(&collectors)).await;

    assert!(report.succeeded.is_empty());
    assert_eq!(report.failed_locations(), vec!["Ghana", "Kenya"]);
    assert!(!report.is_success());
}

#[tokio::test]
async fn test_hung_collector_times_out() {
    let (_temp_dir, store) = create_test_store();
    let hung = Arc::new(ScriptedCollector::new("Ghana", Behavior::Hang));
    let healthy = Arc::new(ScriptedCollector::new("Kenya", Behavior::Succeed));

    let config = test_batch_config().with_timeout(Duration::from_millis(50));
    let orchestrator = create_orchestrator(store.clone(), config);
    let report = orchestrator.run(job_set(&[hung, healthy])).await;

    assert_eq!(report.failed_locations(), vec!["Ghana"]);
    assert_eq!(
        report.failed[0].outcome,
        RunOutcome::Failed(FailureCause::TimedOut(Duration::from_millis(50)))
    );
    assert_eq!(report.succeeded_locations(), vec!["Kenya"]);
}

#[tokio::test]
async fn test_panicking_collector_is_contained() {
    let (_temp_dir, store) = create_test_store();
    let panicking = Arc::new(ScriptedCollector::new("Ghana", Behavior::Panic));
    let healthy = Arc::new(ScriptedCollector::new("Kenya", Behavior::Succeed));

    let orchestrator = create_orchestrator(store.clone(), test_batch_config());
    let report = orchestrator.run(job_set(&[panicking.clone(), healthy])).await;

    assert_eq!(report.failed_locations(), vec!["Ghana"]);
    assert!(matches!(
        &report.failed[0].outcome,
        RunOutcome::Failed(FailureCause::Panicked(message)) if message.contains("selector")
    ));
    assert_eq!(panicking.calls(), 2);
    assert_eq!(report.succeeded_locations(), vec!["Kenya"]);
}

#[tokio::test]
async fn test_rejected_record_is_not_retried() {
    let (_temp_dir, store) = create_test_store();
    let negative = RawRecord::new("Ghana", "2021-05-01", "https://example.org")
        .with_metric(Metric::TotalVaccinations, -5.0);
    let collector = Arc::new(
        ScriptedCollector::new("Ghana", Behavior::Succeed)
            .with_output(CollectorOutput::Increment(negative)),
    );

    let orchestrator = create_orchestrator(store.clone(), test_batch_config());
    let report = orchestrator.run(job_set(&[collector.clone()])).await;

    assert!(report.is_success());
    assert!(matches!(report.succeeded[0].outcome, RunOutcome::Rejected(_)));
    assert_eq!(collector.calls(), 1);
    assert!(store.load("Ghana").unwrap().is_empty());
}

#[tokio::test]
async fn test_second_run_is_stale() {
    let (_temp_dir, store) = create_test_store();
    let orchestrator = create_orchestrator(store.clone(), test_batch_config());

    let first = Arc::new(ScriptedCollector::new("Ghana", Behavior::Succeed));
    orchestrator.run(job_set(&[first])).await;

    let again = Arc::new(ScriptedCollector::new("Ghana", Behavior::Succeed));
    let report = orchestrator.run(job_set(&[again])).await;

    assert_eq!(report.succeeded[0].outcome, RunOutcome::SkippedStale);
    assert_eq!(store.load("Ghana").unwrap().len(), 1);
}

#[tokio::test]
async fn test_quick_mode_skips_full_collectors() {
    let (_temp_dir, store) = create_test_store();
    let quick = Arc::new(ScriptedCollector::new("Ghana", Behavior::Succeed).quick());
    let slow = Arc::new(ScriptedCollector::new("Kenya", Behavior::Succeed));

    let config = test_batch_config().with_run_mode(RunMode::Quick);
    let orchestrator = create_orchestrator(store, config);
    let report = orchestrator.run(job_set(&[quick.clone(), slow.clone()])).await;

    assert_eq!(report.succeeded_locations(), vec!["Ghana"]);
    assert_eq!(report.skipped, vec!["Kenya".to_string()]);
    assert_eq!(slow.calls(), 0);
    assert!(report.is_success());
}

#[tokio::test]
async fn test_sequential_run_matches_concurrent() {
    let (_temp_dir, store) = create_test_store();
    let collectors: Vec<Arc<ScriptedCollector>> = ["Ghana", "Kenya", "Nepal"]
        .iter()
        .map(|location| Arc::new(ScriptedCollector::new(location, Behavior::FailTimes(1))))
        .collect();

    let config = test_batch_config().with_parallelism(1);
    let orchestrator = create_orchestrator(store.clone(), config);
    let report = orchestrator.run(job_set(&collectors)).await;

    assert_eq!(report.succeeded.len(), 3);
    assert_eq!(report.recovered(), 3);
    for collector in &collectors {
        assert_eq!(store.load(collector.location()).unwrap().len(), 1);
    }
}

#[tokio::test]
async fn test_full_series_replaces_history() {
    let (_temp_dir, store) = create_test_store();
    let frame = df!(
        "date" => ["2021-05-01", "2021-05-02", "2021-05-03"],
        "source_url" => ["https://example.org"; 3],
        "total_vaccinations" => [100i64, 200, 300],
        "people_vaccinated" => [90i64, 150, 220],
    )
    .unwrap();
    let collector = Arc::new(
        ScriptedCollector::new("Ghana", Behavior::Succeed)
            .with_output(CollectorOutput::FullSeries(frame)),
    );

    let orchestrator = create_orchestrator(store.clone(), test_batch_config());
    let report = orchestrator.run(job_set(&[collector])).await;

    assert_eq!(report.succeeded[0].outcome, RunOutcome::Replaced { rows: 3 });
    let latest = store.latest("Ghana").unwrap().unwrap();
    assert_eq!(latest.get(Metric::PeopleVaccinated), Some(220));
}

use std::time::Duration;

use tokio::sync::mpsc;

use super::*;
use crate::error::AppResult;
use crate::task::TaskOutcome;

fn sample_outcomes() -> Vec<TaskOutcome> {
    vec![
        TaskOutcome::ok(1, Some(200), "", Duration::from_millis(10)),
        TaskOutcome::nok(2, Some(500), "server error", Duration::from_millis(25)),
        TaskOutcome::ok(3, Some(200), "", Duration::from_millis(30)),
        TaskOutcome::exception(4, "connection refused", Duration::from_millis(5)),
        TaskOutcome::ok(5, Some(204), "", Duration::from_millis(20)),
    ]
}

#[test]
fn incremental_and_batch_folds_agree() {
    let outcomes = sample_outcomes();

    let mut incremental = Totals::default();
    for outcome in &outcomes {
        incremental.record(outcome);
    }
    let batch = Totals::from_results(&outcomes);

    assert_eq!(incremental, batch);
    assert_eq!(batch.ok, 3);
    assert_eq!(batch.nok, 1);
    assert_eq!(batch.exception, 1);
    assert_eq!(batch.total(), 5);
    assert_eq!(batch.ok_latency, Duration::from_millis(60));
}

#[test]
fn average_latency_is_over_ok_outcomes_only() {
    let totals = Totals::from_results(&sample_outcomes());
    assert_eq!(totals.avg_ok_latency(), Some(Duration::from_millis(20)));
}

#[test]
fn average_latency_is_no_data_without_ok_outcomes() {
    let outcomes = vec![
        TaskOutcome::nok(1, Some(500), "", Duration::from_millis(10)),
        TaskOutcome::exception(2, "timeout", Duration::from_millis(10)),
    ];
    let totals = Totals::from_results(&outcomes);
    assert_eq!(totals.avg_ok_latency(), None);
    assert_eq!(totals.total(), 2);
}

#[tokio::test]
async fn collector_folds_the_sink_stream() -> AppResult<()> {
    let (tx, rx) = mpsc::channel(16);
    let handle = spawn_totals_collector(rx);

    let outcomes = sample_outcomes();
    for outcome in &outcomes {
        drop(tx.send(TimedOutcome::now(outcome.clone())).await);
    }
    drop(tx);

    let collected = handle.await?;
    assert_eq!(collected, Totals::from_results(&outcomes));
    Ok(())
}

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::sleep;

use super::*;
use crate::error::{AppError, AppResult};
use crate::metrics::spawn_totals_collector;
use crate::params::{Parameter, Parameters};
use crate::task::{Task, TaskOutcome};

#[derive(Default)]
struct Probe {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    executed: AtomicU64,
    setups: AtomicUsize,
    teardowns: AtomicUsize,
    prepared: Mutex<Vec<String>>,
}

#[derive(Clone, Copy)]
enum Mode {
    AlwaysOk,
    AlternateOkException,
}

struct TestTask {
    probe: Arc<Probe>,
    mode: Mode,
    latency: Duration,
    template: Option<String>,
    fail_setup: bool,
    abort_seq: Option<u64>,
}

impl TestTask {
    fn new(probe: &Arc<Probe>, mode: Mode, latency: Duration) -> Self {
        Self {
            probe: Arc::clone(probe),
            mode,
            latency,
            template: None,
            fail_setup: false,
            abort_seq: None,
        }
    }
}

#[async_trait]
impl Task for TestTask {
    type Input = u64;

    fn prepare(&self, seq: u64, params: &mut Parameters) -> Self::Input {
        if let Some(template) = self.template.as_deref() {
            let rendered = params.render(template, true);
            if let Ok(mut prepared) = self.probe.prepared.lock() {
                prepared.push(rendered);
            }
        }
        seq
    }

    async fn execute(&self, seq: Self::Input) -> TaskOutcome {
        assert!(self.abort_seq != Some(seq), "task aborted");

        let now = self
            .probe
            .in_flight
            .fetch_add(1, Ordering::SeqCst)
            .saturating_add(1);
        self.probe.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            sleep(self.latency).await;
        }
        self.probe.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.probe.executed.fetch_add(1, Ordering::SeqCst);

        match self.mode {
            Mode::AlwaysOk => TaskOutcome::ok(seq, Some(200), "", self.latency),
            Mode::AlternateOkException => {
                if seq % 2 == 1 {
                    TaskOutcome::ok(seq, Some(200), "", self.latency)
                } else {
                    TaskOutcome::exception(seq, "injected fault", self.latency)
                }
            }
        }
    }

    async fn setup(&self) -> AppResult<()> {
        self.probe.setups.fetch_add(1, Ordering::SeqCst);
        if self.fail_setup {
            return Err(AppError::setup("connection pool unavailable"));
        }
        Ok(())
    }

    async fn teardown(&self) {
        self.probe.teardowns.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test(start_paused = true)]
async fn launch_count_equals_stop_and_window_is_bounded() -> AppResult<()> {
    let probe = Arc::new(Probe::default());
    let task = TestTask::new(&probe, Mode::AlwaysOk, Duration::from_millis(5));
    let window = SlidingWindow::new(
        task,
        RunConfig {
            concurrency: 4,
            stop: 10,
            ..RunConfig::default()
        },
    );

    let mut params = Parameters::new();
    let report = window.run(&mut params).await?;

    assert_eq!(report.launched, 10);
    assert_eq!(report.totals.ok, 10);
    assert!(probe.max_in_flight.load(Ordering::SeqCst) <= 4);

    let mut seqs: Vec<u64> = report
        .results
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|outcome| outcome.seq)
        .collect();
    seqs.sort_unstable();
    assert_eq!(seqs, (1..=10).collect::<Vec<u64>>());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn unbounded_run_ends_only_via_the_control_token() -> AppResult<()> {
    let probe = Arc::new(Probe::default());
    let task = TestTask::new(&probe, Mode::AlwaysOk, Duration::from_millis(1));
    let window = SlidingWindow::new(
        task,
        RunConfig {
            concurrency: 2,
            stop: 0,
            ..RunConfig::default()
        },
    );
    let control = window.control();

    let handle = tokio::spawn(async move {
        let mut params = Parameters::new();
        window.run(&mut params).await
    });

    sleep(Duration::from_millis(50)).await;
    control.stop();
    let report = handle.await??;

    assert!(report.launched > 0);
    assert_eq!(probe.teardowns.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn all_ok_run_aggregates_eight_successes() -> AppResult<()> {
    let probe = Arc::new(Probe::default());
    let task = TestTask::new(&probe, Mode::AlwaysOk, Duration::ZERO);
    let window = SlidingWindow::new(
        task,
        RunConfig {
            concurrency: 4,
            stop: 8,
            ..RunConfig::default()
        },
    );

    let mut params = Parameters::new();
    let report = window.run(&mut params).await?;

    assert_eq!(report.totals.ok, 8);
    assert_eq!(report.totals.nok, 0);
    assert_eq!(report.totals.exception, 0);
    Ok(())
}

#[tokio::test]
async fn alternating_task_splits_ok_and_exception_evenly() -> AppResult<()> {
    let probe = Arc::new(Probe::default());
    let task = TestTask::new(&probe, Mode::AlternateOkException, Duration::ZERO);
    let window = SlidingWindow::new(
        task,
        RunConfig {
            concurrency: 4,
            stop: 8,
            ..RunConfig::default()
        },
    );

    let mut params = Parameters::new();
    let report = window.run(&mut params).await?;

    assert_eq!(report.totals.ok, 4);
    assert_eq!(report.totals.exception, 4);
    assert_eq!(report.totals.nok, 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stop_below_concurrency_caps_the_initial_window() -> AppResult<()> {
    let probe = Arc::new(Probe::default());
    let task = TestTask::new(&probe, Mode::AlwaysOk, Duration::from_millis(5));
    let window = SlidingWindow::new(
        task,
        RunConfig {
            concurrency: 8,
            stop: 3,
            ..RunConfig::default()
        },
    );

    let mut params = Parameters::new();
    let report = window.run(&mut params).await?;

    assert_eq!(report.launched, 3);
    assert!(probe.max_in_flight.load(Ordering::SeqCst) <= 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn batch_update_happens_before_the_request_opening_the_batch() -> AppResult<()> {
    let probe = Arc::new(Probe::default());
    let mut task = TestTask::new(&probe, Mode::AlwaysOk, Duration::from_millis(1));
    task.template = Some("<<group>>-<<id>>".to_owned());
    let window = SlidingWindow::new(
        task,
        RunConfig {
            concurrency: 2,
            stop: 4,
            ..RunConfig::default()
        },
    );

    let mut params = Parameters::new();
    params.insert("group", Parameter::sequence_batch(100));
    params.insert("id", Parameter::sequence_request(0, None));
    window.run(&mut params).await?;

    let prepared = probe.prepared.lock().map(|guard| guard.clone());
    assert_eq!(
        prepared.ok().as_deref(),
        Some(&["100-0", "100-1", "101-2", "101-3"].map(String::from)[..])
    );
    Ok(())
}

#[tokio::test]
async fn failing_setup_aborts_before_any_launch() {
    let probe = Arc::new(Probe::default());
    let mut task = TestTask::new(&probe, Mode::AlwaysOk, Duration::ZERO);
    task.fail_setup = true;
    let window = SlidingWindow::new(
        task,
        RunConfig {
            concurrency: 4,
            stop: 8,
            ..RunConfig::default()
        },
    );

    let mut params = Parameters::new();
    let result = window.run(&mut params).await;

    assert!(matches!(result, Err(AppError::Setup { .. })));
    assert_eq!(probe.executed.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn panicked_task_is_scheduler_fatal_but_teardown_still_runs() {
    let probe = Arc::new(Probe::default());
    let mut task = TestTask::new(&probe, Mode::AlwaysOk, Duration::from_millis(1));
    task.abort_seq = Some(2);
    let window = SlidingWindow::new(
        task,
        RunConfig {
            concurrency: 2,
            stop: 4,
            ..RunConfig::default()
        },
    );

    let mut params = Parameters::new();
    let result = window.run(&mut params).await;

    assert!(matches!(result, Err(AppError::Join { .. })));
    assert_eq!(probe.teardowns.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn paced_run_spaces_slot_launches_by_the_budget() -> AppResult<()> {
    let probe = Arc::new(Probe::default());
    let task = TestTask::new(&probe, Mode::AlwaysOk, Duration::ZERO);
    let window = SlidingWindow::new(
        task,
        RunConfig {
            concurrency: 2,
            stop: 6,
            requests_per_second: 2.0,
            ..RunConfig::default()
        },
    );

    let mut params = Parameters::new();
    let report = window.run(&mut params).await?;

    // Per-slot budget is 2/2 = 1s; six instant tasks over two slots need
    // at least two full budget periods.
    assert!(report.elapsed >= Duration::from_secs(2));
    assert!(report.elapsed < Duration::from_secs(4));
    assert_eq!(report.wait_debt, Duration::ZERO);
    assert_eq!(report.totals.ok, 6);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn overrunning_tasks_accrue_wait_debt() -> AppResult<()> {
    let probe = Arc::new(Probe::default());
    let task = TestTask::new(&probe, Mode::AlwaysOk, Duration::from_millis(50));
    let window = SlidingWindow::new(
        task,
        RunConfig {
            concurrency: 1,
            stop: 3,
            requests_per_second: 100.0,
            ..RunConfig::default()
        },
    );

    let mut params = Parameters::new();
    let report = window.run(&mut params).await?;

    // Budget is 10ms per slot, each task takes 50ms: 40ms shortfall each.
    assert!(report.wait_debt >= Duration::from_millis(100));
    assert_eq!(report.totals.ok, 3);
    Ok(())
}

#[tokio::test]
async fn sink_receives_every_outcome_and_counters_agree() -> AppResult<()> {
    let probe = Arc::new(Probe::default());
    let task = TestTask::new(&probe, Mode::AlternateOkException, Duration::ZERO);
    let (tx, rx) = mpsc::channel(64);
    let window = SlidingWindow::new(
        task,
        RunConfig {
            concurrency: 2,
            stop: 8,
            forward_metrics: true,
            ..RunConfig::default()
        },
    )
    .with_sink(tx);
    let collector = spawn_totals_collector(rx);

    let mut params = Parameters::new();
    let report = window.run(&mut params).await?;
    drop(window);

    let collected = collector.await?;
    assert_eq!(report.sink_dropped, 0);
    assert_eq!(collected, report.totals);
    Ok(())
}

#[tokio::test]
async fn discarded_results_still_count() -> AppResult<()> {
    let probe = Arc::new(Probe::default());
    let task = TestTask::new(&probe, Mode::AlwaysOk, Duration::ZERO);
    let window = SlidingWindow::new(
        task,
        RunConfig {
            concurrency: 2,
            stop: 5,
            keep_results: false,
            ..RunConfig::default()
        },
    );

    let mut params = Parameters::new();
    let report = window.run(&mut params).await?;

    assert!(report.results.is_none());
    assert_eq!(report.totals.ok, 5);
    Ok(())
}

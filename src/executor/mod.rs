//! The sliding-window executor.
//!
//! Keeps exactly `concurrency` task invocations in flight, optionally
//! paced to a target request rate, until the configured stop count is
//! reached or a [`RunControl`] token fires. A new task is launched as soon
//! as any in-flight one completes, so the window size stays constant.
//!
//! The scheduler is a single cooperative loop: `join_next` on the window
//! is its sole completion suspension point, all bookkeeping happens
//! between suspensions, and the only state shared with in-flight tasks is
//! the owned input each task is launched with.

mod rate;

#[cfg(test)]
mod tests;

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::error::AppResult;
use crate::metrics::{TimedOutcome, Totals};
use crate::params::Parameters;
use crate::task::{Task, TaskOutcome};
use rate::Pacing;

/// Run budget for one executor invocation.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Width of the outstanding-task set. Values below 1 are treated as 1.
    pub concurrency: usize,
    /// Total launches before the run drains. `0` runs until stopped
    /// externally.
    pub stop: u64,
    /// Target aggregate request rate. `0.0` disables pacing.
    pub requests_per_second: f64,
    /// Keep per-result data in the report. With `false` only the
    /// aggregated counters are meaningful.
    pub keep_results: bool,
    /// Forward timestamped outcomes to the metrics sink, when one is
    /// attached.
    pub forward_metrics: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            stop: 0,
            requests_per_second: 0.0,
            keep_results: true,
            forward_metrics: false,
        }
    }
}

/// Cloneable stop token, polled by the scheduler once per completion
/// batch. Stopping cancels in-flight tasks and counts as a clean exit.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    stop: Arc<AtomicBool>,
}

impl RunControl {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}

/// What one executor invocation produced.
#[derive(Debug)]
pub struct RunReport {
    /// Wall-clock time for the whole run, initial fill through drain.
    pub elapsed: Duration,
    /// Number of task launches; equals the stop count for bounded runs.
    pub launched: u64,
    pub totals: Totals,
    /// Accumulated shortfall of tasks that overran their rate budget. A
    /// diagnostic that the configured concurrency may be too low to
    /// sustain the requested rate; never acted on automatically.
    pub wait_debt: Duration,
    /// Outcomes dropped because the metrics sink was full.
    pub sink_dropped: u64,
    /// Per-result data in completion order, when requested.
    pub results: Option<Vec<TaskOutcome>>,
}

/// The concurrency core: drives a [`Task`] at constant window width.
pub struct SlidingWindow<T: Task> {
    task: Arc<T>,
    config: RunConfig,
    control: RunControl,
    sink: Option<mpsc::Sender<TimedOutcome>>,
}

impl<T: Task> SlidingWindow<T> {
    #[must_use]
    pub fn new(task: T, config: RunConfig) -> Self {
        Self {
            task: Arc::new(task),
            config,
            control: RunControl::new(),
            sink: None,
        }
    }

    /// Attaches an externally owned stop token.
    #[must_use]
    pub fn with_control(mut self, control: RunControl) -> Self {
        self.control = control;
        self
    }

    /// Attaches a bounded metrics sink receiving `(timestamp, outcome)`
    /// pairs. The scheduler never blocks on it; overflow is counted in
    /// the report instead.
    #[must_use]
    pub fn with_sink(mut self, sink: mpsc::Sender<TimedOutcome>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// The stop token for this executor.
    #[must_use]
    pub fn control(&self) -> RunControl {
        self.control.clone()
    }

    /// Runs the window until the stop budget is exhausted or the control
    /// token fires, then drains and reports.
    ///
    /// Setup runs before the first launch; teardown runs exactly once on
    /// every exit path, including scheduler faults. A setup error is fatal
    /// before any request is launched.
    ///
    /// # Errors
    ///
    /// Returns the setup error, or a scheduler fault (e.g. a panicked
    /// task); protocol-level failures and task exceptions are recorded in
    /// the report and never abort the run.
    pub async fn run(&self, params: &mut Parameters) -> AppResult<RunReport> {
        self.task.setup().await?;
        let mut window = JoinSet::new();
        let result = self.drive(params, &mut window).await;
        // Cancel whatever is still outstanding before releasing the
        // shared resource.
        window.abort_all();
        while window.join_next().await.is_some() {}
        self.task.teardown().await;
        result
    }

    async fn drive(
        &self,
        params: &mut Parameters,
        window: &mut JoinSet<TaskOutcome>,
    ) -> AppResult<RunReport> {
        let concurrency = self.config.concurrency.max(1);
        let stop = self.config.stop;
        let pacing = Pacing::new(concurrency, self.config.requests_per_second);
        let started = Instant::now();

        let mut launched: u64 = 0;
        let mut totals = Totals::default();
        let mut results: Option<Vec<TaskOutcome>> = self.config.keep_results.then(Vec::new);
        let mut delays: VecDeque<Duration> = VecDeque::with_capacity(concurrency);
        let mut wait_debt = Duration::ZERO;
        let mut sink_dropped: u64 = 0;

        // Fill the window; a stop budget below the window width caps it.
        let initial = match stop {
            0 => concurrency,
            bound => concurrency.min(usize::try_from(bound).unwrap_or(concurrency)),
        };
        for slot in 0..initial {
            self.launch(window, params, concurrency, &mut launched, Duration::ZERO);
            if let Some(gap) = pacing.fill_gap()
                && slot.saturating_add(1) < initial
            {
                sleep(gap).await;
            }
        }

        'window: while !window.is_empty() {
            let Some(first) = window.join_next().await else {
                break;
            };
            let mut completions = Vec::with_capacity(concurrency);
            completions.push(first);
            while let Some(extra) = window.try_join_next() {
                completions.push(extra);
            }

            for joined in completions {
                let outcome = match joined {
                    Ok(outcome) => outcome,
                    // A cancelled task is a clean, silent stop.
                    Err(err) if err.is_cancelled() => break 'window,
                    // Anything else (a panicked task) is scheduler-fatal.
                    Err(err) => return Err(err.into()),
                };

                let slot = pacing.delay_after(outcome.elapsed);
                wait_debt = wait_debt.saturating_add(slot.shortfall);
                delays.push_back(slot.delay);

                if self.config.forward_metrics
                    && let Some(sink) = &self.sink
                    && sink.try_send(TimedOutcome::now(outcome.clone())).is_err()
                {
                    // Never stall the scheduler on a slow sink.
                    sink_dropped = sink_dropped.saturating_add(1);
                }
                totals.record(&outcome);
                if let Some(results) = results.as_mut() {
                    results.push(outcome);
                }
            }

            // The stop signal is polled once per completion batch.
            if self.control.is_stopped() {
                break;
            }

            // Refill freed slots, each after its computed delay.
            while window.len() < concurrency && (stop == 0 || launched < stop) {
                let delay = delays.pop_front().unwrap_or_else(|| pacing.slot_budget());
                self.launch(window, params, concurrency, &mut launched, delay);
            }
        }

        if !wait_debt.is_zero() {
            warn!(
                ?wait_debt,
                concurrency, "tasks overran their rate budget; concurrency may be too low"
            );
        }
        debug!(
            launched,
            ok = totals.ok,
            nok = totals.nok,
            exception = totals.exception,
            "window drained"
        );

        Ok(RunReport {
            elapsed: started.elapsed(),
            launched,
            totals,
            wait_debt,
            sink_dropped,
            results,
        })
    }

    fn launch(
        &self,
        window: &mut JoinSet<TaskOutcome>,
        params: &mut Parameters,
        concurrency: usize,
        launched: &mut u64,
        delay: Duration,
    ) {
        // Batch-scoped parameters must observe their new value before the
        // request that opens the batch reads them.
        let width = u64::try_from(concurrency).unwrap_or(u64::MAX);
        if launched.checked_rem(width).unwrap_or(0) == 0 {
            params.update_batch();
        }
        params.update_request();

        let seq = launched.saturating_add(1);
        let input = self.task.prepare(seq, params);
        *launched = seq;

        let task = Arc::clone(&self.task);
        window.spawn(async move {
            if !delay.is_zero() {
                sleep(delay).await;
            }
            task.execute(input).await
        });
    }
}

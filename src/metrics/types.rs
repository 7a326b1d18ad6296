use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::task::{OutcomeKind, TaskOutcome};

/// Running outcome counters for one run.
///
/// Identical whether folded incrementally as the executor reports
/// completions or computed after the fact from a materialized result
/// sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub ok: u64,
    pub nok: u64,
    pub exception: u64,
    /// Summed latency of ok outcomes only.
    pub ok_latency: Duration,
}

impl Totals {
    pub fn record(&mut self, outcome: &TaskOutcome) {
        match outcome.kind {
            OutcomeKind::Ok => {
                self.ok = self.ok.saturating_add(1);
                self.ok_latency = self.ok_latency.saturating_add(outcome.elapsed);
            }
            OutcomeKind::Nok => self.nok = self.nok.saturating_add(1),
            OutcomeKind::Exception => self.exception = self.exception.saturating_add(1),
        }
    }

    #[must_use]
    pub fn from_results<'outcome, I>(results: I) -> Self
    where
        I: IntoIterator<Item = &'outcome TaskOutcome>,
    {
        let mut totals = Self::default();
        for outcome in results {
            totals.record(outcome);
        }
        totals
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.ok
            .saturating_add(self.nok)
            .saturating_add(self.exception)
    }

    /// Mean latency over ok outcomes; `None` (not zero) without any.
    #[must_use]
    pub fn avg_ok_latency(&self) -> Option<Duration> {
        if self.ok == 0 {
            return None;
        }
        let nanos = self
            .ok_latency
            .as_nanos()
            .checked_div(u128::from(self.ok))
            .unwrap_or(0);
        Some(Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX)))
    }
}

/// One outcome stamped with the wall-clock time it was observed, as
/// forwarded to the metrics sink.
#[derive(Debug, Clone)]
pub struct TimedOutcome {
    pub at: DateTime<Utc>,
    pub outcome: TaskOutcome,
}

impl TimedOutcome {
    #[must_use]
    pub fn now(outcome: TaskOutcome) -> Self {
        Self {
            at: Utc::now(),
            outcome,
        }
    }
}

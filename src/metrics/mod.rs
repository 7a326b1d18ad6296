//! Outcome aggregation and the metrics sink boundary.

mod types;

#[cfg(test)]
mod tests;

pub use types::{TimedOutcome, Totals};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Drains a metrics sink into running totals, incrementally, as the
/// executor reports completions. Resolves once every sender is dropped.
#[must_use]
pub fn spawn_totals_collector(mut rx: mpsc::Receiver<TimedOutcome>) -> JoinHandle<Totals> {
    tokio::spawn(async move {
        let mut totals = Totals::default();
        while let Some(item) = rx.recv().await {
            totals.record(&item.outcome);
        }
        debug!(
            ok = totals.ok,
            nok = totals.nok,
            exception = totals.exception,
            "metrics sink drained"
        );
        totals
    })
}

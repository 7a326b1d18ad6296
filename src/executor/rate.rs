use std::time::Duration;

/// Pacing math for a rate-limited window.
///
/// With `requests_per_second = R` and `concurrency = C`, each of the `C`
/// slots has a per-slot budget of `C / R` seconds, which sustains an
/// aggregate rate of `R`. A zero or non-finite rate disables pacing
/// entirely: the window then refills as fast as completions occur.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Pacing {
    slot_budget: Option<Duration>,
    fill_gap: Option<Duration>,
}

/// Delay before the next launch into a freed slot, plus the shortfall when
/// the completed task overran its budget.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SlotDelay {
    pub delay: Duration,
    pub shortfall: Duration,
}

impl Pacing {
    pub(crate) fn new(concurrency: usize, requests_per_second: f64) -> Self {
        if !requests_per_second.is_finite() || requests_per_second <= 0.0 {
            return Self {
                slot_budget: None,
                fill_gap: None,
            };
        }
        let concurrency = concurrency.max(1) as f64;
        Self {
            slot_budget: Duration::try_from_secs_f64(concurrency / requests_per_second).ok(),
            fill_gap: Duration::try_from_secs_f64(1.0 / requests_per_second).ok(),
        }
    }

    /// Spacing between initial launches, so the window fills over
    /// `concurrency / requests_per_second` seconds.
    pub(crate) const fn fill_gap(&self) -> Option<Duration> {
        self.fill_gap
    }

    pub(crate) fn slot_budget(&self) -> Duration {
        self.slot_budget.unwrap_or(Duration::ZERO)
    }

    /// Delay separating a slot's next launch from its predecessor:
    /// `max(0, budget - elapsed)`. Overruns come back as shortfall, the
    /// executor's passive wait-debt signal.
    pub(crate) fn delay_after(&self, elapsed: Duration) -> SlotDelay {
        match self.slot_budget {
            None => SlotDelay {
                delay: Duration::ZERO,
                shortfall: Duration::ZERO,
            },
            Some(budget) => SlotDelay {
                delay: budget.saturating_sub(elapsed),
                shortfall: elapsed.saturating_sub(budget),
            },
        }
    }
}

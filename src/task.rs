//! The opaque unit of work driven by the executor.
//!
//! A [`Task`] is whatever one request against the remote service means:
//! the executor only sees `prepare` (build an owned input from the live
//! parameter set, on the scheduler, with no suspension) and `execute` (the
//! async call producing a [`TaskOutcome`]). Ordinary failures are reported
//! in-band as [`OutcomeKind::Nok`] or [`OutcomeKind::Exception`]; a panic
//! inside `execute` is treated as scheduler-fatal.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::AppResult;
use crate::params::Parameters;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    /// Completed with the expected protocol status.
    Ok,
    /// Completed, but the service answered with an unexpected status.
    Nok,
    /// The call itself failed (transport fault, timeout, ...).
    Exception,
}

impl OutcomeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            OutcomeKind::Ok => "ok",
            OutcomeKind::Nok => "nok",
            OutcomeKind::Exception => "exception",
        }
    }
}

/// Immutable record of one completed task invocation.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    /// Sequence number assigned at launch, monotonically increasing and
    /// global to the run.
    pub seq: u64,
    pub kind: OutcomeKind,
    /// Protocol-specific status code, when the call produced one.
    pub status: Option<u16>,
    /// Response payload or error description.
    pub detail: String,
    /// Wall-clock duration of the call.
    pub elapsed: Duration,
}

impl TaskOutcome {
    #[must_use]
    pub fn ok(seq: u64, status: Option<u16>, detail: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            seq,
            kind: OutcomeKind::Ok,
            status,
            detail: detail.into(),
            elapsed,
        }
    }

    #[must_use]
    pub fn nok(
        seq: u64,
        status: Option<u16>,
        detail: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            seq,
            kind: OutcomeKind::Nok,
            status,
            detail: detail.into(),
            elapsed,
        }
    }

    #[must_use]
    pub fn exception(seq: u64, detail: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            seq,
            kind: OutcomeKind::Exception,
            status: None,
            detail: detail.into(),
            elapsed,
        }
    }

    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self.kind, OutcomeKind::Ok)
    }
}

/// One kind of request against the remote service.
#[async_trait]
pub trait Task: Send + Sync + 'static {
    /// Owned input for a single invocation, rendered from the live
    /// parameter set at launch time.
    type Input: Send + 'static;

    /// Builds the input for the launch carrying sequence number `seq`.
    ///
    /// Runs on the scheduler between suspension points; this is where
    /// template substitution reads and advances the parameter set.
    fn prepare(&self, seq: u64, params: &mut Parameters) -> Self::Input;

    /// Performs the request. Ordinary failures are reported in-band via
    /// the returned outcome's kind, never by panicking.
    async fn execute(&self, input: Self::Input) -> TaskOutcome;

    /// Acquires whatever shared resource the task needs (e.g. a connection
    /// pool). Runs once before the first launch; an error here is fatal
    /// before any request is sent.
    ///
    /// # Errors
    ///
    /// Implementations return an error when the shared resource cannot be
    /// acquired.
    async fn setup(&self) -> AppResult<()> {
        Ok(())
    }

    /// Releases the shared resource. Runs exactly once on every executor
    /// exit path; must not fail.
    async fn teardown(&self) {}
}

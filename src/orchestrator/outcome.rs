//! Aggregate result of a batch run.

/// Per-item counters and the derived exit status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    succeeded: usize,
    failed: usize,
    skipped: usize,
    simulated: usize,
}

impl BatchOutcome {
    /// Items transferred and post-processed.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    /// Failures absorbed under `ignore_errors`.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Items skipped because the destination existed.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Items resolved but not downloaded (simulate mode).
    #[must_use]
    pub fn simulated(&self) -> usize {
        self.simulated
    }

    /// 0 when nothing failed, 1 otherwise.
    #[must_use]
    pub fn status(&self) -> i32 {
        i32::from(self.failed > 0)
    }

    pub(crate) fn record_success(&mut self) {
        self.succeeded += 1;
    }

    pub(crate) fn record_failure(&mut self) {
        self.failed += 1;
    }

    pub(crate) fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    pub(crate) fn record_simulated(&mut self) {
        self.simulated += 1;
    }
}

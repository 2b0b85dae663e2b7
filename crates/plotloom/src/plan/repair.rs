//! Failure tracking and the single-pass repair bookkeeping.
//!
//! A failed batch is never discarded — it lands here, and after the planned
//! pass completes the pipeline makes exactly one context-minimal
//! regeneration attempt per failure. Survivors merge; the rest are
//! re-recorded so a later `repair_storyline` call (driven by the caller)
//! can try again. The repair pass never blocks the rest of the pipeline.

use std::fmt;

/// A batch that failed generation or validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedBatch {
    pub start: u32,
    pub end: u32,
    /// The concatenated error string from the validator or the call itself.
    pub error: String,
}

impl fmt::Display for FailedBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chapters {}-{}: {}", self.start, self.end, self.error)
    }
}

/// Accumulates failed batches across a planning pass.
#[derive(Debug, Default)]
pub struct FailureTracker {
    failures: Vec<FailedBatch>,
}

impl FailureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure for later repair.
    pub fn record(&mut self, start: u32, end: u32, error: impl Into<String>) {
        self.failures.push(FailedBatch {
            start,
            end,
            error: error.into(),
        });
    }

    /// Drain all recorded failures for a repair pass.
    ///
    /// Taking them out ensures each recorded failure is attempted at most
    /// once per pass; unresolved ones are re-recorded by the pipeline.
    pub fn take_all(&mut self) -> Vec<FailedBatch> {
        std::mem::take(&mut self.failures)
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// The currently recorded failed ranges.
    pub fn ranges(&self) -> Vec<(u32, u32)> {
        self.failures.iter().map(|f| (f.start, f.end)).collect()
    }
}

/// Result of one repair pass.
#[derive(Debug, Default)]
pub struct RepairOutcome {
    /// How many recorded failures were attempted.
    pub attempted: usize,
    /// How many of them were resolved and merged.
    pub resolved: usize,
    /// Chapter numbers merged by this pass.
    pub resolved_chapters: Vec<u32>,
    /// Placeholder chapters synthesized during repair validation.
    pub placeholders: Vec<u32>,
    /// Failures that did not survive the pass (re-recorded for the caller).
    pub unresolved: Vec<FailedBatch>,
}

impl RepairOutcome {
    /// Human-readable pass summary.
    pub fn summary(&self) -> String {
        if self.attempted == 0 {
            return "no failed batches to repair".to_string();
        }
        let mut text = format!(
            "repaired {} of {} failed batch(es)",
            self.resolved, self.attempted
        );
        if !self.placeholders.is_empty() {
            text.push_str(&format!(
                "; placeholders awaiting regeneration: {:?}",
                self.placeholders
            ));
        }
        if !self.unresolved.is_empty() {
            let ranges: Vec<String> = self
                .unresolved
                .iter()
                .map(|f| format!("{}-{}", f.start, f.end))
                .collect();
            text.push_str(&format!("; unresolved: {}", ranges.join(", ")));
        }
        text
    }
}

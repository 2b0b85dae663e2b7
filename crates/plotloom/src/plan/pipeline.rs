//! The storyline planning pipeline.
//!
//! [`StorylinePipeline`] owns every mutable piece of a planning session
//! (the storyline, the failure tracker, the writing memory, the scene notes,
//! the text log) and drives the control flow: partition the target count
//! into batches, generate and validate each one strictly in order, merge
//! survivors, record the rest, then make one repair pass over the failures.
//!
//! Batches are sequential on purpose. Each batch's prompt carries a short
//! tail of already-accepted chapters for continuity, so a later batch cannot
//! start before the earlier one has been merged or recorded as failed.
//! Backpressure is simply "the next call does not start until the previous
//! one returns".
//!
//! Every failure, whether validation or the generation call itself, is local:
//! the batch is recorded and the loop moves on. The only unrecoverable condition
//! is a failure surviving the repair pass, and even that is just reported;
//! the caller may invoke [`repair_storyline`](StorylinePipeline::repair_storyline)
//! again.

use crate::api::retry::{RetryPolicy, with_retry};
use crate::context::outline::OutlineCompactor;
use crate::context::memory::WritingMemory;
use crate::context::setting::TempSetting;
use crate::context::window::{ContextBundle, ContextWindowBuilder};
use crate::plan::batch::{Batch, BatchState, plan_batches};
use crate::plan::config::SessionConfig;
use crate::plan::prompt::{batch_prompt, repair_prompt};
use crate::plan::repair::{FailedBatch, FailureTracker, RepairOutcome};
use crate::plan::validator::{BatchValidator, ValidationOutcome};
use crate::story::model::ChapterPlan;
use crate::story::storyline::{ChapterTextLog, Storyline, StorylineSnapshot};
use crate::{Generator, PlanConstraints};
use tracing::{debug, info, warn};

/// Completion summary of a planning run.
#[derive(Debug, Default)]
pub struct GenerationReport {
    /// The ranges the run was partitioned into.
    pub planned_ranges: Vec<(u32, u32)>,
    /// Chapter numbers accepted into the storyline, ascending.
    pub merged: Vec<u32>,
    /// Auto-repaired placeholder chapters, flagged for review.
    pub placeholders: Vec<u32>,
    /// Ranges accepted as partial (progressive) results.
    pub partial_ranges: Vec<(u32, u32)>,
    /// Validation warnings collected across the run.
    pub warnings: Vec<String>,
    /// Result of the trailing repair pass.
    pub repair: RepairOutcome,
}

impl GenerationReport {
    /// Ranges that could not be resolved even by the repair pass.
    pub fn unresolved(&self) -> &[FailedBatch] {
        &self.repair.unresolved
    }

    /// True when every planned chapter was accepted without placeholders.
    pub fn is_clean(&self) -> bool {
        self.unresolved().is_empty() && self.placeholders.is_empty() && self.partial_ranges.is_empty()
    }

    /// User-facing completion summary: what was generated, what is a
    /// placeholder awaiting review, and which ranges stayed unresolved.
    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "generated {} chapter plan(s) across {} batch(es)",
            self.merged.len(),
            self.planned_ranges.len()
        )];
        if !self.placeholders.is_empty() {
            lines.push(format!(
                "placeholder chapters flagged for review: {:?}",
                self.placeholders
            ));
        }
        if !self.partial_ranges.is_empty() {
            let ranges: Vec<String> = self
                .partial_ranges
                .iter()
                .map(|(s, e)| format!("{s}-{e}"))
                .collect();
            lines.push(format!("partial batches accepted: {}", ranges.join(", ")));
        }
        if self.repair.attempted > 0 {
            lines.push(self.repair.summary());
        }
        if !self.unresolved().is_empty() {
            let gaps: Vec<String> = self
                .unresolved()
                .iter()
                .map(FailedBatch::to_string)
                .collect();
            lines.push(format!("unresolved gaps: {}", gaps.join(" | ")));
        }
        lines.join("\n")
    }
}

/// One planning session over a [`Generator`].
///
/// Single-writer by construction: all mutation flows through `&mut self`
/// methods on this type, and the compactors it calls are pure functions.
pub struct StorylinePipeline<'a> {
    generator: &'a dyn Generator,
    config: SessionConfig,
    retry: RetryPolicy,
    storyline: Storyline,
    failures: FailureTracker,
    memory: WritingMemory,
    setting: TempSetting,
    text_log: ChapterTextLog,
}

impl<'a> StorylinePipeline<'a> {
    /// Create a pipeline for one session. Rejects invalid configurations.
    pub fn new(generator: &'a dyn Generator, config: SessionConfig) -> Result<Self, String> {
        config.validate()?;
        Ok(Self {
            generator,
            config,
            retry: RetryPolicy::default(),
            storyline: Storyline::new(),
            failures: FailureTracker::new(),
            memory: WritingMemory::new(),
            setting: TempSetting::new(),
            text_log: ChapterTextLog::new(),
        })
    }

    /// Override the retry policy for generation calls.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    // ── Accessors ─────────────────────────────────────────────────

    pub fn storyline(&self) -> &Storyline {
        &self.storyline
    }

    /// The accepted plan for chapter `number`, if any.
    pub fn chapter_plan(&self, number: u32) -> Option<&ChapterPlan> {
        self.storyline.get(number)
    }

    /// The bounded context bundle for chapter `number`'s generation call.
    pub fn context_bundle(&self, number: u32) -> ContextBundle {
        ContextWindowBuilder::new(
            &self.storyline,
            &self.text_log,
            self.config.total_chapters,
            self.config.compact_mode,
        )
        .build(number)
    }

    /// The current writing memory.
    pub fn writing_memory(&self) -> &str {
        self.memory.memory()
    }

    /// The current scene-notes scratchpad.
    pub fn setting_notes(&self) -> &str {
        self.setting.text()
    }

    /// Failed ranges currently awaiting repair.
    pub fn pending_failures(&self) -> Vec<(u32, u32)> {
        self.failures.ranges()
    }

    // ── Persistence hooks ─────────────────────────────────────────

    /// Snapshot the storyline for the external persistence layer.
    pub fn snapshot(&self) -> StorylineSnapshot {
        self.storyline.snapshot()
    }

    /// Resume from a previously serialized snapshot.
    pub fn restore(&mut self, snapshot: StorylineSnapshot) {
        self.storyline = Storyline::from_snapshot(snapshot);
    }

    // ── The planned pass ──────────────────────────────────────────

    /// Run the full planning pass plus one repair pass.
    ///
    /// Never returns an error: failures are recorded per batch and surface
    /// in the report.
    pub async fn plan_storyline(&mut self) -> GenerationReport {
        let ranges = plan_batches(self.config.total_chapters, self.config.effective_batch_size());
        info!(
            "planning {} chapter(s) in {} batch(es)",
            self.config.total_chapters,
            ranges.len()
        );

        let mut report = GenerationReport {
            planned_ranges: ranges.clone(),
            ..Default::default()
        };

        for &(start, end) in &ranges {
            let mut batch = Batch::new(start, end);
            match self.run_fresh_batch(&mut batch).await {
                Ok(outcome) => {
                    report.merged.extend(outcome.chapters.iter().map(|c| c.number));
                    report.placeholders.extend(outcome.repaired.iter().copied());
                    if outcome.partial {
                        report.partial_ranges.push((start, end));
                    }
                    report.warnings.extend(outcome.warnings);
                }
                Err(error) => {
                    warn!("batch {start}-{end} failed: {error}");
                    batch.fail(error.clone());
                    self.failures.record(start, end, error);
                }
            }
        }

        report.repair = self.repair_storyline().await;
        report.merged.extend(report.repair.resolved_chapters.iter().copied());
        report.placeholders.extend(report.repair.placeholders.iter().copied());
        report.merged.sort_unstable();
        report.merged.dedup();
        report.placeholders.sort_unstable();
        report.placeholders.dedup();

        info!("planning pass complete: {}", report.summary());
        report
    }

    /// Generate, validate, and merge one fresh batch.
    async fn run_fresh_batch(&mut self, batch: &mut Batch) -> Result<ValidationOutcome, String> {
        let (start, end) = (batch.start, batch.end);
        let prompt = self.build_batch_prompt(start, end);
        let candidate = self.request_plan(&prompt, batch.expected_count()).await?;
        batch.transition(BatchState::Generated)?;

        let outcome = BatchValidator::new(self.config.segment_count)
            .validate(&candidate, start, end)
            .map_err(|e| e.to_string())?;
        batch.transition(BatchState::Validated)?;

        info!("batch {start}-{end}: {}", outcome.summary(start, end));
        self.storyline.merge(outcome.chapters.clone());
        batch.transition(BatchState::Merged)?;
        Ok(outcome)
    }

    // ── The repair pass ───────────────────────────────────────────

    /// One best-effort pass over all recorded failures.
    ///
    /// Each failure is attempted exactly once per call: a context-minimal
    /// regeneration scoped to its range, the same validation, and on success
    /// a clear-then-merge so stale partial entries cannot survive. Failures
    /// that fail again are re-recorded for a later call.
    pub async fn repair_storyline(&mut self) -> RepairOutcome {
        let pending = self.failures.take_all();
        let mut outcome = RepairOutcome {
            attempted: pending.len(),
            ..Default::default()
        };
        if pending.is_empty() {
            return outcome;
        }
        info!("repair pass: {} failed batch(es)", pending.len());

        for failed in pending {
            let mut batch = Batch {
                start: failed.start,
                end: failed.end,
                state: BatchState::Failed,
                error: Some(failed.error.clone()),
            };
            match self.run_repair_batch(&mut batch).await {
                Ok(validated) => {
                    info!(
                        "repaired batch {}-{}: {}",
                        failed.start,
                        failed.end,
                        validated.summary(failed.start, failed.end)
                    );
                    outcome.resolved += 1;
                    outcome
                        .resolved_chapters
                        .extend(validated.chapters.iter().map(|c| c.number));
                    outcome.placeholders.extend(validated.repaired);
                }
                Err(error) => {
                    warn!(
                        "repair of {}-{} failed, leaving gap: {error}",
                        failed.start, failed.end
                    );
                    self.failures.record(failed.start, failed.end, error.clone());
                    outcome.unresolved.push(FailedBatch {
                        start: failed.start,
                        end: failed.end,
                        error,
                    });
                }
            }
        }
        outcome
    }

    /// Regenerate and re-validate one failed batch.
    async fn run_repair_batch(&mut self, batch: &mut Batch) -> Result<ValidationOutcome, String> {
        let (start, end) = (batch.start, batch.end);
        let prompt = repair_prompt(&self.config, start, end, &self.outline_slice(start, end));
        let candidate = self.request_plan(&prompt, batch.expected_count()).await?;

        let outcome = BatchValidator::new(self.config.segment_count)
            .validate(&candidate, start, end)
            .map_err(|e| e.to_string())?;
        batch.transition(BatchState::Repaired)?;

        // Clear any stale entries left behind by the original failure before
        // merging the repaired chapters in sorted order.
        self.storyline.remove_range(start, end);
        self.storyline.merge(outcome.chapters.clone());
        batch.transition(BatchState::Merged)?;
        Ok(outcome)
    }

    // ── Per-chapter step ──────────────────────────────────────────

    /// Record a freshly generated chapter text and run the compactors.
    ///
    /// Called once per written chapter by the downstream writer. The text
    /// lands in the log (for the context window's reverse scan), its notes
    /// join the unflushed memory buffer, and new setting notes are absorbed
    /// under budget. A failed memory-compaction call keeps the buffer for
    /// the next flush, so notes are never lost to a transient error.
    pub async fn record_chapter(
        &mut self,
        number: u32,
        title: &str,
        body: &str,
        new_setting: Option<&str>,
    ) {
        self.text_log.push_chapter(number, title, body);
        self.memory.note(body);
        if self.memory.needs_flush() {
            self.flush_memory().await;
        }
        if let Some(notes) = new_setting {
            self.setting.absorb(notes, self.config.setting_budget());
        }
    }

    /// Compact the writing memory through the collaborator.
    async fn flush_memory(&mut self) {
        let budget = self.config.memory_budget();
        let (system, user) = self
            .memory
            .build_compaction_request(&self.config.characters, budget);
        debug!(
            "flushing writing memory: {} buffered char(s), budget {budget}",
            self.memory.pending_chars()
        );
        match with_retry(&self.retry, || self.generator.complete(&system, &user)).await {
            Ok(new_memory) => self.memory.apply_compacted(new_memory, budget),
            Err(error) => warn!("memory compaction failed, keeping buffer: {error}"),
        }
    }

    // ── Prompt assembly ───────────────────────────────────────────

    fn build_batch_prompt(&self, start: u32, end: u32) -> String {
        let window = if self.config.compact_mode { 2 } else { 5 };
        batch_prompt(
            &self.config,
            start,
            end,
            &self.outline_slice(start, end),
            self.memory.memory(),
            self.setting.text(),
            &self.storyline.tail_briefs(window),
        )
    }

    /// Outline slice centred on the batch midpoint. Segmented mode uses the
    /// ultra-compact variant — the plans themselves are heavier there.
    fn outline_slice(&self, start: u32, end: u32) -> String {
        let compactor = if self.config.segmented() {
            OutlineCompactor::ultra()
        } else {
            OutlineCompactor::standard()
        };
        let midpoint = start + (end - start) / 2;
        compactor.compact(self.config.outline_source(), midpoint)
    }

    async fn request_plan(
        &self,
        prompt: &str,
        expected_chapters: u32,
    ) -> Result<serde_json::Value, String> {
        let constraints = PlanConstraints {
            expected_chapters,
            segment_count: self.config.segment_count,
        };
        with_retry(&self.retry, || self.generator.plan(prompt, constraints)).await
    }
}

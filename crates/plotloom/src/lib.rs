//! Batched chapter-plan generation with bounded-context compaction for
//! long-form fiction.
//!
//! `plotloom` drives an external generative collaborator through the planning
//! of a multi-chapter storyline. Every generation call has a bounded input
//! budget, and every generated batch of per-chapter plans must satisfy strict
//! shape rules before it is accepted. The two halves of the crate mirror those
//! two constraints:
//!
//! - The **planning pipeline** ([`plan`]) partitions the target chapter count
//!   into batches, sends each batch to the collaborator, validates the result
//!   against an ordered rule set (with bounded auto-repair of small gaps),
//!   records failures, and runs a single best-effort repair pass at the end.
//!   Accepted plans accumulate in the [`Storyline`](story::Storyline) store —
//!   the only mutation surface in the crate.
//!
//! - The **context subsystem** ([`context`]) keeps each call's prompt within
//!   budget: a windowed view over neighbouring chapter plans, an LLM-compacted
//!   writing memory, a priority-tiered scene-notes scratchpad, and a
//!   chapter-marker outline slicer.
//!
//! # Getting started
//!
//! ```ignore
//! use plotloom::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), String> {
//!     let api_key = std::env::var("OPENROUTER_KEY").unwrap();
//!     let client = GenerationClient::new(api_key)?;
//!
//!     let config = SessionConfig::new(outline_text, 25)
//!         .with_characters(character_sheet)
//!         .with_compact_mode(false);
//!
//!     let mut pipeline = StorylinePipeline::new(&client, config)?;
//!     let report = pipeline.plan_storyline().await;
//!     println!("{}", report.summary());
//!
//!     for (number, plan) in pipeline.storyline().iter() {
//!         println!("{number}: {}", plan.title);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`plan`] | Batch partitioning, validation + auto-repair, failure tracking, the [`StorylinePipeline`](plan::pipeline::StorylinePipeline) loop, prompt assembly, session config |
//! | [`story`] | [`ChapterPlan`](story::ChapterPlan) / [`Segment`](story::Segment) schema types, the [`Storyline`](story::Storyline) store, snapshots, the generated-text log |
//! | [`context`] | Context-window assembly, writing-memory compaction, setting-notes compaction, outline slicing |
//! | [`api`] | HTTP generation client, retry policy with error-class backoff |
//!
//! # Design principles
//!
//! 1. **Shape rules over trust.** Collaborator output is decoded into typed
//!    values and checked against an ordered rule set. Small count gaps are
//!    auto-repaired with flagged placeholders; everything else fails the
//!    batch, never the run.
//!
//! 2. **Context is the scarcest resource.** Outline, memory, and setting text
//!    all pass through compactors with explicit character budgets before they
//!    reach a prompt.
//!
//! 3. **Failures are local.** A failed batch is recorded and the pipeline
//!    moves on; one repair pass at the end reconciles what it can. The report
//!    names what it could not.
//!
//! 4. **One writer.** The pipeline owns the storyline; compactors and
//!    builders are pure functions over explicit inputs.

pub mod api;
pub mod context;
pub mod plan;
pub mod prelude;
pub mod story;

use schemars::JsonSchema;
use std::future::Future;
use std::pin::Pin;

// Re-export schemars for downstream crates.
pub use schemars;

// ── Constants ──────────────────────────────────────────────────────

/// Default model for all generation calls.
pub const DEFAULT_MODEL: &str = "anthropic/claude-sonnet-4";

/// Maximum tokens for a structured batch-plan response.
pub const PLAN_MAX_TOKENS: u32 = 8192;

/// Maximum tokens for lightweight compaction calls.
pub const COMPACTION_MAX_TOKENS: u32 = 1024;

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` from a type that implements
/// `schemars::JsonSchema`. This is the bridge between the typed plan model
/// and the schema-driven structural check in the validator.
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Generator seam ─────────────────────────────────────────────────

/// Boxed future returned by [`Generator::plan`].
///
/// Uses a boxed future so that the trait is dyn-compatible (object-safe).
pub type PlanFuture<'a> = Pin<Box<dyn Future<Output = Result<serde_json::Value, String>> + Send + 'a>>;

/// Boxed future returned by [`Generator::complete`].
pub type CompletionFuture<'a> = Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>>;

/// Constraints attached to a structured plan request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanConstraints {
    /// Number of chapter plans the response must contain.
    pub expected_chapters: u32,
    /// Segments per chapter (0 disables segmented output).
    pub segment_count: u8,
}

/// The external generation collaborator.
///
/// Two call shapes: [`plan`](Generator::plan) for structured chapter-plan
/// batches (returns parsed JSON — the caller validates it), and
/// [`complete`](Generator::complete) for one-shot text such as writing-memory
/// compaction. Errors are surfaced as strings in the same format the
/// [retry classifier](api::retry::classify) understands.
///
/// [`GenerationClient`](api::client::GenerationClient) is the reference
/// implementation over an OpenRouter-style chat-completions API. Tests use
/// scripted implementations.
pub trait Generator: Send + Sync {
    /// Request a batch of chapter plans for the given prompt.
    fn plan(&self, prompt: &str, constraints: PlanConstraints) -> PlanFuture<'_>;

    /// Run a one-shot completion (system + user message).
    fn complete(&self, system: &str, user: &str) -> CompletionFuture<'_>;
}

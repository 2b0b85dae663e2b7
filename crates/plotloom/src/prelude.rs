//! Convenience re-exports for common `plotloom` types.
//!
//! Meant to be glob-imported when driving a planning session:
//!
//! ```ignore
//! use plotloom::prelude::*;
//! ```
//!
//! This pulls in the types needed for the vast majority of sessions: the
//! [`GenerationClient`], the [`StorylinePipeline`] + config, the storyline
//! store and plan model, and the retry policy. Specialized types (the
//! validator internals, the individual compactors, wire types) are
//! intentionally excluded — import those from their modules directly when
//! needed.

// ── Core seam ───────────────────────────────────────────────────────
pub use crate::{Generator, PlanConstraints, json_schema_for};

// ── API layer ───────────────────────────────────────────────────────
pub use crate::api::client::GenerationClient;
pub use crate::api::retry::{ErrorClass, RetryPolicy};

// ── Planning ────────────────────────────────────────────────────────
pub use crate::plan::{
    GenerationReport, Mode, RepairOutcome, SessionConfig, StorylinePipeline, ValidationError,
};

// ── Story model ─────────────────────────────────────────────────────
pub use crate::story::{ChapterPlan, Segment, Storyline, StorylineSnapshot};

// ── Context ─────────────────────────────────────────────────────────
pub use crate::context::window::ContextBundle;

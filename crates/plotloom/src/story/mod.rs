//! Story data model and the storyline store.
//!
//! - [`model`] — [`ChapterPlan`] and [`Segment`], the typed shapes every
//!   generated batch is decoded into, plus the [`ChapterBatch`] envelope and
//!   placeholder synthesis for auto-repaired gaps.
//! - [`storyline`] — [`Storyline`], the ordered chapter-number → plan store
//!   and the crate's single mutation surface; [`StorylineSnapshot`] for the
//!   external persistence hooks; [`ChapterTextLog`], the append-only log of
//!   generated chapter texts scanned by the context-window builder.

pub mod model;
pub mod storyline;

pub use model::{ChapterBatch, ChapterPlan, Segment};
pub use storyline::{ChapterTextLog, Storyline, StorylineSnapshot};

//! Context management: every byte that reaches a generation prompt passes
//! through one of these components first.
//!
//! 1. **[`window`]** — assembles the per-chapter [`ContextBundle`]: prior
//!    summaries, upcoming outline, the previous chapter's full text. Window
//!    width 5 in standard mode, 2 in compact mode.
//!
//! 2. **[`memory`]** — the bounded writing memory. Chapter notes accumulate
//!    in an unflushed buffer; past a threshold the collaborator recompresses
//!    the whole memory in one cheap call, and the result is clamped to a
//!    mode-dependent character budget.
//!
//! 3. **[`setting`]** — the scene-notes scratchpad. Paragraph blocks are
//!    classified into priority tiers (characters and abilities first, world
//!    rules second, the rest last) and emitted in tier order until the
//!    budget runs out.
//!
//! 4. **[`outline`]** — slices a large outline down to the chapter blocks
//!    near the target chapter, keyed on `Chapter N[-M]` markers.
//!
//! All four are pure over their inputs; none of them calls the collaborator
//! itself ([`memory`] only builds the request for the pipeline to send).

pub mod memory;
pub mod outline;
pub mod setting;
pub mod window;

// Re-export commonly used items at the module level.
pub use memory::{FLUSH_THRESHOLD, WritingMemory, clamp_to_budget};
pub use outline::OutlineCompactor;
pub use setting::{Priority, TempSetting, compact_setting};
pub use window::{ContextBundle, ContextWindowBuilder};

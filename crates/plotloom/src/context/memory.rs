//! The bounded writing memory and its compaction.
//!
//! Continuity beyond the context window lives here: a single memory string,
//! periodically recompressed by the collaborator. Fresh notes land in an
//! unflushed buffer first; once the buffer passes [`FLUSH_THRESHOLD`] the
//! pipeline sends `(existing memory, unflushed notes, character list)`
//! through a one-shot completion and replaces the memory with the result,
//! clamped to the active mode's budget. This module owns the state and
//! builds the request; the pipeline makes the call.

use tracing::debug;

/// Unflushed-buffer size that triggers a compaction call.
pub const FLUSH_THRESHOLD: usize = 2_000;

/// System prompt for the memory compaction call.
///
/// Instructs the model to merge the buffered notes into the running memory —
/// integrate and deduplicate, never append — and to keep names and
/// established facts verbatim.
const COMPACTION_PROMPT: &str = "\
You maintain the running writing memory for a serialized novel. Merge the new \
chapter notes into the existing memory to produce a single replacement memory.

Rules:
- Integrate, deduplicate, and update — do not simply append
- Keep character names, place names, and established facts verbatim
- Prefer unresolved threads and recent developments over finished arcs
- Stay within the character budget given in the request
- Output ONLY the replacement memory text, no commentary";

/// The session's writing memory: a bounded summary plus an unflushed buffer.
#[derive(Debug, Default)]
pub struct WritingMemory {
    memory: String,
    unflushed: String,
}

impl WritingMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from a previously saved memory string.
    pub fn with_memory(memory: impl Into<String>) -> Self {
        Self {
            memory: memory.into(),
            unflushed: String::new(),
        }
    }

    /// The current compacted memory.
    pub fn memory(&self) -> &str {
        &self.memory
    }

    /// Characters waiting in the unflushed buffer.
    pub fn pending_chars(&self) -> usize {
        self.unflushed.chars().count()
    }

    /// Append notes from a freshly generated chapter.
    pub fn note(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if !self.unflushed.is_empty() {
            self.unflushed.push('\n');
        }
        self.unflushed.push_str(text);
    }

    /// Whether the buffer is large enough to warrant a compaction call.
    pub fn needs_flush(&self) -> bool {
        self.pending_chars() > FLUSH_THRESHOLD
    }

    /// Build the `(system, user)` message pair for the compaction call.
    pub fn build_compaction_request(&self, characters: &str, budget: usize) -> (String, String) {
        let mut user = String::new();
        user.push_str(&format!("Character budget: {budget} characters.\n\n"));
        if !self.memory.is_empty() {
            user.push_str("=== EXISTING MEMORY ===\n");
            user.push_str(&self.memory);
            user.push_str("\n\n");
        }
        user.push_str("=== NEW CHAPTER NOTES ===\n");
        user.push_str(&self.unflushed);
        if !characters.is_empty() {
            user.push_str("\n\n=== CHARACTERS ===\n");
            user.push_str(characters);
        }
        (COMPACTION_PROMPT.to_string(), user)
    }

    /// Replace the memory with a compaction result and clear the buffer.
    ///
    /// The returned text is clamped to `budget` — the collaborator does not
    /// always respect the budget it was given.
    pub fn apply_compacted(&mut self, new_memory: String, budget: usize) {
        let before = new_memory.chars().count();
        self.memory = clamp_to_budget(&new_memory, budget);
        let after = self.memory.chars().count();
        if after < before {
            debug!("compacted memory clamped from {before} to {after} chars (budget {budget})");
        }
        self.unflushed.clear();
    }
}

/// Clamp `text` to at most `budget` characters.
///
/// Over-budget text is cut at the last sentence boundary between 50% and 90%
/// of the budget, keeping the cut clean; with no boundary there, it is cut
/// raw at the budget.
pub fn clamp_to_budget(text: &str, budget: usize) -> String {
    let total = text.chars().count();
    if total <= budget {
        return text.to_string();
    }

    let target = budget * 9 / 10;
    let half = budget / 2;

    let mut cut: Option<usize> = None;
    for (pos, ch) in text.chars().enumerate().take(target) {
        if pos >= half && is_sentence_end(ch) {
            cut = Some(pos + 1);
        }
    }

    match cut {
        Some(end) => text.chars().take(end).collect(),
        None => text.chars().take(budget).collect(),
    }
}

fn is_sentence_end(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?' | '\n' | '。' | '！' | '？')
}

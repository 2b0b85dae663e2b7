//! Priority-tiered compaction of the temp-setting scratchpad.
//!
//! Scene, ability, and character notes accumulate across chapters and would
//! otherwise grow without bound. When the scratchpad exceeds its budget, its
//! paragraph blocks are classified into three tiers and re-emitted in tier
//! order until the budget runs out. Character and ability notes survive
//! longest; ambient colour goes first.

/// Minimum leftover budget for which an overflowing high-priority block is
/// truncated with an ellipsis instead of dropped.
const TRUNCATE_FLOOR: usize = 50;

/// Separator between emitted blocks (counted against the budget).
const BLOCK_SEP: &str = "\n\n";

/// Priority tier of a setting block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    High,
    Medium,
    Low,
}

const HIGH_KEYWORDS: &[&str] = &[
    "character",
    "ability",
    "abilities",
    "relationship",
    "power",
    "skill",
];

const MEDIUM_KEYWORDS: &[&str] = &[
    "location",
    "rule",
    "background",
    "setting",
    "world",
    "faction",
];

/// Classify a paragraph block by keyword.
pub fn classify_block(block: &str) -> Priority {
    let lower = block.to_lowercase();
    if HIGH_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Priority::High
    } else if MEDIUM_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Priority::Medium
    } else {
        Priority::Low
    }
}

/// Compact setting text to at most `budget` characters.
///
/// Blocks are emitted high tier first, preserving original order within a
/// tier. A high-priority block that would overflow is ellipsis-truncated when
/// at least [`TRUNCATE_FLOOR`] characters of budget remain — and emission
/// stops there; lower-tier blocks that don't fit are simply skipped.
pub fn compact_setting(text: &str, budget: usize) -> String {
    if text.chars().count() <= budget {
        return text.to_string();
    }

    let blocks: Vec<&str> = text
        .split(BLOCK_SEP)
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .collect();

    let mut out = String::new();
    let mut used = 0usize;

    for tier in [Priority::High, Priority::Medium, Priority::Low] {
        for block in blocks.iter().filter(|b| classify_block(b) == tier) {
            let sep = if out.is_empty() { 0 } else { BLOCK_SEP.len() };
            let block_chars = block.chars().count();

            if used + sep + block_chars <= budget {
                if sep > 0 {
                    out.push_str(BLOCK_SEP);
                }
                out.push_str(block);
                used += sep + block_chars;
            } else if tier == Priority::High && budget.saturating_sub(used + sep) >= TRUNCATE_FLOOR {
                let room = budget - used - sep - 1; // reserve the ellipsis
                if sep > 0 {
                    out.push_str(BLOCK_SEP);
                }
                out.extend(block.chars().take(room));
                out.push('…');
                return out;
            }
            // else: drop the block and keep looking for one that fits.
        }
    }

    out
}

/// The accumulating scene-notes scratchpad.
///
/// Owned by the pipeline; [`absorb`](TempSetting::absorb) is the only way it
/// grows, and it never leaves the budget exceeded.
#[derive(Debug, Default)]
pub struct TempSetting {
    text: String,
}

impl TempSetting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Append new setting notes, compacting if the result exceeds `budget`.
    pub fn absorb(&mut self, incoming: &str, budget: usize) {
        let incoming = incoming.trim();
        if incoming.is_empty() {
            return;
        }
        let combined = if self.text.is_empty() {
            incoming.to_string()
        } else {
            format!("{}{BLOCK_SEP}{incoming}", self.text)
        };
        self.text = if combined.chars().count() <= budget {
            combined
        } else {
            compact_setting(&combined, budget)
        };
    }
}

//! Outline slicing around a target chapter.
//!
//! A serialized novel's outline easily outgrows any per-call budget. This
//! compactor keeps the free-text header plus only the chapter blocks near the
//! target chapter, detected via `Chapter N` / `Chapter N-M` heading markers.
//! Short outlines pass through untouched, and a slice that comes out too thin
//! falls back rather than feeding the generator an empty outline.
//!
//! Compaction is deterministic and idempotent: re-compacting an already
//! compacted outline for the same chapter returns it unchanged.

use regex::Regex;
use std::sync::OnceLock;

/// Marker pattern: a line starting a `Chapter N` or `Chapter N-M` block.
fn marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*(?:#+\s*)?Chapter\s+(\d+)(?:\s*-\s*(\d+))?\b")
            .expect("chapter marker pattern is valid")
    })
}

/// A contiguous outline block covering chapters `lo..=hi`.
#[derive(Debug)]
struct OutlineBlock<'a> {
    lo: u32,
    hi: u32,
    text: &'a str,
}

/// Chapter-window outline compactor.
///
/// [`standard()`](OutlineCompactor::standard) keeps a ±3 chapter window and
/// falls back to the original outline when the slice is too thin.
/// [`ultra()`](OutlineCompactor::ultra) — used in segmented / long-chapter
/// mode where the plan itself is heavier — keeps ±1 and falls back to the
/// first 500 characters.
#[derive(Debug, Clone, Copy)]
pub struct OutlineCompactor {
    window: u32,
    /// Outlines shorter than this pass through unchanged.
    short_circuit: usize,
    /// Slices thinner than this trigger the fallback.
    min_len: usize,
    ultra: bool,
}

impl OutlineCompactor {
    pub fn standard() -> Self {
        Self {
            window: 3,
            short_circuit: 1000,
            min_len: 100,
            ultra: false,
        }
    }

    pub fn ultra() -> Self {
        Self {
            window: 1,
            short_circuit: 500,
            min_len: 50,
            ultra: true,
        }
    }

    /// Condense `outline` around `chapter`.
    pub fn compact(&self, outline: &str, chapter: u32) -> String {
        if outline.chars().count() < self.short_circuit {
            return outline.to_string();
        }

        let (header, blocks) = parse_blocks(outline);
        if blocks.is_empty() {
            return self.fallback(outline);
        }

        let lo = chapter.saturating_sub(self.window);
        let hi = chapter + self.window;
        let mut kept = String::from(header.trim_end());
        for block in &blocks {
            if block.lo <= hi && block.hi >= lo {
                if !kept.is_empty() {
                    kept.push('\n');
                }
                kept.push_str(block.text.trim_end());
            }
        }

        if kept.chars().count() < self.min_len {
            self.fallback(outline)
        } else {
            kept
        }
    }

    fn fallback(&self, outline: &str) -> String {
        if self.ultra {
            outline.chars().take(500).collect()
        } else {
            outline.to_string()
        }
    }
}

/// Split an outline into its free-text header and chapter blocks.
///
/// Each block runs from one marker line to the start of the next. A single
/// `Chapter N` marker covers just that chapter; `Chapter N-M` covers the
/// whole range.
fn parse_blocks(outline: &str) -> (&str, Vec<OutlineBlock<'_>>) {
    let markers: Vec<(usize, u32, u32)> = marker_re()
        .captures_iter(outline)
        .filter_map(|cap| {
            let m = cap.get(0)?;
            let lo: u32 = cap.get(1)?.as_str().parse().ok()?;
            let hi: u32 = cap
                .get(2)
                .and_then(|g| g.as_str().parse().ok())
                .unwrap_or(lo);
            Some((m.start(), lo, hi.max(lo)))
        })
        .collect();

    let Some(&(first_start, _, _)) = markers.first() else {
        return (outline, Vec::new());
    };

    let header = outline.get(..first_start).unwrap_or("");
    let blocks = markers
        .iter()
        .enumerate()
        .filter_map(|(i, &(start, lo, hi))| {
            let end = markers.get(i + 1).map_or(outline.len(), |&(next, _, _)| next);
            outline.get(start..end).map(|text| OutlineBlock { lo, hi, text })
        })
        .collect();

    (header, blocks)
}

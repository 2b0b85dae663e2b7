//! Per-chapter context-window assembly.
//!
//! One bundle per chapter-generation call: summaries of the chapters just
//! behind, outline of the chapters just ahead, the previous chapter's full
//! text, and the chapter's own plan. Standard mode looks five chapters in
//! each direction; compact mode looks two and drops the full previous text —
//! summaries carry the continuity at a fraction of the cost.
//!
//! This is pure assembly over the storyline and the text log. No generation
//! happens here.

use crate::story::model::ChapterPlan;
use crate::story::storyline::{ChapterTextLog, Storyline};

/// Chapter-window width in standard mode.
const WINDOW_STANDARD: u32 = 5;

/// Chapter-window width in compact mode.
const WINDOW_COMPACT: u32 = 2;

/// The bounded context bundle for one chapter's generation call.
///
/// Ephemeral — rebuilt for every call, no persistent identity.
#[derive(Debug, Clone, Default)]
pub struct ContextBundle {
    /// Briefs of the preceding chapters inside the window.
    pub prev_summary: String,
    /// Briefs of the upcoming chapters inside the window.
    pub next_outline: String,
    /// Full text of the previous chapter (empty in compact mode or when the
    /// text log has no entry for it).
    pub prev_chapter_text: String,
    /// The chapter's own accepted plan, if any.
    pub current_plan: Option<ChapterPlan>,
}

/// Assembles [`ContextBundle`]s from the storyline and the text log.
#[derive(Debug, Clone, Copy)]
pub struct ContextWindowBuilder<'a> {
    storyline: &'a Storyline,
    text_log: &'a ChapterTextLog,
    total_chapters: u32,
    compact: bool,
}

impl<'a> ContextWindowBuilder<'a> {
    pub fn new(
        storyline: &'a Storyline,
        text_log: &'a ChapterTextLog,
        total_chapters: u32,
        compact: bool,
    ) -> Self {
        Self {
            storyline,
            text_log,
            total_chapters,
            compact,
        }
    }

    fn window(&self) -> u32 {
        if self.compact { WINDOW_COMPACT } else { WINDOW_STANDARD }
    }

    /// Build the bundle for `chapter`.
    ///
    /// Chapters absent from the storyline are skipped, not stubbed — a gap
    /// left by an unresolved batch simply contributes nothing.
    pub fn build(&self, chapter: u32) -> ContextBundle {
        let window = self.window();

        let prev_from = chapter.saturating_sub(window).max(1);
        let prev_summary = self.briefs(prev_from, chapter.saturating_sub(1));

        let next_to = chapter.saturating_add(window).min(self.total_chapters);
        let next_outline = self.briefs(chapter + 1, next_to);

        let prev_chapter_text = if self.compact || chapter < 2 {
            String::new()
        } else {
            self.text_log
                .latest_for_chapter(chapter - 1)
                .unwrap_or_default()
                .to_string()
        };

        ContextBundle {
            prev_summary,
            next_outline,
            prev_chapter_text,
            current_plan: self.storyline.get(chapter).cloned(),
        }
    }

    /// Joined briefs for chapters `from..=to` present in the storyline.
    fn briefs(&self, from: u32, to: u32) -> String {
        if from > to {
            return String::new();
        }
        (from..=to)
            .filter_map(|n| self.storyline.get(n))
            .map(ChapterPlan::brief)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

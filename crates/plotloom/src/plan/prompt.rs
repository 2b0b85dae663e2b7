//! Prompt assembly for plan requests.
//!
//! Prompts are built from named sections with explicit `===` markers; empty
//! sections are skipped so a fresh session's first batch isn't padded with
//! blank headings. The count and format instructions are always last and
//! always explicit — the validator downstream enforces exactly what they
//! promise.

use crate::plan::config::SessionConfig;

/// Section-based prompt builder.
///
/// The preamble is included as-is; each named section gets a marker line.
#[derive(Debug)]
pub struct PromptBuilder {
    sections: Vec<String>,
}

impl PromptBuilder {
    /// Create a builder with an initial preamble section.
    pub fn new(preamble: impl Into<String>) -> Self {
        Self {
            sections: vec![preamble.into()],
        }
    }

    /// Append a named section. Skipped if `content` is empty.
    pub fn section(mut self, heading: &str, content: impl Into<String>) -> Self {
        let content = content.into();
        if !content.trim().is_empty() {
            self.sections.push(format!("=== {heading} ===\n{content}"));
        }
        self
    }

    /// Conditionally append a section (lazy content).
    pub fn section_if(self, condition: bool, heading: &str, content_fn: impl FnOnce() -> String) -> Self {
        if condition {
            self.section(heading, content_fn())
        } else {
            self
        }
    }

    /// Assemble the final prompt string.
    pub fn build(self) -> String {
        self.sections.join("\n\n")
    }
}

/// The full batch-plan request prompt.
///
/// Carries everything the collaborator may use — outline slice, characters,
/// continuity memory, scene notes, the tail of already-accepted chapters —
/// plus the count/format contract.
pub fn batch_prompt(
    config: &SessionConfig,
    start: u32,
    end: u32,
    outline_slice: &str,
    memory: &str,
    setting: &str,
    recent_briefs: &str,
) -> String {
    PromptBuilder::new(format!(
        "Plan chapters {start} through {end} of a {}-chapter story.",
        config.total_chapters
    ))
    .section("OUTLINE", outline_slice)
    .section("CHARACTERS", config.characters.as_str())
    .section("WRITING MEMORY", memory)
    .section("SCENE NOTES", setting)
    .section("PRECEDING CHAPTERS", recent_briefs)
    .section("OUTPUT FORMAT", format_instructions(start, end, config.segment_count))
    .build()
}

/// The context-minimal repair prompt: outline slice and the contract only.
pub fn repair_prompt(config: &SessionConfig, start: u32, end: u32, outline_slice: &str) -> String {
    PromptBuilder::new(format!(
        "Plan chapters {start} through {end} of a {}-chapter story. A previous \
         attempt at this range was rejected; produce a clean, complete batch.",
        config.total_chapters
    ))
    .section("OUTLINE", outline_slice)
    .section("OUTPUT FORMAT", format_instructions(start, end, config.segment_count))
    .build()
}

/// The explicit count/format contract appended to every plan request.
fn format_instructions(start: u32, end: u32, segment_count: u8) -> String {
    let expected = end - start + 1;
    let mut text = format!(
        "Return a single JSON object: {{\"chapters\": [...]}} with exactly {expected} \
         chapter object(s), numbered {start} through {end} in order.\n\
         Each chapter object: {{\"number\": int, \"title\": string (2-100 chars), \
         \"plot_summary\": string (20-2000 chars), \"key_events\": [string], \
         \"characters\": [string], \"mood\": string}}."
    );
    if segment_count > 0 {
        text.push_str(&format!(
            "\nEach chapter additionally carries \"segments\": exactly {segment_count} \
             object(s) {{\"index\": 1-{segment_count} in order, \"title\": string, \
             \"summary\": non-empty string, \"key_events\": [string], \
             \"purpose\": string, \"transition\": string}}."
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SessionConfig {
        SessionConfig::new("Chapter 1: begin\nChapter 2: end", 25)
            .with_characters("Mira — exiled cartographer.\nJoren — her debtor.")
    }

    #[test]
    fn builder_skips_empty_sections() {
        let prompt = PromptBuilder::new("Preamble")
            .section("FILLED", "content")
            .section("EMPTY", "")
            .section("BLANK", "   ")
            .build();
        assert!(prompt.contains("=== FILLED ==="));
        assert!(!prompt.contains("EMPTY"));
        assert!(!prompt.contains("BLANK"));
    }

    #[test]
    fn section_if_lazy() {
        let prompt = PromptBuilder::new("P")
            .section_if(false, "SKIPPED", || unreachable!())
            .section_if(true, "TAKEN", || "yes".to_string())
            .build();
        assert!(prompt.contains("TAKEN"));
        assert!(!prompt.contains("SKIPPED"));
    }

    #[test]
    fn batch_prompt_states_the_contract() {
        let prompt = batch_prompt(&config(), 11, 20, "outline slice", "memory", "notes", "briefs");
        assert!(prompt.contains("chapters 11 through 20"));
        assert!(prompt.contains("exactly 10 chapter object(s)"));
        assert!(prompt.contains("numbered 11 through 20"));
        assert!(prompt.contains("=== CHARACTERS ==="));
        assert!(prompt.contains("=== WRITING MEMORY ==="));
        assert!(!prompt.contains("segments"));
    }

    #[test]
    fn segmented_contract_added() {
        let cfg = config().with_segment_count(3);
        let prompt = batch_prompt(&cfg, 1, 5, "o", "", "", "");
        assert!(prompt.contains("exactly 3 object(s)"));
        assert!(prompt.contains("\"index\": 1-3 in order"));
    }

    #[test]
    fn empty_context_sections_dropped() {
        let cfg = SessionConfig::new("outline text here", 10);
        let prompt = batch_prompt(&cfg, 1, 10, "outline text here", "", "", "");
        assert!(!prompt.contains("WRITING MEMORY"));
        assert!(!prompt.contains("SCENE NOTES"));
        assert!(!prompt.contains("PRECEDING CHAPTERS"));
        assert!(!prompt.contains("CHARACTERS"));
    }

    #[test]
    fn repair_prompt_is_minimal() {
        let prompt = repair_prompt(&config(), 11, 20, "outline slice");
        assert!(prompt.contains("rejected"));
        assert!(prompt.contains("=== OUTLINE ==="));
        assert!(!prompt.contains("WRITING MEMORY"));
        assert!(!prompt.contains("CHARACTERS"));
        assert!(prompt.contains("exactly 10 chapter object(s)"));
    }
}

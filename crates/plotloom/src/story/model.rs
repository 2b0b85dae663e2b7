//! Typed chapter-plan model.
//!
//! Generated batches are decoded into these structs in a single serde step —
//! field-level tolerance (empty strings, missing lists) is deliberate, so
//! that shape problems surface in the validator's content checks as
//! recoverable errors rather than decode failures. Only the `chapters`
//! envelope field itself is required.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Character bounds for a chapter title.
pub const TITLE_CHARS: (usize, usize) = (2, 100);

/// Character bounds for a chapter plot summary.
pub const SUMMARY_CHARS: (usize, usize) = (20, 2000);

/// One beat of a chapter's plot in segmented (long-chapter) mode.
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, Default, PartialEq)]
pub struct Segment {
    /// 1-based position within the chapter.
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub key_events: Vec<String>,
    /// What this beat accomplishes for the chapter.
    #[serde(default)]
    pub purpose: String,
    /// How it hands off to the next beat.
    #[serde(default)]
    pub transition: String,
}

/// The plan for a single chapter.
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, Default, PartialEq)]
pub struct ChapterPlan {
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub plot_summary: String,
    #[serde(default)]
    pub key_events: Vec<String>,
    #[serde(default)]
    pub characters: Vec<String>,
    #[serde(default)]
    pub mood: String,
    /// Present only in segmented mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<Segment>>,
    /// True for auto-repaired stand-ins that need regeneration before drafting.
    #[serde(default, skip_serializing_if = "is_false")]
    pub placeholder: bool,
}

fn is_false(v: &bool) -> bool {
    !v
}

impl ChapterPlan {
    /// Synthesize a placeholder plan for a chapter the collaborator omitted.
    ///
    /// The text satisfies the content bounds so the repaired batch still
    /// passes validation; `placeholder` marks it for later regeneration. In
    /// segmented mode the stand-in carries placeholder segments as well, so
    /// the segment cardinality check stays a warning rather than a failure.
    pub fn placeholder(number: u32, segment_count: u8) -> Self {
        let segments = (segment_count > 0).then(|| {
            (1..=u32::from(segment_count))
                .map(|index| Segment {
                    index,
                    title: format!("Beat {index}"),
                    summary: "Placeholder beat, to be filled in on regeneration.".to_string(),
                    key_events: Vec::new(),
                    purpose: "Hold the position of a missing beat.".to_string(),
                    transition: String::new(),
                })
                .collect()
        });
        Self {
            number,
            title: format!("Chapter {number} (placeholder)"),
            plot_summary: "Placeholder plan: the generator returned too few chapters for this \
                           range. Regenerate this chapter before drafting its text."
                .to_string(),
            key_events: Vec::new(),
            characters: Vec::new(),
            mood: String::new(),
            segments,
            placeholder: true,
        }
    }

    /// One-line form used when this plan appears in another chapter's context.
    pub fn brief(&self) -> String {
        format!("Chapter {}: {} — {}", self.number, self.title, self.plot_summary)
    }
}

/// Top-level envelope a plan batch is decoded from.
///
/// `chapters` is intentionally not defaulted: a response without it fails
/// decoding (and the schema check) as a structural error.
#[derive(Serialize, Deserialize, JsonSchema, Debug)]
pub struct ChapterBatch {
    pub chapters: Vec<ChapterPlan>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_chapter_decode() {
        let plan: ChapterPlan = serde_json::from_value(serde_json::json!({
            "number": 3,
            "title": "The Gate"
        }))
        .unwrap();
        assert_eq!(plan.number, 3);
        assert!(plan.plot_summary.is_empty());
        assert!(plan.segments.is_none());
        assert!(!plan.placeholder);
    }

    #[test]
    fn batch_requires_chapters_field() {
        let result: Result<ChapterBatch, _> = serde_json::from_value(serde_json::json!({}));
        assert!(result.is_err());
    }

    #[test]
    fn placeholder_satisfies_content_bounds() {
        let plan = ChapterPlan::placeholder(7, 0);
        assert!(plan.placeholder);
        let title_len = plan.title.chars().count();
        assert!(title_len >= TITLE_CHARS.0 && title_len <= TITLE_CHARS.1);
        let summary_len = plan.plot_summary.chars().count();
        assert!(summary_len >= SUMMARY_CHARS.0 && summary_len <= SUMMARY_CHARS.1);
        assert!(plan.segments.is_none());
    }

    #[test]
    fn placeholder_carries_segments_in_segmented_mode() {
        let plan = ChapterPlan::placeholder(4, 3);
        let segments = plan.segments.unwrap();
        assert_eq!(segments.len(), 3);
        let indices: Vec<u32> = segments.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert!(segments.iter().all(|s| !s.summary.is_empty()));
    }

    #[test]
    fn placeholder_flag_serialized_only_when_set() {
        let normal = ChapterPlan {
            number: 1,
            title: "One".into(),
            ..Default::default()
        };
        let json = serde_json::to_value(&normal).unwrap();
        assert!(json.get("placeholder").is_none());

        let stand_in = ChapterPlan::placeholder(2, 0);
        let json = serde_json::to_value(&stand_in).unwrap();
        assert_eq!(json["placeholder"], true);
    }

    #[test]
    fn brief_contains_number_and_title() {
        let plan = ChapterPlan {
            number: 12,
            title: "Ashfall".into(),
            plot_summary: "The city burns and the survivors regroup in the catacombs.".into(),
            ..Default::default()
        };
        let brief = plan.brief();
        assert!(brief.starts_with("Chapter 12: Ashfall"));
        assert!(brief.contains("catacombs"));
    }
}

//! The storyline store, snapshots, and the generated-text log.
//!
//! [`Storyline`] is the accumulated result of a planning session: an ordered
//! chapter-number → [`ChapterPlan`] map. It is the crate's single mutation
//! surface — the pipeline writes, everything else reads. Persistence is an
//! external concern; [`StorylineSnapshot`] is the JSON-serializable shape
//! handed across that boundary.

use crate::story::model::ChapterPlan;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Ordered mapping from chapter number to its accepted plan.
#[derive(Debug, Default, Clone)]
pub struct Storyline {
    chapters: BTreeMap<u32, ChapterPlan>,
}

impl Storyline {
    pub fn new() -> Self {
        Self::default()
    }

    /// The plan for chapter `number`, if accepted.
    pub fn get(&self, number: u32) -> Option<&ChapterPlan> {
        self.chapters.get(&number)
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    /// Iterate chapters in number order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&u32, &ChapterPlan)> {
        self.chapters.iter()
    }

    /// All accepted chapter numbers, ascending.
    pub fn numbers(&self) -> Vec<u32> {
        self.chapters.keys().copied().collect()
    }

    /// Merge a validated batch. Plans land in number order; an existing plan
    /// for the same number is replaced.
    pub fn merge(&mut self, plans: Vec<ChapterPlan>) {
        for plan in plans {
            self.chapters.insert(plan.number, plan);
        }
    }

    /// Remove chapters `start..=end`, returning how many were present.
    ///
    /// Used before merging a repaired batch, in case stale or partial entries
    /// survived the original failure.
    pub fn remove_range(&mut self, start: u32, end: u32) -> usize {
        let mut removed = 0;
        for number in start..=end {
            if self.chapters.remove(&number).is_some() {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!("cleared {removed} stale chapter plan(s) in {start}-{end}");
        }
        removed
    }

    /// Chapter numbers in `start..=end` with no accepted plan.
    pub fn missing_in(&self, start: u32, end: u32) -> Vec<u32> {
        (start..=end)
            .filter(|n| !self.chapters.contains_key(n))
            .collect()
    }

    /// One-line briefs of the last `count` accepted chapters, for prompt
    /// continuity across batches.
    pub fn tail_briefs(&self, count: usize) -> String {
        let mut briefs: Vec<String> = self
            .chapters
            .values()
            .rev()
            .take(count)
            .map(ChapterPlan::brief)
            .collect();
        briefs.reverse();
        briefs.join("\n")
    }

    /// Serializable snapshot for the external persistence layer.
    pub fn snapshot(&self) -> StorylineSnapshot {
        StorylineSnapshot {
            saved_at: chrono::Utc::now().to_rfc3339(),
            chapters: self.chapters.values().cloned().collect(),
        }
    }

    /// Rebuild a storyline from a previously serialized snapshot.
    pub fn from_snapshot(snapshot: StorylineSnapshot) -> Self {
        let mut storyline = Self::new();
        storyline.merge(snapshot.chapters);
        storyline
    }
}

/// JSON-serializable snapshot of a [`Storyline`].
#[derive(Serialize, Deserialize, Debug)]
pub struct StorylineSnapshot {
    /// RFC 3339 timestamp of the snapshot.
    pub saved_at: String,
    /// Chapter plans in number order.
    pub chapters: Vec<ChapterPlan>,
}

impl StorylineSnapshot {
    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|e| format!("failed to serialize snapshot: {e}"))
    }

    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| format!("failed to parse snapshot: {e}"))
    }
}

// ── Generated-text log ─────────────────────────────────────────────

/// Append-only log of generated chapter texts.
///
/// The context-window builder scans this backwards to find the previous
/// chapter's full text by its heading line. Entries are whole chapter texts;
/// re-generations of the same chapter simply append, and the reverse scan
/// naturally picks the most recent version.
#[derive(Debug, Default)]
pub struct ChapterTextLog {
    entries: Vec<String>,
}

impl ChapterTextLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chapter text, composing the heading line the scan looks for.
    pub fn push_chapter(&mut self, number: u32, title: &str, body: &str) {
        self.entries.push(format!("Chapter {number}: {title}\n\n{body}"));
    }

    /// Append pre-headed text verbatim.
    pub fn push_raw(&mut self, text: impl Into<String>) {
        self.entries.push(text.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most recent entry whose heading names chapter `number`.
    pub fn latest_for_chapter(&self, number: u32) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|entry| heading_matches(entry, number))
            .map(String::as_str)
    }
}

/// Whether the first line of `text` contains a `Chapter <number>` heading.
///
/// The digit run must end at the number — "Chapter 12" is not a match for
/// chapter 1.
fn heading_matches(text: &str, number: u32) -> bool {
    let first_line = text.lines().next().unwrap_or("");
    let needle = format!("Chapter {number}");
    let Some(pos) = first_line.find(&needle) else {
        return false;
    };
    !matches!(
        first_line.as_bytes().get(pos + needle.len()),
        Some(b) if b.is_ascii_digit()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(number: u32) -> ChapterPlan {
        ChapterPlan {
            number,
            title: format!("Title {number}"),
            plot_summary: format!("Summary of chapter {number}, long enough to be realistic."),
            ..Default::default()
        }
    }

    #[test]
    fn merge_keeps_number_order() {
        let mut storyline = Storyline::new();
        storyline.merge(vec![plan(3), plan(1), plan(2)]);
        assert_eq!(storyline.numbers(), vec![1, 2, 3]);
    }

    #[test]
    fn merge_replaces_existing() {
        let mut storyline = Storyline::new();
        storyline.merge(vec![plan(1)]);
        let mut updated = plan(1);
        updated.title = "Revised".into();
        storyline.merge(vec![updated]);
        assert_eq!(storyline.len(), 1);
        assert_eq!(storyline.get(1).unwrap().title, "Revised");
    }

    #[test]
    fn remove_range_counts_removals() {
        let mut storyline = Storyline::new();
        storyline.merge(vec![plan(1), plan(2), plan(5)]);
        assert_eq!(storyline.remove_range(1, 4), 2);
        assert_eq!(storyline.numbers(), vec![5]);
    }

    #[test]
    fn missing_in_reports_gaps() {
        let mut storyline = Storyline::new();
        storyline.merge(vec![plan(1), plan(3)]);
        assert_eq!(storyline.missing_in(1, 4), vec![2, 4]);
    }

    #[test]
    fn tail_briefs_in_ascending_order() {
        let mut storyline = Storyline::new();
        storyline.merge(vec![plan(1), plan(2), plan(3), plan(4)]);
        let briefs = storyline.tail_briefs(2);
        let pos3 = briefs.find("Chapter 3").unwrap();
        let pos4 = briefs.find("Chapter 4").unwrap();
        assert!(pos3 < pos4);
        assert!(!briefs.contains("Chapter 2"));
    }

    #[test]
    fn snapshot_round_trip() {
        let mut storyline = Storyline::new();
        storyline.merge(vec![plan(1), plan(2)]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storyline.json");
        std::fs::write(&path, storyline.snapshot().to_json().unwrap()).unwrap();

        let loaded = StorylineSnapshot::from_json(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let restored = Storyline::from_snapshot(loaded);
        assert_eq!(restored.numbers(), vec![1, 2]);
        assert_eq!(restored.get(2).unwrap().title, "Title 2");
    }

    #[test]
    fn text_log_reverse_scan_finds_latest() {
        let mut log = ChapterTextLog::new();
        log.push_chapter(1, "First", "old text");
        log.push_chapter(2, "Second", "middle text");
        log.push_chapter(1, "First, revised", "new text");

        let found = log.latest_for_chapter(1).unwrap();
        assert!(found.contains("new text"));
    }

    #[test]
    fn text_log_no_prefix_confusion() {
        let mut log = ChapterTextLog::new();
        log.push_chapter(12, "Twelve", "body");
        assert!(log.latest_for_chapter(1).is_none());
        assert!(log.latest_for_chapter(12).is_some());
    }

    #[test]
    fn text_log_missing_chapter() {
        let log = ChapterTextLog::new();
        assert!(log.latest_for_chapter(3).is_none());
    }
}

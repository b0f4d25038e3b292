//! Transcript reconciliation: merging incremental deltas with
//! authoritative final results.

use std::collections::HashMap;

use tracing::debug;

use crate::types::TranscribedText;

/// Merge an incoming fragment into the accumulated transcript.
///
/// A final fragment overwrites the accumulator wholesale: the server's
/// final transcript supersedes any concatenation of prior deltas, which
/// may have contained corrections the naive concatenation would miss.
/// Non-final fragments are appended.
#[inline]
pub fn merge_transcript(current: &str, fragment: &str, is_final: bool) -> String {
    if is_final {
        fragment.to_string()
    } else {
        let mut merged = String::with_capacity(current.len() + fragment.len());
        merged.push_str(current);
        merged.push_str(fragment);
        merged
    }
}

/// Per-item transcript accumulators, keyed by the server-assigned item id.
///
/// An accumulator starts empty on the first delta for an item and is
/// removed as soon as the item's completion is merged, so memory stays
/// bounded by the number of concurrently in-flight items.
#[derive(Debug, Default)]
pub struct TranscriptAggregator {
    items: HashMap<String, String>,
}

impl TranscriptAggregator {
    /// Create an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a non-final fragment to an item, returning the updated text.
    pub fn apply_delta(&mut self, item_id: &str, fragment: &str) -> TranscribedText {
        let entry = self.items.entry(item_id.to_string()).or_default();
        *entry = merge_transcript(entry, fragment, false);
        debug!(item_id, chars = entry.len(), "Merged partial transcript");
        TranscribedText::new(entry.clone(), 1.0)
    }

    /// Apply a final transcript to an item and retire its accumulator.
    ///
    /// A completion for an item with no prior accumulator is treated as a
    /// fresh accumulator overwritten directly to the final text.
    pub fn apply_final(&mut self, item_id: &str, transcript: &str) -> TranscribedText {
        let current = self.items.remove(item_id).unwrap_or_default();
        let merged = merge_transcript(&current, transcript, true);
        debug!(item_id, chars = merged.len(), "Finalized transcript");
        TranscribedText::new(merged, 1.0)
    }

    /// Number of items with an open accumulator.
    #[inline]
    pub fn in_flight(&self) -> usize {
        self.items.len()
    }

    /// Whether no item has an open accumulator.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_append_law() {
        assert_eq!(merge_transcript("", "hi", false), "hi");
        assert_eq!(merge_transcript("hi", " there", false), "hi there");
        assert_eq!(merge_transcript("hi", "", false), "hi");
    }

    #[test]
    fn test_merge_overwrite_law() {
        // Final always overwrites, independent of the prior text
        assert_eq!(merge_transcript("hi", "hi there", true), "hi there");
        assert_eq!(merge_transcript("garbage", "clean", true), "clean");
        assert_eq!(merge_transcript("", "solo", true), "solo");
        assert_eq!(merge_transcript("something", "", true), "");
    }

    #[test]
    fn test_aggregator_delta_accumulation() {
        let mut agg = TranscriptAggregator::new();

        let first = agg.apply_delta("item_001", "hi");
        assert_eq!(first.text, "hi");
        assert_eq!(first.confidence, 1.0);

        let second = agg.apply_delta("item_001", " there");
        assert_eq!(second.text, "hi there");
        assert_eq!(agg.in_flight(), 1);
    }

    #[test]
    fn test_aggregator_final_retires_item() {
        let mut agg = TranscriptAggregator::new();
        agg.apply_delta("item_001", "hi");

        let done = agg.apply_final("item_001", "hi there");
        assert_eq!(done.text, "hi there");
        assert!(agg.is_empty());
    }

    #[test]
    fn test_aggregator_final_without_prior_deltas() {
        let mut agg = TranscriptAggregator::new();
        let done = agg.apply_final("item_fresh", "single shot");
        assert_eq!(done.text, "single shot");
        assert!(agg.is_empty());
    }

    #[test]
    fn test_aggregator_independent_items() {
        let mut agg = TranscriptAggregator::new();
        agg.apply_delta("a", "first");
        agg.apply_delta("b", "second");
        assert_eq!(agg.in_flight(), 2);

        let done = agg.apply_final("a", "first done");
        assert_eq!(done.text, "first done");
        assert_eq!(agg.in_flight(), 1);

        let ongoing = agg.apply_delta("b", " part");
        assert_eq!(ongoing.text, "second part");
    }

    #[test]
    fn test_aggregator_delta_after_final_starts_fresh() {
        // The protocol delivers completion after the last delta; if it ever
        // does not, the late delta opens a new accumulator for that id.
        let mut agg = TranscriptAggregator::new();
        agg.apply_delta("item_001", "hi");
        agg.apply_final("item_001", "hi there");

        let late = agg.apply_delta("item_001", "straggler");
        assert_eq!(late.text, "straggler");
    }
}

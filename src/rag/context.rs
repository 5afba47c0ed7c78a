//! Context assembly from merged search results
//!
//! Bare message hits are expanded into small dialog windows (one batched
//! message-store call), window-shaped hits are used as they are, and the
//! combined candidates are packed into a hard character budget in similarity
//! order. Every fragment considered ends up in the [`ContextTracker`] with the
//! reason it was or was not included.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use tracing::warn;

use super::constants::CONTEXT_TOP_K;
use super::constants::CONTEXT_WINDOW_RADIUS;
use super::constants::FRAGMENT_SEPARATOR;
use super::merge::finite_similarity;
use super::merge::sort_by_similarity;
use crate::errors::Result;
use crate::models::ChatId;
use crate::models::Fragment;
use crate::models::Message;
use crate::models::MessageId;
use crate::store::MessageStore;

/// Why a fragment was or was not placed in the context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InclusionReason {
    Ok,
    EmptyText,
    NotInTopK,
    BudgetExceeded,
    ConfidenceNone,
    SmartNoContext,
}

impl InclusionReason {
    #[must_use]
    pub const fn is_included(self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// One entry of the tracker log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContextDecision {
    pub message_id: MessageId,
    pub included: bool,
    pub reason: InclusionReason,
}

/// Append-only log of inclusion decisions for one request
///
/// Entries are never rewritten; when a message is decided more than once the
/// latest entry is the one that counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContextTracker {
    decisions: Vec<ContextDecision>,
}

impl ContextTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, message_id: MessageId, reason: InclusionReason) {
        self.decisions.push(ContextDecision {
            message_id,
            included: reason.is_included(),
            reason,
        });
    }

    /// Append another log after this one
    pub fn extend(&mut self, other: ContextTracker) {
        self.decisions.extend(other.decisions);
    }

    #[must_use]
    pub fn decisions(&self) -> &[ContextDecision] {
        &self.decisions
    }

    /// Latest decision for a message
    #[must_use]
    pub fn decision_for(&self, message_id: MessageId) -> Option<&ContextDecision> {
        self.decisions.iter().rev().find(|d| d.message_id == message_id)
    }

    /// Latest decision per message
    #[must_use]
    pub fn snapshot(&self) -> HashMap<MessageId, ContextDecision> {
        self.decisions.iter().map(|d| (d.message_id, *d)).collect()
    }

    #[must_use]
    pub fn count(&self, reason: InclusionReason) -> usize {
        self.snapshot().values().filter(|d| d.reason == reason).count()
    }

    #[must_use]
    pub fn included_ids(&self) -> Vec<MessageId> {
        let mut ids: Vec<_> = self
            .snapshot()
            .into_values()
            .filter(|d| d.included)
            .map(|d| d.message_id)
            .collect();
        ids.sort_unstable();
        ids
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }
}

/// Where a context candidate's text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowSource {
    /// Already a window in the index
    Indexed,
    /// Expanded from the message store
    Expanded,
    /// Message missing from the store; the raw fragment text is used
    RawFallback,
}

/// A run of consecutive messages around a matched message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextWindow {
    pub center_message_id: MessageId,
    /// Chat order, center included
    pub messages: Vec<Message>,
}

impl ContextWindow {
    #[must_use]
    pub fn formatted_text(&self) -> String {
        self.messages
            .iter()
            .map(Message::format_line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A candidate ready to be packed into the budget
#[derive(Debug, Clone, PartialEq)]
pub struct ContextCandidate {
    pub message_id: MessageId,
    /// Similarity of the fragment the candidate originates from
    pub similarity: f32,
    pub source: WindowSource,
    pub text: String,
}

/// Summary of a candidate that made it into the context
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncludedFragment {
    pub message_id: MessageId,
    pub similarity: f32,
    pub source: WindowSource,
    /// Characters charged against the budget, separator included
    pub charged_chars: usize,
}

/// Result of context assembly
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssembledContext {
    pub text: String,
    pub included: Vec<IncludedFragment>,
    pub tracker: ContextTracker,
}

impl AssembledContext {
    /// Context length in characters
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Assembler for budget-bounded chat context
pub struct ContextAssembler {
    store: Arc<dyn MessageStore>,
    budget_chars: usize,
}

impl ContextAssembler {
    #[must_use]
    pub fn new(store: Arc<dyn MessageStore>, budget_chars: usize) -> Self {
        Self {
            store,
            budget_chars,
        }
    }

    #[must_use]
    pub const fn budget_chars(&self) -> usize {
        self.budget_chars
    }

    /// Build the context for merged search results
    ///
    /// # Errors
    /// - Message store failures (a missing message is not a failure)
    pub async fn assemble(&self, chat_id: ChatId, results: &[Fragment]) -> Result<AssembledContext> {
        let mut tracker = ContextTracker::new();

        let mut ranked: Vec<Fragment> = results
            .iter()
            .cloned()
            .map(|mut f| {
                f.similarity = finite_similarity(f.similarity);
                f
            })
            .collect();
        sort_by_similarity(&mut ranked);
        let overflow = ranked.split_off(ranked.len().min(CONTEXT_TOP_K));
        for fragment in &overflow {
            tracker.record(fragment.message_id, InclusionReason::NotInTopK);
        }

        let mut windowed = Vec::new();
        let mut bare = Vec::new();
        for fragment in ranked {
            if !fragment.has_text() {
                tracker.record(fragment.message_id, InclusionReason::EmptyText);
            } else if fragment.is_window_fragment {
                windowed.push(fragment);
            } else {
                bare.push(fragment);
            }
        }

        let mut candidates: Vec<ContextCandidate> = windowed
            .into_iter()
            .map(|f| ContextCandidate {
                message_id: f.message_id,
                similarity: f.similarity,
                source: WindowSource::Indexed,
                text: f.text,
            })
            .collect();
        candidates.extend(self.expand(chat_id, bare).await?);

        // Stable: equal similarities keep window-first order.
        candidates.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));

        let mut assembled = pack_candidates(candidates, self.budget_chars);
        tracker.extend(std::mem::take(&mut assembled.tracker));
        assembled.tracker = tracker;

        debug!(
            "Assembled context: {} fragments, {} chars (budget {})",
            assembled.included.len(),
            assembled.char_len(),
            self.budget_chars
        );
        Ok(assembled)
    }

    /// Expand bare message hits into windows with one batched store call
    async fn expand(&self, chat_id: ChatId, bare: Vec<Fragment>) -> Result<Vec<ContextCandidate>> {
        if bare.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<MessageId> = bare.iter().map(|f| f.message_id).collect();
        let mut neighbors = self
            .store
            .neighbors(chat_id, &ids, CONTEXT_WINDOW_RADIUS)
            .await?;

        Ok(bare
            .into_iter()
            .map(|fragment| match neighbors.remove(&fragment.message_id) {
                Some(messages) if !messages.is_empty() => {
                    let window = ContextWindow {
                        center_message_id: fragment.message_id,
                        messages,
                    };
                    ContextCandidate {
                        message_id: fragment.message_id,
                        similarity: fragment.similarity,
                        source: WindowSource::Expanded,
                        text: window.formatted_text(),
                    }
                }
                _ => {
                    warn!(
                        chat_id,
                        message_id = fragment.message_id,
                        "Indexed message missing from message store, using raw fragment text"
                    );
                    ContextCandidate {
                        message_id: fragment.message_id,
                        similarity: fragment.similarity,
                        source: WindowSource::RawFallback,
                        text: fragment.text,
                    }
                }
            })
            .collect())
    }

    /// Exclude every result without building anything
    #[must_use]
    pub fn exclude_all(results: &[Fragment], reason: InclusionReason) -> AssembledContext {
        let mut tracker = ContextTracker::new();
        for fragment in results {
            tracker.record(fragment.message_id, reason);
        }
        AssembledContext {
            tracker,
            ..AssembledContext::default()
        }
    }
}

fn format_block(position: usize, candidate: &ContextCandidate) -> String {
    format!(
        "[Excerpt {}] similarity {:.0}%\n{}",
        position,
        candidate.similarity * 100.0,
        candidate.text
    )
}

/// Pack candidates (already in priority order) into `budget_chars`
///
/// A candidate that does not fit is skipped, not a stopping point: smaller
/// candidates further down may still fit. Earlier candidates always claim
/// budget first.
#[must_use]
pub fn pack_candidates(candidates: Vec<ContextCandidate>, budget_chars: usize) -> AssembledContext {
    let separator_chars = FRAGMENT_SEPARATOR.chars().count();
    let mut blocks: Vec<String> = Vec::new();
    let mut included = Vec::new();
    let mut tracker = ContextTracker::new();
    let mut used = 0usize;

    for candidate in candidates {
        let block = format_block(blocks.len() + 1, &candidate);
        let cost = block.chars().count() + separator_chars;
        if used + cost > budget_chars {
            debug!(
                "Context budget exceeded by message {} ({} chars, {} remaining)",
                candidate.message_id,
                cost,
                budget_chars - used
            );
            tracker.record(candidate.message_id, InclusionReason::BudgetExceeded);
            continue;
        }
        used += cost;
        tracker.record(candidate.message_id, InclusionReason::Ok);
        included.push(IncludedFragment {
            message_id: candidate.message_id,
            similarity: candidate.similarity,
            source: candidate.source,
            charged_chars: cost,
        });
        blocks.push(block);
    }

    AssembledContext {
        text: blocks.join(FRAGMENT_SEPARATOR),
        included,
        tracker,
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::TimeZone;
    use chrono::Utc;

    use super::*;

    struct FakeStore {
        messages: Vec<Message>,
    }

    impl FakeStore {
        fn with_ids(ids: &[MessageId]) -> Self {
            let messages = ids
                .iter()
                .map(|&id| Message {
                    chat_id: 1,
                    message_id: id,
                    sender: format!("user{id}"),
                    text: format!("text {id}"),
                    sent_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
                        + chrono::Duration::minutes(id),
                })
                .collect();
            Self { messages }
        }
    }

    #[async_trait]
    impl MessageStore for FakeStore {
        async fn neighbors(
            &self,
            _chat_id: ChatId,
            message_ids: &[MessageId],
            radius: usize,
        ) -> Result<HashMap<MessageId, Vec<Message>>> {
            let mut found = HashMap::new();
            for id in message_ids {
                if let Some(pos) = self.messages.iter().position(|m| m.message_id == *id) {
                    let start = pos.saturating_sub(radius);
                    let end = (pos + radius + 1).min(self.messages.len());
                    found.insert(*id, self.messages[start..end].to_vec());
                }
            }
            Ok(found)
        }
    }

    fn candidate(id: MessageId, similarity: f32, len: usize) -> ContextCandidate {
        ContextCandidate {
            message_id: id,
            similarity,
            source: WindowSource::Indexed,
            text: "x".repeat(len),
        }
    }

    #[test]
    fn test_pack_never_exceeds_budget() {
        let candidates = (0..8).map(|i| candidate(i, 0.9 - i as f32 * 0.05, 300)).collect();
        let assembled = pack_candidates(candidates, 1000);
        assert!(assembled.char_len() <= 1000);
        assert!(!assembled.included.is_empty());
        let excluded = assembled.tracker.count(InclusionReason::BudgetExceeded);
        assert_eq!(excluded + assembled.included.len(), 8);
    }

    #[test]
    fn test_pack_continues_past_candidate_that_does_not_fit() {
        let candidates = vec![
            candidate(1, 0.9, 400),
            candidate(2, 0.8, 900),
            candidate(3, 0.7, 200),
            candidate(4, 0.6, 100),
        ];
        let assembled = pack_candidates(candidates, 1000);
        let reason = |id| assembled.tracker.decision_for(id).unwrap().reason;
        assert_eq!(reason(1), InclusionReason::Ok);
        assert_eq!(reason(2), InclusionReason::BudgetExceeded);
        assert_eq!(reason(3), InclusionReason::Ok);
        assert_eq!(reason(4), InclusionReason::Ok);
        assert!(assembled.char_len() <= 1000);
        assert!(assembled.text.starts_with("[Excerpt 1]"));
        assert!(assembled.text.contains("[Excerpt 2]"));
    }

    #[test]
    fn test_earlier_candidate_claims_budget_first() {
        let candidates = vec![candidate(1, 0.9, 600), candidate(2, 0.8, 600)];
        let assembled = pack_candidates(candidates, 1000);
        assert_eq!(assembled.tracker.included_ids(), vec![1]);
    }

    #[tokio::test]
    async fn test_bare_hit_expanded_into_window() {
        let assembler = ContextAssembler::new(Arc::new(FakeStore::with_ids(&[1, 2, 3, 4])), 16_000);
        let results = vec![Fragment::message(1, 3, "text 3", 0.6)];
        let assembled = assembler.assemble(1, &results).await.unwrap();

        assert_eq!(assembled.included.len(), 1);
        assert_eq!(assembled.included[0].source, WindowSource::Expanded);
        assert!(assembled.text.contains("user2: text 2"));
        assert!(assembled.text.contains("user3: text 3"));
        assert!(assembled.text.contains("user4: text 4"));
        assert!(!assembled.text.contains("user1"));
    }

    #[tokio::test]
    async fn test_missing_message_falls_back_to_raw_text() {
        let assembler = ContextAssembler::new(Arc::new(FakeStore::with_ids(&[1])), 16_000);
        let results = vec![Fragment::message(1, 99, "the original fragment text", 0.7)];
        let assembled = assembler.assemble(1, &results).await.unwrap();

        assert_eq!(assembled.included[0].source, WindowSource::RawFallback);
        assert!(assembled.text.ends_with("\nthe original fragment text"));
        assert_eq!(
            assembled.tracker.decision_for(99).unwrap().reason,
            InclusionReason::Ok
        );
    }

    #[tokio::test]
    async fn test_top_k_and_empty_text_tracked() {
        let assembler = ContextAssembler::new(Arc::new(FakeStore::with_ids(&[])), 16_000);
        let mut results: Vec<Fragment> = (0..12)
            .map(|i| Fragment::window(1, i, format!("window {i}"), 0.9 - i as f32 * 0.01))
            .collect();
        results[0].text = "  ".to_string();
        let assembled = assembler.assemble(1, &results).await.unwrap();

        let tracker = &assembled.tracker;
        assert_eq!(tracker.decision_for(0).unwrap().reason, InclusionReason::EmptyText);
        assert_eq!(tracker.decision_for(10).unwrap().reason, InclusionReason::NotInTopK);
        assert_eq!(tracker.decision_for(11).unwrap().reason, InclusionReason::NotInTopK);
        assert_eq!(tracker.count(InclusionReason::Ok), 9);
    }

    #[tokio::test]
    async fn test_windows_and_expansions_interleave_by_similarity() {
        let assembler = ContextAssembler::new(Arc::new(FakeStore::with_ids(&[5])), 16_000);
        let results = vec![
            Fragment::window(1, 20, "indexed window", 0.8),
            Fragment::message(1, 5, "text 5", 0.9),
        ];
        let assembled = assembler.assemble(1, &results).await.unwrap();
        let order: Vec<_> = assembled.included.iter().map(|f| f.message_id).collect();
        assert_eq!(order, vec![5, 20]);
    }

    #[tokio::test]
    async fn test_nan_similarity_does_not_abort_assembly() {
        let ids: Vec<MessageId> = (0..30).collect();
        let assembler = ContextAssembler::new(Arc::new(FakeStore::with_ids(&ids)), 16_000);
        let results: Vec<Fragment> = ids
            .iter()
            .map(|&i| {
                let similarity = if i % 3 == 0 { f32::NAN } else { 0.9 - i as f32 * 0.01 };
                if i % 2 == 0 {
                    Fragment::window(1, i, format!("window {i}"), similarity)
                } else {
                    Fragment::message(1, i, format!("text {i}"), similarity)
                }
            })
            .collect();

        let assembled = assembler.assemble(1, &results).await.unwrap();

        assert_eq!(assembled.included.len(), 10);
        assert!(assembled.included.iter().all(|f| f.similarity.is_finite()));
        assert!(assembled.included.iter().all(|f| f.message_id % 3 != 0));
    }

    #[test]
    fn test_exclude_all_marks_every_result() {
        let results = vec![
            Fragment::message(1, 1, "a", 0.2),
            Fragment::message(1, 2, "b", 0.1),
        ];
        let assembled = ContextAssembler::exclude_all(&results, InclusionReason::SmartNoContext);
        assert!(assembled.is_empty());
        assert_eq!(assembled.tracker.count(InclusionReason::SmartNoContext), 2);
        assert!(assembled.tracker.included_ids().is_empty());
    }

    #[test]
    fn test_tracker_latest_decision_wins() {
        let mut tracker = ContextTracker::new();
        tracker.record(7, InclusionReason::BudgetExceeded);
        tracker.record(7, InclusionReason::Ok);
        assert_eq!(tracker.decisions().len(), 2);
        assert!(tracker.decision_for(7).unwrap().included);
        assert_eq!(tracker.included_ids(), vec![7]);
    }
}

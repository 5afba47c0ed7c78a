//! Search strategies over the message and window indexes
//!
//! Each strategy is a thin orchestration over two concurrent, stateless
//! index lookups. Both must succeed: a failing branch fails the search even
//! if the other branch returned results. Nothing here retries.

use std::sync::Arc;

use tracing::debug;

use super::confidence::ConfidenceAssessment;
use super::constants::GENERAL_MESSAGE_WEIGHT;
use super::constants::GENERAL_WINDOW_WEIGHT;
use super::constants::INFERRED_WINDOW_SIMILARITY;
use super::constants::PERSONAL_WINDOW_EXPANSION;
use super::constants::PERSONAL_WINDOW_WEIGHT;
use super::merge::merge_sources;
use super::merge::sort_by_similarity;
use super::merge::WeightedSource;
use super::merge::Weighting;
use super::SearchResponse;
use crate::config::RetrievalConfig;
use crate::errors::Result;
use crate::models::ChatId;
use crate::models::MessageFilter;
use crate::models::MessageId;
use crate::store::SimilarityIndex;

/// Personal and general retrieval over a [`SimilarityIndex`]
pub struct SearchStrategy {
    index: Arc<dyn SimilarityIndex>,
    message_limit: usize,
    window_limit: usize,
}

impl SearchStrategy {
    pub fn new(index: Arc<dyn SimilarityIndex>, config: &RetrievalConfig) -> Self {
        Self {
            index,
            message_limit: config.message_limit,
            window_limit: config.window_limit,
        }
    }

    /// Dispatch to personal search when a participant is given, general otherwise
    ///
    /// # Errors
    /// Any index failure from either branch.
    pub async fn search(
        &self,
        chat_id: ChatId,
        query: &str,
        participant: Option<&str>,
        lookback_days: u32,
    ) -> Result<SearchResponse> {
        match participant {
            Some(participant) => {
                self.personal_search(chat_id, participant, query, lookback_days)
                    .await
            }
            None => self.general_search(chat_id, query).await,
        }
    }

    /// Search for what a specific participant said about `query`
    ///
    /// The participant's own messages (within the lookback window) are the
    /// primary signal. Dialog windows matching the raw query are added at a
    /// discount because the participant may appear inside a dialog someone
    /// else started, and the windows around the top personal hits are added at
    /// a fixed inferred similarity.
    ///
    /// # Errors
    /// Any index failure, including the window expansion lookup.
    pub async fn personal_search(
        &self,
        chat_id: ChatId,
        participant: &str,
        query: &str,
        lookback_days: u32,
    ) -> Result<SearchResponse> {
        debug!(
            "Personal search in chat {} for {} (lookback {} days): {}",
            chat_id, participant, lookback_days, query
        );
        let filter = MessageFilter::participant(participant, lookback_days);

        let (mut personal, windows) = tokio::try_join!(
            self.index
                .search_messages(chat_id, query, Some(&filter), self.message_limit),
            self.index.search_windows(chat_id, query, self.window_limit),
        )?;
        sort_by_similarity(&mut personal);
        debug!(
            "Personal search: {} participant hits, {} window hits",
            personal.len(),
            windows.len()
        );

        let inferred = if personal.is_empty() {
            Vec::new()
        } else {
            let ids: Vec<MessageId> = personal
                .iter()
                .take(PERSONAL_WINDOW_EXPANSION)
                .map(|f| f.message_id)
                .collect();
            self.index.windows_for_messages(chat_id, &ids).await?
        };

        // Participant-specific signal outranks the merged score when there is one.
        let personal_assessment =
            (!personal.is_empty()).then(|| ConfidenceAssessment::from_best_score(
                personal.first().map(|f| f.similarity),
                "participant message",
            ));

        let merged = merge_sources(vec![
            WeightedSource::new("participant messages", Weighting::Scale(1.0), personal),
            WeightedSource::new(
                "inferred windows",
                Weighting::Fixed(INFERRED_WINDOW_SIMILARITY),
                inferred,
            ),
            WeightedSource::new(
                "query windows",
                Weighting::Scale(PERSONAL_WINDOW_WEIGHT),
                windows,
            ),
        ]);

        let assessment = personal_assessment.unwrap_or_else(|| {
            ConfidenceAssessment::from_best_score(merged.first().map(|f| f.similarity), "window")
        });

        Ok(SearchResponse::new(
            query,
            merged,
            assessment.tier,
            assessment.reason,
        ))
    }

    /// Search the whole conversation for a topic
    ///
    /// Dialog windows carry the conversational context topical questions need,
    /// so they count at full similarity; single messages are discounted.
    ///
    /// # Errors
    /// Any index failure from either branch.
    pub async fn general_search(&self, chat_id: ChatId, query: &str) -> Result<SearchResponse> {
        debug!("General search in chat {}: {}", chat_id, query);

        let (windows, messages) = tokio::try_join!(
            self.index.search_windows(chat_id, query, self.window_limit),
            self.index
                .search_messages(chat_id, query, None, self.message_limit),
        )?;
        debug!(
            "General search: {} window hits, {} message hits",
            windows.len(),
            messages.len()
        );

        let merged = merge_sources(vec![
            WeightedSource::new("windows", Weighting::Scale(GENERAL_WINDOW_WEIGHT), windows),
            WeightedSource::new(
                "messages",
                Weighting::Scale(GENERAL_MESSAGE_WEIGHT),
                messages,
            ),
        ]);

        let assessment =
            ConfidenceAssessment::from_best_score(merged.first().map(|f| f.similarity), "merged");

        Ok(SearchResponse::new(
            query,
            merged,
            assessment.tier,
            assessment.reason,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::errors::ChatRagError;
    use crate::models::Fragment;
    use crate::rag::ConfidenceTier;

    #[derive(Default)]
    struct FakeIndex {
        messages: Vec<Fragment>,
        windows: Vec<Fragment>,
        inferred: Vec<Fragment>,
        fail_windows: bool,
        seen_filter: Mutex<Option<MessageFilter>>,
        expansion_ids: Mutex<Vec<MessageId>>,
    }

    #[async_trait]
    impl SimilarityIndex for FakeIndex {
        async fn search_messages(
            &self,
            _chat_id: ChatId,
            _query: &str,
            filter: Option<&MessageFilter>,
            _limit: usize,
        ) -> Result<Vec<Fragment>> {
            *self.seen_filter.lock().unwrap() = filter.cloned();
            Ok(self.messages.clone())
        }

        async fn search_windows(&self, _chat_id: ChatId, _query: &str, _limit: usize) -> Result<Vec<Fragment>> {
            if self.fail_windows {
                return Err(ChatRagError::Index("window index unavailable".to_string()));
            }
            Ok(self.windows.clone())
        }

        async fn windows_for_messages(&self, _chat_id: ChatId, message_ids: &[MessageId]) -> Result<Vec<Fragment>> {
            *self.expansion_ids.lock().unwrap() = message_ids.to_vec();
            Ok(self.inferred.clone())
        }
    }

    fn strategy(index: FakeIndex) -> (SearchStrategy, Arc<FakeIndex>) {
        let index = Arc::new(index);
        (
            SearchStrategy::new(index.clone(), &RetrievalConfig::default()),
            index,
        )
    }

    #[tokio::test]
    async fn test_general_search_discounts_messages() {
        let (strategy, _) = strategy(FakeIndex {
            messages: vec![Fragment::message(1, 10, "deploy friday", 0.6)],
            ..Default::default()
        });
        let response = strategy.general_search(1, "deploy").await.unwrap();
        assert_eq!(response.results.len(), 1);
        assert!((response.best_score - 0.51).abs() < 1e-6);
        assert_eq!(response.confidence, ConfidenceTier::High);
    }

    #[tokio::test]
    async fn test_general_search_without_hits_is_none() {
        let (strategy, _) = strategy(FakeIndex::default());
        let response = strategy.general_search(1, "anything").await.unwrap();
        assert!(response.is_empty());
        assert_eq!(response.confidence, ConfidenceTier::None);
    }

    #[tokio::test]
    async fn test_failing_branch_propagates() {
        let (strategy, _) = strategy(FakeIndex {
            messages: vec![Fragment::message(1, 10, "deploy friday", 0.9)],
            fail_windows: true,
            ..Default::default()
        });
        let err = strategy.general_search(1, "deploy").await.unwrap_err();
        assert!(matches!(err, ChatRagError::Index(_)));
    }

    #[tokio::test]
    async fn test_personal_search_expands_top_five_and_inherits_confidence() {
        let messages = (0..7)
            .map(|i| Fragment::message(1, i, format!("m{i}"), 0.3 + i as f32 * 0.01))
            .collect();
        let (strategy, index) = strategy(FakeIndex {
            messages,
            windows: vec![Fragment::window(1, 50, "w", 0.9)],
            inferred: vec![Fragment::window(1, 40, "around m6", 0.0)],
            ..Default::default()
        });

        let response = strategy
            .personal_search(1, "alice", "plans", 7)
            .await
            .unwrap();

        assert_eq!(*index.expansion_ids.lock().unwrap(), vec![6, 5, 4, 3, 2]);
        let filter = index.seen_filter.lock().unwrap().clone().unwrap();
        assert_eq!(filter.sender.as_deref(), Some("alice"));
        assert!(filter.since.is_some());

        // Best participant hit is 0.36 => Medium, even though the merged best is 0.81.
        assert_eq!(response.confidence, ConfidenceTier::Medium);
        assert!((response.best_score - 0.81).abs() < 1e-6);
        let inferred = response.results.iter().find(|f| f.message_id == 40).unwrap();
        assert!((inferred.similarity - 0.75).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_personal_search_without_participant_hits_uses_merged_score() {
        let (strategy, index) = strategy(FakeIndex {
            windows: vec![Fragment::window(1, 50, "w", 0.5)],
            ..Default::default()
        });
        let response = strategy
            .personal_search(1, "bob", "plans", 30)
            .await
            .unwrap();
        assert!(index.expansion_ids.lock().unwrap().is_empty());
        // 0.5 × 0.9 = 0.45
        assert_eq!(response.confidence, ConfidenceTier::Medium);
    }
}

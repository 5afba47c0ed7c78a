//! RAG (Retrieval-Augmented Generation) module
//!
//! This module answers questions about a chat's history:
//! - Hybrid retrieval over the message and dialog-window indexes
//! - Merge, dedup and confidence scoring of the combined results
//! - A confidence gate deciding whether local context is used at all
//! - Budget-bounded context assembly with a per-fragment audit trail
//! - Single-call or grounded two-stage answer generation
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use chatrag::config::AppConfig;
//! use chatrag::llm::LlmClient;
//! use chatrag::rag::AskRequest;
//! use chatrag::rag::RagService;
//! use chatrag::store::TranscriptStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let transcript = Arc::new(TranscriptStore::from_file("chat.json")?);
//!     let llm = Arc::new(LlmClient::new(&config)?);
//!     let service = RagService::new(&config, transcript.clone(), transcript.clone(), llm);
//!
//!     let response = service
//!         .ask(AskRequest::new(transcript.chat_id(), "When is the release?"))
//!         .await?;
//!     println!("Answer ({}): {}", response.confidence, response.answer_text);
//!
//!     Ok(())
//! }
//! ```

pub mod confidence;
pub mod constants;
pub mod context;
pub mod gate;
pub mod merge;
pub mod pipeline;
pub mod prompts;
pub mod retriever;
pub mod synthesis;

pub use confidence::classify_confidence;
pub use confidence::ConfidenceTier;
pub use context::AssembledContext;
pub use context::ContextAssembler;
pub use context::ContextTracker;
pub use context::ContextWindow;
pub use context::IncludedFragment;
pub use context::InclusionReason;
pub use context::WindowSource;
pub use gate::CommandType;
pub use gate::ConfidenceGate;
pub use gate::GateDecision;
pub use pipeline::AskRequest;
pub use pipeline::AskResponse;
pub use pipeline::ContextMode;
pub use pipeline::KnowledgeFallback;
pub use pipeline::RagService;
pub use retriever::SearchStrategy;
pub use synthesis::can_use_fast_path;
pub use synthesis::AnswerSynthesizer;
pub use synthesis::SynthesisStrategy;

use serde::Serialize;

use crate::models::Fragment;

/// Ranked, deduplicated retrieval output with its confidence
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    /// Descending similarity, one fragment per message id
    pub results: Vec<Fragment>,
    /// `None` means the results must not be trusted even if present
    pub confidence: ConfidenceTier,
    pub confidence_reason: String,
    pub best_score: f32,
    /// Best minus second-best similarity
    pub score_gap: Option<f32>,
    /// Some result contains the query text verbatim
    pub has_full_text_match: Option<bool>,
}

/// Queries shorter than this are not checked for verbatim matches
const MIN_FULL_TEXT_QUERY_CHARS: usize = 3;

impl SearchResponse {
    /// Build a response from merged results and an already-decided confidence
    ///
    /// Empty results force `None` whatever confidence was passed in.
    #[must_use]
    pub fn new(query: &str, results: Vec<Fragment>, confidence: ConfidenceTier, confidence_reason: String) -> Self {
        let best_score = results.first().map_or(0.0, |f| f.similarity);
        let score_gap = match results.as_slice() {
            [first, second, ..] => Some(first.similarity - second.similarity),
            _ => None,
        };
        let has_full_text_match = full_text_match(query, &results);

        let (confidence, confidence_reason) = if results.is_empty() {
            (ConfidenceTier::None, "no results".to_string())
        } else {
            (confidence, confidence_reason)
        };

        Self {
            results,
            confidence,
            confidence_reason,
            best_score,
            score_gap,
            has_full_text_match,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

fn full_text_match(query: &str, results: &[Fragment]) -> Option<bool> {
    let needle = query.trim().to_lowercase();
    if needle.chars().count() < MIN_FULL_TEXT_QUERY_CHARS || results.is_empty() {
        return None;
    }
    Some(results.iter().any(|f| f.text.to_lowercase().contains(&needle)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_results_force_none() {
        let response = SearchResponse::new("q", Vec::new(), ConfidenceTier::High, "inherited".to_string());
        assert_eq!(response.confidence, ConfidenceTier::None);
        assert_eq!(response.best_score, 0.0);
        assert!(response.score_gap.is_none());
    }

    #[test]
    fn test_score_gap_and_full_text_match() {
        let results = vec![
            Fragment::message(1, 1, "The Release is on Friday", 0.8),
            Fragment::message(1, 2, "maybe", 0.5),
        ];
        let response = SearchResponse::new("release", results, ConfidenceTier::High, "r".to_string());
        assert!((response.score_gap.unwrap() - 0.3).abs() < 1e-6);
        assert_eq!(response.has_full_text_match, Some(true));
        assert_eq!(response.best_score, 0.8);
    }

    #[test]
    fn test_short_query_skips_full_text_check() {
        let results = vec![Fragment::message(1, 1, "ok", 0.8)];
        let response = SearchResponse::new("ok", results, ConfidenceTier::High, "r".to_string());
        assert!(response.has_full_text_match.is_none());
    }
}

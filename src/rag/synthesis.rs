//! Answer synthesis: one cheap call when retrieval is strong, otherwise a
//! grounded two-stage generation that first extracts facts and then answers
//! only from them.

use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::confidence::ConfidenceTier;
use super::constants::EXTRACTION_TEMPERATURE;
use super::constants::FAST_PATH_MAX_CONTEXT_CHARS;
use super::constants::GROUNDED_TEMPERATURE;
use super::constants::MAX_EXTRACTED_FACTS;
use super::constants::SIMPLE_TEMPERATURE;
use super::prompts;
use crate::errors::Result;
use crate::llm::Completion;
use crate::llm::CompletionRequest;
use crate::llm::LanguageModel;
use crate::llm::TokenUsage;

/// Whether the single-call path may be used
#[must_use]
pub fn can_use_fast_path(context_chars: usize, tier: ConfidenceTier) -> bool {
    tier == ConfidenceTier::High && context_chars <= FAST_PATH_MAX_CONTEXT_CHARS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisStrategy {
    /// One call over the raw context
    Simple,
    /// Fact extraction, then generation from the extracted facts only
    Grounded,
    /// No model call; the caller shows a notice instead
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactConfidence {
    High,
    Medium,
    #[default]
    Low,
}

impl FactConfidence {
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("high") => Self::High,
            Some("medium") => Self::Medium,
            _ => Self::Low,
        }
    }
}

/// One claim found in the context
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedFact {
    pub claim: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub confidence: FactConfidence,
}

/// Stage-1 output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractedFacts {
    pub facts: Vec<ExtractedFact>,
    /// Aspects of the question the context does not support
    pub not_found: Vec<String>,
}

impl ExtractedFacts {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty() && self.not_found.is_empty()
    }
}

#[derive(Deserialize)]
struct RawExtraction {
    #[serde(default)]
    facts: Vec<RawFact>,
    #[serde(default)]
    not_found: Vec<String>,
}

#[derive(Deserialize)]
struct RawFact {
    #[serde(default)]
    claim: String,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    confidence: Option<String>,
}

/// Parse stage-1 output, tolerating code fences and surrounding prose
///
/// Anything that cannot be read as the expected object yields an empty
/// result rather than an error, so stage 2 still runs.
#[must_use]
pub fn parse_extracted_facts(content: &str) -> ExtractedFacts {
    let Some(json) = extract_json_object(content) else {
        warn!("Fact extraction returned no JSON object, continuing with no facts");
        return ExtractedFacts::default();
    };

    match serde_json::from_str::<RawExtraction>(json) {
        Ok(raw) => ExtractedFacts {
            facts: raw
                .facts
                .into_iter()
                .filter(|f| !f.claim.trim().is_empty())
                .take(MAX_EXTRACTED_FACTS)
                .map(|f| ExtractedFact {
                    claim: f.claim.trim().to_string(),
                    source: f.source.filter(|s| !s.trim().is_empty()),
                    confidence: FactConfidence::parse(f.confidence.as_deref()),
                })
                .collect(),
            not_found: raw
                .not_found
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        },
        Err(e) => {
            warn!("Fact extraction JSON did not parse ({e}), continuing with no facts");
            ExtractedFacts::default()
        }
    }
}

fn extract_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisStage {
    Simple,
    Extraction,
    Generation,
}

/// Observability data for one model call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageMetrics {
    pub stage: SynthesisStage,
    pub usage: TokenUsage,
    pub latency_ms: u64,
    pub provider_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SynthesisMetrics {
    pub strategy: SynthesisStrategy,
    pub stages: Vec<StageMetrics>,
}

impl SynthesisMetrics {
    #[must_use]
    pub const fn skipped() -> Self {
        Self {
            strategy: SynthesisStrategy::Skipped,
            stages: Vec::new(),
        }
    }

    #[must_use]
    pub fn total_tokens(&self) -> u32 {
        self.stages.iter().map(|s| s.usage.total()).sum()
    }
}

/// Generated answer plus what went into it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAnswer {
    pub answer: String,
    /// Stage-1 output; `None` on the simple path
    pub facts: Option<ExtractedFacts>,
    pub metrics: SynthesisMetrics,
}

/// Inputs to one synthesis
#[derive(Debug, Clone, Copy)]
pub struct SynthesisInput<'a> {
    pub question: &'a str,
    pub context: &'a str,
    pub memory_context: Option<&'a str>,
    pub confidence: ConfidenceTier,
}

pub struct AnswerSynthesizer {
    llm: Arc<dyn LanguageModel>,
}

impl AnswerSynthesizer {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Pick the strategy for an input
    #[must_use]
    pub fn choose_strategy(input: &SynthesisInput<'_>) -> SynthesisStrategy {
        if can_use_fast_path(input.context.chars().count(), input.confidence) {
            SynthesisStrategy::Simple
        } else {
            SynthesisStrategy::Grounded
        }
    }

    /// Generate an answer
    ///
    /// # Errors
    /// Any language-model failure. A malformed extraction is not an error.
    pub async fn synthesize(&self, input: SynthesisInput<'_>) -> Result<SynthesizedAnswer> {
        let strategy = Self::choose_strategy(&input);
        info!(
            "Synthesizing answer via {:?} path (confidence: {}, context: {} chars)",
            strategy,
            input.confidence,
            input.context.chars().count()
        );

        match strategy {
            SynthesisStrategy::Simple => self.simple(input).await,
            _ => self.grounded(input).await,
        }
    }

    async fn simple(&self, input: SynthesisInput<'_>) -> Result<SynthesizedAnswer> {
        let request = CompletionRequest::new(
            prompts::build_simple_system_prompt(),
            prompts::build_simple_user_prompt(input.question, input.context, input.memory_context),
            SIMPLE_TEMPERATURE,
        );
        let (completion, metrics) = self.timed(SynthesisStage::Simple, request).await?;

        Ok(SynthesizedAnswer {
            answer: completion.content.trim().to_string(),
            facts: None,
            metrics: SynthesisMetrics {
                strategy: SynthesisStrategy::Simple,
                stages: vec![metrics],
            },
        })
    }

    async fn grounded(&self, input: SynthesisInput<'_>) -> Result<SynthesizedAnswer> {
        let extraction = CompletionRequest::new(
            prompts::build_extraction_system_prompt(MAX_EXTRACTED_FACTS),
            prompts::build_extraction_user_prompt(input.question, input.context, input.memory_context),
            EXTRACTION_TEMPERATURE,
        );
        let (extracted, extraction_metrics) = self.timed(SynthesisStage::Extraction, extraction).await?;
        let facts = parse_extracted_facts(&extracted.content);
        debug!(
            "Extracted {} facts, {} not found",
            facts.facts.len(),
            facts.not_found.len()
        );

        let generation = CompletionRequest::new(
            prompts::build_grounded_system_prompt(),
            prompts::build_grounded_user_prompt(input.question, &facts),
            GROUNDED_TEMPERATURE,
        );
        let (answer, generation_metrics) = self.timed(SynthesisStage::Generation, generation).await?;

        Ok(SynthesizedAnswer {
            answer: answer.content.trim().to_string(),
            facts: Some(facts),
            metrics: SynthesisMetrics {
                strategy: SynthesisStrategy::Grounded,
                stages: vec![extraction_metrics, generation_metrics],
            },
        })
    }

    async fn timed(&self, stage: SynthesisStage, request: CompletionRequest) -> Result<(Completion, StageMetrics)> {
        let started = Instant::now();
        let completion = self.llm.complete(request).await?;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        debug!(
            "{:?} stage: {} tokens in {} ms via {}",
            stage,
            completion.usage.total(),
            latency_ms,
            completion.provider_id
        );
        let metrics = StageMetrics {
            stage,
            usage: completion.usage,
            latency_ms,
            provider_id: completion.provider_id.clone(),
        };
        Ok((completion, metrics))
    }
}

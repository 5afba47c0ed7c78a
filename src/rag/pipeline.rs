//! Complete RAG pipeline: Search -> Gate -> Assemble -> Synthesize

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::Instrument;
use uuid::Uuid;

use super::context::AssembledContext;
use super::context::ContextAssembler;
use super::context::ContextTracker;
use super::context::IncludedFragment;
use super::context::InclusionReason;
use super::gate::CommandType;
use super::gate::ConfidenceGate;
use super::gate::GateDecision;
use super::prompts::label_external_context;
use super::retriever::SearchStrategy;
use super::synthesis::AnswerSynthesizer;
use super::synthesis::ExtractedFacts;
use super::synthesis::SynthesisInput;
use super::synthesis::SynthesisMetrics;
use super::synthesis::SynthesisStrategy;
use super::ConfidenceTier;
use super::SearchResponse;
use crate::config::AppConfig;
use crate::errors::ChatRagError;
use crate::errors::Result;
use crate::llm::LanguageModel;
use crate::models::ChatId;
use crate::store::MessageStore;
use crate::store::SimilarityIndex;

/// External-knowledge source used when the chat history has nothing relevant
#[async_trait]
pub trait KnowledgeFallback: Send + Sync {
    /// Text relevant to the question, or `None` when the source has nothing
    async fn lookup(&self, question: &str) -> Result<Option<String>>;
}

/// Whether local context should be built for this request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextMode {
    #[default]
    Retrieve,
    /// The caller decided the question needs no chat context
    NoContext,
}

/// A question about a chat
#[derive(Debug, Clone)]
pub struct AskRequest {
    pub chat_id: ChatId,
    pub question: String,
    /// Ask about what this participant said
    pub participant: Option<String>,
    /// Long-term memory about the chat, passed through to the prompts
    pub memory_context: Option<String>,
    /// Lookback for personal search; the configured default when unset
    pub lookback_days: Option<u32>,
    pub command: CommandType,
    pub context_mode: ContextMode,
}

impl AskRequest {
    pub fn new(chat_id: ChatId, question: impl Into<String>) -> Self {
        Self {
            chat_id,
            question: question.into(),
            participant: None,
            memory_context: None,
            lookback_days: None,
            command: CommandType::GeneralQuestion,
            context_mode: ContextMode::Retrieve,
        }
    }

    #[must_use]
    pub fn with_participant(mut self, participant: impl Into<String>) -> Self {
        self.participant = Some(participant.into());
        self
    }

    #[must_use]
    pub fn with_memory_context(mut self, memory_context: impl Into<String>) -> Self {
        self.memory_context = Some(memory_context.into());
        self
    }

    #[must_use]
    pub const fn with_lookback_days(mut self, days: u32) -> Self {
        self.lookback_days = Some(days);
        self
    }

    #[must_use]
    pub const fn with_command(mut self, command: CommandType) -> Self {
        self.command = command;
        self
    }

    #[must_use]
    pub const fn with_context_mode(mut self, mode: ContextMode) -> Self {
        self.context_mode = mode;
        self
    }
}

/// Answer plus the audit trail of how it was produced
#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub request_id: Uuid,
    pub answer_text: String,
    pub confidence: ConfidenceTier,
    pub confidence_reason: String,
    /// Short user-facing remark from the gate (weak match, external search)
    pub notice: Option<String>,
    pub decision: GateDecision,
    pub strategy: SynthesisStrategy,
    /// Whether the answer was built from external knowledge instead of chat history
    pub used_external_knowledge: bool,
    pub tracker: ContextTracker,
    /// Fragments placed in the context and where their text came from
    pub included: Vec<IncludedFragment>,
    #[serde(skip)]
    pub facts: Option<ExtractedFacts>,
    pub metrics: SynthesisMetrics,
}

/// Complete RAG service
pub struct RagService {
    strategy: SearchStrategy,
    context_assembler: ContextAssembler,
    synthesizer: AnswerSynthesizer,
    fallback: Option<Arc<dyn KnowledgeFallback>>,
    default_lookback_days: u32,
}

impl RagService {
    /// Create a service from its capabilities
    pub fn new(
        config: &AppConfig,
        index: Arc<dyn SimilarityIndex>,
        store: Arc<dyn MessageStore>,
        llm: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            strategy: SearchStrategy::new(index, &config.retrieval),
            context_assembler: ContextAssembler::new(store, config.context_budget_chars()),
            synthesizer: AnswerSynthesizer::new(llm),
            fallback: None,
            default_lookback_days: config.default_lookback_days(),
        }
    }

    /// Attach an external-knowledge fallback for questions the chat can't answer
    #[must_use]
    pub fn with_fallback(mut self, fallback: Arc<dyn KnowledgeFallback>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Run retrieval only
    ///
    /// # Errors
    /// Index failures from either search branch.
    pub async fn search(&self, request: &AskRequest) -> Result<SearchResponse> {
        let lookback = request.lookback_days.unwrap_or(self.default_lookback_days);
        self.strategy
            .search(
                request.chat_id,
                &request.question,
                request.participant.as_deref(),
                lookback,
            )
            .await
    }

    /// Answer a question about a chat
    ///
    /// # Errors
    /// - Index or message store failures
    /// - Language model failures
    /// - External fallback failures
    ///
    /// No relevant history is not an error; it is reported through
    /// [`AskResponse::confidence`] and [`AskResponse::decision`].
    pub async fn ask(&self, request: AskRequest) -> Result<AskResponse> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("ask", %request_id, chat_id = request.chat_id);
        self.run(request_id, request).instrument(span).await
    }

    /// [`RagService::ask`], abandoned as soon as `cancel` fires
    ///
    /// Cancellation drops the in-flight pipeline at whatever await point it
    /// reached. The core holds no state, so nothing is left half-written.
    ///
    /// # Errors
    /// [`ChatRagError::Cancelled`] when cancelled, otherwise as [`RagService::ask`].
    pub async fn ask_with_cancellation(
        &self,
        request: AskRequest,
        cancel: &CancellationToken,
    ) -> Result<AskResponse> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!("Ask request cancelled by caller");
                Err(ChatRagError::Cancelled)
            }
            result = self.ask(request) => result,
        }
    }

    async fn run(&self, request_id: Uuid, request: AskRequest) -> Result<AskResponse> {
        info!("Processing question: {}", request.question);

        // Step 1: Retrieve
        debug!("Step 1: Searching");
        let search = self.search(&request).await?;
        debug!(
            "Retrieved {} results, confidence {} ({})",
            search.results.len(),
            search.confidence,
            search.confidence_reason
        );

        // Step 2: Gate
        let decision = ConfidenceGate::decide(search.confidence, request.command);
        debug!("Step 2: Gate decision {:?}", decision);

        // Step 3: Context
        let mut used_external_knowledge = false;
        let (assembled, context_text) = if !decision.uses_local_context() {
            let assembled =
                ContextAssembler::exclude_all(&search.results, InclusionReason::ConfidenceNone);
            let external = self.external_context(&request, &decision).await?;
            used_external_knowledge = external.is_some();
            (assembled, external)
        } else if request.context_mode == ContextMode::NoContext {
            let assembled =
                ContextAssembler::exclude_all(&search.results, InclusionReason::SmartNoContext);
            (assembled, Some(String::new()))
        } else {
            debug!("Step 3: Assembling context");
            let assembled = self
                .context_assembler
                .assemble(request.chat_id, &search.results)
                .await?;
            let text = assembled.text.clone();
            (assembled, Some(text))
        };

        // Step 4: Synthesize
        let Some(context_text) = context_text else {
            info!("No local or external context, returning notice");
            return Ok(Self::notice_only(request_id, search, decision, assembled));
        };

        debug!("Step 4: Generating answer");
        let synthesized = self
            .synthesizer
            .synthesize(SynthesisInput {
                question: &request.question,
                context: &context_text,
                memory_context: request.memory_context.as_deref(),
                confidence: search.confidence,
            })
            .await?;

        info!(
            "Question answered via {:?} path ({} tokens)",
            synthesized.metrics.strategy,
            synthesized.metrics.total_tokens()
        );

        Ok(AskResponse {
            request_id,
            answer_text: synthesized.answer,
            confidence: search.confidence,
            confidence_reason: search.confidence_reason,
            notice: decision.notice().map(str::to_string),
            strategy: synthesized.metrics.strategy,
            decision,
            used_external_knowledge,
            tracker: assembled.tracker,
            included: assembled.included,
            facts: synthesized.facts,
            metrics: synthesized.metrics,
        })
    }

    async fn external_context(
        &self,
        request: &AskRequest,
        decision: &GateDecision,
    ) -> Result<Option<String>> {
        let (GateDecision::SearchExternally { .. }, Some(fallback)) = (decision, &self.fallback)
        else {
            return Ok(None);
        };
        debug!("Step 3: Looking up external knowledge");
        let found = fallback.lookup(&request.question).await?;
        Ok(found
            .filter(|text| !text.trim().is_empty())
            .map(|text| label_external_context(&text)))
    }

    fn notice_only(
        request_id: Uuid,
        search: SearchResponse,
        decision: GateDecision,
        assembled: AssembledContext,
    ) -> AskResponse {
        let notice = decision.notice().map(str::to_string);
        AskResponse {
            request_id,
            answer_text: notice.clone().unwrap_or_default(),
            confidence: search.confidence,
            confidence_reason: search.confidence_reason,
            notice,
            decision,
            strategy: SynthesisStrategy::Skipped,
            used_external_knowledge: false,
            tracker: assembled.tracker,
            included: assembled.included,
            facts: None,
            metrics: SynthesisMetrics::skipped(),
        }
    }
}

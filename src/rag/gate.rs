//! Confidence gate: decide what to do with a search result before building context

use serde::Serialize;

use super::confidence::ConfidenceTier;

pub const SEARCHING_EXTERNALLY_NOTICE: &str =
    "🔎 Nothing in the chat history matches this question, searching external sources instead.";
pub const WEAK_MATCH_NOTICE: &str =
    "⚠️ Only weak matches were found in the chat history, so this answer may be incomplete.";
pub const NOTHING_FOUND_NOTICE: &str = "🤷 Nothing in the chat history matches this search.";

/// What kind of command produced the question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandType {
    /// Free-form question answered from chat history
    #[default]
    GeneralQuestion,
    /// Literal search whose results are shown as-is by the caller
    DirectSearch,
}

/// Outcome of the gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum GateDecision {
    /// Build local context and answer without comment
    Proceed,
    /// Build local context but warn the user the match is weak
    ProceedWithWarning { notice: String },
    /// No usable local context; answer from external knowledge instead
    SearchExternally { notice: String },
    /// No usable local context and no fallback for this command
    NothingFound { notice: String },
}

impl GateDecision {
    /// Whether local chat context should be assembled
    #[must_use]
    pub const fn uses_local_context(&self) -> bool {
        matches!(self, Self::Proceed | Self::ProceedWithWarning { .. })
    }

    #[must_use]
    pub fn notice(&self) -> Option<&str> {
        match self {
            Self::Proceed => None,
            Self::ProceedWithWarning { notice }
            | Self::SearchExternally { notice }
            | Self::NothingFound { notice } => Some(notice),
        }
    }
}

/// Pure decision over `(confidence, command)`
pub struct ConfidenceGate;

impl ConfidenceGate {
    #[must_use]
    pub fn decide(confidence: ConfidenceTier, command: CommandType) -> GateDecision {
        match (confidence, command) {
            (ConfidenceTier::None, CommandType::GeneralQuestion) => GateDecision::SearchExternally {
                notice: SEARCHING_EXTERNALLY_NOTICE.to_string(),
            },
            (ConfidenceTier::None, CommandType::DirectSearch) => GateDecision::NothingFound {
                notice: NOTHING_FOUND_NOTICE.to_string(),
            },
            (ConfidenceTier::Low, _) => GateDecision::ProceedWithWarning {
                notice: WEAK_MATCH_NOTICE.to_string(),
            },
            (ConfidenceTier::Medium | ConfidenceTier::High, _) => GateDecision::Proceed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_defers_to_external_search() {
        let decision = ConfidenceGate::decide(ConfidenceTier::None, CommandType::GeneralQuestion);
        assert!(matches!(decision, GateDecision::SearchExternally { .. }));
        assert!(!decision.uses_local_context());
        assert_eq!(decision.notice(), Some(SEARCHING_EXTERNALLY_NOTICE));
    }

    #[test]
    fn test_none_on_direct_search_reports_nothing_found() {
        let decision = ConfidenceGate::decide(ConfidenceTier::None, CommandType::DirectSearch);
        assert!(matches!(decision, GateDecision::NothingFound { .. }));
        assert!(!decision.uses_local_context());
    }

    #[test]
    fn test_low_warns_but_proceeds() {
        let decision = ConfidenceGate::decide(ConfidenceTier::Low, CommandType::GeneralQuestion);
        assert!(decision.uses_local_context());
        assert_eq!(decision.notice(), Some(WEAK_MATCH_NOTICE));
    }

    #[test]
    fn test_medium_and_high_are_silent() {
        for tier in [ConfidenceTier::Medium, ConfidenceTier::High] {
            let decision = ConfidenceGate::decide(tier, CommandType::GeneralQuestion);
            assert_eq!(decision, GateDecision::Proceed);
            assert!(decision.notice().is_none());
        }
    }
}

//! Confidence tiers derived from retrieval similarity

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use super::constants::HIGH_CONFIDENCE_THRESHOLD;
use super::constants::LOW_CONFIDENCE_THRESHOLD;
use super::constants::MEDIUM_CONFIDENCE_THRESHOLD;

/// Four-level bucketing of retrieval quality, ordered `None < Low < Medium < High`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    None,
    Low,
    Medium,
    High,
}

impl ConfidenceTier {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map the best similarity of a result set to a tier
#[must_use]
pub fn classify_confidence(best_score: f32) -> ConfidenceTier {
    if best_score > HIGH_CONFIDENCE_THRESHOLD {
        ConfidenceTier::High
    } else if best_score > MEDIUM_CONFIDENCE_THRESHOLD {
        ConfidenceTier::Medium
    } else if best_score > LOW_CONFIDENCE_THRESHOLD {
        ConfidenceTier::Low
    } else {
        // NaN lands here too
        ConfidenceTier::None
    }
}

/// A tier together with the reason it was chosen
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceAssessment {
    pub tier: ConfidenceTier,
    pub reason: String,
}

impl ConfidenceAssessment {
    /// Assess an optional best score; `None` means there were no results
    #[must_use]
    pub fn from_best_score(best_score: Option<f32>, source: &str) -> Self {
        match best_score {
            None => Self {
                tier: ConfidenceTier::None,
                reason: format!("no {source} results"),
            },
            Some(score) => {
                let tier = classify_confidence(score);
                Self {
                    tier,
                    reason: format!("best {source} similarity {score:.3} ({tier})"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_tiers() {
        assert_eq!(classify_confidence(0.9), ConfidenceTier::High);
        assert_eq!(classify_confidence(0.4), ConfidenceTier::Medium);
        assert_eq!(classify_confidence(0.3), ConfidenceTier::Low);
        assert_eq!(classify_confidence(0.1), ConfidenceTier::None);
    }

    #[test]
    fn test_boundaries_are_exclusive_below() {
        assert_eq!(classify_confidence(0.5), ConfidenceTier::Medium);
        assert_eq!(classify_confidence(0.35), ConfidenceTier::Low);
        assert_eq!(classify_confidence(0.25), ConfidenceTier::None);
        assert_eq!(classify_confidence(0.500_01), ConfidenceTier::High);
    }

    #[test]
    fn test_nan_is_none() {
        assert_eq!(classify_confidence(f32::NAN), ConfidenceTier::None);
    }

    #[test]
    fn test_assessment_without_results() {
        let assessment = ConfidenceAssessment::from_best_score(None, "merged");
        assert_eq!(assessment.tier, ConfidenceTier::None);
        assert_eq!(assessment.reason, "no merged results");
    }

    #[test]
    fn test_tier_ordering() {
        assert!(ConfidenceTier::High > ConfidenceTier::Medium);
        assert!(ConfidenceTier::Low > ConfidenceTier::None);
    }
}

//! Fixed retrieval and synthesis constants shared across the pipeline

/// Best similarity strictly above this is `High`
pub const HIGH_CONFIDENCE_THRESHOLD: f32 = 0.5;
/// Best similarity strictly above this is `Medium`
pub const MEDIUM_CONFIDENCE_THRESHOLD: f32 = 0.35;
/// Best similarity strictly above this is `Low`; at or below it is `None`
pub const LOW_CONFIDENCE_THRESHOLD: f32 = 0.25;

/// Window-index hits in general search are the primary topical signal
pub const GENERAL_WINDOW_WEIGHT: f32 = 1.0;
/// Message-index hits in general search lack dialog context
pub const GENERAL_MESSAGE_WEIGHT: f32 = 0.85;
/// Raw-query window hits in personal search rank behind the participant's own messages
pub const PERSONAL_WINDOW_WEIGHT: f32 = 0.9;
/// Windows looked up around personal hits are inferred, not direct matches
pub const INFERRED_WINDOW_SIMILARITY: f32 = 0.75;
/// How many personal hits get their surrounding window looked up
pub const PERSONAL_WINDOW_EXPANSION: usize = 5;
/// Extra discount for long pasted external content
pub const BULK_CONTENT_WEIGHT: f32 = 0.8;

/// Only the best results are considered for context
pub const CONTEXT_TOP_K: usize = 10;
/// Neighbours on each side of an expanded message
pub const CONTEXT_WINDOW_RADIUS: usize = 1;
/// ~4,000 tokens at 4 chars/token
pub const DEFAULT_CONTEXT_BUDGET_CHARS: usize = 16_000;
/// Placed between fragments in the assembled context; charged per fragment
pub const FRAGMENT_SEPARATOR: &str = "\n\n---\n\n";

/// Largest context the single-call path will accept
pub const FAST_PATH_MAX_CONTEXT_CHARS: usize = 2_000;
pub const SIMPLE_TEMPERATURE: f32 = 0.5;
pub const EXTRACTION_TEMPERATURE: f32 = 0.1;
pub const GROUNDED_TEMPERATURE: f32 = 0.5;
pub const MAX_EXTRACTED_FACTS: usize = 5;

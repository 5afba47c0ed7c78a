//! Weighted multi-source merge with per-message dedup
//!
//! Every search mode is a set of sources (index lookups) with a weighting
//! each. Fragments are re-scored by their source's weighting, grouped by
//! message id and collapsed to one representative per message:
//!
//! 1. an original-text fragment beats any question-variant fragment, whatever
//!    the scores;
//! 2. otherwise the higher similarity wins;
//! 3. the winner keeps its own similarity, never a sibling's.

use std::cmp::Ordering;
use std::collections::HashMap;

use super::constants::BULK_CONTENT_WEIGHT;
use crate::models::Fragment;
use crate::models::MessageId;

/// How a source's raw similarities are turned into merged similarities
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Weighting {
    /// `raw × factor`
    Scale(f32),
    /// Replace the raw score; used for inferred hits that have none of their own
    Fixed(f32),
}

/// One index lookup's results with its weighting
#[derive(Debug, Clone)]
pub struct WeightedSource {
    pub label: &'static str,
    pub weighting: Weighting,
    pub fragments: Vec<Fragment>,
}

impl WeightedSource {
    pub fn new(label: &'static str, weighting: Weighting, fragments: Vec<Fragment>) -> Self {
        Self {
            label,
            weighting,
            fragments,
        }
    }
}

/// Similarity usable for ranking; NaN and infinities from an index count as no match
#[must_use]
pub fn finite_similarity(similarity: f32) -> f32 {
    if similarity.is_finite() {
        similarity
    } else {
        0.0
    }
}

/// Apply a weighting (and the bulk-content discount) to one fragment
#[must_use]
pub fn apply_weighting(mut fragment: Fragment, weighting: Weighting) -> Fragment {
    let base = match weighting {
        Weighting::Scale(factor) => finite_similarity(fragment.similarity) * factor,
        Weighting::Fixed(value) => value,
    };
    let weighted = if fragment.is_bulk_content {
        base * BULK_CONTENT_WEIGHT
    } else {
        base
    };
    fragment.similarity = finite_similarity(weighted);
    fragment
}

/// Preference between two fragments for the same message; `Greater` means `a` wins
fn preference(a: &Fragment, b: &Fragment) -> Ordering {
    // Original wording first, regardless of how well a paraphrase scored.
    match (a.is_question_variant, b.is_question_variant) {
        (false, true) => Ordering::Greater,
        (true, false) => Ordering::Less,
        _ => a.similarity.total_cmp(&b.similarity),
    }
}

/// Pick the representative of a group of fragments sharing a message id
///
/// On a full tie the earliest fragment is kept, so callers control
/// tie-breaking through source order.
#[must_use]
pub fn select_preferred(group: Vec<Fragment>) -> Option<Fragment> {
    group.into_iter().reduce(|best, candidate| {
        if preference(&candidate, &best) == Ordering::Greater {
            candidate
        } else {
            best
        }
    })
}

/// Sort by similarity descending, then by message id for a stable order
pub fn sort_by_similarity(fragments: &mut [Fragment]) {
    fragments.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then(a.message_id.cmp(&b.message_id))
    });
}

/// Weight every source, dedup by message id and sort the winners
#[must_use]
pub fn merge_sources(sources: Vec<WeightedSource>) -> Vec<Fragment> {
    let mut order: Vec<MessageId> = Vec::new();
    let mut groups: HashMap<MessageId, Vec<Fragment>> = HashMap::new();

    for source in sources {
        tracing::trace!(
            "Merging {} fragments from {} ({:?})",
            source.fragments.len(),
            source.label,
            source.weighting
        );
        for fragment in source.fragments {
            let weighted = apply_weighting(fragment, source.weighting);
            let group = groups.entry(weighted.message_id).or_insert_with(|| {
                order.push(weighted.message_id);
                Vec::new()
            });
            group.push(weighted);
        }
    }

    let mut merged: Vec<Fragment> = order
        .into_iter()
        .filter_map(|id| groups.remove(&id).and_then(select_preferred))
        .collect();
    sort_by_similarity(&mut merged);
    merged
}

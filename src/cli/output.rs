//! CLI output formatting utilities
//!
//! This module provides consistent output formatting for the `chatrag` CLI

use crate::rag::AskResponse;
use crate::rag::GateDecision;
use crate::rag::InclusionReason;
use crate::rag::SearchResponse;
use crate::rag::WindowSource;
use crate::AppConfig;

/// Safely truncate a string at character boundary (not byte boundary)
///
/// This prevents panics when truncating strings with multi-byte UTF-8 characters (emojis, etc.)
#[must_use]
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{truncated}...")
    } else {
        s.to_string()
    }
}

/// Collapse a multi-line fragment into a single preview line
#[must_use]
pub fn preview_line(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_str(&flat, max_chars)
}

/// Print a search header
pub fn print_search_header(query: &str, participant: Option<&str>) {
    match participant {
        Some(p) => println!("🔍 Searching messages from {p} for: \"{query}\""),
        None => println!("🔍 Searching chat history for: \"{query}\""),
    }
}

/// Print ranked search results
pub fn print_search_results(response: &SearchResponse, limit: usize) {
    println!(
        "📊 Confidence: {} ({})",
        response.confidence, response.confidence_reason
    );
    if let Some(gap) = response.score_gap {
        println!("   Best score: {:.3} | Gap to next: {gap:.3}", response.best_score);
    }
    if response.has_full_text_match == Some(true) {
        println!("   ✓ Query text appears verbatim in the results");
    }

    if response.is_empty() {
        println!("\n📭 No matching fragments");
        return;
    }

    println!(
        "\nShowing {} of {} fragments:",
        limit.min(response.results.len()),
        response.results.len()
    );
    for (idx, fragment) in response.results.iter().take(limit).enumerate() {
        let kind = if fragment.is_window_fragment {
            "window"
        } else {
            "message"
        };
        println!(
            "  {}. [{:.1}%] #{} ({kind}) {}",
            idx + 1,
            fragment.similarity * 100.0,
            fragment.message_id,
            preview_line(&fragment.text, 100)
        );
    }
}

/// Print an answer with its provenance
pub fn print_answer(response: &AskResponse, verbose: bool) {
    match &response.decision {
        GateDecision::Proceed => {}
        GateDecision::ProceedWithWarning { notice } => print_warning(notice),
        GateDecision::SearchExternally { notice } => print_info(notice),
        GateDecision::NothingFound { notice } => print_warning(notice),
    }

    println!("\n💬 {}\n", response.answer_text);

    println!(
        "📊 Confidence: {} | Strategy: {:?} | Tokens: {}",
        response.confidence,
        response.strategy,
        response.metrics.total_tokens()
    );
    if response.used_external_knowledge {
        println!("🌐 Answered from external knowledge");
    }

    if verbose {
        println!("\n📚 Context decisions:");
        for decision in response.tracker.decisions() {
            let marker = if decision.included { "✓" } else { "✗" };
            println!(
                "  {marker} #{} {:?}",
                decision.message_id, decision.reason
            );
        }
        println!(
            "   Included: {} | Over budget: {}",
            response.tracker.count(InclusionReason::Ok),
            response.tracker.count(InclusionReason::BudgetExceeded)
        );
        let raw = response
            .included
            .iter()
            .filter(|f| f.source == WindowSource::RawFallback)
            .count();
        if raw > 0 {
            println!("   Unexpanded fragments: {raw}");
        }
        for stage in &response.metrics.stages {
            println!(
                "  ⏱️  {:?}: {}ms, {} tokens ({})",
                stage.stage,
                stage.latency_ms,
                stage.usage.total(),
                stage.provider_id
            );
        }
    }
}

/// Print configuration
pub fn print_config(config: &AppConfig) {
    println!("📋 chatrag Configuration:");
    println!();

    println!("📝 Logging:");
    println!("  Level: {}", config.logging.level);
    println!("  Directory: {}", config.logging.directory);
    println!();

    println!("🔍 Retrieval:");
    println!("  Message limit: {}", config.retrieval.message_limit);
    println!("  Window limit: {}", config.retrieval.window_limit);
    println!("  Default lookback: {} days", config.default_lookback_days());
    println!();

    println!("📚 Context:");
    println!("  Budget: {} chars", config.context_budget_chars());
    println!();

    println!("🤖 LLM:");
    println!("  Endpoint: {}", config.llm_endpoint());
    println!("  Key: {}", mask_key(config.llm_key()));
    println!("  Model: {}", config.llm_model());
    println!("  Timeout: {}s", config.llm.timeout_secs);
}

/// Mask an API key for display
fn mask_key(key: &str) -> String {
    if key.chars().count() <= 8 {
        return "***".to_string();
    }
    let head: String = key.chars().take(4).collect();
    format!("{head}***")
}

/// Print colored output functions
pub fn print_info(msg: &str) {
    println!("ℹ️  {msg}");
}

pub fn print_warning(msg: &str) {
    println!("⚠️  {msg}");
}

pub fn print_error(msg: &str) {
    eprintln!("❌ {msg}");
}

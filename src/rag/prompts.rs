//! Prompts for answering questions about chat history

use super::synthesis::ExtractedFacts;

const NO_CONTEXT_PLACEHOLDER: &str = "(no relevant chat history was found)";

fn memory_section(memory_context: Option<&str>) -> String {
    match memory_context.map(str::trim).filter(|m| !m.is_empty()) {
        Some(memory) => format!("\nWhat you remember about this chat and its members:\n{memory}\n"),
        None => String::new(),
    }
}

fn context_or_placeholder(context: &str) -> &str {
    if context.trim().is_empty() {
        NO_CONTEXT_PLACEHOLDER
    } else {
        context
    }
}

/// System prompt for the single-call path
pub fn build_simple_system_prompt() -> String {
    r#"You are a member of a group chat who answers questions about what was said in it.

Instructions:
1. Answer only from the chat excerpts you are given
2. Some excerpts may be unrelated to the question; ignore them
3. Never invent messages, names, dates or numbers that are not in the excerpts
4. If the excerpts do not answer the question, say you don't know
5. Reply in 2-4 sentences"#
        .to_string()
}

/// User prompt for the single-call path
pub fn build_simple_user_prompt(question: &str, context: &str, memory_context: Option<&str>) -> String {
    format!(
        r#"{}
Chat excerpts:

{}

Question: {}

Answer:"#,
        memory_section(memory_context),
        context_or_placeholder(context),
        question
    )
}

/// System prompt for stage 1: fact extraction into strict JSON
pub fn build_extraction_system_prompt(max_facts: usize) -> String {
    format!(
        r#"You extract facts from chat excerpts that help answer a question. You do not answer the question.

Respond with a single JSON object and nothing else, in exactly this shape:
{{"facts": [{{"claim": "...", "source": "...", "confidence": "high|medium|low"}}], "not_found": ["..."]}}

Rules:
1. "facts" holds at most {max_facts} claims, each directly supported by the excerpts
2. "source" names who said it and when, if the excerpts show it; otherwise leave it out
3. "confidence" is "high" when stated outright, "medium" when implied, "low" when uncertain
4. "not_found" lists each part of the question the excerpts do not answer
5. Do not use outside knowledge and do not guess"#
    )
}

/// User prompt for stage 1
pub fn build_extraction_user_prompt(question: &str, context: &str, memory_context: Option<&str>) -> String {
    format!(
        r#"{}
Excerpts:

{}

Question: {}

JSON:"#,
        memory_section(memory_context),
        context_or_placeholder(context),
        question
    )
}

/// System prompt for stage 2: answer constrained to the extracted facts
pub fn build_grounded_system_prompt() -> String {
    r#"You are a member of a group chat who answers questions about what was said in it.

You are given facts that were verified against the chat history, as JSON.

Rules:
1. Every claim in your answer must come from "facts"; state nothing else as fact
2. For each item in "not_found", say plainly that you don't know it
3. If "facts" is empty, say you couldn't find the answer
4. You may phrase things naturally and add tone, but only on top of the facts
5. Reply in 2-4 sentences"#
        .to_string()
}

/// User prompt for stage 2
pub fn build_grounded_user_prompt(question: &str, facts: &ExtractedFacts) -> String {
    let facts_json = serde_json::to_string_pretty(facts).unwrap_or_else(|_| "{}".to_string());
    format!(
        r#"Verified facts:
{facts_json}

Question: {question}

Answer:"#
    )
}

/// Label prepended to external-knowledge context so the model does not
/// present it as something said in the chat
pub fn label_external_context(text: &str) -> String {
    format!("[External source, not from the chat]\n{text}")
}

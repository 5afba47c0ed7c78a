//! Local backend over a JSON chat export.
//!
//! Scores are lexical (cosine over lowercase term frequencies) rather than
//! embedding-based, which is enough to drive the pipeline end to end from the
//! CLI and in tests. Windows are 10 messages wide with a stride of 5 and are
//! keyed by their middle message.

use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use tracing::debug;

use super::MessageStore;
use super::SimilarityIndex;
use crate::errors::ChatRagError;
use crate::errors::Result;
use crate::models::ChatId;
use crate::models::Fragment;
use crate::models::Message;
use crate::models::MessageFilter;
use crate::models::MessageId;

pub const WINDOW_SIZE: usize = 10;
pub const WINDOW_STRIDE: usize = 5;
/// Messages longer than this are treated as pasted external content
pub const BULK_CONTENT_CHARS: usize = 1500;

#[derive(Debug, Deserialize)]
struct TranscriptFile {
    chat_id: ChatId,
    messages: Vec<TranscriptMessage>,
}

#[derive(Debug, Deserialize)]
struct TranscriptMessage {
    id: MessageId,
    sender: String,
    text: String,
    sent_at: DateTime<Utc>,
}

type TermVector = HashMap<String, f32>;

struct IndexedWindow {
    /// Inclusive start, exclusive end, as positions in `messages`
    start: usize,
    end: usize,
    center: usize,
    text: String,
    terms: TermVector,
}

/// In-memory index and message store for a single chat transcript
pub struct TranscriptStore {
    chat_id: ChatId,
    messages: Vec<Message>,
    positions: HashMap<MessageId, usize>,
    message_terms: Vec<TermVector>,
    windows: Vec<IndexedWindow>,
}

impl TranscriptStore {
    /// Load a transcript export from disk
    ///
    /// # Errors
    /// - File read errors
    /// - Malformed JSON
    /// - Duplicate message ids
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse a transcript export from a JSON string
    ///
    /// # Errors
    /// - Malformed JSON
    /// - Duplicate message ids
    pub fn from_json(content: &str) -> Result<Self> {
        let file: TranscriptFile = serde_json::from_str(content)?;
        let chat_id = file.chat_id;
        let messages = file
            .messages
            .into_iter()
            .map(|m| Message {
                chat_id,
                message_id: m.id,
                sender: m.sender,
                text: m.text,
                sent_at: m.sent_at,
            })
            .collect();
        Self::new(chat_id, messages)
    }

    /// Build the indexes over messages of one chat
    ///
    /// Messages are ordered by send time (then id) regardless of input order.
    ///
    /// # Errors
    /// Returns [`ChatRagError::InvalidTranscript`] on duplicate ids.
    pub fn new(chat_id: ChatId, mut messages: Vec<Message>) -> Result<Self> {
        messages.sort_by(|a, b| a.sent_at.cmp(&b.sent_at).then(a.message_id.cmp(&b.message_id)));

        let mut positions = HashMap::with_capacity(messages.len());
        for (pos, message) in messages.iter().enumerate() {
            if positions.insert(message.message_id, pos).is_some() {
                return Err(ChatRagError::InvalidTranscript(format!(
                    "duplicate message id {}",
                    message.message_id
                )));
            }
        }

        let message_terms = messages.iter().map(|m| term_vector(&m.text)).collect();
        let windows = build_windows(&messages);
        debug!(
            "Indexed transcript for chat {}: {} messages, {} windows",
            chat_id,
            messages.len(),
            windows.len()
        );

        Ok(Self {
            chat_id,
            messages,
            positions,
            message_terms,
            windows,
        })
    }

    #[must_use]
    pub const fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn window_fragment(&self, window: &IndexedWindow, similarity: f32) -> Fragment {
        Fragment::window(
            self.chat_id,
            self.messages[window.center].message_id,
            window.text.clone(),
            similarity,
        )
    }
}

fn build_windows(messages: &[Message]) -> Vec<IndexedWindow> {
    let mut windows = Vec::new();
    if messages.is_empty() {
        return windows;
    }

    let mut start = 0;
    loop {
        let end = (start + WINDOW_SIZE).min(messages.len());
        let text = messages[start..end]
            .iter()
            .map(Message::format_line)
            .collect::<Vec<_>>()
            .join("\n");
        let terms = term_vector(&text);
        windows.push(IndexedWindow {
            start,
            end,
            center: start + (end - start) / 2,
            text,
            terms,
        });
        if end == messages.len() {
            break;
        }
        start += WINDOW_STRIDE;
    }
    windows
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .map(str::to_lowercase)
}

fn term_vector(text: &str) -> TermVector {
    let mut terms = TermVector::new();
    for token in tokenize(text) {
        *terms.entry(token).or_insert(0.0) += 1.0;
    }
    terms
}

fn cosine_sim(a: &TermVector, b: &TermVector) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let dot: f32 = a
        .iter()
        .filter_map(|(term, x)| b.get(term).map(|y| x * y))
        .sum();
    let mag_a: f32 = a.values().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.values().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

fn rank<T>(mut scored: Vec<(f32, T)>, limit: usize) -> Vec<(f32, T)> {
    scored.retain(|(score, _)| *score > 0.0);
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.truncate(limit);
    scored
}

#[async_trait]
impl SimilarityIndex for TranscriptStore {
    async fn search_messages(
        &self,
        chat_id: ChatId,
        query: &str,
        filter: Option<&MessageFilter>,
        limit: usize,
    ) -> Result<Vec<Fragment>> {
        if chat_id != self.chat_id {
            return Ok(Vec::new());
        }
        let query_terms = term_vector(query);

        let scored = self
            .messages
            .iter()
            .zip(&self.message_terms)
            .filter(|(message, _)| filter.map_or(true, |f| f.matches(message)))
            .map(|(message, terms)| (cosine_sim(&query_terms, terms), message))
            .collect();

        Ok(rank(scored, limit)
            .into_iter()
            .map(|(similarity, message)| Fragment {
                is_bulk_content: message.text.chars().count() > BULK_CONTENT_CHARS,
                ..Fragment::message(self.chat_id, message.message_id, message.text.clone(), similarity)
            })
            .collect())
    }

    async fn search_windows(&self, chat_id: ChatId, query: &str, limit: usize) -> Result<Vec<Fragment>> {
        if chat_id != self.chat_id {
            return Ok(Vec::new());
        }
        let query_terms = term_vector(query);

        let scored = self
            .windows
            .iter()
            .map(|window| (cosine_sim(&query_terms, &window.terms), window))
            .collect();

        Ok(rank(scored, limit)
            .into_iter()
            .map(|(similarity, window)| self.window_fragment(window, similarity))
            .collect())
    }

    async fn windows_for_messages(&self, chat_id: ChatId, message_ids: &[MessageId]) -> Result<Vec<Fragment>> {
        if chat_id != self.chat_id {
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        let mut fragments = Vec::new();
        for id in message_ids {
            let Some(&pos) = self.positions.get(id) else {
                continue;
            };
            // Of the windows covering the message, take the one it sits closest to the middle of.
            let best = self
                .windows
                .iter()
                .enumerate()
                .filter(|(_, w)| w.start <= pos && pos < w.end)
                .min_by_key(|(_, w)| w.center.abs_diff(pos));
            if let Some((idx, window)) = best {
                if seen.insert(idx) {
                    fragments.push(self.window_fragment(window, 0.0));
                }
            }
        }
        Ok(fragments)
    }
}

#[async_trait]
impl MessageStore for TranscriptStore {
    async fn neighbors(
        &self,
        chat_id: ChatId,
        message_ids: &[MessageId],
        radius: usize,
    ) -> Result<HashMap<MessageId, Vec<Message>>> {
        let mut found = HashMap::new();
        if chat_id != self.chat_id {
            return Ok(found);
        }
        for id in message_ids {
            if let Some(&pos) = self.positions.get(id) {
                let start = pos.saturating_sub(radius);
                let end = (pos + radius + 1).min(self.messages.len());
                found.insert(*id, self.messages[start..end].to_vec());
            }
        }
        Ok(found)
    }
}

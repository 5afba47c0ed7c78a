use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// Identifier of a chat (group conversation)
pub type ChatId = i64;

/// Identifier of a message within a chat
pub type MessageId = i64;

/// One candidate conversation snippet returned by a similarity search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    /// 0 for window-level and single-chunk fragments
    #[serde(default)]
    pub chunk_index: u32,
    pub text: String,
    /// Higher is closer, in `0..=1`
    pub similarity: f32,
    /// Backend-specific distance; not required to equal `1 - similarity`
    #[serde(default)]
    pub distance: f32,
    /// Derived from a question-form paraphrase of the message
    #[serde(default)]
    pub is_question_variant: bool,
    /// Text is already an expanded multi-message window
    #[serde(default)]
    pub is_window_fragment: bool,
    /// Long pasted external content
    #[serde(default)]
    pub is_bulk_content: bool,
}

/// Identity of an index entry. Two fragments for the same message may both
/// be legitimate (different chunks, or original vs question variant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FragmentKey {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub chunk_index: u32,
    pub is_question_variant: bool,
}

impl Fragment {
    /// Create a plain message-level fragment
    pub fn message(
        chat_id: ChatId,
        message_id: MessageId,
        text: impl Into<String>,
        similarity: f32,
    ) -> Self {
        Self {
            chat_id,
            message_id,
            chunk_index: 0,
            text: text.into(),
            similarity,
            distance: 1.0 - similarity,
            is_question_variant: false,
            is_window_fragment: false,
            is_bulk_content: false,
        }
    }

    /// Create a window-level fragment keyed by its center message
    pub fn window(
        chat_id: ChatId,
        center_message_id: MessageId,
        text: impl Into<String>,
        similarity: f32,
    ) -> Self {
        Self {
            is_window_fragment: true,
            ..Self::message(chat_id, center_message_id, text, similarity)
        }
    }

    #[must_use]
    pub const fn key(&self) -> FragmentKey {
        FragmentKey {
            chat_id: self.chat_id,
            message_id: self.message_id,
            chunk_index: self.chunk_index,
            is_question_variant: self.is_question_variant,
        }
    }

    /// Whether the fragment has any text worth showing to the model
    #[must_use]
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// A stored chat message, as returned by the message store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub sender: String,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

impl Message {
    /// Single transcript line: `[YYYY-MM-DD HH:MM] sender: text`
    #[must_use]
    pub fn format_line(&self) -> String {
        format!(
            "[{}] {}: {}",
            self.sent_at.format("%Y-%m-%d %H:%M"),
            self.sender,
            self.text
        )
    }
}

/// Restriction applied to a message-index search
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageFilter {
    /// Only messages written by this participant
    pub sender: Option<String>,
    /// Only messages sent at or after this instant
    pub since: Option<DateTime<Utc>>,
}

impl MessageFilter {
    /// Participant filter with a lookback window ending now
    #[must_use]
    pub fn participant(sender: impl Into<String>, lookback_days: u32) -> Self {
        Self {
            sender: Some(sender.into()),
            since: Some(Utc::now() - chrono::Duration::days(i64::from(lookback_days))),
        }
    }

    #[must_use]
    pub fn matches(&self, message: &Message) -> bool {
        let sender_ok = self
            .sender
            .as_deref()
            .map_or(true, |s| s.eq_ignore_ascii_case(&message.sender));
        let since_ok = self.since.map_or(true, |since| message.sent_at >= since);
        sender_ok && since_ok
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn msg(sender: &str, days_ago: i64) -> Message {
        Message {
            chat_id: 1,
            message_id: 1,
            sender: sender.to_string(),
            text: "hi".to_string(),
            sent_at: Utc::now() - chrono::Duration::days(days_ago),
        }
    }

    #[test]
    fn test_fragment_key_distinguishes_question_variant() {
        let original = Fragment::message(1, 42, "deploy is friday", 0.8);
        let variant = Fragment {
            is_question_variant: true,
            ..original.clone()
        };
        assert_eq!(original.message_id, variant.message_id);
        assert_ne!(original.key(), variant.key());
    }

    #[test]
    fn test_filter_matches_sender_and_lookback() {
        let filter = MessageFilter::participant("Alice", 7);
        assert!(filter.matches(&msg("alice", 1)));
        assert!(!filter.matches(&msg("bob", 1)));
        assert!(!filter.matches(&msg("alice", 30)));
    }

    #[test]
    fn test_format_line() {
        let message = Message {
            chat_id: 1,
            message_id: 7,
            sender: "carol".to_string(),
            text: "lunch at noon".to_string(),
            sent_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 5, 0).unwrap(),
        };
        assert_eq!(message.format_line(), "[2024-03-01 12:05] carol: lunch at noon");
    }

    #[test]
    fn test_blank_fragment_has_no_text() {
        assert!(!Fragment::message(1, 1, "   ", 0.9).has_text());
    }
}

//! Retrieval backends consumed by the RAG core.
//!
//! The pipeline never talks to a database directly. It goes through two
//! capabilities:
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`SimilarityIndex`] | Ranked fragments from the message and window indexes |
//! | [`MessageStore`] | Ordered neighbours of a message, for window expansion |
//!
//! Both are stateless from the core's point of view and must be
//! `Send + Sync` so a single instance can serve concurrent requests.
//! [`transcript::TranscriptStore`] implements both over a JSON chat export.

pub mod transcript;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::errors::Result;
use crate::models::ChatId;
use crate::models::Fragment;
use crate::models::Message;
use crate::models::MessageFilter;
use crate::models::MessageId;

pub use transcript::TranscriptStore;

/// Two logically independent vector indexes over the same conversation.
///
/// Results come back sorted by descending similarity and are not filtered by
/// any threshold; deciding what is good enough is the caller's job.
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    /// Search the per-message index (one vector per message chunk).
    async fn search_messages(
        &self,
        chat_id: ChatId,
        query: &str,
        filter: Option<&MessageFilter>,
        limit: usize,
    ) -> Result<Vec<Fragment>>;

    /// Search the sliding dialog-window index.
    async fn search_windows(&self, chat_id: ChatId, query: &str, limit: usize) -> Result<Vec<Fragment>>;

    /// Windows that contain any of the given messages, one per message at most.
    async fn windows_for_messages(&self, chat_id: ChatId, message_ids: &[MessageId]) -> Result<Vec<Fragment>>;
}

/// Read-only access to stored messages in chat order.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Batched neighbour lookup: for each known id, the message itself plus up
    /// to `radius` messages on each side, in chat order. Ids the store does
    /// not know are absent from the map.
    async fn neighbors(
        &self,
        chat_id: ChatId,
        message_ids: &[MessageId],
        radius: usize,
    ) -> Result<HashMap<MessageId, Vec<Message>>>;

    /// Single-message convenience over [`MessageStore::neighbors`].
    async fn get_neighbors(&self, chat_id: ChatId, message_id: MessageId, radius: usize) -> Result<Vec<Message>> {
        let mut found = self.neighbors(chat_id, &[message_id], radius).await?;
        Ok(found.remove(&message_id).unwrap_or_default())
    }
}

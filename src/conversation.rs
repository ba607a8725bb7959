//! Process-local conversation log.
//!
//! Maps a verified user id to the ordered records of that user's advice
//! exchanges. Append-only, never evicted, lost on restart. Appends from
//! concurrent requests are serialised by an internal lock; there is no
//! atomicity across the two appends of one request.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Who produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// The situation text the user submitted.
    UserMessage,
    /// The advice text returned to the user.
    BotResponse,
}

/// One immutable log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationRecord {
    /// When the record was appended (UTC).
    pub timestamp: DateTime<Utc>,
    /// Record kind, serialised as `type`.
    #[serde(rename = "type")]
    pub kind: RecordKind,
    /// Message or response text.
    pub content: String,
}

/// Concurrency-safe, append-only map of user id to records.
#[derive(Debug, Default)]
pub struct ConversationLog {
    users: RwLock<HashMap<String, Vec<ConversationRecord>>>,
}

impl ConversationLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record to `user_id`'s sequence, creating it if absent.
    ///
    /// Returns a copy of the stored record.
    pub fn append(
        &self,
        user_id: &str,
        kind: RecordKind,
        content: impl Into<String>,
    ) -> ConversationRecord {
        let record = ConversationRecord {
            timestamp: Utc::now(),
            kind,
            content: content.into(),
        };
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        users
            .entry(user_id.to_owned())
            .or_default()
            .push(record.clone());
        record
    }

    /// All records for `user_id`, oldest first. Unknown users yield an empty list.
    pub fn read(&self, user_id: &str) -> Vec<ConversationRecord> {
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        users.get(user_id).cloned().unwrap_or_default()
    }

    /// Number of users with at least one record.
    pub fn count_users(&self) -> usize {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Total records across all users.
    pub fn count_all_records(&self) -> usize {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Vec::len)
            .sum()
    }

    /// Number of records stored for `user_id`.
    pub fn count_records_for(&self, user_id: &str) -> usize {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .map_or(0, Vec::len)
    }
}

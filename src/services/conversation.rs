//! Conversation log: per-user history used as model context.

use crate::db::Database;
use crate::error::AppError;
use crate::models::{ChatMessage, ConversationEntry, Role};
use crate::time_utils::format_utc_rfc3339_nanos;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Append-only message history, one log per user.
#[derive(Clone)]
pub struct ConversationLog {
    db: Database,
    default_limit: usize,
    /// Last timestamp handed out, in nanoseconds; keeps insertion order
    /// strict even when the clock does not advance between appends.
    last_stamp: Arc<AtomicI64>,
}

impl ConversationLog {
    pub fn new(db: Database, default_limit: usize) -> Self {
        Self {
            db,
            default_limit,
            last_stamp: Arc::new(AtomicI64::new(0)),
        }
    }

    pub fn default_limit(&self) -> usize {
        self.default_limit
    }

    fn next_stamp(&self) -> DateTime<Utc> {
        let now = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
        let prev = self
            .last_stamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        DateTime::<Utc>::from_timestamp_nanos(now.max(prev + 1))
    }

    /// Add an entry. Content is stored as given.
    pub async fn append(&self, user_id: i64, role: Role, content: &str) -> Result<(), AppError> {
        let entry = ConversationEntry {
            user_id,
            role,
            content: content.to_string(),
            created_at: format_utc_rfc3339_nanos(self.next_stamp()),
        };
        self.db.append_message(&entry).await
    }

    /// Add a user message and the reply to it.
    ///
    /// Both entries are stamped before either is written, so the reply always
    /// sorts after the question.
    pub async fn append_exchange(
        &self,
        user_id: i64,
        question: &str,
        reply: &str,
    ) -> Result<(), AppError> {
        let question = ConversationEntry {
            user_id,
            role: Role::User,
            content: question.to_string(),
            created_at: format_utc_rfc3339_nanos(self.next_stamp()),
        };
        let reply = ConversationEntry {
            user_id,
            role: Role::Assistant,
            content: reply.to_string(),
            created_at: format_utc_rfc3339_nanos(self.next_stamp()),
        };

        futures_util::future::try_join(
            self.db.append_message(&question),
            self.db.append_message(&reply),
        )
        .await?;
        Ok(())
    }

    /// The last `limit` entries, oldest first.
    pub async fn recent(&self, user_id: i64, limit: usize) -> Result<Vec<ChatMessage>, AppError> {
        let entries = self.db.recent_messages(user_id, limit).await?;
        Ok(entries.into_iter().map(ChatMessage::from).collect())
    }

    /// The last entries up to the configured context size.
    pub async fn context(&self, user_id: i64) -> Result<Vec<ChatMessage>, AppError> {
        self.recent(user_id, self.default_limit).await
    }

    /// Delete the user's whole history. Returns the number of entries removed.
    pub async fn clear(&self, user_id: i64) -> Result<usize, AppError> {
        let count = self.db.clear_messages(user_id).await?;
        tracing::info!(user_id, count, "Conversation cleared");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log() -> ConversationLog {
        ConversationLog::new(Database::in_memory(), 10)
    }

    #[tokio::test]
    async fn test_recent_returns_last_n_oldest_first() {
        let log = log();
        for n in 0..12 {
            let role = if n % 2 == 0 { Role::User } else { Role::Assistant };
            log.append(5, role, &format!("m{}", n)).await.unwrap();
        }

        let recent = log.recent(5, 4).await.unwrap();

        let contents: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m8", "m9", "m10", "m11"]);
        assert_eq!(recent[0].role, Role::User);
    }

    #[tokio::test]
    async fn test_recent_is_restartable() {
        let log = log();
        log.append(5, Role::User, "hello").await.unwrap();

        let first = log.recent(5, 10).await.unwrap();
        let second = log.recent(5, 10).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_clear_then_recent_is_empty() {
        let log = log();
        log.append(5, Role::User, "a").await.unwrap();
        log.append(5, Role::Assistant, "b").await.unwrap();

        assert_eq!(log.clear(5).await.unwrap(), 2);
        assert!(log.context(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_content_stored_verbatim() {
        let log = log();
        let odd = "  multi\nline 🚀 \u{0}  ";
        log.append(5, Role::User, odd).await.unwrap();
        assert_eq!(log.context(5).await.unwrap()[0].content, odd);
    }

    #[tokio::test]
    async fn test_exchange_keeps_question_before_reply() {
        let log = log();
        log.append_exchange(5, "question", "answer").await.unwrap();

        let recent = log.context(5).await.unwrap();
        assert_eq!(
            recent,
            vec![
                ChatMessage::new(Role::User, "question"),
                ChatMessage::new(Role::Assistant, "answer"),
            ]
        );
    }

    #[test]
    fn test_stamps_strictly_increase() {
        let log = log();
        let stamps: Vec<_> = (0..100).map(|_| log.next_stamp()).collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    }
}

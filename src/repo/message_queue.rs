use deadpool_postgres::Pool;
use log::info;

use super::RepoError;

#[derive(Debug, Clone, PartialEq)]
pub struct QueuedMessage {
    pub id: i32,
    pub telegram_user_id: i64,
    pub content_type: String,
    pub text: Option<String>,
    pub file_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueStatusCounts {
    pub pending: i64,
    pub sending: i64,
    pub sent: i64,
    pub failed: i64,
}

pub struct MessageQueueRepository {
    pool: Pool,
}

impl MessageQueueRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub async fn enqueue(
        &self,
        telegram_user_id: i64,
        content_type: &str,
        text: Option<&str>,
        file_id: Option<&str>,
    ) -> Result<i32, RepoError> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                "INSERT INTO message_queue (telegram_user_id, content_type, text, file_id)
                 VALUES ($1, $2, $3, $4) RETURNING id",
                &[&telegram_user_id, &content_type, &text, &file_id],
            )
            .await?;
        Ok(row.get(0))
    }

    /// queues one copy of the message per user in a single statement
    pub async fn enqueue_for_all(
        &self,
        user_ids: &[i64],
        content_type: &str,
        text: Option<&str>,
        file_id: Option<&str>,
    ) -> Result<u64, RepoError> {
        if user_ids.is_empty() {
            return Ok(0);
        }
        let client = self.pool.get().await?;
        let queued = client
            .execute(
                "INSERT INTO message_queue (telegram_user_id, content_type, text, file_id)
                 SELECT unnest($1::BIGINT[]), $2, $3, $4",
                &[&user_ids, &content_type, &text, &file_id],
            )
            .await?;
        info!("Queued {} {} messages", queued, content_type);
        Ok(queued)
    }

    /// takes the oldest pending message and flags it as being sent, so
    /// concurrent processors never pick the same row
    pub async fn claim_next(&self) -> Result<Option<QueuedMessage>, RepoError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "UPDATE message_queue SET status = 'sending'
                 WHERE id = (
                     SELECT id FROM message_queue
                     WHERE status = 'pending'
                     ORDER BY created_at, id
                     LIMIT 1
                     FOR UPDATE SKIP LOCKED
                 )
                 RETURNING id, telegram_user_id, content_type, text, file_id",
                &[],
            )
            .await?;

        Ok(row.map(|row| QueuedMessage {
            id: row.get(0),
            telegram_user_id: row.get(1),
            content_type: row.get(2),
            text: row.get(3),
            file_id: row.get(4),
        }))
    }

    pub async fn mark_sent(&self, id: i32) -> Result<(), RepoError> {
        let client = self.pool.get().await?;
        client
            .execute(
                "UPDATE message_queue SET status = 'sent', sent_at = NOW() WHERE id = $1",
                &[&id],
            )
            .await?;
        Ok(())
    }

    pub async fn mark_failed(&self, id: i32, error_message: &str) -> Result<(), RepoError> {
        let client = self.pool.get().await?;
        client
            .execute(
                "UPDATE message_queue SET status = 'failed', error_message = $2 WHERE id = $1",
                &[&id, &error_message],
            )
            .await?;
        Ok(())
    }

    pub async fn status_counts(&self) -> Result<QueueStatusCounts, RepoError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT status, COUNT(*) FROM message_queue GROUP BY status",
                &[],
            )
            .await?;

        let mut counts = QueueStatusCounts::default();
        for row in rows {
            let status: String = row.get(0);
            let count: i64 = row.get(1);
            match status.as_str() {
                "pending" => counts.pending = count,
                "sending" => counts.sending = count,
                "sent" => counts.sent = count,
                "failed" => counts.failed = count,
                _ => {}
            }
        }
        Ok(counts)
    }

    /// puts rows left in 'sending' by a crashed processor back in the queue
    pub async fn requeue_stale(&self) -> Result<u64, RepoError> {
        let client = self.pool.get().await?;
        let requeued = client
            .execute(
                "UPDATE message_queue SET status = 'pending' WHERE status = 'sending'",
                &[],
            )
            .await?;
        if requeued > 0 {
            info!("Requeued {} interrupted messages", requeued);
        }
        Ok(requeued)
    }
}

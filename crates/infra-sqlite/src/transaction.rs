// SQLite Transaction Implementation

use crate::error::map_sqlx_error;
use crate::queue_repository::{QueueRow, ENTRY_COLUMNS};
use async_trait::async_trait;
use callq_core::domain::{NewQueueEntry, PhoneNumber, Position, QueueEntry, QueueName};
use callq_core::error::Result;
use callq_core::port::{QueueRepositoryTransaction, Transaction};
use sqlx::{Sqlite, Transaction as SqlxTransaction};

/// Every statement issued here writes, so the first one takes the SQLite
/// write lock and no read snapshot is ever upgraded mid-transaction.
pub struct SqliteQueueTransaction {
    tx: SqlxTransaction<'static, Sqlite>,
}

impl SqliteQueueTransaction {
    pub fn new(tx: SqlxTransaction<'static, Sqlite>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl Transaction for SqliteQueueTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await.map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[async_trait]
impl QueueRepositoryTransaction for SqliteQueueTransaction {
    async fn insert(&mut self, entry: &NewQueueEntry) -> Result<QueueEntry> {
        // Next-position read and insert in one statement
        let sql = format!(
            r#"
            INSERT INTO queue (phone_number, queue_name, position)
            SELECT ?, ?, COALESCE(MAX(position), 0) + 1
            FROM queue
            WHERE queue_name = ?
            RETURNING {}
            "#,
            ENTRY_COLUMNS
        );

        let row = sqlx::query_as::<_, QueueRow>(&sql)
            .bind(entry.phone_number.as_str())
            .bind(entry.queue_name.as_str())
            .bind(entry.queue_name.as_str())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        row.into_entry()
    }

    async fn delete(
        &mut self,
        phone_number: &PhoneNumber,
        queue_name: &QueueName,
    ) -> Result<Option<QueueEntry>> {
        let sql = format!(
            "DELETE FROM queue WHERE phone_number = ? AND queue_name = ? RETURNING {}",
            ENTRY_COLUMNS
        );

        let row = sqlx::query_as::<_, QueueRow>(&sql)
            .bind(phone_number.as_str())
            .bind(queue_name.as_str())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        row.map(QueueRow::into_entry).transpose()
    }

    async fn shift_positions(
        &mut self,
        queue_name: &QueueName,
        above: Position,
        delta: i64,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE queue
            SET position = position + ?
            WHERE queue_name = ? AND position > ?
            "#,
        )
        .bind(delta)
        .bind(queue_name.as_str())
        .bind(above)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}

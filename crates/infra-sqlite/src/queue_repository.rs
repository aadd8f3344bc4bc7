// SQLite QueueRepository Implementation

use crate::error::map_sqlx_error;
use crate::SqliteQueueTransaction;
use async_trait::async_trait;
use callq_core::domain::{AggregationSnapshot, PhoneNumber, QueueEntry, QueueName};
use callq_core::error::{AppError, Result};
use callq_core::port::{QueueRepository, QueueRepositoryTransaction, TransactionalQueueRepository};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

pub(crate) const ENTRY_COLUMNS: &str = "id, created_at, phone_number, queue_name, position";

#[derive(Clone)]
pub struct SqliteQueueRepository {
    pool: SqlitePool,
}

impl SqliteQueueRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl QueueRepository for SqliteQueueRepository {
    async fn count_by_queue(&self, tracked: &[QueueName]) -> Result<AggregationSnapshot> {
        if tracked.is_empty() {
            let rows: Vec<(String, i64)> = sqlx::query_as(
                "SELECT queue_name, COUNT(*) FROM queue GROUP BY queue_name",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

            return Ok(rows.into_iter().collect());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT queue_name, COUNT(*) FROM queue WHERE queue_name IN (");
        let mut names = builder.separated(", ");
        for queue in tracked {
            names.push_bind(queue.as_str().to_string());
        }
        names.push_unseparated(") GROUP BY queue_name");

        let rows: Vec<(String, i64)> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        // Tracked queues with no callers still report 0
        let mut snapshot = AggregationSnapshot::new();
        for queue in tracked {
            snapshot.insert(queue.as_str(), 0);
        }
        for (queue_name, count) in rows {
            snapshot.insert(queue_name, count);
        }
        Ok(snapshot)
    }

    async fn find(
        &self,
        phone_number: &PhoneNumber,
        queue_name: &QueueName,
    ) -> Result<Option<QueueEntry>> {
        let sql = format!(
            "SELECT {} FROM queue WHERE phone_number = ? AND queue_name = ?",
            ENTRY_COLUMNS
        );

        let row = sqlx::query_as::<_, QueueRow>(&sql)
            .bind(phone_number.as_str())
            .bind(queue_name.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(QueueRow::into_entry).transpose()
    }

    async fn list_queue(&self, queue_name: &QueueName) -> Result<Vec<QueueEntry>> {
        let sql = format!(
            "SELECT {} FROM queue WHERE queue_name = ? ORDER BY position ASC",
            ENTRY_COLUMNS
        );

        let rows: Vec<QueueRow> = sqlx::query_as(&sql)
            .bind(queue_name.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(QueueRow::into_entry).collect()
    }
}

#[async_trait]
impl TransactionalQueueRepository for SqliteQueueRepository {
    async fn begin_transaction(&self) -> Result<Box<dyn QueueRepositoryTransaction>> {
        let tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Ok(Box::new(SqliteQueueTransaction::new(tx)))
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct QueueRow {
    id: i64,
    created_at: i64,
    phone_number: String,
    queue_name: String,
    position: i64,
}

impl QueueRow {
    pub(crate) fn into_entry(self) -> Result<QueueEntry> {
        // Rows only ever come from validated inserts; anything else is corruption
        let phone_number = PhoneNumber::parse(&self.phone_number).map_err(|e| {
            AppError::Database(format!("Invalid phone_number in row {}: {}", self.id, e))
        })?;
        let queue_name = QueueName::parse(&self.queue_name).map_err(|e| {
            AppError::Database(format!("Invalid queue_name in row {}: {}", self.id, e))
        })?;

        Ok(QueueEntry {
            id: self.id,
            created_at: self.created_at,
            phone_number,
            queue_name,
            position: self.position,
        })
    }
}

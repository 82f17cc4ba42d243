use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::entities::blob_deletion;

/// Durable queue of object-store deletions. Rows are written in the same
/// transaction that removes the owning record and drained by a worker.
pub struct BlobDeletion;

impl BlobDeletion {
    pub async fn enqueue<C: ConnectionTrait>(
        db: &C,
        bucket: &str,
        object_key: &str,
    ) -> Result<blob_deletion::Model, DbErr> {
        let now = Utc::now();
        let active = blob_deletion::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            bucket: Set(bucket.to_string()),
            object_key: Set(object_key.to_string()),
            attempts: Set(0),
            last_error: Set(None),
            next_attempt_at: Set(now),
            completed_at: Set(None),
            created_at: Set(now),
            ..Default::default()
        };
        active.insert(db).await
    }

    pub async fn fetch_due<C: ConnectionTrait>(
        db: &C,
        now: DateTime<Utc>,
        max_attempts: i32,
        limit: u64,
    ) -> Result<Vec<blob_deletion::Model>, DbErr> {
        blob_deletion::Entity::find()
            .filter(blob_deletion::Column::CompletedAt.is_null())
            .filter(blob_deletion::Column::NextAttemptAt.lte(now))
            .filter(blob_deletion::Column::Attempts.lt(max_attempts))
            .order_by_asc(blob_deletion::Column::NextAttemptAt)
            .order_by_asc(blob_deletion::Column::Id)
            .limit(limit)
            .all(db)
            .await
    }

    pub async fn mark_completed<C: ConnectionTrait>(db: &C, id: i64) -> Result<(), DbErr> {
        let record = blob_deletion::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound(
                "Blob deletion not found".to_string(),
            ))?;

        let mut active: blob_deletion::ActiveModel = record.into();
        active.completed_at = Set(Some(Utc::now()));
        active.update(db).await?;
        Ok(())
    }

    /// Records a failed attempt and returns the new attempt count.
    pub async fn record_failure<C: ConnectionTrait>(
        db: &C,
        id: i64,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<i32, DbErr> {
        let record = blob_deletion::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound(
                "Blob deletion not found".to_string(),
            ))?;

        let attempts = record.attempts + 1;
        let mut active: blob_deletion::ActiveModel = record.into();
        active.attempts = Set(attempts);
        active.last_error = Set(Some(error.to_string()));
        active.next_attempt_at = Set(next_attempt_at);
        active.update(db).await?;
        Ok(attempts)
    }

    pub async fn pending_count<C: ConnectionTrait>(db: &C) -> Result<u64, DbErr> {
        blob_deletion::Entity::find()
            .filter(blob_deletion::Column::CompletedAt.is_null())
            .count(db)
            .await
    }

    pub async fn find_by_key<C: ConnectionTrait>(
        db: &C,
        object_key: &str,
    ) -> Result<Option<blob_deletion::Model>, DbErr> {
        blob_deletion::Entity::find()
            .filter(blob_deletion::Column::ObjectKey.eq(object_key))
            .order_by_desc(blob_deletion::Column::Id)
            .one(db)
            .await
    }
}

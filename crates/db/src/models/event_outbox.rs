use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::entities::event_outbox;

pub struct EventOutbox;

impl EventOutbox {
    pub async fn enqueue<C: ConnectionTrait>(
        db: &C,
        event_type: &str,
        entity_type: &str,
        entity_uuid: Uuid,
        owner_id: &str,
        payload: Value,
    ) -> Result<(), DbErr> {
        let active = event_outbox::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            event_type: Set(event_type.to_string()),
            entity_type: Set(entity_type.to_string()),
            entity_uuid: Set(entity_uuid),
            owner_id: Set(owner_id.to_string()),
            payload: Set(payload),
            created_at: Set(Utc::now()),
            published_at: Set(None),
            attempts: Set(0),
            last_error: Set(None),
            ..Default::default()
        };

        active.insert(db).await?;
        Ok(())
    }

    /// Serializes `payload` and enqueues it in one step.
    pub async fn enqueue_event<C: ConnectionTrait, P: Serialize>(
        db: &C,
        event_type: &str,
        entity_type: &str,
        entity_uuid: Uuid,
        owner_id: &str,
        payload: &P,
    ) -> Result<(), DbErr> {
        let payload =
            serde_json::to_value(payload).map_err(|err| DbErr::Custom(err.to_string()))?;
        Self::enqueue(db, event_type, entity_type, entity_uuid, owner_id, payload).await
    }

    pub async fn fetch_unpublished<C: ConnectionTrait>(
        db: &C,
        max_attempts: i32,
        limit: u64,
    ) -> Result<Vec<event_outbox::Model>, DbErr> {
        event_outbox::Entity::find()
            .filter(event_outbox::Column::PublishedAt.is_null())
            .filter(event_outbox::Column::Attempts.lt(max_attempts))
            .order_by_asc(event_outbox::Column::CreatedAt)
            .order_by_asc(event_outbox::Column::Id)
            .limit(limit)
            .all(db)
            .await
    }

    pub async fn mark_published<C: ConnectionTrait>(db: &C, id: i64) -> Result<(), DbErr> {
        let record = event_outbox::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound(
                "Event outbox record not found".to_string(),
            ))?;

        let mut active: event_outbox::ActiveModel = record.into();
        active.published_at = Set(Some(Utc::now()));
        active.update(db).await?;
        Ok(())
    }

    pub async fn mark_failed<C: ConnectionTrait>(
        db: &C,
        id: i64,
        error: &str,
    ) -> Result<(), DbErr> {
        let record = event_outbox::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound(
                "Event outbox record not found".to_string(),
            ))?;

        let attempts = record.attempts + 1;
        let mut active: event_outbox::ActiveModel = record.into();
        active.attempts = Set(attempts);
        active.last_error = Set(Some(error.to_string()));
        active.update(db).await?;
        Ok(())
    }

    pub async fn find_by_entity<C: ConnectionTrait>(
        db: &C,
        entity_uuid: Uuid,
    ) -> Result<Vec<event_outbox::Model>, DbErr> {
        event_outbox::Entity::find()
            .filter(event_outbox::Column::EntityUuid.eq(entity_uuid))
            .order_by_asc(event_outbox::Column::Id)
            .all(db)
            .await
    }
}

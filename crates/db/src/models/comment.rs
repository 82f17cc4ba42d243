use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use super::event_outbox::EventOutbox;
use crate::{
    entities::{todo, todo_comment},
    events::{
        CommentEventPayload, ENTITY_COMMENT, EVENT_COMMENT_ADDED, EVENT_COMMENT_DELETED,
        EVENT_COMMENT_UPDATED,
    },
    models::ids,
    validation::{ValidationError, require_len},
};

pub const MAX_COMMENT_LEN: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Comment {
    pub id: Uuid,
    pub todo_id: Uuid,
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
#[ts(export)]
pub struct AddComment {
    pub content: String,
}

impl AddComment {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_len("content", &self.content, 1, MAX_COMMENT_LEN)
    }
}

#[derive(Debug, Clone, Deserialize, TS)]
#[ts(export)]
pub struct UpdateComment {
    pub content: String,
}

impl UpdateComment {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_len("content", &self.content, 1, MAX_COMMENT_LEN)
    }
}

impl Comment {
    pub(crate) fn from_model(model: todo_comment::Model, todo_uuid: Uuid) -> Self {
        Self {
            id: model.uuid,
            todo_id: todo_uuid,
            user_id: model.user_id,
            content: model.content,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }

    /// Comments on one todo, oldest first.
    pub async fn find_by_todo<C: ConnectionTrait>(
        db: &C,
        todo: &todo::Model,
    ) -> Result<Vec<Self>, DbErr> {
        let records = todo_comment::Entity::find()
            .filter(todo_comment::Column::TodoId.eq(todo.id))
            .filter(todo_comment::Column::UserId.eq(todo.user_id.as_str()))
            .order_by_asc(todo_comment::Column::CreatedAt)
            .order_by_asc(todo_comment::Column::Id)
            .all(db)
            .await?;
        Ok(records
            .into_iter()
            .map(|model| Self::from_model(model, todo.uuid))
            .collect())
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        todo: &todo::Model,
        data: &AddComment,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        let active = todo_comment::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            todo_id: Set(todo.id),
            user_id: Set(todo.user_id.clone()),
            content: Set(data.content.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let model = active.insert(db).await?;

        EventOutbox::enqueue_event(
            db,
            EVENT_COMMENT_ADDED,
            ENTITY_COMMENT,
            model.uuid,
            &todo.user_id,
            &CommentEventPayload {
                comment_id: model.uuid,
                todo_id: todo.uuid,
            },
        )
        .await?;
        Ok(Self::from_model(model, todo.uuid))
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        record: todo_comment::Model,
        data: &UpdateComment,
    ) -> Result<Self, DbErr> {
        let todo_uuid = Self::todo_uuid(db, record.todo_id).await?;
        let owner_id = record.user_id.clone();

        let mut active: todo_comment::ActiveModel = record.into();
        active.content = Set(data.content.clone());
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await?;

        EventOutbox::enqueue_event(
            db,
            EVENT_COMMENT_UPDATED,
            ENTITY_COMMENT,
            updated.uuid,
            &owner_id,
            &CommentEventPayload {
                comment_id: updated.uuid,
                todo_id: todo_uuid,
            },
        )
        .await?;
        Ok(Self::from_model(updated, todo_uuid))
    }

    pub async fn delete<C: ConnectionTrait>(
        db: &C,
        owner_id: &str,
        id: Uuid,
    ) -> Result<u64, DbErr> {
        let Some(record) = todo_comment::Entity::find()
            .filter(todo_comment::Column::Uuid.eq(id))
            .filter(todo_comment::Column::UserId.eq(owner_id))
            .one(db)
            .await?
        else {
            return Ok(0);
        };
        let todo_uuid = Self::todo_uuid(db, record.todo_id).await?;

        let result = todo_comment::Entity::delete_by_id(record.id)
            .exec(db)
            .await?;
        if result.rows_affected > 0 {
            EventOutbox::enqueue_event(
                db,
                EVENT_COMMENT_DELETED,
                ENTITY_COMMENT,
                record.uuid,
                owner_id,
                &CommentEventPayload {
                    comment_id: record.uuid,
                    todo_id: todo_uuid,
                },
            )
            .await?;
        }
        Ok(result.rows_affected)
    }

    /// Removes every comment on the given todo rows. Used by the todo
    /// cascade, which emits its own events.
    pub(crate) async fn delete_for_todos<C: ConnectionTrait>(
        db: &C,
        todo_ids: &[i64],
    ) -> Result<u64, DbErr> {
        if todo_ids.is_empty() {
            return Ok(0);
        }
        let result = todo_comment::Entity::delete_many()
            .filter(todo_comment::Column::TodoId.is_in(todo_ids.to_vec()))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn todo_uuid<C: ConnectionTrait>(db: &C, todo_id: i64) -> Result<Uuid, DbErr> {
        ids::todo_uuids_by_ids(db, &[todo_id])
            .await?
            .remove(&todo_id)
            .ok_or(DbErr::RecordNotFound("Todo not found".to_string()))
    }
}

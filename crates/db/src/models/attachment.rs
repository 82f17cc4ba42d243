use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use super::{blob_deletion::BlobDeletion, event_outbox::EventOutbox};
use crate::{
    entities::{todo, todo_attachment},
    events::{
        AttachmentEventPayload, ENTITY_ATTACHMENT, EVENT_ATTACHMENT_DELETED,
        EVENT_ATTACHMENT_UPLOADED,
    },
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Attachment {
    pub id: Uuid,
    pub todo_id: Uuid,
    pub user_id: String,
    pub name: String,
    pub download_key: String,
    pub file_size: i64,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Metadata of an object that has already been written to the blob store.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub id: Uuid,
    pub name: String,
    pub download_key: String,
    pub file_size: i64,
    pub mime_type: String,
}

impl Attachment {
    pub(crate) fn from_model(model: todo_attachment::Model, todo_uuid: Uuid) -> Self {
        Self {
            id: model.uuid,
            todo_id: todo_uuid,
            user_id: model.user_id,
            name: model.name,
            download_key: model.download_key,
            file_size: model.file_size,
            mime_type: model.mime_type,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }

    pub async fn find_by_todo<C: ConnectionTrait>(
        db: &C,
        todo: &todo::Model,
    ) -> Result<Vec<Self>, DbErr> {
        let records = todo_attachment::Entity::find()
            .filter(todo_attachment::Column::TodoId.eq(todo.id))
            .filter(todo_attachment::Column::UserId.eq(todo.user_id.as_str()))
            .order_by_asc(todo_attachment::Column::CreatedAt)
            .order_by_asc(todo_attachment::Column::Id)
            .all(db)
            .await?;
        Ok(records
            .into_iter()
            .map(|model| Self::from_model(model, todo.uuid))
            .collect())
    }

    /// Looks up an attachment that hangs off `todo`. An attachment of a
    /// different todo is reported as missing.
    pub async fn find_for_todo<C: ConnectionTrait>(
        db: &C,
        todo: &todo::Model,
        id: Uuid,
    ) -> Result<Option<todo_attachment::Model>, DbErr> {
        todo_attachment::Entity::find()
            .filter(todo_attachment::Column::Uuid.eq(id))
            .filter(todo_attachment::Column::TodoId.eq(todo.id))
            .filter(todo_attachment::Column::UserId.eq(todo.user_id.as_str()))
            .one(db)
            .await
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        todo: &todo::Model,
        data: &NewAttachment,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        let active = todo_attachment::ActiveModel {
            uuid: Set(data.id),
            todo_id: Set(todo.id),
            user_id: Set(todo.user_id.clone()),
            name: Set(data.name.clone()),
            download_key: Set(data.download_key.clone()),
            file_size: Set(data.file_size),
            mime_type: Set(data.mime_type.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let model = active.insert(db).await?;

        EventOutbox::enqueue_event(
            db,
            EVENT_ATTACHMENT_UPLOADED,
            ENTITY_ATTACHMENT,
            model.uuid,
            &todo.user_id,
            &AttachmentEventPayload {
                attachment_id: model.uuid,
                todo_id: todo.uuid,
                name: model.name.clone(),
                file_size: model.file_size,
            },
        )
        .await?;
        Ok(Self::from_model(model, todo.uuid))
    }

    /// Deletes the record and queues its object for removal from `bucket`.
    pub async fn delete<C: ConnectionTrait>(
        db: &C,
        todo: &todo::Model,
        record: todo_attachment::Model,
        bucket: &str,
    ) -> Result<u64, DbErr> {
        let result = todo_attachment::Entity::delete_by_id(record.id)
            .exec(db)
            .await?;
        if result.rows_affected == 0 {
            return Ok(0);
        }

        BlobDeletion::enqueue(db, bucket, &record.download_key).await?;
        EventOutbox::enqueue_event(
            db,
            EVENT_ATTACHMENT_DELETED,
            ENTITY_ATTACHMENT,
            record.uuid,
            &todo.user_id,
            &AttachmentEventPayload {
                attachment_id: record.uuid,
                todo_id: todo.uuid,
                name: record.name,
                file_size: record.file_size,
            },
        )
        .await?;
        Ok(result.rows_affected)
    }

    /// Deletes the attachments of the given todo rows, queueing a blob
    /// deletion for each. Returns the queued object keys.
    pub(crate) async fn delete_for_todos<C: ConnectionTrait>(
        db: &C,
        todo_ids: &[i64],
        bucket: &str,
    ) -> Result<Vec<String>, DbErr> {
        if todo_ids.is_empty() {
            return Ok(Vec::new());
        }
        let records = todo_attachment::Entity::find()
            .filter(todo_attachment::Column::TodoId.is_in(todo_ids.to_vec()))
            .all(db)
            .await?;
        if records.is_empty() {
            return Ok(Vec::new());
        }

        todo_attachment::Entity::delete_many()
            .filter(todo_attachment::Column::TodoId.is_in(todo_ids.to_vec()))
            .exec(db)
            .await?;

        let mut keys = Vec::with_capacity(records.len());
        for record in records {
            BlobDeletion::enqueue(db, bucket, &record.download_key).await?;
            keys.push(record.download_key);
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        blob_deletion::BlobDeletion,
        test_support::{insert_todo, setup_db},
    };

    fn new_attachment(name: &str) -> NewAttachment {
        let id = Uuid::new_v4();
        NewAttachment {
            id,
            name: name.to_string(),
            download_key: format!("todos/x/attachments/{id}-{name}"),
            file_size: 42,
            mime_type: "text/plain".to_string(),
        }
    }

    #[tokio::test]
    async fn attachment_lookup_is_scoped_to_its_todo() {
        let db = setup_db().await;
        let todo = insert_todo(&db, "alice", "with files").await;
        let other = insert_todo(&db, "alice", "another").await;

        let attachment = Attachment::create(&db, &todo, &new_attachment("notes.txt"))
            .await
            .unwrap();

        assert!(
            Attachment::find_for_todo(&db, &todo, attachment.id)
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            Attachment::find_for_todo(&db, &other, attachment.id)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn delete_queues_blob_removal() {
        let db = setup_db().await;
        let todo = insert_todo(&db, "alice", "with files").await;
        let attachment = Attachment::create(&db, &todo, &new_attachment("a.txt"))
            .await
            .unwrap();
        let record = Attachment::find_for_todo(&db, &todo, attachment.id)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            Attachment::delete(&db, &todo, record, "uploads").await.unwrap(),
            1
        );
        assert!(Attachment::find_by_todo(&db, &todo).await.unwrap().is_empty());

        let queued = BlobDeletion::find_by_key(&db, &attachment.download_key)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(queued.bucket, "uploads");
        assert!(queued.completed_at.is_none());
    }
}

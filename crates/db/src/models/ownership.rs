//! Owner-scoped lookups. A row owned by someone else is indistinguishable
//! from a missing row.

use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use thiserror::Error;
use uuid::Uuid;

use crate::entities::{todo, todo_attachment, todo_category, todo_comment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum EntityKind {
    Todo,
    #[strum(serialize = "Parent todo")]
    ParentTodo,
    Category,
    Comment,
    Attachment,
}

#[derive(Debug, Clone)]
pub enum OwnedEntity {
    Todo(todo::Model),
    Category(todo_category::Model),
    Comment(todo_comment::Model),
    Attachment(todo_attachment::Model),
}

#[derive(Debug, Error)]
pub enum OwnershipError {
    #[error("{0} not found")]
    NotFound(EntityKind),
    #[error(transparent)]
    Database(#[from] DbErr),
}

pub async fn resolve<C: ConnectionTrait>(
    db: &C,
    kind: EntityKind,
    id: Uuid,
    owner_id: &str,
) -> Result<OwnedEntity, OwnershipError> {
    match kind {
        EntityKind::Todo | EntityKind::ParentTodo => {
            let model = todo::Entity::find()
                .filter(todo::Column::Uuid.eq(id))
                .filter(todo::Column::UserId.eq(owner_id))
                .one(db)
                .await?;
            model.map(OwnedEntity::Todo).ok_or(OwnershipError::NotFound(kind))
        }
        EntityKind::Category => {
            let model = todo_category::Entity::find()
                .filter(todo_category::Column::Uuid.eq(id))
                .filter(todo_category::Column::UserId.eq(owner_id))
                .one(db)
                .await?;
            model
                .map(OwnedEntity::Category)
                .ok_or(OwnershipError::NotFound(kind))
        }
        EntityKind::Comment => {
            let model = todo_comment::Entity::find()
                .filter(todo_comment::Column::Uuid.eq(id))
                .filter(todo_comment::Column::UserId.eq(owner_id))
                .one(db)
                .await?;
            model
                .map(OwnedEntity::Comment)
                .ok_or(OwnershipError::NotFound(kind))
        }
        EntityKind::Attachment => {
            let model = todo_attachment::Entity::find()
                .filter(todo_attachment::Column::Uuid.eq(id))
                .filter(todo_attachment::Column::UserId.eq(owner_id))
                .one(db)
                .await?;
            model
                .map(OwnedEntity::Attachment)
                .ok_or(OwnershipError::NotFound(kind))
        }
    }
}

pub async fn resolve_todo<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
    owner_id: &str,
) -> Result<todo::Model, OwnershipError> {
    match resolve(db, EntityKind::Todo, id, owner_id).await? {
        OwnedEntity::Todo(model) => Ok(model),
        _ => Err(OwnershipError::NotFound(EntityKind::Todo)),
    }
}

pub async fn resolve_parent_todo<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
    owner_id: &str,
) -> Result<todo::Model, OwnershipError> {
    match resolve(db, EntityKind::ParentTodo, id, owner_id).await? {
        OwnedEntity::Todo(model) => Ok(model),
        _ => Err(OwnershipError::NotFound(EntityKind::ParentTodo)),
    }
}

pub async fn resolve_category<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
    owner_id: &str,
) -> Result<todo_category::Model, OwnershipError> {
    match resolve(db, EntityKind::Category, id, owner_id).await? {
        OwnedEntity::Category(model) => Ok(model),
        _ => Err(OwnershipError::NotFound(EntityKind::Category)),
    }
}

pub async fn resolve_comment<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
    owner_id: &str,
) -> Result<todo_comment::Model, OwnershipError> {
    match resolve(db, EntityKind::Comment, id, owner_id).await? {
        OwnedEntity::Comment(model) => Ok(model),
        _ => Err(OwnershipError::NotFound(EntityKind::Comment)),
    }
}

pub async fn resolve_attachment<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
    owner_id: &str,
) -> Result<todo_attachment::Model, OwnershipError> {
    match resolve(db, EntityKind::Attachment, id, owner_id).await? {
        OwnedEntity::Attachment(model) => Ok(model),
        _ => Err(OwnershipError::NotFound(EntityKind::Attachment)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::{insert_category, insert_todo, setup_db};

    #[tokio::test]
    async fn foreign_owner_is_reported_as_not_found() {
        let db = setup_db().await;
        let todo = insert_todo(&db, "alice", "alice's todo").await;
        let category = insert_category(&db, "alice", "work").await;

        assert!(resolve_todo(&db, todo.uuid, "alice").await.is_ok());
        assert!(matches!(
            resolve_todo(&db, todo.uuid, "mallory").await,
            Err(OwnershipError::NotFound(EntityKind::Todo))
        ));
        assert!(matches!(
            resolve(&db, EntityKind::Category, category.uuid, "mallory").await,
            Err(OwnershipError::NotFound(EntityKind::Category))
        ));

        let missing = resolve_todo(&db, Uuid::new_v4(), "alice").await.unwrap_err();
        let foreign = resolve_todo(&db, todo.uuid, "mallory").await.unwrap_err();
        assert_eq!(missing.to_string(), foreign.to_string());
    }

    #[tokio::test]
    async fn parent_kind_names_itself_in_errors() {
        let db = setup_db().await;
        let err = resolve_parent_todo(&db, Uuid::new_v4(), "alice")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Parent todo not found");
    }
}
